//! Subcommand handlers. Each returns a [`Report`]; printing is left to
//! `main`.

use std::path::Path;

use anyhow::{anyhow, bail, Context};
use marketplace::{Date, Profile, PropertySearch, Timestamp};
use serde_json::json;
use tracing::instrument;
use workflows::{
    ComplaintDraft, ImageUpload, ProfileUpdate, PropertyDraft, PropertyUpdate, RenovationDraft,
    SignUp,
};

use crate::app::App;
use crate::cli::{
    Command, ComplaintCommand, LoginArgs, MessageCommand, NotificationCommand, PaymentCommand,
    ProfileCommand, PropertyCommand, RenovationCommand, RentalCommand, RequestCommand,
    SignupArgs, ViewingCommand,
};
use crate::output::{self, Report};

fn today() -> Date {
    Timestamp::now().date()
}

/// Content type for an image file, from its extension.
fn content_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

pub async fn execute(app: &App, command: Command) -> anyhow::Result<Report> {
    match command {
        Command::Signup(args) => signup(app, args).await,
        Command::Login(args) => login(app, args).await,
        Command::Logout => logout(app).await,
        Command::Whoami => {
            let actor = app.actor().await?;
            Report::new(&actor, output::profile(&actor))
        }
        Command::Profile(command) => profile(app, command).await,
        Command::Property(command) => property(app, command).await,
        Command::Request(command) => request(app, command).await,
        Command::Rental(command) => rental(app, command).await,
        Command::Viewing(command) => viewing(app, command).await,
        Command::Message(command) => message(app, command).await,
        Command::Complaint(command) => complaint(app, command).await,
        Command::Renovation(command) => renovation(app, command).await,
        Command::Payment(command) => payment(app, command).await,
        Command::Notification(command) => notification(app, command).await,
        Command::Dashboard => dashboard(app).await,
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[instrument(skip_all, fields(role = %args.role))]
async fn signup(app: &App, args: SignupArgs) -> anyhow::Result<Report> {
    let (session, profile) = app
        .market()
        .accounts()
        .sign_up(SignUp {
            email: args.email,
            password: args.password,
            full_name: args.name,
            role: args.role,
            phone: args.phone,
            university: args.university,
        })
        .await?;
    app.sessions().save(&session).await?;
    Report::new(
        &profile,
        format!("Welcome to Linkier!\n{}", output::profile(&profile)),
    )
}

#[instrument(skip_all)]
async fn login(app: &App, args: LoginArgs) -> anyhow::Result<Report> {
    let (session, profile) = app
        .market()
        .accounts()
        .sign_in(&args.email, &args.password)
        .await?;
    app.sessions().save(&session).await?;
    Report::new(
        &profile,
        format!("Signed in as {} ({})", profile.full_name, profile.role),
    )
}

async fn logout(app: &App) -> anyhow::Result<Report> {
    let Some(session) = app.sessions().load().await? else {
        return Ok(Report::message("Not signed in."));
    };
    let revoked = app.market().accounts().sign_out(&session).await;
    app.sessions().clear().await?;
    revoked?;
    Ok(Report::message("Signed out."))
}

async fn profile(app: &App, command: ProfileCommand) -> anyhow::Result<Report> {
    let ProfileCommand::Update {
        name,
        phone,
        university,
        avatar_url,
    } = command;
    let actor = app.actor().await?;
    let updated = app
        .market()
        .accounts()
        .update_profile(
            &actor,
            actor.id,
            ProfileUpdate {
                full_name: name,
                phone,
                university,
                avatar_url,
            },
        )
        .await?;
    Report::new(&updated, output::profile(&updated))
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

async fn property(app: &App, command: PropertyCommand) -> anyhow::Result<Report> {
    let listings = app.market().listings();
    match command {
        PropertyCommand::Create(args) => {
            let actor = app.actor().await?;
            let created = listings
                .create_property(
                    &actor,
                    PropertyDraft {
                        title: args.title,
                        description: args.description,
                        address: args.address,
                        city: args.city,
                        kind: args.kind,
                        monthly_rent: args.rent,
                        total_rooms: args.rooms,
                        amenities: args.amenities,
                    },
                )
                .await?;
            Report::new(&created, output::property(&created))
        }
        PropertyCommand::Update(args) => {
            let actor = app.actor().await?;
            let update = PropertyUpdate {
                title: args.title,
                description: args.description,
                address: args.address,
                city: args.city,
                kind: args.kind,
                monthly_rent: args.rent,
                total_rooms: args.rooms,
                amenities: (!args.amenities.is_empty()).then_some(args.amenities),
            };
            let updated = listings.update_property(&actor, args.id, update).await?;
            Report::new(&updated, output::property(&updated))
        }
        PropertyCommand::List { landlord } => {
            let landlord_id = match landlord {
                Some(id) => id,
                None => {
                    let actor = app.actor().await?;
                    if !actor.is_landlord() {
                        bail!(
                            "students have no listings; \
                             pass --landlord <id> or use `property search`"
                        );
                    }
                    actor.id
                }
            };
            let found = listings.landlord_properties(landlord_id).await?;
            Report::list(&found, "No properties listed.", output::property_line)
        }
        PropertyCommand::Search(args) => {
            let search = PropertySearch {
                text: args.text,
                city: args.city,
                min_rent: args.min_rent,
                max_rent: args.max_rent,
                kind: args.kind,
                min_rooms: args.min_rooms,
                amenities: args.amenities,
                only_available: args.available,
            };
            let found = listings.search(&search, args.sort.into()).await?;
            Report::list(&found, "No properties match.", output::property_line)
        }
        PropertyCommand::Show { id } => {
            let found = listings.property(id).await?;
            Report::new(&found, output::property(&found))
        }
        PropertyCommand::Tenants { id } => {
            let actor = app.actor().await?;
            let rentals = listings.tenants(&actor, id).await?;
            Report::list(&rentals, "No active tenants.", output::rental_line)
        }
        PropertyCommand::ImageAdd {
            id,
            file,
            content_type,
        } => {
            let actor = app.actor().await?;
            let content_type = match content_type {
                Some(explicit) => explicit,
                None => content_type_for(&file)
                    .ok_or_else(|| {
                        anyhow!(
                            "cannot tell the image type of '{}'; pass --content-type",
                            file.display()
                        )
                    })?
                    .to_owned(),
            };
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read '{}'", file.display()))?;
            let file_name = file
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("image")
                .to_owned();
            let updated = listings
                .upload_image(
                    &actor,
                    id,
                    ImageUpload {
                        file_name,
                        content_type,
                        bytes,
                    },
                )
                .await?;
            Report::new(&updated, output::property(&updated))
        }
        PropertyCommand::ImageRemove { id, url } => {
            let actor = app.actor().await?;
            let updated = listings.remove_image(&actor, id, &url).await?;
            Report::new(&updated, output::property(&updated))
        }
        PropertyCommand::Availability { id, available } => {
            let actor = app.actor().await?;
            let updated = listings.set_availability(&actor, id, available).await?;
            Report::new(&updated, output::property_line(&updated))
        }
        PropertyCommand::Delete { id } => {
            let actor = app.actor().await?;
            listings.delete_property(&actor, id).await?;
            Ok(Report::message(format!("Deleted property {id}.")))
        }
    }
}

// ---------------------------------------------------------------------------
// Requests, rentals, viewings
// ---------------------------------------------------------------------------

async fn request(app: &App, command: RequestCommand) -> anyhow::Result<Report> {
    let actor = app.actor().await?;
    let requests = app.market().requests();
    let updated = match command {
        RequestCommand::Submit {
            property,
            move_in,
            message,
        } => {
            requests
                .submit(&actor, property, move_in, message.as_deref())
                .await?
        }
        RequestCommand::Accept { id } => {
            let rental = requests.accept(&actor, id).await?;
            return Report::new(
                &rental,
                format!("Accepted.\n{}", output::rental_line(&rental)),
            );
        }
        RequestCommand::Reject { id } => requests.reject(&actor, id).await?,
        RequestCommand::Cancel { id } => requests.cancel(&actor, id).await?,
        RequestCommand::List { status } => {
            let mut found = if actor.is_landlord() {
                requests.for_landlord(actor.id, status).await?
            } else {
                requests.for_student(actor.id).await?
            };
            if let Some(status) = status {
                found.retain(|r| r.status == status);
            }
            return Report::list(&found, "No rental requests.", output::request_line);
        }
    };
    Report::new(&updated, output::request_line(&updated))
}

async fn rental(app: &App, command: RentalCommand) -> anyhow::Result<Report> {
    let actor = app.actor().await?;
    let rentals = app.market().rentals();
    match command {
        RentalCommand::List { property } => {
            let found = match property {
                Some(property_id) => {
                    let listed = app.market().listings().property(property_id).await?;
                    if listed.landlord_id != actor.id {
                        bail!("only the landlord can list every rental of a property");
                    }
                    rentals.for_property(property_id).await?
                }
                None if actor.is_landlord() => rentals.for_landlord(actor.id).await?,
                None => rentals.for_student(actor.id).await?,
            };
            Report::list(&found, "No rentals.", output::rental_line)
        }
        RentalCommand::End { id, end_date } => {
            let ended = rentals
                .end_rental(&actor, id, end_date.unwrap_or_else(today))
                .await?;
            Report::new(&ended, output::rental_line(&ended))
        }
    }
}

async fn viewing(app: &App, command: ViewingCommand) -> anyhow::Result<Report> {
    let actor = app.actor().await?;
    let viewings = app.market().viewings();
    let updated = match command {
        ViewingCommand::Request { property, at, notes } => {
            viewings.request(&actor, property, at, notes.as_deref()).await?
        }
        ViewingCommand::Confirm { id } => viewings.confirm(&actor, id).await?,
        ViewingCommand::Decline { id } => viewings.decline(&actor, id).await?,
        ViewingCommand::Cancel { id } => viewings.cancel(&actor, id).await?,
        ViewingCommand::Complete { id } => viewings.complete(&actor, id).await?,
        ViewingCommand::List { upcoming } => {
            let found = if actor.is_landlord() {
                viewings.for_landlord(actor.id, upcoming).await?
            } else {
                let now = Timestamp::now();
                let mut found = viewings.for_student(actor.id).await?;
                if upcoming {
                    found.retain(|v| v.status.is_upcoming() && v.scheduled_for > now);
                }
                found
            };
            return Report::list(&found, "No viewings.", output::viewing_line);
        }
    };
    Report::new(&updated, output::viewing_line(&updated))
}

// ---------------------------------------------------------------------------
// Messages, complaints, renovations
// ---------------------------------------------------------------------------

async fn message(app: &App, command: MessageCommand) -> anyhow::Result<Report> {
    let actor = app.actor().await?;
    let messaging = app.market().messaging();
    match command {
        MessageCommand::Send {
            recipient,
            body,
            property,
        } => {
            let sent = messaging.send(&actor, recipient, &body, property).await?;
            Report::new(&sent, output::message_line(&sent))
        }
        MessageCommand::Thread { with } => {
            let thread = messaging.conversation(&actor, with).await?;
            messaging.mark_read(&actor, with).await?;
            Report::list(&thread, "No messages yet.", output::message_line)
        }
        MessageCommand::Inbox => {
            let inbox = messaging.inbox(&actor).await?;
            Report::list(&inbox, "Inbox is empty.", output::conversation_line)
        }
    }
}

async fn complaint(app: &App, command: ComplaintCommand) -> anyhow::Result<Report> {
    let actor = app.actor().await?;
    let complaints = app.market().complaints();
    let updated = match command {
        ComplaintCommand::File {
            rental,
            title,
            description,
            category,
            priority,
        } => {
            complaints
                .file(
                    &actor,
                    ComplaintDraft {
                        rental_id: rental,
                        title,
                        description,
                        category,
                        priority,
                    },
                )
                .await?
        }
        ComplaintCommand::Update {
            id,
            status,
            response,
        } => {
            complaints
                .update_status(&actor, id, status, response.as_deref())
                .await?
        }
        ComplaintCommand::List { status } => {
            let mut found = if actor.is_landlord() {
                complaints.for_landlord(actor.id, status).await?
            } else {
                complaints.for_student(actor.id).await?
            };
            if let Some(status) = status {
                found.retain(|c| c.status == status);
            }
            return Report::list(&found, "No complaints.", output::complaint_line);
        }
    };
    Report::new(&updated, output::complaint_line(&updated))
}

async fn renovation(app: &App, command: RenovationCommand) -> anyhow::Result<Report> {
    let renovations = app.market().renovations();
    let updated = match command {
        RenovationCommand::Schedule {
            property,
            title,
            description,
            start,
            end,
            cost,
        } => {
            let actor = app.actor().await?;
            renovations
                .schedule(
                    &actor,
                    RenovationDraft {
                        property_id: property,
                        title,
                        description,
                        start_date: start,
                        end_date: end,
                        cost,
                    },
                )
                .await?
        }
        RenovationCommand::Update { id, status } => {
            let actor = app.actor().await?;
            renovations.update_status(&actor, id, status).await?
        }
        RenovationCommand::List { property } => {
            let found = match property {
                Some(property_id) => renovations.for_property(property_id).await?,
                None => {
                    let actor = app.actor().await?;
                    if !actor.is_landlord() {
                        bail!("pass --property <id> to list a property's renovations");
                    }
                    renovations.for_landlord(actor.id).await?
                }
            };
            return Report::list(&found, "No renovations.", output::renovation_line);
        }
    };
    Report::new(&updated, output::renovation_line(&updated))
}

// ---------------------------------------------------------------------------
// Payments, notifications, dashboard
// ---------------------------------------------------------------------------

async fn payment(app: &App, command: PaymentCommand) -> anyhow::Result<Report> {
    let actor = app.actor().await?;
    let payments = app.market().payments();
    let updated = match command {
        PaymentCommand::Due {
            rental,
            period,
            due,
            amount,
        } => payments.record_due(&actor, rental, period, due, amount).await?,
        PaymentCommand::Paid { id, method } => payments.mark_paid(&actor, id, method).await?,
        PaymentCommand::Late { id } => payments.mark_late(&actor, id).await?,
        PaymentCommand::Cancel { id } => payments.cancel(&actor, id).await?,
        PaymentCommand::Overdue { today: on } => {
            let flagged = payments
                .flag_overdue(&actor, on.unwrap_or_else(today))
                .await?;
            return Report::new(
                &json!({ "flagged": flagged }),
                format!("{flagged} payment(s) marked late."),
            );
        }
        PaymentCommand::List { rental } => return payment_list(app, &actor, rental).await,
    };
    Report::new(&updated, output::payment_line(&updated))
}

async fn payment_list(
    app: &App,
    actor: &Profile,
    rental: Option<marketplace::RentalId>,
) -> anyhow::Result<Report> {
    let payments = app.market().payments();
    let mut rows = match rental {
        Some(rental_id) => payments.for_rental(rental_id).await?,
        None if actor.is_landlord() => payments.for_landlord(actor.id).await?,
        None => payments.for_student(actor.id).await?,
    };
    rows.retain(|p| p.student_id == actor.id || p.landlord_id == actor.id);
    let summary = payments.summary(&rows);
    let mut text = if rows.is_empty() {
        "No payments.".to_owned()
    } else {
        rows.iter()
            .map(output::payment_line)
            .collect::<Vec<_>>()
            .join("\n")
    };
    text.push('\n');
    text.push_str(&output::payment_summary(&summary));
    Report::new(&json!({ "payments": rows, "summary": summary }), text)
}

async fn notification(app: &App, command: NotificationCommand) -> anyhow::Result<Report> {
    let actor = app.actor().await?;
    let notifications = app.market().notifications();
    match command {
        NotificationCommand::List { unread } => {
            let feed = notifications.for_user(&actor, unread).await?;
            Report::list(&feed, "No notifications.", output::notification_line)
        }
        NotificationCommand::Read { id } => {
            let read = notifications.mark_read(&actor, id).await?;
            Report::new(&read, output::notification_line(&read))
        }
        NotificationCommand::ReadAll => {
            let marked = notifications.mark_all_read(&actor).await?;
            Report::new(
                &json!({ "marked": marked }),
                format!("{marked} notification(s) marked read."),
            )
        }
    }
}

async fn dashboard(app: &App) -> anyhow::Result<Report> {
    let actor = app.actor().await?;
    let dashboards = app.market().dashboards();
    if actor.is_landlord() {
        let counts = dashboards.landlord(&actor).await?;
        Report::new(&counts, output::landlord_dashboard(&counts))
    } else {
        let counts = dashboards.student(&actor).await?;
        Report::new(&counts, output::student_dashboard(&counts))
    }
}
