//! Command-line surface.

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use marketplace::{
    ComplaintCategory, ComplaintId, ComplaintPriority, ComplaintStatus, Date, Money,
    NotificationId, PaymentId, PaymentMethod, ProfileId, PropertyId, PropertyKind, RenovationId,
    RenovationStatus, RentalId, RentalRequestId, RequestStatus, SortOrder, Timestamp, UserRole,
    ViewingId,
};

#[derive(Debug, Parser)]
#[command(name = "linkier", version, about = "Student housing marketplace")]
pub struct Cli {
    /// Configuration file.
    #[arg(
        long,
        global = true,
        env = "LINKIER_CONFIG",
        default_value = "linkier.toml",
        value_name = "PATH"
    )]
    pub config: PathBuf,

    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account and sign in.
    Signup(SignupArgs),
    /// Sign in with e-mail and password.
    Login(LoginArgs),
    /// Sign out and forget the stored session.
    Logout,
    /// Show the signed-in profile.
    Whoami,
    #[command(subcommand)]
    Profile(ProfileCommand),
    #[command(subcommand)]
    Property(PropertyCommand),
    #[command(subcommand)]
    Request(RequestCommand),
    #[command(subcommand)]
    Rental(RentalCommand),
    #[command(subcommand)]
    Viewing(ViewingCommand),
    #[command(subcommand)]
    Message(MessageCommand),
    #[command(subcommand)]
    Complaint(ComplaintCommand),
    #[command(subcommand)]
    Renovation(RenovationCommand),
    #[command(subcommand)]
    Payment(PaymentCommand),
    #[command(subcommand)]
    Notification(NotificationCommand),
    /// Summary counts for the signed-in user.
    Dashboard,
}

#[derive(Debug, Args)]
pub struct SignupArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "LINKIER_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub name: String,
    /// `student` or `landlord`.
    #[arg(long)]
    pub role: UserRole,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub university: Option<String>,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "LINKIER_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Edit the signed-in profile. An empty value clears an optional field.
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        university: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Newest,
    RentAsc,
    RentDesc,
}

impl From<SortArg> for SortOrder {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Newest => SortOrder::Newest,
            SortArg::RentAsc => SortOrder::RentAscending,
            SortArg::RentDesc => SortOrder::RentDescending,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum PropertyCommand {
    /// List a new property.
    Create(PropertyCreateArgs),
    /// Edit a listing.
    Update(PropertyUpdateArgs),
    /// Properties of a landlord (default: yourself).
    List {
        #[arg(long)]
        landlord: Option<ProfileId>,
    },
    Search(PropertySearchArgs),
    Show {
        id: PropertyId,
    },
    /// Active rentals on one of your properties.
    Tenants {
        id: PropertyId,
    },
    /// Upload an image file and attach it to a listing.
    ImageAdd {
        id: PropertyId,
        file: PathBuf,
        /// Defaults from the file extension.
        #[arg(long)]
        content_type: Option<String>,
    },
    ImageRemove {
        id: PropertyId,
        url: String,
    },
    /// Open or close a listing for requests.
    Availability {
        id: PropertyId,
        #[arg(action = ArgAction::Set, value_parser = BoolishValueParser::new())]
        available: bool,
    },
    Delete {
        id: PropertyId,
    },
}

#[derive(Debug, Args)]
pub struct PropertyCreateArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long)]
    pub address: String,
    #[arg(long)]
    pub city: String,
    #[arg(long)]
    pub kind: PropertyKind,
    /// Monthly rent, e.g. `450` or `450.50`.
    #[arg(long, value_parser = parse_money)]
    pub rent: Money,
    #[arg(long)]
    pub rooms: u32,
    #[arg(long = "amenity")]
    pub amenities: Vec<String>,
}

#[derive(Debug, Args)]
pub struct PropertyUpdateArgs {
    pub id: PropertyId,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub kind: Option<PropertyKind>,
    #[arg(long, value_parser = parse_money)]
    pub rent: Option<Money>,
    #[arg(long)]
    pub rooms: Option<u32>,
    /// Replaces the amenity list.
    #[arg(long = "amenity")]
    pub amenities: Vec<String>,
}

#[derive(Debug, Args)]
pub struct PropertySearchArgs {
    /// Free text matched against title, description and address.
    #[arg(long)]
    pub text: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long, value_parser = parse_money)]
    pub min_rent: Option<Money>,
    #[arg(long, value_parser = parse_money)]
    pub max_rent: Option<Money>,
    #[arg(long)]
    pub kind: Option<PropertyKind>,
    #[arg(long)]
    pub min_rooms: Option<u32>,
    #[arg(long = "amenity")]
    pub amenities: Vec<String>,
    /// Hide listings with no free room.
    #[arg(long)]
    pub available: bool,
    #[arg(long, value_enum, default_value_t = SortArg::Newest)]
    pub sort: SortArg,
}

// ---------------------------------------------------------------------------
// Requests, rentals, viewings
// ---------------------------------------------------------------------------

#[derive(Debug, Subcommand)]
pub enum RequestCommand {
    /// Ask to rent a room.
    Submit {
        property: PropertyId,
        #[arg(long)]
        move_in: Date,
        #[arg(long)]
        message: Option<String>,
    },
    Accept {
        id: RentalRequestId,
    },
    Reject {
        id: RentalRequestId,
    },
    Cancel {
        id: RentalRequestId,
    },
    List {
        #[arg(long)]
        status: Option<RequestStatus>,
    },
}

#[derive(Debug, Subcommand)]
pub enum RentalCommand {
    List {
        #[arg(long)]
        property: Option<PropertyId>,
    },
    /// End a rental and free its room.
    End {
        id: RentalId,
        /// Defaults to today.
        #[arg(long)]
        end_date: Option<Date>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ViewingCommand {
    Request {
        property: PropertyId,
        /// RFC 3339 time, e.g. `2026-11-02T14:00:00+01:00`.
        #[arg(long, value_parser = parse_timestamp)]
        at: Timestamp,
        #[arg(long)]
        notes: Option<String>,
    },
    Confirm {
        id: ViewingId,
    },
    Decline {
        id: ViewingId,
    },
    Cancel {
        id: ViewingId,
    },
    Complete {
        id: ViewingId,
    },
    List {
        #[arg(long)]
        upcoming: bool,
    },
}

// ---------------------------------------------------------------------------
// Messages, complaints, renovations
// ---------------------------------------------------------------------------

#[derive(Debug, Subcommand)]
pub enum MessageCommand {
    Send {
        recipient: ProfileId,
        body: String,
        #[arg(long)]
        property: Option<PropertyId>,
    },
    /// Show a conversation and mark it read.
    Thread {
        with: ProfileId,
    },
    Inbox,
}

#[derive(Debug, Subcommand)]
pub enum ComplaintCommand {
    File {
        rental: RentalId,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        category: ComplaintCategory,
        #[arg(long, default_value = "medium")]
        priority: ComplaintPriority,
    },
    Update {
        id: ComplaintId,
        #[arg(long)]
        status: ComplaintStatus,
        #[arg(long)]
        response: Option<String>,
    },
    List {
        #[arg(long)]
        status: Option<ComplaintStatus>,
    },
}

#[derive(Debug, Subcommand)]
pub enum RenovationCommand {
    Schedule {
        property: PropertyId,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        start: Date,
        #[arg(long)]
        end: Option<Date>,
        #[arg(long, value_parser = parse_money)]
        cost: Option<Money>,
    },
    Update {
        id: RenovationId,
        #[arg(long)]
        status: RenovationStatus,
    },
    List {
        #[arg(long)]
        property: Option<PropertyId>,
    },
}

// ---------------------------------------------------------------------------
// Payments, notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Subcommand)]
pub enum PaymentCommand {
    /// Record rent due for a billing period.
    Due {
        rental: RentalId,
        #[arg(long)]
        period: Date,
        #[arg(long)]
        due: Date,
        /// Defaults to the rental's monthly rent.
        #[arg(long, value_parser = parse_money)]
        amount: Option<Money>,
    },
    Paid {
        id: PaymentId,
        #[arg(long)]
        method: PaymentMethod,
    },
    Late {
        id: PaymentId,
    },
    Cancel {
        id: PaymentId,
    },
    /// Mark every pending payment past its due date as late.
    Overdue {
        /// Defaults to today.
        #[arg(long)]
        today: Option<Date>,
    },
    List {
        #[arg(long)]
        rental: Option<RentalId>,
    },
}

#[derive(Debug, Subcommand)]
pub enum NotificationCommand {
    List {
        #[arg(long)]
        unread: bool,
    },
    Read {
        id: NotificationId,
    },
    ReadAll,
}

fn parse_money(text: &str) -> Result<Money, String> {
    Money::parse(text).ok_or_else(|| format!("'{text}' is not an amount like 450 or 450.50"))
}

fn parse_timestamp(text: &str) -> Result<Timestamp, String> {
    Timestamp::parse(text).ok_or_else(|| format!("'{text}' is not an RFC 3339 time"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_domain_values() {
        let cli = Cli::try_parse_from([
            "linkier",
            "--json",
            "property",
            "create",
            "--title",
            "Room",
            "--address",
            "Naamsestraat 1",
            "--city",
            "Leuven",
            "--kind",
            "shared-room",
            "--rent",
            "450.50",
            "--rooms",
            "3",
            "--amenity",
            "wifi",
            "--amenity",
            "garden",
        ])
        .unwrap();
        assert!(cli.json);
        let Command::Property(PropertyCommand::Create(args)) = cli.command else {
            panic!("unexpected command");
        };
        assert_eq!(args.kind, PropertyKind::SharedRoom);
        assert_eq!(args.rent.as_cents(), 45_050);
        assert_eq!(args.amenities, vec!["wifi", "garden"]);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(Cli::try_parse_from(["linkier", "request", "accept", "not-a-uuid"]).is_err());
        assert!(Cli::try_parse_from([
            "linkier", "payment", "due", "6a2f41a3-c54c-4b2c-9c5f-3c1c2f1d0b77",
            "--period", "2026-11-01", "--due", "2026-11-05", "--amount", "-3",
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "linkier", "viewing", "request", "6a2f41a3-c54c-4b2c-9c5f-3c1c2f1d0b77",
            "--at", "tomorrow",
        ])
        .is_err());
    }

    #[test]
    fn availability_accepts_boolish_words() {
        let cli = Cli::try_parse_from([
            "linkier",
            "property",
            "availability",
            "6a2f41a3-c54c-4b2c-9c5f-3c1c2f1d0b77",
            "off",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Property(PropertyCommand::Availability { available: false, .. })
        ));

        let cli = Cli::try_parse_from([
            "linkier",
            "property",
            "availability",
            "6a2f41a3-c54c-4b2c-9c5f-3c1c2f1d0b77",
            "on",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Property(PropertyCommand::Availability { available: true, .. })
        ));

        assert!(Cli::try_parse_from([
            "linkier",
            "property",
            "availability",
            "6a2f41a3-c54c-4b2c-9c5f-3c1c2f1d0b77",
        ])
        .is_err());
    }
}
