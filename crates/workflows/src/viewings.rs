//! Property viewings.

use marketplace::{
    fetch_all, fetch_one, insert_record, update_record, LinkierError, NewPropertyViewing,
    NotificationKind, Profile, ProfileId, PropertyId, PropertyViewing, Query, Timestamp,
    ViewingId, ViewingStatus,
};
use serde_json::json;
use tracing::{info, instrument};

use crate::guard::{
    optional_text, require_landlord, require_party, require_self, require_student,
    require_transition,
};
use crate::{display_name, Marketplace};

const MAX_NOTES_CHARS: usize = 1000;

/// Viewing operations.
pub struct Viewings<'a> {
    market: &'a Marketplace,
}

impl<'a> Viewings<'a> {
    pub(crate) fn new(market: &'a Marketplace) -> Self {
        Self { market }
    }

    /// Asks to visit a property at `scheduled_for`.
    #[instrument(skip_all, fields(student_id = %actor.id, %property_id))]
    pub async fn request(
        &self,
        actor: &Profile,
        property_id: PropertyId,
        scheduled_for: Timestamp,
        notes: Option<&str>,
    ) -> Result<PropertyViewing, LinkierError> {
        require_student(actor, "request viewings")?;
        if scheduled_for <= Timestamp::now() {
            return Err(LinkierError::validation("viewing time", "must be in the future"));
        }
        let notes = optional_text("notes", notes, MAX_NOTES_CHARS)?;
        let property = self.market.listings().property(property_id).await?;

        let viewing: PropertyViewing = insert_record(
            self.market.store(),
            &NewPropertyViewing {
                property_id,
                student_id: actor.id,
                landlord_id: property.landlord_id,
                scheduled_for,
                status: ViewingStatus::Requested,
                notes,
            },
        )
        .await?;
        info!(viewing_id = %viewing.id, "Viewing requested");

        self.market
            .notifications()
            .notify(
                property.landlord_id,
                NotificationKind::ViewingRequested,
                NotificationKind::ViewingRequested.label(),
                format!(
                    "{} would like to visit '{}' on {}.",
                    display_name(actor),
                    property.title,
                    scheduled_for
                ),
            )
            .await;
        Ok(viewing)
    }

    pub async fn confirm(
        &self,
        actor: &Profile,
        id: ViewingId,
    ) -> Result<PropertyViewing, LinkierError> {
        let viewing = self.landlord_viewing(actor, id).await?;
        let notify = Some((viewing.student_id, NotificationKind::ViewingConfirmed));
        self.advance(&viewing, ViewingStatus::Confirmed, notify).await
    }

    pub async fn decline(
        &self,
        actor: &Profile,
        id: ViewingId,
    ) -> Result<PropertyViewing, LinkierError> {
        let viewing = self.landlord_viewing(actor, id).await?;
        let notify = Some((viewing.student_id, NotificationKind::ViewingDeclined));
        self.advance(&viewing, ViewingStatus::Declined, notify).await
    }

    /// Marks a confirmed viewing as having taken place.
    pub async fn complete(
        &self,
        actor: &Profile,
        id: ViewingId,
    ) -> Result<PropertyViewing, LinkierError> {
        let viewing = self.landlord_viewing(actor, id).await?;
        self.advance(&viewing, ViewingStatus::Completed, None).await
    }

    /// Cancels a viewing; either party may. The other one is notified.
    pub async fn cancel(
        &self,
        actor: &Profile,
        id: ViewingId,
    ) -> Result<PropertyViewing, LinkierError> {
        let viewing = self.viewing(id).await?;
        require_party(actor, viewing.student_id, viewing.landlord_id, "viewing")?;
        let counterpart = if actor.id == viewing.student_id {
            viewing.landlord_id
        } else {
            viewing.student_id
        };
        self.advance(
            &viewing,
            ViewingStatus::Cancelled,
            Some((counterpart, NotificationKind::ViewingCancelled)),
        )
        .await
    }

    pub async fn viewing(&self, id: ViewingId) -> Result<PropertyViewing, LinkierError> {
        fetch_one::<PropertyViewing>(self.market.store(), id)
            .await?
            .ok_or_else(|| LinkierError::not_found("viewing", id))
    }

    /// A student's viewings, soonest first.
    pub async fn for_student(
        &self,
        student_id: ProfileId,
    ) -> Result<Vec<PropertyViewing>, LinkierError> {
        let query = Query::new()
            .eq("student_id", json!(student_id))
            .order_asc("scheduled_for");
        Ok(fetch_all(self.market.store(), &query).await?)
    }

    /// A landlord's viewings, soonest first. `upcoming_only` keeps requested
    /// and confirmed viewings that have not started yet.
    pub async fn for_landlord(
        &self,
        landlord_id: ProfileId,
        upcoming_only: bool,
    ) -> Result<Vec<PropertyViewing>, LinkierError> {
        let mut query = Query::new().eq("landlord_id", json!(landlord_id));
        if upcoming_only {
            query = query
                .one_of(
                    "status",
                    vec![json!(ViewingStatus::Requested), json!(ViewingStatus::Confirmed)],
                )
                .gt("scheduled_for", json!(Timestamp::now()));
        }
        Ok(fetch_all(self.market.store(), &query.order_asc("scheduled_for")).await?)
    }

    async fn landlord_viewing(
        &self,
        actor: &Profile,
        id: ViewingId,
    ) -> Result<PropertyViewing, LinkierError> {
        require_landlord(actor, "manage viewings")?;
        let viewing = self.viewing(id).await?;
        require_self(actor, viewing.landlord_id, "viewing")?;
        Ok(viewing)
    }

    #[instrument(skip_all, fields(viewing_id = %viewing.id, to = %next.as_str()))]
    async fn advance(
        &self,
        viewing: &PropertyViewing,
        next: ViewingStatus,
        notify: Option<(ProfileId, NotificationKind)>,
    ) -> Result<PropertyViewing, LinkierError> {
        require_transition(
            "viewing",
            viewing.status.as_str(),
            next.as_str(),
            viewing.status.can_transition_to(next),
        )?;
        let updated = update_record::<PropertyViewing>(
            self.market.store(),
            viewing.id,
            json!({ "status": next }),
        )
        .await?
        .ok_or_else(|| LinkierError::not_found("viewing", viewing.id))?;

        if let Some((user_id, kind)) = notify {
            self.market
                .notifications()
                .notify(
                    user_id,
                    kind,
                    kind.label(),
                    format!(
                        "The viewing on {} is now {}.",
                        viewing.scheduled_for,
                        next.label().to_lowercase()
                    ),
                )
                .await;
        }
        Ok(updated)
    }
}
