//! Tenant complaints.

use marketplace::{
    fetch_all, fetch_one, insert_record, update_record, Complaint, ComplaintCategory, ComplaintId,
    ComplaintPriority, ComplaintStatus, LinkierError, NewComplaint, NotificationKind, Profile,
    ProfileId, Query, RentalId, RentalStatus, Timestamp,
};
use serde_json::{json, Map, Value};
use tracing::{info, instrument};

use crate::guard::{
    optional_text, require_landlord, require_self, require_student, require_transition,
    required_text,
};
use crate::{display_name, Marketplace};

const MAX_TITLE_CHARS: usize = 120;
const MAX_DESCRIPTION_CHARS: usize = 4000;

/// A complaint as filed by a tenant.
#[derive(Debug, Clone)]
pub struct ComplaintDraft {
    pub rental_id: RentalId,
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: ComplaintPriority,
}

/// Complaint operations.
pub struct Complaints<'a> {
    market: &'a Marketplace,
}

impl<'a> Complaints<'a> {
    pub(crate) fn new(market: &'a Marketplace) -> Self {
        Self { market }
    }

    /// Files a complaint about an active rental the actor holds.
    #[instrument(skip_all, fields(student_id = %actor.id, rental_id = %draft.rental_id))]
    pub async fn file(
        &self,
        actor: &Profile,
        draft: ComplaintDraft,
    ) -> Result<Complaint, LinkierError> {
        require_student(actor, "file complaints")?;
        let title = required_text("title", &draft.title, MAX_TITLE_CHARS)?;
        let description = required_text("description", &draft.description, MAX_DESCRIPTION_CHARS)?;

        let rental = self.market.rentals().rental(draft.rental_id).await?;
        require_self(actor, rental.student_id, "rental")?;
        if rental.status != RentalStatus::Active {
            return Err(LinkierError::validation(
                "rental",
                "complaints can only be filed on an active rental",
            ));
        }

        let complaint: Complaint = insert_record(
            self.market.store(),
            &NewComplaint {
                rental_id: rental.id,
                property_id: rental.property_id,
                student_id: actor.id,
                landlord_id: rental.landlord_id,
                title,
                description,
                category: draft.category,
                priority: draft.priority,
                status: ComplaintStatus::Open,
            },
        )
        .await?;
        info!(complaint_id = %complaint.id, priority = %complaint.priority, "Complaint filed");

        self.market
            .notifications()
            .notify(
                rental.landlord_id,
                NotificationKind::ComplaintFiled,
                format!("{} complaint: {}", complaint.priority, complaint.title),
                format!(
                    "{} reported a {} issue for room {}.",
                    display_name(actor),
                    complaint.category.label().to_lowercase(),
                    rental.room_number
                ),
            )
            .await;
        Ok(complaint)
    }

    /// Moves a complaint through its lifecycle, optionally with a reply.
    ///
    /// `resolved_at` is stamped when the complaint becomes resolved and
    /// cleared when it is re-opened.
    #[instrument(skip_all, fields(complaint_id = %id, to = %status.as_str()))]
    pub async fn update_status(
        &self,
        actor: &Profile,
        id: ComplaintId,
        status: ComplaintStatus,
        response: Option<&str>,
    ) -> Result<Complaint, LinkierError> {
        require_landlord(actor, "handle complaints")?;
        let complaint = self.complaint(id).await?;
        require_self(actor, complaint.landlord_id, "complaint")?;
        require_transition(
            "complaint",
            complaint.status.as_str(),
            status.as_str(),
            complaint.status.can_transition_to(status),
        )?;

        let mut patch = Map::new();
        patch.insert("status".into(), json!(status));
        if let Some(response) = optional_text("response", response, MAX_DESCRIPTION_CHARS)? {
            patch.insert("landlord_response".into(), json!(response));
        }
        match status {
            ComplaintStatus::Resolved => {
                patch.insert("resolved_at".into(), json!(Timestamp::now()));
            }
            ComplaintStatus::InProgress => {
                patch.insert("resolved_at".into(), Value::Null);
            }
            _ => {}
        }

        let updated = update_record::<Complaint>(self.market.store(), id, Value::Object(patch))
            .await?
            .ok_or_else(|| LinkierError::not_found("complaint", id))?;

        self.market
            .notifications()
            .notify(
                complaint.student_id,
                NotificationKind::ComplaintUpdated,
                NotificationKind::ComplaintUpdated.label(),
                format!("'{}' is now {}.", complaint.title, status.label().to_lowercase()),
            )
            .await;
        Ok(updated)
    }

    pub async fn complaint(&self, id: ComplaintId) -> Result<Complaint, LinkierError> {
        fetch_one::<Complaint>(self.market.store(), id)
            .await?
            .ok_or_else(|| LinkierError::not_found("complaint", id))
    }

    pub async fn for_student(&self, student_id: ProfileId) -> Result<Vec<Complaint>, LinkierError> {
        let query = Query::new()
            .eq("student_id", json!(student_id))
            .order_desc("created_at");
        Ok(fetch_all(self.market.store(), &query).await?)
    }

    /// Complaints addressed to a landlord, optionally of one status.
    pub async fn for_landlord(
        &self,
        landlord_id: ProfileId,
        status: Option<ComplaintStatus>,
    ) -> Result<Vec<Complaint>, LinkierError> {
        let mut query = Query::new().eq("landlord_id", json!(landlord_id));
        if let Some(status) = status {
            query = query.eq("status", json!(status));
        }
        Ok(fetch_all(self.market.store(), &query.order_desc("created_at")).await?)
    }
}
