//! Renovation works scheduled on a property.

use marketplace::{
    fetch_all, fetch_one, insert_record, update_record, Date, LinkierError, Money,
    NewRenovation, Profile, ProfileId, PropertyId, Query, Renovation, RenovationId,
    RenovationStatus, Timestamp,
};
use serde_json::{json, Map, Value};
use tracing::{info, instrument};

use crate::guard::{require_self, require_transition, required_text};
use crate::Marketplace;

const MAX_TITLE_CHARS: usize = 120;

#[derive(Debug, Clone)]
pub struct RenovationDraft {
    pub property_id: PropertyId,
    pub title: String,
    pub description: String,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub cost: Option<Money>,
}

/// Renovation operations.
pub struct Renovations<'a> {
    market: &'a Marketplace,
}

impl<'a> Renovations<'a> {
    pub(crate) fn new(market: &'a Marketplace) -> Self {
        Self { market }
    }

    /// Plans works on a property the actor owns.
    #[instrument(skip_all, fields(property_id = %draft.property_id))]
    pub async fn schedule(
        &self,
        actor: &Profile,
        draft: RenovationDraft,
    ) -> Result<Renovation, LinkierError> {
        let property = self.market.listings().owned(actor, draft.property_id).await?;
        let title = required_text("title", &draft.title, MAX_TITLE_CHARS)?;
        if draft.end_date.is_some_and(|end| end < draft.start_date) {
            return Err(LinkierError::validation(
                "end date",
                "must not be before the start date",
            ));
        }

        let renovation: Renovation = insert_record(
            self.market.store(),
            &NewRenovation {
                property_id: property.id,
                landlord_id: actor.id,
                title,
                description: draft.description.trim().to_owned(),
                start_date: draft.start_date,
                end_date: draft.end_date,
                cost: draft.cost,
                status: RenovationStatus::Planned,
            },
        )
        .await?;
        info!(renovation_id = %renovation.id, "Renovation scheduled");
        Ok(renovation)
    }

    /// Moves a renovation through its lifecycle. Completing work without a
    /// planned end date records today as the end.
    #[instrument(skip_all, fields(renovation_id = %id, to = %status.as_str()))]
    pub async fn update_status(
        &self,
        actor: &Profile,
        id: RenovationId,
        status: RenovationStatus,
    ) -> Result<Renovation, LinkierError> {
        let renovation = fetch_one::<Renovation>(self.market.store(), id)
            .await?
            .ok_or_else(|| LinkierError::not_found("renovation", id))?;
        require_self(actor, renovation.landlord_id, "renovation")?;
        require_transition(
            "renovation",
            renovation.status.as_str(),
            status.as_str(),
            renovation.status.can_transition_to(status),
        )?;

        let mut patch = Map::new();
        patch.insert("status".into(), json!(status));
        if status == RenovationStatus::Completed && renovation.end_date.is_none() {
            patch.insert("end_date".into(), json!(Timestamp::now().date()));
        }
        update_record::<Renovation>(self.market.store(), id, Value::Object(patch))
            .await?
            .ok_or_else(|| LinkierError::not_found("renovation", id))
    }

    pub async fn for_property(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<Renovation>, LinkierError> {
        self.list(Query::new().eq("property_id", json!(property_id)))
            .await
    }

    pub async fn for_landlord(
        &self,
        landlord_id: ProfileId,
    ) -> Result<Vec<Renovation>, LinkierError> {
        self.list(Query::new().eq("landlord_id", json!(landlord_id)))
            .await
    }

    async fn list(&self, query: Query) -> Result<Vec<Renovation>, LinkierError> {
        Ok(fetch_all(self.market.store(), &query.order_asc("start_date")).await?)
    }
}
