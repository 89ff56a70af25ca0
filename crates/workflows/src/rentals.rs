//! Occupied rooms.

use marketplace::{
    fetch_all, fetch_one, update_record, Date, LinkierError, NotificationKind, Profile, ProfileId,
    Property, PropertyId, Query, Rental, RentalId, RentalStatus,
};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::guard::{require_landlord, require_self, require_transition};
use crate::Marketplace;

/// Rental operations.
pub struct Rentals<'a> {
    market: &'a Marketplace,
}

impl<'a> Rentals<'a> {
    pub(crate) fn new(market: &'a Marketplace) -> Self {
        Self { market }
    }

    pub async fn rental(&self, id: RentalId) -> Result<Rental, LinkierError> {
        fetch_one::<Rental>(self.market.store(), id)
            .await?
            .ok_or_else(|| LinkierError::not_found("rental", id))
    }

    pub async fn for_student(&self, student_id: ProfileId) -> Result<Vec<Rental>, LinkierError> {
        self.list(Query::new().eq("student_id", json!(student_id)))
            .await
    }

    pub async fn for_landlord(&self, landlord_id: ProfileId) -> Result<Vec<Rental>, LinkierError> {
        self.list(Query::new().eq("landlord_id", json!(landlord_id)))
            .await
    }

    pub async fn for_property(&self, property_id: PropertyId) -> Result<Vec<Rental>, LinkierError> {
        self.list(Query::new().eq("property_id", json!(property_id)))
            .await
    }

    /// Ends an active rental on `end_date` and frees its room.
    ///
    /// The rental and the property counter are two separate writes. If the
    /// second one fails the rental is still ended and the error is returned
    /// so the landlord can correct availability by hand.
    #[instrument(skip_all, fields(rental_id = %id))]
    pub async fn end_rental(
        &self,
        actor: &Profile,
        id: RentalId,
        end_date: Date,
    ) -> Result<Rental, LinkierError> {
        require_landlord(actor, "end rentals")?;
        let rental = self.rental(id).await?;
        require_self(actor, rental.landlord_id, "rental")?;
        require_transition(
            "rental",
            rental.status.as_str(),
            RentalStatus::Ended.as_str(),
            rental.status.can_transition_to(RentalStatus::Ended),
        )?;
        if end_date < rental.start_date {
            return Err(LinkierError::validation(
                "end date",
                "must not be before the start date",
            ));
        }

        let ended = update_record::<Rental>(
            self.market.store(),
            id,
            json!({ "status": RentalStatus::Ended, "end_date": end_date }),
        )
        .await?
        .ok_or_else(|| LinkierError::not_found("rental", id))?;

        let property = self.market.listings().property(rental.property_id).await?;
        let available = (property.available_rooms + 1).min(property.total_rooms);
        if available == property.available_rooms {
            warn!(property_id = %property.id, "Room counter already at total");
        }
        update_record::<Property>(
            self.market.store(),
            property.id,
            json!({ "available_rooms": available, "is_available": true }),
        )
        .await?;
        info!(room = rental.room_number, "Rental ended, room freed");

        self.market
            .notifications()
            .notify(
                rental.student_id,
                NotificationKind::RentalEnded,
                NotificationKind::RentalEnded.label(),
                format!(
                    "Your rental of room {} in '{}' ends on {end_date}.",
                    rental.room_number, property.title
                ),
            )
            .await;
        Ok(ended)
    }

    async fn list(&self, query: Query) -> Result<Vec<Rental>, LinkierError> {
        Ok(fetch_all(self.market.store(), &query.order_desc("start_date")).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{days_from_today, Fixture};

    async fn rented(fx: &Fixture) -> (Profile, Profile, Rental) {
        let owner = fx.landlord("owner@rent.be").await;
        let ana = fx.student("ana@uni.be").await;
        let property = fx.property(&owner, 1).await;
        let request = fx
            .market
            .requests()
            .submit(&ana, property.id, days_from_today(0), None)
            .await
            .unwrap();
        let rental = fx.market.requests().accept(&owner, request.id).await.unwrap();
        (owner, ana, rental)
    }

    #[tokio::test]
    async fn ending_a_rental_frees_the_room() {
        let fx = Fixture::new();
        let (owner, ana, rental) = rented(&fx).await;
        let rentals = fx.market.rentals();

        assert_eq!(rentals.for_student(ana.id).await.unwrap().len(), 1);
        assert_eq!(rentals.for_landlord(owner.id).await.unwrap().len(), 1);

        let ended = rentals
            .end_rental(&owner, rental.id, days_from_today(30))
            .await
            .unwrap();
        assert_eq!(ended.status, RentalStatus::Ended);
        assert_eq!(ended.end_date, Some(days_from_today(30)));

        let property = fx.market.listings().property(rental.property_id).await.unwrap();
        assert_eq!(property.available_rooms, 1);
        assert!(property.is_available);

        assert!(matches!(
            rentals.end_rental(&owner, rental.id, days_from_today(30)).await,
            Err(LinkierError::InvalidTransition { from: "ended", .. })
        ));
        let feed = fx.market.notifications().for_user(&ana, false).await.unwrap();
        assert!(feed.iter().any(|n| n.kind == NotificationKind::RentalEnded));
    }

    #[tokio::test]
    async fn end_date_and_ownership_are_checked() {
        let fx = Fixture::new();
        let (_, ana, rental) = rented(&fx).await;
        let other = fx.landlord("other@rent.be").await;
        let rentals = fx.market.rentals();

        assert!(matches!(
            rentals.end_rental(&ana, rental.id, days_from_today(5)).await,
            Err(LinkierError::Forbidden { .. })
        ));
        assert!(matches!(
            rentals.end_rental(&other, rental.id, days_from_today(5)).await,
            Err(LinkierError::Forbidden { .. })
        ));
        let owner = fx
            .market
            .accounts()
            .profile(rental.landlord_id)
            .await
            .unwrap();
        assert!(matches!(
            rentals.end_rental(&owner, rental.id, days_from_today(-1)).await,
            Err(LinkierError::Validation { field: "end date", .. })
        ));
    }
}
