//! Rental requests: a student asks for a room, the landlord answers.

use marketplace::{
    call_procedure, fetch_all, fetch_one, insert_record, update_record, Date, LinkierError,
    NewRentalRequest, NotificationKind, Profile, ProfileId, PropertyId, Query, Rental,
    RentalRequest, RentalRequestId, RequestStatus, Timestamp, ACCEPT_RENTAL_REQUEST,
};
use serde_json::json;
use tracing::{info, instrument};

use crate::guard::{
    optional_text, require_landlord, require_self, require_student, require_transition,
};
use crate::{display_name, Marketplace};

const MAX_MESSAGE_CHARS: usize = 2000;

/// Rental request operations.
pub struct RentalRequests<'a> {
    market: &'a Marketplace,
}

impl<'a> RentalRequests<'a> {
    pub(crate) fn new(market: &'a Marketplace) -> Self {
        Self { market }
    }

    /// Asks the landlord for a room in `property_id`.
    #[instrument(skip_all, fields(student_id = %actor.id, %property_id))]
    pub async fn submit(
        &self,
        actor: &Profile,
        property_id: PropertyId,
        desired_move_in: Date,
        message: Option<&str>,
    ) -> Result<RentalRequest, LinkierError> {
        require_student(actor, "request rentals")?;
        let message = optional_text("message", message, MAX_MESSAGE_CHARS)?;
        if desired_move_in < Timestamp::now().date() {
            return Err(LinkierError::validation(
                "move-in date",
                "must not be in the past",
            ));
        }

        let property = self.market.listings().property(property_id).await?;
        if !property.has_free_room() {
            return Err(LinkierError::NoRoomsAvailable);
        }

        let open = Query::new()
            .eq("property_id", json!(property_id))
            .eq("student_id", json!(actor.id))
            .eq("status", json!(RequestStatus::Pending))
            .limit(1);
        if !fetch_all::<RentalRequest>(self.market.store(), &open)
            .await?
            .is_empty()
        {
            return Err(LinkierError::validation(
                "request",
                "you already have a pending request for this property",
            ));
        }

        let request: RentalRequest = insert_record(
            self.market.store(),
            &NewRentalRequest {
                property_id,
                student_id: actor.id,
                landlord_id: property.landlord_id,
                message,
                desired_move_in,
                status: RequestStatus::Pending,
            },
        )
        .await?;
        info!(request_id = %request.id, "Rental request submitted");

        self.market
            .notifications()
            .notify(
                property.landlord_id,
                NotificationKind::RentalRequestReceived,
                NotificationKind::RentalRequestReceived.label(),
                format!(
                    "{} would like to rent a room in '{}' from {desired_move_in}.",
                    display_name(actor),
                    property.title
                ),
            )
            .await;
        Ok(request)
    }

    /// Accepts a pending request, turning it into an active rental.
    ///
    /// Room assignment and the room counter update happen atomically in the
    /// data store's `accept_rental_request` procedure.
    #[instrument(skip_all, fields(landlord_id = %actor.id, request_id = %id))]
    pub async fn accept(
        &self,
        actor: &Profile,
        id: RentalRequestId,
    ) -> Result<Rental, LinkierError> {
        let request = self.landlord_request(actor, id).await?;
        require_transition(
            "rental request",
            request.status.as_str(),
            RequestStatus::Accepted.as_str(),
            request.status.can_transition_to(RequestStatus::Accepted),
        )?;

        let rental: Rental = call_procedure(
            self.market.store(),
            ACCEPT_RENTAL_REQUEST,
            json!({ "request_id": id }),
        )
        .await?;
        info!(rental_id = %rental.id, room = rental.room_number, "Rental request accepted");

        self.market
            .notifications()
            .notify(
                request.student_id,
                NotificationKind::RentalRequestAccepted,
                NotificationKind::RentalRequestAccepted.label(),
                format!(
                    "Your request was accepted. You have room {} from {}.",
                    rental.room_number, rental.start_date
                ),
            )
            .await;
        Ok(rental)
    }

    /// Declines a pending request.
    #[instrument(skip_all, fields(request_id = %id))]
    pub async fn reject(
        &self,
        actor: &Profile,
        id: RentalRequestId,
    ) -> Result<RentalRequest, LinkierError> {
        let request = self.landlord_request(actor, id).await?;
        let rejected = self.respond(&request, RequestStatus::Rejected).await?;
        self.market
            .notifications()
            .notify(
                request.student_id,
                NotificationKind::RentalRequestRejected,
                NotificationKind::RentalRequestRejected.label(),
                "Your rental request was declined by the landlord.",
            )
            .await;
        Ok(rejected)
    }

    /// Withdraws the actor's own pending request.
    #[instrument(skip_all, fields(request_id = %id))]
    pub async fn cancel(
        &self,
        actor: &Profile,
        id: RentalRequestId,
    ) -> Result<RentalRequest, LinkierError> {
        let request = self.request(id).await?;
        require_self(actor, request.student_id, "rental request")?;
        let cancelled = self.respond(&request, RequestStatus::Cancelled).await?;
        self.market
            .notifications()
            .notify(
                request.landlord_id,
                NotificationKind::RentalRequestCancelled,
                NotificationKind::RentalRequestCancelled.label(),
                format!("{} withdrew their rental request.", display_name(actor)),
            )
            .await;
        Ok(cancelled)
    }

    pub async fn request(&self, id: RentalRequestId) -> Result<RentalRequest, LinkierError> {
        fetch_one::<RentalRequest>(self.market.store(), id)
            .await?
            .ok_or_else(|| LinkierError::not_found("rental request", id))
    }

    /// A student's requests, newest first.
    pub async fn for_student(
        &self,
        student_id: ProfileId,
    ) -> Result<Vec<RentalRequest>, LinkierError> {
        let query = Query::new()
            .eq("student_id", json!(student_id))
            .order_desc("created_at");
        Ok(fetch_all(self.market.store(), &query).await?)
    }

    /// Requests addressed to a landlord, optionally of one status.
    pub async fn for_landlord(
        &self,
        landlord_id: ProfileId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<RentalRequest>, LinkierError> {
        let mut query = Query::new().eq("landlord_id", json!(landlord_id));
        if let Some(status) = status {
            query = query.eq("status", json!(status));
        }
        Ok(fetch_all(self.market.store(), &query.order_desc("created_at")).await?)
    }

    async fn landlord_request(
        &self,
        actor: &Profile,
        id: RentalRequestId,
    ) -> Result<RentalRequest, LinkierError> {
        require_landlord(actor, "answer rental requests")?;
        let request = self.request(id).await?;
        require_self(actor, request.landlord_id, "rental request")?;
        Ok(request)
    }

    async fn respond(
        &self,
        request: &RentalRequest,
        next: RequestStatus,
    ) -> Result<RentalRequest, LinkierError> {
        require_transition(
            "rental request",
            request.status.as_str(),
            next.as_str(),
            request.status.can_transition_to(next),
        )?;
        update_record::<RentalRequest>(
            self.market.store(),
            request.id,
            json!({ "status": next, "responded_at": Timestamp::now() }),
        )
        .await?
        .ok_or_else(|| LinkierError::not_found("rental request", request.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{days_from_today, Fixture};
    use marketplace::{Notification, RentalStatus};

    #[tokio::test]
    async fn accepting_assigns_rooms_until_full() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let ana = fx.student("ana@uni.be").await;
        let bob = fx.student("bob@uni.be").await;
        let property = fx.property(&owner, 2).await;
        let requests = fx.market.requests();

        let first = requests
            .submit(&ana, property.id, days_from_today(10), Some("Hello!"))
            .await
            .unwrap();
        let second = requests
            .submit(&bob, property.id, days_from_today(20), None)
            .await
            .unwrap();

        let rental = requests.accept(&owner, first.id).await.unwrap();
        assert_eq!(rental.room_number, 1);
        assert_eq!(rental.status, RentalStatus::Active);
        assert_eq!(rental.start_date, days_from_today(10));
        assert_eq!(rental.monthly_rent, property.monthly_rent);

        let rental = requests.accept(&owner, second.id).await.unwrap();
        assert_eq!(rental.room_number, 2);

        let full = fx.market.listings().property(property.id).await.unwrap();
        assert_eq!(full.available_rooms, 0);
        assert!(!full.is_available);
        assert_eq!(
            requests.request(first.id).await.unwrap().status,
            RequestStatus::Accepted
        );

        let carl = fx.student("carl@uni.be").await;
        assert!(matches!(
            requests.submit(&carl, property.id, days_from_today(5), None).await,
            Err(LinkierError::NoRoomsAvailable)
        ));
    }

    #[tokio::test]
    async fn a_request_can_only_be_answered_once() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let ana = fx.student("ana@uni.be").await;
        let property = fx.property(&owner, 3).await;
        let requests = fx.market.requests();

        let request = requests
            .submit(&ana, property.id, days_from_today(1), None)
            .await
            .unwrap();
        let rejected = requests.reject(&owner, request.id).await.unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert!(rejected.responded_at.is_some());

        assert!(matches!(
            requests.accept(&owner, request.id).await,
            Err(LinkierError::InvalidTransition { from: "rejected", to: "accepted", .. })
        ));
        assert!(matches!(
            requests.cancel(&ana, request.id).await,
            Err(LinkierError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn submission_rules() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let ana = fx.student("ana@uni.be").await;
        let property = fx.property(&owner, 1).await;
        let requests = fx.market.requests();

        assert!(matches!(
            requests.submit(&owner, property.id, days_from_today(1), None).await,
            Err(LinkierError::Forbidden { .. })
        ));
        assert!(matches!(
            requests.submit(&ana, property.id, days_from_today(-1), None).await,
            Err(LinkierError::Validation { field: "move-in date", .. })
        ));

        requests
            .submit(&ana, property.id, days_from_today(1), None)
            .await
            .unwrap();
        assert!(matches!(
            requests.submit(&ana, property.id, days_from_today(2), None).await,
            Err(LinkierError::Validation { field: "request", .. })
        ));

        fx.market
            .listings()
            .set_availability(&owner, property.id, false)
            .await
            .unwrap();
        let bob = fx.student("bob@uni.be").await;
        assert!(matches!(
            requests.submit(&bob, property.id, days_from_today(1), None).await,
            Err(LinkierError::NoRoomsAvailable)
        ));
    }

    #[tokio::test]
    async fn only_the_owning_landlord_answers_and_only_the_student_cancels() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let other = fx.landlord("other@rent.be").await;
        let ana = fx.student("ana@uni.be").await;
        let bob = fx.student("bob@uni.be").await;
        let property = fx.property(&owner, 1).await;
        let requests = fx.market.requests();

        let request = requests
            .submit(&ana, property.id, days_from_today(3), None)
            .await
            .unwrap();
        assert!(matches!(
            requests.accept(&other, request.id).await,
            Err(LinkierError::Forbidden { .. })
        ));
        assert!(matches!(
            requests.cancel(&bob, request.id).await,
            Err(LinkierError::Forbidden { .. })
        ));

        let cancelled = requests.cancel(&ana, request.id).await.unwrap();
        assert_eq!(cancelled.status, RequestStatus::Cancelled);
        assert_eq!(
            requests
                .for_landlord(owner.id, Some(RequestStatus::Pending))
                .await
                .unwrap()
                .len(),
            0
        );
        assert_eq!(requests.for_student(ana.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn both_sides_are_notified() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let ana = fx.student("ana@uni.be").await;
        let property = fx.property(&owner, 1).await;
        let requests = fx.market.requests();

        let request = requests
            .submit(&ana, property.id, days_from_today(3), None)
            .await
            .unwrap();
        requests.accept(&owner, request.id).await.unwrap();

        let kinds = |feed: Vec<Notification>| feed.into_iter().map(|n| n.kind).collect::<Vec<_>>();
        let feed = fx.market.notifications();
        assert_eq!(
            kinds(feed.for_user(&owner, false).await.unwrap()),
            vec![NotificationKind::RentalRequestReceived]
        );
        let student_feed = feed.for_user(&ana, false).await.unwrap();
        assert_eq!(kinds(student_feed.clone()), vec![NotificationKind::RentalRequestAccepted]);
        assert!(student_feed[0].body.contains("room 1"));
    }
}
