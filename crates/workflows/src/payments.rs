//! Rent payments.
//!
//! A payment row is one rent period owed on a rental. Landlords record what
//! is due and settle it; students only read their rows. No money moves
//! through the marketplace.

use marketplace::{
    fetch_all, fetch_one, insert_record, update_record, update_where, Date, Filter, LinkierError,
    Money, NewPayment, NotificationKind, Payment, PaymentId, PaymentMethod, PaymentStatus,
    Profile, ProfileId, Query, RentalId, RentalStatus, StoreError, Timestamp,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::guard::{require_landlord, require_self, require_transition};
use crate::Marketplace;

/// Totals over a set of payments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaymentSummary {
    pub paid: Money,
    /// Pending plus late.
    pub outstanding: Money,
    pub late_count: u64,
}

impl PaymentSummary {
    pub fn of(payments: &[Payment]) -> Self {
        payments.iter().fold(Self::default(), |mut summary, payment| {
            match payment.status {
                PaymentStatus::Paid => summary.paid += payment.amount,
                PaymentStatus::Pending => summary.outstanding += payment.amount,
                PaymentStatus::Late => {
                    summary.outstanding += payment.amount;
                    summary.late_count += 1;
                }
                PaymentStatus::Cancelled => {}
            }
            summary
        })
    }
}

/// Payment operations.
pub struct Payments<'a> {
    market: &'a Marketplace,
}

impl<'a> Payments<'a> {
    pub(crate) fn new(market: &'a Marketplace) -> Self {
        Self { market }
    }

    /// Records the rent owed for the period starting `period_start`.
    ///
    /// `amount` defaults to the rental's monthly rent. A rental has at most
    /// one payment per period.
    #[instrument(skip_all, fields(%rental_id, %period_start))]
    pub async fn record_due(
        &self,
        actor: &Profile,
        rental_id: RentalId,
        period_start: Date,
        due_date: Date,
        amount: Option<Money>,
    ) -> Result<Payment, LinkierError> {
        require_landlord(actor, "record payments")?;
        let rental = self.market.rentals().rental(rental_id).await?;
        require_self(actor, rental.landlord_id, "rental")?;
        if rental.status != RentalStatus::Active {
            return Err(LinkierError::validation("rental", "rental is no longer active"));
        }
        if due_date < period_start {
            return Err(LinkierError::validation(
                "due date",
                "must not be before the period start",
            ));
        }
        let amount = amount.unwrap_or(rental.monthly_rent);
        if amount.is_zero() {
            return Err(LinkierError::validation("amount", "must be greater than zero"));
        }

        let row = NewPayment {
            rental_id,
            student_id: rental.student_id,
            landlord_id: rental.landlord_id,
            amount,
            period_start,
            due_date,
            status: PaymentStatus::Pending,
        };
        let payment: Payment = match insert_record(self.market.store(), &row).await {
            Ok(payment) => payment,
            Err(StoreError::Conflict { .. }) => {
                return Err(LinkierError::validation(
                    "period",
                    format!("rent for the period starting {period_start} is already recorded"),
                ));
            }
            Err(err) => return Err(err.into()),
        };
        info!(payment_id = %payment.id, %amount, "Rent due recorded");

        self.market
            .notifications()
            .notify(
                rental.student_id,
                NotificationKind::PaymentDue,
                NotificationKind::PaymentDue.label(),
                format!("{amount} is due on {due_date} for room {}.", rental.room_number),
            )
            .await;
        Ok(payment)
    }

    /// Settles a pending or late payment.
    pub async fn mark_paid(
        &self,
        actor: &Profile,
        id: PaymentId,
        method: PaymentMethod,
    ) -> Result<Payment, LinkierError> {
        let payment = self.owned(actor, id).await?;
        let paid = self
            .advance(
                &payment,
                PaymentStatus::Paid,
                json!({
                    "status": PaymentStatus::Paid,
                    "paid_at": Timestamp::now(),
                    "method": method,
                }),
            )
            .await?;
        self.market
            .notifications()
            .notify(
                payment.student_id,
                NotificationKind::PaymentRecorded,
                NotificationKind::PaymentRecorded.label(),
                format!(
                    "Your payment of {} for {} was received ({}).",
                    payment.amount,
                    payment.period_start,
                    method.label().to_lowercase()
                ),
            )
            .await;
        Ok(paid)
    }

    pub async fn mark_late(&self, actor: &Profile, id: PaymentId) -> Result<Payment, LinkierError> {
        let payment = self.owned(actor, id).await?;
        self.advance(
            &payment,
            PaymentStatus::Late,
            json!({ "status": PaymentStatus::Late }),
        )
        .await
    }

    pub async fn cancel(&self, actor: &Profile, id: PaymentId) -> Result<Payment, LinkierError> {
        let payment = self.owned(actor, id).await?;
        self.advance(
            &payment,
            PaymentStatus::Cancelled,
            json!({ "status": PaymentStatus::Cancelled }),
        )
        .await
    }

    /// Marks the landlord's pending payments due before `today` as late.
    #[instrument(skip_all, fields(landlord_id = %actor.id, %today))]
    pub async fn flag_overdue(&self, actor: &Profile, today: Date) -> Result<u64, LinkierError> {
        require_landlord(actor, "flag overdue payments")?;
        let filters = [
            Filter::Eq("landlord_id".into(), json!(actor.id)),
            Filter::Eq("status".into(), json!(PaymentStatus::Pending)),
            Filter::Lt("due_date".into(), json!(today)),
        ];
        let flagged = update_where::<Payment>(
            self.market.store(),
            &filters,
            json!({ "status": PaymentStatus::Late }),
        )
        .await?;
        if !flagged.is_empty() {
            info!(count = flagged.len(), "Payments flagged overdue");
        }
        Ok(flagged.len() as u64)
    }

    pub async fn payment(&self, id: PaymentId) -> Result<Payment, LinkierError> {
        fetch_one::<Payment>(self.market.store(), id)
            .await?
            .ok_or_else(|| LinkierError::not_found("payment", id))
    }

    pub async fn for_rental(&self, rental_id: RentalId) -> Result<Vec<Payment>, LinkierError> {
        self.list(Query::new().eq("rental_id", json!(rental_id)))
            .await
    }

    pub async fn for_student(&self, student_id: ProfileId) -> Result<Vec<Payment>, LinkierError> {
        self.list(Query::new().eq("student_id", json!(student_id)))
            .await
    }

    pub async fn for_landlord(&self, landlord_id: ProfileId) -> Result<Vec<Payment>, LinkierError> {
        self.list(Query::new().eq("landlord_id", json!(landlord_id)))
            .await
    }

    /// Totals over `payments`.
    pub fn summary(&self, payments: &[Payment]) -> PaymentSummary {
        PaymentSummary::of(payments)
    }

    async fn list(&self, query: Query) -> Result<Vec<Payment>, LinkierError> {
        Ok(fetch_all(self.market.store(), &query.order_desc("due_date")).await?)
    }

    async fn owned(&self, actor: &Profile, id: PaymentId) -> Result<Payment, LinkierError> {
        require_landlord(actor, "manage payments")?;
        let payment = self.payment(id).await?;
        require_self(actor, payment.landlord_id, "payment")?;
        Ok(payment)
    }

    async fn advance(
        &self,
        payment: &Payment,
        next: PaymentStatus,
        patch: Value,
    ) -> Result<Payment, LinkierError> {
        require_transition(
            "payment",
            payment.status.as_str(),
            next.as_str(),
            payment.status.can_transition_to(next),
        )?;
        update_record::<Payment>(self.market.store(), payment.id, patch)
            .await?
            .ok_or_else(|| LinkierError::not_found("payment", payment.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{days_from_today, Fixture};
    use marketplace::Rental;

    async fn tenancy(fx: &Fixture) -> (Profile, Profile, Rental) {
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
    async fn due_defaults_to_rent_and_is_unique_per_period() {
        let fx = Fixture::new();
        let (owner, ana, rental) = tenancy(&fx).await;
        let payments = fx.market.payments();

        let start = days_from_today(0);
        let due = payments
            .record_due(&owner, rental.id, start, days_from_today(5), None)
            .await
            .unwrap();
        assert_eq!(due.amount, rental.monthly_rent);
        assert_eq!(due.status, PaymentStatus::Pending);
        assert_eq!(due.student_id, ana.id);

        assert!(matches!(
            payments
                .record_due(&owner, rental.id, start, days_from_today(5), None)
                .await,
            Err(LinkierError::Validation { field: "period", .. })
        ));

        let feed = fx.market.notifications().for_user(&ana, false).await.unwrap();
        assert!(feed.iter().any(|n| n.kind == NotificationKind::PaymentDue));
    }

    #[tokio::test]
    async fn settling_and_summaries() {
        let fx = Fixture::new();
        let (owner, ana, rental) = tenancy(&fx).await;
        let payments = fx.market.payments();

        let first = payments
            .record_due(&owner, rental.id, days_from_today(-60), days_from_today(-55), None)
            .await
            .unwrap();
        let second = payments
            .record_due(
                &owner,
                rental.id,
                days_from_today(-30),
                days_from_today(-25),
                Money::from_cents(50_000),
            )
            .await
            .unwrap();
        let third = payments
            .record_due(&owner, rental.id, days_from_today(0), days_from_today(5), None)
            .await
            .unwrap();

        let paid = payments
            .mark_paid(&owner, first.id, PaymentMethod::BankTransfer)
            .await
            .unwrap();
        assert!(paid.paid_at.is_some());
        assert_eq!(paid.method, Some(PaymentMethod::BankTransfer));

        assert_eq!(payments.flag_overdue(&owner, days_from_today(0)).await.unwrap(), 1);
        assert_eq!(payments.payment(second.id).await.unwrap().status, PaymentStatus::Late);
        assert_eq!(payments.payment(third.id).await.unwrap().status, PaymentStatus::Pending);

        let rows = payments.for_student(ana.id).await.unwrap();
        let summary = payments.summary(&rows);
        assert_eq!(summary.paid, rental.monthly_rent);
        assert_eq!(
            summary.outstanding.as_cents(),
            50_000 + rental.monthly_rent.as_cents()
        );
        assert_eq!(summary.late_count, 1);

        assert!(matches!(
            payments.mark_late(&owner, first.id).await,
            Err(LinkierError::InvalidTransition { from: "paid", .. })
        ));
        payments.cancel(&owner, third.id).await.unwrap();
        let remaining = payments.for_rental(rental.id).await.unwrap();
        assert_eq!(payments.summary(&remaining).outstanding.as_cents(), 50_000);
    }

    #[tokio::test]
    async fn only_the_landlord_of_the_rental_records_payments() {
        let fx = Fixture::new();
        let (_, ana, rental) = tenancy(&fx).await;
        let other = fx.landlord("other@rent.be").await;
        let payments = fx.market.payments();

        assert!(matches!(
            payments
                .record_due(&ana, rental.id, days_from_today(0), days_from_today(1), None)
                .await,
            Err(LinkierError::Forbidden { .. })
        ));
        assert!(matches!(
            payments
                .record_due(&other, rental.id, days_from_today(0), days_from_today(1), None)
                .await,
            Err(LinkierError::Forbidden { .. })
        ));
        assert!(payments.for_landlord(other.id).await.unwrap().is_empty());
    }

    #[test]
    fn summary_ignores_cancelled_rows() {
        let row = |status, cents| Payment {
            id: PaymentId::new_random(),
            rental_id: RentalId::new_random(),
            student_id: ProfileId::new_random(),
            landlord_id: ProfileId::new_random(),
            amount: Money::from_cents(cents).unwrap(),
            period_start: days_from_today(0),
            due_date: days_from_today(0),
            paid_at: None,
            method: None,
            status,
            created_at: Timestamp::now(),
        };
        let summary = PaymentSummary::of(&[
            row(PaymentStatus::Paid, 100),
            row(PaymentStatus::Cancelled, 1_000),
            row(PaymentStatus::Late, 10),
            row(PaymentStatus::Pending, 1),
        ]);
        assert_eq!(summary.paid.as_cents(), 100);
        assert_eq!(summary.outstanding.as_cents(), 11);
        assert_eq!(summary.late_count, 1);
    }
}
