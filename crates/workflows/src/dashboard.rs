//! Summary counts shown on the landlord and student home screens.

use marketplace::{
    ComplaintStatus, Filter, LinkierError, PaymentStatus, Profile, Query, RentalStatus,
    RequestStatus, Table, Timestamp, ViewingStatus,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::guard::{require_landlord, require_student};
use crate::Marketplace;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LandlordDashboard {
    pub properties: u64,
    /// Free rooms across every listing.
    pub available_rooms: u64,
    pub pending_requests: u64,
    pub upcoming_viewings: u64,
    pub open_complaints: u64,
    pub active_rentals: u64,
    pub outstanding_payments: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StudentDashboard {
    pub pending_requests: u64,
    pub active_rentals: u64,
    pub upcoming_viewings: u64,
    pub open_complaints: u64,
    pub unread_messages: u64,
    pub unread_notifications: u64,
}

/// Dashboard queries.
pub struct Dashboards<'a> {
    market: &'a Marketplace,
}

fn eq(column: &str, value: Value) -> Filter {
    Filter::Eq(column.to_owned(), value)
}

fn upcoming_viewings(owner_column: &str, actor: &Profile) -> [Filter; 3] {
    [
        eq(owner_column, json!(actor.id)),
        Filter::In(
            "status".into(),
            vec![json!(ViewingStatus::Requested), json!(ViewingStatus::Confirmed)],
        ),
        Filter::Gt("scheduled_for".into(), json!(Timestamp::now())),
    ]
}

fn open_complaints(owner_column: &str, actor: &Profile) -> [Filter; 2] {
    [
        eq(owner_column, json!(actor.id)),
        Filter::In(
            "status".into(),
            vec![json!(ComplaintStatus::Open), json!(ComplaintStatus::InProgress)],
        ),
    ]
}

impl<'a> Dashboards<'a> {
    pub(crate) fn new(market: &'a Marketplace) -> Self {
        Self { market }
    }

    pub async fn landlord(&self, actor: &Profile) -> Result<LandlordDashboard, LinkierError> {
        require_landlord(actor, "view the landlord dashboard")?;
        let store = self.market.store();
        let me = json!(actor.id);

        let pending = [eq("landlord_id", me.clone()), eq("status", json!(RequestStatus::Pending))];
        let active = [eq("landlord_id", me.clone()), eq("status", json!(RentalStatus::Active))];
        let outstanding = [
            eq("landlord_id", me.clone()),
            Filter::In(
                "status".into(),
                vec![json!(PaymentStatus::Pending), json!(PaymentStatus::Late)],
            ),
        ];
        let viewings = upcoming_viewings("landlord_id", actor);
        let complaints = open_complaints("landlord_id", actor);
        let properties_query = Query::new().eq("landlord_id", me);

        let (
            properties,
            pending_requests,
            upcoming_viewings,
            open_complaints,
            active_rentals,
            outstanding_payments,
        ) = tokio::try_join!(
            store.select(Table::Properties, &properties_query),
            store.count(Table::RentalRequests, &pending),
            store.count(Table::PropertyViewings, &viewings),
            store.count(Table::Complaints, &complaints),
            store.count(Table::Rentals, &active),
            store.count(Table::Payments, &outstanding),
        )?;

        let available_rooms = properties
            .iter()
            .filter_map(|row| row.get("available_rooms").and_then(Value::as_u64))
            .sum();
        Ok(LandlordDashboard {
            properties: properties.len() as u64,
            available_rooms,
            pending_requests,
            upcoming_viewings,
            open_complaints,
            active_rentals,
            outstanding_payments,
        })
    }

    pub async fn student(&self, actor: &Profile) -> Result<StudentDashboard, LinkierError> {
        require_student(actor, "view the student dashboard")?;
        let store = self.market.store();
        let me = json!(actor.id);

        let pending = [eq("student_id", me.clone()), eq("status", json!(RequestStatus::Pending))];
        let active = [eq("student_id", me.clone()), eq("status", json!(RentalStatus::Active))];
        let messages = [eq("recipient_id", me.clone()), eq("read", json!(false))];
        let notifications = [eq("user_id", me), eq("read", json!(false))];
        let viewings = upcoming_viewings("student_id", actor);
        let complaints = open_complaints("student_id", actor);

        let (
            pending_requests,
            active_rentals,
            upcoming_viewings,
            open_complaints,
            unread_messages,
            unread_notifications,
        ) = tokio::try_join!(
            store.count(Table::RentalRequests, &pending),
            store.count(Table::Rentals, &active),
            store.count(Table::PropertyViewings, &viewings),
            store.count(Table::Complaints, &complaints),
            store.count(Table::Messages, &messages),
            store.count(Table::Notifications, &notifications),
        )?;

        Ok(StudentDashboard {
            pending_requests,
            active_rentals,
            upcoming_viewings,
            open_complaints,
            unread_messages,
            unread_notifications,
        })
    }
}
