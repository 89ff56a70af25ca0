//! Shared value types for the Linkier marketplace domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (amounts are non-negative, statuses only
//! move along their allowed lifecycle) and participate in domain decisions.
//!
//! Every status enum exposes three faces:
//!
//! - `as_str()`: the wire value stored in the data store;
//! - `label()`: the human-readable label shown to users;
//! - `FromStr`: parses the wire value.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Calendar date without time zone, used for move-in, due and period dates.
pub type Date = NaiveDate;

/// A wire value did not name any variant of the target enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    /// Name of the enum being parsed (e.g. `"request status"`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Macro for wire enums.
// Generates: enum with serde renames, ALL, as_str(), label(), Display, FromStr.
// ---------------------------------------------------------------------------
macro_rules! wire_enum {
    (
        $(#[$attr:meta])*
        $name:ident ($kind:literal) {
            $(
                $(#[$vattr:meta])*
                $variant:ident => $wire:literal, $label:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vattr])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the value stored in the data store.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            /// Returns the human-readable label.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalised = s.trim().to_lowercase().replace(['-', ' '], "_");
                match normalised.as_str() {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(ParseEnumError { kind: $kind, value: s.to_owned() }),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Roles and listing attributes
// ---------------------------------------------------------------------------

wire_enum! {
    /// The two account roles. Fixed at sign-up.
    UserRole ("user role") {
        Student => "student", "Student",
        Landlord => "landlord", "Landlord",
    }
}

wire_enum! {
    /// Kind of accommodation offered by a property.
    PropertyKind ("property kind") {
        Apartment => "apartment", "Apartment",
        House => "house", "House",
        Studio => "studio", "Studio",
        SharedRoom => "shared_room", "Shared room",
    }
}

// ---------------------------------------------------------------------------
// Lifecycle statuses
// ---------------------------------------------------------------------------

wire_enum! {
    /// Status of a student's rental request.
    RequestStatus ("request status") {
        Pending => "pending", "Pending",
        Accepted => "accepted", "Accepted",
        Rejected => "rejected", "Rejected",
        Cancelled => "cancelled", "Cancelled",
    }
}

impl RequestStatus {
    /// Returns `true` if a request may move from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted | Self::Rejected | Self::Cancelled)
        )
    }

    /// Returns `true` once the landlord or student has settled the request.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

wire_enum! {
    /// Status of a rental (an occupied room).
    RentalStatus ("rental status") {
        Active => "active", "Active",
        Ended => "ended", "Ended",
        Terminated => "terminated", "Terminated",
    }
}

impl RentalStatus {
    /// Returns `true` if a rental may move from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Active, Self::Ended | Self::Terminated))
    }

    /// Returns `true` once the room has been released.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

wire_enum! {
    /// Status of a property viewing.
    ViewingStatus ("viewing status") {
        Requested => "requested", "Awaiting confirmation",
        Confirmed => "confirmed", "Confirmed",
        Declined => "declined", "Declined",
        Completed => "completed", "Completed",
        Cancelled => "cancelled", "Cancelled",
    }
}

impl ViewingStatus {
    /// Returns `true` if a viewing may move from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Confirmed | Self::Declined | Self::Cancelled)
                | (Self::Confirmed, Self::Completed | Self::Cancelled)
        )
    }

    /// Returns `true` when no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Declined | Self::Completed | Self::Cancelled)
    }

    /// Returns `true` for viewings that still occupy a slot in the calendar.
    pub fn is_upcoming(self) -> bool {
        matches!(self, Self::Requested | Self::Confirmed)
    }
}

wire_enum! {
    /// Status of a complaint.
    ComplaintStatus ("complaint status") {
        Open => "open", "Open",
        InProgress => "in_progress", "In progress",
        Resolved => "resolved", "Resolved",
        Closed => "closed", "Closed",
    }
}

impl ComplaintStatus {
    /// Returns `true` if a complaint may move from `self` to `next`.
    ///
    /// A resolved complaint may be re-opened into `in_progress` when the
    /// landlord's fix did not hold.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::InProgress | Self::Resolved | Self::Closed)
                | (Self::InProgress, Self::Resolved | Self::Closed)
                | (Self::Resolved, Self::Closed | Self::InProgress)
        )
    }

    /// Returns `true` when no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` while the complaint still needs landlord attention.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }
}

wire_enum! {
    /// Urgency of a complaint.
    ComplaintPriority ("complaint priority") {
        Low => "low", "Low",
        Medium => "medium", "Medium",
        High => "high", "High",
        Urgent => "urgent", "Urgent",
    }
}

wire_enum! {
    /// What a complaint is about.
    ComplaintCategory ("complaint category") {
        Maintenance => "maintenance", "Maintenance",
        Noise => "noise", "Noise",
        Cleanliness => "cleanliness", "Cleanliness",
        Safety => "safety", "Safety",
        Billing => "billing", "Billing",
        Other => "other", "Other",
    }
}

wire_enum! {
    /// Status of a renovation on a property.
    RenovationStatus ("renovation status") {
        Planned => "planned", "Planned",
        InProgress => "in_progress", "In progress",
        Completed => "completed", "Completed",
        Cancelled => "cancelled", "Cancelled",
    }
}

impl RenovationStatus {
    /// Returns `true` if a renovation may move from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Planned, Self::InProgress | Self::Cancelled)
                | (Self::InProgress, Self::Completed | Self::Cancelled)
        )
    }

    /// Returns `true` when no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

wire_enum! {
    /// Status of a rent payment record.
    PaymentStatus ("payment status") {
        Pending => "pending", "Due",
        Paid => "paid", "Paid",
        Late => "late", "Overdue",
        Cancelled => "cancelled", "Cancelled",
    }
}

impl PaymentStatus {
    /// Returns `true` if a payment may move from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Late | Self::Cancelled)
                | (Self::Late, Self::Paid | Self::Cancelled)
        )
    }

    /// Returns `true` when no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    /// Returns `true` while money is still owed.
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::Pending | Self::Late)
    }
}

wire_enum! {
    /// How a rent payment was settled.
    PaymentMethod ("payment method") {
        BankTransfer => "bank_transfer", "Bank transfer",
        Card => "card", "Card",
        Cash => "cash", "Cash",
        Other => "other", "Other",
    }
}

wire_enum! {
    /// The event a notification reports.
    NotificationKind ("notification kind") {
        RentalRequestReceived => "rental_request_received", "New rental request",
        RentalRequestAccepted => "rental_request_accepted", "Rental request accepted",
        RentalRequestRejected => "rental_request_rejected", "Rental request rejected",
        RentalRequestCancelled => "rental_request_cancelled", "Rental request cancelled",
        ViewingRequested => "viewing_requested", "Viewing requested",
        ViewingConfirmed => "viewing_confirmed", "Viewing confirmed",
        ViewingDeclined => "viewing_declined", "Viewing declined",
        ViewingCancelled => "viewing_cancelled", "Viewing cancelled",
        MessageReceived => "message_received", "New message",
        ComplaintFiled => "complaint_filed", "New complaint",
        ComplaintUpdated => "complaint_updated", "Complaint updated",
        PaymentDue => "payment_due", "Rent due",
        PaymentRecorded => "payment_recorded", "Payment recorded",
        RentalEnded => "rental_ended", "Rental ended",
    }
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// A non-negative amount in minor currency units (cents).
///
/// Rents and payments are stored as integer cents so sums are exact. The
/// marketplace operates in a single currency; no symbol is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from cents, returning `None` if negative.
    #[must_use]
    pub fn from_cents(cents: i64) -> Option<Self> {
        (cents >= 0).then_some(Self(cents))
    }

    /// Zero.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub fn as_cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Parses a decimal amount with at most two fractional digits
    /// (`"450"`, `"450.5"`, `"450.50"`).
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (whole, fraction) = match text.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (text, ""),
        };
        if whole.is_empty()
            || fraction.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let whole: i64 = whole.parse().ok()?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().ok()? * 10,
            _ => fraction.parse().ok()?,
        };
        whole.checked_mul(100)?.checked_add(fraction).map(Self)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, m| acc + m)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`]; serialised as RFC 3339 which is what the
/// data store returns for `timestamptz` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns the calendar date of this instant in UTC.
    pub fn date(self) -> Date {
        self.0.date_naive()
    }

    /// Returns this instant shifted by `seconds` (may be negative).
    pub fn plus_seconds(self, seconds: i64) -> Self {
        Self(self.0 + Duration::seconds(seconds))
    }

    /// Parses an RFC 3339 timestamp.
    pub fn parse(text: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_values_match_serde() {
        for status in ComplaintStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().to_owned()));
            assert_eq!(status.as_str().parse::<ComplaintStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn from_str_accepts_dashes_spaces_and_case() {
        assert_eq!(
            "In-Progress".parse::<RenovationStatus>().unwrap(),
            RenovationStatus::InProgress
        );
        assert_eq!("shared room".parse::<PropertyKind>().unwrap(), PropertyKind::SharedRoom);
        let err = "vacant".parse::<PropertyKind>().unwrap_err();
        assert_eq!(err.kind, "property kind");
    }

    #[test]
    fn labels_are_user_facing() {
        assert_eq!(PaymentStatus::Late.label(), "Overdue");
        assert_eq!(ViewingStatus::Requested.to_string(), "Awaiting confirmation");
    }

    #[test]
    fn request_lifecycle_only_leaves_pending() {
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Accepted));
        assert!(!RequestStatus::Accepted.can_transition_to(RequestStatus::Rejected));
        assert!(!RequestStatus::Pending.can_transition_to(RequestStatus::Pending));
        assert!(RequestStatus::Cancelled.is_terminal());
    }

    #[test]
    fn viewing_lifecycle() {
        assert!(ViewingStatus::Requested.can_transition_to(ViewingStatus::Confirmed));
        assert!(!ViewingStatus::Requested.can_transition_to(ViewingStatus::Completed));
        assert!(ViewingStatus::Confirmed.can_transition_to(ViewingStatus::Completed));
        assert!(!ViewingStatus::Declined.can_transition_to(ViewingStatus::Confirmed));
        assert!(ViewingStatus::Confirmed.is_upcoming());
    }

    #[test]
    fn resolved_complaint_can_be_reopened_but_closed_cannot() {
        assert!(ComplaintStatus::Resolved.can_transition_to(ComplaintStatus::InProgress));
        assert!(!ComplaintStatus::Closed.can_transition_to(ComplaintStatus::Open));
        assert!(!ComplaintStatus::Open.can_transition_to(ComplaintStatus::Open));
    }

    #[test]
    fn late_payment_can_still_be_paid() {
        assert!(PaymentStatus::Late.can_transition_to(PaymentStatus::Paid));
        assert!(!PaymentStatus::Paid.can_transition_to(PaymentStatus::Late));
        assert!(PaymentStatus::Late.is_outstanding());
    }

    #[test]
    fn money_parses_decimal_amounts() {
        assert_eq!(Money::parse("450").unwrap().as_cents(), 45_000);
        assert_eq!(Money::parse("450.5").unwrap().as_cents(), 45_050);
        assert_eq!(Money::parse(" 450.05 ").unwrap().as_cents(), 45_005);
        assert!(Money::parse("-3").is_none());
        assert!(Money::parse("1.234").is_none());
        assert!(Money::parse(".5").is_none());
        assert!(Money::parse("abc").is_none());
    }

    #[test]
    fn money_displays_two_decimals_and_sums() {
        let total: Money = [Money::from_cents(1_005).unwrap(), Money::from_cents(95).unwrap()]
            .into_iter()
            .sum();
        assert_eq!(total.to_string(), "11.00");
        assert!(Money::from_cents(-1).is_none());
    }

    #[test]
    fn timestamp_parses_rfc3339() {
        let ts = Timestamp::parse("2026-10-01T12:00:00+02:00").unwrap();
        assert_eq!(ts.to_string(), "2026-10-01T10:00:00+00:00");
        assert_eq!(ts.plus_seconds(3600).as_datetime().format("%H").to_string(), "11");
    }
}
