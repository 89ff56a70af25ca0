//! Table rows and insert payloads.
//!
//! Field names are the column names of the hosted database; the structs
//! (de)serialise straight to and from the JSON rows the data store exchanges.
//! `New*` types carry only the columns the client supplies on insert; `id`
//! and `created_at` are assigned by the store.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    ComplaintCategory, ComplaintId, ComplaintPriority, ComplaintStatus, Date, EmailAddress,
    MessageId, Money, NotificationId, NotificationKind, PaymentId, PaymentMethod, PaymentStatus,
    ProfileId, PropertyId, PropertyKind, RenovationId, RenovationStatus, RentalId,
    RentalRequestId, RentalStatus, RequestStatus, Table, Timestamp, UserRole, ViewingId,
    ViewingStatus,
};

/// A row type stored in one [`Table`].
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The table holding rows of this type.
    const TABLE: Table;

    /// Identifier type of the row.
    type Id: std::fmt::Display + Serialize + Copy + Send + Sync;

    /// Returns the row's primary key.
    fn id(&self) -> Self::Id;
}

macro_rules! record {
    ($ty:ty, $table:expr, $id:ty) => {
        impl Record for $ty {
            const TABLE: Table = $table;
            type Id = $id;

            fn id(&self) -> Self::Id {
                self.id
            }
        }
    };
}

// ---------------------------------------------------------------------------
// profiles
// ---------------------------------------------------------------------------

/// Public profile of an account. `id` equals the auth provider's user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub email: EmailAddress,
    pub full_name: String,
    pub role: UserRole,
    #[serde(default)]
    pub phone: Option<String>,
    /// Only meaningful for students.
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: Timestamp,
}

impl Profile {
    pub fn is_student(&self) -> bool {
        self.role == UserRole::Student
    }

    pub fn is_landlord(&self) -> bool {
        self.role == UserRole::Landlord
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: ProfileId,
    pub email: EmailAddress,
    pub full_name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub university: Option<String>,
}

record!(Profile, Table::Profiles, ProfileId);

// ---------------------------------------------------------------------------
// properties
// ---------------------------------------------------------------------------

/// A listed property.
///
/// Invariants: `1 <= total_rooms`, `available_rooms <= total_rooms`, and
/// `is_available` is false whenever `available_rooms == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub landlord_id: ProfileId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub address: String,
    pub city: String,
    pub kind: PropertyKind,
    /// Monthly rent per room.
    pub monthly_rent: Money,
    pub total_rooms: u32,
    pub available_rooms: u32,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub is_available: bool,
    pub created_at: Timestamp,
}

impl Property {
    /// Rooms currently held by active rentals.
    pub fn occupied_rooms(&self) -> u32 {
        self.total_rooms.saturating_sub(self.available_rooms)
    }

    /// Returns `true` if a student can currently request a room.
    pub fn has_free_room(&self) -> bool {
        self.is_available && self.available_rooms > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProperty {
    pub landlord_id: ProfileId,
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub kind: PropertyKind,
    pub monthly_rent: Money,
    pub total_rooms: u32,
    pub available_rooms: u32,
    pub amenities: Vec<String>,
    pub image_urls: Vec<String>,
    pub is_available: bool,
}

record!(Property, Table::Properties, PropertyId);

// ---------------------------------------------------------------------------
// rental_requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalRequest {
    pub id: RentalRequestId,
    pub property_id: PropertyId,
    pub student_id: ProfileId,
    pub landlord_id: ProfileId,
    #[serde(default)]
    pub message: Option<String>,
    pub desired_move_in: Date,
    pub status: RequestStatus,
    pub created_at: Timestamp,
    #[serde(default)]
    pub responded_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRentalRequest {
    pub property_id: PropertyId,
    pub student_id: ProfileId,
    pub landlord_id: ProfileId,
    pub message: Option<String>,
    pub desired_move_in: Date,
    pub status: RequestStatus,
}

record!(RentalRequest, Table::RentalRequests, RentalRequestId);

// ---------------------------------------------------------------------------
// rentals
// ---------------------------------------------------------------------------

/// An occupied room. Created only by the `accept_rental_request` procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rental {
    pub id: RentalId,
    pub property_id: PropertyId,
    pub student_id: ProfileId,
    pub landlord_id: ProfileId,
    #[serde(default)]
    pub request_id: Option<RentalRequestId>,
    /// 1-based room number within the property.
    pub room_number: u32,
    pub start_date: Date,
    #[serde(default)]
    pub end_date: Option<Date>,
    pub monthly_rent: Money,
    pub status: RentalStatus,
    pub created_at: Timestamp,
}

record!(Rental, Table::Rentals, RentalId);

// ---------------------------------------------------------------------------
// property_viewings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyViewing {
    pub id: ViewingId,
    pub property_id: PropertyId,
    pub student_id: ProfileId,
    pub landlord_id: ProfileId,
    pub scheduled_for: Timestamp,
    pub status: ViewingStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPropertyViewing {
    pub property_id: PropertyId,
    pub student_id: ProfileId,
    pub landlord_id: ProfileId,
    pub scheduled_for: Timestamp,
    pub status: ViewingStatus,
    pub notes: Option<String>,
}

record!(PropertyViewing, Table::PropertyViewings, ViewingId);

// ---------------------------------------------------------------------------
// complaints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: ComplaintId,
    pub rental_id: RentalId,
    pub property_id: PropertyId,
    pub student_id: ProfileId,
    pub landlord_id: ProfileId,
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: ComplaintPriority,
    pub status: ComplaintStatus,
    #[serde(default)]
    pub landlord_response: Option<String>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub resolved_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComplaint {
    pub rental_id: RentalId,
    pub property_id: PropertyId,
    pub student_id: ProfileId,
    pub landlord_id: ProfileId,
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: ComplaintPriority,
    pub status: ComplaintStatus,
}

record!(Complaint, Table::Complaints, ComplaintId);

// ---------------------------------------------------------------------------
// messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: ProfileId,
    pub recipient_id: ProfileId,
    /// Listing the conversation started from, if any.
    #[serde(default)]
    pub property_id: Option<PropertyId>,
    pub body: String,
    pub read: bool,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender_id: ProfileId,
    pub recipient_id: ProfileId,
    pub property_id: Option<PropertyId>,
    pub body: String,
    pub read: bool,
}

record!(Message, Table::Messages, MessageId);

// ---------------------------------------------------------------------------
// notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: ProfileId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: ProfileId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read: bool,
}

record!(Notification, Table::Notifications, NotificationId);

// ---------------------------------------------------------------------------
// payments
// ---------------------------------------------------------------------------

/// One month of rent owed on a rental.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub rental_id: RentalId,
    pub student_id: ProfileId,
    pub landlord_id: ProfileId,
    pub amount: Money,
    /// First day of the rent period this payment covers.
    pub period_start: Date,
    pub due_date: Date,
    #[serde(default)]
    pub paid_at: Option<Timestamp>,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
    pub status: PaymentStatus,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub rental_id: RentalId,
    pub student_id: ProfileId,
    pub landlord_id: ProfileId,
    pub amount: Money,
    pub period_start: Date,
    pub due_date: Date,
    pub status: PaymentStatus,
}

record!(Payment, Table::Payments, PaymentId);

// ---------------------------------------------------------------------------
// renovations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Renovation {
    pub id: RenovationId,
    pub property_id: PropertyId,
    pub landlord_id: ProfileId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: Date,
    #[serde(default)]
    pub end_date: Option<Date>,
    #[serde(default)]
    pub cost: Option<Money>,
    pub status: RenovationStatus,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRenovation {
    pub property_id: PropertyId,
    pub landlord_id: ProfileId,
    pub title: String,
    pub description: String,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub cost: Option<Money>,
    pub status: RenovationStatus,
}

record!(Renovation, Table::Renovations, RenovationId);
