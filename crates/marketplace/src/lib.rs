//! Core marketplace domain for Linkier.
//!
//! This crate contains every domain concept of the student-housing
//! marketplace: newtype identifiers, table records, status lifecycles, the
//! row-filtering query model, property search predicates, error types, and
//! the port traits through which the application reaches its hosted backend.
//! Infrastructure crates implement the traits defined here; they never add
//! domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`PropertyId`, `RentalId`, `EmailAddress`, etc.) |
//! | [`types`] | Value types (`Money`, `Timestamp`) and status enums with lifecycles |
//! | [`records`] | Table rows and insert payloads |
//! | [`query`] | Tables, filters, ordering, PostgREST rendering |
//! | [`search`] | Property search predicates and sort orders |
//! | [`ports`] | `AuthProvider`, `DataStore`, `BlobStorage` and typed helpers |
//! | [`errors`] | Port errors, workflow errors, retry policy |

pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod query;
pub mod records;
pub mod search;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{AuthError, LinkierError, RetryPolicy, StorageError, StoreError};
pub use identifiers::{
    BlobPath, BucketName, ComplaintId, EmailAddress, MessageId, NotificationId, PaymentId,
    ProfileId, PropertyId, RenovationId, RentalId, RentalRequestId, ViewingId,
};
pub use ports::{
    call_procedure, fetch_all, fetch_one, id_filter, insert_record, update_record, update_where,
    AuthProvider, AuthSession, AuthUser, BlobStorage, DataStore, ACCEPT_RENTAL_REQUEST,
};
pub use query::{compare_values, Filter, Order, Query, Table};
pub use records::{
    Complaint, Message, NewComplaint, NewMessage, NewNotification, NewPayment, NewProfile,
    NewProperty, NewPropertyViewing, NewRenovation, NewRentalRequest, Notification, Payment,
    Profile, Property, PropertyViewing, Record, Renovation, Rental, RentalRequest,
};
pub use search::{PropertySearch, SortOrder};
pub use types::{
    ComplaintCategory, ComplaintPriority, ComplaintStatus, Date, Money, NotificationKind,
    ParseEnumError, PaymentMethod, PaymentStatus, PropertyKind, RenovationStatus, RentalStatus,
    RequestStatus, Timestamp, UserRole, ViewingStatus,
};
