//! Linkier marketplace workflows.
//!
//! This crate sequences calls between the business rules in the
//! [`marketplace`] crate and the three infrastructure ports (auth, data
//! store, blob storage). Every operation a student or landlord can perform
//! lives here, grouped by area:
//!
//! | Service | Operations |
//! |---------|------------|
//! | [`Accounts`] | sign-up, sign-in, session restore, profile edits |
//! | [`Listings`] | property CRUD, images, availability, search |
//! | [`RentalRequests`] | submit, accept (via `accept_rental_request`), reject, cancel |
//! | [`Rentals`] | listing and ending rentals |
//! | [`Viewings`] | request, confirm, decline, cancel, complete |
//! | [`Messaging`] | send, conversation, inbox, read receipts |
//! | [`Complaints`] | file and progress complaints |
//! | [`Renovations`] | schedule and progress renovations |
//! | [`Payments`] | record rent due, mark paid / late, overdue sweep |
//! | [`Notifications`] | per-user notification feed |
//! | [`Dashboards`] | landlord and student summary counts |
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Services enforce roles, ownership and status
//! lifecycles, then delegate to the ports. They hold no state of their own;
//! [`Marketplace`] is cheap to clone and hands out borrowed service views.
//!
//! Operations acting on behalf of a user take the acting [`Profile`] as
//! `actor`. Notifications emitted as a side effect are best-effort: a failed
//! notification is logged and never fails the operation that caused it.

use std::sync::Arc;

use marketplace::{AuthProvider, BlobStorage, BucketName, DataStore, Profile};

pub mod accounts;
pub mod complaints;
pub mod dashboard;
mod guard;
pub mod listings;
pub mod messaging;
pub mod notifications;
pub mod payments;
pub mod renovations;
pub mod rentals;
pub mod requests;
pub mod viewings;

#[cfg(test)]
mod test_support;

pub use accounts::{Accounts, ProfileUpdate, SignUp};
pub use complaints::{ComplaintDraft, Complaints};
pub use dashboard::{Dashboards, LandlordDashboard, StudentDashboard};
pub use listings::{ImageUpload, Listings, PropertyDraft, PropertyUpdate};
pub use messaging::{ConversationSummary, Messaging};
pub use notifications::Notifications;
pub use payments::{PaymentSummary, Payments};
pub use renovations::{RenovationDraft, Renovations};
pub use rentals::Rentals;
pub use requests::RentalRequests;
pub use viewings::Viewings;

/// Entry point to every workflow.
///
/// Holds the port implementations chosen by the composition root.
#[derive(Clone)]
pub struct Marketplace {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn DataStore>,
    blobs: Arc<dyn BlobStorage>,
    image_bucket: BucketName,
}

impl std::fmt::Debug for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marketplace")
            .field("image_bucket", &self.image_bucket)
            .finish_non_exhaustive()
    }
}

impl Marketplace {
    /// Wires the marketplace to its ports. Property images are stored in
    /// `image_bucket`.
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DataStore>,
        blobs: Arc<dyn BlobStorage>,
        image_bucket: BucketName,
    ) -> Self {
        Self {
            auth,
            store,
            blobs,
            image_bucket,
        }
    }

    pub fn accounts(&self) -> Accounts<'_> {
        Accounts::new(self)
    }

    pub fn listings(&self) -> Listings<'_> {
        Listings::new(self)
    }

    pub fn requests(&self) -> RentalRequests<'_> {
        RentalRequests::new(self)
    }

    pub fn rentals(&self) -> Rentals<'_> {
        Rentals::new(self)
    }

    pub fn viewings(&self) -> Viewings<'_> {
        Viewings::new(self)
    }

    pub fn messaging(&self) -> Messaging<'_> {
        Messaging::new(self)
    }

    pub fn complaints(&self) -> Complaints<'_> {
        Complaints::new(self)
    }

    pub fn renovations(&self) -> Renovations<'_> {
        Renovations::new(self)
    }

    pub fn payments(&self) -> Payments<'_> {
        Payments::new(self)
    }

    pub fn notifications(&self) -> Notifications<'_> {
        Notifications::new(self)
    }

    pub fn dashboards(&self) -> Dashboards<'_> {
        Dashboards::new(self)
    }

    pub(crate) fn store(&self) -> &dyn DataStore {
        self.store.as_ref()
    }

    pub(crate) fn auth(&self) -> &dyn AuthProvider {
        self.auth.as_ref()
    }

    pub(crate) fn blobs(&self) -> &dyn BlobStorage {
        self.blobs.as_ref()
    }

    pub(crate) fn image_bucket(&self) -> &BucketName {
        &self.image_bucket
    }
}

/// Display name used in notification texts.
pub(crate) fn display_name(profile: &Profile) -> &str {
    let name = profile.full_name.trim();
    if name.is_empty() {
        profile.email.as_str()
    } else {
        name
    }
}
