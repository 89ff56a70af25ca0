//! Newtype domain identifiers.
//!
//! Every table row has an identity represented as a distinct newtype wrapping
//! a [`Uuid`]. This prevents accidentally interchanging, for example, a
//! [`PropertyId`] with a [`RentalId`] even though both are UUIDs on the wire.
//!
//! Profile ids are the ids assigned by the authentication provider; every
//! other id is generated by the data store on insert.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for UUID-wrapped newtypes.
// Generates: struct (Copy), new_random(), from_uuid(), as_uuid(), Display, FromStr.
// ---------------------------------------------------------------------------
macro_rules! uuid_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying [`Uuid`].
            pub fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: one per table
// ---------------------------------------------------------------------------

uuid_id! {
    /// Identifies a user account. Shared by the auth provider and the
    /// `profiles` table.
    ProfileId
}

uuid_id! {
    /// Identifies a listed property.
    PropertyId
}

uuid_id! {
    /// Identifies a rental created when a landlord accepts a rental request.
    RentalId
}

uuid_id! {
    /// Identifies a student's request to rent a room in a property.
    RentalRequestId
}

uuid_id! {
    /// Identifies a scheduled property viewing.
    ViewingId
}

uuid_id! {
    /// Identifies a complaint filed against an active rental.
    ComplaintId
}

uuid_id! {
    /// Identifies a direct message between two users.
    MessageId
}

uuid_id! {
    /// Identifies a notification addressed to one user.
    NotificationId
}

uuid_id! {
    /// Identifies a rent payment record.
    PaymentId
}

uuid_id! {
    /// Identifies a renovation scheduled on a property.
    RenovationId
}

// ---------------------------------------------------------------------------
// Identifiers: string-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Object key within a storage bucket (e.g. `"properties/<id>/front.jpg"`).
    BlobPath
}

string_id! {
    /// Name of a storage bucket (e.g. `"property-images"`).
    BucketName
}

/// A normalised e-mail address used as the sign-in identifier.
///
/// Stored lower-cased and trimmed. Validation is deliberately shallow: one
/// `@`, non-empty local part, and a domain containing a dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses and normalises an address, returning `None` when malformed.
    pub fn new(value: impl AsRef<str>) -> Option<Self> {
        let normalised = value.as_ref().trim().to_lowercase();
        let (local, domain) = normalised.split_once('@')?;
        if local.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
            || normalised.chars().any(char::is_whitespace)
        {
            return None;
        }
        Some(Self(normalised))
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_parse_and_display_round_trip_through_text() {
        let id = PropertyId::new_random();
        let parsed: PropertyId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<PropertyId>().is_err());
    }

    #[test]
    fn uuid_ids_serialize_as_bare_strings() {
        let id = RentalId::new_random();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }

    #[test]
    fn email_is_normalised_and_validated() {
        let email = EmailAddress::new("  Alice@Uni.EDU ").unwrap();
        assert_eq!(email.as_str(), "alice@uni.edu");

        assert!(EmailAddress::new("no-at-sign").is_none());
        assert!(EmailAddress::new("@uni.edu").is_none());
        assert!(EmailAddress::new("a@b@uni.edu").is_none());
        assert!(EmailAddress::new("alice@localhost").is_none());
        assert!(EmailAddress::new("al ice@uni.edu").is_none());
    }

    #[test]
    fn string_ids_reject_blank_values() {
        assert!(BlobPath::new("").is_none());
        assert!(BucketName::new("   ").is_none());
        assert_eq!(BucketName::new("images").unwrap().as_str(), "images");
    }
}
