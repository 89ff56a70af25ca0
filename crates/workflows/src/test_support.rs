use std::sync::Arc;

use marketplace::{BucketName, Date, Money, Profile, Property, PropertyKind, Timestamp, UserRole};
use memstore::MemoryBackend;

use crate::{Marketplace, PropertyDraft, SignUp};

pub(crate) struct Fixture {
    pub(crate) market: Marketplace,
    pub(crate) backend: MemoryBackend,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::from_backend(MemoryBackend::new())
    }

    pub(crate) fn with_session_ttl(seconds: i64) -> Self {
        Self::from_backend(MemoryBackend::new().with_session_ttl(seconds))
    }

    fn from_backend(backend: MemoryBackend) -> Self {
        let shared = Arc::new(backend.clone());
        let market = Marketplace::new(
            shared.clone(),
            shared.clone(),
            shared,
            BucketName::new("property-images").expect("bucket name"),
        );
        Self { market, backend }
    }

    async fn account(&self, email: &str, role: UserRole) -> Profile {
        let (_, profile) = self
            .market
            .accounts()
            .sign_up(SignUp {
                email: email.into(),
                password: "password123".into(),
                full_name: email.split('@').next().unwrap_or("user").into(),
                role,
                phone: None,
                university: None,
            })
            .await
            .expect("sign up");
        profile
    }

    pub(crate) async fn student(&self, email: &str) -> Profile {
        self.account(email, UserRole::Student).await
    }

    pub(crate) async fn landlord(&self, email: &str) -> Profile {
        self.account(email, UserRole::Landlord).await
    }

    pub(crate) async fn property(&self, owner: &Profile, rooms: u32) -> Property {
        self.market
            .listings()
            .create_property(owner, draft(rooms))
            .await
            .expect("create property")
    }
}

pub(crate) fn draft(rooms: u32) -> PropertyDraft {
    PropertyDraft {
        title: "Bright room near campus".into(),
        description: "Shared kitchen, bike storage".into(),
        address: "Naamsestraat 10".into(),
        city: "Leuven".into(),
        kind: PropertyKind::SharedRoom,
        monthly_rent: Money::from_cents(45_000).expect("rent"),
        total_rooms: rooms,
        amenities: vec!["wifi".into(), "laundry".into()],
    }
}

pub(crate) fn days_from_today(days: i64) -> Date {
    Timestamp::now().plus_seconds(days * 86_400).date()
}
