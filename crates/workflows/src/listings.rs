//! Property listings: create, edit, images, availability, search.

use marketplace::{
    fetch_all, fetch_one, id_filter, insert_record, update_record, BlobPath, Filter, LinkierError,
    Money, NewProperty, Profile, ProfileId, Property, PropertyId, PropertyKind, PropertySearch,
    Query, Rental, RentalStatus, SortOrder, Table,
};
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::guard::{require_landlord, require_self, required_text};
use crate::Marketplace;

/// Largest image accepted for upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Content types accepted for property images.
pub const IMAGE_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

const MAX_TITLE_CHARS: usize = 120;
const MAX_DESCRIPTION_CHARS: usize = 5000;
const MAX_ADDRESS_CHARS: usize = 200;
const MAX_ROOMS: u32 = 50;

/// Fields of a new listing.
#[derive(Debug, Clone)]
pub struct PropertyDraft {
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub kind: PropertyKind,
    pub monthly_rent: Money,
    pub total_rooms: u32,
    pub amenities: Vec<String>,
}

/// Listing edit; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct PropertyUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub kind: Option<PropertyKind>,
    pub monthly_rent: Option<Money>,
    pub total_rooms: Option<u32>,
    pub amenities: Option<Vec<String>>,
}

/// An image file to attach to a listing.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Listing operations.
pub struct Listings<'a> {
    market: &'a Marketplace,
}

impl<'a> Listings<'a> {
    pub(crate) fn new(market: &'a Marketplace) -> Self {
        Self { market }
    }

    /// Publishes a new listing with every room free.
    #[instrument(skip_all, fields(landlord_id = %actor.id))]
    pub async fn create_property(
        &self,
        actor: &Profile,
        draft: PropertyDraft,
    ) -> Result<Property, LinkierError> {
        require_landlord(actor, "list properties")?;
        validate_rent(draft.monthly_rent)?;
        validate_rooms(draft.total_rooms)?;

        let property: Property = insert_record(
            self.market.store(),
            &NewProperty {
                landlord_id: actor.id,
                title: required_text("title", &draft.title, MAX_TITLE_CHARS)?,
                description: draft.description.trim().to_owned(),
                address: required_text("address", &draft.address, MAX_ADDRESS_CHARS)?,
                city: required_text("city", &draft.city, MAX_ADDRESS_CHARS)?,
                kind: draft.kind,
                monthly_rent: draft.monthly_rent,
                total_rooms: draft.total_rooms,
                available_rooms: draft.total_rooms,
                amenities: clean_amenities(draft.amenities),
                image_urls: Vec::new(),
                is_available: true,
            },
        )
        .await?;
        info!(property_id = %property.id, "Property listed");
        Ok(property)
    }

    /// Edits a listing owned by the actor.
    ///
    /// Changing `total_rooms` keeps the occupied rooms occupied: the new total
    /// may not drop below them, and the free rooms are recomputed.
    #[instrument(skip_all, fields(property_id = %id))]
    pub async fn update_property(
        &self,
        actor: &Profile,
        id: PropertyId,
        update: PropertyUpdate,
    ) -> Result<Property, LinkierError> {
        let property = self.owned(actor, id).await?;

        let mut patch = Map::new();
        if let Some(title) = update.title {
            patch.insert("title".into(), json!(required_text("title", &title, MAX_TITLE_CHARS)?));
        }
        if let Some(description) = update.description {
            let description = description.trim();
            if description.chars().count() > MAX_DESCRIPTION_CHARS {
                return Err(LinkierError::validation("description", "is too long"));
            }
            patch.insert("description".into(), json!(description));
        }
        if let Some(address) = update.address {
            patch.insert(
                "address".into(),
                json!(required_text("address", &address, MAX_ADDRESS_CHARS)?),
            );
        }
        if let Some(city) = update.city {
            patch.insert("city".into(), json!(required_text("city", &city, MAX_ADDRESS_CHARS)?));
        }
        if let Some(kind) = update.kind {
            patch.insert("kind".into(), json!(kind));
        }
        if let Some(rent) = update.monthly_rent {
            validate_rent(rent)?;
            patch.insert("monthly_rent".into(), json!(rent));
        }
        if let Some(amenities) = update.amenities {
            patch.insert("amenities".into(), json!(clean_amenities(amenities)));
        }
        if let Some(total) = update.total_rooms {
            validate_rooms(total)?;
            let occupied = property.occupied_rooms();
            if total < occupied {
                return Err(LinkierError::validation(
                    "total rooms",
                    format!("{occupied} rooms are rented out"),
                ));
            }
            let available = total - occupied;
            // A listing closed only because it was full reopens when rooms are added.
            let is_available =
                available > 0 && (property.is_available || property.available_rooms == 0);
            patch.insert("total_rooms".into(), json!(total));
            patch.insert("available_rooms".into(), json!(available));
            patch.insert("is_available".into(), json!(is_available));
        }

        if patch.is_empty() {
            return Ok(property);
        }
        update_record::<Property>(self.market.store(), id, Value::Object(patch))
            .await?
            .ok_or_else(|| LinkierError::not_found("property", id))
    }

    /// Opens or closes a listing for new requests.
    pub async fn set_availability(
        &self,
        actor: &Profile,
        id: PropertyId,
        available: bool,
    ) -> Result<Property, LinkierError> {
        let property = self.owned(actor, id).await?;
        if available && property.available_rooms == 0 {
            return Err(LinkierError::NoRoomsAvailable);
        }
        update_record::<Property>(
            self.market.store(),
            id,
            json!({ "is_available": available }),
        )
        .await?
        .ok_or_else(|| LinkierError::not_found("property", id))
    }

    /// Removes a listing and its images. Refused while a room is rented.
    #[instrument(skip_all, fields(property_id = %id))]
    pub async fn delete_property(
        &self,
        actor: &Profile,
        id: PropertyId,
    ) -> Result<(), LinkierError> {
        let property = self.owned(actor, id).await?;
        let active = self
            .market
            .store()
            .count(
                Table::Rentals,
                &[
                    Filter::Eq("property_id".into(), json!(id)),
                    Filter::Eq("status".into(), json!(RentalStatus::Active)),
                ],
            )
            .await?;
        if active > 0 {
            return Err(LinkierError::forbidden(format!(
                "property has {active} active rental(s)"
            )));
        }

        self.market
            .store()
            .delete(Table::Properties, &[id_filter(id)])
            .await?;
        for url in &property.image_urls {
            self.remove_blob(url).await;
        }
        info!("Property deleted");
        Ok(())
    }

    /// Stores an image and appends its public URL to the listing.
    #[instrument(skip_all, fields(property_id = %id, size = upload.bytes.len()))]
    pub async fn upload_image(
        &self,
        actor: &Profile,
        id: PropertyId,
        upload: ImageUpload,
    ) -> Result<Property, LinkierError> {
        let property = self.owned(actor, id).await?;
        let content_type = upload.content_type.trim().to_lowercase();
        if !IMAGE_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(LinkierError::validation(
                "image",
                format!("unsupported type '{content_type}'"),
            ));
        }
        if upload.bytes.is_empty() {
            return Err(LinkierError::validation("image", "file is empty"));
        }
        if upload.bytes.len() > MAX_IMAGE_BYTES {
            return Err(LinkierError::validation("image", "file exceeds 5 MiB"));
        }

        let path = BlobPath::new(format!(
            "properties/{id}/{}-{}",
            Uuid::new_v4().simple(),
            sanitize_file_name(&upload.file_name)
        ))
        .ok_or_else(|| LinkierError::validation("image", "invalid file name"))?;
        let url = self
            .market
            .blobs()
            .upload(self.market.image_bucket(), &path, upload.bytes, &content_type)
            .await?;

        let mut urls = property.image_urls;
        urls.push(url);
        update_record::<Property>(self.market.store(), id, json!({ "image_urls": urls }))
            .await?
            .ok_or_else(|| LinkierError::not_found("property", id))
    }

    /// Detaches an image from the listing and deletes the stored object.
    pub async fn remove_image(
        &self,
        actor: &Profile,
        id: PropertyId,
        url: &str,
    ) -> Result<Property, LinkierError> {
        let property = self.owned(actor, id).await?;
        if !property.image_urls.iter().any(|u| u == url) {
            return Err(LinkierError::not_found("image", url));
        }
        let urls: Vec<&String> = property.image_urls.iter().filter(|u| *u != url).collect();
        let updated = update_record::<Property>(
            self.market.store(),
            id,
            json!({ "image_urls": urls }),
        )
        .await?
        .ok_or_else(|| LinkierError::not_found("property", id))?;
        self.remove_blob(url).await;
        Ok(updated)
    }

    /// Runs a search and orders the results.
    #[instrument(skip_all)]
    pub async fn search(
        &self,
        search: &PropertySearch,
        order: SortOrder,
    ) -> Result<Vec<Property>, LinkierError> {
        let mut found: Vec<Property> =
            fetch_all::<Property>(self.market.store(), &search.to_query())
                .await?
                .into_iter()
                .filter(|p| search.matches(p))
                .collect();
        order.sort(&mut found);
        Ok(found)
    }

    /// Fetches a listing by id.
    pub async fn property(&self, id: PropertyId) -> Result<Property, LinkierError> {
        fetch_one::<Property>(self.market.store(), id)
            .await?
            .ok_or_else(|| LinkierError::not_found("property", id))
    }

    /// Every listing of one landlord, newest first.
    pub async fn landlord_properties(
        &self,
        landlord_id: ProfileId,
    ) -> Result<Vec<Property>, LinkierError> {
        let query = Query::new()
            .eq("landlord_id", json!(landlord_id))
            .order_desc("created_at");
        Ok(fetch_all(self.market.store(), &query).await?)
    }

    /// Active rentals on a listing.
    pub async fn tenants(
        &self,
        actor: &Profile,
        id: PropertyId,
    ) -> Result<Vec<Rental>, LinkierError> {
        self.owned(actor, id).await?;
        let query = Query::new()
            .eq("property_id", json!(id))
            .eq("status", json!(RentalStatus::Active))
            .order_asc("room_number");
        Ok(fetch_all(self.market.store(), &query).await?)
    }

    /// Fetches a listing and checks the actor owns it.
    pub(crate) async fn owned(
        &self,
        actor: &Profile,
        id: PropertyId,
    ) -> Result<Property, LinkierError> {
        require_landlord(actor, "manage properties")?;
        let property = self.property(id).await?;
        require_self(actor, property.landlord_id, "property")?;
        Ok(property)
    }

    async fn remove_blob(&self, url: &str) {
        let bucket = self.market.image_bucket();
        let Some(path) = self.market.blobs().path_from_url(bucket, url) else {
            warn!(url, "Image URL does not point into the image bucket");
            return;
        };
        if let Err(err) = self.market.blobs().remove(bucket, &path).await {
            warn!(error = %err, %path, "Failed to delete image object");
        }
    }
}

fn validate_rent(rent: Money) -> Result<(), LinkierError> {
    if rent.is_zero() {
        Err(LinkierError::validation("monthly rent", "must be greater than zero"))
    } else {
        Ok(())
    }
}

fn validate_rooms(rooms: u32) -> Result<(), LinkierError> {
    if (1..=MAX_ROOMS).contains(&rooms) {
        Ok(())
    } else {
        Err(LinkierError::validation(
            "total rooms",
            format!("must be between 1 and {MAX_ROOMS}"),
        ))
    }
}

/// Trims, drops blanks and removes case-insensitive duplicates.
fn clean_amenities(amenities: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for amenity in amenities {
        let amenity = amenity.trim();
        if !amenity.is_empty() && !cleaned.iter().any(|a| a.eq_ignore_ascii_case(amenity)) {
            cleaned.push(amenity.to_owned());
        }
    }
    cleaned
}

/// Keeps the object key URL-safe.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(['-', '.']).to_owned();
    if cleaned.is_empty() {
        "image".to_owned()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{draft, Fixture};
    use marketplace::{BlobStorage, BucketName, DataStore};

    fn jpeg(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: name.into(),
            content_type: "image/jpeg".into(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        }
    }

    #[tokio::test]
    async fn create_starts_with_every_room_free() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let property = fx.property(&owner, 3).await;
        assert_eq!(property.available_rooms, 3);
        assert!(property.is_available);
        assert_eq!(property.landlord_id, owner.id);
        assert_eq!(property.amenities, vec!["wifi", "laundry"]);
    }

    #[tokio::test]
    async fn students_cannot_list_and_drafts_are_validated() {
        let fx = Fixture::new();
        let student = fx.student("ana@uni.be").await;
        let owner = fx.landlord("owner@rent.be").await;
        let listings = fx.market.listings();

        assert!(matches!(
            listings.create_property(&student, draft(1)).await,
            Err(LinkierError::Forbidden { .. })
        ));

        let mut bad = draft(0);
        assert!(matches!(
            listings.create_property(&owner, bad.clone()).await,
            Err(LinkierError::Validation { field: "total rooms", .. })
        ));
        bad.total_rooms = 2;
        bad.monthly_rent = Money::zero();
        assert!(matches!(
            listings.create_property(&owner, bad.clone()).await,
            Err(LinkierError::Validation { field: "monthly rent", .. })
        ));
        bad.monthly_rent = Money::from_cents(100).unwrap();
        bad.city = " ".into();
        assert!(matches!(
            listings.create_property(&owner, bad).await,
            Err(LinkierError::Validation { field: "city", .. })
        ));
    }

    #[tokio::test]
    async fn room_count_changes_preserve_occupied_rooms() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let property = fx.property(&owner, 3).await;
        // Simulate two rented rooms and a full listing.
        fx.backend
            .update(
                Table::Properties,
                &[id_filter(property.id)],
                json!({ "available_rooms": 0, "total_rooms": 2, "is_available": false }),
            )
            .await
            .unwrap();

        let listings = fx.market.listings();
        let err = listings
            .update_property(
                &owner,
                property.id,
                PropertyUpdate {
                    total_rooms: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LinkierError::Validation { field: "total rooms", .. }));

        let grown = listings
            .update_property(
                &owner,
                property.id,
                PropertyUpdate {
                    total_rooms: Some(4),
                    title: Some("  Bigger house ".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(grown.available_rooms, 2);
        assert!(grown.is_available);
        assert_eq!(grown.title, "Bigger house");
    }

    #[tokio::test]
    async fn only_the_owner_may_edit() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let other = fx.landlord("other@rent.be").await;
        let property = fx.property(&owner, 1).await;
        assert!(matches!(
            fx.market
                .listings()
                .set_availability(&other, property.id, false)
                .await,
            Err(LinkierError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn full_listing_cannot_be_reopened() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let property = fx.property(&owner, 1).await;
        fx.backend
            .update(
                Table::Properties,
                &[id_filter(property.id)],
                json!({ "available_rooms": 0, "is_available": false }),
            )
            .await
            .unwrap();
        assert!(matches!(
            fx.market
                .listings()
                .set_availability(&owner, property.id, true)
                .await,
            Err(LinkierError::NoRoomsAvailable)
        ));
    }

    #[tokio::test]
    async fn images_are_stored_listed_and_removed() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let property = fx.property(&owner, 1).await;
        let listings = fx.market.listings();

        let with_image = listings
            .upload_image(&owner, property.id, jpeg("C:\\photos\\Front Door.JPG"))
            .await
            .unwrap();
        assert_eq!(with_image.image_urls.len(), 1);
        let url = with_image.image_urls[0].clone();
        assert!(url.ends_with("-front-door.jpg"), "{url}");

        let bucket = BucketName::new("property-images").unwrap();
        let path = fx.backend.path_from_url(&bucket, &url).unwrap();
        assert!(fx.backend.blob(&bucket, &path).await.is_some());

        let without = listings.remove_image(&owner, property.id, &url).await.unwrap();
        assert!(without.image_urls.is_empty());
        assert!(fx.backend.blob(&bucket, &path).await.is_none());

        assert!(matches!(
            listings.remove_image(&owner, property.id, &url).await,
            Err(LinkierError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn images_are_type_and_size_checked() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let property = fx.property(&owner, 1).await;
        let listings = fx.market.listings();

        let mut gif = jpeg("a.gif");
        gif.content_type = "image/gif".into();
        assert!(matches!(
            listings.upload_image(&owner, property.id, gif).await,
            Err(LinkierError::Validation { field: "image", .. })
        ));

        let mut huge = jpeg("a.jpg");
        huge.bytes = vec![0; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            listings.upload_image(&owner, property.id, huge).await,
            Err(LinkierError::Validation { field: "image", .. })
        ));
    }

    #[tokio::test]
    async fn search_filters_and_sorts() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let listings = fx.market.listings();

        let mut cheap = draft(2);
        cheap.title = "Cheap studio".into();
        cheap.kind = PropertyKind::Studio;
        cheap.monthly_rent = Money::from_cents(30_000).unwrap();
        listings.create_property(&owner, cheap).await.unwrap();

        let mut pricey = draft(1);
        pricey.title = "Loft".into();
        pricey.city = "Gent".into();
        pricey.monthly_rent = Money::from_cents(80_000).unwrap();
        listings.create_property(&owner, pricey).await.unwrap();

        listings.create_property(&owner, draft(3)).await.unwrap();

        let in_leuven = listings
            .search(
                &PropertySearch {
                    city: Some("leuven".into()),
                    ..Default::default()
                },
                SortOrder::RentAscending,
            )
            .await
            .unwrap();
        let titles: Vec<&str> = in_leuven.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Cheap studio", "Bright room near campus"]);

        let with_text = listings
            .search(
                &PropertySearch {
                    text: Some("loft".into()),
                    ..Default::default()
                },
                SortOrder::Newest,
            )
            .await
            .unwrap();
        assert_eq!(with_text.len(), 1);
        assert_eq!(with_text[0].city, "Gent");
    }

    #[tokio::test]
    async fn delete_is_refused_with_active_rentals() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let property = fx.property(&owner, 1).await;
        fx.backend
            .insert(
                Table::Rentals,
                json!({ "property_id": property.id, "status": "active" }),
            )
            .await
            .unwrap();

        let listings = fx.market.listings();
        assert!(matches!(
            listings.delete_property(&owner, property.id).await,
            Err(LinkierError::Forbidden { .. })
        ));

        fx.backend
            .update(
                Table::Rentals,
                &[Filter::Eq("property_id".into(), json!(property.id))],
                json!({ "status": "ended" }),
            )
            .await
            .unwrap();
        listings.delete_property(&owner, property.id).await.unwrap();
        assert!(matches!(
            listings.property(property.id).await,
            Err(LinkierError::NotFound { .. })
        ));
    }

    #[test]
    fn file_names_are_sanitised() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("My Photo (1).PNG"), "my-photo--1-.png");
        assert_eq!(sanitize_file_name("###"), "image");
    }

    #[test]
    fn amenities_are_deduplicated() {
        let cleaned = clean_amenities(vec![
            "WiFi".into(),
            " wifi ".into(),
            "".into(),
            "Garden".into(),
        ]);
        assert_eq!(cleaned, vec!["WiFi", "Garden"]);
    }
}
