//! Property search predicates.
//!
//! [`PropertySearch`] is evaluated in two stages: [`PropertySearch::to_query`]
//! pushes the server-expressible subset to the data store so less data is
//! fetched, then [`PropertySearch::matches`] applies the full predicate to
//! the decoded rows (free-text and amenity matching have no portable server
//! form).

use serde::{Deserialize, Serialize};

use crate::{Money, Property, PropertyKind, Query};

/// Criteria a student filters listings by. Every criterion is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySearch {
    /// Free text matched against title, description, address and city.
    pub text: Option<String>,
    pub city: Option<String>,
    pub min_rent: Option<Money>,
    pub max_rent: Option<Money>,
    pub kind: Option<PropertyKind>,
    /// Minimum number of free rooms.
    pub min_rooms: Option<u32>,
    /// Every listed amenity must be offered.
    pub amenities: Vec<String>,
    /// Hide listings with no free room.
    pub only_available: bool,
}

impl PropertySearch {
    /// Returns `true` if `property` satisfies every criterion.
    pub fn matches(&self, property: &Property) -> bool {
        if let Some(text) = non_blank(&self.text) {
            let needle = text.to_lowercase();
            let hit = [
                &property.title,
                &property.description,
                &property.address,
                &property.city,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if let Some(city) = non_blank(&self.city) {
            if !same_text(&property.city, city) {
                return false;
            }
        }

        if self.min_rent.is_some_and(|min| property.monthly_rent < min) {
            return false;
        }
        if self.max_rent.is_some_and(|max| property.monthly_rent > max) {
            return false;
        }

        if self.kind.is_some_and(|kind| property.kind != kind) {
            return false;
        }

        if self
            .min_rooms
            .is_some_and(|rooms| property.available_rooms < rooms)
        {
            return false;
        }

        let offers = |wanted: &String| {
            property
                .amenities
                .iter()
                .any(|have| same_text(have, wanted))
        };
        if !self.amenities.iter().all(offers) {
            return false;
        }

        !self.only_available || property.has_free_room()
    }

    /// Builds the data-store query for the server-expressible criteria.
    ///
    /// City is matched with `ilike` (no wildcards) so that the comparison is
    /// case-insensitive on the server as it is in [`PropertySearch::matches`].
    pub fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(city) = non_blank(&self.city) {
            query = query.ilike("city", escape_like(city));
        }
        if let Some(min) = self.min_rent {
            query = query.gte("monthly_rent", min.as_cents());
        }
        if let Some(max) = self.max_rent {
            query = query.lte("monthly_rent", max.as_cents());
        }
        if let Some(kind) = self.kind {
            query = query.eq("kind", kind.as_str());
        }
        if let Some(rooms) = self.min_rooms {
            query = query.gte("available_rooms", rooms);
        }
        if self.only_available {
            query = query.eq("is_available", true).gt("available_rooms", 0);
        }
        query.order_desc("created_at")
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Trimmed, Unicode case-insensitive equality, as `ilike` without wildcards.
fn same_text(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn escape_like(value: &str) -> String {
    value.replace('%', "")
}

/// How search results are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    RentAscending,
    RentDescending,
}

impl SortOrder {
    /// Sorts `properties` in place. Ties keep newest first.
    pub fn sort(self, properties: &mut [Property]) {
        properties.sort_by(|a, b| {
            let newest = b.created_at.cmp(&a.created_at);
            match self {
                SortOrder::Newest => newest,
                SortOrder::RentAscending => a.monthly_rent.cmp(&b.monthly_rent).then(newest),
                SortOrder::RentDescending => b.monthly_rent.cmp(&a.monthly_rent).then(newest),
            }
        });
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "rent" | "rent-asc" | "rent_asc" | "cheapest" => Ok(SortOrder::RentAscending),
            "rent-desc" | "rent_desc" => Ok(SortOrder::RentDescending),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}
