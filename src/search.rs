// src/search.rs
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::server::ServerListing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Most reviewed first, then best average.
    #[default]
    Rating,
    Players,
    Newest,
    Name,
}

/// Browse filters as they arrive on the query string. `"all"` is accepted
/// wherever a filter can be switched off.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub version: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub min_players: i64,
    #[serde(default)]
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatedListing {
    #[serde(flatten)]
    pub listing: ServerListing,
    pub review_count: usize,
    pub average_rating: f64,
}

fn active(filter: &Option<String>) -> Option<&str> {
    filter
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

impl ListingQuery {
    pub fn matches(&self, server: &ServerListing) -> bool {
        if let Some(q) = active(&self.q) {
            let q = q.to_lowercase();
            let hit = server.name.to_lowercase().contains(&q)
                || server.ip.to_lowercase().contains(&q)
                || server.tags.iter().any(|t| t.to_lowercase().contains(&q))
                || server.description.to_lowercase().contains(&q);
            if !hit {
                return false;
            }
        }
        if let Some(category) = active(&self.category) {
            if !server.tags.iter().any(|t| t.eq_ignore_ascii_case(category)) {
                return false;
            }
        }
        if let Some(version) = active(&self.version) {
            if !server.version.starts_with(version) {
                return false;
            }
        }
        if let Some(country) = active(&self.country) {
            if !server.country.eq_ignore_ascii_case(country) {
                return false;
            }
        }
        if self.online && !server.is_online {
            return false;
        }
        if self.featured && !server.featured {
            return false;
        }
        if self.min_players > 0 && server.players < self.min_players {
            return false;
        }
        true
    }

    /// Filters and orders `listings` in place of the browse page.
    pub fn apply(&self, mut listings: Vec<RatedListing>) -> Vec<RatedListing> {
        listings.retain(|l| self.matches(&l.listing));
        match self.sort {
            SortOrder::Rating => listings.sort_by(|a, b| {
                b.review_count.cmp(&a.review_count).then_with(|| {
                    b.average_rating
                        .partial_cmp(&a.average_rating)
                        .unwrap_or(Ordering::Equal)
                })
            }),
            SortOrder::Players => listings.sort_by(|a, b| b.listing.players.cmp(&a.listing.players)),
            SortOrder::Newest => listings.sort_by(|a, b| b.listing.created_at.cmp(&a.listing.created_at)),
            SortOrder::Name => listings.sort_by(|a, b| {
                a.listing.name.to_lowercase().cmp(&b.listing.name.to_lowercase())
            }),
        }
        listings
    }
}
