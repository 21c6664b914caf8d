use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use anyhow::Result;
use thiserror::Error;

use crate::ledger::PurchaseLedger;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Error, Debug, PartialEq)]
pub enum CatalogError {
    #[error("Listing not found: {0}")]
    NotFound(String),
    #[error("Duplicate listing id: {0}")]
    DuplicateId(String),
    #[error("Listing {id} has rating {rating}, expected 0-5")]
    RatingOutOfRange { id: String, rating: f32 },
    #[error("Listing {0} has a non-positive price")]
    InvalidPrice(String),
}

/// Business domain a listing is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    Sales,
    Marketing,
    #[serde(rename = "Customer Support")]
    CustomerSupport,
    #[serde(rename = "Data Analytics")]
    DataAnalytics,
    Automation,
    Creative,
    Legal,
}

impl Sector {
    pub fn all() -> Vec<Sector> {
        vec![
            Sector::Sales,
            Sector::Marketing,
            Sector::CustomerSupport,
            Sector::DataAnalytics,
            Sector::Automation,
            Sector::Creative,
            Sector::Legal,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sector::Sales => "Sales",
            Sector::Marketing => "Marketing",
            Sector::CustomerSupport => "Customer Support",
            Sector::DataAnalytics => "Data Analytics",
            Sector::Automation => "Automation",
            Sector::Creative => "Creative",
            Sector::Legal => "Legal",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .into_iter()
            .find(|sector| sector.label().to_lowercase() == wanted)
    }

    /// Next sector in declaration order, wrapping around
    pub fn next(&self) -> Self {
        let all = Self::all();
        let i = all.iter().position(|s| s == self).unwrap_or(0);
        all[(i + 1) % all.len()]
    }

    pub fn prev(&self) -> Self {
        let all = Self::all();
        let i = all.iter().position(|s| s == self).unwrap_or(0);
        all[(i + all.len() - 1) % all.len()]
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Browse filter: the "All" pseudo-sector or one concrete sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectorFilter {
    #[default]
    All,
    Only(Sector),
}

impl SectorFilter {
    /// All filters in the order the browse bar shows them
    pub fn all() -> Vec<SectorFilter> {
        std::iter::once(SectorFilter::All)
            .chain(Sector::all().into_iter().map(SectorFilter::Only))
            .collect()
    }

    pub fn label(&self) -> &'static str {
        match self {
            SectorFilter::All => "All",
            SectorFilter::Only(sector) => sector.label(),
        }
    }

    pub fn matches(&self, sector: Sector) -> bool {
        match self {
            SectorFilter::All => true,
            SectorFilter::Only(wanted) => *wanted == sector,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub monthly: f64,
    pub yearly: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub creator: String,
    pub sector: Sector,
    pub pricing: Pricing,
    pub rating: f32,
    pub reviews_count: u32,
    pub capabilities: Vec<String>,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo_prompt: Option<String>,
}

impl Listing {
    /// Capability summary handed to the model when it plays this listing
    pub fn persona_summary(&self) -> String {
        if self.capabilities.is_empty() {
            self.description.clone()
        } else {
            format!(
                "{} Key capabilities: {}.",
                self.description,
                self.capabilities.join(", ")
            )
        }
    }
}

/// Read-only listing collection, validated once at load time
#[derive(Debug, Clone)]
pub struct Catalog {
    listings: Vec<Listing>,
}

impl Catalog {
    /// Catalog compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    pub async fn load_from_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "loading catalog");

        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let listings: Vec<Listing> = serde_json::from_str(content)?;
        Ok(Self::from_listings(listings)?)
    }

    pub fn from_listings(listings: Vec<Listing>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for listing in &listings {
            if !seen.insert(listing.id.as_str()) {
                return Err(CatalogError::DuplicateId(listing.id.clone()));
            }
            if !(0.0..=5.0).contains(&listing.rating) {
                return Err(CatalogError::RatingOutOfRange {
                    id: listing.id.clone(),
                    rating: listing.rating,
                });
            }
            if listing.pricing.monthly <= 0.0 || listing.pricing.yearly <= 0.0 {
                return Err(CatalogError::InvalidPrice(listing.id.clone()));
            }
        }

        tracing::debug!(count = listings.len(), "catalog ready");
        Ok(Self { listings })
    }

    pub fn list(&self) -> &[Listing] {
        &self.listings
    }

    pub fn get(&self, id: &str) -> Result<&Listing, CatalogError> {
        self.listings
            .iter()
            .find(|listing| listing.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// Listings in `filter` whose name or description contains `search`,
    /// case-insensitively. An empty search matches everything.
    pub fn filter(&self, filter: &SectorFilter, search: &str) -> Vec<&Listing> {
        let needle = search.trim().to_lowercase();

        self.listings
            .iter()
            .filter(|listing| filter.matches(listing.sector))
            .filter(|listing| {
                needle.is_empty()
                    || listing.name.to_lowercase().contains(&needle)
                    || listing.description.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Listings held in the ledger, in purchase order. Ids missing from
    /// this catalog are skipped.
    pub fn owned_by(&self, ledger: &PurchaseLedger) -> Vec<&Listing> {
        ledger
            .ids()
            .iter()
            .filter_map(|id| self.get(id).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn listing(id: &str, sector: Sector) -> Listing {
        Listing {
            id: id.to_string(),
            name: format!("Agent {}", id),
            tagline: "Tagline".to_string(),
            description: "Does things".to_string(),
            creator: "Acme".to_string(),
            sector,
            pricing: Pricing { monthly: 10.0, yearly: 100.0 },
            rating: 4.0,
            reviews_count: 3,
            capabilities: vec!["One".to_string()],
            image_url: "https://example.com/a.png".to_string(),
            demo_prompt: None,
        }
    }

    #[test]
    fn test_builtin_ids_unique_and_get_returns_same_listing() {
        let catalog = Catalog::builtin().unwrap();
        assert!(!catalog.is_empty());

        let ids: HashSet<&str> = catalog.list().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids.len(), catalog.len());

        for listing in catalog.list() {
            assert_eq!(catalog.get(&listing.id).unwrap(), listing);
        }
    }

    #[test]
    fn test_get_unknown_id() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(
            catalog.get("does-not-exist"),
            Err(CatalogError::NotFound("does-not-exist".to_string()))
        );
    }

    #[test]
    fn test_builtin_listing_fields() {
        let catalog = Catalog::builtin().unwrap();
        let support = catalog.get("3").unwrap();
        assert_eq!(support.name, "SupportWise");
        assert_eq!(support.sector, Sector::CustomerSupport);
        assert_eq!(support.pricing.monthly, 99.0);
        assert_eq!(support.reviews_count, 342);
        assert!(support.demo_prompt.is_some());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = Catalog::from_listings(vec![
            listing("a", Sector::Sales),
            listing("a", Sector::Legal),
        ]);
        assert_eq!(result.unwrap_err(), CatalogError::DuplicateId("a".to_string()));
    }

    #[test]
    fn test_rating_out_of_range_rejected() {
        let mut bad = listing("a", Sector::Sales);
        bad.rating = 5.5;
        assert!(matches!(
            Catalog::from_listings(vec![bad]),
            Err(CatalogError::RatingOutOfRange { .. })
        ));
    }

    #[test]
    fn test_sector_filter_returns_exact_subset() {
        let catalog = Catalog::builtin().unwrap();

        for sector in Sector::all() {
            let filtered = catalog.filter(&SectorFilter::Only(sector), "");
            let expected: Vec<&Listing> =
                catalog.list().iter().filter(|l| l.sector == sector).collect();
            assert_eq!(filtered, expected);
        }
    }

    #[test]
    fn test_all_filter_returns_full_catalog() {
        let catalog = Catalog::builtin().unwrap();
        let all = catalog.filter(&SectorFilter::All, "");
        assert_eq!(all.len(), catalog.len());
        assert!(all.iter().zip(catalog.list()).all(|(a, b)| *a == b));
    }

    #[test]
    fn test_search_matches_name_or_description() {
        let catalog = Catalog::builtin().unwrap();

        let by_name = catalog.filter(&SectorFilter::All, "chartmaster");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, "4");

        let by_description = catalog.filter(&SectorFilter::All, "NDAs");
        assert_eq!(by_description.len(), 1);
        assert_eq!(by_description[0].id, "5");

        let mismatched_sector =
            catalog.filter(&SectorFilter::Only(Sector::Sales), "chartmaster");
        assert!(mismatched_sector.is_empty());
    }

    #[test]
    fn test_owned_by_follows_ledger() {
        let catalog = Catalog::builtin().unwrap();
        let mut ledger = PurchaseLedger::new();
        ledger.record("4");
        ledger.record("missing");
        ledger.record("2");

        let owned: Vec<&str> = catalog.owned_by(&ledger).iter().map(|l| l.id.as_str()).collect();
        assert_eq!(owned, vec!["4", "2"]);
    }

    #[test]
    fn test_sector_labels_round_trip() {
        for sector in Sector::all() {
            assert_eq!(Sector::from_label(sector.label()), Some(sector));
        }
        assert_eq!(Sector::from_label("customer support"), Some(Sector::CustomerSupport));
        assert_eq!(Sector::Legal.next(), Sector::Sales);
        assert_eq!(Sector::Sales.prev(), Sector::Legal);
    }

    #[tokio::test]
    async fn test_load_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&vec![listing("x", Sector::Creative)]).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let catalog = Catalog::load_from_json(file.path()).await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("x").unwrap().sector, Sector::Creative);
    }
}
