use thiserror::Error;

use crate::catalog::Sector;
use crate::generation::GeneratedListingDraft;

const BLANK_CAPABILITY_SLOTS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DraftValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("prices must be greater than zero")]
    InvalidPrice,
    #[error("at least one capability is required")]
    NoCapabilities,
}

/// Editable listing form behind the create wizard
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDraft {
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub sector: Sector,
    pub monthly_price: f64,
    pub yearly_price: f64,
    pub capabilities: Vec<String>,
}

impl Default for ListingDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            tagline: String::new(),
            description: String::new(),
            sector: Sector::Sales,
            monthly_price: 29.0,
            yearly_price: 290.0,
            capabilities: vec![String::new(); BLANK_CAPABILITY_SLOTS],
        }
    }
}

impl ListingDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the text fields from a generated draft. Sector and prices stay
    /// as the user set them.
    pub fn merge_generated(&mut self, generated: GeneratedListingDraft) {
        self.name = generated.name;
        self.tagline = generated.tagline;
        self.description = generated.description;
        self.capabilities = if generated.capabilities.is_empty() {
            vec![String::new(); BLANK_CAPABILITY_SLOTS]
        } else {
            generated.capabilities
        };
    }

    /// Capabilities with blank slots removed
    pub fn filled_capabilities(&self) -> Vec<&str> {
        self.capabilities
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect()
    }

    pub fn validate(&self) -> Result<(), DraftValidationError> {
        if self.name.trim().is_empty() {
            return Err(DraftValidationError::MissingField("name"));
        }
        if self.tagline.trim().is_empty() {
            return Err(DraftValidationError::MissingField("tagline"));
        }
        if self.description.trim().is_empty() {
            return Err(DraftValidationError::MissingField("description"));
        }
        if self.monthly_price <= 0.0 || self.yearly_price <= 0.0 {
            return Err(DraftValidationError::InvalidPrice);
        }
        if self.filled_capabilities().is_empty() {
            return Err(DraftValidationError::NoCapabilities);
        }
        Ok(())
    }
}
