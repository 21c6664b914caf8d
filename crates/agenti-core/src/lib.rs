pub mod ai;
pub mod catalog;
pub mod config;
pub mod draft;
pub mod generation;
pub mod ledger;
pub mod provider;
pub mod state;

// Re-export main types for convenience
pub use ai::{ChatCompletion, GeminiClient, GenerationBackend, OllamaClient};
pub use catalog::{Catalog, CatalogError, Listing, Pricing, Sector, SectorFilter};
pub use config::Config;
pub use draft::{DraftValidationError, ListingDraft};
pub use generation::{
    BUSY_REPLY, FALLBACK_REPLY, DraftError, GeneratedListingDraft, GenerationClient,
};
pub use ledger::PurchaseLedger;
pub use provider::Provider;
pub use state::{ChatMessage, ChatRole, Conversation, Session, UserRole};
