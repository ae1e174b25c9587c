pub mod base;
pub mod npi_registry;
pub mod places_search;

pub use base::{Page, PageSource, PaginationSettings, PlanOutcome, PlanPages, RegistryClient, RetryPolicy};
pub use npi_registry::NpiRegistrySource;
pub use places_search::PlacesSearchSource;
