pub mod categories;
pub mod client;
pub mod mapping;
pub mod products;

pub use categories::build_category_id_map;
pub use client::{CatalogClient, CatalogError};
pub use mapping::{SOURCE_CATEGORY, TARGET_CATEGORY};
pub use products::upload_in_batches;
