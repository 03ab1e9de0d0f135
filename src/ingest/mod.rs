pub mod normalize;
pub mod reference;
pub mod resources;
pub mod row;
pub mod validate;

pub use normalize::{Diagnostic, Lookups, NormalizedCatalog, normalize_file};
pub use reference::{KeyRule, load_reference_table};
pub use validate::validate_csv;
