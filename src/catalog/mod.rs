pub mod builder;
pub mod loader;

pub use builder::{build_dishes, parse_dish_tags, CatalogRow};
pub use loader::{load_catalog_rows, CatalogFeed, CsvCatalog, NUTRIENT_COLUMNS};
