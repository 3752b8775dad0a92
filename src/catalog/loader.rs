use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::builder::CatalogRow;
use crate::models::NutrientMap;

// Required columns
const DISH_ID_COL: &str = "dish_id";
const DISH_NAME_COL: &str = "dish_name";
const COOK_TIME_COL: &str = "cook_time";
const DEFAULT_PORTION_COL: &str = "default_portion_g";
const FOOD_ID_COL: &str = "food_id";
const FOOD_NAME_COL: &str = "food_name";
const FOOD_AMOUNT_COL: &str = "food_amount_g";

// Optional columns
const RATING_COL: &str = "rating";
const CATEGORY1_COL: &str = "category1";
const CATEGORY2_COL: &str = "category2";
const IS_MAIN_COL: &str = "is_main_food";
const ALLERGEN_COL: &str = "allergen_code";
const TAGS_JSON_COL: &str = "tags_json";
const NEED_TAGS_COL: &str = "need_tags";

/// Source column -> canonical nutrient code.
pub const NUTRIENT_COLUMNS: &[(&str, &str)] = &[
    ("protein", "Protein"),
    ("fat", "Fat"),
    ("CHO", "Carbohydrate"),
    ("dietaryFiber", "DietaryFiber"),
    ("ash", "Ash"),
    ("energyKCal", "EnergyKCal"),
    ("energyKJ", "EnergyKJ"),
    ("Ca", "Calcium"),
    ("P", "Phosphorus"),
    ("K", "Potassium"),
    ("Na", "Sodium"),
    ("Mg", "Magnesium"),
    ("Fe", "Iron"),
    ("Zn", "Zinc"),
    ("Se", "Selenium"),
    ("Cu", "Copper"),
    ("Mn", "Manganese"),
    ("vitaminA", "VitaminA"),
    ("carotene", "Carotene"),
    ("retinol", "Retinol"),
    ("thiamin", "Thiamin"),
    ("riboflavin", "Riboflavin"),
    ("niacin", "Niacin"),
    ("vitaminC", "VitaminC"),
    ("vitaminETotal", "VitaminETotal"),
    ("cholesterol", "Cholesterol"),
    ("water", "Water"),
];

/// Where catalog rows come from. The engine never cares whether that is a
/// CSV export, a database view or an in-memory fixture.
pub trait CatalogFeed {
    fn catalog_rows(&self) -> Result<Vec<CatalogRow>>;
}

impl CatalogFeed for Vec<CatalogRow> {
    fn catalog_rows(&self) -> Result<Vec<CatalogRow>> {
        Ok(self.clone())
    }
}

/// Catalog feed backed by a header-indexed CSV export of the dish/food view.
#[derive(Debug, Clone)]
pub struct CsvCatalog {
    path: PathBuf,
}

impl CsvCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvCatalog { path: path.into() }
    }
}

impl CatalogFeed for CsvCatalog {
    fn catalog_rows(&self) -> Result<Vec<CatalogRow>> {
        load_catalog_rows(&self.path)
    }
}

struct Columns {
    dish_id: usize,
    dish_name: usize,
    cook_time: usize,
    default_portion: usize,
    food_id: usize,
    food_name: usize,
    food_amount: usize,
    rating: Option<usize>,
    category1: Option<usize>,
    category2: Option<usize>,
    is_main: Option<usize>,
    allergen: Option<usize>,
    tags_json: Option<usize>,
    need_tags: Option<usize>,
    nutrients: Vec<(usize, &'static str)>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| find(name).ok_or_else(|| anyhow!("Column '{}' not found", name));

        let nutrients = NUTRIENT_COLUMNS
            .iter()
            .filter_map(|(col, code)| find(col).map(|idx| (idx, *code)))
            .collect();

        Ok(Columns {
            dish_id: require(DISH_ID_COL)?,
            dish_name: require(DISH_NAME_COL)?,
            cook_time: require(COOK_TIME_COL)?,
            default_portion: require(DEFAULT_PORTION_COL)?,
            food_id: require(FOOD_ID_COL)?,
            food_name: require(FOOD_NAME_COL)?,
            food_amount: require(FOOD_AMOUNT_COL)?,
            rating: find(RATING_COL),
            category1: find(CATEGORY1_COL),
            category2: find(CATEGORY2_COL),
            is_main: find(IS_MAIN_COL),
            allergen: find(ALLERGEN_COL),
            tags_json: find(TAGS_JSON_COL),
            need_tags: find(NEED_TAGS_COL),
            nutrients,
        })
    }
}

fn parse_optional_f64(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn optional_text(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(str::to_string)
}

fn parse_flag(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y")
}

fn parse_row(record: &StringRecord, cols: &Columns, row_index: usize) -> Result<CatalogRow> {
    let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");
    let parse_id = |idx: usize, name: &str| -> Result<u64> {
        field(idx)
            .parse::<u64>()
            .with_context(|| format!("Invalid {} at row {}", name, row_index))
    };

    let mut nutrients_per_100g = NutrientMap::new();
    for (idx, code) in &cols.nutrients {
        match parse_optional_f64(field(*idx)) {
            Some(value) => {
                nutrients_per_100g.insert(code.to_string(), value);
            }
            None => debug!(row_index, nutrient = code, "nutrient value missing"),
        }
    }

    Ok(CatalogRow {
        dish_id: parse_id(cols.dish_id, DISH_ID_COL)?,
        dish_name: field(cols.dish_name).to_string(),
        cook_time: parse_optional_f64(field(cols.cook_time))
            .map(|v| v.max(0.0) as u32)
            .unwrap_or(0),
        rating: cols.rating.and_then(|i| parse_optional_f64(field(i))),
        default_portion_g: parse_optional_f64(field(cols.default_portion))
            .map(|v| v.max(1.0) as u32)
            .unwrap_or(1),
        food_id: parse_id(cols.food_id, FOOD_ID_COL)?,
        food_name: field(cols.food_name).to_string(),
        food_amount_g: parse_optional_f64(field(cols.food_amount)).unwrap_or(0.0),
        category1: optional_text(record, cols.category1),
        category2: optional_text(record, cols.category2),
        is_main_food: cols.is_main.map(|i| parse_flag(field(i))).unwrap_or(false),
        allergen_code: optional_text(record, cols.allergen),
        tags_json: optional_text(record, cols.tags_json),
        need_tags: optional_text(record, cols.need_tags),
        nutrients_per_100g,
    })
}

pub fn load_catalog_rows(csv_path: &Path) -> Result<Vec<CatalogRow>> {
    if !csv_path.exists() {
        return Err(anyhow!("Catalog CSV file not found at: {:?}", csv_path));
    }

    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open catalog CSV file at {:?}", csv_path))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers = rdr.headers()?.clone();
    let cols = Columns::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result
            .with_context(|| format!("Failed to read record at row index {}", row_index))?;
        rows.push(parse_row(&record, &cols, row_index)?);
    }

    if rows.is_empty() {
        return Err(anyhow!("No catalog rows loaded from {:?}", csv_path));
    }
    debug!(rows = rows.len(), path = ?csv_path, "catalog rows loaded");
    Ok(rows)
}
