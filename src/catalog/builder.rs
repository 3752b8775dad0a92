use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::models::{Dish, ExactPortion, FoodIngredient, NutrientMap, TagRef};

/// One flat row of the dish × food × nutrient join.
///
/// A dish with three foods and two allergens on one food arrives as four rows;
/// the builder folds them back together.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogRow {
    pub dish_id: u64,
    pub dish_name: String,
    pub cook_time: u32,
    pub rating: Option<f64>,
    pub default_portion_g: u32,
    pub food_id: u64,
    pub food_name: String,
    pub food_amount_g: f64,
    pub category1: Option<String>,
    pub category2: Option<String>,
    pub is_main_food: bool,
    pub allergen_code: Option<String>,
    pub tags_json: Option<String>,
    pub need_tags: Option<String>,
    /// Canonical nutrient code -> value per 100 g of this food.
    pub nutrients_per_100g: NutrientMap,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    group: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Parses the dish tag payload into `group -> [{code, name}]`.
///
/// Malformed payloads are logged and produce an empty map.
pub fn parse_dish_tags(dish_id: u64, tags_json: Option<&str>) -> BTreeMap<String, Vec<TagRef>> {
    let raw = match tags_json.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return BTreeMap::new(),
    };

    let tags: Vec<RawTag> = match serde_json::from_str(raw) {
        Ok(tags) => tags,
        Err(e) => {
            warn!(dish_id, error = %e, "invalid tags_json, ignoring dish tags");
            return BTreeMap::new();
        }
    };

    let mut grouped: BTreeMap<String, Vec<TagRef>> = BTreeMap::new();
    for tag in tags {
        if let Some(group) = tag.group.filter(|g| !g.is_empty()) {
            grouped.entry(group).or_default().push(TagRef {
                code: tag.code.unwrap_or_default(),
                name: tag.name.unwrap_or_default(),
            });
        }
    }
    grouped
}

fn split_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Groups catalog rows into dishes, preserving first-appearance order of both
/// dishes and their foods.
pub fn build_dishes(rows: &[CatalogRow]) -> Vec<Dish> {
    // dish_id -> (first row, food order, food_id -> rows)
    let mut order: Vec<u64> = Vec::new();
    let mut grouped: HashMap<u64, (Vec<u64>, HashMap<u64, Vec<&CatalogRow>>)> = HashMap::new();

    for row in rows {
        let (food_order, foods) = grouped.entry(row.dish_id).or_insert_with(|| {
            order.push(row.dish_id);
            (Vec::new(), HashMap::new())
        });
        foods
            .entry(row.food_id)
            .or_insert_with(|| {
                food_order.push(row.food_id);
                Vec::new()
            })
            .push(row);
    }

    let dishes: Vec<Dish> = order
        .iter()
        .filter_map(|dish_id| grouped.get(dish_id))
        .filter_map(|(food_order, foods)| build_dish(food_order, foods))
        .collect();

    debug!(rows = rows.len(), dishes = dishes.len(), "catalog built");
    dishes
}

fn build_dish(food_order: &[u64], foods: &HashMap<u64, Vec<&CatalogRow>>) -> Option<Dish> {
    let meta = *foods.get(food_order.first()?)?.first()?;

    let mut ingredients = Vec::with_capacity(food_order.len());
    let mut nutrients = NutrientMap::new();
    let mut allergens = BTreeSet::new();

    for food_id in food_order {
        let Some(food_rows) = foods.get(food_id) else {
            continue;
        };
        let Some(first) = food_rows.first() else {
            continue;
        };

        for row in food_rows {
            if let Some(code) = row
                .allergen_code
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
            {
                allergens.insert(code.to_string());
            }
        }

        let grams = if first.food_amount_g.is_finite() && first.food_amount_g > 0.0 {
            first.food_amount_g
        } else {
            debug!(dish_id = meta.dish_id, food_id, "food amount missing, counting as 0 g");
            0.0
        };

        for (code, per_100g) in &first.nutrients_per_100g {
            *nutrients.entry(code.clone()).or_insert(0.0) += per_100g * grams / 100.0;
        }

        ingredients.push(FoodIngredient {
            food_id: *food_id,
            name: first.food_name.clone(),
            grams,
            category1: first.category1.clone(),
            category2: first.category2.clone(),
            is_main: first.is_main_food,
            nutrients_per_100g: first.nutrients_per_100g.clone(),
        });
    }

    Some(Dish {
        id: meta.dish_id,
        name: meta.dish_name.clone(),
        cook_time: meta.cook_time,
        rating: meta.rating,
        default_portion_g: meta.default_portion_g,
        exact_portion: ExactPortion::from_grams(meta.default_portion_g),
        ingredients,
        nutrients,
        tags: parse_dish_tags(meta.dish_id, meta.tags_json.as_deref()),
        explicit_tags: split_tags(meta.need_tags.as_deref()),
        allergens,
    })
}
