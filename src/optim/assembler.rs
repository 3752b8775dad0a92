//! Packages a finished meal into a `ComboMeal`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

use super::balancer::category_distribution;
use super::portion::total_nutrients;
use super::scoring::{combo_id, meal_seed};
use crate::models::{ComboDish, ComboMeal, MealType, NutrientRange};

const NEED_LABELS: &[(&str, &str)] = &[
    ("HIGH_CALCIUM", "高钙"),
    ("HIGH_PROTEIN", "高蛋白"),
    ("LOW_FAT", "低脂"),
    ("HIGH_FIBER", "高纤"),
    ("LOW_SODIUM", "低钠"),
    ("LOW_SUGAR", "低糖"),
    ("RICH_IRON", "富铁"),
    ("RICH_VITAMIN", "富维"),
    ("BALANCED", "均衡"),
];

const MAX_NAME_LABELS: usize = 2;

/// Diet-need codes carried by the selected dishes, first appearance first.
pub fn covered_need_codes(dishes: &[ComboDish]) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for entry in dishes.iter().filter(|d| d.is_selected()) {
        for code in &entry.dish.explicit_tags {
            if !codes.contains(code) {
                codes.push(code.clone());
            }
        }
    }
    codes
}

/// "高蛋白·低脂午餐" style name; "营养午餐" when no known need is covered.
pub fn combo_name(meal: MealType, need_codes: &[String]) -> String {
    let labels: Vec<&str> = need_codes
        .iter()
        .filter_map(|code| {
            NEED_LABELS
                .iter()
                .find(|(known, _)| known == code)
                .map(|(_, label)| *label)
        })
        .take(MAX_NAME_LABELS)
        .collect();

    if labels.is_empty() {
        format!("营养{}", meal.display_name())
    } else {
        format!("{}{}", labels.join("·"), meal.display_name())
    }
}

/// Ingredient name -> total grams over the selected dishes.
pub fn shopping_list(dishes: &[ComboDish]) -> BTreeMap<String, f64> {
    let mut list = BTreeMap::new();
    for entry in dishes.iter().filter(|d| d.is_selected()) {
        for ingredient in &entry.dish.ingredients {
            *list.entry(ingredient.name.clone()).or_insert(0.0) += ingredient.grams;
        }
    }
    list
}

/// Builds the combo. Totals, distribution and shopping list only count
/// selected dishes; alternatives ride along for display.
pub fn assemble(
    meal: MealType,
    refresh_key: u64,
    dishes: Vec<ComboDish>,
    need_nutrients: NutrientRange,
    scale_factor: f64,
) -> ComboMeal {
    let mut rng = ChaCha8Rng::seed_from_u64(meal_seed(refresh_key, meal));
    let nonce: u32 = rng.gen();

    let need_codes = covered_need_codes(&dishes);
    let selected = dishes.iter().filter(|d| d.is_selected());

    ComboMeal {
        combo_id: combo_id(meal, nonce),
        combo_name: combo_name(meal, &need_codes),
        meal_type: meal,
        total_cook_time: selected.clone().map(|d| d.dish.cook_time).sum(),
        nutrients: total_nutrients(selected.clone().map(|d| &d.dish)),
        category_distribution: category_distribution(selected.map(|d| d.food_category)),
        shopping_list: shopping_list(&dishes),
        need_nutrients,
        need_codes,
        scale_factor,
        dishes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dish, DishRole, ExactPortion, FoodCategory, FoodIngredient, Slot};
    use approx::assert_relative_eq;

    fn entry(id: u64, role: DishRole, tags: &[&str], category: FoodCategory) -> ComboDish {
        ComboDish {
            dish: Dish {
                id,
                name: format!("dish-{}", id),
                cook_time: 10 * id as u32,
                rating: None,
                default_portion_g: 150,
                exact_portion: ExactPortion::from_grams(150),
                ingredients: vec![FoodIngredient {
                    food_id: 1,
                    name: "豆腐".to_string(),
                    grams: 100.0,
                    category1: None,
                    category2: None,
                    is_main: true,
                    nutrients_per_100g: Default::default(),
                }],
                nutrients: [("Protein".to_string(), 8.0)].into_iter().collect(),
                tags: Default::default(),
                explicit_tags: tags.iter().map(|t| t.to_string()).collect(),
                allergens: Default::default(),
            },
            role,
            slot: Slot::SideDish,
            food_category: category,
        }
    }

    #[test]
    fn test_combo_name_labels() {
        let codes = vec![
            "SPICY".to_string(),
            "HIGH_PROTEIN".to_string(),
            "LOW_FAT".to_string(),
            "HIGH_FIBER".to_string(),
        ];
        assert_eq!(combo_name(MealType::Lunch, &codes), "高蛋白·低脂午餐");
        assert_eq!(combo_name(MealType::Dinner, &[]), "营养晚餐");
        assert_eq!(combo_name(MealType::Breakfast, &["SPICY".to_string()]), "营养早餐");
    }

    #[test]
    fn test_assemble_counts_selected_only() {
        let dishes = vec![
            entry(1, DishRole::Selected, &["HIGH_CALCIUM"], FoodCategory::DairyBean),
            entry(2, DishRole::Selected, &["HIGH_CALCIUM", "LOW_FAT"], FoodCategory::VegeFruit),
            entry(3, DishRole::Alternative, &["HIGH_PROTEIN"], FoodCategory::Protein),
        ];
        let combo = assemble(MealType::Dinner, 7, dishes, NutrientRange::default(), 1.0);

        assert_eq!(combo.total_cook_time, 30);
        assert_relative_eq!(combo.nutrients["Protein"], 16.0);
        assert_relative_eq!(combo.shopping_list["豆腐"], 200.0);
        assert_eq!(combo.need_codes, vec!["HIGH_CALCIUM", "LOW_FAT"]);
        assert_eq!(combo.combo_name, "高钙·低脂晚餐");
        assert_eq!(combo.category_distribution[&FoodCategory::Protein], 0);
        assert_eq!(combo.category_distribution[&FoodCategory::DairyBean], 1);
        assert_eq!(combo.alternatives().count(), 1);
        assert!(combo.combo_id < 100_000);
    }

    #[test]
    fn test_combo_id_is_seeded() {
        let empty = || {
            assemble(
                MealType::Lunch,
                99,
                Vec::new(),
                NutrientRange::default(),
                1.0,
            )
        };
        let (a, b) = (empty(), empty());
        assert_eq!(a.combo_id, b.combo_id);
    }
}
