use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::models::{
    Dish, FoodCategory, MealType, Slot, CARBOHYDRATE, PROTEIN, TAG_CATEGORY, TAG_CUISINE,
    TAG_MEAL_TIME, TAG_PEOPLE, TAG_STAPLE, TAG_VEGE,
};

/// Hard constraints for one meal run.
#[derive(Debug, Clone)]
pub struct DishFilter<'a> {
    pub meal: Option<MealType>,
    pub cook_time_limit: Option<u32>,
    pub cuisines: &'a [String],
    pub allergens: &'a BTreeSet<String>,
}

impl DishFilter<'_> {
    pub fn accepts(&self, dish: &Dish) -> bool {
        let meal_ok = match self.meal {
            None | Some(MealType::All) => true,
            Some(meal) => dish.has_tag(TAG_MEAL_TIME, meal.code()),
        };
        let time_ok = self
            .cook_time_limit
            .map_or(true, |limit| dish.cook_time <= limit);
        let cuisine_ok = self.cuisines.is_empty()
            || dish
                .tag_codes(TAG_CUISINE)
                .any(|c| self.cuisines.iter().any(|wanted| wanted == c));
        let allergen_ok = dish.allergens.is_disjoint(self.allergens);

        meal_ok && time_ok && cuisine_ok && allergen_ok
    }

    pub fn apply<'d>(&self, dishes: &'d [Dish]) -> Vec<&'d Dish> {
        let kept: Vec<&Dish> = dishes.iter().filter(|d| self.accepts(d)).collect();
        debug!(
            meal = ?self.meal,
            total = dishes.len(),
            kept = kept.len(),
            "dish filter applied"
        );
        kept
    }
}

/// Structural slot for a dish, first matching rule wins.
pub fn classify_slot(dish: &Dish) -> Slot {
    if dish.has_tag(TAG_STAPLE, "yes") {
        return Slot::Staple;
    }
    for code in dish.tag_codes(TAG_VEGE) {
        match code {
            "meat" | "seafood" => return Slot::MainDish,
            "vege" | "vegan" | "egg" => return Slot::SideDish,
            _ => {}
        }
    }
    if dish.has_tag(TAG_CATEGORY, "soup") {
        return Slot::Soup;
    }
    if dish.has_tag(TAG_PEOPLE, "baby") {
        return Slot::BabyFood;
    }

    let protein = dish.nutrient(PROTEIN);
    let carbs = dish.nutrient(CARBOHYDRATE);
    if carbs > 40.0 && protein < 10.0 {
        Slot::Staple
    } else if protein > 20.0 {
        Slot::MainDish
    } else {
        // protein > 8 reads as a side dish, and so does everything left over
        Slot::SideDish
    }
}

/// Food category from main ingredients only; heaviest category wins.
pub fn classify_food_category(dish: &Dish) -> FoodCategory {
    let mut weights: BTreeMap<FoodCategory, f64> = BTreeMap::new();
    for ingredient in dish.ingredients.iter().filter(|i| i.is_main) {
        let category = ingredient
            .category1
            .as_deref()
            .and_then(FoodCategory::from_label)
            .or_else(|| {
                ingredient
                    .category2
                    .as_deref()
                    .and_then(FoodCategory::from_label)
            })
            .unwrap_or(FoodCategory::Other);
        *weights.entry(category).or_insert(0.0) += ingredient.grams;
    }

    // BTreeMap order breaks weight ties deterministically
    weights
        .into_iter()
        .fold(None, |best: Option<(FoodCategory, f64)>, (category, grams)| match best {
            Some((_, best_grams)) if best_grams >= grams => best,
            _ => Some((category, grams)),
        })
        .map(|(category, _)| category)
        .unwrap_or(FoodCategory::Other)
}

/// A filtered dish with both classifications attached.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub dish: &'a Dish,
    pub slot: Slot,
    pub category: FoodCategory,
}

/// Classifies every dish into fresh per-slot buckets.
pub fn categorize<'a>(dishes: &[&'a Dish]) -> BTreeMap<Slot, Vec<Candidate<'a>>> {
    let mut buckets: BTreeMap<Slot, Vec<Candidate<'a>>> =
        Slot::SELECTION_ORDER.iter().map(|s| (*s, Vec::new())).collect();
    for &dish in dishes {
        let candidate = Candidate {
            dish,
            slot: classify_slot(dish),
            category: classify_food_category(dish),
        };
        buckets.entry(candidate.slot).or_default().push(candidate);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExactPortion, FoodIngredient, TagRef};

    fn dish(id: u64, tags: &[(&str, &str)]) -> Dish {
        let mut tag_map: BTreeMap<String, Vec<TagRef>> = BTreeMap::new();
        for (group, code) in tags {
            tag_map.entry(group.to_string()).or_default().push(TagRef {
                code: code.to_string(),
                name: String::new(),
            });
        }
        Dish {
            id,
            name: format!("dish-{}", id),
            cook_time: 20,
            rating: None,
            default_portion_g: 200,
            exact_portion: ExactPortion::from_grams(200),
            ingredients: Vec::new(),
            nutrients: Default::default(),
            tags: tag_map,
            explicit_tags: Vec::new(),
            allergens: BTreeSet::new(),
        }
    }

    fn ingredient(grams: f64, category: &str, is_main: bool) -> FoodIngredient {
        FoodIngredient {
            food_id: grams as u64,
            name: category.to_string(),
            grams,
            category1: Some(category.to_string()),
            category2: None,
            is_main,
            nutrients_per_100g: Default::default(),
        }
    }

    #[test]
    fn test_slot_rules_in_priority_order() {
        let cases = [
            (dish(1, &[("staple", "yes"), ("vege", "meat")]), Slot::Staple),
            (dish(2, &[("vege", "seafood"), ("category", "soup")]), Slot::MainDish),
            (dish(3, &[("vege", "egg")]), Slot::SideDish),
            (dish(4, &[("category", "soup"), ("people", "baby")]), Slot::Soup),
            (dish(5, &[("people", "baby")]), Slot::BabyFood),
        ];
        for (d, expected) in &cases {
            assert_eq!(classify_slot(d), *expected, "dish {}", d.id);
        }
    }

    #[test]
    fn test_slot_nutrient_heuristic() {
        let mut d = dish(6, &[]);
        d.nutrients.insert(CARBOHYDRATE.to_string(), 55.0);
        d.nutrients.insert(PROTEIN.to_string(), 6.0);
        assert_eq!(classify_slot(&d), Slot::Staple);
        d.nutrients.insert(PROTEIN.to_string(), 25.0);
        assert_eq!(classify_slot(&d), Slot::MainDish);
        d.nutrients.insert(CARBOHYDRATE.to_string(), 20.0);
        d.nutrients.insert(PROTEIN.to_string(), 9.0);
        assert_eq!(classify_slot(&d), Slot::SideDish);
        d.nutrients.insert(PROTEIN.to_string(), 8.0);
        assert_eq!(classify_slot(&d), Slot::SideDish);
        assert_eq!(classify_slot(&dish(7, &[])), Slot::SideDish);
    }

    #[test]
    fn test_food_category_uses_main_ingredients_only() {
        let mut d = dish(8, &[]);
        d.ingredients = vec![
            ingredient(300.0, "蔬菜类", false),
            ingredient(150.0, "畜肉类", true),
            ingredient(50.0, "谷类", true),
        ];
        assert_eq!(classify_food_category(&d), FoodCategory::Protein);
        d.ingredients.iter_mut().for_each(|i| i.is_main = false);
        assert_eq!(classify_food_category(&d), FoodCategory::Other);
    }

    #[test]
    fn test_filter_constraints() {
        let allergens: BTreeSet<String> = ["peanut".to_string()].into_iter().collect();
        let cuisines = vec!["sichuan".to_string()];
        let filter = DishFilter {
            meal: Some(MealType::Lunch),
            cook_time_limit: Some(30),
            cuisines: &cuisines,
            allergens: &allergens,
        };

        let ok = dish(1, &[("meal_time", "lunch"), ("cuisine", "sichuan")]);
        assert!(filter.accepts(&ok));

        let mut slow = ok.clone();
        slow.cook_time = 45;
        assert!(!filter.accepts(&slow));

        let mut nutty = ok.clone();
        nutty.allergens.insert("peanut".to_string());
        assert!(!filter.accepts(&nutty));

        let dinner = dish(2, &[("meal_time", "dinner"), ("cuisine", "sichuan")]);
        assert!(!filter.accepts(&dinner));
        let cantonese = dish(3, &[("meal_time", "lunch"), ("cuisine", "cantonese")]);
        assert!(!filter.accepts(&cantonese));

        let none = BTreeSet::new();
        let any_meal = DishFilter {
            meal: Some(MealType::All),
            cook_time_limit: None,
            cuisines: &[],
            allergens: &none,
        };
        assert!(any_meal.accepts(&dish(4, &[])));
    }

    #[test]
    fn test_categorize_builds_fresh_buckets() {
        let a = dish(1, &[("vege", "meat")]);
        let b = dish(2, &[("category", "soup")]);
        let first = categorize(&[&a, &b]);
        assert_eq!(first[&Slot::MainDish].len(), 1);
        assert_eq!(first[&Slot::Soup].len(), 1);

        let second = categorize(&[&a]);
        assert_eq!(second[&Slot::MainDish].len(), 1);
        assert!(second[&Slot::Soup].is_empty());
    }
}
