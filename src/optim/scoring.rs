//! Candidate scoring and the request-scoped seeds behind the shuffles.

use serde::Serialize;

use crate::config::ScoringConfig;
use crate::models::{Dish, MealType, NutrientMap};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0001_0000_01b3;

fn fnv1a(mut state: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        state ^= u64::from(*byte);
        state = state.wrapping_mul(FNV_PRIME);
    }
    state
}

/// Seed for the shuffle of one slot in one meal.
///
/// Stable across runs and platforms: FNV-1a over the refresh key, the meal
/// code and the slot's position in the selection order.
pub fn slot_seed(refresh_key: u64, meal: MealType, slot_index: u64) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    hash = fnv1a(hash, &refresh_key.to_le_bytes());
    hash = fnv1a(hash, meal.code().as_bytes());
    fnv1a(hash, &slot_index.to_le_bytes())
}

/// Seed for everything in a meal that is not a slot shuffle (combo id, supplements).
pub fn meal_seed(refresh_key: u64, meal: MealType) -> u64 {
    let hash = fnv1a(FNV_OFFSET_BASIS, &refresh_key.to_le_bytes());
    fnv1a(hash, meal.code().as_bytes())
}

/// Hash of a meal code and a random draw, folded into a five-digit id.
pub fn combo_id(meal: MealType, nonce: u32) -> u64 {
    let hash = fnv1a(FNV_OFFSET_BASIS, meal.code().as_bytes());
    fnv1a(hash, &nonce.to_le_bytes()) % 100_000
}

/// Splits the free-text want-eat string into match terms.
pub fn want_terms(want_eat: &str) -> Vec<String> {
    want_eat
        .split(|c: char| matches!(c, ',' | '，' | '、' | ';' | '；') || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Raw want-eat bonus before any saturation throttle.
pub fn want_eat_bonus(dish: &Dish, terms: &[String], config: &ScoringConfig) -> f64 {
    let mut bonus = 0.0;
    for term in terms {
        if dish.name == *term {
            bonus += config.want_exact_name;
        } else if dish.name.contains(term.as_str()) {
            bonus += config.want_partial_name;
        }

        if dish.ingredients.iter().any(|i| i.name == *term) {
            bonus += config.want_exact_ingredient;
        } else if dish.ingredients.iter().any(|i| {
            !i.name.is_empty() && (i.name.contains(term.as_str()) || term.contains(i.name.as_str()))
        }) {
            bonus += config.want_partial_ingredient;
        }
    }
    bonus.min(config.want_bonus_cap)
}

/// Bonus for supplying nutrients that are still short of target.
pub fn deficit_bonus(dish: &Dish, remaining_need: &NutrientMap, config: &ScoringConfig) -> f64 {
    let bonus: f64 = remaining_need
        .iter()
        .filter(|(_, need)| **need > 0.0)
        .filter_map(|(code, need)| {
            let provides = dish.nutrient(code);
            (provides > 0.0).then(|| {
                ((provides / need).min(config.deficit_ratio_cap) * config.deficit_weight).trunc()
            })
        })
        .sum();
    bonus.min(config.deficit_bonus_cap)
}

/// Everything the scorer needs to know about the meal being built.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    pub desired_tags: &'a [String],
    pub want_terms: &'a [String],
    pub remaining_need: &'a NutrientMap,
    pub accepted_want_eat: usize,
    pub config: &'a ScoringConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub tags: f64,
    pub want_eat_raw: f64,
    pub want_eat: f64,
    pub deficit: f64,
    pub total: f64,
}

pub fn score_dish(dish: &Dish, ctx: &ScoreContext<'_>) -> ScoreBreakdown {
    let matched = dish
        .explicit_tags
        .iter()
        .filter(|t| ctx.desired_tags.contains(t))
        .count();
    let tags = dish.explicit_tags.len() as f64 + matched as f64 * ctx.config.tag_match_bonus;

    let want_eat_raw = want_eat_bonus(dish, ctx.want_terms, ctx.config);
    let multiplier = if ctx.accepted_want_eat >= ctx.config.want_saturation {
        ctx.config.want_throttle
    } else {
        1.0
    };
    let want_eat = want_eat_raw * multiplier;
    let deficit = deficit_bonus(dish, ctx.remaining_need, ctx.config);

    ScoreBreakdown {
        tags,
        want_eat_raw,
        want_eat,
        deficit,
        total: tags + want_eat + deficit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExactPortion, FoodIngredient};
    use approx::assert_relative_eq;

    fn dish(name: &str, ingredient: &str) -> Dish {
        Dish {
            id: 1,
            name: name.to_string(),
            cook_time: 10,
            rating: None,
            default_portion_g: 200,
            exact_portion: ExactPortion::from_grams(200),
            ingredients: vec![FoodIngredient {
                food_id: 1,
                name: ingredient.to_string(),
                grams: 150.0,
                category1: None,
                category2: None,
                is_main: true,
                nutrients_per_100g: Default::default(),
            }],
            nutrients: [("Protein".to_string(), 30.0), ("Calcium".to_string(), 10.0)]
                .into_iter()
                .collect(),
            tags: Default::default(),
            explicit_tags: vec!["HIGH_PROTEIN".to_string(), "LOW_FAT".to_string()],
            allergens: Default::default(),
        }
    }

    #[test]
    fn test_slot_seeds_differ_per_slot_and_meal() {
        let a = slot_seed(42, MealType::Lunch, 0);
        assert_eq!(a, slot_seed(42, MealType::Lunch, 0));
        assert_ne!(a, slot_seed(42, MealType::Lunch, 1));
        assert_ne!(a, slot_seed(42, MealType::Dinner, 0));
        assert_ne!(a, slot_seed(43, MealType::Lunch, 0));
        assert!(combo_id(MealType::Lunch, 7) < 100_000);
    }

    #[test]
    fn test_want_terms_split() {
        let terms = want_terms("鸡胸肉，西兰花 tofu");
        assert_eq!(terms, vec!["鸡胸肉", "西兰花", "tofu"]);
        assert!(want_terms("  ").is_empty());
    }

    #[test]
    fn test_want_eat_bonus_levels() {
        let config = ScoringConfig::default();
        let terms = want_terms("鸡胸肉");
        // partial name (4) + exact ingredient (3)
        let bonus = |name: &str, food: &str| want_eat_bonus(&dish(name, food), &terms, &config);
        assert_relative_eq!(bonus("香煎鸡胸肉", "鸡胸肉"), 7.0);
        // exact name (6) + exact ingredient (3) capped at 8
        assert_relative_eq!(bonus("鸡胸肉", "鸡胸肉"), 8.0);
        assert_relative_eq!(bonus("清炒时蔬", "青菜"), 0.0);
    }

    #[test]
    fn test_deficit_bonus_is_capped() {
        let config = ScoringConfig::default();
        let d = dish("x", "y");
        let mut need = NutrientMap::new();
        need.insert("Protein".to_string(), 20.0); // ratio 1.5 -> 4.5 -> 4
        need.insert("Calcium".to_string(), 100.0); // ratio 0.1 -> 0.3 -> 0
        need.insert("Iron".to_string(), 5.0); // dish has none
        assert_relative_eq!(deficit_bonus(&d, &need, &config), 4.0);

        need.insert("Protein".to_string(), 1.0); // ratio capped at 2 -> 6
        need.insert("Calcium".to_string(), 1.0); // 6
        assert_relative_eq!(deficit_bonus(&d, &need, &config), 10.0);
    }

    #[test]
    fn test_want_eat_bonus_throttled_after_saturation() {
        let config = ScoringConfig::default();
        let desired = vec!["HIGH_PROTEIN".to_string()];
        let terms = want_terms("鸡胸肉");
        let need = NutrientMap::new();
        let mut ctx = ScoreContext {
            desired_tags: &desired,
            want_terms: &terms,
            remaining_need: &need,
            accepted_want_eat: 0,
            config: &config,
        };
        let d = dish("香煎鸡胸肉", "鸡胸肉");

        let fresh = score_dish(&d, &ctx);
        assert_relative_eq!(fresh.tags, 2.0 + 2.0);
        assert_relative_eq!(fresh.want_eat, 7.0);

        ctx.accepted_want_eat = 2;
        let throttled = score_dish(&d, &ctx);
        assert_relative_eq!(throttled.want_eat, fresh.want_eat * 0.2);
        assert!(throttled.want_eat > 0.0);
        assert_relative_eq!(throttled.total, 4.0 + 1.4);
    }
}
