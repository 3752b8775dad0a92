use std::collections::BTreeMap;
use tracing::debug;

use super::filter::Candidate;
use super::selector::MealSelector;
use crate::config::CategoryTarget;
use crate::models::FoodCategory;

/// Count of dishes per food category, every category present (possibly 0).
pub fn category_distribution<I>(dishes: I) -> BTreeMap<FoodCategory, u32>
where
    I: IntoIterator<Item = FoodCategory>,
{
    let mut distribution: BTreeMap<FoodCategory, u32> =
        FoodCategory::ALL.iter().map(|c| (*c, 0)).collect();
    for category in dishes {
        *distribution.entry(category).or_insert(0) += 1;
    }
    distribution
}

/// Categories below their minimum, most deficient first.
pub fn deficient_categories(
    distribution: &BTreeMap<FoodCategory, u32>,
    targets: &BTreeMap<FoodCategory, CategoryTarget>,
) -> Vec<(FoodCategory, u32)> {
    let mut deficits: Vec<(FoodCategory, u32)> = targets
        .iter()
        .filter_map(|(category, target)| {
            let have = distribution.get(category).copied().unwrap_or(0);
            (have < target.min).then(|| (*category, target.min - have))
        })
        .collect();
    // stable: equal deficits keep category order
    deficits.sort_by(|a, b| b.1.cmp(&a.1));
    deficits
}

/// Backfills under-represented categories into at most `open_places` free
/// places of the meal. Returns the number of dishes added.
pub fn balance_categories(
    selector: &mut MealSelector<'_>,
    targets: &BTreeMap<FoodCategory, CategoryTarget>,
    open_places: u32,
) -> u32 {
    let mut left = open_places;
    if left == 0 {
        return 0;
    }

    let distribution = selected_distribution(selector);
    let mut added = 0;
    for (category, deficit) in deficient_categories(&distribution, targets) {
        if left == 0 {
            break;
        }
        let got = selector.fill_from_pool(deficit.min(left), |c| c.category == category);
        debug!(category = ?category, deficit, got, "category backfill");
        left -= got;
        added += got;
    }
    added
}

/// Fills open places one dish at a time, skipping dishes whose category has
/// already reached its maximum. Categories without a target are uncapped.
pub fn fill_within_caps(
    selector: &mut MealSelector<'_>,
    targets: &BTreeMap<FoodCategory, CategoryTarget>,
    open_places: u32,
) -> u32 {
    let mut added = 0;
    while added < open_places {
        let distribution = selected_distribution(selector);
        let got = selector.fill_from_pool(1, |c| match targets.get(&c.category) {
            Some(target) => distribution.get(&c.category).copied().unwrap_or(0) < target.max,
            None => true,
        });
        if got == 0 {
            break;
        }
        added += got;
    }
    debug!(open_places, added, "capped top-up");
    added
}

fn selected_distribution(selector: &MealSelector<'_>) -> BTreeMap<FoodCategory, u32> {
    let categories = selector.selected().iter().map(|c: &Candidate<'_>| c.category);
    category_distribution(categories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::models::{
        Dish, ExactPortion, FoodIngredient, MealStructure, MealType, NutrientRange, Slot,
    };

    fn target(min: u32, max: u32) -> CategoryTarget {
        CategoryTarget { min, max }
    }

    fn dish(id: u64) -> Dish {
        Dish {
            id,
            name: format!("dish-{}", id),
            cook_time: 10,
            rating: None,
            default_portion_g: 150,
            exact_portion: ExactPortion::from_grams(150),
            ingredients: vec![FoodIngredient {
                food_id: id,
                name: format!("food-{}", id),
                grams: 100.0,
                category1: None,
                category2: None,
                is_main: true,
                nutrients_per_100g: Default::default(),
            }],
            nutrients: Default::default(),
            tags: Default::default(),
            explicit_tags: Vec::new(),
            allergens: Default::default(),
        }
    }

    #[test]
    fn test_deficient_categories_ranked() {
        let distribution = category_distribution([FoodCategory::Protein, FoodCategory::Cereal]);
        let targets: BTreeMap<_, _> = [
            (FoodCategory::Cereal, target(1, 2)),
            (FoodCategory::Protein, target(1, 2)),
            (FoodCategory::VegeFruit, target(2, 3)),
            (FoodCategory::DairyBean, target(1, 1)),
        ]
        .into_iter()
        .collect();

        let deficits = deficient_categories(&distribution, &targets);
        assert_eq!(deficits, vec![(FoodCategory::VegeFruit, 2), (FoodCategory::DairyBean, 1)]);
        assert_eq!(distribution[&FoodCategory::Oil], 0);
    }

    fn side_bucket<'a>(
        dishes: &'a [Dish],
        categories: &[FoodCategory],
    ) -> BTreeMap<Slot, Vec<Candidate<'a>>> {
        let candidates = dishes
            .iter()
            .zip(categories.iter().copied())
            .map(|(dish, category)| Candidate {
                dish,
                slot: Slot::SideDish,
                category,
            })
            .collect::<Vec<_>>();
        [(Slot::SideDish, candidates)].into_iter().collect()
    }

    #[test]
    fn test_backfill_prefers_missing_category() {
        let dishes: Vec<Dish> = (1..=4).map(dish).collect();
        let categories = [
            FoodCategory::Protein,
            FoodCategory::Protein,
            FoodCategory::VegeFruit,
            FoodCategory::Cereal,
        ];
        let buckets = side_bucket(&dishes, &categories);

        let config = ScoringConfig::default();
        let range = NutrientRange::default();
        let mut selector =
            MealSelector::new(buckets, MealType::Lunch, 11, "", &[], &range, &config);
        let targets: BTreeMap<_, _> = [(FoodCategory::VegeFruit, target(1, 2))]
            .into_iter()
            .collect();

        let added = balance_categories(&mut selector, &targets, 2);
        assert_eq!(added, 1);
        assert_eq!(selector.selected()[0].category, FoodCategory::VegeFruit);

        // generic supplement takes care of the rest
        let structure = MealStructure {
            side_dish: 3,
            ..Default::default()
        };
        assert_eq!(selector.supplement(&structure), 2);
        assert_eq!(balance_categories(&mut selector, &targets, 0), 0);
    }

    #[test]
    fn test_top_up_stops_at_category_max() {
        let dishes: Vec<Dish> = (1..=4).map(dish).collect();
        let categories = [
            FoodCategory::Protein,
            FoodCategory::Protein,
            FoodCategory::Protein,
            FoodCategory::VegeFruit,
        ];
        let targets: BTreeMap<_, _> = [(FoodCategory::Protein, target(0, 1))]
            .into_iter()
            .collect();
        let config = ScoringConfig::default();
        let range = NutrientRange::default();

        for refresh_key in 0..8 {
            let buckets = side_bucket(&dishes, &categories);
            let mut selector = MealSelector::new(
                buckets,
                MealType::Lunch,
                refresh_key,
                "",
                &[],
                &range,
                &config,
            );

            let added = fill_within_caps(&mut selector, &targets, 3);
            assert_eq!(added, 2);
            let distribution = selected_distribution(&selector);
            assert_eq!(distribution[&FoodCategory::Protein], 1);
            assert_eq!(distribution[&FoodCategory::VegeFruit], 1);
        }
    }
}
