//! Portion scaling: one bounded factor applied to every selected dish.

use tracing::{debug, info};

use crate::config::ScalingConfig;
use crate::models::{Dish, ExactPortion, NutrientMap, NutrientRange};

const EPSILON: f64 = 1e-6;

/// Sum of nutrient maps.
pub fn total_nutrients<'a, I>(dishes: I) -> NutrientMap
where
    I: IntoIterator<Item = &'a Dish>,
{
    let mut total = NutrientMap::new();
    for dish in dishes {
        for (code, value) in &dish.nutrients {
            *total.entry(code.clone()).or_insert(0.0) += value;
        }
    }
    total
}

/// Why the scaler settled on its factor. Mostly for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    SevereDeficit,
    Shrink,
    GuardedShrink,
    Expand,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePlan {
    pub factor: f64,
    pub decision: ScaleDecision,
}

/// Picks the factor that moves `current` toward `target`.
pub fn plan_scale(
    current: &NutrientMap,
    target: &NutrientRange,
    config: &ScalingConfig,
) -> ScalePlan {
    let mut shrink: Vec<f64> = Vec::new();
    let mut expand: Vec<f64> = Vec::new();
    let mut severe: Option<f64> = None;
    let mut guard_deficit = false;

    for (code, bound) in target.iter() {
        if bound.min <= 0.0 && bound.max <= 0.0 {
            continue;
        }
        let amount = current.get(code).copied().unwrap_or(0.0);
        let high = config.is_high_priority(code);

        if high && bound.min > 0.0 {
            let coverage = amount / bound.min;
            let need = bound.min / amount.max(EPSILON);
            if coverage < config.severe_deficit_ratio {
                let factor = need.min(config.severe_expand_cap);
                severe = Some(severe.map_or(factor, |f: f64| f.max(factor)));
            }
            if coverage < config.deficit_guard_ratio {
                guard_deficit = true;
            }
            if amount < bound.min {
                expand.push(need.min(config.expand_cap));
            }
        }

        if bound.max > 0.0 && amount > bound.max {
            let ratio = bound.max / amount;
            shrink.push(if high {
                ratio.max(config.high_priority_shrink_floor)
            } else {
                ratio
            });
        }
    }

    let (factor, decision) = if let Some(factor) = severe {
        (factor, ScaleDecision::SevereDeficit)
    } else if let Some(smallest) = shrink.iter().copied().reduce(f64::min) {
        if guard_deficit && smallest < config.deficit_guard_floor {
            (config.deficit_guard_floor, ScaleDecision::GuardedShrink)
        } else {
            (smallest, ScaleDecision::Shrink)
        }
    } else if let Some(smallest) = expand.iter().copied().reduce(f64::min) {
        (smallest, ScaleDecision::Expand)
    } else {
        (1.0, ScaleDecision::Unchanged)
    };

    ScalePlan {
        factor: factor.clamp(config.min_factor, config.max_factor),
        decision,
    }
}

/// Applies `factor` to portion grams, nutrients and ingredient weights.
pub fn apply_scale(dish: &mut Dish, factor: f64) {
    let grams = (f64::from(dish.exact_portion.grams) * factor).floor().max(1.0) as u32;
    dish.exact_portion = ExactPortion::from_grams(grams);
    for value in dish.nutrients.values_mut() {
        *value *= factor;
    }
    for ingredient in &mut dish.ingredients {
        ingredient.grams *= factor;
    }
}

/// Plans and applies the factor to the selected dishes; returns the plan.
pub fn scale_portions(
    dishes: &mut [Dish],
    target: &NutrientRange,
    config: &ScalingConfig,
) -> ScalePlan {
    if dishes.is_empty() {
        return ScalePlan {
            factor: 1.0,
            decision: ScaleDecision::Unchanged,
        };
    }
    let current = total_nutrients(dishes.iter());
    let plan = plan_scale(&current, target, config);
    debug!(?current, "nutrients before scaling");
    info!(
        factor = plan.factor,
        decision = ?plan.decision,
        dishes = dishes.len(),
        "portion scaling"
    );

    if plan.decision != ScaleDecision::Unchanged {
        for dish in dishes.iter_mut() {
            apply_scale(dish, plan.factor);
        }
    }
    plan
}
