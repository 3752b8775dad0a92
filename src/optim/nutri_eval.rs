use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{NutrientBound, NutrientMap, NutrientRange};

const EPSILON: f64 = 1e-6;

/// How one nutrient of a combo compares to the meal's target range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NutrientCoverage {
    pub achieved: f64,
    pub target: f64,
    pub coverage: f64,
    pub in_range: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ComboEvaluation {
    pub nutrients: BTreeMap<String, NutrientCoverage>,
    pub mse: f64,
}

impl ComboEvaluation {
    pub fn in_range_count(&self) -> usize {
        self.nutrients.values().filter(|c| c.in_range).count()
    }
}

/// Point target for a bound: the explicit need, else the range midpoint.
fn point_target(bound: &NutrientBound) -> f64 {
    if bound.need > 0.0 {
        bound.need
    } else {
        (bound.min + bound.max) / 2.0
    }
}

/// Calculates the mean squared relative deviation between what a combo
/// delivers and what the meal was asked to deliver.
///
/// Relative deviations keep kcal from drowning out grams of fibre.
/// Only nutrients present in both maps with a non-zero target count.
///
/// # Arguments
/// * `achieved`: summed nutrients of the selected dishes.
/// * `target`: the meal's nutrient range.
///
/// # Returns
/// The MSE, or 0.0 when nothing could be compared.
pub fn calculate_mse(achieved: &NutrientMap, target: &NutrientRange) -> f64 {
    let mut squared_error_sum = 0.0;
    let mut count = 0;

    for (code, bound) in target.iter() {
        let goal = point_target(bound);
        if goal <= 0.0 {
            continue;
        }
        if let Some(value) = achieved.get(code) {
            squared_error_sum += ((value - goal) / goal).powi(2);
            count += 1;
        }
    }

    if count == 0 {
        0.0
    } else {
        squared_error_sum / count as f64
    }
}

/// Per-nutrient coverage plus the overall MSE.
pub fn evaluate(achieved: &NutrientMap, target: &NutrientRange) -> ComboEvaluation {
    let nutrients = target
        .iter()
        .map(|(code, bound)| {
            let value = achieved.get(code).copied().unwrap_or(0.0);
            let goal = point_target(bound);
            let coverage = NutrientCoverage {
                achieved: value,
                target: goal,
                coverage: value / goal.max(EPSILON),
                in_range: value >= bound.min && (bound.max <= 0.0 || value <= bound.max),
            };
            (code.clone(), coverage)
        })
        .collect();

    ComboEvaluation {
        nutrients,
        mse: calculate_mse(achieved, target),
    }
}
