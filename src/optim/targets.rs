use crate::config::EngineConfig;
use crate::models::{MealType, NutrientRange};

/// Scales the daily range down for a calorie deficit: `(baseline - deficit) / baseline`.
///
/// A deficit at or above the baseline would zero every target, so the factor
/// never drops below zero.
pub fn apply_calorie_deficit(
    daily: &NutrientRange,
    deficit_kcal: u32,
    baseline_kcal: f64,
) -> NutrientRange {
    if deficit_kcal == 0 || baseline_kcal <= 0.0 {
        return daily.clone();
    }
    let factor = ((baseline_kcal - f64::from(deficit_kcal)) / baseline_kcal).max(0.0);
    daily.scaled(factor)
}

/// Per-meal share of the (already deficit-adjusted) daily range.
pub fn meal_range(daily: &NutrientRange, meal: MealType, config: &EngineConfig) -> NutrientRange {
    daily.scaled(config.meal_ratio(meal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NutrientBound;
    use approx::assert_relative_eq;

    fn daily() -> NutrientRange {
        let mut range = NutrientRange::default();
        range.accumulate(
            "Protein",
            NutrientBound {
                min: 60.0,
                max: 100.0,
                need: 80.0,
            },
        );
        range.accumulate(
            "EnergyKCal",
            NutrientBound {
                min: 1800.0,
                max: 2400.0,
                need: 2000.0,
            },
        );
        range
    }

    #[test]
    fn test_meal_ratios_sum_to_daily() {
        let config = EngineConfig::default();
        let daily = daily();
        let protein = |meal: MealType| {
            meal_range(&daily, meal, &config)
                .get("Protein")
                .copied()
                .unwrap_or_default()
        };
        let total: f64 = MealType::DAILY.iter().map(|m| protein(*m).need).sum();
        assert_relative_eq!(total, 80.0, epsilon = 1e-9);
        assert_relative_eq!(protein(MealType::Lunch).min, 24.0, epsilon = 1e-9);
    }

    #[test]
    fn test_calorie_deficit_scales_everything() {
        let adjusted = apply_calorie_deficit(&daily(), 500, 2000.0);
        let kcal = adjusted.get("EnergyKCal").copied().unwrap_or_default();
        assert_relative_eq!(kcal.need, 1500.0);
        assert_relative_eq!(adjusted.get("Protein").map(|b| b.max).unwrap_or(0.0), 75.0);

        let floored = apply_calorie_deficit(&daily(), 5000, 2000.0);
        assert_relative_eq!(floored.get("Protein").map(|b| b.need).unwrap_or(-1.0), 0.0);
        assert_eq!(apply_calorie_deficit(&daily(), 0, 2000.0), daily());
    }
}
