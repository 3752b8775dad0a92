use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{FoodCategory, MealType, CARBOHYDRATE, DIETARY_FIBER, ENERGY_KCAL, FAT, PROTEIN};

/// Env var naming an optional JSON file that overrides `EngineConfig::default()`.
pub const CONFIG_ENV_VAR: &str = "MEAL_COMBO_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryTarget {
    pub min: u32,
    pub max: u32,
}

/// Tunables for the whole pipeline. Every field has a default, so a config
/// file only needs the keys it wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // Share of the daily range assigned to each meal
    pub ratio_breakfast: f64,
    pub ratio_lunch: f64,
    pub ratio_dinner: f64,
    pub ratio_single: f64,

    // Cook-time limits used when the request carries none (minutes)
    pub cook_time_breakfast: u32,
    pub cook_time_lunch: u32,
    pub cook_time_dinner: u32,

    /// Daily kcal baseline the deficit is measured against.
    pub deficit_baseline_kcal: f64,

    pub scoring: ScoringConfig,
    pub scaling: ScalingConfig,
    pub category_targets: BTreeMap<MealType, BTreeMap<FoodCategory, CategoryTarget>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub tag_match_bonus: f64,
    pub want_exact_name: f64,
    pub want_partial_name: f64,
    pub want_exact_ingredient: f64,
    pub want_partial_ingredient: f64,
    pub want_bonus_cap: f64,
    /// Accepted want-eat dishes after which the bonus is throttled.
    pub want_saturation: usize,
    pub want_throttle: f64,
    pub deficit_ratio_cap: f64,
    pub deficit_weight: f64,
    pub deficit_bonus_cap: f64,
    pub alternative_ratio: f64,
    pub alternative_min: usize,
    pub alternative_max: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub min_factor: f64,
    pub max_factor: f64,
    pub severe_deficit_ratio: f64,
    pub severe_expand_cap: f64,
    pub expand_cap: f64,
    pub high_priority_shrink_floor: f64,
    pub deficit_guard_ratio: f64,
    pub deficit_guard_floor: f64,
    /// Nutrients at or above this weight count as high priority.
    pub high_priority_weight: f64,
    pub default_weight: f64,
    pub priority_weights: BTreeMap<String, f64>,
}

impl ScalingConfig {
    pub fn weight(&self, nutrient: &str) -> f64 {
        self.priority_weights
            .get(nutrient)
            .copied()
            .unwrap_or(self.default_weight)
    }

    pub fn is_high_priority(&self, nutrient: &str) -> bool {
        self.weight(nutrient) >= self.high_priority_weight
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            tag_match_bonus: 2.0,
            want_exact_name: 6.0,
            want_partial_name: 4.0,
            want_exact_ingredient: 3.0,
            want_partial_ingredient: 2.0,
            want_bonus_cap: 8.0,
            want_saturation: 2,
            want_throttle: 0.2,
            deficit_ratio_cap: 2.0,
            deficit_weight: 3.0,
            deficit_bonus_cap: 10.0,
            alternative_ratio: 0.3,
            alternative_min: 1,
            alternative_max: 3,
        }
    }
}

impl Default for ScalingConfig {
    fn default() -> Self {
        let priority_weights = [
            (PROTEIN, 3.0),
            (ENERGY_KCAL, 3.0),
            (FAT, 2.0),
            (CARBOHYDRATE, 1.5),
            (DIETARY_FIBER, 1.5),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        ScalingConfig {
            min_factor: 0.5,
            max_factor: 2.0,
            severe_deficit_ratio: 0.8,
            severe_expand_cap: 1.5,
            expand_cap: 1.3,
            high_priority_shrink_floor: 0.9,
            deficit_guard_ratio: 0.9,
            deficit_guard_floor: 0.8,
            high_priority_weight: 2.5,
            default_weight: 1.0,
            priority_weights,
        }
    }
}

fn targets(rows: &[(FoodCategory, u32, u32)]) -> BTreeMap<FoodCategory, CategoryTarget> {
    rows.iter()
        .map(|&(category, min, max)| (category, CategoryTarget { min, max }))
        .collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        use FoodCategory::*;
        let mut category_targets = BTreeMap::new();
        category_targets.insert(
            MealType::Breakfast,
            targets(&[
                (Cereal, 1, 1),
                (Protein, 0, 1),
                (VegeFruit, 0, 1),
                (DairyBean, 0, 1),
            ]),
        );
        category_targets.insert(
            MealType::Lunch,
            targets(&[
                (Cereal, 1, 2),
                (Protein, 1, 2),
                (VegeFruit, 2, 3),
                (DairyBean, 0, 1),
            ]),
        );
        category_targets.insert(
            MealType::Dinner,
            targets(&[
                (Cereal, 1, 2),
                (Protein, 1, 2),
                (VegeFruit, 1, 3),
                (DairyBean, 0, 1),
            ]),
        );

        EngineConfig {
            ratio_breakfast: 0.30,
            ratio_lunch: 0.40,
            ratio_dinner: 0.30,
            ratio_single: 1.0,
            cook_time_breakfast: 15,
            cook_time_lunch: 30,
            cook_time_dinner: 45,
            deficit_baseline_kcal: 2000.0,
            scoring: ScoringConfig::default(),
            scaling: ScalingConfig::default(),
            category_targets,
        }
    }
}

impl EngineConfig {
    pub fn meal_ratio(&self, meal: MealType) -> f64 {
        match meal {
            MealType::Breakfast => self.ratio_breakfast,
            MealType::Lunch => self.ratio_lunch,
            MealType::Dinner => self.ratio_dinner,
            MealType::All => self.ratio_single,
        }
    }

    pub fn default_cook_time(&self, meal: MealType) -> Option<u32> {
        match meal {
            MealType::Breakfast => Some(self.cook_time_breakfast),
            MealType::Lunch => Some(self.cook_time_lunch),
            MealType::Dinner => Some(self.cook_time_dinner),
            MealType::All => None,
        }
    }

    pub fn category_targets(
        &self,
        meal: MealType,
    ) -> Option<&BTreeMap<FoodCategory, CategoryTarget>> {
        self.category_targets.get(&meal)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config {:?}", path))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse engine config {:?}", path))
    }

    /// Explicit path first, then `MEAL_COMBO_CONFIG`, then defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(env_path) if !env_path.trim().is_empty() => {
                Self::from_file(Path::new(env_path.trim()))
            }
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_config_keeps_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, r#"{{"ratio_lunch": 0.5, "scaling": {{"expand_cap": 1.2}}}}"#)?;
        file.flush()?;

        let config = EngineConfig::from_file(file.path())?;
        assert_eq!(config.ratio_lunch, 0.5);
        assert_eq!(config.ratio_breakfast, 0.30);
        assert_eq!(config.scaling.expand_cap, 1.2);
        assert_eq!(config.scaling.max_factor, 2.0);
        assert!(config.scaling.is_high_priority(PROTEIN));
        Ok(())
    }

    #[test]
    fn test_priority_tiers() {
        let scaling = ScalingConfig::default();
        assert!(scaling.is_high_priority(ENERGY_KCAL));
        assert!(!scaling.is_high_priority(FAT));
        assert_eq!(scaling.weight("Calcium"), 1.0);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let result = EngineConfig::from_file(Path::new("no_such_config.json"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to read engine config"));
    }
}
