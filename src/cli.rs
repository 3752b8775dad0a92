use clap::Parser;
use std::path::PathBuf;

use crate::models::{MealRequest, MealType};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Recommends household meal combos from a dish catalog",
    long_about = None
)]
pub struct Cli {
    /// Path to the catalog CSV export (dish x food x nutrient rows)
    #[arg(short, long)]
    pub catalog: PathBuf,

    /// Path to the household JSON file (members and nutrient needs)
    #[arg(short = 'H', long)]
    pub household: PathBuf,

    /// Comma-separated member ids; defaults to every member of the household
    #[arg(short, long, value_delimiter = ',')]
    pub members: Vec<u64>,

    /// breakfast, lunch, dinner or all
    #[arg(short = 't', long, default_value = "all")]
    pub meal_type: MealType,

    /// Seed for the shuffles; same key, same combos
    #[arg(short, long, default_value_t = 0)]
    pub refresh_key: u64,

    /// Two-letter province code, e.g. GD or SC
    #[arg(short, long)]
    pub province: Option<String>,

    /// Free-text dishes or ingredients the household wants
    #[arg(short, long, default_value = "")]
    pub want_eat: String,

    /// Maximum cook time per dish in minutes
    #[arg(long)]
    pub cook_time_limit: Option<u32>,

    #[arg(long, value_delimiter = ',')]
    pub cuisine: Vec<String>,

    /// Desired diet-need tags, e.g. HIGH_PROTEIN,LOW_FAT
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Daily calorie deficit in kcal
    #[arg(long, default_value_t = 0)]
    pub deficit_kcal: u32,

    #[arg(long)]
    pub max_dishes: Option<u32>,

    /// Engine config JSON; falls back to MEAL_COMBO_CONFIG, then built-in defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Request for the given members (the CLI's own list wins when non-empty).
    pub fn to_request(&self, household_ids: &[u64]) -> MealRequest {
        let member_ids = if self.members.is_empty() {
            household_ids.to_vec()
        } else {
            self.members.clone()
        };
        MealRequest {
            member_ids,
            meal_type: self.meal_type,
            cook_time_limit: self.cook_time_limit,
            cuisines: self.cuisine.clone(),
            explicit_tags: self.tags.clone(),
            want_eat: self.want_eat.clone(),
            refresh_key: self.refresh_key,
            province_code: self.province.clone(),
            deficit_kcal: self.deficit_kcal,
            max_dishes_per_meal: self.max_dishes,
        }
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_builds_request() {
        let cli = Cli::try_parse_from([
            "meal-combo",
            "--catalog",
            "dishes.csv",
            "-H",
            "family.json",
            "--meal-type",
            "dinner",
            "--tags",
            "HIGH_PROTEIN,LOW_FAT",
            "--province",
            "GD",
        ])
        .expect("valid args");

        let request = cli.to_request(&[1, 2, 3]);
        assert_eq!(request.meal_type, MealType::Dinner);
        assert_eq!(request.member_ids, vec![1, 2, 3]);
        assert_eq!(request.explicit_tags, vec!["HIGH_PROTEIN", "LOW_FAT"]);
        assert_eq!(request.province_code.as_deref(), Some("GD"));
        assert_eq!(request.cook_time_limit, None);
    }

    #[test]
    fn test_cli_rejects_unknown_meal_type() {
        let result = Cli::try_parse_from([
            "meal-combo",
            "-c",
            "a.csv",
            "-H",
            "b.json",
            "-t",
            "brunch",
        ]);
        assert!(result.is_err());
    }
}
