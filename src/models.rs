use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::MealTypeParseError;

/// Nutrient code -> amount (grams, kcal, mg... whatever the catalog unit is).
pub type NutrientMap = BTreeMap<String, f64>;

// Canonical nutrient codes produced by the catalog builder
pub const PROTEIN: &str = "Protein";
pub const FAT: &str = "Fat";
pub const CARBOHYDRATE: &str = "Carbohydrate";
pub const DIETARY_FIBER: &str = "DietaryFiber";
pub const ENERGY_KCAL: &str = "EnergyKCal";

// Tag groups used by the filter and the categorizer
pub const TAG_MEAL_TIME: &str = "meal_time";
pub const TAG_CUISINE: &str = "cuisine";
pub const TAG_VEGE: &str = "vege";
pub const TAG_STAPLE: &str = "staple";
pub const TAG_CATEGORY: &str = "category";
pub const TAG_PEOPLE: &str = "people";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Toddler,
    Child,
    Teen,
    Young,
    Middle,
    Senior,
}

impl AgeGroup {
    pub fn from_age(age: f64) -> Self {
        match age {
            a if a <= 3.0 => AgeGroup::Toddler,
            a if a <= 12.0 => AgeGroup::Child,
            a if a <= 17.0 => AgeGroup::Teen,
            a if a <= 35.0 => AgeGroup::Young,
            a if a <= 60.0 => AgeGroup::Middle,
            _ => AgeGroup::Senior,
        }
    }

    /// Teen and above eat adult portions and count as adults for banquets.
    pub fn is_adult(self) -> bool {
        matches!(
            self,
            AgeGroup::Teen | AgeGroup::Young | AgeGroup::Middle | AgeGroup::Senior
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub age: f64,
    pub gender: Gender,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub age_group: Option<AgeGroup>,
    #[serde(default)]
    pub allergens: BTreeSet<String>,
}

impl Member {
    /// Explicit tag wins; otherwise derived from age.
    pub fn age_group(&self) -> AgeGroup {
        self.age_group.unwrap_or_else(|| AgeGroup::from_age(self.age))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    All,
}

impl MealType {
    pub const DAILY: [MealType; 3] = [MealType::Breakfast, MealType::Lunch, MealType::Dinner];

    pub fn code(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::All => "all",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            MealType::Breakfast => "早餐",
            MealType::Lunch => "午餐",
            MealType::Dinner => "晚餐",
            MealType::All => "全日餐",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MealType {
    type Err = MealTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "all" => Ok(MealType::All),
            other => Err(MealTypeParseError(other.to_string())),
        }
    }
}

/// Structural role a dish plays inside a meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Staple,
    MainDish,
    SideDish,
    Soup,
    BabyFood,
}

impl Slot {
    /// Order in which slots are filled.
    pub const SELECTION_ORDER: [Slot; 5] = [
        Slot::Staple,
        Slot::MainDish,
        Slot::BabyFood,
        Slot::SideDish,
        Slot::Soup,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Slot::Staple => "staple",
            Slot::MainDish => "main_dish",
            Slot::SideDish => "side_dish",
            Slot::Soup => "soup",
            Slot::BabyFood => "baby_food",
        }
    }
}

/// Coarse grouping used for dietary diversity, independent of the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodCategory {
    Cereal,
    Protein,
    VegeFruit,
    DairyBean,
    Oil,
    Other,
}

impl FoodCategory {
    pub const ALL: [FoodCategory; 6] = [
        FoodCategory::Cereal,
        FoodCategory::Protein,
        FoodCategory::VegeFruit,
        FoodCategory::DairyBean,
        FoodCategory::Oil,
        FoodCategory::Other,
    ];

    /// Maps an ingredient category label (English code or Chinese food-table label).
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }
        const RULES: &[(FoodCategory, &[&str])] = &[
            (
                FoodCategory::Cereal,
                &["cereal", "grain", "tuber", "谷", "薯", "米", "面"],
            ),
            (
                FoodCategory::DairyBean,
                &["dairy", "milk", "bean", "soy", "nut", "乳", "奶", "豆", "坚果"],
            ),
            (
                FoodCategory::Protein,
                &[
                    "meat", "poultry", "fish", "seafood", "egg", "protein", "肉", "禽", "鱼", "虾",
                    "蛋", "水产",
                ],
            ),
            (
                FoodCategory::VegeFruit,
                &[
                    "vegetable", "fruit", "fungi", "algae", "vege", "蔬", "菜", "果", "菌", "藻",
                ],
            ),
            (FoodCategory::Oil, &["oil", "fat", "油", "脂"]),
        ];
        RULES
            .iter()
            .find(|(_, keys)| keys.iter().any(|k| label.contains(k)))
            .map(|(category, _)| *category)
            .or(Some(FoodCategory::Other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortionSize {
    S,
    M,
    L,
}

impl PortionSize {
    pub fn for_grams(grams: u32) -> Self {
        if grams <= 100 {
            PortionSize::S
        } else if grams <= 200 {
            PortionSize::M
        } else {
            PortionSize::L
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactPortion {
    pub size: PortionSize,
    pub grams: u32,
}

impl ExactPortion {
    pub fn from_grams(grams: u32) -> Self {
        let grams = grams.max(1);
        ExactPortion {
            size: PortionSize::for_grams(grams),
            grams,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodIngredient {
    pub food_id: u64,
    pub name: String,
    pub grams: f64,
    pub category1: Option<String>,
    pub category2: Option<String>,
    pub is_main: bool,
    pub nutrients_per_100g: NutrientMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub id: u64,
    pub name: String,
    pub cook_time: u32,
    pub rating: Option<f64>,
    pub default_portion_g: u32,
    pub exact_portion: ExactPortion,
    pub ingredients: Vec<FoodIngredient>,
    pub nutrients: NutrientMap,
    pub tags: BTreeMap<String, Vec<TagRef>>,
    pub explicit_tags: Vec<String>,
    pub allergens: BTreeSet<String>,
}

impl Dish {
    pub fn tag_codes(&self, group: &str) -> impl Iterator<Item = &str> {
        self.tags
            .get(group)
            .into_iter()
            .flatten()
            .map(|t| t.code.as_str())
    }

    pub fn has_tag(&self, group: &str, code: &str) -> bool {
        self.tag_codes(group).any(|c| c == code)
    }

    pub fn nutrient(&self, code: &str) -> f64 {
        self.nutrients.get(code).copied().unwrap_or(0.0)
    }

    /// Heaviest ingredient; the first one wins on equal weight.
    pub fn dominant_ingredient(&self) -> Option<&FoodIngredient> {
        self.ingredients.iter().fold(None, |best, ing| match best {
            Some(b) if b.grams >= ing.grams => Some(b),
            _ => Some(ing),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NutrientBound {
    pub min: f64,
    pub max: f64,
    pub need: f64,
}

impl NutrientBound {
    pub fn scaled(&self, ratio: f64) -> Self {
        NutrientBound {
            min: self.min * ratio,
            max: self.max * ratio,
            need: self.need * ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NutrientRange(pub BTreeMap<String, NutrientBound>);

impl NutrientRange {
    pub fn scaled(&self, ratio: f64) -> Self {
        NutrientRange(
            self.0
                .iter()
                .map(|(code, bound)| (code.clone(), bound.scaled(ratio)))
                .collect(),
        )
    }

    pub fn get(&self, code: &str) -> Option<&NutrientBound> {
        self.0.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NutrientBound)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds `bound` onto whatever is already stored for `code`.
    pub fn accumulate(&mut self, code: &str, bound: NutrientBound) {
        let entry = self.0.entry(code.to_string()).or_default();
        entry.min += bound.min;
        entry.max += bound.max;
        entry.need += bound.need;
    }

    pub fn needs(&self) -> NutrientMap {
        self.0.iter().map(|(k, b)| (k.clone(), b.need)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MealStructure {
    pub staple: u32,
    pub main_dish: u32,
    pub side_dish: u32,
    pub soup: u32,
    pub baby_food: u32,
}

impl MealStructure {
    pub fn count(&self, slot: Slot) -> u32 {
        match slot {
            Slot::Staple => self.staple,
            Slot::MainDish => self.main_dish,
            Slot::SideDish => self.side_dish,
            Slot::Soup => self.soup,
            Slot::BabyFood => self.baby_food,
        }
    }

    pub fn count_mut(&mut self, slot: Slot) -> &mut u32 {
        match slot {
            Slot::Staple => &mut self.staple,
            Slot::MainDish => &mut self.main_dish,
            Slot::SideDish => &mut self.side_dish,
            Slot::Soup => &mut self.soup,
            Slot::BabyFood => &mut self.baby_food,
        }
    }

    pub fn total(&self) -> u32 {
        self.staple + self.main_dish + self.side_dish + self.soup + self.baby_food
    }

    /// Trims slots (soup first, staple last) until the total fits `max`.
    pub fn capped(mut self, max: u32) -> Self {
        const TRIM_ORDER: [Slot; 5] = [
            Slot::Soup,
            Slot::SideDish,
            Slot::MainDish,
            Slot::BabyFood,
            Slot::Staple,
        ];
        for slot in TRIM_ORDER {
            while self.total() > max && self.count(slot) > 0 {
                *self.count_mut(slot) -= 1;
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealRequest {
    pub member_ids: Vec<u64>,
    pub meal_type: MealType,
    #[serde(default)]
    pub cook_time_limit: Option<u32>,
    #[serde(default)]
    pub cuisines: Vec<String>,
    #[serde(default)]
    pub explicit_tags: Vec<String>,
    #[serde(default)]
    pub want_eat: String,
    #[serde(default)]
    pub refresh_key: u64,
    #[serde(default)]
    pub province_code: Option<String>,
    #[serde(default)]
    pub deficit_kcal: u32,
    #[serde(default)]
    pub max_dishes_per_meal: Option<u32>,
}

impl MealRequest {
    pub fn new(member_ids: Vec<u64>, meal_type: MealType) -> Self {
        MealRequest {
            member_ids,
            meal_type,
            cook_time_limit: None,
            cuisines: Vec::new(),
            explicit_tags: Vec::new(),
            want_eat: String::new(),
            refresh_key: 0,
            province_code: None,
            deficit_kcal: 0,
            max_dishes_per_meal: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DishRole {
    Selected,
    Alternative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboDish {
    pub dish: Dish,
    pub role: DishRole,
    pub slot: Slot,
    pub food_category: FoodCategory,
}

impl ComboDish {
    pub fn is_selected(&self) -> bool {
        self.role == DishRole::Selected
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboMeal {
    pub combo_id: u64,
    pub combo_name: String,
    pub meal_type: MealType,
    pub dishes: Vec<ComboDish>,
    pub total_cook_time: u32,
    pub nutrients: NutrientMap,
    pub need_nutrients: NutrientRange,
    pub category_distribution: BTreeMap<FoodCategory, u32>,
    pub need_codes: Vec<String>,
    pub scale_factor: f64,
    pub shopping_list: BTreeMap<String, f64>,
}

impl ComboMeal {
    pub fn selected(&self) -> impl Iterator<Item = &ComboDish> {
        self.dishes.iter().filter(|d| d.is_selected())
    }

    pub fn alternatives(&self) -> impl Iterator<Item = &ComboDish> {
        self.dishes.iter().filter(|d| !d.is_selected())
    }
}
