//! Meal structure planning: how many dishes each slot gets for a household.

use crate::models::{AgeGroup, MealStructure, MealType, Member, Slot};

/// Meal occasion the planner knows a base layout for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occasion {
    Breakfast,
    Lunch,
    Dinner,
    Banquet,
}

impl Occasion {
    /// `All` has no layout of its own; a standalone all-day combo uses lunch's.
    pub fn from_meal(meal: MealType) -> Self {
        match meal {
            MealType::Breakfast => Occasion::Breakfast,
            MealType::Lunch | MealType::All => Occasion::Lunch,
            MealType::Dinner => Occasion::Dinner,
        }
    }

    fn base(self) -> MealStructure {
        let (staple, main_dish, side_dish, soup) = match self {
            Occasion::Breakfast => (1, 1, 0, 0),
            Occasion::Lunch | Occasion::Dinner => (1, 1, 1, 1),
            Occasion::Banquet => (1, 2, 2, 1),
        };
        MealStructure {
            staple,
            main_dish,
            side_dish,
            soup,
            baby_food: 0,
        }
    }
}

/// Province -> per-slot multiplier. Slots not listed keep factor 1.0.
fn province_factors(province_code: &str) -> &'static [(Slot, f64)] {
    match province_code.trim().to_ascii_uppercase().as_str() {
        // North: wheat staples, lighter on soup
        "BJ" => &[(Slot::Staple, 1.2), (Slot::Soup, 0.8)],
        "SD" => &[(Slot::Staple, 1.3), (Slot::Soup, 0.7)],
        "HE" => &[(Slot::Staple, 1.2), (Slot::Soup, 0.8)],
        // South: soup heavy
        "GD" => &[(Slot::Staple, 1.0), (Slot::Soup, 1.5)],
        "FJ" => &[(Slot::Staple, 1.0), (Slot::Soup, 1.4)],
        "ZJ" => &[(Slot::Staple, 1.0), (Slot::Soup, 1.3)],
        // Southwest: more mains and sides
        "SC" => &[(Slot::MainDish, 1.3), (Slot::SideDish, 1.2)],
        "CQ" => &[(Slot::MainDish, 1.4), (Slot::SideDish, 1.1)],
        "HN" => &[(Slot::MainDish, 1.2), (Slot::SideDish, 1.1)],
        _ => &[],
    }
}

fn apply_province(mut structure: MealStructure, province_code: Option<&str>) -> MealStructure {
    let factors = province_code.map(province_factors).unwrap_or(&[]);
    for &(slot, factor) in factors {
        let count = structure.count_mut(slot);
        if *count > 0 {
            *count = ((f64::from(*count) * factor).round_ties_even() as u32).max(1);
        }
    }
    structure
}

fn adjust_banquet(
    mut structure: MealStructure,
    adult_count: u32,
    total_count: usize,
) -> MealStructure {
    if total_count >= 6 {
        structure.main_dish = (adult_count / 2 + 1).min(5);
        structure.side_dish = (adult_count / 2 + 1).min(4);
        structure.soup = 2;
    } else if total_count >= 4 {
        structure.main_dish = 3;
        structure.side_dish = 2;
    }
    structure
}

fn adjust_household_size(mut structure: MealStructure, total_count: usize) -> MealStructure {
    if total_count >= 4 {
        structure.main_dish += 1;
        structure.side_dish += 1;
    } else if total_count <= 2 {
        structure.side_dish = structure.side_dish.saturating_sub(1);
    }
    structure
}

/// Plans the slot counts for one meal.
pub fn plan_structure(
    members: &[Member],
    occasion: Occasion,
    province_code: Option<&str>,
) -> MealStructure {
    if members.is_empty() {
        return MealStructure::default();
    }

    let count_group = |group: AgeGroup| {
        members
            .iter()
            .filter(|m| m.age_group() == group)
            .count() as u32
    };
    let toddlers = count_group(AgeGroup::Toddler);
    let children = count_group(AgeGroup::Child);
    let adults = members.iter().filter(|m| m.age_group().is_adult()).count() as u32;

    let mut structure = occasion.base();
    structure = match occasion {
        Occasion::Banquet => adjust_banquet(structure, adults, members.len()),
        Occasion::Lunch | Occasion::Dinner => adjust_household_size(structure, members.len()),
        Occasion::Breakfast => structure,
    };
    structure = apply_province(structure, province_code);

    // Baby food is per toddler and ignores regional factors
    structure.baby_food += toddlers;

    if occasion == Occasion::Banquet && children > 0 {
        structure.main_dish = structure.main_dish.max(2);
    }
    structure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;
    use std::collections::BTreeSet;

    fn member(id: u64, age: f64) -> Member {
        Member {
            id,
            age,
            gender: Gender::Unknown,
            height_cm: None,
            weight_kg: None,
            age_group: None,
            allergens: BTreeSet::new(),
        }
    }

    fn family() -> Vec<Member> {
        vec![member(1, 35.0), member(2, 36.0), member(3, 10.0), member(4, 3.0)]
    }

    fn s(staple: u32, main_dish: u32, side_dish: u32, soup: u32, baby_food: u32) -> MealStructure {
        MealStructure {
            staple,
            main_dish,
            side_dish,
            soup,
            baby_food,
        }
    }

    #[test]
    fn test_couple_lunch_drops_side_dish() {
        let couple = vec![member(1, 30.0), member(2, 28.0)];
        assert_eq!(plan_structure(&couple, Occasion::Lunch, None), s(1, 1, 0, 1, 0));
    }

    #[test]
    fn test_guangdong_family_dinner() {
        // 4 members: main/side +1; GD soup 1.5 -> round_ties_even(1.5) = 2; toddler adds baby food
        let plan = plan_structure(&family(), Occasion::Dinner, Some("GD"));
        assert_eq!(plan, s(1, 2, 2, 2, 1));
    }

    #[test]
    fn test_beijing_breakfast_keeps_zero_slots() {
        let couple = vec![member(1, 30.0), member(2, 28.0)];
        let plan = plan_structure(&couple, Occasion::Breakfast, Some("BJ"));
        assert_eq!(plan, s(1, 1, 0, 0, 0));
    }

    #[test]
    fn test_sichuan_banquet() {
        let mut guests = family();
        guests.push(member(5, 65.0));
        guests.push(member(6, 40.0));
        // 4 adults: main min(3,5)=3 -> 3*1.3=3.9 -> 4; side min(3,4)=3 -> 3.6 -> 4; soup 2
        let plan = plan_structure(&guests, Occasion::Banquet, Some("SC"));
        assert_eq!(plan, s(1, 4, 4, 2, 1));
    }

    #[test]
    fn test_unknown_province_and_empty_household() {
        assert_eq!(
            plan_structure(&family(), Occasion::Lunch, Some("XX")),
            plan_structure(&family(), Occasion::Lunch, None)
        );
        let empty = plan_structure(&[], Occasion::Lunch, Some("GD"));
        assert_eq!(empty, MealStructure::default());
    }

    #[test]
    fn test_north_soup_floor_is_one() {
        // SD soup 0.7 -> round(0.7) = 1, never dropped to zero
        assert_eq!(plan_structure(&family(), Occasion::Lunch, Some("SD")).soup, 1);
    }
}
