//! End-to-end combo generation for one request.

use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::assembler::assemble;
use super::balancer::{balance_categories, fill_within_caps};
use super::filter::{categorize, DishFilter};
use super::portion::scale_portions;
use super::selector::MealSelector;
use super::structure::{plan_structure, Occasion};
use super::targets::{apply_calorie_deficit, meal_range};
use crate::catalog::{build_dishes, CatalogFeed};
use crate::config::EngineConfig;
use crate::error::GenerateError;
use crate::household::{AllergenProvider, MemberDirectory, NutrientTargetProvider};
use crate::models::{
    ComboDish, ComboMeal, Dish, DishRole, MealRequest, MealType, Member, NutrientRange,
};

/// Wires the data collaborators to the pipeline. Holds no per-request state.
pub struct ComboGenerator<'a> {
    config: EngineConfig,
    catalog: &'a dyn CatalogFeed,
    targets: &'a dyn NutrientTargetProvider,
    allergens: &'a dyn AllergenProvider,
    directory: &'a dyn MemberDirectory,
}

/// Everything one meal run reads. Plain data, so meals can run in parallel.
struct MealContext<'a> {
    config: &'a EngineConfig,
    request: &'a MealRequest,
    dishes: &'a [Dish],
    members: &'a [Member],
    daily: &'a NutrientRange,
    allergens: &'a BTreeSet<String>,
}

impl<'a> ComboGenerator<'a> {
    pub fn new(
        config: EngineConfig,
        catalog: &'a dyn CatalogFeed,
        targets: &'a dyn NutrientTargetProvider,
        allergens: &'a dyn AllergenProvider,
        directory: &'a dyn MemberDirectory,
    ) -> Self {
        ComboGenerator {
            config,
            catalog,
            targets,
            allergens,
            directory,
        }
    }

    /// One combo for a specific meal, three (breakfast, lunch, dinner) for `all`.
    pub fn generate(&self, request: &MealRequest) -> Result<Vec<ComboMeal>, GenerateError> {
        if request.member_ids.is_empty() {
            return Err(GenerateError::EmptyMembers);
        }
        let members = self.directory.members(&request.member_ids)?;
        if let Some(unknown) = request
            .member_ids
            .iter()
            .find(|id| !members.iter().any(|m| m.id == **id))
        {
            return Err(GenerateError::UnknownMember(*unknown));
        }

        let rows = self.catalog.catalog_rows()?;
        let dishes = build_dishes(&rows);
        let daily = apply_calorie_deficit(
            &self.targets.daily_range(&members)?,
            request.deficit_kcal,
            self.config.deficit_baseline_kcal,
        );
        let allergens = self.allergens.allergens(&request.member_ids)?;
        info!(
            members = members.len(),
            dishes = dishes.len(),
            meal = %request.meal_type,
            refresh_key = request.refresh_key,
            "generating combos"
        );

        let ctx = MealContext {
            config: &self.config,
            request,
            dishes: &dishes,
            members: &members,
            daily: &daily,
            allergens: &allergens,
        };

        let combos: Vec<ComboMeal> = match request.meal_type {
            MealType::All => MealType::DAILY
                .par_iter()
                .map(|meal| run_meal(&ctx, *meal))
                .collect(),
            meal => vec![run_meal(&ctx, meal)],
        };
        Ok(combos)
    }
}

fn run_meal(ctx: &MealContext<'_>, meal: MealType) -> ComboMeal {
    let request = ctx.request;

    let mut structure = plan_structure(
        ctx.members,
        Occasion::from_meal(meal),
        request.province_code.as_deref(),
    );
    if let Some(max) = request.max_dishes_per_meal {
        structure = structure.capped(max);
    }
    let range = meal_range(ctx.daily, meal, ctx.config);

    let filter = DishFilter {
        meal: Some(meal),
        cook_time_limit: request
            .cook_time_limit
            .or_else(|| ctx.config.default_cook_time(meal)),
        cuisines: &request.cuisines,
        allergens: ctx.allergens,
    };
    let candidates = filter.apply(ctx.dishes);
    debug!(meal = %meal, ?structure, candidates = candidates.len(), "meal plan");

    let mut selector = MealSelector::new(
        categorize(&candidates),
        meal,
        request.refresh_key,
        &request.want_eat,
        &request.explicit_tags,
        &range,
        &ctx.config.scoring,
    );
    let missing = selector.fill_slots(&structure);
    if let Some(targets) = ctx.config.category_targets(meal) {
        let open = missing - balance_categories(&mut selector, targets, missing);
        fill_within_caps(&mut selector, targets, open);
    }
    selector.supplement(&structure);
    selector.choose_alternatives(&structure);
    let (selected, alternatives) = selector.into_parts();

    let mut scaled: Vec<Dish> = selected.iter().map(|c| c.dish.clone()).collect();
    let plan = scale_portions(&mut scaled, &range, &ctx.config.scaling);

    let dishes = selected
        .iter()
        .zip(scaled)
        .map(|(c, dish)| ComboDish {
            dish,
            role: DishRole::Selected,
            slot: c.slot,
            food_category: c.category,
        })
        .chain(alternatives.iter().map(|c| ComboDish {
            dish: c.dish.clone(),
            role: DishRole::Alternative,
            slot: c.slot,
            food_category: c.category,
        }))
        .collect();

    let combo = assemble(meal, request.refresh_key, dishes, range, plan.factor);
    info!(
        meal = %meal,
        combo_id = combo.combo_id,
        selected = combo.selected().count(),
        alternatives = combo.alternatives().count(),
        scale = combo.scale_factor,
        "combo assembled"
    );
    combo
}
