//! Slot-by-slot dish selection with dominant-ingredient dedup.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use super::filter::Candidate;
use super::scoring::{score_dish, slot_seed, want_terms, ScoreBreakdown, ScoreContext};
use crate::config::ScoringConfig;
use crate::models::{MealStructure, MealType, NutrientMap, NutrientRange, Slot};

/// A candidate plus its position after the seeded shuffle; lower wins ties.
#[derive(Debug, Clone, Copy)]
struct Ranked<'a> {
    candidate: Candidate<'a>,
    order: usize,
}

/// Builds one meal's dish list. Holds the working copy of the nutrient need,
/// which shrinks as dishes are accepted, and the dedup keys seen so far.
pub struct MealSelector<'a> {
    pools: BTreeMap<Slot, Vec<Ranked<'a>>>,
    scoring: &'a ScoringConfig,
    desired_tags: &'a [String],
    want_terms: Vec<String>,
    remaining_need: NutrientMap,
    accepted_want_eat: usize,
    selected: Vec<Candidate<'a>>,
    alternatives: Vec<Candidate<'a>>,
    used_ids: HashSet<u64>,
    dominant_foods: HashSet<u64>,
}

impl<'a> MealSelector<'a> {
    /// Shuffles each slot bucket with its own sub-seed of `refresh_key`.
    pub fn new(
        buckets: BTreeMap<Slot, Vec<Candidate<'a>>>,
        meal: MealType,
        refresh_key: u64,
        want_eat: &str,
        desired_tags: &'a [String],
        meal_range: &NutrientRange,
        scoring: &'a ScoringConfig,
    ) -> Self {
        let mut pools = BTreeMap::new();
        let mut order = 0;
        for (slot_index, slot) in Slot::SELECTION_ORDER.iter().enumerate() {
            let mut bucket = buckets.get(slot).cloned().unwrap_or_default();
            let seed = slot_seed(refresh_key, meal, slot_index as u64);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            bucket.shuffle(&mut rng);

            let ranked = bucket
                .into_iter()
                .map(|candidate| {
                    order += 1;
                    Ranked { candidate, order }
                })
                .collect::<Vec<_>>();
            pools.insert(*slot, ranked);
        }

        // Ranges that carry no explicit need fall back to their minimum
        let remaining_need = meal_range
            .iter()
            .map(|(code, b)| (code.clone(), if b.need > 0.0 { b.need } else { b.min }))
            .collect();

        MealSelector {
            pools,
            scoring,
            desired_tags,
            want_terms: want_terms(want_eat),
            remaining_need,
            accepted_want_eat: 0,
            selected: Vec::new(),
            alternatives: Vec::new(),
            used_ids: HashSet::new(),
            dominant_foods: HashSet::new(),
        }
    }

    pub fn score(&self, candidate: &Candidate<'_>) -> ScoreBreakdown {
        let ctx = ScoreContext {
            desired_tags: self.desired_tags,
            want_terms: &self.want_terms,
            remaining_need: &self.remaining_need,
            accepted_want_eat: self.accepted_want_eat,
            config: self.scoring,
        };
        score_dish(candidate.dish, &ctx)
    }

    pub fn selected(&self) -> &[Candidate<'a>] {
        &self.selected
    }

    pub fn alternatives(&self) -> &[Candidate<'a>] {
        &self.alternatives
    }

    pub fn remaining_need(&self) -> &NutrientMap {
        &self.remaining_need
    }

    pub fn accepted_want_eat(&self) -> usize {
        self.accepted_want_eat
    }

    /// Unused and not sharing a dominant ingredient with anything selected.
    pub fn can_accept(&self, candidate: &Candidate<'_>) -> bool {
        if self.used_ids.contains(&candidate.dish.id) {
            return false;
        }
        match candidate.dish.dominant_ingredient() {
            Some(main) => !self.dominant_foods.contains(&main.food_id),
            None => true,
        }
    }

    fn accept(&mut self, candidate: Candidate<'a>) {
        let breakdown = self.score(&candidate);
        if breakdown.want_eat_raw > 0.0 {
            self.accepted_want_eat += 1;
        }
        for (code, need) in self.remaining_need.iter_mut() {
            *need = (*need - candidate.dish.nutrient(code)).max(0.0);
        }
        if let Some(main) = candidate.dish.dominant_ingredient() {
            self.dominant_foods.insert(main.food_id);
        }
        self.used_ids.insert(candidate.dish.id);
        debug!(
            dish_id = candidate.dish.id,
            dish = %candidate.dish.name,
            slot = candidate.slot.code(),
            score = breakdown.total,
            "dish accepted"
        );
        self.selected.push(candidate);
    }

    /// Highest score wins; equal scores keep the shuffle order.
    fn best_of<I>(&self, candidates: I) -> Option<Candidate<'a>>
    where
        I: Iterator<Item = Ranked<'a>>,
    {
        candidates
            .map(|r| (self.score(&r.candidate).total, r))
            .fold(None, |best: Option<(f64, Ranked<'a>)>, (score, r)| match best {
                Some((best_score, b))
                    if best_score > score || (best_score == score && b.order < r.order) =>
                {
                    Some((best_score, b))
                }
                _ => Some((score, r)),
            })
            .map(|(_, r)| r.candidate)
    }

    fn all_ranked(&self) -> impl Iterator<Item = Ranked<'a>> + '_ {
        self.pools.values().flatten().copied()
    }

    /// Fills every slot up to its planned count, in selection order.
    /// Returns how many planned places stayed empty.
    pub fn fill_slots(&mut self, structure: &MealStructure) -> u32 {
        let mut missing = 0;
        for slot in Slot::SELECTION_ORDER {
            let target = structure.count(slot);
            let mut picked = 0;
            while picked < target {
                let pool = self.pools.get(&slot).cloned().unwrap_or_default();
                let next = self.best_of(pool.into_iter().filter(|r| self.can_accept(&r.candidate)));
                match next {
                    Some(candidate) => {
                        self.accept(candidate);
                        picked += 1;
                    }
                    None => break,
                }
            }
            if picked < target {
                debug!(slot = slot.code(), target, picked, "slot pool exhausted");
                missing += target - picked;
            }
        }
        missing
    }

    /// Accepts up to `limit` dishes from any slot pool that satisfy `keep`,
    /// best score first. Returns the number accepted.
    pub fn fill_from_pool<F>(&mut self, limit: u32, keep: F) -> u32
    where
        F: Fn(&Candidate<'_>) -> bool,
    {
        let mut added = 0;
        while added < limit {
            let pool: Vec<Ranked<'a>> = self.all_ranked().collect();
            let next = self.best_of(
                pool.into_iter()
                    .filter(|r| keep(&r.candidate) && self.can_accept(&r.candidate)),
            );
            match next {
                Some(candidate) => {
                    self.accept(candidate);
                    added += 1;
                }
                None => break,
            }
        }
        added
    }

    /// Generic score-ordered top-up until the structure total is reached.
    pub fn supplement(&mut self, structure: &MealStructure) -> u32 {
        let missing = structure.total().saturating_sub(self.selected.len() as u32);
        if missing == 0 {
            return 0;
        }
        let added = self.fill_from_pool(missing, |_| true);
        if added < missing {
            warn!(
                planned = structure.total(),
                selected = self.selected.len(),
                "not enough distinct dishes, meal returned short"
            );
        }
        added
    }

    /// Picks a few substitutes per slot. They never overlap the selected dishes
    /// and are not subject to the dominant-ingredient rule.
    pub fn choose_alternatives(&mut self, structure: &MealStructure) {
        for slot in Slot::SELECTION_ORDER {
            let target = structure.count(slot);
            if target == 0 {
                continue;
            }
            let wanted = ((f64::from(target) * self.scoring.alternative_ratio).round() as usize)
                .clamp(self.scoring.alternative_min, self.scoring.alternative_max);

            let pool = self.pools.get(&slot).cloned().unwrap_or_default();
            let mut ranked: Vec<(f64, Ranked<'a>)> = pool
                .into_iter()
                .filter(|r| !self.used_ids.contains(&r.candidate.dish.id))
                .map(|r| (self.score(&r.candidate).total, r))
                .collect();
            ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.order.cmp(&b.1.order)));

            for (_, r) in ranked.into_iter().take(wanted) {
                self.used_ids.insert(r.candidate.dish.id);
                self.alternatives.push(r.candidate);
            }
        }
    }

    pub fn into_parts(self) -> (Vec<Candidate<'a>>, Vec<Candidate<'a>>) {
        (self.selected, self.alternatives)
    }
}
