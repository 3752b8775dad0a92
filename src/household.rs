use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{Member, NutrientBound, NutrientRange};

/// Looks up household members by id. Ids it does not know are left out.
pub trait MemberDirectory {
    fn members(&self, member_ids: &[u64]) -> Result<Vec<Member>>;
}

/// Supplies the full-day nutrient range for a set of members.
pub trait NutrientTargetProvider {
    fn daily_range(&self, members: &[Member]) -> Result<NutrientRange>;
}

pub trait AllergenProvider {
    fn allergens(&self, member_ids: &[u64]) -> Result<BTreeSet<String>>;
}

/// One member's daily requirement for one nutrient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberNeed {
    pub member_id: u64,
    pub nutrient_code: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub need: Option<f64>,
}

/// Household snapshot held in memory, e.g. loaded from a JSON export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InMemoryHousehold {
    pub members: Vec<Member>,
    #[serde(default)]
    pub needs: Vec<MemberNeed>,
}

impl InMemoryHousehold {
    pub fn new(members: Vec<Member>, needs: Vec<MemberNeed>) -> Self {
        InMemoryHousehold { members, needs }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl MemberDirectory for InMemoryHousehold {
    fn members(&self, member_ids: &[u64]) -> Result<Vec<Member>> {
        Ok(member_ids
            .iter()
            .filter_map(|id| self.members.iter().find(|m| m.id == *id))
            .cloned()
            .collect())
    }
}

impl NutrientTargetProvider for InMemoryHousehold {
    /// Sums every member's rows per nutrient; absent values count as zero.
    fn daily_range(&self, members: &[Member]) -> Result<NutrientRange> {
        let mut range = NutrientRange::default();
        for need in &self.needs {
            if !members.iter().any(|m| m.id == need.member_id) {
                continue;
            }
            range.accumulate(
                &need.nutrient_code,
                NutrientBound {
                    min: need.min.unwrap_or(0.0),
                    max: need.max.unwrap_or(0.0),
                    need: need.need.unwrap_or(0.0),
                },
            );
        }
        Ok(range)
    }
}

impl AllergenProvider for InMemoryHousehold {
    fn allergens(&self, member_ids: &[u64]) -> Result<BTreeSet<String>> {
        Ok(self
            .members
            .iter()
            .filter(|m| member_ids.contains(&m.id))
            .flat_map(|m| m.allergens.iter().cloned())
            .collect())
    }
}
