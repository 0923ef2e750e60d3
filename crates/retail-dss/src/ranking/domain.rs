use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a scored attribute such as `rent_cost`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriterionId(pub String);

impl CriterionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CriterionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of a candidate site in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub u64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an expert weight profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightProfileId(pub u64);

impl fmt::Display for WeightProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether higher raw values help (`Benefit`) or hurt (`Cost`) a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Polarity {
    Cost,
    Benefit,
}

impl Polarity {
    pub const fn label(self) -> &'static str {
        match self {
            Polarity::Cost => "cost",
            Polarity::Benefit => "benefit",
        }
    }
}

/// Reference description of one decision attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaDefinition {
    pub id: CriterionId,
    pub display_name: String,
    pub polarity: Polarity,
    pub default_weight: f64,
}

impl CriteriaDefinition {
    pub fn new(id: &str, display_name: &str, polarity: Polarity, default_weight: f64) -> Self {
        Self {
            id: CriterionId::new(id),
            display_name: display_name.to_string(),
            polarity,
            default_weight,
        }
    }
}

/// Ordered set of criteria; column `j` of every decision matrix is `criteria()[j]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaSchema {
    criteria: Vec<CriteriaDefinition>,
}

impl CriteriaSchema {
    pub fn new(criteria: Vec<CriteriaDefinition>) -> Self {
        Self { criteria }
    }

    /// The eight site attributes collected for every potential retail location.
    pub fn retail_sites() -> Self {
        Self::new(vec![
            CriteriaDefinition::new("rent_cost", "Monthly rent", Polarity::Cost, 0.20),
            CriteriaDefinition::new(
                "renovation_cost",
                "Renovation cost",
                Polarity::Cost,
                0.10,
            ),
            CriteriaDefinition::new(
                "competitor_count",
                "Competitors nearby",
                Polarity::Cost,
                0.15,
            ),
            CriteriaDefinition::new(
                "distance_to_warehouse",
                "Distance to warehouse",
                Polarity::Cost,
                0.05,
            ),
            CriteriaDefinition::new("floor_area", "Floor area", Polarity::Benefit, 0.15),
            CriteriaDefinition::new("front_width", "Frontage width", Polarity::Benefit, 0.05),
            CriteriaDefinition::new("traffic_score", "Foot traffic", Polarity::Benefit, 0.20),
            CriteriaDefinition::new(
                "population_density",
                "Population density",
                Polarity::Benefit,
                0.10,
            ),
        ])
    }

    pub fn criteria(&self) -> &[CriteriaDefinition] {
        &self.criteria
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn polarities(&self) -> Vec<Polarity> {
        self.criteria
            .iter()
            .map(|criterion| criterion.polarity)
            .collect()
    }

    pub fn get(&self, id: &CriterionId) -> Option<&CriteriaDefinition> {
        self.criteria.iter().find(|criterion| &criterion.id == id)
    }

    /// Builds a profile carrying every criterion's default weight.
    pub fn default_profile(&self, id: WeightProfileId, name: &str) -> WeightProfile {
        WeightProfile {
            id,
            name: name.to_string(),
            description: None,
            weights: self
                .criteria
                .iter()
                .map(|criterion| (criterion.id.clone(), criterion.default_weight))
                .collect(),
            active: false,
        }
    }
}

/// Named expert weighting strategy. Weights are normalized at resolution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
    pub id: WeightProfileId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub weights: BTreeMap<CriterionId, f64>,
    pub active: bool,
}

/// Lifecycle status of a site in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateStatus {
    Active,
    Inactive,
}

impl CandidateStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CandidateStatus::Active => "ACTIVE",
            CandidateStatus::Inactive => "INACTIVE",
        }
    }
}

/// Potential retail site with its raw criterion values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub site_code: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    pub status: CandidateStatus,
    pub values: BTreeMap<CriterionId, f64>,
}

impl Candidate {
    pub fn is_active(&self) -> bool {
        self.status == CandidateStatus::Active
    }

    pub fn value(&self, criterion: &CriterionId) -> Option<f64> {
        self.values.get(criterion).copied()
    }
}
