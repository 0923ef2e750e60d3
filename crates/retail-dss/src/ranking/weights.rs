use serde::Serialize;
use tracing::debug;

use super::domain::{CriteriaSchema, WeightProfile, WeightProfileId};
use super::error::{ConfigurationError, RankingError};
use super::repository::WeightProfileStore;

/// Weight vector aligned with the schema's column order and normalized to sum to one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedWeights {
    pub profile_id: WeightProfileId,
    pub profile_name: String,
    weights: Vec<f64>,
}

impl ResolvedWeights {
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

/// Loads the explicit profile when given, otherwise the single active one, and normalizes it.
pub fn resolve<P>(
    store: &P,
    schema: &CriteriaSchema,
    explicit: Option<WeightProfileId>,
) -> Result<ResolvedWeights, RankingError>
where
    P: WeightProfileStore + ?Sized,
{
    let profile = match explicit {
        Some(id) => store
            .fetch(id)?
            .ok_or(ConfigurationError::ProfileNotFound(id))?,
        None => {
            let mut active = store.active()?;
            if active.len() != 1 {
                return Err(ConfigurationError::NoActiveProfile {
                    active_count: active.len(),
                }
                .into());
            }
            active.remove(0)
        }
    };

    Ok(normalize(&profile, schema)?)
}

/// Validates a profile against the schema and divides each weight by the profile total.
pub fn normalize(
    profile: &WeightProfile,
    schema: &CriteriaSchema,
) -> Result<ResolvedWeights, ConfigurationError> {
    let mut raw = Vec::with_capacity(schema.len());
    for criterion in schema.criteria() {
        let weight = profile.weights.get(&criterion.id).copied().ok_or_else(|| {
            ConfigurationError::MissingWeight {
                profile_id: profile.id,
                criterion: criterion.id.clone(),
            }
        })?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(ConfigurationError::InvalidWeight {
                profile_id: profile.id,
                criterion: criterion.id.clone(),
                weight,
            });
        }
        raw.push(weight);
    }

    for criterion in profile.weights.keys() {
        if schema.get(criterion).is_none() {
            debug!(profile_id = %profile.id, %criterion, "ignoring weight for unknown criterion");
        }
    }

    let total: f64 = raw.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(ConfigurationError::ZeroWeightSum {
            profile_id: profile.id,
        });
    }

    Ok(ResolvedWeights {
        profile_id: profile.id,
        profile_name: profile.name.clone(),
        weights: raw.into_iter().map(|weight| weight / total).collect(),
    })
}
