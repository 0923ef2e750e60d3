use serde::{Deserialize, Serialize};

use super::domain::CriterionId;

/// Tunables for analysis runs and result queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    pub default_top_n: usize,
    pub max_top_n: usize,
    /// Wall-clock budget for one run; `None` disables the deadline.
    pub run_timeout_ms: Option<u64>,
    /// Criterion averaged next to closeness in statistics responses.
    pub statistics_criterion: CriterionId,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            default_top_n: 10,
            max_top_n: 50,
            run_timeout_ms: None,
            statistics_criterion: CriterionId::new("rent_cost"),
        }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_top_n == 0 {
            return Err("max_top_n must be at least 1".to_string());
        }
        if self.default_top_n == 0 || self.default_top_n > self.max_top_n {
            return Err(format!(
                "default_top_n must be between 1 and {}",
                self.max_top_n
            ));
        }
        Ok(())
    }
}
