use serde::{Deserialize, Serialize};

use crate::survey::types::{Benchmark, ProficiencyHint};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetConfig {
    /// 达到该题数且置信度足够时结束
    pub target_questions: u32,
    /// 硬上限，无论置信度如何都结束
    pub max_questions: u32,
    /// Coarse phase covers questions `1..=coarse_questions`
    pub coarse_questions: u32,
    /// Fine phase runs until this many questions are answered
    pub fine_questions_end: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            target_questions: 15,
            max_questions: 20,
            coarse_questions: 5,
            fine_questions_end: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    pub coarse_step: u32,
    pub fine_step: u32,
    pub verify_step: u32,
    /// Bound widths compared when scoring stability
    pub stability_window: usize,
    pub confidence_threshold: f64,
    /// 置信度中各分量的权重，合计应为 1
    pub stability_weight: f64,
    pub precision_weight: f64,
    pub agreement_weight: f64,
    /// Cap applied while a failed pivot still forces Fine questions
    pub pivot_failure_confidence_cap: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            coarse_step: 1500,
            fine_step: 200,
            verify_step: 100,
            stability_window: 3,
            confidence_threshold: 0.75,
            stability_weight: 0.4,
            precision_weight: 0.3,
            agreement_weight: 0.3,
            pivot_failure_confidence_cap: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotConfig {
    pub jump_threshold: u32,
    pub reduced_step_scale: f64,
    pub forced_fine_questions: u32,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            jump_threshold: 1500,
            reduced_step_scale: 0.5,
            forced_fine_questions: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeConfig {
    pub option_count: usize,
    pub max_target_options: usize,
    pub max_trap_options: usize,
    pub filler_band: u32,
    /// Initial half-width of the nearest-word search; doubles until it covers the rank space
    pub word_search_band: u32,
    pub response_time_limit_ms: u64,
    pub unknown_option_text: String,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            option_count: 6,
            max_target_options: 3,
            max_trap_options: 3,
            filler_band: 50,
            word_search_band: 25,
            response_time_limit_ms: 12_000,
            unknown_option_text: "I don't know this word".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairnessConfig {
    /// Traps must score strictly below this similarity against every target sense
    pub similarity_threshold: f64,
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsConfig {
    pub reach_penalty_factor: f64,
    pub reach_support_band: u32,
    pub reach_support_window: usize,
    /// Minimum credit for an answer to be graded correct
    pub correct_credit_threshold: f64,
    /// Fitted probability above which a rank counts as owned
    pub owned_probability: f64,
    pub benchmarks: Vec<Benchmark>,
}

fn default_benchmarks() -> Vec<Benchmark> {
    [
        ("Survival basics", 1000),
        ("Everyday conversation", 2000),
        ("Newspaper reading", 3500),
        ("Academic texts", 5000),
        ("Literary prose", 6500),
        ("Native-like breadth", 8000),
    ]
    .into_iter()
    .map(|(name, rank)| Benchmark {
        name: name.to_string(),
        rank,
    })
    .collect()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            reach_penalty_factor: 0.8,
            reach_support_band: 300,
            reach_support_window: 3,
            correct_credit_threshold: 0.5,
            owned_probability: 0.8,
            benchmarks: default_benchmarks(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConfig {
    pub default_rank: u32,
    pub beginner_rank: u32,
    pub intermediate_rank: u32,
    pub advanced_rank: u32,
}

impl Default for StartConfig {
    fn default() -> Self {
        Self {
            default_rank: 2000,
            beginner_rank: 1000,
            intermediate_rank: 3500,
            advanced_rank: 5500,
        }
    }
}

impl StartConfig {
    pub fn rank_for(&self, hint: Option<ProficiencyHint>) -> u32 {
        match hint {
            None => self.default_rank,
            Some(ProficiencyHint::A1 | ProficiencyHint::A2) => self.beginner_rank,
            Some(ProficiencyHint::B1 | ProficiencyHint::B2) => self.intermediate_rank,
            Some(ProficiencyHint::C1 | ProficiencyHint::C2) => self.advanced_rank,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyConfig {
    pub max_rank: u32,
    pub budget: BudgetConfig,
    pub search: SearchConfig,
    pub pivot: PivotConfig,
    pub challenge: ChallengeConfig,
    pub fairness: FairnessConfig,
    pub metrics: MetricsConfig,
    pub start: StartConfig,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            max_rank: 8000,
            budget: BudgetConfig::default(),
            search: SearchConfig::default(),
            pivot: PivotConfig::default(),
            challenge: ChallengeConfig::default(),
            fairness: FairnessConfig::default(),
            metrics: MetricsConfig::default(),
            start: StartConfig::default(),
        }
    }
}

impl SurveyConfig {
    pub fn from_env(env_config: &crate::config::SurveyEnvConfig) -> Self {
        let mut config = Self::default();
        config.max_rank = env_config.max_rank;
        config.budget.target_questions = env_config.target_questions;
        config.budget.max_questions = env_config.max_questions;
        config.fairness.similarity_threshold = env_config.similarity_threshold;
        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_rank < 2 {
            return Err("max_rank must be >= 2".to_string());
        }

        // Budget
        let b = &self.budget;
        if b.target_questions == 0 {
            return Err("budget.target_questions must be > 0".to_string());
        }
        if b.max_questions < b.target_questions {
            return Err("budget.max_questions must be >= budget.target_questions".to_string());
        }
        if b.coarse_questions > b.fine_questions_end {
            return Err("budget.coarse_questions must be <= budget.fine_questions_end".to_string());
        }
        if b.fine_questions_end > b.target_questions {
            return Err("budget.fine_questions_end must be <= budget.target_questions".to_string());
        }

        // Search
        let s = &self.search;
        if s.coarse_step == 0 || s.fine_step == 0 || s.verify_step == 0 {
            return Err("search steps must be > 0".to_string());
        }
        if s.stability_window < 2 {
            return Err("search.stability_window must be >= 2".to_string());
        }
        if !(0.0..=1.0).contains(&s.confidence_threshold) {
            return Err("search.confidence_threshold must be in [0,1]".to_string());
        }
        if !(0.0..=1.0).contains(&s.pivot_failure_confidence_cap) {
            return Err("search.pivot_failure_confidence_cap must be in [0,1]".to_string());
        }
        if s.stability_weight < 0.0 || s.precision_weight < 0.0 || s.agreement_weight < 0.0 {
            return Err("search confidence weights must be >= 0".to_string());
        }
        let weight_sum = s.stability_weight + s.precision_weight + s.agreement_weight;
        if (weight_sum - 1.0).abs() > 0.01 {
            return Err(format!(
                "search confidence weights should sum to ~1.0 (got {weight_sum:.3})"
            ));
        }

        // Pivot
        if self.pivot.jump_threshold == 0 {
            return Err("pivot.jump_threshold must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.pivot.reduced_step_scale) || self.pivot.reduced_step_scale == 0.0 {
            return Err("pivot.reduced_step_scale must be in (0,1]".to_string());
        }

        // Challenge
        let c = &self.challenge;
        if c.option_count < 3 {
            return Err("challenge.option_count must be >= 3".to_string());
        }
        if c.max_target_options == 0 || c.max_target_options + 2 > c.option_count {
            return Err(
                "challenge.max_target_options must leave room for a distractor and the unknown option"
                    .to_string(),
            );
        }
        if c.filler_band == 0 || c.word_search_band == 0 {
            return Err("challenge search bands must be > 0".to_string());
        }
        if c.response_time_limit_ms == 0 {
            return Err("challenge.response_time_limit_ms must be > 0".to_string());
        }

        // Fairness
        if !(0.0..=1.0).contains(&self.fairness.similarity_threshold) {
            return Err("fairness.similarity_threshold must be in [0,1]".to_string());
        }

        // Metrics
        let m = &self.metrics;
        if !(0.0..=1.0).contains(&m.reach_penalty_factor) {
            return Err("metrics.reach_penalty_factor must be in [0,1]".to_string());
        }
        if m.reach_support_window < 2 {
            return Err("metrics.reach_support_window must be >= 2".to_string());
        }
        if !(0.0..=1.0).contains(&m.correct_credit_threshold) || m.correct_credit_threshold == 0.0 {
            return Err("metrics.correct_credit_threshold must be in (0,1]".to_string());
        }
        if !(0.0..=1.0).contains(&m.owned_probability) {
            return Err("metrics.owned_probability must be in [0,1]".to_string());
        }

        // Start ranks
        let st = &self.start;
        for rank in [st.default_rank, st.beginner_rank, st.intermediate_rank, st.advanced_rank] {
            if rank == 0 {
                return Err("start ranks must be >= 1".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SurveyConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = SurveyConfig::default();
        cfg.budget.max_questions = 10;
        assert!(cfg.validate().is_err());

        let mut cfg = SurveyConfig::default();
        cfg.fairness.similarity_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = SurveyConfig::default();
        cfg.search.stability_weight = 0.9;
        assert!(cfg.validate().is_err());

        let mut cfg = SurveyConfig::default();
        cfg.challenge.max_target_options = 5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn hint_maps_to_three_start_ranks() {
        let start = StartConfig::default();
        assert_eq!(start.rank_for(None), 2000);
        assert_eq!(start.rank_for(Some(ProficiencyHint::A1)), 1000);
        assert_eq!(start.rank_for(Some(ProficiencyHint::A2)), 1000);
        assert_eq!(start.rank_for(Some(ProficiencyHint::B1)), 3500);
        assert_eq!(start.rank_for(Some(ProficiencyHint::B2)), 3500);
        assert_eq!(start.rank_for(Some(ProficiencyHint::C1)), 5500);
        assert_eq!(start.rank_for(Some(ProficiencyHint::C2)), 5500);
    }

    #[test]
    fn serde_roundtrip_keeps_benchmarks() {
        let cfg = SurveyConfig::default();
        let encoded = serde_json::to_string(&cfg).unwrap();
        let decoded: SurveyConfig = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.metrics.benchmarks.len(), 6);
        assert_eq!(decoded.max_rank, 8000);
    }
}
