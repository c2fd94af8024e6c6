use serde::{Deserialize, Serialize};

/// Search phase of a survey. The phase decides the step size used to pick the
/// next rank; transitions are guarded in [`crate::survey::phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Coarse,
    Fine,
    Verify,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coarse => "coarse",
            Self::Fine => "fine",
            Self::Verify => "verify",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// Coarse six-level proficiency hint supplied when a survey starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProficiencyHint {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl ProficiencyHint {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A1" => Some(Self::A1),
            "A2" => Some(Self::A2),
            "B1" => Some(Self::B1),
            "B2" => Some(Self::B2),
            "C1" => Some(Self::C1),
            "C2" => Some(Self::C2),
            _ => None,
        }
    }
}

/// Role of an option inside a challenge. Closed set; the client never sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRole {
    Target,
    Trap,
    Filler,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeOption {
    pub id: String,
    pub text: String,
    pub role: OptionRole,
    pub is_correct: bool,
    /// Usage ratio for target senses, 0 for everything else.
    pub weight: f64,
}

/// A question in flight, including its answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengePayload {
    pub challenge_id: String,
    pub question_index: u32,
    pub word_id: String,
    pub word_text: String,
    pub target_rank: u32,
    pub word_rank: u32,
    pub is_pivot: bool,
    pub phase: Phase,
    pub options: Vec<ChallengeOption>,
    pub time_limit_ms: u64,
}

impl ChallengePayload {
    pub fn option(&self, option_id: &str) -> Option<&ChallengeOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn target_ids(&self) -> Vec<&str> {
        self.options
            .iter()
            .filter(|o| o.role == OptionRole::Target)
            .map(|o| o.id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub challenge_id: String,
    pub selected: Vec<String>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

/// One graded question in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_index: u32,
    pub target_rank: u32,
    pub word_id: String,
    pub word_rank: u32,
    pub phase: Phase,
    pub is_pivot: bool,
    pub selected: Vec<String>,
    /// Usage-weighted share of the target senses that were picked, 0 when any
    /// wrong option was picked.
    pub credit: f64,
    pub is_correct: bool,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub timed_out: bool,
    pub low_after: u32,
    pub high_after: u32,
}

impl AnswerRecord {
    pub fn width_after(&self) -> u32 {
        self.high_after.saturating_sub(self.low_after)
    }
}

/// A pending or in-flight re-probe of a suspicious jump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotProbe {
    pub rank: u32,
    pub original_word_id: String,
    pub original_correct: bool,
    pub jump: u32,
}

/// Full, serializable state of one survey. Every step takes one of these and
/// returns the next one; nothing about a session lives anywhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySession {
    pub id: String,
    pub status: SessionStatus,
    pub max_rank: u32,
    pub current_rank: u32,
    pub low_bound: u32,
    pub high_bound: u32,
    pub phase: Phase,
    pub history: Vec<AnswerRecord>,
    pub pivot_triggered: bool,
    #[serde(default)]
    pub pivot: Option<PivotProbe>,
    #[serde(default)]
    pub pivot_failed: bool,
    #[serde(default)]
    pub forced_fine_remaining: u32,
    pub step_scale: f64,
    #[serde(default)]
    pub verify_anchor: Option<u32>,
    pub confidence: f64,
    #[serde(default)]
    pub hint: Option<ProficiencyHint>,
    #[serde(default)]
    pub outstanding: Option<ChallengePayload>,
}

impl SurveySession {
    pub fn question_count(&self) -> u32 {
        self.history.len() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn width(&self) -> u32 {
        self.high_bound.saturating_sub(self.low_bound)
    }

    pub fn used_word_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.history.iter().map(|h| h.word_id.as_str()).collect();
        if let Some(challenge) = &self.outstanding {
            ids.push(challenge.word_id.as_str());
        }
        ids
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneConfidence {
    High,
    Low,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankBand {
    pub start: u32,
    pub end: u32,
    pub confidence: ZoneConfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneBreakdown {
    pub owned: RankBand,
    pub frontier: RankBand,
    pub unexplored: RankBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Benchmark {
    pub name: String,
    pub rank: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BenchmarkStatus {
    Passed,
    NotReached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub name: String,
    pub rank: u32,
    pub status: BenchmarkStatus,
}

/// Terminal output of a survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriMetricReport {
    pub session_id: String,
    pub volume: u32,
    pub reach: u32,
    pub density: f64,
    pub confidence: f64,
    pub questions_asked: u32,
    pub max_rank: u32,
    pub zones: ZoneBreakdown,
    pub benchmarks: Vec<BenchmarkResult>,
}

/// Result of one `next` step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Continue {
        session: SurveySession,
        challenge: ChallengePayload,
    },
    Complete {
        session: SurveySession,
        report: TriMetricReport,
    },
}

impl StepOutcome {
    pub fn session(&self) -> &SurveySession {
        match self {
            Self::Continue { session, .. } | Self::Complete { session, .. } => session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_parse_is_case_insensitive() {
        assert_eq!(ProficiencyHint::parse("b2"), Some(ProficiencyHint::B2));
        assert_eq!(ProficiencyHint::parse(" C1 "), Some(ProficiencyHint::C1));
        assert_eq!(ProficiencyHint::parse("D1"), None);
    }

    #[test]
    fn option_role_serializes_lowercase() {
        let json = serde_json::to_value(OptionRole::Unknown).unwrap();
        assert_eq!(json, "unknown");
        let phase = serde_json::to_value(Phase::Verify).unwrap();
        assert_eq!(phase, "verify");
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = AnswerRecord {
            question_index: 0,
            target_rank: 2000,
            word_id: "w".to_string(),
            word_rank: 2000,
            phase: Phase::Coarse,
            is_pivot: false,
            selected: vec![],
            credit: 1.0,
            is_correct: true,
            elapsed_ms: 10,
            timed_out: false,
            low_after: 2000,
            high_after: 8000,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("targetRank").is_some());
        assert!(json.get("lowAfter").is_some());
        assert_eq!(record.width_after(), 6000);
    }
}
