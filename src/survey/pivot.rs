//! Pivot re-probe of large Coarse jumps.
//!
//! A single lucky or unlucky answer after a big jump can send the search the
//! wrong way. The first Coarse answer that lands after a jump of at least
//! `jump_threshold` is re-probed once with a different word at the same rank.
//! If the two answers disagree the bounds are widened by half the jump and the
//! search falls back to slower Fine steps.

use crate::survey::config::SurveyConfig;
use crate::survey::types::{AnswerRecord, Phase, PivotProbe, SurveySession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotOutcome {
    Agreed,
    Disagreed,
}

pub struct PivotController<'a> {
    config: &'a SurveyConfig,
}

impl<'a> PivotController<'a> {
    pub fn new(config: &'a SurveyConfig) -> Self {
        Self { config }
    }

    /// Returns the probe to schedule when `record` (already pushed into
    /// history) should be re-checked. Fires at most once per session.
    pub fn detect(&self, session: &SurveySession, record: &AnswerRecord) -> Option<PivotProbe> {
        if session.pivot_triggered || record.is_pivot || record.phase != Phase::Coarse {
            return None;
        }
        let n = session.history.len();
        if n < 2 {
            return None;
        }
        let previous = &session.history[n - 2];
        let jump = record.target_rank.abs_diff(previous.target_rank);
        if jump < self.config.pivot.jump_threshold {
            return None;
        }

        tracing::debug!(
            session_id = %session.id,
            rank = record.target_rank,
            jump,
            correct = record.is_correct,
            "Large coarse jump, scheduling pivot probe"
        );
        Some(PivotProbe {
            rank: record.target_rank,
            original_word_id: record.word_id.clone(),
            original_correct: record.is_correct,
            jump,
        })
    }

    /// Compares the pivot answer with the original one. On disagreement the
    /// bound the original answer set is pushed back by half the jump and the
    /// search slows down.
    pub fn resolve(&self, session: &mut SurveySession, probe: &PivotProbe, pivot_correct: bool) -> PivotOutcome {
        if probe.original_correct == pivot_correct {
            return PivotOutcome::Agreed;
        }

        let half = probe.jump / 2;
        let max = session.max_rank.max(1);
        if probe.original_correct {
            session.low_bound = session.low_bound.saturating_sub(half).max(1);
        } else {
            session.high_bound = session.high_bound.saturating_add(half).min(max);
        }

        let pivot = &self.config.pivot;
        session.pivot_failed = true;
        session.step_scale = pivot.reduced_step_scale;
        session.forced_fine_remaining = pivot.forced_fine_questions;
        session.phase = Phase::Fine;

        tracing::info!(
            session_id = %session.id,
            rank = probe.rank,
            jump = probe.jump,
            original_correct = probe.original_correct,
            low = session.low_bound,
            high = session.high_bound,
            "Pivot disagreed with original answer, widening bounds"
        );
        PivotOutcome::Disagreed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::types::SessionStatus;

    fn session(low: u32, high: u32) -> SurveySession {
        SurveySession {
            id: "s".to_string(),
            status: SessionStatus::Active,
            max_rank: 8000,
            current_rank: 3500,
            low_bound: low,
            high_bound: high,
            phase: Phase::Coarse,
            history: vec![],
            pivot_triggered: false,
            pivot: None,
            pivot_failed: false,
            forced_fine_remaining: 0,
            step_scale: 1.0,
            verify_anchor: None,
            confidence: 0.0,
            hint: None,
            outstanding: None,
        }
    }

    fn record(rank: u32, phase: Phase, correct: bool) -> AnswerRecord {
        AnswerRecord {
            question_index: 0,
            target_rank: rank,
            word_id: format!("w{rank}"),
            word_rank: rank,
            phase,
            is_pivot: false,
            selected: vec![],
            credit: 0.0,
            is_correct: correct,
            elapsed_ms: 0,
            timed_out: false,
            low_after: 1,
            high_after: 8000,
        }
    }

    #[test]
    fn detects_large_coarse_jump_once() {
        let cfg = SurveyConfig::default();
        let ctl = PivotController::new(&cfg);
        let mut s = session(2000, 8000);
        s.history = vec![record(2000, Phase::Coarse, true), record(3500, Phase::Coarse, true)];
        let probe = ctl.detect(&s, &s.history[1]).unwrap();
        assert_eq!(probe.rank, 3500);
        assert_eq!(probe.jump, 1500);
        assert!(probe.original_correct);

        s.pivot_triggered = true;
        assert!(ctl.detect(&s, &s.history[1]).is_none());
    }

    #[test]
    fn threshold_is_inclusive() {
        let cfg = SurveyConfig::default();
        let ctl = PivotController::new(&cfg);
        let mut s = session(1, 8000);
        s.history = vec![record(2000, Phase::Coarse, true), record(3499, Phase::Coarse, true)];
        assert!(ctl.detect(&s, &s.history[1]).is_none());

        s.history = vec![record(3500, Phase::Coarse, false), record(2000, Phase::Coarse, false)];
        assert_eq!(ctl.detect(&s, &s.history[1]).unwrap().jump, cfg.pivot.jump_threshold);
    }

    #[test]
    fn small_jumps_and_fine_answers_are_ignored() {
        let cfg = SurveyConfig::default();
        let ctl = PivotController::new(&cfg);
        let mut s = session(1, 8000);
        s.history = vec![record(2000, Phase::Coarse, true), record(2750, Phase::Coarse, true)];
        assert!(ctl.detect(&s, &s.history[1]).is_none());

        s.history = vec![record(2000, Phase::Fine, true), record(3600, Phase::Fine, true)];
        assert!(ctl.detect(&s, &s.history[1]).is_none());

        s.history = vec![record(2000, Phase::Coarse, true)];
        assert!(ctl.detect(&s, &s.history[0]).is_none());
    }

    #[test]
    fn disagreement_after_correct_lowers_low_bound() {
        let cfg = SurveyConfig::default();
        let ctl = PivotController::new(&cfg);
        let mut s = session(3500, 8000);
        let probe = PivotProbe {
            rank: 3500,
            original_word_id: "w3500".to_string(),
            original_correct: true,
            jump: 1500,
        };
        assert_eq!(ctl.resolve(&mut s, &probe, false), PivotOutcome::Disagreed);
        assert_eq!(s.low_bound, 2750);
        assert_eq!(s.high_bound, 8000);
        assert!(s.pivot_failed);
        assert_eq!(s.step_scale, 0.5);
        assert_eq!(s.forced_fine_remaining, 3);
        assert_eq!(s.phase, Phase::Fine);
    }

    #[test]
    fn disagreement_after_incorrect_raises_high_bound() {
        let cfg = SurveyConfig::default();
        let ctl = PivotController::new(&cfg);
        let mut s = session(2000, 7800);
        let probe = PivotProbe {
            rank: 7800,
            original_word_id: "w7800".to_string(),
            original_correct: false,
            jump: 1600,
        };
        ctl.resolve(&mut s, &probe, true);
        assert_eq!(s.high_bound, 8000);
    }

    #[test]
    fn agreement_changes_nothing() {
        let cfg = SurveyConfig::default();
        let ctl = PivotController::new(&cfg);
        let mut s = session(2000, 3500);
        let before = s.clone();
        let probe = PivotProbe {
            rank: 3500,
            original_word_id: "w3500".to_string(),
            original_correct: false,
            jump: 1500,
        };
        assert_eq!(ctl.resolve(&mut s, &probe, false), PivotOutcome::Agreed);
        assert_eq!(s, before);
    }
}
