//! Phase Controller: bounds, step sizes, confidence and the stop rule.
//!
//! 阶段由已答题数、强制细查计数和 pivot 失败标志共同决定：
//! Coarse (大步二分) → Fine (小步收敛) → Verify (围绕锚点复核)。

use crate::survey::config::SurveyConfig;
use crate::survey::types::{Phase, SurveySession};

pub struct PhaseController<'a> {
    config: &'a SurveyConfig,
}

impl<'a> PhaseController<'a> {
    pub fn new(config: &'a SurveyConfig) -> Self {
        Self { config }
    }

    /// Phase for the next question given what has been answered so far.
    pub fn phase_for(&self, session: &SurveySession) -> Phase {
        let answered = session.question_count();
        let budget = &self.config.budget;

        if session.forced_fine_remaining > 0 {
            Phase::Fine
        } else if answered < budget.coarse_questions && !session.pivot_failed {
            Phase::Coarse
        } else if answered < budget.fine_questions_end {
            Phase::Fine
        } else {
            Phase::Verify
        }
    }

    /// Narrows the bounds after a Coarse or Fine answer. Verify answers leave
    /// the bounds untouched.
    pub fn apply_answer(&self, session: &mut SurveySession, phase: Phase, rank: u32, correct: bool) {
        match phase {
            Phase::Coarse | Phase::Fine => {
                if correct {
                    session.low_bound = rank;
                } else {
                    session.high_bound = rank;
                }
            }
            Phase::Verify => {}
        }
        self.normalize_bounds(session);
    }

    /// Restores `1 <= low <= high <= max`. Inversion should not happen; when it
    /// does it is repaired here and never reaches the metrics.
    pub fn normalize_bounds(&self, session: &mut SurveySession) {
        if session.low_bound > session.high_bound {
            tracing::warn!(
                session_id = %session.id,
                phase = session.phase.as_str(),
                question = session.question_count(),
                low = session.low_bound,
                high = session.high_bound,
                "Bound inversion detected, swapping"
            );
            std::mem::swap(&mut session.low_bound, &mut session.high_bound);
        }
        let max = session.max_rank.max(1);
        session.low_bound = session.low_bound.clamp(1, max);
        session.high_bound = session.high_bound.clamp(session.low_bound, max);
    }

    /// Freezes the boundary estimate and widens the bounds so every re-probe
    /// stays inside them.
    pub fn enter_verify(&self, session: &mut SurveySession) {
        let anchor = midpoint(session.low_bound, session.high_bound);
        let margin = self.config.search.verify_step.saturating_mul(2);
        let max = session.max_rank.max(1);

        session.verify_anchor = Some(anchor);
        session.low_bound = session.low_bound.min(anchor.saturating_sub(margin)).max(1);
        session.high_bound = session.high_bound.max(anchor.saturating_add(margin)).min(max);

        tracing::debug!(
            session_id = %session.id,
            anchor,
            low = session.low_bound,
            high = session.high_bound,
            "Entering verify phase"
        );
    }

    /// Rank for the next non-pivot question in `phase`.
    pub fn next_rank(&self, session: &SurveySession, phase: Phase) -> u32 {
        let search = &self.config.search;
        let (low, high) = (session.low_bound, session.high_bound);

        let raw = match phase {
            Phase::Coarse | Phase::Fine => {
                let base = if phase == Phase::Coarse { search.coarse_step } else { search.fine_step };
                let step = scaled(base, session.step_scale);
                let mid = midpoint(low, high) as i64;
                let current = session.current_rank as i64;
                current + (mid - current).clamp(-step, step)
            }
            Phase::Verify => {
                let anchor = session.verify_anchor.unwrap_or_else(|| midpoint(low, high)) as i64;
                let probe = session
                    .history
                    .iter()
                    .filter(|r| r.phase == Phase::Verify && !r.is_pivot)
                    .count();
                anchor + verify_offset(probe, scaled(search.verify_step, session.step_scale))
            }
        };

        let max = session.max_rank.max(1) as i64;
        raw.clamp(low as i64, high as i64).clamp(1, max) as u32
    }

    /// Weighted blend of bound stability, bound precision and verify agreement.
    pub fn confidence(&self, session: &SurveySession) -> f64 {
        let search = &self.config.search;

        let stability = stability(session, search.stability_window);
        let scale = (session.max_rank as f64 / 8.0).max(1.0);
        let precision = (1.0 - session.width() as f64 / scale).clamp(0.0, 1.0);
        let agreement = agreement(session);

        let confidence = search.stability_weight * stability
            + search.precision_weight * precision
            + search.agreement_weight * agreement;
        let confidence = confidence.clamp(0.0, 1.0);

        if session.forced_fine_remaining > 0 {
            confidence.min(search.pivot_failure_confidence_cap)
        } else {
            confidence
        }
    }

    pub fn should_stop(&self, session: &SurveySession) -> bool {
        let answered = session.question_count();
        let budget = &self.config.budget;

        answered >= budget.max_questions
            || (answered >= budget.target_questions
                && session.confidence >= self.config.search.confidence_threshold
                && session.forced_fine_remaining == 0)
    }
}

pub fn midpoint(low: u32, high: u32) -> u32 {
    low + high.saturating_sub(low) / 2
}

fn scaled(step: u32, scale: f64) -> i64 {
    ((step as f64 * scale).round() as i64).max(1)
}

/// -1, +1, -2, +2, -1, +1, ... steps around the anchor.
fn verify_offset(probe: usize, step: i64) -> i64 {
    let k = ((probe / 2) % 2 + 1) as i64;
    if probe % 2 == 0 {
        -k * step
    } else {
        k * step
    }
}

fn stability(session: &SurveySession, window: usize) -> f64 {
    if window == 0 || session.history.len() < window {
        return 0.0;
    }
    let widths = session.history[session.history.len() - window..]
        .iter()
        .map(|r| r.width_after());
    let (min, max) = widths.fold((u32::MAX, 0u32), |(lo, hi), w| (lo.min(w), hi.max(w)));
    1.0 - (max - min) as f64 / max.max(1) as f64
}

fn agreement(session: &SurveySession) -> f64 {
    let Some(anchor) = session.verify_anchor else {
        return 1.0;
    };
    let verify: Vec<_> = session
        .history
        .iter()
        .filter(|r| r.phase == Phase::Verify && !r.is_pivot)
        .collect();
    if verify.is_empty() {
        return 1.0;
    }
    let consistent = verify
        .iter()
        .filter(|r| r.is_correct == (r.target_rank <= anchor))
        .count();
    consistent as f64 / verify.len() as f64
}
