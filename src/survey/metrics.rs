//! Tri-metric report: Volume, Reach and Density, plus zones and benchmarks.

use crate::survey::config::SurveyConfig;
use crate::survey::types::{
    AnswerRecord, BenchmarkResult, BenchmarkStatus, RankBand, SurveySession, TriMetricReport,
    ZoneBreakdown, ZoneConfidence,
};

/// One point of the fitted knowledge curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub rank: u32,
    pub probability: f64,
}

pub struct MetricsCalculator<'a> {
    config: &'a SurveyConfig,
}

impl<'a> MetricsCalculator<'a> {
    pub fn new(config: &'a SurveyConfig) -> Self {
        Self { config }
    }

    pub fn report(&self, session: &SurveySession) -> TriMetricReport {
        let max = session.max_rank.max(1);
        let curve = knowledge_curve(&session.history);
        let reach = self.reach(session);
        let volume = volume(&curve, max);
        let density = density(&session.history, reach);
        let owned_end = self.owned_end(&curve, reach);

        let zones = ZoneBreakdown {
            owned: RankBand {
                start: 1,
                end: owned_end,
                confidence: ZoneConfidence::High,
            },
            frontier: RankBand {
                start: owned_end,
                end: reach,
                confidence: ZoneConfidence::Low,
            },
            unexplored: RankBand {
                start: reach,
                end: max,
                confidence: ZoneConfidence::Unknown,
            },
        };

        let benchmarks = self
            .config
            .metrics
            .benchmarks
            .iter()
            .filter(|b| b.rank >= 1 && b.rank <= max)
            .map(|b| BenchmarkResult {
                name: b.name.clone(),
                rank: b.rank,
                status: if b.rank <= reach {
                    BenchmarkStatus::Passed
                } else {
                    BenchmarkStatus::NotReached
                },
            })
            .collect();

        TriMetricReport {
            session_id: session.id.clone(),
            volume,
            reach,
            density,
            confidence: session.confidence,
            questions_asked: session.question_count(),
            max_rank: max,
            zones,
            benchmarks,
        }
    }

    /// Highest correctly answered rank, discounted when the questions just
    /// below it were all missed.
    pub fn reach(&self, session: &SurveySession) -> u32 {
        let max = session.max_rank.max(1);
        let metrics = &self.config.metrics;

        let top = session
            .history
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_correct)
            .max_by(|(ia, a), (ib, b)| a.target_rank.cmp(&b.target_rank).then(ib.cmp(ia)));

        let Some((top_idx, top)) = top else {
            return session.low_bound.clamp(1, max);
        };
        let top_rank = top.target_rank;
        let floor = top_rank.saturating_sub(metrics.reach_support_band);

        let neighbours: Vec<&AnswerRecord> = session
            .history
            .iter()
            .enumerate()
            .filter(|(i, r)| *i != top_idx && r.target_rank >= floor && r.target_rank <= top_rank)
            .map(|(_, r)| r)
            .collect();

        let unsupported = neighbours.len() >= 2
            && neighbours
                .iter()
                .rev()
                .take(metrics.reach_support_window)
                .all(|r| !r.is_correct);

        let reach = if unsupported {
            tracing::debug!(
                session_id = %session.id,
                top_rank,
                "Reach not supported by nearby answers, applying penalty"
            );
            (top_rank as f64 * metrics.reach_penalty_factor).round() as u32
        } else {
            top_rank
        };
        reach.clamp(1, max)
    }

    /// End of the owned zone: highest probed rank at or below Reach whose
    /// fitted probability clears the ownership threshold.
    fn owned_end(&self, curve: &[CurvePoint], reach: u32) -> u32 {
        curve
            .iter()
            .filter(|p| p.rank <= reach && p.probability >= self.config.metrics.owned_probability)
            .map(|p| p.rank)
            .max()
            .unwrap_or(1)
    }
}

/// Non-increasing fit of credit over rank (pool adjacent violators). Answers
/// at the same rank are merged first and weighted by their count.
pub fn knowledge_curve(history: &[AnswerRecord]) -> Vec<CurvePoint> {
    let mut points: Vec<(u32, f64)> = history.iter().map(|r| (r.target_rank, r.credit)).collect();
    points.sort_by_key(|(rank, _)| *rank);

    // (rank, mean, weight)
    let mut merged: Vec<(u32, f64, f64)> = Vec::new();
    for (rank, credit) in points {
        match merged.last_mut() {
            Some((r, mean, weight)) if *r == rank => {
                *mean = (*mean * *weight + credit) / (*weight + 1.0);
                *weight += 1.0;
            }
            _ => merged.push((rank, credit, 1.0)),
        }
    }

    // Blocks of (mean, weight, point count)
    let mut blocks: Vec<(f64, f64, usize)> = Vec::with_capacity(merged.len());
    for &(_, mean, weight) in &merged {
        blocks.push((mean, weight, 1));
        while blocks.len() >= 2 {
            let n = blocks.len();
            let (prev_mean, _, _) = blocks[n - 2];
            let (last_mean, _, _) = blocks[n - 1];
            if last_mean <= prev_mean {
                break;
            }
            let (lm, lw, lc) = blocks.pop().unwrap_or_default();
            if let Some((pm, pw, pc)) = blocks.last_mut() {
                *pm = (*pm * *pw + lm * lw) / (*pw + lw);
                *pw += lw;
                *pc += lc;
            }
        }
    }

    let mut fitted = Vec::with_capacity(merged.len());
    let mut ranks = merged.iter().map(|(rank, _, _)| *rank);
    for (mean, _, count) in blocks {
        for rank in ranks.by_ref().take(count) {
            fitted.push(CurvePoint {
                rank,
                probability: mean.clamp(0.0, 1.0),
            });
        }
    }
    fitted
}

/// Area under the fitted curve over `[1, max_rank]`, linear between probes
/// and flat beyond the outermost ones.
pub fn volume(curve: &[CurvePoint], max_rank: u32) -> u32 {
    let max = max_rank.max(1);
    let (Some(first), Some(last)) = (curve.first(), curve.last()) else {
        return 1;
    };

    let lo = 1.0;
    let hi = max as f64;
    let mut area = 0.0;

    let first_rank = (first.rank as f64).clamp(lo, hi);
    area += (first_rank - lo) * first.probability;

    for pair in curve.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let ra = (a.rank as f64).clamp(lo, hi);
        let rb = (b.rank as f64).clamp(lo, hi);
        area += (rb - ra) * (a.probability + b.probability) / 2.0;
    }

    let last_rank = (last.rank as f64).clamp(lo, hi);
    area += (hi - last_rank) * last.probability;

    (area.round() as u32).clamp(1, max)
}

/// Accuracy of the questions at or below Reach; overall accuracy when none
/// were asked there.
pub fn density(history: &[AnswerRecord], reach: u32) -> f64 {
    let accuracy = |records: &[&AnswerRecord]| {
        if records.is_empty() {
            return None;
        }
        let correct = records.iter().filter(|r| r.is_correct).count();
        Some(correct as f64 / records.len() as f64)
    };

    let zone: Vec<&AnswerRecord> = history.iter().filter(|r| r.target_rank <= reach).collect();
    let all: Vec<&AnswerRecord> = history.iter().collect();
    accuracy(&zone).or_else(|| accuracy(&all)).unwrap_or(0.0)
}
