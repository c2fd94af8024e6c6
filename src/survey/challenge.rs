//! Assembles one six-option multi-select question around a target rank.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sha2::{Digest, Sha256};

use crate::survey::config::SurveyConfig;
use crate::survey::error::SurveyError;
use crate::survey::fairness::Discriminator;
use crate::survey::lexicon::{LexicalStore, RankedWord, Sense};
use crate::survey::types::{ChallengeOption, ChallengePayload, OptionRole, Phase};

pub const UNKNOWN_OPTION_ID: &str = "__unknown__";

/// RNG for one question of one session. Rebuilding the same question always
/// yields the same word, options and order.
pub fn seeded_rng(session_id: &str, question_index: u32) -> StdRng {
    let digest = Sha256::digest(format!("{session_id}:{question_index}").as_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(digest.as_slice());
    StdRng::from_seed(seed)
}

pub fn challenge_id(session_id: &str, question_index: u32) -> String {
    format!("{session_id}-q{question_index}")
}

#[derive(Debug, Clone)]
pub struct ChallengeRequest<'r> {
    pub session_id: &'r str,
    pub question_index: u32,
    pub target_rank: u32,
    pub phase: Phase,
    pub is_pivot: bool,
    /// Words already shown in this session
    pub exclude_word_ids: &'r [&'r str],
}

pub struct ChallengeBuilder<'a> {
    lexicon: &'a dyn LexicalStore,
    config: &'a SurveyConfig,
}

impl<'a> ChallengeBuilder<'a> {
    pub fn new(lexicon: &'a dyn LexicalStore, config: &'a SurveyConfig) -> Self {
        Self { lexicon, config }
    }

    pub fn build(&self, req: &ChallengeRequest<'_>) -> Result<ChallengePayload, SurveyError> {
        let cfg = &self.config.challenge;
        let mut rng = seeded_rng(req.session_id, req.question_index);

        let word = self.nearest_word(req.target_rank, req.exclude_word_ids)?;

        let targets: Vec<&Sense> = word
            .senses_by_usage()
            .into_iter()
            .take(cfg.max_target_options)
            .collect();
        let distractor_slots = cfg.option_count.saturating_sub(targets.len() + 1);

        let mut used_sense_ids: HashSet<&str> = targets.iter().map(|s| s.id.as_str()).collect();
        let target_definitions: HashSet<&str> =
            targets.iter().map(|s| s.definition.as_str()).collect();

        let traps = self.pick_traps(
            word,
            &targets,
            distractor_slots.min(cfg.max_trap_options),
            &mut used_sense_ids,
            &target_definitions,
            &mut rng,
        );

        let filler_needed = distractor_slots - traps.len();
        let fillers = self.pick_fillers(
            word,
            filler_needed,
            &mut used_sense_ids,
            &target_definitions,
            &mut rng,
        )?;

        let mut options: Vec<ChallengeOption> = Vec::with_capacity(cfg.option_count);
        options.extend(targets.iter().map(|s| ChallengeOption {
            id: s.id.clone(),
            text: s.definition.clone(),
            role: OptionRole::Target,
            is_correct: true,
            weight: s.usage_ratio,
        }));
        options.extend(traps.iter().map(|s| distractor(s, OptionRole::Trap)));
        options.extend(fillers.iter().map(|s| distractor(s, OptionRole::Filler)));
        options.shuffle(&mut rng);
        options.push(ChallengeOption {
            id: UNKNOWN_OPTION_ID.to_string(),
            text: cfg.unknown_option_text.clone(),
            role: OptionRole::Unknown,
            is_correct: false,
            weight: 0.0,
        });

        debug_assert_eq!(options.len(), cfg.option_count);

        tracing::debug!(
            target_rank = req.target_rank,
            word_rank = word.rank,
            word_id = %word.id,
            traps = traps.len(),
            fillers = fillers.len(),
            pivot = req.is_pivot,
            "Challenge built"
        );

        Ok(ChallengePayload {
            challenge_id: challenge_id(req.session_id, req.question_index),
            question_index: req.question_index,
            word_id: word.id.clone(),
            word_text: word.text.clone(),
            target_rank: req.target_rank,
            word_rank: word.rank,
            is_pivot: req.is_pivot,
            phase: req.phase,
            options,
            time_limit_ms: cfg.response_time_limit_ms,
        })
    }

    /// Nearest unused word to `rank`: exact rank first, then by distance,
    /// lower rank and id. The band doubles until it spans the whole lexicon.
    pub fn nearest_word(&self, rank: u32, exclude: &[&str]) -> Result<&'a RankedWord, SurveyError> {
        let space_max = self.lexicon.max_rank().max(1);
        let excluded: HashSet<&str> = exclude.iter().copied().collect();
        let mut band = self.config.challenge.word_search_band.max(1);

        loop {
            let lo = rank.saturating_sub(band).max(1);
            let hi = rank.saturating_add(band).min(space_max);

            let best = self
                .lexicon
                .words_in_band(lo, hi)
                .into_iter()
                .filter(|w| !excluded.contains(w.id.as_str()))
                .min_by(|a, b| {
                    a.rank
                        .abs_diff(rank)
                        .cmp(&b.rank.abs_diff(rank))
                        .then_with(|| a.rank.cmp(&b.rank))
                        .then_with(|| a.id.cmp(&b.id))
                });

            if let Some(word) = best {
                return Ok(word);
            }
            if lo <= 1 && hi >= space_max {
                return Err(SurveyError::NoWordAtRank { rank });
            }
            tracing::debug!(rank, band, "No word in band, widening search");
            band = band.saturating_mul(2);
        }
    }

    fn pick_traps(
        &self,
        word: &'a RankedWord,
        targets: &[&Sense],
        limit: usize,
        used: &mut HashSet<&'a str>,
        target_definitions: &HashSet<&str>,
        rng: &mut StdRng,
    ) -> Vec<&'a Sense> {
        if limit == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<&'a Sense> = self
            .lexicon
            .confusables(&word.id)
            .into_iter()
            .flat_map(|w| w.senses.iter())
            .filter(|s| !used.contains(s.id.as_str()))
            .filter(|s| !target_definitions.contains(s.definition.as_str()))
            .collect();
        candidates.shuffle(rng);

        let discriminator = Discriminator::new(self.lexicon, &self.config.fairness);
        let mut traps: Vec<&'a Sense> = Vec::with_capacity(limit);
        for sense in discriminator.filter(targets, candidates, limit * 4) {
            if traps.len() >= limit {
                break;
            }
            if used.insert(sense.id.as_str()) {
                traps.push(sense);
            }
        }

        if traps.len() < limit {
            tracing::debug!(
                word_id = %word.id,
                wanted = limit,
                found = traps.len(),
                "Not enough fair traps, falling back to fillers"
            );
        }
        traps
    }

    /// Primary senses of other words near the target rank. Widens the band
    /// instead of ever touching the similarity threshold.
    fn pick_fillers(
        &self,
        word: &'a RankedWord,
        needed: usize,
        used: &mut HashSet<&'a str>,
        target_definitions: &HashSet<&str>,
        rng: &mut StdRng,
    ) -> Result<Vec<&'a Sense>, SurveyError> {
        if needed == 0 {
            return Ok(Vec::new());
        }

        let space_max = self.lexicon.max_rank().max(1);
        let mut band = self.config.challenge.filler_band.max(1);
        let mut fillers: Vec<&'a Sense> = Vec::with_capacity(needed);

        loop {
            let lo = word.rank.saturating_sub(band).max(1);
            let hi = word.rank.saturating_add(band).min(space_max);

            let mut pool: Vec<&'a Sense> = self
                .lexicon
                .words_in_band(lo, hi)
                .into_iter()
                .filter(|w| w.id != word.id && w.text != word.text)
                .filter_map(|w| w.senses_by_usage().into_iter().next())
                .filter(|s| !used.contains(s.id.as_str()))
                .filter(|s| !target_definitions.contains(s.definition.as_str()))
                .collect();
            pool.shuffle(rng);

            for sense in pool {
                if fillers.len() >= needed {
                    break;
                }
                if used.insert(sense.id.as_str()) {
                    fillers.push(sense);
                }
            }

            if fillers.len() >= needed {
                return Ok(fillers);
            }
            if lo <= 1 && hi >= space_max {
                return Err(SurveyError::InsufficientDistractors {
                    rank: word.rank,
                    needed,
                    found: fillers.len(),
                });
            }
            tracing::debug!(rank = word.rank, band, "Filler band exhausted, widening");
            band = band.saturating_mul(2);
        }
    }
}

fn distractor(sense: &Sense, role: OptionRole) -> ChallengeOption {
    ChallengeOption {
        id: sense.id.clone(),
        text: sense.definition.clone(),
        role,
        is_correct: false,
        weight: 0.0,
    }
}
