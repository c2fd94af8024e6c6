use std::collections::HashSet;

use vocab_survey::store::Store;
use vocab_survey::survey::challenge::UNKNOWN_OPTION_ID;
use vocab_survey::survey::lexicon::{RankedWord, Sense};
use vocab_survey::survey::types::{
    AnswerSubmission, ChallengePayload, ProficiencyHint, StepOutcome, SurveySession,
    TriMetricReport,
};
use vocab_survey::survey::{Lexicon, SurveyConfig, SurveyEngine};

pub const LEXICON_SIZE: u32 = 8000;
pub const EMBEDDING_DIM: usize = 8;

/// `w2001` carries a secondary sense with exactly the embedding of `w2000`'s
/// only sense. It must never be offered as a trap when `w2000` is asked.
pub const NEAR_SYNONYM_TARGET: &str = "w2000";
pub const NEAR_SYNONYM_SENSE: &str = "w2001-near";

/// Deterministic pseudo-random embedding.
pub fn embedding(seed: u32) -> Vec<f32> {
    (0..EMBEDDING_DIM as u32)
        .map(|i| {
            let x = seed
                .wrapping_mul(2_654_435_761)
                .wrapping_add(i.wrapping_mul(40_503))
                .rotate_left(i + 7)
                .wrapping_mul(2_246_822_519);
            (x % 2000) as f32 / 1000.0 - 1.0
        })
        .collect()
}

fn sense(id: String, definition: String, usage_ratio: f64, seed: u32) -> Sense {
    Sense {
        id,
        definition,
        usage_ratio,
        embedding: Some(embedding(seed)),
    }
}

/// One word per rank. Every third word has two senses (70/30 usage) and every
/// word is confusable with its two neighbours on each side.
pub fn synthetic_words(max_rank: u32) -> Vec<RankedWord> {
    (1..=max_rank)
        .map(|rank| {
            let mut senses = if rank % 3 == 0 {
                vec![
                    sense(format!("w{rank}-s1"), format!("primary meaning of word{rank}"), 0.7, rank),
                    sense(
                        format!("w{rank}-s2"),
                        format!("secondary meaning of word{rank}"),
                        0.3,
                        rank + 100_000,
                    ),
                ]
            } else {
                vec![sense(format!("w{rank}-s1"), format!("meaning of word{rank}"), 1.0, rank)]
            };
            if rank == 2001 {
                senses.push(sense(
                    NEAR_SYNONYM_SENSE.to_string(),
                    "a near-synonym of word2000".to_string(),
                    0.1,
                    2000,
                ));
            }

            let confusables = [rank.saturating_sub(2), rank.saturating_sub(1), rank + 1, rank + 2]
                .into_iter()
                .filter(|r| *r >= 1 && *r <= max_rank && *r != rank)
                .map(|r| format!("w{r}"))
                .collect();

            RankedWord {
                id: format!("w{rank}"),
                text: format!("word{rank}"),
                rank,
                senses,
                confusables,
            }
        })
        .collect()
}

pub fn synthetic_lexicon(max_rank: u32) -> Lexicon {
    Lexicon::from_words(synthetic_words(max_rank))
}

pub fn seed_lexicon(store: &Store, max_rank: u32) -> usize {
    store
        .import_lexicon_words(&synthetic_words(max_rank))
        .expect("import synthetic lexicon")
}

/// Knows every word up to `vocabulary` plus an explicit set of lucky words,
/// and never knows the explicitly unlucky ones.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTaker {
    pub vocabulary: u32,
    pub lucky: HashSet<String>,
    pub unlucky: HashSet<String>,
}

impl SimulatedTaker {
    pub fn with_vocabulary(vocabulary: u32) -> Self {
        Self {
            vocabulary,
            ..Self::default()
        }
    }

    pub fn knows(&self, challenge: &ChallengePayload) -> bool {
        if self.unlucky.contains(&challenge.word_id) {
            return false;
        }
        self.lucky.contains(&challenge.word_id) || challenge.word_rank <= self.vocabulary
    }

    pub fn answer(&self, challenge: &ChallengePayload) -> AnswerSubmission {
        let selected = if self.knows(challenge) {
            challenge.target_ids().into_iter().map(String::from).collect()
        } else {
            vec![UNKNOWN_OPTION_ID.to_string()]
        };
        AnswerSubmission {
            challenge_id: challenge.challenge_id.clone(),
            selected,
            elapsed_ms: 2_000,
        }
    }
}

pub struct SurveyRun {
    pub session: SurveySession,
    pub report: TriMetricReport,
    pub challenges: Vec<ChallengePayload>,
    /// Session state after every step, in order
    pub steps: Vec<SurveySession>,
}

pub fn run_survey(
    engine: &SurveyEngine,
    lexicon: &Lexicon,
    session_id: &str,
    hint: Option<ProficiencyHint>,
    taker: &SimulatedTaker,
) -> SurveyRun {
    let (mut session, mut challenge) = engine.start(lexicon, session_id, hint).expect("start");
    let mut challenges = vec![challenge.clone()];
    let mut steps = Vec::new();

    loop {
        let outcome = engine
            .next(lexicon, &session, &taker.answer(&challenge))
            .expect("next");
        steps.push(outcome.session().clone());
        match outcome {
            StepOutcome::Continue {
                session: s,
                challenge: c,
            } => {
                session = s;
                challenge = c;
                challenges.push(challenge.clone());
            }
            StepOutcome::Complete { session, report } => {
                return SurveyRun {
                    session,
                    report,
                    challenges,
                    steps,
                };
            }
        }
    }
}

pub fn default_engine() -> SurveyEngine {
    SurveyEngine::new(SurveyConfig::default()).expect("default config is valid")
}
