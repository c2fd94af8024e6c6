//! Discriminator: keeps near-synonyms of the target out of the trap options.

use crate::survey::config::FairnessConfig;
use crate::survey::lexicon::{LexicalStore, Sense};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Admitted { max_similarity: f64 },
    TooSimilar { similarity: f64 },
    /// Similarity could not be computed against at least one target sense.
    Unverifiable,
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

pub struct Discriminator<'a> {
    lexicon: &'a dyn LexicalStore,
    threshold: f64,
}

impl<'a> Discriminator<'a> {
    pub fn new(lexicon: &'a dyn LexicalStore, config: &FairnessConfig) -> Self {
        Self {
            lexicon,
            threshold: config.similarity_threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// A candidate passes only if it is strictly below the threshold against
    /// every target sense.
    pub fn judge(&self, targets: &[&Sense], candidate: &Sense) -> Verdict {
        let mut max_similarity = f64::NEG_INFINITY;
        for target in targets {
            match self.lexicon.similarity(target, candidate) {
                Some(sim) if sim >= self.threshold => {
                    return Verdict::TooSimilar { similarity: sim };
                }
                Some(sim) => max_similarity = max_similarity.max(sim),
                None => return Verdict::Unverifiable,
            }
        }
        if targets.is_empty() {
            return Verdict::Unverifiable;
        }
        Verdict::Admitted { max_similarity }
    }

    /// Filters candidates in order, keeping at most `limit` admitted senses.
    pub fn filter<'s>(
        &self,
        targets: &[&Sense],
        candidates: impl IntoIterator<Item = &'s Sense>,
        limit: usize,
    ) -> Vec<&'s Sense> {
        let mut admitted = Vec::with_capacity(limit);
        let mut rejected = 0usize;
        for candidate in candidates {
            if admitted.len() >= limit {
                break;
            }
            if self.judge(targets, candidate).is_admitted() {
                admitted.push(candidate);
            } else {
                rejected += 1;
            }
        }
        if rejected > 0 {
            tracing::debug!(rejected, admitted = admitted.len(), "Fairness filter rejected trap candidates");
        }
        admitted
    }
}
