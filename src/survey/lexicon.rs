//! Read-only lexical knowledge: ranked words, their senses and the similarity
//! relation between senses. One [`Lexicon`] is shared by every session.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sense {
    pub id: String,
    pub definition: String,
    pub usage_ratio: f64,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedWord {
    pub id: String,
    pub text: String,
    pub rank: u32,
    pub senses: Vec<Sense>,
    /// Ids of look-alike or sound-alike words
    #[serde(default)]
    pub confusables: Vec<String>,
}

impl RankedWord {
    /// Senses ordered by usage ratio, most frequent first.
    pub fn senses_by_usage(&self) -> Vec<&Sense> {
        let mut senses: Vec<&Sense> = self.senses.iter().collect();
        senses.sort_by(|a, b| {
            b.usage_ratio
                .partial_cmp(&a.usage_ratio)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        senses
    }
}

/// Narrow interface the survey engine consumes. Implementations must be safe
/// to read from many sessions at once and are never mutated by a step.
pub trait LexicalStore: Send + Sync {
    /// Highest rank present in the store.
    fn max_rank(&self) -> u32;

    fn word(&self, word_id: &str) -> Option<&RankedWord>;

    /// Words whose rank lies in `[lo, hi]`, ordered by rank then id.
    fn words_in_band(&self, lo: u32, hi: u32) -> Vec<&RankedWord>;

    fn confusables(&self, word_id: &str) -> Vec<&RankedWord> {
        self.word(word_id)
            .map(|w| {
                w.confusables
                    .iter()
                    .filter(|id| id.as_str() != word_id)
                    .filter_map(|id| self.word(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Semantic similarity of two senses, `None` when it cannot be computed.
    fn similarity(&self, a: &Sense, b: &Sense) -> Option<f64> {
        match (&a.embedding, &b.embedding) {
            (Some(ea), Some(eb)) if ea.len() == eb.len() && !ea.is_empty() => {
                Some(cosine_similarity(ea, eb) as f64)
            }
            _ => None,
        }
    }
}

/// Cosine similarity between two embedding vectors; 0 for degenerate input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LexiconStats {
    pub word_count: usize,
    pub sense_count: usize,
    pub min_rank: u32,
    pub max_rank: u32,
}

/// In-memory lexicon indexed by id and by rank.
#[derive(Debug, Default)]
pub struct Lexicon {
    words: HashMap<String, RankedWord>,
    by_rank: BTreeMap<u32, Vec<String>>,
}

impl Lexicon {
    /// Builds the index. Words with rank 0, no senses or a duplicate id are
    /// skipped with a warning.
    pub fn from_words(words: impl IntoIterator<Item = RankedWord>) -> Self {
        let mut lexicon = Self::default();
        let mut skipped = 0usize;

        for word in words {
            if word.rank == 0 || word.senses.is_empty() || lexicon.words.contains_key(&word.id) {
                skipped += 1;
                continue;
            }
            lexicon
                .by_rank
                .entry(word.rank)
                .or_default()
                .push(word.id.clone());
            lexicon.words.insert(word.id.clone(), word);
        }

        for ids in lexicon.by_rank.values_mut() {
            ids.sort();
        }

        if skipped > 0 {
            tracing::warn!(skipped, "Skipped malformed or duplicate lexicon entries");
        }
        lexicon
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn stats(&self) -> LexiconStats {
        LexiconStats {
            word_count: self.words.len(),
            sense_count: self.words.values().map(|w| w.senses.len()).sum(),
            min_rank: self.by_rank.keys().next().copied().unwrap_or(0),
            max_rank: self.by_rank.keys().next_back().copied().unwrap_or(0),
        }
    }

    /// Ids of words that reference a confusable id missing from the lexicon.
    pub fn dangling_confusables(&self) -> Vec<String> {
        let mut out: HashSet<String> = HashSet::new();
        for word in self.words.values() {
            if word.confusables.iter().any(|id| !self.words.contains_key(id)) {
                out.insert(word.id.clone());
            }
        }
        let mut out: Vec<String> = out.into_iter().collect();
        out.sort();
        out
    }
}

impl LexicalStore for Lexicon {
    fn max_rank(&self) -> u32 {
        self.by_rank.keys().next_back().copied().unwrap_or(0)
    }

    fn word(&self, word_id: &str) -> Option<&RankedWord> {
        self.words.get(word_id)
    }

    fn words_in_band(&self, lo: u32, hi: u32) -> Vec<&RankedWord> {
        if lo > hi {
            return Vec::new();
        }
        self.by_rank
            .range(lo..=hi)
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| self.words.get(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sense(id: &str, usage: f64, embedding: Option<Vec<f32>>) -> Sense {
        Sense {
            id: id.to_string(),
            definition: format!("definition of {id}"),
            usage_ratio: usage,
            embedding,
        }
    }

    fn word(id: &str, rank: u32, confusables: &[&str]) -> RankedWord {
        RankedWord {
            id: id.to_string(),
            text: id.to_string(),
            rank,
            senses: vec![sense(&format!("{id}-s1"), 1.0, Some(vec![1.0, 0.0]))],
            confusables: confusables.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn band_lookup_is_rank_ordered() {
        let lex = Lexicon::from_words(vec![word("c", 30, &[]), word("a", 10, &[]), word("b", 20, &[])]);
        let band: Vec<&str> = lex.words_in_band(5, 25).iter().map(|w| w.id.as_str()).collect();
        assert_eq!(band, vec!["a", "b"]);
        assert_eq!(lex.max_rank(), 30);
        assert!(lex.words_in_band(40, 10).is_empty());
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let mut empty = word("empty", 5, &[]);
        empty.senses.clear();
        let lex = Lexicon::from_words(vec![word("a", 1, &[]), word("a", 2, &[]), word("zero", 0, &[]), empty]);
        assert_eq!(lex.len(), 1);
        assert_eq!(lex.stats().min_rank, 1);
    }

    #[test]
    fn confusables_skip_missing_and_self() {
        let lex = Lexicon::from_words(vec![
            word("a", 1, &["a", "b", "ghost"]),
            word("b", 2, &[]),
        ]);
        let c: Vec<&str> = lex.confusables("a").iter().map(|w| w.id.as_str()).collect();
        assert_eq!(c, vec!["b"]);
        assert_eq!(lex.dangling_confusables(), vec!["a".to_string()]);
    }

    #[test]
    fn similarity_requires_embeddings() {
        let lex = Lexicon::default();
        let a = sense("a", 1.0, Some(vec![1.0, 0.0]));
        let b = sense("b", 1.0, None);
        assert!(lex.similarity(&a, &b).is_none());
        let c = sense("c", 1.0, Some(vec![0.0, 1.0]));
        assert_eq!(lex.similarity(&a, &c), Some(0.0));
    }

    #[test]
    fn senses_sorted_by_usage() {
        let mut w = word("w", 1, &[]);
        w.senses = vec![sense("s1", 0.2, None), sense("s2", 0.7, None), sense("s3", 0.1, None)];
        let ids: Vec<&str> = w.senses_by_usage().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1", "s3"]);
    }
}
