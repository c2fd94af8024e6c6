use std::path::Path;

use crate::store::keys;
use crate::store::{Store, StoreError};
use crate::survey::lexicon::RankedWord;

impl Store {
    /// Inserts or replaces words in one batch. Words moved to a new rank keep
    /// a single entry because the old key is removed first.
    pub fn import_lexicon_words(&self, words: &[RankedWord]) -> Result<usize, StoreError> {
        let existing = self.lexicon_keys_by_id()?;
        let mut batch = sled::Batch::default();

        for word in words {
            if word.rank == 0 {
                return Err(StoreError::Validation(format!(
                    "word {} has rank 0",
                    word.id
                )));
            }
            let key = keys::lexicon_word_key(word.rank, &word.id)?;
            if let Some(old) = existing.get(&word.id) {
                if old != &key {
                    batch.remove(old.as_bytes());
                }
            }
            batch.insert(key.as_bytes(), Self::serialize(word)?);
        }

        self.lexicon_words.apply_batch(batch)?;
        tracing::info!(count = words.len(), "Lexicon words imported");
        Ok(words.len())
    }

    /// Reads a JSON array of words from disk and imports it.
    pub fn import_lexicon_file(&self, path: &Path) -> Result<usize, StoreError> {
        let raw = std::fs::read(path)?;
        let words: Vec<RankedWord> = Self::deserialize(&raw)?;
        self.import_lexicon_words(&words)
    }

    /// All stored words in rank order.
    pub fn load_lexicon_words(&self) -> Result<Vec<RankedWord>, StoreError> {
        let mut words = Vec::with_capacity(self.lexicon_words.len());
        for item in self.lexicon_words.iter() {
            let (_, v) = item?;
            words.push(Self::deserialize(&v)?);
        }
        Ok(words)
    }

    pub fn lexicon_word_count(&self) -> usize {
        self.lexicon_words.len()
    }

    fn lexicon_keys_by_id(&self) -> Result<std::collections::HashMap<String, String>, StoreError> {
        let mut out = std::collections::HashMap::new();
        for item in self.lexicon_words.iter() {
            let (k, _) = item?;
            let key = String::from_utf8_lossy(&k).to_string();
            if let Some((_, id)) = key.split_once(':') {
                out.insert(id.to_string(), key.clone());
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::survey::lexicon::Sense;

    fn word(id: &str, rank: u32) -> RankedWord {
        RankedWord {
            id: id.to_string(),
            text: id.to_string(),
            rank,
            senses: vec![Sense {
                id: format!("{id}-s1"),
                definition: format!("meaning of {id}"),
                usage_ratio: 1.0,
                embedding: None,
            }],
            confusables: vec![],
        }
    }

    #[test]
    fn load_returns_rank_order() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        store
            .import_lexicon_words(&[word("c", 300), word("a", 5), word("b", 40)])
            .unwrap();
        let ids: Vec<String> = store
            .load_lexicon_words()
            .unwrap()
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn reimport_moves_rank_without_duplicates() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        store.import_lexicon_words(&[word("a", 5)]).unwrap();
        store.import_lexicon_words(&[word("a", 50)]).unwrap();
        let words = store.load_lexicon_words().unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].rank, 50);
    }

    #[test]
    fn rank_zero_is_rejected() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        assert!(matches!(
            store.import_lexicon_words(&[word("a", 0)]),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn imports_from_json_file() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, serde_json::to_vec(&vec![word("a", 1), word("b", 2)]).unwrap()).unwrap();
        assert_eq!(store.import_lexicon_file(&path).unwrap(), 2);
        assert_eq!(store.lexicon_word_count(), 2);
    }
}
