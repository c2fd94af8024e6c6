pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub survey_sessions: sled::Tree,
    pub survey_reports: sled::Tree,
    pub lexicon_words: sled::Tree,
    pub meta: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let survey_sessions = db.open_tree(trees::SURVEY_SESSIONS)?;
        let survey_reports = db.open_tree(trees::SURVEY_REPORTS)?;
        let lexicon_words = db.open_tree(trees::LEXICON_WORDS)?;
        let meta = db.open_tree(trees::META)?;

        Ok(Self {
            db,
            survey_sessions,
            survey_reports,
            lexicon_words,
            meta,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    /// Cheap read used by health probes; fails when sled cannot serve reads.
    pub fn ping(&self) -> Result<u32, StoreError> {
        migrate::get_current_version(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_reports_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        assert_eq!(store.ping().unwrap(), 0);
        store.run_migrations().unwrap();
        assert_eq!(store.ping().unwrap(), 2);
    }
}
