//! Adaptive vocabulary-size survey.
//!
//! Leaf-first: [`fairness`] → [`challenge`] → [`phase`] / [`pivot`] →
//! [`metrics`] → [`engine`] (pure steps) → [`orchestrator`] (persistence).

pub mod challenge;
pub mod config;
pub mod engine;
pub mod error;
pub mod fairness;
pub mod lexicon;
pub mod metrics;
pub mod orchestrator;
pub mod phase;
pub mod pivot;
pub mod types;

pub use config::SurveyConfig;
pub use engine::SurveyEngine;
pub use error::SurveyError;
pub use lexicon::{LexicalStore, Lexicon};
pub use orchestrator::SurveyOrchestrator;
