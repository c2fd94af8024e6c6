pub mod lexicon;
pub mod survey_reports;
pub mod survey_sessions;
