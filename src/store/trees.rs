pub const SURVEY_SESSIONS: &str = "survey_sessions";
pub const SURVEY_REPORTS: &str = "survey_reports";
pub const LEXICON_WORDS: &str = "lexicon_words";
pub const META: &str = "meta";
