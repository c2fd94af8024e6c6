use crate::store::StoreError;

const KEY_SEPARATOR: char = ':';

fn validate_id(kind: &str, id: &str) -> Result<(), StoreError> {
    if id.is_empty() {
        return Err(StoreError::Validation(format!("{kind} id must not be empty")));
    }
    if id.contains(KEY_SEPARATOR) {
        return Err(StoreError::Validation(format!(
            "{kind} id must not contain '{KEY_SEPARATOR}': {id}"
        )));
    }
    Ok(())
}

pub fn survey_session_key(session_id: &str) -> Result<String, StoreError> {
    validate_id("session", session_id)?;
    Ok(session_id.to_string())
}

pub fn survey_report_key(session_id: &str) -> Result<String, StoreError> {
    validate_id("session", session_id)?;
    Ok(session_id.to_string())
}

/// Zero-padded rank first so a full scan comes back in rank order.
pub fn lexicon_word_key(rank: u32, word_id: &str) -> Result<String, StoreError> {
    validate_id("word", word_id)?;
    Ok(format!("{rank:06}{KEY_SEPARATOR}{word_id}"))
}
