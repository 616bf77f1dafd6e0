//! Mock translator for testing

use super::traits::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Dictionary-backed translator; unknown words are an error
#[derive(Clone, Default)]
pub struct MockTranslator {
    state: Arc<Mutex<MockTranslatorState>>,
}

#[derive(Default)]
struct MockTranslatorState {
    entries: HashMap<(String, String, String), Vec<Candidate>>,
    calls: usize,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register translations for a word (matched case-insensitively)
    pub fn add(&self, from: &str, to: &str, word: &str, candidates: &[&str]) {
        self.state.lock().unwrap().entries.insert(
            (from.to_string(), to.to_string(), word.to_lowercase()),
            candidates.iter().map(|c| Candidate::plain(*c)).collect(),
        );
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, from: &str, to: &str, text: &str) -> TranslationResult<Translation> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        let key = (from.to_string(), to.to_string(), text.trim().to_lowercase());
        match state.entries.get(&key) {
            Some(candidates) => Ok(Translation {
                word: text.trim().to_string(),
                language_from: from.to_string(),
                language_to: to.to_string(),
                candidates: candidates.clone(),
            }),
            None => Err(TranslationError::Protocol(format!("no entry for '{}'", text))),
        }
    }
}
