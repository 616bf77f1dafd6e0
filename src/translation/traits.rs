//! Translation backend abstraction

use async_trait::async_trait;
use std::fmt;

/// Part of speech attached to a candidate by dictionary backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartOfSpeech {
    Adjective,
    Adverb,
    Noun,
    Verb,
}

impl PartOfSpeech {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Adjective => "adjective",
            Self::Adverb => "adverb",
            Self::Noun => "noun",
            Self::Verb => "verb",
        }
    }
}

/// One possible translation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub text: String,
    pub part_of_speech: Option<PartOfSpeech>,
}

impl Candidate {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            part_of_speech: None,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.part_of_speech {
            Some(pos) => write!(f, "({}) {}", pos.description(), self.text),
            None => write!(f, "{}", self.text),
        }
    }
}

/// Translation of one word or phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub word: String,
    pub language_from: String,
    pub language_to: String,
    pub candidates: Vec<Candidate>,
}

impl Translation {
    /// Keep the first occurrence of every candidate text, drop blanks
    pub fn dedup(mut self) -> Self {
        let mut seen = std::collections::HashSet::new();
        self.candidates
            .retain(|c| !c.text.trim().is_empty() && seen.insert(c.text.to_lowercase()));
        self
    }
}

/// Result type for translation operations
pub type TranslationResult<T> = Result<T, TranslationError>;

/// Translation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslationError {
    #[error("Language pair {from}->{to} is not supported")]
    UnsupportedPair { from: String, to: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Translation/dictionary backend
#[async_trait]
pub trait Translator: Send + Sync + 'static {
    async fn translate(&self, from: &str, to: &str, text: &str) -> TranslationResult<Translation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_display_with_part_of_speech() {
        let candidate = Candidate {
            text: "profession".to_string(),
            part_of_speech: Some(PartOfSpeech::Noun),
        };
        assert_eq!(candidate.to_string(), "(noun) profession");
        assert_eq!(Candidate::plain("job").to_string(), "job");
    }

    #[test]
    fn test_dedup_is_case_insensitive() {
        let translation = Translation {
            word: "Beruf".to_string(),
            language_from: "de".to_string(),
            language_to: "en".to_string(),
            candidates: vec![
                Candidate::plain("Job"),
                Candidate::plain("job"),
                Candidate::plain(" "),
                Candidate::plain("profession"),
            ],
        }
        .dedup();

        let texts: Vec<_> = translation.candidates.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Job", "profession"]);
    }
}
