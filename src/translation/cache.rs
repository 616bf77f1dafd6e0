//! Explicit translation cache owned by the translation side.
//!
//! Entries are grouped per `(from, to)` language pair and each pair keeps
//! at most `capacity_per_pair` words, oldest evicted first.

use super::traits::*;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type LanguagePair = (String, String);

#[derive(Default)]
struct PairCache {
    entries: HashMap<String, Translation>,
    order: VecDeque<String>,
}

/// Caching decorator around any [`Translator`]
pub struct CachedTranslator<T: Translator> {
    inner: T,
    capacity_per_pair: usize,
    pairs: Mutex<HashMap<LanguagePair, PairCache>>,
}

impl<T: Translator> CachedTranslator<T> {
    pub fn new(inner: T, capacity_per_pair: usize) -> Self {
        Self {
            inner,
            capacity_per_pair: capacity_per_pair.max(1),
            pairs: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, pair: &LanguagePair, word: &str) -> Option<Translation> {
        let pairs = self.pairs.lock().ok()?;
        pairs.get(pair)?.entries.get(word).cloned()
    }

    fn store(&self, pair: LanguagePair, word: String, translation: Translation) {
        let Ok(mut pairs) = self.pairs.lock() else {
            return;
        };
        let cache = pairs.entry(pair).or_default();
        if cache.entries.insert(word.clone(), translation).is_none() {
            cache.order.push_back(word);
        }
        while cache.order.len() > self.capacity_per_pair {
            if let Some(oldest) = cache.order.pop_front() {
                cache.entries.remove(&oldest);
            }
        }
    }
}

#[async_trait]
impl<T: Translator> Translator for CachedTranslator<T> {
    async fn translate(&self, from: &str, to: &str, text: &str) -> TranslationResult<Translation> {
        let pair = (from.to_string(), to.to_string());
        let word = text.trim().to_lowercase();
        if let Some(hit) = self.lookup(&pair, &word) {
            return Ok(hit);
        }

        let translation = self.inner.translate(from, to, text).await?;
        self.store(pair, word, translation.clone());
        Ok(translation)
    }
}
