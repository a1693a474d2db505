//! Ordered input items of a job
//!
//! A `SourceList` is built once and never mutated. Its order drives
//! checkpoint cadence and sub-deck membership, so construction from the same
//! dataset always yields the same sequence.

mod loader;

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Grammatical type of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WordType {
    Noun,
    Verb,
    Other,
}

impl WordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WordType::Noun => "Noun",
            WordType::Verb => "Verb",
            WordType::Other => "Other",
        }
    }
}

impl fmt::Display for WordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WordType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "noun" => Ok(WordType::Noun),
            "verb" => Ok(WordType::Verb),
            "other" => Ok(WordType::Other),
            other => Err(PipelineError::Source(format!("Unknown word type '{}'", other))),
        }
    }
}

/// Translation and example sentence shipped with a reference dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gloss {
    pub word_trans: String,
    pub sentence: String,
    pub sentence_trans: String,
}

/// One input unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub word: String,
    pub word_type: WordType,
    /// Present for reference datasets; the sentence stage uses it instead of
    /// the language model
    pub reference: Option<Gloss>,
}

impl Item {
    pub fn new(word: impl Into<String>, word_type: WordType) -> Self {
        Self {
            word: word.into(),
            word_type,
            reference: None,
        }
    }

    pub fn with_reference(word: impl Into<String>, gloss: Gloss) -> Self {
        let word = word.into();
        let word_type = classify(&word, &gloss.word_trans);
        Self {
            word,
            word_type,
            reference: Some(gloss),
        }
    }
}

/// Type of an unlabelled item from its surface form
///
/// A translation starting with "to " marks a verb, a German definite
/// article marks a noun, anything else is `Other`.
pub fn classify(word: &str, translation: &str) -> WordType {
    if translation.trim_start().starts_with("to ") {
        return WordType::Verb;
    }

    let first = word.split_whitespace().next().unwrap_or("").to_lowercase();
    if matches!(first.as_str(), "der" | "die" | "das") {
        WordType::Noun
    } else {
        WordType::Other
    }
}

/// Ordered, immutable collection of items
#[derive(Debug, Clone, Default)]
pub struct SourceList {
    items: Vec<Item>,
}

impl SourceList {
    /// Build from items in order; later duplicates of a word are dropped
    pub fn from_items<I: IntoIterator<Item = Item>>(items: I) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for item in items {
            let word = item.word.trim();
            if word.is_empty() {
                continue;
            }
            if !seen.insert(word.to_string()) {
                warn!(word = %word, "Duplicate source word, keeping first occurrence");
                continue;
            }
            kept.push(Item {
                word: word.to_string(),
                ..item
            });
        }

        Self { items: kept }
    }

    /// Load a dataset file; the format follows the extension
    pub fn from_path(path: &Path) -> Result<Self> {
        loader::load(path)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    /// Items in `[from, to)`; bounds are clamped
    pub fn slice(&self, from: usize, to: usize) -> SourceList {
        let to = to.min(self.items.len());
        let from = from.min(to);
        Self {
            items: self.items[from..to].to_vec(),
        }
    }

    pub fn to_vec(&self) -> Vec<Item> {
        self.items.clone()
    }

    pub fn as_slice(&self) -> &[Item] {
        &self.items
    }
}

impl<'a> IntoIterator for &'a SourceList {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &SourceList) -> Vec<&str> {
        list.iter().map(|i| i.word.as_str()).collect()
    }

    #[test]
    fn test_classify_examples() {
        assert_eq!(classify("der Hund", "dog"), WordType::Noun);
        assert_eq!(classify("gehen", "to go"), WordType::Verb);
        assert_eq!(classify("schnell", "fast"), WordType::Other);
    }

    #[test]
    fn test_classify_translation_wins_over_article() {
        assert_eq!(classify("das Laufen", "to run"), WordType::Verb);
        assert_eq!(classify("Die Katze", "the cat"), WordType::Noun);
        assert_eq!(classify("derb", "coarse"), WordType::Other);
        assert_eq!(classify("", ""), WordType::Other);
    }

    #[test]
    fn test_word_type_parsing() {
        assert_eq!("Noun".parse::<WordType>().unwrap(), WordType::Noun);
        assert_eq!(" verb ".parse::<WordType>().unwrap(), WordType::Verb);
        assert!("adjective".parse::<WordType>().is_err());
        assert_eq!(WordType::Other.to_string(), "Other");
    }

    #[test]
    fn test_duplicates_keep_first() {
        let list = SourceList::from_items([
            Item::new("gehen", WordType::Verb),
            Item::new("der Hund", WordType::Noun),
            Item::new("gehen", WordType::Other),
            Item::new("  ", WordType::Other),
        ]);
        assert_eq!(words(&list), vec!["gehen", "der Hund"]);
        assert_eq!(list.get(0).unwrap().word_type, WordType::Verb);
    }

    #[test]
    fn test_slice_clamps() {
        let list = SourceList::from_items(
            ["a1", "a2", "a3", "a4"].map(|w| Item::new(w, WordType::Other)),
        );
        assert_eq!(words(&list.slice(1, 3)), vec!["a2", "a3"]);
        assert_eq!(words(&list.slice(2, 100)), vec!["a3", "a4"]);
        assert!(list.slice(10, 20).is_empty());
        assert!(list.slice(3, 1).is_empty());
    }

    #[test]
    fn test_reference_item_is_classified() {
        let item = Item::with_reference(
            "gehen",
            Gloss {
                word_trans: "to go".into(),
                sentence: "Ich gehe.".into(),
                sentence_trans: "I go.".into(),
            },
        );
        assert_eq!(item.word_type, WordType::Verb);
    }
}
