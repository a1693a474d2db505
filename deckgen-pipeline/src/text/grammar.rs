//! Display strings from grammatical-info JSON
//!
//! Nouns carry a declension table keyed by case, verbs a conjugation table
//! keyed by tense. Only a handful of forms make it onto the card.

use crate::source::WordType;
use serde_json::Value;

const NOUN_CASE: &str = "Nominative";
const VERB_TENSES: [&str; 3] = ["Indikativ Präsens", "Indikativ Präteritum", "Indikativ Perfekt"];
const VERB_PERSON: &str = "er/sie/es";

/// Short display string, or "" when the blob is missing a form
///
/// - noun: `"<Nom. Sg>, <Nom. Pl>. "`
/// - verb: `"<present>, <past>, <perfect>. "` (third person singular)
pub fn flatten_grammar(blob: &str, word_type: WordType) -> String {
    let parsed: Value = match serde_json::from_str(blob.trim()) {
        Ok(value) => value,
        Err(_) => return String::new(),
    };

    let forms = match word_type {
        WordType::Noun => ["Singular", "Plural"]
            .iter()
            .map(|number| form(&parsed, NOUN_CASE, number))
            .collect::<Option<Vec<_>>>(),
        WordType::Verb => VERB_TENSES
            .iter()
            .map(|tense| form(&parsed, tense, VERB_PERSON))
            .collect::<Option<Vec<_>>>(),
        WordType::Other => None,
    };

    match forms {
        Some(forms) => format!("{}. ", forms.join(", ")),
        None => String::new(),
    }
}

fn form<'a>(value: &'a Value, outer: &str, inner: &str) -> Option<&'a str> {
    value.get(outer)?.get(inner)?.as_str()
}

/// True when a stored blob already satisfies the grammar stage
///
/// Nouns need a parsable object with a `Nominative` entry; verbs need
/// anything other than an empty or `{}` placeholder.
pub fn grammar_is_complete(blob: &str, word_type: WordType) -> bool {
    let trimmed = blob.trim();
    match word_type {
        WordType::Noun => serde_json::from_str::<Value>(trimmed)
            .ok()
            .map(|v| v.get(NOUN_CASE).is_some())
            .unwrap_or(false),
        WordType::Verb => !trimmed.is_empty() && trimmed != "{}",
        WordType::Other => true,
    }
}
