//! Puzzle sentences: the target word masked by dots
//!
//! Two passes run over the same sentence:
//! 1. exact: every token equal (case-insensitively) to a word of the target
//! 2. closest: the most similar token of the same rough part of speech,
//!    together with every token sharing its stem
//!
//! The closest pass is kept only when it masks more dot islands than the
//! exact pass. If neither pass masks anything the sentence comes back as is.
//!
//! Part of speech is guessed from the surface form, not tagged. The closest
//! pass therefore only accepts a token whose stem similarity reaches
//! `MIN_SIMILARITY`; a same-class token below it is never masked, even when
//! it is the closest one in the sentence.

use regex::Regex;
use std::sync::OnceLock;

/// Minimum stem similarity for the closest pass
const MIN_SIMILARITY: f64 = 0.8;

/// Suffixes stripped to approximate a lemma, longest first
const SUFFIXES: &[&str] = &["ern", "eln", "en", "em", "er", "es", "st", "e", "n", "s", "t"];

fn dot_islands() -> &'static Regex {
    static DOTS: OnceLock<Regex> = OnceLock::new();
    DOTS.get_or_init(|| Regex::new(r"\.{2,}").expect("valid regex"))
}

/// Number of runs of two or more dots
pub fn count_dot_islands(sentence: &str) -> usize {
    dot_islands().find_iter(sentence).count()
}

/// Mask `word` inside `sentence`
pub fn obscure_closest_word(sentence: &str, word: &str) -> String {
    let tokens = tokenize(sentence);
    let targets: Vec<String> = word.split_whitespace().map(str::to_lowercase).collect();
    if targets.is_empty() {
        return sentence.to_string();
    }

    let exact = render(&tokens, |t| targets.contains(&t.to_lowercase()));

    let similar = match closest_stem(&tokens, word) {
        Some(stem) => render(&tokens, |t| stem_of(t) == stem),
        None => sentence.to_string(),
    };

    if count_dot_islands(&similar) > count_dot_islands(&exact) {
        similar
    } else {
        exact
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Gap(&'a str),
}

fn tokenize(sentence: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_word = None;

    for (i, c) in sentence.char_indices() {
        let is_word = c.is_alphanumeric();
        match in_word {
            Some(prev) if prev != is_word => {
                tokens.push(make_token(&sentence[start..i], prev));
                start = i;
            }
            _ => {}
        }
        in_word = Some(is_word);
    }
    if let Some(prev) = in_word {
        tokens.push(make_token(&sentence[start..], prev));
    }
    tokens
}

fn make_token(text: &str, is_word: bool) -> Token<'_> {
    if is_word {
        Token::Word(text)
    } else {
        Token::Gap(text)
    }
}

fn render<F>(tokens: &[Token<'_>], masked: F) -> String
where
    F: Fn(&str) -> bool,
{
    tokens
        .iter()
        .map(|token| match token {
            Token::Word(t) if masked(*t) => ".".repeat(t.chars().count()),
            Token::Word(t) | Token::Gap(t) => (*t).to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PartOfSpeech {
    Noun,
    Verb,
    Any,
}

/// Capitalized words are nouns, lowercase infinitive endings are verbs
fn guess_part_of_speech(word: &str) -> PartOfSpeech {
    let starts_upper = word.chars().next().map(char::is_uppercase).unwrap_or(false);
    if starts_upper {
        PartOfSpeech::Noun
    } else if word.ends_with("en") || word.ends_with("rn") || word.ends_with("ln") {
        PartOfSpeech::Verb
    } else {
        PartOfSpeech::Any
    }
}

fn stem_of(token: &str) -> String {
    let lower = token.to_lowercase();
    for suffix in SUFFIXES {
        if let Some(stem) = lower.strip_suffix(suffix) {
            if stem.chars().count() >= 3 {
                return stem.to_string();
            }
        }
    }
    lower
}

fn closest_stem(tokens: &[Token<'_>], word: &str) -> Option<String> {
    let head = word
        .split_whitespace()
        .filter(|w| !w.eq_ignore_ascii_case("sich"))
        .max_by_key(|w| w.chars().count())?;
    let pos = guess_part_of_speech(head);
    let target = stem_of(head);

    let mut best: Option<(f64, String)> = None;

    for token in tokens {
        let Token::Word(text) = token else {
            continue;
        };

        // Sentence-initial words are capitalized anyway; the similarity
        // gate keeps articles and pronouns out
        let upper = text.chars().next().map(char::is_uppercase).unwrap_or(false);
        let eligible = match pos {
            PartOfSpeech::Noun => upper,
            PartOfSpeech::Verb => !upper,
            PartOfSpeech::Any => true,
        };
        if !eligible {
            continue;
        }

        let stem = stem_of(text);
        let score = strsim::jaro_winkler(&stem, &target);
        let better = best.as_ref().map(|(s, _)| score > *s).unwrap_or(true);
        if score >= MIN_SIMILARITY && better {
            best = Some((score, stem));
        }
    }

    best.map(|(_, stem)| stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_dot_islands() {
        assert_eq!(count_dot_islands("Der .... bellt."), 1);
        assert_eq!(count_dot_islands("... und ....."), 2);
        assert_eq!(count_dot_islands("Ende."), 0);
    }

    #[test]
    fn test_exact_match_is_masked() {
        assert_eq!(
            obscure_closest_word("Der Hund bellt laut.", "Hund"),
            "Der .... bellt laut."
        );
    }

    #[test]
    fn test_exact_match_is_case_insensitive_and_repeated() {
        assert_eq!(
            obscure_closest_word("Schnell! Er läuft schnell.", "schnell"),
            ".......! Er läuft ........"
        );
    }

    #[test]
    fn test_inflected_noun_uses_closest_word() {
        assert_eq!(
            obscure_closest_word("Die Hunde spielen im Park.", "Hund"),
            "Die ..... spielen im Park."
        );
    }

    #[test]
    fn test_sentence_initial_inflected_noun_is_masked() {
        assert_eq!(
            obscure_closest_word("Hunde bellen laut.", "Hund"),
            "..... bellen laut."
        );
        assert_eq!(
            obscure_closest_word("Kinder spielen im Garten.", "das Kind"),
            "...... spielen im Garten."
        );
    }

    #[test]
    fn test_dissimilar_word_of_same_class_is_kept() {
        assert_eq!(
            obscure_closest_word("Wetter ist heute schön.", "Katze"),
            "Wetter ist heute schön."
        );
    }

    #[test]
    fn test_conjugated_verb_uses_closest_word() {
        assert_eq!(
            obscure_closest_word("Er geht nach Hause.", "gehen"),
            "Er .... nach Hause."
        );
    }

    #[test]
    fn test_no_match_returns_sentence_unmodified() {
        let sentence = "Das Wetter ist heute schön.";
        assert_eq!(obscure_closest_word(sentence, "Katze"), sentence);
        assert_eq!(obscure_closest_word(sentence, ""), sentence);
    }

    #[test]
    fn test_tokenize_keeps_every_character() {
        let sentence = "Ich bin's, äh... ja!";
        let rebuilt: String = tokenize(sentence)
            .iter()
            .map(|t| match t {
                Token::Word(s) | Token::Gap(s) => *s,
            })
            .collect();
        assert_eq!(rebuilt, sentence);
    }
}
