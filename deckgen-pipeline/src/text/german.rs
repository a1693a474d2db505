//! German and English word-form helpers

/// Articles stripped from German headwords
const GERMAN_ARTICLES: &[&str] = &["der", "die", "das", "ein", "eine", "einen", "einem"];

/// Articles stripped from English translations
const ENGLISH_ARTICLES: &[&str] = &["the", "a", "an"];

/// Separable and inseparable verb prefixes
pub const VERB_PREFIXES: &[&str] = &[
    "ab", "an", "auf", "aus", "bei", "ein", "mit", "nach", "vor", "zu", "ent", "er", "ge", "miss",
    "ver", "zer", "be", "emp", "entgegen", "gegenüber", "hinter", "über", "um", "unter", "voll",
    "wider", "los",
];

fn remove_leading(word: &str, articles: &[&str]) -> String {
    let tokens: Vec<&str> = word.split_whitespace().collect();
    match tokens.split_first() {
        Some((first, rest)) if articles.contains(&first.to_lowercase().as_str()) => rest.join(" "),
        _ => tokens.join(" "),
    }
}

/// "der Hund" -> "Hund"
pub fn remove_article_de(word: &str) -> String {
    remove_leading(word, GERMAN_ARTICLES)
}

/// "the dog" -> "dog"
pub fn remove_article_en(word: &str) -> String {
    remove_leading(word, ENGLISH_ARTICLES)
}

/// Form of a verb used for conjugation lookups
///
/// Drops the reflexive "sich" and rejoins a trailing separable prefix, so
/// "sich ziehen an" becomes "anziehen".
pub fn conjugation_lookup_form(verb: &str) -> String {
    let tokens: Vec<&str> = verb
        .split_whitespace()
        .filter(|t| !t.eq_ignore_ascii_case("sich"))
        .collect();

    match tokens.as_slice() {
        [] => verb.trim().to_string(),
        [first, .., last] if VERB_PREFIXES.contains(last) => format!("{}{}", last, first),
        _ => tokens.join(" "),
    }
}

/// ASCII folding for URL path segments: umlauts lose their dots, other
/// non-ASCII characters are dropped
pub fn fold_umlauts(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            'ä' => Some('a'),
            'ö' => Some('o'),
            'ü' => Some('u'),
            'Ä' => Some('A'),
            'Ö' => Some('O'),
            'Ü' => Some('U'),
            'é' | 'è' | 'ê' => Some('e'),
            c if c.is_ascii() => Some(c),
            _ => None,
        })
        .collect()
}
