//! Text helpers shared by the stages
//!
//! - `german`: articles, separable verb prefixes, lookup forms, URL folding
//! - `json`: first balanced JSON object in free-form model output
//! - `obscure`: puzzle sentences with the target word masked by dots
//! - `grammar`: short display strings from grammatical-info JSON

pub mod german;
pub mod grammar;
pub mod json;
pub mod obscure;

pub use german::{conjugation_lookup_form, fold_umlauts, remove_article_de, remove_article_en};
pub use grammar::{flatten_grammar, grammar_is_complete};
pub use json::find_and_parse_json;
pub use obscure::{count_dot_islands, obscure_closest_word};
