//! Sentence layouts
//!
//! A layout fixes how many sentence slots a card carries. Everything that
//! differs between one- and two-sentence decks is derived from it: the store
//! schema, which columns hold audio, the deck fields and the card template.
//!
//! Column naming: `word`, `word_trans`, then per slot `N_pzl`, `N_fil`,
//! `N_trans` and their `_vce` audio columns, then `expl_1`, `expl_2`.

use crate::error::{PipelineError, Result};
use crate::store::Schema;
use std::fmt;
use std::str::FromStr;

pub const KEY_COLUMN: &str = "word";
pub const TRANSLATION_COLUMN: &str = "word_trans";
pub const GRAMMAR_COLUMN: &str = "expl_1";
pub const SPARE_COLUMN: &str = "expl_2";
pub const VOICE_SUFFIX: &str = "_vce";

/// German or English voice track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    German,
    English,
}

impl Language {
    /// Code handed to the speech synthesizer
    pub fn code(&self) -> &'static str {
        match self {
            Language::German => "de",
            Language::English => "en",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SentenceLayout {
    OneSentence,
    #[default]
    TwoSentence,
}

impl SentenceLayout {
    pub fn slots(&self) -> usize {
        match self {
            SentenceLayout::OneSentence => 1,
            SentenceLayout::TwoSentence => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SentenceLayout::OneSentence => "one-sentence",
            SentenceLayout::TwoSentence => "two-sentence",
        }
    }

    /// All columns in declaration order
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![KEY_COLUMN.to_string(), TRANSLATION_COLUMN.to_string()];
        for slot in 1..=self.slots() {
            for part in ["pzl", "fil", "trans"] {
                columns.push(format!("{}_{}", slot, part));
            }
            for part in ["pzl", "fil", "trans"] {
                columns.push(format!("{}_{}{}", slot, part, VOICE_SUFFIX));
            }
        }
        columns.push(GRAMMAR_COLUMN.to_string());
        columns.push(SPARE_COLUMN.to_string());
        columns
    }

    pub fn schema(&self) -> Result<Schema> {
        Schema::new(KEY_COLUMN, self.columns())
    }

    /// Audio columns voiced in `language`
    pub fn voice_columns(&self, language: Language) -> Vec<String> {
        let parts: &[&str] = match language {
            Language::German => &["pzl", "fil"],
            Language::English => &["trans"],
        };
        (1..=self.slots())
            .flat_map(|slot| {
                parts
                    .iter()
                    .map(move |part| format!("{}_{}{}", slot, part, VOICE_SUFFIX))
            })
            .collect()
    }

    /// Every audio column, German first
    pub fn all_voice_columns(&self) -> Vec<String> {
        let mut columns = self.voice_columns(Language::German);
        columns.extend(self.voice_columns(Language::English));
        columns
    }

    /// Columns read when packaging: everything except the spare column
    pub fn package_columns(&self) -> Vec<String> {
        self.columns()
            .into_iter()
            .filter(|c| c != SPARE_COLUMN)
            .collect()
    }

    /// Columns that must be populated for a note to be packaged
    pub fn required_columns(&self) -> Vec<String> {
        let mut columns = self.package_columns();
        columns.pop();
        columns
    }

    pub fn deck_fields(&self) -> Vec<String> {
        self.columns()
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            SentenceLayout::OneSentence => "One Sentence Puzzler Template",
            SentenceLayout::TwoSentence => "Two Sentence Puzzler Template",
        }
    }

    /// Question side: puzzle sentences and their audio
    pub fn question_template(&self) -> String {
        let slots = 1..=self.slots();
        let sentences: String = slots
            .clone()
            .map(|n| format!("    <p id=\"sentence{n}\">{{{{{n}_pzl}}}}</p>\n"))
            .collect();
        let voices: String = slots.map(|n| format!("  {{{{{n}_pzl_vce}}}}\n")).collect();

        format!(
            "<div class=\"card\">\n  <div id=\"puzzle-sentences\">\n{sentences}  </div>\n{voices}</div>\n"
        )
    }

    /// Answer side: filled sentences, word, grammar, translations, audio
    pub fn answer_template(&self) -> String {
        let slots: Vec<usize> = (1..=self.slots()).collect();
        let filled: String = slots
            .iter()
            .map(|n| format!("    <p>{{{{{n}_fil}}}}</p>\n"))
            .collect();
        let translations: String = slots
            .iter()
            .map(|n| format!("    <p>{{{{{n}_trans}}}}</p>\n"))
            .collect();
        let explanations = match self {
            SentenceLayout::OneSentence => "    <p>{{expl_1}}</p>\n".to_string(),
            SentenceLayout::TwoSentence => {
                "    <p>{{expl_1}}</p>\n    <p>{{expl_2}}</p>\n".to_string()
            }
        };
        let mut voices: String = slots
            .iter()
            .map(|n| format!("  {{{{{n}_fil_vce}}}}\n"))
            .collect();
        voices.extend(slots.iter().map(|n| format!("  {{{{{n}_trans_vce}}}}\n")));

        format!(
            "<div class=\"card\">\n  <div id=\"filled-sentences\">\n{filled}  </div>\n  <hr>\n  \
             <div class=\"explanations\">\n    <p>{{{{word}}}} [{{{{word_trans}}}}]</p>\n{explanations}  </div>\n  \
             <div class=\"translations\">\n{translations}  </div>\n{voices}</div>\n"
        )
    }

    pub fn css(&self) -> &'static str {
        CARD_CSS
    }
}

impl fmt::Display for SentenceLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SentenceLayout {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "one-sentence" | "one" | "1" => Ok(SentenceLayout::OneSentence),
            "two-sentence" | "two" | "2" => Ok(SentenceLayout::TwoSentence),
            other => Err(PipelineError::Common(deckgen_common::Error::InvalidInput(
                format!("Unknown sentence layout '{}'", other),
            ))),
        }
    }
}

/// Text column voiced into an audio column (`1_fil_vce` -> `1_fil`)
pub fn text_column(voice_column: &str) -> &str {
    voice_column
        .strip_suffix(VOICE_SUFFIX)
        .unwrap_or(voice_column)
}

const CARD_CSS: &str = r#"
.card {
  font-family: Arial, sans-serif;
  text-align: center;
  color: #333;
  background-color: #fff;
  padding: 20px;
  border-radius: 10px;
  box-shadow: 0 4px 8px rgba(0, 0, 0, 0.1);
}

p {
  margin: 15px 0;
  line-height: 1.6;
}

hr {
  margin: 20px 0;
  border: none;
  height: 1px;
  background-color: #ccc;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_sentence_columns() {
        assert_eq!(
            SentenceLayout::OneSentence.columns(),
            vec![
                "word", "word_trans", "1_pzl", "1_fil", "1_trans", "1_pzl_vce", "1_fil_vce",
                "1_trans_vce", "expl_1", "expl_2"
            ]
        );
    }

    #[test]
    fn test_two_sentence_columns() {
        let columns = SentenceLayout::TwoSentence.columns();
        assert_eq!(columns.len(), 16);
        assert_eq!(columns[8], "2_pzl");
        assert_eq!(columns[14], "expl_1");
        assert!(SentenceLayout::TwoSentence.schema().is_ok());
    }

    #[test]
    fn test_voice_columns() {
        let layout = SentenceLayout::TwoSentence;
        assert_eq!(
            layout.voice_columns(Language::German),
            vec!["1_pzl_vce", "1_fil_vce", "2_pzl_vce", "2_fil_vce"]
        );
        assert_eq!(
            layout.voice_columns(Language::English),
            vec!["1_trans_vce", "2_trans_vce"]
        );
        assert_eq!(layout.all_voice_columns().len(), 6);
        assert_eq!(text_column("2_fil_vce"), "2_fil");
    }

    #[test]
    fn test_package_and_required_columns() {
        let layout = SentenceLayout::OneSentence;
        let package = layout.package_columns();
        assert_eq!(package.last().map(String::as_str), Some("expl_1"));
        assert!(!package.contains(&"expl_2".to_string()));

        let required = layout.required_columns();
        assert_eq!(required.len(), package.len() - 1);
        assert!(!required.contains(&"expl_1".to_string()));
    }

    #[test]
    fn test_templates_reference_fields() {
        let layout = SentenceLayout::TwoSentence;
        let question = layout.question_template();
        assert!(question.contains("{{1_pzl}}"));
        assert!(question.contains("{{2_pzl_vce}}"));

        let answer = layout.answer_template();
        assert!(answer.contains("{{word}} [{{word_trans}}]"));
        assert!(answer.contains("{{expl_2}}"));
        assert!(answer.contains("{{2_trans_vce}}"));
        assert!(!SentenceLayout::OneSentence.answer_template().contains("2_fil"));
    }

    #[test]
    fn test_parse_layout() {
        assert_eq!(
            "one-sentence".parse::<SentenceLayout>().unwrap(),
            SentenceLayout::OneSentence
        );
        assert_eq!(
            "Two-Sentence".parse::<SentenceLayout>().unwrap(),
            SentenceLayout::TwoSentence
        );
        assert!("three".parse::<SentenceLayout>().is_err());
    }
}
