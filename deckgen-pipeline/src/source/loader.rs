//! Dataset file formats
//!
//! | Extension     | Layout                                                         |
//! |---------------|----------------------------------------------------------------|
//! | `.json`       | `[{"word", "type"}]`, `{"word": "type"}` or reference entries  |
//! | `.tsv`/`.txt` | `word<TAB>type` per line                                       |
//! | `.csv`        | `word,type` per line (type is the last field)                  |
//!
//! Reference entries carry `word_trans`, `sentence` and `sentence_trans`
//! instead of a type. Their headword is the first comma-separated segment of
//! `word` and the type comes from `classify`.

use super::{Gloss, Item, SourceList, WordType};
use crate::error::{PipelineError, Result};
use serde_json::Value;
use std::path::Path;
use tracing::info;

pub(super) fn load(path: &Path) -> Result<SourceList> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::Source(format!("Read {} failed: {}", path.display(), e)))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let items = match extension.as_str() {
        "json" => parse_json(&content)?,
        "tsv" | "txt" => parse_delimited(&content, '\t')?,
        "csv" => parse_delimited(&content, ',')?,
        other => {
            return Err(PipelineError::Source(format!(
                "Unsupported source format '{}' ({})",
                other,
                path.display()
            )))
        }
    };

    let list = SourceList::from_items(items);
    info!(path = %path.display(), items = list.len(), "Loaded source list");
    Ok(list)
}

fn parse_json(content: &str) -> Result<Vec<Item>> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| PipelineError::Source(format!("Invalid JSON dataset: {}", e)))?;

    match value {
        Value::Array(entries) => entries.iter().map(parse_json_entry).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(word, kind)| -> Result<Item> {
                let kind = kind.as_str().ok_or_else(|| {
                    PipelineError::Source(format!("Type of '{}' is not a string", word))
                })?;
                Ok(Item::new(word.as_str(), kind.parse()?))
            })
            .collect(),
        _ => Err(PipelineError::Source(
            "JSON dataset must be an array or an object".to_string(),
        )),
    }
}

fn parse_json_entry(entry: &Value) -> Result<Item> {
    let field = |name: &str| entry.get(name).and_then(Value::as_str);

    let word = field("word")
        .ok_or_else(|| PipelineError::Source(format!("Entry without 'word': {}", entry)))?;

    if let Some(word_trans) = field("word_trans") {
        let headword = word.split(',').next().unwrap_or(word).trim();
        let gloss = Gloss {
            word_trans: word_trans.trim().to_string(),
            sentence: field("sentence").unwrap_or_default().trim().to_string(),
            sentence_trans: field("sentence_trans").unwrap_or_default().trim().to_string(),
        };
        return Ok(Item::with_reference(headword, gloss));
    }

    let kind: WordType = field("type")
        .ok_or_else(|| PipelineError::Source(format!("Entry '{}' has no type", word)))?
        .parse()?;
    Ok(Item::new(word, kind))
}

fn parse_delimited(content: &str, delimiter: char) -> Result<Vec<Item>> {
    let mut items = Vec::new();

    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (word, kind) = line.rsplit_once(delimiter).ok_or_else(|| {
            PipelineError::Source(format!("Line {}: expected word{}type", n + 1, delimiter))
        })?;

        // Optional header row
        if n == 0 && word.trim().eq_ignore_ascii_case("word") {
            continue;
        }

        items.push(Item::new(word.trim(), kind.parse()?));
    }

    Ok(items)
}
