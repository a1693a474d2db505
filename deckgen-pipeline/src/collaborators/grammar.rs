//! Grammatical-info lookups scraped from dictionary sites
//!
//! Verbs: conjugation tables keyed by tense (`"Indikativ Präsens"`) and
//! person (`"er/sie/es"`). Nouns: declension tables keyed by case
//! (`"Nominative"`) and number (`"Singular"`, `"Plural"`).
//!
//! Lookups never raise: network failures, unknown words and unparsable
//! pages all come back as `None` after a warning.

use super::{CollabResult, CollaboratorError, GrammarFetcher};
use crate::text::{conjugation_lookup_form, fold_umlauts, remove_article_de};
use crate::throttle::{retry_with_jitter, RetryPolicy};
use async_trait::async_trait;
use deckgen_common::config::GrammarConfig;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use std::time::Duration;

struct PageClient {
    http_client: reqwest::Client,
    retry: RetryPolicy,
}

impl PageClient {
    fn new(config: &GrammarConfig, retry: RetryPolicy) -> CollabResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        Ok(Self { http_client, retry })
    }

    /// Page body, `None` on 404
    async fn fetch(&self, url: &str) -> CollabResult<Option<String>> {
        let client = &self.http_client;
        let result = retry_with_jitter("grammar lookup", &self.retry, move || async move {
            let response = client.get(url).send().await?.error_for_status()?;
            Ok::<_, CollaboratorError>(response.text().await?)
        })
        .await;

        match result {
            Ok(body) => Ok(Some(body)),
            Err(CollaboratorError::Http { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Verb conjugation lookup
pub struct ConjugationFetcher {
    client: PageClient,
    url_template: String,
}

impl ConjugationFetcher {
    pub fn new(config: &GrammarConfig, retry: RetryPolicy) -> CollabResult<Self> {
        Ok(Self {
            client: PageClient::new(config, retry)?,
            url_template: config.conjugation_url.clone(),
        })
    }
}

#[async_trait]
impl GrammarFetcher for ConjugationFetcher {
    async fn lookup(&self, word: &str) -> CollabResult<Option<String>> {
        let form = conjugation_lookup_form(word);
        let url = self.url_template.replace("{word}", &form);
        tracing::debug!(word = %word, url = %url, "Fetching conjugation");

        let page = match self.client.fetch(&url).await {
            Ok(Some(page)) => page,
            Ok(None) => return Ok(None),
            Err(err) => {
                tracing::warn!(word = %word, error = %err, "Conjugation lookup failed");
                return Ok(None);
            }
        };

        Ok(parse_conjugation(&page).map(|forms| forms.to_string()))
    }
}

/// Noun declension lookup
pub struct DeclensionFetcher {
    client: PageClient,
    url_template: String,
}

impl DeclensionFetcher {
    pub fn new(config: &GrammarConfig, retry: RetryPolicy) -> CollabResult<Self> {
        Ok(Self {
            client: PageClient::new(config, retry)?,
            url_template: config.declension_url.clone(),
        })
    }
}

#[async_trait]
impl GrammarFetcher for DeclensionFetcher {
    async fn lookup(&self, word: &str) -> CollabResult<Option<String>> {
        let bare = fold_umlauts(&remove_article_de(word));
        let url = self.url_template.replace("{word}", &bare);
        tracing::debug!(word = %word, url = %url, "Fetching declension");

        let page = match self.client.fetch(&url).await {
            Ok(Some(page)) => page,
            Ok(None) => return Ok(None),
            Err(err) => {
                tracing::warn!(word = %word, error = %err, "Declension lookup failed");
                return Ok(None);
            }
        };

        Ok(parse_declension(&page, word).map(|forms| forms.to_string()))
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid regex"))
}

/// Visible text of an HTML fragment
fn inner_text(html: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    static NUMERIC: OnceLock<Regex> = OnceLock::new();

    let stripped = regex(&TAGS, r"<[^>]*>").replace_all(html, "");
    let decoded = regex(&NUMERIC, r"&#(x?)([0-9a-fA-F]+);").replace_all(&stripped, |caps: &regex::Captures| {
        let radix = if caps[1].is_empty() { 10 } else { 16 };
        u32::from_str_radix(&caps[2], radix)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    decoded
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `{tense: {person: form}}` from a conjugation page
pub(crate) fn parse_conjugation(html: &str) -> Option<Value> {
    static BOX: OnceLock<Regex> = OnceLock::new();
    static ITEM: OnceLock<Regex> = OnceLock::new();
    static ITALIC: OnceLock<Regex> = OnceLock::new();

    let mut forms = Map::new();

    for block in regex(&BOX, r#"(?s)mobile-title="([^"]+)"(.*?)</ul>"#).captures_iter(html) {
        let title = inner_text(&block[1]);
        let mut persons = Map::new();

        for item in regex(&ITEM, r"(?s)<li[^>]*>(.*?)</li>").captures_iter(&block[2]) {
            let parts: Vec<String> = regex(&ITALIC, r"(?s)<i[^>]*>(.*?)</i>")
                .captures_iter(&item[1])
                .map(|c| inner_text(&c[1]))
                .collect();

            if let Some((person, rest)) = parts.split_first() {
                let form = rest.join(" ").trim().to_string();
                if !person.is_empty() && !form.is_empty() {
                    persons.insert(person.clone(), Value::String(form));
                }
            }
        }

        if !title.is_empty() && !persons.is_empty() {
            forms.insert(title, Value::Object(persons));
        }
    }

    if forms.is_empty() {
        None
    } else {
        Some(Value::Object(forms))
    }
}

/// `{case: {Singular, Plural}}` from a dictionary page
///
/// Falls back to the inflected-forms line, which only yields the
/// nominative plural.
pub(crate) fn parse_declension(html: &str, word: &str) -> Option<Value> {
    static TABLE: OnceLock<Regex> = OnceLock::new();
    static CELL: OnceLock<Regex> = OnceLock::new();
    static FORMS: OnceLock<Regex> = OnceLock::new();
    static ORTH: OnceLock<Regex> = OnceLock::new();

    if let Some(table) = regex(&TABLE, r#"(?s)<div class="short_noun_table decl"[^>]*>(.*?)</div>"#).captures(html) {
        let mut cases = Map::new();

        for row in table[1].split(r#"<span class="tr""#).skip(2) {
            let cells: Vec<String> = regex(&CELL, r#"(?s)<span class="td"[^>]*>(.*?)</span>"#)
                .captures_iter(row)
                .map(|c| inner_text(&c[1]))
                .collect();

            if cells.len() >= 3 && !cells[0].is_empty() {
                cases.insert(
                    cells[0].clone(),
                    json!({ "Singular": cells[1], "Plural": cells[2] }),
                );
            }
        }

        if !cases.is_empty() {
            return Some(Value::Object(cases));
        }
    }

    let forms = regex(&FORMS, r#"<span class="form inflected_forms type-infl"[^>]*>((?:[^<]|<span class="orth"[^>]*>[^<]*</span>)*)"#)
        .captures(html)?;
    let plural = regex(&ORTH, r#"(?s)<span class="orth"[^>]*>(.*?)</span>"#)
        .captures_iter(&forms[1])
        .map(|c| inner_text(&c[1]))
        .filter(|s| !s.is_empty())
        .last()?;

    Some(json!({
        "Nominative": { "Singular": word, "Plural": format!("die {}", plural) },
        "Accusative": { "Singular": "", "Plural": "" },
        "Genitive": { "Singular": "", "Plural": "" },
        "Dative": { "Singular": "", "Plural": "" },
    }))
}
