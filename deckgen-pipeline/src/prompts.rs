//! Prompt catalogue for the sentence stage
//!
//! Templates use the placeholders `[[word]]` and `[[trans]]`. Every reply
//! is expected to contain a JSON object with `German` and `English` keys.

use crate::collaborators::{CollaboratorError, ModelSession};
use crate::error::Result;
use crate::source::WordType;
use crate::text::json::{find_and_parse_json, value_text};

pub const WORD_PLACEHOLDER: &str = "[[word]]";
pub const TRANSLATION_PLACEHOLDER: &str = "[[trans]]";

const REPLY_KEYS: [&str; 2] = ["German", "English"];

pub const SYSTEM_PROMPT: &str = "You are now operating as a highly precise and structured language processing tool for a German to English language learning application. Your primary objectives are:
    Accuracy in Translation and Generation: Provide accurate translations and sentence generations. Precision in language use, grammar, and context is paramount. You must maintain fidelity to the meanings of words and sentences, ensuring that translations and sentence constructions are clear, direct, and correct.
    Strict Adherence to Response Format: All responses must strictly follow the JSON format specified in each prompt. Pay close attention to the keys and structure outlined in the prompts. Any deviation from the specified format is unacceptable and will result in the response being deemed incorrect.
    German Language Specifics: When handling German words, consider the nuances of the language, such as gender-specific articles for nouns, verb conjugations, and the intricacies of syntax. Your responses should reflect a thorough understanding of these aspects.
    Direct and Concise Responses: Provide responses that are directly aligned with the prompt requirements. Avoid unnecessary elaboration or deviation from the prompt. Your responses should be to the point, fulfilling exactly what is asked, nothing more, nothing less.
    Prompt-Based Response: Each of your responses should be directly based on the specific prompt you receive. Carefully analyze the prompt, understand the requirement, and generate a response that precisely fulfills the need outlined in the prompt.
    When generating sentences, please make sure to use simplest German words and sentences.
Remember, your role is to assist in language learning by providing meticulously accurate and well-structured language content. Consistency, precision, and clarity are your guiding principles.";

/// Kind of sentence requested for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceKind {
    /// "Das Wort X bedeutet ..."
    Descriptive,
    /// X used once in everyday conversation
    Example,
}

/// German sentence and its English translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentencePair {
    pub german: String,
    pub english: String,
}

fn translation_template(word_type: WordType) -> &'static str {
    match word_type {
        WordType::Noun => "Strictly adhering to the JSON format, translate the German noun '[[word]]' to English. Ensure the response contains 'German' and 'English' keys, with the original and translated words respectively. Example in JSON: { \"German\": \"der Hund\", \"English\": \"dog\" }. Translate '[[word]]' following this exact JSON structure.",
        WordType::Verb => "Using JSON format exclusively, translate the German verb '[[word]]' into English. Include 'German' and 'English' as keys in your response. Example in JSON: { \"German\": \"gehen\", \"English\": \"go\" }. Translate '[[word]]', maintaining the specified JSON format.",
        WordType::Other => "In a strict JSON format, translate the German word '[[word]]' (adjective/adverb/other) to English. The response must have 'German' and 'English' keys. Example in JSON: { \"German\": \"schnell\", \"English\": \"fast\" }. Translate '[[word]]', keeping the JSON format intact.",
    }
}

fn sentence_template(kind: SentenceKind, word_type: WordType) -> &'static str {
    match (kind, word_type) {
        (SentenceKind::Descriptive, WordType::Noun) => "Generate a German sentence starting with 'Das Wort [[word]] bedeutet', accurately describing the noun '[[word]]' (English: '[[trans]]'), and use '[[word]]' only once in the sentence. Translate it to English. Present both sentences in strict JSON format with 'German' and 'English' keys. Example in JSON: { \"German\": \"Das Wort der Hund bedeutet ein Haustier.\", \"English\": \"The word 'Hund' means a pet.\" }. Create a descriptive sentence for '[[word]]' following this format. Please use simplest German words and sentences.",
        (SentenceKind::Descriptive, WordType::Verb) => "Create a German sentence beginning with 'Das Verb [[word]] bedeutet', which precisely explains the verb '[[word]]' (English: '[[trans]]'). Include '[[word]]' just once. Translate this to English. Format your response in JSON with 'German' and 'English' keys. Example in JSON: { \"German\": \"Das Verb gehen bedeutet, sich zu Fuß von einem Ort zum anderen zu bewegen.\", \"English\": \"The verb 'gehen' means to move from one place to another on foot.\" }. Proceed with '[[word]]' in this format. Please use simplest German words and sentences.",
        (SentenceKind::Descriptive, WordType::Other) => "Construct a German sentence starting with 'Das Wort [[word]] bedeutet', which clearly defines the word '[[word]]' (English: '[[trans]]'). Use '[[word]]' only once. Translate it and provide both sentences in JSON format, using 'German' and 'English' keys. Example in JSON: { \"German\": \"Das Wort schnell bedeutet eine hohe Geschwindigkeit bei einer Bewegung oder Aktion.\", \"English\": \"The word 'schnell' means a high speed in movement or action.\" }. Follow this format for '[[word]]'. Please use simplest German words and sentences.",
        (SentenceKind::Example, WordType::Noun) => "Generate a German sentence using the noun '[[word]]' (English: '[[trans]]') exactly once, demonstrating its use as a noun in a conversational context. Translate it to English. Format both sentences in JSON with 'German' and 'English' keys, ensuring that '[[word]]' is used correctly as a noun. Example in JSON: { \"German\": \"Der [[word]] steht auf dem Tisch.\", \"English\": \"The [[trans]] is on the table.\" }. Create a sentence for '[[word]]' adhering to this format. Please use simplest German words and sentences.",
        (SentenceKind::Example, WordType::Verb) => "Compose a German sentence featuring the verb '[[word]]' (English: '[[trans]]') just once, illustrating its use as a verb in a daily conversation. Translate this sentence into English. Your response should be in JSON format with 'German' and 'English' keys, ensuring that '[[word]]' is correctly used as a verb. Example in JSON: { \"German\": \"Ich [[word]] zum Geschäft.\", \"English\": \"I [[trans]] to the store.\" }. Proceed with '[[word]]', maintaining this format. Please use simplest German words and sentences.",
        (SentenceKind::Example, WordType::Other) => "Create a German sentence that includes the word '[[word]]' (English: '[[trans]]') only once, as it might be used in everyday speech. Translate it to English. Ensure the response is in a structured JSON format with 'German' and 'English' keys. Example in JSON: { \"German\": \"Das Buch ist [[word]].\", \"English\": \"The book is [[trans]].\" }. Generate a sentence for '[[word]]', following the JSON format. Please use simplest German words and sentences.",
    }
}

/// Fill the placeholders; `[[trans]]` stays when no translation is known
pub fn render(template: &str, word: &str, translation: Option<&str>) -> String {
    let prompt = template.replace(WORD_PLACEHOLDER, word);
    match translation {
        Some(trans) if !trans.is_empty() => prompt.replace(TRANSLATION_PLACEHOLDER, trans),
        _ => prompt,
    }
}

pub fn translation_prompt(word: &str, word_type: WordType) -> String {
    render(translation_template(word_type), word, None)
}

pub fn sentence_prompt(kind: SentenceKind, word: &str, word_type: WordType, translation: &str) -> String {
    render(sentence_template(kind, word_type), word, Some(translation))
}

/// Read the German/English pair out of a model reply
pub fn parse_reply(reply: &str) -> Option<SentencePair> {
    let parsed = find_and_parse_json(reply, &REPLY_KEYS)?;
    Some(SentencePair {
        german: value_text(&parsed["German"]).trim().to_string(),
        english: value_text(&parsed["English"]).trim().to_string(),
    })
}

async fn ask(session: &mut dyn ModelSession, prompt: &str) -> Result<SentencePair> {
    let reply = session
        .shoot(prompt)
        .await?
        .ok_or_else(|| CollaboratorError::Malformed("model returned no text".to_string()))?;

    parse_reply(&reply).ok_or_else(|| {
        CollaboratorError::Malformed(format!(
            "reply lacks a JSON object with German and English keys: {}",
            reply.chars().take(120).collect::<String>()
        ))
        .into()
    })
}

/// Translate a headword
pub async fn translate(session: &mut dyn ModelSession, word: &str, word_type: WordType) -> Result<SentencePair> {
    ask(session, &translation_prompt(word, word_type)).await
}

/// Generate one sentence of `kind` for a headword
pub async fn sentence(
    session: &mut dyn ModelSession,
    kind: SentenceKind,
    word: &str,
    word_type: WordType,
    translation: &str,
) -> Result<SentencePair> {
    ask(session, &sentence_prompt(kind, word, word_type, translation)).await
}
