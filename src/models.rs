use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;

/// Body sent to the upstream completions endpoint. Built once per request.
#[derive(Clone, Debug, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
    pub n: u32,
}

impl CompletionRequest {
    pub fn streaming(prompt: String, config: &Config) -> Self {
        Self {
            model: config.completion_model.clone(),
            prompt,
            temperature: config.completion_temperature,
            max_tokens: config.completion_max_tokens,
            stream: true,
            n: 1,
        }
    }

    /// Tiny non-streaming request used by the connection self-test.
    pub fn probe(config: &Config) -> Self {
        Self {
            model: config.completion_model.clone(),
            prompt: "Hello".to_string(),
            temperature: 1.0,
            max_tokens: 5,
            stream: false,
            n: 1,
        }
    }
}

/// One incremental payload from the upstream SSE stream. Only the first
/// choice's text is consumed; everything else is tolerated and ignored.
#[derive(Debug, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub logprobs: Option<Value>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl CompletionChunk {
    pub fn first_text(&self) -> &str {
        self.choices
            .first()
            .map(|choice| choice.text.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecipeRequest {
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default, alias = "mealType")]
    pub meal_type: Option<String>,
    #[serde(default)]
    pub ingredients: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{CompletionChunk, RecipeRequest};

    #[test]
    fn chunk_text_defaults_to_empty() {
        let chunk: CompletionChunk =
            serde_json::from_str(r#"{"choices":[{"index":0,"finish_reason":null}]}"#)
                .expect("chunk should parse");
        assert_eq!(chunk.first_text(), "");

        let empty: CompletionChunk = serde_json::from_str(r#"{"choices":[]}"#).expect("parse");
        assert_eq!(empty.first_text(), "");
    }

    #[test]
    fn chunk_tolerates_extra_fields() {
        let chunk: CompletionChunk = serde_json::from_str(
            r#"{"id":"cmpl-1","object":"text_completion","created":1,"model":"text-davinci-003","choices":[{"text":"Hi","index":0,"logprobs":null,"finish_reason":null}]}"#,
        )
        .expect("chunk should parse");
        assert_eq!(chunk.first_text(), "Hi");
    }

    #[test]
    fn recipe_request_accepts_camel_case_meal_type() {
        let request: RecipeRequest =
            serde_json::from_str(r#"{"cuisine":"thai","mealType":"vegan"}"#).expect("parse");
        assert_eq!(request.meal_type.as_deref(), Some("vegan"));
    }
}
