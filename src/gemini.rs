use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::{
    composer::StyleComposer,
    error::StylistError,
    models::{SuggestionInput, SuggestionOutput},
    photo::parse_data_uri,
};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("invalid input: {0}")] Input(String),
    #[error("HTTP error: {0}")] Http(String),
    #[error("invalid response: {0}")] Response(String),
}

impl From<GeminiError> for StylistError {
    fn from(e: GeminiError) -> Self {
        StylistError::Generation(e.to_string())
    }
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

pub fn build_stylist_prompt(quiz_answers: &str, body_type_description: &str) -> String {
    format!(
        "You are a personal stylist for Vastra, a sustainable clothing brand. Based on the user's quiz answers, \
        the attached photo, and their body type description, provide personalized clothing style suggestions from Vastra's sustainable collections.\n\n\
        Quiz Answers: {quiz_answers}\n\
        Body Type Description: {body_type_description}\n\n\
        Keep Vastra's ethos of sustainable and ethical fashion in mind. Suggest specific items or combinations of items that would be \
        flattering and fit the user's preferences and body type, then summarize the suggested styles. \
        Separate paragraphs with a single blank line. \
        Respond with a JSON object of the form {{\"styleSuggestions\": string}}."
    )
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    pub async fn generate_style_suggestions(&self, input: &SuggestionInput) -> Result<SuggestionOutput, GeminiError> {
        let photo = parse_data_uri(&input.photo_data_uri)
            .map_err(|e| GeminiError::Input(format!("photoDataUri: {e}")))?;

        let prompt = build_stylist_prompt(&input.quiz_answers, &input.body_type_description);
        let request_body = json!({
            "contents": [{
                "parts": [
                    {"text": prompt},
                    {"inlineData": {"mimeType": photo.mime_type, "data": photo.data}}
                ]
            }],
            "generationConfig": {
                "temperature": 0.7,
                "topK": 40,
                "topP": 0.95,
                "candidateCount": 1,
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {"styleSuggestions": {"type": "STRING"}},
                    "required": ["styleSuggestions"]
                }
            }
        });

        let text = self.perform_api_call(&request_body).await?;
        let output: SuggestionOutput = serde_json::from_str(&text)
            .map_err(|e| GeminiError::Response(format!("output does not match schema: {e}")))?;
        if output.style_suggestions.trim().is_empty() {
            return Err(GeminiError::Response("empty styleSuggestions".into()));
        }
        info!("✅ Style suggestions generated ({} chars)", output.style_suggestions.len());
        Ok(output)
    }

    async fn perform_api_call(&self, request_body: &serde_json::Value) -> Result<String, GeminiError> {
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, self.api_key);
        info!("🔗 Making request to: {}", url.replace(&self.api_key, "***"));

        let mut logged = request_body.clone();
        truncate_base64_in_json(&mut logged);
        info!("📤 Request body: {}", serde_json::to_string_pretty(&logged).unwrap_or_default());

        let response = self.client
            .post(&url)
            .json(request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await.map_err(|e| GeminiError::Http(e.to_string()))?;
        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GeminiError::Http(format!("status={} body={}", status, response_text)));
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Response(format!("parse error: {}", e)))?;

        extract_first_text(&parsed).ok_or_else(|| GeminiError::Response("no text content in response".into()))
    }
}

/// Networked composer backed by the Gemini `generateContent` API.
pub struct GeminiComposer {
    client: GeminiClient,
}

impl GeminiComposer {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StyleComposer for GeminiComposer {
    fn name(&self) -> &'static str {
        "genai"
    }

    async fn suggest(&self, input: &SuggestionInput) -> Result<SuggestionOutput, StylistError> {
        info!("Generating style suggestions with Gemini API...");
        self.client.generate_style_suggestions(input).await.map_err(|e| {
            error!("❌ Failed to generate style suggestions: {}", e);
            e.into()
        })
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    #[allow(dead_code)]
    Other(serde_json::Value),
}

fn extract_first_text(resp: &GeminiResponse) -> Option<String> {
    resp.candidates
        .iter()
        .flat_map(|c| c.content.parts.iter())
        .find_map(|p| match p {
            Part::Text { text } => Some(text.trim().to_string()),
            Part::Other(_) => None,
        })
}
