use serde::{Deserialize, Serialize};
use serde_json::Value;

// ===== Inbound (caller-facing) =====

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub max_new_tokens: Option<i64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub repetition_penalty: Option<f64>,
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingsRequest {
    pub input: EmbeddingInput,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_token_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_token_count: Option<u64>,
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingsResponse {
    pub embeddings: Vec<Vec<f64>>,
    pub raw: Value,
}

// ===== Outbound (watsonx wire format) =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodingMethod {
    Greedy,
    Sample,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParameters {
    pub decoding_method: DecodingMethod,
    pub max_new_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// Body of `POST /ml/v1/text/generation`
#[derive(Debug, Clone, Serialize)]
pub struct TextGenerationBody {
    pub input: String,
    pub model_id: String,
    pub project_id: String,
    pub parameters: GenerationParameters,
}

/// Body of `POST /ml/v1/text/chat`
#[derive(Debug, Clone, Serialize)]
pub struct ChatBody {
    pub messages: Vec<ChatMessage>,
    pub model_id: String,
    pub project_id: String,
    pub parameters: GenerationParameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ChatContent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatContent {
    Text { text: String },
}

/// A validated generation call, addressed to one of the two generation APIs
#[derive(Debug, Clone)]
pub enum GenerationPayload {
    Text(TextGenerationBody),
    Chat(ChatBody),
}

impl GenerationPayload {
    /// Path below `/ml/v1/`
    pub fn path(&self) -> &'static str {
        match self {
            GenerationPayload::Text(_) => "text/generation",
            GenerationPayload::Chat(_) => "text/chat",
        }
    }

    pub fn model_id(&self) -> &str {
        match self {
            GenerationPayload::Text(body) => &body.model_id,
            GenerationPayload::Chat(body) => &body.model_id,
        }
    }

    pub fn parameters(&self) -> &GenerationParameters {
        match self {
            GenerationPayload::Text(body) => &body.parameters,
            GenerationPayload::Chat(body) => &body.parameters,
        }
    }
}

/// Body of `POST /ml/v1/text/embeddings`
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingPayload {
    pub inputs: Vec<String>,
    pub model_id: String,
    pub project_id: String,
}

// ===== Parsed upstream results =====

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub model_id: Option<String>,
    pub stop_reason: Option<String>,
    pub generated_token_count: Option<u64>,
    pub input_token_count: Option<u64>,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub vectors: Vec<Vec<f64>>,
    pub raw: Value,
}

impl From<GenerationResult> for GenerateResponse {
    fn from(result: GenerationResult) -> Self {
        Self {
            text: result.text,
            model_id: result.model_id,
            stop_reason: result.stop_reason,
            generated_token_count: result.generated_token_count,
            input_token_count: result.input_token_count,
            raw: result.raw,
        }
    }
}

impl From<EmbeddingResult> for EmbeddingsResponse {
    fn from(result: EmbeddingResult) -> Self {
        Self {
            embeddings: result.vectors,
            raw: result.raw,
        }
    }
}
