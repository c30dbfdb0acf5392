// Caller request -> watsonx payload translation
use super::models::*;
use crate::error::GatewayError;
use crate::proxy::config::{ProxyConfig, WatsonxConfig};

/// Highest temperature watsonx accepts
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Values API explorers and form tools leave in optional string fields
const PLACEHOLDER_MODEL_IDS: &[&str] = &["string", "none", "null", "undefined"];

/// Validates caller parameters and shapes them into watsonx payloads
///
/// Nothing that fails here is ever sent upstream.
#[derive(Debug, Clone)]
pub struct RequestTranslator {
    project_id: String,
    generation_model_id: String,
    embedding_model_id: String,
    default_max_new_tokens: u32,
    max_new_tokens_limit: u32,
    use_chat: bool,
}

impl RequestTranslator {
    pub fn new(watsonx: &WatsonxConfig, proxy: &ProxyConfig) -> Self {
        Self {
            project_id: watsonx.project_id.clone(),
            generation_model_id: watsonx.generation_model_id.clone(),
            embedding_model_id: watsonx.embedding_model_id.clone(),
            default_max_new_tokens: proxy.default_max_new_tokens,
            max_new_tokens_limit: proxy.max_new_tokens_limit,
            use_chat: watsonx.use_chat,
        }
    }

    pub fn translate_generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<GenerationPayload, GatewayError> {
        if request.prompt.trim().is_empty() {
            return Err(GatewayError::Validation("prompt must not be empty".into()));
        }

        let parameters = self.build_parameters(request)?;
        let model_id = self.resolve_model_id(request.model_id.as_deref());

        tracing::debug!(
            "Translated generation: model='{}', decoding={:?}, chat={}",
            model_id,
            parameters.decoding_method,
            self.use_chat
        );

        if self.use_chat {
            Ok(GenerationPayload::Chat(ChatBody {
                messages: vec![ChatMessage {
                    role: "user".to_string(),
                    content: vec![ChatContent::Text {
                        text: request.prompt.clone(),
                    }],
                }],
                model_id,
                project_id: self.project_id.clone(),
                parameters,
            }))
        } else {
            Ok(GenerationPayload::Text(TextGenerationBody {
                input: request.prompt.clone(),
                model_id,
                project_id: self.project_id.clone(),
                parameters,
            }))
        }
    }

    pub fn translate_embeddings(
        &self,
        request: &EmbeddingsRequest,
    ) -> Result<EmbeddingPayload, GatewayError> {
        let inputs = match &request.input {
            EmbeddingInput::Single(text) => vec![text.clone()],
            EmbeddingInput::Batch(items) => items.clone(),
        };

        if inputs.is_empty() {
            return Err(GatewayError::Validation("input must not be empty".into()));
        }
        if let Some(index) = inputs.iter().position(|s| s.trim().is_empty()) {
            return Err(GatewayError::Validation(format!(
                "input[{}] must not be empty",
                index
            )));
        }

        Ok(EmbeddingPayload {
            inputs,
            model_id: self.embedding_model_id.clone(),
            project_id: self.project_id.clone(),
        })
    }

    /// Empty or placeholder ids fall back to the configured default
    pub fn resolve_model_id(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim) {
            Some(id) if !id.is_empty() && !is_placeholder_model_id(id) => id.to_string(),
            Some(id) => {
                if !id.is_empty() {
                    tracing::info!(
                        "Ignoring placeholder model_id '{}', using '{}'",
                        id,
                        self.generation_model_id
                    );
                }
                self.generation_model_id.clone()
            }
            None => self.generation_model_id.clone(),
        }
    }

    fn build_parameters(
        &self,
        request: &GenerateRequest,
    ) -> Result<GenerationParameters, GatewayError> {
        let max_new_tokens = match request.max_new_tokens {
            None => self.default_max_new_tokens,
            Some(n) if n >= 1 && n <= self.max_new_tokens_limit as i64 => n as u32,
            Some(n) => {
                return Err(GatewayError::Validation(format!(
                    "max_new_tokens must be between 1 and {}, got {}",
                    self.max_new_tokens_limit, n
                )))
            }
        };

        let temperature = request.temperature.unwrap_or(0.0);
        if !temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(GatewayError::Validation(format!(
                "temperature must be between 0 and {}, got {}",
                MAX_TEMPERATURE, temperature
            )));
        }

        // Sampling parameters are range-checked even when greedy decoding will drop them
        if let Some(top_p) = request.top_p {
            if !top_p.is_finite() || top_p <= 0.0 || top_p > 1.0 {
                return Err(GatewayError::Validation(format!(
                    "top_p must be in (0, 1], got {}",
                    top_p
                )));
            }
        }
        let top_k = match request.top_k {
            None => None,
            Some(k) if k >= 1 && k <= u32::MAX as i64 => Some(k as u32),
            Some(k) => {
                return Err(GatewayError::Validation(format!(
                    "top_k must be >= 1, got {}",
                    k
                )))
            }
        };
        if let Some(penalty) = request.repetition_penalty {
            if !penalty.is_finite() || penalty <= 0.0 {
                return Err(GatewayError::Validation(format!(
                    "repetition_penalty must be > 0, got {}",
                    penalty
                )));
            }
        }

        let stop_sequences = request
            .stop_sequences
            .clone()
            .filter(|seqs| !seqs.is_empty());

        let parameters = if temperature == 0.0 {
            GenerationParameters {
                decoding_method: DecodingMethod::Greedy,
                max_new_tokens,
                temperature: None,
                top_p: None,
                top_k: None,
                repetition_penalty: request.repetition_penalty,
                stop_sequences,
            }
        } else {
            // Absent top_p/top_k stay absent so upstream defaults apply
            GenerationParameters {
                decoding_method: DecodingMethod::Sample,
                max_new_tokens,
                temperature: Some(temperature),
                top_p: request.top_p,
                top_k,
                repetition_penalty: request.repetition_penalty,
                stop_sequences,
            }
        };

        Ok(parameters)
    }
}

pub fn is_placeholder_model_id(id: &str) -> bool {
    PLACEHOLDER_MODEL_IDS
        .iter()
        .any(|p| id.eq_ignore_ascii_case(p))
}
