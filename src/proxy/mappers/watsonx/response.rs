// watsonx response -> typed results
use super::models::*;
use crate::error::GatewayError;
use serde_json::Value;

fn protocol_error(status: u16, message: impl Into<String>) -> GatewayError {
    GatewayError::UpstreamProtocol {
        status,
        message: message.into(),
    }
}

/// Parse a `text/generation` response
///
/// Expected: `{"model_id": ..., "results": [{"generated_text": ..., ...}]}`
pub fn parse_generation_response(status: u16, raw: Value) -> Result<GenerationResult, GatewayError> {
    let first = raw
        .get("results")
        .and_then(|r| r.as_array())
        .and_then(|r| r.first())
        .ok_or_else(|| protocol_error(status, "generation response has no results"))?;

    let text = first
        .get("generated_text")
        .and_then(|t| t.as_str())
        .ok_or_else(|| protocol_error(status, "generation result has no generated_text"))?
        .to_string();

    Ok(GenerationResult {
        text,
        model_id: raw.get("model_id").and_then(|v| v.as_str()).map(String::from),
        stop_reason: first.get("stop_reason").and_then(|v| v.as_str()).map(String::from),
        generated_token_count: first.get("generated_token_count").and_then(|v| v.as_u64()),
        input_token_count: first.get("input_token_count").and_then(|v| v.as_u64()),
        raw,
    })
}

/// Parse a `text/chat` response
///
/// Expected: `{"model_id": ..., "choices": [{"message": {"content": ...}, "finish_reason": ...}], "usage": {...}}`
pub fn parse_chat_response(status: u16, raw: Value) -> Result<GenerationResult, GatewayError> {
    let choice = raw
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| protocol_error(status, "chat response has no choices"))?;

    let text = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| protocol_error(status, "chat choice has no message content"))?
        .to_string();

    let usage = raw.get("usage");
    Ok(GenerationResult {
        text,
        model_id: raw.get("model_id").and_then(|v| v.as_str()).map(String::from),
        stop_reason: choice.get("finish_reason").and_then(|v| v.as_str()).map(String::from),
        generated_token_count: usage
            .and_then(|u| u.get("completion_tokens"))
            .and_then(|v| v.as_u64()),
        input_token_count: usage
            .and_then(|u| u.get("prompt_tokens"))
            .and_then(|v| v.as_u64()),
        raw,
    })
}

/// Parse a `text/embeddings` response, requiring one vector per input
///
/// Expected: `{"results": [{"embedding": [f64, ...]}, ...]}`
pub fn parse_embeddings_response(
    status: u16,
    raw: Value,
    expected: usize,
) -> Result<EmbeddingResult, GatewayError> {
    let results = raw
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| protocol_error(status, "embeddings response has no results"))?;

    if results.len() != expected {
        return Err(protocol_error(
            status,
            format!(
                "embeddings response has {} vectors for {} inputs",
                results.len(),
                expected
            ),
        ));
    }

    let vectors = results
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.get("embedding")
                .and_then(|e| e.as_array())
                .and_then(|values| values.iter().map(|v| v.as_f64()).collect::<Option<Vec<f64>>>())
                .ok_or_else(|| {
                    protocol_error(status, format!("results[{}] has no numeric embedding", index))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EmbeddingResult { vectors, raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_generation_response() {
        let raw = json!({
            "model_id": "mistralai/mistral-large",
            "created_at": "2024-05-01T10:00:00.000Z",
            "results": [{
                "generated_text": "X is a letter.",
                "generated_token_count": 5,
                "input_token_count": 4,
                "stop_reason": "eos_token"
            }]
        });

        let result = parse_generation_response(200, raw).unwrap();
        assert_eq!(result.text, "X is a letter.");
        assert_eq!(result.model_id.as_deref(), Some("mistralai/mistral-large"));
        assert_eq!(result.stop_reason.as_deref(), Some("eos_token"));
        assert_eq!(result.generated_token_count, Some(5));
        assert_eq!(result.raw["created_at"], "2024-05-01T10:00:00.000Z");
    }

    #[test]
    fn test_generation_without_results_is_protocol_error() {
        for raw in [json!({}), json!({"results": []}), json!({"results": [{"text": "x"}]})] {
            let err = parse_generation_response(200, raw).unwrap_err();
            assert!(matches!(err, GatewayError::UpstreamProtocol { status: 200, .. }));
        }
    }

    #[test]
    fn test_parse_chat_response() {
        let raw = json!({
            "model_id": "ibm/granite-3-8b-instruct",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello there"},
                "finish_reason": "stop"
            }],
            "usage": {"completion_tokens": 3, "prompt_tokens": 7, "total_tokens": 10}
        });

        let result = parse_chat_response(200, raw).unwrap();
        assert_eq!(result.text, "Hello there");
        assert_eq!(result.stop_reason.as_deref(), Some("stop"));
        assert_eq!(result.generated_token_count, Some(3));
        assert_eq!(result.input_token_count, Some(7));
    }

    #[test]
    fn test_parse_embeddings_keeps_order() {
        let raw = json!({
            "model_id": "ibm/slate-125m-english-rtrvr",
            "results": [
                {"embedding": [0.1, 0.2]},
                {"embedding": [0.3, 0.4]},
                {"embedding": [1, -1]}
            ],
            "input_token_count": 6
        });

        let result = parse_embeddings_response(200, raw, 3).unwrap();
        assert_eq!(
            result.vectors,
            vec![vec![0.1, 0.2], vec![0.3, 0.4], vec![1.0, -1.0]]
        );
    }

    #[test]
    fn test_embedding_count_mismatch_is_protocol_error() {
        let raw = json!({"results": [{"embedding": [0.1]}]});
        let err = parse_embeddings_response(200, raw, 2).unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamProtocol { .. }));
    }

    #[test]
    fn test_non_numeric_embedding_is_protocol_error() {
        let raw = json!({"results": [{"embedding": [0.1, "x"]}]});
        assert!(parse_embeddings_response(200, raw, 1).is_err());
    }
}
