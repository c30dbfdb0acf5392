// watsonx mapper module
// Responsible for caller <-> watsonx.ai protocol conversion

pub mod models;
pub mod request;
pub mod response;

pub use models::*;
pub use request::RequestTranslator;
pub use response::{parse_chat_response, parse_embeddings_response, parse_generation_response};
