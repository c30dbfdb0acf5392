// CORS layer
use tower_http::cors::{Any, CorsLayer};

/// Allow any origin, method and header; the gateway carries no caller credentials
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
