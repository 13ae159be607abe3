//! CORS layer.
//!
//! Thin wrapper around tower-http CORS. The gateway serves programmatic
//! clients, so when enabled the policy is permissive; disable it entirely
//! for private deployments behind a mesh.

use tower_http::cors::CorsLayer;

/// Builds the CORS layer from configuration.
pub fn create_cors_layer(enabled: bool) -> CorsLayer {
    if enabled {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}
