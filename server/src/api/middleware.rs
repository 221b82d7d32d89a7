//! HTTP middleware (CORS, path-to-identifier rewrite, 404 handler)

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::uri::{PathAndQuery, Uri};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::core::config::RewriteConfig;

/// Allowed origins configuration
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    /// Create allowed origins from host and port configuration
    pub fn new(host: &str, port: u16) -> Self {
        let dev_port = port.saturating_add(1);

        // Loopback and wildcard binds are reached through either loopback name
        let base_hosts: Vec<&str> =
            if matches!(host, "0.0.0.0" | "::" | "127.0.0.1" | "localhost") {
                vec!["localhost", "127.0.0.1"]
            } else {
                vec![host]
            };

        let origins = base_hosts
            .iter()
            .flat_map(|h| {
                [
                    format!("http://{}:{}", h, port),
                    format!("http://{}:{}", h, dev_port),
                    format!("http://{}", h),
                ]
            })
            .collect();

        Self { origins }
    }

    /// Check if an origin is allowed
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }

    fn as_header_values(&self) -> Vec<HeaderValue> {
        self.origins.iter().filter_map(|o| o.parse().ok()).collect()
    }
}

/// Create CORS layer
pub fn cors(allowed: &AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.as_header_values()))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
}

// =============================================================================
// Path-to-identifier rewrite
// =============================================================================

/// Rewrite a "pretty" application path into the identifier query parameter
///
/// `/onboarding/start?x=1` becomes `("/", "x=1&appId=onboarding/start")`.
/// Returns `None` when the request must pass through untouched: root path,
/// excluded prefix, static file extension, identifier already present, or an
/// identifier containing a dot.
pub fn rewrite(path: &str, query: Option<&str>, config: &RewriteConfig) -> Option<(String, String)> {
    if path.is_empty() || path == "/" {
        return None;
    }

    if config
        .excluded_prefixes
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
    {
        return None;
    }

    let lower = path.to_ascii_lowercase();
    if config
        .static_extensions
        .iter()
        .any(|ext| lower.ends_with(ext.as_str()))
    {
        return None;
    }

    let query = query.filter(|q| !q.is_empty());
    if query.is_some_and(|q| has_param(q, &config.param)) {
        return None;
    }

    let identifier = path.strip_prefix('/').unwrap_or(path);
    if identifier.contains('.') {
        return None;
    }

    let param = format!("{}={}", config.param, identifier);
    let query = match query {
        Some(existing) => format!("{}&{}", existing, param),
        None => param,
    };
    Some(("/".to_string(), query))
}

/// Whether a raw query string carries `name`, with or without a value
fn has_param(query: &str, name: &str) -> bool {
    query
        .split('&')
        .map(|pair| pair.split_once('=').map_or(pair, |(key, _)| key))
        .any(|key| key.eq_ignore_ascii_case(name))
}

/// Apply [`rewrite`] to the request URI before routing
///
/// Must wrap the router it rewrites for; layers added with `Router::layer`
/// run after routing.
pub async fn rewrite_app_path(
    State(config): State<Arc<RewriteConfig>>,
    mut req: Request,
    next: Next,
) -> Response {
    let uri = req.uri();
    if let Some((path, query)) = rewrite(uri.path(), uri.query(), &config) {
        match rewritten_uri(uri, &path, &query) {
            Ok(new_uri) => {
                tracing::debug!(from = %uri, to = %new_uri, "Rewrote application path");
                *req.uri_mut() = new_uri;
            }
            Err(e) => {
                tracing::warn!(uri = %uri, error = %e, "Failed to rewrite application path");
            }
        }
    }
    next.run(req).await
}

fn rewritten_uri(uri: &Uri, path: &str, query: &str) -> Result<Uri, axum::http::Error> {
    let path_and_query: PathAndQuery = format!("{}?{}", path, query).parse()?;
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    Ok(Uri::from_parts(parts)?)
}

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    tracing::debug!(method = %req.method(), uri = %req.uri(), "[404]");
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({
            "error": "not_found",
            "code": "ROUTE_NOT_FOUND",
            "message": format!("No route for {}", req.uri().path())
        })),
    )
}
