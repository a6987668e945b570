//! HTTP surface: landing page, health probe and Prometheus exposition.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::error;

/// Build the exporter router. Scrapes only read what `registry` already
/// holds; nothing here talks to Jenkins.
pub fn build_router(registry: Registry, telemetry_path: &str) -> Router {
    let landing = landing_page(telemetry_path);

    Router::new()
        .route("/", get(move || async move { Html(landing) }))
        .route("/healthz", get(healthz))
        .route(telemetry_path, get(prometheus_metrics))
        .with_state(registry)
}

fn landing_page(telemetry_path: &str) -> String {
    format!(
        "<html>\n\
         <head><title>Jenkins Exporter</title></head>\n\
         <body>\n\
         <h1>Jenkins Exporter</h1>\n\
         <p><a href=\"{telemetry_path}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n"
    )
}

async fn healthz() -> &'static str {
    "ok"
}

async fn prometheus_metrics(State(registry): State<Registry>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = registry.gather();

    let mut body = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut body) {
        error!(error = %e, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [(CONTENT_TYPE, encoder.format_type().to_string())],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_page_links_telemetry_path() {
        let page = landing_page("/prometheus");
        assert!(page.contains("<a href=\"/prometheus\">Metrics</a>"));
    }

    #[tokio::test]
    async fn empty_registry_renders_ok() {
        let resp = prometheus_metrics(State(Registry::new())).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/plain; version=0.0.4"));
    }
}
