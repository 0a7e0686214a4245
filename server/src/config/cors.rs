use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(86400);

/// CORS for the buyer site and the admin/scanner front ends.
pub fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allow_origin(allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_LENGTH])
        .allow_credentials(true)
        .max_age(PREFLIGHT_MAX_AGE)
}

fn allow_origin(allowed_origins: &[String]) -> AllowOrigin {
    let origins = parse_origins(allowed_origins);
    if origins.is_empty() {
        tracing::warn!("CORS: no valid origins configured, mirroring the request origin");
        // A wildcard can't be combined with credentials.
        AllowOrigin::mirror_request()
    } else {
        tracing::info!(count = origins.len(), "CORS: allowed origins configured");
        AllowOrigin::list(origins)
    }
}

fn parse_origins(allowed_origins: &[String]) -> Vec<HeaderValue> {
    allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%origin, error = %e, "CORS: skipping invalid origin");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    fn origins(list: &[&str]) -> Vec<String> {
        list.iter().map(|o| o.to_string()).collect()
    }

    #[test]
    fn test_parse_origins_skips_blank_and_invalid() {
        let parsed = parse_origins(&origins(&[
            "https://tickets.example.com",
            " ",
            "bad\norigin",
            "http://localhost:5173",
        ]));
        assert_eq!(parsed.len(), 2);
    }

    #[tokio::test]
    async fn test_preflight_from_allowed_origin() {
        let app = Router::new()
            .route("/events", get(|| async { "ok" }))
            .layer(create_cors_layer(&origins(&["https://tickets.example.com"])));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/events")
                    .header(header::ORIGIN, "https://tickets.example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://tickets.example.com"
        );
    }
}
