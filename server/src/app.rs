use std::path::Path;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let static_assets = Router::new()
        .fallback_service(
            ServeDir::new(state.static_dir.as_path())
                .precompressed_br()
                .precompressed_gzip(),
        )
        .layer(middleware::from_fn(set_static_cache_control));

    let app = Router::new().route("/api/health", axum::routing::get(routes::api::health));

    app.layer(CompressionLayer::new())
        .fallback_service(static_assets)
        .with_state(state)
}

const IMMUTABLE: &str = "public, max-age=31536000, immutable";
const DATA_TTL: &str = "public, max-age=3600";

/// Cache policy by asset kind. Pages and unhashed files keep ServeDir's defaults.
async fn set_static_cache_control(request: Request, next: Next) -> Response {
    let policy = cache_control_for_path(request.uri().path());
    let mut response = next.run(request).await;
    if let Some(policy) = policy
        && response.status().is_success()
    {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(policy));
    }
    response
}

fn cache_control_for_path(path: &str) -> Option<&'static str> {
    if path.starts_with("/data/") {
        // The boundary file keeps its name across deploys.
        return Some(DATA_TTL);
    }
    trunk_fingerprint(path).map(|_| IMMUTABLE)
}

/// The content hash trunk embeds in bundle names, e.g. `ebh-client-71578f6b278221f3_bg.wasm`.
fn trunk_fingerprint(path: &str) -> Option<&str> {
    let file = Path::new(path);
    if !matches!(
        file.extension().and_then(|ext| ext.to_str()),
        Some("wasm" | "js" | "css")
    ) {
        return None;
    }
    let stem = file.file_stem()?.to_str()?;
    let stem = stem.strip_suffix("_bg").unwrap_or(stem);
    let (_, hash) = stem.rsplit_once('-')?;
    (hash.len() >= 8 && hash.bytes().all(|b| b.is_ascii_hexdigit())).then_some(hash)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use super::*;
    use crate::state::tests::{HILLS, scratch_static_dir};

    #[test]
    fn immutable_cache_for_hashed_bundle_assets() {
        assert_eq!(
            cache_control_for_path("/ebh-client-71578f6b278221f3_bg.wasm"),
            Some("public, max-age=31536000, immutable")
        );
        assert_eq!(
            cache_control_for_path("/style-a93762ff3bf6d63a.css"),
            Some("public, max-age=31536000, immutable")
        );
    }

    #[test]
    fn short_cache_for_data_files() {
        assert_eq!(
            cache_control_for_path("/data/east-bay-hills.geojson"),
            Some("public, max-age=3600")
        );
    }

    #[test]
    fn no_cache_header_override_for_html() {
        assert_eq!(cache_control_for_path("/"), None);
        assert_eq!(cache_control_for_path("/index.html"), None);
        assert_eq!(cache_control_for_path("/style.css"), None);
    }

    #[test]
    fn fingerprint_is_the_trailing_hex_segment() {
        assert_eq!(
            trunk_fingerprint("/ebh-client-71578f6b278221f3_bg.wasm"),
            Some("71578f6b278221f3")
        );
        assert_eq!(trunk_fingerprint("/ebh-client-71578f6b278221f3.js"), Some("71578f6b278221f3"));
        assert_eq!(trunk_fingerprint("/leaflet-1.9.4.js"), None);
        assert_eq!(trunk_fingerprint("/data/deadbeefcafe-01.geojson"), None);
    }

    #[tokio::test]
    async fn boundary_asset_is_served_with_data_cache_header() {
        let dir = scratch_static_dir("serve-boundary", Some(HILLS));
        let app = build_app(AppState::load(dir.clone()).await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/data/east-bay-hills.geojson")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
            Some("public, max-age=3600")
        );
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn missing_static_file_is_not_found_without_cache_header() {
        let dir = scratch_static_dir("serve-missing", None);
        let app = build_app(AppState::load(dir.clone()).await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/data/east-bay-hills.geojson")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn index_is_served_at_root() {
        let dir = scratch_static_dir("serve-index", None);
        let app = build_app(AppState::load(dir.clone()).await);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let _ = std::fs::remove_dir_all(dir);
    }
}
