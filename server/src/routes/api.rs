use axum::{Json, extract::State};
use ebh_shared::BOUNDARY_PATH;

use crate::state::{AppState, BoundaryStatus};

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let boundary = match state.boundary.as_ref() {
        BoundaryStatus::Ready { bounds } => serde_json::json!({
            "path": BOUNDARY_PATH,
            "available": true,
            "bbox": bounds.to_array(),
        }),
        BoundaryStatus::Unavailable { reason } => serde_json::json!({
            "path": BOUNDARY_PATH,
            "available": false,
            "error": reason,
        }),
    };
    Json(serde_json::json!({
        "status": "ok",
        "static_dir": state.static_dir.display().to_string(),
        "boundary": boundary,
    }))
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use crate::state::AppState;
    use crate::state::tests::{HILLS, scratch_static_dir};

    async fn spawn_test_server(state: AppState) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = crate::app::build_app(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn health_reports_boundary_bbox() {
        let dir = scratch_static_dir("health-ready", Some(HILLS));
        let state = AppState::load(dir.clone()).await;
        let (addr, server_handle) = spawn_test_server(state).await;

        let health = reqwest::Client::new()
            .get(format!("http://{addr}/api/health"))
            .send()
            .await
            .expect("health request")
            .error_for_status()
            .expect("health status")
            .json::<serde_json::Value>()
            .await
            .expect("parse health");

        assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("ok"));
        let boundary = health.get("boundary").expect("boundary section");
        assert_eq!(
            boundary.get("path").and_then(|v| v.as_str()),
            Some("/data/east-bay-hills.geojson")
        );
        assert_eq!(
            boundary.get("available").and_then(|v| v.as_bool()),
            Some(true)
        );
        let bbox: Vec<f64> = boundary
            .get("bbox")
            .and_then(|v| v.as_array())
            .expect("bbox array")
            .iter()
            .filter_map(|v| v.as_f64())
            .collect();
        assert_eq!(bbox, vec![-122.29, 37.73, -122.07, 37.93]);

        server_handle.abort();
        let _ = server_handle.await;
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn health_stays_ok_without_boundary() {
        let dir = scratch_static_dir("health-missing", None);
        let state = AppState::load(dir.clone()).await;
        let (addr, server_handle) = spawn_test_server(state).await;

        let health = reqwest::Client::new()
            .get(format!("http://{addr}/api/health"))
            .send()
            .await
            .expect("health request")
            .error_for_status()
            .expect("health status")
            .json::<serde_json::Value>()
            .await
            .expect("parse health");

        assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("ok"));
        let boundary = health.get("boundary").expect("boundary section");
        assert_eq!(
            boundary.get("available").and_then(|v| v.as_bool()),
            Some(false)
        );
        assert!(boundary.get("error").and_then(|v| v.as_str()).is_some());

        server_handle.abort();
        let _ = server_handle.await;
        let _ = std::fs::remove_dir_all(dir);
    }
}
