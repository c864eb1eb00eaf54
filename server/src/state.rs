use std::path::{Path, PathBuf};
use std::sync::Arc;

use ebh_shared::{Boundary, LngLatBounds};
use tracing::{info, warn};

use crate::config::BOUNDARY_ASSET;

/// Result of validating the boundary asset at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryStatus {
    Ready { bounds: LngLatBounds },
    Unavailable { reason: String },
}

#[derive(Clone)]
pub struct AppState {
    pub static_dir: Arc<PathBuf>,
    pub boundary: Arc<BoundaryStatus>,
}

impl AppState {
    pub fn new(static_dir: PathBuf, boundary: BoundaryStatus) -> Self {
        Self {
            static_dir: Arc::new(static_dir),
            boundary: Arc::new(boundary),
        }
    }

    /// Builds state for `static_dir`, checking that the boundary asset parses.
    /// A bad asset is logged and reported by the health route; it never stops the server.
    pub async fn load(static_dir: PathBuf) -> Self {
        let boundary = check_boundary(&static_dir).await;
        match &boundary {
            BoundaryStatus::Ready { bounds } => {
                info!(bbox = ?bounds.to_array(), "boundary asset validated");
            }
            BoundaryStatus::Unavailable { reason } => {
                warn!(%reason, dir = %static_dir.display(), "boundary asset unavailable");
            }
        }
        Self::new(static_dir, boundary)
    }
}

async fn check_boundary(static_dir: &Path) -> BoundaryStatus {
    let path = static_dir.join(BOUNDARY_ASSET);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return BoundaryStatus::Unavailable {
                reason: format!("read error: {e}"),
            };
        }
    };
    match Boundary::from_slice(&bytes) {
        Ok(boundary) => BoundaryStatus::Ready {
            bounds: boundary.bounds(),
        },
        Err(reason) => BoundaryStatus::Unavailable { reason },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Fresh static dir under the system temp dir, unique per test.
    pub(crate) fn scratch_static_dir(name: &str, boundary: Option<&str>) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ebh-server-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("data")).expect("create scratch dir");
        std::fs::write(dir.join("index.html"), "<!DOCTYPE html><div id=\"app\"></div>")
            .expect("write index");
        if let Some(boundary) = boundary {
            std::fs::write(dir.join(BOUNDARY_ASSET), boundary).expect("write boundary");
        }
        dir
    }

    pub(crate) const HILLS: &str = r#"{"type":"Feature","properties":{},"geometry":{
        "type":"Polygon",
        "coordinates":[[[-122.29,37.93],[-122.07,37.73],[-122.13,37.74],[-122.29,37.93]]]
    }}"#;

    #[tokio::test]
    async fn valid_boundary_reports_its_bbox() {
        let dir = scratch_static_dir("valid", Some(HILLS));
        let state = AppState::load(dir.clone()).await;
        assert_eq!(
            *state.boundary,
            BoundaryStatus::Ready {
                bounds: LngLatBounds {
                    min_lng: -122.29,
                    min_lat: 37.73,
                    max_lng: -122.07,
                    max_lat: 37.93,
                }
            }
        );
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn missing_or_broken_boundary_is_unavailable() {
        let missing = scratch_static_dir("missing", None);
        let state = AppState::load(missing.clone()).await;
        assert!(matches!(
            &*state.boundary,
            BoundaryStatus::Unavailable { reason } if reason.starts_with("read error")
        ));

        let broken = scratch_static_dir("broken", Some(r#"{"type":"FeatureCollection","features":[]}"#));
        let state = AppState::load(broken.clone()).await;
        assert!(matches!(
            &*state.boundary,
            BoundaryStatus::Unavailable { reason } if reason.contains("no usable coordinates")
        ));

        let _ = std::fs::remove_dir_all(missing);
        let _ = std::fs::remove_dir_all(broken);
    }
}
