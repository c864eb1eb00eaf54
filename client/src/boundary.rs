use ebh_shared::Boundary;

/// Fetch and validate the area-of-interest GeoJSON.
pub async fn fetch_boundary(path: &str) -> Result<Boundary, String> {
    let resp = gloo_net::http::Request::get(path)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }

    let document = resp
        .json::<serde_json::Value>()
        .await
        .map_err(|e| format!("parse error: {e}"))?;
    Boundary::from_value(document)
}
