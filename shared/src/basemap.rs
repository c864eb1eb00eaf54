use serde::{Deserialize, Serialize};

use crate::config::MapConfig;

const MAPTILER_STYLE_URL: &str = "https://api.maptiler.com/maps/base-v4/style.json";
const MAPTILER_RASTER_URL: &str = "https://api.maptiler.com/maps/streets-v2/{z}/{x}/{y}.png";
const MAPTILER_TERRAIN_URL: &str = "https://api.maptiler.com/tiles/terrain-rgb-v2/tiles.json";
const OPENWEATHER_WIND_URL: &str = "https://tile.openweathermap.org/map/wind_speed/{z}/{x}/{y}.png";

pub const PUBLIC_STYLE_URL: &str = "https://demotiles.maplibre.org/style.json";
pub const PUBLIC_RASTER_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

const MAPTILER_ATTRIBUTION: &str = r#"&copy; <a href="https://www.maptiler.com/copyright/">MapTiler</a> &copy; <a href="https://www.openstreetmap.org/copyright">OSM</a>"#;
const OSM_ATTRIBUTION: &str = r#"&copy; <a href="https://www.openstreetmap.org/copyright">OSM</a>"#;

/// The two map front-ends the page embeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Viewer {
    /// WebGL vector engine with style documents, terrain and symbol layers.
    MapLibre,
    /// DOM/raster engine; no style document, no label layers.
    Leaflet,
}

impl Viewer {
    /// Initial fuels overlay opacity for this viewer.
    pub const fn default_opacity(self) -> f64 {
        match self {
            Self::MapLibre => 0.6,
            Self::Leaflet => 0.75,
        }
    }

    /// Pixel size of one zoom-0 world tile in this engine.
    pub const fn world_tile_size(self) -> f64 {
        match self {
            Self::MapLibre => 512.0,
            Self::Leaflet => 256.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasemapProvider {
    MapTiler,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasemapKind {
    /// A full style document (sources + layers) for a vector engine.
    StyleDocument,
    /// An XYZ raster tile template.
    RasterTiles,
}

/// Resolved base map for one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasemapDescriptor {
    pub provider: BasemapProvider,
    pub kind: BasemapKind,
    pub url: String,
    pub attribution: &'static str,
}

/// Picks the base map for `viewer`. Pure in the MapTiler credential: a key selects
/// the keyed service, no key selects the public one. There is no runtime fallback.
pub fn select_basemap(config: &MapConfig, viewer: Viewer) -> BasemapDescriptor {
    match (viewer, config.maptiler_key()) {
        (Viewer::MapLibre, Some(key)) => BasemapDescriptor {
            provider: BasemapProvider::MapTiler,
            kind: BasemapKind::StyleDocument,
            url: with_query_key(MAPTILER_STYLE_URL, "key", key),
            attribution: MAPTILER_ATTRIBUTION,
        },
        (Viewer::MapLibre, None) => BasemapDescriptor {
            provider: BasemapProvider::Public,
            kind: BasemapKind::StyleDocument,
            url: PUBLIC_STYLE_URL.to_owned(),
            attribution: OSM_ATTRIBUTION,
        },
        (Viewer::Leaflet, Some(key)) => BasemapDescriptor {
            provider: BasemapProvider::MapTiler,
            kind: BasemapKind::RasterTiles,
            url: with_query_key(MAPTILER_RASTER_URL, "key", key),
            attribution: MAPTILER_ATTRIBUTION,
        },
        (Viewer::Leaflet, None) => BasemapDescriptor {
            provider: BasemapProvider::Public,
            kind: BasemapKind::RasterTiles,
            url: PUBLIC_RASTER_URL.to_owned(),
            attribution: OSM_ATTRIBUTION,
        },
    }
}

/// TileJSON url of the MapTiler terrain-rgb DEM, if a MapTiler key is configured.
pub fn terrain_dem_url(config: &MapConfig) -> Option<String> {
    config
        .maptiler_key()
        .map(|key| with_query_key(MAPTILER_TERRAIN_URL, "key", key))
}

/// Wind-speed tile template, if an OpenWeather key is configured.
pub fn wind_tiles_url(config: &MapConfig) -> Option<String> {
    config
        .openweather_key()
        .map(|key| with_query_key(OPENWEATHER_WIND_URL, "appid", key))
}

/// Appends `?name=value` to a url template, encoding only the value so `{z}`-style
/// placeholders survive untouched.
fn with_query_key(template: &str, name: &str, value: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
    format!("{template}?{name}={encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_config_selects_maptiler_for_both_viewers() {
        let config = MapConfig::new(Some("k3y"), None);

        let maplibre = select_basemap(&config, Viewer::MapLibre);
        assert_eq!(maplibre.provider, BasemapProvider::MapTiler);
        assert_eq!(maplibre.kind, BasemapKind::StyleDocument);
        assert_eq!(
            maplibre.url,
            "https://api.maptiler.com/maps/base-v4/style.json?key=k3y"
        );

        let leaflet = select_basemap(&config, Viewer::Leaflet);
        assert_eq!(leaflet.provider, BasemapProvider::MapTiler);
        assert_eq!(
            leaflet.url,
            "https://api.maptiler.com/maps/streets-v2/{z}/{x}/{y}.png?key=k3y"
        );
        assert!(leaflet.attribution.contains("MapTiler"));
    }

    #[test]
    fn anonymous_config_selects_public_services() {
        let config = MapConfig::anonymous();

        let maplibre = select_basemap(&config, Viewer::MapLibre);
        assert_eq!(maplibre.provider, BasemapProvider::Public);
        assert_eq!(maplibre.url, PUBLIC_STYLE_URL);

        let leaflet = select_basemap(&config, Viewer::Leaflet);
        assert_eq!(leaflet.provider, BasemapProvider::Public);
        assert_eq!(leaflet.kind, BasemapKind::RasterTiles);
        assert_eq!(leaflet.url, PUBLIC_RASTER_URL);
        assert!(!leaflet.attribution.contains("MapTiler"));
    }

    #[test]
    fn selection_is_deterministic() {
        for config in [MapConfig::anonymous(), MapConfig::new(Some("abc"), None)] {
            for viewer in [Viewer::MapLibre, Viewer::Leaflet] {
                assert_eq!(
                    select_basemap(&config, viewer),
                    select_basemap(&config, viewer)
                );
            }
        }
    }

    #[test]
    fn keyed_extras_follow_their_own_credentials() {
        let anonymous = MapConfig::anonymous();
        assert_eq!(terrain_dem_url(&anonymous), None);
        assert_eq!(wind_tiles_url(&anonymous), None);

        let config = MapConfig::new(Some("mt"), Some("o w"));
        assert_eq!(
            terrain_dem_url(&config).as_deref(),
            Some("https://api.maptiler.com/tiles/terrain-rgb-v2/tiles.json?key=mt")
        );
        assert_eq!(
            wind_tiles_url(&config).as_deref(),
            Some("https://tile.openweathermap.org/map/wind_speed/{z}/{x}/{y}.png?appid=o+w")
        );
    }
}
