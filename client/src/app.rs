use leptos::prelude::*;

use ebh_shared::{BOUNDARY_PATH, MapConfig};

use crate::map_view::{LeafletMap, MapLibreMap};

/// Credentials are baked in at build time; blank values fall back to public tiles.
fn build_config() -> MapConfig {
    MapConfig::new(option_env!("MAPTILER_KEY"), option_env!("OPENWEATHER_KEY"))
}

/// Root application component: page shell with both viewers side by side.
#[component]
pub fn App() -> impl IntoView {
    let config = build_config();
    let maplibre_title = if config.maptiler_key().is_some() {
        "MapLibre (MapTiler)"
    } else {
        "MapLibre (demo tiles)"
    };

    view! {
        <div class="page">
            <header class="page-header">
                <h1>"East Bay Hills Map"</h1>
                <p class="page-subtitle">
                    "LANDFIRE fuels over the East Bay Hills boundary ("
                    <code>{BOUNDARY_PATH}</code>
                    ")"
                </p>
            </header>
            <main class="map-grid">
                <section class="map-card">
                    <h2>{maplibre_title}</h2>
                    <MapLibreMap config=config.clone() />
                </section>
                <section class="map-card">
                    <h2>"Leaflet"</h2>
                    <LeafletMap config=config />
                </section>
                <aside class="page-legend">
                    <h2>"Legend"</h2>
                    <div class="legend-row">
                        <span class="legend-swatch legend-swatch-boundary"></span>
                        <span>"East Bay Hills boundary"</span>
                    </div>
                    <p class="legend-note">
                        "Pan/zoom with your mouse or the map controls."
                    </p>
                </aside>
            </main>
        </div>
    }
}
