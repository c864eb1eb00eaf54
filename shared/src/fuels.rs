use serde::{Deserialize, Serialize};

use crate::style::WmsSource;

pub const LANDFIRE_WMS_URL: &str = "https://edcintl.cr.usgs.gov/geoserver/landfire/us_250/wms";
pub const LANDFIRE_ATTRIBUTION: &str = "LANDFIRE © USGS (WMS)";
pub const WMS_VERSION: &str = "1.3.0";
pub const WMS_TILE_SIZE: u32 = 256;

/// A selectable LANDFIRE product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FuelLayer {
    pub id: &'static str,
    pub label: &'static str,
}

/// LANDFIRE 2024 CONUS 250 m products, in menu order. The first entry is the default.
pub const FUEL_LAYERS: &[FuelLayer] = &[
    FuelLayer {
        id: "LC24_F13_250",
        label: "FBFM13 – Surface Fuels",
    },
    FuelLayer {
        id: "LC24_F40_250",
        label: "FBFM40 – Detailed Fuels",
    },
    FuelLayer {
        id: "LC24_EVT_250",
        label: "Existing Vegetation Type (EVT)",
    },
    FuelLayer {
        id: "LC24_EVC_250",
        label: "Existing Vegetation Cover (EVC)",
    },
    FuelLayer {
        id: "LC24_EVH_250",
        label: "Existing Vegetation Height (EVH)",
    },
    FuelLayer {
        id: "LC24_CC_250",
        label: "Canopy Cover (CC)",
    },
    FuelLayer {
        id: "LC24_CBD_250",
        label: "Canopy Bulk Density (CBD)",
    },
    FuelLayer {
        id: "LC24_CBH_250",
        label: "Canopy Base Height (CBH)",
    },
];

pub fn find_layer(id: &str) -> Option<&'static FuelLayer> {
    FUEL_LAYERS.iter().find(|layer| layer.id == id)
}

/// Active fuels selection plus its opacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuelsOverlay {
    active: usize,
    opacity: f64,
}

impl FuelsOverlay {
    pub fn new(opacity: f64) -> Self {
        Self {
            active: 0,
            opacity: clamp_opacity(opacity).unwrap_or(1.0),
        }
    }

    pub fn active(&self) -> &'static FuelLayer {
        &FUEL_LAYERS[self.active]
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Stores a new opacity, clamped to `[0, 1]`. Returns the value actually applied.
    pub fn set_opacity(&mut self, opacity: f64) -> Result<f64, String> {
        let clamped = clamp_opacity(opacity)?;
        self.opacity = clamped;
        Ok(clamped)
    }

    /// Switches the active product. Returns `false` when `id` is already active.
    pub fn select(&mut self, id: &str) -> Result<bool, String> {
        let Some(index) = FUEL_LAYERS.iter().position(|layer| layer.id == id) else {
            return Err(format!("unknown fuels layer: {id}"));
        };
        let changed = index != self.active;
        self.active = index;
        Ok(changed)
    }

    pub fn source(&self) -> WmsSource {
        WmsSource {
            base_url: LANDFIRE_WMS_URL.to_owned(),
            layers: self.active().id.to_owned(),
            version: WMS_VERSION.to_owned(),
            format: "image/png".to_owned(),
            transparent: true,
            tile_size: WMS_TILE_SIZE,
            attribution: LANDFIRE_ATTRIBUTION.to_owned(),
        }
    }

    pub fn legend_url(&self) -> String {
        legend_url(self.active().id)
    }
}

fn clamp_opacity(opacity: f64) -> Result<f64, String> {
    if !opacity.is_finite() {
        return Err(format!("opacity must be finite, got {opacity}"));
    }
    Ok(opacity.clamp(0.0, 1.0))
}

/// GetMap tile template in web mercator with the `{bbox-epsg-3857}` placeholder left
/// for the engine to fill per tile.
pub fn get_map_tile_template(source: &WmsSource) -> String {
    format!(
        "{}?service=WMS&version={}&request=GetMap&layers={}&styles=&format={}&transparent={}&crs=EPSG:3857&width={}&height={}&bbox={{bbox-epsg-3857}}",
        source.base_url,
        source.version,
        encode(&source.layers),
        encode(&source.format),
        source.transparent,
        source.tile_size,
        source.tile_size,
    )
}

/// GetLegendGraphic image url for one product.
pub fn legend_url(layer_id: &str) -> String {
    format!(
        "{LANDFIRE_WMS_URL}?service=WMS&version={WMS_VERSION}&request=GetLegendGraphic&format=image/png&layer={}",
        encode(layer_id)
    )
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace("%2F", "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_unique_ids_and_at_least_eight_entries() {
        assert!(FUEL_LAYERS.len() >= 8);
        for (i, layer) in FUEL_LAYERS.iter().enumerate() {
            assert!(
                FUEL_LAYERS[i + 1..].iter().all(|other| other.id != layer.id),
                "duplicate id {}",
                layer.id
            );
        }
    }

    #[test]
    fn defaults_to_first_catalog_entry() {
        let overlay = FuelsOverlay::new(0.6);
        assert_eq!(overlay.active().id, "LC24_F13_250");
        assert_eq!(overlay.opacity(), 0.6);
    }

    #[test]
    fn get_map_template_keeps_bbox_placeholder() {
        let overlay = FuelsOverlay::new(0.6);
        assert_eq!(
            get_map_tile_template(&overlay.source()),
            "https://edcintl.cr.usgs.gov/geoserver/landfire/us_250/wms?service=WMS&version=1.3.0&request=GetMap&layers=LC24_F13_250&styles=&format=image/png&transparent=true&crs=EPSG:3857&width=256&height=256&bbox={bbox-epsg-3857}"
        );
    }

    #[test]
    fn select_rejects_unknown_ids_and_keeps_selection() {
        let mut overlay = FuelsOverlay::new(0.6);
        assert_eq!(overlay.select("LC24_CBH_250"), Ok(true));
        assert_eq!(overlay.select("LC24_CBH_250"), Ok(false));
        assert!(overlay.select("NOT_A_LAYER").is_err());
        assert_eq!(overlay.active().id, "LC24_CBH_250");
        assert!(overlay.source().layers == "LC24_CBH_250");
    }

    #[test]
    fn opacity_is_clamped_and_nan_rejected() {
        let mut overlay = FuelsOverlay::new(0.75);
        assert_eq!(overlay.set_opacity(1.4), Ok(1.0));
        assert_eq!(overlay.set_opacity(-0.2), Ok(0.0));
        assert!(overlay.set_opacity(f64::NAN).is_err());
        assert_eq!(overlay.opacity(), 0.0);
    }

    #[test]
    fn legend_url_tracks_active_layer() {
        let mut overlay = FuelsOverlay::new(0.6);
        overlay.select("LC24_EVT_250").expect("known layer");
        assert_eq!(
            overlay.legend_url(),
            "https://edcintl.cr.usgs.gov/geoserver/landfire/us_250/wms?service=WMS&version=1.3.0&request=GetLegendGraphic&format=image/png&layer=LC24_EVT_250"
        );
    }
}
