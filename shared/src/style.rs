use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::boundary::LngLatBounds;
use crate::fuels::get_map_tile_template;
use crate::viewport::FitOptions;

/// WMS GetMap parameters for a tiled overlay. Engines with native WMS support use
/// these directly; the rest expand them into a tile template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WmsSource {
    pub base_url: String,
    pub layers: String,
    pub version: String,
    pub format: String,
    pub transparent: bool,
    pub tile_size: u32,
    pub attribution: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    Raster {
        tiles: Vec<String>,
        tile_size: u32,
        attribution: String,
    },
    RasterDem {
        url: String,
    },
    Wms(WmsSource),
    GeoJson {
        data: Value,
    },
}

impl SourceSpec {
    /// Source object in MapLibre style-spec form.
    pub fn to_maplibre_json(&self) -> Value {
        match self {
            Self::Raster {
                tiles,
                tile_size,
                attribution,
            } => json!({
                "type": "raster",
                "tiles": tiles,
                "tileSize": tile_size,
                "attribution": attribution,
            }),
            Self::RasterDem { url } => json!({ "type": "raster-dem", "url": url }),
            Self::Wms(wms) => json!({
                "type": "raster",
                "tiles": [get_map_tile_template(wms)],
                "tileSize": wms.tile_size,
                "attribution": wms.attribution,
            }),
            Self::GeoJson { data } => json!({ "type": "geojson", "data": data }),
        }
    }

    /// Tile templates this source would request, for engines that take them.
    pub fn tile_templates(&self) -> Vec<String> {
        match self {
            Self::Raster { tiles, .. } => tiles.clone(),
            Self::Wms(wms) => vec![get_map_tile_template(wms)],
            Self::RasterDem { .. } | Self::GeoJson { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerKind {
    Background,
    Fill,
    Line,
    Symbol,
    Raster,
    Hillshade,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub kind: LayerKind,
    pub source: Option<String>,
    pub paint: Map<String, Value>,
    pub layout: Map<String, Value>,
}

impl LayerSpec {
    pub fn new(id: &str, kind: LayerKind, source: Option<&str>) -> Self {
        Self {
            id: id.to_owned(),
            kind,
            source: source.map(str::to_owned),
            paint: Map::new(),
            layout: Map::new(),
        }
    }

    pub fn paint(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.paint.insert(name.to_owned(), value.into());
        self
    }

    pub fn layout(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.layout.insert(name.to_owned(), value.into());
        self
    }

    pub fn to_maplibre_json(&self) -> Value {
        let mut layer = Map::new();
        layer.insert("id".into(), Value::from(self.id.clone()));
        layer.insert("type".into(), json!(self.kind));
        if let Some(source) = &self.source {
            layer.insert("source".into(), Value::from(source.clone()));
        }
        if !self.paint.is_empty() {
            layer.insert("paint".into(), Value::Object(self.paint.clone()));
        }
        if !self.layout.is_empty() {
            layer.insert("layout".into(), Value::Object(self.layout.clone()));
        }
        Value::Object(layer)
    }
}

/// The operations the composer needs from a rendering engine.
///
/// `add_*` must fail on duplicate ids, the way MapLibre does; the composer is
/// responsible for never issuing duplicates.
pub trait MapEngine {
    fn has_source(&self, id: &str) -> bool;
    fn has_layer(&self, id: &str) -> bool;
    fn add_source(&mut self, id: &str, source: &SourceSpec) -> Result<(), String>;
    /// Inserts below `before`, or on top of everything when `before` is `None`.
    fn add_layer(&mut self, layer: &LayerSpec, before: Option<&str>) -> Result<(), String>;
    /// Re-points an existing source in place (new tiles / WMS params).
    fn update_source(&mut self, id: &str, source: &SourceSpec) -> Result<(), String>;
    fn set_paint_property(&mut self, layer_id: &str, name: &str, value: Value)
    -> Result<(), String>;
    /// Id of the lowest label layer in the base style, if the style has any.
    fn first_symbol_layer(&self) -> Option<String>;
    fn canvas_size(&self) -> (f64, f64);
    fn fit_bounds(&mut self, bounds: &LngLatBounds, options: &FitOptions) -> Result<(), String>;
    /// Releases the canvas. Must tolerate repeated calls.
    fn remove(&mut self);

    fn set_terrain(&mut self, source_id: &str, exaggeration: f64) -> Result<(), String> {
        let _ = (source_id, exaggeration);
        Err("terrain is not supported by this engine".into())
    }

    fn set_orientation(&mut self, pitch: f64, bearing: f64) {
        let _ = (pitch, bearing);
    }

    /// Re-measures the container after layout changes.
    fn resize(&mut self) {}
}

/// In-memory style graph: sources plus a bottom-to-top layer list.
///
/// Used as the reference engine in tests and as the z-order bookkeeper for engines
/// that have no style graph of their own.
#[derive(Debug, Clone, Default)]
pub struct StyleStack {
    sources: Vec<(String, SourceSpec)>,
    layers: Vec<LayerSpec>,
    terrain: Option<(String, f64)>,
    last_fit: Option<(LngLatBounds, FitOptions)>,
    orientation: (f64, f64),
    size: (f64, f64),
    removed: bool,
}

impl StyleStack {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: (width, height),
            ..Self::default()
        }
    }

    /// Preloads base-style layers, bottom first.
    pub fn with_base_layers(mut self, layers: impl IntoIterator<Item = LayerSpec>) -> Self {
        self.layers.extend(layers);
        self
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources
            .iter()
            .find(|(source_id, _)| source_id == id)
            .map(|(_, source)| source)
    }

    /// Stack index, 0 being the bottom.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn terrain(&self) -> Option<(&str, f64)> {
        self.terrain
            .as_ref()
            .map(|(source, exaggeration)| (source.as_str(), *exaggeration))
    }

    pub fn last_fit(&self) -> Option<&(LngLatBounds, FitOptions)> {
        self.last_fit.as_ref()
    }

    pub fn orientation(&self) -> (f64, f64) {
        self.orientation
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn set_canvas_size(&mut self, width: f64, height: f64) {
        self.size = (width, height);
    }

    fn ensure_live(&self) -> Result<(), String> {
        if self.removed {
            return Err("map has been removed".into());
        }
        Ok(())
    }
}

impl MapEngine for StyleStack {
    fn has_source(&self, id: &str) -> bool {
        self.source(id).is_some()
    }

    fn has_layer(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    fn add_source(&mut self, id: &str, source: &SourceSpec) -> Result<(), String> {
        self.ensure_live()?;
        if self.has_source(id) {
            return Err(format!("source \"{id}\" already exists"));
        }
        self.sources.push((id.to_owned(), source.clone()));
        Ok(())
    }

    fn add_layer(&mut self, layer: &LayerSpec, before: Option<&str>) -> Result<(), String> {
        self.ensure_live()?;
        if self.has_layer(&layer.id) {
            return Err(format!("layer \"{}\" already exists", layer.id));
        }
        if let Some(source) = &layer.source
            && !self.has_source(source)
        {
            return Err(format!(
                "layer \"{}\" references missing source \"{source}\"",
                layer.id
            ));
        }
        let index = match before {
            Some(anchor) => self
                .position(anchor)
                .ok_or_else(|| format!("anchor layer \"{anchor}\" does not exist"))?,
            None => self.layers.len(),
        };
        self.layers.insert(index, layer.clone());
        Ok(())
    }

    fn update_source(&mut self, id: &str, source: &SourceSpec) -> Result<(), String> {
        self.ensure_live()?;
        let Some(slot) = self.sources.iter_mut().find(|(source_id, _)| source_id == id) else {
            return Err(format!("source \"{id}\" does not exist"));
        };
        slot.1 = source.clone();
        Ok(())
    }

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: Value,
    ) -> Result<(), String> {
        self.ensure_live()?;
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == layer_id) else {
            return Err(format!("layer \"{layer_id}\" does not exist"));
        };
        layer.paint.insert(name.to_owned(), value);
        Ok(())
    }

    fn first_symbol_layer(&self) -> Option<String> {
        self.layers
            .iter()
            .find(|l| l.kind == LayerKind::Symbol)
            .map(|l| l.id.clone())
    }

    fn canvas_size(&self) -> (f64, f64) {
        self.size
    }

    fn fit_bounds(&mut self, bounds: &LngLatBounds, options: &FitOptions) -> Result<(), String> {
        self.ensure_live()?;
        self.last_fit = Some((*bounds, *options));
        Ok(())
    }

    fn remove(&mut self) {
        self.removed = true;
    }

    fn set_terrain(&mut self, source_id: &str, exaggeration: f64) -> Result<(), String> {
        self.ensure_live()?;
        if !self.has_source(source_id) {
            return Err(format!("terrain source \"{source_id}\" does not exist"));
        }
        self.terrain = Some((source_id.to_owned(), exaggeration));
        Ok(())
    }

    fn set_orientation(&mut self, pitch: f64, bearing: f64) {
        self.orientation = (pitch, bearing);
    }
}
