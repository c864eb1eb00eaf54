use std::collections::HashMap;

use js_sys::{Function, Reflect};
use serde::Serialize;
use serde_json::{Value, json};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

use ebh_shared::composer::{BOUNDARY_LAYER_ID, WIND_LAYER_ID};
use ebh_shared::style::{LayerKind, LayerSpec, MapEngine, SourceSpec, StyleStack};
use ebh_shared::{BasemapProvider, FitOptions, LngLatBounds, MountError, MountOptions, Viewer};

use crate::map_view::{LEAFLET_VIEW, ViewSlot, ViewerEngine};

const BASEMAP_ID: &str = "basemap";

#[wasm_bindgen]
extern "C" {
    type LeafletMap;

    #[wasm_bindgen(catch, js_namespace = L, js_name = map)]
    fn leaflet_map(container: &HtmlElement, options: &JsValue) -> Result<LeafletMap, JsValue>;

    #[wasm_bindgen(method, catch, js_name = fitBounds)]
    fn fit_bounds(this: &LeafletMap, bounds: &JsValue, options: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = whenReady)]
    fn when_ready(this: &LeafletMap, callback: &Function);

    #[wasm_bindgen(method, js_name = invalidateSize)]
    fn invalidate_size(this: &LeafletMap);

    #[wasm_bindgen(method, js_name = getContainer)]
    fn get_container(this: &LeafletMap) -> HtmlElement;

    #[wasm_bindgen(method)]
    fn remove(this: &LeafletMap);

    #[derive(Clone)]
    type Layer;

    #[wasm_bindgen(js_namespace = L, js_name = tileLayer)]
    fn tile_layer(url: &str, options: &JsValue) -> Layer;

    #[wasm_bindgen(js_namespace = ["L", "tileLayer"], js_name = wms)]
    fn tile_layer_wms(base_url: &str, options: &JsValue) -> Layer;

    #[wasm_bindgen(js_namespace = L, js_name = geoJSON)]
    fn geo_json(data: &JsValue, options: &JsValue) -> Layer;

    #[wasm_bindgen(method, js_name = addTo)]
    fn add_to(this: &Layer, map: &LeafletMap) -> Layer;

    #[wasm_bindgen(method, js_name = setOpacity)]
    fn set_opacity(this: &Layer, opacity: f64);

    #[wasm_bindgen(method, js_name = setParams)]
    fn set_params(this: &Layer, params: &JsValue);

    #[wasm_bindgen(method, js_name = setZIndex)]
    fn set_z_index(this: &Layer, z_index: u32);

    #[wasm_bindgen(method, js_name = bringToFront)]
    fn bring_to_front(this: &Layer);

    #[wasm_bindgen(method, js_name = setStyle)]
    fn set_style(this: &Layer, style: &JsValue);

    type Control;

    #[wasm_bindgen(js_namespace = ["L", "control"], js_name = scale)]
    fn control_scale(options: &JsValue) -> Control;

    #[wasm_bindgen(js_namespace = ["L", "control"], js_name = layers)]
    fn control_layers(base_layers: &JsValue, overlays: &JsValue, options: &JsValue) -> Control;

    #[wasm_bindgen(method, js_name = addTo)]
    fn add_control_to(this: &Control, map: &LeafletMap) -> Control;

    #[wasm_bindgen(method, js_name = addBaseLayer)]
    fn add_base_layer(this: &Control, layer: &Layer, name: &str);

    #[wasm_bindgen(method, js_name = addOverlay)]
    fn add_overlay(this: &Control, layer: &Layer, name: &str);

    #[wasm_bindgen(method, js_name = removeLayer)]
    fn remove_layer(this: &Control, layer: &Layer);
}

#[derive(Serialize)]
struct MapInit {
    center: [f64; 2],
    zoom: f64,
}

/// Leaflet has no style graph, so a `StyleStack` keeps ids and z-order while the
/// real layers live in `layers`. Raster z-index equals the stack position.
pub struct LeafletEngine {
    map: LeafletMap,
    stack: StyleStack,
    layers: HashMap<String, Layer>,
    control: Control,
    removed: bool,
}

fn to_js(value: &impl Serialize) -> Result<JsValue, String> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| format!("serialize error: {e}"))
}

fn js_error(err: JsValue) -> String {
    err.dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| err.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}

fn leaflet_loaded() -> bool {
    web_sys::window()
        .and_then(|window| Reflect::get(window.as_ref(), &JsValue::from_str("L")).ok())
        .is_some_and(|value| value.is_object())
}

fn paint_number(layer: &LayerSpec, name: &str) -> Option<f64> {
    layer.paint.get(name).and_then(Value::as_f64)
}

/// Leaflet path style from MapLibre-style line paint.
fn path_style(layer: &LayerSpec) -> Value {
    let mut style = json!({ "fill": false });
    if let Some(color) = layer.paint.get("line-color") {
        style["color"] = color.clone();
    }
    if let Some(width) = layer.paint.get("line-width") {
        style["weight"] = width.clone();
    }
    if let Some(opacity) = layer.paint.get("line-opacity") {
        style["opacity"] = opacity.clone();
    }
    if let Some(join) = layer.layout.get("line-join") {
        style["lineJoin"] = join.clone();
    }
    if let Some(cap) = layer.layout.get("line-cap") {
        style["lineCap"] = cap.clone();
    }
    style
}

fn overlay_label(layer: &LayerSpec, source: &SourceSpec) -> Option<String> {
    match source {
        SourceSpec::Wms(wms) => Some(format!("LANDFIRE — {}", wms.layers)),
        _ if layer.id == WIND_LAYER_ID => Some("Wind speed (OpenWeather)".to_owned()),
        _ if layer.id == BOUNDARY_LAYER_ID => Some("East Bay Hills boundary".to_owned()),
        _ => None,
    }
}

fn build_layer(layer: &LayerSpec, source: &SourceSpec) -> Result<Layer, String> {
    let opacity = paint_number(layer, "raster-opacity").unwrap_or(1.0);
    match (layer.kind, source) {
        (LayerKind::Raster, SourceSpec::Wms(wms)) => {
            let options = to_js(&json!({
                "layers": wms.layers,
                "styles": "",
                "format": wms.format,
                "transparent": wms.transparent,
                "version": wms.version,
                "tileSize": wms.tile_size,
                "attribution": wms.attribution,
                "opacity": opacity,
            }))?;
            Ok(tile_layer_wms(&wms.base_url, &options))
        }
        (
            LayerKind::Raster,
            SourceSpec::Raster {
                tiles,
                tile_size,
                attribution,
            },
        ) => {
            let template = tiles
                .first()
                .ok_or_else(|| format!("source for \"{}\" has no tiles", layer.id))?;
            let options = to_js(&json!({
                "tileSize": tile_size,
                "attribution": attribution,
                "opacity": opacity,
            }))?;
            Ok(tile_layer(template, &options))
        }
        (LayerKind::Line | LayerKind::Fill, SourceSpec::GeoJson { data }) => {
            let data = to_js(data)?;
            let options = to_js(&json!({ "style": path_style(layer) }))?;
            Ok(geo_json(&data, &options))
        }
        (kind, _) => Err(format!(
            "layer \"{}\" of kind {kind:?} is not supported by Leaflet",
            layer.id
        )),
    }
}

impl LeafletEngine {
    /// Raster panes stack by z-index; vector paths live in the overlay pane above
    /// them and only need ordering among themselves.
    fn restack(&self) {
        for (position, id) in self.stack.layer_ids().into_iter().enumerate() {
            let (Some(layer), Some(spec)) = (self.layers.get(id), self.stack.layer(id)) else {
                continue;
            };
            match spec.kind {
                LayerKind::Raster => layer.set_z_index(position as u32 + 1),
                _ => layer.bring_to_front(),
            }
        }
    }

    fn add_basemap(&mut self, options: &MountOptions) -> Result<(), String> {
        let source = SourceSpec::Raster {
            tiles: vec![options.basemap.url.clone()],
            tile_size: 256,
            attribution: options.basemap.attribution.to_owned(),
        };
        self.add_source(BASEMAP_ID, &source)?;
        let layer = LayerSpec::new(BASEMAP_ID, LayerKind::Raster, Some(BASEMAP_ID));
        self.add_layer(&layer, None)?;
        if let Some(basemap) = self.layers.get(BASEMAP_ID) {
            let name = match options.basemap.provider {
                BasemapProvider::MapTiler => "MapTiler Streets",
                BasemapProvider::Public => "OpenStreetMap",
            };
            self.control.add_base_layer(basemap, name);
        }
        Ok(())
    }
}

impl MapEngine for LeafletEngine {
    fn has_source(&self, id: &str) -> bool {
        self.stack.has_source(id)
    }

    fn has_layer(&self, id: &str) -> bool {
        self.stack.has_layer(id)
    }

    fn add_source(&mut self, id: &str, source: &SourceSpec) -> Result<(), String> {
        self.stack.add_source(id, source)
    }

    fn add_layer(&mut self, layer: &LayerSpec, before: Option<&str>) -> Result<(), String> {
        let source_id = layer
            .source
            .as_deref()
            .ok_or_else(|| format!("layer \"{}\" has no source", layer.id))?;
        let source = self
            .stack
            .source(source_id)
            .cloned()
            .ok_or_else(|| format!("layer \"{}\" references missing source \"{source_id}\"", layer.id))?;
        let leaflet_layer = build_layer(layer, &source)?;
        self.stack.add_layer(layer, before)?;

        leaflet_layer.add_to(&self.map);
        if let Some(label) = overlay_label(layer, &source) {
            self.control.add_overlay(&leaflet_layer, &label);
        }
        self.layers.insert(layer.id.clone(), leaflet_layer);
        self.restack();
        Ok(())
    }

    fn update_source(&mut self, id: &str, source: &SourceSpec) -> Result<(), String> {
        let SourceSpec::Wms(wms) = source else {
            return Err(format!("source \"{id}\" cannot be updated in place"));
        };
        self.stack.update_source(id, source)?;
        let bound: Vec<LayerSpec> = self
            .stack
            .layer_ids()
            .into_iter()
            .filter_map(|layer_id| self.stack.layer(layer_id))
            .filter(|layer| layer.source.as_deref() == Some(id))
            .cloned()
            .collect();
        for spec in bound {
            let Some(layer) = self.layers.get(&spec.id) else {
                continue;
            };
            layer.set_params(&to_js(&json!({ "layers": wms.layers }))?);
            // The control keeps its own label; re-register under the new product.
            self.control.remove_layer(layer);
            if let Some(label) = overlay_label(&spec, source) {
                self.control.add_overlay(layer, &label);
            }
        }
        Ok(())
    }

    fn set_paint_property(&mut self, layer_id: &str, name: &str, value: Value) -> Result<(), String> {
        self.stack.set_paint_property(layer_id, name, value.clone())?;
        let Some(layer) = self.layers.get(layer_id) else {
            return Err(format!("layer \"{layer_id}\" does not exist"));
        };
        match name {
            "raster-opacity" => {
                let opacity = value
                    .as_f64()
                    .ok_or_else(|| format!("{name} must be a number"))?;
                layer.set_opacity(opacity);
            }
            "line-color" | "line-width" | "line-opacity" => {
                let spec = self
                    .stack
                    .layer(layer_id)
                    .ok_or_else(|| format!("layer \"{layer_id}\" does not exist"))?;
                layer.set_style(&to_js(&path_style(spec))?);
            }
            _ => return Err(format!("paint property {name} is not supported by Leaflet")),
        }
        Ok(())
    }

    fn first_symbol_layer(&self) -> Option<String> {
        None
    }

    fn canvas_size(&self) -> (f64, f64) {
        let container = self.map.get_container();
        (
            container.client_width() as f64,
            container.client_height() as f64,
        )
    }

    fn fit_bounds(&mut self, bounds: &LngLatBounds, options: &FitOptions) -> Result<(), String> {
        let corners = to_js(&[
            [bounds.min_lat, bounds.min_lng],
            [bounds.max_lat, bounds.max_lng],
        ])?;
        let options = to_js(&json!({
            "padding": [options.padding, options.padding],
            "animate": true,
            "duration": f64::from(options.duration_ms) / 1000.0,
            "maxZoom": options.max_zoom,
        }))?;
        self.map.fit_bounds(&corners, &options).map_err(js_error)
    }

    fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        self.layers.clear();
        self.stack.remove();
        self.map.remove();
    }

    fn resize(&mut self) {
        if !self.removed {
            self.map.invalidate_size();
        }
    }
}

impl ViewerEngine for LeafletEngine {
    const VIEWER: Viewer = Viewer::Leaflet;

    fn slot() -> ViewSlot<Self> {
        &LEAFLET_VIEW
    }

    fn create(container: &HtmlElement, options: &MountOptions) -> Result<Self, MountError> {
        if !leaflet_loaded() {
            return Err(MountError::Unsupported);
        }
        let (lng, lat) = options.viewport.center;
        let init = to_js(&MapInit {
            center: [lat, lng],
            zoom: options.viewport.zoom,
        })
        .map_err(MountError::Failed)?;
        let map = leaflet_map(container, &init).map_err(|e| MountError::Failed(js_error(e)))?;

        let no_options = JsValue::from(js_sys::Object::new());
        let scale_options =
            to_js(&json!({ "position": "bottomleft" })).map_err(MountError::Failed)?;
        control_scale(&scale_options).add_control_to(&map);
        let control = control_layers(&no_options, &no_options, &no_options).add_control_to(&map);

        let (width, height) = (
            container.client_width() as f64,
            container.client_height() as f64,
        );
        let mut engine = Self {
            map,
            stack: StyleStack::new(width, height),
            layers: HashMap::new(),
            control,
            removed: false,
        };
        engine.add_basemap(options).map_err(MountError::Failed)?;
        Ok(engine)
    }

    fn when_style_ready(&self, ready: impl FnOnce() + 'static) {
        // whenReady runs the callback synchronously when the view is already set;
        // hop to a microtask so it never re-enters the caller's view slot.
        let callback = Closure::once_into_js(move || {
            wasm_bindgen_futures::spawn_local(async move { ready() });
        });
        self.map.when_ready(callback.unchecked_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebh_shared::FuelsOverlay;

    #[test]
    fn outline_paint_maps_to_path_style() {
        let layer = LayerSpec::new(BOUNDARY_LAYER_ID, LayerKind::Line, Some("east-bay-hills"))
            .paint("line-color", "#000")
            .paint("line-width", 6)
            .paint("line-opacity", 0.95)
            .layout("line-join", "round")
            .layout("line-cap", "round");
        assert_eq!(
            path_style(&layer),
            json!({
                "fill": false,
                "color": "#000",
                "weight": 6,
                "opacity": 0.95,
                "lineJoin": "round",
                "lineCap": "round",
            })
        );
    }

    #[test]
    fn fuels_overlay_is_labelled_by_product() {
        let mut fuels = FuelsOverlay::new(0.75);
        let layer = LayerSpec::new("landfire-wms", LayerKind::Raster, Some("landfire-wms"));
        assert_eq!(
            overlay_label(&layer, &SourceSpec::Wms(fuels.source())).as_deref(),
            Some("LANDFIRE — LC24_F13_250")
        );
        fuels.select("LC24_CC_250").expect("known layer");
        assert_eq!(
            overlay_label(&layer, &SourceSpec::Wms(fuels.source())).as_deref(),
            Some("LANDFIRE — LC24_CC_250")
        );
    }

    #[test]
    fn basemap_gets_no_overlay_entry() {
        let layer = LayerSpec::new(BASEMAP_ID, LayerKind::Raster, Some(BASEMAP_ID));
        let source = SourceSpec::Raster {
            tiles: vec!["https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".into()],
            tile_size: 256,
            attribution: "OSM".into(),
        };
        assert_eq!(overlay_label(&layer, &source), None);
    }
}
