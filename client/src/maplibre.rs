use js_sys::{Array, Function, Reflect};
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlCanvasElement, HtmlElement};

use ebh_shared::style::{LayerSpec, MapEngine, SourceSpec};
use ebh_shared::{FitOptions, LngLatBounds, MountError, MountOptions, Viewer};

use crate::map_view::{MAPLIBRE_VIEW, ViewSlot, ViewerEngine};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = maplibregl, js_name = Map)]
    #[derive(Debug, Clone)]
    type MaplibreMap;

    #[wasm_bindgen(constructor, catch, js_namespace = maplibregl, js_class = "Map")]
    fn new(options: &JsValue) -> Result<MaplibreMap, JsValue>;

    #[wasm_bindgen(method, js_name = getSource)]
    fn get_source(this: &MaplibreMap, id: &str) -> JsValue;

    #[wasm_bindgen(method, js_name = getLayer)]
    fn get_layer(this: &MaplibreMap, id: &str) -> JsValue;

    #[wasm_bindgen(method, catch, js_name = addSource)]
    fn add_source(this: &MaplibreMap, id: &str, source: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = addLayer)]
    fn add_layer(
        this: &MaplibreMap,
        layer: &JsValue,
        before_id: Option<String>,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = setPaintProperty)]
    fn set_paint_property(
        this: &MaplibreMap,
        layer_id: &str,
        name: &str,
        value: &JsValue,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = getStyle)]
    fn get_style(this: &MaplibreMap) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch, js_name = setTerrain)]
    fn set_terrain(this: &MaplibreMap, terrain: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = fitBounds)]
    fn fit_bounds(this: &MaplibreMap, bounds: &JsValue, options: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = setPitch)]
    fn set_pitch(this: &MaplibreMap, pitch: f64);

    #[wasm_bindgen(method, js_name = setBearing)]
    fn set_bearing(this: &MaplibreMap, bearing: f64);

    #[wasm_bindgen(method, js_name = getContainer)]
    fn get_container(this: &MaplibreMap) -> HtmlElement;

    #[wasm_bindgen(method)]
    fn resize(this: &MaplibreMap);

    #[wasm_bindgen(method)]
    fn remove(this: &MaplibreMap);

    #[wasm_bindgen(method)]
    fn once(this: &MaplibreMap, event: &str, handler: &Function);

    #[wasm_bindgen(method)]
    fn on(this: &MaplibreMap, event: &str, handler: &Function);

    #[wasm_bindgen(method, js_name = addControl)]
    fn add_control(this: &MaplibreMap, control: &NavigationControl, position: &str);

    #[wasm_bindgen(js_namespace = maplibregl, js_name = NavigationControl)]
    type NavigationControl;

    #[wasm_bindgen(constructor, js_namespace = maplibregl, js_class = "NavigationControl")]
    fn new() -> NavigationControl;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MapInit<'a> {
    style: &'a str,
    center: [f64; 2],
    zoom: f64,
    hash: bool,
    fail_if_major_performance_caveat: bool,
}

#[derive(Deserialize)]
struct StyleLayers {
    #[serde(default)]
    layers: Vec<StyleLayerRef>,
}

#[derive(Deserialize)]
struct StyleLayerRef {
    id: String,
    #[serde(rename = "type")]
    kind: String,
}

pub struct MapLibreEngine {
    map: MaplibreMap,
    removed: bool,
}

/// `maplibregl.supported()` where the installed build still ships it, otherwise a
/// throwaway canvas asked for a WebGL context. A missing script counts as unsupported.
fn engine_supported() -> Result<bool, MountError> {
    let Some(window) = web_sys::window() else {
        return Err(MountError::Failed("no window".into()));
    };
    let maplibre = Reflect::get(window.as_ref(), &JsValue::from_str("maplibregl"))
        .ok()
        .filter(|value| value.is_object())
        .ok_or(MountError::Unsupported)?;
    if let Some(check) = Reflect::get(&maplibre, &JsValue::from_str("supported"))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
    {
        return Ok(check
            .call0(&maplibre)
            .ok()
            .and_then(|value| value.as_bool())
            .unwrap_or(true));
    }

    let Some(canvas) = window
        .document()
        .and_then(|document| document.create_element("canvas").ok())
        .and_then(|element| element.dyn_into::<HtmlCanvasElement>().ok())
    else {
        return Ok(false);
    };
    Ok(["webgl2", "webgl"]
        .iter()
        .any(|kind| matches!(canvas.get_context(kind), Ok(Some(_)))))
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

fn enable_rotation(map: &MaplibreMap) {
    let call = |handler: &str, method: &str, arg: Option<bool>| {
        let Ok(target) = Reflect::get(map.as_ref(), &JsValue::from_str(handler)) else {
            return;
        };
        let Some(function) = Reflect::get(&target, &JsValue::from_str(method))
            .ok()
            .and_then(|value| value.dyn_into::<Function>().ok())
        else {
            return;
        };
        let _ = match arg {
            Some(arg) => function.call1(&target, &JsValue::from_bool(arg)),
            None => function.call0(&target),
        };
    };
    call("dragRotate", "enable", None);
    call("touchZoomRotate", "enableRotation", Some(true));
}

impl MapEngine for MapLibreEngine {
    fn has_source(&self, id: &str) -> bool {
        !self.map.get_source(id).is_undefined()
    }

    fn has_layer(&self, id: &str) -> bool {
        !self.map.get_layer(id).is_undefined()
    }

    fn add_source(&mut self, id: &str, source: &SourceSpec) -> Result<(), String> {
        let source = to_js(&source.to_maplibre_json())?;
        self.map.add_source(id, &source).map_err(js_error)
    }

    fn add_layer(&mut self, layer: &LayerSpec, before: Option<&str>) -> Result<(), String> {
        let spec = to_js(&layer.to_maplibre_json())?;
        self.map
            .add_layer(&spec, before.map(str::to_owned))
            .map_err(js_error)
    }

    fn update_source(&mut self, id: &str, source: &SourceSpec) -> Result<(), String> {
        let existing = self.map.get_source(id);
        if existing.is_undefined() {
            return Err(format!("source \"{id}\" does not exist"));
        }
        let set_tiles = Reflect::get(&existing, &JsValue::from_str("setTiles"))
            .ok()
            .and_then(|value| value.dyn_into::<Function>().ok())
            .ok_or_else(|| format!("source \"{id}\" cannot change tiles"))?;
        let tiles: Array = source
            .tile_templates()
            .iter()
            .map(|tile| JsValue::from_str(tile))
            .collect();
        set_tiles.call1(&existing, &tiles).map(|_| ()).map_err(js_error)
    }

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: serde_json::Value,
    ) -> Result<(), String> {
        let value = to_js(&value)?;
        self.map
            .set_paint_property(layer_id, name, &value)
            .map_err(js_error)
    }

    fn first_symbol_layer(&self) -> Option<String> {
        let style = self.map.get_style().ok()?;
        let style: StyleLayers = serde_wasm_bindgen::from_value(style).ok()?;
        style
            .layers
            .into_iter()
            .find(|layer| layer.kind == "symbol")
            .map(|layer| layer.id)
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
            [bounds.min_lng, bounds.min_lat],
            [bounds.max_lng, bounds.max_lat],
        ])?;
        let options = to_js(&serde_json::json!({
            "padding": options.padding,
            "duration": options.duration_ms,
            "maxZoom": options.max_zoom,
        }))?;
        self.map.fit_bounds(&corners, &options).map_err(js_error)
    }

    fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        self.map.remove();
    }

    fn set_terrain(&mut self, source_id: &str, exaggeration: f64) -> Result<(), String> {
        let terrain = to_js(&serde_json::json!({
            "source": source_id,
            "exaggeration": exaggeration,
        }))?;
        self.map.set_terrain(&terrain).map_err(js_error)
    }

    fn set_orientation(&mut self, pitch: f64, bearing: f64) {
        enable_rotation(&self.map);
        self.map.set_pitch(pitch);
        self.map.set_bearing(bearing);
    }

    fn resize(&mut self) {
        if !self.removed {
            self.map.resize();
        }
    }
}

impl ViewerEngine for MapLibreEngine {
    const VIEWER: Viewer = Viewer::MapLibre;

    fn slot() -> ViewSlot<Self> {
        &MAPLIBRE_VIEW
    }

    fn create(container: &HtmlElement, options: &MountOptions) -> Result<Self, MountError> {
        if !engine_supported()? {
            return Err(MountError::Unsupported);
        }
        let init = MapInit {
            style: &options.basemap.url,
            center: [options.viewport.center.0, options.viewport.center.1],
            zoom: options.viewport.zoom,
            hash: false,
            fail_if_major_performance_caveat: false,
        };
        let init = to_js(&init).map_err(MountError::Failed)?;
        Reflect::set(&init, &JsValue::from_str("container"), container)
            .map_err(|e| MountError::Failed(js_error(e)))?;
        let map = MaplibreMap::new(&init).map_err(|e| MountError::Failed(js_error(e)))?;

        map.add_control(&NavigationControl::new(), "top-right");
        let on_error = Closure::<dyn Fn(JsValue)>::new(|event: JsValue| {
            let detail = Reflect::get(&event, &JsValue::from_str("error"))
                .ok()
                .filter(|error| !error.is_undefined())
                .unwrap_or(event);
            web_sys::console::error_1(&format!("[MapLibre error] {}", js_error(detail)).into());
        });
        map.on("error", on_error.as_ref().unchecked_ref());
        on_error.forget();

        Ok(Self {
            map,
            removed: false,
        })
    }

    fn when_style_ready(&self, ready: impl FnOnce() + 'static) {
        // "load" fires before the style graph accepts id-anchored inserts; wait for
        // the first idle after it.
        let map = self.map.clone();
        let on_load = Closure::once_into_js(move || {
            let on_idle = Closure::once_into_js(ready);
            map.once("idle", on_idle.unchecked_ref());
        });
        self.map.once("load", on_load.unchecked_ref());
    }
}
