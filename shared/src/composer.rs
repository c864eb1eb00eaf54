use std::fmt;

use serde_json::Value;

use crate::basemap::{BasemapDescriptor, Viewer, select_basemap, terrain_dem_url, wind_tiles_url};
use crate::boundary::Boundary;
use crate::config::MapConfig;
use crate::fuels::FuelsOverlay;
use crate::style::{LayerKind, LayerSpec, MapEngine, SourceSpec};
use crate::viewport::{self, FitOptions, ViewportState};

pub const TERRAIN_SOURCE_ID: &str = "terrain-dem";
pub const HILLSHADE_LAYER_ID: &str = "hillshade";
pub const FUELS_SOURCE_ID: &str = "landfire-wms";
pub const FUELS_LAYER_ID: &str = "landfire-wms";
pub const WIND_SOURCE_ID: &str = "wind-owm";
pub const WIND_LAYER_ID: &str = "wind-owm";
pub const BOUNDARY_SOURCE_ID: &str = "east-bay-hills";
pub const BOUNDARY_LAYER_ID: &str = "east-bay-hills-outline";

const TERRAIN_EXAGGERATION: f64 = 1.2;
const WIND_OPACITY: f64 = 0.6;
const TERRAIN_PITCH: f64 = 55.0;
const TERRAIN_BEARING: f64 = 20.0;

/// Lifecycle of one map canvas. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComposerState {
    Uninitialized,
    CanvasCreated,
    StyleReady,
    LayersComposed,
    ViewportFit,
    Interactive,
    TornDown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountError {
    /// The rendering engine cannot run in this client (e.g. no WebGL).
    Unsupported,
    Failed(String),
}

impl fmt::Display for MountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => f.write_str("map engine is not supported in this browser"),
            Self::Failed(reason) => write!(f, "map creation failed: {reason}"),
        }
    }
}

impl std::error::Error for MountError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Created,
    AlreadyMounted,
}

/// What the engine factory needs to build the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct MountOptions {
    pub basemap: BasemapDescriptor,
    pub viewport: ViewportState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Hillshade,
    Terrain,
    Fuels,
    Wind,
    Boundary,
    ViewportFit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Added,
    AlreadyPresent,
    Skipped(&'static str),
    Failed(String),
}

/// Per-step result of a composition pass, in execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositionReport {
    entries: Vec<(Step, StepOutcome)>,
}

impl CompositionReport {
    fn record(&mut self, step: Step, outcome: StepOutcome) {
        self.entries.push((step, outcome));
    }

    pub fn entries(&self) -> &[(Step, StepOutcome)] {
        &self.entries
    }

    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.entries
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = (Step, &str)> {
        self.entries.iter().filter_map(|(step, outcome)| match outcome {
            StepOutcome::Failed(reason) => Some((*step, reason.as_str())),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything resolved from configuration before the canvas exists.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionPlan {
    pub viewer: Viewer,
    pub basemap: BasemapDescriptor,
    pub terrain_url: Option<String>,
    pub wind_tiles: Option<String>,
}

impl CompositionPlan {
    pub fn new(config: &MapConfig, viewer: Viewer) -> Self {
        let terrain_url = match viewer {
            Viewer::MapLibre => terrain_dem_url(config),
            Viewer::Leaflet => None,
        };
        Self {
            viewer,
            basemap: select_basemap(config, viewer),
            terrain_url,
            wind_tiles: wind_tiles_url(config),
        }
    }
}

/// Brings up one map canvas and owns its layer stack.
///
/// Stacking order, bottom to top: base style, hillshade, fuels raster, wind raster,
/// base-style labels, boundary outline.
pub struct MapComposer<E> {
    plan: CompositionPlan,
    state: ComposerState,
    engine: Option<E>,
    fuels: FuelsOverlay,
    boundary: Option<Boundary>,
    viewport: ViewportState,
    fit_done: bool,
    viewport_measured: bool,
}

impl<E: MapEngine> MapComposer<E> {
    pub fn new(config: &MapConfig, viewer: Viewer) -> Self {
        Self {
            plan: CompositionPlan::new(config, viewer),
            state: ComposerState::Uninitialized,
            engine: None,
            fuels: FuelsOverlay::new(viewer.default_opacity()),
            boundary: None,
            viewport: ViewportState::default(),
            fit_done: false,
            viewport_measured: false,
        }
    }

    pub fn state(&self) -> ComposerState {
        self.state
    }

    pub fn plan(&self) -> &CompositionPlan {
        &self.plan
    }

    pub fn fuels(&self) -> &FuelsOverlay {
        &self.fuels
    }

    pub fn legend_url(&self) -> String {
        self.fuels.legend_url()
    }

    pub fn boundary(&self) -> Option<&Boundary> {
        self.boundary.as_ref()
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    /// False once torn down; async results must be dropped after that.
    pub fn is_live(&self) -> bool {
        self.state != ComposerState::TornDown
    }

    /// Creates the canvas through `create`. A second call while a canvas exists does
    /// not invoke `create`.
    pub fn mount<F>(&mut self, create: F) -> Result<MountOutcome, MountError>
    where
        F: FnOnce(&MountOptions) -> Result<E, MountError>,
    {
        if self.state == ComposerState::TornDown {
            return Err(MountError::Failed("map was already torn down".into()));
        }
        if self.engine.is_some() {
            return Ok(MountOutcome::AlreadyMounted);
        }
        let options = MountOptions {
            basemap: self.plan.basemap.clone(),
            viewport: self.viewport,
        };
        let engine = create(&options)?;
        self.engine = Some(engine);
        self.state = ComposerState::CanvasCreated;
        Ok(MountOutcome::Created)
    }

    /// Engine finished its initial style load. Composes the layer stack once; later
    /// signals are ignored.
    pub fn style_ready(&mut self) -> CompositionReport {
        if self.state != ComposerState::CanvasCreated {
            return CompositionReport::default();
        }
        self.state = ComposerState::StyleReady;
        self.compose()
    }

    /// Inserts every planned layer in stacking order, then runs the one-shot fit.
    /// Outside `StyleReady` this is a no-op.
    pub fn compose(&mut self) -> CompositionReport {
        let mut report = CompositionReport::default();
        if self.state != ComposerState::StyleReady {
            return report;
        }
        let Some(engine) = self.engine.as_mut() else {
            return report;
        };

        let anchor = engine.first_symbol_layer();
        let anchor = anchor.as_deref();

        match &self.plan.terrain_url {
            Some(url) => {
                let hillshade = add_hillshade(engine, url, anchor);
                let hillshade_ok = !matches!(hillshade, StepOutcome::Failed(_));
                report.record(Step::Hillshade, hillshade);
                let terrain = if hillshade_ok {
                    match engine.set_terrain(TERRAIN_SOURCE_ID, TERRAIN_EXAGGERATION) {
                        Ok(()) => StepOutcome::Added,
                        Err(e) => StepOutcome::Failed(e),
                    }
                } else {
                    StepOutcome::Skipped("terrain source unavailable")
                };
                report.record(Step::Terrain, terrain);
            }
            None => report.record(Step::Hillshade, StepOutcome::Skipped("no terrain source")),
        }

        report.record(Step::Fuels, add_fuels(engine, &self.fuels, anchor));

        let wind = match &self.plan.wind_tiles {
            Some(tiles) => add_wind(engine, tiles, anchor),
            None => StepOutcome::Skipped("no weather credential"),
        };
        report.record(Step::Wind, wind);

        let boundary = match &self.boundary {
            Some(boundary) => add_boundary(engine, boundary),
            None => StepOutcome::Skipped("boundary not loaded"),
        };
        report.record(Step::Boundary, boundary);

        self.state = ComposerState::LayersComposed;
        self.fit_viewport(&mut report);
        self.state = ComposerState::Interactive;
        report
    }

    /// Hands over the fetched boundary. Only the first one is kept. When the stack
    /// is already composed the outline goes on top and the pending fit runs.
    pub fn set_boundary(&mut self, boundary: Boundary) -> CompositionReport {
        let mut report = CompositionReport::default();
        if !self.is_live() || self.boundary.is_some() {
            return report;
        }
        self.boundary = Some(boundary);

        if self.state < ComposerState::LayersComposed {
            return report;
        }
        if let (Some(engine), Some(boundary)) = (self.engine.as_mut(), self.boundary.as_ref()) {
            report.record(Step::Boundary, add_boundary(engine, boundary));
        }
        self.fit_viewport(&mut report);
        report
    }

    fn fit_viewport(&mut self, report: &mut CompositionReport) {
        if self.fit_done {
            return;
        }
        let Some(boundary) = &self.boundary else {
            report.record(Step::ViewportFit, StepOutcome::Skipped("boundary not loaded"));
            return;
        };
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        let bounds = boundary.bounds();
        if !bounds.is_valid() {
            report.record(Step::ViewportFit, StepOutcome::Skipped("degenerate bounds"));
            return;
        }
        let options = FitOptions::default();
        if let Err(e) = engine.fit_bounds(&bounds, &options) {
            report.record(Step::ViewportFit, StepOutcome::Failed(e));
            return;
        }
        if self.plan.viewer == Viewer::MapLibre {
            engine.set_orientation(TERRAIN_PITCH, TERRAIN_BEARING);
        }

        self.fit_done = true;
        self.refresh_viewport();
        if self.state == ComposerState::LayersComposed {
            self.state = ComposerState::ViewportFit;
        }
        report.record(Step::ViewportFit, StepOutcome::Added);
    }

    /// Recomputes the modelled camera after a fit. A canvas still too small for the
    /// padding leaves the previous state until the next resize.
    fn refresh_viewport(&mut self) {
        let (Some(engine), Some(boundary)) = (self.engine.as_ref(), self.boundary.as_ref()) else {
            return;
        };
        let Some(mut fitted) = viewport::fit_bounds(
            &boundary.bounds(),
            engine.canvas_size(),
            self.plan.viewer.world_tile_size(),
            &FitOptions::default(),
        ) else {
            return;
        };
        if self.plan.viewer == Viewer::MapLibre {
            fitted.pitch = TERRAIN_PITCH;
            fitted.bearing = TERRAIN_BEARING;
        }
        self.viewport = fitted;
        self.viewport_measured = true;
    }

    /// The container changed size. Redraws the canvas and, when the fit ran before
    /// the container was laid out, brings the modelled camera up to date.
    pub fn resize(&mut self) {
        if !self.is_live() {
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        engine.resize();
        if self.fit_done && !self.viewport_measured {
            self.refresh_viewport();
        }
    }

    /// Updates the fuels raster opacity in place. Before composition the value is
    /// only stored and used when the layer is created.
    pub fn set_opacity(&mut self, opacity: f64) -> Result<f64, String> {
        let applied = self.fuels.set_opacity(opacity)?;
        if let Some(engine) = self.engine.as_mut()
            && self.state != ComposerState::TornDown
            && engine.has_layer(FUELS_LAYER_ID)
        {
            engine.set_paint_property(FUELS_LAYER_ID, "raster-opacity", Value::from(applied))?;
        }
        Ok(applied)
    }

    /// Points the existing fuels source at another LANDFIRE product. The selection
    /// only changes once the engine accepted the new tiles.
    pub fn set_active_layer(&mut self, id: &str) -> Result<(), String> {
        let mut next = self.fuels;
        if !next.select(id)? {
            return Ok(());
        }
        if let Some(engine) = self.engine.as_mut()
            && self.state != ComposerState::TornDown
            && engine.has_source(FUELS_SOURCE_ID)
        {
            engine.update_source(FUELS_SOURCE_ID, &SourceSpec::Wms(next.source()))?;
        }
        self.fuels = next;
        Ok(())
    }

    /// Releases the canvas. Safe in any state and on repeated calls.
    pub fn teardown(&mut self) {
        if self.state == ComposerState::TornDown {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.remove();
        }
        self.state = ComposerState::TornDown;
    }
}

fn ensure_source<E: MapEngine>(engine: &mut E, id: &str, source: &SourceSpec) -> Result<(), String> {
    if engine.has_source(id) {
        return Ok(());
    }
    engine.add_source(id, source)
}

fn ensure_layer<E: MapEngine>(
    engine: &mut E,
    layer: &LayerSpec,
    before: Option<&str>,
) -> StepOutcome {
    if engine.has_layer(&layer.id) {
        return StepOutcome::AlreadyPresent;
    }
    match engine.add_layer(layer, before) {
        Ok(()) => StepOutcome::Added,
        Err(e) => StepOutcome::Failed(e),
    }
}

fn add_hillshade<E: MapEngine>(engine: &mut E, url: &str, anchor: Option<&str>) -> StepOutcome {
    let source = SourceSpec::RasterDem {
        url: url.to_owned(),
    };
    if let Err(e) = ensure_source(engine, TERRAIN_SOURCE_ID, &source) {
        return StepOutcome::Failed(e);
    }
    let layer = LayerSpec::new(HILLSHADE_LAYER_ID, LayerKind::Hillshade, Some(TERRAIN_SOURCE_ID))
        .paint("hillshade-exaggeration", 0.7)
        .paint("hillshade-highlight-color", "#ffffff")
        .paint("hillshade-shadow-color", "#000000")
        .paint("hillshade-accent-color", "#888888");
    ensure_layer(engine, &layer, anchor)
}

fn add_fuels<E: MapEngine>(
    engine: &mut E,
    fuels: &FuelsOverlay,
    anchor: Option<&str>,
) -> StepOutcome {
    if let Err(e) = ensure_source(engine, FUELS_SOURCE_ID, &SourceSpec::Wms(fuels.source())) {
        return StepOutcome::Failed(e);
    }
    let layer = LayerSpec::new(FUELS_LAYER_ID, LayerKind::Raster, Some(FUELS_SOURCE_ID))
        .paint("raster-opacity", fuels.opacity())
        .paint("raster-resampling", "linear");
    ensure_layer(engine, &layer, anchor)
}

fn add_wind<E: MapEngine>(engine: &mut E, tiles: &str, anchor: Option<&str>) -> StepOutcome {
    let source = SourceSpec::Raster {
        tiles: vec![tiles.to_owned()],
        tile_size: 256,
        attribution: "OpenWeather".to_owned(),
    };
    if let Err(e) = ensure_source(engine, WIND_SOURCE_ID, &source) {
        return StepOutcome::Failed(e);
    }
    let layer = LayerSpec::new(WIND_LAYER_ID, LayerKind::Raster, Some(WIND_SOURCE_ID))
        .paint("raster-opacity", WIND_OPACITY);
    ensure_layer(engine, &layer, anchor)
}

fn add_boundary<E: MapEngine>(engine: &mut E, boundary: &Boundary) -> StepOutcome {
    let source = SourceSpec::GeoJson {
        data: boundary.document().clone(),
    };
    if let Err(e) = ensure_source(engine, BOUNDARY_SOURCE_ID, &source) {
        return StepOutcome::Failed(e);
    }
    let layer = LayerSpec::new(BOUNDARY_LAYER_ID, LayerKind::Line, Some(BOUNDARY_SOURCE_ID))
        .paint("line-color", "#000")
        .paint("line-width", 6)
        .paint("line-opacity", 0.95)
        .layout("line-join", "round")
        .layout("line-cap", "round");
    // No anchor: the outline always sits above labels too.
    ensure_layer(engine, &layer, None)
}
