use std::cell::RefCell;
use std::thread::LocalKey;

use gloo_timers::callback::Timeout;
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlElement;

use ebh_shared::{
    BOUNDARY_PATH, CompositionReport, MapComposer, MapConfig, MapEngine, MountError,
    MountOptions, MountOutcome, StepOutcome, Viewer,
};

use crate::boundary::fetch_boundary;
use crate::controls::{FuelsControlState, FuelsControls};
use crate::leaflet::LeafletEngine;
use crate::maplibre::MapLibreEngine;

const RESIZE_DEBOUNCE_MS: u32 = 150;

/// A live canvas plus the timers tied to its lifetime.
pub struct MountedMap<E> {
    composer: MapComposer<E>,
    resize: Option<Timeout>,
}

pub type ViewSlot<E> = &'static LocalKey<RefCell<Option<MountedMap<E>>>>;

thread_local! {
    pub static MAPLIBRE_VIEW: RefCell<Option<MountedMap<MapLibreEngine>>> = const { RefCell::new(None) };
    pub static LEAFLET_VIEW: RefCell<Option<MountedMap<LeafletEngine>>> = const { RefCell::new(None) };
}

/// Glue between a concrete engine binding and the generic mount flow.
pub trait ViewerEngine: MapEngine + Sized + 'static {
    const VIEWER: Viewer;

    fn slot() -> ViewSlot<Self>;

    fn create(container: &HtmlElement, options: &MountOptions) -> Result<Self, MountError>;

    /// Runs `ready` once the engine accepts layer inserts. Must not call `ready`
    /// before returning.
    fn when_style_ready(&self, ready: impl FnOnce() + 'static);
}

fn viewer_name(viewer: Viewer) -> &'static str {
    match viewer {
        Viewer::MapLibre => "MapLibre",
        Viewer::Leaflet => "Leaflet",
    }
}

/// Runs `f` against the mounted view, if any. `None` once torn down.
fn with_view<E: ViewerEngine, R>(f: impl FnOnce(&mut MountedMap<E>) -> R) -> Option<R> {
    E::slot().with(|slot| {
        let mut slot = slot.borrow_mut();
        let view = slot.as_mut()?;
        if !view.composer.is_live() {
            return None;
        }
        Some(f(view))
    })
}

fn log_report(viewer: Viewer, report: &CompositionReport) {
    let name = viewer_name(viewer);
    for (step, outcome) in report.entries() {
        match outcome {
            StepOutcome::Failed(reason) => {
                web_sys::console::error_1(&format!("[{name}] {step:?} failed: {reason}").into());
            }
            StepOutcome::Skipped(reason) => {
                web_sys::console::info_1(&format!("[{name}] {step:?} skipped: {reason}").into());
            }
            StepOutcome::Added | StepOutcome::AlreadyPresent => {}
        }
    }
}

fn schedule_resize<E: ViewerEngine>() -> Timeout {
    Timeout::new(RESIZE_DEBOUNCE_MS, || {
        with_view::<E, _>(|view| view.composer.resize());
    })
}

fn on_style_ready<E: ViewerEngine>() {
    let report = with_view::<E, _>(|view| {
        let report = view.composer.style_ready();
        if !report.is_empty() {
            view.resize = Some(schedule_resize::<E>());
        }
        report
    });
    if let Some(report) = report {
        log_report(E::VIEWER, &report);
    }
}

fn load_boundary<E: ViewerEngine>() {
    spawn_local(async move {
        match fetch_boundary(BOUNDARY_PATH).await {
            Ok(boundary) => {
                let report = with_view::<E, _>(|view| view.composer.set_boundary(boundary));
                if let Some(report) = report {
                    log_report(E::VIEWER, &report);
                }
            }
            Err(e) => {
                web_sys::console::warn_1(
                    &format!(
                        "[{}] Failed to load {BOUNDARY_PATH}: {e}",
                        viewer_name(E::VIEWER)
                    )
                    .into(),
                );
            }
        }
    });
}

/// Creates the canvas in `container` once per view and starts the boundary fetch.
fn mount_view<E: ViewerEngine>(
    container: &HtmlElement,
    config: &MapConfig,
) -> Result<MountOutcome, MountError> {
    let outcome = E::slot().with(|slot| {
        let mut slot = slot.borrow_mut();
        let view = slot.get_or_insert_with(|| MountedMap {
            composer: MapComposer::new(config, E::VIEWER),
            resize: None,
        });
        let outcome = view
            .composer
            .mount(|options| E::create(container, options))?;
        if outcome == MountOutcome::Created
            && let Some(engine) = view.composer.engine()
        {
            engine.when_style_ready(on_style_ready::<E>);
        }
        Ok(outcome)
    });
    if outcome == Ok(MountOutcome::Created) {
        load_boundary::<E>();
    }
    outcome
}

/// Releases the view: pending resize first, then the canvas.
fn teardown_view<E: ViewerEngine>() {
    let view = E::slot().with(|slot| slot.borrow_mut().take());
    if let Some(mut view) = view {
        drop(view.resize.take());
        view.composer.teardown();
    }
}

/// Feeds control changes to the composer as in-place updates.
fn wire_controls<E: ViewerEngine>(state: FuelsControlState) {
    Effect::new(move || {
        let opacity = state.opacity.get();
        let result = with_view::<E, _>(|view| view.composer.set_opacity(opacity));
        if let Some(Err(e)) = result {
            web_sys::console::warn_1(
                &format!("[{}] opacity update failed: {e}", viewer_name(E::VIEWER)).into(),
            );
        }
    });

    Effect::new(move || {
        let id = state.active.get();
        let result = with_view::<E, _>(|view| {
            view.composer
                .set_active_layer(id)
                .map_err(|e| (e, view.composer.fuels().active().id))
        });
        if let Some(Err((e, current))) = result {
            web_sys::console::warn_1(
                &format!("[{}] layer switch to {id} failed: {e}", viewer_name(E::VIEWER)).into(),
            );
            // The map still shows `current`; keep the select and legend on it.
            state.active.set(current);
        }
    });
}

fn map_panel<E: ViewerEngine>(config: MapConfig, unsupported_text: &'static str) -> impl IntoView {
    let container = NodeRef::<leptos::html::Div>::new();
    let unsupported = RwSignal::new(false);
    let controls = FuelsControlState::new(E::VIEWER);

    Effect::new(move || {
        let Some(element) = container.get() else {
            return;
        };
        match mount_view::<E>(&element, &config) {
            Ok(_) => {}
            Err(e) => {
                if let MountError::Failed(_) = &e {
                    web_sys::console::error_1(
                        &format!("[{}] {e}", viewer_name(E::VIEWER)).into(),
                    );
                }
                teardown_view::<E>();
                unsupported.set(true);
            }
        }
    });
    on_cleanup(teardown_view::<E>);

    wire_controls::<E>(controls);

    view! {
        <div class="map-frame">
            <div class="map-canvas" node_ref=container></div>
            <Show when=move || unsupported.get()>
                <p class="map-unsupported">{unsupported_text}</p>
            </Show>
        </div>
        <FuelsControls state=controls />
    }
}

/// MapLibre GL viewer: vector base style, terrain when keyed, 3D tilt after the fit.
#[component]
pub fn MapLibreMap(config: MapConfig) -> impl IntoView {
    map_panel::<MapLibreEngine>(config, "WebGL not supported.")
}

#[component]
pub fn LeafletMap(config: MapConfig) -> impl IntoView {
    map_panel::<LeafletEngine>(config, "Leaflet could not be started.")
}
