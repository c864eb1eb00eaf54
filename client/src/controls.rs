use leptos::prelude::*;
use wasm_bindgen::JsCast;

use ebh_shared::fuels::{self, FUEL_LAYERS};
use ebh_shared::{FuelsOverlay, Viewer};

/// UI-side copy of one viewer's overlay settings. The composer owns the applied
/// values; these signals only carry user input to it.
#[derive(Clone, Copy)]
pub struct FuelsControlState {
    pub opacity: RwSignal<f64>,
    pub active: RwSignal<&'static str>,
    pub legend_failed: RwSignal<bool>,
}

impl FuelsControlState {
    pub fn new(viewer: Viewer) -> Self {
        let defaults = FuelsOverlay::new(viewer.default_opacity());
        Self {
            opacity: RwSignal::new(defaults.opacity()),
            active: RwSignal::new(defaults.active().id),
            legend_failed: RwSignal::new(false),
        }
    }
}

fn input_value(e: &leptos::ev::Event) -> Option<String> {
    let target = e.target()?;
    if let Some(input) = target.dyn_ref::<web_sys::HtmlInputElement>() {
        return Some(input.value());
    }
    target
        .dyn_ref::<web_sys::HtmlSelectElement>()
        .map(|select| select.value())
}

/// Opacity slider, layer select and WMS legend for one viewer.
#[component]
pub fn FuelsControls(state: FuelsControlState) -> impl IntoView {
    let FuelsControlState {
        opacity,
        active,
        legend_failed,
    } = state;

    // A new product gets a fresh chance at loading its legend.
    Effect::new(move || {
        active.track();
        legend_failed.set(false);
    });

    let on_opacity = move |e: leptos::ev::Event| {
        if let Some(parsed) = input_value(&e).and_then(|v| v.trim().parse::<f64>().ok()) {
            opacity.set(parsed.clamp(0.0, 1.0));
        }
    };

    let on_layer = move |e: leptos::ev::Event| {
        let Some(id) = input_value(&e) else {
            return;
        };
        if let Some(layer) = fuels::find_layer(&id) {
            active.set(layer.id);
        }
    };

    view! {
        <div class="fuels-controls">
            <label class="fuels-control">
                <span class="fuels-control-label">"Opacity"</span>
                <input
                    type="range"
                    min="0"
                    max="1"
                    step="0.05"
                    prop:value=move || format!("{:.2}", opacity.get())
                    on:input=on_opacity
                />
                <span class="fuels-control-value">
                    {move || format!("{}%", (opacity.get() * 100.0).round() as i64)}
                </span>
            </label>
            <label class="fuels-control">
                <span class="fuels-control-label">"Layer"</span>
                <select prop:value=move || active.get() on:change=on_layer>
                    {FUEL_LAYERS
                        .iter()
                        .map(|layer| {
                            view! {
                                <option value=layer.id selected=move || active.get() == layer.id>
                                    {layer.label}
                                </option>
                            }
                        })
                        .collect_view()}
                </select>
            </label>
            <Show when=move || !legend_failed.get()>
                <img
                    class="fuels-legend"
                    src=move || fuels::legend_url(active.get())
                    alt=move || format!("Legend for {}", active.get())
                    on:error=move |_| legend_failed.set(true)
                />
            </Show>
        </div>
    }
}
