pub mod basemap;
pub mod boundary;
pub mod composer;
pub mod config;
pub mod fuels;
pub mod style;
pub mod viewport;

pub use basemap::{BasemapDescriptor, BasemapKind, BasemapProvider, Viewer, select_basemap};
pub use boundary::{BOUNDARY_PATH, Boundary, LngLatBounds};
pub use composer::{
    ComposerState, CompositionReport, MapComposer, MountError, MountOptions, MountOutcome, Step,
    StepOutcome,
};
pub use config::MapConfig;
pub use fuels::{FUEL_LAYERS, FuelLayer, FuelsOverlay};
pub use style::{LayerKind, LayerSpec, MapEngine, SourceSpec, StyleStack, WmsSource};
pub use viewport::{FitOptions, ViewportState};
