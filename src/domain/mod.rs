//! Domain types and models

mod layout;

pub use layout::{
    compute_layout, CompositeError, GarmentPreset, HorizontalAlign, LayoutConfig, LayoutRect,
};
