//! CADSTAR PCB archive import.
//!
//! Consumes a fully parsed CADSTAR archive (see [`archive`]) and rewrites it
//! into the KiCad board model. The two systems disagree about layer
//! stackups, pad stacks, zone priorities, dimension geometry and polygon
//! fills; the translation preserves electrical equivalence and approximates
//! visual intent, reporting anything it has to drop or approximate through
//! the diagnostic sink.

pub mod archive;
mod error;
mod loader;

pub use error::ImportError;
pub use loader::{CadstarPcbLoader, ImportOptions, InputLayerDesc, LayerMappingHandler};
