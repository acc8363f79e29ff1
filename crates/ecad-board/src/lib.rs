//! The KiCad board document model.
//!
//! This is the output side of the CADSTAR importer and the input side of
//! DRC-like consumers: footprints with pads, straight and arc tracks, vias,
//! zones with rule-area flags, graphic shapes, text, dimensions, groups and
//! a physical stackup of copper and dielectric sublayers.

mod board;
mod design;
mod dimension;
mod footprint;
mod group;
mod layer;
mod netinfo;
mod pad;
mod shape;
mod stackup;
mod text;
mod track;
mod zone;

pub use board::Board;
pub use design::DesignSettings;
pub use dimension::{Axis, Dimension, DimensionStyle, LeaderDimension, LinearDimension};
pub use footprint::Footprint;
pub use group::BoardGroup;
pub use layer::{CopperKind, Layer, LayerSet};
pub use netinfo::{NetClass, NetCode, NetInfo};
pub use pad::{ChamferPositions, Drill, DrillShape, Pad, PadAttribute, PadShape};
pub use shape::{BoardShape, BoardShapeKind};
pub use stackup::{BoardStackup, DielectricForm, DielectricSublayer, StackupLayer};
pub use text::{BoardText, TextHJustify, TextVJustify};
pub use track::{Track, TrackArc, TrackItem, Via, ViaType};
pub use zone::{PadConnection, Zone, ZoneFillMode};
