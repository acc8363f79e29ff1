use ecad_core::Kiid;
use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::layer::Layer;
use crate::text::BoardText;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Shared text/units presentation of a dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionStyle {
    pub line_thickness: i32,
    pub arrow_length: i32,
    pub units_suffix: bool,
    pub precision: u8,
    pub prefix: String,
    pub suffix: String,
}

impl Default for DimensionStyle {
    fn default() -> Self {
        DimensionStyle {
            line_thickness: 0,
            arrow_length: 0,
            units_suffix: true,
            precision: 2,
            prefix: String::new(),
            suffix: String::new(),
        }
    }
}

/// An aligned or orthogonal linear dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearDimension {
    pub id: Kiid,
    pub layer: Layer,
    pub start: IVec2,
    pub end: IVec2,
    /// Offset of the crossbar from the measured points.
    pub height: i32,
    pub extension_offset: i32,
    pub extension_height: i32,
    /// Set for orthogonal dimensions; `None` means free-angle aligned.
    pub orientation: Option<Axis>,
    pub text: BoardText,
    pub style: DimensionStyle,
}

/// A leader (callout) dimension: an arrow from a point to free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderDimension {
    pub id: Kiid,
    pub layer: Layer,
    pub start: IVec2,
    pub end: IVec2,
    pub text: BoardText,
    pub style: DimensionStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dimension {
    Linear(LinearDimension),
    Leader(LeaderDimension),
}

impl Dimension {
    pub fn id(&self) -> Kiid {
        match self {
            Dimension::Linear(d) => d.id,
            Dimension::Leader(d) => d.id,
        }
    }
}
