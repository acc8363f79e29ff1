use ecad_core::Kiid;
use ecad_geom::PolySet;
use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::layer::Layer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoardShapeKind {
    Segment {
        start: IVec2,
        end: IVec2,
    },
    Arc {
        start: IVec2,
        end: IVec2,
        center: IVec2,
        /// Signed sweep in degrees; negative is clockwise.
        sweep_deg: f64,
    },
    Circle {
        center: IVec2,
        radius: i32,
    },
    Polygon {
        poly: PolySet,
        filled: bool,
    },
}

/// A free graphic on the board or inside a footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardShape {
    pub id: Kiid,
    pub kind: BoardShapeKind,
    pub layer: Layer,
    pub width: i32,
}

impl BoardShape {
    pub fn new(kind: BoardShapeKind, layer: Layer, width: i32) -> Self {
        BoardShape { id: Kiid::new(), kind, layer, width }
    }

    pub fn start(&self) -> IVec2 {
        match &self.kind {
            BoardShapeKind::Segment { start, .. } | BoardShapeKind::Arc { start, .. } => *start,
            BoardShapeKind::Circle { center, .. } => *center,
            BoardShapeKind::Polygon { .. } => IVec2::ZERO,
        }
    }

    pub fn end(&self) -> IVec2 {
        match &self.kind {
            BoardShapeKind::Segment { end, .. } | BoardShapeKind::Arc { end, .. } => *end,
            BoardShapeKind::Circle { center, .. } => *center,
            BoardShapeKind::Polygon { .. } => IVec2::ZERO,
        }
    }
}
