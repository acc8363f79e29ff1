use ecad_core::Kiid;
use ecad_geom::PolySet;
use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::layer::LayerSet;
use crate::netinfo::NetCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadAttribute {
    Smd,
    /// Plated through hole.
    Pth,
    /// Non-plated through hole.
    Npth,
}

/// Which corners of a chamfered rectangle are cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChamferPositions(pub u8);

impl ChamferPositions {
    pub const TOP_LEFT: ChamferPositions = ChamferPositions(0b0001);
    pub const TOP_RIGHT: ChamferPositions = ChamferPositions(0b0010);
    pub const BOTTOM_LEFT: ChamferPositions = ChamferPositions(0b0100);
    pub const BOTTOM_RIGHT: ChamferPositions = ChamferPositions(0b1000);
    pub const ALL: ChamferPositions = ChamferPositions(0b1111);
    pub const LEFT: ChamferPositions = ChamferPositions(0b0101);

    pub fn union(self, other: ChamferPositions) -> ChamferPositions {
        ChamferPositions(self.0 | other.0)
    }

    pub fn contains(self, other: ChamferPositions) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PadShape {
    Circle,
    Oval,
    Rect,
    RoundRect {
        /// Corner radius in internal units.
        radius: i32,
        /// Radius as a ratio of the smaller pad dimension, when specified
        /// that way instead.
        ratio: Option<f64>,
    },
    ChamferedRect {
        positions: ChamferPositions,
        chamfer_ratio: f64,
        round_ratio: f64,
    },
    /// Free-form pad: an anchor shape plus filled polygon primitives.
    Custom {
        anchor: Box<PadShape>,
        primitives: PolySet,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrillShape {
    Circle,
    Oblong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drill {
    pub shape: DrillShape,
    pub size: IVec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pad {
    pub id: Kiid,
    pub name: String,
    pub attribute: PadAttribute,
    pub layers: LayerSet,
    pub shape: PadShape,
    pub size: IVec2,
    /// Offset of the pad graphic relative to its origin (the drill center).
    pub offset: IVec2,
    /// Position relative to the parent footprint's origin.
    pub position: IVec2,
    pub orientation_deg: f64,
    pub drill: Option<Drill>,
    pub thermal_gap: Option<i32>,
    pub thermal_spoke_width: Option<i32>,
    pub net: Option<NetCode>,
    /// Set when a slotted hole was found outside the pad outline and the
    /// drill was recentred; downstream tools use this to flag the pad.
    pub slot_recentred: bool,
}

impl Pad {
    pub fn new(name: impl Into<String>, attribute: PadAttribute) -> Self {
        Pad {
            id: Kiid::new(),
            name: name.into(),
            attribute,
            layers: LayerSet::empty(),
            shape: PadShape::Circle,
            size: IVec2::ZERO,
            offset: IVec2::ZERO,
            position: IVec2::ZERO,
            orientation_deg: 0.0,
            drill: None,
            thermal_gap: None,
            thermal_spoke_width: None,
            net: None,
            slot_recentred: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chamfer_position_sets() {
        let left = ChamferPositions::TOP_LEFT.union(ChamferPositions::BOTTOM_LEFT);
        assert_eq!(left, ChamferPositions::LEFT);
        assert!(ChamferPositions::ALL.contains(left));
        assert!(!left.contains(ChamferPositions::TOP_RIGHT));
    }
}
