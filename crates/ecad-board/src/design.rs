use ecad_core::UnitScale;
use serde::{Deserialize, Serialize};

use crate::netinfo::NetClass;

/// Board-level design rules that importers populate from the source
/// system's rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSettings {
    pub min_clearance: i32,
    pub copper_edge_clearance: i32,
    pub hole_to_hole_min: i32,
    pub track_min_width: i32,
    /// Maximum deviation when approximating arcs with segments.
    pub max_error: i32,
    /// Default line thickness of edge-cut graphics.
    pub edge_cut_line_thickness: i32,
    pub default_netclass: NetClass,
}

impl Default for DesignSettings {
    fn default() -> Self {
        let scale = UnitScale::BOARD;
        DesignSettings {
            min_clearance: 0,
            copper_edge_clearance: 0,
            hole_to_hole_min: 0,
            track_min_width: 0,
            max_error: scale.mm_to_iu(0.005),
            edge_cut_line_thickness: scale.mm_to_iu(0.09),
            default_netclass: NetClass {
                name: "Default".to_owned(),
                track_width: scale.mm_to_iu(0.2),
                clearance: scale.mm_to_iu(0.2),
            },
        }
    }
}
