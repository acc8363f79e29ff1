use std::collections::BTreeMap;

use ecad_core::Kiid;
use ecad_geom::PolySet;
use serde::{Deserialize, Serialize};

use crate::layer::{Layer, LayerSet};
use crate::netinfo::NetCode;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ZoneFillMode {
    Solid,
    Hatch {
        gap: i32,
        thickness: i32,
        orientation_deg: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadConnection {
    Full,
    Thermal,
    None,
}

/// A copper pour or rule area.
///
/// The outline is what the user draws; `fills` holds the computed copper per
/// layer (the fill polygon), which an importer may pre-populate when the
/// source system carries poured copper. `raw_fills` is the unfractured form
/// the fill was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: Kiid,
    pub name: String,
    pub layers: LayerSet,
    pub net: Option<NetCode>,
    pub outline: PolySet,
    /// Fill order: a zone fills before every zone with a lower priority.
    pub priority: u32,
    pub fill_mode: ZoneFillMode,
    pub is_rule_area: bool,
    pub no_tracks: bool,
    pub no_vias: bool,
    pub no_copper_pour: bool,
    pub no_pads: bool,
    pub no_footprints: bool,
    /// Square internal units; negative means "keep all islands".
    pub min_island_area: i64,
    pub local_clearance: i32,
    pub min_thickness: i32,
    pub pad_connection: PadConnection,
    pub thermal_gap: i32,
    pub thermal_spoke_width: i32,
    pub raw_fills: BTreeMap<Layer, PolySet>,
    pub fills: BTreeMap<Layer, PolySet>,
    pub filled: bool,
}

impl Zone {
    pub fn new(layers: LayerSet) -> Self {
        Zone {
            id: Kiid::new(),
            name: String::new(),
            layers,
            net: None,
            outline: PolySet::new(),
            priority: 0,
            fill_mode: ZoneFillMode::Solid,
            is_rule_area: false,
            no_tracks: false,
            no_vias: false,
            no_copper_pour: false,
            no_pads: false,
            no_footprints: false,
            min_island_area: -1,
            local_clearance: 0,
            min_thickness: 0,
            pad_connection: PadConnection::Thermal,
            thermal_gap: 0,
            thermal_spoke_width: 0,
            raw_fills: BTreeMap::new(),
            fills: BTreeMap::new(),
            filled: false,
        }
    }

    pub fn has_fill_on(&self, layer: Layer) -> bool {
        self.fills.get(&layer).is_some_and(|f| !f.is_empty())
    }

    /// The polygons this zone effectively paints on `layer` for overlap
    /// analysis: the cached fill when present, otherwise the outline.
    pub fn effective_fill(&self, layer: Layer) -> &PolySet {
        match self.fills.get(&layer) {
            Some(fill) if !fill.is_empty() => fill,
            _ => &self.outline,
        }
    }
}
