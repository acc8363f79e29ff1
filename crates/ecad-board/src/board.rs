use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::design::DesignSettings;
use crate::dimension::Dimension;
use crate::footprint::Footprint;
use crate::group::BoardGroup;
use crate::layer::{CopperKind, Layer, LayerSet};
use crate::netinfo::{NetClass, NetCode, NetInfo};
use crate::shape::BoardShape;
use crate::stackup::BoardStackup;
use crate::text::BoardText;
use crate::track::TrackItem;
use crate::zone::Zone;

/// A whole board document. Importers populate it; consumers (DRC, painters,
/// writers) read it.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Board {
    pub design_settings: DesignSettings,
    pub stackup: BoardStackup,
    pub copper_layer_count: u32,
    pub enabled_layers: LayerSet,
    pub visible_layers: LayerSet,
    pub layer_names: BTreeMap<Layer, String>,
    pub layer_types: BTreeMap<Layer, CopperKind>,
    pub nets: Vec<NetInfo>,
    pub netclasses: BTreeMap<String, NetClass>,
    pub footprints: Vec<Footprint>,
    pub tracks: Vec<TrackItem>,
    pub zones: Vec<Zone>,
    pub shapes: Vec<BoardShape>,
    pub texts: Vec<BoardText>,
    pub dimensions: Vec<Dimension>,
    pub groups: Vec<BoardGroup>,
    /// Text-variable substitutions (title, variant, file names).
    pub text_vars: BTreeMap<String, String>,
}

impl Board {
    pub fn new() -> Self {
        Board::default()
    }

    pub fn set_copper_layer_count(&mut self, count: u32) {
        self.copper_layer_count = count;
        self.enabled_layers = self.enabled_layers.union(LayerSet::all_copper(count));
        self.visible_layers = self.visible_layers.union(LayerSet::all_copper(count));
    }

    /// Register a new net and return its code. Codes start at 1; code 0 is
    /// the unconnected net.
    pub fn add_net(&mut self, name: impl Into<String>, netclass: Option<String>) -> NetCode {
        let code = NetCode(self.nets.len() as i32 + 1);
        self.nets.push(NetInfo { code, name: name.into(), netclass });
        code
    }

    pub fn net(&self, code: NetCode) -> Option<&NetInfo> {
        self.nets.iter().find(|n| n.code == code)
    }

    pub fn net_by_name(&self, name: &str) -> Option<&NetInfo> {
        self.nets.iter().find(|n| n.name == name)
    }

    pub fn set_layer_name(&mut self, layer: Layer, name: impl Into<String>) {
        self.layer_names.insert(layer, name.into());
    }

    pub fn layer_name(&self, layer: Layer) -> String {
        self.layer_names.get(&layer).cloned().unwrap_or_else(|| layer.to_string())
    }

    pub fn set_layer_type(&mut self, layer: Layer, kind: CopperKind) {
        self.layer_types.insert(layer, kind);
    }

    pub fn group_by_name(&self, name: &str) -> Option<&BoardGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_by_name_mut(&mut self, name: &str) -> Option<&mut BoardGroup> {
        self.groups.iter_mut().find(|g| g.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_codes_are_sequential_and_resolvable() {
        let mut board = Board::new();
        let gnd = board.add_net("GND", None);
        let vcc = board.add_net("VCC", Some("Power".to_owned()));

        assert_eq!(gnd, NetCode(1));
        assert_eq!(vcc, NetCode(2));
        assert_eq!(board.net(vcc).unwrap().name, "VCC");
        assert_eq!(board.net_by_name("GND").unwrap().code, gnd);
    }

    #[test]
    fn enabling_copper_layers_tracks_count() {
        let mut board = Board::new();
        board.set_copper_layer_count(4);
        assert!(board.enabled_layers.contains(Layer::In(2)));
        assert!(!board.enabled_layers.contains(Layer::In(3)));
    }
}
