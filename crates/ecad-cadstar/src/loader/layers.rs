use std::collections::BTreeMap;

use ecad_board::{Board, LayerSet};

use crate::archive::*;
use crate::error::ImportError;

use super::{CadstarPcbLoader, InputLayerDesc};

impl<'d> CadstarPcbLoader<'d> {
    /// Collect the layers whose automatic mapping was a guess (generic doc
    /// and non-electrical layers) and let the application's callback
    /// reassign them. The returned mapping is applied and the target layers
    /// enabled on the board.
    pub(super) fn remap_unsure_layers(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let valid_remapping_layers = LayerSet::all(self.total_copper_layers);

        let mut input_layers = Vec::new();
        let mut name_to_id: BTreeMap<String, LayerId> = BTreeMap::new();

        for (layer_id, mapped) in &self.layer_map {
            let Ok(layer) = self.cadstar_layer(layer_id) else {
                continue;
            };

            let unsure = layer.kind == LayerKind::Doc
                || (layer.kind == LayerKind::NonElec
                    && matches!(
                        layer.subtype,
                        LayerSubtype::None | LayerSubtype::Rout | LayerSubtype::Clearance
                    ));

            if unsure {
                input_layers.push(InputLayerDesc {
                    name: layer.name.clone(),
                    permitted_layers: valid_remapping_layers,
                    auto_map_layer: *mapped,
                });
                name_to_id.insert(layer.name.clone(), layer_id.clone());
            }
        }

        if input_layers.is_empty() {
            return Ok(());
        }

        let Some(handler) = self.opts.layer_mapping_handler.as_mut() else {
            return Ok(());
        };

        let remapped = handler(&input_layers);

        let mut enabled = board.enabled_layers;

        for (name, new_layer) in remapped {
            let Some(layer_id) = name_to_id.get(&name) else {
                log::debug!("remap handler returned unknown layer name '{name}'");
                continue;
            };

            self.layer_map.insert(layer_id.clone(), new_layer);
            enabled.insert(new_layer);
        }

        board.enabled_layers = enabled;
        board.visible_layers = enabled;
        Ok(())
    }

    /// Apply the compatible subset of CADSTAR spacing codes to the board
    /// rule set: track-to-track, copper-to-board and hole-to-hole spacing,
    /// plus the technology's minimum route width.
    pub(super) fn load_design_rules(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let raw = |id: &str| {
            self.archive
                .assignments
                .codedefs
                .spacing_codes
                .get(&SpacingCodeId::new(id))
                .map(|code| code.spacing)
        };

        let track_to_track = raw("T_T");
        let copper_to_board = raw("C_B");
        let hole_to_hole = raw("H_H");

        for (id, value) in
            [("T_T", track_to_track), ("C_B", copper_to_board), ("H_H", hole_to_hole)]
        {
            if value.is_none() {
                self.diag.warn(format!("Design rule {id} was not found. This was ignored."));
            }
        }

        if let Some(v) = track_to_track {
            let v = self.length(v);
            board.design_settings.min_clearance = v;
            board.design_settings.default_netclass.clearance = v;
        }

        if let Some(v) = copper_to_board {
            board.design_settings.copper_edge_clearance = self.length(v);
        }

        if let Some(v) = hole_to_hole {
            board.design_settings.hole_to_hole_min = self.length(v);
        }

        board.design_settings.track_min_width =
            self.length(self.archive.assignments.technology.min_route_width);

        self.diag.warn(
            "KiCad design rules are different from CADSTAR ones. Only the compatible \
             design rules were imported. It is recommended that you review the design \
             rules that have been applied.",
        );

        Ok(())
    }
}
