use ecad_board::{Board, Via, ViaType};
use ecad_core::Kiid;

use crate::archive::*;
use crate::error::ImportError;

use super::CadstarPcbLoader;

impl<'d> CadstarPcbLoader<'d> {
    /// Tracks, vias and pin-to-net assignments for every net.
    pub(super) fn load_nets(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let nets: Vec<Net> = self.archive.layout.nets.values().cloned().collect();

        for net in nets {
            let net_name_for_reporting = match &net.name {
                Some(name) if !name.is_empty() => name.clone(),
                _ => format!("${}", net.signal_num),
            };

            for connection in &net.connections {
                if !connection.unrouted {
                    self.load_net_tracks(board, &net.id, &connection.route)?;
                }
            }

            for via in net.vias.values() {
                self.load_net_via(board, &net.id, via)?;
            }

            for pin in net.pins.values() {
                let Some(&footprint_index) = self.component_map.get(&pin.component) else {
                    self.diag.warn(format!(
                        "The net '{net_name_for_reporting}' references component ID '{}' \
                         which does not exist. This has been ignored.",
                        pin.component
                    ));
                    continue;
                };

                let pad_index = pin.pad_id - 1;
                let pad_count = board.footprints[footprint_index].pads.len() as i64;

                if pad_index < 0 || pad_index >= pad_count {
                    let reference = board.footprints[footprint_index].reference.clone();
                    self.diag.warn(format!(
                        "The net '{net_name_for_reporting}' references non-existent pad \
                         index '{}' in component '{reference}'. This has been ignored.",
                        pin.pad_id
                    ));
                    continue;
                }

                // Pads were added in CADSTAR order, so the sequential pad id
                // indexes directly.
                let code = self.kicad_net(board, &net.id)?;
                let footprint = &mut board.footprints[footprint_index];

                if let Some(pad) = footprint.pad_by_index_mut(pad_index as usize) {
                    pad.net = code;
                }
            }
        }

        Ok(())
    }

    /// Convert a route (ordered vertices with per-segment widths) into
    /// tracks and arcs carrying the net.
    fn load_net_tracks(
        &mut self,
        board: &mut Board,
        net_id: &NetId,
        route: &Route,
    ) -> Result<Vec<Kiid>, ImportError> {
        let layer = self.kicad_layer(&route.layer);
        let net = self.kicad_net(board, net_id)?;

        // Rebuild the vertex chain with the route's start point in front so
        // the generic reconstruction applies.
        let mut vertices = Vec::with_capacity(route.vertices.len() + 1);
        vertices.push(CadstarVertex::point(route.start));
        vertices.extend(route.vertices.iter().map(|v| v.vertex));

        let widths: Vec<i32> = route.vertices.iter().map(|v| self.length(v.width)).collect();

        let primitives = self.primitives_for(&vertices, None);
        Ok(self.tracks_from_primitives(board, &primitives, &widths, layer, net))
    }

    /// One via. Drill and size come from the via code; the via type derives
    /// from whether the layer-pair endpoints are outer or inner layers.
    fn load_net_via(
        &mut self,
        board: &mut Board,
        net_id: &NetId,
        cs_via: &NetVia,
    ) -> Result<(), ImportError> {
        let via_code = self.via_code(&cs_via.via_code)?.clone();
        let layer_pair = self.layer_pair(&cs_via.layer_pair)?.clone();

        if via_code.shape.kind != PadShapeKind::Circle {
            self.diag.error(
                format!(
                    "The CADSTAR via code '{}' has different shape from a circle defined. \
                     KiCad only supports circular vias so this via type has been changed \
                     to be a via with circular shape of {:.2} mm diameter.",
                    via_code.name,
                    f64::from(self.length(via_code.shape.size)) / ecad_core::PCB_IU_PER_MM,
                ),
                None,
            );
        }

        let max_layer = self.archive.assignments.technology.max_physical_layer;

        let start_outside =
            layer_pair.physical_layer_start == 1 || layer_pair.physical_layer_start == max_layer;
        let end_outside =
            layer_pair.physical_layer_end == 1 || layer_pair.physical_layer_end == max_layer;

        let via_type = match (start_outside, end_outside) {
            (true, true) => ViaType::Through,
            (false, false) => ViaType::BlindBuried,
            _ => ViaType::Micro,
        };

        let via = Via {
            id: Kiid::new(),
            position: self.point(cs_via.location),
            diameter: self.length(via_code.shape.size),
            drill: self.length(via_code.drill_diameter),
            via_type,
            layer_pair: (
                self.kicad_copper_layer(layer_pair.physical_layer_start),
                self.kicad_copper_layer(layer_pair.physical_layer_end),
            ),
            net: self.kicad_net(board, net_id)?,
            locked: cs_via.fixed,
        };

        board.tracks.push(ecad_board::TrackItem::Via(via));
        Ok(())
    }
}
