use std::collections::{BTreeMap, BTreeSet};

use ecad_board::{Board, LayerSet, PadConnection, Zone, ZoneFillMode};

use crate::archive::*;
use crate::error::ImportError;

use super::CadstarPcbLoader;

impl<'d> CadstarPcbLoader<'d> {
    /// Templates become zones with matching net, layer and fill mode; any
    /// POWER-type layer gets an implicit zone over every board outline,
    /// connected to the net named like the layer.
    pub(super) fn load_templates(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let templates: Vec<Template> = self.archive.layout.templates.values().cloned().collect();
        let max_error = f64::from(board.design_settings.max_error);

        for cs_template in templates {
            // The CADSTAR line thickness is display-only; it does not
            // affect the copper result.
            let layer = self.kicad_layer(&cs_template.layer);
            let mut zone = Zone::new(LayerSet::single(layer));
            zone.outline = self.polyset_from_shape(&cs_template.shape, 0, max_error, None);
            zone.name = cs_template.name.clone();

            // Start at 1; the overlap analysis raises priorities later.
            zone.priority = 1;

            if let Some(net_id) = &cs_template.net {
                if !net_id.is_empty() {
                    zone.net = self.kicad_net(board, net_id)?;
                }
            }

            let pouring = &cs_template.pouring;

            if pouring.allow_in_no_routing {
                self.diag.error(
                    format!(
                        "The CADSTAR template '{}' has the setting 'Allow in No Routing \
                         Areas' enabled. This setting has no KiCad equivalent, so it has \
                         been ignored.",
                        cs_template.name
                    ),
                    None,
                );
            }

            if pouring.box_isolated_pins {
                self.diag.error(
                    format!(
                        "The CADSTAR template '{}' has the setting 'Box Isolated Pins' \
                         enabled. This setting has no KiCad equivalent, so it has been \
                         ignored.",
                        cs_template.name
                    ),
                    None,
                );
            }

            if pouring.automatic_repour {
                self.diag.warn(format!(
                    "The CADSTAR template '{}' has the setting 'Automatic Repour' enabled. \
                     This setting has no KiCad equivalent, so it has been ignored.",
                    cs_template.name
                ));
            }

            // Sliver width behaves inversely to the zone minimum thickness,
            // so it cannot be mapped.
            if pouring.sliver_width != 0 {
                self.diag.error(
                    format!(
                        "The CADSTAR template '{}' has a non-zero value defined for the \
                         'Sliver Width' setting. There is no KiCad equivalent for this, so \
                         this setting was ignored.",
                        cs_template.name
                    ),
                    None,
                );
            }

            if pouring.min_isolated_copper != pouring.min_disjoint_copper {
                self.diag.error(
                    format!(
                        "The CADSTAR template '{}' has different settings for 'Retain \
                         Poured Copper - Disjoint' and 'Retain Poured Copper - Isolated'. \
                         KiCad does not distinguish between these two settings. The \
                         setting for disjoint copper has been applied as the minimum \
                         island area of the KiCad Zone.",
                        cs_template.name
                    ),
                    None,
                );
            }

            // Pads-only value wins.
            zone.min_island_area = if pouring.min_disjoint_copper < 0 {
                -1
            } else {
                let side = i64::from(self.length(pouring.min_disjoint_copper));
                side * side
            };

            zone.local_clearance = self.length(pouring.additional_isolation);

            zone.fill_mode = match pouring.fill_type {
                CopperFillType::Hatched => {
                    self.check_hatch_code(pouring.hatch_code.as_ref());
                    let hatch = pouring.hatch_code.as_ref().and_then(|id| self.hatch_code(id));

                    match hatch {
                        Some(code) => {
                            let first = code.hatches.first();
                            ZoneFillMode::Hatch {
                                gap: first.map(|h| self.length(h.step)).unwrap_or(0),
                                thickness: first.map(|h| self.length(h.line_width)).unwrap_or(0),
                                orientation_deg: first
                                    .map(|h| Self::angle_deg(h.orient_angle))
                                    .unwrap_or(0.0),
                            }
                        }
                        None => ZoneFillMode::Solid,
                    }
                }
                CopperFillType::Solid => ZoneFillMode::Solid,
            };

            if pouring.thermal_relief_on_pads != pouring.thermal_relief_on_vias
                || pouring.thermal_relief_pads_angle != pouring.thermal_relief_vias_angle
            {
                self.diag.warn(format!(
                    "The CADSTAR template '{}' has different settings for thermal relief \
                     in pads and vias. KiCad only supports one single setting for both. \
                     The setting for pads has been applied.",
                    cs_template.name
                ));
            }

            if pouring.thermal_relief_on_pads {
                zone.thermal_gap = self.length(pouring.clearance_width);
                zone.thermal_spoke_width =
                    self.length(self.copper_code(&pouring.relief_copper_code)?.copper_width);
                zone.pad_connection = PadConnection::Thermal;
            } else {
                zone.pad_connection = PadConnection::Full;
            }

            board.zones.push(zone);
            self.loaded_templates.insert(cs_template.id.clone(), board.zones.len() - 1);
        }

        self.load_power_planes(board, max_error)?;
        Ok(())
    }

    /// Implicit zones for POWER-type stack layers: one per board outline,
    /// at the lowest priority, connected to the net named like the layer.
    fn load_power_planes(&mut self, board: &mut Board, max_error: f64) -> Result<(), ImportError> {
        let power_layers = self.power_plane_layers.clone();

        for layer_id in power_layers {
            let layer_name = self.cadstar_layer(&layer_id)?.name.clone();

            // The net name equals the layer name.
            let net_id = self
                .archive
                .layout
                .nets
                .values()
                .find(|net| net.name.as_deref() == Some(layer_name.as_str()))
                .map(|net| net.id.clone());

            let Some(net_id) = net_id else {
                self.diag.error(
                    format!(
                        "The CADSTAR layer '{layer_name}' is defined as a power plane \
                         layer. However no net with such name exists. The layer has been \
                         loaded but no copper zone was created."
                    ),
                    None,
                );
                continue;
            };

            let boards: Vec<BoardOutline> =
                self.archive.layout.boards.values().cloned().collect();

            for outline in boards {
                let thickness = board.design_settings.edge_cut_line_thickness;
                let layer = self.kicad_layer(&layer_id);

                let mut zone = Zone::new(LayerSet::single(layer));
                zone.outline =
                    self.polyset_from_shape(&outline.shape, thickness, max_error, None);
                zone.name = layer_name.clone();
                zone.fill_mode = ZoneFillMode::Solid;
                zone.pad_connection = PadConnection::Full;
                zone.min_island_area = -1;
                // Implied power planes always fill last.
                zone.priority = 0;
                zone.net = self.kicad_net(board, &net_id)?;

                board.zones.push(zone);
            }
        }

        Ok(())
    }

    fn check_hatch_code(&mut self, id: Option<&HatchCodeId>) {
        let Some(id) = id else { return };
        let Some(code) = self.hatch_code(id).cloned() else { return };

        if code.hatches.len() > 2 {
            self.diag.warn(format!(
                "The CADSTAR Hatching code '{}' has more than two hatches defined. Only \
                 the first two hatches were imported.",
                code.name
            ));
        }

        if code.hatches.len() == 2 {
            let a = &code.hatches[0];
            let b = &code.hatches[1];

            if a.line_width != b.line_width || a.step != b.step {
                self.diag.warn(format!(
                    "The CADSTAR Hatching code '{}' has different settings for each hatch. \
                     KiCad only supports one width and step for both hatches; the first \
                     hatch's settings were applied.",
                    code.name
                ));
            }
        }
    }

    /// Explicit coppers: poured coppers merge into their template's cached
    /// fill; standalone ones become tracks (open/outline) or a top-priority
    /// zone (solid/hatched).
    pub(super) fn load_coppers(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let coppers: Vec<Copper> = self.archive.layout.coppers.values().cloned().collect();
        let max_error = f64::from(board.design_settings.max_error);

        for cs_copper in coppers {
            if let Some(template_id) = &cs_copper.poured_template {
                let Some(&zone_index) = self.loaded_templates.get(template_id) else {
                    return Err(ImportError::Corrupt(format!(
                        "copper '{}' pours into unknown template '{template_id}'",
                        cs_copper.id
                    )));
                };

                let layer = self.kicad_layer(&cs_copper.layer);
                let copper_width =
                    self.length(self.copper_code(&cs_copper.copper_code)?.copper_width);

                let mut raw = self.polyset_from_shape(&cs_copper.shape, -1, max_error, None);

                // The copper outline is drawn at the copper stroke width,
                // the template's fill at the zone minimum thickness; adjust
                // by half the difference before the union.
                let zone_width = board.zones[zone_index].min_thickness;
                raw = raw.inflate(f64::from(copper_width - zone_width) / 2.0);

                let zone = &mut board.zones[zone_index];

                if let Some(existing) = zone.raw_fills.get(&layer) {
                    raw.append(existing);
                }

                // Re-fracture and cache as this template's fill for the
                // target layer.
                zone.raw_fills.insert(layer, raw.clone());
                zone.fills.insert(layer, raw);
                zone.filled = true;
                continue;
            }

            if !self.copper_warning_done {
                self.diag.warn(
                    "The CADSTAR design contains COPPER elements, which have no direct \
                     KiCad equivalent. These have been imported as a KiCad Zone if solid \
                     or hatch filled, or as a KiCad Track if the shape was an unfilled \
                     outline (open or closed).",
                );
                self.copper_warning_done = true;
            }

            let layer = self.kicad_layer(&cs_copper.layer);
            let width = self.length(self.copper_code(&cs_copper.copper_code)?.copper_width);

            match cs_copper.shape.fill {
                ShapeFill::OpenShape | ShapeFill::Outline => {
                    let net = match &cs_copper.net {
                        Some(net_id) => self.kicad_net(board, net_id)?,
                        None => None,
                    };

                    let outline = self.primitives_for(&cs_copper.shape.vertices, None);
                    self.tracks_from_primitives(board, &outline, &[width], layer, net);

                    for cutout in &cs_copper.shape.cutouts {
                        let prims = self.primitives_for(&cutout.vertices, None);
                        self.tracks_from_primitives(board, &prims, &[width], layer, net);
                    }
                }
                ShapeFill::Solid | ShapeFill::Hatched => {
                    let mut zone = Zone::new(LayerSet::single(layer));
                    zone.outline =
                        self.polyset_from_shape(&cs_copper.shape, width, max_error, None);
                    zone.name = cs_copper.id.0.clone();

                    zone.fill_mode = match cs_copper.shape.fill {
                        ShapeFill::Hatched => {
                            let hatch = cs_copper
                                .shape
                                .hatch_code
                                .as_ref()
                                .and_then(|id| self.hatch_code(id));

                            match hatch {
                                Some(code) => {
                                    let first = code.hatches.first();
                                    ZoneFillMode::Hatch {
                                        gap: first.map(|h| self.length(h.step)).unwrap_or(0),
                                        thickness: first
                                            .map(|h| self.length(h.line_width))
                                            .unwrap_or(0),
                                        orientation_deg: first
                                            .map(|h| Self::angle_deg(h.orient_angle))
                                            .unwrap_or(0.0),
                                    }
                                }
                                None => ZoneFillMode::Solid,
                            }
                        }
                        _ => ZoneFillMode::Solid,
                    };

                    zone.pad_connection = PadConnection::Full;

                    if let Some(net_id) = &cs_copper.net {
                        zone.net = self.kicad_net(board, net_id)?;
                    }

                    // Highest priority: standalone coppers always fill
                    // first.
                    zone.priority = self.loaded_templates.len() as u32 + 1;

                    let fill = zone.outline.clone();
                    zone.raw_fills.insert(layer, fill.clone());
                    zone.fills.insert(layer, fill);
                    zone.filled = true;

                    board.zones.push(zone);
                }
            }
        }

        Ok(())
    }

    /// Compute template fill priorities by overlap analysis (§ zone
    /// priorities): if A's fill overlaps B's outline by more area than B's
    /// fill overlaps A's outline, A must fill before B — so A's priority
    /// ends up strictly greater. Ties (mutual containment) break on the
    /// template id so ordering is stable.
    pub(super) fn calculate_zone_priorities(
        &mut self,
        board: &mut Board,
    ) -> Result<(), ImportError> {
        use itertools::Itertools as _;

        let mut winning_overlaps: BTreeMap<TemplateId, BTreeSet<TemplateId>> = BTreeMap::new();

        let templates: Vec<(TemplateId, usize)> =
            self.loaded_templates.iter().map(|(id, &idx)| (id.clone(), idx)).collect();

        for ((this_id, this_index), (other_id, other_index)) in
            templates.iter().tuple_combinations()
        {
            let this_template = &self.archive.layout.templates[this_id];
            let this_layer = self.kicad_layer(&this_template.layer);

            let other_template = &self.archive.layout.templates[other_id];
            let other_layer = self.kicad_layer(&other_template.layer);

            if this_layer != other_layer {
                continue;
            }

            let this_zone = &board.zones[*this_index];
            let other_zone = &board.zones[*other_index];

            // Intersect this zone's filled polygons with the *outline* of
            // the other, and vice versa, and compare areas.
            let area_this =
                this_zone.effective_fill(this_layer).intersection_area(&other_zone.outline);
            let area_other =
                other_zone.effective_fill(other_layer).intersection_area(&this_zone.outline);

            if area_this > area_other {
                winning_overlaps.entry(this_id.clone()).or_default().insert(other_id.clone());
            } else if area_other > 0.0 {
                winning_overlaps.entry(other_id.clone()).or_default().insert(this_id.clone());
            }
        }

        // Unique ids of all zones that intersect another one.
        let mut intersecting: BTreeSet<TemplateId> = BTreeSet::new();

        for (winner, losers) in &winning_overlaps {
            intersecting.insert(winner.clone());
            intersecting.extend(losers.iter().cloned());
        }

        // Topological order: losers before winners, id order breaking ties.
        let wins_over = |a: &TemplateId, b: &TemplateId| -> bool {
            winning_overlaps.get(a).is_some_and(|set| set.contains(b))
        };

        let mut remaining: BTreeSet<TemplateId> = intersecting.clone();
        let mut sorted: Vec<TemplateId> = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            // Pick the first id (in id order) that loses to nothing still
            // remaining.
            let next = remaining
                .iter()
                .find(|candidate| {
                    !remaining.iter().any(|other| {
                        *candidate != other && wins_over(candidate, other)
                    })
                })
                .cloned()
                // A cycle of mutual wins cannot happen with an area-based
                // relation, but stay safe: fall back to plain id order.
                .unwrap_or_else(|| remaining.iter().next().cloned().unwrap());

            remaining.remove(&next);
            sorted.push(next);
        }

        // Walk the sorted list: each zone that wins over its predecessor
        // fills at a strictly higher priority.
        let mut prev: Option<TemplateId> = None;

        for id in sorted {
            if let Some(prev_id) = &prev {
                let mut priority = board.zones[self.loaded_templates[prev_id]].priority;

                if wins_over(&id, prev_id) {
                    priority += 1;
                }

                board.zones[self.loaded_templates[&id]].priority = priority;
            }

            prev = Some(id);
        }

        Ok(())
    }
}
