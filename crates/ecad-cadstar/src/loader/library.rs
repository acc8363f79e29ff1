use ecad_board::{
    Board, ChamferPositions, Drill, DrillShape, Footprint, Layer, LayerSet, Pad, PadAttribute,
    PadShape, Zone,
};
use ecad_core::LibId;
use ecad_geom::arc::rotate_deg;
use ecad_geom::{PolySet, Polygon, Ring};
use glam::{DVec2, IVec2};

use crate::archive::*;
use crate::error::ImportError;

use super::geometry::round_point;
use super::CadstarPcbLoader;

impl<'d> CadstarPcbLoader<'d> {
    /// Produce one footprint per symdef: figures, component coppers,
    /// keepout areas, and pads in CADSTAR pad order.
    pub(super) fn load_component_library(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let definitions: Vec<SymdefPcb> =
            self.archive.library.component_definitions.values().cloned().collect();

        for component in definitions {
            let fp_name = component.footprint_name();

            let mut footprint = Footprint::new(LibId::from_item(fp_name));
            footprint.position = self.point(component.origin);

            self.load_library_figures(&component, board, &mut footprint)?;
            self.load_library_coppers(&component, board, &mut footprint)?;
            self.load_library_areas(&component, board, &mut footprint)?;
            self.load_library_pads(&component, board, &mut footprint)?;

            self.library.insert(component.id.clone(), footprint);
        }

        Ok(())
    }

    fn load_library_figures(
        &mut self,
        component: &SymdefPcb,
        board: &Board,
        footprint: &mut Footprint,
    ) -> Result<(), ImportError> {
        let max_error = f64::from(board.design_settings.max_error);

        for fig in component.figures.values() {
            let layer = self.kicad_layer(&fig.layer);
            let thickness = self.line_thickness(&fig.line_code);

            self.draw_shape_into(
                &mut footprint.shapes,
                &fig.shape,
                layer,
                thickness,
                max_error,
                None,
            );
        }

        Ok(())
    }

    fn load_library_coppers(
        &mut self,
        component: &SymdefPcb,
        board: &Board,
        footprint: &mut Footprint,
    ) -> Result<(), ImportError> {
        let max_error = f64::from(board.design_settings.max_error);

        for copper in &component.component_coppers {
            let thickness = self.length(self.copper_code(&copper.copper_code)?.copper_width);
            let layer = self.kicad_layer(&copper.layer);

            self.draw_shape_into(
                &mut footprint.shapes,
                &copper.shape,
                layer,
                thickness,
                max_error,
                None,
            );
        }

        Ok(())
    }

    fn load_library_areas(
        &mut self,
        component: &SymdefPcb,
        board: &Board,
        footprint: &mut Footprint,
    ) -> Result<(), ImportError> {
        let max_error = f64::from(board.design_settings.max_error);

        for area in component.component_areas.values() {
            if !(area.no_vias || area.no_tracks) {
                self.diag.error(
                    format!(
                        "The CADSTAR area '{}' in library component '{}' does not have a \
                         KiCad equivalent. The area is neither a via nor a route keepout \
                         area. The area was not imported.",
                        area.id,
                        component.footprint_name()
                    ),
                    None,
                );
                continue;
            }

            let thickness = self.line_thickness(&area.line_code);
            let layers = if self.is_layer_set(&area.layer) {
                self.kicad_layer_set(&area.layer)
            } else {
                LayerSet::single(self.kicad_layer(&area.layer))
            };

            let mut zone = Zone::new(layers);
            zone.outline = self.polyset_from_shape(&area.shape, thickness, max_error, None);
            zone.name = area.id.0.clone();

            // All CADSTAR areas import as keepout zones. Tracks and copper
            // pours are not distinguished by CADSTAR keepouts.
            zone.is_rule_area = true;
            zone.no_pads = false;
            zone.no_tracks = area.no_tracks;
            zone.no_copper_pour = area.no_tracks;
            zone.no_vias = area.no_vias;

            footprint.zones.push(zone);
        }

        Ok(())
    }

    fn load_library_pads(
        &mut self,
        component: &SymdefPcb,
        board: &Board,
        footprint: &mut Footprint,
    ) -> Result<(), ImportError> {
        // Pads are inserted in CADSTAR pad order so that pad indices
        // resolve when binding nets to pins.
        for pad in component.component_pads.values() {
            let kicad_pad = self.kicad_pad(board, pad, footprint.position)?;
            footprint.pads.push(kicad_pad);
        }

        Ok(())
    }

    /// Translate one CADSTAR pad (§ pad construction). Shape variants are
    /// approximated where KiCad has no direct equivalent, and slotted holes
    /// whose slot axis is rotated against the pad are reconstructed as
    /// custom-shape pads.
    pub(super) fn kicad_pad(
        &mut self,
        board: &Board,
        cs_pad: &ComponentPad,
        parent_position: IVec2,
    ) -> Result<Pad, ImportError> {
        let padcode = self.pad_code(&cs_pad.pad_code)?.clone();

        let mut pad = Pad::new(String::new(), PadAttribute::Smd);

        match cs_pad.side {
            PadSide::Back => {
                pad.attribute = PadAttribute::Smd;
                pad.layers = [Layer::BCu, Layer::BPaste, Layer::BMask].into_iter().collect();
            }
            PadSide::Front => {
                pad.attribute = PadAttribute::Smd;
                pad.layers = [Layer::FCu, Layer::FPaste, Layer::FMask].into_iter().collect();
            }
            PadSide::ThroughHole => {
                pad.attribute =
                    if padcode.plated { PadAttribute::Pth } else { PadAttribute::Npth };

                // Through-hole pads land on every copper layer plus both
                // mask layers; paste is assumed absent.
                let mut layers = LayerSet::all_copper(self.total_copper_layers);
                layers.insert(Layer::FMask);
                layers.insert(Layer::BMask);
                pad.layers = layers;
            }
        }

        pad.name = match &cs_pad.identifier {
            Some(identifier) if !identifier.is_empty() => identifier.clone(),
            _ => cs_pad.id.to_string(),
        };

        // Zero-sized pads break downstream tooling; make them tiny instead.
        let shape_size = if padcode.shape.size == 0 { 1 } else { padcode.shape.size };

        let total_length = self.length(
            shape_size + padcode.shape.left_length + padcode.shape.right_length,
        );
        let nominal = self.length(shape_size);

        // Offset of the pad graphic so the reported origin matches the
        // CADSTAR convention for asymmetric length extensions.
        let asymmetry_offset = IVec2::new(
            self.length(padcode.shape.left_length / 2 - padcode.shape.right_length / 2),
            0,
        );

        let mut pad_offset = IVec2::ZERO;

        match padcode.shape.kind {
            PadShapeKind::Annulus => {
                // No ring primitive in the pad model; approximated as a
                // circle, reported to the user once per pad code.
                pad.shape = PadShape::Circle;
                pad.size = IVec2::splat(nominal);

                if self.padcodes_warned.insert(padcode.id.clone()) {
                    self.diag.warn(format!(
                        "The CADSTAR pad definition '{}' is an annulus, which has no KiCad \
                         equivalent. It was imported as a circular pad of the nominal size.",
                        padcode.name
                    ));
                }
            }
            PadShapeKind::Bullet => {
                pad.shape = PadShape::ChamferedRect {
                    positions: ChamferPositions::LEFT,
                    chamfer_ratio: 0.0,
                    round_ratio: 0.5,
                };
                pad.size = IVec2::new(total_length, nominal);
                pad_offset = asymmetry_offset;
            }
            PadShapeKind::Circle => {
                pad.shape = PadShape::Circle;
                pad.size = IVec2::splat(nominal);
            }
            PadShapeKind::Diamond => {
                // A square rotated 45 degrees; converted to a square with
                // fully chamfered corners of the same extents.
                let side = (f64::from(nominal) * std::f64::consts::SQRT_2).round() as i32;
                pad.shape = PadShape::ChamferedRect {
                    positions: ChamferPositions::ALL,
                    chamfer_ratio: 0.5,
                    round_ratio: 0.0,
                };
                pad.size = IVec2::splat(side);
                pad_offset = asymmetry_offset;
            }
            PadShapeKind::Finger => {
                pad.shape = PadShape::Oval;
                pad.size = IVec2::new(total_length, nominal);
                pad_offset = asymmetry_offset;
            }
            PadShapeKind::Octagon => {
                pad.shape = PadShape::ChamferedRect {
                    positions: ChamferPositions::ALL,
                    chamfer_ratio: 0.25,
                    round_ratio: 0.0,
                };
                pad.size = IVec2::splat(nominal);
            }
            PadShapeKind::Rectangle => {
                pad.shape = PadShape::Rect;
                pad.size = IVec2::new(total_length, nominal);
                pad_offset = asymmetry_offset;
            }
            PadShapeKind::RoundedRect => {
                pad.shape = PadShape::RoundRect {
                    radius: self.length(padcode.shape.internal_feature),
                    ratio: None,
                };
                pad.size = IVec2::new(total_length, nominal);
                pad_offset = asymmetry_offset;
            }
            PadShapeKind::Square => {
                pad.shape = PadShape::Rect;
                pad.size = IVec2::splat(nominal);
            }
        }

        if let Some(clearance) = padcode.relief_clearance {
            pad.thermal_gap = Some(self.length(clearance));
        }

        if let Some(width) = padcode.relief_width {
            pad.thermal_spoke_width = Some(self.length(width));
        }

        let mut drill_offset = IVec2::ZERO;

        if let Some(drill_diameter) = padcode.drill_diameter {
            pad.drill = Some(match padcode.slot_length {
                Some(slot_length) => Drill {
                    shape: DrillShape::Oblong,
                    size: IVec2::new(
                        self.length(slot_length + drill_diameter),
                        self.length(drill_diameter),
                    ),
                },
                None => Drill {
                    shape: DrillShape::Circle,
                    size: IVec2::splat(self.length(drill_diameter)),
                },
            });

            drill_offset = IVec2::new(
                -self.length(padcode.drill_x_offset),
                self.length(padcode.drill_y_offset),
            );
        }

        let mut slot_orientation_deg = Self::angle_deg(padcode.slot_orientation);

        if padcode.slot_orientation != 0 {
            if pad.layers.copper_only().is_empty() {
                log::debug!("pad '{}' has a slot but no copper layers", padcode.name);
                slot_orientation_deg = 0.0;
                pad.offset = drill_offset;
            } else {
                // Build the pad outline as a polygon, rotate it into the
                // slot frame, and check the drill origin is still covered.
                let max_error = f64::from(board.design_settings.max_error);
                let outline = pad_outline_ring(&pad.shape, pad.size, max_error);

                let moved = (pad_offset - drill_offset).as_dvec2();
                let rotated = Ring::new(
                    outline
                        .pts
                        .iter()
                        .map(|&p| {
                            rotate_deg(p + moved, DVec2::ZERO, 180.0 - slot_orientation_deg)
                        })
                        .collect(),
                );

                if rotated.contains(DVec2::ZERO) {
                    // Promote to a custom-shape pad with the rotated
                    // polygon as its primitive.
                    pad.shape = PadShape::Custom {
                        anchor: Box::new(PadShape::Rect),
                        primitives: PolySet::from_polygon(Polygon::from_outline(rotated)),
                    };
                    pad.size = IVec2::splat(4);
                    pad_offset = IVec2::ZERO;
                } else {
                    // The hole fell outside the pad shape: keep the drill
                    // in the pad center instead, and flag the pad.
                    slot_orientation_deg = 0.0;
                    drill_offset = IVec2::ZERO;
                    pad.slot_recentred = true;

                    if self.padcodes_warned.insert(padcode.id.clone()) {
                        self.diag.warn(format!(
                            "The CADSTAR pad definition '{}' has the hole shape outside \
                             the pad shape. The hole has been moved to the center of the \
                             pad.",
                            padcode.name
                        ));
                    }
                }
            }
        } else {
            pad.offset = drill_offset;
        }

        let pad_orientation =
            Self::angle_deg(cs_pad.orient_angle) + Self::angle_deg(padcode.shape.orient_angle);

        let rotated_pad_offset =
            round_point(rotate_deg(pad_offset.as_dvec2(), DVec2::ZERO, pad_orientation));
        let rotated_drill_offset =
            round_point(rotate_deg(drill_offset.as_dvec2(), DVec2::ZERO, pad_orientation));

        pad.position =
            self.point(cs_pad.position) - parent_position - rotated_pad_offset - rotated_drill_offset;
        pad.orientation_deg = pad_orientation + slot_orientation_deg;

        Ok(pad)
    }
}

/// Approximate outline of a pad shape centred on the origin, used for the
/// slot-outside-pad test.
pub(super) fn pad_outline_ring(shape: &PadShape, size: IVec2, max_error: f64) -> Ring {
    let w = f64::from(size.x) / 2.0;
    let h = f64::from(size.y) / 2.0;

    match shape {
        PadShape::Circle => {
            let r = w.max(h);
            circle_ring(r, max_error)
        }
        PadShape::Oval => stadium_ring(w, h, max_error),
        PadShape::Rect => rect_ring(w, h),
        PadShape::RoundRect { radius, .. } => {
            // Good enough for a containment test: shrink the corners by
            // chamfering at the corner radius.
            chamfered_ring(w, h, f64::from(*radius), ChamferPositions::ALL)
        }
        PadShape::ChamferedRect { positions, chamfer_ratio, round_ratio } => {
            let cut = (w.min(h) * 2.0) * chamfer_ratio.max(*round_ratio);
            chamfered_ring(w, h, cut, *positions)
        }
        PadShape::Custom { primitives, .. } => primitives
            .polygons
            .first()
            .map(|p| p.outline.clone())
            .unwrap_or_else(|| rect_ring(w, h)),
    }
}

fn circle_ring(radius: f64, max_error: f64) -> Ring {
    let start = DVec2::new(radius, 0.0);
    Ring::new(ecad_geom::arc::arc_to_points(DVec2::ZERO, start, 359.99, max_error.max(1.0)))
}

fn rect_ring(w: f64, h: f64) -> Ring {
    Ring::new(vec![
        DVec2::new(-w, -h),
        DVec2::new(w, -h),
        DVec2::new(w, h),
        DVec2::new(-w, h),
    ])
}

fn stadium_ring(w: f64, h: f64, max_error: f64) -> Ring {
    if w <= h {
        return circle_ring(w.max(h), max_error);
    }

    let r = h;
    let cx = w - r;

    let mut pts = Vec::new();
    // Right cap.
    pts.extend(ecad_geom::arc::arc_to_points(
        DVec2::new(cx, 0.0),
        DVec2::new(cx, -r),
        180.0,
        max_error.max(1.0),
    ));
    // Left cap.
    pts.extend(ecad_geom::arc::arc_to_points(
        DVec2::new(-cx, 0.0),
        DVec2::new(-cx, r),
        180.0,
        max_error.max(1.0),
    ));

    Ring::new(pts)
}

fn chamfered_ring(w: f64, h: f64, cut: f64, positions: ChamferPositions) -> Ring {
    let cut = cut.clamp(0.0, w.min(h));
    let mut pts = Vec::new();

    // Counter-clockwise from the bottom-left corner region.
    if positions.contains(ChamferPositions::BOTTOM_LEFT) {
        pts.push(DVec2::new(-w + cut, -h));
    } else {
        pts.push(DVec2::new(-w, -h));
    }

    if positions.contains(ChamferPositions::BOTTOM_RIGHT) {
        pts.push(DVec2::new(w - cut, -h));
        pts.push(DVec2::new(w, -h + cut));
    } else {
        pts.push(DVec2::new(w, -h));
    }

    if positions.contains(ChamferPositions::TOP_RIGHT) {
        pts.push(DVec2::new(w, h - cut));
        pts.push(DVec2::new(w - cut, h));
    } else {
        pts.push(DVec2::new(w, h));
    }

    if positions.contains(ChamferPositions::TOP_LEFT) {
        pts.push(DVec2::new(-w + cut, h));
        pts.push(DVec2::new(-w, h - cut));
    } else {
        pts.push(DVec2::new(-w, h));
    }

    if positions.contains(ChamferPositions::BOTTOM_LEFT) {
        pts.push(DVec2::new(-w, -h + cut));
    }

    Ring::new(pts)
}
