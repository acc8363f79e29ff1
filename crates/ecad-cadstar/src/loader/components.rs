use ecad_board::{Board, BoardGroup, Layer, LayerSet, Zone};
use ecad_geom::Transform2;

use crate::archive::*;
use crate::error::ImportError;

use super::CadstarPcbLoader;

impl<'d> CadstarPcbLoader<'d> {
    /// Groups are created first and parent/child membership resolved in a
    /// second pass, because a child can reference a parent that appears
    /// later in the archive.
    pub(super) fn load_groups(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let groups: Vec<CadstarGroup> = self.archive.layout.groups.values().cloned().collect();

        for cs_group in &groups {
            let mut group = BoardGroup::new(cs_group.name.clone());
            group.locked = cs_group.fixed;

            board.groups.push(group);
            self.group_map.insert(cs_group.id.clone(), board.groups.len() - 1);
        }

        // Second pass: attach child groups to their parents.
        for cs_group in &groups {
            let Some(parent_id) = &cs_group.parent else {
                continue;
            };

            let Some(&child_index) = self.group_map.get(&cs_group.id) else {
                return Err(ImportError::Corrupt(format!(
                    "Unable to find group ID {} in the group definitions.",
                    cs_group.id
                )));
            };

            let Some(&parent_index) = self.group_map.get(parent_id) else {
                return Err(ImportError::Corrupt(format!(
                    "Unable to find sub group {parent_id} in the group map (parent group \
                     ID={}, Name={}).",
                    cs_group.id, cs_group.name
                )));
            };

            let child_kiid = board.groups[child_index].id;
            board.groups[parent_index].members.push(child_kiid);
        }

        Ok(())
    }

    /// Board outlines become edge-cut graphics, grouped so they can be
    /// re-identified after import.
    pub(super) fn load_boards(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let outlines: Vec<BoardOutline> = self.archive.layout.boards.values().cloned().collect();
        let max_error = f64::from(board.design_settings.max_error);

        for outline in outlines {
            let thickness = self.line_thickness(&outline.line_code);

            let mut shapes = Vec::new();
            let ids = self.draw_shape_into(
                &mut shapes,
                &outline.shape,
                Layer::EdgeCuts,
                thickness,
                max_error,
                None,
            );
            board.shapes.append(&mut shapes);

            let board_group = self.create_unique_group(board, "Board");

            for id in ids {
                self.add_to_group(board, &board_group, id);
            }

            if let Some(parent) = &outline.group {
                let group_kiid = board.groups[self.group_map[&board_group]].id;
                self.add_to_group(board, parent, group_kiid);
            }
        }

        Ok(())
    }

    pub(super) fn load_figures(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let figures: Vec<Figure> = self.archive.layout.figures.values().cloned().collect();
        let max_error = f64::from(board.design_settings.max_error);

        for fig in figures {
            let thickness = self.line_thickness(&fig.line_code);

            for layer in self.kicad_layer_set(&fig.layer).iter() {
                let mut shapes = Vec::new();
                let ids = self.draw_shape_into(
                    &mut shapes,
                    &fig.shape,
                    layer,
                    thickness,
                    max_error,
                    None,
                );
                board.shapes.append(&mut shapes);

                if let Some(group) = &fig.group {
                    for id in ids {
                        self.add_to_group(board, group, id);
                    }
                }
            }
        }

        Ok(())
    }

    pub(super) fn load_texts(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let texts: Vec<CadstarText> = self.archive.layout.texts.values().cloned().collect();

        for text in texts {
            let mut out = Vec::new();
            self.text_into(&mut out, &text, None, None)?;
            board.texts.append(&mut out);
        }

        Ok(())
    }

    /// Keepout and routing areas become rule-area zones; placement-only
    /// areas have no equivalent and are reported.
    pub(super) fn load_areas(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let areas: Vec<Area> = self.archive.layout.areas.values().cloned().collect();
        let max_error = f64::from(board.design_settings.max_error);

        for area in areas {
            if area.no_vias || area.no_tracks || area.keepout || area.routing {
                let thickness = self.line_thickness(&area.line_code);
                let layers = if self.is_layer_set(&area.layer) {
                    self.kicad_layer_set(&area.layer)
                } else {
                    LayerSet::single(self.kicad_layer(&area.layer))
                };

                let mut zone = Zone::new(layers);
                zone.outline = self.polyset_from_shape(&area.shape, thickness, max_error, None);
                zone.name = area.name.clone();

                zone.is_rule_area = true;
                zone.no_pads = false;
                zone.no_footprints = area.keepout;
                zone.no_tracks = area.no_tracks;
                zone.no_copper_pour = area.no_tracks;
                zone.no_vias = area.no_vias;

                board.zones.push(zone);

                if area.placement {
                    self.diag.warn(format!(
                        "The CADSTAR area '{}' is marked as a placement area in CADSTAR. \
                         Placement areas are not supported in KiCad. Only the supported \
                         elements for the area were imported.",
                        area.name
                    ));
                }
            } else {
                self.diag.error(
                    format!(
                        "The CADSTAR area '{}' does not have a KiCad equivalent. Pure \
                         Placement areas are not supported.",
                        area.name
                    ),
                    None,
                );
            }
        }

        Ok(())
    }

    /// Instantiate components from the library footprints: fix up pad
    /// names from the part definition, apply pad exceptions, place, rotate
    /// and mirror.
    pub(super) fn load_components(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let components: Vec<Component> =
            self.archive.layout.components.values().cloned().collect();

        for comp in components {
            // Only load the master variant.
            if comp.variant_id.is_some() && comp.variant_parent.as_ref() != Some(&comp.id) {
                continue;
            }

            let Some(library_footprint) = self.library.get(&comp.symdef) else {
                return Err(ImportError::Corrupt(format!(
                    "Unable to find component '{}' in the library (Symdef ID: '{}')",
                    comp.name, comp.symdef
                )));
            };

            // Fresh identifiers for every placement.
            let mut footprint = library_footprint.instantiate();

            // CADSTAR defines pad names in the PART definition while the
            // footprint uses a numeric sequence; only the component sees
            // both. Rename only when the pin count matches the pad count.
            if let Some(part_id) = &comp.part {
                if let Some(part) = self.archive.parts.part_definitions.get(part_id) {
                    if part.pins.len() == footprint.pads.len() {
                        for pin in part.pins.values() {
                            let name = pin
                                .name
                                .clone()
                                .filter(|n| !n.is_empty())
                                .or_else(|| {
                                    pin.identifier.clone().filter(|i| !i.is_empty())
                                })
                                .unwrap_or_else(|| pin.id.to_string());

                            let index = (pin.id - 1) as usize;
                            if let Some(pad) = footprint.pads.get_mut(index) {
                                pad.name = name;
                            }
                        }
                    }
                }
            }

            // Pad exceptions override the pad code, orientation or side of
            // individual pads.
            if !comp.pad_exceptions.is_empty() {
                let symdef = self
                    .archive
                    .library
                    .component_definitions
                    .get(&comp.symdef)
                    .cloned()
                    .ok_or_else(|| {
                        ImportError::Corrupt(format!("unknown symdef '{}'", comp.symdef))
                    })?;

                for (pad_id, exception) in &comp.pad_exceptions {
                    let Some(mut cs_pad) = symdef.component_pads.get(pad_id).cloned() else {
                        return Err(ImportError::Corrupt(format!(
                            "pad exception for unknown pad {pad_id} in component '{}'",
                            comp.name
                        )));
                    };

                    if let Some(code) = &exception.pad_code {
                        if !code.is_empty() {
                            cs_pad.pad_code = code.clone();
                        }
                    }

                    if let Some(orient) = exception.orient_angle {
                        cs_pad.orient_angle = orient;
                    }

                    if let Some(side) = exception.side {
                        cs_pad.side = side;
                    }

                    let index = (*pad_id - 1) as usize;
                    let position = footprint.position;
                    let name = footprint
                        .pads
                        .get(index)
                        .map(|p| p.name.clone())
                        .unwrap_or_default();

                    let mut new_pad = self.kicad_pad(board, &cs_pad, position)?;
                    new_pad.name = name;

                    if let Some(slot) = footprint.pads.get_mut(index) {
                        *slot = new_pad;
                    }
                }
            }

            footprint.position = self.point(comp.origin);
            footprint.orientation_deg = Self::angle_deg(comp.orient_angle);
            footprint.reference = comp.name.clone();
            // Avoid duplication when attributes fill the value in.
            footprint.value = String::new();

            if comp.mirror {
                let mut mirrored = -Self::angle_deg(comp.orient_angle);
                while mirrored > 180.0 {
                    mirrored -= 360.0;
                }
                while mirrored < -180.0 {
                    mirrored += 360.0;
                }

                footprint.orientation_deg = mirrored;
                footprint.flipped = true;
            }

            self.load_component_attributes(&comp, &mut footprint)?;

            if let Some(part_id) = &comp.part {
                if !part_id.is_empty() && part_id.0 != "NO_PART" {
                    if let Some(part) = self.archive.parts.part_definitions.get(part_id) {
                        footprint.description = part.definition_name.clone();
                    }
                }
            }

            board.footprints.push(footprint);
            self.component_map.insert(comp.id.clone(), board.footprints.len() - 1);
        }

        Ok(())
    }

    fn load_component_attributes(
        &mut self,
        comp: &Component,
        footprint: &mut ecad_board::Footprint,
    ) -> Result<(), ImportError> {
        for attr in &comp.attributes {
            // Only attributes with a location are imported.
            let Some(location) = &attr.location else {
                continue;
            };

            self.add_attribute(location, &attr.attribute, footprint, &attr.value)?;
        }

        for textloc in &comp.text_locations {
            let value = if textloc.attribute.0 == COMPONENT_NAME_ATTRID {
                // The designator is loaded separately.
                String::new()
            } else if textloc.attribute.0 == COMPONENT_NAME_2_ATTRID {
                "${REFERENCE}".to_owned()
            } else if textloc.attribute.0 == PART_NAME_ATTRID {
                comp.part
                    .as_ref()
                    .and_then(|id| self.archive.parts.part_definitions.get(id))
                    .map(|p| p.name.clone())
                    .unwrap_or_default()
            } else {
                comp.attributes
                    .iter()
                    .find(|a| a.attribute == textloc.attribute)
                    .map(|a| a.value.clone())
                    .unwrap_or_default()
            };

            self.add_attribute(&textloc.location, &textloc.attribute, footprint, &value)?;
        }

        Ok(())
    }

    fn add_attribute(
        &mut self,
        location: &AttributeLocation,
        attribute: &AttributeId,
        footprint: &mut ecad_board::Footprint,
        value: &str,
    ) -> Result<(), ImportError> {
        let is_value_attribute = attribute.0 != COMPONENT_NAME_2_ATTRID
            && self.attribute_name(attribute) == "Value";

        if attribute.0 == PART_NAME_ATTRID || is_value_attribute {
            if footprint.value.is_empty() {
                footprint.value = value.to_owned();
            }
        }

        let text = CadstarText {
            id: TextId::new(format!("attr-{}", attribute.0)),
            text: value.to_owned(),
            position: location.position,
            orient_angle: location.orient_angle,
            mirror: location.mirror,
            layer: location.layer.clone(),
            text_code: location.text_code.clone(),
            alignment: location.alignment,
        };

        let mut out = Vec::new();
        self.text_into(&mut out, &text, None, None)?;

        // User attributes are kept invisible to avoid clutter.
        for item in &mut out {
            item.visible = false;
        }

        footprint.texts.append(&mut out);
        Ok(())
    }

    /// Documentation symbols have no KiCad equivalent; their figures and
    /// texts are replayed per layer of the layer set under the instance
    /// transform and collected into a group.
    pub(super) fn load_documentation_symbols(
        &mut self,
        board: &mut Board,
    ) -> Result<(), ImportError> {
        let doc_symbols = self.archive.layout.documentation_symbols.clone();
        let max_error = f64::from(board.design_settings.max_error);

        for instance in doc_symbols {
            let Some(definition) =
                self.archive.library.component_definitions.get(&instance.symdef).cloned()
            else {
                return Err(ImportError::Corrupt(format!(
                    "Unable to find documentation symbol in the library (Symdef ID: '{}')",
                    instance.symdef
                )));
            };

            let origin = self.point(definition.origin).as_dvec2();
            let move_vec = self.point(instance.origin).as_dvec2() - origin;

            let scale = if instance.scale_ratio_denominator != 0 {
                instance.scale_ratio_numerator as f64 / instance.scale_ratio_denominator as f64
            } else {
                1.0
            };

            let transform = Transform2 {
                move_vec,
                rotation_deg: Self::angle_deg(instance.orient_angle),
                scale,
                mirror: instance.mirror,
                center: origin,
            };

            let mut group_name = definition.reference_name.clone();
            if !definition.alternate.is_empty() {
                group_name = format!("{group_name} ({})", definition.alternate);
            }

            let group_id = self.create_unique_group(board, &group_name);

            for layer in self.kicad_layer_set(&instance.layer).iter() {
                for fig in definition.figures.values() {
                    let thickness = self.line_thickness(&fig.line_code);

                    let mut shapes = Vec::new();
                    let ids = self.draw_shape_into(
                        &mut shapes,
                        &fig.shape,
                        layer,
                        thickness,
                        max_error,
                        Some(&transform),
                    );
                    board.shapes.append(&mut shapes);

                    for id in ids {
                        self.add_to_group(board, &group_id, id);
                    }
                }
            }

            for text in definition.texts.values() {
                let mut out = Vec::new();
                let ids =
                    self.text_into(&mut out, text, Some(&instance.layer), Some(&transform))?;
                board.texts.append(&mut out);

                for id in ids {
                    self.add_to_group(board, &group_id, id);
                }
            }
        }

        Ok(())
    }

    /// Bind text variables: design title, first-variant name/description.
    pub(super) fn load_text_variables(&mut self, board: &mut Board) -> Result<(), ImportError> {
        if let Some(variant) = self.archive.layout.variants.values().next().cloned() {
            board.text_vars.insert("VARIANT_NAME".to_owned(), variant.name);
            board.text_vars.insert("VARIANT_DESCRIPTION".to_owned(), variant.description);
        }

        board
            .text_vars
            .insert("DESIGN_TITLE".to_owned(), self.archive.header.job_title.clone());

        Ok(())
    }
}
