use std::collections::BTreeMap;

use ecad_board::{
    Board, BoardStackup, CopperKind, DielectricForm, DielectricSublayer, Layer, StackupLayer,
};

use crate::archive::*;
use crate::error::ImportError;

use super::CadstarPcbLoader;

/// An electrical layer together with the dielectric (construction) layers
/// immediately below it in the stack.
#[derive(Debug, Default, Clone)]
struct LayerBlock {
    /// Normally present; empty only for dummy balancing layers or when the
    /// stack starts with a construction layer.
    elec: Option<LayerId>,
    /// Normally empty for the last electrical layer, but boards can be
    /// built with the bottom layer being a construction layer.
    construction: Vec<LayerId>,
}

impl LayerBlock {
    fn is_initialised(&self) -> bool {
        self.elec.is_some() || !self.construction.is_empty()
    }
}

impl<'d> CadstarPcbLoader<'d> {
    /// Build the KiCad stackup from the CADSTAR layer stack (§ stackup
    /// construction): gather copper blocks, pad the stack to an even copper
    /// count with zero-thickness dummies, and classify dielectrics as core
    /// or prepreg from the embedding direction of the adjacent coppers.
    pub(super) fn load_board_stackup(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let stack: Vec<LayerId> = self.archive.assignments.layerdefs.layer_stack.clone();

        let mut blocks: Vec<LayerBlock> = Vec::new();
        let mut current = LayerBlock::default();

        for id in &stack {
            let layer = self.cadstar_layer(id)?;

            match layer.kind {
                LayerKind::Jumper | LayerKind::Power | LayerKind::Elec => {
                    if current.is_initialised() {
                        blocks.push(std::mem::take(&mut current));
                    }
                    current.elec = Some(id.clone());
                }
                LayerKind::Construction => current.construction.push(id.clone()),
                _ => {}
            }
        }

        if current.is_initialised() {
            blocks.push(current);
        }

        if blocks.is_empty() {
            return Err(ImportError::Corrupt("no electrical layers in the stackup".to_owned()));
        }

        // Thickness overrides for a dielectric that had to be split in two.
        let mut halved: BTreeMap<LayerId, i64> = BTreeMap::new();

        // The last block must not have trailing dielectrics; absorb them
        // into a dummy electrical layer.
        if !blocks.last().unwrap().construction.is_empty() {
            blocks.push(LayerBlock::default());
        }

        // KiCad does not support unbalanced stackups: pad an odd copper
        // count by splitting the second-to-last block's dielectric around a
        // dummy copper layer, keeping all other layer indices unchanged.
        if blocks.len() % 2 != 0 {
            let bottom = blocks.pop().unwrap();
            let mut second_to_last = blocks.pop().unwrap();

            let last_construction = second_to_last
                .construction
                .last()
                .cloned()
                .ok_or_else(|| {
                    ImportError::Corrupt("stackup has no dielectric to split".to_owned())
                })?;

            if second_to_last.construction.len() > 1 {
                // At least two construction layers: move one to the dummy.
                second_to_last.construction.pop();
            } else {
                // Only one: halve its thickness so it splits evenly between
                // this layer and the dummy.
                let thickness = self.cadstar_layer(&last_construction)?.thickness;
                halved.insert(last_construction.clone(), thickness / 2);
            }

            let dummy = LayerBlock { elec: None, construction: vec![last_construction] };

            blocks.push(second_to_last);
            blocks.push(dummy);
            blocks.push(bottom);
        }

        let total_copper = blocks.len() as u32;
        debug_assert!(total_copper % 2 == 0);
        debug_assert!(blocks.last().unwrap().construction.is_empty());

        self.total_copper_layers = total_copper;
        board.set_copper_layer_count(total_copper);

        let mut stackup = BoardStackup::default();

        for (index, block) in blocks.iter().enumerate() {
            let board_layer = Layer::copper(index as u32 + 1, total_copper)
                .ok_or_else(|| ImportError::Corrupt("too many copper layers".to_owned()))?;

            match &block.elec {
                None => {
                    // Dummy layer: zero thickness so it doesn't affect the
                    // overall stackup.
                    stackup.layers.push(StackupLayer::Copper {
                        layer: board_layer,
                        name: board_layer.to_string(),
                        kind: CopperKind::Signal,
                        thickness: 0,
                    });
                }
                Some(elec_id) => {
                    let copper = self.cadstar_layer(elec_id)?.clone();

                    let kind = match copper.kind {
                        LayerKind::Jumper => CopperKind::Jumper,
                        LayerKind::Elec => CopperKind::Signal,
                        LayerKind::Power => {
                            // Power layers also get an implicit copper zone.
                            self.power_plane_layers.push(copper.id.clone());
                            CopperKind::Power
                        }
                        _ => {
                            return Err(ImportError::Corrupt(format!(
                                "layer '{}' is not an electrical layer",
                                copper.name
                            )))
                        }
                    };

                    stackup.layers.push(StackupLayer::Copper {
                        layer: board_layer,
                        name: copper.name.clone(),
                        kind,
                        thickness: self.length(copper.thickness),
                    });

                    board.set_layer_name(board_layer, copper.name.clone());
                    board.set_layer_type(board_layer, kind);
                    self.copper_layers.insert(copper.physical_layer, copper.id.clone());
                    self.layer_map.insert(copper.id.clone(), board_layer);
                }
            }

            if block.construction.is_empty() {
                continue;
            }

            let form = self.dielectric_form(block, blocks.get(index + 1))?;
            let mut sublayers = Vec::new();

            for construction_id in &block.construction {
                let dielectric = self.cadstar_layer(construction_id)?.clone();

                let thickness = halved
                    .get(construction_id)
                    .copied()
                    .unwrap_or(dielectric.thickness);

                let material = dielectric
                    .material
                    .as_ref()
                    .and_then(|id| self.archive.assignments.layerdefs.materials.get(id));

                sublayers.push(DielectricSublayer {
                    name: dielectric.name.clone(),
                    thickness: self.length(thickness),
                    material: material.map(|m| m.name.clone()),
                    epsilon_r: material.map(|m| m.permittivity),
                    loss_tangent: material.map(|m| m.loss_tangent),
                });

                // Items referencing a construction layer land on the copper
                // layer directly above it.
                self.layer_map.insert(construction_id.clone(), board_layer);
            }

            stackup.layers.push(StackupLayer::Dielectric { form, sublayers });
        }

        board.stackup = stackup;

        self.map_non_electrical_layers(&stack)?;
        Ok(())
    }

    /// Core or prepreg: two copper layers embedding toward each other make
    /// a core; everything else reads as prepreg.
    fn dielectric_form(
        &self,
        block: &LayerBlock,
        block_below: Option<&LayerBlock>,
    ) -> Result<DielectricForm, ImportError> {
        let Some(elec_id) = &block.elec else {
            // Dummy electrical layer above: assume prepreg.
            return Ok(DielectricForm::Prepreg);
        };

        let copper = self.cadstar_layer(elec_id)?;

        if copper.embedding != Embedding::Above {
            return Ok(DielectricForm::Prepreg);
        }

        match block_below.and_then(|b| b.elec.as_ref()) {
            // Dummy layer below: the current layer alone decides.
            None => Ok(DielectricForm::Core),
            Some(below_id) => {
                let below = self.cadstar_layer(below_id)?;

                if below.embedding == Embedding::Below {
                    Ok(DielectricForm::Core)
                } else {
                    Ok(DielectricForm::Prepreg)
                }
            }
        }
    }

    /// Map non-copper layers onto technical layers. Front or back side is
    /// decided by whether any electrical layer has been walked past yet.
    fn map_non_electrical_layers(&mut self, stack: &[LayerId]) -> Result<(), ImportError> {
        enum Log {
            None,
            Msg,
            Warn,
        }

        let mut seen_electrical = 0u32;

        for id in stack {
            let layer = self.cadstar_layer(id)?.clone();
            let lower_name = layer.name.to_lowercase();

            let on_back = seen_electrical > 0;
            let select = move |front: Layer, back: Layer| if on_back { back } else { front };

            let (mapped, log_level) = match layer.kind {
                LayerKind::AllDoc
                | LayerKind::AllElec
                | LayerKind::AllLayer
                | LayerKind::AssCompCopp
                | LayerKind::NoLayer => {
                    // Shouldn't be in the stack if the archive parsed
                    // correctly.
                    return Err(ImportError::Corrupt(format!(
                        "Unexpected layer '{}' in layer stack.",
                        layer.name
                    )));
                }

                LayerKind::Jumper | LayerKind::Elec | LayerKind::Power => {
                    seen_electrical += 1;
                    continue; // dealt with while building the stackup
                }
                LayerKind::Construction => continue,

                LayerKind::Doc => (select(Layer::DwgsUser, Layer::CmtsUser), Log::Warn),

                LayerKind::NonElec => match layer.subtype {
                    LayerSubtype::Assembly => (select(Layer::FFab, Layer::BFab), Log::None),
                    LayerSubtype::Placement => (select(Layer::FCrtYd, Layer::BCrtYd), Log::None),
                    LayerSubtype::Paste => (select(Layer::FPaste, Layer::BPaste), Log::Msg),
                    LayerSubtype::Silkscreen => (select(Layer::FSilkS, Layer::BSilkS), Log::Msg),
                    LayerSubtype::SolderResist => (select(Layer::FMask, Layer::BMask), Log::Msg),
                    LayerSubtype::Rout | LayerSubtype::Clearance => {
                        // Unclear what these are used for; park them on the
                        // Eco layers.
                        (select(Layer::Eco1User, Layer::Eco2User), Log::Warn)
                    }
                    LayerSubtype::None => {
                        // Generic non-electrical layer (older CADSTAR
                        // versions). Detect technical layers by name.
                        if lower_name.contains("glue") || lower_name.contains("adhesive") {
                            (select(Layer::FAdhes, Layer::BAdhes), Log::Msg)
                        } else if lower_name.contains("silk") || lower_name.contains("legend") {
                            (select(Layer::FSilkS, Layer::BSilkS), Log::Msg)
                        } else if lower_name.contains("assembly")
                            || lower_name.contains("fabrication")
                        {
                            (select(Layer::FFab, Layer::BFab), Log::Msg)
                        } else if lower_name.contains("resist") || lower_name.contains("mask") {
                            (select(Layer::FMask, Layer::BMask), Log::Msg)
                        } else if lower_name.contains("paste") {
                            (select(Layer::FPaste, Layer::BPaste), Log::Msg)
                        } else {
                            (select(Layer::Eco1User, Layer::Eco2User), Log::Warn)
                        }
                    }
                },
            };

            if !self.opts.quiet_layer_mapping {
                match log_level {
                    Log::None => {}
                    Log::Msg => self.diag.message(format!(
                        "The CADSTAR layer '{}' has been assumed to be a technical layer. \
                         All elements on this layer have been mapped to KiCad layer '{mapped}'.",
                        layer.name
                    )),
                    Log::Warn => self.diag.warn(format!(
                        "The CADSTAR layer '{}' has no KiCad equivalent. All elements on \
                         this layer have been mapped to KiCad layer '{mapped}' instead.",
                        layer.name
                    )),
                }
            }

            self.layer_map.insert(id.clone(), mapped);
        }

        Ok(())
    }
}
