mod components;
mod dimensions;
mod geometry;
mod layers;
mod library;
mod nets;
mod stackup;
mod zones;

use std::collections::{BTreeMap, BTreeSet};

use ecad_board::{Board, Footprint, Layer, LayerSet, NetCode};
use ecad_core::{Diagnostics, Kiid, ProgressReporter, PCB_IU_PER_MM};
use glam::{I64Vec2, IVec2};

use crate::archive::*;
use crate::error::ImportError;

/// Description of a layer the importer could not confidently map, handed to
/// the application's remapping callback.
#[derive(Debug, Clone)]
pub struct InputLayerDesc {
    pub name: String,
    pub permitted_layers: LayerSet,
    pub auto_map_layer: Layer,
}

/// Application-provided callback that reassigns ambiguous layers. The
/// returned map is keyed by CADSTAR layer name.
pub type LayerMappingHandler<'h> = dyn FnMut(&[InputLayerDesc]) -> BTreeMap<String, Layer> + 'h;

#[derive(Default)]
pub struct ImportOptions<'h> {
    /// Interactive reassignment of ambiguous non-copper layers.
    pub layer_mapping_handler: Option<Box<LayerMappingHandler<'h>>>,
    /// Suppress the per-layer informational messages (bulk imports).
    pub quiet_layer_mapping: bool,
}

/// Number of top-level import steps, for progress reporting.
const LOAD_STEPS: u64 = 16;

/// The CADSTAR-to-KiCad board translator.
///
/// Owns the parsed archive for the duration of the import; the board being
/// populated and the diagnostic sink are the caller's.
pub struct CadstarPcbLoader<'d> {
    pub(crate) archive: Archive,
    pub(crate) diag: &'d mut Diagnostics,
    pub(crate) progress: Option<&'d mut dyn ProgressReporter>,
    pub(crate) opts: ImportOptions<'d>,

    pub(crate) design_center: I64Vec2,
    pub(crate) total_copper_layers: u32,
    pub(crate) layer_map: BTreeMap<LayerId, Layer>,
    pub(crate) copper_layers: BTreeMap<u32, LayerId>,
    pub(crate) power_plane_layers: Vec<LayerId>,
    pub(crate) library: BTreeMap<SymdefId, Footprint>,
    /// Component id to index into `Board::footprints`.
    pub(crate) component_map: BTreeMap<ComponentId, usize>,
    pub(crate) net_map: BTreeMap<NetId, NetCode>,
    pub(crate) netclass_map: BTreeMap<RouteCodeId, String>,
    /// Template id to index into `Board::zones`.
    pub(crate) loaded_templates: BTreeMap<TemplateId, usize>,
    /// Group id to index into `Board::groups`.
    pub(crate) group_map: BTreeMap<GroupId, usize>,
    pub(crate) padcodes_warned: BTreeSet<PadCodeId>,
    pub(crate) copper_warning_done: bool,
    pub(crate) netclass_warning_done: bool,
    pub(crate) spacing_class_warning_done: bool,
}

impl<'d> CadstarPcbLoader<'d> {
    pub fn new(archive: Archive, diag: &'d mut Diagnostics) -> Self {
        CadstarPcbLoader {
            archive,
            diag,
            progress: None,
            opts: ImportOptions::default(),
            design_center: I64Vec2::ZERO,
            total_copper_layers: 0,
            layer_map: BTreeMap::new(),
            copper_layers: BTreeMap::new(),
            power_plane_layers: Vec::new(),
            library: BTreeMap::new(),
            component_map: BTreeMap::new(),
            net_map: BTreeMap::new(),
            netclass_map: BTreeMap::new(),
            loaded_templates: BTreeMap::new(),
            group_map: BTreeMap::new(),
            padcodes_warned: BTreeSet::new(),
            copper_warning_done: false,
            netclass_warning_done: false,
            spacing_class_warning_done: false,
        }
    }

    pub fn with_options(mut self, opts: ImportOptions<'d>) -> Self {
        self.opts = opts;
        self
    }

    pub fn with_progress(mut self, progress: &'d mut dyn ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the whole import. On error the board contents are unspecified
    /// and must be discarded by the caller.
    pub fn load(&mut self, board: &mut Board) -> Result<(), ImportError> {
        // Sanity-check design extents before any coordinate conversion: the
        // diagonal in internal units must fit an i32.
        let mult = self.iu_per_unit();
        let limit = self.archive.assignments.technology.design_limit;
        let size_x = limit.x as f64 * mult;
        let size_y = limit.y as f64 * mult;
        let max = i32::MAX as f64;

        if size_x > max || size_y > max {
            return Err(ImportError::DesignTooLarge {
                width_mm: size_x / PCB_IU_PER_MM,
                height_mm: size_y / PCB_IU_PER_MM,
                max_mm: max / PCB_IU_PER_MM,
            });
        }

        let (lo, hi) = self.archive.assignments.technology.design_area;
        self.design_center = (lo + hi) / 2;

        if self.archive.layout.net_synch == NetSynch::Warning {
            self.diag.warn(
                "The selected file indicates that nets might be out of synchronisation \
                 with the schematic. It is recommended that you carry out an 'Align Nets' \
                 procedure and re-import, to avoid inconsistencies between the PCB and the \
                 schematic.",
            );
        }

        self.checkpoint(1)?;
        self.load_board_stackup(board)?;
        self.checkpoint(2)?;
        self.remap_unsure_layers(board)?;
        self.checkpoint(3)?;
        self.load_design_rules(board)?;
        self.checkpoint(4)?;
        self.load_component_library(board)?;
        self.checkpoint(5)?;
        self.load_groups(board)?;
        self.checkpoint(6)?;
        self.load_boards(board)?;
        self.checkpoint(7)?;
        self.load_figures(board)?;
        self.checkpoint(8)?;
        self.load_texts(board)?;
        self.checkpoint(9)?;
        self.load_dimensions(board)?;
        self.checkpoint(10)?;
        self.load_areas(board)?;
        self.checkpoint(11)?;
        self.load_components(board)?;
        self.checkpoint(12)?;
        self.load_documentation_symbols(board)?;
        self.checkpoint(13)?;
        self.load_templates(board)?;
        self.load_coppers(board)?;
        self.checkpoint(14)?;
        self.calculate_zone_priorities(board)?;
        self.checkpoint(15)?;
        self.load_nets(board)?;
        self.checkpoint(16)?;
        self.load_text_variables(board)?;

        if !self.archive.layout.trunks.is_empty() {
            self.diag.warn(
                "The CADSTAR design contains Trunk routing elements, which have no KiCad \
                 equivalent. These elements were not loaded.",
            );
        }

        if let Some(variant) = self.archive.layout.variants.values().next() {
            self.diag.warn(format!(
                "The CADSTAR design contains variants which has no KiCad equivalent. Only \
                 the variant '{}' was loaded.",
                variant.name
            ));
        }

        if !self.archive.layout.reuse_blocks.is_empty() {
            self.diag.warn(
                "The CADSTAR design contains re-use blocks which has no KiCad equivalent. \
                 The re-use block information has been discarded during the import.",
            );
        }

        self.diag.message(
            "The CADSTAR design has been imported successfully.\n\
             Please review the import errors and warnings (if any).",
        );

        Ok(())
    }

    // ------------------------------------------------------------------
    // Conversions
    // ------------------------------------------------------------------

    pub(crate) fn iu_per_unit(&self) -> f64 {
        PCB_IU_PER_MM / self.archive.assignments.technology.units_per_mm as f64
    }

    /// A raw archive length in internal units, clamped like every other
    /// length in the document model.
    pub(crate) fn length(&self, raw: i64) -> i32 {
        let limit = i32::MAX as f64 * 0.7071;
        (raw as f64 * self.iu_per_unit()).clamp(-limit, limit).round() as i32
    }

    /// A raw archive point converted to board coordinates: design-centred
    /// and Y-inverted.
    pub(crate) fn point(&self, p: I64Vec2) -> IVec2 {
        let mult = self.iu_per_unit();
        let rel = p - self.design_center;
        IVec2::new(
            (rel.x as f64 * mult).round() as i32,
            -(rel.y as f64 * mult).round() as i32,
        )
    }

    /// Thousandths of a degree to degrees.
    pub(crate) fn angle_deg(raw: i64) -> f64 {
        raw as f64 / 1000.0
    }

    /// Cooperative cancellation check at the start of each numbered step.
    pub(crate) fn checkpoint(&mut self, step: u64) -> Result<(), ImportError> {
        if let Some(progress) = self.progress.as_deref_mut() {
            progress.report_progress(step, LOAD_STEPS);

            if progress.should_cancel() {
                return Err(ImportError::Canceled);
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Archive lookups
    // ------------------------------------------------------------------

    pub(crate) fn cadstar_layer(&self, id: &LayerId) -> Result<&CadstarLayer, ImportError> {
        self.archive
            .assignments
            .layerdefs
            .layers
            .get(id)
            .ok_or_else(|| ImportError::Corrupt(format!("unknown layer id '{id}'")))
    }

    pub(crate) fn line_thickness(&self, id: &LineCodeId) -> i32 {
        self.archive
            .assignments
            .codedefs
            .line_codes
            .get(id)
            .map(|c| self.length(c.width))
            .unwrap_or_else(|| self.length(0))
    }

    pub(crate) fn copper_code(&self, id: &CopperCodeId) -> Result<&CopperCode, ImportError> {
        self.archive
            .assignments
            .codedefs
            .copper_codes
            .get(id)
            .ok_or_else(|| ImportError::Corrupt(format!("unknown copper code '{id}'")))
    }

    pub(crate) fn pad_code(&self, id: &PadCodeId) -> Result<&PadCode, ImportError> {
        self.archive
            .assignments
            .codedefs
            .pad_codes
            .get(id)
            .ok_or_else(|| ImportError::Corrupt(format!("unknown pad code '{id}'")))
    }

    pub(crate) fn via_code(&self, id: &ViaCodeId) -> Result<&ViaCode, ImportError> {
        self.archive
            .assignments
            .codedefs
            .via_codes
            .get(id)
            .ok_or_else(|| ImportError::Corrupt(format!("unknown via code '{id}'")))
    }

    pub(crate) fn text_code(&self, id: &TextCodeId) -> Result<&TextCode, ImportError> {
        self.archive
            .assignments
            .codedefs
            .text_codes
            .get(id)
            .ok_or_else(|| ImportError::Corrupt(format!("unknown text code '{id}'")))
    }

    pub(crate) fn hatch_code(&self, id: &HatchCodeId) -> Option<&HatchCode> {
        self.archive.assignments.codedefs.hatch_codes.get(id)
    }

    pub(crate) fn route_code(&self, id: &RouteCodeId) -> Option<&RouteCode> {
        self.archive.assignments.codedefs.route_codes.get(id)
    }

    pub(crate) fn layer_pair(&self, id: &LayerPairId) -> Result<&LayerPair, ImportError> {
        self.archive
            .assignments
            .codedefs
            .layer_pairs
            .get(id)
            .ok_or_else(|| ImportError::Corrupt(format!("unknown layer pair '{id}'")))
    }

    pub(crate) fn attribute_name(&self, id: &AttributeId) -> String {
        self.archive
            .attribute_names
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.0.clone())
    }

    // ------------------------------------------------------------------
    // Layer mapping (§ layer-set duplication lives in geometry.rs)
    // ------------------------------------------------------------------

    /// Whether this id names a layer-set pseudo layer ("all doc layers",
    /// "all electrical", "all layers").
    pub(crate) fn is_layer_set(&self, id: &LayerId) -> bool {
        self.cadstar_layer(id)
            .map(|l| matches!(l.kind, LayerKind::AllDoc | LayerKind::AllElec | LayerKind::AllLayer))
            .unwrap_or(false)
    }

    /// The single KiCad layer this CADSTAR layer maps to. The "no layer"
    /// pseudo layer of documentation symbols and unmapped layers fall back
    /// to the drawings layer.
    pub(crate) fn kicad_layer(&self, id: &LayerId) -> Layer {
        if let Ok(layer) = self.cadstar_layer(id) {
            if layer.kind == LayerKind::NoLayer {
                return Layer::DwgsUser;
            }
        }

        match self.layer_map.get(id) {
            Some(layer) => *layer,
            None => {
                log::debug!("no layer mapping for '{id}', using Dwgs.User");
                Layer::DwgsUser
            }
        }
    }

    /// The layer set this CADSTAR layer expands to. Layer-set pseudo layers
    /// duplicate shapes onto every member layer.
    pub(crate) fn kicad_layer_set(&self, id: &LayerId) -> LayerSet {
        match self.cadstar_layer(id).map(|l| l.kind) {
            Ok(LayerKind::AllDoc) => LayerSet::all_documentation(),
            Ok(LayerKind::AllElec) => LayerSet::all_copper(self.total_copper_layers),
            Ok(LayerKind::AllLayer) => LayerSet::all(self.total_copper_layers),
            _ => LayerSet::single(self.kicad_layer(id)),
        }
    }

    pub(crate) fn kicad_copper_layer(&self, physical: u32) -> Layer {
        Layer::copper(physical, self.archive.assignments.technology.max_physical_layer)
            .unwrap_or(Layer::BCu)
    }

    // ------------------------------------------------------------------
    // Nets
    // ------------------------------------------------------------------

    /// Resolve (or create) the board net for a CADSTAR net id. Unnamed nets
    /// are named after their first pin; net classes are derived from route
    /// codes.
    pub(crate) fn kicad_net(
        &mut self,
        board: &mut Board,
        id: &NetId,
    ) -> Result<Option<NetCode>, ImportError> {
        if id.is_empty() {
            return Ok(None);
        }

        if let Some(code) = self.net_map.get(id) {
            return Ok(Some(*code));
        }

        let net = self
            .archive
            .layout
            .nets
            .get(id)
            .ok_or_else(|| ImportError::Corrupt(format!("unknown net id '{id}'")))?
            .clone();

        let name = match &net.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => {
                if let Some(first_pin) = net.pins.values().next() {
                    // Default naming from the first pin; the component was
                    // loaded by load_components.
                    let reference = self
                        .component_map
                        .get(&first_pin.component)
                        .and_then(|&idx| board.footprints.get(idx))
                        .map(|fp| fp.reference.clone())
                        .unwrap_or_default();

                    format!("Net-({reference}-Pad{})", first_pin.pad_id)
                } else {
                    log::debug!("net '{id}' has no name and no pins");
                    format!("csNet-{}", net.signal_num)
                }
            }
        };

        if !self.netclass_warning_done
            && net.netclass.as_deref().is_some_and(|nc| !nc.is_empty() && nc != "NONE")
        {
            self.diag.message(
                "The CADSTAR design contains nets with a 'Net Class' assigned. KiCad does \
                 not have an equivalent to CADSTAR's Net Class so these elements were not \
                 imported. Note: KiCad's version of 'Net Class' is closer to CADSTAR's \
                 'Net Route Code' (which has been imported for all nets).",
            );
            self.netclass_warning_done = true;
        }

        if !self.spacing_class_warning_done
            && net.spacing_class.as_deref().is_some_and(|sc| !sc.is_empty() && sc != "NONE")
        {
            self.diag.warn(
                "The CADSTAR design contains nets with a 'Spacing Class' assigned. KiCad \
                 does not have an equivalent to CADSTAR's Spacing Class so these elements \
                 were not imported. Please review the design rules as copper pours will be \
                 affected by this.",
            );
            self.spacing_class_warning_done = true;
        }

        let netclass_name = match self.netclass_map.get(&net.route_code) {
            Some(name) => Some(name.clone()),
            None => match self.route_code(&net.route_code).cloned() {
                Some(rc) => {
                    let netclass = ecad_board::NetClass {
                        name: rc.name.clone(),
                        track_width: self.length(rc.optimal_width),
                        clearance: 0,
                    };
                    board.netclasses.insert(rc.name.clone(), netclass);
                    self.netclass_map.insert(net.route_code.clone(), rc.name.clone());
                    Some(rc.name)
                }
                None => None,
            },
        };

        let code = board.add_net(name, netclass_name);
        self.net_map.insert(id.clone(), code);
        Ok(Some(code))
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    pub(crate) fn add_to_group(&mut self, board: &mut Board, group: &GroupId, item: Kiid) {
        let Some(&idx) = self.group_map.get(group) else {
            log::debug!("item added to unknown group '{group}'");
            return;
        };

        board.groups[idx].members.push(item);
    }

    /// Create a synthetic group with a unique name (`Board`, `Board_1`, ...)
    /// and return its id.
    pub(crate) fn create_unique_group(&mut self, board: &mut Board, base: &str) -> GroupId {
        let mut name = base.to_owned();
        let mut n = 0;

        while self.group_map.contains_key(&GroupId::new(name.clone())) {
            n += 1;
            name = format!("{base}_{n}");
        }

        let group = ecad_board::BoardGroup::new(name.clone());
        board.groups.push(group);

        let id = GroupId::new(name);
        self.group_map.insert(id.clone(), board.groups.len() - 1);
        id
    }
}
