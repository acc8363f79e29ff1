//! The typed CADSTAR PCB archive.
//!
//! This is the output of the upstream raw parser: a fully materialized tree
//! of assignments (layers, codes, technology), the component library, part
//! definitions and the layout. Lengths are in CADSTAR design units
//! (`Technology::units_per_mm` per millimetre); angles are thousandths of a
//! degree; points are raw 64-bit so that extent checks can run before any
//! conversion to 32-bit internal units.

use std::collections::BTreeMap;

use glam::I64Vec2;
use serde::{Deserialize, Serialize};

pub use ecad_geom::VertexKind;

macro_rules! archive_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty() || self.0 == "NONE"
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

archive_id!(LayerId);
archive_id!(MaterialId);
archive_id!(NetId);
archive_id!(NetElementId);
archive_id!(TemplateId);
archive_id!(CopperId);
archive_id!(GroupId);
archive_id!(FigureId);
archive_id!(TextId);
archive_id!(DimensionId);
archive_id!(AreaId);
archive_id!(BoardId);
archive_id!(ComponentId);
archive_id!(SymdefId);
archive_id!(PartId);
archive_id!(AttributeId);
archive_id!(LineCodeId);
archive_id!(CopperCodeId);
archive_id!(PadCodeId);
archive_id!(ViaCodeId);
archive_id!(TextCodeId);
archive_id!(HatchCodeId);
archive_id!(RouteCodeId);
archive_id!(SpacingCodeId);
archive_id!(LayerPairId);

// ---------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    pub header: Header,
    pub assignments: Assignments,
    pub library: Library,
    pub parts: Parts,
    pub layout: Layout,
    /// Attribute-id to display-name mapping.
    pub attribute_names: BTreeMap<AttributeId, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub job_title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignments {
    pub technology: Technology,
    pub layerdefs: LayerDefs,
    pub codedefs: CodeDefs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technology {
    /// CADSTAR design units per millimetre.
    pub units_per_mm: i64,
    /// Maximum design extent from the design origin.
    pub design_limit: I64Vec2,
    /// Bounding box of the used design area.
    pub design_area: (I64Vec2, I64Vec2),
    pub max_physical_layer: u32,
    pub min_route_width: i64,
}

impl Default for Technology {
    fn default() -> Self {
        Technology {
            units_per_mm: 1000,
            design_limit: I64Vec2::ZERO,
            design_area: (I64Vec2::ZERO, I64Vec2::ZERO),
            max_physical_layer: 2,
            min_route_width: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    /// Electrical (signal) layer.
    Elec,
    /// Power plane layer; gets an implicit zone on import.
    Power,
    Jumper,
    /// Dielectric (construction) layer.
    Construction,
    Doc,
    NonElec,
    /// Layer-set pseudo layers.
    AllDoc,
    AllElec,
    AllLayer,
    AssCompCopp,
    NoLayer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayerSubtype {
    #[default]
    None,
    Assembly,
    Placement,
    Paste,
    Silkscreen,
    SolderResist,
    Rout,
    Clearance,
}

/// Direction an electrical layer is considered attached to its adjacent
/// dielectric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Embedding {
    #[default]
    None,
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadstarLayer {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    pub subtype: LayerSubtype,
    /// 1-based physical copper layer number (electrical kinds only).
    pub physical_layer: u32,
    pub thickness: i64,
    pub material: Option<MaterialId>,
    pub embedding: Embedding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub permittivity: f64,
    pub loss_tangent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerDefs {
    /// Layers in physical stack order, top to bottom.
    pub layer_stack: Vec<LayerId>,
    pub layers: BTreeMap<LayerId, CadstarLayer>,
    pub materials: BTreeMap<MaterialId, Material>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeDefs {
    pub spacing_codes: BTreeMap<SpacingCodeId, SpacingCode>,
    pub line_codes: BTreeMap<LineCodeId, LineCode>,
    pub copper_codes: BTreeMap<CopperCodeId, CopperCode>,
    pub pad_codes: BTreeMap<PadCodeId, PadCode>,
    pub via_codes: BTreeMap<ViaCodeId, ViaCode>,
    pub text_codes: BTreeMap<TextCodeId, TextCode>,
    pub hatch_codes: BTreeMap<HatchCodeId, HatchCode>,
    pub route_codes: BTreeMap<RouteCodeId, RouteCode>,
    pub layer_pairs: BTreeMap<LayerPairId, LayerPair>,
}

/// Spacing codes keyed by the conventional rule ids: `T_T` track-to-track,
/// `C_B` copper-to-board, `H_H` hole-to-hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacingCode {
    pub id: SpacingCodeId,
    pub spacing: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCode {
    pub id: LineCodeId,
    pub name: String,
    pub width: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopperCode {
    pub id: CopperCodeId,
    pub name: String,
    pub copper_width: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadShapeKind {
    /// A ring; approximated as a circle on import.
    Annulus,
    /// Chamfered rounded rectangle with offset.
    Bullet,
    Circle,
    /// A square rotated 45 degrees.
    Diamond,
    /// Oval.
    Finger,
    Octagon,
    Rectangle,
    RoundedRect,
    Square,
}

/// Geometric pad shape descriptor shared by pad codes and via codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadShapeDef {
    pub kind: PadShapeKind,
    pub size: i64,
    pub left_length: i64,
    pub right_length: i64,
    /// Corner radius for rounded rectangles.
    pub internal_feature: i64,
    pub orient_angle: i64,
}

impl PadShapeDef {
    pub fn circle(size: i64) -> Self {
        PadShapeDef {
            kind: PadShapeKind::Circle,
            size,
            left_length: 0,
            right_length: 0,
            internal_feature: 0,
            orient_angle: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadCode {
    pub id: PadCodeId,
    pub name: String,
    pub shape: PadShapeDef,
    pub drill_diameter: Option<i64>,
    pub drill_x_offset: i64,
    pub drill_y_offset: i64,
    pub slot_length: Option<i64>,
    /// Orientation of the slot axis relative to the pad, in thousandths of
    /// a degree. Nonzero triggers the custom-pad reconstruction.
    pub slot_orientation: i64,
    pub plated: bool,
    pub relief_clearance: Option<i64>,
    pub relief_width: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViaCode {
    pub id: ViaCodeId,
    pub name: String,
    pub shape: PadShapeDef,
    pub drill_diameter: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCode {
    pub id: TextCodeId,
    pub name: String,
    pub height: i64,
    pub width: i64,
    pub line_width: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hatch {
    pub line_width: i64,
    pub step: i64,
    pub orient_angle: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HatchCode {
    pub id: HatchCodeId,
    pub name: String,
    pub hatches: Vec<Hatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCode {
    pub id: RouteCodeId,
    pub name: String,
    pub optimal_width: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerPair {
    pub id: LayerPairId,
    pub name: String,
    pub physical_layer_start: u32,
    pub physical_layer_end: u32,
}

// ---------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------

/// One vertex record of an outline in raw archive coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadstarVertex {
    pub kind: VertexKind,
    pub end: I64Vec2,
    pub center: I64Vec2,
}

impl CadstarVertex {
    pub fn point(end: I64Vec2) -> Self {
        CadstarVertex { kind: VertexKind::Point, end, center: I64Vec2::ZERO }
    }

    pub fn arc(kind: VertexKind, end: I64Vec2, center: I64Vec2) -> Self {
        CadstarVertex { kind, end, center }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShapeFill {
    /// An open chain of edges.
    #[default]
    OpenShape,
    /// A closed but unfilled outline.
    Outline,
    Solid,
    Hatched,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cutout {
    pub vertices: Vec<CadstarVertex>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CadstarShape {
    pub fill: ShapeFill,
    pub vertices: Vec<CadstarVertex>,
    pub cutouts: Vec<Cutout>,
    pub hatch_code: Option<HatchCodeId>,
}

// ---------------------------------------------------------------------
// Library and parts
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub component_definitions: BTreeMap<SymdefId, SymdefPcb>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymdefPcb {
    pub id: SymdefId,
    pub reference_name: String,
    pub alternate: String,
    pub origin: I64Vec2,
    pub figures: BTreeMap<FigureId, Figure>,
    pub component_coppers: Vec<ComponentCopper>,
    pub component_areas: BTreeMap<AreaId, ComponentArea>,
    /// Pads keyed by their sequential numeric id, so iteration preserves
    /// CADSTAR pad order (pin indices depend on it).
    pub component_pads: BTreeMap<i64, ComponentPad>,
    pub texts: BTreeMap<TextId, CadstarText>,
}

impl SymdefPcb {
    /// The library name of the footprint this symdef produces.
    pub fn footprint_name(&self) -> String {
        if self.alternate.is_empty() {
            self.reference_name.clone()
        } else {
            format!("{} ({})", self.reference_name, self.alternate)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub id: FigureId,
    pub layer: LayerId,
    pub line_code: LineCodeId,
    pub shape: CadstarShape,
    pub group: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentCopper {
    pub copper_code: CopperCodeId,
    pub layer: LayerId,
    pub shape: CadstarShape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentArea {
    pub id: AreaId,
    pub line_code: LineCodeId,
    pub layer: LayerId,
    pub shape: CadstarShape,
    pub no_tracks: bool,
    pub no_vias: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadSide {
    Front,
    Back,
    ThroughHole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPad {
    pub id: i64,
    pub identifier: Option<String>,
    pub pad_code: PadCodeId,
    pub position: I64Vec2,
    pub orient_angle: i64,
    pub side: PadSide,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parts {
    pub part_definitions: BTreeMap<PartId, PartDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartDefinition {
    pub id: PartId,
    pub name: String,
    /// The human part name used for footprint descriptions.
    pub definition_name: String,
    pub pins: BTreeMap<i64, PartPin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartPin {
    pub id: i64,
    pub name: Option<String>,
    pub identifier: Option<String>,
}

// ---------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetSynch {
    #[default]
    Undefined,
    Warning,
    Full,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub net_synch: NetSynch,
    pub nets: BTreeMap<NetId, Net>,
    pub components: BTreeMap<ComponentId, Component>,
    pub templates: BTreeMap<TemplateId, Template>,
    pub coppers: BTreeMap<CopperId, Copper>,
    pub boards: BTreeMap<BoardId, BoardOutline>,
    pub figures: BTreeMap<FigureId, Figure>,
    pub texts: BTreeMap<TextId, CadstarText>,
    pub dimensions: BTreeMap<DimensionId, CadstarDimension>,
    pub areas: BTreeMap<AreaId, Area>,
    pub groups: BTreeMap<GroupId, CadstarGroup>,
    pub documentation_symbols: Vec<DocumentationSymbol>,
    pub variants: BTreeMap<String, Variant>,
    pub reuse_blocks: Vec<ReuseBlock>,
    pub trunks: Vec<Trunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Net {
    pub id: NetId,
    pub name: Option<String>,
    pub signal_num: i64,
    pub route_code: RouteCodeId,
    pub netclass: Option<String>,
    pub spacing_class: Option<String>,
    pub pins: BTreeMap<NetElementId, NetPin>,
    pub vias: BTreeMap<NetElementId, NetVia>,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetPin {
    pub component: ComponentId,
    /// 1-based CADSTAR pad index into the component's footprint.
    pub pad_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetVia {
    pub via_code: ViaCodeId,
    pub layer_pair: LayerPairId,
    pub location: I64Vec2,
    pub fixed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub unrouted: bool,
    pub route: Route,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub layer: LayerId,
    pub start: I64Vec2,
    pub vertices: Vec<RouteVertex>,
}

/// One leg of a route: the geometry vertex plus the track width to use up
/// to its end point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteVertex {
    pub width: i64,
    pub vertex: CadstarVertex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    /// Reference designator.
    pub name: String,
    pub symdef: SymdefId,
    pub part: Option<PartId>,
    pub origin: I64Vec2,
    pub orient_angle: i64,
    pub mirror: bool,
    pub variant_id: Option<String>,
    pub variant_parent: Option<ComponentId>,
    pub pad_exceptions: BTreeMap<i64, PadException>,
    pub attributes: Vec<AttributeValue>,
    pub text_locations: Vec<TextLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PadException {
    pub pad_code: Option<PadCodeId>,
    pub orient_angle: Option<i64>,
    pub side: Option<PadSide>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub attribute: AttributeId,
    pub value: String,
    pub location: Option<AttributeLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeLocation {
    pub position: I64Vec2,
    pub orient_angle: i64,
    pub mirror: bool,
    pub layer: LayerId,
    pub text_code: TextCodeId,
    pub alignment: Alignment,
}

/// A placed attribute text slot (the designator, part name, etc.).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLocation {
    pub attribute: AttributeId,
    pub location: AttributeLocation,
}

/// Well-known attribute ids with special import behaviour.
pub const COMPONENT_NAME_ATTRID: &str = "__COMPONENT_NAME__";
pub const COMPONENT_NAME_2_ATTRID: &str = "__COMPONENT_NAME_2__";
pub const PART_NAME_ATTRID: &str = "__PART_NAME__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    NoAlignment,
    BottomLeft,
    BottomCenter,
    BottomRight,
    CenterLeft,
    CenterCenter,
    CenterRight,
    TopLeft,
    TopCenter,
    TopRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CopperFillType {
    #[default]
    Solid,
    Hatched,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pouring {
    pub fill_type: CopperFillType,
    pub hatch_code: Option<HatchCodeId>,
    pub thermal_relief_on_pads: bool,
    pub thermal_relief_on_vias: bool,
    pub thermal_relief_pads_angle: i64,
    pub thermal_relief_vias_angle: i64,
    pub clearance_width: i64,
    pub relief_copper_code: CopperCodeId,
    pub min_isolated_copper: i64,
    pub min_disjoint_copper: i64,
    pub additional_isolation: i64,
    pub sliver_width: i64,
    pub automatic_repour: bool,
    pub box_isolated_pins: bool,
    pub allow_in_no_routing: bool,
}

/// A region to be filled with copper subject to design rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub layer: LayerId,
    pub net: Option<NetId>,
    pub shape: CadstarShape,
    pub pouring: Pouring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Copper {
    pub id: CopperId,
    pub layer: LayerId,
    pub copper_code: CopperCodeId,
    pub shape: CadstarShape,
    pub net: Option<NetId>,
    /// Set when this copper is a template's computed pour.
    pub poured_template: Option<TemplateId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardOutline {
    pub id: BoardId,
    pub line_code: LineCodeId,
    pub shape: CadstarShape,
    pub group: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadstarText {
    pub id: TextId,
    pub text: String,
    pub position: I64Vec2,
    pub orient_angle: i64,
    pub mirror: bool,
    pub layer: LayerId,
    pub text_code: TextCodeId,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimensionKind {
    Linear,
    Leader,
    Angular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DimensionSubtype {
    #[default]
    Direct,
    Orthogonal,
    Angled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DimensionLineStyle {
    #[default]
    Internal,
    External,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionLine {
    pub start: I64Vec2,
    pub end: I64Vec2,
    pub style: DimensionLineStyle,
    pub leader_angle: i64,
    pub leader_line_length: i64,
    pub leader_line_extension_length: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionLineParams {
    pub start: I64Vec2,
    pub end: I64Vec2,
    pub overshoot: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadstarDimension {
    pub id: DimensionId,
    pub kind: DimensionKind,
    pub subtype: DimensionSubtype,
    pub layer: LayerId,
    pub line: DimensionLine,
    pub extension_line_params: ExtensionLineParams,
    pub text: CadstarText,
    pub precision: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
    pub line_code: LineCodeId,
    pub layer: LayerId,
    pub shape: CadstarShape,
    pub keepout: bool,
    pub no_tracks: bool,
    pub no_vias: bool,
    pub routing: bool,
    pub placement: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadstarGroup {
    pub id: GroupId,
    pub name: String,
    pub fixed: bool,
    /// Parent group for nested groups.
    pub parent: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationSymbol {
    pub symdef: SymdefId,
    pub origin: I64Vec2,
    pub orient_angle: i64,
    pub mirror: bool,
    pub scale_ratio_numerator: i64,
    pub scale_ratio_denominator: i64,
    pub layer: LayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReuseBlock {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trunk {
    pub id: String,
}
