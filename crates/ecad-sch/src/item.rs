use ecad_core::{Kiid, LibId};
use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::bitmap::Bitmap;
use crate::document::{SheetInstanceData, SymbolInstanceData};
use crate::field::{Field, FieldId};
use crate::shape::Shape;
use crate::stroke::{Color, FillParams, StrokeParams};
use crate::text::TextEffects;

/// One item on a schematic sheet: a UUID plus the item payload. Draw items
/// are a tagged sum rather than a class hierarchy; operations that behave
/// uniformly dispatch on the tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchItem {
    pub uuid: Kiid,
    pub kind: SchItemKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchItemKind {
    Symbol(SymbolInstance),
    Sheet(Sheet),
    Junction(Junction),
    NoConnect(NoConnect),
    BusEntry(BusEntry),
    Line(Line),
    Shape(Shape),
    Text(SchText),
    Label(Label),
    TextBox(TextBox),
    Table(Table),
    Bitmap(Bitmap),
    RuleArea(RuleArea),
    Group(Group),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mirror {
    X,
    Y,
}

/// How a symbol instance is linked to its library symbol after the
/// post-parse resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SymbolLink {
    /// Not yet resolved (during parse).
    #[default]
    Unresolved,
    /// Resolved to the named entry of the document's library map.
    Resolved(String),
    /// Library symbol missing; a sentinel dummy was substituted and the
    /// instance is flagged.
    Dummy,
}

/// Reference to a pin on a placed symbol, with an optional alternate
/// assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstancePin {
    pub number: String,
    pub alternate: Option<String>,
    pub uuid: Kiid,
}

/// One placement of a library symbol on the sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInstance {
    pub lib_id: LibId,
    /// Schematic-local cache name, set when it differs from the lib id.
    pub lib_name: Option<String>,
    pub position: IVec2,
    pub orientation_deg: i32,
    pub mirror: Option<Mirror>,
    pub unit: i32,
    pub body_style: i32,
    pub excluded_from_sim: bool,
    pub excluded_from_bom: bool,
    pub excluded_from_board: bool,
    pub excluded_from_pos_files: bool,
    pub dnp: bool,
    pub fields_autoplaced: bool,
    pub fields: Vec<Field>,
    pub pins: Vec<InstancePin>,
    /// Per-sheet instance data (reference, unit, value, footprint keyed by
    /// hierarchical path).
    pub instances: Vec<SymbolInstanceData>,
    pub link: SymbolLink,
}

impl SymbolInstance {
    pub fn new() -> Self {
        SymbolInstance {
            lib_id: LibId::default(),
            lib_name: None,
            position: IVec2::ZERO,
            orientation_deg: 0,
            mirror: None,
            unit: 1,
            body_style: 1,
            excluded_from_sim: false,
            excluded_from_bom: false,
            excluded_from_board: false,
            excluded_from_pos_files: false,
            dnp: false,
            fields_autoplaced: false,
            fields: Vec::new(),
            pins: Vec::new(),
            instances: Vec::new(),
            link: SymbolLink::Unresolved,
        }
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn field_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn reference(&self) -> &str {
        self.field(FieldId::Reference).map(|f| f.text.as_str()).unwrap_or("")
    }

    pub fn set_field_text(&mut self, id: FieldId, text: impl Into<String>) {
        if let Some(field) = self.field_mut(id) {
            field.text = text.into();
        } else {
            let name = id.canonical_name().unwrap_or_default();
            let mut field = Field::new(id, name);
            field.text = text.into();
            self.fields.push(field);
        }
    }
}

impl Default for SymbolInstance {
    fn default() -> Self {
        SymbolInstance::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetSide {
    Right,
    Top,
    Left,
    Bottom,
}

/// Shape drawn at the end of a label or sheet pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LabelShape {
    Input,
    Output,
    Bidirectional,
    TriState,
    #[default]
    Passive,
    Dot,
    Round,
    Diamond,
    Rectangle,
}

impl LabelShape {
    pub fn from_token(tok: &str) -> Option<Self> {
        Some(match tok {
            "input" => LabelShape::Input,
            "output" => LabelShape::Output,
            "bidirectional" => LabelShape::Bidirectional,
            "tri_state" => LabelShape::TriState,
            "passive" => LabelShape::Passive,
            "dot" => LabelShape::Dot,
            "round" => LabelShape::Round,
            "diamond" => LabelShape::Diamond,
            "rectangle" => LabelShape::Rectangle,
            _ => return None,
        })
    }

    /// Connection shapes only, as used by sheet pins.
    pub fn connection_from_token(tok: &str) -> Option<Self> {
        match tok {
            "input" | "output" | "bidirectional" | "tri_state" | "passive" => {
                LabelShape::from_token(tok)
            }
            _ => None,
        }
    }
}

/// A pin on the edge of a sheet, corresponding to a hierarchical label
/// inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetPin {
    pub uuid: Kiid,
    pub name: String,
    pub shape: LabelShape,
    pub position: IVec2,
    pub side: SheetSide,
    pub effects: TextEffects,
}

/// A sub-sheet reference. The two mandatory fields are the sheet name and
/// the sheet file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub position: IVec2,
    pub size: IVec2,
    pub border: StrokeParams,
    pub background: Option<Color>,
    pub fields: Vec<Field>,
    pub pins: Vec<SheetPin>,
    pub instances: Vec<SheetInstanceData>,
    pub excluded_from_sim: bool,
    pub excluded_from_bom: bool,
    pub excluded_from_board: bool,
    pub dnp: bool,
    pub fields_autoplaced: bool,
}

impl Sheet {
    pub fn new() -> Self {
        Sheet {
            position: IVec2::ZERO,
            size: IVec2::ZERO,
            border: StrokeParams::schematic_default(),
            background: None,
            fields: Vec::new(),
            pins: Vec::new(),
            instances: Vec::new(),
            excluded_from_sim: false,
            excluded_from_bom: false,
            excluded_from_board: false,
            dnp: false,
            fields_autoplaced: false,
        }
    }

    pub fn name(&self) -> &str {
        self.fields
            .iter()
            .find(|f| f.id == FieldId::SheetName)
            .map(|f| f.text.as_str())
            .unwrap_or("")
    }

    pub fn file_name(&self) -> &str {
        self.fields
            .iter()
            .find(|f| f.id == FieldId::SheetFilename)
            .map(|f| f.text.as_str())
            .unwrap_or("")
    }
}

impl Default for Sheet {
    fn default() -> Self {
        Sheet::new()
    }
}

/// Wire/bus junction dot. A diameter of zero means "use the default size".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    pub position: IVec2,
    pub diameter: i32,
    pub color: Option<Color>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoConnect {
    pub position: IVec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEntry {
    pub position: IVec2,
    pub size: IVec2,
    pub stroke: StrokeParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineLayer {
    Wire,
    Bus,
    Notes,
}

/// A straight connectable segment (wire or bus) or a plain graphic line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub layer: LineLayer,
    pub start: IVec2,
    pub end: IVec2,
    pub stroke: StrokeParams,
}

/// Free schematic text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchText {
    pub text: String,
    pub position: IVec2,
    pub angle_deg: f64,
    pub effects: TextEffects,
    pub excluded_from_sim: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelKind {
    Plain,
    Global,
    Hierarchical,
    Directive,
}

/// Net label of any flavour. Global labels carry the mandatory intersheet
/// references field; directive labels carry a pin length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub kind: LabelKind,
    pub text: String,
    pub position: IVec2,
    pub angle_deg: f64,
    pub shape: LabelShape,
    pub effects: TextEffects,
    pub fields: Vec<Field>,
    pub fields_autoplaced: bool,
    /// Directive labels only.
    pub pin_length: i32,
    pub excluded_from_sim: bool,
}

impl Label {
    pub fn new(kind: LabelKind) -> Self {
        let mut label = Label {
            kind,
            text: String::new(),
            position: IVec2::ZERO,
            angle_deg: 0.0,
            shape: LabelShape::default(),
            effects: TextEffects::default(),
            fields: Vec::new(),
            fields_autoplaced: false,
            pin_length: 0,
            excluded_from_sim: false,
        };

        if kind == LabelKind::Global {
            let mut field = Field::new(FieldId::IntersheetRefs, "Intersheetrefs");
            field.effects.visible = false;
            label.fields.push(field);
        }

        label
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn field_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == id)
    }
}

/// A bordered, fillable text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub text: String,
    pub start: IVec2,
    pub end: IVec2,
    pub angle_deg: f64,
    pub stroke: StrokeParams,
    pub fill: FillParams,
    pub effects: TextEffects,
    /// Left, top, right, bottom.
    pub margins: [i32; 4],
    pub excluded_from_sim: bool,
    pub unit: i32,
    pub body_style: i32,
    pub private: bool,
}

impl TextBox {
    pub fn new() -> Self {
        TextBox {
            text: String::new(),
            start: IVec2::ZERO,
            end: IVec2::ZERO,
            angle_deg: 0.0,
            stroke: StrokeParams::schematic_default(),
            fill: FillParams::default(),
            effects: TextEffects::default(),
            margins: [0; 4],
            excluded_from_sim: false,
            unit: 1,
            body_style: 1,
            private: false,
        }
    }

    /// Margin applied when the file carries none: derived from the legacy
    /// layout constant of 0.75 times the text size.
    pub fn legacy_margin(&self) -> i32 {
        (self.effects.size.y as f64 * 0.75).round() as i32
    }
}

impl Default for TextBox {
    fn default() -> Self {
        TextBox::new()
    }
}

/// One cell of a table; a text box plus its span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub uuid: Kiid,
    pub textbox: TextBox,
    pub col_span: i32,
    pub row_span: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    pub column_count: i32,
    pub column_widths: Vec<i32>,
    pub row_heights: Vec<i32>,
    pub cells: Vec<TableCell>,
    pub border_stroke: StrokeParams,
    pub separators_stroke: StrokeParams,
    pub stroke_external: bool,
    pub stroke_header_separator: bool,
    pub stroke_rows: bool,
    pub stroke_columns: bool,
}

/// A zone-like area that excludes some class of schematic content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleArea {
    pub shape: Shape,
    pub excluded_from_sim: bool,
    pub excluded_from_bom: bool,
    pub excluded_from_board: bool,
    pub dnp: bool,
}

/// A named grouping of items, referencing members by UUID. Resolution to
/// concrete items is a second pass after the sheet is fully parsed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub design_block_lib_id: Option<LibId>,
    pub members: Vec<Kiid>,
}

/// A named bus with its member nets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BusAlias {
    pub name: String,
    pub members: Vec<String>,
}
