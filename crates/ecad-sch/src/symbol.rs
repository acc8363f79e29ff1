use std::collections::{BTreeMap, BTreeSet};

use ecad_core::LibId;
use serde::{Deserialize, Serialize};

use crate::embedded::EmbeddedFiles;
use crate::field::{Field, FieldId};
use crate::pin::Pin;
use crate::shape::Shape;
use crate::item::TextBox;
use crate::text::TextEffects;
use glam::IVec2;

/// Symbols in a library file, keyed by name. Ordered so iteration and
/// serialization are deterministic.
pub type LibSymbolMap = BTreeMap<String, LibSymbol>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerType {
    #[default]
    NotPower,
    GlobalPower,
    LocalPower,
}

/// A drawable item inside a library symbol body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawItem {
    Shape(Shape),
    Pin(Pin),
    Text(LibText),
    TextBox(TextBox),
}

/// Free text inside a symbol body. The file stores its angle in tenths of a
/// degree (unlike every other text item); the model holds degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibText {
    pub text: String,
    pub position: IVec2,
    pub angle_deg: f64,
    pub effects: TextEffects,
    pub unit: i32,
    pub body_style: i32,
    pub private: bool,
}

/// A library symbol definition: mandatory and user fields, per-unit drawing
/// items, pin metadata and derivation data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibSymbol {
    pub lib_id: LibId,
    pub name: String,
    /// Name of the parent for derived symbols. Depth is one: a parent must
    /// not itself be derived.
    pub parent: Option<String>,
    pub power: PowerType,
    pub pin_name_offset: i32,
    pub show_pin_names: bool,
    pub show_pin_numbers: bool,
    pub excluded_from_sim: bool,
    pub excluded_from_bom: bool,
    pub excluded_from_board: bool,
    pub excluded_from_pos_files: bool,
    pub duplicate_pin_numbers_are_jumpers: bool,
    pub jumper_pin_groups: Vec<BTreeSet<String>>,
    pub unit_count: i32,
    pub body_style_count: i32,
    pub has_demorgan_body_styles: bool,
    pub body_style_names: Vec<String>,
    pub unit_display_names: BTreeMap<i32, String>,
    pub description: String,
    pub keywords: String,
    pub fp_filters: Vec<String>,
    pub lock_units: bool,
    pub fields: Vec<Field>,
    pub draw_items: Vec<DrawItem>,
    pub embedded: EmbeddedFiles,
    pub fonts_embedded: bool,
}

impl LibSymbol {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut symbol = LibSymbol {
            lib_id: LibId::from_item(name.clone()),
            name,
            parent: None,
            power: PowerType::NotPower,
            pin_name_offset: 0,
            show_pin_names: true,
            show_pin_numbers: true,
            excluded_from_sim: false,
            excluded_from_bom: false,
            excluded_from_board: false,
            excluded_from_pos_files: false,
            duplicate_pin_numbers_are_jumpers: false,
            jumper_pin_groups: Vec::new(),
            unit_count: 1,
            body_style_count: 1,
            has_demorgan_body_styles: false,
            body_style_names: Vec::new(),
            unit_display_names: BTreeMap::new(),
            description: String::new(),
            keywords: String::new(),
            fp_filters: Vec::new(),
            lock_units: false,
            fields: Vec::new(),
            draw_items: Vec::new(),
            embedded: EmbeddedFiles::default(),
            fonts_embedded: false,
        };

        for &id in FieldId::SYMBOL_MANDATORY {
            symbol.fields.push(Field::new(id, id.canonical_name().unwrap_or_default()));
        }

        symbol
    }

    pub fn is_derived(&self) -> bool {
        self.parent.is_some()
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

    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.draw_items.iter().filter_map(|item| match item {
            DrawItem::Pin(pin) => Some(pin),
            _ => None,
        })
    }

    /// Find a pin by number, honoring the unit filter (0 matches all units).
    pub fn pin_by_number(&self, number: &str, unit: i32) -> Option<&Pin> {
        self.pins()
            .find(|p| p.number == number && (unit == 0 || p.unit == 0 || p.unit == unit))
    }

    /// Whether any drawing exists on an alternate body style. Pre-20250827
    /// files don't store the DeMorgan flag, so it is inferred from this.
    pub fn has_alternate_body_drawing(&self) -> bool {
        self.draw_items.iter().any(|item| {
            let body_style = match item {
                DrawItem::Shape(s) => s.body_style,
                DrawItem::Pin(p) => p.body_style,
                DrawItem::Text(t) => t.body_style,
                DrawItem::TextBox(t) => t.body_style,
            };
            body_style > 1
        })
    }

    /// Placeholder substituted when a symbol instance's library symbol
    /// cannot be found; consumers can still render the instance's fields.
    pub fn dummy() -> Self {
        let mut sym = LibSymbol::new("");
        sym.description = "Symbol not found".to_owned();
        sym
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::Pin;

    #[test]
    fn new_symbol_has_mandatory_fields() {
        let sym = LibSymbol::new("R");
        assert!(sym.field(FieldId::Reference).is_some());
        assert!(sym.field(FieldId::Value).is_some());
        assert!(sym.field(FieldId::Datasheet).is_some());
        assert_eq!(sym.unit_count, 1);
    }

    #[test]
    fn alternate_body_inference() {
        let mut sym = LibSymbol::new("U");
        assert!(!sym.has_alternate_body_drawing());

        let mut pin = Pin::new();
        pin.body_style = 2;
        sym.draw_items.push(DrawItem::Pin(pin));
        assert!(sym.has_alternate_body_drawing());
    }
}
