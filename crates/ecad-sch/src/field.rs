use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::text::TextEffects;

/// Role of a field. The canonical (untranslated) field name decides the role
/// of mandatory fields; everything else is a user field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldId {
    Reference,
    Value,
    Footprint,
    Datasheet,
    Description,
    SheetName,
    SheetFilename,
    IntersheetRefs,
    User,
}

impl FieldId {
    pub fn canonical_name(&self) -> Option<&'static str> {
        match self {
            FieldId::Reference => Some("Reference"),
            FieldId::Value => Some("Value"),
            FieldId::Footprint => Some("Footprint"),
            FieldId::Datasheet => Some("Datasheet"),
            FieldId::Description => Some("Description"),
            FieldId::SheetName => Some("Sheetname"),
            FieldId::SheetFilename => Some("Sheetfile"),
            FieldId::IntersheetRefs => Some("Intersheetrefs"),
            FieldId::User => None,
        }
    }

    /// Mandatory fields of a symbol, in file order.
    pub const SYMBOL_MANDATORY: &'static [FieldId] = &[
        FieldId::Reference,
        FieldId::Value,
        FieldId::Footprint,
        FieldId::Datasheet,
        FieldId::Description,
    ];

    /// Mandatory fields of a sheet.
    pub const SHEET_MANDATORY: &'static [FieldId] = &[FieldId::SheetName, FieldId::SheetFilename];

    /// Mandatory fields of a global label.
    pub const GLOBAL_LABEL_MANDATORY: &'static [FieldId] = &[FieldId::IntersheetRefs];

    pub fn is_mandatory(&self) -> bool {
        !matches!(self, FieldId::User)
    }

    /// Match a field name against a mandatory set, case-insensitively.
    pub fn from_canonical(name: &str, mandatory: &[FieldId]) -> FieldId {
        mandatory
            .iter()
            .copied()
            .find(|id| {
                id.canonical_name()
                    .is_some_and(|canon| canon.eq_ignore_ascii_case(name))
            })
            .unwrap_or(FieldId::User)
    }
}

/// A name/value attribute attached to a symbol, sheet or label, with its own
/// position and text attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    pub text: String,
    pub position: IVec2,
    pub angle_deg: f64,
    pub effects: TextEffects,
    pub show_name: bool,
    pub can_autoplace: bool,
    pub private: bool,
}

impl Field {
    pub fn new(id: FieldId, name: impl Into<String>) -> Self {
        Field {
            id,
            name: name.into(),
            text: String::new(),
            position: IVec2::ZERO,
            angle_deg: 0.0,
            effects: TextEffects::default(),
            show_name: false,
            can_autoplace: true,
            private: false,
        }
    }

    pub fn is_mandatory(&self) -> bool {
        self.id.is_mandatory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_lookup_is_case_insensitive() {
        assert_eq!(
            FieldId::from_canonical("reference", FieldId::SYMBOL_MANDATORY),
            FieldId::Reference
        );
        assert_eq!(
            FieldId::from_canonical("Sheetfile", FieldId::SHEET_MANDATORY),
            FieldId::SheetFilename
        );
        assert_eq!(FieldId::from_canonical("MPN", FieldId::SYMBOL_MANDATORY), FieldId::User);
    }
}
