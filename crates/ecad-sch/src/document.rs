use std::collections::BTreeMap;

use ecad_core::{Kiid, KiidPath};
use serde::{Deserialize, Serialize};

use crate::item::{BusAlias, SchItem, SchItemKind, SymbolLink};
use crate::embedded::EmbeddedFiles;
use crate::symbol::LibSymbolMap;

/// Page geometry of a sheet: a named standard size or a user size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub paper: String,
    /// Only meaningful when `paper == "User"`.
    pub width_mm: f64,
    pub height_mm: f64,
    pub portrait: bool,
}

pub const MIN_PAGE_SIZE_MM: f64 = 25.4;
pub const MAX_PAGE_SIZE_MM: f64 = 1143.0;

impl PageInfo {
    /// Known standard page type names.
    pub fn is_known_type(name: &str) -> bool {
        matches!(
            name,
            "A5" | "A4" | "A3" | "A2" | "A1" | "A0" | "A" | "B" | "C" | "D" | "E" | "User"
                | "USLetter" | "USLegal" | "USLedger"
        )
    }

    /// Clamp a user page dimension into the supported range; hand-edited
    /// files are not allowed to crash the layout math.
    pub fn clamp_dimension(mm: f64) -> f64 {
        mm.clamp(MIN_PAGE_SIZE_MM, MAX_PAGE_SIZE_MM)
    }
}

impl Default for PageInfo {
    fn default() -> Self {
        PageInfo { paper: "A4".to_owned(), width_mm: 297.0, height_mm: 210.0, portrait: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleBlock {
    pub title: String,
    pub date: String,
    pub revision: String,
    pub company: String,
    /// Comments 1..=9 by index 0..=8.
    pub comments: BTreeMap<u8, String>,
}

/// Per-hierarchical-path data of a sheet: its page number for one occurrence
/// in the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInstanceData {
    pub project: Option<String>,
    pub path: KiidPath,
    pub page_number: String,
}

/// Per-hierarchical-path data of a symbol: reference, unit and optional
/// value/footprint overrides for one occurrence in the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInstanceData {
    pub project: Option<String>,
    pub path: KiidPath,
    pub reference: String,
    pub unit: i32,
    pub value: Option<String>,
    pub footprint: Option<String>,
}

/// One parsed schematic sheet (a "screen"): page settings, the library
/// cache, the items placed on the sheet, and the hierarchical instance
/// blocks.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Document {
    pub uuid: Kiid,
    pub version_at_load: i32,
    pub generator_version: Option<String>,
    pub page: PageInfo,
    pub title_block: TitleBlock,
    pub lib_symbols: LibSymbolMap,
    pub items: Vec<SchItem>,
    pub sheet_instances: Vec<SheetInstanceData>,
    /// Root-level symbol instance block (pre-20200828 formats only; later
    /// formats embed instance data in each symbol).
    pub symbol_instances: Vec<SymbolInstanceData>,
    pub bus_aliases: Vec<BusAlias>,
    pub embedded: EmbeddedFiles,
    pub fonts_embedded: bool,
    /// Set when best-effort scrubbing (page numbers, etc.) changed content
    /// on load, so the caller can warn about re-saving.
    pub modified_on_load: bool,
}

impl Document {
    pub fn new() -> Self {
        Document { uuid: Kiid::nil(), ..Default::default() }
    }

    pub fn item(&self, uuid: Kiid) -> Option<&SchItem> {
        self.items.iter().find(|i| i.uuid == uuid)
    }

    pub fn item_mut(&mut self, uuid: Kiid) -> Option<&mut SchItem> {
        self.items.iter_mut().find(|i| i.uuid == uuid)
    }

    /// Link every symbol instance to its library symbol. Instances whose
    /// symbol cannot be found are marked [`SymbolLink::Dummy`]; the sentinel
    /// dummy symbol is added to the library map once, under its empty name.
    pub fn update_symbol_links(&mut self) {
        let mut need_dummy = false;

        for item in &mut self.items {
            let SchItemKind::Symbol(symbol) = &mut item.kind else {
                continue;
            };

            let cache_name = symbol
                .lib_name
                .clone()
                .unwrap_or_else(|| symbol.lib_id.to_string());

            if self.lib_symbols.contains_key(&cache_name) {
                symbol.link = SymbolLink::Resolved(cache_name);
            } else if self.lib_symbols.contains_key(&symbol.lib_id.to_string()) {
                symbol.link = SymbolLink::Resolved(symbol.lib_id.to_string());
            } else {
                symbol.link = SymbolLink::Dummy;
                need_dummy = true;
            }
        }

        if need_dummy {
            self.lib_symbols
                .entry(String::new())
                .or_insert_with(crate::symbol::LibSymbol::dummy);
        }
    }

    /// Resolve the fonts of every text-bearing item against the embedded
    /// bundle. Called once the whole document, including a trailing
    /// `embedded_files` block, has been read.
    pub fn resolve_fonts(&mut self) {
        let fonts = self.embedded.font_files();

        for item in &mut self.items {
            match &mut item.kind {
                SchItemKind::Text(t) => t.effects.resolve_font(&fonts),
                SchItemKind::Label(l) => {
                    l.effects.resolve_font(&fonts);
                    for f in &mut l.fields {
                        f.effects.resolve_font(&fonts);
                    }
                }
                SchItemKind::TextBox(t) => t.effects.resolve_font(&fonts),
                SchItemKind::Table(t) => {
                    for cell in &mut t.cells {
                        cell.textbox.effects.resolve_font(&fonts);
                    }
                }
                SchItemKind::Symbol(s) => {
                    for f in &mut s.fields {
                        f.effects.resolve_font(&fonts);
                    }
                }
                SchItemKind::Sheet(s) => {
                    for f in &mut s.fields {
                        f.effects.resolve_font(&fonts);
                    }
                    for p in &mut s.pins {
                        p.effects.resolve_font(&fonts);
                    }
                }
                _ => {}
            }
        }
    }

    /// Copy legacy root-block symbol instance data into the matching placed
    /// symbols (pre-20200828 files store it only at the root).
    pub fn apply_legacy_symbol_instances(&mut self) {
        if self.symbol_instances.is_empty() {
            return;
        }

        for item in &mut self.items {
            let SchItemKind::Symbol(symbol) = &mut item.kind else {
                continue;
            };

            for data in &self.symbol_instances {
                if data.path.0.last() == Some(&item.uuid) {
                    symbol.instances.push(data.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{SchItemKind, SymbolInstance, SymbolLink};
    use crate::symbol::LibSymbol;
    use ecad_core::LibId;

    #[test]
    fn missing_library_symbol_gets_dummy() {
        let mut doc = Document::new();
        doc.lib_symbols.insert("Device:R".to_owned(), LibSymbol::new("R"));

        let mut found = SymbolInstance::new();
        found.lib_id = LibId::parse("Device:R").unwrap();
        doc.items.push(SchItem { uuid: Kiid::new(), kind: SchItemKind::Symbol(found) });

        let mut missing = SymbolInstance::new();
        missing.lib_id = LibId::parse("Device:C").unwrap();
        doc.items.push(SchItem { uuid: Kiid::new(), kind: SchItemKind::Symbol(missing) });

        doc.update_symbol_links();

        let links: Vec<_> = doc
            .items
            .iter()
            .filter_map(|i| match &i.kind {
                SchItemKind::Symbol(s) => Some(s.link.clone()),
                _ => None,
            })
            .collect();

        assert_eq!(links[0], SymbolLink::Resolved("Device:R".to_owned()));
        assert_eq!(links[1], SymbolLink::Dummy);
        assert!(doc.lib_symbols.contains_key(""));
    }
}
