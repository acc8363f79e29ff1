use ecad_core::{Kiid, KiidPath, LibId};
use ecad_sexpr::TokenKind;
use glam::IVec2;

use crate::bitmap::Bitmap;
use crate::document::{Document, PageInfo, SheetInstanceData, SymbolInstanceData, TitleBlock};
use crate::error::SchError;
use crate::field::FieldId;
use crate::item::{
    BusAlias, BusEntry, InstancePin, Junction, Label, LabelKind, LabelShape, Line, LineLayer,
    NoConnect, RuleArea, SchItem, SchItemKind, SchText, Sheet, SheetPin, SheetSide,
    SymbolInstance, Mirror, Table, TableCell, TextBox,
};
use crate::shape::{Shape, ShapeKind};
use crate::stroke::{FillParams, LineStyle, StrokeParams};
use crate::text::convert_to_new_overbar_notation;

use super::common::FieldParent;
use super::{SchParser, SCHEMATIC_FILE_VERSION};

/// Fields whose presence historically encoded "exclude from simulation".
const SIM_LEGACY_ENABLE_FIELD_V7: &str = "Sim.Enable";
const SIM_LEGACY_ENABLE_FIELD: &str = "Spice_Netlist_Enabled";

impl<'a, 'd> SchParser<'a, 'd> {
    pub(crate) fn parse_schematic_into(&mut self, doc: &mut Document) -> Result<(), SchError> {
        let mut version_checked = false;

        if !self.opts.copyable_only {
            self.lex.need_left()?;
            self.lex.next()?;

            if self.lex.text() != "kicad_sch" {
                return Err(self.expecting("kicad_sch"));
            }

            self.parse_header(SCHEMATIC_FILE_VERSION)?;

            // Prior to this, bar was a valid string char for unquoted
            // strings.
            self.lex.set_knows_bar(self.version >= 20240620);

            // Schematics older than 20210406 have no UUIDs; synthesize a
            // deterministic root identifier from the screen identity so that
            // instance paths stay stable across repeated reads.
            if self.version < 20210406 {
                let id = Kiid::deterministic(self.lex.source());
                doc.uuid = id;
                self.root_uuid = id;
            }

            // Prior to 20231120 there is no generator_version, so the
            // version check cannot be deferred.
            if self.version < 20231120 {
                self.check_version(SCHEMATIC_FILE_VERSION, &mut version_checked)?;
            }
        } else {
            self.version = self.opts.fallback_version;
        }

        doc.version_at_load = self.version;

        let mut file_has_uuid = false;

        loop {
            match self.lex.next()? {
                TokenKind::Eof if self.opts.copyable_only => break,
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            self.checkpoint()?;

            let mut tok = self.lex.text().to_owned();

            // `page` was the paper-size token before 20200506.
            if !self.opts.copyable_only && tok == "page" && self.version <= 20200506 {
                tok = "paper".to_owned();
            }

            match tok.as_str() {
                "group" => self.parse_group()?,
                "generator" => {
                    // (generator "genname"); nothing to keep.
                    self.lex.need_symbol()?;
                    self.lex.need_right()?;
                }
                "host" => {
                    // (host eeschema ["5.99"]); old version of the generator
                    // token.
                    self.lex.need_symbol()?;

                    if self.version < 20200827 {
                        self.lex.need_symbol()?;
                    }

                    self.lex.need_right()?;
                }
                "generator_version" => {
                    self.generator_version = Some(self.lex.need_symbol()?);
                    self.lex.need_right()?;
                    self.check_version(SCHEMATIC_FILE_VERSION, &mut version_checked)?;
                }
                "uuid" => {
                    doc.uuid = self.parse_kiid()?;
                    // The root UUID participates in every instance path, so
                    // keep it in sync with the file's own identifier.
                    self.root_uuid = doc.uuid;
                    file_has_uuid = true;
                    self.lex.need_right()?;
                }
                "paper" => {
                    if self.opts.copyable_only {
                        return Err(self.expecting("schematic item"));
                    }

                    self.parse_page_info(&mut doc.page)?;
                }
                "page" => {
                    if self.opts.copyable_only {
                        return Err(self.expecting("schematic item"));
                    }

                    // Only used for top-level sniffing by external tools.
                    self.lex.need_symbol_or_number()?;
                    self.lex.need_symbol_or_number()?;
                    self.lex.need_right()?;
                }
                "title_block" => {
                    if self.opts.copyable_only {
                        return Err(self.expecting("schematic item"));
                    }

                    self.parse_title_block(&mut doc.title_block)?;
                }
                "lib_symbols" => loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        TokenKind::Left => {}
                        _ => return Err(self.expecting("(")),
                    }

                    self.lex.next()?;

                    if self.lex.text() != "symbol" {
                        return Err(self.expecting("symbol"));
                    }

                    let symbol = self.parse_lib_symbol()?;
                    doc.lib_symbols.insert(symbol.lib_id.to_string(), symbol);
                },
                "symbol" => {
                    let item = self.parse_schematic_symbol()?;
                    doc.items.push(item);
                }
                "image" => {
                    let item = self.parse_image()?;
                    doc.items.push(item);
                }
                "sheet" => {
                    let item = self.parse_sheet()?;
                    doc.items.push(item);
                }
                "junction" => {
                    let item = self.parse_junction()?;
                    doc.items.push(item);
                }
                "no_connect" => {
                    let item = self.parse_no_connect()?;
                    doc.items.push(item);
                }
                "bus_entry" => {
                    let item = self.parse_bus_entry()?;
                    doc.items.push(item);
                }
                "polyline" => {
                    // In symbols a polyline is a polygon; in schematics a
                    // two-point polyline is really a graphic line. Keep the
                    // polygon form for more corners, demote to a line for
                    // exactly two.
                    let (uuid, shape) = self.parse_sch_polyline()?;

                    let kind = match &shape.kind {
                        ShapeKind::Polyline { pts } if pts.len() == 2 => SchItemKind::Line(Line {
                            layer: LineLayer::Notes,
                            start: pts[0],
                            end: pts[1],
                            stroke: shape.stroke,
                        }),
                        _ => SchItemKind::Shape(shape),
                    };

                    doc.items.push(SchItem { uuid, kind });
                }
                "wire" => {
                    let item = self.parse_line(LineLayer::Wire)?;
                    doc.items.push(item);
                }
                "bus" => {
                    let item = self.parse_line(LineLayer::Bus)?;
                    doc.items.push(item);
                }
                "arc" => {
                    let (uuid, shape) = self.parse_sch_arc()?;
                    doc.items.push(SchItem { uuid, kind: SchItemKind::Shape(shape) });
                }
                "circle" => {
                    let (uuid, shape) = self.parse_sch_circle()?;
                    doc.items.push(SchItem { uuid, kind: SchItemKind::Shape(shape) });
                }
                "rectangle" => {
                    let (uuid, shape) = self.parse_sch_rectangle()?;
                    doc.items.push(SchItem { uuid, kind: SchItemKind::Shape(shape) });
                }
                "bezier" => {
                    let (uuid, shape) = self.parse_sch_bezier()?;
                    doc.items.push(SchItem { uuid, kind: SchItemKind::Shape(shape) });
                }
                "rule_area" => {
                    let item = self.parse_rule_area()?;
                    doc.items.push(item);
                }
                // netclass_flag existed only during early 7.0 development.
                "netclass_flag" | "text" | "label" | "global_label" | "hierarchical_label"
                | "directive_label" => {
                    let item = self.parse_sch_text_item(&tok)?;
                    doc.items.push(item);
                }
                "text_box" => {
                    let (uuid, tb, _) = self.parse_sch_text_box_content(false)?;
                    doc.items.push(SchItem { uuid, kind: SchItemKind::TextBox(tb) });
                }
                "table" => {
                    let item = self.parse_sch_table()?;
                    doc.items.push(item);
                }
                "sheet_instances" => self.parse_sheet_instances(doc)?,
                "symbol_instances" => self.parse_symbol_instances(doc)?,
                "bus_alias" => {
                    if self.opts.copyable_only {
                        return Err(self.expecting("schematic item"));
                    }

                    self.parse_bus_alias(doc)?;
                }
                "embedded_fonts" => {
                    doc.fonts_embedded = self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "embedded_files" => {
                    let mut bundle = std::mem::take(&mut doc.embedded);
                    if let Err(err) = self.parse_embedded_files(&mut bundle) {
                        self.diag.warn(err.to_string());
                        self.skip_to_block_end(1)?;
                    }
                    doc.embedded = bundle;
                }
                _ => {
                    return Err(self.expecting(
                        "bitmap, bus, bus_alias, bus_entry, global_label, hierarchical_label, \
                         junction, label, line, no_connect, page, paper, rule_area, sheet, \
                         symbol, symbol_instances, text, title_block",
                    ))
                }
            }
        }

        // Older files may not carry a UUID at all; fall back to the
        // deterministic screen identity so instance paths still resolve.
        if !file_has_uuid && doc.uuid.is_nil() {
            doc.uuid = Kiid::deterministic(self.lex.source());
            self.root_uuid = doc.uuid;
        } else if !file_has_uuid {
            self.root_uuid = doc.uuid;
        }

        doc.update_symbol_links();
        self.resolve_groups(doc);
        doc.resolve_fonts();

        if self.version < 20200828 {
            doc.apply_legacy_symbol_instances();
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Header-adjacent blocks
    // ------------------------------------------------------------------

    fn parse_page_info(&mut self, page: &mut PageInfo) -> Result<(), SchError> {
        let paper = self.lex.need_symbol()?;

        if !PageInfo::is_known_type(&paper) {
            return Err(self.malformed("Invalid page type"));
        }

        page.paper = paper;

        if page.paper == "User" {
            page.width_mm = PageInfo::clamp_dimension(self.parse_double("width")?);
            page.height_mm = PageInfo::clamp_dimension(self.parse_double("height")?);
        }

        self.lex.next()?;

        if self.lex.cur().kind == TokenKind::Right {
            return Ok(());
        }

        if self.lex.text() == "portrait" {
            page.portrait = true;
            self.lex.need_right()?;
            Ok(())
        } else {
            Err(self.expecting("portrait"))
        }
    }

    fn parse_title_block(&mut self, tb: &mut TitleBlock) -> Result<(), SchError> {
        loop {
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "title" => {
                    self.lex.next()?;
                    tb.title = self.lex.text().to_owned();
                }
                "date" => {
                    self.lex.next()?;
                    tb.date = self.lex.text().to_owned();
                }
                "rev" => {
                    self.lex.next()?;
                    tb.revision = self.lex.text().to_owned();
                }
                "company" => {
                    self.lex.next()?;
                    tb.company = self.lex.text().to_owned();
                }
                "comment" => {
                    let number = self.parse_int("comment")?;

                    if !(1..=9).contains(&number) {
                        return Err(self.malformed("Invalid title block comment number"));
                    }

                    self.lex.next()?;
                    tb.comments.insert((number - 1) as u8, self.lex.text().to_owned());
                }
                _ => return Err(self.expecting("title, date, rev, company, or comment")),
            }

            self.lex.need_right()?;
        }
    }

    // ------------------------------------------------------------------
    // Symbol instances
    // ------------------------------------------------------------------

    fn parse_schematic_symbol(&mut self) -> Result<SchItem, SchError> {
        let mut uuid = Kiid::new();
        let mut symbol = SymbolInstance::new();
        let mut lib_name: Option<String> = None;

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "lib_name" => {
                    self.lex.next()?;

                    if !self.lex.cur().is_symbol() {
                        return Err(self.malformed("Invalid symbol library name"));
                    }

                    lib_name = Some(Self::unescape_slash(self.lex.text()));
                    self.lex.need_right()?;
                }
                "lib_id" => {
                    self.lex.next()?;

                    if !self.lex.cur().is_symbol_or_number() {
                        return Err(self.expecting("symbol|number"));
                    }

                    let name = Self::unescape_slash(self.lex.text());
                    symbol.lib_id =
                        LibId::parse(&name).map_err(|err| self.malformed(err.to_string()))?;
                    self.lex.need_right()?;
                }
                "at" => {
                    symbol.position = self.parse_xy()?;

                    symbol.orientation_deg =
                        match self.parse_double("symbol orientation")? as i32 {
                            0 => 0,
                            90 => 90,
                            180 => 180,
                            270 => 270,
                            _ => return Err(self.expecting("0, 90, 180, or 270")),
                        };

                    self.lex.need_right()?;
                }
                "mirror" => {
                    self.lex.next()?;
                    symbol.mirror = match self.lex.text() {
                        "x" => Some(Mirror::X),
                        "y" => Some(Mirror::Y),
                        _ => return Err(self.expecting("x or y")),
                    };
                    self.lex.need_right()?;
                }
                "unit" => {
                    symbol.unit = self.parse_int("symbol unit")? as i32;
                    self.lex.need_right()?;
                }
                // `convert` is the legacy spelling.
                "convert" | "body_style" => {
                    symbol.body_style = self.parse_int("symbol body style")? as i32;
                    self.lex.need_right()?;
                }
                "exclude_from_sim" => {
                    symbol.excluded_from_sim = self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "in_bom" => {
                    symbol.excluded_from_bom = !self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "on_board" => {
                    symbol.excluded_from_board = !self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "in_pos_files" => {
                    symbol.excluded_from_pos_files = !self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "dnp" => {
                    symbol.dnp = self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "fields_autoplaced" => {
                    symbol.fields_autoplaced = self.parse_maybe_absent_bool(true)?;
                }
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                "default_instance" => self.parse_default_instance(&mut symbol)?,
                "instances" => self.parse_symbol_instance_blocks(&mut symbol)?,
                "property" => {
                    let field = self.parse_sch_field(FieldParent::Symbol)?;

                    // Exclude-from-simulation used to be a field.
                    if field.name == SIM_LEGACY_ENABLE_FIELD_V7 {
                        symbol.excluded_from_sim = field.text == "0";
                        continue;
                    }

                    if field.name == SIM_LEGACY_ENABLE_FIELD {
                        symbol.excluded_from_sim = field.text == "N";
                        continue;
                    }

                    let existing = if field.is_mandatory() {
                        symbol.field_mut(field.id)
                    } else {
                        symbol.fields.iter_mut().find(|f| f.name == field.name)
                    };

                    if let Some(existing) = existing {
                        *existing = field;
                    } else {
                        symbol.fields.push(field);
                    }
                }
                "pin" => {
                    // An alternate pin designation on the placed symbol.
                    let number = self.lex.need_symbol()?;
                    let mut pin_uuid = Kiid::new();
                    let mut alternate = None;

                    loop {
                        match self.lex.next()? {
                            TokenKind::Right => break,
                            TokenKind::Left => {}
                            _ => return Err(self.expecting("(")),
                        }

                        self.lex.next()?;
                        let tok = self.lex.text().to_owned();

                        match tok.as_str() {
                            "alternate" => {
                                alternate = Some(self.lex.need_symbol()?);
                                self.lex.need_right()?;
                            }
                            "uuid" => {
                                // The first version to write pin uuids wrote
                                // the symbol's uuid for every pin; ignore
                                // those.
                                if self.version >= 20210126 {
                                    pin_uuid = self.parse_kiid()?;
                                } else {
                                    self.lex.need_symbol()?;
                                }
                                self.lex.need_right()?;
                            }
                            _ => return Err(self.expecting("alternate or uuid")),
                        }
                    }

                    symbol.pins.push(InstancePin { number, alternate, uuid: pin_uuid });
                }
                _ => {
                    return Err(self.expecting(
                        "lib_id, lib_name, at, mirror, uuid, exclude_from_sim, on_board, \
                         in_bom, dnp, default_instance, property, pin, or instances",
                    ))
                }
            }
        }

        if let Some(name) = lib_name {
            if symbol.lib_id.to_string() != name {
                symbol.lib_name = Some(name);
            }
        }

        Ok(SchItem { uuid, kind: SchItemKind::Symbol(symbol) })
    }

    fn parse_default_instance(&mut self, symbol: &mut SymbolInstance) -> Result<(), SchError> {
        loop {
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "reference" | "unit" => {
                    // Read and ignore; per-project instance data wins.
                    self.lex.need_symbol_or_number()?;
                    self.lex.need_right()?;
                }
                "value" => {
                    let raw = self.lex.need_symbol()?;
                    let value = self.legacy_empty(raw);
                    symbol.set_field_text(FieldId::Value, value);
                    self.lex.need_right()?;
                }
                "footprint" => {
                    let raw = self.lex.need_symbol()?;
                    let value = self.legacy_empty(raw);
                    symbol.set_field_text(FieldId::Footprint, value);
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("reference, unit, value or footprint")),
            }
        }
    }

    fn parse_symbol_instance_blocks(
        &mut self,
        symbol: &mut SymbolInstance,
    ) -> Result<(), SchError> {
        loop {
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;

            if self.lex.text() != "project" {
                return Err(self.expecting("project"));
            }

            let project = self.lex.need_symbol()?;

            loop {
                match self.lex.next()? {
                    TokenKind::Right => break,
                    TokenKind::Left => {}
                    _ => return Err(self.expecting("(")),
                }

                self.lex.next()?;

                if self.lex.text() != "path" {
                    return Err(self.expecting("path"));
                }

                let mut data = SymbolInstanceData {
                    project: Some(project.clone()),
                    path: KiidPath::parse(&self.lex.need_symbol()?),
                    ..Default::default()
                };

                loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        TokenKind::Left => {}
                        _ => return Err(self.expecting("(")),
                    }

                    self.lex.next()?;
                    let tok = self.lex.text().to_owned();

                    match tok.as_str() {
                        "reference" => {
                            data.reference = self.lex.need_symbol()?;
                            self.lex.need_right()?;
                        }
                        "unit" => {
                            data.unit = self.parse_int("symbol unit")? as i32;
                            self.lex.need_right()?;
                        }
                        "value" => {
                            let raw = self.lex.need_symbol()?;
                            let value = self.legacy_empty(raw);
                            data.value = Some(value.clone());
                            symbol.set_field_text(FieldId::Value, value);
                            self.lex.need_right()?;
                        }
                        "footprint" => {
                            let raw = self.lex.need_symbol()?;
                            let value = self.legacy_empty(raw);
                            data.footprint = Some(value.clone());
                            symbol.set_field_text(FieldId::Footprint, value);
                            self.lex.need_right()?;
                        }
                        "variant" => {
                            // Assembly variants have no model here yet; skip
                            // the block structurally.
                            log::debug!("skipping symbol instance variant block");
                            self.skip_to_block_end(1)?;
                        }
                        _ => {
                            return Err(
                                self.expecting("reference, unit, value, footprint, or variant")
                            )
                        }
                    }
                }

                symbol.instances.push(data);
            }
        }
    }

    // ------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------

    fn parse_image(&mut self) -> Result<SchItem, SchError> {
        use base64::Engine as _;

        let mut uuid = Kiid::new();
        let mut position = IVec2::ZERO;
        let mut scale = 1.0;
        let mut data = Vec::new();

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "at" => {
                    position = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "scale" => {
                    scale = self.parse_double("image scale factor")?;
                    self.lex.need_right()?;
                }
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                "data" => {
                    let mut b64 = String::new();

                    loop {
                        match self.lex.next()? {
                            TokenKind::Right => break,
                            k if k == TokenKind::Symbol
                                || k == TokenKind::Quoted
                                || k == TokenKind::Number =>
                            {
                                b64.push_str(self.lex.text());
                            }
                            _ => return Err(self.expecting("base64 image data")),
                        }
                    }

                    data = base64::engine::general_purpose::STANDARD
                        .decode(b64.as_bytes())
                        .map_err(|_| SchError::BadImage { location: self.lex.location() })?;
                }
                _ => return Err(self.expecting("at, scale, uuid or data")),
            }
        }

        let mut bitmap = Bitmap::from_bytes(position, scale, data)
            .ok_or_else(|| SchError::BadImage { location: self.lex.location() })?;

        // 20230121 and older file formats assumed 300 PPI at load/save.
        if self.version <= 20230121 {
            bitmap.apply_legacy_ppi_scale();
        }

        Ok(SchItem { uuid, kind: SchItemKind::Bitmap(bitmap) })
    }

    // ------------------------------------------------------------------
    // Sheets
    // ------------------------------------------------------------------

    fn parse_sheet(&mut self) -> Result<SchItem, SchError> {
        let mut uuid = Kiid::new();
        let mut sheet = Sheet::new();
        let mut fields = Vec::new();

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "at" => {
                    sheet.position = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "size" => {
                    let w = self.internal_units("sheet width")?;
                    let h = self.internal_units("sheet height")?;
                    sheet.size = IVec2::new(w, h);
                    self.lex.need_right()?;
                }
                "exclude_from_sim" => {
                    sheet.excluded_from_sim = self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "in_bom" => {
                    sheet.excluded_from_bom = !self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "on_board" => {
                    sheet.excluded_from_board = !self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "dnp" => {
                    sheet.dnp = self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "fields_autoplaced" => {
                    sheet.fields_autoplaced = self.parse_maybe_absent_bool(true)?;
                }
                "stroke" => {
                    let mut stroke = StrokeParams::schematic_default();
                    self.parse_stroke(&mut stroke)?;
                    sheet.border = stroke;
                }
                "fill" => {
                    let mut fill = FillParams::default();
                    self.parse_fill(&mut fill)?;
                    sheet.background = fill.color;
                }
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                "property" => {
                    let mut field = self.parse_sch_field(FieldParent::Sheet)?;

                    // Early formats saved the wrong ids for sheet fields,
                    // but only ever the name and file path in that order.
                    if self.version <= 20200310 {
                        field.id = if fields.is_empty() {
                            FieldId::SheetName
                        } else {
                            FieldId::SheetFilename
                        };
                    }

                    fields.push(field);
                }
                "pin" => {
                    let pin = self.parse_sheet_pin()?;
                    sheet.pins.push(pin);
                }
                "instances" => self.parse_sheet_instance_blocks(&mut sheet)?,
                _ => {
                    return Err(self.expecting(
                        "at, size, stroke, background, instances, uuid, property, or pin",
                    ))
                }
            }
        }

        sheet.fields = fields;
        Ok(SchItem { uuid, kind: SchItemKind::Sheet(sheet) })
    }

    fn parse_sheet_pin(&mut self) -> Result<SheetPin, SchError> {
        self.lex.next()?;

        if !self.lex.cur().is_symbol() {
            return Err(self.malformed("Invalid sheet pin name"));
        }

        let name = self.lex.text().to_owned();

        if name.is_empty() {
            return Err(self.malformed("Empty sheet pin name"));
        }

        self.lex.next()?;
        let shape = LabelShape::connection_from_token(self.lex.text())
            .ok_or_else(|| self.expecting("input, output, bidirectional, tri_state, or passive"))?;

        let mut pin = SheetPin {
            uuid: Kiid::new(),
            name,
            shape,
            position: IVec2::ZERO,
            side: SheetSide::Right,
            effects: Default::default(),
        };

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "at" => {
                    pin.position = self.parse_xy()?;

                    pin.side = match self.parse_double("sheet pin angle (side)")? as i32 {
                        0 => SheetSide::Right,
                        90 => SheetSide::Top,
                        180 => SheetSide::Left,
                        270 => SheetSide::Bottom,
                        _ => return Err(self.expecting("0, 90, 180, or 270")),
                    };

                    self.lex.need_right()?;
                }
                "effects" => self.parse_effects(&mut pin.effects)?,
                "uuid" => {
                    pin.uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("at, uuid or effects")),
            }
        }

        Ok(pin)
    }

    fn parse_sheet_instance_blocks(&mut self, sheet: &mut Sheet) -> Result<(), SchError> {
        loop {
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;

            if self.lex.text() != "project" {
                return Err(self.expecting("project"));
            }

            let project = self.lex.need_symbol()?;

            loop {
                match self.lex.next()? {
                    TokenKind::Right => break,
                    TokenKind::Left => {}
                    _ => return Err(self.expecting("(")),
                }

                self.lex.next()?;

                if self.lex.text() != "path" {
                    return Err(self.expecting("path"));
                }

                let mut data = SheetInstanceData {
                    project: Some(project.clone()),
                    path: KiidPath::parse(&self.lex.need_symbol()?),
                    ..Default::default()
                };

                loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        TokenKind::Left => {}
                        _ => return Err(self.expecting("(")),
                    }

                    self.lex.next()?;
                    let tok = self.lex.text().to_owned();

                    match tok.as_str() {
                        "page" => {
                            data.page_number = scrub_page_number(&self.lex.need_symbol()?);
                            self.lex.need_right()?;
                        }
                        "variant" => {
                            log::debug!("skipping sheet instance variant block");
                            self.skip_to_block_end(1)?;
                        }
                        _ => return Err(self.expecting("page or variant")),
                    }
                }

                sheet.instances.push(data);
            }
        }
    }

    // ------------------------------------------------------------------
    // Junctions, no-connects, bus entries, lines
    // ------------------------------------------------------------------

    fn parse_junction(&mut self) -> Result<SchItem, SchError> {
        let mut uuid = Kiid::new();
        let mut junction = Junction { position: IVec2::ZERO, diameter: 0, color: None };

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "at" => {
                    junction.position = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "diameter" => {
                    junction.diameter = self.internal_units("junction diameter")?;

                    if junction.diameter < 0 {
                        return Err(self.malformed("Negative junction diameter"));
                    }

                    self.lex.need_right()?;
                }
                "color" => {
                    junction.color = Some(self.parse_color()?);
                    self.lex.need_right()?;
                }
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("at, diameter, color or uuid")),
            }
        }

        Ok(SchItem { uuid, kind: SchItemKind::Junction(junction) })
    }

    fn parse_no_connect(&mut self) -> Result<SchItem, SchError> {
        let mut uuid = Kiid::new();
        let mut nc = NoConnect { position: IVec2::ZERO };

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "at" => {
                    nc.position = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("at or uuid")),
            }
        }

        Ok(SchItem { uuid, kind: SchItemKind::NoConnect(nc) })
    }

    fn parse_bus_entry(&mut self) -> Result<SchItem, SchError> {
        let mut uuid = Kiid::new();
        let mut entry = BusEntry {
            position: IVec2::ZERO,
            size: IVec2::ZERO,
            stroke: StrokeParams::schematic_default(),
        };

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "at" => {
                    entry.position = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "size" => {
                    let h = self.internal_units("bus entry height")?;
                    let w = self.internal_units("bus entry width")?;
                    entry.size = IVec2::new(h, w);
                    self.lex.need_right()?;
                }
                "stroke" => self.parse_stroke(&mut entry.stroke)?,
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("at, size, uuid or stroke")),
            }
        }

        Ok(SchItem { uuid, kind: SchItemKind::BusEntry(entry) })
    }

    fn parse_line(&mut self, layer: LineLayer) -> Result<SchItem, SchError> {
        let mut uuid = Kiid::new();
        let mut line = Line {
            layer,
            start: IVec2::ZERO,
            end: IVec2::ZERO,
            stroke: StrokeParams::schematic_default(),
        };

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "pts" => {
                    self.lex.need_left()?;
                    self.lex.next()?;

                    if self.lex.text() != "xy" {
                        return Err(self.expecting("xy"));
                    }

                    line.start = self.parse_xy()?;
                    self.lex.need_right()?;
                    self.lex.need_left()?;
                    self.lex.next()?;

                    if self.lex.text() != "xy" {
                        return Err(self.expecting("xy"));
                    }

                    line.end = self.parse_xy()?;
                    self.lex.need_right()?;
                    self.lex.need_right()?;
                }
                "stroke" => self.parse_stroke(&mut line.stroke)?,
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("at, uuid or stroke")),
            }
        }

        Ok(SchItem { uuid, kind: SchItemKind::Line(line) })
    }

    // ------------------------------------------------------------------
    // Schematic shapes
    // ------------------------------------------------------------------

    pub(crate) fn parse_sch_polyline(&mut self) -> Result<(Kiid, Shape), SchError> {
        let mut uuid = Kiid::new();
        let mut pts = Vec::new();
        let mut stroke = StrokeParams::schematic_default();
        let mut fill = FillParams::default();

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "pts" => loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        TokenKind::Left => {}
                        _ => return Err(self.expecting("(")),
                    }

                    self.lex.next()?;

                    if self.lex.text() != "xy" {
                        return Err(self.expecting("xy"));
                    }

                    pts.push(self.parse_xy()?);
                    self.lex.need_right()?;
                },
                "stroke" => {
                    self.parse_stroke(&mut stroke)?;

                    // In 6.0 the default schematic line style was dashed.
                    if self.version <= 20211123 && stroke.style == LineStyle::Default {
                        stroke.style = LineStyle::Dash;
                    }
                }
                "fill" => {
                    self.parse_fill(&mut fill)?;
                    fill.fixup_schematic(&stroke);
                }
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("pts, uuid, stroke, or fill")),
            }
        }

        let mut shape = Shape::new(ShapeKind::Polyline { pts });
        shape.stroke = stroke;
        shape.fill = fill;
        Ok((uuid, shape))
    }

    fn parse_sch_arc(&mut self) -> Result<(Kiid, Shape), SchError> {
        let mut uuid = Kiid::new();
        let mut start = IVec2::ZERO;
        let mut mid = IVec2::ZERO;
        let mut end = IVec2::ZERO;
        let mut stroke = StrokeParams::schematic_default();
        let mut fill = FillParams::default();

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "start" => {
                    start = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "mid" => {
                    mid = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "end" => {
                    end = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "stroke" => self.parse_stroke(&mut stroke)?,
                "fill" => {
                    self.parse_fill(&mut fill)?;
                    fill.fixup_schematic(&stroke);
                }
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("start, mid, end, stroke, fill or uuid")),
            }
        }

        let mut shape = Shape::new(ShapeKind::Arc { start, mid, end });
        shape.stroke = stroke;
        shape.fill = fill;

        if shape.is_degenerate_arc() {
            return Err(self.malformed("Arc with collinear control points"));
        }

        Ok((uuid, shape))
    }

    fn parse_sch_circle(&mut self) -> Result<(Kiid, Shape), SchError> {
        let mut uuid = Kiid::new();
        let mut center = IVec2::ZERO;
        let mut radius = 0;
        let mut stroke = StrokeParams::schematic_default();
        let mut fill = FillParams::default();

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "center" => {
                    center = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "radius" => {
                    radius = self.internal_units("radius length")?;
                    self.lex.need_right()?;
                }
                "stroke" => self.parse_stroke(&mut stroke)?,
                "fill" => {
                    self.parse_fill(&mut fill)?;
                    fill.fixup_schematic(&stroke);
                }
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("center, radius, stroke, fill or uuid")),
            }
        }

        let mut shape = Shape::new(ShapeKind::Circle { center, radius });
        shape.stroke = stroke;
        shape.fill = fill;
        Ok((uuid, shape))
    }

    fn parse_sch_rectangle(&mut self) -> Result<(Kiid, Shape), SchError> {
        let mut uuid = Kiid::new();
        let mut start = IVec2::ZERO;
        let mut end = IVec2::ZERO;
        let mut corner_radius = 0.0;
        let mut stroke = StrokeParams::schematic_default();
        let mut fill = FillParams::default();

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "start" => {
                    start = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "end" => {
                    end = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "radius" => {
                    corner_radius =
                        self.parse_double("corner radius")? * ecad_core::SCH_IU_PER_MM;
                    self.lex.need_right()?;
                }
                "stroke" => self.parse_stroke(&mut stroke)?,
                "fill" => {
                    self.parse_fill(&mut fill)?;
                    fill.fixup_schematic(&stroke);
                }
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("start, end, stroke, fill or uuid")),
            }
        }

        let mut shape = Shape::new(ShapeKind::Rectangle { start, end, corner_radius });
        shape.stroke = stroke;
        shape.fill = fill;
        Ok((uuid, shape))
    }

    fn parse_sch_bezier(&mut self) -> Result<(Kiid, Shape), SchError> {
        let mut uuid = Kiid::new();
        let mut pts = [IVec2::ZERO; 4];
        let mut stroke = StrokeParams::schematic_default();
        let mut fill = FillParams::default();

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "pts" => {
                    let mut ii = 0;

                    loop {
                        match self.lex.next()? {
                            TokenKind::Right => break,
                            TokenKind::Left => {}
                            _ => return Err(self.expecting("(")),
                        }

                        self.lex.next()?;

                        if self.lex.text() != "xy" {
                            return Err(self.expecting("xy"));
                        }

                        if ii > 3 {
                            return Err(self.malformed("Too many bezier control points"));
                        }

                        pts[ii] = self.parse_xy()?;
                        ii += 1;
                        self.lex.need_right()?;
                    }
                }
                "stroke" => self.parse_stroke(&mut stroke)?,
                "fill" => {
                    self.parse_fill(&mut fill)?;
                    fill.fixup_schematic(&stroke);
                }
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("pts, stroke, fill or uuid")),
            }
        }

        let mut shape =
            Shape::new(ShapeKind::Bezier { start: pts[0], c1: pts[1], c2: pts[2], end: pts[3] });
        shape.stroke = stroke;
        shape.fill = fill;
        Ok((uuid, shape))
    }

    fn parse_rule_area(&mut self) -> Result<SchItem, SchError> {
        let mut uuid = Kiid::new();
        let mut area: Option<RuleArea> = None;
        let mut excluded_from_sim = false;
        let mut excluded_from_bom = false;
        let mut excluded_from_board = false;
        let mut dnp = false;

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "polyline" => {
                    let (poly_uuid, shape) = self.parse_sch_polyline()?;
                    // The uuid is stored on the inner polyline but owned by
                    // the rule area.
                    uuid = poly_uuid;
                    area = Some(RuleArea {
                        shape,
                        excluded_from_sim: false,
                        excluded_from_bom: false,
                        excluded_from_board: false,
                        dnp: false,
                    });
                }
                "exclude_from_sim" => {
                    excluded_from_sim = self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "in_bom" => {
                    excluded_from_bom = !self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "on_board" => {
                    excluded_from_board = !self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "dnp" => {
                    dnp = self.parse_bool()?;
                    self.lex.need_right()?;
                }
                _ => {
                    return Err(
                        self.expecting("exclude_from_sim, on_board, in_bom, dnp, or polyline")
                    )
                }
            }
        }

        let mut area = area.ok_or_else(|| self.malformed("Rule area without a polyline"))?;
        area.excluded_from_sim = excluded_from_sim;
        area.excluded_from_bom = excluded_from_bom;
        area.excluded_from_board = excluded_from_board;
        area.dnp = dnp;

        Ok(SchItem { uuid, kind: SchItemKind::RuleArea(area) })
    }

    // ------------------------------------------------------------------
    // Text and labels
    // ------------------------------------------------------------------

    fn parse_sch_text_item(&mut self, keyword: &str) -> Result<SchItem, SchError> {
        let label_kind = match keyword {
            "text" => None,
            "label" => Some(LabelKind::Plain),
            "global_label" => Some(LabelKind::Global),
            "hierarchical_label" => Some(LabelKind::Hierarchical),
            "netclass_flag" | "directive_label" => Some(LabelKind::Directive),
            _ => return Err(self.expecting("text or label")),
        };

        let mut uuid = Kiid::new();

        let raw = self.lex.need_symbol()?;
        let text_value = if self.version < 20210606 {
            convert_to_new_overbar_notation(&raw)
        } else {
            raw
        };

        let mut text = SchText {
            text: text_value.clone(),
            position: IVec2::ZERO,
            angle_deg: 0.0,
            effects: Default::default(),
            excluded_from_sim: false,
        };

        let mut label = label_kind.map(|kind| {
            let mut l = Label::new(kind);
            l.text = text_value.clone();
            l
        });

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "exclude_from_sim" => {
                    let v = self.parse_bool()?;
                    text.excluded_from_sim = v;
                    if let Some(l) = label.as_mut() {
                        l.excluded_from_sim = v;
                    }
                    self.lex.need_right()?;
                }
                "at" => {
                    let pos = self.parse_xy()?;
                    let angle = self.parse_double("text angle")?;
                    text.position = pos;
                    text.angle_deg = angle;
                    if let Some(l) = label.as_mut() {
                        l.position = pos;
                        l.angle_deg = angle;
                    }
                    self.lex.need_right()?;
                }
                "shape" => {
                    let Some(l) = label.as_mut() else {
                        return Err(self.expecting("at, uuid or effects"));
                    };

                    if l.kind == LabelKind::Plain {
                        return Err(self.expecting("at, uuid or effects"));
                    }

                    self.lex.next()?;
                    l.shape = LabelShape::from_token(self.lex.text()).ok_or_else(|| {
                        self.expecting(
                            "input, output, bidirectional, tri_state, passive, dot, round, \
                             diamond or rectangle",
                        )
                    })?;
                    self.lex.need_right()?;
                }
                "length" => {
                    let Some(l) = label.as_mut() else {
                        return Err(self.expecting("at, uuid or effects"));
                    };

                    if l.kind != LabelKind::Directive {
                        return Err(self.expecting("at, uuid or effects"));
                    }

                    l.pin_length = self.internal_units("pin length")?;
                    self.lex.need_right()?;
                }
                "fields_autoplaced" => {
                    let v = self.parse_maybe_absent_bool(true)?;
                    if let Some(l) = label.as_mut() {
                        l.fields_autoplaced = v;
                    }
                }
                "effects" => {
                    let mut fx = text.effects.clone();
                    self.parse_effects(&mut fx)?;
                    // Hidden schematic text is no longer supported.
                    fx.visible = true;
                    text.effects = fx.clone();
                    if let Some(l) = label.as_mut() {
                        l.effects = fx;
                    }
                }
                "iref" => {
                    // Legacy intersheet-reference position; current formats
                    // use a property.
                    let pos = self.parse_xy()?;
                    self.lex.need_right()?;

                    if let Some(l) = label.as_mut() {
                        if l.kind == LabelKind::Global {
                            if let Some(field) = l.field_mut(FieldId::IntersheetRefs) {
                                field.position = pos;
                                field.effects.visible = true;
                            }
                        }
                    }
                }
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                "property" => {
                    let Some(l) = label.as_mut() else {
                        return Err(self.expecting("at, uuid or effects"));
                    };

                    let parent = if l.kind == LabelKind::Global {
                        FieldParent::GlobalLabel
                    } else {
                        FieldParent::OtherLabel
                    };

                    let field = self.parse_sch_field(parent)?;

                    if l.kind == LabelKind::Global && field.is_mandatory() {
                        if let Some(existing) = l.field_mut(field.id) {
                            *existing = field;
                        } else {
                            l.fields.push(field);
                        }
                    } else {
                        l.fields.push(field);
                    }
                }
                _ => return Err(self.expecting("at, shape, iref, uuid or effects")),
            }
        }

        let kind = match label {
            Some(mut l) => {
                if l.fields.is_empty() {
                    l.fields_autoplaced = true;
                }
                SchItemKind::Label(l)
            }
            None => SchItemKind::Text(text),
        };

        Ok(SchItem { uuid, kind })
    }

    /// Shared body of text boxes and table cells. Returns the parsed box,
    /// its uuid, and the cell span when `allow_span` is set.
    fn parse_sch_text_box_content(
        &mut self,
        allow_span: bool,
    ) -> Result<(Kiid, TextBox, (i32, i32)), SchError> {
        let mut uuid = Kiid::new();
        let mut tb = TextBox::new();
        let mut span = (1, 1);

        let raw = self.lex.need_symbol()?;
        tb.text = if self.version < 20210606 {
            convert_to_new_overbar_notation(&raw)
        } else {
            raw
        };

        let mut pos = IVec2::ZERO;
        let mut end = IVec2::ZERO;
        let mut size = IVec2::ZERO;
        let mut found_end = false;
        let mut found_size = false;
        let mut found_margins = false;

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "exclude_from_sim" => {
                    tb.excluded_from_sim = self.parse_bool()?;
                    self.lex.need_right()?;
                }
                // Legacy tokens during 6.99 development.
                "start" => {
                    pos = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "end" => {
                    end = self.parse_xy()?;
                    found_end = true;
                    self.lex.need_right()?;
                }
                "at" => {
                    pos = self.parse_xy()?;
                    tb.angle_deg = self.parse_double("textbox angle")?;
                    self.lex.need_right()?;
                }
                "size" => {
                    size = self.parse_xy()?;
                    found_size = true;
                    self.lex.need_right()?;
                }
                "span" => {
                    if !allow_span {
                        return Err(self.expecting("at, size, stroke, fill, effects or uuid"));
                    }

                    span.0 = self.parse_int("column span")? as i32;
                    span.1 = self.parse_int("row span")? as i32;
                    self.lex.need_right()?;
                }
                "stroke" => self.parse_stroke(&mut tb.stroke)?,
                "fill" => {
                    let mut fill = tb.fill;
                    self.parse_fill(&mut fill)?;
                    fill.fixup_schematic(&tb.stroke);
                    tb.fill = fill;
                }
                "margins" => {
                    tb.margins = self.parse_margins()?;
                    found_margins = true;
                    self.lex.need_right()?;
                }
                "effects" => self.parse_effects(&mut tb.effects)?,
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                _ => {
                    if allow_span {
                        return Err(self.expecting("at, size, stroke, fill, effects, span or uuid"));
                    }
                    return Err(self.expecting("at, size, stroke, fill, effects or uuid"));
                }
            }
        }

        tb.start = pos;

        if found_end {
            tb.end = end;
        } else if found_size {
            tb.end = pos + size;
        } else {
            return Err(self.expecting("size"));
        }

        if !found_margins {
            let margin = tb.legacy_margin();
            tb.margins = [margin; 4];
        }

        Ok((uuid, tb, span))
    }

    fn parse_sch_table(&mut self) -> Result<SchItem, SchError> {
        let mut uuid = Kiid::new();
        let mut table = Table::default();

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "column_count" => {
                    table.column_count = self.parse_int("column count")? as i32;
                    self.lex.need_right()?;
                }
                "column_widths" => loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        TokenKind::Number => {
                            let mm = self.lex.cur_double("column width")?;
                            table
                                .column_widths
                                .push(ecad_core::UnitScale::SCHEMATIC.mm_to_iu(mm));
                        }
                        _ => return Err(self.expecting("column width")),
                    }
                },
                "row_heights" => loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        TokenKind::Number => {
                            let mm = self.lex.cur_double("row height")?;
                            table
                                .row_heights
                                .push(ecad_core::UnitScale::SCHEMATIC.mm_to_iu(mm));
                        }
                        _ => return Err(self.expecting("row height")),
                    }
                },
                "cells" => loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        TokenKind::Left => {}
                        _ => return Err(self.expecting("(")),
                    }

                    self.lex.next()?;

                    if self.lex.text() != "table_cell" {
                        return Err(self.expecting("table_cell"));
                    }

                    let (cell_uuid, tb, span) = self.parse_sch_text_box_content(true)?;
                    table.cells.push(TableCell {
                        uuid: cell_uuid,
                        textbox: tb,
                        col_span: span.0,
                        row_span: span.1,
                    });
                },
                "border" => loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        TokenKind::Left => {}
                        _ => return Err(self.expecting("(")),
                    }

                    self.lex.next()?;
                    let tok = self.lex.text().to_owned();

                    match tok.as_str() {
                        "external" => {
                            table.stroke_external = self.parse_bool()?;
                            self.lex.need_right()?;
                        }
                        "header" => {
                            table.stroke_header_separator = self.parse_bool()?;
                            self.lex.need_right()?;
                        }
                        "stroke" => {
                            let mut stroke = StrokeParams::schematic_default();
                            self.parse_stroke(&mut stroke)?;
                            table.border_stroke = stroke;
                        }
                        _ => return Err(self.expecting("external, header or stroke")),
                    }
                },
                "separators" => loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        TokenKind::Left => {}
                        _ => return Err(self.expecting("(")),
                    }

                    self.lex.next()?;
                    let tok = self.lex.text().to_owned();

                    match tok.as_str() {
                        "rows" => {
                            table.stroke_rows = self.parse_bool()?;
                            self.lex.need_right()?;
                        }
                        "cols" => {
                            table.stroke_columns = self.parse_bool()?;
                            self.lex.need_right()?;
                        }
                        "stroke" => {
                            let mut stroke = StrokeParams::schematic_default();
                            self.parse_stroke(&mut stroke)?;
                            table.separators_stroke = stroke;
                        }
                        _ => return Err(self.expecting("rows, cols, or stroke")),
                    }
                },
                "uuid" => {
                    uuid = self.parse_kiid()?;
                    self.lex.need_right()?;
                }
                _ => {
                    return Err(self.expecting(
                        "columns, col_widths, row_heights, border, separators, uuid, header \
                         or cells",
                    ))
                }
            }
        }

        Ok(SchItem { uuid, kind: SchItemKind::Table(table) })
    }

    // ------------------------------------------------------------------
    // Instance blocks and bus aliases
    // ------------------------------------------------------------------

    fn parse_sheet_instances(&mut self, doc: &mut Document) -> Result<(), SchError> {
        loop {
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;

            if self.lex.text() != "path" {
                return Err(self.expecting("path"));
            }

            let mut data = SheetInstanceData {
                project: None,
                path: KiidPath::parse(&self.lex.need_symbol()?),
                ..Default::default()
            };

            // Root-relative legacy paths get the root identifier prepended
            // so that all paths in the document are absolute.
            if self.opts.is_root && !self.opts.appending && self.version < 20221002 {
                data.path.prepend(self.root_uuid);
            }

            loop {
                match self.lex.next()? {
                    TokenKind::Right => break,
                    TokenKind::Left => {}
                    _ => return Err(self.expecting("(")),
                }

                self.lex.next()?;
                let tok = self.lex.text().to_owned();

                match tok.as_str() {
                    "page" => {
                        let raw = self.lex.need_symbol()?;
                        let scrubbed = scrub_page_number(&raw);

                        if scrubbed != raw {
                            // Content changed on load; the user should be
                            // warned when re-saving.
                            doc.modified_on_load = true;
                        }

                        data.page_number = scrubbed;
                        self.lex.need_right()?;
                    }
                    _ => return Err(self.expecting("path or page")),
                }
            }

            doc.sheet_instances.push(data);
        }
    }

    fn parse_symbol_instances(&mut self, doc: &mut Document) -> Result<(), SchError> {
        loop {
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;

            if self.lex.text() != "path" {
                return Err(self.expecting("path"));
            }

            let mut data = SymbolInstanceData {
                project: None,
                path: KiidPath::parse(&self.lex.need_symbol()?),
                ..Default::default()
            };

            if !self.opts.appending {
                data.path.prepend(self.root_uuid);
            }

            loop {
                match self.lex.next()? {
                    TokenKind::Right => break,
                    TokenKind::Left => {}
                    _ => return Err(self.expecting("(")),
                }

                self.lex.next()?;
                let tok = self.lex.text().to_owned();

                match tok.as_str() {
                    "reference" => {
                        data.reference = self.lex.need_symbol()?;
                        self.lex.need_right()?;
                    }
                    "unit" => {
                        data.unit = self.parse_int("symbol unit")? as i32;
                        self.lex.need_right()?;
                    }
                    "value" => {
                        let raw = self.lex.need_symbol()?;
                        data.value = Some(self.legacy_empty(raw));
                        self.lex.need_right()?;
                    }
                    "footprint" => {
                        let raw = self.lex.need_symbol()?;
                        data.footprint = Some(self.legacy_empty(raw));
                        self.lex.need_right()?;
                    }
                    _ => return Err(self.expecting("path, unit, value or footprint")),
                }
            }

            doc.symbol_instances.push(data);
        }
    }

    fn parse_bus_alias(&mut self, doc: &mut Document) -> Result<(), SchError> {
        let raw = self.lex.need_symbol()?;
        let name = if self.version < 20210621 {
            convert_to_new_overbar_notation(&raw)
        } else {
            raw
        };

        let mut alias = BusAlias { name, members: Vec::new() };

        self.lex.need_left()?;
        self.lex.next()?;

        if self.lex.text() != "members" {
            return Err(self.expecting("members"));
        }

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                _ if self.lex.cur().is_symbol() => {
                    let raw = self.lex.text().to_owned();
                    let member = if self.version < 20210621 {
                        convert_to_new_overbar_notation(&raw)
                    } else {
                        raw
                    };
                    alias.members.push(member);
                }
                _ => return Err(self.expecting("quoted string")),
            }
        }

        self.lex.need_right()?;
        doc.bus_aliases.push(alias);
        Ok(())
    }
}

/// Empty page numbers and whitespace are not permitted; scrub on read.
fn scrub_page_number(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        "#".to_owned()
    } else {
        cleaned
    }
}
