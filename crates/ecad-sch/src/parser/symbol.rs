use ecad_core::LibId;
use ecad_geom::arc::{arc_midpoint, arc_sweep_ccw};
use ecad_sexpr::TokenKind;
use glam::IVec2;

use crate::error::SchError;
use crate::field::{Field, FieldId};
use crate::item::TextBox;
use crate::pin::{Pin, PinAlt, PinGraphicStyle, PinOrientation, PinType};
use crate::shape::{Shape, ShapeKind};
use crate::stroke::{FillParams, StrokeParams};
use crate::symbol::{DrawItem, LibSymbol, LibText, PowerType};
use crate::text::convert_to_new_overbar_notation;

use super::common::unescape_string;
use super::SchParser;

impl<'a, 'd> SchParser<'a, 'd> {
    /// `(symbol "Name" ...)`, current token is `symbol`. Parses one library
    /// symbol including nested unit forms.
    pub(crate) fn parse_lib_symbol(&mut self) -> Result<LibSymbol, SchError> {
        self.lex.next()?;

        if !self.lex.cur().is_symbol() {
            return Err(self.malformed("Invalid symbol name"));
        }

        // '/' used to be escaped in LIB_IDs, which breaks derived symbol
        // links; it is no longer an illegal character.
        let name = Self::unescape_slash(self.lex.text());

        let lib_id = LibId::parse(&name).map_err(|err| self.malformed(err.to_string()))?;

        self.symbol_name = lib_id.item.clone();
        let mut symbol = LibSymbol::new(self.symbol_name.clone());
        symbol.lib_id = lib_id;

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "power" => {
                    symbol.power = PowerType::GlobalPower;
                    match self.lex.next()? {
                        TokenKind::Right => continue,
                        _ => match self.lex.text() {
                            "local" => symbol.power = PowerType::LocalPower,
                            "global" => {}
                            _ => return Err(self.expecting("global or local")),
                        },
                    }
                    self.lex.need_right()?;
                }
                "body_styles" => self.parse_body_styles(&mut symbol)?,
                "pin_names" => self.parse_pin_names(&mut symbol)?,
                "pin_numbers" => self.parse_pin_numbers(&mut symbol)?,
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
                "duplicate_pin_numbers_are_jumpers" => {
                    symbol.duplicate_pin_numbers_are_jumpers = self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "jumper_pin_groups" => self.parse_jumper_pin_groups(&mut symbol)?,
                "property" => self.parse_lib_property(&mut symbol)?,
                "extends" => {
                    self.lex.next()?;

                    if !self.lex.cur().is_symbol() {
                        return Err(self.malformed("Invalid parent symbol name"));
                    }

                    symbol.parent = Some(Self::unescape_slash(self.lex.text()));
                    self.lex.need_right()?;
                }
                "symbol" => self.parse_symbol_unit(&mut symbol)?,
                "arc" | "bezier" | "circle" | "pin" | "polyline" | "rectangle" | "text"
                | "text_box" => {
                    let item = self.parse_draw_item_inner()?;
                    symbol.draw_items.push(item);
                }
                "embedded_fonts" => {
                    symbol.fonts_embedded = self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "embedded_files" => {
                    let mut bundle = std::mem::take(&mut symbol.embedded);
                    if let Err(err) = self.parse_embedded_files(&mut bundle) {
                        self.diag.warn(err.to_string());
                        self.skip_to_block_end(1)?;
                    }
                    symbol.embedded = bundle;
                }
                _ => {
                    return Err(self.expecting(
                        "pin_names, pin_numbers, arc, bezier, circle, pin, polyline, \
                         rectangle, or text",
                    ))
                }
            }
        }

        self.symbol_name.clear();

        // Resolve fonts of text items against the symbol's own embedded
        // bundle.
        let fonts = symbol.embedded.font_files();
        for item in &mut symbol.draw_items {
            match item {
                DrawItem::Text(t) => t.effects.resolve_font(&fonts),
                DrawItem::TextBox(t) => t.effects.resolve_font(&fonts),
                _ => {}
            }
        }
        for field in &mut symbol.fields {
            field.effects.resolve_font(&fonts);
        }

        // Before this version the number of body styles wasn't stored; it
        // was inferred from the drawings every time.
        if self.version < 20250827 {
            symbol.has_demorgan_body_styles = symbol.has_alternate_body_drawing();
        }

        Ok(symbol)
    }

    /// Nested `(symbol "Name_<unit>_<bodystyle>" ...)` unit form.
    fn parse_symbol_unit(&mut self, symbol: &mut LibSymbol) -> Result<(), SchError> {
        self.lex.next()?;

        if !self.lex.cur().is_symbol() {
            return Err(self.malformed("Invalid symbol unit name"));
        }

        let name = Self::unescape_slash(self.lex.text());

        let Some(suffix) = name
            .strip_prefix(self.symbol_name.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
        else {
            return Err(self.malformed(format!("Invalid symbol unit name prefix {name}")));
        };

        let parts: Vec<&str> = suffix.split('_').collect();

        if parts.len() != 2 {
            return Err(self.malformed(format!("Invalid symbol unit name suffix {suffix}")));
        }

        let unit: i32 = parts[0]
            .parse()
            .map_err(|_| self.malformed(format!("Invalid symbol unit number {suffix}")))?;
        let body_style: i32 = parts[1]
            .parse()
            .map_err(|_| self.malformed(format!("Invalid symbol body style number {suffix}")))?;

        self.unit = unit;
        self.body_style = body_style;

        if body_style > symbol.body_style_count {
            symbol.body_style_count = body_style;
        }

        if unit > symbol.unit_count {
            symbol.unit_count = unit;
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
                "unit_name" => {
                    self.lex.next()?;
                    if self.lex.cur().is_symbol() {
                        symbol.unit_display_names.insert(self.unit, self.lex.text().to_owned());
                    }
                    self.lex.need_right()?;
                }
                "arc" | "bezier" | "circle" | "pin" | "polyline" | "rectangle" | "text"
                | "text_box" => {
                    let item = self.parse_draw_item_inner()?;
                    symbol.draw_items.push(item);
                }
                _ => {
                    return Err(
                        self.expecting("arc, bezier, circle, pin, polyline, rectangle, or text")
                    )
                }
            }
        }

        self.unit = 1;
        self.body_style = 1;
        Ok(())
    }

    fn parse_body_styles(&mut self, symbol: &mut LibSymbol) -> Result<(), SchError> {
        loop {
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                _ => {
                    if self.lex.text() == "demorgan" && self.lex.cur().kind == TokenKind::Symbol {
                        symbol.has_demorgan_body_styles = true;
                    } else if self.lex.cur().is_symbol() {
                        symbol.body_style_names.push(self.lex.text().to_owned());
                    } else {
                        return Err(self.malformed("Invalid property value"));
                    }
                }
            }
        }
    }

    fn parse_pin_names(&mut self, symbol: &mut LibSymbol) -> Result<(), SchError> {
        loop {
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                // Pre-20241004 format: bare 'hide' keyword.
                _ if self.lex.text() == "hide" && self.lex.prev_kind() != TokenKind::Left => {
                    symbol.show_pin_names = false;
                    continue;
                }
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "offset" => {
                    symbol.pin_name_offset = self.internal_units("pin name offset")?;
                    self.lex.need_right()?;
                }
                "hide" => {
                    symbol.show_pin_names = !self.parse_bool()?;
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("offset or hide")),
            }
        }
    }

    fn parse_pin_numbers(&mut self, symbol: &mut LibSymbol) -> Result<(), SchError> {
        loop {
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                _ if self.lex.text() == "hide" && self.lex.prev_kind() != TokenKind::Left => {
                    symbol.show_pin_numbers = false;
                    continue;
                }
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "hide" => {
                    symbol.show_pin_numbers = !self.parse_bool()?;
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("hide")),
            }
        }
    }

    fn parse_jumper_pin_groups(&mut self, symbol: &mut LibSymbol) -> Result<(), SchError> {
        let mut current: Option<std::collections::BTreeSet<String>> = None;

        loop {
            match self.lex.next()? {
                TokenKind::Left => {
                    current = Some(Default::default());
                }
                TokenKind::Right => {
                    if let Some(group) = current.take() {
                        symbol.jumper_pin_groups.push(group);
                    } else {
                        return Ok(());
                    }
                }
                TokenKind::Quoted => {
                    if let Some(group) = current.as_mut() {
                        group.insert(self.lex.text().to_owned());
                    } else {
                        return Err(self.expecting("list of pin names"));
                    }
                }
                _ => return Err(self.expecting("list of pin names")),
            }
        }
    }

    /// `(property ...)` in a library symbol. Mandatory fields overwrite the
    /// defaults; a handful of `ki_*` names carry symbol attributes instead
    /// of becoming fields; duplicate user names are renamed `name_1..name_9`
    /// or dropped.
    fn parse_lib_property(&mut self, symbol: &mut LibSymbol) -> Result<(), SchError> {
        let mut private = false;

        self.lex.next()?;

        if self.lex.text() == "private" && self.lex.cur().kind == TokenKind::Symbol {
            private = true;
            self.lex.next()?;
        }

        if !self.lex.cur().is_symbol() {
            return Err(self.malformed("Invalid property name"));
        }

        let name = self.lex.text().to_owned();

        if name.is_empty() {
            return Err(self.malformed("Empty property name"));
        }

        let id = FieldId::from_canonical(&name, FieldId::SYMBOL_MANDATORY);

        self.lex.next()?;

        if !self.lex.cur().is_symbol() {
            return Err(self.malformed("Invalid property value"));
        }

        // Empty property values are valid.
        let value = self.legacy_empty(self.lex.text().to_owned());

        let mut field = Field::new(id, name.clone());
        field.text = value.clone();
        field.private = private;

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "id" => {
                    // Legacy numeric id; ignored.
                    self.parse_int("field ID")?;
                    self.lex.need_right()?;
                }
                "at" => {
                    field.position = self.parse_xy()?;
                    field.angle_deg = self.parse_double("text angle")?;
                    self.lex.need_right()?;
                }
                "hide" => {
                    field.effects.visible = !self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "effects" => {
                    self.parse_effects(&mut field.effects)?;

                    if field.id == FieldId::Value && self.version < 20210606 {
                        field.text = convert_to_new_overbar_notation(&field.text);
                    }
                }
                "show_name" => {
                    field.show_name = self.parse_maybe_absent_bool(true)?;
                }
                "do_not_autoplace" => {
                    field.can_autoplace = !self.parse_maybe_absent_bool(true)?;
                }
                _ => {
                    return Err(self.expecting("id, at, hide, show_name, do_not_autoplace, or effects"))
                }
            }
        }

        if field.is_mandatory() {
            if let Some(existing) = symbol.field_mut(field.id) {
                *existing = field;
            } else {
                symbol.fields.push(field);
            }
            return Ok(());
        }

        match name.as_str() {
            // Not fields: these legacy names carry symbol attributes.
            "ki_keywords" => symbol.keywords = value,
            "ki_description" => symbol.description = value,
            "ki_fp_filters" => {
                symbol.fp_filters =
                    value.split_whitespace().map(unescape_string).collect();
            }
            "ki_locked" => symbol.lock_units = true,
            _ => {
                if symbol.field_by_name(&name).is_none() {
                    symbol.fields.push(field);
                    return Ok(());
                }

                // The name is taken; try name_1 .. name_9 before giving up.
                for ii in 1..10 {
                    let candidate = format!("{name}_{ii}");

                    if symbol.field_by_name(&candidate).is_none() {
                        self.diag.warn(format!(
                            "Symbol {} contains duplicate field '{name}', renamed to \
                             '{candidate}'.",
                            symbol.name
                        ));
                        field.name = candidate;
                        symbol.fields.push(field);
                        return Ok(());
                    }
                }

                self.diag.warn(format!(
                    "Symbol {} contains too many duplicates of field '{name}'; the \
                     duplicate was dropped.",
                    symbol.name
                ));
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Draw items
    // ------------------------------------------------------------------

    pub(crate) fn parse_draw_item_inner(&mut self) -> Result<DrawItem, SchError> {
        match self.lex.text() {
            "arc" => Ok(DrawItem::Shape(self.parse_symbol_arc()?)),
            "bezier" => Ok(DrawItem::Shape(self.parse_symbol_bezier()?)),
            "circle" => Ok(DrawItem::Shape(self.parse_symbol_circle()?)),
            "pin" => Ok(DrawItem::Pin(self.parse_symbol_pin()?)),
            "polyline" => Ok(DrawItem::Shape(self.parse_symbol_polyline()?)),
            "rectangle" => Ok(DrawItem::Shape(self.parse_symbol_rectangle()?)),
            "text" => Ok(DrawItem::Text(self.parse_symbol_text()?)),
            "text_box" => Ok(DrawItem::TextBox(self.parse_symbol_text_box()?)),
            _ => Err(self.expecting("arc, bezier, circle, pin, polyline, rectangle, or text")),
        }
    }

    /// `private` flag in front of a shape body; consumes it if present.
    fn parse_private_flag(&mut self) -> Result<bool, SchError> {
        self.lex.next()?;

        if self.lex.cur().kind == TokenKind::Symbol && self.lex.text() == "private" {
            self.lex.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// An arc in either the modern `start/mid/end` or the legacy
    /// `start/end/radius(at,length,angles)` form; normalized to three-point.
    fn parse_symbol_arc(&mut self) -> Result<Shape, SchError> {
        // Non-degenerate placeholders, matching the legacy reader.
        let mut start = IVec2::new(1, 0);
        let mut mid = IVec2::new(1, 1);
        let mut end = IVec2::new(0, 1);
        let mut has_mid = false;
        let mut has_angles = false;
        let mut center = IVec2::ZERO;

        let mut stroke = StrokeParams::schematic_default();
        let mut fill = FillParams::default();
        let private = self.parse_private_flag()?;

        loop {
            match self.lex.cur().kind {
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
                    has_mid = true;
                    self.lex.need_right()?;
                }
                "end" => {
                    end = self.parse_xy()?;
                    self.lex.need_right()?;
                }
                "radius" => loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        TokenKind::Left => {}
                        _ => return Err(self.expecting("(")),
                    }

                    self.lex.next()?;
                    let tok = self.lex.text().to_owned();

                    match tok.as_str() {
                        "at" => {
                            center = self.parse_xy()?;
                            self.lex.need_right()?;
                        }
                        "length" => {
                            // Redundant with the endpoints; read and drop.
                            self.internal_units("radius length")?;
                            self.lex.need_right()?;
                        }
                        "angles" => {
                            // The stored angles are likewise redundant; the
                            // geometry is rebuilt from center + endpoints.
                            self.parse_double("start radius angle")?;
                            self.parse_double("end radius angle")?;
                            has_angles = true;
                            self.lex.need_right()?;
                        }
                        _ => return Err(self.expecting("at, length, or angles")),
                    }
                },
                "stroke" => self.parse_stroke(&mut stroke)?,
                "fill" => self.parse_fill(&mut fill)?,
                _ => return Err(self.expecting("start, mid, end, radius, stroke, or fill")),
            }

            self.lex.next()?;
        }

        let mut shape;

        if has_mid {
            shape = Shape::new(ShapeKind::Arc { start, mid, end });

            if shape.is_degenerate_arc() {
                return Err(self.malformed("Arc with collinear control points"));
            }

            if self.version <= 20230121 && shape.fixup_legacy_arc() {
                self.diag.warn(format!(
                    "Arc at line {} required a legacy geometry fixup.",
                    self.lex.line_number()
                ));
            }
        } else if has_angles {
            // Old libraries stored start-end with an implied winding that
            // differed between editors; the short straw was drawn long ago,
            // so the ends arrive swapped.
            let c = center.as_dvec2();
            let (mut s, mut e) = (end, start);
            let mut sweep = arc_sweep_ccw(c, s.as_dvec2(), e.as_dvec2());

            // The arc angle should be <= 180 degrees in old libraries; if
            // not, the first choice of ends was wrong.
            if sweep > 180.0 {
                std::mem::swap(&mut s, &mut e);
                sweep = 360.0 - sweep;
            }

            let m = arc_midpoint(c, s.as_dvec2(), sweep);
            let mid = IVec2::new(m.x.round() as i32, m.y.round() as i32);

            shape = Shape::new(ShapeKind::Arc { start: s, mid, end: e });

            if shape.is_degenerate_arc() {
                return Err(self.malformed("Arc with collinear control points"));
            }
        } else {
            return Err(self.malformed("Arc without mid point or angles"));
        }

        shape.stroke = stroke;
        shape.fill = fill;
        shape.unit = self.unit;
        shape.body_style = self.body_style;
        shape.private = private;
        Ok(shape)
    }

    fn parse_symbol_bezier(&mut self) -> Result<Shape, SchError> {
        let mut pts = [IVec2::ZERO; 4];
        let mut stroke = StrokeParams::schematic_default();
        let mut fill = FillParams::default();
        let private = self.parse_private_flag()?;

        loop {
            match self.lex.cur().kind {
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

                        let p = self.parse_xy()?;

                        if ii > 3 {
                            return Err(self.malformed("Too many bezier control points"));
                        }

                        pts[ii] = p;
                        ii += 1;
                        self.lex.need_right()?;
                    }
                }
                "stroke" => self.parse_stroke(&mut stroke)?,
                "fill" => self.parse_fill(&mut fill)?,
                _ => return Err(self.expecting("pts, stroke, or fill")),
            }

            self.lex.next()?;
        }

        let mut shape =
            Shape::new(ShapeKind::Bezier { start: pts[0], c1: pts[1], c2: pts[2], end: pts[3] });
        shape.stroke = stroke;
        shape.fill = fill;
        shape.unit = self.unit;
        shape.body_style = self.body_style;
        shape.private = private;
        Ok(shape)
    }

    fn parse_symbol_circle(&mut self) -> Result<Shape, SchError> {
        let mut center = IVec2::ZERO;
        let mut radius = 0;
        let mut stroke = StrokeParams::schematic_default();
        let mut fill = FillParams::default();
        let private = self.parse_private_flag()?;

        loop {
            match self.lex.cur().kind {
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
                "fill" => self.parse_fill(&mut fill)?,
                _ => return Err(self.expecting("center, radius, stroke, or fill")),
            }

            self.lex.next()?;
        }

        let mut shape = Shape::new(ShapeKind::Circle { center, radius });
        shape.stroke = stroke;
        shape.fill = fill;
        shape.unit = self.unit;
        shape.body_style = self.body_style;
        shape.private = private;
        Ok(shape)
    }

    fn parse_symbol_polyline(&mut self) -> Result<Shape, SchError> {
        let mut pts = Vec::new();
        let mut stroke = StrokeParams::schematic_default();
        let mut fill = FillParams::default();
        let private = self.parse_private_flag()?;

        loop {
            match self.lex.cur().kind {
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
                "stroke" => self.parse_stroke(&mut stroke)?,
                "fill" => self.parse_fill(&mut fill)?,
                _ => return Err(self.expecting("pts, stroke, or fill")),
            }

            self.lex.next()?;
        }

        let mut shape = Shape::new(ShapeKind::Polyline { pts });
        shape.stroke = stroke;
        shape.fill = fill;
        shape.unit = self.unit;
        shape.body_style = self.body_style;
        shape.private = private;
        Ok(shape)
    }

    fn parse_symbol_rectangle(&mut self) -> Result<Shape, SchError> {
        let mut start = IVec2::ZERO;
        let mut end = IVec2::ZERO;
        let mut corner_radius = 0.0;
        let mut stroke = StrokeParams::schematic_default();
        let mut fill = FillParams::default();
        let private = self.parse_private_flag()?;

        loop {
            match self.lex.cur().kind {
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
                "fill" => self.parse_fill(&mut fill)?,
                _ => return Err(self.expecting("start, end, stroke, or fill")),
            }

            self.lex.next()?;
        }

        let mut shape = Shape::new(ShapeKind::Rectangle { start, end, corner_radius });
        shape.stroke = stroke;
        shape.fill = fill;
        shape.unit = self.unit;
        shape.body_style = self.body_style;
        shape.private = private;
        Ok(shape)
    }

    fn parse_symbol_pin(&mut self) -> Result<Pin, SchError> {
        let mut pin = Pin::new();
        pin.unit = self.unit;
        pin.body_style = self.body_style;

        // Pin electrical type.
        self.lex.next()?;
        pin.pin_type = PinType::from_token(self.lex.text()).ok_or_else(|| {
            self.expecting(
                "input, output, bidirectional, tri_state, passive, unspecified, power_in, \
                 power_out, open_collector, open_emitter, free or no_connect",
            )
        })?;

        // Pin graphic shape.
        self.lex.next()?;
        pin.style = PinGraphicStyle::from_token(self.lex.text()).ok_or_else(|| {
            self.expecting(
                "line, inverted, clock, inverted_clock, input_low, clock_low, output_low, \
                 edge_clock_high, non_logic",
            )
        })?;

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                // Pre-20241004 format: bare 'hide' keyword.
                _ if self.lex.text() == "hide" && self.lex.prev_kind() != TokenKind::Left => {
                    pin.visible = false;
                    continue;
                }
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "at" => {
                    pin.position = self.parse_xy()?;

                    let deg = self.parse_int("pin orientation")?;
                    pin.orientation = PinOrientation::from_degrees(deg)
                        .ok_or_else(|| self.expecting("0, 90, 180, or 270"))?;

                    self.lex.need_right()?;
                }
                "length" => {
                    pin.length = self.internal_units("pin length")?;

                    if pin.length < 0 {
                        return Err(self.malformed("Negative pin length"));
                    }

                    self.lex.need_right()?;
                }
                "hide" => {
                    pin.visible = !self.parse_bool()?;
                    self.lex.need_right()?;
                }
                "name" => {
                    self.lex.next()?;

                    if !self.lex.cur().is_symbol() {
                        return Err(self.malformed("Invalid pin name"));
                    }

                    let raw = self.lex.text().to_owned();
                    pin.name = if self.version < 20250318 && raw == "~" {
                        String::new()
                    } else if self.version < 20210606 {
                        convert_to_new_overbar_notation(&raw)
                    } else {
                        raw
                    };

                    if self.lex.next()? != TokenKind::Right {
                        self.lex.next()?;

                        if self.lex.text() != "effects" {
                            return Err(self.expecting("effects"));
                        }

                        let mut fx = crate::text::TextEffects::default();
                        self.parse_effects(&mut fx)?;
                        pin.name_text_size = fx.size.y;
                        self.lex.need_right()?;
                    }
                }
                "number" => {
                    self.lex.next()?;

                    if !self.lex.cur().is_symbol() {
                        return Err(self.malformed("Invalid pin number"));
                    }

                    let raw = self.lex.text().to_owned();
                    pin.number = if self.version < 20250318 && raw == "~" {
                        String::new()
                    } else if self.version < 20210606 {
                        convert_to_new_overbar_notation(&raw)
                    } else {
                        raw
                    };

                    if self.lex.next()? != TokenKind::Right {
                        self.lex.next()?;

                        if self.lex.text() != "effects" {
                            return Err(self.expecting("effects"));
                        }

                        let mut fx = crate::text::TextEffects::default();
                        self.parse_effects(&mut fx)?;
                        pin.number_text_size = fx.size.y;
                        self.lex.need_right()?;
                    }
                }
                "alternate" => {
                    self.lex.next()?;

                    if !self.lex.cur().is_symbol() {
                        return Err(self.malformed("Invalid alternate pin name"));
                    }

                    let name = self.lex.text().to_owned();

                    self.lex.next()?;
                    let pin_type = PinType::from_token(self.lex.text())
                        .ok_or_else(|| self.expecting("pin type"))?;

                    self.lex.next()?;
                    let style = PinGraphicStyle::from_token(self.lex.text())
                        .ok_or_else(|| self.expecting("pin shape"))?;

                    pin.alternates.insert(name.clone(), PinAlt { name, pin_type, style });
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("at, name, number, hide, length, or alternate")),
            }
        }

        Ok(pin)
    }

    fn parse_symbol_text(&mut self) -> Result<LibText, SchError> {
        let mut text = LibText {
            text: String::new(),
            position: IVec2::ZERO,
            angle_deg: 0.0,
            effects: Default::default(),
            unit: self.unit,
            body_style: self.body_style,
            private: false,
        };

        text.private = self.parse_private_flag()?;

        if !self.lex.cur().is_symbol() {
            return Err(self.malformed("Invalid text string"));
        }

        text.text = if self.version < 20210606 {
            convert_to_new_overbar_notation(self.lex.text())
        } else {
            self.lex.text().to_owned()
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
                    text.position = self.parse_xy()?;
                    // Symbol text angles are tenths of a degree in the file,
                    // unlike every other text item.
                    text.angle_deg = self.parse_double("text angle")? / 10.0;
                    self.lex.need_right()?;
                }
                "effects" => self.parse_effects(&mut text.effects)?,
                _ => return Err(self.expecting("at or effects")),
            }
        }

        Ok(text)
    }

    fn parse_symbol_text_box(&mut self) -> Result<TextBox, SchError> {
        let mut tb = TextBox::new();
        tb.unit = self.unit;
        tb.body_style = self.body_style;
        tb.private = self.parse_private_flag()?;

        if !self.lex.cur().is_symbol() {
            return Err(self.malformed("Invalid text string"));
        }

        tb.text = self.lex.text().to_owned();

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
                // Legacy tokens from 6.99 development; they fail to handle
                // the angle but must still parse.
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
                "stroke" => self.parse_stroke(&mut tb.stroke)?,
                "fill" => self.parse_fill(&mut tb.fill)?,
                "margins" => {
                    tb.margins = self.parse_margins()?;
                    found_margins = true;
                    self.lex.need_right()?;
                }
                "effects" => self.parse_effects(&mut tb.effects)?,
                _ => return Err(self.expecting("at, size, stroke, fill or effects")),
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

        Ok(tb)
    }
}
