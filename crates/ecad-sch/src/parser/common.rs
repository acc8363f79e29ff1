use ecad_sexpr::TokenKind;

use crate::error::SchError;
use crate::field::{Field, FieldId};
use crate::stroke::{Color, FillParams, FillType, LineStyle, StrokeParams};
use crate::text::{convert_to_new_overbar_notation, HJustify, TextEffects, VJustify};

use super::SchParser;

/// Which item a field belongs to; decides the mandatory-field set and the
/// legacy name aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldParent {
    Symbol,
    Sheet,
    GlobalLabel,
    OtherLabel,
}

impl<'a, 'd> SchParser<'a, 'd> {
    /// `(color R G B A)` with the channel values already consumed as the
    /// next four tokens.
    pub(crate) fn parse_color(&mut self) -> Result<Color, SchError> {
        let r = self.parse_int("red")?.clamp(0, 255) as u8;
        let g = self.parse_int("green")?.clamp(0, 255) as u8;
        let b = self.parse_int("blue")?.clamp(0, 255) as u8;
        let a = self.parse_double("alpha")?.clamp(0.0, 1.0);
        Ok(Color { r, g, b, a })
    }

    /// `(stroke (width W) (type T) [(color R G B A)])`, current token is
    /// `stroke`.
    pub(crate) fn parse_stroke(&mut self, stroke: &mut StrokeParams) -> Result<(), SchError> {
        loop {
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "width" => {
                    stroke.width = self.internal_units("stroke width")?;
                    self.lex.need_right()?;
                }
                "type" => {
                    self.lex.next()?;
                    stroke.style = LineStyle::from_token(self.lex.text())
                        .ok_or_else(|| self.expecting("solid, dash, dash_dot, dash_dot_dot, dot or default"))?;
                    self.lex.need_right()?;
                }
                "color" => {
                    stroke.color = Some(self.parse_color()?);
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("width, type, or color")),
            }
        }
    }

    /// `(fill (type T) [(color ...)])`, current token is `fill`.
    pub(crate) fn parse_fill(&mut self, fill: &mut FillParams) -> Result<(), SchError> {
        fill.fill = FillType::None;
        fill.color = None;

        loop {
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "type" => {
                    self.lex.next()?;
                    fill.fill = match self.lex.text() {
                        "none" => FillType::None,
                        "outline" => FillType::Outline,
                        "background" => FillType::Background,
                        "color" => FillType::Color,
                        "hatch" => FillType::Hatch,
                        "reverse_hatch" => FillType::ReverseHatch,
                        "cross_hatch" => FillType::CrossHatch,
                        _ => {
                            return Err(self.expecting(
                                "none, outline, hatch, reverse_hatch, cross_hatch, color or background",
                            ))
                        }
                    };
                    self.lex.need_right()?;
                }
                "color" => {
                    fill.color = Some(self.parse_color()?);
                    self.lex.need_right()?;
                }
                _ => return Err(self.expecting("type or color")),
            }
        }
    }

    /// `(effects (font ...) (justify ...) (href ...) hide)`, current token
    /// is `effects`. The file-format default justification is center/center
    /// regardless of what the item kind defaults to elsewhere, so it is
    /// reset here before reading.
    pub(crate) fn parse_effects(&mut self, fx: &mut TextEffects) -> Result<(), SchError> {
        fx.h_justify = HJustify::Center;
        fx.v_justify = VJustify::Center;

        loop {
            // Bare keywords (legacy `bold`, `italic`, `hide`) are tolerated
            // alongside parenthesized forms.
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                TokenKind::Left => {
                    self.lex.next()?;
                }
                _ => {}
            }

            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "font" => loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        TokenKind::Left => {
                            self.lex.next()?;
                        }
                        _ => {}
                    }

                    let tok = self.lex.text().to_owned();

                    match tok.as_str() {
                        "face" => {
                            fx.font_face = Some(self.lex.need_symbol()?);
                            self.lex.need_right()?;
                        }
                        "size" => {
                            let height = self.internal_units("text height")?;
                            let width = self.internal_units("text width")?;
                            fx.size = glam::IVec2::new(width, height);
                            self.lex.need_right()?;
                        }
                        "thickness" => {
                            fx.thickness = self.internal_units("text thickness")?;
                            self.lex.need_right()?;
                        }
                        "bold" => {
                            fx.bold = self.parse_maybe_absent_bool(true)?;
                        }
                        "italic" => {
                            fx.italic = self.parse_maybe_absent_bool(true)?;
                        }
                        "color" => {
                            fx.color = Some(self.parse_color()?);
                            self.lex.need_right()?;
                        }
                        "line_spacing" => {
                            fx.line_spacing = Some(self.parse_double("line spacing")?);
                            self.lex.need_right()?;
                        }
                        _ => {
                            return Err(self.expecting(
                                "face, size, thickness, line_spacing, bold, or italic",
                            ))
                        }
                    }
                },
                "justify" => loop {
                    match self.lex.next()? {
                        TokenKind::Right => break,
                        _ => match self.lex.text() {
                            "left" => fx.h_justify = HJustify::Left,
                            "right" => fx.h_justify = HJustify::Right,
                            "top" => fx.v_justify = VJustify::Top,
                            "bottom" => fx.v_justify = VJustify::Bottom,
                            // Mirror is not applied to schematic text.
                            "mirror" => {}
                            _ => return Err(self.expecting("left, right, top, bottom, or mirror")),
                        },
                    }
                },
                "href" => {
                    let link = self.lex.need_symbol()?;

                    if link.is_empty() {
                        return Err(self.malformed(format!("Invalid hyperlink url '{link}'")));
                    }

                    fx.hyperlink = Some(link);
                    self.lex.need_right()?;
                }
                "hide" => {
                    let hide = self.parse_maybe_absent_bool(true)?;
                    fx.visible = !hide;
                }
                _ => return Err(self.expecting("font, justify, hide or href")),
            }
        }
    }

    /// `(margins L T R B)`, current token is `margins`. The caller validates
    /// the closing paren.
    pub(crate) fn parse_margins(&mut self) -> Result<[i32; 4], SchError> {
        Ok([
            self.internal_units("left margin")?,
            self.internal_units("top margin")?,
            self.internal_units("right margin")?,
            self.internal_units("bottom margin")?,
        ])
    }

    /// A `(property ...)` form on a schematic item. The canonical name
    /// decides the role; legacy spellings of the sheet and intersheet
    /// fields are re-keyed.
    pub(crate) fn parse_sch_field(&mut self, parent: FieldParent) -> Result<Field, SchError> {
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

        self.lex.next()?;

        if !self.lex.cur().is_symbol() {
            return Err(self.malformed("Invalid property value"));
        }

        // Empty property values are valid.
        let value = self.legacy_empty(self.lex.text().to_owned());

        let mut id = match parent {
            FieldParent::Symbol => FieldId::from_canonical(&name, FieldId::SYMBOL_MANDATORY),
            FieldParent::Sheet => {
                let mut id = FieldId::from_canonical(&name, FieldId::SHEET_MANDATORY);

                // Legacy support for old field names.
                if name.eq_ignore_ascii_case("Sheet name") {
                    id = FieldId::SheetName;
                } else if name.eq_ignore_ascii_case("Sheet file") {
                    id = FieldId::SheetFilename;
                }

                id
            }
            FieldParent::GlobalLabel => {
                let mut id = FieldId::from_canonical(&name, FieldId::GLOBAL_LABEL_MANDATORY);

                if name.eq_ignore_ascii_case("Intersheet References") {
                    id = FieldId::IntersheetRefs;
                }

                id
            }
            FieldParent::OtherLabel => FieldId::User,
        };

        if parent == FieldParent::OtherLabel {
            id = FieldId::User;
        }

        let mut field = Field::new(id, name);
        field.text = value;

        if id == FieldId::User {
            field.private = private;
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
                "id" => {
                    // Legacy numeric field id; ignored.
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
                    return Err(self.expecting("id, at, hide, show_name, do_not_autoplace or effects"))
                }
            }
        }

        Ok(field)
    }
}

impl<'a, 'd> SchParser<'a, 'd> {
    /// `(embedded_files (file (name ...) (type ...) (data ...) (checksum ...))*)`,
    /// current token is `embedded_files`. A malformed file entry is recorded
    /// as a warning and skipped; the block as a whole still parses.
    pub(crate) fn parse_embedded_files(
        &mut self,
        bundle: &mut crate::embedded::EmbeddedFiles,
    ) -> Result<(), SchError> {
        use base64::Engine as _;

        loop {
            match self.lex.next()? {
                TokenKind::Right => return Ok(()),
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;

            if self.lex.text() != "file" {
                return Err(self.expecting("file"));
            }

            let mut name = String::new();
            let mut kind = crate::embedded::EmbeddedFileKind::Other;
            let mut data_b64 = String::new();
            let mut checksum = None;

            loop {
                match self.lex.next()? {
                    TokenKind::Right => break,
                    TokenKind::Left => {}
                    _ => return Err(self.expecting("(")),
                }

                self.lex.next()?;
                let tok = self.lex.text().to_owned();

                match tok.as_str() {
                    "name" => {
                        name = self.lex.need_symbol()?;
                        self.lex.need_right()?;
                    }
                    "type" => {
                        self.lex.next()?;
                        kind = crate::embedded::EmbeddedFileKind::from_token(self.lex.text());
                        self.lex.need_right()?;
                    }
                    "data" => loop {
                        match self.lex.next()? {
                            TokenKind::Right => break,
                            k if k == TokenKind::Symbol
                                || k == TokenKind::Quoted
                                || k == TokenKind::Number =>
                            {
                                data_b64.push_str(self.lex.text().trim_matches('|'));
                            }
                            _ => return Err(self.expecting("base64 data")),
                        }
                    },
                    "checksum" => {
                        checksum = Some(self.lex.need_symbol()?);
                        self.lex.need_right()?;
                    }
                    _ => return Err(self.expecting("name, type, data or checksum")),
                }
            }

            match base64::engine::general_purpose::STANDARD.decode(data_b64.as_bytes()) {
                Ok(data) => {
                    bundle.files.push(crate::embedded::EmbeddedFile { name, kind, data, checksum });
                }
                Err(err) => {
                    self.diag.warn(format!("invalid embedded file data for '{name}': {err}"));
                }
            }
        }
    }
}

/// Minimal string unescaping for footprint filters: the writer escapes a few
/// characters in `{...}` groups.
pub(crate) fn unescape_string(value: &str) -> String {
    value
        .replace("{slash}", "/")
        .replace("{space}", " ")
        .replace("{colon}", ":")
        .replace("{dblquote}", "\"")
}
