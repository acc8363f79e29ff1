use ecad_core::UnitScale;
use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::stroke::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HJustify {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VJustify {
    Top,
    #[default]
    Center,
    Bottom,
}

/// Text attributes shared by fields, labels, plain text, text boxes and
/// table cells.
///
/// `font_face` holds the *unresolved* font name from the file; after the
/// whole document is available the resolution pass matches it against the
/// embedded-font bundle and records the outcome in `resolved_font`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEffects {
    pub font_face: Option<String>,
    pub resolved_font: Option<String>,
    pub size: IVec2,
    pub thickness: i32,
    pub bold: bool,
    pub italic: bool,
    pub color: Option<Color>,
    pub line_spacing: Option<f64>,
    pub h_justify: HJustify,
    pub v_justify: VJustify,
    pub visible: bool,
    pub hyperlink: Option<String>,
}

impl Default for TextEffects {
    fn default() -> Self {
        let default_size = UnitScale::SCHEMATIC.mm_to_iu(1.27);
        TextEffects {
            font_face: None,
            resolved_font: None,
            size: IVec2::splat(default_size),
            thickness: 0,
            bold: false,
            italic: false,
            color: None,
            line_spacing: None,
            h_justify: HJustify::Center,
            v_justify: VJustify::Center,
            visible: true,
            hyperlink: None,
        }
    }
}

impl TextEffects {
    /// Resolve the font against the embedded-font list, falling back to the
    /// default stroke font (recorded as `None`).
    pub fn resolve_font(&mut self, embedded_fonts: &[String]) {
        let Some(face) = &self.font_face else {
            return;
        };

        self.resolved_font = embedded_fonts
            .iter()
            .find(|f| f.eq_ignore_ascii_case(face))
            .cloned();
    }
}

/// Convert legacy `~abc~` overbar markup to the modern `~{abc}` form.
///
/// The conversion is idempotent: `~{` is recognized as already-converted and
/// passed through, and `~~` is an escaped literal tilde. The lone-`~` string
/// is the legacy empty-value token and is left alone; the version gate in
/// the parser decides what it means.
pub fn convert_to_new_overbar_notation(old: &str) -> String {
    if old == "~" {
        return old.to_owned();
    }

    let mut out = String::with_capacity(old.len() + 4);
    let mut in_overbar = false;
    let mut chars = old.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '~' {
            out.push(ch);
            continue;
        }

        match chars.peek() {
            Some('~') => {
                out.push('~');
                chars.next();
            }
            Some('{') if !in_overbar => {
                // Already in the new notation.
                out.push('~');
            }
            _ => {
                if in_overbar {
                    out.push('}');
                    in_overbar = false;
                } else {
                    out.push_str("~{");
                    in_overbar = true;
                }
            }
        }
    }

    if in_overbar {
        out.push('}');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_legacy_overbars() {
        assert_eq!(convert_to_new_overbar_notation("~CLK~"), "~{CLK}");
        assert_eq!(convert_to_new_overbar_notation("A~B~C"), "A~{B}C");
        assert_eq!(convert_to_new_overbar_notation("~RESET"), "~{RESET}");
    }

    #[test]
    fn escaped_tilde_stays_literal() {
        assert_eq!(convert_to_new_overbar_notation("50~~60Hz"), "50~60Hz");
    }

    #[test]
    fn conversion_is_idempotent() {
        for s in ["~CLK~", "~{CLK}", "plain", "A~B~C", "~RESET", "~"] {
            let once = convert_to_new_overbar_notation(s);
            let twice = convert_to_new_overbar_notation(&once);
            assert_eq!(once, twice, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn font_resolution_prefers_embedded() {
        let mut fx = TextEffects { font_face: Some("Inter".to_owned()), ..Default::default() };
        fx.resolve_font(&["inter".to_owned(), "Mono".to_owned()]);
        assert_eq!(fx.resolved_font.as_deref(), Some("inter"));

        let mut fx = TextEffects { font_face: Some("Missing".to_owned()), ..Default::default() };
        fx.resolve_font(&["Inter".to_owned()]);
        assert_eq!(fx.resolved_font, None);
    }
}
