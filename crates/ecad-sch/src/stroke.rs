use ecad_core::UnitScale;
use serde::{Deserialize, Serialize};

/// Historic default line width, in mils.
pub const DEFAULT_LINE_WIDTH_MILS: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Color { r, g, b, a: a.clamp(0.0, 1.0) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineStyle {
    /// "Use the default for this item kind" — distinct from solid.
    #[default]
    Default,
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
}

impl LineStyle {
    pub fn from_token(tok: &str) -> Option<Self> {
        match tok {
            "default" => Some(LineStyle::Default),
            "solid" => Some(LineStyle::Solid),
            "dash" => Some(LineStyle::Dash),
            "dot" => Some(LineStyle::Dot),
            "dash_dot" => Some(LineStyle::DashDot),
            "dash_dot_dot" => Some(LineStyle::DashDotDot),
            _ => None,
        }
    }
}

/// Stroke of an outline or wire: width in internal units, line style, and an
/// optional explicit color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeParams {
    pub width: i32,
    pub style: LineStyle,
    pub color: Option<Color>,
}

impl StrokeParams {
    /// The stroke every production starts from: the historic default width
    /// and the default line style.
    pub fn schematic_default() -> Self {
        StrokeParams {
            width: UnitScale::SCHEMATIC.mils_to_iu(DEFAULT_LINE_WIDTH_MILS),
            style: LineStyle::Default,
            color: None,
        }
    }
}

impl Default for StrokeParams {
    fn default() -> Self {
        StrokeParams::schematic_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FillType {
    #[default]
    None,
    /// Filled with the outline (stroke) color.
    Outline,
    /// Filled with the theme's body background color.
    Background,
    /// Filled with an explicit color.
    Color,
    Hatch,
    ReverseHatch,
    CrossHatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FillParams {
    pub fill: FillType,
    pub color: Option<Color>,
}

impl FillParams {
    /// Schematic shapes don't support "filled with stroke color" directly;
    /// it is normalized on read to an explicit color fill.
    pub fn fixup_schematic(&mut self, stroke: &StrokeParams) {
        if self.fill == FillType::Outline {
            self.color = stroke.color;
            self.fill = FillType::Color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stroke_width_is_six_mils() {
        assert_eq!(StrokeParams::schematic_default().width, 1524);
    }

    #[test]
    fn outline_fill_normalizes_to_color() {
        let stroke = StrokeParams {
            color: Some(Color::new(255, 0, 0, 1.0)),
            ..StrokeParams::schematic_default()
        };
        let mut fill = FillParams { fill: FillType::Outline, color: None };
        fill.fixup_schematic(&stroke);
        assert_eq!(fill.fill, FillType::Color);
        assert_eq!(fill.color, stroke.color);
    }
}
