use ecad_board::{
    Axis, Board, BoardText, Dimension, DimensionStyle, LeaderDimension, LinearDimension,
    TextHJustify,
};
use ecad_core::Kiid;
use glam::DVec2;

use crate::archive::*;
use crate::error::ImportError;

use super::CadstarPcbLoader;

impl<'d> CadstarPcbLoader<'d> {
    /// Linear dimensions map to aligned/orthogonal dimensions (angled ones
    /// fall back to aligned with a warning); leader dimensions map to
    /// leader-style dimensions with CADSTAR's four-quadrant orientation
    /// rules; angular dimensions have no equivalent.
    pub(super) fn load_dimensions(&mut self, board: &mut Board) -> Result<(), ImportError> {
        let dimensions: Vec<CadstarDimension> =
            self.archive.layout.dimensions.values().cloned().collect();

        for cs_dim in dimensions {
            match cs_dim.kind {
                DimensionKind::Linear => self.load_linear_dimension(board, &cs_dim)?,
                DimensionKind::Leader => self.load_leader_dimension(board, &cs_dim)?,
                DimensionKind::Angular => {
                    self.diag.error(
                        format!(
                            "Dimension ID {} is an angular dimension which has no KiCad \
                             equivalent. The object was not imported.",
                            cs_dim.id
                        ),
                        None,
                    );
                }
            }
        }

        Ok(())
    }

    fn dimension_style(&self, cs_dim: &CadstarDimension) -> Result<DimensionStyle, ImportError> {
        let code = self.text_code(&cs_dim.text.text_code)?;

        Ok(DimensionStyle {
            line_thickness: self.length(code.line_width),
            arrow_length: 0,
            units_suffix: true,
            precision: cs_dim.precision,
            prefix: String::new(),
            suffix: String::new(),
        })
    }

    fn dimension_text(
        &mut self,
        cs_dim: &CadstarDimension,
        layer: ecad_board::Layer,
    ) -> Result<BoardText, ImportError> {
        let mut out = Vec::new();
        self.text_into(&mut out, &cs_dim.text, Some(&cs_dim.layer), None)?;

        Ok(out.into_iter().next().unwrap_or_else(|| BoardText::new("", layer)))
    }

    fn load_linear_dimension(
        &mut self,
        board: &mut Board,
        cs_dim: &CadstarDimension,
    ) -> Result<(), ImportError> {
        if cs_dim.subtype == DimensionSubtype::Angled {
            self.diag.warn(format!(
                "Dimension ID {} is an angled dimension, which has no KiCad equivalent. \
                 An aligned dimension was loaded instead.",
                cs_dim.id
            ));
        }

        if cs_dim.line.style == DimensionLineStyle::External {
            self.diag.warn(format!(
                "Dimension ID {} has 'External' style in CADSTAR. External dimension \
                 styles are not yet supported in KiCad. The dimension object was imported \
                 with an internal dimension style instead.",
                cs_dim.id
            ));
        }

        let layer = self.kicad_layer(&cs_dim.layer);

        let orientation = if cs_dim.subtype == DimensionSubtype::Orthogonal {
            if cs_dim.extension_line_params.start.x == cs_dim.line.start.x {
                Some(Axis::Horizontal)
            } else {
                Some(Axis::Vertical)
            }
        } else {
            None
        };

        // Measured points come from the extension-line parameters; the
        // crossbar is the dimension line itself.
        let start = self.point(cs_dim.extension_line_params.start);
        let end = self.point(cs_dim.extension_line_params.end);

        let crossbar_start = self.point(cs_dim.line.start).as_dvec2();
        let crossbar_end = self.point(cs_dim.line.end).as_dvec2();
        let height_vector = crossbar_start - start.as_dvec2();

        let height = match orientation {
            Some(Axis::Horizontal) => height_vector.y,
            Some(Axis::Vertical) => height_vector.x,
            None => {
                // Project onto the crossbar normal.
                let crossbar = crossbar_end - crossbar_start;
                let angle = crossbar.to_angle() + std::f64::consts::FRAC_PI_2;
                height_vector.x * angle.cos() + height_vector.y * angle.sin()
            }
        };

        let dimension = LinearDimension {
            id: Kiid::new(),
            layer,
            start,
            end,
            height: height.round() as i32,
            extension_offset: self.length(cs_dim.extension_line_params.offset),
            extension_height: self.length(cs_dim.extension_line_params.overshoot),
            orientation,
            text: self.dimension_text(cs_dim, layer)?,
            style: self.dimension_style(cs_dim)?,
        };

        board.dimensions.push(Dimension::Linear(dimension));
        Ok(())
    }

    fn load_leader_dimension(
        &mut self,
        board: &mut Board,
        cs_dim: &CadstarDimension,
    ) -> Result<(), ImportError> {
        let layer = self.kicad_layer(&cs_dim.layer);
        let style = self.dimension_style(cs_dim)?;

        if cs_dim.line.style == DimensionLineStyle::Internal {
            // A simple double-sided arrow from start to end; no extension
            // lines.
            let dimension = LinearDimension {
                id: Kiid::new(),
                layer,
                start: self.point(cs_dim.line.start),
                end: self.point(cs_dim.line.end),
                height: 0,
                extension_offset: 0,
                extension_height: 0,
                orientation: None,
                text: self.dimension_text(cs_dim, layer)?,
                style,
            };

            board.dimensions.push(Dimension::Linear(dimension));
            return Ok(());
        }

        // External style: a true leader. The resulting orientation depends
        // on the quadrant of the end point relative to the start point;
        // coincident or axis-aligned points read as orientation 2.
        let ang_rad = Self::angle_deg(cs_dim.line.leader_angle).to_radians();

        let orient_x: f64 = if cs_dim.line.end.x >= cs_dim.line.start.x { 1.0 } else { -1.0 };
        let orient_y: f64 = if cs_dim.line.end.y >= cs_dim.line.start.y { 1.0 } else { -1.0 };

        let leader_length = cs_dim.line.leader_line_length as f64;
        let extension_length = cs_dim.line.leader_line_extension_length as f64;

        let end_offset = DVec2::new(
            leader_length * ang_rad.cos() * orient_x,
            leader_length * ang_rad.sin() * orient_y,
        );

        let end_point = cs_dim.line.end.as_dvec2() + end_offset;
        let text_point =
            DVec2::new(end_point.x + extension_length * orient_x, end_point.y);

        let mut text = self.dimension_text(cs_dim, layer)?;
        text.position = self.point(glam::I64Vec2::new(
            text_point.x.round() as i64,
            text_point.y.round() as i64,
        ));
        text.h_justify =
            if orient_x > 0.0 { TextHJustify::Right } else { TextHJustify::Left };

        let dimension = LeaderDimension {
            id: Kiid::new(),
            layer,
            start: self.point(cs_dim.line.end),
            end: self.point(glam::I64Vec2::new(
                end_point.x.round() as i64,
                end_point.y.round() as i64,
            )),
            text,
            style,
        };

        board.dimensions.push(Dimension::Leader(dimension));
        Ok(())
    }
}
