use ecad_board::{
    Board, BoardShape, BoardShapeKind, BoardText, Layer, NetCode, TextHJustify, TextVJustify,
    Track, TrackArc, TrackItem,
};
use ecad_core::Kiid;
use ecad_geom::{
    primitives_from_vertices, ring_from_primitives, PolySet, Polygon, Primitive, Transform2,
    Vertex, VertexKind,
};
use glam::{DVec2, IVec2};

use crate::archive::*;
use crate::error::ImportError;

use super::CadstarPcbLoader;

/// Height of the CADSTAR text glyphs relative to the nominal text height.
const TEXT_HEIGHT_RATIO: f64 = 0.805;

pub(super) fn round_point(p: DVec2) -> IVec2 {
    IVec2::new(p.x.round() as i32, p.y.round() as i32)
}

impl<'d> CadstarPcbLoader<'d> {
    /// Convert archive vertex records into geometry-layer vertices in board
    /// coordinates. The Y inversion of the coordinate conversion mirrors
    /// arc windings, so clockwise and anticlockwise swap.
    pub(super) fn geom_vertices(&self, vertices: &[CadstarVertex]) -> Vec<Vertex> {
        vertices
            .iter()
            .map(|v| {
                let kind = match v.kind {
                    VertexKind::Point => VertexKind::Point,
                    VertexKind::ClockwiseArc => VertexKind::AnticlockwiseArc,
                    VertexKind::AnticlockwiseArc => VertexKind::ClockwiseArc,
                    VertexKind::ClockwiseSemicircle => VertexKind::AnticlockwiseSemicircle,
                    VertexKind::AnticlockwiseSemicircle => VertexKind::ClockwiseSemicircle,
                };

                Vertex { kind, end: self.point(v.end), center: self.point(v.center) }
            })
            .collect()
    }

    /// Primitives for a vertex sequence, optionally transformed.
    pub(super) fn primitives_for(
        &self,
        vertices: &[CadstarVertex],
        transform: Option<&Transform2>,
    ) -> Vec<Primitive> {
        let prims = primitives_from_vertices(&self.geom_vertices(vertices));

        match transform {
            None => prims,
            Some(t) if t.is_identity() => prims,
            Some(t) => prims.into_iter().map(|p| transform_primitive(p, t)).collect(),
        }
    }

    /// Convert a closed shape to a polygon set: the outline ring, the
    /// cutout holes, and an optional inflation for a nonzero stroke width.
    pub(super) fn polyset_from_shape(
        &self,
        shape: &CadstarShape,
        line_thickness: i32,
        max_error: f64,
        transform: Option<&Transform2>,
    ) -> PolySet {
        let outline =
            ring_from_primitives(&self.primitives_for(&shape.vertices, transform), max_error);

        let holes = shape
            .cutouts
            .iter()
            .map(|cutout| {
                ring_from_primitives(&self.primitives_for(&cutout.vertices, transform), max_error)
            })
            .filter(|ring| !ring.is_empty())
            .collect();

        let mut polyset = PolySet::from_polygon(Polygon { outline, holes });

        if line_thickness > 0 {
            polyset = polyset.inflate(line_thickness as f64 / 2.0);
        }

        polyset
    }

    /// Materialize a shape as board graphics on one layer. Solid and
    /// hatched shapes become filled polygons; outlines and open shapes
    /// become segment/arc chains (cutouts included). Returns the new item
    /// ids so the caller can group them.
    pub(super) fn draw_shape_into(
        &self,
        out: &mut Vec<BoardShape>,
        shape: &CadstarShape,
        layer: Layer,
        line_thickness: i32,
        max_error: f64,
        transform: Option<&Transform2>,
    ) -> Vec<Kiid> {
        let mut ids = Vec::new();

        match shape.fill {
            ShapeFill::Solid | ShapeFill::Hatched => {
                let poly = self.polyset_from_shape(shape, 0, max_error, transform);
                let item = BoardShape::new(
                    BoardShapeKind::Polygon { poly, filled: true },
                    layer,
                    line_thickness,
                );
                ids.push(item.id);
                out.push(item);
            }
            ShapeFill::Outline | ShapeFill::OpenShape => {
                for prim in self.primitives_for(&shape.vertices, transform) {
                    let item = board_shape_from_primitive(&prim, layer, line_thickness);
                    ids.push(item.id);
                    out.push(item);
                }

                for cutout in &shape.cutouts {
                    for prim in self.primitives_for(&cutout.vertices, transform) {
                        let item = board_shape_from_primitive(&prim, layer, line_thickness);
                        ids.push(item.id);
                        out.push(item);
                    }
                }
            }
        }

        ids
    }

    /// Convert a primitive chain to board tracks with correct arc
    /// preservation. `widths` supplies the per-primitive width; a single
    /// entry applies to the whole chain.
    pub(super) fn tracks_from_primitives(
        &self,
        board: &mut Board,
        primitives: &[Primitive],
        widths: &[i32],
        layer: Layer,
        net: Option<NetCode>,
    ) -> Vec<Kiid> {
        let mut ids = Vec::new();

        for (index, prim) in primitives.iter().enumerate() {
            let width = widths.get(index).or_else(|| widths.last()).copied().unwrap_or(0);

            let item = match *prim {
                Primitive::Segment { start, end } => TrackItem::Segment(Track {
                    id: Kiid::new(),
                    start: round_point(start),
                    end: round_point(end),
                    width,
                    layer,
                    net,
                    locked: false,
                }),
                Primitive::Arc { start, end, center, .. } => TrackItem::Arc(TrackArc {
                    id: Kiid::new(),
                    start: round_point(start),
                    end: round_point(end),
                    center: round_point(center),
                    sweep_deg: prim.signed_sweep(),
                    width,
                    layer,
                    net,
                    locked: false,
                }),
            };

            ids.push(item.id());
            board.tracks.push(item);
        }

        ids
    }

    /// Materialize one CADSTAR text on the board (or into a container's
    /// text list), applying the documentation-symbol transform when given.
    pub(super) fn text_into(
        &self,
        out: &mut Vec<BoardText>,
        text: &CadstarText,
        layer_override: Option<&LayerId>,
        transform: Option<&Transform2>,
    ) -> Result<Vec<Kiid>, ImportError> {
        let code = self.text_code(&text.text_code)?;

        let layer_id = layer_override.unwrap_or(&text.layer);

        let mut position = self.point(text.position).as_dvec2();
        let mut angle = Self::angle_deg(text.orient_angle);
        let mut mirrored = text.mirror;

        let mut height = self.length(code.height);
        // The width is zero for all non-CADSTAR fonts; using the height
        // works well for most of them.
        let mut width = self.length(code.width);
        if width == 0 {
            width = height;
        }
        let mut thickness = self.length(code.line_width);

        if let Some(t) = transform {
            position = t.apply(position);
            angle = t.apply_angle(angle);

            if t.mirror {
                mirrored = !mirrored;
            }

            if t.scale != 1.0 {
                height = (f64::from(height) * t.scale).round() as i32;
                width = (f64::from(width) * t.scale).round() as i32;
                thickness = (f64::from(thickness) * t.scale).round() as i32;
            }
        }

        if mirrored {
            // Mirrored text angles are inverted to match CADSTAR.
            angle = -angle;
        }

        let (v_justify, h_justify) = match text.alignment {
            // Single-line text defaults to bottom-left when unaligned.
            Alignment::NoAlignment | Alignment::BottomLeft => {
                (TextVJustify::Bottom, TextHJustify::Left)
            }
            Alignment::BottomCenter => (TextVJustify::Bottom, TextHJustify::Center),
            Alignment::BottomRight => (TextVJustify::Bottom, TextHJustify::Right),
            Alignment::CenterLeft => (TextVJustify::Center, TextHJustify::Left),
            Alignment::CenterCenter => (TextVJustify::Center, TextHJustify::Center),
            Alignment::CenterRight => (TextVJustify::Center, TextHJustify::Right),
            Alignment::TopLeft => (TextVJustify::Top, TextHJustify::Left),
            Alignment::TopCenter => (TextVJustify::Top, TextHJustify::Center),
            Alignment::TopRight => (TextVJustify::Top, TextHJustify::Right),
        };

        let mut ids = Vec::new();

        for layer in self.kicad_layer_set(layer_id).iter() {
            let mut item = BoardText::new(text.text.clone(), layer);
            item.position = round_point(position);
            item.angle_deg = angle;
            item.mirrored = mirrored;
            item.size = IVec2::new(
                width,
                (f64::from(height) * TEXT_HEIGHT_RATIO).round() as i32,
            );
            item.thickness = thickness;
            item.h_justify = h_justify;
            item.v_justify = v_justify;

            ids.push(item.id);
            out.push(item);
        }

        Ok(ids)
    }
}

fn board_shape_from_primitive(prim: &Primitive, layer: Layer, width: i32) -> BoardShape {
    match *prim {
        Primitive::Segment { start, end } => BoardShape::new(
            BoardShapeKind::Segment { start: round_point(start), end: round_point(end) },
            layer,
            width,
        ),
        Primitive::Arc { start, end, center, .. } => BoardShape::new(
            BoardShapeKind::Arc {
                start: round_point(start),
                end: round_point(end),
                center: round_point(center),
                sweep_deg: prim.signed_sweep(),
            },
            layer,
            width,
        ),
    }
}

/// Apply the fixed-order affine transform to a primitive. Mirroring flips
/// the winding of arcs.
fn transform_primitive(prim: Primitive, t: &Transform2) -> Primitive {
    match prim {
        Primitive::Segment { start, end } => {
            Primitive::Segment { start: t.apply(start), end: t.apply(end) }
        }
        Primitive::Arc { start, end, center, clockwise } => Primitive::Arc {
            start: t.apply(start),
            end: t.apply(end),
            center: t.apply(center),
            clockwise: clockwise != t.mirror,
        },
    }
}
