use glam::{DVec2, IVec2};
use serde::{Deserialize, Serialize};

use crate::arc::{arc_sweep_ccw, arc_to_points};
use crate::poly::Ring;

/// Edge type of one vertex record in an outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexKind {
    /// Straight edge to the end point.
    Point,
    ClockwiseArc,
    AnticlockwiseArc,
    ClockwiseSemicircle,
    AnticlockwiseSemicircle,
}

/// One vertex record: an edge type, the edge's end point, and (for plain
/// arcs) the arc center. Semicircles carry no meaningful center; it is
/// reconstructed as the midpoint of the edge's endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub kind: VertexKind,
    pub end: IVec2,
    pub center: IVec2,
}

impl Vertex {
    pub fn point(end: IVec2) -> Self {
        Vertex { kind: VertexKind::Point, end, center: IVec2::ZERO }
    }

    pub fn arc(kind: VertexKind, end: IVec2, center: IVec2) -> Self {
        Vertex { kind, end, center }
    }
}

/// A drawable primitive reconstructed from a pair of vertex records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Segment { start: DVec2, end: DVec2 },
    Arc { start: DVec2, end: DVec2, center: DVec2, clockwise: bool },
}

impl Primitive {
    pub fn start(&self) -> DVec2 {
        match *self {
            Primitive::Segment { start, .. } | Primitive::Arc { start, .. } => start,
        }
    }

    pub fn end(&self) -> DVec2 {
        match *self {
            Primitive::Segment { end, .. } | Primitive::Arc { end, .. } => end,
        }
    }

    /// Signed sweep in degrees: positive counter-clockwise, negative
    /// clockwise; zero for segments.
    pub fn signed_sweep(&self) -> f64 {
        match *self {
            Primitive::Segment { .. } => 0.0,
            Primitive::Arc { start, end, center, clockwise } => {
                let ccw = arc_sweep_ccw(center, start, end);
                if clockwise { ccw - 360.0 } else { ccw }
            }
        }
    }
}

/// Convert a vertex sequence into primitives. The first record gives the
/// start point; each following record contributes one edge. Fewer than two
/// records cannot form an edge and yield nothing.
pub fn primitives_from_vertices(vertices: &[Vertex]) -> Vec<Primitive> {
    if vertices.len() < 2 {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(vertices.len() - 1);
    let mut prev = vertices[0].end;

    for v in &vertices[1..] {
        let start = prev.as_dvec2();
        let end = v.end.as_dvec2();

        let prim = match v.kind {
            VertexKind::Point => Primitive::Segment { start, end },
            VertexKind::ClockwiseArc => Primitive::Arc {
                start,
                end,
                center: v.center.as_dvec2(),
                clockwise: true,
            },
            VertexKind::AnticlockwiseArc => Primitive::Arc {
                start,
                end,
                center: v.center.as_dvec2(),
                clockwise: false,
            },
            VertexKind::ClockwiseSemicircle => Primitive::Arc {
                start,
                end,
                center: (start + end) * 0.5,
                clockwise: true,
            },
            VertexKind::AnticlockwiseSemicircle => Primitive::Arc {
                start,
                end,
                center: (start + end) * 0.5,
                clockwise: false,
            },
        };

        out.push(prim);
        prev = v.end;
    }

    out
}

/// Flatten a closed primitive chain into a polygon ring, polygonizing arcs
/// to the requested maximum error.
pub fn ring_from_primitives(primitives: &[Primitive], max_error: f64) -> Ring {
    let mut pts: Vec<DVec2> = Vec::new();

    for prim in primitives {
        match *prim {
            Primitive::Segment { start, end } => {
                if pts.last().map_or(true, |&p| p.distance(start) > 1e-9) {
                    pts.push(start);
                }
                pts.push(end);
            }
            Primitive::Arc { start, center, .. } => {
                let sweep = prim.signed_sweep();
                let arc_pts = arc_to_points(center, start, sweep, max_error);
                for p in arc_pts {
                    if pts.last().map_or(true, |&q| q.distance(p) > 1e-9) {
                        pts.push(p);
                    }
                }
            }
        }
    }

    // The chain is closed; drop a duplicated closing point.
    if pts.len() > 1 && pts[0].distance(*pts.last().unwrap()) < 1e-9 {
        pts.pop();
    }

    Ring::new(pts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_outline_to_segments() {
        let verts = vec![
            Vertex::point(IVec2::new(0, 0)),
            Vertex::point(IVec2::new(10, 0)),
            Vertex::point(IVec2::new(10, 10)),
            Vertex::point(IVec2::new(0, 0)),
        ];

        let prims = primitives_from_vertices(&verts);
        assert_eq!(prims.len(), 3);
        assert_eq!(prims[0].start(), DVec2::ZERO);
        assert_eq!(prims[2].end(), DVec2::ZERO);
        assert!(prims.iter().all(|p| p.signed_sweep() == 0.0));
    }

    #[test]
    fn semicircle_center_is_chord_midpoint() {
        let verts = vec![
            Vertex::point(IVec2::new(-10, 0)),
            Vertex::arc(VertexKind::AnticlockwiseSemicircle, IVec2::new(10, 0), IVec2::ZERO),
        ];

        let prims = primitives_from_vertices(&verts);
        let Primitive::Arc { center, clockwise, .. } = prims[0] else {
            panic!("expected an arc");
        };
        assert_eq!(center, DVec2::ZERO);
        assert!(!clockwise);
        assert!((prims[0].signed_sweep() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn ring_from_rounded_outline_has_arc_points() {
        // A 20x20 square whose right edge is bulged out by a semicircle.
        let verts = vec![
            Vertex::point(IVec2::new(0, 0)),
            Vertex::point(IVec2::new(20, 0)),
            Vertex::arc(VertexKind::AnticlockwiseSemicircle, IVec2::new(20, 20), IVec2::ZERO),
            Vertex::point(IVec2::new(0, 20)),
            Vertex::point(IVec2::new(0, 0)),
        ];

        let prims = primitives_from_vertices(&verts);
        let ring = ring_from_primitives(&prims, 0.1);

        assert!(ring.pts.len() > 8);
        // Semicircle bulge of radius 10 adds half a disc right of x=20.
        let expected = 400.0 + std::f64::consts::PI * 50.0;
        assert!((ring.area() - expected).abs() < 5.0);
    }

    #[test]
    fn single_vertex_yields_nothing() {
        assert!(primitives_from_vertices(&[Vertex::point(IVec2::ZERO)]).is_empty());
    }
}
