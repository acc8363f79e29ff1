use glam::IVec2;
use serde::{Deserialize, Serialize};

use ecad_geom::arc::{
    arc_center_from_sweep, arc_midpoint, circumcenter, three_point_arc,
};

use crate::stroke::{FillParams, StrokeParams};

/// Geometry of a drawable shape. Arcs are always held in three-point form;
/// the legacy center/angles form is normalized at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeKind {
    Arc { start: IVec2, mid: IVec2, end: IVec2 },
    Bezier { start: IVec2, c1: IVec2, c2: IVec2, end: IVec2 },
    Circle { center: IVec2, radius: i32 },
    Polyline { pts: Vec<IVec2> },
    Rectangle { start: IVec2, end: IVec2, corner_radius: f64 },
}

/// A graphical shape with the header shared by every draw item: stroke,
/// fill, unit/body-style selectors and the private flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub kind: ShapeKind,
    pub stroke: StrokeParams,
    pub fill: FillParams,
    pub unit: i32,
    pub body_style: i32,
    pub private: bool,
}

impl Shape {
    pub fn new(kind: ShapeKind) -> Self {
        Shape {
            kind,
            stroke: StrokeParams::schematic_default(),
            fill: FillParams::default(),
            unit: 1,
            body_style: 1,
            private: false,
        }
    }

    /// The swept angle of an arc shape in degrees (0, 360), or `None` for
    /// other kinds or a degenerate arc.
    pub fn arc_angle(&self) -> Option<f64> {
        let ShapeKind::Arc { start, mid, end } = self.kind else {
            return None;
        };

        let (_, sweep) =
            three_point_arc(start.as_dvec2(), mid.as_dvec2(), end.as_dvec2())?;
        Some(sweep.abs())
    }

    /// Legacy arc sanitation for files up to 20230121.
    ///
    /// Old libraries could only represent arcs of at most 180 degrees; buggy
    /// conversions produced three-point arcs beyond that. Arcs over 180
    /// degrees are replaced by their complement (ends swapped); arcs of
    /// exactly 180 degrees have their center nudged by recomputing at 179.5
    /// degrees so that downstream hit-testing and plotting never see the
    /// ambiguous case.
    ///
    /// Returns `true` if the shape was modified.
    pub fn fixup_legacy_arc(&mut self) -> bool {
        let ShapeKind::Arc { start, mid, end } = self.kind else {
            return false;
        };

        let (s, m, e) = (start.as_dvec2(), mid.as_dvec2(), end.as_dvec2());
        let Some((_, sweep)) = three_point_arc(s, m, e) else {
            return false;
        };

        let angle = sweep.abs();

        if angle > 180.0 {
            // Complement: swap the ends so the arc covers the other side of
            // the circle, continuing in the same rotational direction.
            let new_sweep = sweep.signum() * (360.0 - angle);
            let center = arc_center_from_sweep(e, s, new_sweep);
            let new_mid = arc_midpoint(center, e, new_sweep);

            self.kind = ShapeKind::Arc {
                start: end,
                mid: IVec2::new(new_mid.x.round() as i32, new_mid.y.round() as i32),
                end: start,
            };
            true
        } else if (angle - 180.0).abs() < 1e-6 {
            let nudged = 179.5f64.copysign(sweep);
            let center = arc_center_from_sweep(s, e, nudged);
            let new_mid = arc_midpoint(center, s, nudged);

            self.kind = ShapeKind::Arc {
                start,
                mid: IVec2::new(new_mid.x.round() as i32, new_mid.y.round() as i32),
                end,
            };
            true
        } else {
            false
        }
    }

    /// Whether the arc's three points fail to define a circle.
    pub fn is_degenerate_arc(&self) -> bool {
        match self.kind {
            ShapeKind::Arc { start, mid, end } => {
                circumcenter(start.as_dvec2(), mid.as_dvec2(), end.as_dvec2()).is_none()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arc(start: (i32, i32), mid: (i32, i32), end: (i32, i32)) -> Shape {
        Shape::new(ShapeKind::Arc {
            start: IVec2::new(start.0, start.1),
            mid: IVec2::new(mid.0, mid.1),
            end: IVec2::new(end.0, end.1),
        })
    }

    #[test]
    fn small_arcs_are_left_alone() {
        let mut a = arc((100, 0), (71, 71), (0, 100));
        let angle = a.arc_angle().unwrap();
        assert!(angle < 180.0);
        assert!(!a.fixup_legacy_arc());
    }

    #[test]
    fn oversized_arc_is_complemented() {
        // Three points spanning well over 180 degrees of a circle around
        // the origin.
        let mut a = arc((1000, 0), (-1000, 10), (0, -1000));
        let before = a.arc_angle().unwrap();
        assert!(before > 180.0);

        let modified = a.fixup_legacy_arc();
        assert!(modified);

        let after = a.arc_angle().unwrap();
        assert!(after <= 180.0 + 1e-6, "after = {after}");
        assert!((after - (360.0 - before)).abs() < 1.0);

        // Ends swapped.
        let ShapeKind::Arc { start, end, .. } = a.kind else { panic!() };
        assert_eq!(start, IVec2::new(0, -1000));
        assert_eq!(end, IVec2::new(1000, 0));
    }

    #[test]
    fn half_circle_arc_is_nudged() {
        let mut a = arc((1000, 0), (0, 1000), (-1000, 0));
        assert!((a.arc_angle().unwrap() - 180.0).abs() < 0.01);

        assert!(a.fixup_legacy_arc());
        let after = a.arc_angle().unwrap();
        assert!(after < 180.0);
        assert!(after > 179.0);
    }

    #[test]
    fn collinear_arc_is_degenerate() {
        let a = arc((0, 0), (50, 50), (100, 100));
        assert!(a.is_degenerate_arc());
    }
}
