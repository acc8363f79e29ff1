use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A closed ring of points (the closing edge back to the first point is
/// implicit). Rings are simple polygons; winding is not prescribed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    pub pts: Vec<DVec2>,
}

/// One outline with zero or more hole rings fully contained in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub outline: Ring,
    pub holes: Vec<Ring>,
}

/// A set of disjoint polygons. This is the shape the zone logic works with:
/// zone outlines, cached fills, and keepout regions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolySet {
    pub polygons: Vec<Polygon>,
}

impl Ring {
    pub fn new(pts: Vec<DVec2>) -> Self {
        Ring { pts }
    }

    pub fn is_empty(&self) -> bool {
        self.pts.len() < 3
    }

    /// Shoelace area; positive for counter-clockwise winding.
    pub fn signed_area(&self) -> f64 {
        let n = self.pts.len();
        if n < 3 {
            return 0.0;
        }

        let mut sum = 0.0;
        for i in 0..n {
            let p = self.pts[i];
            let q = self.pts[(i + 1) % n];
            sum += p.x * q.y - q.x * p.y;
        }
        sum * 0.5
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    pub fn reversed(&self) -> Ring {
        let mut pts = self.pts.clone();
        pts.reverse();
        Ring { pts }
    }

    /// Even-odd point containment. Points on an edge count as inside, which
    /// is the convention the slot-outside-pad check wants (a drill center
    /// exactly on the outline is not "outside").
    pub fn contains(&self, p: DVec2) -> bool {
        let n = self.pts.len();
        if n < 3 {
            return false;
        }

        let mut inside = false;
        let mut j = n - 1;

        for i in 0..n {
            let a = self.pts[i];
            let b = self.pts[j];

            // On-edge test.
            let ab = b - a;
            let ap = p - a;
            let cross = ab.x * ap.y - ab.y * ap.x;
            if cross.abs() < 1e-9 * ab.length().max(1.0)
                && ap.dot(ab) >= -1e-9
                && ap.length_squared() <= ab.length_squared() + 1e-9
            {
                return true;
            }

            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x {
                    inside = !inside;
                }
            }

            j = i;
        }

        inside
    }

    /// Offset the ring outward by `delta` (inward when negative) using miter
    /// joins. An approximation of a true polygon offset, adequate for the
    /// half-stroke-width adjustments the importer performs.
    pub fn offset(&self, delta: f64) -> Ring {
        let n = self.pts.len();
        if n < 3 || delta == 0.0 {
            return self.clone();
        }

        // Work on a counter-clockwise copy so "outward" is well-defined,
        // then restore the original winding.
        let ccw = self.is_ccw();
        let ring = if ccw { self.clone() } else { self.reversed() };

        let outward = |a: DVec2, b: DVec2| -> DVec2 {
            let d = (b - a).normalize_or_zero();
            DVec2::new(d.y, -d.x)
        };

        let mut out = Vec::with_capacity(n);

        for i in 0..n {
            let prev = ring.pts[(i + n - 1) % n];
            let cur = ring.pts[i];
            let next = ring.pts[(i + 1) % n];

            let n0 = outward(prev, cur);
            let n1 = outward(cur, next);

            // Intersect the two offset edges; fall back to the averaged
            // normal when nearly parallel or when the miter spike would be
            // excessive.
            let p0 = prev + n0 * delta;
            let v0 = cur - prev;
            let p1 = cur + n1 * delta;
            let v1 = next - cur;

            let denom = v0.x * v1.y - v0.y * v1.x;
            let miter = if denom.abs() > 1e-12 {
                let t = ((p1.x - p0.x) * v1.y - (p1.y - p0.y) * v1.x) / denom;
                p0 + v0 * t
            } else {
                cur + n0 * delta
            };

            let point = if miter.distance(cur) > 4.0 * delta.abs() {
                cur + (n0 + n1).normalize_or_zero() * delta
            } else {
                miter
            };

            out.push(point);
        }

        let result = Ring { pts: out };
        if ccw { result } else { result.reversed() }
    }

    /// Ear-clipping triangulation. Expects a simple ring; falls back to a
    /// fan if no ear can be found (only possible on degenerate input).
    pub fn triangulate(&self) -> Vec<[DVec2; 3]> {
        let mut pts: Vec<DVec2> =
            if self.is_ccw() { self.pts.clone() } else { self.reversed().pts };

        let mut tris = Vec::new();

        let cross = |o: DVec2, a: DVec2, b: DVec2| (a - o).perp_dot(b - o);

        let point_in_tri = |p: DVec2, a: DVec2, b: DVec2, c: DVec2| {
            let d1 = cross(a, b, p);
            let d2 = cross(b, c, p);
            let d3 = cross(c, a, p);
            d1 >= -1e-12 && d2 >= -1e-12 && d3 >= -1e-12
        };

        let mut guard = pts.len() * pts.len() + 16;

        while pts.len() > 3 && guard > 0 {
            guard -= 1;
            let n = pts.len();
            let mut clipped = false;

            for i in 0..n {
                let a = pts[(i + n - 1) % n];
                let b = pts[i];
                let c = pts[(i + 1) % n];

                if cross(a, b, c) <= 1e-12 {
                    continue; // reflex or degenerate corner
                }

                let mut ear = true;
                for (j, &p) in pts.iter().enumerate() {
                    if j == (i + n - 1) % n || j == i || j == (i + 1) % n {
                        continue;
                    }
                    if point_in_tri(p, a, b, c) {
                        ear = false;
                        break;
                    }
                }

                if ear {
                    tris.push([a, b, c]);
                    pts.remove(i);
                    clipped = true;
                    break;
                }
            }

            if !clipped {
                break;
            }
        }

        if pts.len() == 3 {
            tris.push([pts[0], pts[1], pts[2]]);
        } else if pts.len() > 3 {
            // Degenerate remainder: fan it so we still return full coverage.
            log::debug!("ear clipping stalled with {} points left, fanning", pts.len());
            for i in 1..pts.len() - 1 {
                tris.push([pts[0], pts[i], pts[i + 1]]);
            }
        }

        tris
    }
}

impl Polygon {
    pub fn from_outline(outline: Ring) -> Self {
        Polygon { outline, holes: Vec::new() }
    }

    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(Ring::area).sum();
        (self.outline.area() - holes).max(0.0)
    }

    pub fn contains(&self, p: DVec2) -> bool {
        self.outline.contains(p) && !self.holes.iter().any(|h| h.contains(p))
    }
}

impl PolySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_polygon(polygon: Polygon) -> Self {
        PolySet { polygons: vec![polygon] }
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.iter().all(|p| p.outline.is_empty())
    }

    pub fn area(&self) -> f64 {
        self.polygons.iter().map(Polygon::area).sum()
    }

    pub fn contains(&self, p: DVec2) -> bool {
        self.polygons.iter().any(|poly| poly.contains(p))
    }

    /// Merge another set into this one. A best-effort union: rings are
    /// accumulated rather than re-fractured, which is sufficient for fills
    /// that are later consumed by area queries.
    pub fn append(&mut self, other: &PolySet) {
        self.polygons.extend(other.polygons.iter().cloned());
    }

    /// Offset all polygons: outlines move outward by `delta`, holes inward.
    pub fn inflate(&self, delta: f64) -> PolySet {
        PolySet {
            polygons: self
                .polygons
                .iter()
                .map(|poly| Polygon {
                    outline: poly.outline.offset(delta),
                    holes: poly.holes.iter().map(|h| h.offset(-delta)).collect(),
                })
                .collect(),
        }
    }

    /// Area of the intersection with another set.
    ///
    /// Computed by inclusion-exclusion over the triangulated rings, so it is
    /// exact for the polygonized geometry (holes subtract, as long as holes
    /// are nested in their outlines and polygons are disjoint).
    pub fn intersection_area(&self, other: &PolySet) -> f64 {
        let mut total = 0.0;

        for (sa, ra) in self.signed_rings() {
            for (sb, rb) in other.signed_rings() {
                let a = ring_intersection_area(ra, rb);
                total += sa * sb * a;
            }
        }

        total.max(0.0)
    }

    fn signed_rings(&self) -> Vec<(f64, &Ring)> {
        let mut rings = Vec::new();
        for poly in &self.polygons {
            if !poly.outline.is_empty() {
                rings.push((1.0, &poly.outline));
            }
            for hole in &poly.holes {
                if !hole.is_empty() {
                    rings.push((-1.0, hole));
                }
            }
        }
        rings
    }
}

/// Intersection area of two simple rings via pairwise triangle clipping.
fn ring_intersection_area(a: &Ring, b: &Ring) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let tris_a = a.triangulate();
    let tris_b = b.triangulate();

    let mut total = 0.0;
    for ta in &tris_a {
        for tb in &tris_b {
            total += triangle_clip_area(ta, tb);
        }
    }
    total
}

/// Area of the intersection of two triangles (Sutherland-Hodgman; the clip
/// polygon is convex so the result is exact).
fn triangle_clip_area(subject: &[DVec2; 3], clip: &[DVec2; 3]) -> f64 {
    // Ensure the clip triangle is counter-clockwise so "inside" is left of
    // each edge.
    let c = if (clip[1] - clip[0]).perp_dot(clip[2] - clip[0]) >= 0.0 {
        [clip[0], clip[1], clip[2]]
    } else {
        [clip[0], clip[2], clip[1]]
    };

    let mut poly: Vec<DVec2> = subject.to_vec();

    for i in 0..3 {
        let e0 = c[i];
        let e1 = c[(i + 1) % 3];
        let inside = |p: DVec2| (e1 - e0).perp_dot(p - e0) >= -1e-12;

        let input = poly;
        poly = Vec::with_capacity(input.len() + 3);

        for j in 0..input.len() {
            let cur = input[j];
            let prev = input[(j + input.len() - 1) % input.len()];

            let cur_in = inside(cur);
            let prev_in = inside(prev);

            if cur_in != prev_in {
                // Edge crossing point.
                let d = cur - prev;
                let denom = (e1 - e0).perp_dot(d);
                if denom.abs() > 1e-15 {
                    let t = (e1 - e0).perp_dot(e0 - prev) / denom;
                    poly.push(prev + d * t);
                }
            }

            if cur_in {
                poly.push(cur);
            }
        }

        if poly.is_empty() {
            return 0.0;
        }
    }

    Ring::new(poly).area()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Ring {
        Ring::new(vec![
            DVec2::new(x0, y0),
            DVec2::new(x0 + size, y0),
            DVec2::new(x0 + size, y0 + size),
            DVec2::new(x0, y0 + size),
        ])
    }

    #[test]
    fn ring_area_and_winding() {
        let sq = square(0.0, 0.0, 10.0);
        assert!((sq.signed_area() - 100.0).abs() < 1e-9);
        assert!(sq.is_ccw());
        assert!((sq.reversed().signed_area() + 100.0).abs() < 1e-9);
    }

    #[test]
    fn containment() {
        let sq = square(0.0, 0.0, 10.0);
        assert!(sq.contains(DVec2::new(5.0, 5.0)));
        assert!(sq.contains(DVec2::new(0.0, 5.0))); // on edge counts
        assert!(!sq.contains(DVec2::new(11.0, 5.0)));
    }

    #[test]
    fn polygon_with_hole_area() {
        let poly = Polygon { outline: square(0.0, 0.0, 10.0), holes: vec![square(2.0, 2.0, 4.0)] };
        assert!((poly.area() - 84.0).abs() < 1e-9);
        assert!(!poly.contains(DVec2::new(3.0, 3.0)));
        assert!(poly.contains(DVec2::new(1.0, 1.0)));
    }

    #[test]
    fn triangulation_covers_area() {
        // L-shaped concave ring.
        let l = Ring::new(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(10.0, 0.0),
            DVec2::new(10.0, 4.0),
            DVec2::new(4.0, 4.0),
            DVec2::new(4.0, 10.0),
            DVec2::new(0.0, 10.0),
        ]);

        let tris = l.triangulate();
        let tri_area: f64 = tris
            .iter()
            .map(|t| ((t[1] - t[0]).perp_dot(t[2] - t[0]) * 0.5).abs())
            .sum();
        assert!((tri_area - l.area()).abs() < 1e-6);
    }

    #[test]
    fn intersection_area_of_overlapping_squares() {
        let a = PolySet::from_polygon(Polygon::from_outline(square(0.0, 0.0, 10.0)));
        let b = PolySet::from_polygon(Polygon::from_outline(square(5.0, 5.0, 10.0)));

        assert!((a.intersection_area(&b) - 25.0).abs() < 1e-6);
        assert!((b.intersection_area(&a) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn intersection_area_respects_holes() {
        let holed = PolySet::from_polygon(Polygon {
            outline: square(0.0, 0.0, 10.0),
            holes: vec![square(2.0, 2.0, 4.0)],
        });
        let probe = PolySet::from_polygon(Polygon::from_outline(square(2.0, 2.0, 4.0)));

        // The probe sits exactly in the hole.
        assert!(holed.intersection_area(&probe).abs() < 1e-6);
    }

    #[test]
    fn inflate_grows_area() {
        let a = PolySet::from_polygon(Polygon::from_outline(square(0.0, 0.0, 10.0)));
        let grown = a.inflate(1.0);
        assert!((grown.area() - 144.0).abs() < 1e-6);
        let shrunk = a.inflate(-1.0);
        assert!((shrunk.area() - 64.0).abs() < 1e-6);
    }
}
