use glam::DVec2;

/// Tolerance below which three points are considered collinear, in squared
/// internal units of the cross product.
const COLLINEAR_EPS: f64 = 1e-6;

/// Normalize an angle in degrees to `[0, 360)`.
pub fn normalize_deg(mut deg: f64) -> f64 {
    deg %= 360.0;
    if deg < 0.0 {
        deg += 360.0;
    }
    deg
}

/// Rotate `point` about `center` by `angle_deg` (counter-clockwise positive).
pub fn rotate_deg(point: DVec2, center: DVec2, angle_deg: f64) -> DVec2 {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let v = point - center;
    center + DVec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Center of the circle through three points, or `None` when they are
/// collinear (a degenerate arc, rejected by the readers).
pub fn circumcenter(a: DVec2, b: DVec2, c: DVec2) -> Option<DVec2> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));

    if d.abs() < COLLINEAR_EPS * (a.distance(b) + b.distance(c)).max(1.0) {
        return None;
    }

    let ux = (a.length_squared() * (b.y - c.y)
        + b.length_squared() * (c.y - a.y)
        + c.length_squared() * (a.y - b.y))
        / d;
    let uy = (a.length_squared() * (c.x - b.x)
        + b.length_squared() * (a.x - c.x)
        + c.length_squared() * (b.x - a.x))
        / d;

    Some(DVec2::new(ux, uy))
}

/// Counter-clockwise sweep from `from` to `to` about `center`, in degrees in
/// `(0, 360]`.
pub fn arc_sweep_ccw(center: DVec2, from: DVec2, to: DVec2) -> f64 {
    let a0 = (from - center).to_angle().to_degrees();
    let a1 = (to - center).to_angle().to_degrees();
    let mut sweep = a1 - a0;

    while sweep <= 0.0 {
        sweep += 360.0;
    }
    while sweep > 360.0 {
        sweep -= 360.0;
    }

    sweep
}

/// Reconstruct an arc from its three-point form.
///
/// Returns the center and the signed sweep from `start` to `end` passing
/// through `mid`: positive for counter-clockwise, negative for clockwise.
/// `None` when the points are collinear.
pub fn three_point_arc(start: DVec2, mid: DVec2, end: DVec2) -> Option<(DVec2, f64)> {
    let center = circumcenter(start, mid, end)?;
    let sweep_se = arc_sweep_ccw(center, start, end);
    let sweep_sm = arc_sweep_ccw(center, start, mid);

    if sweep_sm < sweep_se {
        Some((center, sweep_se))
    } else {
        Some((center, sweep_se - 360.0))
    }
}

/// Center of the arc from `start` to `end` subtending `sweep_deg` degrees
/// (counter-clockwise when positive). This is the inverse of
/// [`arc_sweep_ccw`] for the same endpoints.
pub fn arc_center_from_sweep(start: DVec2, end: DVec2, sweep_deg: f64) -> DVec2 {
    let chord = end - start;
    let mid = (start + end) * 0.5;
    let half = chord.length() * 0.5;
    let a = sweep_deg.abs().to_radians();

    // tan(pi/2) is well-defined (huge), so a 180 degree sweep lands the
    // center on the chord midpoint as it should.
    let d = half / (a * 0.5).tan();

    let normal = DVec2::new(-chord.y, chord.x).normalize_or_zero();

    if sweep_deg >= 0.0 {
        mid + normal * d
    } else {
        mid - normal * d
    }
}

/// Point halfway along the arc, used to rebuild a mid point after the legacy
/// end-swap fixup.
pub fn arc_midpoint(center: DVec2, start: DVec2, sweep_deg: f64) -> DVec2 {
    rotate_deg(start, center, sweep_deg * 0.5)
}

/// Number of straight segments needed so that a polygonized arc of `radius`
/// deviates at most `max_error` from the true circle.
pub fn arc_segment_count(radius: f64, sweep_deg: f64, max_error: f64) -> usize {
    if radius <= max_error {
        return 1;
    }

    let step = 2.0 * (1.0 - max_error / radius).acos().to_degrees();

    if step <= 0.0 {
        return 1;
    }

    ((sweep_deg.abs() / step).ceil() as usize).max(1)
}

/// Polygonize an arc into points including both endpoints.
pub fn arc_to_points(
    center: DVec2,
    start: DVec2,
    sweep_deg: f64,
    max_error: f64,
) -> Vec<DVec2> {
    let radius = start.distance(center);
    let n = arc_segment_count(radius, sweep_deg, max_error);
    let mut pts = Vec::with_capacity(n + 1);

    for i in 0..=n {
        let t = sweep_deg * (i as f64) / (n as f64);
        pts.push(rotate_deg(start, center, t));
    }

    pts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: DVec2, b: DVec2) -> bool {
        a.distance(b) < 1e-6
    }

    #[test]
    fn circumcenter_of_right_angle() {
        let c = circumcenter(DVec2::new(1.0, 0.0), DVec2::new(0.0, 1.0), DVec2::new(-1.0, 0.0))
            .unwrap();
        assert!(close(c, DVec2::ZERO));
    }

    #[test]
    fn collinear_points_have_no_center() {
        assert!(circumcenter(DVec2::ZERO, DVec2::new(1.0, 1.0), DVec2::new(2.0, 2.0)).is_none());
    }

    #[test]
    fn sweep_quarter_circle() {
        let sweep = arc_sweep_ccw(DVec2::ZERO, DVec2::new(1.0, 0.0), DVec2::new(0.0, 1.0));
        assert!((sweep - 90.0).abs() < 1e-9);
    }

    #[test]
    fn three_point_arc_detects_winding() {
        // Upper half circle traversed left-to-right is clockwise in
        // conventional axes.
        let (c, sweep) = three_point_arc(
            DVec2::new(-1.0, 0.0),
            DVec2::new(0.0, 1.0),
            DVec2::new(1.0, 0.0),
        )
        .unwrap();
        assert!(close(c, DVec2::ZERO));
        assert!((sweep + 180.0).abs() < 1e-6);

        let (_, sweep) = three_point_arc(
            DVec2::new(1.0, 0.0),
            DVec2::new(0.0, 1.0),
            DVec2::new(-1.0, 0.0),
        )
        .unwrap();
        assert!((sweep - 180.0).abs() < 1e-6);
    }

    #[test]
    fn center_from_sweep_inverts_sweep() {
        let start = DVec2::new(10.0, 0.0);
        let end = DVec2::new(0.0, 10.0);

        for sweep in [30.0f64, 90.0, 160.0, 200.0, 300.0] {
            let c = arc_center_from_sweep(start, end, sweep);
            let measured = arc_sweep_ccw(c, start, end);
            assert!(
                (measured - sweep).abs() < 1e-6,
                "sweep {sweep} measured {measured}"
            );
        }
    }

    #[test]
    fn polygonized_arc_stays_within_error() {
        let center = DVec2::ZERO;
        let start = DVec2::new(100.0, 0.0);
        let pts = arc_to_points(center, start, 90.0, 0.5);

        assert!(pts.len() >= 3);
        assert!(close(pts[0], start));
        assert!(close(*pts.last().unwrap(), DVec2::new(0.0, 100.0)));

        // Chord midpoints must stay within the requested error of the arc.
        for pair in pts.windows(2) {
            let mid = (pair[0] + pair[1]) * 0.5;
            assert!(100.0 - mid.length() <= 0.5 + 1e-9);
        }
    }
}
