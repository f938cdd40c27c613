use super::Point2;

/// Angle at vertex `b` between the rays `b→a` and `b→c`, in degrees.
///
/// The result is the unsigned interior angle in `[0, 180]`, so swapping `a`
/// and `c` (a mirrored limb) gives the same reading. NaN coordinates produce
/// NaN.
pub fn joint_angle(a: Point2, b: Point2, c: Point2) -> f64 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let angle = radians.to_degrees().abs();

    if angle > 180.0 { 360.0 - angle } else { angle }
}
