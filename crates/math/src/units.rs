//! Pitch and curve conversions.

/// Convert a pitch interval in semitones to a frequency ratio.
///
/// `semitones_to_ratio(12.0) == 2.0`, `semitones_to_ratio(-12.0) == 0.5`.
#[inline]
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    libm::exp2f(semitones / 12.0)
}

/// Warp a phase value through a variable-curvature transfer function.
///
/// `curve = 0.5` is the identity. Values above 0.5 bend the ramp toward
/// a fast start and slow finish; values below 0.5 mirror the warp the
/// other way. The endpoints are fixed: `warp_phase(0, c) == 0` and
/// `warp_phase(1, c) == 1` for any curve.
///
/// # Arguments
/// * `t` - Phase in [0, 1]
/// * `curve` - Curvature in [0, 1], 0.5 = linear
#[inline]
pub fn warp_phase(t: f32, curve: f32) -> f32 {
    let curve = curve - 0.5;
    let flip = curve < 0.0;
    let mut t = if flip { 1.0 - t } else { t };
    let a = 128.0 * curve * curve;
    t = (1.0 + a) * t / (1.0 + a * t);
    if flip {
        1.0 - t
    } else {
        t
    }
}
