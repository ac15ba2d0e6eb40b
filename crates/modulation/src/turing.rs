//! Shift-register random pattern update rule.

use crate::rng::Rng;

/// Advance a 16-bit shift register one step.
///
/// The register rotates right by one; the bit recycled into the top is
/// the bit `steps - 1` positions below the top — the bit about to leave
/// the `steps`-wide pattern window — XORed with a coin flip taken with
/// probability `probability`. The scaled register value is refreshed in
/// `register_value`.
///
/// The probability window is clamped open at the extremes so the knob
/// can fully lock a pattern: below 0.001 the register rotates unchanged,
/// above 0.999 the recycled bit always flips.
///
/// # Arguments
/// * `steps` - Pattern window length in [1, 16]
/// * `probability` - Mutation probability, nominally in [0, 1]
/// * `shift_register` - Register state, updated in place
/// * `register_value` - Scaled register output, updated in place
/// * `bipolar` - Rescale the output to [-0.625, 0.625]
/// * `rng` - Coin-flip source
pub(crate) fn advance_register(
    steps: u32,
    probability: f32,
    shift_register: &mut u16,
    register_value: &mut f32,
    bipolar: bool,
    rng: &mut Rng,
) {
    let steps = steps.clamp(1, 16);
    let sr = *shift_register;
    let recycled_bit = (sr << (steps - 1)) & 0x8000;
    let p = if probability < 0.001 {
        0.0
    } else if probability > 0.999 {
        1.1
    } else {
        probability
    };
    let flip = ((rng.next_float() < p) as u16) << 15;
    let mutated = recycled_bit ^ flip;
    let sr = (sr >> 1) | mutated;
    *shift_register = sr;
    let mut value = sr as f32 / 65535.0;
    if bipolar {
        value = 1.25 * (value - 0.5);
    }
    *register_value = value;
}
