//! LFO waveform synthesis from a phase ramp.

use deneb_math::{crossfade, interpolate_wrap, SINE, SINE_TABLE_SIZE};
use deneb_timing::Ratio;

use super::Output;

/// Clock divisions selectable by the primary parameter in the default
/// range. Ratios sit epsilon under their exact value so the ramp modulo
/// never emits a spurious zero at the top of a cycle.
pub(crate) const DIVIDER_RATIOS: [Ratio; 7] = [
    Ratio { ratio: 0.249999, q: 4 },
    Ratio { ratio: 0.333333, q: 3 },
    Ratio { ratio: 0.499999, q: 2 },
    Ratio { ratio: 0.999999, q: 1 },
    Ratio { ratio: 1.999999, q: 1 },
    Ratio { ratio: 2.999999, q: 1 },
    Ratio { ratio: 3.999999, q: 1 },
];

pub(crate) const DIVIDER_RATIOS_SLOW: [Ratio; 8] = [
    Ratio { ratio: 0.124999, q: 8 },
    Ratio { ratio: 0.142856, q: 7 },
    Ratio { ratio: 0.166666, q: 6 },
    Ratio { ratio: 0.199999, q: 5 },
    Ratio { ratio: 0.249999, q: 4 },
    Ratio { ratio: 0.333333, q: 3 },
    Ratio { ratio: 0.499999, q: 2 },
    Ratio { ratio: 0.999999, q: 1 },
];

pub(crate) const DIVIDER_RATIOS_FAST: [Ratio; 8] = [
    Ratio { ratio: 0.999999, q: 1 },
    Ratio { ratio: 1.999999, q: 1 },
    Ratio { ratio: 2.999999, q: 1 },
    Ratio { ratio: 3.999999, q: 1 },
    Ratio { ratio: 4.999999, q: 1 },
    Ratio { ratio: 5.999999, q: 1 },
    Ratio { ratio: 6.999999, q: 1 },
    Ratio { ratio: 7.999999, q: 1 },
];

/// Sticky quantizer for table selection from a continuous parameter.
///
/// A freshly observed position wins only when it lands clearly inside a
/// neighboring cell (more than 0.75 of a step away from the held index),
/// so a noisy control cannot flap between adjacent entries.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HysteresisQuantizer {
    index: i32,
}

impl HysteresisQuantizer {
    pub const fn new() -> Self {
        Self { index: -1 }
    }

    pub fn reset(&mut self) {
        self.index = -1;
    }

    pub fn quantize(&mut self, value: f32, steps: usize) -> usize {
        debug_assert!(steps >= 1);
        let scaled = value.clamp(0.0, 1.0) * (steps - 1) as f32;
        if self.index < 0 || (scaled - self.index as f32).abs() > 0.75 {
            self.index = (scaled + 0.5) as i32;
        }
        self.index.clamp(0, steps as i32 - 1) as usize
    }
}

/// Rewrite a block of phase ramps into shaped LFO samples.
///
/// `shape` sweeps the waveform continuously: ramp, then triangle, then
/// sine around the center, then widening plateaus up to a square. The
/// triangle skew, plateau width and sine blend all derive from one
/// warped control value; phase is pre-shifted by a quarter of the
/// plateau so the waveform stays centered as it squares off.
///
/// `segment` is set to 0 for the first half of the (shifted) cycle and
/// 1 for the second, giving downstream consumers a half-cycle clock.
pub(crate) fn shape_lfo(shape: f32, in_out: &mut [Output], bipolar: bool) {
    let shape = shape - 0.5;
    let shape = 2.0 + 9.999999 * shape / (1.0 + 3.0 * libm::fabsf(shape));

    let slope = (shape * 0.5).min(0.5);
    let plateau_width = (shape - 3.0).max(0.0);
    let sine_amount = (if shape < 2.0 { shape - 1.0 } else { 3.0 - shape }).max(0.0);

    let slope_up = 1.0 / slope;
    let slope_down = 1.0 / (1.0 - slope);
    let plateau = 0.5 * (1.0 - plateau_width);
    let normalization = 1.0 / plateau;
    let phase_shift = plateau_width * 0.25;

    let amplitude = if bipolar { 0.625 } else { 0.5 };
    let offset = if bipolar { 0.0 } else { 0.5 };

    for out in in_out.iter_mut() {
        let mut phase = out.phase + phase_shift;
        if phase > 1.0 {
            phase -= 1.0;
        }
        let mut triangle = if phase < slope {
            slope_up * phase
        } else {
            1.0 - (phase - slope) * slope_down
        };
        triangle -= 0.5;
        triangle = triangle.clamp(-plateau, plateau) * normalization;
        let sine = interpolate_wrap(&SINE, phase + 0.75, SINE_TABLE_SIZE as f32);
        out.value = amplitude * crossfade(triangle, sine, sine_amount) + offset;
        out.segment = if phase < 0.5 { 0 } else { 1 };
    }
}
