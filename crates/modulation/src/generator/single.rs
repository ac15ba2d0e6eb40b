//! Single-segment rendering kernels.
//!
//! Each kernel renders one block for a one-segment channel. Which kernel
//! runs is decided at configure time from the segment type, the trigger
//! patching and the bipolar bit; see the dispatch tables in the parent
//! module.

use deneb_math::{one_pole, semitones_to_ratio, warp_phase, BlockInterpolator};
use deneb_timing::{GateFlags, Ratio};

use crate::config::{Multimode, Range};
use crate::turing::advance_register;

use super::shape::{shape_lfo, DIVIDER_RATIOS, DIVIDER_RATIOS_FAST, DIVIDER_RATIOS_SLOW};
use super::{Output, SegmentGenerator, MAX_DELAY, RETRIG_DELAY_SAMPLES};

/// Largest chunk rendered through the tap-LFO scratch ramp buffer.
const TAP_LFO_CHUNK: usize = 12;

impl SegmentGenerator {
    pub(super) fn process_zero(&mut self, _gate_flags: &[GateFlags], out: &mut [Output]) {
        self.value = 0.0;
        self.active_segment = 1;
        for o in out.iter_mut() {
            o.value = 0.0;
            o.phase = 0.5;
            o.segment = 1;
        }
    }

    /// Gated decay envelope: retrigger on RISING, sweep 1 -> 0 with a
    /// warped curve, rest at the floor once complete.
    pub(super) fn process_decay_envelope(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let frequency = self.rate_to_frequency(self.parameters[0].primary);
        for (&flags, o) in gate_flags.iter().zip(out.iter_mut()) {
            if flags.is_rising() && (self.active_segment != 0 || self.segments[0].retrig) {
                self.phase = 0.0;
                self.active_segment = 0;
            }

            self.phase += frequency;
            if self.phase >= 1.0 {
                self.phase = 1.0;
                self.active_segment = 1;
            }
            self.value = 1.0 - warp_phase(self.phase, self.parameters[0].secondary);
            self.lp = self.value;
            o.value = self.lp;
            o.phase = self.phase;
            o.segment = self.active_segment as u8;
        }
    }

    /// Fixed-length pulse started by RISING, with a short blanking tooth
    /// when retriggered while the output is high.
    pub(super) fn process_timed_pulse(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let frequency = self.rate_to_frequency(self.parameters[0].secondary);
        let mut primary =
            BlockInterpolator::new(self.primary, self.parameters[0].primary, out.len());
        for (&flags, o) in gate_flags.iter().zip(out.iter_mut()) {
            if flags.is_rising() && (self.active_segment != 0 || self.segments[0].retrig) {
                self.retrig_delay = if self.active_segment == 0 {
                    RETRIG_DELAY_SAMPLES
                } else {
                    0
                };
                self.phase = 0.0;
                self.active_segment = 0;
            }
            if self.retrig_delay > 0 {
                self.retrig_delay -= 1;
            }
            self.phase += frequency;
            if self.phase >= 1.0 {
                self.phase = 1.0;
                self.active_segment = 1;
            }

            let p = primary.next();
            self.value = if self.active_segment == 0 && self.retrig_delay == 0 {
                p
            } else {
                0.0
            };
            self.lp = self.value;
            o.value = self.lp;
            o.phase = self.phase;
            o.segment = self.active_segment as u8;
        }
        self.primary = primary.finish();
    }

    /// Follow the gate level: primary while high, zero while low.
    pub(super) fn process_gate(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let mut primary =
            BlockInterpolator::new(self.primary, self.parameters[0].primary, out.len());
        for (&flags, o) in gate_flags.iter().zip(out.iter_mut()) {
            self.active_segment = if flags.is_high() { 0 } else { 1 };

            let p = primary.next();
            self.value = if self.active_segment == 0 { p } else { 0.0 };
            self.lp = self.value;
            o.value = self.lp;
            o.phase = 0.5;
            o.segment = self.active_segment as u8;
        }
        self.primary = primary.finish();
    }

    /// Capture the primary on a delayed RISING edge, then smooth.
    ///
    /// The gate is observed through a ~2 ms delay ring so sequencers
    /// whose CV settles after their gate edge are sampled correctly.
    pub(super) fn process_sample_and_hold(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let coefficient = self.portamento_to_coefficient(self.parameters[0].secondary);
        let mut primary =
            BlockInterpolator::new(self.primary, self.parameters[0].primary, out.len());

        for (&flags, o) in gate_flags.iter().zip(out.iter_mut()) {
            let p = primary.next();
            self.gate_delay.write(flags);
            if self.gate_delay.read(self.sample_and_hold_delay).is_rising() {
                self.value = p;
            }
            self.active_segment = if flags.is_high() { 0 } else { 1 };

            one_pole(&mut self.lp, self.value, coefficient);
            o.value = self.lp;
            o.phase = 0.5;
            o.segment = self.active_segment as u8;
        }
        self.primary = primary.finish();
    }

    /// Like sample-and-hold, but tracks while the delayed gate is high.
    pub(super) fn process_track_and_hold(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let coefficient = self.portamento_to_coefficient(self.parameters[0].secondary);
        let mut primary =
            BlockInterpolator::new(self.primary, self.parameters[0].primary, out.len());

        for (&flags, o) in gate_flags.iter().zip(out.iter_mut()) {
            let p = primary.next();
            self.gate_delay.write(flags);
            if self.gate_delay.read(self.sample_and_hold_delay).is_high() {
                self.value = p;
            }
            self.active_segment = if flags.is_high() { 0 } else { 1 };

            one_pole(&mut self.lp, self.value, coefficient);
            o.value = self.lp;
            o.phase = 0.5;
            o.segment = self.active_segment as u8;
        }
        self.primary = primary.finish();
    }

    /// Smooth the primary through a one-pole set by the secondary.
    pub(super) fn process_portamento(&mut self, _gate_flags: &[GateFlags], out: &mut [Output]) {
        let coefficient = self.portamento_to_coefficient(self.parameters[0].secondary);
        let mut primary =
            BlockInterpolator::new(self.primary, self.parameters[0].primary, out.len());

        self.active_segment = 0;
        for o in out.iter_mut() {
            self.value = primary.next();
            one_pole(&mut self.lp, self.value, coefficient);
            o.value = self.lp;
            o.phase = 0.5;
            o.segment = 0;
        }
        self.primary = primary.finish();
    }

    /// Free-running LFO; primary spans +/-48 semitones around ~2 Hz.
    pub(super) fn process_free_running_lfo(
        &mut self,
        _gate_flags: &[GateFlags],
        out: &mut [Output],
    ) {
        let f = (96.0 * (self.parameters[0].primary - 0.5)).clamp(-128.0, 127.0);
        let mut frequency = semitones_to_ratio(f) * 2.0439497 / self.sample_rate;

        self.active_segment = 0;
        match self.segments[0].range {
            Range::Slow => frequency /= 16.0,
            Range::Fast => {
                frequency *= 64.0;
                // A8; aliasing takes over beyond this.
                frequency = frequency.min(7040.0 / self.sample_rate);
            }
            Range::Default => {}
        }

        if self.multimode == Multimode::SlowLfo {
            frequency /= 8.0;
        }

        for o in out.iter_mut() {
            self.phase += frequency;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
            o.phase = self.phase;
        }
        shape_lfo(self.parameters[0].secondary, out, self.segments[0].bipolar);
        self.active_segment = out[out.len() - 1].segment as usize;
    }

    /// Clock-synced LFO: recover a ramp from the gate stream, divided or
    /// multiplied per the primary, then shape it.
    pub(super) fn process_tap_lfo(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let table: &[Ratio] = match self.segments[0].range {
            Range::Default => &DIVIDER_RATIOS,
            Range::Slow => &DIVIDER_RATIOS_SLOW,
            Range::Fast => &DIVIDER_RATIOS_FAST,
        };
        let index = self
            .ratio_index
            .quantize(self.parameters[0].primary * 1.03, table.len());
        let ratio = table[index];

        let mut ramp = [0.0f32; TAP_LFO_CHUNK];
        for (gate_chunk, out_chunk) in gate_flags
            .chunks(TAP_LFO_CHUNK)
            .zip(out.chunks_mut(TAP_LFO_CHUNK))
        {
            let n = out_chunk.len();
            self.ramp_extractor
                .process(ratio, gate_chunk, &mut ramp[..n]);
            for (o, &phase) in out_chunk.iter_mut().zip(ramp[..n].iter()) {
                o.phase = phase;
            }
        }
        shape_lfo(self.parameters[0].secondary, out, self.segments[0].bipolar);
        self.active_segment = out[out.len() - 1].segment as usize;
    }

    /// CV delay. The secondary spans +/-36 semitones around half a
    /// second; delays beyond the line capacity slow the write clock so
    /// the line covers them at reduced bandwidth.
    pub(super) fn process_delay(&mut self, _gate_flags: &[GateFlags], out: &mut [Output]) {
        let max_delay = (MAX_DELAY - 1) as f32;

        let mut delay_time = semitones_to_ratio(2.0 * (self.parameters[0].secondary - 0.5) * 36.0)
            * 0.5
            * self.sample_rate;
        let mut clock_frequency = 1.0;
        let delay_frequency = 1.0 / delay_time;

        if delay_time >= max_delay {
            clock_frequency = max_delay * delay_frequency;
            delay_time = max_delay;
        }
        let mut primary =
            BlockInterpolator::new(self.primary, self.parameters[0].primary, out.len());

        self.active_segment = 0;
        for o in out.iter_mut() {
            self.phase += clock_frequency;
            one_pole(&mut self.lp, primary.next(), clock_frequency);
            if self.phase >= 1.0 {
                self.phase -= 1.0;
                self.delay_line.write(self.lp);
            }

            self.aux += delay_frequency;
            if self.aux >= 1.0 {
                self.aux -= 1.0;
            }
            self.active_segment = if self.aux < 0.5 { 0 } else { 1 };

            one_pole(
                &mut self.value,
                self.delay_line.read_fractional(delay_time - self.phase),
                clock_frequency,
            );
            o.value = self.value;
            o.phase = self.aux;
            o.segment = self.active_segment as u8;
        }
        self.primary = primary.finish();
    }

    /// Stepped random LFO: redraw on every phase wrap, then smooth.
    pub(super) fn process_random(&mut self, _gate_flags: &[GateFlags], out: &mut [Output]) {
        let coefficient = self.portamento_to_coefficient(self.parameters[0].secondary);
        let f = (96.0 * (self.parameters[0].primary - 0.5)).clamp(-128.0, 127.0);
        let frequency = semitones_to_ratio(f) * 2.0439497 / self.sample_rate;

        self.active_segment = 0;
        for o in out.iter_mut() {
            self.phase += frequency;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
                self.value = self.rng.next_float();
                if self.segments[0].bipolar {
                    self.value = 1.25 * (self.value - 0.5);
                }
                self.active_segment = 1;
            }
            one_pole(&mut self.lp, self.value, coefficient);
            o.value = self.lp;
            o.phase = 0.5;
            o.segment = self.active_segment as u8;
        }
    }

    /// Shift-register pattern clocked by RISING edges.
    pub(super) fn process_turing(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let steps = ((15.0 * self.parameters[0].secondary) as i32 + 1).max(1) as u32;
        let mut primary =
            BlockInterpolator::new(self.primary, self.parameters[0].primary, out.len());

        for (&flags, o) in gate_flags.iter().zip(out.iter_mut()) {
            let probability = primary.next();
            if flags.is_rising() {
                let segment = &mut self.segments[0];
                advance_register(
                    steps,
                    probability,
                    &mut segment.shift_register,
                    &mut segment.register_value,
                    segment.bipolar,
                    &mut self.rng,
                );
                self.value = self.segments[0].register_value;
            }
            self.active_segment = if flags.is_high() { 0 } else { 1 };
            o.value = self.segments[0].register_value;
            o.phase = 0.5;
            o.segment = self.active_segment as u8;
        }
        self.primary = primary.finish();
    }

    /// Logistic map iterated on RISING edges; chaotic for primary near 1.
    pub(super) fn process_logistic(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let coefficient = self.portamento_to_coefficient(self.parameters[0].secondary);
        let r = 0.5 * self.parameters[0].primary + 3.5;
        if self.value <= 0.0 {
            self.value = self.rng.next_float();
        }

        for (&flags, o) in gate_flags.iter().zip(out.iter_mut()) {
            if flags.is_rising() {
                self.value *= r * (1.0 - self.value);
            }
            self.active_segment = if flags.is_high() { 0 } else { 1 };

            one_pole(&mut self.lp, self.value, coefficient);
            o.value = if self.segments[0].bipolar {
                1.25 * (self.lp - 0.5)
            } else {
                self.lp
            };
            o.phase = 0.5;
            o.segment = self.active_segment as u8;
        }
    }
}
