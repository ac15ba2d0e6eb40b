//! Clock-to-ramp recovery.
//!
//! Recovers a continuous phase ramp from a pulse train by guessing when
//! the next edge will occur. Three prediction strategies run
//! concurrently:
//!
//! - moving average of the previous periods,
//! - replay of a periodic rhythmic pattern (period seen N pulses ago),
//! - constant pulse width: deduce the period from the on time and the
//!   running pulse-width estimate, mid-pulse.
//!
//! Every strategy is scored continuously and the best performer drives
//! the ramp. Pulse trains faster than roughly SR/100 switch to a
//! direct frequency-tracking regime with a glide instead of per-pulse
//! prediction.

use deneb_math::{one_pole, slope};

/// Pulses retained for pulse-width and pattern analysis.
pub const HISTORY_SIZE: usize = 8;

/// Longest rhythmic pattern (in pulses) the predictor can lock onto.
pub const MAX_PATTERN_PERIOD: usize = 8;

/// Relative tolerance for two pulse widths to count as "the same".
const PULSE_WIDTH_TOLERANCE: f32 = 0.05;

use crate::gate::GateFlags;

/// Clock division/multiplication applied to the recovered ramp.
///
/// The internal phase sweeps from 0 to `q` over `q` input pulses; the
/// emitted ramp is `phase * ratio mod 1`. A ratio of (0.25, 4) divides
/// the clock by four, (3.0, 1) multiplies it by three.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratio {
    pub ratio: f32,
    pub q: u32,
}

#[derive(Debug, Clone, Copy)]
struct Pulse {
    on_duration: u32,
    total_duration: u32,
    pulse_width: f32,
}

/// Pulse-train to phase-ramp converter.
///
/// Feed it the per-sample [`GateFlags`] stream and it produces an
/// equally long ramp in [0, 1), phase-locked to the incoming clock and
/// scaled by a [`Ratio`]. See the module documentation for the
/// prediction model.
#[derive(Debug, Clone)]
pub struct RampExtractor {
    sample_rate: f32,
    max_frequency: f32,
    min_period: f32,
    min_period_hysteresis: f32,
    audio_rate_period: f32,
    audio_rate_period_hysteresis: f32,

    audio_rate: bool,
    train_phase: f32,
    max_train_phase: f32,
    target_frequency: f32,
    frequency: f32,
    lp_coefficient: f32,
    f_ratio: f32,
    reset_counter: u32,
    reset_interval: f32,

    history: [Pulse; HISTORY_SIZE],
    current_pulse: usize,
    average_pulse_width: f32,
    apw_match_count: usize,
    predicted_period: [f32; MAX_PATTERN_PERIOD + 1],
    prediction_error: [f32; MAX_PATTERN_PERIOD + 1],
}

#[inline]
fn is_within_tolerance(x: f32, y: f32, error: f32) -> bool {
    x >= y * (1.0 - error) && x <= y * (1.0 + error)
}

impl RampExtractor {
    /// Create an extractor.
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `max_frequency` - Ramp frequency ceiling, in cycles per sample
    pub fn new(sample_rate: f32, max_frequency: f32) -> Self {
        debug_assert!(sample_rate > 0.0);
        debug_assert!(max_frequency > 0.0);
        let audio_rate_period = sample_rate / 100.0;
        let min_period = 1.0 / max_frequency;
        let mut extractor = Self {
            sample_rate,
            max_frequency,
            min_period,
            min_period_hysteresis: min_period,
            audio_rate_period,
            audio_rate_period_hysteresis: audio_rate_period,
            audio_rate: false,
            train_phase: 0.0,
            max_train_phase: 1.0,
            target_frequency: 0.0,
            frequency: 0.0,
            lp_coefficient: 0.5,
            f_ratio: 1.0,
            reset_counter: 1,
            reset_interval: 0.0,
            history: [Pulse {
                on_duration: 0,
                total_duration: 0,
                pulse_width: 0.5,
            }; HISTORY_SIZE],
            current_pulse: 0,
            average_pulse_width: 0.0,
            apw_match_count: 0,
            predicted_period: [0.0; MAX_PATTERN_PERIOD + 1],
            prediction_error: [0.0; MAX_PATTERN_PERIOD + 1],
        };
        extractor.reset();
        extractor
    }

    /// Forget the incoming clock entirely.
    pub fn reset(&mut self) {
        self.audio_rate = false;
        self.train_phase = 0.0;
        self.max_train_phase = 1.0;
        self.target_frequency = 0.0;
        self.frequency = 0.0;
        self.lp_coefficient = 0.5;
        self.f_ratio = 1.0;
        self.reset_counter = 1;
        self.reset_interval = 5.0 * self.sample_rate;

        let seed = Pulse {
            on_duration: (self.sample_rate * 0.25) as u32,
            total_duration: (self.sample_rate * 0.5) as u32,
            pulse_width: 0.5,
        };
        self.history = [seed; HISTORY_SIZE];
        self.current_pulse = 0;
        self.history[0].on_duration = 0;
        self.history[0].total_duration = 0;

        self.average_pulse_width = 0.0;
        self.apw_match_count = 0;
        self.predicted_period = [self.sample_rate * 0.5; MAX_PATTERN_PERIOD + 1];
        self.prediction_error = [50.0; MAX_PATTERN_PERIOD + 1];
        self.prediction_error[0] = 0.0;
    }

    fn update_average_pulse_width(&mut self, tolerance: f32) {
        let current = self.history[self.current_pulse].pulse_width;
        if is_within_tolerance(self.average_pulse_width, current, tolerance) {
            self.apw_match_count = HISTORY_SIZE.min(self.apw_match_count + 1);
            let n = self.apw_match_count as f32;
            self.average_pulse_width = ((n - 1.0) * self.average_pulse_width + current) / n;
        } else {
            self.apw_match_count = 1;
            self.average_pulse_width = current;
        }
    }

    /// Score every prediction strategy against the pulse that just ended
    /// and return the best one's forecast for the next period.
    fn predict_next_period(&mut self) -> f32 {
        let last_period = self.history[self.current_pulse].total_duration as f32;

        let mut best = 0;
        for i in 0..=MAX_PATTERN_PERIOD {
            let error = self.predicted_period[i] - last_period;
            let error_sq = error * error;
            // React fast to a worsening predictor, decay slowly for a
            // good one.
            slope(&mut self.prediction_error[i], error_sq, 0.7, 0.2);

            if i == 0 {
                one_pole(&mut self.predicted_period[0], last_period, 0.5);
            } else {
                let t = self.current_pulse + 1 + HISTORY_SIZE - i;
                self.predicted_period[i] =
                    self.history[t % HISTORY_SIZE].total_duration as f32;
            }

            if self.prediction_error[i] < self.prediction_error[best] {
                best = i;
            }
        }
        self.predicted_period[best]
    }

    /// Render the recovered ramp for one block.
    ///
    /// `gate_flags` and `ramp` must have equal length.
    pub fn process(&mut self, ratio: Ratio, gate_flags: &[GateFlags], ramp: &mut [f32]) {
        debug_assert_eq!(gate_flags.len(), ramp.len());
        debug_assert!(ratio.q >= 1);
        let size = ramp.len();
        if size == 0 {
            return;
        }

        let mut train_phase = self.train_phase;
        let mut max_train_phase = self.max_train_phase;
        let ar_threshold =
            self.audio_rate_period_hysteresis * if ratio.ratio > 1.0 { ratio.ratio } else { 1.0 };

        let mut i = 0;
        let mut flags = gate_flags[0];
        while i < size {
            // The previous pulse ends on a rising edge.
            if flags.is_rising() {
                let ended = self.history[self.current_pulse];
                let record_pulse = (ended.total_duration as f32) < self.reset_interval;

                if !record_pulse {
                    // Sync was lost: treat this edge as a fresh clock.
                    train_phase = 0.0;
                    self.reset_counter = ratio.q;
                    self.f_ratio = ratio.ratio;
                    max_train_phase = ratio.q as f32;
                    let predicted = self.predict_next_period();
                    self.frequency = 1.0 / predicted;
                    self.target_frequency = self.frequency;
                    self.reset_interval = 4.0 * ended.total_duration as f32;
                } else {
                    let period = ended.total_duration as f32;
                    if period <= ar_threshold && period > 0.0 {
                        self.audio_rate = true;
                        self.audio_rate_period_hysteresis = self.audio_rate_period * 1.1;

                        self.average_pulse_width = 0.0;
                        self.apw_match_count = 0;

                        let mut no_glide = self.f_ratio != ratio.ratio;
                        self.f_ratio = ratio.ratio;

                        let pulse_frequency = 1.0 / period;
                        self.target_frequency =
                            (self.f_ratio * pulse_frequency).min(self.max_frequency);

                        let up_tolerance = (1.02 + 2.0 * pulse_frequency) * self.frequency;
                        let down_tolerance = (0.98 - 2.0 * pulse_frequency) * self.frequency;
                        no_glide |= self.target_frequency > up_tolerance
                            || self.target_frequency < down_tolerance;
                        self.lp_coefficient = if no_glide { 1.0 } else { period * 1e-5 };
                    } else {
                        self.audio_rate = false;
                        self.audio_rate_period_hysteresis = self.audio_rate_period;
                        if period <= self.min_period_hysteresis {
                            // Too fast to predict; track the period directly.
                            self.min_period_hysteresis = self.min_period * 1.05;
                            self.frequency = 1.0 / period.max(1.0 / self.sample_rate);
                            self.average_pulse_width = 0.0;
                            self.apw_match_count = 0;
                        } else {
                            self.min_period_hysteresis = self.min_period;
                            let p = &mut self.history[self.current_pulse];
                            p.pulse_width = p.on_duration as f32 / p.total_duration as f32;
                            let trigger_like = p.on_duration < 32;
                            self.update_average_pulse_width(PULSE_WIDTH_TOLERANCE);
                            if trigger_like {
                                // Narrow pulses carry no usable width.
                                self.average_pulse_width = 0.0;
                                self.apw_match_count = 0;
                            }
                            self.frequency = 1.0 / self.predict_next_period();
                        }

                        // Re-arm the divider, or warp the frequency so the
                        // ramp pulls back into phase lock without a jump.
                        self.reset_counter -= 1;
                        if self.reset_counter == 0 {
                            train_phase = 0.0;
                            self.reset_counter = ratio.q;
                            self.f_ratio = ratio.ratio;
                            max_train_phase = ratio.q as f32;
                        } else {
                            let expected = max_train_phase - self.reset_counter as f32;
                            let warp = expected - train_phase + 1.0;
                            self.frequency *= warp.max(0.01);
                        }
                        self.target_frequency = self.f_ratio * self.frequency;
                        self.reset_interval =
                            (4.0 / self.target_frequency).max(self.sample_rate * 3.0);
                    }

                    self.current_pulse = (self.current_pulse + 1) % HISTORY_SIZE;
                }
                self.history[self.current_pulse].on_duration = 0;
                self.history[self.current_pulse].total_duration = 0;
            }

            if self.audio_rate {
                loop {
                    {
                        let p = &mut self.history[self.current_pulse];
                        p.total_duration += 1;
                        if flags.is_falling() {
                            p.on_duration = p.total_duration - 1;
                        }
                    }
                    one_pole(&mut self.frequency, self.target_frequency, self.lp_coefficient);
                    train_phase += self.frequency;
                    if train_phase > 1.0 {
                        train_phase -= 1.0;
                        let elapsed = self.history[self.current_pulse].total_duration as f32;
                        if elapsed / self.f_ratio > 1.5 / self.target_frequency {
                            // Clock stalled: freeze at the top of the ramp.
                            train_phase = 1.0;
                            self.frequency = 0.0;
                            self.target_frequency = 0.0;
                        }
                    }
                    ramp[i] = train_phase;
                    i += 1;
                    if i >= size {
                        break;
                    }
                    flags = gate_flags[i];
                    if flags.is_rising() {
                        break;
                    }
                }
            } else {
                loop {
                    {
                        let p = &mut self.history[self.current_pulse];
                        p.total_duration += 1;
                        if flags.is_falling() {
                            p.on_duration = p.total_duration - 1;
                            if self.apw_match_count >= HISTORY_SIZE {
                                // The pulse width is trustworthy: re-aim the
                                // ramp mid-pulse so it crosses the next
                                // integer exactly on the predicted edge.
                                let t_on = p.on_duration as f32;
                                let next =
                                    max_train_phase - self.reset_counter as f32 + 1.0;
                                let pw = self.average_pulse_width;
                                self.frequency =
                                    (next - train_phase).max(0.0) * pw / ((1.0 - pw) * t_on);
                            }
                        }
                    }
                    train_phase += self.frequency;
                    if train_phase >= max_train_phase {
                        train_phase = max_train_phase;
                    }

                    let mut phase = train_phase * self.f_ratio;
                    phase -= (phase as i32) as f32;
                    ramp[i] = phase;
                    i += 1;
                    if i >= size {
                        break;
                    }
                    flags = gate_flags[i];
                    if flags.is_rising() {
                        break;
                    }
                }
            }
        }

        self.train_phase = train_phase;
        self.max_train_phase = max_train_phase;
    }
}
