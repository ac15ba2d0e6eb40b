//! Polymorphic segment runner.
//!
//! A [`SegmentGenerator`] renders one channel of control signals, one
//! sample at a time, from a gate-flag stream and two parameters per
//! segment. A single configured segment selects one of twelve dedicated
//! kernels (envelope, LFO, sample-and-hold, delay, random sources...);
//! two to six segments run through the multi-segment engine, which wires
//! the segments into a small transition graph at configure time and
//! walks it per sample.

mod multi;
mod shape;
mod single;

use deneb_math::{DelayLine16, LookupTable};
use deneb_timing::{GateDelay, GateFlags, RampExtractor};

use crate::config::{Configuration, Multimode, Range, Settings, MAX_NUM_SEGMENTS};
use crate::rng::Rng;
use shape::HysteresisQuantizer;

/// Delay line capacity in samples; at least two seconds at the
/// supported sample rates. Longer delays slow the write clock instead of
/// growing the buffer.
pub const MAX_DELAY: usize = 65536;

/// Output blanking after a retrigger while the output is high, so that
/// downstream edge detectors see a clean tooth.
pub const RETRIG_DELAY_SAMPLES: usize = 32;

const ENV_FREQUENCY_TABLE_SIZE: usize = 2049;
const PORTAMENTO_TABLE_SIZE: usize = 513;

// Segment duration sweep covered by the rate parameter.
const MIN_ENV_TIME: f32 = 0.0005;
const MAX_ENV_TIME: f32 = 10.0;

// Portamento time sweep; index 0 is instantaneous.
const MIN_PORTAMENTO_TIME: f32 = 0.001;
const MAX_PORTAMENTO_TIME: f32 = 4.0;

/// One rendered sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Output {
    pub value: f32,
    /// Phase of the active segment, in [0, 1].
    pub phase: f32,
    /// Index of the active segment; `num_segments` is the sentinel.
    pub segment: u8,
}

/// Per-segment control parameters, stable for one block.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Parameters {
    pub primary: f32,
    pub secondary: f32,
}

/// Where a segment reads one of its control scalars from.
///
/// Segments never hold pointers into the parameter block; they hold
/// tagged indices resolved per read, so the transition graph stays valid
/// for any parameter update between blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    Zero,
    Half,
    One,
    Primary(u8),
    Secondary(u8),
    Register(u8),
}

/// Runtime record for one segment (or the sentinel).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Segment {
    /// Level the segment starts from; `None` carries the running value
    /// over from the previous segment.
    pub start: Option<Source>,
    pub end: Source,
    /// Rate source driving the phase accumulator; `None` holds phase.
    pub time: Option<Source>,
    pub curve: Source,
    pub portamento: Source,
    /// Overrides the phase used for the value computation (not the
    /// accumulator driving completion). `None` uses the accumulator.
    pub phase: Option<Source>,
    pub if_rising: i8,
    pub if_falling: i8,
    pub if_complete: i8,
    pub bipolar: bool,
    pub retrig: bool,
    pub advance_tm: bool,
    pub range: Range,
    pub shift_register: u16,
    pub register_value: f32,
}

impl Default for Segment {
    fn default() -> Self {
        Self {
            start: Some(Source::Zero),
            end: Source::Zero,
            time: Some(Source::Zero),
            curve: Source::Half,
            portamento: Source::Zero,
            phase: None,
            if_rising: 0,
            if_falling: 0,
            if_complete: 0,
            bipolar: false,
            retrig: true,
            advance_tm: false,
            range: Range::Default,
            shift_register: 0,
            register_value: 0.0,
        }
    }
}

/// Rendering kernel selected at configure time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessMode {
    MultiSegment,
    Zero,
    FreeLfo,
    DecayEnvelope,
    TapLfo,
    Portamento,
    SampleAndHold,
    TrackAndHold,
    Delay,
    TimedPulse,
    Gate,
    Random,
    Turing,
    Logistic,
}

/// Single-segment kernel table, indexed by
/// `(type << 2) | (has_trigger << 1) | bipolar`.
const PROCESS_MODE_TABLE: [ProcessMode; 16] = {
    use ProcessMode::*;
    [
        // Ramp
        Zero, FreeLfo, DecayEnvelope, TapLfo,
        // Step
        Portamento, Portamento, SampleAndHold, SampleAndHold,
        // Hold
        Delay, Delay, TimedPulse, Gate,
        // Turing family is unreachable outside advanced mode.
        Zero, Zero, Zero, Zero,
    ]
};

/// Advanced-mode variant: track-and-hold replaces the gated bipolar
/// sample-and-hold, and the random family becomes reachable.
const ADVANCED_PROCESS_MODE_TABLE: [ProcessMode; 16] = {
    use ProcessMode::*;
    [
        // Ramp
        Zero, FreeLfo, DecayEnvelope, TapLfo,
        // Step
        Portamento, Portamento, SampleAndHold, TrackAndHold,
        // Hold
        Delay, Delay, TimedPulse, Gate,
        // Turing
        Random, Random, Turing, Logistic,
    ]
};

/// One channel of the signal-generation core.
///
/// Lifecycle: [`new`](Self::new) (or [`init`](Self::init)) fixes the
/// sample rate and zeroes all state; [`configure`](Self::configure)
/// rebuilds the segment graph and picks a kernel;
/// [`process`](Self::process) renders. Rendering never allocates and
/// never panics; parameter values outside their nominal ranges saturate
/// at the lookup-table bounds.
#[derive(Debug, Clone)]
pub struct SegmentGenerator {
    sample_rate: f32,
    multimode: Multimode,
    sample_and_hold_delay: usize,

    process_mode: ProcessMode,
    num_segments: usize,

    // Runtime state shared by all kernels.
    phase: f32,
    aux: f32,
    start: f32,
    value: f32,
    lp: f32,
    primary: f32,
    active_segment: usize,
    retrig_delay: usize,
    monitored_segment: usize,

    segments: [Segment; MAX_NUM_SEGMENTS + 1],
    parameters: [Parameters; MAX_NUM_SEGMENTS],

    env_frequency: LookupTable<ENV_FREQUENCY_TABLE_SIZE>,
    portamento_coefficient: LookupTable<PORTAMENTO_TABLE_SIZE>,

    rng: Rng,
    ramp_extractor: RampExtractor,
    ratio_index: HysteresisQuantizer,
    gate_delay: GateDelay,
    delay_line: DelayLine16<MAX_DELAY>,
}

impl SegmentGenerator {
    /// Build a generator for the given settings.
    pub fn new(settings: &Settings) -> Self {
        let sample_rate = settings.sample_rate;
        debug_assert!(sample_rate > 0.0);

        let env_frequency = LookupTable::from_fn(|i, n| {
            let t = i as f32 / (n - 1) as f32;
            let time = MIN_ENV_TIME * libm::powf(MAX_ENV_TIME / MIN_ENV_TIME, t);
            1.0 / (time * sample_rate)
        });
        let portamento_coefficient = LookupTable::from_fn(|i, n| {
            if i == 0 {
                1.0
            } else {
                let t = i as f32 / (n - 1) as f32;
                let time =
                    MIN_PORTAMENTO_TIME * libm::powf(MAX_PORTAMENTO_TIME / MIN_PORTAMENTO_TIME, t);
                1.0 - libm::expf(-1.0 / (sample_rate * time))
            }
        });

        let mut generator = Self {
            sample_rate,
            multimode: settings.multimode,
            sample_and_hold_delay: ((sample_rate * 2.0 / 1000.0) as usize)
                .min(deneb_timing::GATE_DELAY_CAPACITY - 1),
            process_mode: ProcessMode::MultiSegment,
            num_segments: 0,
            phase: 0.0,
            aux: 0.0,
            start: 0.0,
            value: 0.0,
            lp: 0.0,
            primary: 0.0,
            active_segment: 0,
            retrig_delay: 0,
            monitored_segment: 0,
            segments: [Segment::default(); MAX_NUM_SEGMENTS + 1],
            parameters: [Parameters::default(); MAX_NUM_SEGMENTS],
            env_frequency,
            portamento_coefficient,
            rng: Rng::default(),
            ramp_extractor: RampExtractor::new(sample_rate, 1000.0 / sample_rate),
            ratio_index: HysteresisQuantizer::new(),
            gate_delay: GateDelay::new(),
            delay_line: DelayLine16::new(),
        };
        generator.seed_registers();
        generator
    }

    /// Re-initialize in place from new settings.
    pub fn init(&mut self, settings: &Settings) {
        *self = Self::new(settings);
    }

    /// Reseed the random source and every segment's shift register, for
    /// reproducible random patterns.
    pub fn seed(&mut self, seed: u64) {
        self.rng.seed(seed);
        self.seed_registers();
    }

    fn seed_registers(&mut self) {
        for segment in self.segments.iter_mut() {
            segment.shift_register = self.rng.next_u16();
            segment.register_value = self.rng.next_float();
        }
    }

    /// Republish the host multimode switch; takes effect at the next
    /// [`configure`](Self::configure) (kernel table) and next block
    /// (LFO speed).
    pub fn set_multimode(&mut self, multimode: Multimode) {
        self.multimode = multimode;
    }

    /// Update one segment's control parameters for the next block.
    pub fn set_segment_parameters(&mut self, index: usize, primary: f32, secondary: f32) {
        debug_assert!(index < MAX_NUM_SEGMENTS);
        if let Some(p) = self.parameters.get_mut(index) {
            p.primary = primary;
            p.secondary = secondary;
        }
    }

    /// Select which upstream segment [`process_slave`](Self::process_slave)
    /// mirrors.
    pub fn set_monitored_segment(&mut self, segment: usize) {
        self.monitored_segment = segment;
    }

    /// Index of the segment being rendered; equals
    /// [`num_segments`](Self::num_segments) while resting at the
    /// sentinel.
    pub fn active_segment(&self) -> usize {
        self.active_segment
    }

    /// Phase of the active segment.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Number of configured segments.
    pub fn num_segments(&self) -> usize {
        self.num_segments
    }

    /// Scaled shift-register value of a segment.
    pub fn register_value(&self, index: usize) -> f32 {
        self.segments[index.min(MAX_NUM_SEGMENTS)].register_value
    }

    /// Rebuild the segment graph and select the rendering kernel.
    ///
    /// `configurations` must hold between 1 and [`MAX_NUM_SEGMENTS`]
    /// entries; extra entries are ignored.
    pub fn configure(&mut self, has_trigger: bool, configurations: &[Configuration]) {
        debug_assert!(!configurations.is_empty());
        debug_assert!(configurations.len() <= MAX_NUM_SEGMENTS);
        let configurations = match configurations.len() {
            0 => return,
            n if n > MAX_NUM_SEGMENTS => &configurations[..MAX_NUM_SEGMENTS],
            _ => configurations,
        };
        if configurations.len() == 1 {
            self.configure_single_segment(has_trigger, configurations[0]);
        } else {
            self.configure_multi_segment(configurations);
        }
    }

    fn configure_single_segment(&mut self, has_trigger: bool, config: Configuration) {
        self.num_segments = 1;
        let index = ((config.segment_type as usize) << 2)
            | ((has_trigger as usize) << 1)
            | (config.bipolar as usize);
        let table = if self.multimode == Multimode::Advanced {
            &ADVANCED_PROCESS_MODE_TABLE
        } else {
            &PROCESS_MODE_TABLE
        };
        self.process_mode = table[index];

        let segment = &mut self.segments[0];
        segment.bipolar = config.bipolar;
        segment.range = config.range;
        segment.retrig = true;
        self.active_segment = 0;
    }

    /// Render one block. `gate_flags` and `out` must have equal length.
    pub fn process(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        debug_assert_eq!(gate_flags.len(), out.len());
        if out.is_empty() {
            return;
        }
        match self.process_mode {
            ProcessMode::MultiSegment => self.process_multi_segment(gate_flags, out),
            ProcessMode::Zero => self.process_zero(gate_flags, out),
            ProcessMode::FreeLfo => self.process_free_running_lfo(gate_flags, out),
            ProcessMode::DecayEnvelope => self.process_decay_envelope(gate_flags, out),
            ProcessMode::TapLfo => self.process_tap_lfo(gate_flags, out),
            ProcessMode::Portamento => self.process_portamento(gate_flags, out),
            ProcessMode::SampleAndHold => self.process_sample_and_hold(gate_flags, out),
            ProcessMode::TrackAndHold => self.process_track_and_hold(gate_flags, out),
            ProcessMode::Delay => self.process_delay(gate_flags, out),
            ProcessMode::TimedPulse => self.process_timed_pulse(gate_flags, out),
            ProcessMode::Gate => self.process_gate(gate_flags, out),
            ProcessMode::Random => self.process_random(gate_flags, out),
            ProcessMode::Turing => self.process_turing(gate_flags, out),
            ProcessMode::Logistic => self.process_logistic(gate_flags, out),
        }
    }

    /// Follow an upstream sibling's output instead of rendering.
    ///
    /// While the upstream `segment` matches the monitored index the
    /// output is the inverted upstream phase, else zero; `segment`
    /// reports 0 while monitoring, 1 otherwise.
    pub fn process_slave(&mut self, out: &mut [Output]) {
        for o in out.iter_mut() {
            self.active_segment = if o.segment as usize == self.monitored_segment {
                0
            } else {
                1
            };
            o.value = if self.active_segment == 0 {
                1.0 - o.phase
            } else {
                0.0
            };
        }
    }

    /// Phase increment for a time parameter, via the rate table.
    #[inline]
    fn rate_to_frequency(&self, rate: f32) -> f32 {
        self.env_frequency
            .lookup(rate, (ENV_FREQUENCY_TABLE_SIZE - 1) as f32)
    }

    /// One-pole coefficient for a portamento parameter.
    #[inline]
    fn portamento_to_coefficient(&self, rate: f32) -> f32 {
        self.portamento_coefficient
            .lookup(rate, (PORTAMENTO_TABLE_SIZE - 1) as f32)
    }

    /// Read a control scalar through its indirection.
    #[inline]
    fn resolve(&self, source: Source) -> f32 {
        match source {
            Source::Zero => 0.0,
            Source::Half => 0.5,
            Source::One => 1.0,
            Source::Primary(i) => self.parameters[i as usize].primary,
            Source::Secondary(i) => self.parameters[i as usize].secondary,
            Source::Register(i) => self.segments[i as usize].register_value,
        }
    }
}
