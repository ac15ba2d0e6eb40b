//! Channel configuration types.

/// Maximum number of segments per channel, sentinel excluded.
pub const MAX_NUM_SEGMENTS: usize = 6;

/// What a segment does with its two control parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentType {
    /// Sweep from a start to an end level over a programmable time, with
    /// a variable curve.
    #[default]
    Ramp,
    /// Jump to a level with optional portamento; advances on gate events.
    Step,
    /// Hold a level for a programmable duration.
    Hold,
    /// Shift-register random pattern; the level is the register value.
    Turing,
}

/// Speed range of a single-segment LFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Range {
    /// 16x slower than the default range.
    Slow,
    #[default]
    Default,
    /// 64x faster than the default range, capped at 7040 Hz.
    Fast,
}

/// Per-segment configuration bits, stable for the duration of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    pub segment_type: SegmentType,
    pub bipolar: bool,
    pub looped: bool,
    pub range: Range,
}

impl Configuration {
    pub const fn new(segment_type: SegmentType, looped: bool) -> Self {
        Self {
            segment_type,
            bipolar: false,
            looped,
            range: Range::Default,
        }
    }

    pub const fn bipolar(mut self) -> Self {
        self.bipolar = true;
        self
    }

    pub const fn with_range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(SegmentType::Ramp, false)
    }
}

/// Channel behavior switches owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Multimode {
    /// Basic process-mode table, standard LFO speeds.
    #[default]
    Normal,
    /// Free-running LFOs are 8x slower.
    SlowLfo,
    /// Extended process-mode table: track-and-hold and the random
    /// segment family become reachable.
    Advanced,
}

/// Host-owned settings consumed at init time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Sample rate in Hz; fixed for the life of the generator.
    pub sample_rate: f32,
    pub multimode: Multimode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sample_rate: 32000.0,
            multimode: Multimode::Normal,
        }
    }
}
