//! Multi-segment engine: graph wiring and the per-sample state machine.

use deneb_math::{crossfade, one_pole, warp_phase};
use deneb_timing::GateFlags;

use crate::config::{Configuration, SegmentType};
use crate::turing::advance_register;

use super::{Output, ProcessMode, SegmentGenerator, Source};

/// Segments that hold a level and advance on gate events. A Turing
/// segment outside a loop behaves like a step.
fn is_step(config: &Configuration) -> bool {
    config.segment_type == SegmentType::Step
        || (config.segment_type == SegmentType::Turing && !config.looped)
}

impl SegmentGenerator {
    pub(super) fn configure_multi_segment(&mut self, configurations: &[Configuration]) {
        let num = configurations.len();
        self.num_segments = num;
        self.process_mode = ProcessMode::MultiSegment;

        let last = (num - 1) as i32;

        // First pass: loop window, step segments, first ramp.
        let mut loop_start: i32 = -1;
        let mut loop_end: i32 = -1;
        let mut has_step_segments = false;
        let mut first_ramp_segment: i32 = -1;
        for (i, config) in configurations.iter().enumerate() {
            has_step_segments = has_step_segments || is_step(config);
            if config.looped {
                if loop_start == -1 {
                    loop_start = i as i32;
                }
                loop_end = i as i32;
            }
            if config.segment_type == SegmentType::Ramp && first_ramp_segment == -1 {
                first_ramp_segment = i as i32;
            }
        }

        let mut has_step_segments_inside_loop = false;
        if loop_start != -1 {
            for i in loop_start..=loop_end {
                if is_step(&configurations[i as usize]) {
                    has_step_segments_inside_loop = true;
                    break;
                }
            }
        }

        // Second pass: wire each segment's indirections and transitions.
        for (i, config) in configurations.iter().enumerate() {
            let index = i as u8;
            let segment = &mut self.segments[i];
            segment.bipolar = config.bipolar;
            segment.range = config.range;
            segment.retrig = true;
            segment.advance_tm = false;

            match config.segment_type {
                SegmentType::Ramp => {
                    // A bipolar ramp rides through retriggers.
                    segment.retrig = !config.bipolar;
                    segment.start = None;
                    segment.time = Some(Source::Primary(index));
                    segment.curve = Source::Secondary(index);
                    segment.portamento = Source::Zero;
                    segment.phase = None;

                    segment.end = if i as i32 == last {
                        Source::Zero
                    } else {
                        let next = &configurations[i + 1];
                        match next.segment_type {
                            SegmentType::Turing => Source::Register(index + 1),
                            SegmentType::Step | SegmentType::Hold => Source::Primary(index + 1),
                            SegmentType::Ramp => {
                                if i as i32 == first_ramp_segment {
                                    Source::One
                                } else {
                                    // Ramp-to-ramp reuses this segment's
                                    // curve knob as the target level.
                                    segment.curve = Source::Half;
                                    Source::Secondary(index)
                                }
                            }
                        }
                    };
                }
                SegmentType::Step => {
                    segment.start = Some(Source::Primary(index));
                    segment.end = Source::Primary(index);
                    segment.curve = Source::Half;
                    segment.portamento = Source::Secondary(index);
                    segment.time = None;
                    // A one-segment loop samples on entry; otherwise the
                    // step tracks its slider.
                    segment.phase = if i as i32 == loop_start && i as i32 == loop_end {
                        Some(Source::Zero)
                    } else {
                        Some(Source::One)
                    };
                }
                SegmentType::Turing => {
                    segment.start = Some(Source::Register(index));
                    segment.end = Source::Register(index);
                    segment.advance_tm = true;
                    segment.curve = Source::Half;
                    segment.portamento = Source::Zero;
                    segment.time = None;
                    segment.phase = Some(Source::Zero);
                }
                SegmentType::Hold => {
                    segment.start = Some(Source::Primary(index));
                    segment.end = Source::Primary(index);
                    segment.curve = Source::Half;
                    segment.portamento = Source::Zero;
                    // A one-segment loop holds forever; otherwise the
                    // duration comes from the secondary parameter.
                    segment.time = if i as i32 == loop_start && i as i32 == loop_end {
                        None
                    } else {
                        Some(Source::Secondary(index))
                    };
                    segment.phase = Some(Source::One);
                }
            }

            segment.if_complete = if i as i32 == loop_end {
                loop_start as i8
            } else {
                (i + 1) as i8
            };
            segment.if_falling =
                if loop_end == -1 || loop_end == last || has_step_segments {
                    -1
                } else {
                    (loop_end + 1) as i8
                };
            segment.if_rising = 0;

            if has_step_segments {
                if !has_step_segments_inside_loop
                    && i as i32 >= loop_start
                    && i as i32 <= loop_end
                {
                    // A gate ends the loop and jumps past it.
                    segment.if_rising = ((loop_end + 1) % num as i32) as i8;
                } else {
                    // Advance to the segment following the next step,
                    // wrapping through the loop at most once.
                    let mut follow_loop = loop_end != -1;
                    let mut next_step = i as i32;
                    while !is_step(&configurations[next_step as usize]) {
                        next_step += 1;
                        if follow_loop && next_step == loop_end + 1 {
                            next_step = loop_start;
                            follow_loop = false;
                        }
                        if next_step >= num as i32 {
                            next_step = num as i32 - 1;
                            break;
                        }
                    }
                    segment.if_rising = if next_step == loop_end {
                        loop_start as i8
                    } else {
                        ((next_step + 1) % num as i32) as i8
                    };
                }
            }
        }

        // The sentinel mirrors the last segment's end level and keeps the
        // output stable until the first useful gate event. When the loop
        // ends on the last segment it completes immediately into the
        // loop, so a looped envelope free-runs right after configuration.
        let end = self.segments[num - 1].end;
        let sentinel = &mut self.segments[num];
        sentinel.start = Some(end);
        sentinel.end = end;
        sentinel.time = Some(Source::Zero);
        sentinel.curve = Source::Half;
        sentinel.portamento = Source::Zero;
        sentinel.phase = None;
        sentinel.retrig = true;
        sentinel.advance_tm = false;
        sentinel.if_rising = 0;
        sentinel.if_falling = -1;
        sentinel.if_complete = if loop_end == last { 0 } else { -1 };

        self.active_segment = num;
    }

    pub(super) fn process_multi_segment(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let mut phase = self.phase;
        let mut start = self.start;
        let mut lp = self.lp;
        let mut value = self.value;

        for (&flags, o) in gate_flags.iter().zip(out.iter_mut()) {
            let segment = self.segments[self.active_segment];

            if let Some(time) = segment.time {
                phase += self.rate_to_frequency(self.resolve(time));
            }

            let complete = phase >= 1.0;
            if complete {
                phase = 1.0;
            }
            let value_phase = match segment.phase {
                Some(source) => self.resolve(source),
                None => phase,
            };
            value = crossfade(
                start,
                self.resolve(segment.end),
                warp_phase(value_phase, self.resolve(segment.curve)),
            );

            one_pole(
                &mut lp,
                value,
                self.portamento_to_coefficient(self.resolve(segment.portamento)),
            );

            // Decide what to do next.
            let go_to_segment = if flags.is_rising() && segment.retrig {
                segment.if_rising
            } else if flags.is_falling() {
                segment.if_falling
            } else if complete {
                segment.if_complete
            } else {
                -1
            };

            if go_to_segment != -1 {
                if segment.advance_tm {
                    // Commit the Turing update before the destination is
                    // read, with steps and probability taken from the
                    // segment being left.
                    let parameters = self.parameters[self.active_segment];
                    let steps = (15.0 * parameters.secondary) as i32 + 1;
                    let current = &mut self.segments[self.active_segment];
                    advance_register(
                        steps.max(1) as u32,
                        parameters.primary,
                        &mut current.shift_register,
                        &mut current.register_value,
                        current.bipolar,
                        &mut self.rng,
                    );
                }
                phase = 0.0;
                let destination = self.segments[go_to_segment as usize];
                start = match destination.start {
                    Some(source) => self.resolve(source),
                    None => {
                        if go_to_segment as usize == self.active_segment {
                            start
                        } else {
                            value
                        }
                    }
                };
                self.active_segment = go_to_segment as usize;
            }

            o.value = lp;
            o.phase = phase;
            o.segment = self.active_segment as u8;
        }

        self.phase = phase;
        self.start = start;
        self.lp = lp;
        self.value = value;
    }
}
