#![no_std]

//! # Deneb Modulation
//!
//! No-std signal-generation core for a multi-purpose modulation channel.
//!
//! A channel is programmed as one to six contiguous segments and renders
//! a stream of `(value, phase, segment)` triples from a per-sample gate
//! stream and two slowly varying parameters per segment. Depending on
//! the configuration the same core behaves as an envelope, a step
//! sequence, a free-running or clock-synced LFO, a sample-and-hold, a CV
//! delay, a pulse generator, or a shift-register random source.
//!
//! - [`SegmentGenerator`] - the channel runner
//! - [`Configuration`] / [`Settings`] - host-facing configuration
//! - [`Output`] - one rendered sample
//! - [`Rng`] - deterministic random source for the pattern modes
//!
//! All state is fixed-size; rendering never allocates and never panics.
//!
//! # Example
//!
//! ```ignore
//! use deneb_modulation::{Configuration, SegmentGenerator, SegmentType, Settings, Output};
//! use deneb_timing::GateFlags;
//!
//! let mut generator = SegmentGenerator::new(&Settings::default());
//! generator.configure(true, &[Configuration::new(SegmentType::Ramp, false)]);
//! generator.set_segment_parameters(0, 0.5, 0.25);
//!
//! let gates = [GateFlags::RISING; 64];
//! let mut out = [Output::default(); 64];
//! generator.process(&gates, &mut out);
//! ```

mod config;
mod generator;
mod rng;
mod turing;

pub use config::{Configuration, Multimode, Range, SegmentType, Settings, MAX_NUM_SEGMENTS};
pub use generator::{Output, SegmentGenerator, MAX_DELAY, RETRIG_DELAY_SAMPLES};
pub use rng::Rng;
