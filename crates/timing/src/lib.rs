#![no_std]

//! # Deneb Timing
//!
//! No-std gate-event handling and clock recovery for control-voltage DSP.
//!
//! This crate provides the timing layer between raw gate inputs and the
//! rendering crates:
//!
//! - [`GateFlags`] - per-sample gate state with edge detection
//! - [`GateDelay`] - short gate ring buffer for CV/GATE skew compensation
//! - [`RampExtractor`] - turns an arbitrary pulse train into a phase ramp
//!   with clock division/multiplication via [`Ratio`]
//!
//! All types are `Copy`/`Clone` where size permits, zero-allocation, and
//! suitable for real-time use.

mod gate;
mod ramp_extractor;

pub use gate::{GateDelay, GateFlags, GATE_DELAY_CAPACITY};
pub use ramp_extractor::{RampExtractor, Ratio, HISTORY_SIZE, MAX_PATTERN_PERIOD};
