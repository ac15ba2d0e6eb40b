#![no_std]

//! # Deneb Math
//!
//! No-std numeric primitives for control-voltage DSP.
//!
//! This crate provides the sample-level building blocks shared by the
//! deneb rendering crates:
//!
//! - [`one_pole`] / [`slope`] - first-order smoothing and asymmetric following
//! - [`crossfade`] - linear signal crossfade
//! - [`BlockInterpolator`] - per-block linear parameter interpolation
//! - [`LookupTable`] - clamped table lookup built at init time
//! - [`SINE`] / [`interpolate_wrap`] - wavetable sine with wrapping reads
//! - [`DelayLine16`] - 16-bit quantized delay line with fractional reads
//! - [`semitones_to_ratio`] / [`warp_phase`] - pitch and curve conversions
//!
//! All types are `Copy`/`Clone` where size permits, zero-allocation, and
//! suitable for real-time use. Transcendental functions go through `libm`
//! so the crate stays `no_std`; hot paths read lookup tables instead.

mod crossfade;
mod delay_line;
mod interpolate;
mod lut;
mod one_pole;
mod units;

pub use crossfade::crossfade;
pub use delay_line::DelayLine16;
pub use interpolate::BlockInterpolator;
pub use lut::{interpolate_wrap, LookupTable, SINE, SINE_TABLE_SIZE};
pub use one_pole::{one_pole, slope};
pub use units::{semitones_to_ratio, warp_phase};
