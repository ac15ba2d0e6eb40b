//! RampExtractor integration tests.
//!
//! Drives the extractor with synthetic pulse trains and checks phase
//! lock, clock division/multiplication, loss-of-sync recovery, and the
//! audio-rate regime switch.

use deneb_timing::{GateFlags, RampExtractor, Ratio};

const SAMPLE_RATE: f32 = 32000.0;

/// Build a gate-flag stream from (total_duration, on_duration) pulses.
fn pulse_train(pulses: &[(usize, usize)]) -> Vec<GateFlags> {
    let mut flags = Vec::new();
    let mut previous = GateFlags::LOW;
    for &(total, on) in pulses {
        for i in 0..total {
            previous = previous.extend(i < on);
            flags.push(previous);
        }
    }
    flags
}

/// Process a whole stream in fixed-size blocks.
fn run(extractor: &mut RampExtractor, ratio: Ratio, gates: &[GateFlags]) -> Vec<f32> {
    let mut ramp = vec![0.0f32; gates.len()];
    for (gate_chunk, ramp_chunk) in gates.chunks(64).zip(ramp.chunks_mut(64)) {
        extractor.process(ratio, gate_chunk, ramp_chunk);
    }
    ramp
}

fn rising_edges(gates: &[GateFlags]) -> Vec<usize> {
    gates
        .iter()
        .enumerate()
        .filter(|(_, g)| g.is_rising())
        .map(|(i, _)| i)
        .collect()
}

fn count_wraps(ramp: &[f32]) -> usize {
    ramp.windows(2).filter(|w| w[1] + 0.5 < w[0]).count()
}

#[test]
fn test_output_phase_is_bounded() {
    let mut extractor = RampExtractor::new(SAMPLE_RATE, 1000.0 / SAMPLE_RATE);
    let gates = pulse_train(&[(1500, 500); 30]);
    let ramp = run(&mut extractor, Ratio { ratio: 0.999999, q: 1 }, &gates);
    for &r in &ramp {
        assert!((0.0..=1.0).contains(&r), "phase {} out of range", r);
    }
}

#[test]
fn test_locks_to_steady_one_hz_clock() {
    let mut extractor = RampExtractor::new(SAMPLE_RATE, 1000.0 / SAMPLE_RATE);
    let period = SAMPLE_RATE as usize;
    let gates = pulse_train(&vec![(period, period / 2); 12]);
    let ramp = run(&mut extractor, Ratio { ratio: 0.999999, q: 1 }, &gates);

    let edges = rising_edges(&gates);
    // Convergence is allowed up to 8 pulses; after that the ramp must
    // complete one full cycle per clock period.
    for &edge in edges.iter().skip(8) {
        assert!(
            ramp[edge - 1] > 0.98,
            "ramp should approach 1 right before an edge, got {}",
            ramp[edge - 1]
        );
        assert!(
            ramp[edge] < 0.02,
            "ramp should restart at an edge, got {}",
            ramp[edge]
        );
    }
}

#[test]
fn test_divider_completes_one_cycle_per_q_pulses() {
    let mut extractor = RampExtractor::new(SAMPLE_RATE, 1000.0 / SAMPLE_RATE);
    let gates = pulse_train(&vec![(2000, 600); 24]);
    let ramp = run(&mut extractor, Ratio { ratio: 0.499999, q: 2 }, &gates);

    // Skip the convergence region, then count output wraps: dividing by
    // two, 16 pulses should produce about 8 cycles.
    let start = rising_edges(&gates)[8];
    let wraps = count_wraps(&ramp[start..]);
    assert!(
        (7..=9).contains(&wraps),
        "expected ~8 wraps over 16 divided pulses, got {}",
        wraps
    );
}

#[test]
fn test_multiplier_wraps_twice_per_pulse() {
    let mut extractor = RampExtractor::new(SAMPLE_RATE, 1000.0 / SAMPLE_RATE);
    let gates = pulse_train(&vec![(2000, 600); 24]);
    let ramp = run(&mut extractor, Ratio { ratio: 1.999999, q: 1 }, &gates);

    let edges = rising_edges(&gates);
    let start = edges[8];
    let end = edges[23];
    let wraps = count_wraps(&ramp[start..end]);
    // 15 pulses at x2: about 30 cycles, minus the one consumed per edge
    // reset. Allow slack for the lock-in warp.
    assert!(
        (25..=32).contains(&wraps),
        "expected ~30 wraps over 15 doubled pulses, got {}",
        wraps
    );
}

#[test]
fn test_recovers_after_clock_loss() {
    let mut extractor = RampExtractor::new(SAMPLE_RATE, 1000.0 / SAMPLE_RATE);
    let mut pulses = vec![(1600usize, 800usize); 10];
    // A silent stretch longer than the reset interval.
    pulses.push((6 * SAMPLE_RATE as usize, 16));
    pulses.extend(vec![(1600, 800); 10]);
    let gates = pulse_train(&pulses);
    let ramp = run(&mut extractor, Ratio { ratio: 0.999999, q: 1 }, &gates);

    for &r in &ramp {
        assert!((0.0..=1.0).contains(&r));
    }

    // The first edge after the dropout restarts the ramp from zero.
    let edges = rising_edges(&gates);
    let edge_after_loss = edges[11];
    assert!(
        ramp[edge_after_loss] < 0.02,
        "phase should hard-reset after clock loss, got {}",
        ramp[edge_after_loss]
    );
}

#[test]
fn test_audio_rate_regime_tracks_fast_clock() {
    let mut extractor = RampExtractor::new(SAMPLE_RATE, 1000.0 / SAMPLE_RATE);
    // 320 Hz clock: period of 100 samples, well under SR/100 samples.
    let gates = pulse_train(&vec![(100, 50); 120]);
    let ramp = run(&mut extractor, Ratio { ratio: 0.999999, q: 1 }, &gates);

    for &r in &ramp {
        assert!((0.0..=1.0).contains(&r));
    }

    // After the glide settles, the ramp should wrap roughly once per
    // period.
    let settled = &ramp[4000..];
    let wraps = count_wraps(settled);
    let expected = settled.len() / 100;
    assert!(
        wraps >= expected - 12 && wraps <= expected + 12,
        "expected about {} wraps, got {}",
        expected,
        wraps
    );
}

#[test]
fn test_steady_clock_survives_small_jitter() {
    let mut extractor = RampExtractor::new(SAMPLE_RATE, 1000.0 / SAMPLE_RATE);
    // +/- 2% jitter around a 1500-sample period.
    let mut pulses = Vec::new();
    for i in 0..30 {
        let wobble = ((i % 3) as isize - 1) * 30;
        pulses.push(((1500 + wobble) as usize, 500));
    }
    let gates = pulse_train(&pulses);
    let ramp = run(&mut extractor, Ratio { ratio: 0.999999, q: 1 }, &gates);

    let edges = rising_edges(&gates);
    for &edge in edges.iter().skip(10) {
        assert!(
            ramp[edge - 1] > 0.9,
            "jittered clock should stay near lock, got {}",
            ramp[edge - 1]
        );
    }
}
