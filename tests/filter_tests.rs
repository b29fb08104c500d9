//! Filter tests for the HALCYON engine
//!
//! Covers frequency response, stability at the clamp limits, and smooth
//! behavior under per-sample parameter motion.

mod common;

use common::{assert_samples_are_finite, rms};
use halcyon::filter::{StateVariableFilter, SvfMode};
use std::f32::consts::PI;

const SAMPLE_RATE: f32 = 48000.0;

fn sine(freq: f32, n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (2.0 * PI * freq * i as f32 / SAMPLE_RATE).sin())
        .collect()
}

#[test]
fn test_cutoff_position_shapes_lowpass_response() {
    let probe = 2000.0;
    let measure = |cutoff: f32| {
        let mut filter = StateVariableFilter::new(SvfMode::LowPass, SAMPLE_RATE);
        let out: Vec<f32> = sine(probe, 8192)
            .iter()
            .map(|&s| filter.process(s, cutoff, 0.0))
            .collect();
        rms(&out[1024..])
    };

    let open = measure(15000.0);
    let mid = measure(2000.0);
    let closed = measure(200.0);
    assert!(
        open > mid && mid > closed,
        "Response should fall as cutoff drops below the probe: {} / {} / {}",
        open,
        mid,
        closed
    );
    assert!(closed < open * 0.05, "Closed filter should strongly attenuate");
}

#[test]
fn test_resonance_boosts_cutoff_region() {
    let cutoff = 1000.0;
    let measure = |resonance: f32| {
        let mut filter = StateVariableFilter::new(SvfMode::LowPass, SAMPLE_RATE);
        let out: Vec<f32> = sine(cutoff, 8192)
            .iter()
            .map(|&s| filter.process(s, cutoff, resonance))
            .collect();
        rms(&out[1024..])
    };

    let flat = measure(0.0);
    let resonant = measure(0.9);
    assert!(
        resonant > flat * 1.5,
        "Resonance should boost the cutoff region: {} vs {}",
        resonant,
        flat
    );
}

#[test]
fn test_stability_with_full_resonance_at_limit() {
    // Resonance 1, cutoff driven past the internal clamp, one full second
    let mut filter = StateVariableFilter::new(SvfMode::LowPass, SAMPLE_RATE);
    let input = sine(997.0, SAMPLE_RATE as usize);
    let out: Vec<f32> = input
        .iter()
        .map(|&s| filter.process(s, SAMPLE_RATE, 1.0))
        .collect();
    assert_samples_are_finite(&out);
    assert!(
        out.iter().all(|s| s.abs() < 50.0),
        "Filter must not blow up at the clamp limit"
    );
}

#[test]
fn test_per_sample_cutoff_motion_is_stable() {
    // ZDF topology: sweeping the cutoff every sample must not introduce
    // spikes beyond the resonant gain
    let mut filter = StateVariableFilter::new(SvfMode::LowPass, SAMPLE_RATE);
    let input = sine(440.0, 48000);
    let mut out = Vec::with_capacity(input.len());
    for (i, &s) in input.iter().enumerate() {
        let phase = i as f32 / 48000.0;
        let cutoff = 200.0 + 10000.0 * (0.5 + 0.5 * (2.0 * PI * 3.0 * phase).sin());
        out.push(filter.process(s, cutoff, 0.7));
    }
    assert_samples_are_finite(&out);
    assert!(out.iter().all(|s| s.abs() < 10.0));
}

#[test]
fn test_modes_complementary_at_cutoff() {
    // LP + HP + k*BP reconstructs the input in an ideal SVF; check the
    // looser property that notch output = input - k*bandpass holds.
    let mut bp = StateVariableFilter::new(SvfMode::BandPass, SAMPLE_RATE);
    let mut notch = StateVariableFilter::new(SvfMode::Notch, SAMPLE_RATE);
    let input = sine(3000.0, 4096);

    // k at resonance 0.4: 2 * (1 - 0.99 * 0.4)
    let k = 2.0 * (1.0 - 0.99 * 0.4);
    for &s in &input {
        let bp_out = bp.process(s, 3000.0, 0.4);
        let notch_out = notch.process(s, 3000.0, 0.4);
        assert!(
            (notch_out - (s - k * bp_out)).abs() < 1e-4,
            "Notch must equal input minus k*bandpass"
        );
    }
}
