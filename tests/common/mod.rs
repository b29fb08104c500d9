// Shared measurement helpers for the HALCYON engine tests

#![allow(dead_code)] // Not every test file uses every helper

/// Calculates the Root Mean Square (RMS) of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|&s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Calculates the peak absolute value of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|&s| s.abs()).fold(0.0, f32::max)
}

/// Calculates the mean of a signal (DC offset).
pub fn mean(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f32>() / samples.len() as f32
}

/// Counts positive-going zero crossings.
pub fn zero_crossings(samples: &[f32]) -> usize {
    samples
        .windows(2)
        .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
        .count()
}

/// Brightness proxy: mean absolute first difference over mean absolute
/// level. Rises as energy moves toward higher frequencies; a cheap stand-in
/// for the spectral centroid.
pub fn brightness(samples: &[f32]) -> f32 {
    let level: f32 = samples.iter().map(|s| s.abs()).sum();
    if level == 0.0 {
        return 0.0;
    }
    let diff: f32 = samples.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    diff / level
}

/// Asserts every sample is inside the valid audio range [-1, 1].
pub fn assert_samples_in_range(samples: &[f32]) {
    for (i, &sample) in samples.iter().enumerate() {
        assert!(
            (-1.0..=1.0).contains(&sample),
            "Sample {} out of range: {} (expected [-1, 1])",
            i,
            sample
        );
    }
}

/// Asserts every sample is finite.
pub fn assert_samples_are_finite(samples: &[f32]) {
    for (i, &sample) in samples.iter().enumerate() {
        assert!(sample.is_finite(), "Sample {} is not finite: {}", i, sample);
    }
}

/// De-interleaves the left channel of a stereo buffer.
pub fn left_channel(interleaved: &[f32]) -> Vec<f32> {
    interleaved.iter().step_by(2).copied().collect()
}

/// De-interleaves the right channel of a stereo buffer.
pub fn right_channel(interleaved: &[f32]) -> Vec<f32> {
    interleaved.iter().skip(1).step_by(2).copied().collect()
}

/// Number of samples covering a duration at a sample rate.
pub fn samples_for(sample_rate: f32, seconds: f32) -> usize {
    (sample_rate * seconds) as usize
}
