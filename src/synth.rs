//! Synthetic spectra for demos and tests.

use crate::constants::CKM;

const FWHM_TO_SIGMA: f64 = 2.354_820_045_030_949;

/// Gaussian profile with peak `amplitude` at `mu`.
pub fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Regular frequency axis of `n` channels starting at `start` (MHz).
pub fn frequency_axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + i as f64 * step).collect()
}

/// A Gaussian emission line: centre (MHz), FWHM (km/s) and peak intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub freq: f64,
    pub fwhm: f64,
    pub amplitude: f64,
}

/// Sum of `lines` evaluated on `freq`.
pub fn line_profile(freq: &[f64], lines: &[Line]) -> Vec<f64> {
    freq.iter()
        .map(|&f| {
            lines
                .iter()
                .map(|l| {
                    let sigma = l.fwhm * l.freq / CKM / FWHM_TO_SIGMA;
                    gaussian(f, l.freq, sigma, l.amplitude)
                })
                .sum()
        })
        .collect()
}

/// Add Gaussian noise of standard deviation `sigma` in place.
pub fn add_noise(values: &mut [f64], sigma: f64, rng: &mut SimpleRng) {
    for v in values {
        *v += rng.gauss(0.0, sigma);
    }
}

/// Minimal deterministic PRNG (xoshiro256**)
pub struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    pub fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}
