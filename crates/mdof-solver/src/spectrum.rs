//! Elastic response spectrum of a ground-acceleration series.
//!
//! Each ordinate integrates a unit-mass damped SDOF oscillator
//! `ü + 2ξωu̇ + ω²u = -a_g(t)` with the average-acceleration Newmark method
//! and reports the pseudo-acceleration `SA = ω² max|u|` in the units of the
//! input series. The record step is subdivided so the integration step never
//! exceeds `T / 20`, up to [`MAX_SUBSTEPS`] per sample; the ground motion is
//! linearly interpolated between samples and is zero after the last one.
//! Oscillators too stiff for the cap behave as rigid and report close to the
//! peak ground acceleration.

use std::f64::consts::PI;

/// Integration steps per oscillator period, at least
const STEPS_PER_PERIOD: f64 = 20.0;

/// Upper bound on integration steps per record sample
pub const MAX_SUBSTEPS: usize = 200;

/// Pseudo-acceleration ordinates of `accel` (sampled at `dt`) for each period.
/// Non-positive or non-finite periods give zero.
pub fn response_spectrum(accel: &[f64], dt: f64, periods: &[f64], damping: f64) -> Vec<f64> {
    periods
        .iter()
        .map(|&period| spectral_acceleration(accel, dt, period, damping))
        .collect()
}

/// Pseudo-acceleration of a single oscillator with period `period` and
/// damping ratio `damping`
pub fn spectral_acceleration(accel: &[f64], dt: f64, period: f64, damping: f64) -> f64 {
    if !(period.is_finite() && period > 0.0) || !(dt.is_finite() && dt > 0.0) || accel.is_empty() {
        return 0.0;
    }

    let omega = 2.0 * PI / period;
    let k = omega * omega;
    let c = 2.0 * damping * omega;

    let substeps = (dt * STEPS_PER_PERIOD / period)
        .ceil()
        .clamp(1.0, MAX_SUBSTEPS as f64) as usize;
    let h = dt / substeps as f64;
    let k_eff = k + 4.0 / (h * h) + 2.0 * c / h;

    let mut u = 0.0_f64;
    let mut v = 0.0_f64;
    let mut a = -accel[0];
    let mut peak = 0.0_f64;

    for (i, &current) in accel.iter().enumerate() {
        let next = accel.get(i + 1).copied().unwrap_or(0.0);
        for s in 1..=substeps {
            let frac = s as f64 / substeps as f64;
            let p = -(current + frac * (next - current));

            let rhs = p + (4.0 / (h * h)) * u + (4.0 / h) * v + a + c * ((2.0 / h) * u + v);
            let u_next = rhs / k_eff;
            let v_next = (2.0 / h) * (u_next - u) - v;
            let a_next = (4.0 / (h * h)) * (u_next - u) - (4.0 / h) * v - a;

            u = u_next;
            v = v_next;
            a = a_next;
            peak = peak.max(u.abs());
        }
    }

    k * peak
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine_record(n: usize, dt: f64, freq: f64, amplitude: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 * dt).sin())
            .collect()
    }

    #[test]
    fn scaling_record_scales_ordinates() {
        let accel = sine_record(1000, 0.01, 1.7, 0.3);
        let scaled: Vec<f64> = accel.iter().map(|a| a * 2.5).collect();
        let periods = [0.1, 0.5, 1.0, 2.0];

        let base = response_spectrum(&accel, 0.01, &periods, 0.05);
        let twice = response_spectrum(&scaled, 0.01, &periods, 0.05);
        for (b, t) in base.iter().zip(&twice) {
            assert!(*b > 0.0);
            assert_relative_eq!(*t, 2.5 * b, max_relative = 1e-10);
        }
    }

    #[test]
    fn non_positive_period_gives_zero() {
        let accel = sine_record(100, 0.01, 2.0, 0.1);
        assert_eq!(spectral_acceleration(&accel, 0.01, 0.0, 0.05), 0.0);
        assert_eq!(spectral_acceleration(&accel, 0.01, -1.0, 0.05), 0.0);
    }

    #[test]
    fn zero_record_gives_zero() {
        let accel = vec![0.0; 200];
        assert_eq!(spectral_acceleration(&accel, 0.01, 0.5, 0.05), 0.0);
    }

    #[test]
    fn very_stiff_oscillator_tracks_ground_peak() {
        // Sub-stepping is capped, so this stays cheap and behaves as rigid
        let accel = sine_record(800, 0.01, 1.3, 0.2);
        let sa = spectral_acceleration(&accel, 0.01, 1e-7, 0.05);
        assert_relative_eq!(sa, 0.2, max_relative = 1e-6);
    }

    #[test]
    fn resonance_amplifies_harmonic_input() {
        // 20 s of a 1 Hz sine: the 1 s oscillator approaches 1/(2ξ) amplification
        let accel = sine_record(2000, 0.01, 1.0, 0.1);
        let sa_resonant = spectral_acceleration(&accel, 0.01, 1.0, 0.05);
        let sa_stiff = spectral_acceleration(&accel, 0.01, 0.05, 0.05);

        assert!(sa_resonant > 0.5);
        assert_relative_eq!(sa_stiff, 0.1, max_relative = 0.05);
    }
}
