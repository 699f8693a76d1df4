//! Gaussian blur in the cosine-basis domain (spec §4.3, C3).
//!
//! Grounded on the original `blur_density` routine: a Gaussian blur applied
//! to a field already expressed in its DCT-II coefficients is itself
//! diagonal — each coefficient `ρ̂[i,j]` is multiplied by
//! `exp(-0.5 σ² π² ((i/lx)² + (j/ly)²))`. No spatial-domain convolution is
//! needed.

use crate::lattice::Lattice;

/// σ schedule for integration step `k` (0-indexed): halves each step,
/// floored at `sigma_floor` (spec §4.3). Step 0 uses `σ = 2^5 = 32` as the
/// original implementation's starting blur width, matched here in full
/// generality rather than hardcoding its `lx=ly=512` assumption.
pub fn sigma_for_step(k: u32, sigma_floor: f64) -> f64 {
    let sigma = 2f64.powi(5 - k as i32);
    sigma.max(sigma_floor)
}

/// Multiply `lattice.rho_ft` in place by the Gaussian kernel for width
/// `sigma`, then invert the transform so `rho_init` holds the blurred
/// density field. Assumes the caller already ran `lattice.forward()` (the
/// driver's C1 step); `rho_ft` afterward holds the blurred coefficients,
/// ready for the flow integrator to read directly.
pub fn blur(lattice: &mut Lattice, sigma: f64) {
    let lx = lattice.lx() as f64;
    let ly = lattice.ly() as f64;
    let prefactor = -0.5 * sigma * sigma * std::f64::consts::PI * std::f64::consts::PI;

    {
        let rho_ft = lattice.rho_ft_mut();
        for i in 0..rho_ft.shape()[0] {
            for j in 0..rho_ft.shape()[1] {
                let fi = i as f64 / lx;
                let fj = j as f64 / ly;
                let kernel = (prefactor * (fi * fi + fj * fj)).exp();
                rho_ft[[i, j]] *= kernel;
            }
        }
    }
    lattice.backward();
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sigma_schedule_halves_and_floors() {
        assert_abs_diff_eq!(sigma_for_step(0, 0.1), 32.0);
        assert_abs_diff_eq!(sigma_for_step(1, 0.1), 16.0);
        assert_abs_diff_eq!(sigma_for_step(5, 0.1), 1.0);
        assert_abs_diff_eq!(sigma_for_step(20, 0.1), 0.1);
    }

    #[test]
    fn blurring_a_constant_field_leaves_it_unchanged() {
        let mut lat = Lattice::new(8, 8);
        lat.rho_init_mut().fill(2.5);
        lat.forward();
        blur(&mut lat, 4.0);
        for i in 0..8 {
            for j in 0..8 {
                assert_abs_diff_eq!(lat.rho_init()[[i, j]], 2.5, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn blurring_smooths_a_spike() {
        let mut lat = Lattice::new(16, 16);
        lat.rho_init_mut()[[8, 8]] = 100.0;
        lat.forward();
        blur(&mut lat, 4.0);
        // Energy spreads: the peak drops and neighbors become non-zero.
        assert!(lat.rho_init()[[8, 8]] < 100.0);
        assert!(lat.rho_init()[[7, 8]].abs() > 1e-6);
    }
}
