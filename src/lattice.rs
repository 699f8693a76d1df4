//! Lattice allocation and cosine-basis transforms (spec §4.1, C1).
//!
//! The basis is the type-II/III discrete cosine transform pair in both
//! dimensions — equivalent to Neumann (zero-flux) boundary conditions,
//! which is what the diffusion problem in `flow` requires. `forward` reads
//! `rho_init` and writes `rho_ft`; `backward` does the reverse and divides
//! by `4 · lx · ly` to undo the DCT-II/DCT-III pair's implicit scaling.
//!
//! Transforms are direct O(n²) per dimension rather than FFT-based: spec §3
//! explicitly does not require `lx, ly` to factor nicely ("powers of small
//! primes preferred... but not required"), and a direct sum is correct for
//! any lattice size. See DESIGN.md for the complexity tradeoff this implies.
//!
//! `dct2_axis*` applies the unnormalized type-II sum with an extra factor of
//! `2`; `dct3_axis*` is its matching type-III inverse (the `0.5`-weighted
//! `X[0]` term). Composing both along one axis recovers the original values
//! scaled by that axis's length, so a full 2D round trip needs normalizing
//! by `1 / (lx * ly)`, not `1 / (4 * lx * ly)`.

use ndarray::Array2;

/// Precomputed `cos(pi/n * (i + 0.5) * k)` table for one axis of length `n`.
/// The same table serves both the forward (sum over `i`) and backward (sum
/// over `k`) transforms, since the formula is symmetric in its two indices.
fn cos_table(n: usize) -> Array2<f64> {
    let mut table = Array2::zeros((n, n));
    let scale = std::f64::consts::PI / n as f64;
    for i in 0..n {
        for k in 0..n {
            table[[i, k]] = (scale * (i as f64 + 0.5) * k as f64).cos();
        }
    }
    table
}

/// The `lx × ly` density lattice and its cosine-basis companion (spec §3).
#[derive(Debug, Clone)]
pub struct Lattice {
    lx: usize,
    ly: usize,
    rho_init: Array2<f64>,
    rho_ft: Array2<f64>,
    cos_x: Array2<f64>,
    cos_y: Array2<f64>,
}

impl Lattice {
    pub fn new(lx: usize, ly: usize) -> Self {
        assert!(lx > 0 && ly > 0, "lattice dimensions must be positive");
        Self {
            lx,
            ly,
            rho_init: Array2::zeros((lx, ly)),
            rho_ft: Array2::zeros((lx, ly)),
            cos_x: cos_table(lx),
            cos_y: cos_table(ly),
        }
    }

    #[inline] pub fn lx(&self) -> usize { self.lx }
    #[inline] pub fn ly(&self) -> usize { self.ly }
    #[inline] pub fn rho_init(&self) -> &Array2<f64> { &self.rho_init }
    #[inline] pub fn rho_init_mut(&mut self) -> &mut Array2<f64> { &mut self.rho_init }
    #[inline] pub fn rho_ft(&self) -> &Array2<f64> { &self.rho_ft }
    #[inline] pub fn rho_ft_mut(&mut self) -> &mut Array2<f64> { &mut self.rho_ft }
    #[inline] pub(crate) fn cos_x(&self) -> &Array2<f64> { &self.cos_x }
    #[inline] pub(crate) fn cos_y(&self) -> &Array2<f64> { &self.cos_y }

    /// Forward type-II DCT in both dimensions: `rho_init` → `rho_ft`.
    ///
    /// `rho_init` and `rho_ft` are distinct fields, so this borrows each
    /// independently rather than through a single aliased view — the
    /// non-aliasing contract between the two buffers is enforced by the
    /// borrow checker (DESIGN NOTES §9).
    pub fn forward(&mut self) {
        let mut stage = Array2::<f64>::zeros((self.lx, self.ly));
        dct2_axis0(&self.rho_init, &mut stage, &self.cos_x);
        dct2_axis1(&stage, &mut self.rho_ft, &self.cos_y);
    }

    /// Backward type-III DCT in both dimensions: `rho_ft` → `rho_init`,
    /// normalized by `1 / (lx · ly)` to undo the forward pass's scaling.
    pub fn backward(&mut self) {
        let mut stage = Array2::<f64>::zeros((self.lx, self.ly));
        dct3_axis0(&self.rho_ft, &mut stage, &self.cos_x);
        dct3_axis1(&stage, &mut self.rho_init, &self.cos_y);
        let norm = 1.0 / (self.lx as f64 * self.ly as f64);
        self.rho_init.mapv_inplace(|v| v * norm);
    }
}

fn dct2_axis0(input: &Array2<f64>, out: &mut Array2<f64>, cos: &Array2<f64>) {
    let (n, m) = input.dim();
    for k in 0..n {
        for j in 0..m {
            let mut sum = 0.0;
            for i in 0..n {
                sum += input[[i, j]] * cos[[i, k]];
            }
            out[[k, j]] = 2.0 * sum;
        }
    }
}

fn dct2_axis1(input: &Array2<f64>, out: &mut Array2<f64>, cos: &Array2<f64>) {
    let (n, m) = input.dim();
    for l in 0..m {
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..m {
                sum += input[[i, j]] * cos[[j, l]];
            }
            out[[i, l]] = 2.0 * sum;
        }
    }
}

fn dct3_axis0(input: &Array2<f64>, out: &mut Array2<f64>, cos: &Array2<f64>) {
    let (n, m) = input.dim();
    for i in 0..n {
        for j in 0..m {
            let mut sum = 0.5 * input[[0, j]];
            for k in 1..n {
                sum += input[[k, j]] * cos[[i, k]];
            }
            out[[i, j]] = sum;
        }
    }
}

fn dct3_axis1(input: &Array2<f64>, out: &mut Array2<f64>, cos: &Array2<f64>) {
    let (n, m) = input.dim();
    for j in 0..m {
        for i in 0..n {
            let mut sum = 0.5 * input[[i, 0]];
            for l in 1..m {
                sum += input[[i, l]] * cos[[j, l]];
            }
            out[[i, j]] = sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn round_trip_recovers_original_field() {
        let mut lat = Lattice::new(8, 6);
        for i in 0..8 {
            for j in 0..6 {
                lat.rho_init_mut()[[i, j]] = ((i * 3 + j * 7) % 11) as f64 - 5.0;
            }
        }
        let original = lat.rho_init().clone();
        lat.forward();
        lat.backward();
        let max_abs = original.iter().cloned().fold(0.0_f64, |a, b| a.max(b.abs())).max(1.0);
        for i in 0..8 {
            for j in 0..6 {
                assert_abs_diff_eq!(lat.rho_init()[[i, j]], original[[i, j]], epsilon = 1e-9 * max_abs);
            }
        }
    }

    #[test]
    fn constant_field_has_single_dc_coefficient() {
        let mut lat = Lattice::new(4, 4);
        lat.rho_init_mut().fill(3.0);
        lat.forward();
        // Each axis's unnormalized DCT-II contributes a factor of 2 * length
        // to the DC term of a constant field: 4 * c * lx * ly.
        assert_abs_diff_eq!(lat.rho_ft()[[0, 0]], 4.0 * 3.0 * 4.0 * 4.0, epsilon = 1e-9);
        for i in 0..4 {
            for j in 0..4 {
                if (i, j) != (0, 0) {
                    assert_abs_diff_eq!(lat.rho_ft()[[i, j]], 0.0, epsilon = 1e-9);
                }
            }
        }
    }
}
