//! Flow integrator (spec §4.4, C4): the diffusion-induced velocity field and
//! its Lagrangian integration into a per-step projection grid.
//!
//! The smoothed density's cosine-basis coefficients decay mode-by-mode under
//! `∂ρ/∂t = ∇²ρ`, so `ρ(x,y,t)` and `∇ρ(x,y,t)` are reconstructed by the
//! same separable cosine-basis machinery `lattice` uses, evaluated at the
//! decayed coefficients for the requested `t`. Gradients use the matching
//! sine-series derivative of the cosine basis, per spec §4.4 step 2. Both
//! are reconstructed on the full lattice grid and then sampled off-grid by
//! bilinear interpolation, the same division of labor the original
//! implementation's grid-plus-`interpolate_bilinearly` approach uses,
//! rather than a direct (and intractably expensive) per-point spectral sum.

use ndarray::Array2;

use crate::error::{EngineError, EngineResult};
use crate::geom::{make_point, Point};
use crate::lattice::Lattice;

/// `cos(pi/n * (i+0.5) * k)` weight applied when reducing mode `k`'s
/// coefficient into a cosine reconstruction: `0.5` for the DC term (matching
/// `lattice::dct3_axis*`'s halving of `X[0]`), `1.0` otherwise.
fn cos_weights(n: usize) -> Vec<f64> {
    (0..n).map(|k| if k == 0 { 0.5 } else { 1.0 }).collect()
}

/// Derivative weight `-k*pi/n` for the sine-series reconstruction of
/// `d/dx cos(k*pi*x/n)`. Zero at `k=0`, consistent with a constant field
/// having no gradient.
fn sin_weights(n: usize) -> Vec<f64> {
    let scale = std::f64::consts::PI / n as f64;
    (0..n).map(|k| if k == 0 { 0.0 } else { -(k as f64) * scale }).collect()
}

fn sin_table(n: usize) -> Array2<f64> {
    let mut table = Array2::zeros((n, n));
    let scale = std::f64::consts::PI / n as f64;
    for i in 0..n {
        for k in 0..n {
            table[[i, k]] = (scale * (i as f64 + 0.5) * k as f64).sin();
        }
    }
    table
}

/// Reduce `input` along axis 0 (index `i` in `0..basis.nrows()`), weighting
/// mode `k` by `weights[k]` and projecting through `basis[[i, k]]`.
fn reduce_axis0(input: &Array2<f64>, basis: &Array2<f64>, weights: &[f64]) -> Array2<f64> {
    let (n, m) = input.dim();
    let mut out = Array2::zeros((n, m));
    for i in 0..n {
        for j in 0..m {
            let mut sum = 0.0;
            for k in 0..n {
                sum += weights[k] * input[[k, j]] * basis[[i, k]];
            }
            out[[i, j]] = sum;
        }
    }
    out
}

/// Reduce `input` along axis 1 (index `j` in `0..basis.nrows()`), same
/// convention as [`reduce_axis0`].
fn reduce_axis1(input: &Array2<f64>, basis: &Array2<f64>, weights: &[f64]) -> Array2<f64> {
    let (n, m) = input.dim();
    let mut out = Array2::zeros((n, m));
    for i in 0..n {
        for j in 0..m {
            let mut sum = 0.0;
            for l in 0..m {
                sum += weights[l] * input[[i, l]] * basis[[j, l]];
            }
            out[[i, j]] = sum;
        }
    }
    out
}

/// A single integration step's spectral state: the blurred density's
/// cosine coefficients, the per-mode decay rate, and the bases needed to
/// reconstruct `ρ` and `∇ρ` on the full grid at any time `t`.
pub struct FlowField {
    lx: usize,
    ly: usize,
    rho_mean: f64,
    coeffs: Array2<f64>,
    decay: Array2<f64>,
    cos_x: Array2<f64>,
    cos_y: Array2<f64>,
    sin_x: Array2<f64>,
    sin_y: Array2<f64>,
    cw_x: Vec<f64>,
    cw_y: Vec<f64>,
    dw_x: Vec<f64>,
    dw_y: Vec<f64>,
}

/// Per-mode grid of `pi^2 * (p^2/lx^2 + q^2/ly^2)`, the decay rate of mode
/// `(p, q)` under `∂ρ/∂t = ∇²ρ`.
fn decay_rates(lx: usize, ly: usize) -> Array2<f64> {
    let mut decay = Array2::zeros((lx, ly));
    let pi2 = std::f64::consts::PI * std::f64::consts::PI;
    for p in 0..lx {
        for q in 0..ly {
            let fp = p as f64 / lx as f64;
            let fq = q as f64 / ly as f64;
            decay[[p, q]] = pi2 * (fp * fp + fq * fq);
        }
    }
    decay
}

impl FlowField {
    /// `lattice.rho_ft()` must already hold the *blurred* coefficients
    /// (forward transform + `blur::blur`, per the C8 driver sequence).
    /// `rho_mean` is the mean target density from C2's rasterization: the
    /// zero-mean field reconstructed from `coeffs` must be shifted by it to
    /// recover an absolute, non-negative physical density.
    pub fn new(lattice: &Lattice, rho_mean: f64) -> Self {
        let lx = lattice.lx();
        let ly = lattice.ly();
        Self {
            lx,
            ly,
            rho_mean,
            coeffs: lattice.rho_ft().clone(),
            decay: decay_rates(lx, ly),
            cos_x: lattice.cos_x().clone(),
            cos_y: lattice.cos_y().clone(),
            sin_x: sin_table(lx),
            sin_y: sin_table(ly),
            cw_x: cos_weights(lx),
            cw_y: cos_weights(ly),
            dw_x: sin_weights(lx),
            dw_y: sin_weights(ly),
        }
    }

    /// Decayed coefficients at time `t`: `coeffs[p,q] * exp(-decay[p,q] t)`.
    fn decayed(&self, t: f64) -> Array2<f64> {
        let mut out = Array2::zeros((self.lx, self.ly));
        for p in 0..self.lx {
            for q in 0..self.ly {
                out[[p, q]] = self.coeffs[[p, q]] * (-self.decay[[p, q]] * t).exp();
            }
        }
        out
    }

    /// Full-grid reconstruction of the zero-mean smoothed density, and its
    /// x/y gradients, at time `t`. Normalized by `1/(lx ly)` exactly as
    /// `Lattice::backward` is.
    fn grids_at(&self, t: f64) -> (Array2<f64>, Array2<f64>, Array2<f64>) {
        let decayed = self.decayed(t);
        let norm = 1.0 / (self.lx as f64 * self.ly as f64);

        let mut rho = reduce_axis1(&reduce_axis0(&decayed, &self.cos_x, &self.cw_x), &self.cos_y, &self.cw_y);
        let mut gx = reduce_axis1(&reduce_axis0(&decayed, &self.sin_x, &self.dw_x), &self.cos_y, &self.cw_y);
        let mut gy = reduce_axis1(&reduce_axis0(&decayed, &self.cos_x, &self.cw_x), &self.sin_y, &self.dw_y);
        rho.mapv_inplace(|v| v * norm);
        gx.mapv_inplace(|v| v * norm);
        gy.mapv_inplace(|v| v * norm);
        (rho, gx, gy)
    }

    /// The time beyond which the slowest-decaying non-constant mode has
    /// fallen below `tol`: a generous, analytically-derived integration
    /// horizon rather than a fixed magic constant (spec §4.4 step 4).
    pub fn time_horizon(&self, tol: f64) -> f64 {
        let pi2 = std::f64::consts::PI * std::f64::consts::PI;
        let slowest = pi2 * (1.0 / (self.lx as f64 * self.lx as f64)).min(1.0 / (self.ly as f64 * self.ly as f64));
        let horizon = -tol.ln() / slowest;
        horizon.clamp(1.0, 50.0)
    }
}

/// Bilinear sample of a lattice-node-valued grid (nodes at `(i+0.5, j+0.5)`)
/// at an arbitrary point, clamped to the lattice's interior.
fn bilinear_sample(grid: &Array2<f64>, x: f64, y: f64) -> f64 {
    let (lx, ly) = grid.dim();
    let fx = (x - 0.5).clamp(0.0, lx as f64 - 1.0);
    let fy = (y - 0.5).clamp(0.0, ly as f64 - 1.0);
    let i0 = fx.floor() as usize;
    let j0 = fy.floor() as usize;
    let i1 = (i0 + 1).min(lx - 1);
    let j1 = (j0 + 1).min(ly - 1);
    let tx = fx - i0 as f64;
    let ty = fy - j0 as f64;

    let v00 = grid[[i0, j0]];
    let v10 = grid[[i1, j0]];
    let v01 = grid[[i0, j1]];
    let v11 = grid[[i1, j1]];
    v00 * (1.0 - tx) * (1.0 - ty) + v10 * tx * (1.0 - ty) + v01 * (1.0 - tx) * ty + v11 * tx * ty
}

/// Velocity `v = -∇ρ/ρ` at `pos`, with `ρ` the *absolute* density
/// (`rho_mean` plus the zero-mean reconstructed field). Returns `None` if
/// the absolute density at `pos` is non-positive.
fn velocity_at(field: &FlowField, rho: &Array2<f64>, gx: &Array2<f64>, gy: &Array2<f64>, pos: Point) -> Option<Point> {
    let rel = bilinear_sample(rho, pos.x, pos.y);
    let abs_rho = field.rho_mean + rel;
    if abs_rho <= 0.0 {
        return None;
    }
    let dx = bilinear_sample(gx, pos.x, pos.y);
    let dy = bilinear_sample(gy, pos.x, pos.y);
    Some(make_point(-dx / abs_rho, -dy / abs_rho))
}

/// One node's Heun(2)/Euler(1) embedded step against a shared pair of
/// field reconstructions at `t` and `t+h`. `None` if either endpoint's
/// reconstructed density goes non-positive.
fn node_step(field: &FlowField, x: Point, h: f64, t0: &(Array2<f64>, Array2<f64>, Array2<f64>), t1: &(Array2<f64>, Array2<f64>, Array2<f64>)) -> Option<(Point, f64)> {
    let (rho, gx, gy) = t0;
    let (rho1, gx1, gy1) = t1;
    let k1 = velocity_at(field, rho, gx, gy, x)?;
    let x_euler = make_point(x.x + h * k1.x, x.y + h * k1.y);
    let k2 = velocity_at(field, rho1, gx1, gy1, x_euler)?;
    let x_heun = make_point(x.x + 0.5 * h * (k1.x + k2.x), x.y + 0.5 * h * (k1.y + k2.y));
    // Heun's estimate is accepted only if the endpoint is itself in a
    // positive-density region.
    let endpoint_abs_rho = field.rho_mean + bilinear_sample(rho1, x_heun.x, x_heun.y);
    if endpoint_abs_rho <= 0.0 {
        return None;
    }
    let err = ((x_heun.x - x_euler.x).powi(2) + (x_heun.y - x_euler.y).powi(2)).sqrt();
    Some((x_heun, err))
}

/// Integrate every lattice node's trajectory from `t=0` to
/// `field.time_horizon`, filling `proj[i][j]` (spec §4.4 step 3-4), via an
/// adaptive Heun(2)/Euler(1) embedded pair shared by every node: the field
/// is reconstructed on the full grid once per global sub-step (at `t` and
/// `t+h`) rather than once per node, since every node samples the same
/// instantaneous field. The global step is halved whenever any node's
/// reconstructed density would go non-positive or the worst per-node local
/// error exceeds `eps_abs`. `max_density_halvings` bounds step-halving
/// retries for non-positive density.
pub fn integrate_flow(
    field: &FlowField,
    lx: usize,
    ly: usize,
    eps_abs: f64,
    max_density_halvings: u32,
) -> EngineResult<Array2<Point>> {
    let t_end = field.time_horizon(1e-4);
    let mut proj = Array2::from_shape_fn((lx, ly), |(i, j)| make_point(i as f64 + 0.5, j as f64 + 0.5));

    let mut t = 0.0;
    let mut h = (t_end / 8.0).max(1e-3);
    let mut density_halvings = 0u32;

    while t < t_end - 1e-12 {
        h = h.min(t_end - t);
        let grids0 = field.grids_at(t);
        let grids1 = field.grids_at(t + h);

        let mut next = Array2::from_elem((lx, ly), make_point(0.0, 0.0));
        let mut max_err = 0.0_f64;
        let mut collapsed_at = None;

        'scan: for i in 0..lx {
            for j in 0..ly {
                match node_step(field, proj[[i, j]], h, &grids0, &grids1) {
                    Some((x_next, err)) => {
                        next[[i, j]] = x_next;
                        max_err = max_err.max(err);
                    }
                    None => {
                        collapsed_at = Some((i, j));
                        break 'scan;
                    }
                }
            }
        }

        if let Some((i, j)) = collapsed_at {
            density_halvings += 1;
            if density_halvings > max_density_halvings {
                let p = proj[[i, j]];
                return Err(EngineError::NonPositiveDensity {
                    attempts: density_halvings,
                    detail: format!("density stayed non-positive near ({:.3}, {:.3})", p.x, p.y),
                });
            }
            h *= 0.5;
            continue;
        }

        if max_err <= eps_abs {
            proj = next;
            t += h;
            h = (h * 1.5).min(t_end / 4.0).max(1e-6);
            density_halvings = 0;
        } else {
            h *= 0.5;
            if h < 1e-9 {
                // Accuracy below representable step size: accept drift and
                // move on rather than spin forever.
                proj = next;
                t += h.max(1e-9);
            }
        }
    }

    Ok(proj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blur::blur;
    use approx::assert_abs_diff_eq;

    #[test]
    fn uniform_density_has_identity_flow() {
        let mut lat = Lattice::new(8, 8);
        lat.rho_init_mut().fill(0.0);
        lat.forward();
        blur(&mut lat, 4.0);

        let field = FlowField::new(&lat, 1.0);
        let proj = integrate_flow(&field, 8, 8, 1e-6, 20).unwrap();
        for i in 0..8 {
            for j in 0..8 {
                assert_abs_diff_eq!(proj[[i, j]].x, i as f64 + 0.5, epsilon = 1e-6);
                assert_abs_diff_eq!(proj[[i, j]].y, j as f64 + 0.5, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn mirror_symmetric_density_yields_mirror_symmetric_flow() {
        // A density field symmetric about the vertical mid-line induces a
        // velocity field with the same symmetry: the PDE and the basis
        // both respect the reflection i <-> lx-1-i.
        let mut lat = Lattice::new(8, 8);
        for i in 0..8 {
            for j in 0..8 {
                let d = if i < 4 { 0.3 } else { -0.3 };
                lat.rho_init_mut()[[i, j]] = d;
                lat.rho_init_mut()[[7 - i, j]] = d;
            }
        }
        lat.forward();
        blur(&mut lat, 4.0);
        let field = FlowField::new(&lat, 1.0);
        let proj = integrate_flow(&field, 8, 8, 1e-4, 20).unwrap();
        for i in 0..8 {
            for j in 0..8 {
                assert_abs_diff_eq!(proj[[i, j]].x + proj[[7 - i, j]].x, 8.0, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn density_collapse_is_reported() {
        let mut lat = Lattice::new(8, 8);
        lat.rho_init_mut().fill(0.0);
        lat.rho_init_mut()[[4, 4]] = -0.999999;
        lat.forward();
        blur(&mut lat, 0.1);
        let field = FlowField::new(&lat, 1e-9);
        let err = integrate_flow(&field, 8, 8, 1e-8, 2).unwrap_err();
        assert!(matches!(err, EngineError::NonPositiveDensity { .. }));
    }
}
