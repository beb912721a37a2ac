//! Geometric Brownian motion paths from pseudo-random or Sobol draws.
//!
//! A *draw* is one vector of standard normals, one per time step. With
//! antithetic sampling each draw yields two paths, `+z` and `−z`.
//!
//! Draws are processed in chunks of [`CHUNK_DRAWS`]. Chunk `c` owns draws
//! `c·CHUNK_DRAWS ..` and its own random source:
//!
//! * pseudo-random: an MT19937-64 stream seeded from `(seed, c)`;
//! * Sobol: a private sequence positioned at its first draw, so draw `d`
//!   always uses Sobol point `d + 1` (the origin is skipped).
//!
//! Results therefore depend only on the seed and the draw count, never on
//! the number of worker threads.

use fb_core::{ensure_config, CancellationToken, Real, Result, Time};
use fb_math::random_numbers::{uniforms_to_normals, MAX_DIMENSION};
use fb_math::{BrownianBridge, PseudoRandomNormal, SobolSequence, SobolState};
use fb_termstructures::MarketCurves;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Draws per parallel chunk.
pub const CHUNK_DRAWS: usize = 1024;

/// Source of the normal variates driving the paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Sampler {
    /// Mersenne Twister pseudo-random normals.
    #[default]
    PseudoRandom,
    /// Sobol points mapped through the inverse normal CDF.
    Sobol {
        /// Apply a seeded digital shift.
        scrambled: bool,
        /// Fill paths in Brownian-bridge order rather than step by step.
        brownian_bridge: bool,
    },
}

/// Per-chunk source of Brownian increments.
#[derive(Debug)]
pub enum IncrementSource<'g> {
    /// Independent normals scaled by `√Δt`.
    Pseudo {
        /// Normal stream of the chunk.
        rng: PseudoRandomNormal,
        /// `√Δt` per step.
        sqrt_dt: &'g [Real],
    },
    /// Sobol normals, optionally bridged.
    Sobol {
        /// Private sequence of the chunk.
        sequence: SobolSequence,
        /// Bridge, when enabled.
        bridge: Option<&'g BrownianBridge>,
        /// `√Δt` per step.
        sqrt_dt: &'g [Real],
        /// Normal scratch.
        normals: Vec<Real>,
    },
}

impl IncrementSource<'_> {
    /// Write the next draw's increments `W(t_i) − W(t_{i−1})` into `dw`.
    pub fn next_increments(&mut self, dw: &mut [Real]) {
        match self {
            IncrementSource::Pseudo { rng, sqrt_dt } => {
                rng.fill(dw);
                for (d, s) in dw.iter_mut().zip(sqrt_dt.iter()) {
                    *d *= s;
                }
            }
            IncrementSource::Sobol {
                sequence,
                bridge,
                sqrt_dt,
                normals,
            } => {
                sequence.next_into(normals);
                uniforms_to_normals(normals);
                match bridge {
                    Some(bb) => bb.transform_increments(normals, dw),
                    None => {
                        for ((d, z), s) in dw.iter_mut().zip(normals.iter()).zip(sqrt_dt.iter()) {
                            *d = z * s;
                        }
                    }
                }
            }
        }
    }
}

/// Simulated paths stored row-major, one row of `steps + 1` levels per path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathMatrix {
    values: Vec<Real>,
    columns: usize,
}

impl PathMatrix {
    /// Wrap row-major `values` holding `columns` levels per path.
    pub fn from_rows(values: Vec<Real>, columns: usize) -> Result<Self> {
        ensure_config!(columns > 0, "columns", "a path needs at least one level");
        ensure_config!(
            values.len() % columns == 0,
            "values",
            "{} values do not split into rows of {columns}",
            values.len()
        );
        Ok(Self { values, columns })
    }

    /// Number of paths.
    pub fn num_paths(&self) -> usize {
        self.values.len() / self.columns
    }

    /// Levels per path, including the initial spot.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Path `i`.
    pub fn path(&self, i: usize) -> &[Real] {
        &self.values[i * self.columns..(i + 1) * self.columns]
    }

    /// Level of path `i` at column `j`.
    #[inline]
    pub fn at(&self, i: usize, j: usize) -> Real {
        self.values[i * self.columns + j]
    }

    /// Column `j` of every path.
    pub fn column(&self, j: usize) -> impl Iterator<Item = Real> + '_ {
        self.values.iter().skip(j).step_by(self.columns).copied()
    }
}

/// Log-Euler GBM generator on a fixed set of observation times.
///
/// Over step `i` the log spot moves by `(r − q − ½σ²)Δt + σ ΔW` with the
/// curves read at the step's midpoint, which is exact for flat curves.
#[derive(Debug, Clone)]
pub struct GbmPathGenerator {
    spot: Real,
    times: Vec<Time>,
    drift: Vec<Real>,
    vol: Vec<Real>,
    sqrt_dt: Vec<Real>,
    sampler: Sampler,
    seed: u64,
    bridge: Option<BrownianBridge>,
}

impl GbmPathGenerator {
    /// Generator observing at `times` (strictly increasing, positive).
    pub fn new(
        spot: Real,
        curves: MarketCurves<'_>,
        times: &[Time],
        sampler: Sampler,
        seed: u64,
    ) -> Result<Self> {
        ensure_config!(spot > 0.0 && spot.is_finite(), "spot", "spot must be positive, got {spot}");
        ensure_config!(!times.is_empty(), "steps", "need at least one time step");
        ensure_config!(
            times[0] > 0.0 && times.windows(2).all(|w| w[1] > w[0]),
            "times",
            "observation times must be positive and strictly increasing"
        );
        if let Sampler::Sobol { .. } = sampler {
            ensure_config!(
                times.len() <= MAX_DIMENSION,
                "steps",
                "Sobol sampling supports at most {MAX_DIMENSION} steps, got {}",
                times.len()
            );
        }

        let mut drift = Vec::with_capacity(times.len());
        let mut vol = Vec::with_capacity(times.len());
        let mut sqrt_dt = Vec::with_capacity(times.len());
        let mut prev = 0.0;
        for &t in times {
            let dt = t - prev;
            let (r, q, sigma) = curves.at(0.5 * (prev + t));
            ensure_config!(sigma > 0.0, "vol", "volatility must be positive, got {sigma}");
            drift.push((r - q - 0.5 * sigma * sigma) * dt);
            vol.push(sigma);
            sqrt_dt.push(dt.sqrt());
            prev = t;
        }
        let bridge = match sampler {
            Sampler::Sobol {
                brownian_bridge: true,
                ..
            } => Some(BrownianBridge::with_times(times)?),
            _ => None,
        };
        Ok(Self {
            spot,
            times: times.to_vec(),
            drift,
            vol,
            sqrt_dt,
            sampler,
            seed,
            bridge,
        })
    }

    /// Generator on `steps` equal steps up to `maturity`.
    pub fn uniform(
        spot: Real,
        curves: MarketCurves<'_>,
        maturity: Time,
        steps: usize,
        sampler: Sampler,
        seed: u64,
    ) -> Result<Self> {
        ensure_config!(maturity > 0.0, "maturity", "maturity must be positive, got {maturity}");
        ensure_config!(steps > 0, "steps", "need at least one time step");
        let times: Vec<Time> = (1..=steps)
            .map(|i| maturity * i as Real / steps as Real)
            .collect();
        Self::new(spot, curves, &times, sampler, seed)
    }

    /// Initial spot.
    pub fn spot(&self) -> Real {
        self.spot
    }

    /// Observation times, excluding `0`.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// Number of steps per path.
    pub fn steps(&self) -> usize {
        self.times.len()
    }

    /// `Σ (r − q − ½σ²)Δt`: mean of `ln(S_T / S_0)`.
    pub fn log_drift(&self) -> Real {
        self.drift.iter().sum()
    }

    /// `Σ σ²Δt`: variance of `ln(S_T / S_0)`.
    pub fn log_variance(&self) -> Real {
        self.vol
            .iter()
            .zip(&self.sqrt_dt)
            .map(|(s, h)| (s * h).powi(2))
            .sum()
    }

    /// `Σ σΔt`, the drift term of `∂ ln S_T / ∂σ` under a parallel vol shift.
    pub fn vol_time(&self) -> Real {
        self.vol
            .iter()
            .zip(&self.sqrt_dt)
            .map(|(s, h)| s * h * h)
            .sum()
    }

    /// `E[S_T]` under the discretised dynamics.
    pub fn forward(&self) -> Real {
        self.spot * (self.log_drift() + 0.5 * self.log_variance()).exp()
    }

    /// Mean and variance of the log of the geometric average of the
    /// observations after `t = 0`.
    ///
    /// Step `i` (0-based) enters `steps − i` of the `steps` fixings.
    pub fn geometric_average_log_moments(&self) -> (Real, Real) {
        let n = self.steps() as Real;
        let mut mean = self.spot.ln();
        let mut variance = 0.0;
        for (i, ((mu, sigma), h)) in self.drift.iter().zip(&self.vol).zip(&self.sqrt_dt).enumerate() {
            let w = (n - i as Real) / n;
            mean += w * mu;
            variance += (w * sigma * h).powi(2);
        }
        (mean, variance)
    }

    /// Increment source of chunk `chunk`.
    pub fn source(&self, chunk: usize) -> Result<IncrementSource<'_>> {
        let first_draw = (chunk * CHUNK_DRAWS) as u64;
        Ok(match self.sampler {
            Sampler::PseudoRandom => IncrementSource::Pseudo {
                rng: PseudoRandomNormal::for_stream(self.seed, chunk as u64),
                sqrt_dt: &self.sqrt_dt,
            },
            Sampler::Sobol { scrambled, .. } => {
                let state = SobolState {
                    index: first_draw,
                    seed: scrambled.then_some(self.seed),
                };
                IncrementSource::Sobol {
                    sequence: SobolSequence::from_state(self.steps(), state)?,
                    bridge: self.bridge.as_ref(),
                    sqrt_dt: &self.sqrt_dt,
                    normals: vec![0.0; self.steps()],
                }
            }
        })
    }

    /// Build the path driven by `sign · dw` into `levels` (`steps + 1` long).
    pub fn evolve(&self, dw: &[Real], sign: Real, levels: &mut [Real]) {
        let mut log_s = self.spot.ln();
        levels[0] = self.spot;
        for (i, level) in levels[1..].iter_mut().enumerate() {
            log_s += self.drift[i] + self.vol[i] * sign * dw[i];
            *level = log_s.exp();
        }
    }

    /// Simulate `draws` draws in parallel chunks.
    ///
    /// With `antithetic`, draw `d` fills rows `2d` (`+z`) and `2d + 1`
    /// (`−z`). `cancel` is checked before each chunk.
    pub fn simulate(
        &self,
        draws: usize,
        antithetic: bool,
        cancel: &CancellationToken,
    ) -> Result<PathMatrix> {
        let columns = self.steps() + 1;
        let per_draw = if antithetic { 2 } else { 1 };
        let mut values = vec![0.0; draws * per_draw * columns];
        values
            .par_chunks_mut(CHUNK_DRAWS * per_draw * columns)
            .enumerate()
            .try_for_each(|(chunk, rows)| -> Result<()> {
                cancel.check()?;
                let mut source = self.source(chunk)?;
                let mut dw = vec![0.0; self.steps()];
                for draw in rows.chunks_mut(per_draw * columns) {
                    source.next_increments(&mut dw);
                    let (plus, minus) = draw.split_at_mut(columns);
                    self.evolve(&dw, 1.0, plus);
                    if antithetic {
                        self.evolve(&dw, -1.0, minus);
                    }
                }
                Ok(())
            })?;
        Ok(PathMatrix { values, columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fb_termstructures::Curve;

    fn flat() -> (Curve, Curve, Curve) {
        (Curve::from(0.05), Curve::from(0.01), Curve::from(0.2))
    }

    #[test]
    fn paths_start_at_spot_and_stay_positive() {
        let (r, q, v) = flat();
        let g = GbmPathGenerator::uniform(100.0, MarketCurves::new(&r, &q, &v), 1.0, 12, Sampler::default(), 7)
            .unwrap();
        let m = g.simulate(3000, true, &CancellationToken::new()).unwrap();
        assert_eq!(m.num_paths(), 6000);
        assert_eq!(m.columns(), 13);
        for i in 0..m.num_paths() {
            assert_eq!(m.at(i, 0), 100.0);
            assert!(m.path(i).iter().all(|&s| s > 0.0));
        }
    }

    #[test]
    fn antithetic_rows_mirror_log_returns() {
        let (r, q, v) = flat();
        let g = GbmPathGenerator::uniform(100.0, MarketCurves::new(&r, &q, &v), 1.0, 4, Sampler::default(), 1)
            .unwrap();
        let m = g.simulate(10, true, &CancellationToken::new()).unwrap();
        let drift = (0.05 - 0.01 - 0.02) * 1.0;
        let up = (m.at(0, 4) / 100.0).ln() - drift;
        let down = (m.at(1, 4) / 100.0).ln() - drift;
        assert_relative_eq!(up, -down, epsilon = 1e-10);
    }

    #[test]
    fn terminal_mean_matches_forward() {
        let (r, q, v) = flat();
        let forward = 100.0 * (0.04_f64).exp();
        for sampler in [
            Sampler::PseudoRandom,
            Sampler::Sobol { scrambled: false, brownian_bridge: true },
            Sampler::Sobol { scrambled: true, brownian_bridge: false },
        ] {
            let g = GbmPathGenerator::uniform(100.0, MarketCurves::new(&r, &q, &v), 1.0, 8, sampler, 11)
                .unwrap();
            let m = g.simulate(1 << 15, false, &CancellationToken::new()).unwrap();
            let mean = m.column(8).sum::<Real>() / m.num_paths() as Real;
            assert_relative_eq!(mean, forward, max_relative = 6e-3);
        }
    }

    #[test]
    fn hand_built_matrix_reads_by_row_and_column() {
        let m = PathMatrix::from_rows(vec![100.0, 90.0, 100.0, 110.0], 2).unwrap();
        assert_eq!(m.num_paths(), 2);
        assert_eq!(m.path(1), &[100.0, 110.0]);
        assert_eq!(m.column(1).collect::<Vec<_>>(), vec![90.0, 110.0]);
        assert_eq!(PathMatrix::from_rows(vec![1.0; 5], 2).unwrap_err().field(), Some("values"));
    }

    #[test]
    fn log_moments_of_flat_curves() {
        let (r, q, v) = flat();
        let g = GbmPathGenerator::uniform(100.0, MarketCurves::new(&r, &q, &v), 2.0, 4, Sampler::default(), 1)
            .unwrap();
        assert_relative_eq!(g.log_drift(), (0.05 - 0.01 - 0.02) * 2.0, epsilon = 1e-14);
        assert_relative_eq!(g.log_variance(), 0.04 * 2.0, epsilon = 1e-14);
        assert_relative_eq!(g.vol_time(), 0.2 * 2.0, epsilon = 1e-14);
        assert_relative_eq!(g.forward(), 100.0 * (0.08_f64).exp(), max_relative = 1e-14);
        // fixings at 0.5, 1.0, 1.5, 2.0: weights 1, 3/4, 1/2, 1/4 per step
        let (m, var) = g.geometric_average_log_moments();
        let dt = 0.5;
        assert_relative_eq!(m, 100.0_f64.ln() + 0.02 * dt * 2.5, epsilon = 1e-13);
        assert_relative_eq!(var, 0.04 * dt * (1.0 + 0.5625 + 0.25 + 0.0625), epsilon = 1e-14);
    }

    #[test]
    fn result_is_independent_of_chunk_scheduling() {
        let (r, q, v) = flat();
        let sampler = Sampler::Sobol { scrambled: true, brownian_bridge: true };
        let g = GbmPathGenerator::uniform(100.0, MarketCurves::new(&r, &q, &v), 1.0, 16, sampler, 3)
            .unwrap();
        let a = g.simulate(5000, true, &CancellationToken::new()).unwrap();
        let b = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap()
            .install(|| g.simulate(5000, true, &CancellationToken::new()).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn sobol_dimension_cap_is_a_configuration_error() {
        let (r, q, v) = flat();
        let sampler = Sampler::Sobol { scrambled: false, brownian_bridge: true };
        let err = GbmPathGenerator::uniform(100.0, MarketCurves::new(&r, &q, &v), 1.0, 65, sampler, 0)
            .unwrap_err();
        assert_eq!(err.field(), Some("steps"));
    }

    #[test]
    fn cancelled_simulation_returns_no_paths() {
        let (r, q, v) = flat();
        let g = GbmPathGenerator::uniform(100.0, MarketCurves::new(&r, &q, &v), 1.0, 4, Sampler::default(), 1)
            .unwrap();
        let token = CancellationToken::new();
        token.cancel();
        assert!(g.simulate(100, false, &token).unwrap_err().is_cancelled());
    }
}
