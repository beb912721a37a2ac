//! Sobol quasi-random sequence generator.
//!
//! Low-discrepancy points in (0, 1)^d from the Sobol' construction with
//! Joe-Kuo direction numbers, 64-bit integer arithmetic and Gray-code
//! stepping. The whole generator state is an index (plus an optional
//! scramble seed), so any point can be produced directly with
//! [`SobolSequence::point_at`] and workers can split the index space into
//! disjoint ranges without sharing a generator.

use fb_core::{ensure_config, Real, Result};
use rand_mt::Mt19937GenRand64;
use serde::{Deserialize, Serialize};

/// Maximum supported dimension for the Sobol sequence.
pub const MAX_DIMENSION: usize = 64;

/// Number of bits used for the direction numbers.
const BITS: usize = 64;

/// `(degree s, polynomial coefficients a, initial direction numbers m)` for
/// dimensions 2 and up. Dimension 1 is the van der Corput sequence.
const JOE_KUO: [(usize, u64, &[u64]); MAX_DIMENSION - 1] = [
    (1, 0, &[1]),
    (2, 1, &[1, 3]),
    (3, 1, &[1, 3, 1]),
    (3, 2, &[1, 1, 1]),
    (4, 1, &[1, 1, 3, 3]),
    (4, 4, &[1, 3, 5, 13]),
    (5, 2, &[1, 1, 5, 5, 17]),
    (5, 4, &[1, 1, 5, 5, 5]),
    (5, 7, &[1, 1, 7, 11, 19]),
    (5, 11, &[1, 1, 5, 1, 1]),
    (5, 13, &[1, 1, 1, 3, 11]),
    (5, 14, &[1, 3, 5, 5, 31]),
    (6, 1, &[1, 3, 3, 9, 7, 49]),
    (6, 13, &[1, 1, 1, 15, 21, 21]),
    (6, 16, &[1, 3, 1, 13, 27, 49]),
    (6, 19, &[1, 1, 1, 15, 7, 5]),
    (6, 22, &[1, 3, 1, 15, 13, 25]),
    (6, 25, &[1, 1, 5, 5, 19, 61]),
    (7, 1, &[1, 3, 7, 11, 23, 15, 103]),
    (7, 4, &[1, 3, 7, 13, 13, 15, 69]),
    (7, 7, &[1, 1, 3, 13, 7, 35, 63]),
    (7, 8, &[1, 3, 5, 9, 1, 25, 53]),
    (7, 14, &[1, 3, 1, 13, 9, 35, 107]),
    (7, 19, &[1, 3, 1, 5, 27, 61, 31]),
    (7, 21, &[1, 1, 5, 11, 19, 41, 61]),
    (7, 28, &[1, 3, 5, 3, 3, 13, 69]),
    (7, 31, &[1, 1, 7, 13, 1, 19, 1]),
    (7, 32, &[1, 3, 7, 5, 13, 19, 59]),
    (7, 37, &[1, 1, 3, 9, 25, 29, 41]),
    (7, 41, &[1, 3, 5, 13, 23, 1, 55]),
    (7, 42, &[1, 3, 7, 3, 13, 59, 17]),
    (7, 50, &[1, 3, 1, 3, 5, 53, 69]),
    (7, 55, &[1, 1, 5, 5, 23, 33, 13]),
    (7, 56, &[1, 1, 7, 7, 1, 61, 123]),
    (7, 59, &[1, 1, 7, 9, 13, 61, 49]),
    (7, 62, &[1, 3, 3, 5, 3, 55, 33]),
    (8, 14, &[1, 3, 1, 15, 31, 13, 49, 245]),
    (8, 21, &[1, 3, 5, 15, 31, 59, 63, 97]),
    (8, 22, &[1, 3, 1, 11, 11, 11, 77, 249]),
    (8, 38, &[1, 3, 1, 11, 27, 43, 71, 9]),
    (8, 47, &[1, 1, 7, 15, 21, 11, 81, 45]),
    (8, 49, &[1, 3, 7, 3, 25, 31, 65, 79]),
    (8, 50, &[1, 3, 1, 1, 19, 11, 3, 205]),
    (8, 52, &[1, 1, 5, 9, 19, 21, 29, 157]),
    (8, 56, &[1, 3, 7, 11, 1, 33, 89, 185]),
    (8, 67, &[1, 3, 3, 3, 15, 9, 79, 71]),
    (8, 70, &[1, 3, 7, 11, 15, 39, 119, 27]),
    (8, 84, &[1, 1, 3, 1, 11, 31, 97, 225]),
    (8, 97, &[1, 1, 1, 3, 23, 43, 57, 177]),
    (8, 103, &[1, 3, 7, 7, 17, 17, 37, 71]),
    (8, 115, &[1, 3, 1, 5, 27, 63, 123, 213]),
    (8, 122, &[1, 1, 3, 5, 11, 43, 53, 133]),
    (9, 8, &[1, 3, 5, 5, 29, 17, 47, 173, 479]),
    (9, 13, &[1, 3, 3, 11, 3, 1, 109, 9, 69]),
    (9, 16, &[1, 1, 1, 5, 17, 39, 23, 5, 343]),
    (9, 22, &[1, 3, 1, 5, 25, 15, 31, 103, 499]),
    (9, 25, &[1, 1, 1, 11, 11, 17, 63, 105, 183]),
    (9, 44, &[1, 1, 5, 11, 9, 29, 97, 231, 363]),
    (9, 47, &[1, 1, 5, 15, 19, 45, 41, 7, 383]),
    (9, 52, &[1, 3, 7, 7, 31, 19, 83, 137, 221]),
    (9, 55, &[1, 1, 1, 3, 23, 15, 111, 223, 83]),
    (9, 59, &[1, 1, 5, 13, 31, 15, 55, 25, 161]),
    (9, 62, &[1, 1, 3, 13, 25, 47, 39, 87, 257]),
];

/// Copyable position of a [`SobolSequence`].
///
/// Two sequences built from the same dimension and state produce identical
/// points from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SobolState {
    /// Number of points already drawn.
    pub index: u64,
    /// Digital-shift scramble seed, `None` for the plain sequence.
    pub seed: Option<u64>,
}

/// Sobol quasi-random sequence generator.
///
/// Not meant to be shared between threads: drawing advances the index.
/// Each worker builds its own instance, typically positioned with
/// [`SobolSequence::skip_to`] at the start of its index range.
#[derive(Debug, Clone)]
pub struct SobolSequence {
    dimension: usize,
    index: u64,
    seed: Option<u64>,
    int_sequence: Vec<u64>,
    direction_numbers: Vec<[u64; BITS]>,
    shift: Vec<u64>,
}

impl SobolSequence {
    /// Plain (unscrambled) sequence of the given dimension.
    pub fn new(dimension: usize) -> Result<Self> {
        Self::from_state(dimension, SobolState::default())
    }

    /// Digitally shifted sequence; the shift for each dimension is drawn
    /// from a Mersenne Twister seeded with `seed`.
    pub fn scrambled(dimension: usize, seed: u64) -> Result<Self> {
        Self::from_state(
            dimension,
            SobolState {
                index: 0,
                seed: Some(seed),
            },
        )
    }

    /// Rebuild a sequence positioned at `state`.
    pub fn from_state(dimension: usize, state: SobolState) -> Result<Self> {
        ensure_config!(
            (1..=MAX_DIMENSION).contains(&dimension),
            "dimension",
            "Sobol dimension must be in [1, {MAX_DIMENSION}], got {dimension}"
        );

        let shift = match state.seed {
            Some(seed) => {
                let mut mt = Mt19937GenRand64::new(seed);
                (0..dimension).map(|_| mt.next_u64()).collect()
            }
            None => vec![0; dimension],
        };

        let mut seq = Self {
            dimension,
            index: 0,
            seed: state.seed,
            int_sequence: vec![0; dimension],
            direction_numbers: init_direction_numbers(dimension),
            shift,
        };
        seq.skip_to(state.index);
        Ok(seq)
    }

    /// Dimension of the generated points.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of points drawn so far.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Current position, suitable for [`SobolSequence::from_state`].
    pub fn state(&self) -> SobolState {
        SobolState {
            index: self.index,
            seed: self.seed,
        }
    }

    /// Rewind to the start; the same points are produced again.
    pub fn reset(&mut self) {
        self.skip_to(0);
    }

    /// Position the sequence so that the next draw is point `index + 1`.
    pub fn skip_to(&mut self, index: u64) {
        let gray = index ^ (index >> 1);
        for (value, dirs) in self.int_sequence.iter_mut().zip(&self.direction_numbers) {
            *value = xor_directions(dirs, gray);
        }
        self.index = index;
    }

    /// Advance by one point and write it into `out` (length = dimension).
    pub fn next_into(&mut self, out: &mut [Real]) {
        debug_assert_eq!(out.len(), self.dimension);
        self.index += 1;
        let c = self.index.trailing_zeros() as usize;
        for (((value, dirs), shift), u) in self
            .int_sequence
            .iter_mut()
            .zip(&self.direction_numbers)
            .zip(&self.shift)
            .zip(out.iter_mut())
        {
            *value ^= dirs[c];
            *u = to_unit(*value ^ shift);
        }
    }

    /// Advance by one point and return it.
    pub fn next_point(&mut self) -> Vec<Real> {
        let mut out = vec![0.0; self.dimension];
        self.next_into(&mut out);
        out
    }

    /// Point number `index` of the sequence without touching the state.
    ///
    /// `point_at(n)` equals the `n`-th value returned by `next_into` after a
    /// reset; `point_at(0)` is the origin (shifted, if scrambled).
    pub fn point_at(&self, index: u64, out: &mut [Real]) {
        debug_assert_eq!(out.len(), self.dimension);
        let gray = index ^ (index >> 1);
        for ((dirs, shift), u) in self
            .direction_numbers
            .iter()
            .zip(&self.shift)
            .zip(out.iter_mut())
        {
            *u = to_unit(xor_directions(dirs, gray) ^ shift);
        }
    }
}

/// Map the top 53 bits to the centre of their dyadic cell, so 0 and 1 are
/// never returned.
#[inline]
fn to_unit(v: u64) -> Real {
    const SCALE: Real = 1.0 / (1u64 << 53) as Real;
    ((v >> 11) as Real + 0.5) * SCALE
}

#[inline]
fn xor_directions(dirs: &[u64; BITS], mut bits: u64) -> u64 {
    let mut acc = 0;
    while bits != 0 {
        let k = bits.trailing_zeros() as usize;
        acc ^= dirs[k];
        bits &= bits - 1;
    }
    acc
}

fn init_direction_numbers(dimension: usize) -> Vec<[u64; BITS]> {
    let mut dn = Vec::with_capacity(dimension);

    // Dimension 0: van der Corput (base 2)
    let mut vdc = [0u64; BITS];
    for (i, v) in vdc.iter_mut().enumerate() {
        *v = 1u64 << (BITS - 1 - i);
    }
    dn.push(vdc);

    for &(degree, poly, initial) in JOE_KUO.iter().take(dimension - 1) {
        let mut v = [0u64; BITS];
        for (i, &m) in initial.iter().enumerate() {
            v[i] = m << (BITS - 1 - i);
        }
        for i in degree..BITS {
            v[i] = v[i - degree] ^ (v[i - degree] >> degree);
            for k in 1..degree {
                if (poly >> (degree - 1 - k)) & 1 == 1 {
                    v[i] ^= v[i - k];
                }
            }
        }
        dn.push(v);
    }

    dn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_point_is_one_half_in_every_dimension() {
        let mut s = SobolSequence::new(MAX_DIMENSION).unwrap();
        for u in s.next_point() {
            assert!((u - 0.5).abs() < 1e-15, "u = {u}");
        }
    }

    #[test]
    fn dimension_1_is_van_der_corput_in_gray_order() {
        let mut s = SobolSequence::new(1).unwrap();
        let expected = [0.5, 0.75, 0.25, 0.375, 0.875, 0.625, 0.125];
        for &e in &expected {
            let u = s.next_point()[0];
            assert!((u - e).abs() < 1e-15, "got {u}, expected {e}");
        }
    }

    #[test]
    fn points_stay_strictly_inside_unit_cube() {
        let mut s = SobolSequence::scrambled(16, 7).unwrap();
        for _ in 0..4096 {
            for u in s.next_point() {
                assert!(u > 0.0 && u < 1.0, "u = {u}");
            }
        }
    }

    #[test]
    fn reset_reproduces_sequence() {
        let mut s = SobolSequence::scrambled(8, 42).unwrap();
        let first: Vec<Vec<Real>> = (0..100).map(|_| s.next_point()).collect();
        s.reset();
        let second: Vec<Vec<Real>> = (0..100).map(|_| s.next_point()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn point_at_matches_sequential_draws() {
        let mut s = SobolSequence::new(5).unwrap();
        let mut direct = vec![0.0; 5];
        for n in 1..=300u64 {
            let p = s.next_point();
            s.point_at(n, &mut direct);
            assert_eq!(p, direct, "mismatch at index {n}");
        }
    }

    #[test]
    fn state_forks_identical_sub_streams() {
        let mut a = SobolSequence::scrambled(3, 11).unwrap();
        for _ in 0..57 {
            a.next_point();
        }
        let mut b = SobolSequence::from_state(3, a.state()).unwrap();
        for _ in 0..50 {
            assert_eq!(a.next_point(), b.next_point());
        }
    }

    #[test]
    fn every_dimension_is_stratified() {
        // The first 2^k points of each coordinate hit every cell of width 2^-k once.
        let k = 8;
        let n = 1usize << k;
        let s = SobolSequence::new(MAX_DIMENSION).unwrap();
        let mut point = vec![0.0; MAX_DIMENSION];
        let mut hits = vec![vec![false; n]; MAX_DIMENSION];
        for i in 0..n as u64 {
            s.point_at(i, &mut point);
            for (d, &u) in point.iter().enumerate() {
                let cell = (u * n as Real) as usize;
                assert!(!hits[d][cell], "dimension {d} hits cell {cell} twice");
                hits[d][cell] = true;
            }
        }
    }

    #[test]
    fn low_discrepancy_mean() {
        let mut s = SobolSequence::new(2).unwrap();
        let n = 1 << 12;
        let mut sum = [0.0; 2];
        for _ in 0..n {
            let p = s.next_point();
            sum[0] += p[0];
            sum[1] += p[1];
        }
        for v in sum {
            assert!((v / n as Real - 0.5).abs() < 1e-3);
        }
    }

    #[test]
    fn rejects_unsupported_dimension() {
        assert_eq!(SobolSequence::new(0).unwrap_err().field(), Some("dimension"));
        assert!(SobolSequence::new(MAX_DIMENSION + 1).is_err());
    }
}
