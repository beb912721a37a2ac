//! `Curve`: the rate/dividend/volatility input accepted by every engine.

use fb_core::{Real, Time};
use serde::{Deserialize, Serialize};

use crate::piecewise_constant::PiecewiseConstant;
use crate::term_structure::TermStructure;

/// A flat level or a piecewise-constant term structure.
///
/// Deserialises from a bare number or from `{"times": [...], "values": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Curve {
    /// The same value at every time.
    Flat(Real),
    /// A step function of time.
    Piecewise(PiecewiseConstant),
}

impl Curve {
    /// `Some(level)` for a flat curve.
    pub fn as_flat(&self) -> Option<Real> {
        match self {
            Curve::Flat(v) => Some(*v),
            Curve::Piecewise(_) => None,
        }
    }

    /// Smallest and largest value the curve can return.
    pub fn range(&self) -> (Real, Real) {
        match self {
            Curve::Flat(v) => (*v, *v),
            Curve::Piecewise(pc) => pc.range(),
        }
    }

    /// The same curve with every value shifted by `bump`.
    pub fn shifted(&self, bump: Real) -> Curve {
        match self {
            Curve::Flat(v) => Curve::Flat(v + bump),
            Curve::Piecewise(pc) => {
                let values = pc.values().iter().map(|v| v + bump).collect();
                // knots are unchanged, so the shifted curve stays valid
                match PiecewiseConstant::new(pc.times().to_vec(), values) {
                    Ok(shifted) => Curve::Piecewise(shifted),
                    Err(_) => Curve::Piecewise(pc.clone()),
                }
            }
        }
    }
}

impl Default for Curve {
    fn default() -> Self {
        Curve::Flat(0.0)
    }
}

impl From<Real> for Curve {
    fn from(v: Real) -> Self {
        Curve::Flat(v)
    }
}

impl From<PiecewiseConstant> for Curve {
    fn from(pc: PiecewiseConstant) -> Self {
        Curve::Piecewise(pc)
    }
}

impl TermStructure for Curve {
    fn value(&self, t: Time) -> Real {
        match self {
            Curve::Flat(v) => *v,
            Curve::Piecewise(pc) => pc.value(t),
        }
    }

    fn integral(&self, t0: Time, t1: Time) -> Real {
        match self {
            Curve::Flat(v) => v * (t1 - t0),
            Curve::Piecewise(pc) => pc.integral(t0, t1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn flat_curve_discount() {
        let c = Curve::from(0.05);
        assert_eq!(c.value(3.0), 0.05);
        assert_relative_eq!(c.discount(0.0, 2.0), (-0.1f64).exp(), epsilon = 1e-15);
        assert_eq!(c.as_flat(), Some(0.05));
    }

    #[test]
    fn shifted_piecewise_keeps_knots() {
        let pc = PiecewiseConstant::new(vec![1.0, 2.0], vec![0.2, 0.3]).unwrap();
        let bumped = Curve::from(pc).shifted(0.01);
        assert_relative_eq!(bumped.value(0.5), 0.21, epsilon = 1e-15);
        assert_relative_eq!(bumped.value(1.5), 0.31, epsilon = 1e-15);
        assert_eq!(bumped.as_flat(), None);
    }

    #[test]
    fn deserialises_number_or_knots() {
        let flat: Curve = serde_json::from_str("0.2").unwrap();
        assert_eq!(flat, Curve::Flat(0.2));
        let stepped: Curve = serde_json::from_str(r#"{"times":[1.0,2.0],"values":[0.3,0.4]}"#).unwrap();
        assert_eq!(stepped.value(1.5), 0.4);
        let bad = serde_json::from_str::<Curve>(r#"{"times":[2.0,1.0],"values":[0.1,0.2]}"#);
        assert!(bad.is_err());
    }
}
