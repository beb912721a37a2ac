//! Checks shared by every engine's parameter validation.

use fb_core::{ensure_config, Real, Result, Time};
use fb_termstructures::Curve;

/// Contract and market fields common to all engines.
pub(crate) fn validate_contract(
    spot: Real,
    strike: Real,
    maturity: Time,
    rate: &Curve,
    dividend: &Curve,
    vol: &Curve,
) -> Result<()> {
    ensure_config!(spot > 0.0 && spot.is_finite(), "spot", "spot must be positive, got {spot}");
    ensure_config!(
        strike > 0.0 && strike.is_finite(),
        "strike",
        "strike must be positive, got {strike}"
    );
    ensure_config!(
        maturity > 0.0 && maturity.is_finite(),
        "maturity",
        "maturity must be positive, got {maturity}"
    );
    let (r_lo, r_hi) = rate.range();
    ensure_config!(r_lo.is_finite() && r_hi.is_finite(), "rate", "rate curve must be finite");
    let (q_lo, q_hi) = dividend.range();
    ensure_config!(
        q_lo.is_finite() && q_hi.is_finite(),
        "dividend",
        "dividend curve must be finite"
    );
    let (v_lo, v_hi) = vol.range();
    ensure_config!(
        v_lo > 0.0 && v_hi.is_finite(),
        "vol",
        "volatility must be positive and finite, got range [{v_lo}, {v_hi}]"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fb_termstructures::PiecewiseConstant;

    #[test]
    fn names_the_offending_field() {
        let flat = |x| Curve::from(x);
        let ok = validate_contract(100.0, 100.0, 1.0, &flat(0.05), &flat(0.0), &flat(0.2));
        assert!(ok.is_ok());
        let cases = [
            (validate_contract(0.0, 100.0, 1.0, &flat(0.05), &flat(0.0), &flat(0.2)), "spot"),
            (validate_contract(100.0, -1.0, 1.0, &flat(0.05), &flat(0.0), &flat(0.2)), "strike"),
            (validate_contract(100.0, 100.0, 0.0, &flat(0.05), &flat(0.0), &flat(0.2)), "maturity"),
            (validate_contract(100.0, 100.0, 1.0, &flat(Real::NAN), &flat(0.0), &flat(0.2)), "rate"),
            (validate_contract(100.0, 100.0, 1.0, &flat(0.05), &flat(0.0), &flat(0.0)), "vol"),
        ];
        for (res, field) in cases {
            assert_eq!(res.unwrap_err().field(), Some(field));
        }
        let vol = Curve::from(PiecewiseConstant::new(vec![0.5, 1.0], vec![0.2, -0.1]).unwrap());
        let err = validate_contract(100.0, 100.0, 1.0, &flat(0.05), &flat(0.0), &vol).unwrap_err();
        assert_eq!(err.field(), Some("vol"));
    }
}
