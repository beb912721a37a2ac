//! Analytic European option pricing (Black-Scholes-Merton).
//!
//! Closed-form price and first/second-order Greeks with flat rate,
//! dividend yield and volatility. Used as the reference the numerical
//! engines are checked against; none of them call it.

use fb_core::{OptionType, Rate, Real, Time, Volatility};
use fb_math::distributions::{normal_cdf, normal_pdf};
use serde::{Deserialize, Serialize};

/// Price and sensitivities of a European option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlackScholesGreeks {
    /// Present value.
    pub price: Real,
    /// ∂V/∂S.
    pub delta: Real,
    /// ∂²V/∂S².
    pub gamma: Real,
    /// ∂V/∂σ per unit of volatility.
    pub vega: Real,
    /// ∂V/∂t per year of calendar time.
    pub theta: Real,
    /// ∂V/∂r per unit of rate.
    pub rho: Real,
}

/// Black-Scholes-Merton price and Greeks.
///
/// $$C = S e^{-qT} N(d_1) - K e^{-rT} N(d_2)$$
/// $$P = K e^{-rT} N(-d_2) - S e^{-qT} N(-d_1)$$
///
/// where $d_{1,2} = \frac{\ln(S/K) + (r - q \pm \sigma^2/2)T}{\sigma\sqrt{T}}$.
///
/// At or after expiry the intrinsic value is returned with zero Greeks.
/// A vanishing total volatility gives the discounted forward intrinsic.
pub fn black_scholes_merton(
    option_type: OptionType,
    spot: Real,
    strike: Real,
    rate: Rate,
    dividend: Rate,
    vol: Volatility,
    time: Time,
) -> BlackScholesGreeks {
    let phi = option_type.sign();
    if time <= 0.0 {
        return BlackScholesGreeks {
            price: option_type.intrinsic(spot, strike),
            delta: 0.0,
            gamma: 0.0,
            vega: 0.0,
            theta: 0.0,
            rho: 0.0,
        };
    }

    let sqrt_t = time.sqrt();
    let std_dev = vol * sqrt_t;
    let df_r = (-rate * time).exp();
    let df_q = (-dividend * time).exp();

    let (d1, d2) = if std_dev > 1e-15 {
        let d1 = ((spot / strike).ln() + (rate - dividend) * time) / std_dev + 0.5 * std_dev;
        (d1, d1 - std_dev)
    } else {
        let forward_itm = spot * df_q > strike * df_r;
        let big = if forward_itm { 1e15 } else { -1e15 };
        (big, big)
    };

    let n1 = normal_cdf(phi * d1);
    let n2 = normal_cdf(phi * d2);
    let pdf1 = normal_pdf(d1);
    let gamma = if std_dev > 1e-15 {
        df_q * pdf1 / (spot * std_dev)
    } else {
        0.0
    };

    BlackScholesGreeks {
        price: phi * (spot * df_q * n1 - strike * df_r * n2),
        delta: phi * df_q * n1,
        gamma,
        vega: spot * df_q * pdf1 * sqrt_t,
        theta: -spot * df_q * pdf1 * vol / (2.0 * sqrt_t) - phi * rate * strike * df_r * n2
            + phi * dividend * spot * df_q * n1,
        rho: phi * strike * time * df_r * n2,
    }
}
