//! Black-Scholes valuation and delta for European calls and puts.
//!
//! Rate and volatility are fixed at construction; every call supplies the
//! underlying price, strike and time to expiry. Inputs are checked on every
//! call and rejected rather than clamped.
//!
//! Boundaries:
//! - T = 0: value is intrinsic, delta is the moneyness indicator
//!   (call 1 if S > K else 0, put -1 if S < K else 0)
//! - S = 0: call is worthless with zero delta, put is worth K*e^(-rT) with
//!   delta -1

use statrs::distribution::{ContinuousCDF, Normal};

use super::PricingError;

/// Black-Scholes pricer with a fixed rate and volatility.
#[derive(Debug, Clone, Copy)]
pub struct BlackScholes {
    /// Risk-free interest rate (continuously compounded).
    pub rate: f64,
    /// Volatility of the underlying, in the same time unit as expiry.
    pub volatility: f64,
    normal: Normal,
}

impl BlackScholes {
    pub fn new(rate: f64, volatility: f64) -> Self {
        Self {
            rate,
            volatility,
            normal: Normal::standard(),
        }
    }

    fn check_inputs(&self, spot: f64, strike: f64, time: f64) -> Result<(), PricingError> {
        let checks = [
            ("volatility", self.volatility, self.volatility > 0.0),
            ("rate", self.rate, self.rate.is_finite()),
            ("strike", strike, strike > 0.0),
            ("time_to_expiry", time, time >= 0.0),
            ("spot", spot, spot >= 0.0),
        ];

        for (name, value, valid) in checks {
            if !valid || !value.is_finite() {
                return Err(PricingError::InvalidModelParameter { name, value });
            }
        }
        Ok(())
    }

    /// Calculate d1 parameter. Only valid for T > 0 and S > 0.
    fn d1(&self, spot: f64, strike: f64, time: f64) -> f64 {
        let vol = self.volatility;
        let numerator = (spot / strike).ln() + (self.rate + 0.5 * vol * vol) * time;
        numerator / (vol * time.sqrt())
    }

    /// Calculate d2 parameter.
    fn d2(&self, spot: f64, strike: f64, time: f64) -> f64 {
        self.d1(spot, strike, time) - self.volatility * time.sqrt()
    }

    fn norm_cdf(&self, x: f64) -> f64 {
        self.normal.cdf(x)
    }

    fn discount(&self, time: f64) -> f64 {
        (-self.rate * time).exp()
    }

    fn finite(quantity: &'static str, value: f64) -> Result<f64, PricingError> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(PricingError::NonFiniteResult { quantity, value })
        }
    }

    /// Calculate call option value.
    pub fn call_value(&self, spot: f64, strike: f64, time: f64) -> Result<f64, PricingError> {
        self.check_inputs(spot, strike, time)?;

        if time == 0.0 {
            return Ok((spot - strike).max(0.0));
        }
        if spot == 0.0 {
            return Ok(0.0);
        }

        let d1 = self.d1(spot, strike, time);
        let d2 = self.d2(spot, strike, time);
        let value = spot * self.norm_cdf(d1) - strike * self.discount(time) * self.norm_cdf(d2);

        Self::finite("call_value", value)
    }

    /// Calculate put option value.
    pub fn put_value(&self, spot: f64, strike: f64, time: f64) -> Result<f64, PricingError> {
        self.check_inputs(spot, strike, time)?;

        if time == 0.0 {
            return Ok((strike - spot).max(0.0));
        }
        if spot == 0.0 {
            return Ok(strike * self.discount(time));
        }

        let d1 = self.d1(spot, strike, time);
        let d2 = self.d2(spot, strike, time);
        let value = strike * self.discount(time) * self.norm_cdf(-d2) - spot * self.norm_cdf(-d1);

        Self::finite("put_value", value)
    }

    /// Calculate call delta, in [0, 1].
    pub fn call_delta(&self, spot: f64, strike: f64, time: f64) -> Result<f64, PricingError> {
        self.check_inputs(spot, strike, time)?;

        if time == 0.0 {
            return Ok(if spot > strike { 1.0 } else { 0.0 });
        }
        if spot == 0.0 {
            return Ok(0.0);
        }

        let delta = self.norm_cdf(self.d1(spot, strike, time));
        Self::finite("call_delta", delta)
    }

    /// Calculate put delta, in [-1, 0].
    pub fn put_delta(&self, spot: f64, strike: f64, time: f64) -> Result<f64, PricingError> {
        self.check_inputs(spot, strike, time)?;

        if time == 0.0 {
            return Ok(if spot < strike { -1.0 } else { 0.0 });
        }
        if spot == 0.0 {
            return Ok(-1.0);
        }

        let delta = self.norm_cdf(self.d1(spot, strike, time)) - 1.0;
        Self::finite("put_delta", delta)
    }
}
