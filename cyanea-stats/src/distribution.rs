//! Student's t-distribution and the special functions behind it.
//!
//! Correlation p-values are two-tailed t-tests on `n - 2` degrees of freedom,
//! so this module only carries what that needs: [`ln_gamma`], the regularized
//! incomplete beta function [`betai`], and [`StudentT`].

use core::f64::consts::PI;

use cyanea_core::{CyaneaError, Result};

// ── Numerical helpers ──────────────────────────────────────────────────────

/// Natural log of the gamma function via the Lanczos approximation (g=7).
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 8] = [
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];

    if x < 0.5 {
        // Reflection formula: Γ(x) = π / (sin(πx) · Γ(1-x))
        let log_pi_over_sin = (PI / (PI * x).sin()).ln();
        log_pi_over_sin - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut ag = 0.99999999999980993_f64;
        for (i, &c) in COEFFS.iter().enumerate() {
            ag += c / (x + i as f64 + 1.0);
        }
        let t = x + 7.5; // g + 0.5
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + ag.ln()
    }
}

/// Regularized incomplete beta function I_x(a, b) via continued fraction
/// (modified Lentz, at most 300 iterations).
pub fn betai(a: f64, b: f64, x: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&x) {
        return Err(CyaneaError::InvalidInput(format!(
            "betai: x must be in [0, 1], got {x}"
        )));
    }
    if a <= 0.0 || b <= 0.0 {
        return Err(CyaneaError::InvalidInput(format!(
            "betai: shape parameters must be positive (a={a}, b={b})"
        )));
    }
    if x == 0.0 || x == 1.0 {
        return Ok(x);
    }

    // The continued fraction converges fastest below the mean.
    if x > (a + 1.0) / (a + b + 2.0) {
        return Ok(1.0 - betai(b, a, 1.0 - x)?);
    }

    let ln_prefactor =
        ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();

    const TINY: f64 = 1e-300;
    const EPS: f64 = 1e-14;
    const MAX_ITER: usize = 300;

    let clamp = |v: f64| if v.abs() < TINY { TINY } else { v };

    let mut c = 1.0_f64;
    let mut d = clamp(1.0 - (a + b) * x / (a + 1.0)).recip();
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;

        let num_even = m * (b - m) * x / ((a + 2.0 * m - 1.0) * (a + 2.0 * m));
        d = clamp(1.0 + num_even * d).recip();
        c = clamp(1.0 + num_even / c);
        h *= d * c;

        let num_odd = -((a + m) * (a + b + m) * x) / ((a + 2.0 * m) * (a + 2.0 * m + 1.0));
        d = clamp(1.0 + num_odd * d).recip();
        c = clamp(1.0 + num_odd / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }

    Ok((ln_prefactor.exp() * h / a).clamp(0.0, 1.0))
}

// ── Distribution trait ─────────────────────────────────────────────────────

/// A continuous probability distribution.
pub trait Distribution {
    /// Probability density at `x`.
    fn pdf(&self, x: f64) -> f64;

    /// Cumulative distribution function at `x`.
    fn cdf(&self, x: f64) -> f64;

    /// Distribution mean (NaN where undefined).
    fn mean(&self) -> f64;

    /// Distribution variance (NaN or infinity where undefined).
    fn variance(&self) -> f64;
}

// ── Student's t ────────────────────────────────────────────────────────────

/// Student's t-distribution with `df` degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudentT {
    df: f64,
}

impl StudentT {
    /// Create a t-distribution. `df` must be positive.
    pub fn new(df: f64) -> Result<Self> {
        if df.is_nan() || df <= 0.0 {
            return Err(CyaneaError::InvalidInput(format!(
                "StudentT: degrees of freedom must be positive, got {df}"
            )));
        }
        Ok(Self { df })
    }

    /// Degrees of freedom.
    pub fn df(&self) -> f64 {
        self.df
    }

    /// Two-tailed p-value `P(|T| >= |t|)`.
    pub fn two_tailed_p(&self, t: f64) -> f64 {
        if t.is_infinite() {
            return 0.0;
        }
        let x = self.df / (self.df + t * t);
        betai(self.df / 2.0, 0.5, x).unwrap_or(1.0)
    }
}

impl Distribution for StudentT {
    fn pdf(&self, x: f64) -> f64 {
        let v = self.df;
        let ln_norm = ln_gamma((v + 1.0) / 2.0) - ln_gamma(v / 2.0) - 0.5 * (v * PI).ln();
        (ln_norm - (v + 1.0) / 2.0 * (1.0 + x * x / v).ln()).exp()
    }

    fn cdf(&self, x: f64) -> f64 {
        let tail = 0.5 * self.two_tailed_p(x);
        if x >= 0.0 {
            1.0 - tail
        } else {
            tail
        }
    }

    fn mean(&self) -> f64 {
        if self.df > 1.0 {
            0.0
        } else {
            f64::NAN
        }
    }

    fn variance(&self) -> f64 {
        if self.df > 2.0 {
            self.df / (self.df - 2.0)
        } else if self.df > 1.0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
