//! Student's t distribution.
//!
//! CDF and tails are expressed through the regularized incomplete beta
//! function: for `x = df / (df + t^2)`, the two-sided tail mass beyond `|t|`
//! is `I_x(df/2, 1/2)`. Quantiles are found by bracketed bisection on the
//! survival function.

use super::beta::beta_cdf;
use super::normal::{normal_cdf, normal_sf};

const QUANTILE_MAX_ITERS: usize = 300;
const QUANTILE_REL_TOL: f64 = 1e-14;

/// Two-sided tail probability P(|T| >= |t|) for T ~ t(df).
pub fn student_t_two_sided(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    if df.is_infinite() {
        return 2.0 * normal_sf(t.abs());
    }
    let t2 = t * t;
    if t2.is_infinite() {
        return 0.0;
    }
    beta_cdf(df / (df + t2), 0.5 * df, 0.5)
}

/// Survival function P(T > t).
pub fn student_t_sf(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if df.is_infinite() {
        return normal_sf(t);
    }
    let tail = 0.5 * student_t_two_sided(t, df);
    if t > 0.0 {
        tail
    } else {
        1.0 - tail
    }
}

/// CDF P(T <= t).
pub fn student_t_cdf(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if df.is_infinite() {
        return normal_cdf(t);
    }
    let tail = 0.5 * student_t_two_sided(t, df);
    if t > 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Inverse survival function: the `t` with `P(T > t) = p`.
pub fn student_t_isf(p: f64, df: f64) -> f64 {
    if p.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if p <= 0.0 {
        return f64::INFINITY;
    }
    if p >= 1.0 {
        return f64::NEG_INFINITY;
    }
    if p == 0.5 {
        return 0.0;
    }
    if p > 0.5 {
        return -student_t_isf(1.0 - p, df);
    }

    let mut low = 0.0;
    let mut high = 1.0;
    while student_t_sf(high, df) > p {
        low = high;
        high *= 2.0;
        if !high.is_finite() {
            return f64::INFINITY;
        }
    }

    let mut mid = 0.5 * (low + high);
    for _ in 0..QUANTILE_MAX_ITERS {
        mid = 0.5 * (low + high);
        let sf = student_t_sf(mid, df);
        if sf.is_nan() {
            return f64::NAN;
        }
        if sf > p {
            low = mid;
        } else {
            high = mid;
        }
        if high - low <= QUANTILE_REL_TOL * high.max(1e-300) {
            break;
        }
    }
    mid
}

/// Quantile function (inverse CDF).
pub fn student_t_ppf(p: f64, df: f64) -> f64 {
    student_t_isf(1.0 - p, df)
}
