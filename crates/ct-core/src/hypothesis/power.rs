//! Power analysis for the two-sided independent two-sample t-test.
//!
//! With group sizes `n1` and `n2 = ratio * n1`:
//!
//! ```text
//! nobs  = 1 / (1/n1 + 1/n2)
//! df    = n1 + n2 - 2
//! nc    = d * sqrt(nobs)
//! crit  = t_isf(alpha / 2, df)
//! power = nct_sf(crit, df, nc) + nct_cdf(-crit, df, nc)
//! ```

use ct_math::{noncentral_t_cdf, noncentral_t_sf, student_t_isf};

/// Largest group-A size the sample-size search will consider.
pub const MAX_SEARCH_NOBS: f64 = 1.0e9;

const BISECTION_MAX_ITERS: usize = 200;
const BISECTION_REL_TOL: f64 = 1e-10;

/// Achieved power for effect size `effect_size`, group-A size `nobs1`, and
/// `ratio = n2 / n1`. NaN when the inputs admit no answer.
pub fn ttest_ind_power(effect_size: f64, nobs1: f64, alpha: f64, ratio: f64) -> f64 {
    if !effect_size.is_finite() || !nobs1.is_finite() || !ratio.is_finite() || ratio <= 0.0 {
        return f64::NAN;
    }
    let nobs2 = nobs1 * ratio;
    let df = nobs1 + nobs2 - 2.0;
    if nobs1 <= 0.0 || df <= 0.0 {
        return f64::NAN;
    }
    let nobs = 1.0 / (1.0 / nobs1 + 1.0 / nobs2);
    let nc = effect_size * nobs.sqrt();
    let crit = student_t_isf(alpha / 2.0, df);
    let power = noncentral_t_sf(crit, df, nc) + noncentral_t_cdf(-crit, df, nc);
    power.clamp(0.0, 1.0)
}

/// Smallest real group-A size `n1 >= 2` reaching `target_power`, holding
/// `ratio = n2 / n1` fixed.
///
/// `None` when the effect size is zero or non-finite, or when even
/// [`MAX_SEARCH_NOBS`] falls short.
pub fn required_nobs1(effect_size: f64, alpha: f64, target_power: f64, ratio: f64) -> Option<f64> {
    if !effect_size.is_finite() || effect_size == 0.0 || !ratio.is_finite() || ratio <= 0.0 {
        return None;
    }
    let power_at = |n: f64| ttest_ind_power(effect_size, n, alpha, ratio);

    let mut lo = 2.0;
    if power_at(lo) >= target_power {
        return Some(lo);
    }
    let mut hi = 4.0;
    loop {
        let p = power_at(hi);
        if p.is_nan() {
            return None;
        }
        if p >= target_power {
            break;
        }
        if hi >= MAX_SEARCH_NOBS {
            return None;
        }
        lo = hi;
        hi = (hi * 2.0).min(MAX_SEARCH_NOBS);
    }

    for _ in 0..BISECTION_MAX_ITERS {
        let mid = 0.5 * (lo + hi);
        if power_at(mid) >= target_power {
            hi = mid;
        } else {
            lo = mid;
        }
        if hi - lo <= BISECTION_REL_TOL * hi {
            break;
        }
    }
    Some(hi)
}
