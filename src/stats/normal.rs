//! Standard normal CDF approximation.

/// 1 / sqrt(2 * pi)
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

const P: f64 = 0.231_641_9;
const B1: f64 = 0.319_381_53;
const B2: f64 = -0.356_563_782;
const B3: f64 = 1.781_477_937;
const B4: f64 = -1.821_255_978;
const B5: f64 = 1.330_274_429;

/// Approximates the standard normal CDF, Phi(x).
///
/// Abramowitz & Stegun 7.1.26, absolute error below 7.5e-8. The formula is
/// evaluated on |x| and mirrored for negative inputs.
pub fn normal_cdf(x: f64) -> f64 {
    let upper = upper_tail(x.abs());
    if x < 0.0 {
        upper
    } else {
        1.0 - upper
    }
}

/// 1 - Phi(x) for x >= 0.
fn upper_tail(x: f64) -> f64 {
    let t = 1.0 / (1.0 + P * x);
    let d = INV_SQRT_2PI * (-x * x / 2.0).exp();
    let poly = t * (B1 + t * (B2 + t * (B3 + t * (B4 + t * B5))));
    d * poly
}

/// Two-tailed p-value for a z-score: 2 * (1 - Phi(|z|)).
///
/// Clamped to [0, 1] since the approximation overshoots by ~1e-8 near
/// zero. NaN in, NaN out.
pub fn two_tailed_p(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    (2.0 * upper_tail(z.abs())).clamp(0.0, 1.0)
}
