//! Integer aggregate math shared by the practice and exam statistics.
//!
//! Every helper rounds half up, which matches rounding of the non-negative
//! values these aggregates carry.

/// Divides `numerator` by `denominator` rounding half up. Zero denominators yield zero.
///
/// Works in `u128`; no pair of `u64` operands can overflow it.
fn rounded_div(numerator: u128, denominator: u128) -> u128 {
    if denominator == 0 {
        return 0;
    }
    (numerator * 2 + denominator) / (denominator * 2)
}

/// Percentage of `correct` over `attempts`, rounded to the nearest integer.
pub fn running_rate(correct: u64, attempts: u64) -> u32 {
    let rate = rounded_div(u128::from(correct) * 100, u128::from(attempts));
    u32::try_from(rate).unwrap_or(u32::MAX)
}

/// Folds `new_value` into a mean over `prior_count` samples without storing the samples.
///
/// The result is re-rounded on every call, so long histories drift away from
/// a mean recomputed from scratch.
pub fn running_mean(prior_mean: u32, prior_count: u32, new_value: u32) -> u32 {
    let total = u128::from(prior_mean) * u128::from(prior_count) + u128::from(new_value);
    let mean = rounded_div(total, u128::from(prior_count) + 1);
    u32::try_from(mean).unwrap_or(u32::MAX)
}

pub fn max_score(prior: u32, current: u32) -> u32 {
    prior.max(current)
}

/// Rounded mean of `total` over `count`, zero when nothing was counted.
pub fn average(total: u64, count: u64) -> u64 {
    let mean = rounded_div(u128::from(total), u128::from(count));
    u64::try_from(mean).unwrap_or(u64::MAX)
}
