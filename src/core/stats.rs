//! Streaming statistics helpers shared by the finalizer, the threshold
//! detector and the best-pixel heuristic.

use num_traits::Float;

/// Mean and population sigma from a running sum and sum of squares.
///
/// Returns NaN for both when `n` is zero. Negative variance from rounding is
/// clamped to zero.
pub fn mean_and_sigma<T: Float>(sum: T, sum_sq: T, n: T) -> (T, T) {
    if n <= T::zero() {
        return (T::nan(), T::nan());
    }
    let mean = sum / n;
    let variance = sum_sq / n - mean * mean;
    (mean, variance.max(T::zero()).sqrt())
}

/// Error of a mean propagated from pre-squared per-observation uncertainties
pub fn propagated_error<T: Float>(sum_sq: T, n: T) -> T {
    if n <= T::zero() {
        return T::nan();
    }
    sum_sq.sqrt() / n
}

/// (a - b) / (a + b), NaN when the denominator vanishes
pub fn normalized_difference<T: Float>(a: T, b: T) -> T {
    let denominator = a + b;
    if denominator == T::zero() {
        T::nan()
    } else {
        (a - b) / denominator
    }
}

/// Mean of the finite values, NaN if there are none
pub fn finite_mean<T: Float>(values: impl IntoIterator<Item = T>) -> T {
    let (sum, n) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((T::zero(), T::zero()), |(sum, n), v| (sum + v, n + T::one()));
    if n > T::zero() {
        sum / n
    } else {
        T::nan()
    }
}
