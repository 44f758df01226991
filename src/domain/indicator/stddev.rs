//! Rolling population standard deviation over closing prices.
//!
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n) / n)

/// Population standard deviation of a non-empty window.
pub(crate) fn population_stddev(window: &[f64]) -> f64 {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    variance.sqrt()
}

/// Standard deviation over each full window of `period` values.
pub(crate) fn rolling_stddev(values: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                None
            } else {
                Some(population_stddev(&values[i + 1 - period..=i]))
            }
        })
        .collect()
}
