//! Indicator primitives over candle series.
//!
//! Each function returns a series aligned with its input; positions
//! without enough lookback are NaN.

use crate::domain::market::Candle;

/// EMA seeded with the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if n < period || period == 0 {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = seed;

    let mut prev = seed;
    for i in period..n {
        let next = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = next;
        prev = next;
    }

    result
}

/// True range; the first bar uses high - low.
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let range = c.high - c.low;
            match i.checked_sub(1).map(|p| candles[p].close) {
                Some(pc) => range.max((c.high - pc).abs()).max((c.low - pc).abs()),
                None => range,
            }
        })
        .collect()
}

/// Wilder smoothing (alpha = 1/period), seeded with the mean of the
/// first `period` values.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if n < period || period == 0 {
        return result;
    }

    let mut prev = values[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = prev;

    for i in period..n {
        prev = (prev * (period as f64 - 1.0) + values[i]) / period as f64;
        result[i] = prev;
    }

    result
}

/// Average true range with Wilder smoothing.
pub fn atr(candles: &[Candle], period: usize) -> Vec<f64> {
    wilder_smooth(&true_range(candles), period)
}

/// RSI with Wilder-smoothed gains and losses.
/// avg_loss == 0 → 100; avg_gain == 0 → 0.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period + 1 {
        return result;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = changes.iter().map(|c| c.max(0.0)).collect();
    let losses: Vec<f64> = changes.iter().map(|c| (-c).max(0.0)).collect();

    let avg_gain = wilder_smooth(&gains, period);
    let avg_loss = wilder_smooth(&losses, period);

    for i in (period - 1)..changes.len() {
        result[i + 1] = rsi_value(avg_gain[i], avg_loss[i]);
    }

    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Least-squares slope of `values` against their index.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n_f;

    let (cov, var) = values.iter().enumerate().fold((0.0, 0.0), |(cov, var), (i, y)| {
        let dx = i as f64 - mean_x;
        (cov + dx * (y - mean_y), var + dx * dx)
    });

    cov / var
}

/// Last finite value of a series.
pub fn last(series: &[f64]) -> Option<f64> {
    series.last().copied().filter(|v| v.is_finite())
}
