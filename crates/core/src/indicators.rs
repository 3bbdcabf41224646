//! Pure technical-indicator math over a close-price series.
//!
//! All functions take closes in chronological ascending order (oldest
//! first); "trailing N" means the most recent N values. Insufficient
//! history yields `None` or empty sets, never an error.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const RSI_LENGTH: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_MULTIPLIER: f64 = 2.0;
const SR_MIN_LEN: usize = 10;
const SR_WINDOW: usize = 60;
const TREND_MIN_LEN: usize = 5;
const TREND_WINDOW: usize = 30;
const TREND_BAND_PCT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub hist: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Sideways,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Sideways => "sideways",
        }
    }
}

/// Wilder's RSI. Needs `length + 1` closes; average loss of exactly zero
/// maps to 100.
pub fn rsi(closes: &[f64], length: usize) -> Option<f64> {
    if length == 0 || closes.len() <= length {
        return None;
    }

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for i in 1..=length {
        let delta = closes[i] - closes[i - 1];
        if delta >= 0.0 {
            gain_sum += delta;
        } else {
            loss_sum += -delta;
        }
    }

    let len = length as f64;
    let mut avg_gain = gain_sum / len;
    let mut avg_loss = loss_sum / len;

    for i in (length + 1)..closes.len() {
        let delta = closes[i] - closes[i - 1];
        avg_gain = (avg_gain * (len - 1.0) + delta.max(0.0)) / len;
        avg_loss = (avg_loss * (len - 1.0) + (-delta).max(0.0)) / len;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// EMA seeded with the first value, `alpha = 2 / (period + 1)`. Returns one
/// output per input.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let first = match values.first() {
        Some(&v) => v,
        None => return Vec::new(),
    };

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = first;
    out.push(prev);
    for &value in &values[1..] {
        let next = value * alpha + prev * (1.0 - alpha);
        out.push(next);
        prev = next;
    }
    out
}

/// Needs `slow + signal` closes. Histogram is last MACD minus last signal.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if closes.len() < slow + signal {
        return None;
    }

    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);
    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema(&macd_line, signal);

    let macd_last = *macd_line.last()?;
    let signal_last = *signal_line.last()?;
    Some(Macd {
        macd: macd_last,
        signal: signal_last,
        hist: macd_last - signal_last,
    })
}

/// Mean ± multiplier·stddev over the trailing `period` closes, population
/// standard deviation.
pub fn bollinger(closes: &[f64], period: usize, multiplier: f64) -> Option<BollingerBands> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    Some(BollingerBands {
        upper: mean + multiplier * stddev,
        middle: mean,
        lower: mean - multiplier * stddev,
    })
}

/// Percentile picks over the sorted trailing 60 closes: {10%, 25%} as
/// support, {75%, 90%} as resistance. Values are sampled from the input,
/// not interpolated. Fewer than 10 closes yields empty sets.
pub fn support_resistance(closes: &[f64]) -> SupportResistance {
    if closes.len() < SR_MIN_LEN {
        return SupportResistance::default();
    }

    let mut sorted: Vec<f64> = trailing(closes, SR_WINDOW)
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    if sorted.is_empty() {
        return SupportResistance::default();
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    SupportResistance {
        support: percentile_picks(&sorted, &[0.10, 0.25]),
        resistance: percentile_picks(&sorted, &[0.75, 0.90]),
    }
}

fn percentile_picks(sorted: &[f64], percentiles: &[f64]) -> Vec<f64> {
    let max_idx = sorted.len() - 1;
    let mut out = Vec::with_capacity(percentiles.len());
    for &p in percentiles {
        let idx = ((max_idx as f64) * p).round() as usize;
        let value = sorted[idx.min(max_idx)];
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Percent change across the trailing 30 closes; beyond ±5% classifies as
/// up/down. Fewer than 5 closes, or a zero window start, is sideways.
pub fn trend(closes: &[f64]) -> Trend {
    if closes.len() < TREND_MIN_LEN {
        return Trend::Sideways;
    }

    let window = trailing(closes, TREND_WINDOW);
    let start = window[0];
    let end = window[window.len() - 1];
    if start == 0.0 {
        return Trend::Sideways;
    }

    let change = (end - start) / start.abs() * 100.0;
    if change > TREND_BAND_PCT {
        Trend::Up
    } else if change < -TREND_BAND_PCT {
        Trend::Down
    } else {
        Trend::Sideways
    }
}

fn trailing(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}
