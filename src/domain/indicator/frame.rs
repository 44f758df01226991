//! Indicator series aligned to one price series, keyed by indicator identity.

use std::collections::{BTreeSet, HashMap};

use crate::domain::error::GravionError;
use crate::domain::indicator::{bollinger, macd, rsi, IndicatorField, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Series;

/// Parameters of the standard screening frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSpec {
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_mult_x100: u32,
}

impl Default for FrameSpec {
    fn default() -> Self {
        FrameSpec {
            sma_fast: 50,
            sma_slow: 100,
            rsi_period: rsi::DEFAULT_PERIOD,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
            bollinger_period: bollinger::DEFAULT_PERIOD,
            bollinger_mult_x100: bollinger::DEFAULT_MULT_X100,
        }
    }
}

impl FrameSpec {
    pub fn sma_fast_type(&self) -> IndicatorType {
        IndicatorType::Sma(self.sma_fast)
    }

    pub fn sma_slow_type(&self) -> IndicatorType {
        IndicatorType::Sma(self.sma_slow)
    }

    pub fn rsi_type(&self) -> IndicatorType {
        IndicatorType::Rsi(self.rsi_period)
    }

    pub fn macd_type(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.macd_fast,
            slow: self.macd_slow,
            signal: self.macd_signal,
        }
    }

    pub fn bollinger_type(&self) -> IndicatorType {
        IndicatorType::Bollinger {
            period: self.bollinger_period,
            stddev_mult_x100: self.bollinger_mult_x100,
        }
    }

    pub fn types(&self) -> Vec<IndicatorType> {
        vec![
            self.sma_fast_type(),
            self.sma_slow_type(),
            self.rsi_type(),
            self.macd_type(),
            self.bollinger_type(),
        ]
    }
}

/// Computed indicators for one series. Every contained indicator series
/// has exactly `series.len()` points.
#[derive(Debug, Clone)]
pub struct IndicatorFrame<'a> {
    series: &'a Series,
    indicators: HashMap<IndicatorType, IndicatorSeries>,
}

impl<'a> IndicatorFrame<'a> {
    /// Compute each distinct indicator once. Fails on the first indicator
    /// that is malformed or lacks history.
    pub fn compute<I>(series: &'a Series, types: I) -> Result<Self, GravionError>
    where
        I: IntoIterator<Item = IndicatorType>,
    {
        let unique: BTreeSet<IndicatorType> = types.into_iter().collect();
        let mut indicators = HashMap::with_capacity(unique.len());
        for indicator_type in unique {
            let computed = indicator_type.compute(series)?;
            indicators.insert(indicator_type, computed);
        }
        Ok(Self { series, indicators })
    }

    /// A frame with bar fields only.
    pub fn prices_only(series: &'a Series) -> Self {
        Self {
            series,
            indicators: HashMap::new(),
        }
    }

    /// SMA fast/slow, RSI, MACD and Bollinger Bands per `spec`.
    pub fn standard(series: &'a Series, spec: &FrameSpec) -> Result<Self, GravionError> {
        Self::compute(series, spec.types())
    }

    pub fn series(&self) -> &'a Series {
        self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn indicator(&self, indicator_type: &IndicatorType) -> Option<&IndicatorSeries> {
        self.indicators.get(indicator_type)
    }

    /// `None` when the indicator is absent, in warm-up, or out of range.
    pub fn value(
        &self,
        indicator_type: &IndicatorType,
        field: IndicatorField,
        index: usize,
    ) -> Option<f64> {
        self.indicators
            .get(indicator_type)
            .and_then(|s| s.get(index, field))
    }

    pub fn open(&self, index: usize) -> Option<f64> {
        self.series.bars().get(index).map(|b| b.open)
    }

    pub fn close(&self, index: usize) -> Option<f64> {
        self.series.bars().get(index).map(|b| b.close)
    }

    pub fn volume(&self, index: usize) -> Option<f64> {
        self.series.bars().get(index).map(|b| b.volume as f64)
    }
}
