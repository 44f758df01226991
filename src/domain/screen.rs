//! Universe screening: classify, score and filter each symbol at its last bar.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::batch::{build_pool, SymbolFailure};
use super::classifier::{self, CompositeScore, MarketState};
use super::error::GravionError;
use super::filter::Filter;
use super::fundamentals::Fundamentals;
use super::indicator::{FrameSpec, IndicatorField, IndicatorFrame, IndicatorType};
use super::ohlcv::Series;
use super::strategy::{Intensity, Strategy};

pub const MIN_HISTORY_BARS: usize = 100;
/// Trailing zero-volume bars that mark a symbol as suspended.
pub const SUSPENDED_BARS: usize = 5;
pub const STALE_AFTER_HOURS: i64 = 24;
/// Hour of day a daily bar's quote is taken to be published.
const QUOTE_HOUR: i64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreenStatus {
    Ok,
    Stale,
    SkippedSuspended,
    SkippedInsufficientHistory,
}

impl ScreenStatus {
    pub fn is_skipped(self) -> bool {
        matches!(self, ScreenStatus::SkippedSuspended | ScreenStatus::SkippedInsufficientHistory)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenConfig {
    pub frame: FrameSpec,
    pub min_history_bars: usize,
    pub stale_after_hours: i64,
    /// Worker threads; 0 lets rayon choose.
    pub workers: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        ScreenConfig {
            frame: FrameSpec::default(),
            min_history_bars: MIN_HISTORY_BARS,
            stale_after_hours: STALE_AFTER_HOURS,
            workers: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScreenInput {
    pub series: Series,
    pub fundamentals: Option<Fundamentals>,
    /// When the latest quote was received; defaults to the last bar's close.
    pub quote_time: Option<NaiveDateTime>,
    /// Set when the fundamentals fetch failed, as opposed to the source
    /// having none.
    pub fundamentals_error: Option<String>,
}

impl ScreenInput {
    pub fn new(series: Series, fundamentals: Option<Fundamentals>) -> Self {
        Self {
            series,
            fundamentals,
            quote_time: None,
            fundamentals_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenRow {
    pub symbol: String,
    pub status: ScreenStatus,
    pub bars: usize,
    pub last_date: Option<NaiveDate>,
    pub close: Option<f64>,
    pub change_pct: Option<f64>,
    pub signal: Option<Intensity>,
    pub state: Option<MarketState>,
    pub score: Option<CompositeScore>,
    pub sma_fast: Option<f64>,
    pub sma_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub matched_filters: Vec<String>,
    /// Fundamentals could not be fetched; the score has no fundamental part.
    pub fundamentals_error: Option<String>,
}

impl ScreenRow {
    fn skipped(input: &ScreenInput, status: ScreenStatus) -> Self {
        let series = &input.series;
        ScreenRow {
            symbol: series.symbol().to_string(),
            status,
            bars: series.len(),
            last_date: series.last_date(),
            close: series.bars().last().map(|b| b.close),
            change_pct: None,
            signal: None,
            state: None,
            score: None,
            sma_fast: None,
            sma_slow: None,
            rsi: None,
            macd_histogram: None,
            matched_filters: Vec::new(),
            fundamentals_error: input.fundamentals_error.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScreenReport {
    pub rows: Vec<ScreenRow>,
    pub errors: Vec<SymbolFailure>,
}

/// Quote time of a daily bar when the data source reports none.
pub fn default_quote_time(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::hours(QUOTE_HOUR)
}

/// Weekday check only; exchange holidays are not modelled.
pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn is_stale(quote_time: NaiveDateTime, now: NaiveDateTime, max_age_hours: i64) -> bool {
    is_trading_day(now.date()) && now - quote_time > Duration::hours(max_age_hours)
}

fn is_suspended(series: &Series) -> bool {
    let bars = series.bars();
    bars.len() >= SUSPENDED_BARS && bars[bars.len() - SUSPENDED_BARS..].iter().all(|b| b.is_halted())
}

/// Screen one symbol as of `now`.
pub fn screen_symbol(
    input: &ScreenInput,
    config: &ScreenConfig,
    filters: &[Filter],
    signal_strategy: &Strategy,
    now: NaiveDateTime,
) -> Result<ScreenRow, GravionError> {
    let raw = &input.series;
    if is_suspended(raw) {
        debug!(symbol = raw.symbol(), "skipping suspended symbol");
        return Ok(ScreenRow::skipped(input, ScreenStatus::SkippedSuspended));
    }
    if raw.len() < config.min_history_bars {
        debug!(symbol = raw.symbol(), bars = raw.len(), "skipping short history");
        return Ok(ScreenRow::skipped(input, ScreenStatus::SkippedInsufficientHistory));
    }

    let series = raw.carry_forward_halted();
    let spec = &config.frame;
    let mut types = spec.types();
    types.push(IndicatorType::DailyChange);
    types.extend(filters.iter().flat_map(Filter::required_indicators));
    types.extend(signal_strategy.required_indicators());
    let frame = IndicatorFrame::compute(&series, types)?;

    let index = series.len() - 1;
    let last = &series.bars()[index];
    let value = |t: IndicatorType, field| frame.value(&t, field, index);

    let quote_time = input.quote_time.unwrap_or_else(|| default_quote_time(last.date));
    let status = if is_stale(quote_time, now, config.stale_after_hours) {
        ScreenStatus::Stale
    } else {
        ScreenStatus::Ok
    };

    Ok(ScreenRow {
        symbol: series.symbol().to_string(),
        status,
        bars: series.len(),
        last_date: Some(last.date),
        close: Some(last.close),
        change_pct: value(IndicatorType::DailyChange, IndicatorField::Value),
        signal: Some(signal_strategy.intensity(&frame, index)),
        state: Some(classifier::classify(&frame, spec, index)),
        score: Some(classifier::score(
            &frame,
            spec,
            index,
            input.fundamentals.as_ref(),
            last.date,
        )),
        sma_fast: value(spec.sma_fast_type(), IndicatorField::Value),
        sma_slow: value(spec.sma_slow_type(), IndicatorField::Value),
        rsi: value(spec.rsi_type(), IndicatorField::Value),
        macd_histogram: value(spec.macd_type(), IndicatorField::MacdHistogram),
        matched_filters: filters
            .iter()
            .filter(|f| f.matches(&frame, index))
            .map(|f| f.name().to_string())
            .collect(),
        fundamentals_error: input.fundamentals_error.clone(),
    })
}

/// Screen every input on the worker pool; rows keep input order.
pub fn screen_universe(
    inputs: &[ScreenInput],
    config: &ScreenConfig,
    filters: &[Filter],
    signal_strategy: &Strategy,
    now: NaiveDateTime,
) -> Result<ScreenReport, GravionError> {
    let pool = build_pool(config.workers)?;
    let outcomes: Vec<Result<ScreenRow, SymbolFailure>> = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| {
                screen_symbol(input, config, filters, signal_strategy, now).map_err(|e| {
                    warn!(symbol = input.series.symbol(), error = %e, "screen failed");
                    SymbolFailure::new(input.series.symbol(), &e)
                })
            })
            .collect()
    });

    let mut report = ScreenReport::default();
    for outcome in outcomes {
        match outcome {
            Ok(row) => report.rows.push(row),
            Err(failure) => report.errors.push(failure),
        }
    }
    info!(
        symbols = inputs.len(),
        scored = report.rows.iter().filter(|r| !r.status.is_skipped()).count(),
        errors = report.errors.len(),
        "screen complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::builtin_filters;
    use crate::domain::indicator::test_support::series_from_closes;
    use crate::domain::ohlcv::Bar;
    use crate::domain::strategy::BuiltinKind;

    fn rising(n: usize) -> Series {
        let closes: Vec<f64> = (0..n).map(|i| 50.0 + i as f64 * 0.5).collect();
        series_from_closes(&closes)
    }

    fn input(series: Series) -> ScreenInput {
        ScreenInput::new(series, None)
    }

    fn momentum() -> Strategy {
        Strategy::builtin(BuiltinKind::PriceChangeMomentum).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn fresh_now(series: &Series) -> NaiveDateTime {
        default_quote_time(series.last_date().unwrap()) + Duration::hours(1)
    }

    #[test]
    fn ninety_nine_bars_is_skipped() {
        let series = rising(99);
        let now = fresh_now(&series);
        let row = screen_symbol(&input(series), &ScreenConfig::default(), &[], &momentum(), now).unwrap();
        assert_eq!(row.status, ScreenStatus::SkippedInsufficientHistory);
        assert!(row.score.is_none());
    }

    #[test]
    fn hundred_bars_is_scored() {
        let series = rising(100);
        let now = fresh_now(&series);
        let row = screen_symbol(&input(series), &ScreenConfig::default(), &[], &momentum(), now).unwrap();
        assert_eq!(row.status, ScreenStatus::Ok);
        assert!(row.score.is_some());
        assert!(row.sma_slow.is_some());
        assert!(row.rsi.is_some());
    }

    #[test]
    fn trailing_zero_volume_is_suspended() {
        let mut bars = rising(120).bars().to_vec();
        let n = bars.len();
        for bar in &mut bars[n - 5..] {
            bar.volume = 0;
        }
        let series = Series::new("HALT", bars).unwrap();
        let now = fresh_now(&series);
        let row = screen_symbol(&input(series), &ScreenConfig::default(), &[], &momentum(), now).unwrap();
        assert_eq!(row.status, ScreenStatus::SkippedSuspended);
    }

    #[test]
    fn four_halted_bars_are_carried_forward() {
        let mut bars: Vec<Bar> = rising(120).bars().to_vec();
        let n = bars.len();
        let carried = bars[n - 5].close;
        for bar in &mut bars[n - 4..] {
            bar.volume = 0;
            bar.close = 1.0;
        }
        let series = Series::new("PAUSE", bars).unwrap();
        let now = fresh_now(&series);
        let row = screen_symbol(&input(series), &ScreenConfig::default(), &[], &momentum(), now).unwrap();
        assert_eq!(row.status, ScreenStatus::Ok);
        assert_eq!(row.close, Some(carried));
        assert_eq!(row.change_pct, Some(0.0));
    }

    #[test]
    fn stale_only_on_weekdays() {
        // 2024-01-05 is a Friday, 2024-01-06 a Saturday
        let quote = at(2024, 1, 4, 16);
        assert!(is_stale(quote, at(2024, 1, 5, 17), 24));
        assert!(!is_stale(quote, at(2024, 1, 5, 15), 24));
        assert!(!is_stale(quote, at(2024, 1, 6, 17), 24));
    }

    #[test]
    fn stale_rows_are_still_scored() {
        let series = rising(100);
        let now = fresh_now(&series) + Duration::days(3);
        let now = if is_trading_day(now.date()) { now } else { now + Duration::days(2) };
        let row = screen_symbol(&input(series), &ScreenConfig::default(), &[], &momentum(), now).unwrap();
        assert_eq!(row.status, ScreenStatus::Stale);
        assert!(row.score.is_some());
    }

    #[test]
    fn uptrend_matches_trend_filters() {
        let filters: Vec<Filter> = builtin_filters().into_iter().map(|d| Filter::new(d).unwrap()).collect();
        let series = rising(150);
        let now = fresh_now(&series);
        let row = screen_symbol(&input(series), &ScreenConfig::default(), &filters, &momentum(), now).unwrap();
        assert!(row.matched_filters.contains(&"Golden Cross".to_string()));
        assert!(row.matched_filters.contains(&"Strong Momentum".to_string()));
        assert!(!row.matched_filters.contains(&"RSI Oversold".to_string()));
        assert_eq!(row.state, Some(MarketState::Neutral));
    }

    #[test]
    fn universe_keeps_input_order() {
        let a = rising(120);
        let b = rising(50);
        let now = fresh_now(&a);
        let report = screen_universe(
            &[input(a), input(b)],
            &ScreenConfig::default(),
            &[],
            &momentum(),
            now,
        )
        .unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].status, ScreenStatus::Ok);
        assert_eq!(report.rows[1].status, ScreenStatus::SkippedInsufficientHistory);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn configured_pool_gives_identical_report() {
        let inputs = [input(rising(120)), input(rising(130)), input(rising(40))];
        let now = fresh_now(&inputs[0].series);
        let run = |workers| {
            let config = ScreenConfig {
                workers,
                ..ScreenConfig::default()
            };
            screen_universe(&inputs, &config, &[], &momentum(), now).unwrap()
        };
        assert_eq!(run(1), run(3));
    }

    #[test]
    fn failed_fundamentals_are_flagged_on_the_row() {
        let series = rising(120);
        let now = fresh_now(&series);
        let mut broken = input(series);
        broken.fundamentals_error = Some("data source error: timeout".into());

        let row = screen_symbol(&broken, &ScreenConfig::default(), &[], &momentum(), now).unwrap();
        assert_eq!(row.fundamentals_error.as_deref(), Some("data source error: timeout"));
        assert_eq!(row.score.unwrap().fundamental, 0);

        let clean = screen_symbol(&input(rising(120)), &ScreenConfig::default(), &[], &momentum(), now).unwrap();
        assert!(clean.fundamentals_error.is_none());
    }
}
