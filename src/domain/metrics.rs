//! Performance metrics for a backtest run.
//!
//! Returns, win rate and drawdown are expressed in percent. Drawdown is
//! reported as a value `<= 0`. Profit factor is capped at
//! [`PROFIT_FACTOR_SENTINEL`] when there are winners and no losers.

use serde::Serialize;

use super::portfolio::EquityPoint;
use super::position::ClosedTrade;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Profit factor reported when gross loss is zero but gross profit is not.
pub const PROFIT_FACTOR_SENTINEL: f64 = 999.99;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return_pct: f64,
    pub win_rate_pct: f64,
    pub profit_factor: f64,
    pub max_drawdown_pct: f64,
    pub stats: TradeStats,
}

/// Secondary statistics, reported alongside the headline metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeStats {
    pub annualized_return_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Longest run of bars spent below a prior equity peak.
    pub max_drawdown_bars: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_days: f64,
}

impl Metrics {
    pub fn compute(
        initial_capital: f64,
        equity_curve: &[EquityPoint],
        trades: &[ClosedTrade],
        risk_free_rate: f64,
    ) -> Self {
        let final_equity = equity_curve.last().map_or(initial_capital, |p| p.equity);
        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let years = equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown_pct, max_drawdown_bars) = compute_drawdown(initial_capital, equity_curve);
        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, daily_rf);

        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for &pnl in &pnls {
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
        }

        let avg_holding_days = if trades.is_empty() {
            0.0
        } else {
            trades.iter().map(ClosedTrade::holding_days).sum::<i64>() as f64 / trades.len() as f64
        };

        Metrics {
            total_return_pct: total_return * 100.0,
            win_rate_pct: win_rate_pct(&pnls),
            profit_factor: profit_factor(&pnls),
            max_drawdown_pct,
            stats: TradeStats {
                annualized_return_pct: annualized_return * 100.0,
                sharpe_ratio,
                sortino_ratio,
                max_drawdown_bars,
                total_trades: trades.len(),
                trades_won,
                trades_lost,
                trades_breakeven,
                avg_win: if trades_won > 0 { total_wins / trades_won as f64 } else { 0.0 },
                avg_loss: if trades_lost > 0 { total_losses / trades_lost as f64 } else { 0.0 },
                largest_win,
                largest_loss,
                avg_holding_days,
            },
        }
    }
}

/// Percentage of closed trades with positive pnl; 0 when there are none.
pub fn win_rate_pct(pnls: &[f64]) -> f64 {
    if pnls.is_empty() {
        return 0.0;
    }
    let wins = pnls.iter().filter(|&&p| p > 0.0).count();
    wins as f64 / pnls.len() as f64 * 100.0
}

/// Gross profit over gross loss.
pub fn profit_factor(pnls: &[f64]) -> f64 {
    let gross_win: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
    if gross_loss > 0.0 {
        gross_win / gross_loss
    } else if gross_win > 0.0 {
        PROFIT_FACTOR_SENTINEL
    } else {
        0.0
    }
}

/// Largest peak-to-trough decline in percent (`<= 0`), peak seeded with the
/// starting capital.
pub fn max_drawdown_pct(initial_capital: f64, equity_curve: &[EquityPoint]) -> f64 {
    compute_drawdown(initial_capital, equity_curve).0
}

fn compute_drawdown(initial_capital: f64, equity_curve: &[EquityPoint]) -> (f64, usize) {
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut current_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_duration = 0;
        } else if peak > 0.0 {
            let dd = (point.equity - peak) / peak * 100.0;
            max_dd = max_dd.min(dd);
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
        }
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], daily_rf: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 { (w[1].equity - prev) / prev } else { 0.0 }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let stddev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let excess = mean - daily_rf;

    let sharpe = if stddev > 0.0 {
        excess / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_dev = (downside / n).sqrt();
    let sortino = if downside_dev > 0.0 {
        excess / downside_dev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64),
                equity: v,
            })
            .collect()
    }

    fn trade(pnl: f64, days: i64) -> ClosedTrade {
        let entry_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ClosedTrade {
            symbol: "TEST".to_string(),
            shares: 100,
            entry_price: 100.0,
            exit_price: 100.0 + pnl / 100.0,
            entry_date,
            exit_date: entry_date + chrono::Duration::days(days),
            pnl,
        }
    }

    #[test]
    fn empty_run() {
        let m = Metrics::compute(100_000.0, &[], &[], 0.05);
        assert_eq!(m.total_return_pct, 0.0);
        assert_eq!(m.win_rate_pct, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.max_drawdown_pct, 0.0);
        assert_eq!(m.stats.total_trades, 0);
    }

    #[test]
    fn total_return_in_percent() {
        let m = Metrics::compute(100_000.0, &curve(&[100_000.0, 110_000.0]), &[], 0.0);
        assert_relative_eq!(m.total_return_pct, 10.0, epsilon = 1e-9);
        let m = Metrics::compute(100_000.0, &curve(&[95_000.0, 90_000.0]), &[], 0.0);
        assert_relative_eq!(m.total_return_pct, -10.0, epsilon = 1e-9);
    }

    #[test]
    fn flat_year_annualizes_to_zero() {
        let m = Metrics::compute(100.0, &curve(&[100.0; 252]), &[], 0.05);
        assert_relative_eq!(m.stats.annualized_return_pct, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn win_counts_and_rate() {
        let trades = [trade(100.0, 5), trade(-50.0, 3), trade(200.0, 10), trade(0.0, 1)];
        let m = Metrics::compute(100_000.0, &curve(&[100_250.0]), &trades, 0.0);
        assert_eq!(m.stats.trades_won, 2);
        assert_eq!(m.stats.trades_lost, 1);
        assert_eq!(m.stats.trades_breakeven, 1);
        assert_relative_eq!(m.win_rate_pct, 50.0);
    }

    #[test]
    fn profit_factor_ratio() {
        assert_relative_eq!(profit_factor(&[100.0, -50.0, 200.0]), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn profit_factor_without_losses_is_sentinel() {
        assert_eq!(profit_factor(&[10.0, 20.0]), PROFIT_FACTOR_SENTINEL);
    }

    #[test]
    fn profit_factor_without_trades_is_zero() {
        assert_eq!(profit_factor(&[]), 0.0);
        assert_eq!(profit_factor(&[0.0]), 0.0);
    }

    #[test]
    fn averages_and_extremes() {
        let trades = [trade(100.0, 5), trade(-60.0, 10), trade(300.0, 15), trade(-40.0, 2)];
        let m = Metrics::compute(100_000.0, &curve(&[100_300.0]), &trades, 0.0);
        assert_relative_eq!(m.stats.avg_win, 200.0, epsilon = 1e-9);
        assert_relative_eq!(m.stats.avg_loss, 50.0, epsilon = 1e-9);
        assert_relative_eq!(m.stats.largest_win, 300.0, epsilon = 1e-9);
        assert_relative_eq!(m.stats.largest_loss, 60.0, epsilon = 1e-9);
        assert_relative_eq!(m.stats.avg_holding_days, 8.0, epsilon = 1e-9);
    }

    #[test]
    fn drawdown_is_negative_percent() {
        let dd = max_drawdown_pct(100.0, &curve(&[110.0, 90.0, 95.0, 80.0, 100.0]));
        assert_relative_eq!(dd, (80.0 - 110.0) / 110.0 * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn drawdown_peak_starts_at_capital() {
        let dd = max_drawdown_pct(100.0, &curve(&[90.0, 95.0]));
        assert_relative_eq!(dd, -10.0, epsilon = 1e-9);
    }

    #[test]
    fn rising_curve_has_no_drawdown() {
        assert_eq!(max_drawdown_pct(100.0, &curve(&[101.0, 102.0, 103.0])), 0.0);
    }

    #[test]
    fn drawdown_duration_counts_bars_under_peak() {
        let m = Metrics::compute(100.0, &curve(&[110.0, 100.0, 90.0, 85.0, 95.0, 111.0]), &[], 0.0);
        assert_eq!(m.stats.max_drawdown_bars, 4);
    }

    #[test]
    fn steady_growth_has_positive_sharpe() {
        let values: Vec<f64> = (0..253).map(|i| 100_000.0 * (1.0 + 0.001 * i as f64)).collect();
        let m = Metrics::compute(100_000.0, &curve(&values), &[], 0.0);
        assert!(m.stats.sharpe_ratio > 0.0);
    }

    #[test]
    fn choppy_curve_ratios_are_finite() {
        let (sharpe, sortino) = compute_risk_adjusted(&curve(&[100.0, 101.0, 100.5, 101.5, 100.0, 102.0]), 0.0);
        assert!(sharpe.is_finite());
        assert!(sortino.is_finite());
    }

    proptest! {
        #[test]
        fn profit_factor_scales_gross_loss_to_gross_win(
            pnls in prop::collection::vec(-500.0f64..500.0, 1..40),
            loss in 0.01f64..500.0,
        ) {
            let mut pnls = pnls;
            pnls.push(-loss);
            let gross_win: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
            let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
            let pf = profit_factor(&pnls);
            prop_assert!((pf * gross_loss - gross_win).abs() <= 1e-9 * gross_win.max(1.0));
        }
    }
}
