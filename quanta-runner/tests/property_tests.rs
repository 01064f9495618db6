//! Property-based tests for grid expansion and report ranking.
//!
//! Tests:
//! 1. Expanded grids number their entries 0001.. without gaps
//! 2. Every expanded SMA entry satisfies short < long
//! 3. Ranking returns a descending prefix of the requested size
//! 4. Condition filtering never adds rows and keeps only matches

use proptest::prelude::*;
use quanta_core::strategy::Strategy as TradingStrategy;
use quanta_runner::param_space::ParamGrid;
use quanta_runner::report::{apply_conditions, filter_top, CompareOp, Condition, Metric, Selection};
use quanta_runner::results::PerformanceRow;

fn period_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1usize..60, 1..5).prop_map(|v| v.into_iter().map(|p| p as f64).collect())
}

fn rows() -> impl Strategy<Value = Vec<PerformanceRow>> {
    prop::collection::vec((-0.9f64..3.0, 0.0f64..0.95), 0..40).prop_map(|metrics| {
        metrics
            .into_iter()
            .enumerate()
            .map(|(i, (total_return, max_drawdown))| PerformanceRow {
                total_return,
                max_drawdown,
                run_id: format!("20240101_000000_{i:08x}"),
                strategy: "RSI".into(),
                symbol: "SPY".into(),
                param_id: format!("{:04}", i + 1),
                params: "{}".into(),
            })
            .collect()
    })
}

// ── 1–2. Grid expansion ──────────────────────────────────────────────

proptest! {
    #[test]
    fn grid_ids_are_contiguous(shorts in period_values(), longs in period_values()) {
        let grid = ParamGrid::new()
            .with("short_period", shorts)
            .with("long_period", longs);
        let entries = grid.expand(TradingStrategy::SMA_CROSS).unwrap();

        prop_assert!(entries.len() <= grid.size());
        for (i, entry) in entries.iter().enumerate() {
            prop_assert_eq!(entry.param_id.as_str(), format!("{:04}", i + 1));
        }
    }

    #[test]
    fn expanded_sma_entries_are_valid(shorts in period_values(), longs in period_values()) {
        let grid = ParamGrid::new()
            .with("short_period", shorts)
            .with("long_period", longs);
        for entry in grid.expand(TradingStrategy::SMA_CROSS).unwrap() {
            match entry.strategy {
                TradingStrategy::SmaCross { short_period, long_period } => {
                    prop_assert!(short_period < long_period)
                }
                other => prop_assert!(false, "unexpected strategy {other}"),
            }
        }
    }
}

// ── 3–4. Ranking and filtering ───────────────────────────────────────

proptest! {
    #[test]
    fn top_n_is_sorted_prefix(table in rows(), n in 0usize..50) {
        let ranked = filter_top(table.clone(), Metric::TotalReturn, Selection::TopN(n));
        prop_assert_eq!(ranked.len(), n.min(table.len()));
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].total_return >= pair[1].total_return);
        }
        let best = table.iter().map(|r| r.total_return).fold(f64::NEG_INFINITY, f64::max);
        if let Some(first) = ranked.first() {
            prop_assert_eq!(first.total_return, best);
        }
    }

    #[test]
    fn top_percent_keeps_at_least_one(table in rows(), pct in 0.1f64..=100.0) {
        let ranked = filter_top(table.clone(), Metric::MaxDrawdown, Selection::TopPercent(pct));
        if table.is_empty() {
            prop_assert!(ranked.is_empty());
        } else {
            prop_assert!(!ranked.is_empty());
            prop_assert!(ranked.len() <= table.len());
        }
    }

    #[test]
    fn conditions_only_remove(table in rows(), threshold in -1.0f64..3.0) {
        let cond = Condition { metric: Metric::TotalReturn, op: CompareOp::Ge, value: threshold };
        let kept = apply_conditions(table.clone(), &[cond]);
        prop_assert!(kept.len() <= table.len());
        prop_assert!(kept.iter().all(|r| r.total_return >= threshold));
        prop_assert_eq!(
            kept.len(),
            table.iter().filter(|r| r.total_return >= threshold).count()
        );
    }
}
