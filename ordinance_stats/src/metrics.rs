use std::cmp::Ordering;

use log::debug;

use crate::config::*;

/// Population standard deviation. 0 for an empty slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    var.sqrt()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Row shares in percent. A row with a zero total has all shares at 0.
pub fn row_percentages(counts: &[u64], total: u64) -> Vec<f64> {
    counts
        .iter()
        .map(|c| {
            if total > 0 {
                *c as f64 / total as f64 * 100.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Computes shares, growth and concentration for the real rows of a cross-tab.
///
/// Growth runs along the natural sequence of the rows (`row_sequence`), not
/// along the display order, so a cross-tab sorted by total still gets
/// term-over-term growth. Synthetic rows are ignored.
pub fn derive(tab: &CrossTab) -> DerivedMetrics {
    let percentages: Vec<Vec<f64>> = tab
        .counts
        .iter()
        .zip(tab.row_totals.iter())
        .map(|(row, total)| row_percentages(row, *total))
        .collect();

    let mut sequence: Vec<usize> = (0..tab.row_keys.len()).collect();
    sequence.sort_by_key(|idx| tab.row_sequence[*idx]);
    debug!("derive: natural sequence {:?}", sequence);

    let mut growth: Vec<Option<Vec<f64>>> = vec![None; tab.row_keys.len()];
    let mut total_growth: Vec<Option<f64>> = vec![None; tab.row_keys.len()];
    for pair in sequence.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        growth[cur] = Some(
            percentages[cur]
                .iter()
                .zip(percentages[prev].iter())
                .map(|(c, p)| c - p)
                .collect(),
        );
        let prev_total = tab.row_totals[prev];
        if prev_total > 0 {
            total_growth[cur] = Some(
                (tab.row_totals[cur] as f64 - prev_total as f64) / prev_total as f64 * 100.0,
            );
        }
    }

    let defined_total_growth: Vec<f64> = total_growth.iter().filter_map(|g| *g).collect();
    let mean_total_growth = mean(&defined_total_growth).unwrap_or(0.0);

    let rows: Vec<RowMetrics> = tab
        .row_keys
        .iter()
        .enumerate()
        .map(|(idx, key)| RowMetrics {
            key: key.clone(),
            total: tab.row_totals[idx],
            concentration: population_std_dev(&percentages[idx]),
            average_growth: growth[idx].as_deref().and_then(mean),
            growth: growth[idx].clone(),
            total_growth: total_growth[idx],
            percentage: percentages[idx].clone(),
        })
        .collect();

    DerivedMetrics {
        column_keys: tab.column_keys.clone(),
        rows,
        mean_total_growth,
    }
}

/// Rows ordered by decreasing concentration, ties by decreasing total then key.
pub fn rank_by_concentration(metrics: &DerivedMetrics) -> Vec<ConcentrationEntry> {
    let mut rows: Vec<&RowMetrics> = metrics.rows.iter().collect();
    rows.sort_by(|a, b| {
        b.concentration
            .partial_cmp(&a.concentration)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.total.cmp(&a.total))
            .then_with(|| a.key.cmp(&b.key))
    });
    rows.iter()
        .enumerate()
        .map(|(idx, r)| ConcentrationEntry {
            rank: (idx + 1) as u32,
            key: r.key.clone(),
            concentration: r.concentration,
            total: r.total,
        })
        .collect()
}
