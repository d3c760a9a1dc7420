use std::collections::{HashMap, HashSet};

use log::debug;

use crate::aliases::AliasRegistry;
use crate::config::*;

/// The records of `table` that satisfy every predicate of `filters`, in table order.
pub fn filter_records<'a>(
    table: &'a DerivedTable,
    filters: &Filters,
    aliases: &AliasRegistry,
) -> Vec<&'a DerivedRecord> {
    let provinces: Option<HashSet<String>> = filters.jurisdiction.as_ref().map(|j| {
        if j.alias_inclusive {
            aliases.resolve_names(&j.province).into_iter().collect()
        } else {
            [j.province.clone()].into_iter().collect()
        }
    });
    debug!("filter_records: provinces: {:?}", provinces);

    table
        .records
        .iter()
        .filter(|dr| {
            let r = &dr.record;
            if let Some(ps) = &provinces {
                if !ps.contains(&r.province) {
                    return false;
                }
            }
            if let Some(fields) = &filters.subject_fields {
                if !fields.contains(&r.subject_field) {
                    return false;
                }
            }
            if let Some(terms) = &filters.council_terms {
                if !terms.contains(&r.council_term) {
                    return false;
                }
            }
            if let Some(range) = &filters.date_range {
                match r.enactment_date {
                    Some(d) if d >= range.from && d <= range.to => {}
                    _ => return false,
                }
            }
            let delegation_ok = match filters.delegation {
                DelegationFilter::All => true,
                DelegationFilter::DelegatedOnly => dr.is_delegated,
                DelegationFilter::AutonomousOnly => !dr.is_delegated,
            };
            let entity_ok = match filters.entities {
                EntityScope::Combined => true,
                EntityScope::SubUnits => !r.is_top_level,
                EntityScope::TopLevel => r.is_top_level,
            };
            delegation_ok && entity_ok
        })
        .collect()
}

// The key of a record along a dimension, with the ordinal used for natural ordering.
fn dimension_key(
    dr: &DerivedRecord,
    dim: Dimension,
    aliases: &AliasRegistry,
    fold_aliases: bool,
) -> (String, u32) {
    let r = &dr.record;
    match dim {
        Dimension::Province if fold_aliases => (aliases.canonical_of(&r.province).to_string(), 0),
        Dimension::Province => (r.province.clone(), 0),
        Dimension::Municipality => (r.municipality.clone(), 0),
        Dimension::SubjectField => (r.subject_field.clone(), 0),
        Dimension::CouncilTerm => (r.council_term.clone(), r.term_ordinal),
        Dimension::Delegation => {
            let kind = dr.delegation_kind();
            (kind.label().to_string(), kind as u32)
        }
        Dimension::EnactmentYear => match r.enactment_date {
            Some(d) => {
                let year = chrono::Datelike::year(&d);
                (year.to_string(), year.max(0) as u32)
            }
            None => (UNKNOWN_YEAR_LABEL.to_string(), u32::MAX),
        },
    }
}

// Keys in first-observed order, with their natural ordinal.
#[derive(Default)]
struct KeyIndex {
    keys: Vec<String>,
    ordinals: Vec<u32>,
    positions: HashMap<String, usize>,
}

impl KeyIndex {
    fn observe(&mut self, key: String, ordinal: u32) -> usize {
        if let Some(idx) = self.positions.get(&key) {
            return *idx;
        }
        let idx = self.keys.len();
        self.positions.insert(key.clone(), idx);
        self.keys.push(key);
        self.ordinals.push(ordinal);
        idx
    }

    // For every final key: its observed index (if any) and its natural sequence entry.
    fn layout(
        &self,
        canonical: &Option<Vec<String>>,
    ) -> (Vec<String>, Vec<Option<usize>>, Vec<(u32, usize)>) {
        match canonical {
            Some(keys) => {
                let dropped = self
                    .keys
                    .iter()
                    .filter(|k| !keys.contains(k))
                    .count();
                if dropped > 0 {
                    debug!("layout: {} observed keys are outside the canonical sequence", dropped);
                }
                let observed = keys.iter().map(|k| self.positions.get(k).cloned()).collect();
                let sequence = (0..keys.len()).map(|i| (i as u32, i)).collect();
                (keys.clone(), observed, sequence)
            }
            None => {
                // Equal ordinals are sequenced by key, as in `RowOrder::Natural`.
                let mut lexical: Vec<usize> = (0..self.keys.len()).collect();
                lexical.sort_by(|a, b| {
                    (self.ordinals[*a], &self.keys[*a]).cmp(&(self.ordinals[*b], &self.keys[*b]))
                });
                let mut sequence = vec![(0, 0); self.keys.len()];
                for (pos, idx) in lexical.into_iter().enumerate() {
                    sequence[idx] = (self.ordinals[idx], pos);
                }
                (
                    self.keys.clone(),
                    (0..self.keys.len()).map(Some).collect(),
                    sequence,
                )
            }
        }
    }
}

fn synthetic_row(kind: SyntheticKind, label: &str, counts: &[Vec<u64>], width: usize) -> SyntheticRow {
    let mut values = vec![0.0; width];
    for row in counts.iter() {
        for (acc, c) in values.iter_mut().zip(row.iter()) {
            *acc += *c as f64;
        }
    }
    if kind == SyntheticKind::Average && !counts.is_empty() {
        let n = counts.len() as f64;
        for v in values.iter_mut() {
            *v /= n;
        }
    }
    SyntheticRow {
        kind,
        label: label.replace("{n}", &counts.len().to_string()),
        total: values.iter().sum(),
        values,
    }
}

/// Groups the filtered records of `table` by two dimensions and counts them.
///
/// The matrix is dense: every (row, column) pair that was not observed holds 0.
/// Row totals are computed before synthetic rows are appended, and synthetic
/// rows only look at real rows.
pub fn build_crosstab(
    table: &DerivedTable,
    row_dimension: Dimension,
    column_dimension: Dimension,
    filters: &Filters,
    options: &CrossTabOptions,
    aliases: &AliasRegistry,
) -> OrdinanceResult<CrossTab> {
    if options.top_n == Some(0) {
        return Err(OrdinanceError::InvalidOption {
            message: "top_n must be at least 1".to_string(),
        });
    }
    let records = filter_records(table, filters, aliases);
    debug!(
        "build_crosstab: {:?} x {:?}: {} of {} records pass the filters",
        row_dimension,
        column_dimension,
        records.len(),
        table.records.len()
    );

    let mut rows = KeyIndex::default();
    let mut cols = KeyIndex::default();
    let mut observed: HashMap<(usize, usize), u64> = HashMap::new();
    for dr in records.iter() {
        let (rk, ro) = dimension_key(dr, row_dimension, aliases, options.fold_aliases);
        let (ck, co) = dimension_key(dr, column_dimension, aliases, options.fold_aliases);
        let r = rows.observe(rk, ro);
        let c = cols.observe(ck, co);
        *observed.entry((r, c)).or_insert(0) += 1;
    }

    let (row_keys, row_src, row_sequence) = rows.layout(&options.reindex_rows);
    let (column_keys, col_src, _) = cols.layout(&options.reindex_columns);

    let counts: Vec<Vec<u64>> = row_src
        .iter()
        .map(|r| {
            col_src
                .iter()
                .map(|c| match (r, c) {
                    (Some(r), Some(c)) => observed.get(&(*r, *c)).cloned().unwrap_or(0),
                    _ => 0,
                })
                .collect()
        })
        .collect();
    let row_totals: Vec<u64> = counts.iter().map(|row| row.iter().sum()).collect();

    // Display order.
    let mut order: Vec<usize> = (0..row_keys.len()).collect();
    match options.row_order {
        RowOrder::Observed => {}
        RowOrder::Natural => {
            order.sort_by(|a, b| {
                (row_sequence[*a].0, &row_keys[*a]).cmp(&(row_sequence[*b].0, &row_keys[*b]))
            });
        }
        RowOrder::DescendingTotal => {
            order.sort_by(|a, b| {
                row_totals[*b]
                    .cmp(&row_totals[*a])
                    .then_with(|| row_keys[*a].cmp(&row_keys[*b]))
            });
        }
    }

    if let Some(n) = options.top_n {
        let mut by_total: Vec<usize> = (0..row_keys.len()).collect();
        by_total.sort_by(|a, b| {
            row_totals[*b]
                .cmp(&row_totals[*a])
                .then_with(|| row_keys[*a].cmp(&row_keys[*b]))
        });
        let kept: HashSet<usize> = by_total.into_iter().take(n).collect();
        order.retain(|idx| kept.contains(idx));
    }

    let mut tab = CrossTab {
        row_dimension,
        column_dimension,
        row_keys: order.iter().map(|i| row_keys[*i].clone()).collect(),
        column_keys,
        counts: order.iter().map(|i| counts[*i].clone()).collect(),
        row_totals: order.iter().map(|i| row_totals[*i]).collect(),
        row_sequence: order.iter().map(|i| row_sequence[*i]).collect(),
        synthetic_rows: Vec::new(),
    };

    let width = tab.column_keys.len();
    if let Some(label) = &options.average_row {
        let row = synthetic_row(SyntheticKind::Average, label, &tab.counts, width);
        tab.synthetic_rows.push(row);
    }
    if let Some(label) = &options.total_row {
        let row = synthetic_row(SyntheticKind::Total, label, &tab.counts, width);
        tab.synthetic_rows.push(row);
    }

    debug!(
        "build_crosstab: {} rows x {} columns, {} synthetic rows",
        tab.row_keys.len(),
        tab.column_keys.len(),
        tab.synthetic_rows.len()
    );
    Ok(tab)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn sample() -> DerivedTable {
        derived(&[
            ("A", "A", "Welfare", "Council Term 2", "y"),
            ("A", "B", "Safety", "Council Term 1", "n"),
            ("Old A", "C", "Welfare", "Council Term 1", "y"),
            ("Z", "Z", "Culture", "Council Term 3", "n"),
            ("Z", "Y", "Welfare", "Council Term 3", "n"),
            ("Z", "Y", "Welfare", "Council Term 1", "n"),
        ])
    }

    fn aliases() -> AliasRegistry {
        AliasRegistry::new().with_alias("A", "Old A")
    }

    fn build(
        table: &DerivedTable,
        rd: Dimension,
        cd: Dimension,
        filters: &Filters,
        options: &CrossTabOptions,
    ) -> CrossTab {
        build_crosstab(table, rd, cd, filters, options, &aliases()).unwrap()
    }

    #[test]
    fn dense_and_complete() {
        let t = sample();
        let tab = build(
            &t,
            Dimension::Province,
            Dimension::SubjectField,
            &Filters::default(),
            &CrossTabOptions::default(),
        );
        assert_eq!(tab.row_keys, vec!["A", "Old A", "Z"]);
        assert_eq!(tab.column_keys, vec!["Welfare", "Safety", "Culture"]);
        assert_eq!(tab.count("Old A", "Safety"), Some(0));
        assert_eq!(tab.count("Z", "Welfare"), Some(2));
        assert_eq!(tab.grand_total(), t.len() as u64);
        for (row, total) in tab.counts.iter().zip(tab.row_totals.iter()) {
            assert_eq!(row.iter().sum::<u64>(), *total);
        }
    }

    #[test]
    fn completeness_under_filters() {
        let t = sample();
        let filters = Filters {
            delegation: DelegationFilter::AutonomousOnly,
            entities: EntityScope::SubUnits,
            ..Filters::default()
        };
        let tab = build(
            &t,
            Dimension::Municipality,
            Dimension::CouncilTerm,
            &filters,
            &CrossTabOptions::default(),
        );
        let expected = filter_records(&t, &filters, &aliases()).len() as u64;
        assert_eq!(expected, 3);
        assert_eq!(tab.grand_total(), expected);
    }

    #[test]
    fn alias_inclusive_filter() {
        let t = sample();
        let inclusive = Filters {
            jurisdiction: Some(JurisdictionFilter {
                province: "A".to_string(),
                alias_inclusive: true,
            }),
            ..Filters::default()
        };
        let got = filter_records(&t, &inclusive, &aliases());
        assert_eq!(got.len(), 3);

        let strict = Filters {
            jurisdiction: Some(JurisdictionFilter {
                province: "A".to_string(),
                alias_inclusive: false,
            }),
            ..Filters::default()
        };
        assert_eq!(filter_records(&t, &strict, &aliases()).len(), 2);

        let no_alias = Filters {
            jurisdiction: Some(JurisdictionFilter {
                province: "Z".to_string(),
                alias_inclusive: true,
            }),
            ..Filters::default()
        };
        let z = filter_records(&t, &no_alias, &aliases());
        assert_eq!(z.len(), 3);
        assert!(z.iter().all(|r| r.record.province == "Z"));
    }

    #[test]
    fn folded_province_rows() {
        let t = sample();
        let options = CrossTabOptions {
            fold_aliases: true,
            ..CrossTabOptions::default()
        };
        let tab = build(
            &t,
            Dimension::Province,
            Dimension::SubjectField,
            &Filters::default(),
            &options,
        );
        assert_eq!(tab.row_keys, vec!["A", "Z"]);
        assert_eq!(tab.row_total("A"), Some(3));
    }

    #[test]
    fn reindex_rows_zero_fills_and_drops() {
        let t = sample();
        let options = CrossTabOptions {
            reindex_rows: Some(vec![
                "Council Term 1".to_string(),
                "Council Term 2".to_string(),
                "Council Term 4".to_string(),
            ]),
            ..CrossTabOptions::default()
        };
        let tab = build(
            &t,
            Dimension::CouncilTerm,
            Dimension::SubjectField,
            &Filters::default(),
            &options,
        );
        assert_eq!(tab.row_keys.len(), 3);
        assert_eq!(tab.row_total("Council Term 4"), Some(0));
        assert_eq!(tab.row_total("Council Term 1"), Some(3));
        // Term 3 is outside the canonical sequence.
        assert_eq!(tab.grand_total(), 4);
    }

    #[test]
    fn natural_and_total_orders() {
        let t = sample();
        let natural = CrossTabOptions {
            row_order: RowOrder::Natural,
            ..CrossTabOptions::default()
        };
        let tab = build(
            &t,
            Dimension::CouncilTerm,
            Dimension::SubjectField,
            &Filters::default(),
            &natural,
        );
        assert_eq!(
            tab.row_keys,
            vec!["Council Term 1", "Council Term 2", "Council Term 3"]
        );

        let by_total = CrossTabOptions {
            row_order: RowOrder::DescendingTotal,
            ..CrossTabOptions::default()
        };
        let tab = build(
            &t,
            Dimension::Province,
            Dimension::SubjectField,
            &Filters::default(),
            &by_total,
        );
        assert_eq!(tab.row_keys, vec!["Z", "A", "Old A"]);
    }

    #[test]
    fn growth_follows_natural_display_order() {
        let t = derived(&[
            ("Z", "Z", "Welfare", "Council Term 1", "n"),
            ("A", "A", "Safety", "Council Term 1", "n"),
        ]);
        let options = CrossTabOptions {
            row_order: RowOrder::Natural,
            ..CrossTabOptions::default()
        };
        let tab = build(
            &t,
            Dimension::Province,
            Dimension::SubjectField,
            &Filters::default(),
            &options,
        );
        assert_eq!(tab.row_keys, vec!["A", "Z"]);
        let m = crate::metrics::derive(&tab);
        assert_eq!(m.rows[0].key, "A");
        assert_eq!(m.rows[0].growth, None);
        assert_eq!(m.rows[1].growth, Some(vec![100.0, -100.0]));

        // Two labels sharing the unparsable ordinal.
        let t = derived(&[
            ("A", "A", "Welfare", "later", "n"),
            ("A", "A", "Welfare", "earlier", "n"),
        ]);
        let tab = build(
            &t,
            Dimension::CouncilTerm,
            Dimension::SubjectField,
            &Filters::default(),
            &options,
        );
        assert_eq!(tab.row_keys, vec!["earlier", "later"]);
        let m = crate::metrics::derive(&tab);
        assert_eq!(m.rows[0].growth, None);
        assert!(m.rows[1].growth.is_some());
    }

    #[test]
    fn ties_in_total_order_are_lexical() {
        let t = derived(&[
            ("B", "B", "Welfare", "Council Term 1", "n"),
            ("A", "A", "Welfare", "Council Term 1", "n"),
        ]);
        let options = CrossTabOptions {
            row_order: RowOrder::DescendingTotal,
            ..CrossTabOptions::default()
        };
        let tab = build(
            &t,
            Dimension::Province,
            Dimension::SubjectField,
            &Filters::default(),
            &options,
        );
        assert_eq!(tab.row_keys, vec!["A", "B"]);
    }

    #[test]
    fn average_row_excludes_itself() {
        let t = sample();
        let options = CrossTabOptions {
            average_row: Some("average".to_string()),
            total_row: Some("all".to_string()),
            ..CrossTabOptions::default()
        };
        let tab = build(
            &t,
            Dimension::Province,
            Dimension::SubjectField,
            &Filters::default(),
            &options,
        );
        assert_eq!(tab.row_keys.len(), 3);
        let avg = &tab.synthetic_rows[0];
        assert_eq!(avg.kind, SyntheticKind::Average);
        assert_eq!(avg.values, vec![4.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]);
        assert!((avg.total - 2.0).abs() < 1e-9);
        let total = &tab.synthetic_rows[1];
        assert_eq!(total.values, vec![4.0, 1.0, 1.0]);
        // Row totals do not include synthetic rows.
        assert_eq!(tab.grand_total(), 6);
    }

    #[test]
    fn top_n_keeps_largest_rows_in_display_order() {
        let t = sample();
        let options = CrossTabOptions {
            top_n: Some(2),
            ..CrossTabOptions::default()
        };
        let tab = build(
            &t,
            Dimension::Province,
            Dimension::SubjectField,
            &Filters::default(),
            &options,
        );
        assert_eq!(tab.row_keys, vec!["A", "Z"]);
    }

    #[test]
    fn field_term_and_date_filters() {
        let mut t = sample();
        t.records[0].record.enactment_date = NaiveDate::from_ymd_opt(2019, 5, 1);
        t.records[1].record.enactment_date = NaiveDate::from_ymd_opt(2021, 5, 1);
        let filters = Filters {
            date_range: Some(DateRange {
                from: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
            }),
            ..Filters::default()
        };
        assert_eq!(filter_records(&t, &filters, &aliases()).len(), 1);

        let filters = Filters {
            subject_fields: Some(BTreeSet::from(["Welfare".to_string()])),
            council_terms: Some(BTreeSet::from(["Council Term 1".to_string()])),
            ..Filters::default()
        };
        assert_eq!(filter_records(&t, &filters, &aliases()).len(), 2);

        let tab = build(
            &t,
            Dimension::EnactmentYear,
            Dimension::Delegation,
            &Filters::default(),
            &CrossTabOptions {
                row_order: RowOrder::Natural,
                ..CrossTabOptions::default()
            },
        );
        assert_eq!(tab.row_keys, vec!["2019", "2021", UNKNOWN_YEAR_LABEL]);
        assert_eq!(tab.count("2019", "delegated"), Some(1));
    }
}
