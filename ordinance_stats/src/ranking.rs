use std::collections::HashMap;

use log::debug;

use crate::aliases::AliasRegistry;
use crate::config::*;
use crate::crosstab::filter_records;

/// Ranks entities by number of records.
///
/// Entities are (province, municipality) pairs; a top-level entity is a
/// province acting on its own. Ranks run from 1 without gaps or repeats. Ties
/// in the total are ordered by province then municipality name.
pub fn rank(table: &DerivedTable, scope: EntityScope) -> Vec<RankedEntry> {
    rank_filtered(table, scope, &Filters::default(), &AliasRegistry::new(), None)
}

/// Same as [`rank`], on the records passing `filters`, keeping the first `top_n` entries.
pub fn rank_filtered(
    table: &DerivedTable,
    scope: EntityScope,
    filters: &Filters,
    aliases: &AliasRegistry,
    top_n: Option<usize>,
) -> Vec<RankedEntry> {
    let mut totals: HashMap<(&str, &str, EntityKind), u64> = HashMap::new();
    for dr in filter_records(table, filters, aliases) {
        let r = &dr.record;
        let kind = if r.is_top_level {
            EntityKind::TopLevel
        } else {
            EntityKind::SubUnit
        };
        let included = match scope {
            EntityScope::SubUnits => kind == EntityKind::SubUnit,
            EntityScope::TopLevel => kind == EntityKind::TopLevel,
            EntityScope::Combined => true,
        };
        if included {
            *totals
                .entry((r.province.as_str(), r.municipality.as_str(), kind))
                .or_insert(0) += 1;
        }
    }

    let mut entries: Vec<((&str, &str, EntityKind), u64)> = totals.into_iter().collect();
    entries.sort_by(|(ka, ta), (kb, tb)| tb.cmp(ta).then_with(|| ka.cmp(kb)));
    debug!(
        "rank_filtered: {:?}: {} entities, top: {:?}",
        scope,
        entries.len(),
        entries.first()
    );

    entries
        .into_iter()
        .take(top_n.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(idx, ((province, municipality, kind), total))| RankedEntry {
            rank: (idx + 1) as u32,
            province: province.to_string(),
            municipality: municipality.to_string(),
            kind,
            total,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn sample() -> DerivedTable {
        derived(&[
            ("A", "A", "Welfare", "Council Term 1", "n"),
            ("A", "B", "Welfare", "Council Term 1", "n"),
            ("A", "B", "Safety", "Council Term 1", "n"),
            ("A", "C", "Safety", "Council Term 1", "y"),
            ("Z", "Z", "Safety", "Council Term 1", "y"),
            ("Z", "Z", "Safety", "Council Term 2", "n"),
            ("Z", "Y", "Safety", "Council Term 2", "n"),
        ])
    }

    fn check_ranks(entries: &[RankedEntry]) {
        for (idx, e) in entries.iter().enumerate() {
            assert_eq!(e.rank as usize, idx + 1);
        }
        for w in entries.windows(2) {
            assert!(w[0].total >= w[1].total);
        }
    }

    #[test]
    fn sub_units_only() {
        let r = rank(&sample(), EntityScope::SubUnits);
        check_ranks(&r);
        let names: Vec<&str> = r.iter().map(|e| e.municipality.as_str()).collect();
        assert_eq!(names, vec!["B", "C", "Y"]);
        assert!(r.iter().all(|e| e.kind == EntityKind::SubUnit));
        assert_eq!(r[0].total, 2);
    }

    #[test]
    fn top_level_only() {
        let r = rank(&sample(), EntityScope::TopLevel);
        check_ranks(&r);
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].province, "Z");
        assert_eq!(r[0].total, 2);
        assert!(r.iter().all(|e| e.kind == EntityKind::TopLevel));
    }

    #[test]
    fn combined_ranks_are_dense_and_tagged() {
        let r = rank(&sample(), EntityScope::Combined);
        check_ranks(&r);
        assert_eq!(r.len(), 5);
        // B and Z tie at 2: province order decides.
        assert_eq!(
            (r[0].municipality.as_str(), r[0].kind),
            ("B", EntityKind::SubUnit)
        );
        assert_eq!((r[1].municipality.as_str(), r[1].kind), ("Z", EntityKind::TopLevel));
        assert_eq!(r[1].kind.label(), "top-level");
    }

    #[test]
    fn filtered_and_truncated() {
        let filters = Filters {
            delegation: DelegationFilter::DelegatedOnly,
            ..Filters::default()
        };
        let r = rank_filtered(
            &sample(),
            EntityScope::Combined,
            &filters,
            &AliasRegistry::new(),
            Some(1),
        );
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].municipality, "C");
    }
}
