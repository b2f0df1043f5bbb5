//! Result Aggregator: bundles per-search result streams from the
//! scheduler's [`SystemOutcome`]s into [`SearchResults`], grouped by OS
//! family, ready for export by the (external) tabular writer.

use audit_common::{OsFamily, SearchResult, SearchResults};

use crate::engine::{CompiledSearch, SystemOutcome};

/// Every search's accumulated rows for a single OS family.
pub struct FamilyResults {
    pub os_family: OsFamily,
    pub searches: Vec<SearchResults>,
}

/// Group `outcomes` by OS family, in the order families first appear
/// among `Ok` systems. Within a family, searches appear in `searches`'
/// declared order, and a search is included iff at least one `System`
/// in that family was a candidate for it (i.e. passed its `sys_filter`),
/// even if the search produced zero rows for that family.
pub fn aggregate(outcomes: &[SystemOutcome], searches: &[CompiledSearch]) -> Vec<FamilyResults> {
    let mut by_family: Vec<(OsFamily, Vec<(String, Vec<SearchResult>)>)> = Vec::new();

    for outcome in outcomes {
        if !outcome.system.is_ok() {
            continue;
        }
        let family = outcome.system.os_family;
        let bucket_idx = match by_family.iter().position(|(f, _)| *f == family) {
            Some(idx) => idx,
            None => {
                by_family.push((family, Vec::new()));
                by_family.len() - 1
            }
        };
        let bucket = &mut by_family[bucket_idx].1;
        for (search_name, rows) in &outcome.per_search {
            match bucket.iter_mut().find(|(name, _)| name == search_name) {
                Some((_, existing)) => existing.extend(rows.iter().cloned()),
                None => bucket.push((search_name.clone(), rows.clone())),
            }
        }
    }

    by_family
        .into_iter()
        .map(|(family, bucket)| {
            let family_searches = searches
                .iter()
                .filter_map(|compiled| {
                    let (_, rows) = bucket.iter().find(|(name, _)| *name == compiled.config.name)?;
                    Some(SearchResults {
                        search_name: compiled.config.name.clone(),
                        excel_sheet_name: compiled.config.excel_sheet_name.clone(),
                        has_extracted_fields: !compiled.config.field_list.is_empty(),
                        results: rows.clone(),
                    })
                })
                .collect();
            FamilyResults { os_family: family, searches: family_searches }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use audit_common::{OsAttributes, Producer, SystemStatus};
    use regex::Regex;
    use std::path::PathBuf;

    fn outcome(path: &str, family: OsFamily, per_search: Vec<(&str, Vec<SearchResult>)>) -> SystemOutcome {
        SystemOutcome {
            system: audit_common::System {
                system_id: path.to_string(),
                file_path: PathBuf::from(path),
                encoding: "utf-8".into(),
                file_hash: "h".into(),
                os_family: family,
                producer: Producer::Other,
                producer_version: None,
                attributes: OsAttributes::None,
                status: SystemStatus::Ok,
            },
            per_search: per_search.into_iter().map(|(n, r)| (n.to_string(), r)).collect(),
        }
    }

    fn row(system: &str, text: &str) -> SearchResult {
        SearchResult {
            system_name: system.to_string(),
            line_number: 1,
            matched_text: text.to_string(),
            extracted_fields: None,
        }
    }

    fn search(name: &str) -> CompiledSearch {
        let mut cfg = audit_common::SearchConfig {
            name: name.to_string(),
            regex: ".*".to_string(),
            excel_sheet_name: name.to_string(),
            comment: None,
            max_results: -1,
            field_list: vec![],
            only_matching: false,
            unique: false,
            full_scan: false,
            rs_delimiter: None,
            multiline: false,
            merge_fields: vec![],
            sys_filter: vec![],
        };
        cfg.name = name.to_string();
        CompiledSearch {
            regex: Regex::new(&cfg.regex).expect("regex"),
            rs_delimiter: None,
            config: cfg,
        }
    }

    #[test]
    fn groups_rows_by_os_family_across_systems() {
        let outcomes = vec![
            outcome("a.txt", OsFamily::Linux, vec![("passwd", vec![row("a.txt", "root")])]),
            outcome("b.txt", OsFamily::Linux, vec![("passwd", vec![row("b.txt", "admin")])]),
            outcome("c.txt", OsFamily::Windows, vec![("passwd", vec![])]),
        ];
        let searches = vec![search("passwd")];
        let grouped = aggregate(&outcomes, &searches);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].os_family, OsFamily::Linux);
        assert_eq!(grouped[0].searches[0].result_count(), 2);
        assert_eq!(grouped[1].os_family, OsFamily::Windows);
        assert_eq!(grouped[1].searches[0].result_count(), 0);
    }

    #[test]
    fn search_absent_from_a_family_with_no_qualifying_system_is_omitted() {
        let outcomes = vec![outcome("a.txt", OsFamily::Linux, vec![("linux_only", vec![row("a.txt", "x")])])];
        let searches = vec![search("linux_only"), search("windows_only")];
        let grouped = aggregate(&outcomes, &searches);
        assert_eq!(grouped[0].searches.len(), 1);
        assert_eq!(grouped[0].searches[0].search_name, "linux_only");
    }

    #[test]
    fn error_systems_are_excluded_entirely() {
        let mut errored = outcome("bad.txt", OsFamily::Linux, vec![]);
        errored.system.status = SystemStatus::Error("decode failed".to_string());
        let grouped = aggregate(&[errored], &[search("passwd")]);
        assert!(grouped.is_empty());
    }

    #[test]
    fn family_order_follows_first_encounter() {
        let outcomes = vec![
            outcome("a.txt", OsFamily::Windows, vec![("s", vec![])]),
            outcome("b.txt", OsFamily::Linux, vec![("s", vec![])]),
            outcome("c.txt", OsFamily::Windows, vec![("s", vec![])]),
        ];
        let grouped = aggregate(&outcomes, &[search("s")]);
        assert_eq!(grouped[0].os_family, OsFamily::Windows);
        assert_eq!(grouped[1].os_family, OsFamily::Linux);
    }
}
