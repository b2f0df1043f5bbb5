//! Filter Evaluator: does a [`System`] pass a [`SystemFilter`] list?

use std::cmp::Ordering;

use audit_common::{version, Comparator, FilterValue, SysFilterAttr, System, SystemFilter};

/// A `System` passes a `sys_filter` iff every triple evaluates true (AND
/// semantics). An empty or absent list always passes.
pub fn system_matches(system: &System, filters: &[SystemFilter]) -> bool {
    filters.iter().all(|f| evaluate_one(system, f))
}

fn evaluate_one(system: &System, filter: &SystemFilter) -> bool {
    let actual = filter.attr.get(system);
    let Some(actual) = actual else {
        // A null attribute only ever satisfies `ne`.
        return matches!(filter.comp, Comparator::Ne);
    };

    match (&filter.comp, &filter.value) {
        (Comparator::In, FilterValue::Collection(values)) => {
            values.iter().any(|v| string_eq(system, filter.attr, &actual, v))
        }
        (Comparator::In, FilterValue::Scalar(_)) => false, // validated away at load time
        (Comparator::Eq, FilterValue::Scalar(value)) => string_eq(system, filter.attr, &actual, value),
        (Comparator::Ne, FilterValue::Scalar(value)) => !string_eq(system, filter.attr, &actual, value),
        (Comparator::Eq, FilterValue::Collection(_)) | (Comparator::Ne, FilterValue::Collection(_)) => false,
        (ordering_comp, FilterValue::Scalar(value)) => {
            ordered_compare(system, filter.attr, &actual, value)
                .is_some_and(|ord| satisfies_ordering(*ordering_comp, ord))
        }
        (_, FilterValue::Collection(_)) => false,
    }
}

fn string_eq(_system: &System, attr: SysFilterAttr, actual: &str, expected: &str) -> bool {
    if attr.is_version() {
        version::eq(actual, expected)
    } else {
        actual.eq_ignore_ascii_case(expected)
    }
}

fn ordered_compare(_system: &System, attr: SysFilterAttr, actual: &str, expected: &str) -> Option<Ordering> {
    Some(if attr.is_version() {
        version::compare(actual, expected)
    } else {
        actual.cmp(expected)
    })
}

fn satisfies_ordering(comp: Comparator, ord: Ordering) -> bool {
    match comp {
        Comparator::Gt => ord == Ordering::Greater,
        Comparator::Lt => ord == Ordering::Less,
        Comparator::Ge => ord != Ordering::Less,
        Comparator::Le => ord != Ordering::Greater,
        Comparator::Eq | Comparator::Ne | Comparator::In => unreachable!("handled above"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use audit_common::{OsAttributes, OsFamily, Producer, SystemStatus};
    use std::path::PathBuf;

    fn system(producer: Producer, version: &str) -> System {
        System {
            system_id: "id".into(),
            file_path: PathBuf::from("f"),
            encoding: "utf-8".into(),
            file_hash: "h".into(),
            os_family: producer.implied_os_family().unwrap_or(OsFamily::Undefined),
            producer,
            producer_version: Some(version.to_string()),
            attributes: OsAttributes::None,
            status: SystemStatus::Ok,
        }
    }

    fn filter(attr: SysFilterAttr, comp: Comparator, value: FilterValue) -> SystemFilter {
        SystemFilter { attr, comp, value }
    }

    #[test]
    fn empty_filter_list_always_passes() {
        let s = system(Producer::KpNixAudit, "0.6.19");
        assert!(system_matches(&s, &[]));
    }

    #[test]
    fn version_filter_gating() {
        let filters = vec![
            filter(SysFilterAttr::Producer, Comparator::Eq, FilterValue::Scalar("KPNIXAUDIT".into())),
            filter(SysFilterAttr::ProducerVersion, Comparator::Ge, FilterValue::Scalar("0.6.19".into())),
        ];
        let older = system(Producer::KpNixAudit, "0.6.18");
        assert!(!system_matches(&older, &filters));
        let newer = system(Producer::KpNixAudit, "0.6.19");
        assert!(system_matches(&newer, &filters));
    }

    #[test]
    fn null_attribute_only_satisfies_ne() {
        let mut s = system(Producer::Other, "0.0.0");
        s.producer_version = None;
        let eq_filter = filter(
            SysFilterAttr::ProducerVersion,
            Comparator::Eq,
            FilterValue::Scalar("1.0".into()),
        );
        let ne_filter = filter(
            SysFilterAttr::ProducerVersion,
            Comparator::Ne,
            FilterValue::Scalar("1.0".into()),
        );
        assert!(!system_matches(&s, &[eq_filter]));
        assert!(system_matches(&s, &[ne_filter]));
    }

    #[test]
    fn and_semantics_require_all_triples() {
        let s = system(Producer::KpWinAudit, "1.0.0");
        let filters = vec![
            filter(SysFilterAttr::OsFamily, Comparator::Eq, FilterValue::Scalar("Windows".into())),
            filter(SysFilterAttr::OsFamily, Comparator::Eq, FilterValue::Scalar("Linux".into())),
        ];
        assert!(!system_matches(&s, &filters));
    }

    #[test]
    fn in_comparator_checks_membership() {
        let s = system(Producer::KpWinAudit, "1.0.0");
        let f = filter(
            SysFilterAttr::OsFamily,
            Comparator::In,
            FilterValue::Collection(vec!["Linux".into(), "Windows".into()]),
        );
        assert!(system_matches(&s, &[f]));
    }
}
