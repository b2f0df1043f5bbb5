//! Dotted version comparison for `producer_version` and other version-typed
//! filter attributes.
//!
//! Versions are compared component-wise as integers, with the shorter
//! version padded with zero components. The source audit scripts
//! occasionally emit a non-numeric component (e.g. `1.2a`); per the open
//! question this spec resolves against, such a pair is compared
//! numerically up to the first non-numeric component on either side, then
//! falls back to a lexicographic comparison of the remaining dotted tail.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Component {
    Num(u64),
    Text(String),
}

fn parse(version: &str) -> Vec<Component> {
    version
        .split('.')
        .map(|part| match part.parse::<u64>() {
            Ok(n) => Component::Num(n),
            Err(_) => Component::Text(part.to_string()),
        })
        .collect()
}

/// Compare two dotted version strings.
///
/// `"0.6.18" < "0.6.19"`, `"0.4" == "0.4.0"`, `"1.2a"` falls back to
/// lexicographic comparison of the tail starting at the non-numeric
/// component.
pub fn compare(a: &str, b: &str) -> Ordering {
    let pa = parse(a);
    let pb = parse(b);
    let len = pa.len().max(pb.len());

    for i in 0..len {
        let ca = pa.get(i);
        let cb = pb.get(i);
        match (ca, cb) {
            (Some(Component::Num(x)), Some(Component::Num(y))) => {
                if x != y {
                    return x.cmp(y);
                }
            }
            (None, Some(Component::Num(y))) => {
                if *y != 0 {
                    return Ordering::Less;
                }
            }
            (Some(Component::Num(x)), None) => {
                if *x != 0 {
                    return Ordering::Greater;
                }
            }
            (None, None) => {}
            _ => {
                // A non-numeric component appeared on at least one side at
                // this position: fall back to lexicographic comparison of
                // the remaining dotted tail from here on.
                let tail_a = tail_string(&pa, i);
                let tail_b = tail_string(&pb, i);
                return tail_a.cmp(&tail_b);
            }
        }
    }
    Ordering::Equal
}

fn tail_string(components: &[Component], from: usize) -> String {
    components
        .iter()
        .skip(from)
        .map(|c| match c {
            Component::Num(n) => n.to_string(),
            Component::Text(s) => s.clone(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

pub fn eq(a: &str, b: &str) -> bool {
    compare(a, b) == Ordering::Equal
}
