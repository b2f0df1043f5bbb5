//! [`SearchConfig`] and [`GlobalConfig`]: the merged, validated-but-uncompiled
//! shape a YAML search section produces. No `Regex` lives here — compiling
//! and running searches is `audit-engine`'s job; this crate only owns the
//! declarative shape and its structural invariants.

use serde::{Deserialize, Serialize};

use crate::filter::SystemFilter;

/// Sentinel for "unset" on `max_results`: unbounded.
pub const UNLIMITED: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeFieldSpec {
    pub source_columns: Vec<String>,
    pub dest_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub name: String,
    pub regex: String,
    pub excel_sheet_name: String,
    pub comment: Option<String>,
    pub max_results: i64,
    pub field_list: Vec<String>,
    pub only_matching: bool,
    pub unique: bool,
    pub full_scan: bool,
    pub rs_delimiter: Option<String>,
    pub multiline: bool,
    pub merge_fields: Vec<MergeFieldSpec>,
    pub sys_filter: Vec<SystemFilter>,
}

impl SearchConfig {
    /// Structural invariants from the data model (§3): everything except
    /// regex compilability, which the loader checks once it has a `Regex`
    /// engine available.
    pub fn validate_shape(&self) -> Result<(), String> {
        if self.max_results == 0 {
            return Err("max_results must be -1 (unlimited) or >= 1, not 0".to_string());
        }
        if self.max_results < UNLIMITED {
            return Err("max_results must be -1 (unlimited) or >= 1".to_string());
        }
        if self.multiline && self.field_list.is_empty() {
            return Err("multiline requires field_list to be set".to_string());
        }
        if self.rs_delimiter.is_some() && !self.multiline {
            return Err("rs_delimiter is only valid with multiline".to_string());
        }
        for spec in &self.merge_fields {
            if spec.source_columns.len() < 2 {
                return Err(format!(
                    "merge_fields dest {:?} needs at least 2 source_columns",
                    spec.dest_column
                ));
            }
            for source in &spec.source_columns {
                if !self.field_list.contains(source) {
                    return Err(format!(
                        "merge_fields source column {source:?} is not in field_list"
                    ));
                }
            }
        }
        for filter in &self.sys_filter {
            crate::filter::validate_shape(filter)?;
        }
        Ok(())
    }

    /// Whether the effective `only_matching` should be forced true: set
    /// explicitly, or implied by a non-empty `field_list`.
    pub fn effective_only_matching(&self) -> bool {
        self.only_matching || !self.field_list.is_empty()
    }
}

/// The `global` block: same optional fields as `SearchConfig` minus
/// `regex`/`name`/`excel_sheet_name`. Scoped to the YAML file it appears
/// in; never inherited across `include_*` boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub sys_filter: Vec<SystemFilter>,
    pub max_results: Option<i64>,
    pub only_matching: Option<bool>,
    pub unique: Option<bool>,
    pub full_scan: Option<bool>,
}

/// Merge `global` into a section: numeric/boolean defaults are "unset"
/// sentinels, so only fields still at their sentinel pick up the global
/// value. `sys_filter` is concatenated (global first, then local) rather
/// than replaced.
pub fn merge_global(section: &mut SearchConfig, global: &GlobalConfig) {
    if section.max_results == UNLIMITED {
        if let Some(v) = global.max_results {
            section.max_results = v;
        }
    }
    if !section.only_matching {
        if let Some(v) = global.only_matching {
            section.only_matching = v;
        }
    }
    if !section.unique {
        if let Some(v) = global.unique {
            section.unique = v;
        }
    }
    if !section.full_scan {
        if let Some(v) = global.full_scan {
            section.full_scan = v;
        }
    }
    let mut merged = global.sys_filter.clone();
    merged.append(&mut section.sys_filter);
    section.sys_filter = merged;
}
