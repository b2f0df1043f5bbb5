//! Deserialization shapes for a single YAML search-library file, before
//! global merging, sheet-name assignment or regex compilation.

use audit_common::{AuditResult, GlobalConfig};
use serde::Deserialize;
use serde_yaml::Value;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawSystemFilter {
    pub attr: String,
    pub comp: String,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawMergeField {
    pub source_columns: Vec<String>,
    pub dest_column: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawSection {
    pub regex: String,
    pub excel_sheet_name: Option<String>,
    pub comment: Option<String>,
    pub max_results: Option<i64>,
    #[serde(default)]
    pub field_list: Vec<String>,
    #[serde(default)]
    pub only_matching: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub full_scan: bool,
    pub rs_delimiter: Option<String>,
    #[serde(default)]
    pub multiline: bool,
    #[serde(default)]
    pub merge_fields: Vec<RawMergeField>,
    #[serde(default)]
    pub sys_filter: Vec<RawSystemFilter>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawGlobal {
    #[serde(default)]
    pub sys_filter: Vec<RawSystemFilter>,
    pub max_results: Option<i64>,
    pub only_matching: Option<bool>,
    pub unique: Option<bool>,
    pub full_scan: Option<bool>,
}

impl RawGlobal {
    pub(super) fn into_global_config(self, file_label: &str) -> AuditResult<GlobalConfig> {
        let sys_filter = self
            .sys_filter
            .iter()
            .map(|f| super::build_filter(f, file_label, "global"))
            .collect::<AuditResult<Vec<_>>>()?;
        Ok(GlobalConfig {
            sys_filter,
            max_results: self.max_results,
            only_matching: self.only_matching,
            unique: self.unique,
            full_scan: self.full_scan,
        })
    }
}
