//! [`SearchResult`] and [`SearchResults`]: the engine's output shape,
//! ready for the external tabular writer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub system_name: String,
    pub line_number: usize,
    pub matched_text: String,
    /// `None` unless the search's `field_list` was set.
    pub extracted_fields: Option<BTreeMap<String, Option<String>>>,
}

impl SearchResult {
    /// The dedup key used by `unique`: `extracted_fields` when set, else
    /// `matched_text`.
    pub fn dedup_key(&self) -> String {
        match &self.extracted_fields {
            Some(fields) => {
                let mut parts: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("{k}={}", v.as_deref().unwrap_or("")))
                    .collect();
                parts.sort();
                parts.join("\u{1f}")
            }
            None => self.matched_text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub search_name: String,
    pub excel_sheet_name: String,
    pub has_extracted_fields: bool,
    pub results: Vec<SearchResult>,
}

impl SearchResults {
    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    pub fn unique_systems(&self) -> usize {
        let mut names: Vec<&str> = self.results.iter().map(|r| r.system_name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    }
}
