//! Search-Config Loader: parses a YAML search library, resolves
//! `include_*` directives transitively, applies each file's own `global`
//! block to its own siblings, validates and compiles every regex, and
//! returns a flat, first-seen-ordered list of [`CompiledSearch`].

mod raw;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use audit_common::{AuditError, ConfigLocation, GlobalConfig, SearchConfig};
use regex::RegexBuilder;
use serde_yaml::Value;
use tracing::debug;

use crate::engine::CompiledSearch;
use raw::{RawGlobal, RawMergeField, RawSection, RawSystemFilter};

/// Resolve the shipped default library directory, used only as the
/// fallback lookup location for an `include_*` path that does not resolve
/// relative to its including file.
pub fn default_library_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("audit-engine").join("searches"))
}

struct LoadState {
    visited: HashSet<PathBuf>,
    used_sheet_names: HashSet<String>,
    default_library_dir: Option<PathBuf>,
}

/// Load a root YAML search library file, returning every merged,
/// compiled search in first-seen order.
///
/// # Errors
/// Returns `AuditError::Config` on YAML syntax/schema errors, cyclic
/// includes, uncompilable regexes, or option incoherence (§3 invariants).
pub fn load_library(root: &Path, default_library_dir: Option<PathBuf>) -> audit_common::AuditResult<Vec<CompiledSearch>> {
    let mut state = LoadState {
        visited: HashSet::new(),
        used_sheet_names: HashSet::new(),
        default_library_dir,
    };
    load_file(root, &mut state)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn resolve_include_path(raw_path: &str, including_file: &Path, state: &LoadState) -> Option<PathBuf> {
    let candidate = including_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(raw_path);
    if candidate.is_file() {
        return Some(candidate);
    }
    if let Some(default_dir) = &state.default_library_dir {
        let candidate = default_dir.join(raw_path);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn load_file(path: &Path, state: &mut LoadState) -> audit_common::AuditResult<Vec<CompiledSearch>> {
    let label = path.display().to_string();
    let key = canonical(path);
    if !state.visited.insert(key) {
        return Err(AuditError::config(
            ConfigLocation::file(label.as_str()),
            "cyclic include detected",
        ));
    }

    let text = std::fs::read_to_string(path).map_err(|e| {
        AuditError::config(ConfigLocation::file(label.as_str()), format!("failed to read file: {e}"))
    })?;
    let root: Value = serde_yaml::from_str(&text).map_err(|e| {
        AuditError::config(ConfigLocation::file(label.as_str()), format!("invalid YAML: {e}"))
    })?;
    let Value::Mapping(mapping) = root else {
        return Err(AuditError::config(
            ConfigLocation::file(label.as_str()),
            "top-level YAML document must be a mapping",
        ));
    };

    let global = match mapping.get(Value::String("global".to_string())) {
        Some(value) => {
            let raw: RawGlobal = serde_yaml::from_value(value.clone()).map_err(|e| {
                AuditError::config(ConfigLocation::file(label.as_str()).section("global"), e.to_string())
            })?;
            raw.into_global_config(&label)?
        }
        None => GlobalConfig::default(),
    };

    let mut compiled = Vec::new();

    for (key, value) in &mapping {
        let Value::String(key_name) = key else {
            continue;
        };
        if key_name == "global" {
            continue;
        }
        if let Some(suffix) = key_name.strip_prefix("include_") {
            debug!(file = %label, include = %key_name, "resolving include directive");
            compiled.extend(load_include(key_name, suffix, value, path, &label, &global, state)?);
            continue;
        }
        let search = build_section(key_name, value, &global, &label, state)?;
        compiled.push(search);
    }

    Ok(compiled)
}

#[allow(clippy::too_many_arguments)]
fn load_include(
    directive_name: &str,
    _suffix: &str,
    value: &Value,
    including_file: &Path,
    label: &str,
    global: &GlobalConfig,
    state: &mut LoadState,
) -> audit_common::AuditResult<Vec<CompiledSearch>> {
    let Value::Mapping(mapping) = value else {
        return Err(AuditError::config(
            ConfigLocation::file(label).section(directive_name),
            "include directive must be a mapping",
        ));
    };

    let files_value = mapping.get(Value::String("files".to_string())).ok_or_else(|| {
        AuditError::config(
            ConfigLocation::file(label).section(directive_name),
            "include directive is missing required `files` key",
        )
    })?;
    let files: Vec<String> = serde_yaml::from_value(files_value.clone()).map_err(|e| {
        AuditError::config(ConfigLocation::file(label).section(directive_name), e.to_string())
    })?;

    let mut out = Vec::new();

    // Any further keys alongside `files` are additional search sections,
    // scoped (for `global` merging) to this same file.
    for (key, section_value) in mapping {
        let Value::String(key_name) = key else { continue };
        if key_name == "files" {
            continue;
        }
        let search = build_section(key_name, section_value, global, label, state)?;
        out.push(search);
    }

    for raw_path in files {
        let resolved = resolve_include_path(&raw_path, including_file, state).ok_or_else(|| {
            AuditError::config(
                ConfigLocation::file(label).section(directive_name),
                format!("could not resolve included file {raw_path:?} relative to {label} or the default library directory"),
            )
        })?;
        out.extend(load_file(&resolved, state)?);
    }

    Ok(out)
}

fn yaml_value_to_filter_value(value: &Value) -> Option<audit_common::FilterValue> {
    use audit_common::FilterValue;
    match value {
        Value::Sequence(items) => {
            let strings: Option<Vec<String>> = items.iter().map(scalar_to_string).collect();
            strings.map(FilterValue::Collection)
        }
        other => scalar_to_string(other).map(FilterValue::Scalar),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn build_filter(raw: &RawSystemFilter, label: &str, section_name: &str) -> audit_common::AuditResult<audit_common::SystemFilter> {
    let attr: audit_common::SysFilterAttr = raw.attr.parse().map_err(|e: String| {
        AuditError::config(ConfigLocation::file(label).section(section_name).option("sys_filter"), e)
    })?;
    let comp: audit_common::Comparator = raw.comp.parse().map_err(|e: String| {
        AuditError::config(ConfigLocation::file(label).section(section_name).option("sys_filter"), e)
    })?;
    let value = yaml_value_to_filter_value(&raw.value).ok_or_else(|| {
        AuditError::config(
            ConfigLocation::file(label).section(section_name).option("sys_filter"),
            "filter value must be a scalar or a list of scalars",
        )
    })?;
    Ok(audit_common::SystemFilter { attr, comp, value })
}

fn build_merge_field(raw: &RawMergeField) -> audit_common::MergeFieldSpec {
    audit_common::MergeFieldSpec {
        source_columns: raw.source_columns.clone(),
        dest_column: raw.dest_column.clone(),
    }
}

fn build_section(
    name: &str,
    value: &Value,
    global: &GlobalConfig,
    label: &str,
    state: &mut LoadState,
) -> audit_common::AuditResult<CompiledSearch> {
    let raw: RawSection = serde_yaml::from_value(value.clone()).map_err(|e| {
        AuditError::config(ConfigLocation::file(label).section(name), e.to_string())
    })?;

    let sys_filter = raw
        .sys_filter
        .iter()
        .map(|f| build_filter(f, label, name))
        .collect::<audit_common::AuditResult<Vec<_>>>()?;
    let merge_fields = raw.merge_fields.iter().map(build_merge_field).collect();

    let candidate_sheet_name = audit_common::sheet_name::sanitize(raw.excel_sheet_name.as_deref().unwrap_or(name));
    let excel_sheet_name = audit_common::sheet_name::dedupe(&candidate_sheet_name, &mut state.used_sheet_names);

    let mut config = SearchConfig {
        name: name.to_string(),
        regex: raw.regex.clone(),
        excel_sheet_name,
        comment: raw.comment.clone(),
        max_results: raw.max_results.unwrap_or(audit_common::search_config::UNLIMITED),
        field_list: raw.field_list.clone(),
        only_matching: raw.only_matching,
        unique: raw.unique,
        full_scan: raw.full_scan,
        rs_delimiter: raw.rs_delimiter.clone(),
        multiline: raw.multiline,
        merge_fields,
        sys_filter,
    };

    audit_common::search_config::merge_global(&mut config, global);

    config.validate_shape().map_err(|msg| {
        AuditError::config(ConfigLocation::file(label).section(name), msg)
    })?;

    let mut builder = RegexBuilder::new(&config.regex);
    builder.case_insensitive(true);
    if config.multiline {
        builder.dot_matches_new_line(true);
    }
    let regex = builder.build().map_err(|e| {
        AuditError::config(ConfigLocation::file(label).section(name).option("regex"), e.to_string())
    })?;

    let capture_names: std::collections::HashSet<&str> = regex.capture_names().flatten().collect();
    for field in &config.field_list {
        if !capture_names.contains(field.as_str()) {
            return Err(AuditError::config(
                ConfigLocation::file(label).section(name).option("field_list"),
                format!("field {field:?} has no matching named capture group in regex"),
            ));
        }
    }

    let rs_delimiter = match &config.rs_delimiter {
        Some(pattern) => Some(
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    AuditError::config(
                        ConfigLocation::file(label).section(name).option("rs_delimiter"),
                        e.to_string(),
                    )
                })?,
        ),
        None => None,
    };

    Ok(CompiledSearch { config, regex, rs_delimiter })
}

#[cfg(test)]
mod tests;
