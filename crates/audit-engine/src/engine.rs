//! Search Engine: for a single `System`, selects applicable searches, then
//! streams the system's source file exactly once, driving every selected
//! regex simultaneously and producing `SearchResult` rows.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::ops::ControlFlow;

use audit_common::{SearchConfig, SearchResult, System, SystemStatus};
use regex::{Captures, Regex};
use tracing::{info_span, warn};

use crate::filter_eval;
use crate::scheduler::CancelToken;
use crate::streamer::ContentStreamer;

/// A `SearchConfig` plus its eagerly-compiled regexes. Built once per load
/// by the Search-Config Loader and shared read-only across every worker.
pub struct CompiledSearch {
    pub config: SearchConfig,
    pub regex: Regex,
    pub rs_delimiter: Option<Regex>,
}

/// What analyzing one system produced: the (possibly error-annotated)
/// system itself, plus one entry per search that was *selected* for it
/// (present even when that search produced zero rows).
pub struct SystemOutcome {
    pub system: System,
    pub per_search: Vec<(String, Vec<SearchResult>)>,
}

struct SearchState<'a> {
    search: &'a CompiledSearch,
    raw: Vec<SearchResult>,
}

impl SearchState<'_> {
    /// Has this search's effective result count already reached
    /// `max_results`? `full_scan` searches are never satisfied, so they
    /// never contribute to the engine's short-circuit.
    fn satisfied(&self) -> bool {
        let cfg = &self.search.config;
        if cfg.full_scan || cfg.max_results <= 0 {
            return false;
        }
        let count = if cfg.unique {
            let mut keys: Vec<String> = self.raw.iter().map(SearchResult::dedup_key).collect();
            keys.sort_unstable();
            keys.dedup();
            keys.len()
        } else {
            self.raw.len()
        };
        count as i64 >= cfg.max_results
    }
}

struct RecordBuf {
    start: usize,
    lines: Vec<String>,
    /// Whether the most recently buffered line itself matched
    /// `rs_delimiter`. A run of consecutive delimiter-matching lines (the
    /// common KPWINAUDIT shape, where every field of a record repeats the
    /// same section prefix) belongs to one record, not one per line.
    last_was_delimiter: bool,
}

/// The span treated as "the overall match" for `only_matching` purposes.
///
/// When `field_list` is set, this is the span from the start of the first
/// listed capture group to the end of the last one — the semantically
/// relevant portion of the line, not any literal anchor text the regex
/// used to locate it. Without a `field_list`, it is the whole regex match.
fn matched_span(cfg: &SearchConfig, captures: &Captures<'_>) -> Option<(usize, usize)> {
    if cfg.field_list.is_empty() {
        return captures.get(0).map(|m| (m.start(), m.end()));
    }
    let mut span: Option<(usize, usize)> = None;
    for name in &cfg.field_list {
        if let Some(m) = captures.name(name) {
            span = Some(match span {
                None => (m.start(), m.end()),
                Some((s, e)) => (s.min(m.start()), e.max(m.end())),
            });
        }
    }
    span.or_else(|| captures.get(0).map(|m| (m.start(), m.end())))
}

fn build_result(
    system_name: &str,
    cfg: &SearchConfig,
    line_number: usize,
    source_text: &str,
    captures: &Captures<'_>,
) -> SearchResult {
    let matched_text = if cfg.effective_only_matching() {
        matched_span(cfg, captures)
            .map(|(start, end)| source_text[start..end].to_string())
            .unwrap_or_else(|| source_text.to_string())
    } else {
        source_text.to_string()
    };
    let extracted_fields = if cfg.field_list.is_empty() {
        None
    } else {
        let fields: BTreeMap<String, Option<String>> = cfg
            .field_list
            .iter()
            .map(|name| {
                let value = captures.name(name).map(|m| m.as_str().to_string());
                (name.clone(), value)
            })
            .collect();
        Some(fields)
    };
    SearchResult {
        system_name: system_name.to_string(),
        line_number,
        matched_text,
        extracted_fields,
    }
}

fn finalize_record(state: &mut SearchState<'_>, system_name: &str, buf: &RecordBuf) {
    let text = buf.lines.join("\n");
    if let Some(captures) = state.search.regex.captures(&text) {
        let result = build_result(system_name, &state.search.config, buf.start, &text, &captures);
        state.raw.push(result);
    }
}

fn apply_merge_fields(rows: &mut [SearchResult], specs: &[audit_common::MergeFieldSpec]) {
    if specs.is_empty() {
        return;
    }
    for row in rows.iter_mut() {
        let Some(fields) = row.extracted_fields.as_mut() else {
            continue;
        };
        for spec in specs {
            let value = spec
                .source_columns
                .iter()
                .find_map(|src| fields.get(src).and_then(Clone::clone).filter(|v| !v.is_empty()));
            fields.insert(spec.dest_column.clone(), value);
            for src in &spec.source_columns {
                fields.remove(src);
            }
        }
    }
}

fn dedupe(rows: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    rows.into_iter().filter(|r| seen.insert(r.dedup_key())).collect()
}

/// Analyze one system against the full compiled search list. Never
/// propagates a read/decode failure to the caller: on error the returned
/// system carries `SystemStatus::Error` and `per_search` is empty, per the
/// engine's per-system error containment (§7 `IoError`/`DecodingError`).
pub fn analyze_system(system: &System, searches: &[CompiledSearch], cancel: &CancelToken) -> SystemOutcome {
    if !system.is_ok() {
        return SystemOutcome {
            system: system.clone(),
            per_search: Vec::new(),
        };
    }

    let candidates: Vec<&CompiledSearch> = searches
        .iter()
        .filter(|s| filter_eval::system_matches(system, &s.config.sys_filter))
        .collect();

    if candidates.is_empty() {
        return SystemOutcome {
            system: system.clone(),
            per_search: Vec::new(),
        };
    }

    let system_name = system.name();
    let _span = info_span!("analyze_system", system_id = %system.system_id, file = %system.file_path.display()).entered();

    let streamer = ContentStreamer::new(&system.file_path, &system.encoding);
    let mut states: Vec<SearchState<'_>> = candidates
        .iter()
        .map(|s| SearchState { search: s, raw: Vec::new() })
        .collect();
    let mut record_bufs: Vec<Option<RecordBuf>> = candidates
        .iter()
        .map(|s| {
            if s.config.multiline {
                Some(RecordBuf { start: 1, lines: Vec::new(), last_was_delimiter: false })
            } else {
                None
            }
        })
        .collect();

    let scan_result = streamer.for_each_line(|line_number, line| {
        for (idx, search) in candidates.iter().enumerate() {
            if search.config.multiline {
                if let Some(delim) = &search.rs_delimiter {
                    let is_delimiter = delim.is_match(line);
                    if is_delimiter {
                        // Only cut a new record if the buffer holds lines
                        // from a prior, already-finished record. A run of
                        // consecutive delimiter lines (each field of the
                        // same record repeating the section prefix) stays
                        // in one record.
                        let finalize_now = record_bufs[idx]
                            .as_ref()
                            .is_some_and(|b| !b.lines.is_empty() && !b.last_was_delimiter);
                        if finalize_now {
                            if let Some(buf) = record_bufs[idx].take() {
                                finalize_record(&mut states[idx], &system_name, &buf);
                            }
                            record_bufs[idx] =
                                Some(RecordBuf { start: line_number, lines: Vec::new(), last_was_delimiter: false });
                        }
                    }
                    if let Some(buf) = record_bufs[idx].as_mut() {
                        buf.last_was_delimiter = is_delimiter;
                    }
                }
                if let Some(buf) = record_bufs[idx].as_mut() {
                    buf.lines.push(line.to_string());
                }
            } else if let Some(captures) = search.regex.captures(line) {
                let result = build_result(&system_name, &search.config, line_number, line, &captures);
                states[idx].raw.push(result);
            }
        }

        let all_satisfied = states.iter().all(SearchState::satisfied);
        if cancel.should_stop_streaming() || all_satisfied {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });

    if let Err(e) = scan_result {
        warn!(system = %system_name, error = %e, "aborting analysis of this system");
        let mut errored = system.clone();
        errored.status = SystemStatus::Error(e.to_string());
        return SystemOutcome {
            system: errored,
            per_search: Vec::new(),
        };
    }

    for (idx, slot) in record_bufs.into_iter().enumerate() {
        if let Some(buf) = slot {
            if !buf.lines.is_empty() {
                finalize_record(&mut states[idx], &system_name, &buf);
            }
        }
    }

    let per_search = states
        .into_iter()
        .map(|state| {
            let cfg = &state.search.config;
            let mut rows = state.raw;
            apply_merge_fields(&mut rows, &cfg.merge_fields);
            if cfg.unique {
                rows = dedupe(rows);
            }
            if cfg.max_results > 0 {
                rows.truncate(cfg.max_results as usize);
            }
            (cfg.name.clone(), rows)
        })
        .collect();

    SystemOutcome {
        system: system.clone(),
        per_search,
    }
}
