//! Content Streamer: targeted access to a file's decoded lines without
//! re-reading the body.
//!
//! Header reads are cached (keyed by the largest `n` requested so far, so a
//! producer-detection probe at 10 lines followed by a 40-line retry is one
//! cache refill, not a second file open). The body may be consumed at most
//! once per streamer; every body-reading entry point funnels through
//! [`ContentStreamer::for_each_line`], so accidental re-reads are
//! structurally impossible rather than merely documented.

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::{self, BufRead};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use audit_common::AuditError;
use regex::Regex;

use crate::scheduler::CancelToken;

/// A single match produced by a single-pattern or multi-pattern scan.
#[derive(Debug, Clone)]
pub struct MatchHit {
    pub line_number: usize,
    /// The whole line, unless the caller asked for only the overall match.
    pub text: String,
    pub groups: Vec<(String, Option<String>)>,
}

pub struct ContentStreamer {
    path: PathBuf,
    encoding: &'static encoding_rs::Encoding,
    header_cache: RefCell<Option<(usize, Vec<String>)>>,
    body_consumed: Cell<bool>,
}

fn encoding_for(label: &str) -> &'static encoding_rs::Encoding {
    encoding_rs::Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::UTF_8)
}

impl ContentStreamer {
    pub fn new(path: impl Into<PathBuf>, encoding_label: &str) -> Self {
        Self {
            path: path.into(),
            encoding: encoding_for(encoding_label),
            header_cache: RefCell::new(None),
            body_consumed: Cell::new(false),
        }
    }

    fn file_label(&self) -> String {
        self.path.display().to_string()
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, AuditError> {
        let (text, _, had_errors) = self.encoding.decode(bytes);
        if had_errors {
            return Err(AuditError::Decoding {
                file: self.file_label(),
                encoding: self.encoding.name().to_string(),
                message: "input contained bytes that could not be decoded without replacement"
                    .to_string(),
            });
        }
        Ok(text.into_owned())
    }

    /// First `n` decoded lines. Idempotent; a later call with a larger `n`
    /// re-reads from the start of the file, a smaller or equal `n` reuses
    /// the cache.
    pub fn get_file_header(&self, n: usize) -> Result<Vec<String>, AuditError> {
        {
            let cache = self.header_cache.borrow();
            if let Some((cached_n, lines)) = cache.as_ref() {
                if *cached_n >= n {
                    return Ok(lines.iter().take(n).cloned().collect());
                }
            }
        }
        let bytes = fs::read(&self.path).map_err(|e| AuditError::io(self.file_label(), e))?;
        let text = self.decode(&bytes)?;
        let lines: Vec<String> = text.lines().take(n).map(str::to_string).collect();
        *self.header_cache.borrow_mut() = Some((n, lines.clone()));
        Ok(lines)
    }

    /// The single-pass body primitive every other scanning method is built
    /// on. `f` is called once per line in file order with a 1-based line
    /// number; returning `ControlFlow::Break` stops reading at the next
    /// line boundary (used both for cancellation and the search engine's
    /// `max_results`/`full_scan` short-circuit).
    pub(crate) fn for_each_line<F>(&self, mut f: F) -> Result<(), AuditError>
    where
        F: FnMut(usize, &str) -> ControlFlow<()>,
    {
        if self.body_consumed.replace(true) {
            return Err(AuditError::io(
                self.file_label(),
                io::Error::other("streamer body already consumed"),
            ));
        }
        let file = fs::File::open(&self.path).map_err(|e| AuditError::io(self.file_label(), e))?;
        let reader = io::BufReader::new(file);
        let mut line_number = 0usize;
        for raw in reader.split(b'\n') {
            let raw = raw.map_err(|e| AuditError::io(self.file_label(), e))?;
            line_number += 1;
            let trimmed = strip_cr(&raw);
            let line = self.decode(trimmed)?;
            if f(line_number, &line).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Single-pass, multi-pattern scan; drives one or more named match
    /// sinks over the body exactly once. Sinks are invoked in file order;
    /// within a line, in the order patterns were given.
    pub fn search_multiple_patterns(
        &self,
        patterns: &[(String, Regex)],
        cancel: &CancelToken,
    ) -> Result<Vec<(String, Vec<MatchHit>)>, AuditError> {
        let mut hits: Vec<(String, Vec<MatchHit>)> =
            patterns.iter().map(|(name, _)| (name.clone(), Vec::new())).collect();
        self.for_each_line(|line_number, line| {
            for (idx, (_, regex)) in patterns.iter().enumerate() {
                if let Some(captures) = regex.captures(line) {
                    let groups = named_groups(regex, &captures);
                    hits[idx].1.push(MatchHit {
                        line_number,
                        text: line.to_string(),
                        groups,
                    });
                }
            }
            if cancel.should_stop_streaming() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(hits)
    }

    /// Drive named callbacks over a single body pass; each matching line
    /// invokes the sink for that name.
    pub fn stream_with_multiple_callbacks<F>(
        &self,
        callbacks: &[(String, Regex)],
        cancel: &CancelToken,
        mut sink: F,
    ) -> Result<(), AuditError>
    where
        F: FnMut(&str, usize, &str, &[(String, Option<String>)]),
    {
        self.for_each_line(|line_number, line| {
            for (name, regex) in callbacks {
                if let Some(captures) = regex.captures(line) {
                    let groups = named_groups(regex, &captures);
                    sink(name, line_number, line, &groups);
                }
            }
            if cancel.should_stop_streaming() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    /// The first matching line, if any.
    pub fn find_first_match(&self, pattern: &Regex) -> Result<Option<(usize, String)>, AuditError> {
        let mut found = None;
        self.for_each_line(|line_number, line| {
            if pattern.is_match(line) {
                found = Some((line_number, line.to_string()));
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(found)
    }

    /// Lazily-consumed matching lines for a single pattern, up to `max`.
    pub fn stream_pattern_matches(
        &self,
        pattern: &Regex,
        max: Option<usize>,
    ) -> Result<Vec<(usize, String)>, AuditError> {
        let mut hits = Vec::new();
        self.for_each_line(|line_number, line| {
            if pattern.is_match(line) {
                hits.push((line_number, line.to_string()));
            }
            if max.is_some_and(|m| hits.len() >= m) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(hits)
    }

    /// Record-mode assembly: buffer lines into logical records delimited by
    /// `rs_delimiter` (or the whole file, if absent), invoking `on_record`
    /// with the first line number of each record and its joined text.
    /// `on_record` returning `ControlFlow::Break` stops the scan.
    pub fn for_each_record<F>(
        &self,
        delimiter: Option<&Regex>,
        cancel: &CancelToken,
        mut on_record: F,
    ) -> Result<(), AuditError>
    where
        F: FnMut(usize, &str) -> ControlFlow<()>,
    {
        let mut current_start = 1usize;
        let mut buffer: Vec<String> = Vec::new();
        let mut last_was_delimiter = false;
        let mut stopped = false;
        self.for_each_line(|line_number, line| {
            if let Some(delim) = delimiter {
                let is_delimiter = delim.is_match(line);
                if is_delimiter && !buffer.is_empty() && !last_was_delimiter {
                    let record = buffer.join("\n");
                    buffer.clear();
                    if on_record(current_start, &record).is_break() {
                        stopped = true;
                        return ControlFlow::Break(());
                    }
                    current_start = line_number;
                }
                last_was_delimiter = is_delimiter;
            }
            buffer.push(line.to_string());
            if cancel.should_stop_streaming() {
                stopped = true;
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })?;
        if !stopped && !buffer.is_empty() {
            let record = buffer.join("\n");
            let _ = on_record(current_start, &record);
        }
        Ok(())
    }
}

fn strip_cr(raw: &[u8]) -> &[u8] {
    if raw.last() == Some(&b'\r') {
        &raw[..raw.len() - 1]
    } else {
        raw
    }
}

fn named_groups(regex: &Regex, captures: &regex::Captures) -> Vec<(String, Option<String>)> {
    regex
        .capture_names()
        .flatten()
        .map(|name| {
            let value = captures.name(name).map(|m| m.as_str().to_string());
            (name.to_string(), value)
        })
        .collect()
}

pub fn default_header_lines() -> usize {
    10
}

pub fn extended_header_lines() -> usize {
    40
}

pub fn path_as_str(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tmp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn header_is_cached_and_idempotent() {
        let file = write_temp("a\nb\nc\nd\ne\n");
        let streamer = ContentStreamer::new(file.path(), "utf-8");
        let first = streamer.get_file_header(2).expect("header");
        let second = streamer.get_file_header(2).expect("header");
        assert_eq!(first, second);
        assert_eq!(first, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn header_growth_refills_from_larger_n() {
        let file = write_temp("a\nb\nc\nd\ne\n");
        let streamer = ContentStreamer::new(file.path(), "utf-8");
        let small = streamer.get_file_header(2).expect("header");
        assert_eq!(small.len(), 2);
        let large = streamer.get_file_header(4).expect("header");
        assert_eq!(large, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn body_can_only_be_consumed_once() {
        let file = write_temp("a\nb\n");
        let streamer = ContentStreamer::new(file.path(), "utf-8");
        let cancel = CancelToken::new();
        let re = Regex::new("a").expect("regex");
        streamer.find_first_match(&re).expect("first pass ok");
        let second = streamer.stream_pattern_matches(&re, None);
        assert!(second.is_err());
        let _ = cancel;
    }

    #[test]
    fn multi_pattern_scan_preserves_file_order() {
        let file = write_temp("foo\nbar\nbaz\n");
        let streamer = ContentStreamer::new(file.path(), "utf-8");
        let cancel = CancelToken::new();
        let patterns = vec![
            ("foo".to_string(), Regex::new("foo").expect("regex")),
            ("baz".to_string(), Regex::new("baz").expect("regex")),
        ];
        let hits = streamer.search_multiple_patterns(&patterns, &cancel).expect("scan");
        assert_eq!(hits[0].1.len(), 1);
        assert_eq!(hits[0].1[0].line_number, 1);
        assert_eq!(hits[1].1[0].line_number, 3);
    }

    #[test]
    fn records_are_assembled_between_delimiters() {
        let file = write_temp("START\na\nb\nSTART\nc\n");
        let streamer = ContentStreamer::new(file.path(), "utf-8");
        let cancel = CancelToken::new();
        let delim = Regex::new("^START$").expect("regex");
        let mut records = Vec::new();
        streamer
            .for_each_record(Some(&delim), &cancel, |start, text| {
                records.push((start, text.to_string()));
                ControlFlow::Continue(())
            })
            .expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, 1);
        assert_eq!(records[0].1, "START\na\nb");
        assert_eq!(records[1].0, 4);
        assert_eq!(records[1].1, "START\nc");
    }
}
