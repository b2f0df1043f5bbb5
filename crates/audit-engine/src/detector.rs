//! System Detector: two-phase classification of a source file from its
//! header alone — which producer collected it, what OS family/attributes
//! it carries.

use std::path::Path;

use audit_common::{
    hash, DistroFamily, LinuxAttributes, OsAttributes, OsFamily, Producer, System, SystemStatus,
    WindowsAttributes,
};
use regex::Regex;
use tracing::warn;

use crate::streamer::{default_header_lines, extended_header_lines, ContentStreamer};

struct ProducerProbe {
    producer: Producer,
    pattern: Regex,
}

fn producer_probes() -> Vec<ProducerProbe> {
    // Order is significant: first probe to match wins.
    vec![
        ProducerProbe {
            producer: Producer::KpWinAudit,
            pattern: Regex::new(r"(?i)^KPWINVERSION:\s*(?P<version>.*)$").unwrap_or_else(|e| {
                unreachable!("static producer pattern must compile: {e}")
            }),
        },
        ProducerProbe {
            producer: Producer::KpNixAudit,
            pattern: Regex::new(r"(?i)KPNIXVERSION:\s*(?P<version>.*)$").unwrap_or_else(|e| {
                unreachable!("static producer pattern must compile: {e}")
            }),
        },
        ProducerProbe {
            producer: Producer::KpMacAudit,
            pattern: Regex::new(r"(?i)KPMACVERSION:\s*(?P<version>.*)$").unwrap_or_else(|e| {
                unreachable!("static producer pattern must compile: {e}")
            }),
        },
    ]
}

fn detect_producer(header: &[String]) -> Option<(Producer, String)> {
    for probe in producer_probes() {
        for line in header {
            if let Some(captures) = probe.pattern.captures(line) {
                let version = captures
                    .name("version")
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                return Some((probe.producer, version));
            }
        }
    }
    None
}

fn windows_attribute(header: &[String], field: &str) -> Option<String> {
    let pattern = Regex::new(&format!(
        r"(?i)System_OSInfo::{field}\s*:\s*(?P<value>.+?)\s*$"
    ))
    .ok()?;
    header.iter().find_map(|line| {
        pattern
            .captures(line)
            .and_then(|c| c.name("value"))
            .map(|m| m.as_str().to_string())
    })
}

fn windows_attributes(header: &[String]) -> WindowsAttributes {
    WindowsAttributes {
        product_name: windows_attribute(header, "ProductName"),
        release_id: windows_attribute(header, "ReleaseId"),
        current_build: windows_attribute(header, "CurrentBuild"),
        ubr: windows_attribute(header, "UBR"),
    }
}

fn linux_field(header: &[String], key: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r#"(?i)^{key}="?(?P<value>[^"\r\n]*)"?\s*$"#)).ok()?;
    header.iter().find_map(|line| {
        pattern
            .captures(line)
            .and_then(|c| c.name("value"))
            .map(|m| m.as_str().to_string())
    })
}

fn distro_family(header: &[String]) -> DistroFamily {
    let joined = header.join("\n").to_lowercase();
    if joined.contains("apt") || joined.contains("dpkg") {
        DistroFamily::Deb
    } else if joined.contains("rpm") || joined.contains("yum") || joined.contains("dnf") {
        DistroFamily::Rpm
    } else {
        DistroFamily::Unknown
    }
}

fn linux_attributes(header: &[String]) -> LinuxAttributes {
    LinuxAttributes {
        distro_family: distro_family(header),
        os_pretty_name: linux_field(header, "PRETTY_NAME"),
        os_version: linux_field(header, "VERSION_ID"),
    }
}

/// Classify a source file using only its header, growing the header window
/// from the default 10 lines to 40 if no producer marker is found.
///
/// # Errors
/// Returns `AuditError::Decoding` if the file cannot be decoded under
/// `encoding_label`, or `AuditError::Io` on a read failure. A header with no
/// producer marker is not an error: the system is returned with
/// `os_family = Undefined` and a warning is logged.
pub fn detect_system(
    path: &Path,
    encoding_label: &str,
    raw_bytes: &[u8],
) -> audit_common::AuditResult<System> {
    let streamer = ContentStreamer::new(path, encoding_label);
    let header = streamer.get_file_header(default_header_lines())?;
    let (producer, version) = match detect_producer(&header) {
        Some((p, v)) => (p, Some(v)),
        None => {
            let wide_header = streamer.get_file_header(extended_header_lines())?;
            match detect_producer(&wide_header) {
                Some((p, v)) => (p, Some(v)),
                None => {
                    warn!(file = %path.display(), "no producer marker found within header window");
                    (Producer::Other, None)
                }
            }
        }
    };

    // Attribute extraction always scans the full 40-line window: a producer
    // marker found near the top doesn't mean the OS attributes are too.
    let attribute_header = streamer.get_file_header(extended_header_lines())?;
    let os_family = producer.implied_os_family().unwrap_or(OsFamily::Undefined);
    let attributes = match os_family {
        OsFamily::Windows => OsAttributes::Windows(windows_attributes(&attribute_header)),
        OsFamily::Linux => OsAttributes::Linux(linux_attributes(&attribute_header)),
        OsFamily::Darwin | OsFamily::Undefined => OsAttributes::None,
    };

    let system_id = hash::hash_bytes(format!("{}:{}", path.display(), hash::hash_bytes(raw_bytes)).as_bytes());

    Ok(System {
        system_id,
        file_path: path.to_path_buf(),
        encoding: encoding_label.to_string(),
        file_hash: hash::hash_bytes(raw_bytes),
        os_family,
        producer,
        producer_version: version,
        attributes,
        status: SystemStatus::Ok,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tmp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    /// Initialize a tracing subscriber that writes to the test output
    /// buffer, so `tracing::warn!("no producer marker...")` is visible
    /// when this test fails. Safe to call multiple times.
    fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("audit_engine=debug")
            .try_init();
    }

    #[test]
    fn windows_producer_and_product_name() {
        let contents = "KPWINVERSION: 0.4.7\nSystem_OSInfo::ProductName    : Windows 10 Pro\n";
        let file = write_temp(contents);
        let system = detect_system(file.path(), "utf-8", contents.as_bytes()).expect("detect");
        assert_eq!(system.producer, Producer::KpWinAudit);
        assert_eq!(system.os_family, OsFamily::Windows);
        assert_eq!(system.producer_version.as_deref(), Some("0.4.7"));
        match system.attributes {
            OsAttributes::Windows(w) => {
                assert_eq!(w.product_name.as_deref(), Some("Windows 10 Pro"));
            }
            _ => panic!("expected windows attributes"),
        }
    }

    #[test]
    fn linux_producer_and_os_release_fields() {
        let contents = "KPNIXVERSION: 0.6.19\nPRETTY_NAME=\"Ubuntu 22.04.3 LTS\"\nVERSION_ID=\"22.04\"\nusing apt-get to check packages\n";
        let file = write_temp(contents);
        let system = detect_system(file.path(), "utf-8", contents.as_bytes()).expect("detect");
        assert_eq!(system.producer, Producer::KpNixAudit);
        assert_eq!(system.os_family, OsFamily::Linux);
        match system.attributes {
            OsAttributes::Linux(l) => {
                assert_eq!(l.os_pretty_name.as_deref(), Some("Ubuntu 22.04.3 LTS"));
                assert_eq!(l.os_version.as_deref(), Some("22.04"));
                assert_eq!(l.distro_family, DistroFamily::Deb);
            }
            _ => panic!("expected linux attributes"),
        }
    }

    #[test]
    fn undefined_when_no_producer_marker_present() {
        init_test_tracing();
        let contents = "just some unrelated text\nwith no markers at all\n";
        let file = write_temp(contents);
        let system = detect_system(file.path(), "utf-8", contents.as_bytes()).expect("detect");
        assert_eq!(system.os_family, OsFamily::Undefined);
        assert_eq!(system.producer, Producer::Other);
    }

    #[test]
    fn producer_marker_beyond_default_window_is_still_found() {
        let mut contents = String::new();
        for i in 0..15 {
            contents.push_str(&format!("filler line {i}\n"));
        }
        contents.push_str("KPMACVERSION: 1.2.0\n");
        let file = write_temp(&contents);
        let system = detect_system(file.path(), "utf-8", contents.as_bytes()).expect("detect");
        assert_eq!(system.producer, Producer::KpMacAudit);
        assert_eq!(system.os_family, OsFamily::Darwin);
    }
}
