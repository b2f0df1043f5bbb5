//! The [`System`] entity: one per analyzed source file, plus its
//! OS-family/producer taxonomy and OS-dependent extras.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsFamily {
    Windows,
    Linux,
    Darwin,
    Undefined,
}

impl OsFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::Linux => "Linux",
            Self::Darwin => "Darwin",
            Self::Undefined => "Undefined",
        }
    }
}

impl std::str::FromStr for OsFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("windows") => Ok(Self::Windows),
            s if s.eq_ignore_ascii_case("linux") => Ok(Self::Linux),
            s if s.eq_ignore_ascii_case("darwin") => Ok(Self::Darwin),
            s if s.eq_ignore_ascii_case("undefined") => Ok(Self::Undefined),
            other => Err(format!("unknown os_family {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Producer {
    KpWinAudit,
    KpNixAudit,
    KpMacAudit,
    Other,
}

impl Producer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KpWinAudit => "KPWINAUDIT",
            Self::KpNixAudit => "KPNIXAUDIT",
            Self::KpMacAudit => "KPMACAUDIT",
            Self::Other => "OTHER",
        }
    }

    /// The OS family a producer implies. `Other` has no implied family.
    pub fn implied_os_family(self) -> Option<OsFamily> {
        match self {
            Self::KpWinAudit => Some(OsFamily::Windows),
            Self::KpNixAudit => Some(OsFamily::Linux),
            Self::KpMacAudit => Some(OsFamily::Darwin),
            Self::Other => None,
        }
    }
}

impl std::str::FromStr for Producer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("KPWINAUDIT") => Ok(Self::KpWinAudit),
            s if s.eq_ignore_ascii_case("KPNIXAUDIT") => Ok(Self::KpNixAudit),
            s if s.eq_ignore_ascii_case("KPMACAUDIT") => Ok(Self::KpMacAudit),
            s if s.eq_ignore_ascii_case("OTHER") => Ok(Self::Other),
            other => Err(format!("unknown producer {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistroFamily {
    Rpm,
    Deb,
    Unknown,
}

impl DistroFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rpm => "rpm",
            Self::Deb => "deb",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowsAttributes {
    pub product_name: Option<String>,
    pub release_id: Option<String>,
    pub current_build: Option<String>,
    pub ubr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxAttributes {
    pub distro_family: DistroFamily,
    pub os_pretty_name: Option<String>,
    pub os_version: Option<String>,
}

impl Default for LinuxAttributes {
    fn default() -> Self {
        Self {
            distro_family: DistroFamily::Unknown,
            os_pretty_name: None,
            os_version: None,
        }
    }
}

/// OS-dependent extra attributes. `None` for Darwin/Undefined systems,
/// which carry no extras beyond the shared fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsAttributes {
    Windows(WindowsAttributes),
    Linux(LinuxAttributes),
    None,
}

/// Outcome of analyzing a single source file's header. `Error` systems are
/// excluded from search results but still reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemStatus {
    Ok,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    pub system_id: String,
    pub file_path: PathBuf,
    pub encoding: String,
    pub file_hash: String,
    pub os_family: OsFamily,
    pub producer: Producer,
    pub producer_version: Option<String>,
    pub attributes: OsAttributes,
    pub status: SystemStatus,
}

impl System {
    /// A stable display name for this system, used as `SearchResult::system_name`.
    pub fn name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.to_string_lossy().into_owned())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, SystemStatus::Ok)
    }
}
