//! Shared, regex-free types for the audit report analysis engine: the
//! `System`/`SearchConfig`/`SearchResult` data model, the error taxonomy,
//! content hashing, version comparison and the Excel sheet-name
//! sanitizer. Regex compilation and everything that streams a file lives
//! in `audit-engine`.

pub mod error;
pub mod filter;
pub mod hash;
pub mod result;
pub mod search_config;
pub mod sheet_name;
pub mod system;
pub mod version;

pub use error::{AuditError, AuditResult, ConfigLocation};
pub use filter::{Comparator, FilterValue, SysFilterAttr, SystemFilter};
pub use result::{SearchResult, SearchResults};
pub use search_config::{GlobalConfig, MergeFieldSpec, SearchConfig};
pub use system::{DistroFamily, LinuxAttributes, OsAttributes, OsFamily, Producer, System, SystemStatus, WindowsAttributes};
