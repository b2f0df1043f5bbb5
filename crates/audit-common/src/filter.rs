//! `SystemFilter` and the attribute enumeration it filters on.
//!
//! The comparison semantics live in `audit-engine::filter_eval` (it needs
//! `System` and version-compare together); this module only holds the
//! declarative shape plus the legacy-spelling normalization the loader
//! applies once at parse time.

use serde::{Deserialize, Serialize};

use crate::system::{DistroFamily, OsAttributes, OsFamily, Producer, System};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SysFilterAttr {
    OsFamily,
    Producer,
    ProducerVersion,
    ProductName,
    ReleaseId,
    CurrentBuild,
    Ubr,
    DistroFamily,
    OsPrettyName,
    OsVersion,
}

impl SysFilterAttr {
    pub fn is_version(self) -> bool {
        matches!(self, Self::ProducerVersion)
    }

    /// Fetch this attribute's value (as a comparable string) from `system`.
    /// `None` means the attribute is unset on this system.
    pub fn get(self, system: &System) -> Option<String> {
        match self {
            Self::OsFamily => Some(system.os_family.as_str().to_string()),
            Self::Producer => Some(system.producer.as_str().to_string()),
            Self::ProducerVersion => system.producer_version.clone(),
            Self::ProductName => windows_attr(system, |w| w.product_name.clone()),
            Self::ReleaseId => windows_attr(system, |w| w.release_id.clone()),
            Self::CurrentBuild => windows_attr(system, |w| w.current_build.clone()),
            Self::Ubr => windows_attr(system, |w| w.ubr.clone()),
            Self::DistroFamily => linux_attr(system, |l| Some(l.distro_family.as_str().to_string())),
            Self::OsPrettyName => linux_attr(system, |l| l.os_pretty_name.clone()),
            Self::OsVersion => linux_attr(system, |l| l.os_version.clone()),
        }
    }
}

fn windows_attr(system: &System, f: impl Fn(&crate::system::WindowsAttributes) -> Option<String>) -> Option<String> {
    match &system.attributes {
        OsAttributes::Windows(w) => f(w),
        _ => None,
    }
}

fn linux_attr(system: &System, f: impl Fn(&crate::system::LinuxAttributes) -> Option<String>) -> Option<String> {
    match &system.attributes {
        OsAttributes::Linux(l) => f(l),
        _ => None,
    }
}

/// Normalize a filter-attribute name, accepting both the canonical
/// snake_case spelling and the legacy camelCase/producer-marker spellings
/// the YAML library has historically used.
impl std::str::FromStr for SysFilterAttr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "os_family" | "osFamily" => Ok(Self::OsFamily),
            "producer" => Ok(Self::Producer),
            "producer_version" | "kpwinversion" | "kpnixversion" | "kpmacversion" => {
                Ok(Self::ProducerVersion)
            }
            "product_name" | "productName" => Ok(Self::ProductName),
            "release_id" | "releaseId" => Ok(Self::ReleaseId),
            "current_build" | "currentBuild" => Ok(Self::CurrentBuild),
            "ubr" => Ok(Self::Ubr),
            "distro_family" | "distroFamily" => Ok(Self::DistroFamily),
            "os_pretty_name" | "osPrettyName" => Ok(Self::OsPrettyName),
            "os_version" | "osVersion" => Ok(Self::OsVersion),
            other => Err(format!("unknown sys_filter attribute {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    In,
}

impl std::str::FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Self::Eq),
            "ne" => Ok(Self::Ne),
            "gt" => Ok(Self::Gt),
            "lt" => Ok(Self::Lt),
            "ge" => Ok(Self::Ge),
            "le" => Ok(Self::Le),
            "in" => Ok(Self::In),
            other => Err(format!("unknown comp {other:?}")),
        }
    }
}

/// A filter value: a single scalar, or a collection for `in` comparisons.
/// Ordered comparators (`gt`/`lt`/`ge`/`le`) forbid a collection value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterValue {
    Scalar(String),
    Collection(Vec<String>),
}

impl FilterValue {
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemFilter {
    pub attr: SysFilterAttr,
    pub comp: Comparator,
    pub value: FilterValue,
}

/// Validate `producer`/`os_family` filter values are members of their
/// respective enumerations, and that `value` shape matches `comp`.
pub fn validate_shape(filter: &SystemFilter) -> Result<(), String> {
    if matches!(filter.comp, Comparator::Gt | Comparator::Lt | Comparator::Ge | Comparator::Le)
        && filter.value.is_collection()
    {
        return Err("ordering comparators forbid a collection value".to_string());
    }
    if matches!(filter.comp, Comparator::In) && !filter.value.is_collection() {
        return Err("`in` requires a collection value".to_string());
    }
    match filter.attr {
        SysFilterAttr::OsFamily => check_scalars(&filter.value, |v| {
            std::str::FromStr::from_str(v).map(|_: OsFamily| ())
        }),
        SysFilterAttr::Producer => check_scalars(&filter.value, |v| {
            std::str::FromStr::from_str(v).map(|_: Producer| ())
        }),
        SysFilterAttr::DistroFamily => check_scalars(&filter.value, |v| {
            if matches!(v, "rpm" | "deb" | "unknown") {
                Ok(())
            } else {
                Err(format!("unknown distro_family {v:?}"))
            }
        }),
        _ => Ok(()),
    }
}

fn check_scalars(value: &FilterValue, f: impl Fn(&str) -> Result<(), String>) -> Result<(), String> {
    match value {
        FilterValue::Scalar(v) => f(v),
        FilterValue::Collection(vs) => vs.iter().try_for_each(|v| f(v)),
    }
}
