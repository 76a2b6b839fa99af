//! Compile-time build metadata.
//!
//! `BUILD_COMMIT` and `BUILD_DATE` are read from the build environment when
//! set, so release builds can stamp them in.

use std::fmt;

use serde::Serialize;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the scheduler-to-worker message protocol.
pub const PROTOCOL: &str = "ferme-notify/1";

/// What `GET /version` reports and `ferme serve` logs at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: &'static str,
    pub build_date: &'static str,
    pub protocol: &'static str,
}

impl BuildInfo {
    pub const CURRENT: Self = Self {
        version: VERSION,
        commit: or_unknown(option_env!("BUILD_COMMIT")),
        build_date: or_unknown(option_env!("BUILD_DATE")),
        protocol: PROTOCOL,
    };
}

const fn or_unknown(value: Option<&'static str>) -> &'static str {
    match value {
        Some(v) => v,
        None => "unknown",
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.version, self.commit)?;
        if self.build_date != "unknown" {
            write!(f, ", {}", self.build_date)?;
        }
        f.write_str(")")
    }
}
