//! Target platforms served by the orchestrator.

use std::fmt;
use std::str::FromStr;

/// Device platform a bundle is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    /// Android devices and emulators
    Android,
    /// iOS devices and simulators
    Ios,
}

impl Platform {
    /// All platforms in a stable order.
    pub const ALL: [Platform; 2] = [Platform::Android, Platform::Ios];

    /// Identifier used in query strings and file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }

    /// Name of the scratch entry module the framework packager compiles.
    ///
    /// The packager serves it as `index.<platform>.bundle`.
    pub fn scratch_entry_name(self) -> String {
        format!("index.{}", self.as_str())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(other.to_string()),
        }
    }
}
