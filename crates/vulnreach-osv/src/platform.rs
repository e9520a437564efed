//! Target platform detection and per-import constraint matching.
//!
//! The catalog constrains some vulnerabilities to specific operating systems
//! or architectures. The analyzer filters against a single target platform,
//! taken from `GOOS`/`GOARCH` when set and from the host otherwise.

use crate::entry::PackageImport;

/// The (GOOS, GOARCH) pair catalog constraints are matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Platform {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Detects the target platform, honoring `GOOS`/`GOARCH` overrides.
    pub fn detect() -> Self {
        Platform {
            os: std::env::var("GOOS").unwrap_or_else(|_| host_goos().to_string()),
            arch: std::env::var("GOARCH").unwrap_or_else(|_| host_goarch().to_string()),
        }
    }

    /// Reports whether a per-import constraint applies on this platform.
    /// Empty OS or architecture lists match anything.
    pub fn matches(&self, import: &PackageImport) -> bool {
        let os_ok = import.goos.is_empty() || import.goos.iter().any(|o| *o == self.os);
        let arch_ok = import.goarch.is_empty() || import.goarch.iter().any(|a| *a == self.arch);
        os_ok && arch_ok
    }
}

/// Host operating system under its GOOS name.
fn host_goos() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Host architecture under its GOARCH name.
fn host_goarch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}
