//! Version and build information
//!
//! Provides access to build-time embedded information.

use std::fmt;

/// Build information embedded at compile time
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Package version from Cargo.toml
    pub version: &'static str,
    /// Package name
    pub name: &'static str,
    /// Git commit hash (short)
    pub git_hash: &'static str,
    /// Git branch name
    pub git_branch: &'static str,
    /// Build timestamp
    pub build_timestamp: &'static str,
    /// Target triple (e.g., x86_64-unknown-linux-gnu)
    pub target: &'static str,
    /// Build profile (debug/release)
    pub profile: &'static str,
}

impl BuildInfo {
    /// Get the current build information
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            name: env!("CARGO_PKG_NAME"),
            git_hash: env!("PERSONA_ENGINE_GIT_HASH"),
            git_branch: env!("PERSONA_ENGINE_GIT_BRANCH"),
            build_timestamp: env!("PERSONA_ENGINE_BUILD_TIMESTAMP"),
            target: env!("PERSONA_ENGINE_TARGET"),
            profile: env!("PERSONA_ENGINE_PROFILE"),
        }
    }

    /// Get the full version string (e.g., "0.1.0-abc1234")
    pub fn full_version(&self) -> String {
        format!("{}-{}", self.version, self.git_hash)
    }

    /// Get a short version string for display
    pub fn short_version(&self) -> String {
        format!("{} ({})", self.version, self.git_hash)
    }

    /// Check if this is a release build
    pub fn is_release(&self) -> bool {
        self.profile == "release"
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        writeln!(f)?;
        writeln!(f, "Build Information:")?;
        writeln!(f, "  Version:    {}", self.version)?;
        writeln!(f, "  Git Hash:   {}", self.git_hash)?;
        writeln!(f, "  Git Branch: {}", self.git_branch)?;
        writeln!(f, "  Built:      {}", self.build_timestamp)?;
        writeln!(f, "  Profile:    {}", self.profile)?;
        writeln!(f)?;
        writeln!(f, "Target:")?;
        writeln!(f, "  Triple:     {}", self.target)?;
        Ok(())
    }
}

/// Get the current build info
pub fn build_info() -> BuildInfo {
    BuildInfo::current()
}

/// Print version information to stdout
pub fn print_version() {
    let info = build_info();
    print!("{}", info);
}

/// Print short version to stdout
pub fn print_short_version() {
    let info = build_info();
    println!("{}", info.short_version());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_info_exists() {
        let info = build_info();
        assert!(!info.version.is_empty());
        assert!(!info.name.is_empty());
    }

    #[test]
    fn test_full_version_format() {
        let info = build_info();
        let full = info.full_version();
        assert!(full.contains(info.version));
        assert!(full.contains(info.git_hash));
    }

    #[test]
    fn test_display_format() {
        let info = build_info();
        let display = format!("{}", info);
        assert!(display.contains("Version:"));
        assert!(display.contains("Git Hash:"));
        assert!(display.contains("Target:"));
    }
}
