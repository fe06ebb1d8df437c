//! Build script for persona-engine
//!
//! Embeds build-time information into the binary:
//! - Git commit hash and branch
//! - Build timestamp
//! - Target triple and build profile

use std::env;
use std::process::Command;

fn main() {
    // Rerun if git HEAD changes
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = git_output(&["rev-parse", "--short=8", "HEAD"]);
    let git_branch = git_output(&["rev-parse", "--abbrev-ref", "HEAD"]);

    let build_timestamp = chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string();
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=PERSONA_ENGINE_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=PERSONA_ENGINE_GIT_BRANCH={}", git_branch);
    println!("cargo:rustc-env=PERSONA_ENGINE_BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=PERSONA_ENGINE_TARGET={}", target);
    println!("cargo:rustc-env=PERSONA_ENGINE_PROFILE={}", profile);
}

fn git_output(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
