// CrabStruct - GPL-3.0-or-later
// Embeds the source revision and build profile for the startup banner.

use std::process::Command;

/// Trimmed stdout of a successful git invocation.
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main() {
    let revision = match git(&["rev-parse", "--short", "HEAD"]) {
        Some(hash) if git(&["status", "--porcelain"]).is_some_and(|s| !s.is_empty()) => {
            format!("{hash}+dirty")
        }
        Some(hash) => hash,
        None => String::from("unknown"),
    };
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| String::from("unknown"));

    println!("cargo:rustc-env=GIT_HASH={revision}");
    println!("cargo:rustc-env=BUILD_PROFILE={profile}");
    for watched in [".git/HEAD", ".git/index", "build.rs"] {
        println!("cargo:rerun-if-changed={watched}");
    }
}
