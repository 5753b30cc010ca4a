// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=PERSONA_FEED_VERSION");

    // Packagers can pin the version string
    let version = match std::env::var("PERSONA_FEED_VERSION") {
        Ok(v) => v,
        Err(_) => git_version(),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// "0.1.0-abcdef1" at a tag, "0.1.0-dirty-abcdef1" past one, the package
/// version with the short hash otherwise
fn git_version() -> String {
    let pkg_version = env!("CARGO_PKG_VERSION");
    let commit = commit_hash();

    let described = Command::new("git")
        .args(["describe", "--tags", "--match", "v*"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());

    match (described, commit) {
        (Some(tag), Some(hash)) => {
            let tag = tag.strip_prefix('v').unwrap_or(&tag);
            let parts: Vec<&str> = tag.rsplitn(3, '-').collect();
            if parts.len() >= 3 {
                format!("{}-dirty-{}", parts[2], hash)
            } else {
                format!("{}-{}", tag, hash)
            }
        }
        (None, Some(hash)) => format!("{}-{}", pkg_version, hash),
        _ => pkg_version.to_string(),
    }
}

fn commit_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
