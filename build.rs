//! Build script: embeds the git short hash for the version string.

use std::process::Command;

fn main() {
    if let Some(hash) = git_short_hash() {
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_hash(&String::from_utf8_lossy(&output.stdout))
}

/// Accept only a plausible short hash (hex, non-empty).
fn parse_hash(raw: &str) -> Option<String> {
    let hash = raw.trim();
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(hash.to_string())
}
