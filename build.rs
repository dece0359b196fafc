use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=Cargo.toml");
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/index");

    let short_sha = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());

    // number of changed paths in the working tree, 0 when git is unavailable
    let uncommitted = git(&["status", "--porcelain"])
        .map(|out| out.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0);

    println!("cargo::rustc-env=VDD_GIT_SHORT_SHA={short_sha}");
    println!("cargo::rustc-env=VDD_GIT_UNCOMMITTED={uncommitted}");
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }

    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}
