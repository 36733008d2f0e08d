// build.rs
use std::env;
use std::process::Command;

fn git_rev() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim_end().to_string())
}

fn main() {
    let repoid = env::var("REPOID")
        .ok()
        .or_else(git_rev)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=REPOID={}", repoid);
    println!("cargo:rerun-if-env-changed=REPOID");
}
