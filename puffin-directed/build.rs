use std::process::Command;

fn git_ref() -> Option<String> {
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|git_ref| git_ref.trim().chars().take(12).collect())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    if let Some(git_ref) = git_ref() {
        println!("cargo:rustc-env=GIT_REF={git_ref}");
    }
}
