use std::path::Path;
use std::process::Command;

/// Stamp `vox --version` with the git revision it was built from.
fn git_revision(repo: &Path) -> Option<String> {
    let out = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["describe", "--always", "--dirty"])
        .output()
        .ok()?;
    let rev = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (out.status.success() && !rev.is_empty()).then_some(rev)
}

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let repo = Path::new(&manifest_dir).join("..");

    let rev = git_revision(&repo).unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=VOX_BUILD_SHA={rev}");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
