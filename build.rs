use std::path::Path;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
  let output = Command::new("git").args(args).output().ok()?;
  if !output.status.success() {
    return None;
  }
  let text = String::from_utf8(output.stdout).ok()?;
  let text = text.trim();
  (!text.is_empty()).then(|| text.to_string())
}

fn main() {
  // Rebuild when HEAD moves or refs are packed, created or deleted.
  if let Some(git_dir) = git(&["rev-parse", "--git-dir"]) {
    for entry in ["HEAD", "packed-refs", "refs/heads", "refs/tags"] {
      let path = Path::new(&git_dir).join(entry);
      if path.exists() {
        println!("cargo:rerun-if-changed={}", path.display());
      }
    }
  }

  let version = env!("CARGO_PKG_VERSION");
  let describe = match git(&["describe", "--always", "--tags", "--long", "--dirty"]) {
    // tagged releases already carry the version: v0.1.0-3-gabc1234
    Some(info) if info.contains(version) => info.replacen("-g", "-", 1),
    Some(info) => format!("v{version}-{info}"),
    None => format!("v{version}"),
  };
  println!("cargo:rustc-env=_GIT_INFO={describe}");

  let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
  println!("cargo:rustc-env=_BUILD_TARGET={target}");
}
