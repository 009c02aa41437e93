use std::process::Command;

/// Trimmed stdout of a successful command.
fn capture(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn main() {
    let built_at = capture("date", &["-u", "+%Y-%m-%dT%H:%M:%SZ"])
        .or_else(|| {
            capture(
                "powershell",
                &["-Command", "(Get-Date).ToUniversalTime().ToString('yyyy-MM-ddTHH:mm:ssZ')"],
            )
        })
        .unwrap_or_else(|| "unknown".into());
    let git_sha = capture("git", &["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".into());

    println!("cargo:rustc-env=BUILD_TIMESTAMP={built_at}");
    println!("cargo:rustc-env=BUILD_GIT_SHA={git_sha}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
