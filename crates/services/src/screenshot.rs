//! Screenshot capture via the OS utility.
//!
//! Writes a PNG under the app config dir and hands the path back so the
//! ask pipeline can pick it up as an attachment.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tokio::process::Command;

use shared::settings;

fn capture_path() -> Result<PathBuf> {
    let dir = settings::config_dir().ok_or_else(|| anyhow!("no config directory"))?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("screenshot.png"))
}

/// Candidate capture commands for interactive region selection, probed in
/// order on Linux; macOS has exactly one.
fn capture_commands(target: &std::path::Path) -> Vec<(&'static str, Vec<String>)> {
    let path = target.to_string_lossy().to_string();
    if cfg!(target_os = "macos") {
        vec![("/usr/sbin/screencapture", vec!["-i".into(), path])]
    } else {
        vec![
            ("gnome-screenshot", vec!["-a".into(), "-f".into(), path.clone()]),
            ("spectacle", vec!["-r".into(), "-b".into(), "-n".into(), "-o".into(), path.clone()]),
            ("scrot", vec!["-s".into(), path]),
        ]
    }
}

/// Capture an interactive screenshot and return the written PNG path.
pub async fn capture_interactive() -> Result<PathBuf> {
    let target = capture_path()?;
    // Stale captures must not masquerade as fresh ones.
    let _ = std::fs::remove_file(&target);

    let mut last_error = None;
    for (program, args) in capture_commands(&target) {
        match Command::new(program).args(&args).status().await {
            Ok(status) if status.success() && target.exists() => {
                tracing::debug!("screenshot captured via {}", program);
                return Ok(target);
            }
            Ok(status) => {
                last_error = Some(anyhow!("{} exited with {}", program, status));
            }
            Err(e) => {
                last_error = Some(anyhow!("{} failed to start: {}", program, e));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("no screenshot utility available")))
}
