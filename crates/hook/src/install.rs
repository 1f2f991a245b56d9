// crates/hook/src/install.rs
//! Post-commit hook installation.
//!
//! Writes `.git/hooks/post-commit` so every commit spawns the worker
//! detached and the commit itself can never fail because of it. A
//! pre-existing hook is backed up first with a timestamped suffix,
//! mode preserved.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Not a git repository: {path}")]
    NotARepo { path: PathBuf },

    #[error("IO error writing hook {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Render the hook script. In background mode the worker is spawned
/// detached with stdio redirected; either way the last command is
/// `|| true`-guarded.
fn hook_script(background: bool, timeout_secs: u64) -> String {
    let mut script = String::from("#!/bin/sh\n");
    script.push_str("# Installed by commit-story. Regenerate with: commit-story-hook install\n");
    script.push_str("COMMIT_HASH=$(git rev-parse HEAD)\n");
    script.push_str("REPO_PATH=$(git rev-parse --show-toplevel)\n");

    let worker = format!(
        "commit-story-hook run --commit-hash \"$COMMIT_HASH\" \
         --repo-path \"$REPO_PATH\" --timeout {timeout_secs}"
    );
    if background {
        script.push_str(&format!("(nohup {worker} >/dev/null 2>&1 &) || true\n"));
    } else {
        script.push_str(&format!("{worker} >/dev/null 2>&1 || true\n"));
    }
    script
}

/// Backup path for an existing hook: `.backup.<YYYYMMDD-HHMMSS>`, with
/// a numeric suffix when the same second collides.
fn backup_path(hook_path: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let base = hook_path.with_extension(format!("backup.{stamp}"));
    if !base.exists() {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = hook_path.with_extension(format!("backup.{stamp}.{n}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Install (or replace) the post-commit hook. Returns the hook path.
pub fn install_post_commit(
    repo: &Path,
    background: bool,
    timeout_secs: u64,
) -> Result<PathBuf, InstallError> {
    let git_dir = repo.join(".git");
    if !git_dir.is_dir() {
        return Err(InstallError::NotARepo {
            path: repo.to_path_buf(),
        });
    }

    let hooks_dir = git_dir.join("hooks");
    fs::create_dir_all(&hooks_dir).map_err(|e| InstallError::Io {
        path: hooks_dir.clone(),
        source: e,
    })?;

    let hook_path = hooks_dir.join("post-commit");

    if hook_path.exists() {
        let backup = backup_path(&hook_path);
        // fs::copy carries permissions along with the content.
        fs::copy(&hook_path, &backup).map_err(|e| InstallError::Io {
            path: backup.clone(),
            source: e,
        })?;
        info!("existing hook backed up to {}", backup.display());
    }

    fs::write(&hook_path, hook_script(background, timeout_secs)).map_err(|e| InstallError::Io {
        path: hook_path.clone(),
        source: e,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&hook_path, fs::Permissions::from_mode(0o755)).map_err(|e| {
            InstallError::Io {
                path: hook_path.clone(),
                source: e,
            }
        })?;
    }

    info!("post-commit hook installed at {}", hook_path.display());
    Ok(hook_path)
}
