// crates/cursor-db/src/platform.rs
//! Per-OS resolution of Cursor's storage locations.
//!
//! Single source of truth for where workspace databases live —
//! everything else in this crate receives paths, never guesses them.

use std::path::PathBuf;

/// Filename of the per-workspace (and global) SQLite store.
pub const WORKSPACE_DB_NAME: &str = "state.vscdb";

/// Cursor's `User/` directory for the current OS, when resolvable.
///
/// - macOS: `~/Library/Application Support/Cursor/User`
/// - Windows: `%APPDATA%/Cursor/User`
/// - Linux: `~/.config/Cursor/User`
fn cursor_user_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir().map(|h| h.join("Library/Application Support/Cursor/User"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        // dirs::config_dir() is %APPDATA% on Windows and ~/.config on Linux.
        dirs::config_dir().map(|c| c.join("Cursor").join("User"))
    }
}

/// Ordered list of existing `workspaceStorage` roots.
///
/// The OS default comes first, then any configured extra roots in their
/// given order. Roots that don't exist on disk are skipped silently.
pub fn workspace_storage_roots(extra_roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(user_dir) = cursor_user_dir() {
        roots.push(user_dir.join("workspaceStorage"));
    }
    roots.extend(extra_roots.iter().cloned());
    roots.retain(|root| root.is_dir());
    roots
}

/// The global database holding message headers and bubbles, derived
/// from a workspace-storage root (`<User>/globalStorage/state.vscdb`).
pub fn global_storage_db(workspace_storage_root: &std::path::Path) -> Option<PathBuf> {
    workspace_storage_root
        .parent()
        .map(|user| user.join("globalStorage").join(WORKSPACE_DB_NAME))
}
