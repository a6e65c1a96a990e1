//! # chrome-locate
//!
//! Find a Chrome or Chromium executable that can run in headless mode, so
//! callers of the `mdpress` renderer never have to spell out a browser path
//! on a typical workstation or CI image.
//!
//! ## How it works
//!
//! On first call to [`locate_chrome`]:
//!
//! 1. Uses the explicit path passed by the caller, if any.
//! 2. Otherwise uses `MDPRESS_CHROME_PATH` when it points to an existing file.
//! 3. Otherwise probes the well-known install locations for the platform.
//! 4. Otherwise searches `PATH` for the usual executable names.
//!
//! The auto-detected path (steps 2–4) is cached for the lifetime of the
//! process; later calls skip the file-system probe entirely.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chrome_locate::{locate_chrome, profile_root};
//!
//! let chrome = locate_chrome(None).expect("no Chromium installed");
//! let profiles = profile_root();
//! println!("{} (profiles in {})", chrome.display(), profiles.display());
//! ```
//!
//! ## Platform support
//!
//! | OS      | Probed locations                                             |
//! |---------|--------------------------------------------------------------|
//! | macOS   | `/Applications/Google Chrome.app`, `Chromium.app`, `~/Applications` |
//! | Linux   | `/usr/bin/{chromium,chromium-browser,google-chrome}`, snap   |
//! | Windows | `%ProgramFiles%` / `%LOCALAPPDATA%` Chrome and Edge installs |
//!
//! ## Environment variable overrides
//!
//! - `MDPRESS_CHROME_PATH` — path to a browser executable; skips probing.
//! - `MDPRESS_PROFILE_DIR` — override the directory holding browser profiles.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable naming an explicit browser executable.
pub const CHROME_PATH_ENV: &str = "MDPRESS_CHROME_PATH";

/// Environment variable overriding [`profile_root`].
pub const PROFILE_DIR_ENV: &str = "MDPRESS_PROFILE_DIR";

/// Executable names searched on `PATH`, most specific first.
const PATH_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "msedge",
];

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by chrome-locate operations.
#[derive(Error, Debug)]
pub enum LocateError {
    /// The caller named a path that does not exist.
    #[error("Browser executable not found at '{path}'")]
    Missing { path: PathBuf },

    /// Nothing usable was found anywhere.
    #[error(
        "No Chrome or Chromium executable found.\n\
Install Chromium, or set {CHROME_PATH_ENV}=/path/to/chrome.\n\
Searched: {searched}"
    )]
    NotFound { searched: String },
}

// ── Internal: platform candidates ────────────────────────────────────────────

/// Well-known install locations for the current platform, in probe order.
fn candidate_paths() -> Vec<PathBuf> {
    let mut out = Vec::new();

    match std::env::consts::OS {
        "macos" => {
            let bundles = [
                "Google Chrome.app/Contents/MacOS/Google Chrome",
                "Chromium.app/Contents/MacOS/Chromium",
                "Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
            ];
            for bundle in bundles {
                out.push(PathBuf::from("/Applications").join(bundle));
                if let Some(home) = dirs::home_dir() {
                    out.push(home.join("Applications").join(bundle));
                }
            }
        }
        "linux" => {
            for p in [
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
                "/usr/bin/google-chrome",
                "/usr/bin/google-chrome-stable",
                "/snap/bin/chromium",
                "/opt/google/chrome/chrome",
            ] {
                out.push(PathBuf::from(p));
            }
        }
        "windows" => {
            let rel = [
                r"Google\Chrome\Application\chrome.exe",
                r"Chromium\Application\chrome.exe",
                r"Microsoft\Edge\Application\msedge.exe",
            ];
            let roots = ["ProgramFiles", "ProgramFiles(x86)", "LOCALAPPDATA"]
                .iter()
                .filter_map(|var| std::env::var_os(var).map(PathBuf::from));
            for root in roots {
                for r in rel {
                    out.push(root.join(r));
                }
            }
        }
        _ => {}
    }

    out
}

/// First of `names` that resolves on `PATH`.
fn search_path(names: &[&str]) -> Option<PathBuf> {
    names.iter().find_map(|name| which::which(name).ok())
}

// ── Profile directory resolution ─────────────────────────────────────────────

/// Returns the directory under which per-instance browser profiles live.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/mdpress/profiles/`
/// - **Linux**: `~/.cache/mdpress/profiles/`
/// - **Windows**: `%LOCALAPPDATA%\mdpress\profiles\`
///
/// Override by setting `MDPRESS_PROFILE_DIR`.
pub fn profile_root() -> PathBuf {
    if let Ok(override_dir) = std::env::var(PROFILE_DIR_ENV) {
        return PathBuf::from(override_dir);
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("mdpress").join("profiles")
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns the browser path found by an earlier [`locate_chrome`] call, if any.
pub fn cached_chrome_path() -> Option<PathBuf> {
    RESOLVED_PATH.get().cloned()
}

/// Resolves the browser executable.
///
/// An `explicit` path is returned as-is when it exists and is never cached;
/// a missing explicit path is an error rather than a reason to fall back,
/// since the caller asked for that browser specifically.
///
/// # Thread safety
///
/// Safe to call from multiple threads simultaneously; probing happens at
/// most a handful of times and the first result wins the cache.
pub fn locate_chrome(explicit: Option<&Path>) -> Result<PathBuf, LocateError> {
    if let Some(p) = explicit {
        if p.exists() {
            return Ok(p.to_path_buf());
        }
        return Err(LocateError::Missing {
            path: p.to_path_buf(),
        });
    }

    // Fast path: already resolved in this process.
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = probe()?;

    // Ignore the race; both threads found a working browser.
    let _ = RESOLVED_PATH.set(path.clone());

    Ok(path)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn probe() -> Result<PathBuf, LocateError> {
    // 1. Environment variable override.
    if let Ok(env_path) = std::env::var(CHROME_PATH_ENV) {
        let p = PathBuf::from(env_path);
        if p.exists() {
            return Ok(p);
        }
        // Fall through: env var set but file missing → keep probing.
    }

    // 2. Well-known install locations.
    let candidates = candidate_paths();
    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return Ok(found.clone());
    }

    // 3. PATH search.
    if let Some(found) = search_path(PATH_NAMES) {
        return Ok(found);
    }

    let mut searched: Vec<String> = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    searched.push(format!("$PATH ({})", PATH_NAMES.join(", ")));

    Err(LocateError::NotFound {
        searched: searched.join(", "),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_is_used_verbatim() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let found = locate_chrome(Some(file.path())).unwrap();
        assert_eq!(found, file.path());
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = locate_chrome(Some(Path::new("/definitely/not/chrome"))).unwrap_err();
        assert!(matches!(err, LocateError::Missing { .. }));
        assert!(err.to_string().contains("/definitely/not/chrome"));
    }

    #[test]
    fn profile_root_override_via_env() {
        std::env::set_var(PROFILE_DIR_ENV, "/tmp/test_mdpress_profiles");
        let d1 = profile_root();
        let d2 = profile_root();
        std::env::remove_var(PROFILE_DIR_ENV);
        assert_eq!(d1, PathBuf::from("/tmp/test_mdpress_profiles"));
        assert_eq!(d1, d2);
    }

    #[test]
    fn search_path_finds_nothing_for_unknown_names() {
        assert!(search_path(&["mdpress-no-such-browser-binary"]).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn search_path_falls_through_to_later_names() {
        let found = search_path(&["mdpress-no-such-browser-binary", "sh"]).unwrap();
        assert!(found.ends_with("sh"), "{}", found.display());
        assert!(found.is_absolute());
    }

    #[test]
    fn not_found_message_names_env_var() {
        let err = LocateError::NotFound {
            searched: "/usr/bin/chromium".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains(CHROME_PATH_ENV));
        assert!(msg.contains("/usr/bin/chromium"));
    }
}
