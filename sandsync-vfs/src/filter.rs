//! Path filtering for generated artifacts
//!
//! Paths under dependency caches, build output, and version-control
//! metadata are excluded from all watcher emissions so that generated
//! files are never synchronized.

/// Directory segments that are never watched or synchronized.
const IGNORED_SEGMENTS: &[&str] = &[
    "node_modules",
    ".next",
    "build",
    "dist",
    "out",
    "coverage",
    ".turbo",
    ".cache",
    ".git",
    ".svelte-kit",
    ".nuxt",
    ".vite",
];

/// Check whether a sandbox-relative path should be excluded from
/// watcher emissions.
///
/// A path is ignored when any segment is a known dependency/build/VCS
/// directory, or when any segment is a dotfile other than an
/// environment file (`.env`, `.env.local`, ...).
///
/// The dotfile rule applies to every segment, not just the leading
/// one: nested editor and OS droppings such as `src/.DS_Store` are
/// excluded too, even where a looser top-level-only rule would let
/// them through.
pub fn is_ignored_path(path: &str) -> bool {
    let normalized = path.trim_start_matches('/');
    for segment in normalized.split('/') {
        if segment.is_empty() {
            continue;
        }
        if IGNORED_SEGMENTS.contains(&segment) {
            return true;
        }
        if segment.starts_with('.') && !segment.starts_with(".env") {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignores_dependency_dirs() {
        assert!(is_ignored_path("node_modules/react/index.js"));
        assert!(is_ignored_path("src/node_modules/pkg/a.js"));
        assert!(is_ignored_path("dist/bundle.js"));
        assert!(is_ignored_path(".git/HEAD"));
    }

    #[test]
    fn test_ignores_dotfiles_except_env() {
        assert!(is_ignored_path(".npmrc"));
        assert!(is_ignored_path("src/.DS_Store"));
        assert!(!is_ignored_path(".env"));
        assert!(!is_ignored_path(".env.local"));
    }

    #[test]
    fn test_keeps_regular_paths() {
        assert!(!is_ignored_path("src/index.ts"));
        assert!(!is_ignored_path("package.json"));
        assert!(!is_ignored_path("/src/lib/util.ts"));
    }
}
