//! Module path validation and catalog escaping.

/// Synthetic module path the catalog uses for standard-library entries.
pub const STDLIB_MODULE: &str = "stdlib";

/// Synthetic module path the catalog uses for toolchain entries.
pub const TOOLCHAIN_MODULE: &str = "toolchain";

/// Reports whether `path` is a syntactically plausible module path.
///
/// This is a soft check gating database lookups, not a full validator: each
/// slash-separated element must be non-empty, must not be `.` or `..`, and
/// must consist of characters module paths may carry.
pub fn check_module_path(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
        return false;
    }
    path.split('/').all(|elem| {
        !elem.is_empty()
            && elem != "."
            && elem != ".."
            && elem
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '+' | '!'))
    })
}

/// Reports whether an import path belongs to the standard library: its first
/// path segment contains no dot.
pub fn is_std_package(pkg_path: &str) -> bool {
    if pkg_path.is_empty() {
        return false;
    }
    let first = pkg_path.split('/').next().unwrap_or(pkg_path);
    !first.contains('.')
}

/// Escapes a module path for use as a catalog file name: each uppercase
/// letter `X` becomes `!x`. Synthetic module names pass through unchanged.
pub fn escape_module_path(path: &str) -> String {
    if path == STDLIB_MODULE || path == TOOLCHAIN_MODULE {
        return path.to_string();
    }
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    mod check_module_path {
        use super::*;

        #[test]
        fn accepts_ordinary_paths() {
            assert!(check_module_path("golang.org/x/net"));
            assert!(check_module_path("b.com/m"));
            assert!(check_module_path("stdlib"));
        }

        #[test]
        fn rejects_malformed_paths() {
            assert!(!check_module_path(""));
            assert!(!check_module_path("/leading"));
            assert!(!check_module_path("trailing/"));
            assert!(!check_module_path("a//b"));
            assert!(!check_module_path("a/../b"));
            assert!(!check_module_path("has space/m"));
        }
    }

    mod is_std_package {
        use super::*;

        #[test]
        fn no_dot_in_first_segment_is_std() {
            assert!(is_std_package("net/http"));
            assert!(is_std_package("fmt"));
        }

        #[test]
        fn dotted_first_segment_is_not_std() {
            assert!(!is_std_package("golang.org/x/net/http2"));
            assert!(!is_std_package("b.com/m"));
        }

        #[test]
        fn empty_is_not_std() {
            assert!(!is_std_package(""));
        }
    }

    mod escape_module_path {
        use super::*;

        #[test]
        fn uppercase_letters_are_bang_escaped() {
            assert_eq!(
                escape_module_path("github.com/RoaringBitmap/roaring"),
                "github.com/!roaring!bitmap/roaring"
            );
        }

        #[test]
        fn lowercase_paths_are_unchanged() {
            assert_eq!(escape_module_path("b.com/m"), "b.com/m");
        }

        #[test]
        fn synthetic_names_pass_through() {
            assert_eq!(escape_module_path("stdlib"), "stdlib");
            assert_eq!(escape_module_path("toolchain"), "toolchain");
        }
    }
}
