//! Helpers for remote (always `/`-separated) paths

/// Whether the path is absolute
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Append a trailing slash unless present
pub fn include_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Drop a trailing slash, keeping the root intact
pub fn exclude_trailing_slash(path: &str) -> String {
    if path.len() > 1 && path.ends_with('/') {
        path.trim_end_matches('/').to_string()
    } else {
        path.to_string()
    }
}

/// Join a directory and a name
pub fn join(directory: &str, name: &str) -> String {
    if directory.is_empty() {
        return name.to_string();
    }
    format!("{}{}", include_trailing_slash(directory), name)
}

/// Last component of a path
pub fn file_name(path: &str) -> &str {
    let trimmed = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Directory part of a path without trailing slash
///
/// Returns an empty string for bare names and `/` for root-level paths.
pub fn parent(path: &str) -> String {
    let trimmed = exclude_trailing_slash(path);
    match trimmed.rfind('/') {
        Some(0) if trimmed.len() > 1 => "/".to_string(),
        Some(0) | None => String::new(),
        Some(index) => trimmed[..index].to_string(),
    }
}

/// Compare two paths ignoring trailing slashes
pub fn same_path(left: &str, right: &str) -> bool {
    exclude_trailing_slash(left) == exclude_trailing_slash(right)
}

/// Whether `child` lies inside `parent` (or equals it) at a component boundary
pub fn is_child_of(parent: &str, child: &str) -> bool {
    let parent = exclude_trailing_slash(parent);
    let child = exclude_trailing_slash(child);
    if parent == "/" {
        return is_absolute(&child);
    }
    child == parent || child.starts_with(&format!("{}/", parent))
}

/// Resolve `name` against `base` and normalize `.` and `..` components
pub fn expand(name: &str, base: &str) -> String {
    let joined = if is_absolute(name) {
        name.to_string()
    } else {
        join(base, name)
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Translate between real paths and paths virtualized below a lock directory
///
/// With `lock` set, the lock prefix is stripped (`/home/user/a` becomes `/a`).
/// Without it, the prefix is restored. An empty lock directory or a relative
/// path leaves the path unchanged.
pub fn translate_locked(path: &str, lock_directory: &str, lock: bool) -> String {
    if lock_directory.is_empty() || path.is_empty() || !is_absolute(path) {
        return path.to_string();
    }
    let lock_directory = exclude_trailing_slash(lock_directory);
    if lock {
        if is_child_of(&lock_directory, path) && lock_directory != "/" {
            let rest = &path[lock_directory.len()..];
            if rest.is_empty() {
                "/".to_string()
            } else {
                rest.to_string()
            }
        } else {
            path.to_string()
        }
    } else if lock_directory == "/" {
        path.to_string()
    } else {
        exclude_trailing_slash(&format!("{}{}", lock_directory, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("/home/user/file.txt", "/home/user")]
    #[case("/file.txt", "/")]
    #[case("/", "")]
    #[case("file.txt", "")]
    #[case("/home/user/", "/home")]
    fn test_parent(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(parent(path), expected);
    }

    #[rstest]
    #[case("a/../b", "/x", "/x/b")]
    #[case("..", "/x/y", "/x")]
    #[case("/abs/./c", "/ignored", "/abs/c")]
    #[case("..", "/", "/")]
    fn test_expand(#[case] name: &str, #[case] base: &str, #[case] expected: &str) {
        assert_eq!(expand(name, base), expected);
    }

    #[test]
    fn test_child_requires_component_boundary() {
        assert!(is_child_of("/home/u", "/home/u/docs"));
        assert!(is_child_of("/home/u", "/home/u"));
        assert!(!is_child_of("/home/u", "/home/user2"));
        assert!(is_child_of("/", "/anything"));
    }

    #[test]
    fn test_translate_locked() {
        assert_eq!(translate_locked("/home/u/docs", "/home/u", true), "/docs");
        assert_eq!(translate_locked("/home/u", "/home/u", true), "/");
        assert_eq!(translate_locked("/docs", "/home/u", false), "/home/u/docs");
        assert_eq!(translate_locked("/", "/home/u", false), "/home/u");
        assert_eq!(translate_locked("relative", "/home/u", false), "relative");
        assert_eq!(translate_locked("/etc", "", true), "/etc");
    }

    proptest! {
        #[test]
        fn test_locked_translation_round_trips(
            lock in "(/[a-z]{1,8}){1,3}",
            rest in "(/[a-z0-9._-]{1,8}){0,4}"
        ) {
            let real = format!("{}{}", lock, rest);
            let virtual_path = translate_locked(&real, &lock, true);
            prop_assert!(is_absolute(&virtual_path));
            prop_assert_eq!(translate_locked(&virtual_path, &lock, false), real);
        }
    }
}
