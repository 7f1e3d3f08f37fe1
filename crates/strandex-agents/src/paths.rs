use std::path::PathBuf;

use regex::{Captures, Regex};

/// Expand `~` and environment variables (`$VAR`, `${VAR}`) in a path string.
///
/// Unset variables are left as written.
pub fn expand_path(path: &str) -> PathBuf {
    let mut result = path.to_string();

    if result.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            result = format!("{}{}", home.display(), &result[1..]);
        }
    } else if result == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    if !result.contains('$') {
        return PathBuf::from(result);
    }

    let Ok(re) = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?") else {
        return PathBuf::from(result);
    };
    let expanded = re.replace_all(&result, |caps: &Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    PathBuf::from(expanded.into_owned())
}
