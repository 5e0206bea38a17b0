use std::sync::LazyLock;

use regex::Regex;

static GENERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"content="WordPress (\d+\.\d+(?:\.\d+)?)""#).expect("generator pattern")
});

/// Version from the first `content="WordPress X.Y[.Z]"` generator marker.
pub fn extract_wordpress_version(body: &str) -> Option<String> {
    GENERATOR
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
