use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderName, SERVER};

const X_POWERED_BY: &str = "x-powered-by";

/// Software identity and cache behavior read from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteMetadata {
    pub php_version: Option<String>,
    /// Never populated: no header reliably exposes the database version.
    pub mysql_version: Option<String>,
    pub caching: bool,
    pub web_server: Option<String>,
    pub web_server_version: Option<String>,
    pub cache_control: Option<String>,
    pub x_powered_by: Option<String>,
}

/// Scans every header value. A repeated header overwrites what an earlier
/// value set, except that cache-control values without any `max-age` leave
/// the caching flag alone.
pub fn extract(headers: &HeaderMap) -> SiteMetadata {
    let mut meta = SiteMetadata::default();
    let x_powered_by = HeaderName::from_static(X_POWERED_BY);

    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };

        if *name == SERVER {
            let (server, version) = split_product(value);
            meta.web_server = non_empty(server);
            meta.web_server_version = version.and_then(non_empty);
        } else if *name == x_powered_by {
            meta.x_powered_by = Some(value.to_string());
            if value.contains("PHP") {
                if let (_, Some(version)) = split_product(value) {
                    meta.php_version = non_empty(version);
                }
            }
        } else if *name == CACHE_CONTROL {
            meta.cache_control = Some(value.to_string());
            if value.contains("max-age=0") {
                meta.caching = false;
            } else if value.contains("max-age") {
                meta.caching = true;
            }
        }
    }

    meta
}

/// Splits `name/version` on the first slash.
fn split_product(value: &str) -> (&str, Option<&str>) {
    match value.split_once('/') {
        Some((name, version)) => (name, Some(version)),
        None => (value, None),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
