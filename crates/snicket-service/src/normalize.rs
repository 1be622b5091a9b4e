use crate::error::ServiceError;
use url::Url;

/// Brings a raw URL into canonical form and extracts its domain.
///
/// Input without a scheme gets `http://` prepended before parsing; only
/// `http` and `https` pass validation. The parser lowercases the scheme
/// and host, the rest of the URL keeps its case. The returned domain is
/// the hostname without the port.
pub fn normalize_url(raw: &str) -> Result<(String, String), ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidUrl("url is empty".to_string()));
    }

    let candidate = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let parsed = Url::parse(&candidate).map_err(|e| ServiceError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ServiceError::InvalidUrl(format!(
                "unsupported scheme: {}",
                other
            )));
        }
    }

    let domain = parsed
        .host_str()
        .ok_or_else(|| ServiceError::InvalidUrl("url has no host".to_string()))?
        .to_string();

    Ok((parsed.to_string(), domain))
}

/// Whether the input starts with a scheme of its own.
///
/// Only the part before the first `://` counts, and only when it is
/// shaped like a scheme; a URL embedded in a path or query segment must
/// not stop the `http://` default from applying.
fn has_scheme(s: &str) -> bool {
    let Some((scheme, _)) = s.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}
