#![forbid(unsafe_code)]

use url::Url;

/// Identifier of a source location that is safe to log.
///
/// URLs lose their username and password; anything that does not parse
/// as a URL (plain paths) is returned unchanged.
#[must_use]
pub fn redact(location: &str) -> String {
    let Ok(mut url) = Url::parse(location) else {
        return location.to_string();
    };
    if url.cannot_be_a_base() {
        return url.to_string();
    }
    if !url.username().is_empty() {
        let _ = url.set_username("USERNAME");
    }
    if url.password().is_some() {
        let _ = url.set_password(Some("PASSWORD"));
    }
    url.to_string()
}
