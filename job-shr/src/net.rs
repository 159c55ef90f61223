//! Small URL helpers.

use regex::Regex;
use url::Url;

/// Prefixes `url` with `http://` (or `https://` if `secure`) unless it
/// already carries a schema, then validates the result parses as a URL.
pub fn ensure_http_schema<S: Into<String>>(url: S, secure: bool) -> Result<String, url::ParseError> {
    let url = url.into();
    let re = Regex::new(r"^https?://.*").unwrap();

    let url = if re.is_match(&url) { url } else { format!("{}://{}", if secure { "https" } else { "http" }, url) };

    let _ = Url::parse(&url)?;
    Ok(url)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_schema_gets_one_added() {
        assert_eq!(ensure_http_schema("localhost:8080", false).unwrap(), "http://localhost:8080");
        assert_eq!(ensure_http_schema("localhost:8080", true).unwrap(), "https://localhost:8080");
    }

    #[test]
    fn existing_schema_is_left_alone() {
        assert_eq!(ensure_http_schema("http://localhost:8080", true).unwrap(), "http://localhost:8080");
        assert_eq!(ensure_http_schema("https://localhost:8080", false).unwrap(), "https://localhost:8080");
    }
}
