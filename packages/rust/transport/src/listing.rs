//! Directory listing wire format.
//!
//! The listing route answers with the child names of a directory joined by
//! `/`, e.g. `org.apache.cordova.geolocation/org.apache.cordova.camera`.
//! A missing directory answers with an empty body.

/// Split a listing body into child names, preserving order and duplicates.
pub fn parse_listing(body: &str) -> Vec<String> {
    body.trim()
        .split('/')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_empty_listing() {
        assert!(parse_listing("").is_empty());
        assert!(parse_listing("\n").is_empty());
    }

    #[test]
    fn preserves_order_and_duplicates() {
        assert_eq!(parse_listing("b/a/b"), vec!["b", "a", "b"]);
    }

    #[test]
    fn stray_separators_are_ignored() {
        assert_eq!(parse_listing("/geo.js//ui/"), vec!["geo.js", "ui"]);
    }
}
