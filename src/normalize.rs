use url::Url;

/// Canonicalize a raw URL string into the form used as the dedup key:
/// fragment dropped, at most one trailing slash stripped. Returns `None`
/// when the input does not parse as an absolute URL.
pub fn normalize(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    url.set_fragment(None);
    let mut s = url.to_string();
    if s.ends_with('/') {
        s.pop();
    }
    Some(s)
}
