//! URI helpers shared by the plug and dispatch layers.

use url::Url;

/// Scheme used by in-process endpoints.
pub const LOCAL_SCHEME: &str = "local";

/// Non-empty path segments of a URI, still percent-encoded.
pub fn path_segments(uri: &Url) -> Vec<&str> {
    uri.path().split('/').filter(|s| !s.is_empty()).collect()
}

/// Append path segments to a URI, percent-encoding each one.
pub fn append_segments<I, S>(uri: &Url, segments: I) -> Url
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = uri.clone();
    let mut path: String = path_segments(uri)
        .iter()
        .map(|s| format!("/{}", s))
        .collect();
    for segment in segments {
        for piece in segment.as_ref().split('/').filter(|p| !p.is_empty()) {
            path.push('/');
            path.push_str(&encode_segment(piece));
        }
    }
    if path.is_empty() {
        path.push('/');
    }
    result.set_path(&path);
    result
}

/// Replace the path of `uri` with the given, already-encoded segments.
pub fn with_path_segments(uri: &Url, segments: &[&str]) -> Url {
    let mut result = uri.clone();
    let path = format!("/{}", segments.join("/"));
    result.set_path(&path);
    result
}

/// Check whether two URIs share scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme().eq_ignore_ascii_case(b.scheme())
        && a.host_str().map(str::to_ascii_lowercase) == b.host_str().map(str::to_ascii_lowercase)
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Check whether a URI addresses an in-process endpoint.
pub fn is_local(uri: &Url) -> bool {
    uri.scheme().eq_ignore_ascii_case(LOCAL_SCHEME)
}

fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
