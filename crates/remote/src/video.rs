//! Video link normalization.
//!
//! Accepted links are rewritten to an embeddable form so the render surface
//! can inline them directly. The parser is a lightweight string scan; a link
//! it cannot make sense of normalizes to `None`, never an error.

const EMBED_PREFIX: &str = "https://www.youtube.com/embed/";
const SHORT_LINK_HOSTS: [&str; 2] = ["youtu.be", "www.youtu.be"];

/// Normalizes a raw video link to an embeddable URL.
///
/// A URL carrying a `v` query parameter becomes an embed-path URL for that
/// value; a short-link host becomes an embed-path URL for its path; any
/// other well-formed http(s) URL passes through unchanged. Everything else,
/// including the empty string, normalizes to `None`.
pub fn normalize_video_link(raw: &str) -> Option<String> {
    let raw = raw.trim();

    let rest = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))?;

    let (host, tail) = split_host(rest);
    if host.is_empty() {
        return None;
    }

    if let Some(video_id) = query_param(tail, "v")
        && !video_id.is_empty()
    {
        return Some(format!("{EMBED_PREFIX}{video_id}"));
    }

    if SHORT_LINK_HOSTS.contains(&host) {
        let video_id = path_of(tail);
        if video_id.is_empty() {
            return None;
        }
        return Some(format!("{EMBED_PREFIX}{video_id}"));
    }

    Some(raw.to_string())
}

/// Splits `host[/path][?query][#fragment]` into the host and everything after.
fn split_host(rest: &str) -> (&str, &str) {
    match rest.find(['/', '?', '#']) {
        Some(position) => (&rest[..position], &rest[position..]),
        None => (rest, ""),
    }
}

/// Returns the path portion of a host tail, without slashes, query, or
/// fragment.
fn path_of(tail: &str) -> &str {
    let path = tail.strip_prefix('/').unwrap_or(tail);
    let end = path.find(['?', '#']).unwrap_or(path.len());
    path[..end].trim_matches('/')
}

/// Scans the query string of a host tail for one parameter value.
fn query_param<'a>(tail: &'a str, name: &str) -> Option<&'a str> {
    let query_start = tail.find('?')?;
    let query = &tail[query_start + 1..];
    let query = &query[..query.find('#').unwrap_or(query.len())];

    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=')
            && key == name
        {
            return Some(value);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_link_rewrites_to_embed_form() {
        assert_eq!(
            normalize_video_link("https://youtu.be/abc123").as_deref(),
            Some("https://www.youtube.com/embed/abc123")
        );
    }

    #[test]
    fn watch_parameter_rewrites_to_embed_form() {
        assert_eq!(
            normalize_video_link("https://youtube.com/watch?v=abc123").as_deref(),
            Some("https://www.youtube.com/embed/abc123")
        );
        assert_eq!(
            normalize_video_link("https://www.youtube.com/watch?list=pl7&v=abc123").as_deref(),
            Some("https://www.youtube.com/embed/abc123")
        );
    }

    #[test]
    fn malformed_input_normalizes_to_none() {
        assert_eq!(normalize_video_link("not a url"), None);
        assert_eq!(normalize_video_link(""), None);
        assert_eq!(normalize_video_link("https://"), None);
        assert_eq!(normalize_video_link("ftp://youtu.be/abc"), None);
    }

    #[test]
    fn short_link_without_an_id_is_empty() {
        assert_eq!(normalize_video_link("https://youtu.be/"), None);
        assert_eq!(normalize_video_link("https://youtu.be"), None);
    }

    #[test]
    fn other_urls_pass_through_unchanged() {
        assert_eq!(
            normalize_video_link("https://example.com/clips/saving.mp4").as_deref(),
            Some("https://example.com/clips/saving.mp4")
        );
    }
}
