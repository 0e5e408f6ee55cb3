//! Lookup-key normalization
//!
//! Raw display names and URLs arrive in whatever shape the source system
//! used. Stable lookup keys are derived here, once, before any resolution
//! attempt. The derivations are pure: identical input always yields the
//! identical key.

/// Derive a stable slug from a display name.
///
/// Lower-cased, with every run of non-alphanumeric characters collapsed to
/// a single `-`. Leading and trailing separators are stripped. An empty or
/// all-punctuation name yields an empty slug — callers reject empty names
/// before resolution, so an empty slug never reaches the store.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_sep = true;
        }
    }

    slug
}

/// Normalize a URL into its canonical lookup form.
///
/// Scheme and host are lower-cased, a default port and any trailing slash
/// are stripped, and the query string and fragment are dropped. Two source
/// records pointing at the same page with different tracking parameters
/// resolve to the same key. Returns `None` for input with no recognizable
/// host.
pub fn canonical_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Split off the scheme; bare "example.org/path" is treated as https.
    let (scheme, rest) = match trimmed.split_once("://") {
        Some((s, r)) => (s.to_lowercase(), r),
        None => ("https".to_string(), trimmed),
    };

    // Drop fragment first, then query.
    let rest = rest.split('#').next().unwrap_or(rest);
    let rest = rest.split('?').next().unwrap_or(rest);

    let (host, path) = match rest.split_once('/') {
        Some((h, p)) => (h, Some(p)),
        None => (rest, None),
    };

    if host.is_empty() {
        return None;
    }

    let mut host = host.to_lowercase();
    // Only the scheme's own default port is redundant; an explicit
    // off-scheme port names a different endpoint.
    let default_port = match scheme.as_str() {
        "http" => Some(":80"),
        "https" => Some(":443"),
        _ => None,
    };
    if let Some(port) = default_port {
        if let Some(bare) = host.strip_suffix(port) {
            host = bare.to_string();
        }
    }

    let mut canonical = format!("{}://{}", scheme, host);
    if let Some(path) = path {
        let path = path.trim_end_matches('/');
        if !path.is_empty() {
            canonical.push('/');
            canonical.push_str(path);
        }
    }

    Some(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Scenario: identical input, identical slug ===
    #[test]
    fn slug_is_deterministic() {
        let a = slugify("Brisbane Youth Detention Centre");
        let b = slugify("Brisbane Youth Detention Centre");
        assert_eq!(a, b);
        assert_eq!(a, "brisbane-youth-detention-centre");
    }

    #[test]
    fn slug_collapses_punctuation_runs() {
        assert_eq!(slugify("Legal Aid — QLD (Youth)"), "legal-aid-qld-youth");
        assert_eq!(slugify("  A  &  B  "), "a-b");
    }

    #[test]
    fn slug_of_empty_name_is_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slug_lowercases_unicode() {
        assert_eq!(slugify("Überlingen Café"), "überlingen-café");
    }

    // === Scenario: same page, different tracking parameters ===
    #[test]
    fn url_drops_query_and_fragment() {
        assert_eq!(
            canonical_url("https://example.org/services?utm_source=x#top"),
            Some("https://example.org/services".to_string())
        );
    }

    #[test]
    fn url_strips_trailing_slash_and_default_port() {
        assert_eq!(
            canonical_url("HTTPS://Example.ORG:443/programs/"),
            Some("https://example.org/programs".to_string())
        );
        assert_eq!(
            canonical_url("http://example.org:80/"),
            Some("http://example.org".to_string())
        );
    }

    // === Scenario: an off-scheme port is a different endpoint ===
    #[test]
    fn url_keeps_non_default_ports() {
        assert_eq!(
            canonical_url("http://example.org:443/"),
            Some("http://example.org:443".to_string())
        );
        assert_eq!(
            canonical_url("https://example.org:80"),
            Some("https://example.org:80".to_string())
        );
        assert_eq!(
            canonical_url("https://example.org:8080/api"),
            Some("https://example.org:8080/api".to_string())
        );
    }

    #[test]
    fn url_without_scheme_assumes_https() {
        assert_eq!(
            canonical_url("example.org/about"),
            Some("https://example.org/about".to_string())
        );
    }

    #[test]
    fn url_with_no_host_is_none() {
        assert_eq!(canonical_url(""), None);
        assert_eq!(canonical_url("   "), None);
        assert_eq!(canonical_url("https:///path"), None);
    }
}
