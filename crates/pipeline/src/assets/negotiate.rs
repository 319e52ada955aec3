//! Content negotiation: `Accept-Encoding` and `If-None-Match`.

use std::fmt::{Display, Formatter};

/// The representations an asset is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Encoding {
    Identity,
    Deflate,
    Gzip,
    Br,
}

impl Encoding {
    /// Server preference among the compressed encodings, best first.
    pub const PREFERENCE: [Encoding; 3] = [Encoding::Br, Encoding::Deflate, Encoding::Gzip];

    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Identity => "identity",
            Encoding::Deflate => "deflate",
            Encoding::Gzip => "gzip",
            Encoding::Br => "br",
        }
    }
}

impl Display for Encoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `Accept-Encoding` header.
#[derive(Debug, Default)]
struct AcceptEncoding<'a> {
    codings: Vec<(&'a str, f32)>,
}

impl<'a> AcceptEncoding<'a> {
    fn parse(header: &'a str) -> Self {
        let codings = header
            .split(',')
            .filter_map(|item| {
                let mut parts = item.split(';');
                let coding = parts.next()?.trim();
                if coding.is_empty() {
                    return None;
                }
                let quality = parts
                    .filter_map(|param| param.trim().strip_prefix("q=").or_else(|| param.trim().strip_prefix("Q=")))
                    .find_map(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((coding, quality))
            })
            .collect();
        Self { codings }
    }

    /// Quality for `coding`: its own entry, else the `*` entry.
    fn quality(&self, coding: &str) -> Option<f32> {
        let exact = self.codings.iter().find(|(name, _)| name.eq_ignore_ascii_case(coding));
        exact.or_else(|| self.codings.iter().find(|(name, _)| *name == "*")).map(|(_, q)| *q)
    }

    fn accepts(&self, coding: &str) -> bool {
        self.quality(coding).is_some_and(|q| q > 0.0)
    }
}

/// Picks the encoding to answer with among the `available` ones.
///
/// Compressed encodings accepted by the client (q > 0, explicitly or through `*`) are
/// tried in server preference order; everything else falls back to identity.
pub fn negotiate(accept_encoding: Option<&str>, available: &[Encoding]) -> Encoding {
    let Some(header) = accept_encoding else {
        return Encoding::Identity;
    };
    let accept = AcceptEncoding::parse(header);
    Encoding::PREFERENCE
        .into_iter()
        .find(|encoding| available.contains(encoding) && accept.accepts(encoding.as_str()))
        .unwrap_or(Encoding::Identity)
}

/// Whether an `If-None-Match` header value matches `etag`.
///
/// The header is a comma separated list of entity tags, weak tags compare by their opaque
/// value and `*` matches anything.
pub fn none_match(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}

#[cfg(test)]
mod tests {
    use super::{negotiate, none_match, Encoding};

    const ALL: [Encoding; 4] = [Encoding::Identity, Encoding::Deflate, Encoding::Gzip, Encoding::Br];

    #[test]
    fn test_preference_order() {
        assert_eq!(negotiate(Some("gzip, deflate, br"), &ALL), Encoding::Br);
        assert_eq!(negotiate(Some("gzip, deflate"), &ALL), Encoding::Deflate);
        assert_eq!(negotiate(Some("gzip"), &ALL), Encoding::Gzip);
        assert_eq!(negotiate(Some("gzip"), &[Encoding::Identity, Encoding::Gzip, Encoding::Br]), Encoding::Gzip);
    }

    #[test]
    fn test_fallback_to_identity() {
        assert_eq!(negotiate(None, &ALL), Encoding::Identity);
        assert_eq!(negotiate(Some(""), &ALL), Encoding::Identity);
        assert_eq!(negotiate(Some("compress"), &ALL), Encoding::Identity);
        assert_eq!(negotiate(Some("br, gzip"), &[Encoding::Identity]), Encoding::Identity);
    }

    #[test]
    fn test_quality_values() {
        assert_eq!(negotiate(Some("br;q=0, gzip;q=0.5"), &ALL), Encoding::Gzip);
        assert_eq!(negotiate(Some("*"), &ALL), Encoding::Br);
        assert_eq!(negotiate(Some("*;q=0.1, br;q=0"), &ALL), Encoding::Deflate);
        assert_eq!(negotiate(Some("*;q=0"), &ALL), Encoding::Identity);
        assert_eq!(negotiate(Some("GZIP; Q=1.0"), &ALL), Encoding::Gzip);
    }

    #[test]
    fn test_none_match() {
        let etag = "\"abc\"";
        assert!(none_match("\"abc\"", etag));
        assert!(none_match("\"x\", \"abc\"", etag));
        assert!(none_match("W/\"abc\"", etag));
        assert!(none_match("*", etag));
        assert!(!none_match("\"abcd\"", etag));
        assert!(!none_match("abc", etag));
    }
}
