//! Parsing of module endpoint URLs
//!
//! Module URLs are not RFC 3986: protocols are module catalog names
//! (`file`, `ftp`, `srb`, ...), `file:/path` has no authority, and a
//! dynamic destination carries a `$DYNAMIC` host placeholder. Parsing
//! decomposes into owned {protocol, host, path} parts so alternate
//! protocol pairs can rewrite URLs without truncation or normalization.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A decomposed endpoint URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUrl {
    /// Protocol name, selects the module to run
    pub protocol: String,
    /// Host part; empty for authority-less forms like `file:/path`
    pub host: String,
    /// Path part, keeps its leading slash when present
    pub path: String,
}

impl SiteUrl {
    /// Parse a URL of the form `proto://host/path` or `proto:path`.
    pub fn parse(url: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let url = url.trim();
        if let Some((protocol, rest)) = url.split_once("://") {
            if protocol.is_empty() {
                return Err(invalid("empty protocol"));
            }
            if rest.is_empty() {
                return Err(invalid("missing host"));
            }
            let (host, path) = match rest.find('/') {
                Some(idx) => (&rest[..idx], &rest[idx..]),
                None => (rest, ""),
            };
            Ok(Self {
                protocol: protocol.to_string(),
                host: host.to_string(),
                path: path.to_string(),
            })
        } else if let Some((protocol, path)) = url.split_once(':') {
            if protocol.is_empty() {
                return Err(invalid("empty protocol"));
            }
            if path.is_empty() {
                return Err(invalid("empty path"));
            }
            Ok(Self {
                protocol: protocol.to_string(),
                host: String::new(),
                path: path.to_string(),
            })
        } else {
            Err(invalid("no protocol separator"))
        }
    }

    /// Render this URL with a different protocol, preserving host and path.
    /// A `file` protocol renders without an authority part.
    pub fn with_protocol(&self, protocol: &str) -> String {
        if protocol == "file" {
            format!("file:{}", self.path)
        } else {
            format!("{}://{}{}", protocol, self.host, self.path)
        }
    }
}

impl std::fmt::Display for SiteUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.is_empty() {
            write!(f, "{}:{}", self.protocol, self.path)
        } else {
            write!(f, "{}://{}{}", self.protocol, self.host, self.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_url() {
        let u = SiteUrl::parse("ftp://ftp.example.org/data/in.dat").unwrap();
        assert_eq!(u.protocol, "ftp");
        assert_eq!(u.host, "ftp.example.org");
        assert_eq!(u.path, "/data/in.dat");
    }

    #[test]
    fn parse_file_url_without_host() {
        let u = SiteUrl::parse("file:/tmp/in.dat").unwrap();
        assert_eq!(u.protocol, "file");
        assert_eq!(u.host, "");
        assert_eq!(u.path, "/tmp/in.dat");
    }

    #[test]
    fn parse_file_url_with_empty_authority() {
        let u = SiteUrl::parse("file:///tmp/in.dat").unwrap();
        assert_eq!(u.protocol, "file");
        assert_eq!(u.host, "");
        assert_eq!(u.path, "/tmp/in.dat");
    }

    #[test]
    fn parse_host_only() {
        let u = SiteUrl::parse("nest://turkey.cs.example.edu").unwrap();
        assert_eq!(u.host, "turkey.cs.example.edu");
        assert_eq!(u.path, "");
    }

    #[test]
    fn parse_dynamic_placeholder_host() {
        let u = SiteUrl::parse("ftp://$DYNAMIC/staging").unwrap();
        assert_eq!(u.host, "$DYNAMIC");
        assert_eq!(u.path, "/staging");
    }

    #[test]
    fn rejects_bare_paths() {
        assert!(SiteUrl::parse("/tmp/in.dat").is_err());
        assert!(SiteUrl::parse("").is_err());
        assert!(SiteUrl::parse("://host/x").is_err());
    }

    #[test]
    fn rewrite_to_alternate_protocol() {
        let u = SiteUrl::parse("srb://srb.example.org/lot/file1").unwrap();
        assert_eq!(u.with_protocol("ftp"), "ftp://srb.example.org/lot/file1");
        assert_eq!(u.with_protocol("file"), "file:/lot/file1");
    }

    #[test]
    fn display_round_trip() {
        for s in ["ftp://h.example.org/p/q", "file:/p/q"] {
            assert_eq!(SiteUrl::parse(s).unwrap().to_string(), s);
        }
    }
}
