//! Accept-header negotiation against the configured media-type whitelist.
//!
//! The API speaks versioned vendor media types
//! (`application/vnd.vehicle-history.v1+json`); which ones are accepted is
//! fixed at bootstrap. Negotiation picks the representation to serve, and
//! the version it carries drives route selection.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// ── MediaType ────────────────────────────────────────────────────────────────

/// One accepted vendor media type.
///
/// Carries the full essence string, the major version parsed from its `vN`
/// segment, and the representation suffix.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MediaType {
    essence: String,
    major: u16,
    repr: Repr,
}

/// The representation a vendor media type resolves to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Repr {
    Json,
    Xml,
}

impl MediaType {
    /// The full media-type string, e.g.
    /// `application/vnd.vehicle-history.v1+json`.
    pub fn essence(&self) -> &str { &self.essence }

    /// The major API version the type names.
    pub fn major(&self) -> u16 { self.major }

    pub fn repr(&self) -> Repr { self.repr }
}

#[derive(Debug, Error)]
pub enum MediaTypeError {
    #[error("unparseable media type `{0}`")]
    Malformed(String),

    #[error("no version segment in `{0}`")]
    MissingVersion(String),

    #[error("unsupported representation suffix in `{0}`")]
    UnknownSuffix(String),
}

/// Parses `type/vnd.name.vN+suffix`.
impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MediaTypeError::Malformed(s.to_owned());

        let (_, subtype) = s.split_once('/').ok_or_else(malformed)?;
        let (name, suffix) = subtype.split_once('+').ok_or_else(malformed)?;

        let repr = match suffix {
            "json" => Repr::Json,
            "xml"  => Repr::Xml,
            _      => return Err(MediaTypeError::UnknownSuffix(s.to_owned())),
        };

        // The version rides the last dotted segment: …vehicle-history.v1
        let major = name
            .rsplit('.')
            .next()
            .and_then(|seg| seg.strip_prefix('v'))
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| MediaTypeError::MissingVersion(s.to_owned()))?;

        Ok(Self { essence: s.to_owned(), major, repr })
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)
    }
}

// ── Negotiation ──────────────────────────────────────────────────────────────

/// Content negotiation failure, answered with `406 Not Acceptable`.
#[derive(Debug, Error)]
#[error("no acceptable representation among `{accept}`")]
pub struct NotAcceptable {
    accept: String,
}

/// Picks the representation to serve.
///
/// Each `Accept` entry is matched (parameters ignored) against the
/// configured whitelist in the order the client listed them; `*/*`,
/// `application/*`, or an absent header fall back to the first configured
/// type.
pub fn negotiate<'a>(
    accept: Option<&str>,
    acceptable: &'a [MediaType],
) -> Result<&'a MediaType, NotAcceptable> {
    let fallback = || {
        acceptable
            .first()
            .ok_or_else(|| NotAcceptable { accept: String::new() })
    };

    let Some(accept) = accept else { return fallback() };
    if accept.trim().is_empty() {
        return fallback();
    }

    for entry in accept.split(',') {
        let essence = entry.split(';').next().unwrap_or("").trim();
        if essence == "*/*" || essence == "application/*" {
            return fallback();
        }
        if let Some(media) = acceptable.iter().find(|m| m.essence == essence) {
            return Ok(media);
        }
    }

    Err(NotAcceptable { accept: accept.to_owned() })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
