//! Heuristic detection of existing signatures.
//!
//! The scan works on raw bytes and only sees uncompressed object syntax, so
//! signatures stored inside object streams are missed. The result decides
//! whether manual placement is required and nothing else.

use regex::bytes::Regex;
use std::sync::LazyLock;

static OBJECT_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)\bendobj\b").expect("valid endobj regex"));

static SIG_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)/Type\s*/Sig\b").expect("valid signature type regex"));

static SIG_SUBFILTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)/SubFilter\s*/(?:adbe\.pkcs7\.detached|ETSI\.CAdES\.detached)\b")
        .expect("valid sub-filter regex")
});

/// Count signature dictionaries that carry one of the detached-signature sub-filters.
///
/// Each object is counted at most once.
pub fn count_existing_signatures(bytes: &[u8]) -> usize {
    OBJECT_END
        .split(bytes)
        .filter(|object| SIG_TYPE.is_match(object) && SIG_SUBFILTER.is_match(object))
        .count()
}

/// A document that is already signed must have the new signature placed by hand.
pub fn needs_placement(bytes: &[u8]) -> bool {
    count_existing_signatures(bytes) > 0
}
