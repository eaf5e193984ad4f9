//! Chat deep links ("narrow" URLs) pointing at a single stream topic.
//!
//! Segments use the chat server's hash encoding: percent-encode, then swap `%` for `.`.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NarrowTarget {
    pub stream: String,
    pub topic: String,
}

pub fn narrow_url(site_url: &str, stream: &str, topic: &str) -> String {
    format!(
        "{}/#narrow/stream/{}/topic/{}",
        site_url.trim_end_matches('/'),
        encode_segment(stream),
        encode_segment(topic)
    )
}

/// Extracts the stream and topic from a narrow URL. Anything that is not an absolute URL
/// with at least `narrow/stream/<s>/topic/<t>` in its fragment yields `None`.
pub fn parse_narrow_url(raw: &str) -> Option<NarrowTarget> {
    let url = Url::parse(raw.trim()).ok()?;
    let fragment = url.fragment()?;
    let parts: Vec<&str> = fragment.split('/').collect();
    if parts.len() < 5 || parts[0] != "narrow" {
        return None;
    }

    let stream = decode_segment(parts[2])?;
    let topic = decode_segment(parts[4])?;
    if stream.is_empty() || topic.is_empty() {
        return None;
    }
    Some(NarrowTarget { stream, topic })
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string().replace('%', ".")
}

fn decode_segment(segment: &str) -> Option<String> {
    let escaped = segment.replace('.', "%").replace('+', " ");
    percent_decode_str(&escaped).decode_utf8().ok().map(|decoded| decoded.into_owned())
}
