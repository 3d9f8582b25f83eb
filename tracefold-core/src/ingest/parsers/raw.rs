//! Raw fallback for documents no parser recognizes.

use crate::ingest::identity::hash_fields;
use crate::types::{event_type, Event, Source};
use chrono::{DateTime, Utc};

/// Raw snippets keep this many characters of the document.
pub const RAW_SNIPPET_LIMIT: usize = 1000;

/// Actor recorded for unrecognized uploads.
pub const RAW_ACTOR: &str = "uploader";

/// Wrap an unrecognized document in a single `raw` event stamped with the
/// time it was received.
///
/// The id leaves the timestamp out, so uploading the same file twice still
/// produces one stored event.
pub fn wrap(text: &str, received_at: DateTime<Utc>) -> Event {
    let mut event = Event::new(
        Source::Unknown,
        received_at,
        RAW_ACTOR,
        event_type::RAW,
        &[],
        text,
        RAW_SNIPPET_LIMIT,
    );
    event.id = hash_fields(&[
        Source::Unknown.as_str(),
        "",
        RAW_ACTOR,
        &event.content_snippet,
    ]);
    event
}
