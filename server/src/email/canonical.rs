use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::raw_message::{Header, MessagePart, RawMessage};

const MIME_TEXT_PLAIN: &str = "text/plain";
const MIME_TEXT_HTML: &str = "text/html";

const UNREAD_LABEL: &str = "UNREAD";
const STARRED_LABEL: &str = "STARRED";
const IMPORTANT_LABEL: &str = "IMPORTANT";

/// The normalized email record served to the presentation layer and stored
/// per mailbox, keyed by the provider message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEmail {
    pub gmail_id: String,
    pub thread_id: String,
    pub from: String,
    pub from_name: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub read: bool,
    pub starred: bool,
    pub important: bool,
}

/// Convert a provider message into the canonical record. Total: a message
/// with no usable text content gets an empty body, never an error.
pub fn normalize(raw: &RawMessage) -> CanonicalEmail {
    let headers: &[Header] = raw.payload.as_ref().map_or(&[], |p| p.headers.as_slice());

    let from = header_value(headers, "From").unwrap_or_default().to_string();
    let from_name = display_name(&from);
    let to = header_value(headers, "To").unwrap_or_default().to_string();
    let subject = header_value(headers, "Subject")
        .unwrap_or_default()
        .to_string();

    let body = raw
        .payload
        .as_ref()
        .and_then(extract_body)
        .map(|b| b.trim().to_string())
        .unwrap_or_default();
    if body.is_empty() {
        // Data-quality signal, not an error: some messages carry no text part
        tracing::info!(gmail_id = %raw.id, "no text content found in message payload");
    }

    let received_at = raw
        .internal_date
        .as_deref()
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or(DateTime::UNIX_EPOCH);

    CanonicalEmail {
        gmail_id: raw.id.clone(),
        thread_id: raw.thread_id.clone(),
        from,
        from_name,
        to,
        subject,
        body,
        received_at,
        read: !raw.label_ids.iter().any(|l| l == UNREAD_LABEL),
        starred: raw.label_ids.iter().any(|l| l == STARRED_LABEL),
        important: raw.label_ids.iter().any(|l| l == IMPORTANT_LABEL),
    }
}

/// Body extraction in strict priority order: the direct body blob wins, then
/// the first top-level text/plain part, then text/html, then text/plain one
/// level down inside multipart containers. The scan stops at that depth.
fn extract_body(payload: &MessagePart) -> Option<String> {
    if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_deref()) {
        return Some(decode_body(data));
    }

    if payload.parts.is_empty() {
        return None;
    }

    for mime_type in [MIME_TEXT_PLAIN, MIME_TEXT_HTML] {
        if let Some(data) = part_data(&payload.parts, mime_type) {
            return Some(decode_body(data));
        }
    }

    for part in &payload.parts {
        if let Some(data) = part_data(&part.parts, MIME_TEXT_PLAIN) {
            return Some(decode_body(data));
        }
    }

    None
}

/// Body data of the first part with the given MIME type, if it has any.
fn part_data<'a>(parts: &'a [MessagePart], mime_type: &str) -> Option<&'a str> {
    parts
        .iter()
        .find(|p| p.mime_type == mime_type)
        .and_then(|p| p.body.as_ref())
        .and_then(|b| b.data.as_deref())
}

/// Gmail emits URL-safe base64; the standard alphabet is accepted as well.
/// Invalid input degrades to an empty string so normalization stays total.
fn decode_body(data: &str) -> String {
    let decoded = URL_SAFE_NO_PAD
        .decode(data)
        .or_else(|_| URL_SAFE.decode(data))
        .or_else(|_| STANDARD.decode(data));

    match decoded {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            tracing::warn!(%err, "could not decode message body data");
            String::new()
        }
    }
}

/// Case-insensitive header lookup, first match wins.
fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Everything before the first `<` of the sender header, trimmed. A bare
/// address has no display name and comes back unchanged.
fn display_name(from: &str) -> String {
    from.split('<').next().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(body: &str) -> String {
        STANDARD.encode(body)
    }

    fn raw_message(value: serde_json::Value) -> RawMessage {
        serde_json::from_value(value).expect("Unable to parse raw message json")
    }

    #[test]
    fn test_direct_body_blob_wins_over_parts() {
        let raw = raw_message(json!({
            "id": "m1",
            "payload": {
                "mimeType": "text/plain",
                "body": { "data": encode("direct body") },
                "parts": [
                    {
                        "mimeType": "text/plain",
                        "body": { "data": encode("part body") }
                    }
                ]
            }
        }));

        assert_eq!(normalize(&raw).body, "direct body");
    }

    #[test]
    fn test_plain_text_part_preferred_over_html() {
        let raw = raw_message(json!({
            "id": "m2",
            "payload": {
                "mimeType": "multipart/alternative",
                "parts": [
                    {
                        "mimeType": "text/html",
                        "body": { "data": encode("<p>html</p>") }
                    },
                    {
                        "mimeType": "text/plain",
                        "body": { "data": encode("plain") }
                    }
                ]
            }
        }));

        assert_eq!(normalize(&raw).body, "plain");
    }

    #[test]
    fn test_html_only_part_passes_markup_through() {
        let markup = "<html><body><b>Hello</b> world</body></html>";
        let raw = raw_message(json!({
            "id": "m3",
            "payload": {
                "mimeType": "multipart/alternative",
                "parts": [
                    {
                        "mimeType": "text/html",
                        "body": { "data": encode(markup) }
                    }
                ]
            }
        }));

        // No HTML-to-text conversion: the decoded markup is the body
        assert_eq!(normalize(&raw).body, markup);
    }

    #[test]
    fn test_nested_parts_scanned_one_level_deep() {
        let raw = raw_message(json!({
            "id": "m4",
            "payload": {
                "mimeType": "multipart/mixed",
                "parts": [
                    {
                        "mimeType": "multipart/alternative",
                        "parts": [
                            {
                                "mimeType": "text/plain",
                                "body": { "data": encode("nested plain") }
                            }
                        ]
                    }
                ]
            }
        }));

        assert_eq!(normalize(&raw).body, "nested plain");
    }

    #[test]
    fn test_no_text_content_yields_empty_body() {
        let raw = raw_message(json!({
            "id": "m5",
            "payload": {
                "mimeType": "multipart/mixed",
                "parts": [
                    {
                        "mimeType": "image/png",
                        "body": { "data": encode("pngbytes") },
                        "parts": []
                    },
                    {
                        "mimeType": "multipart/alternative",
                        "parts": [
                            { "mimeType": "text/enriched" }
                        ]
                    }
                ]
            }
        }));

        assert_eq!(normalize(&raw).body, "");
    }

    #[test]
    fn test_missing_payload_yields_empty_fields() {
        let raw = raw_message(json!({ "id": "m6" }));
        let email = normalize(&raw);

        assert_eq!(email.body, "");
        assert_eq!(email.subject, "");
        assert_eq!(email.from, "");
        assert_eq!(email.to, "");
    }

    #[test]
    fn test_invalid_base64_degrades_to_empty_body() {
        let raw = raw_message(json!({
            "id": "m7",
            "payload": {
                "mimeType": "text/plain",
                "body": { "data": "!!! not base64 !!!" }
            }
        }));

        assert_eq!(normalize(&raw).body, "");
    }

    #[test]
    fn test_body_is_trimmed() {
        let raw = raw_message(json!({
            "id": "m8",
            "payload": {
                "mimeType": "text/plain",
                "body": { "data": encode("\n  hello there \n\n") }
            }
        }));

        assert_eq!(normalize(&raw).body, "hello there");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive_first_match_wins() {
        let raw = raw_message(json!({
            "id": "m9",
            "payload": {
                "mimeType": "text/plain",
                "headers": [
                    { "name": "SUBJECT", "value": "First subject" },
                    { "name": "Subject", "value": "Second subject" },
                    { "name": "from", "value": "Jane Doe <jane@example.com>" },
                    { "name": "To", "value": "me@example.com" }
                ],
                "body": { "data": encode("hi") }
            }
        }));

        let email = normalize(&raw);
        assert_eq!(email.subject, "First subject");
        assert_eq!(email.from, "Jane Doe <jane@example.com>");
        assert_eq!(email.from_name, "Jane Doe");
        assert_eq!(email.to, "me@example.com");
    }

    #[test]
    fn test_from_name_of_bare_address_is_the_address() {
        assert_eq!(display_name("jane@example.com"), "jane@example.com");
        assert_eq!(display_name(""), "");
        assert_eq!(display_name("  Jane   <jane@example.com>"), "Jane");
    }

    #[test]
    fn test_flags_derived_from_labels() {
        let raw = raw_message(json!({
            "id": "m10",
            "labelIds": ["INBOX", "UNREAD", "STARRED"]
        }));

        let email = normalize(&raw);
        assert!(!email.read);
        assert!(email.starred);
        assert!(!email.important);

        let raw = raw_message(json!({
            "id": "m11",
            "labelIds": ["INBOX", "IMPORTANT"]
        }));

        let email = normalize(&raw);
        assert!(email.read);
        assert!(!email.starred);
        assert!(email.important);
    }

    #[test]
    fn test_received_at_from_internal_date_millis() {
        let raw = raw_message(json!({
            "id": "m12",
            "internalDate": "1727089470000"
        }));

        let email = normalize(&raw);
        assert_eq!(email.received_at.timestamp_millis(), 1727089470000);

        // Unparseable timestamps fall back to the epoch rather than failing
        let raw = raw_message(json!({
            "id": "m13",
            "internalDate": "not-a-number"
        }));
        assert_eq!(normalize(&raw).received_at, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_url_safe_base64_accepted() {
        let body = "subject?>>one";
        let data = URL_SAFE_NO_PAD.encode(body);
        let raw = raw_message(json!({
            "id": "m14",
            "payload": {
                "mimeType": "text/plain",
                "body": { "data": data }
            }
        }));

        assert_eq!(normalize(&raw).body, body);
    }
}
