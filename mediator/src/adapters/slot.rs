//! Locating the patient id slot in an ebXML `AdhocQuery`.

use regex::{Captures, Regex};
use std::ops::Range;

const PATIENT_ID_SLOT: &str = r#"(?s)<(?:[\w-]+:)?Slot\s+name\s*=\s*["']\$XDSDocumentEntryPatientId["'][^>]*>.*?<(?:[\w-]+:)?Value>(.*?)</(?:[\w-]+:)?Value>"#;

/// Predefined XML entities plus decimal and hex character references
const XML_REFERENCE: &str = r"&(?:#[xX]([0-9a-fA-F]+)|#([0-9]+)|(lt|gt|quot|apos|amp));";

/// The `$XDSDocumentEntryPatientId` slot value of a stored query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotValue {
    /// Byte range of the raw `<Value>` content in the body
    pub range: Range<usize>,
    /// Unquoted, unescaped CX string
    pub cx: String,
}

/// Compiled matcher for the patient id slot
#[derive(Debug, Clone)]
pub struct PatientIdSlot {
    pattern: Regex,
    reference: Regex,
}

impl PatientIdSlot {
    /// Compiles the slot matcher
    ///
    /// # Errors
    ///
    /// Returns the regex error if the pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(PATIENT_ID_SLOT)?,
            reference: Regex::new(XML_REFERENCE)?,
        })
    }

    /// Finds the first patient id slot value in `body`
    #[must_use]
    pub fn locate(&self, body: &str) -> Option<SlotValue> {
        let value = self.pattern.captures(body)?.get(1)?;
        let unquoted = value
            .as_str()
            .trim()
            .trim_matches(|c| c == '\'' || c == '"');

        Some(SlotValue {
            range: value.range(),
            cx: self.unescape(unquoted),
        })
    }

    /// Replaces the slot value with `cx`, quoted and XML-escaped
    #[must_use]
    pub fn replace(&self, body: &str, cx: &str) -> Option<String> {
        let slot = self.locate(body)?;
        let mut enriched = String::with_capacity(body.len() + cx.len());
        enriched.push_str(&body[..slot.range.start]);
        enriched.push('\'');
        enriched.push_str(&escape(cx));
        enriched.push('\'');
        enriched.push_str(&body[slot.range.end..]);
        Some(enriched)
    }

    /// Decodes XML references in one pass; unknown or invalid ones stay as written
    fn unescape(&self, text: &str) -> String {
        self.reference
            .replace_all(text, |caps: &Captures<'_>| {
                let decoded = if let Some(hex) = caps.get(1) {
                    u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
                } else if let Some(decimal) = caps.get(2) {
                    decimal.as_str().parse::<u32>().ok().and_then(char::from_u32)
                } else {
                    match caps.get(3).map(|name| name.as_str()) {
                        Some("lt") => Some('<'),
                        Some("gt") => Some('>'),
                        Some("quot") => Some('"'),
                        Some("apos") => Some('\''),
                        Some("amp") => Some('&'),
                        _ => None,
                    }
                };
                decoded.map_or_else(|| caps[0].to_string(), String::from)
            })
            .into_owned()
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
