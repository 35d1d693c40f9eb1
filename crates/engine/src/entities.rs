//! HTML entity decoding for serialized component attributes.
//!
//! Product components embed their variant context as HTML-entity-escaped
//! JSON (`{&quot;variantSelected&quot;:...}`); the payload must be decoded
//! before it can be parsed. Only the references that occur in attribute
//! escaping are handled: the five named entities plus decimal and
//! hexadecimal character references. Anything malformed passes through
//! verbatim - the downstream JSON parse decides whether the result is
//! usable.
//!
//! Hand-rolled byte scan; the input is short attribute text, not a
//! document.

use std::borrow::Cow;

/// Longest reference body we attempt to read between `&` and `;`.
const MAX_REFERENCE_LEN: usize = 10;

/// Decode HTML entity references in an attribute value.
#[must_use]
pub fn decode_html_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        let (head, tail) = rest.split_at(amp);
        out.push_str(head);

        match decode_reference(tail) {
            Some((decoded, consumed)) => {
                out.push_str(&decoded);
                rest = tail.get(consumed..).unwrap_or("");
            }
            None => {
                out.push('&');
                rest = tail.get(1..).unwrap_or("");
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// Try to decode one reference at the start of `s` (which begins with
/// `&`). Returns the decoded text and the number of bytes consumed.
fn decode_reference(s: &str) -> Option<(String, usize)> {
    let semi = s.find(';')?;
    if semi < 2 || semi > MAX_REFERENCE_LEN {
        return None;
    }
    let body = s.get(1..semi)?;
    let consumed = semi + 1;

    let decoded = match body {
        "amp" => "&".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        _ => {
            let code = body.strip_prefix('#').and_then(|num| {
                num.strip_prefix(['x', 'X'])
                    .map_or_else(|| num.parse::<u32>().ok(), |hex| u32::from_str_radix(hex, 16).ok())
            })?;
            char::from_u32(code)?.to_string()
        }
    };

    Some((decoded, consumed))
}
