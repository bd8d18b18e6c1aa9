//! Modified UTF-7 for mailbox names, as described in
//! [RFC 3501 section 5.1.3](https://tools.ietf.org/html/rfc3501#section-5.1.3).
//!
//! Printable US-ASCII stands for itself, `&` is written `&-`, and every other run of characters
//! is encoded as UTF-16BE in base64 (with `,` in place of `/`) between `&` and `-`.

use base64::alphabet;
use base64::engine::{general_purpose, GeneralPurpose};
use base64::Engine as _;

const MUTF7: GeneralPurpose = GeneralPurpose::new(&alphabet::IMAP_MUTF7, general_purpose::NO_PAD);

/// Encodes a UTF-8 mailbox name for the wire.
pub fn encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending = String::new();
    for c in name.chars() {
        if ('\x20'..='\x7e').contains(&c) {
            flush(&mut out, &mut pending);
            if c == '&' {
                out.push_str("&-");
            } else {
                out.push(c);
            }
        } else {
            pending.push(c);
        }
    }
    flush(&mut out, &mut pending);
    out
}

fn flush(out: &mut String, pending: &mut String) {
    if pending.is_empty() {
        return;
    }
    let bytes: Vec<u8> = pending.encode_utf16().flat_map(u16::to_be_bytes).collect();
    out.push('&');
    out.push_str(&MUTF7.encode(bytes));
    out.push('-');
    pending.clear();
}

/// Decodes a mailbox name received from the server. Names that are not valid modified UTF-7
/// are returned unchanged.
pub fn decode(name: &str) -> String {
    try_decode(name).unwrap_or_else(|| name.to_string())
}

fn try_decode(name: &str) -> Option<String> {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let end = tail.find('-')?;
        let encoded = &tail[..end];
        if encoded.is_empty() {
            out.push('&');
        } else {
            let bytes = MUTF7.decode(encoded).ok()?;
            if bytes.len() % 2 != 0 {
                return None;
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            out.push_str(&String::from_utf16(&units).ok()?);
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}
