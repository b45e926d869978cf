//! vCard contact decoder
//!
//! Blocks are found by line prefix (`BEGIN:VCARD` … `END:VCARD`, any case).
//! Within a block a field line starts with `FIELD:` or `FIELD;` and its value
//! is everything after the first colon. Identity matching against existing
//! contacts happens later in the deduplicator.

use super::Decoded;
use mbx_common::records::Contact;

/// File extensions routed to this decoder
pub const VCARD_EXTENSIONS: &[&str] = &["vcf", "vcard"];

/// First value of `field` within a block
fn field_value(block: &[&str], field: &str) -> Option<String> {
    let colon = format!("{}:", field);
    let semi = format!("{};", field);
    block
        .iter()
        .map(|line| line.trim())
        .filter(|line| {
            let upper = line.to_uppercase();
            upper.starts_with(&colon) || upper.starts_with(&semi)
        })
        .find_map(|line| line.split_once(':').map(|(_, v)| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}

/// `N:Family;Given;Middle;Prefix;Suffix` rendered as "Given Family"
fn structured_name(block: &[&str]) -> Option<String> {
    let raw = field_value(block, "N")?;
    let mut parts = raw.split(';').map(str::trim);
    let family = parts.next().unwrap_or_default();
    let given = parts.next().unwrap_or_default();
    let name = [given, family]
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    (!name.is_empty()).then_some(name)
}

fn contact_from_block(block: &[&str]) -> Option<Contact> {
    let name = field_value(block, "FN").or_else(|| structured_name(block));
    let phone = field_value(block, "TEL");
    let email = field_value(block, "EMAIL");

    if name.is_none() && phone.is_none() && email.is_none() {
        return None;
    }

    Some(Contact {
        name: name.unwrap_or_default(),
        phone_number: phone.unwrap_or_default(),
        email,
        address: field_value(block, "ADR").map(|a| {
            a.split(';')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        }),
        ..Default::default()
    })
}

/// Decode every vCard block in `text`.
///
/// Blocks carrying none of name, phone or email are counted as skipped.
pub fn decode_vcard_text(text: &str) -> Decoded<Contact> {
    let mut out = Decoded::default();
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        let upper = line.trim().to_uppercase();
        if upper.starts_with("BEGIN:VCARD") {
            current = Some(Vec::new());
        } else if upper.starts_with("END:VCARD") {
            if let Some(block) = current.take() {
                match contact_from_block(&block) {
                    Some(contact) => out.items.push(contact),
                    None => out.skipped += 1,
                }
            }
        } else if let Some(block) = current.as_mut() {
            block.push(line);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_block() {
        let decoded = decode_vcard_text("BEGIN:VCARD\nFN:Alice\nTEL:0989123456\nEND:VCARD\n");
        assert_eq!(decoded.items.len(), 1);
        assert_eq!(decoded.items[0].name, "Alice");
        assert_eq!(decoded.items[0].phone_number, "0989123456");
        assert!(decoded.items[0].email.is_none());
    }

    #[test]
    fn test_parameters_and_case() {
        let text = "begin:vcard\r\nVERSION:3.0\r\nfn:Bob Stone\r\nTEL;TYPE=CELL:+98 912 123 4567\r\n\
                    email;type=INTERNET:bob@example.com\r\nend:vcard\r\n";
        let decoded = decode_vcard_text(text);
        let bob = &decoded.items[0];
        assert_eq!(bob.name, "Bob Stone");
        assert_eq!(bob.phone_number, "+98 912 123 4567");
        assert_eq!(bob.email.as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn test_structured_name_fallback() {
        let decoded = decode_vcard_text("BEGIN:VCARD\nN:Lovelace;Ada;;;\nTEL:12345\nEND:VCARD");
        assert_eq!(decoded.items[0].name, "Ada Lovelace");
    }

    #[test]
    fn test_empty_block_skipped() {
        let text = "BEGIN:VCARD\nVERSION:2.1\nEND:VCARD\nBEGIN:VCARD\nEMAIL:x@y.z\nEND:VCARD\n";
        let decoded = decode_vcard_text(text);
        assert_eq!(decoded.items.len(), 1);
        assert_eq!(decoded.skipped, 1);
        assert_eq!(decoded.items[0].name, "");
    }

    #[test]
    fn test_unterminated_block_ignored() {
        let decoded = decode_vcard_text("BEGIN:VCARD\nFN:Lost\n");
        assert!(decoded.items.is_empty());
        assert_eq!(decoded.skipped, 0);
    }
}
