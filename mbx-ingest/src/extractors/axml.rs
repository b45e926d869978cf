//! Android binary XML reader
//!
//! Installer packages store `AndroidManifest.xml` as a chunked binary
//! document: a string pool, an optional resource-id map, then a stream of
//! namespace and element chunks. Only start-element chunks and their
//! attributes are decoded; everything else is skipped by its declared size.
//!
//! All reads are bounds-checked; a truncated or inconsistent document is a
//! [`DecodeError::Manifest`].

use super::DecodeError;

const RES_XML_TYPE: u16 = 0x0003;
const RES_STRING_POOL_TYPE: u16 = 0x0001;
const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;
const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;

const UTF8_FLAG: u32 = 1 << 8;
const NO_INDEX: u32 = 0xFFFF_FFFF;

// Typed value data types
const TYPE_REFERENCE: u8 = 0x01;
const TYPE_STRING: u8 = 0x03;
const TYPE_INT_DEC: u8 = 0x10;
const TYPE_INT_HEX: u8 = 0x11;
const TYPE_INT_BOOLEAN: u8 = 0x12;

/// Framework attribute ids used when a stripped document leaves names empty
const KNOWN_ATTRIBUTE_IDS: &[(u32, &str)] = &[
    (0x0101_0001, "label"),
    (0x0101_0003, "name"),
    (0x0101_021b, "versionCode"),
    (0x0101_021c, "versionName"),
];

/// True when `bytes` starts like a binary XML document
pub fn is_binary_xml(bytes: &[u8]) -> bool {
    bytes.len() >= 8 && bytes[0..2] == RES_XML_TYPE.to_le_bytes()
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    /// Unresolved resource reference
    Reference(u32),
    Other(u32),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttrValue::Text(s) => Some(s.clone()),
            AttrValue::Integer(i) => Some(i.to_string()),
            AttrValue::Boolean(b) => Some(b.to_string()),
            AttrValue::Reference(_) | AttrValue::Other(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttrValue::Integer(i) => Some(*i),
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    /// Attribute local names without namespace
    pub attributes: Vec<(String, AttrValue)>,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

fn malformed(what: &str) -> DecodeError {
    DecodeError::Manifest(format!("binary XML {}", what))
}

fn u16_at(data: &[u8], offset: usize) -> Result<u16, DecodeError> {
    let bytes = data
        .get(offset..offset + 2)
        .ok_or_else(|| malformed("truncated"))?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn u32_at(data: &[u8], offset: usize) -> Result<u32, DecodeError> {
    let bytes: [u8; 4] = data
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| malformed("truncated"))?;
    Ok(u32::from_le_bytes(bytes))
}

fn u8_at(data: &[u8], offset: usize) -> Result<u8, DecodeError> {
    data.get(offset).copied().ok_or_else(|| malformed("truncated"))
}

/// Decoded string pool
#[derive(Debug, Default)]
struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    fn parse(chunk: &[u8]) -> Result<Self, DecodeError> {
        let string_count = u32_at(chunk, 8)? as usize;
        let flags = u32_at(chunk, 16)?;
        let strings_start = u32_at(chunk, 20)? as usize;
        let header_size = u16_at(chunk, 2)? as usize;
        let utf8 = flags & UTF8_FLAG != 0;

        let mut strings = Vec::with_capacity(string_count.min(4096));
        for i in 0..string_count {
            let offset = u32_at(chunk, header_size + i * 4)? as usize;
            let at = strings_start + offset;
            let s = if utf8 {
                read_utf8_string(chunk, at)?
            } else {
                read_utf16_string(chunk, at)?
            };
            strings.push(s);
        }
        Ok(Self { strings })
    }

    fn get(&self, index: u32) -> Option<&str> {
        if index == NO_INDEX {
            return None;
        }
        self.strings.get(index as usize).map(String::as_str)
    }
}

/// UTF-8 pool entry: char length, byte length (each 1 or 2 bytes), bytes
fn read_utf8_string(chunk: &[u8], at: usize) -> Result<String, DecodeError> {
    let (_, skip) = utf8_length(chunk, at)?;
    let (len, skip2) = utf8_length(chunk, at + skip)?;
    let start = at + skip + skip2;
    let bytes = chunk
        .get(start..start + len)
        .ok_or_else(|| malformed("string out of range"))?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn utf8_length(chunk: &[u8], at: usize) -> Result<(usize, usize), DecodeError> {
    let first = u8_at(chunk, at)? as usize;
    if first & 0x80 != 0 {
        let second = u8_at(chunk, at + 1)? as usize;
        Ok((((first & 0x7f) << 8) | second, 2))
    } else {
        Ok((first, 1))
    }
}

/// UTF-16 pool entry: unit length (1 or 2 u16s), then units
fn read_utf16_string(chunk: &[u8], at: usize) -> Result<String, DecodeError> {
    let first = u16_at(chunk, at)? as usize;
    let (len, skip) = if first & 0x8000 != 0 {
        let second = u16_at(chunk, at + 2)? as usize;
        ((((first & 0x7fff) << 16) | second), 4)
    } else {
        (first, 2)
    };
    let start = at + skip;
    let bytes = chunk
        .get(start..start + len * 2)
        .ok_or_else(|| malformed("string out of range"))?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

fn known_attribute(resource_id: u32) -> Option<&'static str> {
    KNOWN_ATTRIBUTE_IDS
        .iter()
        .find(|(id, _)| *id == resource_id)
        .map(|(_, name)| *name)
}

/// Decode every start element of a binary XML document, in order
pub fn parse_elements(data: &[u8]) -> Result<Vec<XmlElement>, DecodeError> {
    if !is_binary_xml(data) {
        return Err(malformed("header missing"));
    }
    let header_size = u16_at(data, 2)? as usize;
    let total = (u32_at(data, 4)? as usize).min(data.len());

    let mut pool = StringPool::default();
    let mut resource_ids: Vec<u32> = Vec::new();
    let mut elements = Vec::new();

    let mut offset = header_size;
    while offset + 8 <= total {
        let chunk_type = u16_at(data, offset)?;
        let chunk_size = u32_at(data, offset + 4)? as usize;
        if chunk_size < 8 || offset + chunk_size > data.len() {
            return Err(malformed("chunk size out of range"));
        }
        let chunk = &data[offset..offset + chunk_size];

        match chunk_type {
            RES_STRING_POOL_TYPE => pool = StringPool::parse(chunk)?,
            RES_XML_RESOURCE_MAP_TYPE => {
                let chunk_header = u16_at(chunk, 2)? as usize;
                resource_ids = chunk
                    .get(chunk_header..)
                    .unwrap_or_default()
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
            }
            RES_XML_START_ELEMENT_TYPE => {
                elements.push(parse_start_element(chunk, &pool, &resource_ids)?);
            }
            _ => {}
        }
        offset += chunk_size;
    }

    Ok(elements)
}

fn parse_start_element(
    chunk: &[u8],
    pool: &StringPool,
    resource_ids: &[u32],
) -> Result<XmlElement, DecodeError> {
    let ext = u16_at(chunk, 2)? as usize;
    let name_index = u32_at(chunk, ext + 4)?;
    let attribute_start = u16_at(chunk, ext + 8)? as usize;
    let attribute_size = u16_at(chunk, ext + 10)? as usize;
    let attribute_count = u16_at(chunk, ext + 12)? as usize;
    if attribute_size < 20 {
        return Err(malformed("attribute size too small"));
    }

    let name = pool.get(name_index).unwrap_or_default().to_string();

    let mut attributes = Vec::with_capacity(attribute_count);
    for i in 0..attribute_count {
        let at = ext + attribute_start + i * attribute_size;
        let attr_name_index = u32_at(chunk, at + 4)?;
        let raw_value = u32_at(chunk, at + 8)?;
        let data_type = u8_at(chunk, at + 15)?;
        let data = u32_at(chunk, at + 16)?;

        let mut attr_name = pool.get(attr_name_index).unwrap_or_default().to_string();
        if attr_name.is_empty() {
            let resource_id = resource_ids.get(attr_name_index as usize).copied();
            if let Some(known) = resource_id.and_then(known_attribute) {
                attr_name = known.to_string();
            }
        }

        let value = if raw_value != NO_INDEX {
            AttrValue::Text(pool.get(raw_value).unwrap_or_default().to_string())
        } else {
            match data_type {
                TYPE_STRING => AttrValue::Text(pool.get(data).unwrap_or_default().to_string()),
                TYPE_INT_DEC | TYPE_INT_HEX => AttrValue::Integer(i64::from(data as i32)),
                TYPE_INT_BOOLEAN => AttrValue::Boolean(data != 0),
                TYPE_REFERENCE => AttrValue::Reference(data),
                _ => AttrValue::Other(data),
            }
        };
        attributes.push((attr_name, value));
    }

    Ok(XmlElement { name, attributes })
}
