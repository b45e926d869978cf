//! Installer package manifest decoder
//!
//! Reads `AndroidManifest.xml` out of an `.apk` (a zip archive). The manifest
//! is normally binary XML; plain-text manifests are accepted as a fallback.
//!
//! Permissions are collected from every `uses-permission` shape
//! (`uses-permission`, `uses-permission-sdk-23`, `uses-permission-sdk-m`)
//! into one flat list in declaration order, without repeats.

use super::axml::{self, XmlElement};
use super::DecodeError;
use mbx_common::records::AppRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const MANIFEST_ENTRY: &str = "AndroidManifest.xml";

/// Manifests larger than this are not read
const MAX_MANIFEST_BYTES: u64 = 8 * 1024 * 1024;

const PERMISSION_ELEMENTS: &[&str] = &[
    "uses-permission",
    "uses-permission-sdk-23",
    "uses-permission-sdk-m",
];

static TEXT_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<\s*([A-Za-z][\w\-.]*)\b([^>]*)>").expect("valid element regex")
});

static TEXT_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([\w:.\-]+)\s*=\s*"([^"]*)""#).expect("valid attribute regex")
});

/// Metadata declared by a package manifest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestInfo {
    pub package: String,
    /// Literal label; labels pointing into resources stay unresolved
    pub label: Option<String>,
    pub version_code: Option<i64>,
    pub version_name: Option<String>,
    pub permissions: Vec<String>,
}

impl ManifestInfo {
    fn from_elements(elements: &[XmlElement]) -> Self {
        let mut info = ManifestInfo::default();

        for element in elements {
            match element.name.as_str() {
                "manifest" => {
                    info.package = element
                        .attr("package")
                        .and_then(|v| v.as_text())
                        .unwrap_or_default()
                        .trim()
                        .to_string();
                    info.version_code = element.attr("versionCode").and_then(|v| v.as_integer());
                    info.version_name = element
                        .attr("versionName")
                        .and_then(|v| v.as_text())
                        .filter(|s| !s.is_empty());
                }
                "application" => {
                    info.label = element
                        .attr("label")
                        .and_then(|v| v.as_text())
                        .filter(|s| !s.is_empty() && !s.starts_with('@'));
                }
                name if PERMISSION_ELEMENTS.contains(&name) => {
                    if let Some(permission) = element.attr("name").and_then(|v| v.as_text()) {
                        if !permission.is_empty() && !info.permissions.contains(&permission) {
                            info.permissions.push(permission);
                        }
                    }
                }
                _ => {}
            }
        }

        info
    }
}

/// Elements of a plain-text manifest, attribute names stripped of prefixes
fn parse_text_elements(text: &str) -> Vec<XmlElement> {
    TEXT_ELEMENT
        .captures_iter(text)
        .map(|cap| {
            let attributes = TEXT_ATTRIBUTE
                .captures_iter(&cap[2])
                .map(|a| {
                    let name = a[1].rsplit(':').next().unwrap_or_default().to_string();
                    (name, axml::AttrValue::Text(a[2].to_string()))
                })
                .collect();
            XmlElement {
                name: cap[1].to_string(),
                attributes,
            }
        })
        .collect()
}

/// Decode manifest bytes, binary or text
pub fn read_manifest(bytes: &[u8]) -> Result<ManifestInfo, DecodeError> {
    let elements = if axml::is_binary_xml(bytes) {
        axml::parse_elements(bytes)?
    } else {
        let text = String::from_utf8_lossy(bytes);
        if !text.trim_start().starts_with('<') {
            return Err(DecodeError::Manifest("neither binary nor text XML".into()));
        }
        parse_text_elements(&text)
    };

    let info = ManifestInfo::from_elements(&elements);
    if info.package.is_empty() {
        return Err(DecodeError::BlankPackage);
    }
    Ok(info)
}

/// Open a package file and decode its manifest into an app record.
///
/// `apk_ref` and `size_bytes` are filled in by the caller once the package
/// itself has been stored.
pub fn decode_apk(path: &Path) -> Result<AppRecord, DecodeError> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let entry = archive.by_name(MANIFEST_ENTRY)?;

    let mut bytes = Vec::new();
    entry.take(MAX_MANIFEST_BYTES).read_to_end(&mut bytes)?;

    let info = read_manifest(&bytes)?;
    Ok(AppRecord {
        package_name: info.package,
        app_name: info.label,
        version_code: info.version_code,
        version_name: info.version_name,
        permissions: info.permissions,
        apk_ref: None,
        size_bytes: 0,
    })
}
