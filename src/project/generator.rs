//! Nonce generator extraction from SHSH blobs

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Value recorded when a blob has no readable generator
pub const UNKNOWN_GENERATOR: &str = "UNKNOWN";

static STRING_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<string>(.+?)</string>").expect("valid regex"));

/// Find the `<string>` value that follows the `generator` key in plist text
pub fn parse_generator(content: &str) -> Option<String> {
    let start = content.find("generator")?;
    STRING_ELEMENT
        .captures(&content[start..])
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read a blob file and return its generator, or [`UNKNOWN_GENERATOR`]
pub fn extract_generator(blob_path: &Path) -> String {
    match std::fs::read(blob_path) {
        Ok(bytes) => parse_generator(&String::from_utf8_lossy(&bytes)).unwrap_or_else(|| {
            log::warn!("No generator found in {}", blob_path.display());
            UNKNOWN_GENERATOR.to_string()
        }),
        Err(e) => {
            log::warn!("Failed to read blob {}: {}", blob_path.display(), e);
            UNKNOWN_GENERATOR.to_string()
        }
    }
}
