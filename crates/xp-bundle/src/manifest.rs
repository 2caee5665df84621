//! JAR-style manifest handling.
//!
//! The manifest is the archive's metadata record. Only the main section is
//! interpreted; per-entry sections that a core template may carry are kept
//! verbatim and written back unchanged.
//!
//! Format rules honoured here:
//! - `Name: Value` attribute lines, names compared case-insensitively
//! - lines longer than 72 bytes continue on lines starting with one space
//! - CRLF on write, CRLF or LF on read
//! - attribute order is preserved, with `Manifest-Version` written first

use crate::{BundleError, Result, LAYERS_KEY, PATCH_DIGEST_KEY};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Attribute that heads every manifest.
pub const MANIFEST_VERSION_KEY: &str = "Manifest-Version";

const MAX_LINE_BYTES: usize = 72;

/// Parsed manifest with ordered main attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    attributes: Vec<(String, String)>,
    /// Everything after the main section, kept as raw lines.
    sections: Vec<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Create an empty manifest carrying only `Manifest-Version: 1.0`.
    pub fn new() -> Self {
        Self {
            attributes: vec![(MANIFEST_VERSION_KEY.to_string(), "1.0".to_string())],
            sections: Vec::new(),
        }
    }

    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut sections = Vec::new();
        let mut in_main = true;
        // Continuation lines extend the raw bytes of the previous line.
        let mut pending: Option<String> = None;
        let mut pending_line = 0;

        let lines: Vec<&str> = text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();

        for (idx, line) in lines.iter().enumerate() {
            let line_no = idx + 1;
            if !in_main {
                sections.push((*line).to_string());
                continue;
            }

            if let Some(rest) = line.strip_prefix(' ') {
                match pending.as_mut() {
                    Some(buf) => buf.push_str(rest),
                    None => {
                        return Err(BundleError::MalformedManifest {
                            line: line_no,
                            message: "continuation line without an attribute".to_string(),
                        })
                    }
                }
                continue;
            }

            if let Some(full) = pending.take() {
                attributes.push(split_attribute(&full, pending_line)?);
            }

            if line.is_empty() {
                in_main = false;
                continue;
            }

            pending = Some((*line).to_string());
            pending_line = line_no;
        }

        if let Some(full) = pending.take() {
            attributes.push(split_attribute(&full, pending_line)?);
        }

        // Drop trailing blank lines so write() does not accumulate them.
        while sections.last().is_some_and(|l| l.is_empty()) {
            sections.pop();
        }

        Ok(Self {
            attributes,
            sections,
        })
    }

    /// Read a manifest from a file.
    pub fn read_from(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|e| BundleError::path_io(path, e))?;
        Self::parse(&text)
    }

    /// Write the manifest to a file, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BundleError::path_io(parent, e))?;
        }
        std::fs::write(path, self.to_text()).map_err(|e| BundleError::path_io(path, e))
    }

    /// Render the manifest text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        let version = self
            .attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(MANIFEST_VERSION_KEY));
        if let Some((k, v)) = version {
            push_wrapped(&mut out, &format!("{}: {}", k, v));
        }
        for (k, v) in &self.attributes {
            if k.eq_ignore_ascii_case(MANIFEST_VERSION_KEY) {
                continue;
            }
            push_wrapped(&mut out, &format!("{}: {}", k, v));
        }
        out.push_str("\r\n");

        if !self.sections.is_empty() {
            for line in &self.sections {
                out.push_str(line);
                out.push_str("\r\n");
            }
            out.push_str("\r\n");
        }
        out
    }

    /// Look up a main attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Set a main attribute, replacing an existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Main attributes in order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Make sure the layer-list key is present.
    ///
    /// An existing value is never touched; otherwise `default_layer` is set.
    /// Returns true when the manifest changed.
    pub fn ensure_layer_key(&mut self, default_layer: &str) -> bool {
        if self.get(LAYERS_KEY).is_some() {
            return false;
        }
        self.set(LAYERS_KEY, default_layer);
        true
    }

    /// Layer names declared by the manifest.
    pub fn layers(&self) -> Result<Vec<String>> {
        let raw = self
            .get(LAYERS_KEY)
            .ok_or_else(|| BundleError::MissingManifestKey(LAYERS_KEY.to_string()))?;
        parse_layer_list(raw)
    }

    /// Digest of the patch payload, if recorded.
    pub fn patch_digest(&self) -> Option<&str> {
        self.get(PATCH_DIGEST_KEY)
    }
}

/// Split a comma-separated layer list.
///
/// Elements are trimmed and empty elements dropped; order is kept and
/// duplicates are left for the caller to judge.
pub fn parse_layer_list(raw: &str) -> Result<Vec<String>> {
    let layers: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    if layers.is_empty() {
        return Err(BundleError::InvalidLayerList(raw.to_string()));
    }
    Ok(layers)
}

/// Hex SHA-256 of everything `reader` yields.
pub fn sha256_hex(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| BundleError::path_io(path, e))?;
    sha256_hex(file).map_err(|e| BundleError::path_io(path, e))
}

fn split_attribute(line: &str, line_no: usize) -> Result<(String, String)> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| BundleError::MalformedManifest {
            line: line_no,
            message: format!("expected 'Name: Value', got '{}'", line),
        })?;
    if name.is_empty() || name.contains(' ') {
        return Err(BundleError::MalformedManifest {
            line: line_no,
            message: format!("invalid attribute name '{}'", name),
        });
    }
    let value = value.strip_prefix(' ').unwrap_or(value);
    Ok((name.to_string(), value.to_string()))
}

fn push_wrapped(out: &mut String, line: &str) {
    let mut rest = line;
    let mut limit = MAX_LINE_BYTES;
    let mut first = true;

    while !rest.is_empty() {
        let mut cut = rest.len().min(limit);
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if !first {
            out.push(' ');
        }
        out.push_str(&rest[..cut]);
        out.push_str("\r\n");
        rest = &rest[cut..];
        first = false;
        limit = MAX_LINE_BYTES - 1;
    }
}
