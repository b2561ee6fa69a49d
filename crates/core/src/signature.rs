//! File name normalization into the key the learning loop is indexed by.
//!
//! Two revisions of the same kind of document ("Fattura 2024-03 n12.pdf",
//! "fattura_aprile_2024_v2.PDF") must land on the same key, so dates,
//! numbers and revision markers are dropped and separators collapsed.

use serde::{Deserialize, Serialize};
use std::fmt;

const SEPARATORS: &[char] = &[
    '-', '_', '.', ',', ';', '(', ')', '[', ']', '{', '}', '+', '#', '\'', '"', '&', '!', '~', '|',
];

const MONTHS: &[&str] = &[
    "gennaio", "febbraio", "marzo", "aprile", "maggio", "giugno", "luglio", "agosto",
    "settembre", "ottobre", "novembre", "dicembre", "gen", "feb", "mar", "apr", "mag", "giu",
    "lug", "ago", "set", "ott", "nov", "dic", "january", "february", "march", "april", "may",
    "june", "july", "august", "september", "october", "november", "december", "jan", "jun",
    "jul", "aug", "sep", "sept", "oct", "dec",
];

const COPY_MARKERS: &[&str] = &[
    "copia", "copy", "final", "finale", "def", "definitivo", "definitiva", "bis", "new", "nuovo",
    "nuova",
];

// Revision/number prefixes that are noise when followed by digits: v2, rev3, r01, n12, nr5.
const NUMBERED_PREFIXES: &[&str] = &["v", "rev", "r", "n", "nr", "no", "num"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionClass {
    Document,
    Pdf,
    Spreadsheet,
    Presentation,
    Image,
    Drawing,
    Email,
    Archive,
    Other,
}

impl ExtensionClass {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "doc" | "docx" | "odt" | "rtf" | "txt" | "md" | "pages" => ExtensionClass::Document,
            "pdf" | "p7m" => ExtensionClass::Pdf,
            "xls" | "xlsx" | "xlsm" | "ods" | "csv" | "numbers" => ExtensionClass::Spreadsheet,
            "ppt" | "pptx" | "odp" | "key" => ExtensionClass::Presentation,
            "jpg" | "jpeg" | "png" | "gif" | "heic" | "tif" | "tiff" | "webp" | "bmp" => {
                ExtensionClass::Image
            }
            "dwg" | "dxf" | "dwf" | "ifc" | "rvt" | "skp" => ExtensionClass::Drawing,
            "eml" | "msg" | "mbox" => ExtensionClass::Email,
            "zip" | "rar" | "7z" | "tar" | "gz" => ExtensionClass::Archive,
            _ => ExtensionClass::Other,
        }
    }

    /// Guesses the class from magic bytes when the name carries no usable
    /// extension.
    pub fn sniff(bytes: &[u8]) -> Self {
        infer::get(bytes)
            .map(|kind| Self::from_extension(kind.extension()))
            .unwrap_or(ExtensionClass::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionClass::Document => "document",
            ExtensionClass::Pdf => "pdf",
            ExtensionClass::Spreadsheet => "spreadsheet",
            ExtensionClass::Presentation => "presentation",
            ExtensionClass::Image => "image",
            ExtensionClass::Drawing => "drawing",
            ExtensionClass::Email => "email",
            ExtensionClass::Archive => "archive",
            ExtensionClass::Other => "other",
        }
    }
}

impl fmt::Display for ExtensionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Signature {
    pub key: String,
    pub extension_class: ExtensionClass,
}

impl Signature {
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.key.split(' ').filter(|t| !t.is_empty())
    }

    /// Key under which learned placements are stored. Two files share a
    /// learned placement only when both the words and the class agree.
    pub fn store_key(&self) -> String {
        format!("{}|{}", self.key, self.extension_class)
    }
}

pub fn normalize(file_name: &str) -> Signature {
    let lowered = file_name.trim().to_lowercase();
    // Callers sometimes pass a full path; only the last component matters.
    let base = lowered
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(lowered.as_str());
    let (stem, extension_class) = split_extension(base);

    let tokens: Vec<&str> = stem
        .split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .filter(|t| !t.is_empty())
        .collect();
    let kept: Vec<&str> = tokens.iter().copied().filter(|t| !is_noise(t)).collect();

    let key = if !kept.is_empty() {
        kept.join(" ")
    } else if !tokens.is_empty() {
        tokens.join(" ")
    } else {
        // Nothing but separators: keep the raw characters so distinct
        // names still get distinct keys.
        let raw = if stem.trim().is_empty() { base } else { stem };
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    };

    Signature {
        key,
        extension_class,
    }
}

fn split_extension(base: &str) -> (&str, ExtensionClass) {
    match base.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem, ExtensionClass::from_extension(ext))
        }
        _ => (base, ExtensionClass::Other),
    }
}

fn is_noise(token: &str) -> bool {
    if token.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    if MONTHS.contains(&token) || COPY_MARKERS.contains(&token) {
        return true;
    }
    is_numbered_marker(token) || is_fused_date(token)
}

fn is_numbered_marker(token: &str) -> bool {
    let digits_at = match token.find(|c: char| c.is_ascii_digit()) {
        Some(i) if i > 0 => i,
        _ => return false,
    };
    let (prefix, rest) = token.split_at(digits_at);
    NUMBERED_PREFIXES.contains(&prefix) && rest.chars().all(|c| c.is_ascii_digit())
}

// "15mar2024", "marzo2024", "2024mar", "q3" style tokens.
fn is_fused_date(token: &str) -> bool {
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    if !has_digit {
        return false;
    }
    let letters: String = token.chars().filter(|c| c.is_alphabetic()).collect();
    MONTHS.contains(&letters.as_str()) || letters == "q" || letters == "h"
}
