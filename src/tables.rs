//! Replacement table data and the sources that provide it
//!
//! Base replacements are grouped into banks of 256 consecutive codepoints
//! (`codepoint >> 8`), so only the banks a text actually touches are ever
//! parsed. Language overrides are small sparse maps keyed by codepoint.
//!
//! Tables are stored as JSON:
//!
//! - a bank file is an array of up to 256 entries, each a replacement
//!   string or `null`, indexed by `codepoint & 0xFF`
//! - an override file is an object mapping hexadecimal codepoints
//!   (`"00C4"`, `"0xC4"` or `"U+00C4"`) to replacement strings

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Provider of raw table data
///
/// Sources are read-only; [`crate::TableStore`] caches what they return.
pub trait TableSource: Send + Sync {
    /// Short human-readable name used in logs and errors
    fn name(&self) -> &str;

    /// Load the base replacements for `bank` (`codepoint >> 8`).
    ///
    /// `Ok(None)` means the source has no data for that bank.
    fn load_block(&self, bank: u32) -> Result<Option<Block>>;

    /// Load the overrides for `langcode`. Unknown languages yield an empty map.
    fn load_overrides(&self, langcode: &str) -> Result<OverrideMap>;
}

/// Base replacements for one bank of 256 codepoints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    entries: Vec<Option<String>>,
}

impl Block {
    /// Number of codepoints covered by a bank
    pub const SIZE: usize = 256;

    /// Build a block from per-offset entries. Offsets past the end are unmapped.
    pub fn from_entries(entries: Vec<Option<String>>) -> Result<Self> {
        if entries.len() > Self::SIZE {
            return Err(Error::CorruptTable {
                table: "block".to_string(),
                reason: format!("{} entries, at most {} allowed", entries.len(), Self::SIZE),
            });
        }
        Ok(Self { entries })
    }

    /// Parse a bank file
    pub fn from_json(table: &str, json: &str) -> Result<Self> {
        let entries: Vec<Option<String>> =
            serde_json::from_str(json).map_err(|e| Error::CorruptTable {
                table: table.to_string(),
                reason: e.to_string(),
            })?;
        Self::from_entries(entries).map_err(|e| match e {
            Error::CorruptTable { reason, .. } => Error::CorruptTable {
                table: table.to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Replacement for the codepoint at `offset` within the bank
    #[inline]
    pub fn get(&self, offset: u8) -> Option<&str> {
        self.entries
            .get(usize::from(offset))
            .and_then(|entry| entry.as_deref())
    }

    /// Number of offsets that carry a replacement
    pub fn mapped_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }
}

/// Sparse per-language replacements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideMap {
    entries: HashMap<u32, String>,
}

impl OverrideMap {
    /// Empty override set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an override file
    pub fn from_json(table: &str, json: &str) -> Result<Self> {
        let raw: HashMap<String, String> =
            serde_json::from_str(json).map_err(|e| Error::CorruptTable {
                table: table.to_string(),
                reason: e.to_string(),
            })?;

        let mut entries = HashMap::with_capacity(raw.len());
        for (key, replacement) in raw {
            let codepoint = parse_codepoint(&key).ok_or_else(|| Error::CorruptTable {
                table: table.to_string(),
                reason: format!("invalid codepoint key {key:?}"),
            })?;
            // Several spellings can name one codepoint; which one wins would
            // depend on map iteration order
            if entries.insert(codepoint, replacement).is_some() {
                return Err(Error::CorruptTable {
                    table: table.to_string(),
                    reason: format!("duplicate codepoint {codepoint:#06X}"),
                });
            }
        }

        Ok(Self { entries })
    }

    /// Replacement for `codepoint`, if this language overrides it
    #[inline]
    pub fn get(&self, codepoint: u32) -> Option<&str> {
        self.entries.get(&codepoint).map(String::as_str)
    }

    /// Number of overridden codepoints
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the language overrides nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(u32, S)> for OverrideMap {
    fn from_iter<I: IntoIterator<Item = (u32, S)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(cp, s)| (cp, s.into())).collect(),
        }
    }
}

/// Parse a hexadecimal codepoint key such as `00C4`, `0xC4` or `U+00C4`
pub fn parse_codepoint(key: &str) -> Option<u32> {
    let key = key.trim();
    let digits = ["U+", "u+", "0x", "0X"]
        .iter()
        .find_map(|prefix| key.strip_prefix(prefix))
        .unwrap_or(key);

    // from_str_radix alone would also take a leading sign
    if digits.is_empty()
        || digits.len() > 6
        || !digits.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    u32::from_str_radix(digits, 16)
        .ok()
        .filter(|&cp| cp <= 0x10_FFFF)
}

// Bundled data, parsed on first use of each bank or language
const EMBEDDED_BLOCKS: &[(u32, &str)] = &[
    (0x00, include_str!("../data/x00.json")),
    (0x01, include_str!("../data/x01.json")),
    (0x04, include_str!("../data/x04.json")),
    (0x14, include_str!("../data/x14.json")),
];

const EMBEDDED_OVERRIDES: &[(&str, &str)] = &[
    ("de", include_str!("../data/de.json")),
    ("dk", include_str!("../data/dk.json")),
    ("eo", include_str!("../data/eo.json")),
    ("kg", include_str!("../data/kg.json")),
];

/// Tables compiled into the crate
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedSource;

impl EmbeddedSource {
    /// Language codes that ship with overrides
    pub fn languages() -> impl Iterator<Item = &'static str> {
        EMBEDDED_OVERRIDES.iter().map(|(lang, _)| *lang)
    }
}

impl TableSource for EmbeddedSource {
    fn name(&self) -> &str {
        "embedded"
    }

    fn load_block(&self, bank: u32) -> Result<Option<Block>> {
        EMBEDDED_BLOCKS
            .iter()
            .find(|(b, _)| *b == bank)
            .map(|(_, json)| Block::from_json(&block_file_name(bank), json))
            .transpose()
    }

    fn load_overrides(&self, langcode: &str) -> Result<OverrideMap> {
        match EMBEDDED_OVERRIDES.iter().find(|(lang, _)| *lang == langcode) {
            Some((lang, json)) => OverrideMap::from_json(lang, json),
            None => Ok(OverrideMap::new()),
        }
    }
}

/// Tables read from a data directory
///
/// Banks live in `x{bank:02x}.json` and overrides in `{langcode}.json`.
/// A missing file means "no data"; an unreadable or malformed one is an error.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Open a data directory. Fails if `root` is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::MissingData {
                location: root.display().to_string(),
            });
        }
        Ok(Self { root })
    }

    /// Directory the tables are read from
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_optional(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }
}

impl TableSource for DirectorySource {
    fn name(&self) -> &str {
        self.root.to_str().unwrap_or("data directory")
    }

    fn load_block(&self, bank: u32) -> Result<Option<Block>> {
        let file = block_file_name(bank);
        let path = self.root.join(&file);
        self.read_optional(&path)?
            .map(|json| Block::from_json(&file, &json))
            .transpose()
    }

    fn load_overrides(&self, langcode: &str) -> Result<OverrideMap> {
        // Codes that could name something outside the directory are simply unknown
        if !is_plain_langcode(langcode) {
            log::debug!("ignoring overrides for unusable language code {langcode:?}");
            return Ok(OverrideMap::new());
        }

        let path = self.root.join(format!("{langcode}.json"));
        match self.read_optional(&path)? {
            Some(json) => OverrideMap::from_json(langcode, &json),
            None => Ok(OverrideMap::new()),
        }
    }
}

/// In-memory tables, handy for injecting data directly
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    blocks: HashMap<u32, Block>,
    overrides: HashMap<String, OverrideMap>,
}

impl MemorySource {
    /// Empty source: every non-ASCII codepoint is unknown
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the base replacements for `bank`
    pub fn with_block(mut self, bank: u32, block: Block) -> Self {
        self.blocks.insert(bank, block);
        self
    }

    /// Add overrides for `langcode`
    pub fn with_overrides(mut self, langcode: impl Into<String>, overrides: OverrideMap) -> Self {
        self.overrides.insert(langcode.into(), overrides);
        self
    }
}

impl TableSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn load_block(&self, bank: u32) -> Result<Option<Block>> {
        Ok(self.blocks.get(&bank).cloned())
    }

    fn load_overrides(&self, langcode: &str) -> Result<OverrideMap> {
        Ok(self.overrides.get(langcode).cloned().unwrap_or_default())
    }
}

fn block_file_name(bank: u32) -> String {
    format!("x{bank:02x}.json")
}

fn is_plain_langcode(langcode: &str) -> bool {
    !langcode.is_empty()
        && langcode
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_codepoint_forms() {
        assert_eq!(parse_codepoint("00C4"), Some(0xC4));
        assert_eq!(parse_codepoint("0x446"), Some(0x446));
        assert_eq!(parse_codepoint("U+1F600"), Some(0x1F600));
        assert_eq!(parse_codepoint(""), None);
        assert_eq!(parse_codepoint("0x"), None);
        assert_eq!(parse_codepoint("zz"), None);
        assert_eq!(parse_codepoint("110000"), None);
        assert_eq!(parse_codepoint("+C4"), None);
        assert_eq!(parse_codepoint("U++C4"), None);
        assert_eq!(parse_codepoint("0x-1"), None);
    }

    #[test]
    fn test_block_from_json() {
        let block = Block::from_json("x00", r#"["a", null, ""]"#).unwrap();
        assert_eq!(block.get(0), Some("a"));
        assert_eq!(block.get(1), None);
        assert_eq!(block.get(2), Some(""));
        // Past the stored entries
        assert_eq!(block.get(200), None);
        assert_eq!(block.mapped_count(), 2);
    }

    #[test]
    fn test_block_rejects_oversized_and_malformed() {
        let oversized = serde_json::to_string(&vec!["a"; 257]).unwrap();
        let err = Block::from_json("x07", &oversized).unwrap_err();
        assert!(matches!(err, Error::CorruptTable { ref table, .. } if table == "x07"));

        assert!(Block::from_json("x07", "{").is_err());
        assert!(Block::from_json("x07", "[1, 2]").is_err());
    }

    #[test]
    fn test_override_map_from_json() {
        let map = OverrideMap::from_json("de", r#"{"00C4": "Ae", "0xE4": "ae"}"#).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(0xC4), Some("Ae"));
        assert_eq!(map.get(0xE4), Some("ae"));
        assert_eq!(map.get(0xD6), None);

        let err = OverrideMap::from_json("de", r#"{"Ä": "Ae"}"#).unwrap_err();
        assert!(matches!(err, Error::CorruptTable { .. }));
    }

    #[test]
    fn test_override_map_rejects_duplicate_spellings() {
        for json in [
            r#"{"00C4": "Ae", "C4": "A"}"#,
            r#"{"00C4": "Ae", "C4": "A", "0xC4": "AA", "U+00C4": "X"}"#,
        ] {
            let err = OverrideMap::from_json("de", json).unwrap_err();
            assert_eq!(
                err,
                Error::CorruptTable {
                    table: "de".to_string(),
                    reason: "duplicate codepoint 0x00C4".to_string(),
                }
            );
        }
    }

    #[test]
    fn test_embedded_tables_parse() {
        let source = EmbeddedSource;
        for (bank, _) in EMBEDDED_BLOCKS {
            let block = source.load_block(*bank).unwrap().unwrap();
            assert!(block.mapped_count() > 0, "bank {bank:#x} is empty");
        }
        for lang in EmbeddedSource::languages() {
            assert!(!source.load_overrides(lang).unwrap().is_empty());
        }
        assert!(source.load_block(0x103).unwrap().is_none());
        assert!(source.load_overrides("xx").unwrap().is_empty());
    }

    #[test]
    fn test_embedded_values() {
        let source = EmbeddedSource;
        let latin1 = source.load_block(0x00).unwrap().unwrap();
        assert_eq!(latin1.get(0xC4), Some("A"));
        assert_eq!(latin1.get(0xDF), Some("ss"));
        assert_eq!(latin1.get(0x41), None);

        let cyrillic = source.load_block(0x04).unwrap().unwrap();
        assert_eq!(cyrillic.get(0x46), Some("c"));

        let de = source.load_overrides("de").unwrap();
        assert_eq!(de.get(0xC4), Some("Ae"));
    }

    #[test]
    fn test_directory_source() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("x00.json"), r#"[null, "one"]"#).unwrap();
        fs::write(dir.path().join("fr.json"), r#"{"U+0001": "un"}"#).unwrap();

        let source = DirectorySource::new(dir.path()).unwrap();
        assert_eq!(source.root(), dir.path());

        let block = source.load_block(0).unwrap().unwrap();
        assert_eq!(block.get(1), Some("one"));
        assert!(source.load_block(1).unwrap().is_none());

        assert_eq!(source.load_overrides("fr").unwrap().get(1), Some("un"));
        assert!(source.load_overrides("de").unwrap().is_empty());
    }

    #[test]
    fn test_directory_source_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            DirectorySource::new(&missing),
            Err(Error::MissingData { .. })
        ));

        fs::write(dir.path().join("x05.json"), "not json").unwrap();
        fs::write(dir.path().join("de.json"), "[]").unwrap();
        let source = DirectorySource::new(dir.path()).unwrap();
        assert!(matches!(
            source.load_block(5),
            Err(Error::CorruptTable { .. })
        ));
        assert!(matches!(
            source.load_overrides("de"),
            Err(Error::CorruptTable { .. })
        ));
    }

    #[test]
    fn test_directory_source_unreadable_file() {
        let dir = tempdir().unwrap();
        // Exists but cannot be read as a file
        fs::create_dir(dir.path().join("x06.json")).unwrap();
        fs::create_dir(dir.path().join("fr.json")).unwrap();

        let source = DirectorySource::new(dir.path()).unwrap();
        assert!(matches!(source.load_block(6), Err(Error::Io { .. })));
        assert!(matches!(source.load_overrides("fr"), Err(Error::Io { .. })));
    }

    #[test]
    fn test_directory_source_ignores_path_like_langcodes() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(dir.path().join("secret.json"), r#"{"41": "x"}"#).unwrap();

        let source = DirectorySource::new(&data).unwrap();
        assert!(source.load_overrides("../secret").unwrap().is_empty());
        assert!(source.load_overrides("").unwrap().is_empty());
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new()
            .with_block(0x03, Block::from_entries(vec![Some("x".into())]).unwrap())
            .with_overrides("zz", [(0x300u32, "y")].into_iter().collect());

        assert_eq!(source.load_block(3).unwrap().unwrap().get(0), Some("x"));
        assert!(source.load_block(4).unwrap().is_none());
        assert_eq!(source.load_overrides("zz").unwrap().get(0x300), Some("y"));
        assert!(source.load_overrides("en").unwrap().is_empty());
    }
}
