//! # Translit - Unicode to ASCII Transliteration
//!
//! Converts arbitrary text into its closest plain-ASCII approximation, for
//! places where only ASCII is acceptable such as machine names, slugs and
//! file names.
//!
//! ## Features
//!
//! - **Per-language overrides**: "Ä" becomes "Ae" in German but "A" by default
//! - **Tolerant decoding**: malformed UTF-8 never fails, each bad sequence
//!   becomes one unknown-character substitute
//! - **Atomic length cap**: output is cut only between the replacements of
//!   two input characters, never inside one
//! - **Lazy tables**: base tables load one 256-codepoint bank at a time and
//!   are shared read-only across threads
//!
//! ## Quick Start
//!
//! ```rust
//! use translit::Transliterator;
//!
//! let translit = Transliterator::embedded();
//!
//! let ascii = translit.transliterate("Ä Ö Ü", "de", "?", None).unwrap();
//! assert_eq!(ascii, "Ae Oe Ue");
//!
//! let capped = translit.transliterate("Ä Ö Ü", "de", "?", Some(4)).unwrap();
//! assert_eq!(capped, "Ae ");
//! ```

#![deny(missing_docs)]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub mod config;
pub mod decoder;
pub mod resolver;
pub mod store;
pub mod tables;

pub use config::Options;
pub use decoder::{Decoder, SourceUnit, decode};
pub use resolver::OverrideResolver;
pub use store::TableStore;
pub use tables::{Block, DirectorySource, EmbeddedSource, MemorySource, OverrideMap, TableSource};

/// Language code used when none is given
pub const DEFAULT_LANGCODE: &str = "en";

/// Substitute emitted for characters without a replacement
pub const DEFAULT_UNKNOWN: &str = "?";

/// Result type for transliteration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading tables or options
///
/// Malformed input, unknown languages and unmapped characters are never
/// errors; they resolve to the unknown-character substitute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Table data location does not exist
    MissingData {
        /// Path or name of the missing location
        location: String,
    },
    /// Table or option file could not be read
    Io {
        /// File that failed
        path: String,
        /// Underlying I/O error message
        message: String,
    },
    /// Table data is malformed
    CorruptTable {
        /// Bank file or language the table belongs to
        table: String,
        /// What is wrong with it
        reason: String,
    },
    /// Option document is malformed
    InvalidConfig(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingData { location } => {
                write!(f, "Table data not found at {}", location)
            }
            Error::Io { path, message } => write!(f, "Failed to read {}: {}", path, message),
            Error::CorruptTable { table, reason } => {
                write!(f, "Corrupt table {}: {}", table, reason)
            }
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// One transliteration call's inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransliterationRequest<'a> {
    /// UTF-8 text, possibly malformed
    pub text: &'a [u8],
    /// Language code selecting overrides (case-sensitive)
    pub langcode: &'a str,
    /// Substitute for characters without a replacement
    pub unknown: &'a str,
    /// Output length cap in characters
    pub max_length: Option<usize>,
}

impl<'a> TransliterationRequest<'a> {
    /// Request with the default substitute and no length cap
    pub fn new<T>(text: &'a T, langcode: &'a str) -> Self
    where
        T: AsRef<[u8]> + ?Sized,
    {
        Self {
            text: text.as_ref(),
            langcode,
            unknown: DEFAULT_UNKNOWN,
            max_length: None,
        }
    }

    /// Replace the unknown-character substitute
    pub fn with_unknown(mut self, unknown: &'a str) -> Self {
        self.unknown = unknown;
        self
    }

    /// Set or clear the output length cap
    pub fn with_max_length(mut self, max_length: impl Into<Option<usize>>) -> Self {
        self.max_length = max_length.into();
        self
    }
}

/// Transliteration engine
///
/// Cheap to clone; clones share the same [`TableStore`].
#[derive(Debug, Clone)]
pub struct Transliterator {
    store: Arc<TableStore>,
}

impl Transliterator {
    /// Create a transliterator reading tables through `store`
    pub fn new(store: Arc<TableStore>) -> Self {
        Self { store }
    }

    /// Transliterator over the bundled tables
    pub fn embedded() -> Self {
        Self::new(Arc::new(TableStore::embedded()))
    }

    /// Shared table cache
    pub fn store(&self) -> &Arc<TableStore> {
        &self.store
    }

    /// Transliterate `text` to ASCII.
    ///
    /// Each decoded character becomes itself (ASCII), the `langcode`
    /// override, the base table entry, or `unknown`, tried in that order.
    /// With `max_length` set, output stops before the first replacement that
    /// would push it past the cap, so it may come out shorter than the cap
    /// but never splits a replacement.
    ///
    /// Only table-load failures are errors.
    pub fn transliterate(
        &self,
        text: impl AsRef<[u8]>,
        langcode: &str,
        unknown: &str,
        max_length: Option<usize>,
    ) -> Result<String> {
        let input = text.as_ref();
        let overrides = OverrideResolver::new(&self.store, langcode)?;
        let mut banks = BankCache::default();
        let unknown_len = unknown.chars().count();

        let mut output = String::with_capacity(input.len());
        let mut length = 0usize;

        for unit in decoder::decode(input) {
            let (piece, piece_len) = match unit.codepoint {
                Some(ch) if ch.is_ascii() => (Piece::Ascii(ch), 1),
                Some(ch) => {
                    let codepoint = u32::from(ch);
                    let replacement = match overrides.resolve(codepoint) {
                        Some(replacement) => Some(replacement),
                        None => banks.lookup(&self.store, codepoint)?,
                    };
                    match replacement {
                        Some(replacement) => {
                            (Piece::Text(replacement), replacement.chars().count())
                        }
                        None => (Piece::Text(unknown), unknown_len),
                    }
                }
                None => (Piece::Text(unknown), unknown_len),
            };

            if max_length.is_some_and(|max| length + piece_len > max) {
                break;
            }
            piece.push_to(&mut output);
            length += piece_len;
        }

        Ok(output)
    }

    /// Run a [`TransliterationRequest`]
    pub fn run(&self, request: &TransliterationRequest<'_>) -> Result<String> {
        self.transliterate(
            request.text,
            request.langcode,
            request.unknown,
            request.max_length,
        )
    }

    /// Replacement for a single codepoint in `langcode`
    pub fn replace(&self, codepoint: u32, langcode: &str, unknown: &str) -> Result<String> {
        if codepoint < 0x80 {
            return Ok(char::from(codepoint as u8).to_string());
        }
        if let Some(replacement) = resolver::resolve(&self.store, langcode, codepoint)? {
            return Ok(replacement);
        }
        Ok(self
            .store
            .base_replacement(codepoint)?
            .unwrap_or_else(|| unknown.to_string()))
    }
}

impl Default for Transliterator {
    fn default() -> Self {
        Self::embedded()
    }
}

/// Output fragment for one source unit
enum Piece<'a> {
    Ascii(char),
    Text(&'a str),
}

impl Piece<'_> {
    #[inline]
    fn push_to(&self, output: &mut String) {
        match self {
            Piece::Ascii(ch) => output.push(*ch),
            Piece::Text(text) => output.push_str(text),
        }
    }
}

/// Banks fetched during one call, so each bank hits the store once
#[derive(Default)]
struct BankCache {
    banks: HashMap<u32, Option<Arc<Block>>>,
}

impl BankCache {
    fn lookup(&mut self, tables: &TableStore, codepoint: u32) -> Result<Option<&str>> {
        let bank = codepoint >> 8;
        if !self.banks.contains_key(&bank) {
            let block = tables.block(bank)?;
            self.banks.insert(bank, block);
        }
        Ok(self
            .banks
            .get(&bank)
            .and_then(|block| block.as_deref())
            .and_then(|block| block.get(store::bank_offset(codepoint))))
    }
}
