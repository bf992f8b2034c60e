//! Transliteration options loadable from JSON

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::TableStore;
use crate::{DEFAULT_LANGCODE, DEFAULT_UNKNOWN, Error, Result, TransliterationRequest};

/// Defaults applied to every transliteration, plus where tables come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Language code used to pick overrides
    pub langcode: String,
    /// Substitute for characters without a replacement
    pub unknown: String,
    /// Output length cap in characters
    pub max_length: Option<usize>,
    /// Table data directory; the bundled tables are used when unset
    pub data_dir: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            langcode: DEFAULT_LANGCODE.to_string(),
            unknown: DEFAULT_UNKNOWN.to_string(),
            max_length: None,
            data_dir: None,
        }
    }
}

impl Options {
    /// Parse options from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Read options from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| Error::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }

    /// Build the table store these options point at
    pub fn build_store(&self) -> Result<TableStore> {
        match &self.data_dir {
            Some(dir) => TableStore::from_directory(dir),
            None => Ok(TableStore::embedded()),
        }
    }

    /// Request for `text` carrying these options
    pub fn request<'a, T>(&'a self, text: &'a T) -> TransliterationRequest<'a>
    where
        T: AsRef<[u8]> + ?Sized,
    {
        TransliterationRequest::new(text, &self.langcode)
            .with_unknown(&self.unknown)
            .with_max_length(self.max_length)
    }
}
