//! Lazily populated, load-once cache of replacement tables
//!
//! A [`TableStore`] owns one [`TableSource`] and publishes each bank and each
//! language's overrides at most once. Published tables are immutable and
//! handed out as `Arc`s, so callers keep using them without holding a lock.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::Result;
use crate::tables::{Block, DirectorySource, EmbeddedSource, OverrideMap, TableSource};

/// Shared cache of base banks and per-language overrides
pub struct TableStore {
    source: Box<dyn TableSource>,
    blocks: RwLock<HashMap<u32, Option<Arc<Block>>>>,
    overrides: RwLock<HashMap<String, Arc<OverrideMap>>>,
    // Handed out for every language without overrides, never cached per code
    no_overrides: Arc<OverrideMap>,
    // Serializes loads so concurrent first users of a key share one load
    load_lock: Mutex<()>,
}

impl TableStore {
    /// Create an empty cache in front of `source`
    pub fn new(source: impl TableSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            blocks: RwLock::new(HashMap::new()),
            overrides: RwLock::new(HashMap::new()),
            no_overrides: Arc::new(OverrideMap::new()),
            load_lock: Mutex::new(()),
        }
    }

    /// Cache over the tables bundled with the crate
    pub fn embedded() -> Self {
        Self::new(EmbeddedSource)
    }

    /// Cache over a data directory, see [`DirectorySource`]
    pub fn from_directory(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(DirectorySource::new(root)?))
    }

    /// Name of the underlying source
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Base replacements for `bank` (`codepoint >> 8`), loading them on first use
    pub fn block(&self, bank: u32) -> Result<Option<Arc<Block>>> {
        self.load_once(&self.blocks, &bank, |_| true, || {
            let block = self
                .source
                .load_block(bank)
                .inspect_err(|e| log::warn!("failed to load bank {bank:#04x}: {e}"))?;
            match &block {
                Some(b) => log::debug!(
                    "loaded bank {bank:#04x} from {} ({} entries)",
                    self.source.name(),
                    b.mapped_count()
                ),
                None => log::debug!("no data for bank {bank:#04x} in {}", self.source.name()),
            }
            Ok(block.map(Arc::new))
        })
    }

    /// Base replacement for a single codepoint
    pub fn base_replacement(&self, codepoint: u32) -> Result<Option<String>> {
        let block = self.block(codepoint >> 8)?;
        Ok(block.and_then(|b| b.get(bank_offset(codepoint)).map(str::to_owned)))
    }

    /// Overrides for `langcode`, loading them on first use.
    ///
    /// Languages without overrides share one empty map and are not cached,
    /// so arbitrary caller-supplied codes do not grow the store.
    pub fn overrides(&self, langcode: &str) -> Result<Arc<OverrideMap>> {
        let keep = |overrides: &Arc<OverrideMap>| !overrides.is_empty();
        self.load_once(&self.overrides, langcode, keep, || {
            let overrides = self
                .source
                .load_overrides(langcode)
                .inspect_err(|e| log::warn!("failed to load overrides for {langcode:?}: {e}"))?;
            if overrides.is_empty() {
                log::debug!("no overrides for {langcode:?} in {}", self.source.name());
                return Ok(Arc::clone(&self.no_overrides));
            }
            log::debug!(
                "loaded {} overrides for {langcode:?} from {}",
                overrides.len(),
                self.source.name()
            );
            Ok(Arc::new(overrides))
        })
    }

    /// Language codes whose overrides are cached, sorted
    pub fn loaded_languages(&self) -> Vec<String> {
        let mut langs: Vec<_> = self.overrides.read().keys().cloned().collect();
        langs.sort_unstable();
        langs
    }

    /// Banks whose lookups are cached (with or without data), sorted
    pub fn loaded_banks(&self) -> Vec<u32> {
        let mut banks: Vec<_> = self.blocks.read().keys().copied().collect();
        banks.sort_unstable();
        banks
    }

    fn load_once<K, Q, V>(
        &self,
        slots: &RwLock<HashMap<K, V>>,
        key: &Q,
        keep: impl FnOnce(&V) -> bool,
        load: impl FnOnce() -> Result<V>,
    ) -> Result<V>
    where
        K: Borrow<Q> + Hash + Eq,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
        V: Clone,
    {
        if let Some(value) = slots.read().get(key) {
            return Ok(value.clone());
        }

        let _loading = self.load_lock.lock();
        // Another caller may have published while we waited
        if let Some(value) = slots.read().get(key) {
            return Ok(value.clone());
        }

        // Failures are not cached, the next call retries
        let value = load()?;
        if keep(&value) {
            slots.write().insert(key.to_owned(), value.clone());
        }
        Ok(value)
    }
}

impl Default for TableStore {
    fn default() -> Self {
        Self::embedded()
    }
}

impl fmt::Debug for TableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableStore")
            .field("source", &self.source.name())
            .field("banks", &self.loaded_banks())
            .field("languages", &self.loaded_languages())
            .finish()
    }
}

/// Offset of `codepoint` within its bank
#[inline]
pub(crate) fn bank_offset(codepoint: u32) -> u8 {
    (codepoint & 0xFF) as u8
}
