//! Per-language override lookup

use std::sync::Arc;

use crate::Result;
use crate::store::TableStore;
use crate::tables::OverrideMap;

/// Override lookup bound to one language
///
/// Holds the language's published override map, so lookups after
/// construction touch no lock. There is no fallback here; the
/// transliterator decides what happens when nothing is found.
#[derive(Debug, Clone)]
pub struct OverrideResolver {
    langcode: String,
    overrides: Arc<OverrideMap>,
}

impl OverrideResolver {
    /// Bind to `langcode`, loading its overrides through `store` if needed
    pub fn new(store: &TableStore, langcode: &str) -> Result<Self> {
        Ok(Self {
            langcode: langcode.to_string(),
            overrides: store.overrides(langcode)?,
        })
    }

    /// Language this resolver answers for
    pub fn langcode(&self) -> &str {
        &self.langcode
    }

    /// Override replacement for `codepoint`, if the language has one
    #[inline]
    pub fn resolve(&self, codepoint: u32) -> Option<&str> {
        self.overrides.get(codepoint)
    }
}

/// One-shot lookup of the `langcode` override for `codepoint`
pub fn resolve(store: &TableStore, langcode: &str, codepoint: u32) -> Result<Option<String>> {
    Ok(store.overrides(langcode)?.get(codepoint).map(str::to_owned))
}
