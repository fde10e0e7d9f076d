use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::rules::RawRuleSet;

/// Logical name of the exclusion asset.
pub const DEFAULT_ASSET_NAME: &str = "Data/CustomNPCExclusions";

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ProviderError {
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("failed to read asset {asset}: {message}")]
    Io { asset: String, message: String },
    #[error("malformed asset {asset}: {message}")]
    Malformed { asset: String, message: String },
}

/// Host collaborator that serves exclusion assets.
pub trait ContentProvider {
    /// Fetch the current contents of `asset`.
    ///
    /// # Errors
    /// Returns [`ProviderError`] when the asset is missing, unreadable or not a
    /// string-to-string map.
    fn fetch(&self, asset: &str) -> Result<RawRuleSet, ProviderError>;

    /// Drop any copy of `asset` the provider keeps, so the next fetch reads
    /// the source again.
    fn invalidate(&self, _asset: &str) {}
}

impl<P: ContentProvider + ?Sized> ContentProvider for Rc<P> {
    fn fetch(&self, asset: &str) -> Result<RawRuleSet, ProviderError> {
        (**self).fetch(asset)
    }

    fn invalidate(&self, asset: &str) {
        (**self).invalidate(asset);
    }
}

impl<P: ContentProvider + ?Sized> ContentProvider for Box<P> {
    fn fetch(&self, asset: &str) -> Result<RawRuleSet, ProviderError> {
        (**self).fetch(asset)
    }

    fn invalidate(&self, asset: &str) {
        (**self).invalidate(asset);
    }
}

/// In-process provider for hosts that push asset contents themselves.
#[derive(Debug, Default)]
pub struct MemoryContentProvider {
    assets: RefCell<BTreeMap<String, RawRuleSet>>,
    fetches: Cell<u64>,
}

impl MemoryContentProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_asset(asset: impl Into<String>, raw: RawRuleSet) -> Self {
        let provider = Self::new();
        provider.insert(asset, raw);
        provider
    }

    /// Replace the contents of `asset`.
    pub fn insert(&self, asset: impl Into<String>, raw: RawRuleSet) {
        self.assets.borrow_mut().insert(asset.into(), raw);
    }

    pub fn remove(&self, asset: &str) {
        self.assets.borrow_mut().remove(asset);
    }

    /// Number of `fetch` calls served so far, successful or not.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.get()
    }
}

impl ContentProvider for MemoryContentProvider {
    fn fetch(&self, asset: &str) -> Result<RawRuleSet, ProviderError> {
        self.fetches.set(self.fetches.get() + 1);
        self.assets
            .borrow()
            .get(asset)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(asset.to_string()))
    }
}

/// Loads the raw exclusion asset and never fails: provider errors degrade to
/// an empty rule set.
pub struct RuleStore {
    provider: Box<dyn ContentProvider>,
    asset_name: String,
    reload_requested: Cell<bool>,
}

impl RuleStore {
    pub fn new(provider: impl ContentProvider + 'static) -> Self {
        Self::with_asset_name(provider, DEFAULT_ASSET_NAME)
    }

    pub fn with_asset_name(
        provider: impl ContentProvider + 'static,
        asset_name: impl Into<String>,
    ) -> Self {
        Self {
            provider: Box::new(provider),
            asset_name: asset_name.into(),
            reload_requested: Cell::new(false),
        }
    }

    #[must_use]
    pub fn asset_name(&self) -> &str {
        &self.asset_name
    }

    pub fn load(&self) -> RawRuleSet {
        self.reload_requested.set(false);
        match self.provider.fetch(&self.asset_name) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(
                    target: "exclusions",
                    asset = %self.asset_name,
                    error = %err,
                    "exclusion asset unavailable; treating it as empty"
                );
                RawRuleSet::new()
            }
        }
    }

    /// Make the next cache access fetch from the provider again.
    pub fn force_reload(&self) {
        self.invalidate_provider();
        self.reload_requested.set(true);
    }

    /// Drop the provider's copy of the asset without requesting a reload.
    pub fn invalidate_provider(&self) {
        self.provider.invalidate(&self.asset_name);
    }

    /// Consume a pending reload request.
    pub fn take_reload_request(&self) -> bool {
        self.reload_requested.replace(false)
    }
}

impl std::fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleStore")
            .field("asset_name", &self.asset_name)
            .field("reload_requested", &self.reload_requested.get())
            .finish_non_exhaustive()
    }
}
