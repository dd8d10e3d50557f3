use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::gateway::wire::ImageBlob;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
/// Identifier of an asset in the asset store.
pub struct AssetId(pub String);

impl AssetId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
/// What an asset depicts.
pub enum AssetKind {
    /// A base product photo (shirt, mug, ...).
    #[default]
    Product,
    /// A graphic placed onto products.
    Logo,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// A stored product photo or logo.
pub struct Asset {
    /// Identifier referenced by placed layers.
    pub id: AssetId,
    /// Product or logo.
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// Display name, also used to resolve spoken layer references.
    pub name: String,
    /// Encoded image.
    pub image: ImageBlob,
}

impl Asset {
    /// New asset with a generated id.
    pub fn new(kind: AssetKind, name: impl Into<String>, image: ImageBlob) -> Self {
        Self {
            id: AssetId::generate(),
            kind,
            name: name.into(),
            image,
        }
    }
}

/// Collaborator owning assets. Layers hold weak references (ids) into it.
pub trait AssetStore: Send + Sync + std::fmt::Debug {
    /// All assets, in insertion order.
    fn list(&self) -> Vec<Asset>;
    /// One asset by id.
    fn get(&self, id: &AssetId) -> Option<Asset>;
    /// Insert or replace an asset.
    fn add(&self, asset: Asset);
    /// Delete an asset. Returns whether it existed.
    fn remove(&self, id: &AssetId) -> bool;
    /// Counter bumped on every change; pollers compare it to detect updates.
    fn revision(&self) -> u64;

    /// Whether `id` resolves.
    fn contains(&self, id: &AssetId) -> bool {
        self.get(id).is_some()
    }
}

#[derive(Debug, Default)]
struct Inner {
    assets: Vec<Asset>,
    revision: u64,
}

/// In-memory [`AssetStore`].
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    inner: Mutex<Inner>,
}

impl MemoryAssetStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AssetStore for MemoryAssetStore {
    fn list(&self) -> Vec<Asset> {
        self.lock().assets.clone()
    }

    fn get(&self, id: &AssetId) -> Option<Asset> {
        self.lock().assets.iter().find(|a| &a.id == id).cloned()
    }

    fn add(&self, asset: Asset) {
        let mut inner = self.lock();
        match inner.assets.iter_mut().find(|a| a.id == asset.id) {
            Some(slot) => *slot = asset,
            None => inner.assets.push(asset),
        }
        inner.revision += 1;
    }

    fn remove(&self, id: &AssetId) -> bool {
        let mut inner = self.lock();
        let before = inner.assets.len();
        inner.assets.retain(|a| &a.id != id);
        let removed = inner.assets.len() != before;
        if removed {
            inner.revision += 1;
        }
        removed
    }

    fn revision(&self) -> u64 {
        self.lock().revision
    }

    fn contains(&self, id: &AssetId) -> bool {
        self.lock().assets.iter().any(|a| &a.id == id)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
