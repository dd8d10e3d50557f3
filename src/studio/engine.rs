use tracing::debug;

use crate::{
    assets::store::AssetId,
    studio::{
        history::History,
        layer::{LayerId, LayerPatch, PlacedLayer},
    },
};

/// Direction for [`LayerEngine::reorder`]. Forward moves toward the top of the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// One step up (drawn later).
    Forward,
    /// One step down (drawn earlier).
    Backward,
}

/// Read-only view handed to observers after every state change.
#[derive(Clone, Copy, Debug)]
pub struct EngineView<'a> {
    /// Live layer list, bottom to top.
    pub layers: &'a [PlacedLayer],
    /// Selected layer, if any.
    pub selected: Option<&'a LayerId>,
    /// Whether undo is available.
    pub can_undo: bool,
    /// Whether redo is available.
    pub can_redo: bool,
}

type Observer = Box<dyn FnMut(&EngineView<'_>)>;

/// Owns the placed layers of one studio session plus their undo history.
///
/// `update` edits the live list only; every other mutating command commits a snapshot. Invalid
/// ids are no-ops.
pub struct LayerEngine {
    layers: Vec<PlacedLayer>,
    selected: Option<LayerId>,
    history: History<Vec<PlacedLayer>>,
    observers: Vec<Observer>,
}

impl std::fmt::Debug for LayerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerEngine")
            .field("layers", &self.layers)
            .field("selected", &self.selected)
            .field("history_len", &self.history.len())
            .field("history_cursor", &self.history.cursor())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for LayerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerEngine {
    /// Empty canvas.
    pub fn new() -> Self {
        Self::from_layers(Vec::new())
    }

    /// Start from a restored layer list (e.g. a saved draft). It becomes the history root.
    pub fn from_layers(layers: Vec<PlacedLayer>) -> Self {
        Self {
            history: History::new(layers.clone()),
            layers,
            selected: None,
            observers: Vec::new(),
        }
    }

    pub fn layers(&self) -> &[PlacedLayer] {
        &self.layers
    }

    pub fn selected(&self) -> Option<&LayerId> {
        self.selected.as_ref()
    }

    pub fn layer(&self, id: &LayerId) -> Option<&PlacedLayer> {
        self.layers.iter().find(|l| &l.uid == id)
    }

    /// Select a layer, or clear the selection with `None`. Unknown ids clear it too.
    pub fn select(&mut self, id: Option<&LayerId>) {
        let next = id.filter(|id| self.layer(id).is_some()).cloned();
        if next != self.selected {
            self.selected = next;
            self.notify();
        }
    }

    /// Append a centered layer for `asset_id`, commit, and select it.
    pub fn add(&mut self, asset_id: AssetId) -> LayerId {
        let layer = PlacedLayer::new(asset_id);
        let uid = layer.uid.clone();
        let mut next = self.layers.clone();
        next.push(layer);
        self.selected = Some(uid.clone());
        self.commit(next);
        uid
    }

    /// Patch a layer in the live list without touching history. Returns whether it changed.
    pub fn update(&mut self, id: &LayerId, patch: &LayerPatch) -> bool {
        let Some(layer) = self.layers.iter_mut().find(|l| &l.uid == id) else {
            return false;
        };
        let changed = layer.apply(patch);
        if changed {
            self.notify();
        }
        changed
    }

    /// Make `snapshot` the live list and push it onto history.
    pub fn commit(&mut self, snapshot: Vec<PlacedLayer>) {
        self.history.push(snapshot.clone());
        self.layers = snapshot;
        self.fix_selection();
        debug!(
            layers = self.layers.len(),
            history = self.history.len(),
            "layer state committed"
        );
        self.notify();
    }

    /// Commit the live list as it stands.
    pub fn commit_current(&mut self) {
        self.commit(self.layers.clone());
    }

    /// Drop a layer and commit. Returns whether it existed.
    pub fn remove(&mut self, id: &LayerId) -> bool {
        if self.layer(id).is_none() {
            return false;
        }
        let next = self.layers.iter().filter(|l| &l.uid != id).cloned().collect();
        self.commit(next);
        true
    }

    /// Swap a layer with its neighbour. Commits only when the order changed.
    pub fn reorder(&mut self, id: &LayerId, direction: Direction) -> bool {
        let Some(idx) = self.layers.iter().position(|l| &l.uid == id) else {
            return false;
        };
        let other = match direction {
            Direction::Forward if idx + 1 < self.layers.len() => idx + 1,
            Direction::Backward if idx > 0 => idx - 1,
            _ => return false,
        };
        let mut next = self.layers.clone();
        next.swap(idx, other);
        self.commit(next);
        true
    }

    /// Commit an empty canvas and clear the selection.
    pub fn clear(&mut self) {
        self.selected = None;
        self.commit(Vec::new());
    }

    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.undo().cloned() else {
            return false;
        };
        self.restore(snapshot);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.history.redo().cloned() else {
            return false;
        };
        self.restore(snapshot);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Snapshots currently held by history.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Drop layers whose asset no longer resolves. Returns how many were dropped.
    ///
    /// Called after the asset store reports a change. Only the live list is touched; history
    /// keeps its snapshots so an undo can bring a layer back if the asset returns.
    pub fn reconcile_assets(&mut self, resolves: impl Fn(&AssetId) -> bool) -> usize {
        let before = self.layers.len();
        self.layers.retain(|l| resolves(&l.asset_id));
        let dropped = before - self.layers.len();
        if dropped > 0 {
            debug!(dropped, "dropped layers with missing assets");
            self.fix_selection();
            self.notify();
        }
        dropped
    }

    /// Register a callback fired after every state change.
    pub fn subscribe(&mut self, observer: impl FnMut(&EngineView<'_>) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn view(&self) -> EngineView<'_> {
        EngineView {
            layers: &self.layers,
            selected: self.selected.as_ref(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }

    fn restore(&mut self, snapshot: Vec<PlacedLayer>) {
        self.layers = snapshot;
        self.fix_selection();
        self.notify();
    }

    fn fix_selection(&mut self) {
        if let Some(id) = &self.selected
            && !self.layers.iter().any(|l| &l.uid == id)
        {
            self.selected = None;
        }
    }

    fn notify(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let mut observers = std::mem::take(&mut self.observers);
        let view = self.view();
        for observer in &mut observers {
            observer(&view);
        }
        self.observers = observers;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/studio/engine.rs"]
mod tests;
