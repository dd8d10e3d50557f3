use tracing::{debug, warn};

use crate::{
    foundation::{
        clock::SharedClock,
        error::{StudioError, StudioResult},
    },
    storage::kv::{SharedStore, get_json, set_json},
    studio::{debounce::Debouncer, layer::PlacedLayer},
};

/// Store slot holding the autosaved layer list.
pub const DRAFT_KEY: &str = "mockforge.studio_draft";
/// Quiet period before a draft is written.
pub const DRAFT_DEBOUNCE_MS: u64 = 1000;

/// Debounced autosave of the studio layer list.
#[derive(Debug)]
pub struct DraftSaver {
    store: SharedStore,
    clock: SharedClock,
    timer: Debouncer,
    pending: Option<Vec<PlacedLayer>>,
}

impl DraftSaver {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            timer: Debouncer::new(DRAFT_DEBOUNCE_MS),
            pending: None,
        }
    }

    /// Remember `layers` as the next draft and restart the quiet period.
    pub fn schedule(&mut self, layers: &[PlacedLayer]) {
        self.pending = Some(layers.to_vec());
        self.timer.schedule(self.clock.now_ms());
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Write the pending draft if its quiet period has elapsed. A failed write keeps the draft
    /// pending and retries after another quiet period.
    pub fn poll(&mut self) -> StudioResult<bool> {
        let now = self.clock.now_ms();
        if !self.timer.ready(now) {
            return Ok(false);
        }
        self.write().inspect_err(|_| self.timer.schedule(now))
    }

    /// Write the pending draft now.
    pub fn flush(&mut self) -> StudioResult<bool> {
        self.timer.cancel();
        self.write()
    }

    fn write(&mut self) -> StudioResult<bool> {
        let Some(layers) = self.pending.as_ref() else {
            return Ok(false);
        };
        set_json(self.store.as_ref(), DRAFT_KEY, layers)?;
        debug!(layers = layers.len(), "draft saved");
        self.pending = None;
        Ok(true)
    }
}

/// Read the saved draft. A corrupt draft is discarded rather than failing the session.
pub fn load_draft(store: &SharedStore) -> StudioResult<Option<Vec<PlacedLayer>>> {
    match get_json::<Vec<PlacedLayer>>(store.as_ref(), DRAFT_KEY) {
        Ok(draft) => Ok(draft),
        Err(err @ StudioError::Serde(_)) => {
            warn!(error = %err, "ignoring unreadable draft");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
