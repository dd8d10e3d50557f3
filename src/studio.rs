/// Cancel-and-reschedule timer.
pub mod debounce;
/// Debounced layer-list autosave.
pub mod draft;
/// Layer state with undo/redo.
pub mod engine;
/// Pointer, touch and wheel interpretation.
pub mod gesture;
/// Bounded snapshot history.
pub mod history;
/// Placed layer model.
pub mod layer;
