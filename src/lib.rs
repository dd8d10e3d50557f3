//! Mockforge is the core of a product mockup studio.
//!
//! Users place logo layers on a product photo or live camera frame, arrange them with gestures,
//! and ask a generative image provider to print the designs photorealistically onto the product.
//!
//! # Layout
//!
//! - [`keys`]: credential pool with circuit breakers, persisted in a [`storage`] slot
//! - [`gateway`]: retrying invoker, prompt construction, provider client and the credit-charged
//!   [`AiGateway`]
//! - [`studio`]: [`LayerEngine`] (layers plus undo/redo), [`GestureInterpreter`], draft autosave
//! - [`render`]: cover-crop capture and CPU rasterization of layers into a JPEG
//! - [`credits`]: spend-then-settle credit ledger
//!
//! No `unsafe`; all time-dependent logic reads a [`Clock`] so tests can drive it.
#![forbid(unsafe_code)]

pub mod assets;
pub mod credits;
pub mod foundation;
pub mod gateway;
pub mod keys;
pub mod render;
pub mod storage;
pub mod studio;

pub use assets::store::{Asset, AssetId, AssetKind, AssetStore, MemoryAssetStore};
pub use credits::ledger::{CreditCharge, CreditLedger, CreditTransaction};
pub use foundation::clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use foundation::config::StudioConfig;
pub use foundation::error::{StudioError, StudioResult, UserFacing};
pub use gateway::command::{CanvasCommand, LayerContext};
pub use gateway::invoker::ResilientInvoker;
pub use gateway::prompt::{Overlay, PromptBuilder};
pub use gateway::provider::{GeminiProvider, GenerativeProvider};
pub use gateway::service::{AiGateway, AssetAnalysis};
pub use gateway::wire::ImageBlob;
pub use keys::pool::{Credential, KeyPool, KeyStatus};
pub use render::rasterize::{Sprite, capture_frame, capture_still, load_sprites};
pub use storage::kv::{FileStore, KeyValueStore, MemoryStore, SharedStore};
pub use studio::engine::{Direction, LayerEngine};
pub use studio::gesture::GestureInterpreter;
pub use studio::layer::{BlendMode, LayerId, LayerPatch, PlacedLayer};
