//! glacier-bridge: a thread-safe bridge over a singleton native
//! Direct-Connect-style peer-to-peer engine.
//!
//! The engine itself (wire protocols, transfer scheduling, hashing)
//! lives behind the [`Engine`] trait. This crate owns a mirror of its
//! state — hub table, per-hub chat ring buffer, user map, search-result
//! buffer, file-list table — that is safe to read from any consumer
//! thread, and converts the engine's push callbacks into the
//! [`SessionEvent`] taxonomy delivered to one registered callback.
//!
//! ```no_run
//! use std::sync::Arc;
//! use glacier_bridge::{Session, SessionEvent};
//! # fn engine() -> Arc<dyn glacier_bridge::Engine> { unimplemented!() }
//!
//! let session = Session::new(engine());
//! session.initialize(None);
//! session.set_callback(Some(Arc::new(|event: SessionEvent| {
//!     println!("{event:?}");
//! })));
//! session.connect_hub("dchub://hub.example:411", "utf-8");
//! ```
//!
//! Consumers that need events marshaled onto a thread they own can wrap
//! their callback in a [`QueuedDispatcher`].

mod capability;
mod dispatch;
mod engine;
mod error;
mod event;
mod filelist;
mod magnet;
mod registry;
mod router;
mod session;
#[cfg(test)]
mod testkit;
mod types;

pub use capability::ScriptHost;
pub use dispatch::{EventEnvelope, QueuedDispatcher};
pub use engine::{
    DownloadRequest, Engine, EventSink, FileListing, FileType, GlobalEvent, HubEvent, HubHandle,
    ListingDir, ListingFile, ListingOwner, SearchQuery, SizeMode,
};
pub use error::{BridgeError, CapabilityError};
pub use event::{SessionCallback, SessionEvent};
pub use magnet::{parse_magnet, MagnetInfo};
pub use registry::{SearchOptions, MAX_CHAT_LINES};
pub use session::Session;
pub use types::{
    FileListEntry, HashStatusSnapshot, HubSnapshot, QueueItemSnapshot, QueueItemStatus,
    SearchResultSnapshot, ShareDirSnapshot, TransferSnapshot, TransferStats, UserSnapshot,
};
