//! Abstract contract of the native engine.
//!
//! The engine itself (wire protocol, transfer scheduling, hashing) lives
//! outside this crate. These traits describe exactly what the bridge
//! calls into it and what it pushes back. Engine implementations own all
//! background threads; the bridge owns none.
//!
//! Event delivery rules the bridge relies on:
//! - events for one hub arrive in order, on a single delivery thread;
//! - `HubSnapshot`s carried by events are read by the engine on that
//!   delivery thread, where its own accessors are safe;
//! - no ordering is guaranteed across hubs or between hub and global
//!   events.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::capability::ScriptHost;
use crate::error::CapabilityError;
use crate::types::{
    HashStatusSnapshot, HubSnapshot, QueueItemSnapshot, SearchResultSnapshot, ShareDirSnapshot,
    TransferSnapshot, TransferStats, UserSnapshot,
};

/// File type filter for searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileType {
    #[default]
    Any,
    Audio,
    Compressed,
    Document,
    Executable,
    Picture,
    Video,
    Directory,
    /// Query is a content hash, not text.
    Tth,
}

/// Size filter mode for searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SizeMode {
    #[default]
    Any,
    AtLeast,
    AtMost,
}

/// A fully formed search dispatched to the engine.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub file_type: FileType,
    pub size_mode: SizeMode,
    pub size: i64,
    /// Restrict to one hub; `None` searches every connected hub.
    pub hub_url: Option<String>,
    /// Correlation token echoed back in results.
    pub token: String,
}

/// Identity of the remote party a download is sourced from.
#[derive(Debug, Clone, Default)]
pub struct ListingOwner {
    /// Content identifier of the user (base32).
    pub cid: String,
    pub nick: String,
    /// Best-effort hub the user was last seen on, used to open the
    /// transfer connection. May be empty.
    pub hub_hint: String,
}

/// A file inside a parsed file list.
#[derive(Debug, Clone)]
pub struct ListingFile {
    pub name: String,
    pub size: i64,
    pub tth: String,
}

/// A directory inside a parsed file list.
#[derive(Debug, Clone, Default)]
pub struct ListingDir {
    pub name: String,
    pub dirs: Vec<ListingDir>,
    pub files: Vec<ListingFile>,
}

impl ListingDir {
    /// Total size of all files beneath this directory.
    pub fn total_size(&self) -> i64 {
        self.files.iter().map(|f| f.size).sum::<i64>()
            + self.dirs.iter().map(|d| d.total_size()).sum::<i64>()
    }
}

/// A parsed file list: who it came from plus the owned directory tree.
/// Exclusively held by the bridge until explicitly closed.
#[derive(Debug, Clone)]
pub struct FileListing {
    pub owner: ListingOwner,
    pub root: ListingDir,
}

/// A download handed to the engine's queue.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Local target path.
    pub target: String,
    pub size: i64,
    pub tth: String,
    /// Preferred source; `None` lets the engine find sources by hash.
    pub owner: Option<ListingOwner>,
}

/// Events pushed per hub connection, in engine emission order.
#[derive(Debug, Clone)]
pub enum HubEvent {
    Connecting,
    /// Connection established. Carries a fresh snapshot read on the
    /// delivery thread.
    Connected { snapshot: HubSnapshot },
    Failed { reason: String },
    Redirect { new_url: String },
    PasswordRequired,
    /// Hub name/description/counts changed.
    Updated { snapshot: HubSnapshot },
    NickTaken,
    HubFull,
    ChatMessage {
        from: String,
        text: String,
        third_person: bool,
    },
    PrivateMessage {
        from: String,
        to: String,
        text: String,
    },
    StatusMessage { text: String },
    UserUpdated { user: UserSnapshot },
    UserRemoved { nick: String },
    SearchFlood { message: String },
}

/// Events pushed from the engine's global managers.
#[derive(Debug, Clone)]
pub enum GlobalEvent {
    SearchResult(SearchResultSnapshot),
    QueueAdded(QueueItemSnapshot),
    QueueFinished(QueueItemSnapshot),
    QueueRemoved { target: String },
    QueueMoved {
        item: QueueItemSnapshot,
        old_target: String,
    },
    DownloadStarting(TransferSnapshot),
    DownloadComplete(TransferSnapshot),
    DownloadFailed {
        transfer: TransferSnapshot,
        reason: String,
    },
    UploadStarting(TransferSnapshot),
    UploadComplete(TransferSnapshot),
    UploadFailed { path: String, reason: String },
    HashProgress(HashStatusSnapshot),
    /// Periodic timer tick.
    Tick { tick_ms: u64 },
}

/// Receiver for engine events. Implemented by the bridge's event router.
///
/// Invoked from engine threads; implementations must never unwind back
/// into the caller.
pub trait EventSink: Send + Sync {
    fn hub_event(&self, hub_url: &str, event: HubEvent);
    fn global_event(&self, event: GlobalEvent);
}

/// A live hub connection object. Owned by the engine; the bridge only
/// borrows it between `Engine::get_hub` and `Engine::release_hub`.
pub trait HubHandle: Send + Sync {
    fn url(&self) -> String;
    /// Subscribe a sink to this connection's events.
    fn attach(&self, sink: Arc<dyn EventSink>);
    fn detach(&self);
    /// Begin connecting. Progress arrives through the attached sink.
    fn connect(&self);
    fn disconnect(&self);
    /// Send a public chat message.
    fn send_chat(&self, text: &str) -> Result<()>;
}

/// The singleton native engine.
///
/// `startup` may be called at most once per process; the bridge enforces
/// this with its own guard rather than trusting callers.
pub trait Engine: Send + Sync {
    // Lifecycle
    fn startup(&self, config_dir: &Path) -> Result<()>;
    fn shutdown(&self);
    /// Stop connection management and block until every engine socket
    /// thread has exited.
    fn drain(&self);
    /// Start the periodic timer driving tick events.
    fn start_timer(&self);
    fn version(&self) -> String;

    // Global event sources
    fn subscribe_global(&self, sink: Arc<dyn EventSink>);
    fn unsubscribe_global(&self);

    // Hub connections
    fn get_hub(&self, url: &str, encoding: &str) -> Result<Arc<dyn HubHandle>>;
    fn release_hub(&self, hub: Arc<dyn HubHandle>);

    // Chat / search
    fn send_private_message(&self, hub_url: &str, nick: &str, text: &str) -> Result<()>;
    fn search(&self, query: &SearchQuery) -> Result<()>;

    // Download queue
    fn enqueue(&self, request: DownloadRequest) -> Result<()>;
    fn remove_download(&self, target: &str) -> Result<()>;
    fn move_download(&self, source: &str, target: &str) -> Result<()>;
    fn set_download_priority(&self, target: &str, priority: i32) -> Result<()>;
    /// Enumerate the queue. The closure runs inside the engine's own
    /// queue lock; callers must not call back into the engine from it.
    fn with_queue(&self, f: &mut dyn FnMut(QueueItemSnapshot));

    // File lists
    fn request_file_list(&self, hub_url: &str, nick: &str, match_queue: bool) -> Result<()>;
    /// Match every downloaded file list against the queue, adding list
    /// owners as sources for matching items.
    fn match_all_lists(&self) -> Result<()>;
    /// Directory where downloaded file lists are stored.
    fn file_list_dir(&self) -> PathBuf;
    /// Resolve the owner from the id and parse the on-disk listing into
    /// an owned tree.
    fn load_file_list(&self, id: &str) -> Result<FileListing>;

    // Share
    fn add_share_dir(&self, real_path: &str, virtual_name: &str) -> Result<()>;
    fn remove_share_dir(&self, real_path: &str) -> Result<()>;
    fn rename_share_dir(&self, real_path: &str, virtual_name: &str) -> Result<()>;
    fn list_share(&self) -> Vec<ShareDirSnapshot>;
    fn refresh_share(&self);
    fn share_size(&self) -> i64;
    fn shared_file_count(&self) -> i64;

    // Transfers / hashing
    fn transfer_stats(&self) -> TransferStats;
    fn hash_status(&self) -> HashStatusSnapshot;
    fn set_hash_paused(&self, paused: bool);

    // Settings
    fn get_setting(&self, name: &str) -> Option<String>;
    fn set_setting(&self, name: &str, value: &str) -> Result<()>;
    fn reload_settings(&self);
    /// (Re)open TCP/UDP listeners from the current connection settings.
    fn start_networking(&self);

    // Optional scripting
    /// Probe the compiled-in scripting feature. `Ok(None)` when the
    /// feature is absent from this build, `Err(SymbolResolution)` when
    /// present but its entry points cannot be resolved, otherwise a
    /// minimal installed interpreter state.
    fn probe_scripting(&self) -> Result<Option<Box<dyn ScriptHost>>, CapabilityError>;
}
