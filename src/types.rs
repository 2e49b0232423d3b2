//! Snapshot value types mirroring engine state.
//!
//! Everything here is a plain copy, safe to hand to any consumer thread
//! and to serialize over whatever transport the consumer uses.

use serde::Serialize;

/// Cached state of one hub connection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HubSnapshot {
    pub url: String,
    pub name: String,
    pub description: String,
    pub user_count: u32,
    pub shared_bytes: i64,
    pub connected: bool,
    pub is_op: bool,
    pub is_secure: bool,
    pub is_trusted: bool,
    /// TLS cipher name, empty for plaintext hubs.
    pub cipher_name: String,
}

/// A user seen on a hub. Keyed by nick within that hub.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserSnapshot {
    pub nick: String,
    pub description: String,
    pub connection: String,
    pub email: String,
    /// Content identifier (base32 CID).
    pub cid: String,
    pub share_size: i64,
    pub is_op: bool,
    pub is_bot: bool,
}

/// One search result, produced at event time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResultSnapshot {
    /// Full remote path of the file or directory.
    pub file: String,
    pub size: i64,
    /// Tiger tree hash (base32), empty for directories.
    pub tth: String,
    pub nick: String,
    pub hub_url: String,
    pub free_slots: u32,
    pub total_slots: u32,
    pub is_directory: bool,
}

/// An item in the download queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueItemSnapshot {
    /// Local target path.
    pub target: String,
    pub filename: String,
    pub size: i64,
    pub downloaded_bytes: i64,
    pub tth: String,
    /// 0 = paused, 1 = lowest .. 5 = highest.
    pub priority: i32,
    pub sources: u32,
    pub online_sources: u32,
    pub status: QueueItemStatus,
}

/// Queue item state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    #[default]
    Queued,
    Running,
    Finished,
}

/// An active transfer, upload or download.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferSnapshot {
    pub target: String,
    pub nick: String,
    pub hub_url: String,
    pub size: i64,
    pub transferred: i64,
    /// Bytes per second.
    pub speed: i64,
    pub is_download: bool,
}

/// Aggregate transfer statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferStats {
    pub download_speed: i64,
    pub upload_speed: i64,
    pub total_downloaded: i64,
    pub total_uploaded: i64,
    pub download_count: u32,
    pub upload_count: u32,
}

/// A shared directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShareDirSnapshot {
    pub real_path: String,
    pub virtual_name: String,
    pub size: i64,
}

/// Progress of the background hasher.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HashStatusSnapshot {
    pub current_file: String,
    pub bytes_left: u64,
    pub files_left: u64,
    pub paused: bool,
}

/// One entry in a browsed file list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileListEntry {
    pub name: String,
    pub size: i64,
    /// Empty for directories.
    pub tth: String,
    pub is_directory: bool,
}
