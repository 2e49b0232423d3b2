//! File-list handles: open, browse, and queue downloads out of parsed
//! remote file lists.
//!
//! Listings live in the registry's file-list table keyed by the id the
//! consumer opened them with. Browsing and download extraction read the
//! owned tree under the registry lock; enqueueing happens with the lock
//! released, like every other engine call.

use std::path::Path;

use crate::engine::{DownloadRequest, ListingDir};
use crate::error::BridgeError;
use crate::registry::Registry;
use crate::types::FileListEntry;

/// Walk a slash-delimited path from `root`. Empty path is the root
/// itself; any missing segment fails closed.
fn resolve_dir<'a>(root: &'a ListingDir, path: &str) -> Option<&'a ListingDir> {
    let mut dir = root;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        dir = dir.dirs.iter().find(|d| d.name == segment)?;
    }
    Some(dir)
}

/// Split `path` into its parent directory path and final segment.
fn split_leaf(path: &str) -> (String, &str) {
    let trimmed = path.trim_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, leaf)) => (parent.to_string(), leaf),
        None => (String::new(), trimmed),
    }
}

fn join_target(dest: &str, name: &str) -> String {
    Path::new(dest).join(name).to_string_lossy().into_owned()
}

impl Registry {
    /// Load and cache a file list. Idempotent: an id that is already
    /// open succeeds without touching the engine. The one query surface
    /// that reports typed errors, because a corrupt on-disk list is
    /// something the consumer must be able to tell apart from "no data".
    pub(crate) fn open_file_list(&self, id: &str) -> Result<(), BridgeError> {
        if self.state().file_lists.contains_key(id) {
            return Ok(());
        }

        // Lock released: engine parses the on-disk list.
        let listing = self
            .engine()
            .load_file_list(id)
            .map_err(|err| BridgeError::EngineCall(format!("load file list {id}: {err}")))?;

        self.state()
            .file_lists
            .entry(id.to_string())
            .or_insert(listing);
        Ok(())
    }

    pub(crate) fn close_file_list(&self, id: &str) {
        self.state().file_lists.remove(id);
    }

    pub(crate) fn close_all_file_lists(&self) {
        self.state().file_lists.clear();
    }

    /// Entries of one directory inside an open list. Unknown id or path
    /// returns empty.
    pub(crate) fn browse_file_list(&self, id: &str, path: &str) -> Vec<FileListEntry> {
        let state = self.state();
        let Some(listing) = state.file_lists.get(id) else {
            return Vec::new();
        };
        let Some(dir) = resolve_dir(&listing.root, path) else {
            return Vec::new();
        };
        let mut entries: Vec<FileListEntry> = dir
            .dirs
            .iter()
            .map(|d| FileListEntry {
                name: d.name.clone(),
                size: d.total_size(),
                tth: String::new(),
                is_directory: true,
            })
            .collect();
        entries.extend(dir.files.iter().map(|f| FileListEntry {
            name: f.name.clone(),
            size: f.size,
            tth: f.tth.clone(),
            is_directory: false,
        }));
        entries
    }

    /// Queue a single file out of an open list into `dest`.
    pub(crate) fn download_file_from_list(&self, id: &str, path: &str, dest: &str) -> bool {
        let request = {
            let state = self.state();
            let Some(listing) = state.file_lists.get(id) else {
                return false;
            };
            let (parent, leaf) = split_leaf(path);
            let Some(dir) = resolve_dir(&listing.root, &parent) else {
                return false;
            };
            let Some(file) = dir.files.iter().find(|f| f.name == leaf) else {
                return false;
            };
            DownloadRequest {
                target: join_target(dest, &file.name),
                size: file.size,
                tth: file.tth.clone(),
                owner: Some(listing.owner.clone()),
            }
        };

        // Lock released: engine call.
        match self.engine().enqueue(request) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("enqueue from list {id} failed: {err}");
                false
            }
        }
    }

    /// Queue every file under a directory of an open list, preserving
    /// the subtree layout beneath `dest`. Individual enqueue failures
    /// are logged and skipped; false only when nothing was resolvable.
    pub(crate) fn download_dir_from_list(&self, id: &str, path: &str, dest: &str) -> bool {
        let requests = {
            let state = self.state();
            let Some(listing) = state.file_lists.get(id) else {
                return false;
            };
            let Some(dir) = resolve_dir(&listing.root, path) else {
                return false;
            };
            let mut requests = Vec::new();
            collect_requests(dir, dest, &listing.owner, &mut requests);
            requests
        };

        if requests.is_empty() {
            return false;
        }
        // Lock released: engine calls.
        for request in requests {
            if let Err(err) = self.engine().enqueue(request) {
                tracing::warn!("enqueue from list {id} failed: {err}");
            }
        }
        true
    }

    /// File lists already downloaded to the engine's list directory,
    /// sorted by name. Missing directory reads as empty.
    pub(crate) fn list_local_file_lists(&self) -> Vec<String> {
        let dir = self.engine().file_list_dir();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Ask a user for their file list. Requires a registered hub.
    pub(crate) fn request_file_list(&self, hub_url: &str, nick: &str, match_queue: bool) -> bool {
        if !self.state().hubs.contains_key(hub_url) {
            return false;
        }

        // Lock released: engine call.
        match self.engine().request_file_list(hub_url, nick, match_queue) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("file list request to {nick}@{hub_url} failed: {err}");
                false
            }
        }
    }
}

fn collect_requests(
    dir: &ListingDir,
    dest: &str,
    owner: &crate::engine::ListingOwner,
    out: &mut Vec<DownloadRequest>,
) {
    for file in &dir.files {
        out.push(DownloadRequest {
            target: join_target(dest, &file.name),
            size: file.size,
            tth: file.tth.clone(),
            owner: Some(owner.clone()),
        });
    }
    for sub in &dir.dirs {
        let sub_dest = join_target(dest, &sub.name);
        collect_requests(sub, &sub_dest, owner, out);
    }
}
