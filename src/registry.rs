//! Session registry: the hub and file-list tables, their cached
//! snapshots, and the lock discipline around them.
//!
//! One mutex linearizes every mutation of cached state. Commands that
//! reach the engine follow a strict two-phase pattern: validate and
//! extract under the lock, release it, then call the engine. Holding the
//! registry lock across an engine call risks an ABBA deadlock against
//! the engine's internal locks, and would deadlock callback dispatch
//! when the engine fires an event synchronously from the same call
//! stack. Queries never touch the live engine handles; they read the
//! cache and return copies.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::engine::{Engine, EventSink, FileListing, HubHandle, SearchQuery};
use crate::engine::{FileType, SizeMode};
use crate::event::SessionCallback;
use crate::types::{HubSnapshot, SearchResultSnapshot, UserSnapshot};

/// Chat lines buffered per hub; oldest evicted first past the cap.
pub const MAX_CHAT_LINES: usize = 500;

/// Search filters for [`Registry::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub file_type: FileType,
    pub size_mode: SizeMode,
    pub size: i64,
    /// Restrict to one hub; `None` searches all connected hubs.
    pub hub_url: Option<String>,
}

/// Per-hub cached state. The live `handle` is engine-owned; everything
/// else is bridge-owned mirror state.
pub(crate) struct HubEntry {
    pub handle: Arc<dyn HubHandle>,
    pub chat_history: VecDeque<String>,
    pub search_results: Vec<SearchResultSnapshot>,
    pub users: HashMap<String, UserSnapshot>,
    pub cached: HubSnapshot,
}

impl HubEntry {
    fn new(url: &str, handle: Arc<dyn HubHandle>) -> Self {
        Self {
            handle,
            chat_history: VecDeque::new(),
            search_results: Vec::new(),
            users: HashMap::new(),
            cached: HubSnapshot {
                url: url.to_string(),
                ..Default::default()
            },
        }
    }

    /// Append a formatted chat line, evicting past the cap.
    pub(crate) fn push_chat(&mut self, nick: &str, text: &str) {
        let line = if nick.is_empty() {
            text.to_string()
        } else {
            format!("<{nick}> {text}")
        };
        self.chat_history.push_back(line);
        while self.chat_history.len() > MAX_CHAT_LINES {
            self.chat_history.pop_front();
        }
    }
}

pub(crate) struct RegistryState {
    pub hubs: HashMap<String, HubEntry>,
    pub file_lists: HashMap<String, FileListing>,
    pub callback: Option<Arc<dyn SessionCallback>>,
}

pub(crate) struct Registry {
    engine: Arc<dyn Engine>,
    state: Mutex<RegistryState>,
}

impl Registry {
    pub(crate) fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            state: Mutex::new(RegistryState {
                hubs: HashMap::new(),
                file_lists: HashMap::new(),
                callback: None,
            }),
        }
    }

    pub(crate) fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock()
    }

    pub(crate) fn set_callback(&self, callback: Option<Arc<dyn SessionCallback>>) {
        self.state.lock().callback = callback;
    }

    // ----- Hub commands ------------------------------------------------

    /// Register and start a hub connection. No-op if the address is
    /// already registered. The entry appears in `list_hubs` (with
    /// `connected == false`) before `connect` is issued, so no event can
    /// race the registration.
    pub(crate) fn connect_hub(&self, url: &str, encoding: &str, sink: Arc<dyn EventSink>) -> bool {
        if self.state.lock().hubs.contains_key(url) {
            return true;
        }

        // Lock released: engine call.
        let handle = match self.engine.get_hub(url, encoding) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!("get_hub {url} failed: {err}");
                return false;
            }
        };

        {
            let mut state = self.state.lock();
            // A concurrent connect for the same url may have won.
            if state.hubs.contains_key(url) {
                drop(state);
                self.engine.release_hub(handle);
                return true;
            }
            state.hubs.insert(url.to_string(), HubEntry::new(url, Arc::clone(&handle)));
        }

        handle.attach(sink);
        handle.connect();
        tracing::debug!("hub {url} registered");
        true
    }

    /// Remove a hub and release its live connection. No-op for unknown
    /// addresses.
    pub(crate) fn disconnect_hub(&self, url: &str) {
        let handle = {
            let mut state = self.state.lock();
            match state.hubs.remove(url) {
                Some(entry) => entry.handle,
                None => return,
            }
        };

        // Lock released: engine calls.
        handle.detach();
        handle.disconnect();
        self.engine.release_hub(handle);
        tracing::debug!("hub {url} disconnected");
    }

    /// Remove every hub entry and every open file list, returning the
    /// live handles for the caller to disconnect outside any lock.
    pub(crate) fn drain_for_shutdown(&self) -> Vec<Arc<dyn HubHandle>> {
        let mut state = self.state.lock();
        state.file_lists.clear();
        state
            .hubs
            .drain()
            .map(|(_, entry)| entry.handle)
            .collect()
    }

    // ----- Hub queries (cache only) ------------------------------------

    pub(crate) fn list_hubs(&self) -> Vec<HubSnapshot> {
        self.state
            .lock()
            .hubs
            .values()
            .map(|entry| entry.cached.clone())
            .collect()
    }

    pub(crate) fn is_hub_connected(&self, url: &str) -> bool {
        self.state
            .lock()
            .hubs
            .get(url)
            .is_some_and(|entry| entry.cached.connected)
    }

    /// Most recent `max_lines` chat lines; 0 returns the whole buffer.
    pub(crate) fn get_chat_history(&self, url: &str, max_lines: usize) -> Vec<String> {
        let state = self.state.lock();
        let Some(entry) = state.hubs.get(url) else {
            return Vec::new();
        };
        let len = entry.chat_history.len();
        let start = if max_lines > 0 && len > max_lines {
            len - max_lines
        } else {
            0
        };
        entry.chat_history.iter().skip(start).cloned().collect()
    }

    pub(crate) fn clear_chat_history(&self, url: &str) {
        if let Some(entry) = self.state.lock().hubs.get_mut(url) {
            entry.chat_history.clear();
        }
    }

    pub(crate) fn get_hub_users(&self, url: &str) -> Vec<UserSnapshot> {
        let state = self.state.lock();
        match state.hubs.get(url) {
            Some(entry) => entry.users.values().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Cache-only user lookup; the live engine is never consulted.
    pub(crate) fn get_user(&self, url: &str, nick: &str) -> Option<UserSnapshot> {
        self.state
            .lock()
            .hubs
            .get(url)
            .and_then(|entry| entry.users.get(nick).cloned())
    }

    // ----- Chat commands -----------------------------------------------

    pub(crate) fn send_message(&self, url: &str, text: &str) -> bool {
        let handle = {
            let state = self.state.lock();
            match state.hubs.get(url) {
                Some(entry) => Arc::clone(&entry.handle),
                None => return false,
            }
        };

        // Lock released: engine call.
        match handle.send_chat(text) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("send_chat to {url} failed: {err}");
                false
            }
        }
    }

    pub(crate) fn send_pm(&self, url: &str, nick: &str, text: &str) -> bool {
        if !self.state.lock().hubs.contains_key(url) {
            return false;
        }

        // Lock released: engine call.
        match self.engine.send_private_message(url, nick, text) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("private message to {nick}@{url} failed: {err}");
                false
            }
        }
    }

    // ----- Search ------------------------------------------------------

    pub(crate) fn search(&self, text: &str, options: SearchOptions) -> bool {
        if let Some(url) = options.hub_url.as_deref() {
            if !self.state.lock().hubs.contains_key(url) {
                return false;
            }
        }

        let query = SearchQuery {
            text: text.to_string(),
            file_type: options.file_type,
            size_mode: options.size_mode,
            size: options.size,
            hub_url: options.hub_url,
            token: rand::random::<u32>().to_string(),
        };

        // Lock released: engine call.
        match self.engine.search(&query) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("search dispatch failed: {err}");
                false
            }
        }
    }

    /// Results for one hub, or every hub when `url` is `None`.
    pub(crate) fn get_search_results(&self, url: Option<&str>) -> Vec<SearchResultSnapshot> {
        let state = self.state.lock();
        match url {
            Some(url) => state
                .hubs
                .get(url)
                .map(|entry| entry.search_results.clone())
                .unwrap_or_default(),
            None => state
                .hubs
                .values()
                .flat_map(|entry| entry.search_results.iter().cloned())
                .collect(),
        }
    }

    pub(crate) fn clear_search_results(&self, url: Option<&str>) {
        let mut state = self.state.lock();
        match url {
            Some(url) => {
                if let Some(entry) = state.hubs.get_mut(url) {
                    entry.search_results.clear();
                }
            }
            None => {
                for entry in state.hubs.values_mut() {
                    entry.search_results.clear();
                }
            }
        }
    }
}
