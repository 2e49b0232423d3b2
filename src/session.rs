//! The session facade: process-wide lifecycle plus the whole consumer
//! API surface, delegating to the registry and the capability state.
//!
//! The native engine is a process singleton. A guard static enforces
//! that at most one session holds it at a time; `initialize` on a second
//! session fails until the holder shuts down. Restarting the engine
//! after a shutdown is possible through the guard but the engine itself
//! does not promise clean reinitialization, so it is unsupported.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::capability::{self, ScriptCapability};
use crate::engine::{DownloadRequest, Engine, EventSink};
use crate::error::{BridgeError, CapabilityError};
use crate::event::SessionCallback;
use crate::magnet;
use crate::registry::{Registry, SearchOptions};
use crate::router::EventRouter;
use crate::types::{
    FileListEntry, HashStatusSnapshot, HubSnapshot, QueueItemSnapshot, SearchResultSnapshot,
    ShareDirSnapshot, TransferStats, UserSnapshot,
};

/// Held by whichever session currently owns the engine.
static ENGINE_GUARD: AtomicBool = AtomicBool::new(false);

/// Serializes lifecycle transitions across sessions.
static INIT_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct SessionInner {
    initialized: bool,
    config_dir: PathBuf,
}

/// The bridge's public handle. Cheap to construct; nothing touches the
/// engine until `initialize`.
pub struct Session {
    engine: Arc<dyn Engine>,
    registry: Arc<Registry>,
    router: Arc<EventRouter>,
    scripting: Mutex<Option<ScriptCapability>>,
    inner: Mutex<SessionInner>,
}

fn resolve_config_dir(explicit: Option<&Path>) -> PathBuf {
    let dir = match explicit {
        Some(path) => path.to_path_buf(),
        None => dirs::home_dir()
            .map(|home| home.join(".glacier-bridge"))
            .unwrap_or_else(std::env::temp_dir),
    };
    if let Err(err) = std::fs::create_dir_all(&dir) {
        tracing::warn!("config dir {} unusable ({err}); using temp dir", dir.display());
        return std::env::temp_dir();
    }
    dir
}

impl Session {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        let registry = Arc::new(Registry::new(Arc::clone(&engine)));
        let router = Arc::new(EventRouter::new(Arc::clone(&registry)));
        Self {
            engine,
            registry,
            router,
            scripting: Mutex::new(None),
            inner: Mutex::new(SessionInner {
                initialized: false,
                config_dir: PathBuf::new(),
            }),
        }
    }

    // ----- Lifecycle ---------------------------------------------------

    /// Start the engine and wire up event delivery. Idempotent for this
    /// session; false when another session already holds the engine or
    /// engine startup fails (the guard is released again in that case).
    pub fn initialize(&self, config_dir: Option<&Path>) -> bool {
        match self.try_initialize(config_dir) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("{err}");
                false
            }
        }
    }

    /// Like [`initialize`](Self::initialize) but reports why startup was
    /// refused.
    pub fn try_initialize(&self, config_dir: Option<&Path>) -> Result<(), BridgeError> {
        let _lifecycle = INIT_LOCK.lock();
        if self.inner.lock().initialized {
            return Ok(());
        }
        if ENGINE_GUARD
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BridgeError::Initialization(
                "engine already held by another session".to_string(),
            ));
        }

        let dir = resolve_config_dir(config_dir);
        if let Err(err) = self.engine.startup(&dir) {
            ENGINE_GUARD.store(false, Ordering::SeqCst);
            return Err(BridgeError::Initialization(format!(
                "engine startup failed: {err}"
            )));
        }

        // An empty nick gets the hub handshake rejected.
        let nick_unset = self
            .engine
            .get_setting("Nick")
            .map_or(true, |nick| nick.is_empty());
        if nick_unset {
            let nick = format!("glacier-{}", rand::random::<u16>());
            if let Err(err) = self.engine.set_setting("Nick", &nick) {
                tracing::warn!("fallback nick not stored: {err}");
            }
        }

        *self.scripting.lock() = Some(ScriptCapability::probe(self.engine.as_ref()));
        self.engine.start_timer();
        self.engine
            .subscribe_global(Arc::clone(&self.router) as Arc<dyn EventSink>);

        let mut inner = self.inner.lock();
        inner.initialized = true;
        inner.config_dir = dir;
        tracing::debug!("session initialized, engine {}", self.engine.version());
        Ok(())
    }

    /// Tear everything down in dependency order: stop event intake and
    /// the callback first, then the hub connections, then the engine
    /// threads, and only then the scripting state those threads may
    /// still be touching. No-op when not initialized.
    pub fn shutdown(&self) {
        let _lifecycle = INIT_LOCK.lock();
        if !self.inner.lock().initialized {
            return;
        }

        self.engine.unsubscribe_global();
        self.registry.set_callback(None);

        let handles = self.registry.drain_for_shutdown();
        for handle in handles {
            handle.detach();
            handle.disconnect();
            self.engine.release_hub(handle);
        }

        self.engine.drain();
        if let Some(scripting) = self.scripting.lock().take() {
            scripting.dispose();
        }
        self.engine.shutdown();

        self.inner.lock().initialized = false;
        ENGINE_GUARD.store(false, Ordering::SeqCst);
        tracing::debug!("session shut down");
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    pub fn version(&self) -> String {
        self.engine.version()
    }

    /// Resolved config directory; `None` before `initialize`.
    pub fn config_dir(&self) -> Option<PathBuf> {
        let inner = self.inner.lock();
        inner.initialized.then(|| inner.config_dir.clone())
    }

    /// Swap the consumer callback. Events already past the router's
    /// lock may still reach the previous callback.
    pub fn set_callback(&self, callback: Option<Arc<dyn SessionCallback>>) {
        self.registry.set_callback(callback);
    }

    fn gate(&self) -> bool {
        self.inner.lock().initialized
    }

    // ----- Hubs / chat / users -----------------------------------------

    pub fn connect_hub(&self, url: &str, encoding: &str) -> bool {
        self.gate()
            && self.registry.connect_hub(
                url,
                encoding,
                Arc::clone(&self.router) as Arc<dyn EventSink>,
            )
    }

    pub fn disconnect_hub(&self, url: &str) {
        if self.gate() {
            self.registry.disconnect_hub(url);
        }
    }

    pub fn list_hubs(&self) -> Vec<HubSnapshot> {
        if self.gate() {
            self.registry.list_hubs()
        } else {
            Vec::new()
        }
    }

    pub fn is_hub_connected(&self, url: &str) -> bool {
        self.gate() && self.registry.is_hub_connected(url)
    }

    pub fn send_message(&self, url: &str, text: &str) -> bool {
        self.gate() && self.registry.send_message(url, text)
    }

    pub fn send_pm(&self, url: &str, nick: &str, text: &str) -> bool {
        self.gate() && self.registry.send_pm(url, nick, text)
    }

    pub fn get_chat_history(&self, url: &str, max_lines: usize) -> Vec<String> {
        if self.gate() {
            self.registry.get_chat_history(url, max_lines)
        } else {
            Vec::new()
        }
    }

    pub fn clear_chat_history(&self, url: &str) {
        if self.gate() {
            self.registry.clear_chat_history(url);
        }
    }

    pub fn get_hub_users(&self, url: &str) -> Vec<UserSnapshot> {
        if self.gate() {
            self.registry.get_hub_users(url)
        } else {
            Vec::new()
        }
    }

    pub fn get_user(&self, url: &str, nick: &str) -> Option<UserSnapshot> {
        if self.gate() {
            self.registry.get_user(url, nick)
        } else {
            None
        }
    }

    // ----- Search ------------------------------------------------------

    pub fn search(&self, text: &str, options: SearchOptions) -> bool {
        self.gate() && self.registry.search(text, options)
    }

    pub fn get_search_results(&self, url: Option<&str>) -> Vec<SearchResultSnapshot> {
        if self.gate() {
            self.registry.get_search_results(url)
        } else {
            Vec::new()
        }
    }

    pub fn clear_search_results(&self, url: Option<&str>) {
        if self.gate() {
            self.registry.clear_search_results(url);
        }
    }

    // ----- Download queue ----------------------------------------------

    pub fn add_to_queue(&self, dir: &str, name: &str, size: i64, tth: &str) -> bool {
        if !self.gate() {
            return false;
        }
        let target = Path::new(dir).join(name).to_string_lossy().into_owned();
        match self.engine.enqueue(DownloadRequest {
            target,
            size,
            tth: tth.to_string(),
            owner: None,
        }) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("enqueue {name} failed: {err}");
                false
            }
        }
    }

    /// Queue the file a magnet link names. `download_dir` defaults to the
    /// engine's configured download directory.
    pub fn add_magnet(&self, link: &str, download_dir: Option<&str>) -> bool {
        if !self.gate() {
            return false;
        }
        let Some(info) = magnet::parse_magnet(link) else {
            tracing::warn!("unparseable magnet link");
            return false;
        };
        let dir = match download_dir {
            Some(dir) => dir.to_string(),
            None => match self.engine.get_setting("DownloadDirectory") {
                Some(dir) if !dir.is_empty() => dir,
                _ => return false,
            },
        };
        self.add_to_queue(&dir, &info.name, info.size, &info.tth)
    }

    pub fn remove_from_queue(&self, target: &str) -> bool {
        self.gate() && self.engine_call("remove from queue", self.engine.remove_download(target))
    }

    pub fn move_queue_item(&self, source: &str, target: &str) -> bool {
        self.gate() && self.engine_call("move queue item", self.engine.move_download(source, target))
    }

    pub fn set_priority(&self, target: &str, priority: i32) -> bool {
        self.gate()
            && self.engine_call(
                "set priority",
                self.engine.set_download_priority(target, priority),
            )
    }

    pub fn list_queue(&self) -> Vec<QueueItemSnapshot> {
        if !self.gate() {
            return Vec::new();
        }
        let mut items = Vec::new();
        self.engine.with_queue(&mut |item| items.push(item));
        items
    }

    /// Remove every queued item. Targets are collected first; removal
    /// re-enters the engine and must happen outside its enumeration.
    pub fn clear_queue(&self) {
        if !self.gate() {
            return;
        }
        let mut targets = Vec::new();
        self.engine.with_queue(&mut |item| targets.push(item.target));
        for target in targets {
            let _ = self.engine_call("clear queue", self.engine.remove_download(&target));
        }
    }

    // ----- File lists --------------------------------------------------

    pub fn request_file_list(&self, hub_url: &str, nick: &str, match_queue: bool) -> bool {
        self.gate() && self.registry.request_file_list(hub_url, nick, match_queue)
    }

    /// Match every downloaded file list against the queue.
    pub fn match_all_lists(&self) -> bool {
        self.gate() && self.engine_call("match all lists", self.engine.match_all_lists())
    }

    pub fn list_local_file_lists(&self) -> Vec<String> {
        if self.gate() {
            self.registry.list_local_file_lists()
        } else {
            Vec::new()
        }
    }

    pub fn open_file_list(&self, id: &str) -> Result<(), BridgeError> {
        if !self.gate() {
            return Err(BridgeError::Precondition);
        }
        self.registry.open_file_list(id)
    }

    pub fn browse_file_list(&self, id: &str, path: &str) -> Vec<FileListEntry> {
        if self.gate() {
            self.registry.browse_file_list(id, path)
        } else {
            Vec::new()
        }
    }

    pub fn download_file_from_list(&self, id: &str, path: &str, dest: &str) -> bool {
        self.gate() && self.registry.download_file_from_list(id, path, dest)
    }

    pub fn download_dir_from_list(&self, id: &str, path: &str, dest: &str) -> bool {
        self.gate() && self.registry.download_dir_from_list(id, path, dest)
    }

    pub fn close_file_list(&self, id: &str) {
        if self.gate() {
            self.registry.close_file_list(id);
        }
    }

    pub fn close_all_file_lists(&self) {
        if self.gate() {
            self.registry.close_all_file_lists();
        }
    }

    // ----- Share -------------------------------------------------------

    pub fn add_share_dir(&self, real_path: &str, virtual_name: &str) -> bool {
        if !self.gate() {
            return false;
        }
        // The engine's share manager only accepts paths with a trailing
        // separator.
        let normalized = if real_path.ends_with('/') {
            real_path.to_string()
        } else {
            format!("{real_path}/")
        };
        self.engine_call(
            "add share dir",
            self.engine.add_share_dir(&normalized, virtual_name),
        )
    }

    pub fn remove_share_dir(&self, real_path: &str) -> bool {
        self.gate() && self.engine_call("remove share dir", self.engine.remove_share_dir(real_path))
    }

    pub fn rename_share_dir(&self, real_path: &str, virtual_name: &str) -> bool {
        self.gate()
            && self.engine_call(
                "rename share dir",
                self.engine.rename_share_dir(real_path, virtual_name),
            )
    }

    pub fn list_share(&self) -> Vec<ShareDirSnapshot> {
        if self.gate() {
            self.engine.list_share()
        } else {
            Vec::new()
        }
    }

    pub fn refresh_share(&self) {
        if self.gate() {
            self.engine.refresh_share();
        }
    }

    pub fn share_size(&self) -> i64 {
        if self.gate() {
            self.engine.share_size()
        } else {
            0
        }
    }

    pub fn shared_file_count(&self) -> i64 {
        if self.gate() {
            self.engine.shared_file_count()
        } else {
            0
        }
    }

    // ----- Transfers / hashing -----------------------------------------

    pub fn transfer_stats(&self) -> TransferStats {
        if self.gate() {
            self.engine.transfer_stats()
        } else {
            TransferStats::default()
        }
    }

    pub fn hash_status(&self) -> HashStatusSnapshot {
        if self.gate() {
            self.engine.hash_status()
        } else {
            HashStatusSnapshot::default()
        }
    }

    pub fn pause_hashing(&self, paused: bool) {
        if self.gate() {
            self.engine.set_hash_paused(paused);
        }
    }

    // ----- Settings ----------------------------------------------------

    pub fn get_setting(&self, name: &str) -> Option<String> {
        if self.gate() {
            self.engine.get_setting(name)
        } else {
            None
        }
    }

    pub fn set_setting(&self, name: &str, value: &str) -> bool {
        self.gate() && self.engine_call("set setting", self.engine.set_setting(name, value))
    }

    pub fn reload_config(&self) {
        if self.gate() {
            self.engine.reload_settings();
        }
    }

    pub fn start_networking(&self) {
        if self.gate() {
            self.engine.start_networking();
        }
    }

    // ----- Scripting ---------------------------------------------------

    pub fn script_available(&self) -> bool {
        self.scripting
            .lock()
            .as_ref()
            .is_some_and(ScriptCapability::available)
    }

    /// Evaluate code in the embedded interpreter, returning its textual
    /// result.
    pub fn script_eval(&self, code: &str) -> Result<String, CapabilityError> {
        match self.scripting.lock().as_ref() {
            Some(scripting) => scripting.eval(code),
            None => Err(CapabilityError::NotAvailable),
        }
    }

    pub fn script_eval_file(&self, path: &Path) -> Result<String, CapabilityError> {
        match self.scripting.lock().as_ref() {
            Some(scripting) => scripting.eval_file(path),
            None => Err(CapabilityError::NotAvailable),
        }
    }

    /// Script files under `<config>/scripts/`, sorted by name.
    pub fn list_scripts(&self) -> Vec<String> {
        match self.config_dir() {
            Some(dir) => capability::list_scripts(&dir),
            None => Vec::new(),
        }
    }

    /// Run a script from the scripts directory by file name.
    pub fn run_script(&self, name: &str) -> Result<String, BridgeError> {
        let Some(dir) = self.config_dir() else {
            return Err(BridgeError::Precondition);
        };
        let path = capability::scripts_dir(&dir).join(name);
        if !path.is_file() {
            return Err(BridgeError::NotFound(format!("script {name}")));
        }
        Ok(self.script_eval_file(&path)?)
    }

    // -------------------------------------------------------------------

    /// Engine failures never cross the API raw.
    fn engine_call(&self, what: &str, result: anyhow::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("{what} failed: {err}");
                false
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
