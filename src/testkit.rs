//! Mock engine shared by the crate's test modules. Records every call
//! in an ordered op log and lets tests push events through attached
//! sinks the way the real engine's delivery threads would.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use crate::capability::ScriptHost;
use crate::engine::{
    DownloadRequest, Engine, EventSink, FileListing, GlobalEvent, HubEvent, HubHandle, SearchQuery,
};
use crate::error::CapabilityError;
use crate::types::{HashStatusSnapshot, QueueItemSnapshot, ShareDirSnapshot, TransferStats};

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub enum ScriptMode {
    #[default]
    Absent,
    SymbolFailure,
    Available,
}

pub struct MockHub {
    url: String,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
    connect_calls: Mutex<usize>,
    disconnect_calls: Mutex<usize>,
    sent_chat: Mutex<Vec<String>>,
}

impl MockHub {
    fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            url: url.to_string(),
            sink: Mutex::new(None),
            connect_calls: Mutex::new(0),
            disconnect_calls: Mutex::new(0),
            sent_chat: Mutex::new(Vec::new()),
        })
    }

    /// Deliver an event through the attached sink, like the engine's
    /// per-hub delivery thread would. Silently dropped when detached.
    pub fn emit(&self, event: HubEvent) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.hub_event(&self.url, event);
        }
    }

    pub fn connect_calls(&self) -> usize {
        *self.connect_calls.lock()
    }

    pub fn disconnect_calls(&self) -> usize {
        *self.disconnect_calls.lock()
    }

    pub fn sent_chat(&self) -> Vec<String> {
        self.sent_chat.lock().clone()
    }
}

impl HubHandle for MockHub {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn attach(&self, sink: Arc<dyn EventSink>) {
        *self.sink.lock() = Some(sink);
    }

    fn detach(&self) {
        *self.sink.lock() = None;
    }

    fn connect(&self) {
        *self.connect_calls.lock() += 1;
    }

    fn disconnect(&self) {
        *self.disconnect_calls.lock() += 1;
    }

    fn send_chat(&self, text: &str) -> Result<()> {
        self.sent_chat.lock().push(text.to_string());
        Ok(())
    }
}

struct MockScriptHost {
    evals: Arc<Mutex<Vec<String>>>,
    ops: Arc<Mutex<Vec<String>>>,
}

impl ScriptHost for MockScriptHost {
    fn eval(&self, code: &str) -> Result<String, CapabilityError> {
        if code.contains("syntax") {
            return Err(CapabilityError::Load("near 'syntax'".to_string()));
        }
        if code.contains("abort") {
            return Err(CapabilityError::Runtime("aborted".to_string()));
        }
        self.evals.lock().push(code.to_string());
        Ok(format!("=> {code}"))
    }

    fn eval_file(&self, path: &Path) -> Result<String, CapabilityError> {
        self.evals
            .lock()
            .push(format!("file:{}", path.display()));
        Ok(String::new())
    }
}

impl Drop for MockScriptHost {
    fn drop(&mut self) {
        self.ops.lock().push("script_disposed".to_string());
    }
}

#[derive(Default)]
pub struct MockEngine {
    ops: Arc<Mutex<Vec<String>>>,
    hubs: Mutex<HashMap<String, Arc<MockHub>>>,
    released: Mutex<Vec<String>>,
    global_sink: Mutex<Option<Arc<dyn EventSink>>>,
    searches: Mutex<Vec<SearchQuery>>,
    pms: Mutex<Vec<(String, String, String)>>,
    enqueued: Mutex<Vec<DownloadRequest>>,
    removed: Mutex<Vec<String>>,
    queue_items: Mutex<Vec<QueueItemSnapshot>>,
    file_lists: Mutex<HashMap<String, FileListing>>,
    file_list_loads: Mutex<usize>,
    file_list_dir: Mutex<PathBuf>,
    file_list_requests: Mutex<Vec<(String, String, bool)>>,
    share: Mutex<Vec<ShareDirSnapshot>>,
    settings: Mutex<HashMap<String, String>>,
    hash_paused: Mutex<bool>,
    startup_calls: Mutex<usize>,
    startup_error: Mutex<Option<String>>,
    script_mode: Mutex<ScriptMode>,
    script_evals: Arc<Mutex<Vec<String>>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self, op: &str) {
        self.ops.lock().push(op.to_string());
    }

    /// Ordered log of lifecycle-relevant calls.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().clone()
    }

    /// Get-or-create the hub record for `url`.
    pub fn hub(&self, url: &str) -> Arc<MockHub> {
        Arc::clone(
            self.hubs
                .lock()
                .entry(url.to_string())
                .or_insert_with(|| MockHub::new(url)),
        )
    }

    pub fn released_hubs(&self) -> Vec<String> {
        self.released.lock().clone()
    }

    pub fn searches(&self) -> Vec<SearchQuery> {
        self.searches.lock().clone()
    }

    pub fn enqueued(&self) -> Vec<DownloadRequest> {
        self.enqueued.lock().clone()
    }

    pub fn removed_downloads(&self) -> Vec<String> {
        self.removed.lock().clone()
    }

    pub fn push_queue_item(&self, target: &str) {
        self.queue_items.lock().push(QueueItemSnapshot {
            target: target.to_string(),
            ..Default::default()
        });
    }

    pub fn put_file_list(&self, id: &str, listing: FileListing) {
        self.file_lists.lock().insert(id.to_string(), listing);
    }

    pub fn file_list_loads(&self) -> usize {
        *self.file_list_loads.lock()
    }

    pub fn set_file_list_dir(&self, dir: &Path) {
        *self.file_list_dir.lock() = dir.to_path_buf();
    }

    pub fn file_list_requests(&self) -> Vec<(String, String, bool)> {
        self.file_list_requests.lock().clone()
    }

    pub fn seed_setting(&self, name: &str, value: &str) {
        self.settings
            .lock()
            .insert(name.to_string(), value.to_string());
    }

    pub fn startup_calls(&self) -> usize {
        *self.startup_calls.lock()
    }

    pub fn fail_startup(&self, reason: &str) {
        *self.startup_error.lock() = Some(reason.to_string());
    }

    pub fn set_script_mode(&self, mode: ScriptMode) {
        *self.script_mode.lock() = mode;
    }

    pub fn script_evals(&self) -> Vec<String> {
        self.script_evals.lock().clone()
    }

    /// Deliver a global event through the subscribed sink.
    #[allow(dead_code)]
    pub fn emit_global(&self, event: GlobalEvent) {
        let sink = self.global_sink.lock().clone();
        if let Some(sink) = sink {
            sink.global_event(event);
        }
    }
}

impl Engine for MockEngine {
    fn startup(&self, _config_dir: &Path) -> Result<()> {
        *self.startup_calls.lock() += 1;
        self.log("startup");
        if let Some(reason) = self.startup_error.lock().clone() {
            return Err(anyhow!(reason));
        }
        Ok(())
    }

    fn shutdown(&self) {
        self.log("shutdown");
    }

    fn drain(&self) {
        self.log("drain");
    }

    fn start_timer(&self) {
        self.log("start_timer");
    }

    fn version(&self) -> String {
        "mock-engine 0.1".to_string()
    }

    fn subscribe_global(&self, sink: Arc<dyn EventSink>) {
        self.log("subscribe_global");
        *self.global_sink.lock() = Some(sink);
    }

    fn unsubscribe_global(&self) {
        self.log("unsubscribe_global");
        *self.global_sink.lock() = None;
    }

    fn get_hub(&self, url: &str, _encoding: &str) -> Result<Arc<dyn HubHandle>> {
        self.log("get_hub");
        Ok(self.hub(url))
    }

    fn release_hub(&self, hub: Arc<dyn HubHandle>) {
        self.log("release_hub");
        self.released.lock().push(hub.url());
    }

    fn send_private_message(&self, hub_url: &str, nick: &str, text: &str) -> Result<()> {
        self.pms
            .lock()
            .push((hub_url.to_string(), nick.to_string(), text.to_string()));
        Ok(())
    }

    fn search(&self, query: &SearchQuery) -> Result<()> {
        self.searches.lock().push(query.clone());
        Ok(())
    }

    fn enqueue(&self, request: DownloadRequest) -> Result<()> {
        self.enqueued.lock().push(request);
        Ok(())
    }

    fn remove_download(&self, target: &str) -> Result<()> {
        self.removed.lock().push(target.to_string());
        self.queue_items.lock().retain(|item| item.target != target);
        Ok(())
    }

    fn move_download(&self, _source: &str, _target: &str) -> Result<()> {
        Ok(())
    }

    fn set_download_priority(&self, _target: &str, _priority: i32) -> Result<()> {
        Ok(())
    }

    fn with_queue(&self, f: &mut dyn FnMut(QueueItemSnapshot)) {
        for item in self.queue_items.lock().iter() {
            f(item.clone());
        }
    }

    fn match_all_lists(&self) -> Result<()> {
        self.log("match_all_lists");
        Ok(())
    }

    fn request_file_list(&self, hub_url: &str, nick: &str, match_queue: bool) -> Result<()> {
        self.file_list_requests
            .lock()
            .push((hub_url.to_string(), nick.to_string(), match_queue));
        Ok(())
    }

    fn file_list_dir(&self) -> PathBuf {
        self.file_list_dir.lock().clone()
    }

    fn load_file_list(&self, id: &str) -> Result<FileListing> {
        *self.file_list_loads.lock() += 1;
        self.file_lists
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("no file list {id}"))
    }

    fn add_share_dir(&self, real_path: &str, virtual_name: &str) -> Result<()> {
        self.share.lock().push(ShareDirSnapshot {
            real_path: real_path.to_string(),
            virtual_name: virtual_name.to_string(),
            size: 0,
        });
        Ok(())
    }

    fn remove_share_dir(&self, real_path: &str) -> Result<()> {
        self.share.lock().retain(|dir| dir.real_path != real_path);
        Ok(())
    }

    fn rename_share_dir(&self, real_path: &str, virtual_name: &str) -> Result<()> {
        for dir in self.share.lock().iter_mut() {
            if dir.real_path == real_path {
                dir.virtual_name = virtual_name.to_string();
            }
        }
        Ok(())
    }

    fn list_share(&self) -> Vec<ShareDirSnapshot> {
        self.share.lock().clone()
    }

    fn refresh_share(&self) {
        self.log("refresh_share");
    }

    fn share_size(&self) -> i64 {
        self.share.lock().iter().map(|dir| dir.size).sum()
    }

    fn shared_file_count(&self) -> i64 {
        0
    }

    fn transfer_stats(&self) -> TransferStats {
        TransferStats::default()
    }

    fn hash_status(&self) -> HashStatusSnapshot {
        HashStatusSnapshot {
            paused: *self.hash_paused.lock(),
            ..Default::default()
        }
    }

    fn set_hash_paused(&self, paused: bool) {
        *self.hash_paused.lock() = paused;
    }

    fn get_setting(&self, name: &str) -> Option<String> {
        self.settings.lock().get(name).cloned()
    }

    fn set_setting(&self, name: &str, value: &str) -> Result<()> {
        self.seed_setting(name, value);
        Ok(())
    }

    fn reload_settings(&self) {
        self.log("reload_settings");
    }

    fn start_networking(&self) {
        self.log("start_networking");
    }

    fn probe_scripting(&self) -> Result<Option<Box<dyn ScriptHost>>, CapabilityError> {
        match *self.script_mode.lock() {
            ScriptMode::Absent => Ok(None),
            ScriptMode::SymbolFailure => Err(CapabilityError::SymbolResolution),
            ScriptMode::Available => Ok(Some(Box::new(MockScriptHost {
                evals: Arc::clone(&self.script_evals),
                ops: Arc::clone(&self.ops),
            }))),
        }
    }
}

struct NullSink;

impl EventSink for NullSink {
    fn hub_event(&self, _hub_url: &str, _event: HubEvent) {}
    fn global_event(&self, _event: GlobalEvent) {}
}

/// A sink that discards everything, for tests exercising the registry
/// without the router.
pub fn null_sink() -> Arc<dyn EventSink> {
    Arc::new(NullSink)
}
