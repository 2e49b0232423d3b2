//! Native event → SessionEvent conversion and the consumer callback.
//!
//! `SessionEvent` is the taxonomy delivered across the runtime boundary.
//! Serialized with `#[serde(tag = "type", content = "data")]` so foreign
//! consumers can switch on `type` and decode `data` accordingly.

use serde::Serialize;

use crate::engine::{GlobalEvent, HubEvent};
use crate::types::{
    HashStatusSnapshot, QueueItemSnapshot, SearchResultSnapshot, TransferSnapshot, UserSnapshot,
};

/// Events delivered to the registered consumer callback.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    HubConnecting {
        hub_url: String,
    },
    HubConnected {
        hub_url: String,
        hub_name: String,
    },
    HubDisconnected {
        hub_url: String,
        reason: String,
    },
    HubRedirect {
        hub_url: String,
        new_url: String,
    },
    HubPasswordRequest {
        hub_url: String,
    },
    HubUpdated {
        hub_url: String,
        hub_name: String,
    },
    NickTaken {
        hub_url: String,
    },
    HubFull {
        hub_url: String,
    },
    ChatMessage {
        hub_url: String,
        nick: String,
        text: String,
        third_person: bool,
    },
    PrivateMessage {
        hub_url: String,
        from_nick: String,
        to_nick: String,
        text: String,
    },
    StatusMessage {
        hub_url: String,
        text: String,
    },
    UserUpdated {
        hub_url: String,
        user: UserSnapshot,
    },
    UserRemoved {
        hub_url: String,
        nick: String,
    },
    SearchResult(SearchResultSnapshot),
    QueueItemAdded(QueueItemSnapshot),
    QueueItemFinished(QueueItemSnapshot),
    QueueItemRemoved {
        target: String,
    },
    DownloadStarting(TransferSnapshot),
    DownloadComplete(TransferSnapshot),
    DownloadFailed {
        transfer: TransferSnapshot,
        reason: String,
    },
    UploadStarting(TransferSnapshot),
    UploadComplete(TransferSnapshot),
    HashProgress(HashStatusSnapshot),
}

/// The single active event sink a consumer registers on the session.
///
/// Invoked from engine delivery threads, outside the registry lock, so
/// implementations may call back into the session freely. Panics are
/// contained at the router boundary and never reach the engine.
pub trait SessionCallback: Send + Sync {
    fn on_event(&self, event: SessionEvent);
}

impl<F> SessionCallback for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: SessionEvent) {
        self(event)
    }
}

/// Convert a per-hub engine event. Returns `None` for events that are
/// cache-only and have no consumer-facing counterpart.
pub(crate) fn from_hub_event(hub_url: &str, event: HubEvent) -> Option<SessionEvent> {
    let hub_url = hub_url.to_string();
    let out = match event {
        HubEvent::Connecting => SessionEvent::HubConnecting { hub_url },
        HubEvent::Connected { snapshot } => SessionEvent::HubConnected {
            hub_url,
            hub_name: snapshot.name,
        },
        HubEvent::Failed { reason } => SessionEvent::HubDisconnected { hub_url, reason },
        HubEvent::Redirect { new_url } => SessionEvent::HubRedirect { hub_url, new_url },
        HubEvent::PasswordRequired => SessionEvent::HubPasswordRequest { hub_url },
        HubEvent::Updated { snapshot } => SessionEvent::HubUpdated {
            hub_url,
            hub_name: snapshot.name,
        },
        HubEvent::NickTaken => SessionEvent::NickTaken { hub_url },
        HubEvent::HubFull => SessionEvent::HubFull { hub_url },
        HubEvent::ChatMessage {
            from,
            text,
            third_person,
        } => SessionEvent::ChatMessage {
            hub_url,
            nick: from,
            text,
            third_person,
        },
        HubEvent::PrivateMessage { from, to, text } => SessionEvent::PrivateMessage {
            hub_url,
            from_nick: from,
            to_nick: to,
            text,
        },
        HubEvent::StatusMessage { text } => SessionEvent::StatusMessage { hub_url, text },
        HubEvent::UserUpdated { user } => SessionEvent::UserUpdated { hub_url, user },
        HubEvent::UserRemoved { nick } => SessionEvent::UserRemoved { hub_url, nick },
        HubEvent::SearchFlood { message } => SessionEvent::StatusMessage {
            hub_url,
            text: format!("Search flood: {message}"),
        },
    };
    Some(out)
}

/// Convert a global engine event. Ticks stay internal; a failed upload
/// is reported as a status line, matching the per-hub status channel.
pub(crate) fn from_global_event(event: GlobalEvent) -> Option<SessionEvent> {
    let out = match event {
        GlobalEvent::SearchResult(result) => SessionEvent::SearchResult(result),
        GlobalEvent::QueueAdded(item) => SessionEvent::QueueItemAdded(item),
        GlobalEvent::QueueFinished(item) => SessionEvent::QueueItemFinished(item),
        GlobalEvent::QueueRemoved { target } => SessionEvent::QueueItemRemoved { target },
        // A move is reported as an add of the new target.
        GlobalEvent::QueueMoved { item, .. } => SessionEvent::QueueItemAdded(item),
        GlobalEvent::DownloadStarting(t) => SessionEvent::DownloadStarting(t),
        GlobalEvent::DownloadComplete(t) => SessionEvent::DownloadComplete(t),
        GlobalEvent::DownloadFailed { transfer, reason } => {
            SessionEvent::DownloadFailed { transfer, reason }
        }
        GlobalEvent::UploadStarting(t) => SessionEvent::UploadStarting(t),
        GlobalEvent::UploadComplete(t) => SessionEvent::UploadComplete(t),
        GlobalEvent::UploadFailed { path, reason } => SessionEvent::StatusMessage {
            hub_url: String::new(),
            text: format!("Upload failed: {path}: {reason}"),
        },
        GlobalEvent::HashProgress(status) => SessionEvent::HashProgress(status),
        GlobalEvent::Tick { .. } => return None,
    };
    Some(out)
}
