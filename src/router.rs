//! Event router: the single [`EventSink`] attached to every hub and to
//! the engine's global managers.
//!
//! Each push first mutates the registry caches under the lock, then
//! converts to a [`SessionEvent`] and delivers it to the consumer
//! callback with the lock released. The consumer may therefore call
//! straight back into the session from its callback. Panics from the
//! callback are caught here so they never unwind into engine threads.

use std::sync::Arc;

use crate::engine::{EventSink, GlobalEvent, HubEvent};
use crate::event::{self, SessionCallback, SessionEvent};
use crate::registry::{Registry, RegistryState};

pub(crate) struct EventRouter {
    registry: Arc<Registry>,
}

impl EventRouter {
    pub(crate) fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    fn apply_hub_event(state: &mut RegistryState, hub_url: &str, event: &HubEvent) {
        let Some(entry) = state.hubs.get_mut(hub_url) else {
            // Late event for a hub already disconnected.
            tracing::debug!("dropping event for unknown hub {hub_url}");
            return;
        };
        match event {
            HubEvent::Connected { snapshot } => {
                entry.cached = snapshot.clone();
                entry.cached.connected = true;
            }
            HubEvent::Updated { snapshot } => {
                let connected = entry.cached.connected;
                entry.cached = snapshot.clone();
                entry.cached.connected = connected;
            }
            HubEvent::Failed { .. } => {
                entry.cached.connected = false;
                entry.users.clear();
            }
            HubEvent::ChatMessage {
                from,
                text,
                third_person,
            } => {
                if *third_person {
                    entry.push_chat("", &format!("* {from} {text}"));
                } else {
                    entry.push_chat(from, text);
                }
            }
            HubEvent::PrivateMessage { from, text, .. } => {
                entry.push_chat(from, text);
            }
            HubEvent::StatusMessage { text } => {
                entry.push_chat("", &format!("*** {text}"));
            }
            HubEvent::SearchFlood { message } => {
                entry.push_chat("", &format!("*** Search flood: {message}"));
            }
            HubEvent::UserUpdated { user } => {
                entry.users.insert(user.nick.clone(), user.clone());
            }
            HubEvent::UserRemoved { nick } => {
                entry.users.remove(nick);
            }
            HubEvent::Connecting
            | HubEvent::Redirect { .. }
            | HubEvent::PasswordRequired
            | HubEvent::NickTaken
            | HubEvent::HubFull => {}
        }
    }

    fn apply_global_event(state: &mut RegistryState, event: &GlobalEvent) {
        if let GlobalEvent::SearchResult(result) = event {
            // Stash on the originating hub; results whose hub is no
            // longer registered land on an arbitrary remaining hub so
            // they stay retrievable.
            if let Some(entry) = state.hubs.get_mut(&result.hub_url) {
                entry.search_results.push(result.clone());
            } else if let Some(entry) = state.hubs.values_mut().next() {
                entry.search_results.push(result.clone());
            }
        }
    }

    fn dispatch(callback: &Arc<dyn SessionCallback>, event: SessionEvent) {
        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback.on_event(event)));
        if outcome.is_err() {
            tracing::error!("session callback panicked; event dropped");
        }
    }
}

impl EventSink for EventRouter {
    fn hub_event(&self, hub_url: &str, event: HubEvent) {
        let callback = {
            let mut state = self.registry.state();
            Self::apply_hub_event(&mut state, hub_url, &event);
            state.callback.clone()
        };
        if let Some(callback) = callback {
            if let Some(out) = event::from_hub_event(hub_url, event) {
                Self::dispatch(&callback, out);
            }
        }
    }

    fn global_event(&self, event: GlobalEvent) {
        let callback = {
            let mut state = self.registry.state();
            Self::apply_global_event(&mut state, &event);
            state.callback.clone()
        };
        if let Some(callback) = callback {
            if let Some(out) = event::from_global_event(event) {
                Self::dispatch(&callback, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::testkit::{null_sink, MockEngine};
    use crate::types::{HubSnapshot, SearchResultSnapshot, UserSnapshot};
    use parking_lot::Mutex;

    const HUB: &str = "dchub://hub.example:411";

    fn setup() -> (Arc<Registry>, EventRouter) {
        let engine = Arc::new(MockEngine::new());
        let registry = Arc::new(Registry::new(engine as Arc<dyn Engine>));
        registry.connect_hub(HUB, "", null_sink());
        let router = EventRouter::new(Arc::clone(&registry));
        (registry, router)
    }

    fn snapshot(name: &str, users: u32) -> HubSnapshot {
        HubSnapshot {
            url: HUB.to_string(),
            name: name.to_string(),
            user_count: users,
            ..Default::default()
        }
    }

    #[test]
    fn connected_updates_cache_before_dispatch() {
        let (registry, router) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry_in_cb = Arc::clone(&registry);
        let seen_in_cb = Arc::clone(&seen);
        registry.set_callback(Some(Arc::new(move |event: SessionEvent| {
            // The cache must already reflect the event being delivered.
            let hubs = registry_in_cb.list_hubs();
            seen_in_cb.lock().push((event, hubs[0].connected));
        })));

        router.hub_event(
            HUB,
            HubEvent::Connected {
                snapshot: snapshot("Glacier", 12),
            },
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(matches!(
            &seen[0].0,
            SessionEvent::HubConnected { hub_name, .. } if hub_name == "Glacier"
        ));
        assert!(seen[0].1, "cache not committed before dispatch");
        assert!(registry.is_hub_connected(HUB));
    }

    #[test]
    fn failed_marks_disconnected_and_clears_users() {
        let (registry, router) = setup();
        router.hub_event(
            HUB,
            HubEvent::Connected {
                snapshot: snapshot("Glacier", 1),
            },
        );
        router.hub_event(
            HUB,
            HubEvent::UserUpdated {
                user: UserSnapshot {
                    nick: "alice".to_string(),
                    ..Default::default()
                },
            },
        );
        assert_eq!(registry.get_hub_users(HUB).len(), 1);

        router.hub_event(
            HUB,
            HubEvent::Failed {
                reason: "connection reset".to_string(),
            },
        );
        assert!(!registry.is_hub_connected(HUB));
        assert!(registry.get_hub_users(HUB).is_empty());
    }

    #[test]
    fn updated_preserves_connected_flag() {
        let (registry, router) = setup();
        router.hub_event(
            HUB,
            HubEvent::Connected {
                snapshot: snapshot("Glacier", 1),
            },
        );
        router.hub_event(
            HUB,
            HubEvent::Updated {
                snapshot: snapshot("Glacier v2", 7),
            },
        );
        let hubs = registry.list_hubs();
        assert_eq!(hubs[0].name, "Glacier v2");
        assert_eq!(hubs[0].user_count, 7);
        assert!(hubs[0].connected);
    }

    #[test]
    fn chat_events_format_and_stash() {
        let (registry, router) = setup();
        router.hub_event(
            HUB,
            HubEvent::ChatMessage {
                from: "alice".to_string(),
                text: "hello".to_string(),
                third_person: false,
            },
        );
        router.hub_event(
            HUB,
            HubEvent::ChatMessage {
                from: "bob".to_string(),
                text: "waves".to_string(),
                third_person: true,
            },
        );
        router.hub_event(
            HUB,
            HubEvent::StatusMessage {
                text: "rebuilding share".to_string(),
            },
        );
        assert_eq!(
            registry.get_chat_history(HUB, 0),
            vec!["<alice> hello", "* bob waves", "*** rebuilding share"]
        );
    }

    #[test]
    fn private_message_is_stashed_in_history() {
        let (registry, router) = setup();
        router.hub_event(
            HUB,
            HubEvent::PrivateMessage {
                from: "alice".to_string(),
                to: "me".to_string(),
                text: "psst".to_string(),
            },
        );
        assert_eq!(registry.get_chat_history(HUB, 0), vec!["<alice> psst"]);
    }

    #[test]
    fn event_for_unknown_hub_is_dropped() {
        let (registry, router) = setup();
        let count = Arc::new(Mutex::new(0usize));
        let count_in_cb = Arc::clone(&count);
        registry.set_callback(Some(Arc::new(move |_event: SessionEvent| {
            *count_in_cb.lock() += 1;
        })));

        router.hub_event(
            "dchub://gone.example:411",
            HubEvent::ChatMessage {
                from: "ghost".to_string(),
                text: "boo".to_string(),
                third_person: false,
            },
        );
        // Still delivered to the consumer, just not cached.
        assert_eq!(*count.lock(), 1);
        assert!(registry.get_chat_history("dchub://gone.example:411", 0).is_empty());
    }

    #[test]
    fn search_result_falls_back_to_remaining_hub() {
        let (registry, router) = setup();
        router.global_event(GlobalEvent::SearchResult(SearchResultSnapshot {
            file: "linux.iso".to_string(),
            hub_url: "dchub://departed.example:411".to_string(),
            ..Default::default()
        }));
        let results = registry.get_search_results(Some(HUB));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file, "linux.iso");
    }

    #[test]
    fn callback_panic_is_contained() {
        let (registry, router) = setup();
        registry.set_callback(Some(Arc::new(|_event: SessionEvent| {
            panic!("consumer bug");
        })));
        router.hub_event(
            HUB,
            HubEvent::ChatMessage {
                from: "alice".to_string(),
                text: "hello".to_string(),
                third_person: false,
            },
        );
        // The push survived the panic and cache state is intact.
        assert_eq!(registry.get_chat_history(HUB, 0), vec!["<alice> hello"]);
    }

    #[test]
    fn callback_may_reenter_registry() {
        let (registry, router) = setup();
        let registry_in_cb = Arc::clone(&registry);
        let histories = Arc::new(Mutex::new(Vec::new()));
        let histories_in_cb = Arc::clone(&histories);
        registry.set_callback(Some(Arc::new(move |_event: SessionEvent| {
            histories_in_cb
                .lock()
                .push(registry_in_cb.get_chat_history(HUB, 0));
        })));
        router.hub_event(
            HUB,
            HubEvent::ChatMessage {
                from: "alice".to_string(),
                text: "first".to_string(),
                third_person: false,
            },
        );
        assert_eq!(histories.lock()[0], vec!["<alice> first"]);
    }

    #[test]
    fn no_callback_still_applies_cache() {
        let (registry, router) = setup();
        router.hub_event(
            HUB,
            HubEvent::UserUpdated {
                user: UserSnapshot {
                    nick: "alice".to_string(),
                    ..Default::default()
                },
            },
        );
        assert!(registry.get_user(HUB, "alice").is_some());
    }
}
