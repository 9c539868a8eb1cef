//! Reducers over the inbound stream.
//!
//! Both services are plain folds: the orchestrator feeds them every inbound
//! event, once, in arrival order. Each owns its state and publishes it on a
//! `watch` channel; everyone else only reads.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use orion_core::{ClientEntry, ClientId, EventType, InboundEvent, TypingMap};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Authoritative roster of connected participants.
#[derive(Debug)]
pub struct SnapshotService {
    tx: watch::Sender<Vec<ClientEntry>>,
}

impl Default for SnapshotService {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotService {
    /// Empty roster.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx }
    }

    /// Apply one inbound event. Returns whether the roster changed.
    pub fn handle(&self, event: &InboundEvent) -> bool {
        match event.kind {
            EventType::ClientList => match event.decode_payload::<Vec<ClientEntry>>() {
                Ok(entries) => {
                    debug!(clients = entries.len(), "roster snapshot");
                    self.tx.send_if_modified(|roster| {
                        if *roster == entries {
                            return false;
                        }
                        *roster = entries;
                        true
                    })
                }
                Err(e) => {
                    warn!(id = %event.id, error = %e, "dropping undecodable client list");
                    false
                }
            },
            EventType::NickUpdate => match event.decode_payload::<ClientEntry>() {
                Ok(update) => self.tx.send_if_modified(|roster| {
                    let Some(entry) = roster.iter_mut().find(|c| c.client_id == update.client_id)
                    else {
                        debug!(client_id = %update.client_id, "nick update for unknown client");
                        return false;
                    };
                    if entry.nick == update.nick {
                        return false;
                    }
                    entry.nick = update.nick;
                    true
                }),
                Err(e) => {
                    warn!(id = %event.id, error = %e, "dropping undecodable nick update");
                    false
                }
            },
            _ => false,
        }
    }

    /// Continuously updated roster signal.
    pub fn clients_list(&self) -> watch::Receiver<Vec<ClientEntry>> {
        self.tx.subscribe()
    }

    /// Current roster, cloned.
    pub fn snapshot(&self) -> Vec<ClientEntry> {
        self.tx.borrow().clone()
    }
}

/// Who is typing right now, and since when.
#[derive(Debug)]
pub struct TypingService {
    tx: watch::Sender<TypingMap>,
}

impl Default for TypingService {
    fn default() -> Self {
        Self::new()
    }
}

impl TypingService {
    /// Nobody typing.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TypingMap::new());
        Self { tx }
    }

    /// Apply one inbound event. Returns whether the typing map changed.
    pub fn handle(&self, event: &InboundEvent) -> bool {
        self.handle_at(event, Utc::now())
    }

    /// [`handle`](Self::handle) with an explicit observation time.
    pub fn handle_at(&self, event: &InboundEvent, now: DateTime<Utc>) -> bool {
        match event.kind {
            EventType::TypingSet => match event.decode_payload::<Vec<ClientId>>() {
                Ok(typing) => {
                    let typing: HashSet<ClientId> = typing.into_iter().collect();
                    self.tx.send_if_modified(|map| {
                        let before = map.len();
                        map.retain(|id, _| typing.contains(id));
                        let mut changed = map.len() != before;
                        for id in typing {
                            if let Some(seen) = map.get_mut(&id) {
                                *seen = now;
                            } else {
                                let _ = map.insert(id, now);
                                changed = true;
                            }
                        }
                        changed
                    })
                }
                Err(e) => {
                    warn!(id = %event.id, error = %e, "dropping undecodable typing set");
                    false
                }
            },
            // clients that left cannot still be typing
            EventType::ClientList => match event.decode_payload::<Vec<ClientEntry>>() {
                Ok(entries) => {
                    let present: HashSet<&ClientId> = entries.iter().map(|c| &c.client_id).collect();
                    self.tx.send_if_modified(|map| {
                        let before = map.len();
                        map.retain(|id, _| present.contains(id));
                        map.len() != before
                    })
                }
                Err(_) => false,
            },
            _ => false,
        }
    }

    /// Continuously updated typing map signal.
    pub fn typing_map(&self) -> watch::Receiver<TypingMap> {
        self.tx.subscribe()
    }

    /// Current typing map, cloned.
    pub fn snapshot(&self) -> TypingMap {
        self.tx.borrow().clone()
    }
}
