// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending acknowledgment table for numbered requests.
//!
//! Ids rotate through `0..10`. Entries never expire: when a request is still
//! unanswered after ten more requests, its slot is overwritten and a late
//! reply is attributed to the newer request. The overwrite is logged.

use std::collections::HashMap;
use std::time::Instant;

use strum::Display;
use tracing::warn;

/// Number of distinct ack ids.
pub const ACK_ID_SPACE: u8 = 10;

/// The request a pending ack belongs to. Displays as the wire event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "camelCase")]
pub enum AckKind {
    JoinRoom,
    GetMessageHistory,
    SendMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAck {
    pub kind: AckKind,
    pub created_at: Instant,
}

#[derive(Debug, Default)]
pub struct AckTable {
    next_id: u8,
    pending: HashMap<u8, PendingAck>,
}

impl AckTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and record `kind` under it.
    pub fn register(&mut self, kind: AckKind, now: Instant) -> u8 {
        let id = self.next_id;
        self.next_id = (self.next_id + 1) % ACK_ID_SPACE;

        if let Some(stale) = self.pending.insert(
            id,
            PendingAck {
                kind,
                created_at: now,
            },
        ) {
            warn!(
                ack_id = id,
                stale = %stale.kind,
                replacement = %kind,
                "ack id reused while still pending; stale request dropped"
            );
        }
        id
    }

    /// Remove and return the entry for `id`.
    pub fn resolve(&mut self, id: u8) -> Option<PendingAck> {
        self.pending.remove(&id)
    }

    pub fn is_pending(&self, id: u8) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn kinds_display_as_event_names() {
        assert_eq!(AckKind::JoinRoom.to_string(), "joinRoom");
        assert_eq!(AckKind::GetMessageHistory.to_string(), "getMessageHistory");
        assert_eq!(AckKind::SendMessage.to_string(), "sendMessage");
    }

    #[test]
    fn ids_rotate_modulo_ten() {
        let mut table = AckTable::new();
        let now = Instant::now();
        let ids: Vec<u8> = (0..12)
            .map(|_| {
                let id = table.register(AckKind::SendMessage, now);
                table.resolve(id);
                id
            })
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 1]);
        assert!(table.is_empty());
    }

    #[test]
    fn resolve_removes_entry() {
        let mut table = AckTable::new();
        let id = table.register(AckKind::JoinRoom, Instant::now());
        assert!(table.is_pending(id));
        assert_eq!(table.resolve(id).map(|p| p.kind), Some(AckKind::JoinRoom));
        assert!(!table.is_pending(id));
        assert_eq!(table.resolve(id), None);
    }

    #[test]
    fn unknown_id_resolves_to_none() {
        let mut table = AckTable::new();
        assert_eq!(table.resolve(4), None);
    }

    #[traced_test]
    #[test]
    fn reused_id_overwrites_stale_entry() {
        let mut table = AckTable::new();
        let now = Instant::now();
        assert_eq!(table.register(AckKind::JoinRoom, now), 0);
        for _ in 1..10 {
            table.register(AckKind::SendMessage, now);
        }
        assert_eq!(table.len(), 10);

        // Eleventh unanswered request takes slot 0 from the join.
        assert_eq!(table.register(AckKind::GetMessageHistory, now), 0);
        assert_eq!(table.len(), 10);
        assert_eq!(
            table.resolve(0).map(|p| p.kind),
            Some(AckKind::GetMessageHistory)
        );
        assert!(logs_contain("ack id reused while still pending"));
    }
}
