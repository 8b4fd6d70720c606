//! Delivery and read progression. A message's status only ever moves
//! forward: sent, then delivered, then read. Group messages become read once
//! every member other than the sender has a read receipt.

use parley_types::models::MessageStatus;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::members::require_member;
use crate::models::status_column;
use crate::{ChatError, Database, Result, now};

struct StatusState {
    conversation_id: String,
    sender_id: String,
    is_group: bool,
    status: MessageStatus,
}

impl Database {
    /// Idempotent. Never moves a read message back to delivered.
    pub fn mark_delivered(&self, message_id: &str) -> Result<MessageStatus> {
        self.with_tx(|conn| {
            let state = require_status_state(conn, message_id)?;
            deliver_in(conn, message_id, &state)
        })
    }

    /// Delivery acknowledged by one recipient. The recipient must belong to
    /// the conversation; the sender acknowledging their own message changes
    /// nothing.
    pub fn mark_delivered_to(&self, message_id: &str, recipient_id: &str) -> Result<MessageStatus> {
        self.with_tx(|conn| {
            let state = require_status_state(conn, message_id)?;
            require_member(conn, &state.conversation_id, recipient_id)?;
            if recipient_id == state.sender_id {
                return Ok(state.status);
            }
            deliver_in(conn, message_id, &state)
        })
    }

    /// Record that `reader_id` has seen the message and advance it to read
    /// when the read quorum is met. Returns the resulting status.
    pub fn mark_read(&self, message_id: &str, reader_id: &str) -> Result<MessageStatus> {
        self.with_tx(|conn| {
            let state = require_status_state(conn, message_id)?;
            require_member(conn, &state.conversation_id, reader_id)?;

            // The sender reading their own message counts for nothing.
            if reader_id == state.sender_id {
                return Ok(state.status);
            }

            conn.execute(
                "INSERT INTO read_receipts (message_id, user_id, read_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(message_id, user_id) DO NOTHING",
                params![message_id, reader_id, now()],
            )?;

            if state.status == MessageStatus::Read {
                return Ok(MessageStatus::Read);
            }
            if state.is_group && !group_quorum_met(conn, message_id, &state)? {
                return Ok(state.status);
            }

            let at = now();
            conn.execute(
                "UPDATE messages
                 SET status = 'read', read_at = ?2, delivered_at = COALESCE(delivered_at, ?2)
                 WHERE id = ?1",
                params![message_id, at],
            )?;
            debug!("Message {} read", message_id);
            Ok(MessageStatus::Read)
        })
    }

    pub fn read_receipt_count(&self, message_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM read_receipts WHERE message_id = ?1",
                [message_id],
                |r| r.get(0),
            )?;
            Ok(count)
        })
    }
}

fn deliver_in(conn: &Connection, message_id: &str, state: &StatusState) -> Result<MessageStatus> {
    if state.status >= MessageStatus::Delivered {
        return Ok(state.status);
    }

    conn.execute(
        "UPDATE messages
         SET status = 'delivered', delivered_at = COALESCE(delivered_at, ?2)
         WHERE id = ?1",
        params![message_id, now()],
    )?;
    debug!("Message {} delivered", message_id);
    Ok(MessageStatus::Delivered)
}

fn require_status_state(conn: &Connection, message_id: &str) -> Result<StatusState> {
    conn.query_row(
        "SELECT m.conversation_id, m.sender_id, c.is_group, m.status
         FROM messages m
         JOIN conversations c ON c.id = m.conversation_id
         WHERE m.id = ?1",
        [message_id],
        |r| {
            Ok(StatusState {
                conversation_id: r.get(0)?,
                sender_id: r.get(1)?,
                is_group: r.get(2)?,
                status: status_column(r, 3)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| ChatError::NotFound(format!("message {message_id}")))
}

/// Receipts from anyone but the sender, against the members currently in the
/// group other than the sender. Receipts of members who since left still
/// count.
fn group_quorum_met(conn: &Connection, message_id: &str, state: &StatusState) -> Result<bool> {
    let required: i64 = conn.query_row(
        "SELECT COUNT(*) FROM group_members WHERE conversation_id = ?1 AND user_id != ?2",
        params![state.conversation_id, state.sender_id],
        |r| r.get(0),
    )?;
    let received: i64 = conn.query_row(
        "SELECT COUNT(*) FROM read_receipts WHERE message_id = ?1 AND user_id != ?2",
        params![message_id, state.sender_id],
        |r| r.get(0),
    )?;

    debug!(
        "Read quorum for {}: {}/{} receipts",
        message_id, received, required
    );
    Ok(received >= required)
}
