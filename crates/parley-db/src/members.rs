//! Membership registry. Every membership insert goes through
//! [`add_member_in`], which is where the private-conversation cap lives.

use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::conversations::require_conversation;
use crate::models::{USER_COLUMNS, UserRow, user_from_row};
use crate::users::require_user;
use crate::{ChatError, Database, Result, now};

/// A private conversation holds exactly this many members.
pub const PRIVATE_MEMBER_CAP: i64 = 2;

impl Database {
    /// Idempotent: adding an existing member succeeds without a new row.
    pub fn add_member(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.with_tx(|conn| add_member_in(conn, conversation_id, user_id).map(|_| ()))
    }

    /// Groups are left in place even when the last member leaves.
    pub fn remove_member(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.with_tx(|conn| {
            let conversation = require_conversation(conn, conversation_id)?;
            if !conversation.is_group {
                return Err(ChatError::Conflict(format!(
                    "cannot leave private conversation {conversation_id}"
                )));
            }

            let removed = conn.execute(
                "DELETE FROM group_members WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id, user_id],
            )?;
            if removed == 0 {
                return Err(ChatError::NotFound(format!(
                    "user {user_id} is not a member of {conversation_id}"
                )));
            }

            info!("User {} left group {}", user_id, conversation_id);
            Ok(())
        })
    }

    pub fn list_members(&self, conversation_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            require_conversation(conn, conversation_id)?;
            query_members(conn, conversation_id)
        })
    }

    pub fn is_member(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| is_member_in(conn, conversation_id, user_id))
    }
}

/// Returns `true` when a new membership row was written.
pub(crate) fn add_member_in(conn: &Connection, conversation_id: &str, user_id: &str) -> Result<bool> {
    let conversation = require_conversation(conn, conversation_id)?;
    require_user(conn, user_id)?;

    if is_member_in(conn, conversation_id, user_id)? {
        return Ok(false);
    }

    if !conversation.is_group {
        let others: i64 = conn.query_row(
            "SELECT COUNT(*) FROM group_members WHERE conversation_id = ?1 AND user_id != ?2",
            params![conversation_id, user_id],
            |r| r.get(0),
        )?;
        if others >= PRIVATE_MEMBER_CAP {
            return Err(ChatError::Conflict(format!(
                "private conversation {conversation_id} already has {PRIVATE_MEMBER_CAP} members"
            )));
        }
    }

    conn.execute(
        "INSERT INTO group_members (conversation_id, user_id, joined_at) VALUES (?1, ?2, ?3)
         ON CONFLICT (conversation_id, user_id) DO NOTHING",
        params![conversation_id, user_id, now()],
    )?;
    debug!("Added {} to conversation {}", user_id, conversation_id);
    Ok(true)
}

pub(crate) fn is_member_in(conn: &Connection, conversation_id: &str, user_id: &str) -> Result<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM group_members WHERE conversation_id = ?1 AND user_id = ?2)",
        params![conversation_id, user_id],
        |r| r.get(0),
    )?;
    Ok(found)
}

pub(crate) fn require_member(conn: &Connection, conversation_id: &str, user_id: &str) -> Result<()> {
    if is_member_in(conn, conversation_id, user_id)? {
        Ok(())
    } else {
        Err(ChatError::Forbidden(format!(
            "user {user_id} is not a member of {conversation_id}"
        )))
    }
}

pub(crate) fn query_members(conn: &Connection, conversation_id: &str) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS}
         FROM group_members gm
         JOIN users u ON u.id = gm.user_id
         WHERE gm.conversation_id = ?1
         ORDER BY gm.joined_at, gm.rowid"
    ))?;
    let rows = stmt
        .query_map([conversation_id], user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
