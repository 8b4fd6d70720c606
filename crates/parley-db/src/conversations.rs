use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use crate::members::{add_member_in, query_members, require_member};
use crate::models::{
    CONVERSATION_COLUMNS, ConversationRow, ConversationSummaryRow, GroupRow, UserRow,
    conversation_from_row,
};
use crate::users::{query_user_by_id, require_user};
use crate::{ChatError, Database, Result, new_id, now};

impl Database {
    /// Find or create the single private conversation between two users.
    ///
    /// Runs in one IMMEDIATE transaction, and creation is additionally guarded
    /// by the UNIQUE `pair_key`, so concurrent callers (in this process or
    /// another) always converge on one conversation.
    pub fn resolve_private(&self, user_a: &str, user_b: &str) -> Result<String> {
        self.with_tx(|conn| resolve_private_in(conn, user_a, user_b))
    }

    pub fn find_private(&self, user_a: &str, user_b: &str) -> Result<Option<String>> {
        self.with_conn(|conn| find_private_in(conn, user_a, user_b))
    }

    pub fn create_group(&self, creator_id: &str, name: &str, photo_url: Option<&str>) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidArgument("group name is empty".into()));
        }
        let photo_url = photo_url.map(str::trim).filter(|p| !p.is_empty());

        self.with_tx(|conn| {
            if query_user_by_id(conn, creator_id)?.is_none() {
                return Err(ChatError::InvalidArgument(format!(
                    "unknown creator {creator_id}"
                )));
            }

            let id = new_id();
            conn.execute(
                "INSERT INTO conversations (id, name, is_group, photo_url, pair_key, created_at)
                 VALUES (?1, ?2, 1, ?3, NULL, ?4)",
                params![id, name, photo_url, now()],
            )?;
            add_member_in(conn, &id, creator_id)?;

            info!("User {} created group {} ({})", creator_id, name, id);
            Ok(id)
        })
    }

    pub fn set_group_name(&self, group_id: &str, requester_id: &str, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidArgument("group name is empty".into()));
        }
        self.with_tx(|conn| {
            require_group_member(conn, group_id, requester_id)?;
            conn.execute(
                "UPDATE conversations SET name = ?1 WHERE id = ?2",
                params![name, group_id],
            )?;
            info!("Group {} renamed to {}", group_id, name);
            Ok(())
        })
    }

    pub fn set_group_photo(&self, group_id: &str, requester_id: &str, photo_url: &str) -> Result<()> {
        let photo_url = photo_url.trim();
        if photo_url.is_empty() {
            return Err(ChatError::InvalidArgument("photo url is empty".into()));
        }
        self.with_tx(|conn| {
            require_group_member(conn, group_id, requester_id)?;
            conn.execute(
                "UPDATE conversations SET photo_url = ?1 WHERE id = ?2",
                params![photo_url, group_id],
            )?;
            Ok(())
        })
    }

    /// A current member brings someone into the group.
    pub fn add_group_member(&self, group_id: &str, requester_id: &str, user_id: &str) -> Result<()> {
        self.with_tx(|conn| {
            require_group_member(conn, group_id, requester_id)?;
            if add_member_in(conn, group_id, user_id)? {
                info!("User {} added {} to group {}", requester_id, user_id, group_id);
            }
            Ok(())
        })
    }

    /// Members of a group, visible to its members only.
    pub fn list_group_members(&self, group_id: &str, viewer_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            require_group_member(conn, group_id, viewer_id)?;
            query_members(conn, group_id)
        })
    }

    pub fn get_conversation_row(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| query_conversation(conn, id))
    }

    /// Every conversation the user belongs to, most recent activity first.
    pub fn list_conversations_for_user(&self, user_id: &str) -> Result<Vec<ConversationSummaryRow>> {
        self.with_conn(|conn| query_summaries(conn, user_id, false))
    }

    pub fn list_groups_for_user(&self, user_id: &str) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            query_summaries(conn, user_id, true)?
                .into_iter()
                .map(|summary| -> Result<GroupRow> {
                    let members = query_members(conn, &summary.conversation.id)?;
                    Ok(GroupRow { summary, members })
                })
                .collect()
        })
    }
}

pub(crate) fn query_conversation(conn: &Connection, id: &str) -> Result<Option<ConversationRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = ?1"),
            [id],
            conversation_from_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn require_conversation(conn: &Connection, id: &str) -> Result<ConversationRow> {
    query_conversation(conn, id)?.ok_or_else(|| ChatError::NotFound(format!("conversation {id}")))
}

fn require_group_member(conn: &Connection, group_id: &str, user_id: &str) -> Result<ConversationRow> {
    let conversation = require_conversation(conn, group_id)?;
    if !conversation.is_group {
        return Err(ChatError::InvalidArgument(format!(
            "conversation {group_id} is not a group"
        )));
    }
    require_member(conn, group_id, user_id)?;
    Ok(conversation)
}

pub(crate) fn resolve_private_in(conn: &Connection, user_a: &str, user_b: &str) -> Result<String> {
    if user_a == user_b {
        return Err(ChatError::InvalidArgument(
            "a private conversation needs two distinct users".into(),
        ));
    }
    require_user(conn, user_a)?;
    require_user(conn, user_b)?;

    if let Some(existing) = find_private_in(conn, user_a, user_b)? {
        return Ok(existing);
    }

    let key = pair_key(user_a, user_b);
    let id = new_id();
    let inserted = conn.execute(
        "INSERT INTO conversations (id, name, is_group, photo_url, pair_key, created_at)
         VALUES (?1, NULL, 0, NULL, ?2, ?3)
         ON CONFLICT (pair_key) DO NOTHING",
        params![id, key, now()],
    )?;

    // Another writer won the insert; reuse its row and make sure both
    // memberships exist.
    let id = if inserted == 0 {
        conn.query_row(
            "SELECT id FROM conversations WHERE pair_key = ?1",
            [&key],
            |r| r.get::<_, String>(0),
        )?
    } else {
        info!("Created private conversation {} for {} and {}", id, user_a, user_b);
        id
    };

    add_member_in(conn, &id, user_a)?;
    add_member_in(conn, &id, user_b)?;
    Ok(id)
}

/// Intersection lookup: start from `user_a`'s memberships (indexed), keep the
/// private ones `user_b` also belongs to, and require exactly two members.
/// Earliest-created wins if a legacy duplicate exists. A user has no private
/// conversation with themselves.
pub(crate) fn find_private_in(conn: &Connection, user_a: &str, user_b: &str) -> Result<Option<String>> {
    if user_a == user_b {
        return Ok(None);
    }
    let id = conn
        .query_row(
            "SELECT c.id
             FROM group_members a
             JOIN group_members b
               ON b.conversation_id = a.conversation_id AND b.user_id = ?2
             JOIN conversations c
               ON c.id = a.conversation_id AND c.is_group = 0
             WHERE a.user_id = ?1
               AND (SELECT COUNT(*) FROM group_members x WHERE x.conversation_id = c.id) = 2
             ORDER BY c.created_at, c.id
             LIMIT 1",
            params![user_a, user_b],
            |r| r.get::<_, String>(0),
        )
        .optional()?;
    Ok(id)
}

/// Order-independent key for a user pair. Length-prefixed so opaque ids
/// containing the separator cannot collide.
pub(crate) fn pair_key(user_a: &str, user_b: &str) -> String {
    let (lo, hi) = if user_a <= user_b { (user_a, user_b) } else { (user_b, user_a) };
    format!("{}:{}|{}", lo.len(), lo, hi)
}

/// Name shown to `viewer_id`: the group name, or the other participant's name.
pub(crate) fn display_name_in(
    conn: &Connection,
    conversation: &ConversationRow,
    viewer_id: &str,
) -> Result<Option<String>> {
    if conversation.is_group {
        return Ok(conversation.name.clone());
    }
    let partner = conn
        .query_row(
            "SELECT u.name
             FROM group_members gm
             JOIN users u ON u.id = gm.user_id
             WHERE gm.conversation_id = ?1 AND gm.user_id != ?2
             ORDER BY gm.joined_at
             LIMIT 1",
            params![conversation.id, viewer_id],
            |r| r.get::<_, String>(0),
        )
        .optional()?;
    Ok(partner)
}

fn query_summaries(conn: &Connection, user_id: &str, groups_only: bool) -> Result<Vec<ConversationSummaryRow>> {
    let group_filter = if groups_only { "AND c.is_group = 1" } else { "" };
    let sql = format!(
        "SELECT {CONVERSATION_COLUMNS},
                CASE WHEN c.is_group = 1 THEN c.name ELSE (
                    SELECT u.name
                    FROM group_members p
                    JOIN users u ON u.id = p.user_id
                    WHERE p.conversation_id = c.id AND p.user_id != ?1
                    LIMIT 1
                ) END,
                lm.content,
                lm.sent_at
         FROM group_members gm
         JOIN conversations c ON c.id = gm.conversation_id
         LEFT JOIN messages lm ON lm.id = (
             SELECT m.id FROM messages m
             WHERE m.conversation_id = c.id
             ORDER BY m.sent_at DESC, m.id DESC
             LIMIT 1
         )
         WHERE gm.user_id = ?1 {group_filter}
         ORDER BY COALESCE(lm.sent_at, c.created_at) DESC, c.id"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], summary_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationSummaryRow> {
    Ok(ConversationSummaryRow {
        conversation: conversation_from_row(row)?,
        display_name: row.get(5)?,
        last_message_content: row.get(6)?,
        last_message_sent_at: row.get(7)?,
    })
}
