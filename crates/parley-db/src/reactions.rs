use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::members::require_member;
use crate::models::ReactionRow;
use crate::{ChatError, Database, Result, now};

const REACTION_COLUMNS: &str =
    "r.message_id, r.user_id, COALESCE(u.name, 'unknown'), r.reaction, r.reacted_at";

impl Database {
    /// Set the caller's reaction on a message, replacing any previous one.
    pub fn react(&self, message_id: &str, user_id: &str, reaction: &str) -> Result<()> {
        let reaction = reaction.trim();
        if reaction.is_empty() {
            return Err(ChatError::InvalidArgument("reaction is empty".into()));
        }

        self.with_tx(|conn| {
            let conversation_id = require_message_conversation(conn, message_id)?;
            require_member(conn, &conversation_id, user_id)?;

            conn.execute(
                "INSERT INTO message_reactions (message_id, user_id, reaction, reacted_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(message_id, user_id)
                 DO UPDATE SET reaction = excluded.reaction, reacted_at = excluded.reacted_at",
                params![message_id, user_id, reaction, now()],
            )?;
            debug!("User {} reacted {} to {}", user_id, reaction, message_id);
            Ok(())
        })
    }

    pub fn unreact(&self, message_id: &str, user_id: &str) -> Result<()> {
        self.with_tx(|conn| {
            let removed = conn.execute(
                "DELETE FROM message_reactions WHERE message_id = ?1 AND user_id = ?2",
                params![message_id, user_id],
            )?;
            if removed == 0 {
                return Err(ChatError::NotFound(format!(
                    "no reaction from {user_id} on {message_id}"
                )));
            }
            debug!("User {} removed reaction from {}", user_id, message_id);
            Ok(())
        })
    }

    /// Empty for unknown or deleted messages.
    pub fn list_reactions(&self, message_id: &str) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| query_reactions(conn, message_id))
    }

    /// Like [`Database::list_reactions`], but only members of the message's
    /// conversation may look.
    pub fn list_reactions_for(&self, message_id: &str, viewer_id: &str) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| {
            let conversation_id = conn
                .query_row(
                    "SELECT conversation_id FROM messages WHERE id = ?1",
                    [message_id],
                    |r| r.get::<_, String>(0),
                )
                .optional()?;
            match conversation_id {
                Some(conversation_id) => {
                    require_member(conn, &conversation_id, viewer_id)?;
                    query_reactions(conn, message_id)
                }
                None => Ok(Vec::new()),
            }
        })
    }
}

fn query_reactions(conn: &Connection, message_id: &str) -> Result<Vec<ReactionRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REACTION_COLUMNS}
         FROM message_reactions r
         LEFT JOIN users u ON u.id = r.user_id
         WHERE r.message_id = ?1
         ORDER BY r.reacted_at, r.user_id"
    ))?;
    let rows = stmt
        .query_map([message_id], reaction_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every reaction on every message of one conversation, in reaction order.
pub(crate) fn query_reactions_for_conversation(
    conn: &Connection,
    conversation_id: &str,
) -> Result<Vec<ReactionRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REACTION_COLUMNS}
         FROM message_reactions r
         JOIN messages m ON m.id = r.message_id
         LEFT JOIN users u ON u.id = r.user_id
         WHERE m.conversation_id = ?1
         ORDER BY r.reacted_at, r.user_id"
    ))?;
    let rows = stmt
        .query_map([conversation_id], reaction_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn require_message_conversation(conn: &Connection, message_id: &str) -> Result<String> {
    conn.query_row(
        "SELECT conversation_id FROM messages WHERE id = ?1",
        [message_id],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| ChatError::NotFound(format!("message {message_id}")))
}

fn reaction_from_row(row: &Row<'_>) -> rusqlite::Result<ReactionRow> {
    Ok(ReactionRow {
        message_id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        reaction: row.get(3)?,
        reacted_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::ChatError;
    use crate::test_support::{db, send_private, user};

    #[test]
    fn reacting_twice_replaces() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let sent = send_private(&db, &alice, &bob, "hi");

        db.react(&sent.message_id, &bob, "👍").unwrap();
        db.react(&sent.message_id, &bob, "❤️").unwrap();
        db.react(&sent.message_id, &alice, "😂").unwrap();

        let reactions = db.list_reactions(&sent.message_id).unwrap();
        assert_eq!(reactions.len(), 2);
        let from_bob = reactions.iter().find(|r| r.user_id == bob).unwrap();
        assert_eq!(from_bob.reaction, "❤️");
        assert_eq!(from_bob.user_name, "bob");
    }

    #[test]
    fn unreact_removes_only_own_reaction() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let sent = send_private(&db, &alice, &bob, "hi");

        db.react(&sent.message_id, &alice, "👍").unwrap();
        db.react(&sent.message_id, &bob, "👍").unwrap();
        db.unreact(&sent.message_id, &bob).unwrap();

        let reactions = db.list_reactions(&sent.message_id).unwrap();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].user_id, alice);
        assert!(matches!(
            db.unreact(&sent.message_id, &bob),
            Err(ChatError::NotFound(_))
        ));
    }

    #[test]
    fn reactions_require_membership_and_value() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let eve = user(&db, "eve");
        let sent = send_private(&db, &alice, &bob, "hi");

        assert!(matches!(
            db.react(&sent.message_id, &eve, "👀"),
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            db.react(&sent.message_id, &bob, "  "),
            Err(ChatError::InvalidArgument(_))
        ));
        assert!(matches!(db.react("missing", &bob, "👍"), Err(ChatError::NotFound(_))));
    }

    #[test]
    fn reaction_list_is_for_members_only() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let eve = user(&db, "eve");
        let sent = send_private(&db, &alice, &bob, "hi");
        db.react(&sent.message_id, &bob, "👍").unwrap();

        assert!(matches!(
            db.list_reactions_for(&sent.message_id, &eve),
            Err(ChatError::Forbidden(_))
        ));
        assert_eq!(db.list_reactions_for(&sent.message_id, &alice).unwrap().len(), 1);
        assert!(db.list_reactions_for("missing", &eve).unwrap().is_empty());
    }

    #[test]
    fn deleted_message_takes_reactions_along() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let sent = send_private(&db, &alice, &bob, "hi");
        db.react(&sent.message_id, &bob, "👍").unwrap();

        db.delete_message(&sent.message_id, &alice).unwrap();
        assert!(db.list_reactions(&sent.message_id).unwrap().is_empty());
    }

    #[test]
    fn conversation_view_groups_reactions_by_message() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let first = send_private(&db, &alice, &bob, "one");
        let second = send_private(&db, &bob, &alice, "two");
        db.react(&second.message_id, &alice, "🎉").unwrap();

        let detail = db.get_conversation(&first.conversation_id, &alice).unwrap();
        assert!(detail.messages[0].reactions.is_empty());
        assert_eq!(detail.messages[1].reactions.len(), 1);
        assert_eq!(detail.messages[1].reactions[0].reaction, "🎉");
    }
}
