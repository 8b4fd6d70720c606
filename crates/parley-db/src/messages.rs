use std::collections::HashMap;

use chrono::{Duration, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, warn};

use crate::conversations::{display_name_in, require_conversation, resolve_private_in};
use crate::members::{query_members, require_member};
use crate::models::{
    ConversationDetail, MESSAGE_COLUMNS, MessageRow, MessageWithReactions, ReactionRow, SendOutcome,
    SendRequest, message_from_row,
};
use crate::reactions::query_reactions_for_conversation;
use crate::{ChatError, Database, Result, format_timestamp, new_id, parse_timestamp};

impl Database {
    /// Append a message to a conversation the sender belongs to.
    pub fn append_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<String> {
        self.with_tx(|conn| append_in(conn, conversation_id, sender_id, content, reply_to, None))
    }

    /// The "send message" action: pick or create the target conversation,
    /// then append. Both steps share one transaction, so a rejected message
    /// never leaves a freshly created conversation behind.
    pub fn send_or_create(&self, req: SendRequest<'_>) -> Result<SendOutcome> {
        if req.content.trim().is_empty() {
            return Err(ChatError::InvalidArgument("message content is empty".into()));
        }
        let receiver_id = non_empty(req.receiver_id);
        let group_id = non_empty(req.group_id);
        let conversation_id = non_empty(req.conversation_id);
        let reply_to = non_empty(req.reply_to);

        self.with_tx(|conn| {
            let conversation_id = if req.is_group {
                let group_id = group_id.ok_or_else(|| {
                    ChatError::InvalidArgument("group message without a group id".into())
                })?;
                let group = require_conversation(conn, group_id)?;
                if !group.is_group {
                    return Err(ChatError::InvalidArgument(format!(
                        "conversation {group_id} is not a group"
                    )));
                }
                group.id
            } else if let Some(conversation_id) = conversation_id {
                let conversation = require_conversation(conn, conversation_id)?;
                if conversation.is_group {
                    return Err(ChatError::InvalidArgument(format!(
                        "conversation {conversation_id} is a group"
                    )));
                }
                conversation.id
            } else if let Some(receiver_id) = receiver_id {
                resolve_private_in(conn, req.sender_id, receiver_id)?
            } else {
                return Err(ChatError::InvalidArgument(
                    "message needs a receiver, a conversation or a group".into(),
                ));
            };

            let message_id = append_in(conn, &conversation_id, req.sender_id, req.content, reply_to, None)?;
            Ok(SendOutcome {
                message_id,
                conversation_id,
            })
        })
    }

    /// Only the sender may delete. Reactions and read receipts cascade.
    pub fn delete_message(&self, message_id: &str, requester_id: &str) -> Result<()> {
        self.with_tx(|conn| {
            let message = query_message(conn, message_id)?
                .ok_or_else(|| ChatError::NotFound(format!("message {message_id}")))?;
            if message.sender_id != requester_id {
                warn!("User {} tried to delete message {} of {}", requester_id, message_id, message.sender_id);
                return Err(ChatError::Forbidden(format!(
                    "only the sender may delete message {message_id}"
                )));
            }

            let deleted = conn.execute(
                "DELETE FROM messages WHERE id = ?1 AND sender_id = ?2",
                params![message_id, requester_id],
            )?;
            if deleted == 0 {
                return Err(ChatError::NotFound(format!("message {message_id}")));
            }

            info!("Message {} deleted by its sender", message_id);
            Ok(())
        })
    }

    pub fn get_message(&self, message_id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, message_id))
    }

    /// Conversation header, members and every message in visibility order,
    /// each with its reactions. The viewer must be a member.
    pub fn get_conversation(&self, conversation_id: &str, viewer_id: &str) -> Result<ConversationDetail> {
        self.with_conn(|conn| {
            let conversation = require_conversation(conn, conversation_id)?;
            require_member(conn, conversation_id, viewer_id)?;

            let display_name = display_name_in(conn, &conversation, viewer_id)?;
            let members = query_members(conn, conversation_id)?;
            let rows = query_messages(conn, conversation_id)?;

            let mut reactions: HashMap<String, Vec<ReactionRow>> = HashMap::new();
            for reaction in query_reactions_for_conversation(conn, conversation_id)? {
                reactions
                    .entry(reaction.message_id.clone())
                    .or_default()
                    .push(reaction);
            }

            let messages = rows
                .into_iter()
                .map(|message| MessageWithReactions {
                    reactions: reactions.remove(&message.id).unwrap_or_default(),
                    message,
                })
                .collect();

            Ok(ConversationDetail {
                conversation,
                display_name,
                members,
                messages,
            })
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Ledger append. Re-validates membership and reply linkage regardless of
/// what the caller already checked.
pub(crate) fn append_in(
    conn: &Connection,
    conversation_id: &str,
    sender_id: &str,
    content: &str,
    reply_to: Option<&str>,
    forwarded_from: Option<&str>,
) -> Result<String> {
    if content.trim().is_empty() {
        return Err(ChatError::InvalidArgument("message content is empty".into()));
    }
    require_conversation(conn, conversation_id)?;
    require_member(conn, conversation_id, sender_id)?;

    if let Some(reply_to) = reply_to {
        let target: Option<String> = conn
            .query_row(
                "SELECT conversation_id FROM messages WHERE id = ?1",
                [reply_to],
                |r| r.get(0),
            )
            .optional()?;
        if target.as_deref() != Some(conversation_id) {
            return Err(ChatError::InvalidArgument(format!(
                "reply target {reply_to} is not in conversation {conversation_id}"
            )));
        }
    }

    let id = new_id();
    let sent_at = next_sent_at(conn, conversation_id)?;
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, content, reply_to, forwarded_from, sent_at, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'sent')",
        params![id, conversation_id, sender_id, content, reply_to, forwarded_from, sent_at],
    )?;

    debug!("Message {} appended to {} by {}", id, conversation_id, sender_id);
    Ok(id)
}

/// Wall-clock time at microsecond precision, bumped past the newest message
/// of the conversation so sent-at is strictly increasing per conversation.
fn next_sent_at(conn: &Connection, conversation_id: &str) -> Result<String> {
    let last: Option<String> = conn.query_row(
        "SELECT MAX(sent_at) FROM messages WHERE conversation_id = ?1",
        [conversation_id],
        |r| r.get(0),
    )?;

    let mut at = Utc::now().trunc_subsecs(6);
    if let Some(prev) = last.as_deref().and_then(parse_timestamp) {
        if at <= prev {
            at = prev + Duration::microseconds(1);
        }
    }
    Ok(format_timestamp(at))
}

pub(crate) fn query_message(conn: &Connection, message_id: &str) -> Result<Option<MessageRow>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m
                 LEFT JOIN users u ON u.id = m.sender_id
                 WHERE m.id = ?1"
            ),
            [message_id],
            message_from_row,
        )
        .optional()?;
    Ok(row)
}

fn query_messages(conn: &Connection, conversation_id: &str) -> Result<Vec<MessageRow>> {
    // JOIN users to fetch the sender name in a single query
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS}
         FROM messages m
         LEFT JOIN users u ON u.id = m.sender_id
         WHERE m.conversation_id = ?1
         ORDER BY m.sent_at, m.id"
    ))?;
    let rows = stmt
        .query_map([conversation_id], message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
