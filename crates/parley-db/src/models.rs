//! Database row types. These map directly to SQLite rows and stay
//! independent of the parley-types API models.

use parley_types::models::MessageStatus;
use rusqlite::Row;
use rusqlite::types::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub photo_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: String,
    /// Stored name. Always `None` for private conversations.
    pub name: Option<String>,
    pub is_group: bool,
    pub photo_url: Option<String>,
    pub created_at: String,
}

/// A conversation as seen by one member: private chats are named after the
/// other participant.
#[derive(Debug, Clone)]
pub struct ConversationSummaryRow {
    pub conversation: ConversationRow,
    pub display_name: Option<String>,
    pub last_message_content: Option<String>,
    pub last_message_sent_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GroupRow {
    pub summary: ConversationSummaryRow,
    pub members: Vec<UserRow>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub reply_to: Option<String>,
    pub forwarded_from: Option<String>,
    pub sent_at: String,
    pub status: MessageStatus,
    pub delivered_at: Option<String>,
    pub read_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionRow {
    pub message_id: String,
    pub user_id: String,
    pub user_name: String,
    pub reaction: String,
    pub reacted_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageWithReactions {
    pub message: MessageRow,
    pub reactions: Vec<ReactionRow>,
}

#[derive(Debug, Clone)]
pub struct ConversationDetail {
    pub conversation: ConversationRow,
    pub display_name: Option<String>,
    pub members: Vec<UserRow>,
    pub messages: Vec<MessageWithReactions>,
}

/// Input of the composite "send message" action.
#[derive(Debug, Default, Clone, Copy)]
pub struct SendRequest<'a> {
    pub sender_id: &'a str,
    /// Private chats without a known conversation: the other participant.
    pub receiver_id: Option<&'a str>,
    pub content: &'a str,
    pub is_group: bool,
    pub group_id: Option<&'a str>,
    pub conversation_id: Option<&'a str>,
    pub reply_to: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub message_id: String,
    pub conversation_id: String,
}

pub(crate) const USER_COLUMNS: &str = "u.id, u.name, u.photo_url, u.created_at";

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        photo_url: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) const CONVERSATION_COLUMNS: &str = "c.id, c.name, c.is_group, c.photo_url, c.created_at";

pub(crate) fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        name: row.get(1)?,
        is_group: row.get(2)?,
        photo_url: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) const MESSAGE_COLUMNS: &str = "m.id, m.conversation_id, m.sender_id, u.name, m.content, \
     m.reply_to, m.forwarded_from, m.sent_at, m.status, m.delivered_at, m.read_at";

/// Expects `messages m LEFT JOIN users u ON u.id = m.sender_id`.
pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        content: row.get(4)?,
        reply_to: row.get(5)?,
        forwarded_from: row.get(6)?,
        sent_at: row.get(7)?,
        status: status_column(row, 8)?,
        delivered_at: row.get(9)?,
        read_at: row.get(10)?,
    })
}

pub(crate) fn status_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<MessageStatus> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
