//! Store rows to wire DTOs.

use chrono::{DateTime, Utc};
use tracing::warn;

use parley_db::models::{
    ConversationDetail, ConversationRow, ConversationSummaryRow, GroupRow, MessageWithReactions,
    ReactionRow, UserRow,
};
use parley_db::parse_timestamp;
use parley_types::api::{ConversationResponse, ConversationSummary, GroupSummary};
use parley_types::models::{Conversation, Message, Reaction, User};

fn timestamp(raw: &str, owner: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt timestamp '{}' on {}", raw, owner);
        DateTime::default()
    })
}

fn optional_timestamp(raw: Option<&str>, owner: &str) -> Option<DateTime<Utc>> {
    raw.map(|raw| timestamp(raw, owner))
}

pub fn user(row: UserRow) -> User {
    User {
        id: row.id,
        username: row.name,
        photo_url: row.photo_url,
    }
}

pub fn users(rows: Vec<UserRow>) -> Vec<User> {
    rows.into_iter().map(user).collect()
}

pub fn reaction(row: ReactionRow) -> Reaction {
    Reaction {
        user_id: row.user_id,
        username: row.user_name,
        reaction: row.reaction,
    }
}

pub fn conversation(row: ConversationRow, display_name: Option<String>) -> Conversation {
    let created_at = timestamp(&row.created_at, &row.id);
    Conversation {
        id: row.id,
        name: display_name,
        is_group: row.is_group,
        photo_url: row.photo_url,
        created_at,
    }
}

pub fn message(row: MessageWithReactions) -> Message {
    let MessageWithReactions { message, reactions } = row;
    Message {
        sent_at: timestamp(&message.sent_at, &message.id),
        delivered_at: optional_timestamp(message.delivered_at.as_deref(), &message.id),
        read_at: optional_timestamp(message.read_at.as_deref(), &message.id),
        id: message.id,
        conversation_id: message.conversation_id,
        sender_id: message.sender_id,
        sender_username: message.sender_name,
        content: message.content,
        reply_to: message.reply_to,
        forwarded_from: message.forwarded_from,
        status: message.status,
        reactions: reactions.into_iter().map(reaction).collect(),
    }
}

pub fn conversation_response(detail: ConversationDetail) -> ConversationResponse {
    ConversationResponse {
        conversation: conversation(detail.conversation, detail.display_name),
        members: users(detail.members),
        messages: detail.messages.into_iter().map(message).collect(),
    }
}

pub fn summary(row: ConversationSummaryRow) -> ConversationSummary {
    let id = row.conversation.id;
    ConversationSummary {
        created_at: timestamp(&row.conversation.created_at, &id),
        last_message_sent_at: optional_timestamp(row.last_message_sent_at.as_deref(), &id),
        id,
        name: row.display_name,
        is_group: row.conversation.is_group,
        photo_url: row.conversation.photo_url,
        last_message_content: row.last_message_content,
    }
}

pub fn group(row: GroupRow) -> GroupSummary {
    GroupSummary {
        summary: summary(row.summary),
        members: users(row.members),
    }
}

#[cfg(test)]
mod tests {
    use parley_types::models::MessageStatus;

    use super::*;
    use parley_db::models::MessageRow;

    fn message_row(sent_at: &str) -> MessageRow {
        MessageRow {
            id: "m1".into(),
            conversation_id: "c1".into(),
            sender_id: "u1".into(),
            sender_name: "alice".into(),
            content: "hi".into(),
            reply_to: None,
            forwarded_from: None,
            sent_at: sent_at.into(),
            status: MessageStatus::Delivered,
            delivered_at: Some("2024-05-01T12:00:01.000000Z".into()),
            read_at: None,
        }
    }

    #[test]
    fn message_keeps_status_and_timestamps() {
        let dto = message(MessageWithReactions {
            message: message_row("2024-05-01T12:00:00.000000Z"),
            reactions: vec![ReactionRow {
                message_id: "m1".into(),
                user_id: "u2".into(),
                user_name: "bob".into(),
                reaction: "👍".into(),
                reacted_at: "2024-05-01T12:00:02.000000Z".into(),
            }],
        });

        assert_eq!(dto.status, MessageStatus::Delivered);
        assert_eq!(dto.sender_username, "alice");
        assert!(dto.delivered_at.unwrap() > dto.sent_at);
        assert!(dto.read_at.is_none());
        assert_eq!(dto.reactions[0].username, "bob");
    }

    #[test]
    fn corrupt_timestamp_falls_back_to_epoch() {
        let dto = message(MessageWithReactions {
            message: message_row("not a time"),
            reactions: Vec::new(),
        });
        assert_eq!(dto.sent_at, DateTime::<Utc>::default());
    }
}
