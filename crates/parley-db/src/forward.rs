use tracing::info;

use crate::content::annotate_forwarded;
use crate::members::require_member;
use crate::messages::{append_in, query_message};
use crate::{ChatError, Database, Result};

impl Database {
    /// Copy a message into another conversation under the forwarder's name.
    ///
    /// The forwarder must be able to see the original and must belong to the
    /// target. The copy carries a provenance marker naming the original
    /// sender and never links back to the original row.
    pub fn forward_message(
        &self,
        original_id: &str,
        target_conversation_id: &str,
        forwarder_id: &str,
    ) -> Result<String> {
        self.with_tx(|conn| {
            let original = query_message(conn, original_id)?
                .ok_or_else(|| ChatError::NotFound(format!("message {original_id}")))?;
            require_member(conn, &original.conversation_id, forwarder_id)?;

            let content = annotate_forwarded(&original.content, &original.sender_name);
            let id = append_in(
                conn,
                target_conversation_id,
                forwarder_id,
                &content,
                None,
                Some(&original.sender_id),
            )?;

            info!(
                "Message {} forwarded to {} as {} by {}",
                original_id, target_conversation_id, id, forwarder_id
            );
            Ok(id)
        })
    }
}

#[cfg(test)]
mod tests {
    use parley_types::models::MessageStatus;

    use crate::ChatError;
    use crate::test_support::{db, send_private, user};

    #[test]
    fn forward_copies_with_marker() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");

        let original = send_private(&db, &alice, &bob, "hello");
        db.mark_read(&original.message_id, &bob).unwrap();
        let target = db.resolve_private(&bob, &carol).unwrap();

        let copy = db.forward_message(&original.message_id, &target, &bob).unwrap();
        assert_ne!(copy, original.message_id);

        let row = db.get_message(&copy).unwrap().unwrap();
        assert_eq!(row.conversation_id, target);
        assert_eq!(row.sender_id, bob);
        assert_eq!(row.content, "Forwarded from alice: hello");
        assert_eq!(row.forwarded_from.as_deref(), Some(alice.as_str()));
        assert_eq!(row.status, MessageStatus::Sent);
        assert!(row.reply_to.is_none());

        let untouched = db.get_message(&original.message_id).unwrap().unwrap();
        assert_eq!(untouched.content, "hello");
        assert_eq!(untouched.status, MessageStatus::Read);
    }

    #[test]
    fn forwarded_image_keeps_payload_intact() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");
        let image = "data:image/png;base64,iVBORw0KGgo=";

        let original = send_private(&db, &alice, &bob, image);
        let target = db.resolve_private(&bob, &carol).unwrap();
        let copy = db.forward_message(&original.message_id, &target, &bob).unwrap();

        let row = db.get_message(&copy).unwrap().unwrap();
        assert_eq!(row.content, format!("Forwarded from alice:\n{image}"));
    }

    #[test]
    fn forwarder_must_see_original_and_join_target() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");
        let dave = user(&db, "dave");

        let original = send_private(&db, &alice, &bob, "private");
        let carol_dave = db.resolve_private(&carol, &dave).unwrap();
        let bob_carol = db.resolve_private(&bob, &carol).unwrap();

        assert!(matches!(
            db.forward_message(&original.message_id, &carol_dave, &carol),
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            db.forward_message(&original.message_id, &carol_dave, &bob),
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            db.forward_message("missing", &bob_carol, &bob),
            Err(ChatError::NotFound(_))
        ));
        assert!(matches!(
            db.forward_message(&original.message_id, "missing", &bob),
            Err(ChatError::NotFound(_))
        ));
    }
}
