//! Inbound event dispatch: payload validation, authorization checks
//! against durable state, durable mutation, and fan-out to resolved
//! connections.
//!
//! Handlers never let an error escape: every failure is translated into
//! an `error` event on the acting connection, tagged with the name of the
//! failing operation. A write can succeed while the follow-up fan-out
//! finds no live recipient; that is a no-op, not an error.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use murmur_common::id::{prefix, prefixed_ulid};

use crate::db::store::{ChatStore, StoreError};
use crate::models::group::Group;
use crate::models::message::{Message, MessageStatus, Reaction, MAX_CONTENT_LEN};
use crate::models::notification::{Notification, NotificationKind};
use crate::models::user::User;

use super::events::{
    ClientFrame, DeleteMessagePayload, EditMessagePayload, EventName, GroupRoomPayload,
    MessageReadPayload, OutboundEvent, ReactionPayload, SendGroupMessagePayload,
    SendMessagePayload, TypingPayload, UserStatusPayload,
};
use super::retry::retry_operation;
use super::session::GatewaySession;
use super::Gateway;

/// An error surfaced to the acting connection as an `error` event.
#[derive(Debug)]
pub struct EventError {
    pub message: String,
    pub can_retry: bool,
}

impl EventError {
    /// Malformed or missing input.
    fn validation(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            can_retry: false,
        }
    }

    /// Acting user lacks permission, or the target does not exist.
    fn denied(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            can_retry: false,
        }
    }
}

impl From<StoreError> for EventError {
    fn from(err: StoreError) -> Self {
        tracing::warn!(%err, "store operation failed");
        Self {
            message: "An error occurred. Please try again.".to_string(),
            can_retry: true,
        }
    }
}

fn parse<P: DeserializeOwned>(data: Value) -> Result<P, EventError> {
    serde_json::from_value(data).map_err(|_| EventError::validation("Invalid payload"))
}

/// Route one inbound frame to its handler. Unknown events are ignored.
pub async fn dispatch(gateway: &Gateway, session: &GatewaySession, frame: ClientFrame) {
    let context = frame.event.clone();
    let result: Result<(), EventError> = async {
        match frame.event.as_str() {
            "send-message" => send_direct_message(gateway, session, parse(frame.data)?).await,
            "send-group-message" => send_group_message(gateway, session, parse(frame.data)?).await,
            "message-read" => mark_message_read(gateway, session, parse(frame.data)?).await,
            "typing" => typing_start(gateway, session, parse(frame.data)?).await,
            "stop-typing" => typing_stop(gateway, session, parse(frame.data)?).await,
            "get-user-status" => get_user_status(gateway, session, parse(frame.data)?).await,
            "join-group-room" => join_group_room(gateway, session, parse(frame.data)?).await,
            "leave-group-room" => leave_group_room(gateway, session, parse(frame.data)?).await,
            "add-reaction" => add_reaction(gateway, session, parse(frame.data)?).await,
            "remove-reaction" => remove_reaction(gateway, session, parse(frame.data)?).await,
            "edit-message" => edit_message(gateway, session, parse(frame.data)?).await,
            "delete-message" => delete_message(gateway, session, parse(frame.data)?).await,
            other => {
                tracing::debug!(event = %other, "ignoring unknown gateway event");
                Ok(())
            }
        }
    }
    .await;

    if let Err(err) = result {
        session.emit(OutboundEvent::error(err.message, &context, err.can_retry));
    }
}

// ---------------------------------------------------------------------------
// Direct messages
// ---------------------------------------------------------------------------

async fn send_direct_message(
    gateway: &Gateway,
    session: &GatewaySession,
    payload: SendMessagePayload,
) -> Result<(), EventError> {
    let recipient_id = payload
        .recipient_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| EventError::validation("Recipient is required"))?;

    let content = payload.content.unwrap_or_default();
    if content.is_empty() && payload.media_url.is_none() {
        return Err(EventError::validation("Content or media is required"));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(EventError::validation("Message too long"));
    }

    let recipient = gateway
        .store
        .find_user(&recipient_id)
        .await?
        .ok_or_else(|| EventError::denied("Recipient not found"))?;

    // Blocking is checked in both directions.
    if recipient.has_blocked(&session.user_id) {
        return Err(EventError::denied("Cannot send message to this user"));
    }
    let sender = gateway
        .store
        .find_user(&session.user_id)
        .await?
        .ok_or_else(|| EventError::denied("Sender not found"))?;
    if sender.has_blocked(&recipient_id) {
        return Err(EventError::denied("Cannot send message to this user"));
    }

    let message = Message {
        id: prefixed_ulid(prefix::MESSAGE),
        sender_id: session.user_id.clone(),
        recipient_id: Some(recipient_id.clone()),
        group_id: None,
        kind: payload.kind,
        content,
        media_url: payload.media_url,
        reply_to: None,
        reactions: Vec::new(),
        status: MessageStatus::Sent,
        edited: false,
        edited_at: None,
        deleted: false,
        deleted_at: None,
        created_at: Utc::now(),
    };

    let message = retry_operation(gateway.retry, || {
        gateway.store.create_message(message.clone())
    })
    .await?;

    let mut conversation = retry_operation(gateway.retry, || {
        gateway
            .store
            .find_or_create_conversation(&session.user_id, &recipient_id)
    })
    .await?;
    conversation.last_message_id = Some(message.id.clone());
    conversation.increment_unread(&recipient_id);
    retry_operation(gateway.retry, || {
        gateway.store.update_conversation(&conversation)
    })
    .await?;

    let view = direct_message_view(&message, &sender, &recipient);
    session.emit(OutboundEvent::new(EventName::MESSAGE_SENT, view.clone()));

    let notification = gateway
        .store
        .create_notification(Notification::new(
            &recipient_id,
            &session.user_id,
            NotificationKind::Message,
            &message.id,
            Some(&message.content),
        ))
        .await?;

    if let Some(connection) = gateway.registry.resolve(&recipient_id) {
        connection.emit(OutboundEvent::new(EventName::NEW_MESSAGE, view.clone()));
        connection.emit(OutboundEvent::new(
            EventName::NOTIFICATION,
            json!({
                "type": "message",
                "message": view,
                "notification_id": notification.id,
            }),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Group messages
// ---------------------------------------------------------------------------

async fn send_group_message(
    gateway: &Gateway,
    session: &GatewaySession,
    payload: SendGroupMessagePayload,
) -> Result<(), EventError> {
    let group_id = payload
        .group_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| EventError::validation("Group ID is required"))?;

    let content = payload.content.unwrap_or_default();
    if content.is_empty() && payload.media_url.is_none() {
        return Err(EventError::validation("Content or media is required"));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(EventError::validation("Message too long"));
    }

    let mut group = gateway
        .store
        .find_group(&group_id)
        .await?
        .filter(|g| g.is_active)
        .ok_or_else(|| EventError::denied("Group not found"))?;

    if !group.is_member(&session.user_id) {
        return Err(EventError::denied("Not a member of this group"));
    }
    if !group.can_post(&session.user_id) {
        return Err(EventError::denied("Not authorized to post in this group"));
    }

    let message = Message {
        id: prefixed_ulid(prefix::MESSAGE),
        sender_id: session.user_id.clone(),
        recipient_id: None,
        group_id: Some(group_id.clone()),
        kind: payload.kind,
        content,
        media_url: payload.media_url,
        reply_to: payload.reply_to,
        reactions: Vec::new(),
        status: MessageStatus::Sent,
        edited: false,
        edited_at: None,
        deleted: false,
        deleted_at: None,
        created_at: Utc::now(),
    };

    let message = retry_operation(gateway.retry, || {
        gateway.store.create_message(message.clone())
    })
    .await?;

    group.last_message_id = Some(message.id.clone());
    retry_operation(gateway.retry, || gateway.store.update_group(&group)).await?;

    let sender = gateway
        .store
        .find_user(&session.user_id)
        .await?
        .ok_or_else(|| EventError::denied("Sender not found"))?;

    let reply_to = match &message.reply_to {
        Some(reply_id) => gateway.store.find_message(reply_id).await?,
        None => None,
    };
    let view = group_message_view(&message, &sender, &group, reply_to.as_ref());

    session.emit(OutboundEvent::new(EventName::MESSAGE_SENT, view.clone()));

    // Targeted fan-out over the membership list, never a global broadcast.
    for member in &group.members {
        if member.user_id == session.user_id {
            continue;
        }
        gateway.registry.emit_to_user(
            &member.user_id,
            OutboundEvent::new(
                EventName::NEW_GROUP_MESSAGE,
                json!({
                    "group_id": group_id,
                    "message": view,
                }),
            ),
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Read receipts
// ---------------------------------------------------------------------------

async fn mark_message_read(
    gateway: &Gateway,
    session: &GatewaySession,
    payload: MessageReadPayload,
) -> Result<(), EventError> {
    let message_id = payload
        .message_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| EventError::validation("Message ID is required"))?;

    let mut message = gateway
        .store
        .find_message(&message_id)
        .await?
        .ok_or_else(|| EventError::denied("Message not found"))?;

    let recipient_id = message
        .recipient_id
        .clone()
        .ok_or_else(|| EventError::denied("Not authorized"))?;
    if recipient_id != session.user_id {
        return Err(EventError::denied("Not authorized"));
    }

    // Idempotent: marking an already-read message changes nothing.
    if message.status == MessageStatus::Read {
        return Ok(());
    }

    message.status = MessageStatus::Read;
    gateway.store.update_message(&message).await?;

    // The conversation is re-fetched after the await above rather than
    // trusted from before it.
    if let Some(mut conversation) = gateway
        .store
        .find_conversation_between(&message.sender_id, &recipient_id)
        .await?
    {
        conversation.decrement_unread(&session.user_id);
        gateway.store.update_conversation(&conversation).await?;
    }

    let notification = gateway
        .store
        .create_notification(Notification::new(
            &message.sender_id,
            &session.user_id,
            NotificationKind::MessageRead,
            &message.id,
            None,
        ))
        .await?;

    if let Some(connection) = gateway.registry.resolve(&message.sender_id) {
        connection.emit(OutboundEvent::new(
            EventName::MESSAGE_READ_CONFIRMATION,
            json!({
                "message_id": message_id,
                "reader_id": session.user_id,
            }),
        ));
        connection.emit(OutboundEvent::new(
            EventName::NOTIFICATION,
            json!({
                "type": "message_read",
                "message_id": message_id,
                "reader_id": session.user_id,
                "notification_id": notification.id,
            }),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Typing indicators
// ---------------------------------------------------------------------------

async fn typing_start(
    gateway: &Gateway,
    session: &GatewaySession,
    payload: TypingPayload,
) -> Result<(), EventError> {
    let Some(recipient_id) = payload.recipient_id.filter(|id| !id.is_empty()) else {
        return Ok(());
    };

    gateway.registry.emit_to_user(
        &recipient_id,
        OutboundEvent::new(
            EventName::USER_TYPING,
            json!({
                "userId": session.user_id,
                "username": session.username,
            }),
        ),
    );

    // The expiry resolves the peer at fire time so a peer that reconnected
    // on a different connection still gets the stop signal.
    let registry = gateway.registry.clone();
    let sender_id = session.user_id.clone();
    let peer_id = recipient_id.clone();
    gateway
        .typing
        .begin(&session.user_id, &recipient_id, move || {
            registry.emit_to_user(
                &peer_id,
                OutboundEvent::new(EventName::USER_STOP_TYPING, json!({ "userId": sender_id })),
            );
        });

    Ok(())
}

async fn typing_stop(
    gateway: &Gateway,
    session: &GatewaySession,
    payload: TypingPayload,
) -> Result<(), EventError> {
    let Some(recipient_id) = payload.recipient_id.filter(|id| !id.is_empty()) else {
        return Ok(());
    };

    gateway.typing.stop(&session.user_id, &recipient_id);
    gateway.registry.emit_to_user(
        &recipient_id,
        OutboundEvent::new(
            EventName::USER_STOP_TYPING,
            json!({ "userId": session.user_id }),
        ),
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Presence lookup
// ---------------------------------------------------------------------------

async fn get_user_status(
    gateway: &Gateway,
    session: &GatewaySession,
    payload: UserStatusPayload,
) -> Result<(), EventError> {
    let Some(user_id) = payload.user_id.filter(|id| !id.is_empty()) else {
        return Ok(());
    };

    if let Some(user) = gateway.store.find_user(&user_id).await? {
        session.emit(OutboundEvent::new(
            EventName::USER_STATUS,
            json!({
                "userId": user_id,
                "status": user.status,
                "lastConnection": user.last_connection,
            }),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Group rooms
// ---------------------------------------------------------------------------

async fn join_group_room(
    gateway: &Gateway,
    session: &GatewaySession,
    payload: GroupRoomPayload,
) -> Result<(), EventError> {
    let Some(group_id) = payload.group_id.filter(|id| !id.is_empty()) else {
        return Ok(());
    };

    // Join is gated on current membership; leave is unconditional.
    let group = gateway
        .store
        .find_group(&group_id)
        .await?
        .ok_or_else(|| EventError::denied("Group not found"))?;
    if group.is_member(&session.user_id) {
        gateway.registry.join_room(&group_id, session.connection());
    }

    Ok(())
}

async fn leave_group_room(
    gateway: &Gateway,
    session: &GatewaySession,
    payload: GroupRoomPayload,
) -> Result<(), EventError> {
    if let Some(group_id) = payload.group_id.filter(|id| !id.is_empty()) {
        gateway.registry.leave_room(&group_id, &session.connection_id);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

async fn add_reaction(
    gateway: &Gateway,
    session: &GatewaySession,
    payload: ReactionPayload,
) -> Result<(), EventError> {
    let (message_id, emoji) = match (payload.message_id, payload.emoji) {
        (Some(m), Some(e)) if !m.is_empty() && !e.is_empty() => (m, e),
        _ => return Err(EventError::validation("Message ID and emoji are required")),
    };

    let mut message = gateway
        .store
        .find_message(&message_id)
        .await?
        .ok_or_else(|| EventError::denied("Message not found"))?;

    // A second reaction with a different emoji replaces the first; the
    // identical emoji twice is a no-op error.
    let mut old_emoji = None;
    if let Some(existing) = message.reaction_of(&session.user_id) {
        if existing.emoji == emoji {
            return Err(EventError::denied("Already reacted with this emoji"));
        }
        old_emoji = Some(existing.emoji.clone());
        message.reactions.retain(|r| r.user_id != session.user_id);
    }

    message.reactions.push(Reaction {
        user_id: session.user_id.clone(),
        emoji: emoji.clone(),
        created_at: Utc::now(),
    });
    gateway.store.update_message(&message).await?;

    let data = json!({
        "message_id": message_id,
        "user_id": session.user_id,
        "username": session.username,
        "emoji": emoji,
        "oldEmoji": old_emoji,
    });

    session.emit(OutboundEvent::new(EventName::REACTION_ADDED, data.clone()));
    fan_out_to_message_peers(gateway, session, &message, EventName::REACTION_ADDED, data);

    Ok(())
}

async fn remove_reaction(
    gateway: &Gateway,
    session: &GatewaySession,
    payload: ReactionPayload,
) -> Result<(), EventError> {
    let (message_id, emoji) = match (payload.message_id, payload.emoji) {
        (Some(m), Some(e)) if !m.is_empty() && !e.is_empty() => (m, e),
        _ => return Err(EventError::validation("Message ID and emoji are required")),
    };

    let mut message = gateway
        .store
        .find_message(&message_id)
        .await?
        .ok_or_else(|| EventError::denied("Message not found"))?;

    // Idempotent: removing a reaction that is not there is not an error.
    message
        .reactions
        .retain(|r| !(r.user_id == session.user_id && r.emoji == emoji));
    gateway.store.update_message(&message).await?;

    let data = json!({
        "message_id": message_id,
        "user_id": session.user_id,
        "emoji": emoji,
    });

    session.emit(OutboundEvent::new(EventName::REACTION_REMOVED, data.clone()));
    fan_out_to_message_peers(gateway, session, &message, EventName::REACTION_REMOVED, data);

    Ok(())
}

// ---------------------------------------------------------------------------
// Edit / delete
// ---------------------------------------------------------------------------

async fn edit_message(
    gateway: &Gateway,
    session: &GatewaySession,
    payload: EditMessagePayload,
) -> Result<(), EventError> {
    let content = payload
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| EventError::validation("Content is required"))?;
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(EventError::validation("Message too long"));
    }
    let message_id = payload
        .message_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| EventError::validation("Message ID is required"))?;

    let mut message = gateway
        .store
        .find_message(&message_id)
        .await?
        .ok_or_else(|| EventError::denied("Message not found"))?;

    // Only the original sender may mutate.
    if message.sender_id != session.user_id {
        return Err(EventError::denied("Not authorized"));
    }

    message.content = content.clone();
    message.edited = true;
    message.edited_at = Some(Utc::now());
    gateway.store.update_message(&message).await?;

    let data = json!({
        "message_id": message_id,
        "content": content,
        "edited": true,
        "editedAt": message.edited_at,
    });

    session.emit(OutboundEvent::new(EventName::MESSAGE_EDITED, data.clone()));
    fan_out_to_message_peers(gateway, session, &message, EventName::MESSAGE_EDITED, data);

    Ok(())
}

async fn delete_message(
    gateway: &Gateway,
    session: &GatewaySession,
    payload: DeleteMessagePayload,
) -> Result<(), EventError> {
    let message_id = payload
        .message_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| EventError::validation("Message ID is required"))?;

    let mut message = gateway
        .store
        .find_message(&message_id)
        .await?
        .ok_or_else(|| EventError::denied("Message not found"))?;

    if message.sender_id != session.user_id {
        return Err(EventError::denied("Not authorized"));
    }

    // Soft delete: content is not erased at this layer.
    message.deleted = true;
    message.deleted_at = Some(Utc::now());
    gateway.store.update_message(&message).await?;

    let data = json!({ "message_id": message_id });

    session.emit(OutboundEvent::new(EventName::MESSAGE_DELETED, data.clone()));
    fan_out_to_message_peers(gateway, session, &message, EventName::MESSAGE_DELETED, data);

    Ok(())
}

// ---------------------------------------------------------------------------
// Fan-out and payload population
// ---------------------------------------------------------------------------

/// Deliver a message-scoped event to its peers: the other participant of
/// a direct message, or the group room minus the actor.
fn fan_out_to_message_peers(
    gateway: &Gateway,
    session: &GatewaySession,
    message: &Message,
    event: &str,
    data: Value,
) {
    if message.is_direct() {
        let other = if message.sender_id == session.user_id {
            message.recipient_id.as_deref()
        } else {
            Some(message.sender_id.as_str())
        };
        if let Some(other_id) = other {
            gateway
                .registry
                .emit_to_user(other_id, OutboundEvent::new(event, data));
        }
    } else if let Some(group_id) = &message.group_id {
        gateway.registry.emit_to_room(
            group_id,
            Some(&session.connection_id),
            &OutboundEvent::new(event, data),
        );
    }
}

/// Denormalized user snapshot embedded in populated payloads.
fn user_summary(user: &User) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "avatar": user.avatar_url,
    })
}

/// A direct message with sender and recipient snapshots attached.
fn direct_message_view(message: &Message, sender: &User, recipient: &User) -> Value {
    let mut view = serde_json::to_value(message).unwrap_or_default();
    view["sender"] = user_summary(sender);
    view["recipient"] = user_summary(recipient);
    view
}

/// A group message with sender and group snapshots (and the replied-to
/// message, when present) attached.
fn group_message_view(
    message: &Message,
    sender: &User,
    group: &Group,
    reply_to: Option<&Message>,
) -> Value {
    let mut view = serde_json::to_value(message).unwrap_or_default();
    view["sender"] = user_summary(sender);
    view["group"] = json!({
        "id": group.id,
        "name": group.name,
        "avatar": group.avatar_url,
    });
    if let Some(replied) = reply_to {
        view["replyTo"] = serde_json::to_value(replied).unwrap_or_default();
    }
    view
}
