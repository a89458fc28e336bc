//! Message send pipeline and typing relay.

use tracing::{debug, error};

use chatis_core::error::{AppError, ErrorKind};
use chatis_core::result::AppResult;
use chatis_core::types::UserId;
use chatis_entity::message::{FileDescriptor, MessageRecord, NewMessage};

use super::connections::ConnectionRouter;
use super::Delivery;
use crate::connection::authenticator::AuthenticatedIdentity;
use crate::connection::handle::ConnectionHandle;
use crate::message::types::ServerEvent;

/// Reason reported to the sender when persistence fails.
pub const SEND_FAILED: &str = "Failed to send message";

fn send_failure(sender: UserId, receiver: UserId, err: AppError) -> AppError {
    error!(
        sender_id = %sender,
        receiver_id = %receiver,
        error = %err,
        "Message send failed"
    );
    AppError::with_source(ErrorKind::Storage, SEND_FAILED, err)
}

impl ConnectionRouter {
    /// Validate, persist, then route a direct message.
    ///
    /// Nothing is routed unless the message was persisted. On success the
    /// receiver gets `message:receive` followed by `notification:new`
    /// (best-effort) and the sender gets `message:sent`, on `origin` when
    /// given or on the sender's registered connection otherwise.
    ///
    /// Errors are validation errors (reported verbatim) or storage errors
    /// carrying [`SEND_FAILED`].
    pub async fn send_message(
        &self,
        sender: &AuthenticatedIdentity,
        origin: Option<&ConnectionHandle>,
        receiver_id: UserId,
        content: Option<String>,
        file: Option<FileDescriptor>,
    ) -> AppResult<MessageRecord> {
        let new_message = NewMessage::new(sender.user_id, receiver_id, content, file)?;

        let receiver = self
            .users
            .find_by_id(receiver_id)
            .await
            .map_err(|e| send_failure(sender.user_id, receiver_id, e))?
            .ok_or_else(|| AppError::validation("Receiver not found"))?;

        let sender_profile = self
            .users
            .find_by_id(sender.user_id)
            .await
            .map_err(|e| send_failure(sender.user_id, receiver_id, e))?
            .map(|user| user.profile())
            .unwrap_or_else(|| sender.profile());

        let message = self
            .messages
            .append(new_message)
            .await
            .map_err(|e| send_failure(sender.user_id, receiver_id, e))?;
        self.metrics.record_persisted();

        let record = message.into_record(sender_profile, receiver.profile());

        let delivery = self.route(receiver_id, ServerEvent::MessageReceive(record.clone()));
        let ack = ServerEvent::MessageSent(record.clone());
        match origin {
            Some(handle) => self.deliver(handle, ack),
            None => self.route(sender.user_id, ack),
        };
        self.route(
            receiver_id,
            ServerEvent::message_notification(&record, self.preview_chars),
        );

        debug!(
            message_id = %record.id,
            sender_id = %sender.user_id,
            %receiver_id,
            ?delivery,
            "Message sent"
        );
        Ok(record)
    }

    /// Relay a typing signal from `sender` to `receiver_id`, best-effort.
    pub fn relay_typing(
        &self,
        sender: &AuthenticatedIdentity,
        receiver_id: UserId,
        starting: bool,
    ) -> Delivery {
        self.route(
            receiver_id,
            ServerEvent::typing(sender.user_id, &sender.display_name, starting),
        )
    }
}
