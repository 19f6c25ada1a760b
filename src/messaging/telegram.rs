//! `teloxide`-backed [`MessagingClient`] (spec §6.3).

use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode};

use crate::error::MessagingError;

use super::{ChatInfo, MeInfo, MemberStatus, MessagingClient};

pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self { bot: Bot::new(token) }
    }
}

fn to_messaging_error(err: teloxide::RequestError) -> MessagingError {
    let class_name = match &err {
        teloxide::RequestError::Api(api_err) => format!("{api_err:?}"),
        teloxide::RequestError::Network(_) => "TelegramNetworkError".to_string(),
        teloxide::RequestError::RetryAfter(_) => "TelegramRetryAfter".to_string(),
        teloxide::RequestError::MigrateToChatId(_) => "TelegramMigrateToChatId".to_string(),
        teloxide::RequestError::InvalidJson { .. } => "TelegramInvalidJson".to_string(),
        teloxide::RequestError::Io(_) => "TelegramNetworkError".to_string(),
    };
    MessagingError::new(class_name, err.to_string())
}

#[async_trait]
impl MessagingClient for TelegramClient {
    async fn get_me(&self) -> Result<MeInfo, MessagingError> {
        let me = self.bot.get_me().await.map_err(to_messaging_error)?;
        Ok(MeInfo {
            id: me.user.id.0 as i64,
            username: me.user.username.clone(),
            full_name: me.user.full_name(),
        })
    }

    async fn get_chat(&self, chat_id: i64) -> Result<ChatInfo, MessagingError> {
        let chat = self.bot.get_chat(ChatId(chat_id)).await.map_err(to_messaging_error)?;
        Ok(ChatInfo {
            id: chat.id.0,
            kind: format!("{:?}", chat.kind),
            title: chat.title().map(|s| s.to_string()),
            username: chat.username().map(|s| s.to_string()),
        })
    }

    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> Result<MemberStatus, MessagingError> {
        let member = self
            .bot
            .get_chat_member(ChatId(chat_id), UserId(user_id as u64))
            .await
            .map_err(to_messaging_error)?;
        Ok(match member.kind {
            teloxide::types::ChatMemberKind::Owner(_) => MemberStatus::Creator,
            teloxide::types::ChatMemberKind::Administrator(_) => MemberStatus::Administrator,
            teloxide::types::ChatMemberKind::Member => MemberStatus::Member,
            teloxide::types::ChatMemberKind::Restricted(_) => MemberStatus::Restricted,
            teloxide::types::ChatMemberKind::Left => MemberStatus::Left,
            teloxide::types::ChatMemberKind::Banned(_) => MemberStatus::Kicked,
        })
    }

    async fn forward(&self, to_chat_id: i64, from_chat_id: i64, message_id: i64) -> Result<i64, MessagingError> {
        let sent = self
            .bot
            .forward_message(ChatId(to_chat_id), ChatId(from_chat_id), MessageId(message_id as i32))
            .await
            .map_err(to_messaging_error)?;
        Ok(sent.id.0 as i64)
    }

    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<(), MessagingError> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id as i32))
            .await
            .map_err(to_messaging_error)?;
        Ok(())
    }

    async fn pin(&self, chat_id: i64, message_id: i64) -> Result<(), MessagingError> {
        self.bot
            .pin_chat_message(ChatId(chat_id), MessageId(message_id as i32))
            .await
            .map_err(to_messaging_error)?;
        Ok(())
    }

    async fn send_text(&self, chat_id: i64, html_text: &str) -> Result<(), MessagingError> {
        self.bot
            .send_message(ChatId(chat_id), html_text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(to_messaging_error)?;
        Ok(())
    }
}
