//! In-memory [`MessagingClient`] fake for scheduler/classifier tests (spec
//! §6.3 **[ADDED]**): scripts queued outcomes per call kind instead of
//! talking to a real chat platform.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::MessagingError;

use super::{ChatInfo, MeInfo, MemberStatus, MessagingClient};

#[derive(Default)]
struct MockState {
    forward: VecDeque<Result<i64, MessagingError>>,
    delete: VecDeque<Result<(), MessagingError>>,
    pin: VecDeque<Result<(), MessagingError>>,
    send_text: VecDeque<Result<(), MessagingError>>,
    get_chat: VecDeque<Result<ChatInfo, MessagingError>>,
    sent_texts: Vec<(i64, String)>,
    forwards_called: Vec<(i64, i64, i64)>,
    deletes_called: Vec<(i64, i64)>,
    pins_called: Vec<(i64, i64)>,
}

/// A scriptable fake bot. Queue outcomes with `push_*`, then hand a `&dyn
/// MessagingClient` reference to the code under test; inspect `*_called`
/// logs afterward.
#[derive(Default)]
pub struct MockMessagingClient {
    state: Mutex<MockState>,
    me: MeInfo,
}

impl MockMessagingClient {
    pub fn new(bot_id: i64, username: &str) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            me: MeInfo { id: bot_id, username: Some(username.to_string()), full_name: username.to_string() },
        }
    }

    pub fn push_forward(&self, result: Result<i64, MessagingError>) {
        self.state.lock().unwrap().forward.push_back(result);
    }

    pub fn push_delete(&self, result: Result<(), MessagingError>) {
        self.state.lock().unwrap().delete.push_back(result);
    }

    pub fn push_pin(&self, result: Result<(), MessagingError>) {
        self.state.lock().unwrap().pin.push_back(result);
    }

    pub fn push_send_text(&self, result: Result<(), MessagingError>) {
        self.state.lock().unwrap().send_text.push_back(result);
    }

    pub fn push_get_chat(&self, result: Result<ChatInfo, MessagingError>) {
        self.state.lock().unwrap().get_chat.push_back(result);
    }

    pub fn sent_texts(&self) -> Vec<(i64, String)> {
        self.state.lock().unwrap().sent_texts.clone()
    }

    pub fn forwards_called(&self) -> Vec<(i64, i64, i64)> {
        self.state.lock().unwrap().forwards_called.clone()
    }

    pub fn deletes_called(&self) -> Vec<(i64, i64)> {
        self.state.lock().unwrap().deletes_called.clone()
    }

    pub fn pins_called(&self) -> Vec<(i64, i64)> {
        self.state.lock().unwrap().pins_called.clone()
    }
}

#[async_trait]
impl MessagingClient for MockMessagingClient {
    async fn get_me(&self) -> Result<MeInfo, MessagingError> {
        Ok(self.me.clone())
    }

    async fn get_chat(&self, chat_id: i64) -> Result<ChatInfo, MessagingError> {
        let mut state = self.state.lock().unwrap();
        state.get_chat.pop_front().unwrap_or(Ok(ChatInfo {
            id: chat_id,
            kind: "supergroup".to_string(),
            title: None,
            username: None,
        }))
    }

    async fn get_chat_member(&self, _chat_id: i64, _user_id: i64) -> Result<MemberStatus, MessagingError> {
        Ok(MemberStatus::Administrator)
    }

    async fn forward(&self, to_chat_id: i64, from_chat_id: i64, message_id: i64) -> Result<i64, MessagingError> {
        let mut state = self.state.lock().unwrap();
        state.forwards_called.push((to_chat_id, from_chat_id, message_id));
        state.forward.pop_front().unwrap_or(Ok(message_id))
    }

    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<(), MessagingError> {
        let mut state = self.state.lock().unwrap();
        state.deletes_called.push((chat_id, message_id));
        state.delete.pop_front().unwrap_or(Ok(()))
    }

    async fn pin(&self, chat_id: i64, message_id: i64) -> Result<(), MessagingError> {
        let mut state = self.state.lock().unwrap();
        state.pins_called.push((chat_id, message_id));
        state.pin.pop_front().unwrap_or(Ok(()))
    }

    async fn send_text(&self, chat_id: i64, html_text: &str) -> Result<(), MessagingError> {
        let mut state = self.state.lock().unwrap();
        state.sent_texts.push((chat_id, html_text.to_string()));
        state.send_text.pop_front().unwrap_or(Ok(()))
    }
}

impl Default for MeInfo {
    fn default() -> Self {
        Self { id: 0, username: None, full_name: String::new() }
    }
}
