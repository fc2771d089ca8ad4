//! Deterministic model backend for flow and route tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{LlmError, ModelInvoker, ModelRequest};

pub enum Reply {
    Text(String),
    Error(fn() -> LlmError),
}

/// Plays back scripted replies in order. The last reply repeats forever,
/// so a single-reply script behaves like a fixed deterministic model.
pub struct ScriptedInvoker {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedInvoker {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Reply::Text(text.to_string())])
    }

    pub fn failing(error: fn() -> LlmError) -> Self {
        Self::new(vec![Reply::Error(error)])
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn generate(&self, request: &ModelRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());

        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            None
        };
        let current = reply.as_ref().or(replies.front());

        match current {
            Some(Reply::Text(text)) => Ok(text.clone()),
            Some(Reply::Error(make)) => Err(make()),
            None => Err(LlmError::EmptyContent),
        }
    }
}

pub fn upstream_unavailable() -> LlmError {
    LlmError::Upstream {
        status: 503,
        message: "model overloaded".to_string(),
    }
}
