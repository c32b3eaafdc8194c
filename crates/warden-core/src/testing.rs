//! In-memory fakes shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::error::{Result, WardenError};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, LlmProvider};
use crate::rpc::RpcResponse;
use crate::tool::{ToolBackend, ToolDescriptor};

pub type Responder = fn(&str, &Map<String, Value>) -> Result<RpcResponse>;

/// Tool backend with a fixed catalog and a scripted reply
pub struct FakeBackend {
    tools: Vec<ToolDescriptor>,
    calls: AtomicUsize,
    respond: Responder,
}

impl FakeBackend {
    pub fn new(respond: Responder) -> Self {
        Self::with_tools(default_tools(), respond)
    }

    pub fn with_tools(tools: Vec<ToolDescriptor>, respond: Responder) -> Self {
        Self {
            tools,
            calls: AtomicUsize::new(0),
            respond,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolBackend for FakeBackend {
    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }

    async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> Result<RpcResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(name, arguments)
    }
}

/// `check_ip_reputation` (abuseipdb), `search_ioc` and `list_indices`
pub fn default_tools() -> Vec<ToolDescriptor> {
    let ip_tool: ToolDescriptor = serde_json::from_value(json!({
        "name": "check_ip_reputation",
        "description": "Check IP address reputation",
        "inputSchema": {
            "type": "object",
            "properties": {"ip": {"type": "string"}, "max_age_days": {"type": "integer"}},
            "required": ["ip"]
        }
    }))
    .unwrap();

    vec![
        ip_tool.with_provider("abuseipdb"),
        ToolDescriptor::new("search_ioc", "Search ThreatFox").with_provider("threatfox"),
        ToolDescriptor::new("list_indices", "List indices").with_provider("elastic"),
    ]
}

/// `{content:[{type:"text", text}]}` wrapped in a success response
pub fn text_result(text: &str) -> Result<RpcResponse> {
    Ok(RpcResponse::success(
        Some(json!(1)),
        json!({"content": [{"type": "text", "text": text}]}),
    ))
}

/// Language model that replays queued replies, then repeats the fallback
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `text` forever once the queue is drained
    pub fn repeating(text: impl Into<String>) -> Self {
        let mut llm = Self::new(Vec::<String>::new());
        llm.fallback = Some(text.into());
        llm
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(WardenError::Provider(message.into())));
        self
    }

    pub fn requests(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompt(&self, index: usize) -> Vec<Message> {
        self.prompts.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        let next = self.replies.lock().unwrap().pop_front();
        let content = match (next, &self.fallback) {
            (Some(reply), _) => reply?,
            (None, Some(fallback)) => fallback.clone(),
            (None, None) => return Err(WardenError::ProviderUnavailable("script exhausted".into())),
        };
        Ok(Completion {
            content,
            model: options.model.clone(),
        })
    }
}
