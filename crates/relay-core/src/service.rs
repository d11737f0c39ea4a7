use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::{
    censor::Censor,
    commands::{CommandProcessor, SERVER_SENDER},
    config::Config,
    domain::{IncomingMessage, Message, PINNED_TAG},
    errors::Error,
    ports::WeatherLookup,
    security::AuthGate,
    store::MessageStore,
    Result,
};

/// Outcome of an accepted submission.
#[derive(Debug)]
pub enum Submission {
    /// Content was blank after trimming; nothing was written.
    Ignored,
    /// The message (and `replies` synthesized messages) were stored.
    Stored { replies: usize },
    /// The message was stored but its command failed; no reply was stored.
    CommandFailed { error: Error },
}

/// Transport-independent channel operations.
///
/// Submission order: auth, validation, blank short-circuit, censor, persist
/// the user message, run commands, persist replies. The user message is
/// durable before any external lookup runs.
pub struct ChannelService {
    cfg: Arc<Config>,
    gate: AuthGate,
    censor: Arc<Censor>,
    store: MessageStore,
    commands: CommandProcessor,
}

impl ChannelService {
    pub fn new(cfg: Arc<Config>, lookup: Arc<dyn WeatherLookup>) -> Result<Self> {
        let censor = Arc::new(Censor::new(&cfg.censor_words)?);
        let commands = CommandProcessor::new(lookup, censor.clone());
        Ok(Self::from_parts(cfg, censor, commands))
    }

    pub fn from_parts(cfg: Arc<Config>, censor: Arc<Censor>, commands: CommandProcessor) -> Self {
        Self {
            gate: AuthGate::new(&cfg.channel_secret),
            store: MessageStore::from_config(&cfg),
            cfg,
            censor,
            commands,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Channel name, for authorized callers.
    pub fn health(&self, credential: Option<&str>) -> Result<&str> {
        self.authorize(credential)?;
        Ok(&self.cfg.channel_name)
    }

    pub async fn list(&self, credential: Option<&str>) -> Result<Vec<Message>> {
        self.authorize(credential)?;
        Ok(self.store.load().await)
    }

    pub async fn submit(&self, credential: Option<&str>, body: &Value) -> Result<Submission> {
        self.authorize(credential)?;
        let incoming = IncomingMessage::from_json(body)?;

        if incoming.content.trim().is_empty() {
            return Ok(Submission::Ignored);
        }

        self.store
            .append(Message {
                content: self.censor.censor(&incoming.content),
                sender: self.censor.censor(&incoming.sender),
                timestamp: incoming.timestamp.clone(),
                extra: incoming.extra.clone(),
            })
            .await?;

        let replies = match self.commands.handle(&incoming).await {
            Ok(replies) => replies,
            Err(error) => {
                warn!(content = %incoming.content.trim(), "command failed: {error}");
                return Ok(Submission::CommandFailed { error });
            }
        };

        let count = replies.len();
        self.store.append_all(replies).await?;
        Ok(Submission::Stored { replies: count })
    }

    /// Pin the configured welcome message unless one is already pinned.
    pub async fn pin_welcome(&self) -> Result<()> {
        let mut welcome = Message::synthesized(SERVER_SENDER, self.cfg.welcome_message.clone());
        welcome.extra = Some(PINNED_TAG.to_string());
        if self.store.ensure_pinned(welcome).await? {
            info!("pinned welcome message");
        }
        Ok(())
    }

    fn authorize(&self, credential: Option<&str>) -> Result<()> {
        self.gate.authorize(credential).inspect_err(|_| {
            warn!(channel = %self.cfg.channel_name, "rejected request: bad credential");
        })
    }
}
