//! `!command` grammar.
//!
//! Each submitted message is matched once against an ordered table of
//! handlers; the first match produces the synthesized replies. Handlers are
//! stateless, all I/O goes through [`WeatherLookup`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    censor::Censor,
    domain::{IncomingMessage, Message},
    ports::{CurrentWeather, WeatherLookup},
    Result,
};

pub const COMMAND_PREFIX: char = '!';
pub const WEATHER_COMMAND: &str = "!weather";
pub const WEATHER_SENDER: &str = "Weather";
pub const SERVER_SENDER: &str = "Server";

const LOCATION_UNAVAILABLE: &str =
    "Sorry, your location is unavailable. Try '!weather <place>' instead.";

/// Everything a handler may look at while answering one message.
pub struct CommandContext<'a> {
    pub message: &'a IncomingMessage,
    /// Trimmed, uncensored content.
    pub content: &'a str,
    pub lookup: &'a dyn WeatherLookup,
    pub censor: &'a Censor,
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// `content` is already trimmed.
    fn matches(&self, content: &str) -> bool;

    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<Vec<Message>>;
}

pub struct CommandProcessor {
    handlers: Vec<Box<dyn CommandHandler>>,
    lookup: Arc<dyn WeatherLookup>,
    censor: Arc<Censor>,
}

impl CommandProcessor {
    /// Processor with the built-in grammar: `!weather`, `!weather <place>`,
    /// then a catch-all for unknown `!commands`.
    pub fn new(lookup: Arc<dyn WeatherLookup>, censor: Arc<Censor>) -> Self {
        Self {
            handlers: vec![
                Box::new(WeatherHere),
                Box::new(WeatherAt),
                Box::new(UnknownCommand),
            ],
            lookup,
            censor,
        }
    }

    /// Add a handler that takes priority over every registered one.
    pub fn with_handler(mut self, handler: Box<dyn CommandHandler>) -> Self {
        self.handlers.insert(0, handler);
        self
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Replies for `message`, in the order they should be stored.
    ///
    /// Plain chat yields no replies. A lookup failure is returned as-is;
    /// nothing partial is produced.
    pub async fn handle(&self, message: &IncomingMessage) -> Result<Vec<Message>> {
        let content = message.content.trim();
        let Some(handler) = self.handlers.iter().find(|h| h.matches(content)) else {
            return Ok(Vec::new());
        };

        tracing::debug!(command = handler.name(), "dispatching command");
        let ctx = CommandContext {
            message,
            content,
            lookup: self.lookup.as_ref(),
            censor: self.censor.as_ref(),
        };
        handler.handle(&ctx).await
    }
}

/// `!weather` with the client's own coordinates.
struct WeatherHere;

#[async_trait]
impl CommandHandler for WeatherHere {
    fn name(&self) -> &'static str {
        "weather"
    }

    fn matches(&self, content: &str) -> bool {
        content == WEATHER_COMMAND
    }

    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<Vec<Message>> {
        let coords = if ctx.message.has_client_error() {
            None
        } else {
            ctx.message.coordinates
        };
        let Some(at) = coords else {
            return Ok(vec![Message::synthesized(WEATHER_SENDER, LOCATION_UNAVAILABLE)]);
        };

        let weather = ctx.lookup.current_weather(at).await?;
        Ok(vec![Message::synthesized(
            WEATHER_SENDER,
            weather_report(None, weather),
        )])
    }
}

/// `!weather <place>`: geocode the place, then report.
struct WeatherAt;

impl WeatherAt {
    fn place(content: &str) -> Option<&str> {
        content
            .strip_prefix(WEATHER_COMMAND)
            .filter(|rest| rest.starts_with(char::is_whitespace))
            .map(str::trim)
            .filter(|place| !place.is_empty())
    }
}

#[async_trait]
impl CommandHandler for WeatherAt {
    fn name(&self) -> &'static str {
        "weather-at"
    }

    fn matches(&self, content: &str) -> bool {
        Self::place(content).is_some()
    }

    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<Vec<Message>> {
        let place = ctx.censor.censor(Self::place(ctx.content).unwrap_or_default());

        let Some(at) = ctx.lookup.geocode(&place).await? else {
            return Ok(vec![Message::synthesized(
                WEATHER_SENDER,
                format!("Location '{place}' not found."),
            )]);
        };

        let weather = ctx.lookup.current_weather(at).await?;
        Ok(vec![Message::synthesized(
            WEATHER_SENDER,
            weather_report(Some(&place), weather),
        )])
    }
}

/// Any other `!something`.
struct UnknownCommand;

#[async_trait]
impl CommandHandler for UnknownCommand {
    fn name(&self) -> &'static str {
        "unknown"
    }

    fn matches(&self, content: &str) -> bool {
        content.starts_with(COMMAND_PREFIX)
    }

    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<Vec<Message>> {
        let name = ctx.censor.censor(
            ctx.content
                .strip_prefix(COMMAND_PREFIX)
                .unwrap_or(ctx.content),
        );
        Ok(vec![Message::synthesized(
            SERVER_SENDER,
            format!("Command '{name}' not found."),
        )])
    }
}

fn weather_report(place: Option<&str>, w: CurrentWeather) -> String {
    match place {
        Some(place) => format!(
            "Today in {place} it is going to be {}°C with a windspeed of {}km/h.",
            w.temperature, w.windspeed
        ),
        None => format!(
            "Today it is going to be {}°C with a windspeed of {}km/h.",
            w.temperature, w.windspeed
        ),
    }
}
