// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turning a [`LogEvent`] into the text body of one request.
//!
//! The delivery adapter only sees the [`TextFormatter`] trait. Three strategies
//! ship with the crate:
//!
//! - [`TemplateFormatter`]: an output template such as
//!   `{Timestamp:%H:%M:%S} [{Level:u3}] {Message}{NewLine}{Exception}`
//! - [`RawFormatter`]: the rendered message and nothing else
//! - [`JsonFormatter`]: one compact JSON object per event
//!
//! Supported template tokens:
//!
//! | Token | Output |
//! |-------|--------|
//! | `{Timestamp}` / `{Timestamp:<strftime>}` | event time in UTC |
//! | `{Level}` / `{Level:u3}` / `{Level:w3}` | `INFO` / `INF` / `inf` |
//! | `{Message}` | rendered message template |
//! | `{NewLine}` | `\n` |
//! | `{Exception}` | error payload followed by a newline, or nothing |
//! | `{Properties}` | all properties as a JSON object |
//! | `{<name>}` | the named property, or nothing if absent |

use chrono::format::{Item, StrftimeItems};
use std::fmt::Write;

use crate::error::{FormatError, SinkError};
use crate::event::{write_value, LogEvent};

/// Output template used when none is configured.
pub const DEFAULT_OUTPUT_TEMPLATE: &str =
    "{Timestamp:%Y-%m-%d %H:%M:%S%.3f %:z} [{Level}] {Message}{NewLine}{Exception}";

const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Formats one event into a text payload.
///
/// Implementations must be cheap and side-effect free; an `Err` only drops the
/// event it was called with.
pub trait TextFormatter: Send + Sync {
    fn format(&self, event: &LogEvent) -> Result<String, FormatError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LevelStyle {
    Full,
    Upper3,
    Lower3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Timestamp(String),
    Level(LevelStyle),
    Message,
    NewLine,
    Exception,
    Properties,
    Property(String),
}

/// Formatter driven by an output template, parsed once up front.
#[derive(Debug, Clone)]
pub struct TemplateFormatter {
    tokens: Vec<Token>,
}

impl Default for TemplateFormatter {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_TEMPLATE).expect("default output template is valid")
    }
}

impl TemplateFormatter {
    /// Parses `template`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::InvalidConfig`] for an unterminated `{` or an
    /// invalid timestamp format.
    pub fn new(template: &str) -> Result<Self, SinkError> {
        let mut tokens = Vec::new();
        let mut text = String::new();
        let mut rest = template;

        while let Some(pos) = rest.find(['{', '}']) {
            text.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") || tail.starts_with("}}") {
                text.push_str(&tail[..1]);
                rest = &tail[2..];
                continue;
            }
            if tail.starts_with('}') {
                text.push('}');
                rest = &tail[1..];
                continue;
            }

            let Some(end) = tail.find('}') else {
                return Err(SinkError::InvalidConfig(format!(
                    "unterminated token in output template: {tail}"
                )));
            };
            if !text.is_empty() {
                tokens.push(Token::Text(std::mem::take(&mut text)));
            }
            tokens.push(parse_token(&tail[1..end])?);
            rest = &tail[end + 1..];
        }
        text.push_str(rest);
        if !text.is_empty() {
            tokens.push(Token::Text(text));
        }

        Ok(Self { tokens })
    }
}

fn parse_token(token: &str) -> Result<Token, SinkError> {
    let (name, format) = match token.split_once(':') {
        Some((name, format)) => (name.trim(), Some(format)),
        None => (token.trim(), None),
    };

    let parsed = match name {
        "Timestamp" => {
            let format = format.unwrap_or(DEFAULT_TIMESTAMP_FORMAT);
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(SinkError::InvalidConfig(format!(
                    "invalid timestamp format in output template: {format}"
                )));
            }
            Token::Timestamp(format.to_string())
        }
        "Level" => match format {
            None => Token::Level(LevelStyle::Full),
            Some("u3") => Token::Level(LevelStyle::Upper3),
            Some("w3") => Token::Level(LevelStyle::Lower3),
            Some(other) => {
                return Err(SinkError::InvalidConfig(format!(
                    "unsupported level format in output template: {other}"
                )))
            }
        },
        "Message" => Token::Message,
        "NewLine" => Token::NewLine,
        "Exception" => Token::Exception,
        "Properties" => Token::Properties,
        "" => {
            return Err(SinkError::InvalidConfig(
                "empty token in output template".to_string(),
            ))
        }
        property => Token::Property(property.to_string()),
    };
    Ok(parsed)
}

impl TextFormatter for TemplateFormatter {
    fn format(&self, event: &LogEvent) -> Result<String, FormatError> {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::Timestamp(format) => write!(out, "{}", event.timestamp.format(format))?,
                Token::Level(LevelStyle::Full) => out.push_str(event.level.as_str()),
                Token::Level(LevelStyle::Upper3) => out.push_str(event.level.abbreviation()),
                Token::Level(LevelStyle::Lower3) => {
                    out.push_str(&event.level.abbreviation().to_lowercase());
                }
                Token::Message => out.push_str(&event.render_message()),
                Token::NewLine => out.push('\n'),
                Token::Exception => {
                    if let Some(error) = &event.error {
                        out.push_str(error);
                        out.push('\n');
                    }
                }
                Token::Properties => out.push_str(&serde_json::to_string(&event.properties)?),
                Token::Property(name) => {
                    if let Some(value) = event.properties.get(name) {
                        write_value(&mut out, value);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Passes the rendered message through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawFormatter;

impl TextFormatter for RawFormatter {
    fn format(&self, event: &LogEvent) -> Result<String, FormatError> {
        Ok(event.render_message())
    }
}

/// One compact JSON object per event, with the rendered message under `message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl TextFormatter for JsonFormatter {
    fn format(&self, event: &LogEvent) -> Result<String, FormatError> {
        let mut value = serde_json::to_value(event)?;
        if let Some(object) = value.as_object_mut() {
            object.insert(
                "message".to_string(),
                serde_json::Value::String(event.render_message()),
            );
        }
        Ok(serde_json::to_string(&value)?)
    }
}
