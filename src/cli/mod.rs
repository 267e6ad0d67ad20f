//! CLI argument parsing and console rendering for ochat.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;

use crate::agent::{ConversationEvent, EventPayload, EventSink};
use crate::config::{OchatConfig, ServerConfig};
use crate::error::{OchatError, Result};
use crate::mcp::{HttpParameters, ServerParameters};

/// Chat with a model that can call local and MCP-hosted tools.
#[derive(Parser, Debug)]
#[command(name = "ochat", version, about = "Streaming chat with MCP tools")]
pub struct Cli {
    /// Config file (defaults to ochat.toml in the platform config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Instructions sent with every turn
    #[arg(short, long)]
    pub instructions: Option<String>,

    /// Offer the hosted web search tool
    #[arg(long)]
    pub web_search: bool,

    /// MCP server to spawn, as one command line (repeatable)
    #[arg(long, value_name = "COMMAND")]
    pub stdio: Vec<String>,

    /// Streamable-HTTP MCP server URL (repeatable)
    #[arg(long, value_name = "URL")]
    pub http: Vec<String>,

    /// Header for every --http server, as NAME:VALUE (repeatable)
    #[arg(long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply flag overrides on top of file and environment settings.
    pub fn apply_to(&self, config: &mut OchatConfig) -> Result<()> {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(instructions) = &self.instructions {
            config.instructions = instructions.clone();
        }
        if self.web_search {
            config.web_search = true;
        }

        for (i, line) in self.stdio.iter().enumerate() {
            let mut parts = line.split_whitespace().map(str::to_string);
            let command = parts.next().ok_or_else(|| {
                OchatError::Configuration("--stdio needs a command".into())
            })?;
            config.servers.push(ServerConfig {
                name: format!("stdio-{}", i + 1),
                params: ServerParameters::stdio(command, parts.collect()),
            });
        }

        let headers = self
            .headers
            .iter()
            .map(|raw| parse_header(raw))
            .collect::<Result<Vec<_>>>()?;
        for (i, url) in self.http.iter().enumerate() {
            let params = HttpParameters::builder()
                .url(url.clone())
                .headers(headers.iter().cloned().collect())
                .build();
            config.servers.push(ServerConfig {
                name: format!("http-{}", i + 1),
                params: ServerParameters::Http(params),
            });
        }
        Ok(())
    }
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(OchatError::Configuration(format!(
            "invalid header '{raw}', expected NAME:VALUE"
        ))),
    }
}

/// Turns conversation events into console text.
///
/// Streamed text is written as it arrives; trace lines always start on a
/// fresh line.
#[derive(Debug, Default)]
pub struct ConsoleRenderer {
    mid_line: bool,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &ConversationEvent) -> String {
        match &event.payload {
            EventPayload::Banner {
                model,
                instructions,
                tools,
            } => self.line(format!(
                "[system] model='{model}' instructions='{instructions}' tools='{}'.",
                tools.join(", ")
            )),
            EventPayload::Prompt => {
                let mut out = self.break_line();
                out.push_str("[user] ");
                self.mid_line = true;
                out
            }
            EventPayload::TurnStarted { .. } => {
                // The user's Enter already ended the prompt line.
                self.mid_line = false;
                String::new()
            }
            EventPayload::TextDelta { delta, .. } => {
                if !delta.is_empty() {
                    self.mid_line = !delta.ends_with('\n');
                }
                delta.clone()
            }
            EventPayload::ToolCall {
                call_id, arguments, ..
            } => self.line(format!(
                "[system] function_call='{call_id}' arguments='{arguments}'"
            )),
            EventPayload::ToolResult { name, output, .. } => {
                self.line(format!("[system] function='{name}' result='{output}'"))
            }
            EventPayload::WebSearch { action } => self.line(format!("[web_search] {action}")),
            EventPayload::TurnFinished { .. } => self.break_line(),
            EventPayload::TurnFailed { error, hint } => {
                let mut out = self.line(format!("[error] {error}"));
                if let Some(hint) = hint {
                    out.push_str(&format!("[system] hint: {hint}\n"));
                }
                out
            }
            EventPayload::Terminated => String::new(),
        }
    }

    fn break_line(&mut self) -> String {
        if std::mem::take(&mut self.mid_line) {
            "\n".to_string()
        } else {
            String::new()
        }
    }

    fn line(&mut self, text: String) -> String {
        let mut out = self.break_line();
        out.push_str(&text);
        out.push('\n');
        out
    }
}

/// An [`EventSink`] that renders to stdout.
pub fn console_sink() -> EventSink {
    let renderer = Mutex::new(ConsoleRenderer::new());
    Arc::new(move |event: ConversationEvent| {
        let text = match renderer.lock() {
            Ok(mut renderer) => renderer.render(&event),
            Err(poisoned) => poisoned.into_inner().render(&event),
        };
        if !text.is_empty() {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn event(payload: EventPayload) -> ConversationEvent {
        ConversationEvent {
            conversation_id: Uuid::nil(),
            turn_id: None,
            seq: 0,
            timestamp: Utc::now(),
            payload,
        }
    }

    #[test]
    fn parse_servers_and_overrides() {
        let cli = Cli::try_parse_from([
            "ochat",
            "--model",
            "gpt-4o-mini",
            "--web-search",
            "--stdio",
            "python profile_server.py --quiet",
            "--http",
            "http://localhost:8181/mcp",
            "--header",
            "Authorization: Bearer abc",
        ])
        .unwrap();

        let mut config = OchatConfig::default();
        cli.apply_to(&mut config).unwrap();

        assert_eq!(config.model, "gpt-4o-mini");
        assert!(config.web_search);
        assert_eq!(config.servers.len(), 2);
        assert_eq!(
            config.servers[0].params,
            ServerParameters::stdio("python", vec!["profile_server.py".into(), "--quiet".into()])
        );
        match &config.servers[1].params {
            ServerParameters::Http(params) => {
                assert_eq!(params.url, "http://localhost:8181/mcp");
                assert_eq!(params.bearer_token(), Some("abc"));
            }
            other => panic!("expected http server, got {other:?}"),
        }
    }

    #[test]
    fn malformed_header_is_a_configuration_error() {
        let cli = Cli::try_parse_from(["ochat", "--http", "http://x/mcp", "--header", "nocolon"])
            .unwrap();
        let err = cli.apply_to(&mut OchatConfig::default()).unwrap_err();
        assert!(matches!(err, OchatError::Configuration(_)));
    }

    #[test]
    fn renders_the_console_contract() {
        let mut renderer = ConsoleRenderer::new();
        let mut out = String::new();
        for payload in [
            EventPayload::Banner {
                model: "gpt-4.1".into(),
                instructions: "Be nice.".into(),
                tools: vec!["bye".into(), "add".into()],
            },
            EventPayload::Prompt,
            EventPayload::TurnStarted { continuation: false },
            EventPayload::ToolCall {
                call_id: "call_1".into(),
                name: "add".into(),
                arguments: r#"{"a":5,"b":7}"#.into(),
            },
            EventPayload::ToolResult {
                call_id: "call_1".into(),
                name: "add".into(),
                output: "12".into(),
                is_error: false,
            },
            EventPayload::TurnFinished {
                state: crate::types::TurnState::Completed,
            },
            EventPayload::TurnStarted { continuation: true },
            EventPayload::TextDelta {
                item_id: "msg_1".into(),
                delta: "It is ".into(),
            },
            EventPayload::TextDelta {
                item_id: "msg_1".into(),
                delta: "12.".into(),
            },
            EventPayload::TurnFinished {
                state: crate::types::TurnState::Completed,
            },
            EventPayload::Prompt,
        ] {
            out.push_str(&renderer.render(&event(payload)));
        }

        assert_eq!(
            out,
            "[system] model='gpt-4.1' instructions='Be nice.' tools='bye, add'.\n\
             [user] \
             [system] function_call='call_1' arguments='{\"a\":5,\"b\":7}'\n\
             [system] function='add' result='12'\n\
             It is 12.\n\
             [user] "
        );
    }

    #[test]
    fn failures_print_error_and_hint() {
        let mut renderer = ConsoleRenderer::new();
        let out = renderer.render(&event(EventPayload::TurnFailed {
            error: "Protocol error: boom".into(),
            hint: Some("check things".into()),
        }));
        assert_eq!(out, "[error] Protocol error: boom\n[system] hint: check things\n");
    }
}
