//! Line-oriented operator console.
//!
//! Each stdin line is one command. Every command replies with exactly one
//! document and none of them waits on the reader: connect, disconnect and
//! the stream commands only hand work to the bridge's workers.

use std::str::FromStr;

use serde_json::{Value, json};
use strum::{EnumIter, EnumMessage, EnumString, IntoEnumIterator, IntoStaticStr};

use lapbridge_core::{Bridge, InventorySnapshot, ReaderStatus, ReaderTransport};

use crate::cli::OutputFormat;
use crate::output;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, EnumMessage, IntoStaticStr)]
#[strum(ascii_case_insensitive, serialize_all = "kebab-case")]
pub enum ConsoleCommand {
    #[strum(message = "open the reader link")]
    Connect,
    #[strum(message = "close the reader link")]
    Disconnect,
    #[strum(to_string = "status", serialize = "connected", message = "connection status")]
    Status,
    #[strum(
        serialize = "reader-info",
        serialize = "readerinfo",
        serialize = "info",
        message = "capability metadata of the reader"
    )]
    ReaderInfo,
    #[strum(
        serialize = "start",
        serialize = "start-stream",
        message = "clear the table and start the inventory stream"
    )]
    StartStream,
    #[strum(
        serialize = "stop",
        serialize = "stop-stream",
        message = "stop the inventory stream"
    )]
    StopStream,
    #[strum(serialize = "inventory", serialize = "tags", message = "tag table")]
    Inventory,
    #[strum(serialize = "help", serialize = "?", message = "list commands")]
    Help,
    #[strum(serialize = "quit", serialize = "exit", message = "stop the bridge")]
    Quit,
}

/// What a console line produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Document(Value),
    Status(ReaderStatus),
    Inventory(InventorySnapshot),
    Quit,
}

impl Reply {
    fn error(message: impl Into<String>) -> Self {
        Self::Document(json!({ "error": message.into() }))
    }

    /// Rendered text for stdout; `None` when nothing is printed.
    pub fn render(&self, format: OutputFormat, color: bool) -> Option<String> {
        match self {
            Self::Document(doc) => Some(output::render_document(format, doc)),
            Self::Status(status) => Some(output::render_status(format, status, color)),
            Self::Inventory(snapshot) => Some(output::render_inventory(format, snapshot, color)),
            Self::Quit => None,
        }
    }
}

/// Parse one line. `None` for blank lines.
pub fn parse(line: &str) -> Option<Result<ConsoleCommand, String>> {
    let word = line.trim();
    if word.is_empty() {
        return None;
    }
    Some(ConsoleCommand::from_str(word).map_err(|_| word.to_owned()))
}

/// Run one console line against the bridge.
pub async fn dispatch<R: ReaderTransport>(bridge: &Bridge<R>, line: &str) -> Option<Reply> {
    match parse(line)? {
        Ok(command) => Some(execute(bridge, command).await),
        Err(word) => Some(Reply::error(format!("unknown command '{word}', try 'help'"))),
    }
}

pub async fn execute<R: ReaderTransport>(bridge: &Bridge<R>, command: ConsoleCommand) -> Reply {
    match command {
        ConsoleCommand::Connect => {
            drop(bridge.connect());
            Reply::Document(json!({}))
        }
        ConsoleCommand::Disconnect => {
            drop(bridge.disconnect());
            Reply::Document(json!({}))
        }
        ConsoleCommand::Status => Reply::Status(bridge.status().await),
        ConsoleCommand::ReaderInfo => match bridge.reader_info().await {
            Some(info) => match serde_json::to_value(&info) {
                Ok(doc) => Reply::Document(doc),
                Err(_) => Reply::error("Error serializing reader info"),
            },
            None => Reply::error("No reader info available"),
        },
        ConsoleCommand::StartStream => {
            drop(bridge.start_stream().await);
            Reply::Document(json!({}))
        }
        ConsoleCommand::StopStream => {
            drop(bridge.stop_stream().await);
            Reply::Document(json!({}))
        }
        ConsoleCommand::Inventory => Reply::Inventory(bridge.inventory().await),
        ConsoleCommand::Help => Reply::Document(help_document()),
        ConsoleCommand::Quit => Reply::Quit,
    }
}

fn help_document() -> Value {
    let commands: serde_json::Map<String, Value> = ConsoleCommand::iter()
        .map(|cmd| {
            let name: &'static str = cmd.into();
            let about = cmd.get_message().unwrap_or_default();
            (name.to_owned(), Value::from(about))
        })
        .collect();
    json!({ "commands": commands })
}
