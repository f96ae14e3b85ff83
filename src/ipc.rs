//! Newline-delimited JSON channel to a host process (the desktop shell).
//!
//! Every line is `{"channel": ..., "payload": ...}`. Requests come in on
//! stdin, replies go out on stdout; logs stay on stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tokio::sync::Mutex;

use crate::autosave::{Autosave, SharedDocument};
use crate::cli::{BookArgs, IpcArgs};
use crate::document::SavePolicy;
use crate::edit;
use crate::store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "kebab-case")]
pub enum IpcMessage {
    /// Host pushes a whole document to edit.
    LoadBookData(Value),
    /// Host asks for the current document; answered with `SaveBookData`.
    RequestBookData(BookRequest),
    SaveBookData(BookPayload),
    OpenAiPanel,
    Saved(Saved),
    Error(ErrorReply),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    #[serde(default)]
    pub save_as: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPayload {
    pub book: Value,
    #[serde(default)]
    pub save_as: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Saved {
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub message: String,
}

pub struct IpcSession {
    doc: SharedDocument,
}

impl IpcSession {
    pub fn new(doc: SharedDocument) -> Self {
        Self { doc }
    }

    /// Handles one request line. Malformed input becomes an `Error` reply
    /// rather than ending the session.
    pub async fn handle_line(&self, line: &str) -> Option<IpcMessage> {
        let message = match serde_json::from_str::<IpcMessage>(line) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "malformed ipc message");
                return Some(error_reply(format!("malformed message: {err}")));
            }
        };

        match self.dispatch(message).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(?err, "ipc request failed");
                Some(error_reply(format!("{err:#}")))
            }
        }
    }

    async fn dispatch(&self, message: IpcMessage) -> anyhow::Result<Option<IpcMessage>> {
        match message {
            IpcMessage::LoadBookData(value) => {
                let (book, _) = store::book_from_value(value).context("load-book-data")?;
                tracing::info!(title = %book.title, "host loaded book");
                self.doc.lock().await.replace_book(book)?;
                Ok(None)
            }
            IpcMessage::RequestBookData(request) => {
                let doc = self.doc.lock().await;
                let book = serde_json::to_value(doc.book()).context("serialize book")?;
                Ok(Some(IpcMessage::SaveBookData(BookPayload {
                    book,
                    save_as: request.save_as,
                    path: None,
                })))
            }
            IpcMessage::SaveBookData(payload) => {
                let (book, _) = store::book_from_value(payload.book).context("save-book-data")?;
                let mut doc = self.doc.lock().await;
                if payload.save_as {
                    let path = payload
                        .path
                        .ok_or_else(|| anyhow::anyhow!("save-book-data: saveAs requires a path"))?;
                    doc.replace_book(book)?;
                    doc.save_as(&path)?;
                } else {
                    doc.replace_book(book)?;
                    doc.save_now()?;
                }
                Ok(Some(IpcMessage::Saved(Saved {
                    location: doc.location(),
                })))
            }
            IpcMessage::OpenAiPanel => Ok(Some(IpcMessage::OpenAiPanel)),
            IpcMessage::Saved(_) | IpcMessage::Error(_) => {
                anyhow::bail!("unexpected host-bound message")
            }
        }
    }

    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.context("read ipc line")? {
            if line.trim().is_empty() {
                continue;
            }
            let Some(reply) = self.handle_line(&line).await else {
                continue;
            };
            let mut out = serde_json::to_vec(&reply).context("serialize ipc reply")?;
            out.push(b'\n');
            writer.write_all(&out).await.context("write ipc reply")?;
            writer.flush().await.context("flush ipc reply")?;
        }
        Ok(())
    }
}

fn error_reply(message: String) -> IpcMessage {
    IpcMessage::Error(ErrorReply { message })
}

pub async fn run(book_args: &BookArgs, args: IpcArgs) -> anyhow::Result<()> {
    let doc = edit::open_document(book_args)?.with_policy(SavePolicy::Deferred);
    tracing::info!(location = %doc.location(), autosave_ms = args.autosave_ms, "ipc session started");
    let doc: SharedDocument = Arc::new(Mutex::new(doc));

    let autosave = Autosave::spawn(Arc::clone(&doc), Duration::from_millis(args.autosave_ms));
    let session = IpcSession::new(Arc::clone(&doc));
    let served = session
        .serve(tokio::io::BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await;
    autosave.stop().await;

    let saved = doc.lock().await.flush().context("final save")?;
    tracing::info!(saved, "ipc session ended");
    served
}
