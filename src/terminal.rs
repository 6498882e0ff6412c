//! The terminal adapter: a thin line editor layered over one SSH session channel.
//!
//! Per the scope note in `SPEC_FULL.md` §1, genuine line editing (history, cursor movement,
//! rendering) belongs to an external terminal library; no such crate exists for the SSH-channel
//! case in this ecosystem, so this module plays that role, kept intentionally minimal: it only
//! implements the contract the rest of the core needs (blocking read-a-line, write-line, resize,
//! set-prompt, install-completer), grounded in the same raw byte handling (backspace, control
//! characters, echo) used elsewhere in this corpus for channel-level input.

use std::sync::Arc;

use russh::server::Msg;
use russh::Channel;
use tokio::sync::mpsc;

use crate::error::SessionError;

pub type Completer = Box<dyn Fn(&str, usize) -> Option<(String, usize)> + Send>;

/// One line-editing session over a single SSH channel.
pub struct Terminal {
    channel: Arc<Channel<Msg>>,
    input_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    buffer: String,
    prompt: String,
    completer: Option<Completer>,
}

impl Terminal {
    pub fn new(channel: Arc<Channel<Msg>>, input_rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Terminal {
        Terminal {
            channel,
            input_rx,
            buffer: String::new(),
            prompt: String::new(),
            completer: None,
        }
    }

    pub fn install_completer(&mut self, completer: Completer) {
        self.completer = Some(completer);
    }

    /// Sets the prompt shown before each line and immediately redraws it.
    pub async fn set_prompt(&mut self, prompt: String) -> Result<(), SessionError> {
        self.prompt = prompt;
        self.write_raw(format!("\r\n{}", self.prompt).as_bytes()).await
    }

    pub async fn resize(&mut self, _width: u16, _height: u16) {
        // Wrapping/redraw geometry is an adapter-internal concern; this minimal adapter does not
        // wrap lines, so there is nothing further to do.
    }

    /// Writes one line to the client, followed by CRLF.
    pub async fn write_line(&mut self, line: &str) -> Result<(), SessionError> {
        self.write_raw(format!("{}\r\n", line).as_bytes()).await
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        self.channel.data(bytes).await.map_err(SessionError::Transport)
    }

    /// Reads one line of input, echoing keystrokes and handling backspace and Tab as it goes.
    /// Returns `None` on EOF/disconnect.
    pub async fn read_line(&mut self) -> Result<Option<String>, SessionError> {
        loop {
            let chunk = match self.input_rx.recv().await {
                Some(chunk) => chunk,
                None => return Ok(None),
            };
            for &byte in &chunk {
                match byte {
                    b'\r' | b'\n' => {
                        let line = std::mem::take(&mut self.buffer);
                        self.write_raw(format!("\r\n{}", self.prompt).as_bytes()).await?;
                        return Ok(Some(line));
                    }
                    0x03 => {
                        // Ctrl+C: treat like a disconnect, same as the original service does.
                        return Ok(None);
                    }
                    0x7f | 0x08 => {
                        if self.buffer.pop().is_some() {
                            self.write_raw(b"\x08 \x08").await?;
                        }
                    }
                    0x09 => self.handle_tab().await?,
                    c if (c as char).is_ascii() && !(c as char).is_ascii_control() => {
                        self.buffer.push(c as char);
                        self.write_raw(&[c]).await?;
                    }
                    _ => {} // other control bytes are ignored by this minimal adapter
                }
            }
        }
    }

    async fn handle_tab(&mut self) -> Result<(), SessionError> {
        let cursor = self.buffer.len();
        let replacement = match &self.completer {
            Some(completer) => completer(&self.buffer, cursor),
            None => None,
        };
        if let Some((new_line, new_cursor)) = replacement {
            // Erase the old buffer on the client's screen, then print the replacement.
            let erase = "\x08 \x08".repeat(self.buffer.len());
            self.buffer = new_line;
            let _ = new_cursor; // this adapter always leaves the cursor at end-of-line
            let redraw = self.buffer.clone();
            self.write_raw(format!("{}{}", erase, redraw).as_bytes()).await?;
        }
        Ok(())
    }
}
