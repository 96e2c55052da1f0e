//! Line-oriented progress printer
//!
//! Every change to a status line is written as one line, so the output reads
//! well both on a terminal and when redirected to a file. Progress goes to
//! stderr by default; stdout is reserved for the report.

use super::{Progress, ProgressBoard, ProgressItem};
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

pub struct ConsolePrinter<W: Write + Send = io::Stderr> {
    board: Mutex<ProgressBoard>,
    out: Mutex<W>,
    ended: AtomicBool,
}

impl ConsolePrinter<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> ConsolePrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            board: Mutex::new(ProgressBoard::new()),
            out: Mutex::new(out),
            ended: AtomicBool::new(false),
        }
    }

    /// Current state of every line, one per row
    pub fn render(&self) -> String {
        self.board()
            .items()
            .iter()
            .map(format_item)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn board(&self) -> MutexGuard<'_, ProgressBoard> {
        self.board.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write_line(&self, line: &str) {
        if self.ended.load(Ordering::Relaxed) {
            return;
        }
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            debug!(error = %e, "Failed to write progress line");
        }
    }
}

fn format_item(item: &ProgressItem) -> String {
    match (item.is_done, item.hide_checkmark) {
        (true, true) => item.content.clone(),
        (true, false) => format!("✅ {}", item.content),
        (false, _) => format!("⏳ {}", item.content),
    }
}

#[async_trait]
impl<W: Write + Send> Progress for ConsolePrinter<W> {
    async fn update_item(&self, id: &str, content: &str, is_done: bool, hide_checkmark: bool) {
        if self.ended.load(Ordering::Relaxed) {
            return;
        }
        let line = {
            let mut board = self.board();
            if !board.upsert(id, content, is_done, hide_checkmark) {
                return;
            }
            board.get(id).map(format_item)
        };
        if let Some(line) = line {
            self.write_line(&line);
        }
    }

    async fn mark_item_done(&self, id: &str) {
        let line = {
            let mut board = self.board();
            let already_done = board.get(id).map(|item| item.is_done).unwrap_or(true);
            if already_done {
                return;
            }
            board.mark_done(id).map(format_item)
        };
        if let Some(line) = line {
            self.write_line(&line);
        }
    }

    async fn end(&self) {
        self.ended.store(true, Ordering::Relaxed);
    }
}
