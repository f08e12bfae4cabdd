//! Terminal activity indicator.
//!
//! Each accepted mouse event advances a one-character spinner in place on
//! stdout, so an operator can see traffic without turning on debug logs.

use std::{
    io::Write,
    sync::atomic::{AtomicUsize, Ordering},
};

const SYMBOLS: [char; 4] = ['-', '\\', '|', '/'];

#[derive(Debug, Default)]
pub struct Spinner {
    position: AtomicUsize,
}

impl Spinner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the symbol for the next tick and advances.
    pub fn advance(&self) -> char {
        let i = self.position.fetch_add(1, Ordering::Relaxed);
        SYMBOLS[i % SYMBOLS.len()]
    }

    /// Replaces the previous symbol on the terminal with the next one.
    pub fn tick(&self) {
        let symbol = self.advance();
        let mut out = std::io::stdout().lock();
        // Cursor one left, erase to end of line.
        let _ = write!(out, "\x1b[1D\x1b[K{symbol}");
        let _ = out.flush();
    }
}
