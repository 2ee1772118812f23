//! Selectable text overlay.
//!
//! The overlay mirrors every drawn word with a positioned [`TextElement`] so
//! the host can offer native text selection and copy. It is torn down at
//! the start of any pan or zoom and rebuilt once the viewport has been
//! quiet for the configured delay.
//!
//! Rebuilds are generation-stamped: scheduling hands out an
//! [`OverlayTicket`] carrying the current generation, and a later schedule
//! makes every earlier ticket stale. The host drives time by calling
//! [`TextOverlayBridge::take_due`] from its event loop.

use crate::word_object::TextElement;
use ocr_canvas_core::{Document, WordId};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// A scheduled overlay rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayTicket {
    pub generation: u64,
    pub due: Instant,
}

/// Owner of the overlay elements and the deferred rebuild.
#[derive(Debug, Clone)]
pub struct TextOverlayBridge {
    delay: Duration,
    generation: u64,
    pending: Option<OverlayTicket>,
    elements: Vec<TextElement>,
}

impl TextOverlayBridge {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            pending: None,
            elements: Vec::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn elements(&self) -> &[TextElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Remove every overlay element. Pending rebuilds stay scheduled.
    pub fn delete(&mut self) {
        self.elements.clear();
    }

    /// Replace the overlay with freshly built elements.
    pub fn install(&mut self, elements: Vec<TextElement>) {
        self.elements = elements;
    }

    /// Schedule a rebuild `delay` after `now`, superseding earlier ones.
    pub fn schedule(&mut self, now: Instant) -> OverlayTicket {
        self.generation += 1;
        let ticket = OverlayTicket {
            generation: self.generation,
            due: now + self.delay,
        };
        self.pending = Some(ticket);
        ticket
    }

    /// `true` when `ticket` is the latest one and the overlay is empty.
    pub fn should_run(&self, ticket: &OverlayTicket) -> bool {
        ticket.generation == self.generation && self.elements.is_empty()
    }

    /// The pending ticket if its time has come.
    ///
    /// The ticket is consumed either way once due; a stale or redundant
    /// ticket yields `None`.
    pub fn take_due(&mut self, now: Instant) -> Option<OverlayTicket> {
        let ticket = self.pending?;
        if now < ticket.due {
            return None;
        }
        self.pending = None;
        if self.should_run(&ticket) {
            Some(ticket)
        } else {
            log::trace!("dropping stale overlay ticket {}", ticket.generation);
            None
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Plain text of the words in `ids` on `pages`.
///
/// Words are joined by spaces, lines by newlines and pages by a blank
/// line. Pages are visited in ascending order; lines and pages without a
/// selected word are skipped.
pub fn copy_text(doc: &Document, pages: &[usize], ids: &HashSet<WordId>) -> String {
    let mut pages = pages.to_vec();
    pages.sort_unstable();
    pages.dedup();

    let mut page_texts = Vec::new();
    for n in pages {
        let Some(page) = doc.page(n) else {
            continue;
        };
        let lines: Vec<String> = page
            .lines
            .iter()
            .map(|line| {
                line.words
                    .iter()
                    .filter(|w| ids.contains(&w.id))
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|text| !text.is_empty())
            .collect();
        if !lines.is_empty() {
            page_texts.push(lines.join("\n"));
        }
    }
    page_texts.join("\n\n")
}
