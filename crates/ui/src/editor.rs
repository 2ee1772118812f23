//! Inline text editor.
//!
//! At most one word (or region label) is edited at a time. Opening an edit
//! commits the previous one. While an edit is open the edited scene object
//! is hidden and the host shows [`EditSession::element`] in its place.

use crate::word_object::{small_caps_spans, TextElement, TextSpan};
use ocr_canvas_core::{normalize_edit, LayoutBoxId, WordId};

/// What an edit writes back to.
#[derive(Debug, Clone, PartialEq)]
pub enum EditTarget {
    Word { page: usize, id: WordId },
    /// Priority label of an order region
    RegionLabel { page: usize, region: LayoutBoxId },
}

impl EditTarget {
    pub fn page(&self) -> usize {
        match self {
            EditTarget::Word { page, .. } | EditTarget::RegionLabel { page, .. } => *page,
        }
    }
}

/// An open edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub target: EditTarget,
    /// Editable element positioned over the hidden object
    pub element: TextElement,
    /// Cursor position in characters
    pub cursor: usize,
    small_caps_size: f64,
}

impl EditSession {
    pub fn text(&self) -> String {
        self.element.text()
    }
}

/// Result of committing an edit.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// `text` is `None` when the edit normalized to nothing and was rejected
    Word {
        page: usize,
        id: WordId,
        text: Option<String>,
    },
    /// `priority` is `None` when the label did not parse as an integer
    RegionPriority {
        page: usize,
        region: LayoutBoxId,
        priority: Option<i64>,
    },
}

/// Holder of the single active edit.
#[derive(Debug, Clone, Default)]
pub struct InlineEditor {
    session: Option<EditSession>,
    smart_quotes: bool,
}

impl InlineEditor {
    pub fn new(smart_quotes: bool) -> Self {
        Self {
            session: None,
            smart_quotes,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn target(&self) -> Option<&EditTarget> {
        self.session.as_ref().map(|s| &s.target)
    }

    /// `true` when `id` is the word being edited.
    pub fn is_editing_word(&self, id: &WordId) -> bool {
        matches!(self.target(), Some(EditTarget::Word { id: edited, .. }) if edited == id)
    }

    /// Start editing `target` with `element` as the editable field.
    ///
    /// `cursor` of `None` places the cursor at the end. Any edit already open
    /// is committed first and its outcome returned.
    pub fn open(
        &mut self,
        target: EditTarget,
        element: TextElement,
        cursor: Option<usize>,
        small_caps_mult: f64,
    ) -> Option<EditOutcome> {
        let previous = self.commit();
        let len = element.text().chars().count();
        let cursor = cursor.map_or(len, |c| c.min(len));
        let small_caps_size = element.font_size * small_caps_mult;
        log::debug!("editing {:?} at {}", target, cursor);
        self.session = Some(EditSession {
            target,
            element,
            cursor,
            small_caps_size,
        });
        previous
    }

    /// Replace the field's content, dropping any formatting.
    ///
    /// Small caps fields are re-split into size runs.
    pub fn set_text(&mut self, text: &str, cursor: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let element = &mut session.element;
        element.spans = if element.uppercase {
            small_caps_spans(text, element.font_size, session.small_caps_size)
        } else {
            vec![TextSpan {
                text: text.to_string(),
                font_size: element.font_size,
            }]
        };
        session.cursor = cursor.min(text.chars().count());
    }

    /// Close the edit and report what to write back.
    pub fn commit(&mut self) -> Option<EditOutcome> {
        let session = self.session.take()?;
        let raw = session.text();
        let outcome = match session.target {
            EditTarget::Word { page, id } => {
                let text = normalize_edit(&raw, self.smart_quotes);
                if text.is_none() {
                    log::warn!("rejected empty edit of word {}", id);
                }
                EditOutcome::Word { page, id, text }
            }
            EditTarget::RegionLabel { page, region } => {
                let priority = raw.trim().parse::<i64>().ok();
                if priority.is_none() {
                    log::warn!("ignoring non-numeric region priority {:?}", raw);
                }
                EditOutcome::RegionPriority {
                    page,
                    region,
                    priority,
                }
            }
        };
        Some(outcome)
    }

    /// Close the edit without writing anything back.
    pub fn cancel(&mut self) -> Option<EditTarget> {
        self.session.take().map(|s| s.target)
    }
}
