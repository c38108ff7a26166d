//! Pointer navigation over the filtered section views.
//!
//! The pointer's meaning depends on the questionnaire's display mode:
//! (section, question) in single-question mode, section only in
//! section-wise mode, unused in all-at-once mode. Every function here
//! clamps its input first, so a pointer left dangling by an answer
//! mutation that shrank the visible set can never escape or panic.

use serde::{Deserialize, Serialize};

use crate::visibility::SectionView;

// ---------------------------------------------------------------------------
// Display modes
// ---------------------------------------------------------------------------

/// Questionnaire-level rendering mode. Fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// One question at a time.
    Single,
    /// One section at a time.
    Section,
    /// Everything in one flat scroll; submission is the only forward
    /// action.
    #[default]
    All,
}

impl DisplayMode {
    /// Wire name, matching the builder's `display_mode` setting.
    pub fn name(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Section => "section",
            Self::All => "all",
        }
    }
}

// ---------------------------------------------------------------------------
// Pointer
// ---------------------------------------------------------------------------

/// Current position in the visible set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pointer {
    pub section: usize,
    pub question: usize,
}

impl Pointer {
    pub fn new(section: usize, question: usize) -> Self {
        Self { section, question }
    }
}

/// Result of a navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    Moved(Pointer),
    /// Forward movement exhausted the visible set.
    ReadyToSubmit,
    /// Backward movement from the first visible question.
    AtStart,
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Advance the pointer. Empty sections are skipped in both stepping
/// modes; in all-at-once mode the only forward action is submission.
pub fn advance(mode: DisplayMode, pointer: Pointer, views: &[SectionView<'_>]) -> NavOutcome {
    let pointer = clamp(pointer, views);
    match mode {
        DisplayMode::All => NavOutcome::ReadyToSubmit,
        DisplayMode::Section => match next_nonempty(views, pointer.section) {
            Some(section) => NavOutcome::Moved(Pointer::new(section, 0)),
            None => NavOutcome::ReadyToSubmit,
        },
        DisplayMode::Single => {
            let in_section = views
                .get(pointer.section)
                .map(|v| v.questions.len())
                .unwrap_or(0);
            if pointer.question + 1 < in_section {
                return NavOutcome::Moved(Pointer::new(pointer.section, pointer.question + 1));
            }
            match next_nonempty(views, pointer.section) {
                Some(section) => NavOutcome::Moved(Pointer::new(section, 0)),
                None => NavOutcome::ReadyToSubmit,
            }
        }
    }
}

/// Mirror of [`advance`]: step backward, landing on the previous
/// section's last visible question when crossing a boundary.
pub fn retreat(mode: DisplayMode, pointer: Pointer, views: &[SectionView<'_>]) -> NavOutcome {
    let pointer = clamp(pointer, views);
    match mode {
        DisplayMode::All => NavOutcome::AtStart,
        DisplayMode::Section => match prev_nonempty(views, pointer.section) {
            Some(section) => NavOutcome::Moved(Pointer::new(section, 0)),
            None => NavOutcome::AtStart,
        },
        DisplayMode::Single => {
            if pointer.question > 0 {
                return NavOutcome::Moved(Pointer::new(pointer.section, pointer.question - 1));
            }
            match prev_nonempty(views, pointer.section) {
                Some(section) => {
                    let last = views[section].questions.len() - 1;
                    NavOutcome::Moved(Pointer::new(section, last))
                }
                None => NavOutcome::AtStart,
            }
        }
    }
}

/// Clamp a pointer to the nearest valid position in `views`.
///
/// Preference order when the pointed-at section is empty or gone: the
/// next non-empty section (what the participant would see next), then
/// the previous one. With nothing visible at all the pointer rests at
/// the origin.
pub fn clamp(pointer: Pointer, views: &[SectionView<'_>]) -> Pointer {
    if views.is_empty() {
        return Pointer::default();
    }
    let section = pointer.section.min(views.len() - 1);

    if !views[section].is_empty() {
        let question = pointer.question.min(views[section].questions.len() - 1);
        return Pointer::new(section, question);
    }

    if let Some(next) = next_nonempty(views, section) {
        return Pointer::new(next, 0);
    }
    if let Some(prev) = prev_nonempty(views, section) {
        let last = views[prev].questions.len() - 1;
        return Pointer::new(prev, last);
    }
    Pointer::default()
}

/// Section-level progress as a display percentage (1-based, matching the
/// "Section x of y" banner).
pub fn section_progress_percent(pointer: Pointer, views: &[SectionView<'_>]) -> u32 {
    if views.is_empty() {
        return 100;
    }
    let current = pointer.section.min(views.len() - 1) + 1;
    ((current as f64 / views.len() as f64) * 100.0).round() as u32
}

fn next_nonempty(views: &[SectionView<'_>], after: usize) -> Option<usize> {
    views
        .iter()
        .enumerate()
        .skip(after + 1)
        .find(|(_, v)| !v.is_empty())
        .map(|(i, _)| i)
}

fn prev_nonempty(views: &[SectionView<'_>], before: usize) -> Option<usize> {
    views[..before]
        .iter()
        .enumerate()
        .rev()
        .find(|(_, v)| !v.is_empty())
        .map(|(i, _)| i)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
