use std::path::Path;

use crate::codec::MetaKind;
use crate::transform::{Edit, NoteLength, Pipeline};

/// One filename-driven rule. Absent parameters contribute no edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    /// Lowercase keywords; the rule matches when any is a substring of the
    /// lowercased file name.
    pub filename_contains: Vec<String>,
    pub transpose_semitones: Option<i32>,
    pub track_name: Option<String>,
    pub max_note_length: Option<NoteLength>,
}

impl Rule {
    pub fn matches(&self, file_name_lower: &str) -> bool {
        self.filename_contains
            .iter()
            .any(|keyword| !keyword.is_empty() && file_name_lower.contains(keyword.as_str()))
    }

    fn push_transpose(&self, edits: &mut Vec<Edit>) {
        if let Some(semitones) = self.transpose_semitones {
            edits.push(Edit::Transpose(semitones));
        }
    }

    fn push_track_name(&self, edits: &mut Vec<Edit>) {
        if let Some(name) = &self.track_name {
            edits.push(Edit::SetTrackName(name.clone()));
        }
    }

    fn push_cap(&self, edits: &mut Vec<Edit>) {
        if let Some(length) = self.max_note_length {
            edits.push(Edit::CapNoteLength(length));
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalRules {
    pub strip_to_notes: bool,
    pub force_channel_zero: bool,
    /// Meta kinds that survive note stripping.
    pub strip_keep_meta: Vec<MetaKind>,
}

/// Which named rules governed a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Matched {
    pub bass: bool,
    pub drums: bool,
    pub wildcard: bool,
}

/// Validated, immutable transformation rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub global: GlobalRules,
    pub bass: Rule,
    pub drums: Rule,
    pub wildcard: Option<Rule>,
}

impl RuleSet {
    /// Works out which rules govern `path`, judged by its bare file name.
    pub fn matched(&self, path: &Path) -> Matched {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let bass = self.bass.matches(&name);
        let drums = self.drums.matches(&name);
        Matched {
            bass,
            drums,
            wildcard: !bass && !drums && self.wildcard.is_some(),
        }
    }

    /// Assembles the edits for `path` in their fixed order.
    pub fn select(&self, path: &Path) -> Pipeline {
        let matched = self.matched(path);
        let mut edits = Vec::new();

        if self.global.strip_to_notes {
            edits.push(Edit::StripToNotes {
                keep_meta: self.global.strip_keep_meta.clone(),
            });
        }
        if matched.bass {
            self.bass.push_transpose(&mut edits);
            self.bass.push_track_name(&mut edits);
        }
        if matched.drums {
            self.drums.push_cap(&mut edits);
            self.drums.push_track_name(&mut edits);
        }
        if let Some(wildcard) = self.wildcard.as_ref().filter(|_| matched.wildcard) {
            wildcard.push_transpose(&mut edits);
            wildcard.push_track_name(&mut edits);
            wildcard.push_cap(&mut edits);
        }
        if self.global.force_channel_zero {
            edits.push(Edit::ForceChannelZero);
        }

        Pipeline::new(edits)
    }
}
