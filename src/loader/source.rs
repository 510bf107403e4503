//! Backend and tag selection for match-history loads.

use crate::backend::ServerCapabilities;
use crate::config::OngoingGameSettings;
use crate::models::{DataSource, TagFilter, TagPreference};

/// Where a match-history load goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDecision {
    UsePrimary,
    UseAuxiliary { tag: TagFilter },
}

impl SourceDecision {
    pub fn source(&self) -> DataSource {
        match self {
            SourceDecision::UsePrimary => DataSource::Primary,
            SourceDecision::UseAuxiliary { .. } => DataSource::Auxiliary,
        }
    }

    /// Tag recorded on the resulting entry.
    pub fn tag(&self) -> Option<TagFilter> {
        match self {
            SourceDecision::UsePrimary => None,
            SourceDecision::UseAuxiliary { tag } => Some(*tag),
        }
    }
}

/// A source decision plus the active tag it implies, if it implies one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSelection {
    pub decision: SourceDecision,
    pub active_tag: Option<TagFilter>,
}

/// Resolve the tag for an auxiliary query.
///
/// Returns the tag to query with and the new active tag, `None` meaning
/// the active tag stays as it is.
pub fn resolve_tag(
    requested: Option<TagFilter>,
    preference: TagPreference,
    queue_id: Option<i64>,
) -> (TagFilter, Option<TagFilter>) {
    match requested {
        None | Some(TagFilter::All) => match preference {
            TagPreference::All => (TagFilter::All, Some(TagFilter::All)),
            TagPreference::Current => match queue_id.map(TagFilter::Queue) {
                Some(tag) if tag.is_safe() => (tag, Some(tag)),
                _ => (TagFilter::All, None),
            },
        },
        Some(tag) if tag.is_safe() => (tag, Some(tag)),
        Some(_) => (TagFilter::All, Some(TagFilter::All)),
    }
}

/// Pick the backend for match history.
///
/// `capabilities` is `None` when the active server is not known yet.
pub fn select_source(
    settings: &OngoingGameSettings,
    capabilities: Option<ServerCapabilities>,
    requested: Option<TagFilter>,
    queue_id: Option<i64>,
) -> SourceSelection {
    let supported = capabilities.map(|c| c.match_history).unwrap_or(false);
    if !settings.use_auxiliary_backend || !supported {
        return SourceSelection {
            decision: SourceDecision::UsePrimary,
            active_tag: None,
        };
    }

    let (tag, active_tag) = resolve_tag(requested, settings.tag_preference, queue_id);
    SourceSelection {
        decision: SourceDecision::UseAuxiliary { tag },
        active_tag,
    }
}
