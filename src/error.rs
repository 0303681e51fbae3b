//! Error kinds raised by the scheduler (§7 of the design).
//!
//! Every variant carries a [`Location`] describing where in the
//! timeline/sequence/clip hierarchy the failure occurred. The location
//! is attached at the call site with [`StagehandError::with_location`]
//! rather than folded into the variant, so the error surface stays one
//! variant per failure *kind*, not per context combination.

use std::fmt;

/// Where in the hierarchy an error occurred, for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Location {
    /// Name of the owning timeline, if the clip/sequence has one.
    pub timeline_name: Option<String>,
    /// 1-based step number (`loadedSeqIndex + 1`) at the time of failure.
    pub step_number: Option<u32>,
    /// Index, tag, and description of the owning sequence.
    pub sequence: Option<SequenceContext>,
    /// Category, effect name, and target element tag of the clip.
    pub clip: Option<ClipContext>,
}

/// Sequence-level context appended to an error.
#[derive(Debug, Clone)]
pub struct SequenceContext {
    /// Index of the sequence within its timeline.
    pub index: usize,
    /// The sequence's searchable tag, if any.
    pub tag: Option<String>,
    /// The sequence's author-supplied description, if any.
    pub description: Option<String>,
}

/// Clip-level context appended to an error.
#[derive(Debug, Clone)]
pub struct ClipContext {
    /// The clip's category, rendered as a short name (`"Entrance"`, ...).
    pub category: &'static str,
    /// The effect name passed to the clip factory.
    pub effect_name: String,
    /// The target element's opening tag, e.g. `"<div class=\"box\">"`.
    pub element_tag: Option<String>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        let mut sep = |f: &mut fmt::Formatter<'_>, wrote: &mut bool| -> fmt::Result {
            if *wrote {
                write!(f, ", ")?;
            }
            *wrote = true;
            Ok(())
        };
        if let Some(name) = &self.timeline_name {
            sep(f, &mut wrote)?;
            write!(f, "timeline \"{name}\"")?;
        }
        if let Some(step) = self.step_number {
            sep(f, &mut wrote)?;
            write!(f, "step {step}")?;
        }
        if let Some(seq) = &self.sequence {
            sep(f, &mut wrote)?;
            write!(f, "sequence[{}]", seq.index)?;
            if let Some(tag) = &seq.tag {
                write!(f, " tag=\"{tag}\"")?;
            }
            if let Some(desc) = &seq.description {
                write!(f, " \"{desc}\"")?;
            }
        }
        if let Some(clip) = &self.clip {
            sep(f, &mut wrote)?;
            write!(f, "{} clip \"{}\"", clip.category, clip.effect_name)?;
            if let Some(tag) = &clip.element_tag {
                write!(f, " on {tag}")?;
            }
        }
        if !wrote {
            write!(f, "(no location)")?;
        }
        Ok(())
    }
}

/// All scheduler-raised error kinds (§7).
#[derive(Debug, thiserror::Error)]
pub enum StagehandError {
    /// A clip factory or connector was given a null, missing, or
    /// wrong-subtype element.
    #[error("invalid element at {location}: {reason}")]
    InvalidElement {
        /// Human-readable explanation.
        reason: String,
        /// Where this happened.
        location: Location,
    },

    /// An `EntranceClip` targeted an element that was not recognized as
    /// hidden by one of the configured hiding classes.
    #[error("invalid entrance attempt at {location}: {reason}")]
    InvalidEntranceAttempt {
        /// Human-readable explanation.
        reason: String,
        /// Where this happened.
        location: Location,
    },

    /// An `ExitClip` targeted an element that was already hidden.
    #[error("invalid exit attempt at {location}: {reason}")]
    InvalidExitAttempt {
        /// Human-readable explanation.
        reason: String,
        /// Where this happened.
        location: Location,
    },

    /// A `TimePosition` literal resolved outside its phase's length.
    #[error("invalid phase position at {location}: {reason}")]
    InvalidPhasePosition {
        /// Human-readable explanation.
        reason: String,
        /// Where this happened.
        location: Location,
    },

    /// Structural mutation attempted on a timeline that is animating or
    /// mid-jump.
    #[error("locked operation at {location}: {reason}")]
    LockedOperation {
        /// Human-readable explanation.
        reason: String,
        /// Where this happened.
        location: Location,
    },

    /// Insertion/removal strictly behind `loadedSeqIndex`.
    #[error("time paradox at {location}: {reason}")]
    TimeParadox {
        /// Human-readable explanation.
        reason: String,
        /// Where this happened.
        location: Location,
    },

    /// `play`/`rewind`/`pause`/`unpause`/`finish` called directly on a
    /// clip that is owned by a sequence.
    #[error("child playback error at {location}: clip is owned by a sequence; use the sequence's playback methods")]
    ChildPlaybackError {
        /// Where this happened.
        location: Location,
    },

    /// A sequence was added to a timeline while already parented, or
    /// while in a forward-finished state that forbids re-adding.
    #[error("invalid child at {location}: {reason}")]
    InvalidChild {
        /// Human-readable explanation.
        reason: String,
        /// Where this happened.
        location: Location,
    },

    /// Committing computed styles failed, and forceful commit was
    /// either disabled or also failed.
    #[error("commit styles failed at {location}: {reason}")]
    CommitStyles {
        /// Human-readable explanation.
        reason: String,
        /// Where this happened.
        location: Location,
    },

    /// A tag search (`jumpToSequenceTag`) found no matching sequence.
    #[error("tag not found at {location}: {reason}")]
    TagNotFound {
        /// Human-readable explanation.
        reason: String,
        /// Where this happened.
        location: Location,
    },

    /// A jump or step target index was out of the timeline's bounds.
    #[error("position out of bounds at {location}: {reason}")]
    PositionOutOfBounds {
        /// Human-readable explanation.
        reason: String,
        /// Where this happened.
        location: Location,
    },

    /// An effect generator bank had no entry for the requested category
    /// and effect name.
    #[error("unknown effect at {location}: {reason}")]
    UnknownEffect {
        /// Human-readable explanation.
        reason: String,
        /// Where this happened.
        location: Location,
    },
}

impl StagehandError {
    /// Attaches (overwriting) the location on an existing error.
    pub fn with_location(mut self, location: Location) -> Self {
        let slot = match &mut self {
            StagehandError::InvalidElement { location, .. }
            | StagehandError::InvalidEntranceAttempt { location, .. }
            | StagehandError::InvalidExitAttempt { location, .. }
            | StagehandError::InvalidPhasePosition { location, .. }
            | StagehandError::LockedOperation { location, .. }
            | StagehandError::TimeParadox { location, .. }
            | StagehandError::ChildPlaybackError { location }
            | StagehandError::InvalidChild { location, .. }
            | StagehandError::CommitStyles { location, .. }
            | StagehandError::TagNotFound { location, .. }
            | StagehandError::PositionOutOfBounds { location, .. }
            | StagehandError::UnknownEffect { location, .. } => location,
        };
        *slot = location;
        self
    }

    /// The location attached to this error, if any content was ever set.
    pub fn location(&self) -> &Location {
        match self {
            StagehandError::InvalidElement { location, .. }
            | StagehandError::InvalidEntranceAttempt { location, .. }
            | StagehandError::InvalidExitAttempt { location, .. }
            | StagehandError::InvalidPhasePosition { location, .. }
            | StagehandError::LockedOperation { location, .. }
            | StagehandError::TimeParadox { location, .. }
            | StagehandError::ChildPlaybackError { location }
            | StagehandError::InvalidChild { location, .. }
            | StagehandError::CommitStyles { location, .. }
            | StagehandError::TagNotFound { location, .. }
            | StagehandError::PositionOutOfBounds { location, .. }
            | StagehandError::UnknownEffect { location, .. } => location,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StagehandError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn location_display_joins_present_fields() {
        let loc = Location {
            timeline_name: Some("main".into()),
            step_number: Some(3),
            sequence: None,
            clip: None,
        };
        assert_eq!(loc.to_string(), "timeline \"main\", step 3");
    }

    #[test]
    fn location_display_empty() {
        assert_eq!(Location::default().to_string(), "(no location)");
    }

    #[test]
    fn with_location_overwrites() {
        let err = StagehandError::TagNotFound {
            reason: "no sequence tagged 'intro'".into(),
            location: Location::default(),
        }
        .with_location(Location {
            timeline_name: Some("main".into()),
            ..Default::default()
        });
        assert_eq!(err.location().timeline_name.as_deref(), Some("main"));
    }
}
