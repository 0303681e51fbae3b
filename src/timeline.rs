//! Orders sequences; exposes step/jump, playback control, and
//! playback-rate broadcast (§4.4).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use regex::Regex;

use crate::error::{Location, Result, StagehandError};
use crate::host::{ElementHandle, Host, PlaybackDirection};
use crate::ids::TimelineId;
use crate::sequence::AnimSequence;

/// A sequence's searchable tag (§3 `tag`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceTag(pub String);

/// How a tag search walks the sequence list from its starting point
/// (§4.4 "Jump").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    /// Walk forward from `loadedSeqIndex`.
    Forward,
    /// Walk backward from `loadedSeqIndex`.
    Backward,
    /// Walk forward starting at index 0.
    ForwardFromBeginning,
    /// Walk backward starting at the last index.
    BackwardFromEnd,
}

/// A tag match strategy for [`AnimTimeline::jump_to_tag`].
#[derive(Debug, Clone)]
pub enum TagQuery {
    /// The tag must equal this string exactly.
    Exact(String),
    /// The tag must match this pattern.
    Regex(Regex),
}

impl TagQuery {
    fn matches(&self, tag: &str) -> bool {
        match self {
            TagQuery::Exact(s) => s == tag,
            TagQuery::Regex(re) => re.is_match(tag),
        }
    }
}

/// A jump target expressed positionally rather than by tag (§4.4 "Jump").
#[derive(Debug, Clone, Copy)]
pub enum JumpPosition {
    /// The first sequence.
    Beginning,
    /// The last sequence.
    End,
    /// A specific 0-based index.
    Index(usize),
}

/// `autoplayDetection` — which direction's autoplay flags are consulted
/// while a jump is still stepping toward its target (§4.4 "Jump").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoplayDetection {
    /// Stop exactly at the jump target.
    #[default]
    None,
    /// Keep stepping forward while forward autoplay flags hold.
    Forward,
    /// Keep stepping backward while backward autoplay flags hold.
    Backward,
}

/// Which purpose a linked playback button serves (§6 "Playback-button
/// contract").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonPurpose {
    /// Steps the timeline forward.
    StepForward,
    /// Steps the timeline backward.
    StepBackward,
    /// Toggles pause.
    Pause,
    /// Temporarily raises the playback rate.
    FastForward,
    /// Toggles skipping.
    ToggleSkipping,
}

/// The external playback-button contract (§6, consumed not rendered).
pub trait PlaybackButton: std::fmt::Debug {
    /// The button's backing element, used for `activate`/`deactivate`
    /// style application.
    fn element(&self) -> ElementHandle;
    /// Applies the "active" visual style.
    fn style_activation(&self);
    /// Applies the "inactive" visual style.
    fn style_deactivation(&self);
}

/// Playback status flags (§3 `status`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineStatus {
    /// A sequence is currently mid-step.
    pub is_animating: bool,
    /// A `jumpTo*` call is in progress.
    pub is_jumping: bool,
    /// Playback is paused.
    pub is_paused: bool,
    /// Skipping visual state is on.
    pub is_skipping: bool,
}

/// C4: orders sequences and coordinates stepping, jumping, and
/// playback-rate broadcast across them (§4.4).
pub struct AnimTimeline {
    id: TimelineId,
    name: Option<String>,
    sequences: RefCell<Vec<Rc<RefCell<AnimSequence>>>>,
    loaded_seq_index: Cell<usize>,
    status: RefCell<TimelineStatus>,
    playback_rate: Cell<f64>,
    autoplay_detection: Cell<AutoplayDetection>,
    debug_mode: bool,
    playback_buttons: RefCell<HashMap<ButtonPurpose, Rc<dyn PlaybackButton>>>,
}

impl std::fmt::Debug for AnimTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimTimeline")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("sequence_count", &self.sequences.borrow().len())
            .field("loaded_seq_index", &self.loaded_seq_index.get())
            .finish_non_exhaustive()
    }
}

impl AnimTimeline {
    /// Builds a new, empty timeline.
    pub fn new(name: Option<String>, debug_mode: bool) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(AnimTimeline {
            id: TimelineId::unique(),
            name,
            sequences: RefCell::new(Vec::new()),
            loaded_seq_index: Cell::new(0),
            status: RefCell::new(TimelineStatus::default()),
            playback_rate: Cell::new(1.0),
            autoplay_detection: Cell::new(AutoplayDetection::default()),
            debug_mode,
            playback_buttons: RefCell::new(HashMap::new()),
        }))
    }

    /// This timeline's unique id.
    pub fn id(&self) -> TimelineId {
        self.id
    }

    /// The timeline's current status flags.
    pub fn status(&self) -> TimelineStatus {
        *self.status.borrow()
    }

    /// The currently loaded sequence's index.
    pub fn loaded_seq_index(&self) -> usize {
        self.loaded_seq_index.get()
    }

    fn location(&self) -> Location {
        Location {
            timeline_name: self.name.clone(),
            step_number: Some(self.loaded_seq_index.get() as u32 + 1),
            sequence: None,
            clip: None,
        }
    }

    fn ensure_unlocked(&self) -> Result<()> {
        let status = self.status.borrow();
        if status.is_animating || status.is_jumping {
            return Err(StagehandError::LockedOperation {
                reason: "the timeline's structure cannot change while animating or jumping".into(),
                location: self.location(),
            });
        }
        Ok(())
    }

    /// Appends `sequences`, parenting each to this timeline (§3 I1, I6).
    pub fn add_sequences(self: &Rc<RefCell<Self>>, sequences: Vec<Rc<RefCell<AnimSequence>>>) -> Result<()> {
        let this = self.borrow();
        this.ensure_unlocked()?;
        for sequence in sequences {
            sequence.borrow().set_parent_timeline(self);
            this.sequences.borrow_mut().push(sequence);
        }
        Ok(())
    }

    /// Inserts `sequences` at `index`, rejecting insertion strictly
    /// behind `loadedSeqIndex` with a time-paradox error (§5 "Structure locks").
    pub fn add_sequences_at(self: &Rc<RefCell<Self>>, index: usize, sequences: Vec<Rc<RefCell<AnimSequence>>>) -> Result<()> {
        let this = self.borrow();
        this.ensure_unlocked()?;
        if index < this.loaded_seq_index.get() {
            return Err(StagehandError::TimeParadox {
                reason: format!("cannot insert at index {index} strictly behind loadedSeqIndex {}", this.loaded_seq_index.get()),
                location: this.location(),
            });
        }
        let mut list = this.sequences.borrow_mut();
        let insert_at = index.min(list.len());
        for (offset, sequence) in sequences.into_iter().enumerate() {
            sequence.borrow().set_parent_timeline(self);
            list.insert(insert_at + offset, sequence);
        }
        Ok(())
    }

    /// Removes sequences at `indices`, rejecting removal strictly
    /// behind `loadedSeqIndex` (§5 "Structure locks").
    pub fn remove_sequences_at(&self, indices: &[usize]) -> Result<()> {
        self.ensure_unlocked()?;
        if indices.iter().any(|&i| i < self.loaded_seq_index.get()) {
            return Err(StagehandError::TimeParadox {
                reason: "cannot remove a sequence strictly behind loadedSeqIndex".into(),
                location: self.location(),
            });
        }
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let mut list = self.sequences.borrow_mut();
        for &index in sorted.iter().rev() {
            if index < list.len() {
                list.remove(index);
            }
        }
        Ok(())
    }

    /// The number of sequences currently owned by this timeline.
    pub fn sequence_count(&self) -> usize {
        self.sequences.borrow().len()
    }

    fn sequence_at(&self, index: usize) -> Result<Rc<RefCell<AnimSequence>>> {
        self.sequences.borrow().get(index).cloned().ok_or_else(|| StagehandError::PositionOutOfBounds {
            reason: format!("no sequence at index {index}"),
            location: self.location(),
        })
    }

    async fn run_step(&self, target_index: usize, direction: PlaybackDirection, host: &dyn Host) -> Result<Rc<RefCell<AnimSequence>>> {
        let sequence = self.sequence_at(target_index)?;
        self.status.borrow_mut().is_animating = true;
        let result = match direction {
            PlaybackDirection::Forward => sequence.play_with_host(host).await,
            PlaybackDirection::Backward => sequence.rewind_with_host(host).await,
        };
        self.status.borrow_mut().is_animating = false;
        result?;
        match direction {
            PlaybackDirection::Forward => self.loaded_seq_index.set(target_index + 1),
            PlaybackDirection::Backward => self.loaded_seq_index.set(target_index),
        }
        Ok(sequence)
    }

    /// Plays (or rewinds) the sequence at `loadedSeqIndex` (or one
    /// behind it for backward), then follows the autoplay chain for as
    /// long as the just-completed or newly loaded sequence requests it
    /// (§4.4 "Step").
    pub async fn step(&self, direction: PlaybackDirection, host: &dyn Host) -> Result<()> {
        loop {
            let target_index = match direction {
                PlaybackDirection::Forward => self.loaded_seq_index.get(),
                PlaybackDirection::Backward => {
                    if self.loaded_seq_index.get() == 0 {
                        return Err(StagehandError::PositionOutOfBounds {
                            reason: "already at the first sequence".into(),
                            location: self.location(),
                        });
                    }
                    self.loaded_seq_index.get() - 1
                }
            };
            if direction == PlaybackDirection::Forward && target_index >= self.sequence_count() {
                return Err(StagehandError::PositionOutOfBounds {
                    reason: "already at the last sequence".into(),
                    location: self.location(),
                });
            }

            let completed = self.run_step(target_index, direction, host).await?;

            let autoplays_next = completed.borrow().config().autoplays_next_sequence;
            let next_autoplays = match direction {
                PlaybackDirection::Forward => self
                    .sequences
                    .borrow()
                    .get(self.loaded_seq_index.get())
                    .map(|s| s.borrow().config().autoplays)
                    .unwrap_or(false),
                PlaybackDirection::Backward => self
                    .loaded_seq_index
                    .get()
                    .checked_sub(1)
                    .and_then(|i| self.sequences.borrow().get(i).map(|s| s.borrow().config().autoplays))
                    .unwrap_or(false),
            };
            if !(autoplays_next || next_autoplays) {
                return Ok(());
            }
        }
    }

    fn search_order(&self, search_direction: SearchDirection) -> Vec<usize> {
        let len = self.sequence_count();
        match search_direction {
            SearchDirection::Forward => (self.loaded_seq_index.get()..len).collect(),
            SearchDirection::Backward => (0..=self.loaded_seq_index.get().min(len.saturating_sub(1))).rev().collect(),
            SearchDirection::ForwardFromBeginning => (0..len).collect(),
            SearchDirection::BackwardFromEnd => (0..len).rev().collect(),
        }
    }

    /// Resolves a tag query to a target index, applying `search_offset`
    /// (shifts the search's starting candidate) and `target_offset`
    /// (shifts the final landing index), per §4.4 "Jump".
    pub fn resolve_tag(&self, query: &TagQuery, search_direction: SearchDirection, search_offset: i32, target_offset: i32) -> Result<usize> {
        let order = self.search_order(search_direction);
        let shifted_start = search_offset.max(0) as usize;
        let sequences = self.sequences.borrow();
        let found = order
            .into_iter()
            .skip(shifted_start)
            .find(|&i| sequences[i].borrow().tag().map(|t| query.matches(t)).unwrap_or(false))
            .ok_or_else(|| StagehandError::TagNotFound {
                reason: "no sequence tag matched the query".into(),
                location: self.location(),
            })?;
        let target = found as i64 + target_offset as i64;
        if target < 0 || target as usize >= sequences.len() {
            return Err(StagehandError::PositionOutOfBounds {
                reason: format!("target offset moved the match to out-of-bounds index {target}"),
                location: self.location(),
            });
        }
        Ok(target as usize)
    }

    /// Jumps to `target`, unpausing and enabling the skipping visual
    /// state for the duration of the jump, then restoring the prior
    /// pause/skipping state (§4.4 "Jump"). Rejects re-entrant jumps.
    pub async fn jump_to(&self, target: usize, host: &dyn Host) -> Result<()> {
        if self.status.borrow().is_jumping {
            return Err(StagehandError::LockedOperation {
                reason: "a jump is already in progress".into(),
                location: self.location(),
            });
        }
        if target >= self.sequence_count() {
            return Err(StagehandError::PositionOutOfBounds {
                reason: format!("jump target {target} is out of bounds"),
                location: self.location(),
            });
        }

        let (was_paused, was_skipping) = {
            let status = self.status.borrow();
            (status.is_paused, status.is_skipping)
        };
        {
            let mut status = self.status.borrow_mut();
            status.is_jumping = true;
            status.is_paused = false;
            status.is_skipping = true;
        }

        let result = self.drive_to_target(target, host).await;

        {
            let mut status = self.status.borrow_mut();
            status.is_jumping = false;
            status.is_paused = was_paused;
            status.is_skipping = was_skipping;
        }
        result
    }

    async fn drive_to_target(&self, target: usize, host: &dyn Host) -> Result<()> {
        while self.loaded_seq_index.get() != target {
            let direction = if self.loaded_seq_index.get() < target {
                PlaybackDirection::Forward
            } else {
                PlaybackDirection::Backward
            };
            self.step_no_autoplay(direction, host).await?;
        }

        // Whether to keep going past the target is decided by the
        // landed sequence's own autoplay flag under the configured
        // detection direction; once that holds, `step` already
        // implements the correct chain-following semantics (checking
        // both the completed sequence's `autoplaysNextSequence` and the
        // newly loaded one's `autoplays`), so it's forced directly
        // rather than re-derived here one step at a time.
        let should_continue = match self.autoplay_detection.get() {
            AutoplayDetection::None => false,
            AutoplayDetection::Forward => self
                .sequences
                .borrow()
                .get(self.loaded_seq_index.get())
                .map(|s| s.borrow().config().autoplays)
                .unwrap_or(false),
            AutoplayDetection::Backward => self
                .loaded_seq_index
                .get()
                .checked_sub(1)
                .and_then(|i| self.sequences.borrow().get(i).map(|s| s.borrow().config().autoplays))
                .unwrap_or(false),
        };
        if !should_continue {
            return Ok(());
        }
        let direction = match self.autoplay_detection.get() {
            AutoplayDetection::Backward => PlaybackDirection::Backward,
            _ => PlaybackDirection::Forward,
        };
        self.step(direction, host).await
    }

    async fn step_no_autoplay(&self, direction: PlaybackDirection, host: &dyn Host) -> Result<()> {
        let target_index = match direction {
            PlaybackDirection::Forward => self.loaded_seq_index.get(),
            PlaybackDirection::Backward => self.loaded_seq_index.get().saturating_sub(1),
        };
        self.run_step(target_index, direction, host).await?;
        Ok(())
    }

    /// Jumps by resolving `query` to an index first (§4.4 "Jump").
    pub async fn jump_to_tag(&self, query: &TagQuery, search_direction: SearchDirection, search_offset: i32, target_offset: i32, host: &dyn Host) -> Result<()> {
        let target = self.resolve_tag(query, search_direction, search_offset, target_offset)?;
        self.jump_to(target, host).await
    }

    /// Jumps to a position literal (§4.4 "Jump").
    pub async fn jump_to_position(&self, position: JumpPosition, host: &dyn Host) -> Result<()> {
        let target = match position {
            JumpPosition::Beginning => 0,
            JumpPosition::End => self.sequence_count().saturating_sub(1),
            JumpPosition::Index(i) => i,
        };
        self.jump_to(target, host).await
    }

    fn current_sequence(&self) -> Option<Rc<RefCell<AnimSequence>>> {
        let index = self.loaded_seq_index.get();
        let count = self.sequence_count();
        if count == 0 {
            return None;
        }
        self.sequences.borrow().get(index.min(count - 1)).cloned()
    }

    /// Pauses the in-progress sequence, if any.
    pub fn pause(&self) -> Result<()> {
        if self.status.borrow().is_jumping {
            return Err(StagehandError::LockedOperation {
                reason: "cannot pause during an in-flight jump".into(),
                location: self.location(),
            });
        }
        if let Some(sequence) = self.current_sequence() {
            sequence.borrow().pause();
        }
        self.status.borrow_mut().is_paused = true;
        Ok(())
    }

    /// Resumes after [`AnimTimeline::pause`].
    pub fn unpause(&self) {
        if let Some(sequence) = self.current_sequence() {
            sequence.borrow().unpause();
        }
        self.status.borrow_mut().is_paused = false;
    }

    /// Toggles the skipping visual state.
    pub fn toggle_skipping(&self) {
        let next = !self.status.borrow().is_skipping;
        self.status.borrow_mut().is_skipping = next;
    }

    /// Turns the skipping visual state on.
    pub fn turn_skipping_on(&self) {
        self.status.borrow_mut().is_skipping = true;
    }

    /// Turns the skipping visual state off.
    pub fn turn_skipping_off(&self) {
        self.status.borrow_mut().is_skipping = false;
    }

    /// Sets this timeline's playback rate and broadcasts the new
    /// compounded rate down to every in-progress sequence and clip
    /// (§4.4 "Playback-rate broadcast").
    pub fn set_playback_rate(&self, rate: f64) {
        self.playback_rate.set(rate);
        for sequence in self.sequences.borrow().iter() {
            sequence.borrow().use_compounded_playback_rate(rate);
        }
    }

    /// The timeline's own playback rate (unscaled by any sequence/clip rate).
    pub fn playback_rate(&self) -> f64 {
        self.playback_rate.get()
    }

    /// Whether `debugMode` is enabled for this timeline (§3 `config`);
    /// consulted by callers that want to gate their own `tracing::debug!`
    /// spans on it.
    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    /// Sets which autoplay predicate a jump continues consulting once
    /// it reaches its literal target (§4.4 "Jump").
    pub fn set_autoplay_detection(&self, mode: AutoplayDetection) {
        self.autoplay_detection.set(mode);
    }

    /// Tells the in-progress (or most recently loaded) sequence to
    /// finish immediately. A sequence with no completed run yet always
    /// finishes forward (Design Note §9, Open Question 2).
    pub fn finish_in_progress_sequences(&self) {
        if let Some(sequence) = self.current_sequence() {
            sequence.borrow().mark_finishing();
        }
    }

    /// Registers a button for `purpose`. Fast-forward activation raises
    /// the playback rate to 7x; deactivation restores 1x (§6
    /// "Playback-button contract").
    pub fn link_playback_button(&self, purpose: ButtonPurpose, button: Rc<dyn PlaybackButton>) {
        self.playback_buttons.borrow_mut().insert(purpose, button);
    }

    /// Locates and registers every recognized button under
    /// `candidates`, logging a warning listing any purposes left
    /// unmatched (§6 "Playback-button contract").
    pub fn link_playback_buttons(&self, candidates: Vec<(ButtonPurpose, Rc<dyn PlaybackButton>)>) {
        let mut seen = std::collections::HashSet::new();
        for (purpose, button) in candidates {
            seen.insert(purpose);
            self.link_playback_button(purpose, button);
        }
        let all = [
            ButtonPurpose::StepForward,
            ButtonPurpose::StepBackward,
            ButtonPurpose::Pause,
            ButtonPurpose::FastForward,
            ButtonPurpose::ToggleSkipping,
        ];
        let missing: Vec<&str> = all
            .iter()
            .filter(|p| !seen.contains(p))
            .map(|p| match p {
                ButtonPurpose::StepForward => "step-forward",
                ButtonPurpose::StepBackward => "step-backward",
                ButtonPurpose::Pause => "pause",
                ButtonPurpose::FastForward => "fast-forward",
                ButtonPurpose::ToggleSkipping => "toggle-skipping",
            })
            .collect();
        if !missing.is_empty() {
            tracing::warn!(timeline = ?self.name, missing = ?missing, "some playback buttons were not linked");
        }
    }

    /// Activates the fast-forward button, raising the playback rate to
    /// 7x (§6 "Playback-button contract").
    pub fn activate_fast_forward(&self) {
        if let Some(button) = self.playback_buttons.borrow().get(&ButtonPurpose::FastForward) {
            button.style_activation();
        }
        self.set_playback_rate(7.0);
    }

    /// Deactivates the fast-forward button, restoring 1x.
    pub fn deactivate_fast_forward(&self) {
        if let Some(button) = self.playback_buttons.borrow().get(&ButtonPurpose::FastForward) {
            button.style_deactivation();
        }
        self.set_playback_rate(1.0);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clip::{AnimClip, ClipCategory, ClipModifiers, ClipTiming, ComputeNow, EffectArgs, EffectGenerator, SequencingFlags};
    use crate::host::fake::{FakeElement, FakeHost};
    use crate::host::ElementHandle;
    use crate::sequence::{SequenceConfig, SequenceHandlers};
    use std::time::Duration;

    fn keyframes_generator() -> EffectGenerator {
        EffectGenerator::Keyframes(Rc::new(|_args: &EffectArgs| {
            let mut frame = std::collections::BTreeMap::new();
            frame.insert("opacity".to_string(), "1".to_string());
            (vec![frame], None)
        }))
    }

    fn sequence_with_one_clip(tag: Option<&str>, dur_ms: u64) -> Rc<RefCell<AnimSequence>> {
        let seq = AnimSequence::new(None, tag.map(String::from), SequenceConfig::new(), SequenceHandlers::default());
        let clip = Rc::new(RefCell::new(AnimClip::new(
            Rc::new(FakeElement::new("div")) as ElementHandle,
            "~fade-in",
            ClipCategory::Emphasis,
            vec![],
            keyframes_generator(),
            ClipTiming { delay: Duration::ZERO, duration: Duration::from_millis(dur_ms), end_delay: Duration::ZERO, easing: crate::easing::Ease::default(), playback_rate: 1.0 },
            ClipModifiers::default(),
            SequencingFlags::default(),
            ComputeNow::Eager,
        )));
        seq.add_clip(clip).unwrap();
        seq
    }

    fn drive<T>(mut fut: std::pin::Pin<Box<dyn std::future::Future<Output = T>>>, host: &FakeHost) -> T {
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);
        loop {
            match fut.as_mut().poll(&mut cx) {
                std::task::Poll::Ready(v) => return v,
                std::task::Poll::Pending => host.drive(Duration::from_millis(10)),
            }
        }
    }

    #[test]
    fn step_forward_advances_loaded_index() {
        let timeline = AnimTimeline::new(Some("main".into()), false);
        timeline.add_sequences(vec![sequence_with_one_clip(None, 50), sequence_with_one_clip(None, 50)]).unwrap();
        let host = FakeHost::new();

        drive(Box::pin(async { timeline.borrow().step(PlaybackDirection::Forward, &host).await }), &host).unwrap();
        assert_eq!(timeline.borrow().loaded_seq_index(), 1);
    }

    #[test]
    fn step_backward_at_start_errors() {
        let timeline = AnimTimeline::new(None, false);
        timeline.add_sequences(vec![sequence_with_one_clip(None, 50)]).unwrap();
        let host = FakeHost::new();

        let result = drive(Box::pin(async { timeline.borrow().step(PlaybackDirection::Backward, &host).await }), &host);
        assert!(matches!(result, Err(StagehandError::PositionOutOfBounds { .. })));
    }

    #[test]
    fn jump_to_tag_finds_exact_match() {
        let timeline = AnimTimeline::new(None, false);
        timeline
            .add_sequences(vec![sequence_with_one_clip(Some("intro"), 20), sequence_with_one_clip(Some("outro"), 20)])
            .unwrap();
        let host = FakeHost::new();

        drive(
            Box::pin(async {
                timeline
                    .borrow()
                    .jump_to_tag(&TagQuery::Exact("outro".into()), SearchDirection::ForwardFromBeginning, 0, 0, &host)
                    .await
            }),
            &host,
        )
        .unwrap();
        assert_eq!(timeline.borrow().loaded_seq_index(), 2);
    }

    #[test]
    fn insert_behind_loaded_index_is_a_time_paradox() {
        let timeline = AnimTimeline::new(None, false);
        timeline.add_sequences(vec![sequence_with_one_clip(None, 10), sequence_with_one_clip(None, 10)]).unwrap();
        timeline.borrow().loaded_seq_index.set(1);

        let result = timeline.add_sequences_at(0, vec![sequence_with_one_clip(None, 10)]);
        assert!(matches!(result, Err(StagehandError::TimeParadox { .. })));
    }

    #[test]
    fn structure_mutation_while_animating_is_locked() {
        let timeline = AnimTimeline::new(None, false);
        timeline.add_sequences(vec![sequence_with_one_clip(None, 10)]).unwrap();
        timeline.borrow().status.borrow_mut().is_animating = true;

        let result = timeline.add_sequences(vec![sequence_with_one_clip(None, 10)]);
        assert!(matches!(result, Err(StagehandError::LockedOperation { .. })));
    }
}
