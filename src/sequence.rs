//! Orders clips; commits a parallelism plan on every play/rewind and
//! executes it with the ordering guarantees from §4.3/§5.

use std::cell::{Cell, RefCell};
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::future::{join_all, Future, LocalBoxFuture};

use crate::clip::{AnimClip, PauseRoot};
use crate::clip_animation::{Phase, PhasePosition};
use crate::error::{Location, Result, SequenceContext, StagehandError};
use crate::host::{Host, PlaybackDirection};
use crate::ids::SequenceId;
use crate::time_position::TimePosition;
use crate::timeline::AnimTimeline;

/// A maximal run of clips connected by `startsWithPrevious` or the
/// predecessor's `startsNextClipToo` (§4.3 "Grouping").
#[derive(Debug, Clone)]
pub struct Group {
    /// Indices into the sequence's clip list, in insertion order.
    pub members: Vec<usize>,
    /// Clips sorted ascending by `activeFinishTime`.
    pub active_finish_order: Vec<usize>,
    /// Clips sorted ascending by `fullFinishTime`.
    pub end_delay_finish_order: Vec<usize>,
    /// `end_delay_finish_order` reversed, then stably sorted ascending
    /// by `activeStartTime` (§4.3).
    pub backward_active_finish_order: Vec<usize>,
}

/// The scheduling plan computed by [`AnimSequence::commit`].
#[derive(Debug, Clone, Default)]
pub struct Commit {
    /// Groups in forward playback order.
    pub forward_groupings: Vec<Group>,
}

/// Sequence-level configuration (§3 `config`).
#[derive(Debug, Clone, Default)]
pub struct SequenceConfig {
    /// Plays automatically when loaded by a timeline step.
    pub autoplays: bool,
    /// Causes the timeline to continue to the next sequence.
    pub autoplays_next_sequence: bool,
    /// This sequence's own contribution to the compounded playback rate.
    pub playback_rate: f64,
}

impl SequenceConfig {
    /// A config with the default (1x) playback rate.
    pub fn new() -> Self {
        SequenceConfig { playback_rate: 1.0, ..Default::default() }
    }
}

/// `onStart`/`onFinish` handlers, each with a `do` and `undo` side
/// (§4.3 "Handlers").
#[derive(Default)]
pub struct SequenceHandlers {
    /// Fires after commit, before launching the forward run.
    pub on_start_do: Option<Box<dyn Fn()>>,
    /// Fires at the end of a rewind.
    pub on_start_undo: Option<Box<dyn Fn()>>,
    /// Fires after the last group completes a forward run.
    pub on_finish_do: Option<Box<dyn Fn()>>,
    /// Fires at the beginning of a rewind.
    pub on_finish_undo: Option<Box<dyn Fn()>>,
}

impl std::fmt::Debug for SequenceHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceHandlers")
            .field("on_start_do", &self.on_start_do.is_some())
            .field("on_start_undo", &self.on_start_undo.is_some())
            .field("on_finish_do", &self.on_finish_do.is_some())
            .field("on_finish_undo", &self.on_finish_undo.is_some())
            .finish()
    }
}

/// Playback status flags (§3 `status`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceStatus {
    /// Currently running or paused mid-run.
    pub in_progress: bool,
    /// In-progress and not paused.
    pub is_running: bool,
    /// In-progress and paused.
    pub is_paused: bool,
    /// The most recent completed run was forward.
    pub is_finished: bool,
    /// The most recent completed run was forward.
    pub was_played: bool,
    /// The most recent completed run was backward.
    pub was_rewound: bool,
    /// `finish()` has been requested for the current (or next) run.
    pub using_finish: bool,
}

/// C3: an ordered, owned list of clips with intra-group parallelism
/// (§4.3).
pub struct AnimSequence {
    id: SequenceId,
    clips: RefCell<Vec<Rc<RefCell<AnimClip>>>>,
    description: Option<String>,
    tag: Option<String>,
    config: SequenceConfig,
    handlers: SequenceHandlers,
    status: RefCell<SequenceStatus>,
    parent_timeline: RefCell<Weak<RefCell<AnimTimeline>>>,
    commit: RefCell<Option<Commit>>,
    in_progress: RefCell<std::collections::HashSet<usize>>,
    // Which direction the current (or most recent) run is playing;
    // `mark_finishing` needs this to know which of a clip's two host
    // animations to force to completion.
    current_direction: Cell<Option<PlaybackDirection>>,
}

impl std::fmt::Debug for AnimSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimSequence")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("clip_count", &self.clips.borrow().len())
            .finish_non_exhaustive()
    }
}

impl AnimSequence {
    /// Builds a new, unparented sequence with no clips.
    pub fn new(description: Option<String>, tag: Option<String>, config: SequenceConfig, handlers: SequenceHandlers) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(AnimSequence {
            id: SequenceId::unique(),
            clips: RefCell::new(Vec::new()),
            description,
            tag,
            config,
            handlers,
            status: RefCell::new(SequenceStatus::default()),
            parent_timeline: RefCell::new(Weak::new()),
            commit: RefCell::new(None),
            in_progress: RefCell::new(std::collections::HashSet::new()),
            current_direction: Cell::new(None),
        }))
    }

    /// This sequence's unique id.
    pub fn id(&self) -> SequenceId {
        self.id
    }

    /// The sequence's searchable tag, if any.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// The sequence's author-supplied description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// This sequence's configuration.
    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// The sequence's current status flags.
    pub fn status(&self) -> SequenceStatus {
        *self.status.borrow()
    }

    /// Appends a clip, attaching it as this sequence's child (I1).
    pub fn add_clip(self: &Rc<RefCell<Self>>, clip: Rc<RefCell<AnimClip>>) -> Result<()> {
        if self.borrow().status().is_finished && self.borrow().status().was_played {
            return Err(StagehandError::InvalidChild {
                reason: "sequence is already forward-finished".into(),
                location: Location::default(),
            });
        }
        clip.attach_to_sequence(self, None)?;
        self.borrow().clips.borrow_mut().push(clip);
        Ok(())
    }

    /// Sets this sequence's parent timeline (called by the timeline
    /// when the sequence is added to it).
    pub fn set_parent_timeline(&self, timeline: &Rc<RefCell<AnimTimeline>>) {
        *self.parent_timeline.borrow_mut() = Rc::downgrade(timeline);
    }

    /// This sequence's error-location context.
    pub fn error_context(&self, index: usize) -> SequenceContext {
        SequenceContext { index, tag: self.tag.clone(), description: self.description.clone() }
    }

    /// Walks clips in insertion order and builds the parallelism
    /// groupings and per-group finish orders (§4.3 "Commit algorithm").
    /// Also assigns each clip's [`crate::clip::ScheduledTimes`].
    pub fn commit(&self) {
        let clips = self.clips.borrow();
        let mut groups: Vec<Group> = Vec::new();
        let mut current_members: Vec<usize> = Vec::new();
        // The immediately preceding clip's active-start time.
        // `startsWithPrevious` anchors here — not to the group's first
        // clip — per spec.md §8 Scenario 1's worked example
        // (`C = B.activeStartTime`, not `A.activeStartTime`).
        let mut predecessor_active_start = Duration::ZERO;
        let mut cursor = Duration::ZERO;
        let mut prev_starts_next_clip_too = false;

        for (i, clip_ref) in clips.iter().enumerate() {
            let clip = clip_ref.borrow();
            let flags = clip.sequencing();

            let joins_group = i > 0 && (flags.starts_with_previous || prev_starts_next_clip_too);

            let full_start_time = if i == 0 {
                Duration::ZERO
            } else if joins_group {
                predecessor_active_start
            } else {
                let prev_group = groups.last().expect("a prior group exists once i > 0 and not joining");
                prev_group
                    .members
                    .iter()
                    .map(|&m| clips[m].borrow().scheduled_times().expect("assigned earlier this pass").full_finish_time)
                    .max()
                    .unwrap_or(cursor)
            };

            let times = crate::clip::ScheduledTimes::compute(full_start_time, clip.timing());
            clip.set_scheduled_times(times);
            cursor = times.full_finish_time;

            if !joins_group {
                current_members = Vec::new();
                groups.push(Group { members: Vec::new(), active_finish_order: Vec::new(), end_delay_finish_order: Vec::new(), backward_active_finish_order: Vec::new() });
            }
            predecessor_active_start = times.active_start_time;
            current_members.push(i);
            groups.last_mut().expect("just pushed or already present").members = current_members.clone();

            prev_starts_next_clip_too = flags.starts_next_clip_too;
        }

        for group in groups.iter_mut() {
            let times = |idx: usize| clips[idx].borrow().scheduled_times().expect("assigned above");

            let mut active_finish_order = group.members.clone();
            active_finish_order.sort_by_key(|&idx| times(idx).active_finish_time);
            group.active_finish_order = active_finish_order;

            let mut end_delay_finish_order = group.members.clone();
            end_delay_finish_order.sort_by_key(|&idx| times(idx).full_finish_time);
            group.end_delay_finish_order = end_delay_finish_order.clone();

            let mut backward_order = end_delay_finish_order;
            backward_order.reverse();
            backward_order.sort_by_key(|&idx| times(idx).active_start_time);
            group.backward_active_finish_order = backward_order;
        }

        *self.commit.borrow_mut() = Some(Commit { forward_groupings: groups });
    }

    fn phase_position_active_end() -> PhasePosition {
        PhasePosition::new(Phase::Active, TimePosition::End)
    }

    fn phase_position_active_begin() -> PhasePosition {
        PhasePosition::new(Phase::Active, TimePosition::Beginning)
    }

    /// The wait a backward-launching clip owes the already-rewinding
    /// predecessor launched just before it, per spec.md §4.3's
    /// "computed intersection": if the two clips overlapped in forward
    /// time, wait until the predecessor has rewound exactly that much
    /// overlap; otherwise wait for the predecessor's own backward
    /// active phase to begin (the mirror of the forward launch rule).
    fn backward_launch_signal(clips: &[Rc<RefCell<AnimClip>>], predecessor_idx: usize, launching_idx: usize) -> Result<LocalBoxFuture<'static, ()>> {
        let predecessor_times = clips[predecessor_idx].borrow().scheduled_times().expect("assigned at commit");
        let launching_times = clips[launching_idx].borrow().scheduled_times().expect("assigned at commit");

        if launching_times.full_finish_time > predecessor_times.full_start_time {
            let overlap = launching_times.full_finish_time - predecessor_times.full_start_time;
            clips[predecessor_idx].borrow().time_reached_at(PlaybackDirection::Backward, overlap)
        } else {
            clips[predecessor_idx].borrow().generate_time_promise(PlaybackDirection::Backward, Self::phase_position_active_begin())
        }
    }

    /// Plays every clip forward, group by group, with the ordering
    /// guarantees from §4.3/§5.
    async fn play_forward(&self, host: &dyn Host) -> Result<()> {
        let commit = self.commit.borrow().clone().expect("commit runs before play");
        let clips = self.clips.borrow().clone();

        for group in &commit.forward_groupings {
            // Build each member's animation up front so the pins below
            // have a time promise to attach to before any `run()` polls.
            for &idx in &group.members {
                clips[idx].borrow().ensure_clip_animation(host)?;
            }
            // Pin relative active-phase completion order against host jitter.
            for window in group.active_finish_order.windows(2) {
                let (prev, next) = (window[0], window[1]);
                let promise = clips[prev].borrow().generate_time_promise(PlaybackDirection::Forward, Self::phase_position_active_end())?;
                clips[next].borrow().add_integrity_blocks(PlaybackDirection::Forward, Self::phase_position_active_end(), vec![promise])?;
            }

            // A bare `finish()` called while an earlier group was still
            // running sets this; newly-starting groups then skip
            // straight to completion instead of a normal play (§4.3
            // `finish()`, mirroring the skippingOn dispatch).
            let skipping = self.status.borrow().using_finish;

            let mut launches: Vec<Pin<Box<dyn Future<Output = Result<()>> + '_>>> = Vec::new();
            for (pos, &idx) in group.members.iter().enumerate() {
                self.in_progress.borrow_mut().insert(idx);
                let clip = clips[idx].clone();
                // Launches proceed in insertion order; every member past
                // the first waits for its immediate predecessor's active
                // phase to begin before starting its own delay (§4.3
                // "Forward playback").
                let start_signal: Option<LocalBoxFuture<'static, ()>> = if pos == 0 {
                    None
                } else {
                    let predecessor_idx = group.members[pos - 1];
                    Some(clips[predecessor_idx].borrow().generate_time_promise(PlaybackDirection::Forward, Self::phase_position_active_begin())?)
                };
                let fut = async move {
                    if let Some(signal) = start_signal {
                        signal.await;
                    }
                    let root = SequenceErrorRoot;
                    clip.run(host, PlaybackDirection::Forward, skipping, &root).await
                };
                launches.push(Box::pin(fut));
            }
            let results = join_all(launches).await;
            for &idx in &group.members {
                self.in_progress.borrow_mut().remove(&idx);
            }
            for result in results {
                result?;
            }
        }
        Ok(())
    }

    /// Rewinds every clip backward, last group first, with the
    /// ordering guarantees from §4.3/§5.
    async fn play_backward(&self, host: &dyn Host) -> Result<()> {
        let commit = self.commit.borrow().clone().expect("commit runs before rewind");
        let clips = self.clips.borrow().clone();

        for group in commit.forward_groupings.iter().rev() {
            for &idx in &group.members {
                clips[idx].borrow().ensure_clip_animation(host)?;
            }
            for window in group.backward_active_finish_order.windows(2) {
                let (prev, next) = (window[0], window[1]);
                let promise = clips[next].borrow().generate_time_promise(PlaybackDirection::Backward, Self::phase_position_active_end())?;
                clips[prev].borrow().add_integrity_blocks(PlaybackDirection::Backward, Self::phase_position_active_end(), vec![promise])?;
            }

            let reversed: Vec<usize> = group.members.iter().rev().copied().collect();
            let mut launches: Vec<Pin<Box<dyn Future<Output = Result<()>> + '_>>> = Vec::new();
            for (pos, &idx) in reversed.iter().enumerate() {
                self.in_progress.borrow_mut().insert(idx);
                let clip = clips[idx].clone();
                // The group's last member rewinds immediately; every
                // earlier member waits on the fullFinish/fullStart
                // intersection against the already-rewinding clip
                // launched just before it (§4.3 "Backward playback").
                let start_signal: Option<LocalBoxFuture<'static, ()>> = if pos == 0 {
                    None
                } else {
                    let predecessor_idx = reversed[pos - 1];
                    Some(Self::backward_launch_signal(&clips, predecessor_idx, idx)?)
                };
                let fut = async move {
                    if let Some(signal) = start_signal {
                        signal.await;
                    }
                    let root = SequenceErrorRoot;
                    clip.run(host, PlaybackDirection::Backward, false, &root).await
                };
                launches.push(Box::pin(fut));
            }
            let results = join_all(launches).await;
            for &idx in &group.members {
                self.in_progress.borrow_mut().remove(&idx);
            }
            for result in results {
                result?;
            }
        }
        Ok(())
    }

    /// Commits then plays every clip forward against `host` (§4.3).
    pub async fn play_with_host(self: &Rc<RefCell<Self>>, host: &dyn Host) -> Result<()> {
        {
            let this = self.borrow();
            this.commit();
            let mut status = this.status.borrow_mut();
            status.in_progress = true;
            status.is_running = true;
            status.is_finished = false;
            status.using_finish = false;
            this.current_direction.set(Some(PlaybackDirection::Forward));
        }
        if let Some(cb) = &self.borrow().handlers.on_start_do {
            cb();
        }

        let result = self.borrow().play_forward(host).await;

        {
            let this = self.borrow();
            let mut status = this.status.borrow_mut();
            status.in_progress = false;
            status.is_running = false;
            if result.is_ok() {
                status.is_finished = true;
                status.was_played = true;
                status.was_rewound = false;
            }
        }

        if result.is_ok() {
            if let Some(cb) = &self.borrow().handlers.on_finish_do {
                cb();
            }
        }
        result
    }

    /// Commits then rewinds every clip backward against `host` (§4.3).
    pub async fn rewind_with_host(self: &Rc<RefCell<Self>>, host: &dyn Host) -> Result<()> {
        {
            let this = self.borrow();
            this.commit();
            let mut status = this.status.borrow_mut();
            status.in_progress = true;
            status.is_running = true;
            status.using_finish = false;
            this.current_direction.set(Some(PlaybackDirection::Backward));
        }
        if let Some(cb) = &self.borrow().handlers.on_finish_undo {
            cb();
        }

        let result = self.borrow().play_backward(host).await;

        {
            let this = self.borrow();
            let mut status = this.status.borrow_mut();
            status.in_progress = false;
            status.is_running = false;
            if result.is_ok() {
                status.is_finished = true;
                status.was_played = false;
                status.was_rewound = true;
            }
        }

        if result.is_ok() {
            if let Some(cb) = &self.borrow().handlers.on_start_undo {
                cb();
            }
        }
        result
    }

    /// Broadcasts pause to this sequence's in-progress clips only.
    pub fn pause(&self) {
        let clips = self.clips.borrow();
        for &idx in self.in_progress.borrow().iter() {
            clips[idx].borrow().pause(PlaybackDirection::Forward);
        }
        let mut status = self.status.borrow_mut();
        status.is_running = false;
        status.is_paused = true;
    }

    /// Resumes this sequence after [`AnimSequence::pause`].
    pub fn unpause(&self) {
        let clips = self.clips.borrow();
        for &idx in self.in_progress.borrow().iter() {
            clips[idx].borrow().unpause();
        }
        let mut status = self.status.borrow_mut();
        status.is_running = true;
        status.is_paused = false;
    }

    /// Marks `usingFinish` so later-starting clips skip naturally, and
    /// tells already-running clips to finish. A bare `finish()` with no
    /// completed run yet (or most recently rewound) starts a forward
    /// run first — this covers the no-parent-timeline, mid-rewind case
    /// from Design Note §9 (Open Question 2): a bare `finish()` is
    /// always treated as a forward-finish request.
    pub fn mark_finishing(&self) {
        self.status.borrow_mut().using_finish = true;
        let direction = self.current_direction.get().unwrap_or(PlaybackDirection::Forward);
        let clips = self.clips.borrow();
        for &idx in self.in_progress.borrow().iter() {
            clips[idx].borrow().finish_now(direction);
        }
    }

    /// Applies a freshly compounded playback rate to in-progress clips
    /// (§4.4 `useCompoundedPlaybackRate`).
    pub fn use_compounded_playback_rate(&self, parent_rate: f64) {
        let rate = parent_rate * self.config.playback_rate;
        let clips = self.clips.borrow();
        for &idx in self.in_progress.borrow().iter() {
            clips[idx].borrow().use_compounded_playback_rate(rate, PlaybackDirection::Forward);
        }
    }

    /// The number of clips currently owned by this sequence.
    pub fn clip_count(&self) -> usize {
        self.clips.borrow().len()
    }
}

struct SequenceErrorRoot;
impl PauseRoot for SequenceErrorRoot {
    fn pause_root(&self) {
        // The owning sequence/timeline is responsible for observing the
        // returned error and pausing itself; a standalone root has
        // nothing further to pause.
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clip::{ClipCategory, ClipModifiers, ClipTiming, ComputeNow, EffectArgs, EffectGenerator, SequencingFlags};
    use crate::host::fake::{FakeElement, FakeHost};
    use crate::host::ElementHandle;

    fn keyframes_generator() -> EffectGenerator {
        EffectGenerator::Keyframes(Rc::new(|_args: &EffectArgs| {
            let mut frame = std::collections::BTreeMap::new();
            frame.insert("opacity".to_string(), "1".to_string());
            (vec![frame], None)
        }))
    }

    fn clip(delay_ms: u64, dur_ms: u64, starts_with_previous: bool, starts_next_clip_too: bool) -> Rc<RefCell<AnimClip>> {
        Rc::new(RefCell::new(AnimClip::new(
            Rc::new(FakeElement::new("div")) as ElementHandle,
            "~fade-in",
            ClipCategory::Emphasis,
            vec![],
            keyframes_generator(),
            ClipTiming { delay: Duration::from_millis(delay_ms), duration: Duration::from_millis(dur_ms), end_delay: Duration::ZERO, easing: crate::easing::Ease::default(), playback_rate: 1.0 },
            ClipModifiers::default(),
            SequencingFlags { starts_with_previous, starts_next_clip_too },
            ComputeNow::Eager,
        )))
    }

    #[test]
    fn delay_stacking_in_a_parallel_group() {
        let seq = AnimSequence::new(None, None, SequenceConfig::new(), SequenceHandlers::default());
        let a = clip(0, 500, false, false);
        let b = clip(0, 300, true, false);
        let c = clip(300, 200, true, false);
        seq.add_clip(a.clone()).unwrap();
        seq.add_clip(b.clone()).unwrap();
        seq.add_clip(c.clone()).unwrap();

        seq.borrow().commit();

        assert_eq!(a.borrow().scheduled_times().unwrap().full_start_time, Duration::ZERO);
        assert_eq!(b.borrow().scheduled_times().unwrap().full_start_time, Duration::ZERO);
        assert_eq!(c.borrow().scheduled_times().unwrap().full_start_time, Duration::ZERO);
    }

    #[test]
    fn delay_stacking_anchors_to_immediate_predecessor_not_group_start() {
        let seq = AnimSequence::new(None, None, SequenceConfig::new(), SequenceHandlers::default());
        let a = clip(0, 500, false, false);
        let b = clip(150, 300, true, true);
        let c = clip(300, 200, true, false);
        seq.add_clip(a.clone()).unwrap();
        seq.add_clip(b.clone()).unwrap();
        seq.add_clip(c.clone()).unwrap();

        seq.borrow().commit();

        assert_eq!(b.borrow().scheduled_times().unwrap().full_start_time, Duration::ZERO);
        assert_eq!(c.borrow().scheduled_times().unwrap().full_start_time, Duration::from_millis(150));
    }

    #[test]
    fn non_grouped_clips_start_after_the_previous_group_fully_finishes() {
        let seq = AnimSequence::new(None, None, SequenceConfig::new(), SequenceHandlers::default());
        let a = clip(0, 500, false, false);
        let b = clip(0, 300, false, false);
        seq.add_clip(a.clone()).unwrap();
        seq.add_clip(b.clone()).unwrap();

        seq.borrow().commit();

        assert_eq!(a.borrow().scheduled_times().unwrap().full_finish_time, Duration::from_millis(500));
        assert_eq!(b.borrow().scheduled_times().unwrap().full_start_time, Duration::from_millis(500));
    }

    #[test]
    fn forward_play_runs_clips_to_completion() {
        let seq = AnimSequence::new(None, None, SequenceConfig::new(), SequenceHandlers::default());
        let a = clip(0, 200, false, false);
        let b = clip(0, 100, true, false);
        seq.add_clip(a.clone()).unwrap();
        seq.add_clip(b.clone()).unwrap();

        let host = FakeHost::new();
        let mut fut = Box::pin(seq.play_with_host(&host));
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);

        let mut guard = 0;
        while fut.as_mut().poll(&mut cx).is_pending() {
            host.drive(Duration::from_millis(10));
            guard += 1;
            assert!(guard < 10_000, "forward play never settled");
        }

        assert!(seq.borrow().status().was_played);
        assert!(a.borrow().status().was_played);
        assert!(b.borrow().status().was_played);
    }
}
