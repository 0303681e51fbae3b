//! Per-clip host-animation wrapper: phase-indexed time promises and
//! per-phase blocking lists (§4.1).
//!
//! A [`ClipAnimation`] owns a forward and a backward [`HostAnimation`],
//! each covering its own delay → active → end-delay run in its own
//! local time. Running one direction steps through its three phases in
//! order, pausing at any position where a caller has registered an
//! integrity block or a roadblock, and firing the matching
//! [`PhaseHooks`] callback exactly once per phase per direction.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::pin::Pin;
use std::time::Duration;

use futures::future::{join_all, Future, LocalBoxFuture};

use crate::host::{HostAnimation, Timing};
use crate::time_position::TimePosition;

/// One of the three timed portions of a clip's run, in either
/// direction's own local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// The delay before the active phase.
    Delay,
    /// The clip's main effect.
    Active,
    /// The delay after the active phase.
    EndDelay,
}

impl Phase {
    /// All three phases, in playback order.
    pub const ALL: [Phase; 3] = [Phase::Delay, Phase::Active, Phase::EndDelay];
}

/// A phase plus a literal position within it, not yet resolved to an
/// absolute clip-local `Duration`.
#[derive(Debug, Clone, Copy)]
pub struct PhasePosition {
    /// Which phase the position is relative to.
    pub phase: Phase,
    /// Where within that phase.
    pub position: TimePosition,
}

impl PhasePosition {
    /// Convenience constructor.
    pub fn new(phase: Phase, position: TimePosition) -> Self {
        PhasePosition { phase, position }
    }
}

/// Hooks invoked exactly once per play direction when a phase boundary
/// is crossed (§4.1 `onDelayFinish`/`onActiveFinish`/`onEndDelayFinish`).
/// Implemented by [`crate::clip::AnimClip`].
pub trait PhaseHooks {
    /// Fires when the delay phase ends, in the direction currently running.
    fn on_delay_finish(&self, direction: crate::host::PlaybackDirection);
    /// Fires when the active phase ends, in the direction currently running.
    fn on_active_finish(&self, direction: crate::host::PlaybackDirection);
    /// Fires when the end-delay phase ends, in the direction currently running.
    fn on_end_delay_finish(&self, direction: crate::host::PlaybackDirection);
}

type Awaitable = Pin<Box<dyn Future<Output = ()>>>;

#[derive(Default)]
struct Blocks {
    integrity: Vec<Awaitable>,
    roadblocks: Vec<Awaitable>,
}

use crate::host::PlaybackDirection;

/// Owns one clip's pair of host animations and the phase bookkeeping
/// layered on top of them.
pub struct ClipAnimation {
    forward: Box<dyn HostAnimation>,
    backward: Box<dyn HostAnimation>,
    forward_timing: Timing,
    backward_timing: Timing,
    // Blocks keyed by the absolute clip-local time (within the
    // selected direction's own animation) at which they fire.
    blocks: RefCell<BTreeMap<PlaybackDirection, BTreeMap<Duration, Blocks>>>,
}

impl ClipAnimation {
    /// Wraps a pre-built pair of host animations under their resolved
    /// timings. `forward_timing`/`backward_timing` give each
    /// animation's own delay/duration/end-delay (the backward timing
    /// has delay and end-delay already swapped, per §4.1 `setDirection`).
    pub fn new(
        forward: Box<dyn HostAnimation>,
        backward: Box<dyn HostAnimation>,
        forward_timing: Timing,
        backward_timing: Timing,
    ) -> Self {
        ClipAnimation {
            forward,
            backward,
            forward_timing,
            backward_timing,
            blocks: RefCell::new(BTreeMap::new()),
        }
    }

    fn anim(&self, direction: PlaybackDirection) -> &dyn HostAnimation {
        match direction {
            PlaybackDirection::Forward => self.forward.as_ref(),
            PlaybackDirection::Backward => self.backward.as_ref(),
        }
    }

    fn timing(&self, direction: PlaybackDirection) -> &Timing {
        match direction {
            PlaybackDirection::Forward => &self.forward_timing,
            PlaybackDirection::Backward => &self.backward_timing,
        }
    }

    /// The absolute clip-local offset at which `phase` begins, in the
    /// given direction's own animation.
    fn phase_start(&self, direction: PlaybackDirection, phase: Phase) -> Duration {
        let t = self.timing(direction);
        match phase {
            Phase::Delay => Duration::ZERO,
            Phase::Active => t.delay,
            Phase::EndDelay => t.delay + t.duration,
        }
    }

    fn phase_length(&self, direction: PlaybackDirection, phase: Phase) -> Duration {
        let t = self.timing(direction);
        match phase {
            Phase::Delay => t.delay,
            Phase::Active => t.duration,
            Phase::EndDelay => t.end_delay,
        }
    }

    /// Resolves a [`PhasePosition`] to an absolute clip-local offset.
    pub fn resolve_position(
        &self,
        direction: PlaybackDirection,
        at: PhasePosition,
    ) -> crate::error::Result<Duration> {
        let start = self.phase_start(direction, at.phase);
        let length = self.phase_length(direction, at.phase);
        Ok(start + at.position.resolve(length)?)
    }

    /// Returns a future resolved when playback (in `direction`) crosses
    /// `at`, in terms of the animation's own current time (§4.1
    /// `generateTimePromise`).
    pub fn generate_time_promise(
        &self,
        direction: PlaybackDirection,
        at: PhasePosition,
    ) -> crate::error::Result<LocalBoxFuture<'static, ()>> {
        let target = self.resolve_position(direction, at)?;
        Ok(self.anim(direction).time_reached(target))
    }

    /// Resolves once `direction`'s animation reaches an arbitrary
    /// absolute clip-local offset, bypassing phase resolution — needed
    /// for backward playback's fullFinish/fullStart intersection wait
    /// (§4.3), which isn't expressible as a [`PhasePosition`].
    pub fn time_reached_at(&self, direction: PlaybackDirection, target: Duration) -> LocalBoxFuture<'static, ()> {
        self.anim(direction).time_reached(target)
    }

    /// Forces `direction`'s animation to completion immediately, without
    /// running the phase-hook/block machinery in [`ClipAnimation::run`]
    /// (§4.3 `finish()` telling already-running clips to finish now).
    pub fn finish(&self, direction: PlaybackDirection) {
        self.anim(direction).finish();
    }

    /// Attaches engine-inserted awaitables at `at`; not observable by
    /// users (§4.1 `addIntegrityblocks`).
    pub fn add_integrity_blocks(
        &self,
        direction: PlaybackDirection,
        at: PhasePosition,
        promises: Vec<Awaitable>,
    ) -> crate::error::Result<()> {
        let target = self.resolve_position(direction, at)?;
        let mut blocks = self.blocks.borrow_mut();
        let per_dir = blocks.entry(direction).or_default();
        per_dir.entry(target).or_default().integrity.extend(promises);
        Ok(())
    }

    /// Attaches user-supplied awaitables at `at` (§4.1 `addRoadblocks`).
    pub fn add_roadblocks(
        &self,
        direction: PlaybackDirection,
        at: PhasePosition,
        promises: Vec<Awaitable>,
    ) -> crate::error::Result<()> {
        let target = self.resolve_position(direction, at)?;
        let mut blocks = self.blocks.borrow_mut();
        let per_dir = blocks.entry(direction).or_default();
        per_dir.entry(target).or_default().roadblocks.extend(promises);
        Ok(())
    }

    fn take_blocks_at(&self, direction: PlaybackDirection, target: Duration) -> Option<Blocks> {
        self.blocks
            .borrow_mut()
            .get_mut(&direction)
            .and_then(|per_dir| per_dir.remove(&target))
    }

    /// Drives one direction's host animation through its three phases,
    /// honoring registered blocks and firing `hooks` at each boundary
    /// (§4.1, §4.2 skipping). When `skipping`, the animation is
    /// finished immediately but hooks still fire in order.
    pub async fn run(
        &self,
        direction: PlaybackDirection,
        hooks: &dyn PhaseHooks,
        skipping: bool,
    ) {
        let anim = self.anim(direction);

        if skipping {
            anim.finish();
            hooks.on_delay_finish(direction);
            hooks.on_active_finish(direction);
            hooks.on_end_delay_finish(direction);
            return;
        }

        anim.play();

        for phase in Phase::ALL {
            let boundary = self.phase_start(direction, phase) + self.phase_length(direction, phase);

            // Block checkpoints strictly inside this phase fire, in
            // registration order, before the phase's own boundary.
            let checkpoints: Vec<Duration> = {
                let blocks = self.blocks.borrow();
                blocks
                    .get(&direction)
                    .map(|per_dir| {
                        per_dir
                            .range(..=boundary)
                            .map(|(t, _)| *t)
                            .filter(|t| *t <= boundary)
                            .collect()
                    })
                    .unwrap_or_default()
            };

            for checkpoint in checkpoints {
                anim.time_reached(checkpoint).await;
                if let Some(blocks) = self.take_blocks_at(direction, checkpoint) {
                    anim.pause();
                    join_all(blocks.integrity).await;
                    join_all(blocks.roadblocks).await;
                    anim.play();
                }
            }

            anim.time_reached(boundary).await;
            match phase {
                Phase::Delay => hooks.on_delay_finish(direction),
                Phase::Active => hooks.on_active_finish(direction),
                Phase::EndDelay => hooks.on_end_delay_finish(direction),
            }
        }
    }

    /// Swaps which direction is "current" by delegating straight to
    /// the two host animations' own play/pause state — there is no
    /// separate `setDirection` toggle to maintain since each direction
    /// owns an independent [`HostAnimation`] (§4.1).
    pub fn pause(&self, direction: PlaybackDirection) {
        self.anim(direction).pause();
    }

    /// Applies a compounded playback rate to the active direction.
    pub fn set_playback_rate(&self, direction: PlaybackDirection, rate: f64) {
        self.anim(direction).set_playback_rate(rate);
    }

    /// Replaces the forward animation's keyframes (deferred generators,
    /// §4.2 `computeNow = false`).
    pub fn set_forward_frames(&self, keyframes: crate::host::KeyframeSet) {
        self.forward.set_keyframes(keyframes);
    }

    /// Replaces the backward animation's keyframes.
    pub fn set_backward_frames(&self, keyframes: crate::host::KeyframeSet) {
        self.backward.set_keyframes(keyframes);
    }

    /// Persists the active direction's current computed styles.
    pub fn commit_styles(
        &self,
        direction: PlaybackDirection,
    ) -> Result<(), crate::host::CommitStylesFailure> {
        self.anim(direction).commit_styles()
    }
}

impl std::fmt::Debug for ClipAnimation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipAnimation")
            .field("forward_timing", &self.forward_timing)
            .field("backward_timing", &self.backward_timing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::{Composite, ElementHandle, Host, PlaybackDirection};
    use crate::host::fake::{FakeElement, FakeHost};
    use std::cell::Cell;
    use std::rc::Rc;

    fn timing(delay_ms: u64, dur_ms: u64, end_delay_ms: u64) -> Timing {
        Timing {
            delay: Duration::from_millis(delay_ms),
            duration: Duration::from_millis(dur_ms),
            end_delay: Duration::from_millis(end_delay_ms),
            playback_rate: 1.0,
            composite: Composite::Replace,
        }
    }

    struct CountingHooks {
        delay: Cell<u32>,
        active: Cell<u32>,
        end_delay: Cell<u32>,
    }

    impl CountingHooks {
        fn new() -> Self {
            CountingHooks {
                delay: Cell::new(0),
                active: Cell::new(0),
                end_delay: Cell::new(0),
            }
        }
    }

    impl PhaseHooks for CountingHooks {
        fn on_delay_finish(&self, _: PlaybackDirection) {
            self.delay.set(self.delay.get() + 1);
        }
        fn on_active_finish(&self, _: PlaybackDirection) {
            self.active.set(self.active.get() + 1);
        }
        fn on_end_delay_finish(&self, _: PlaybackDirection) {
            self.end_delay.set(self.end_delay.get() + 1);
        }
    }

    fn build(host: &FakeHost, el: &ElementHandle, t: Timing) -> ClipAnimation {
        let fwd = host.animate(el, vec![], &t, PlaybackDirection::Forward);
        let bwd = host.animate(el, vec![], &t, PlaybackDirection::Backward);
        ClipAnimation::new(fwd, bwd, t.clone(), t)
    }

    #[test]
    fn phase_hooks_fire_once_in_order() {
        let host = FakeHost::new();
        let el = FakeElement::new("div").handle();
        let clip_anim = Rc::new(build(&host, &el, timing(100, 200, 50)));
        let hooks = CountingHooks::new();

        let mut fut = Box::pin(clip_anim.run(PlaybackDirection::Forward, &hooks, false));
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);

        while fut.as_mut().poll(&mut cx).is_pending() {
            host.drive(Duration::from_millis(10));
        }

        assert_eq!(hooks.delay.get(), 1);
        assert_eq!(hooks.active.get(), 1);
        assert_eq!(hooks.end_delay.get(), 1);
    }

    #[test]
    fn skipping_still_fires_hooks_in_order() {
        let host = FakeHost::new();
        let el = FakeElement::new("div").handle();
        let clip_anim = build(&host, &el, timing(0, 500, 0));
        let hooks = CountingHooks::new();

        futures::executor::block_on(clip_anim.run(PlaybackDirection::Forward, &hooks, true));

        assert_eq!(hooks.delay.get(), 1);
        assert_eq!(hooks.active.get(), 1);
        assert_eq!(hooks.end_delay.get(), 1);
    }

    #[test]
    fn integrity_block_pauses_until_resolved() {
        let host = FakeHost::new();
        let el = FakeElement::new("div").handle();
        let clip_anim = Rc::new(build(&host, &el, timing(0, 1000, 0)));
        let hooks = CountingHooks::new();

        let (tx, rx) = futures::channel::oneshot::channel::<()>();
        clip_anim
            .add_integrity_blocks(
                PlaybackDirection::Forward,
                PhasePosition::new(Phase::Active, TimePosition::Percent(50.0)),
                vec![Box::pin(async move {
                    let _ = rx.await;
                })],
            )
            .unwrap();

        let mut fut = Box::pin(clip_anim.run(PlaybackDirection::Forward, &hooks, false));
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);

        assert!(fut.as_mut().poll(&mut cx).is_pending());
        host.drive(Duration::from_millis(600));
        assert!(fut.as_mut().poll(&mut cx).is_pending());
        assert_eq!(hooks.active.get(), 0);

        tx.send(()).unwrap();
        host.drive(Duration::from_millis(500));
        assert!(fut.as_mut().poll(&mut cx).is_ready());
        assert_eq!(hooks.active.get(), 1);
    }
}
