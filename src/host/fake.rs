//! A deterministic, manually advanced host used by this crate's own
//! tests and available to downstream consumers for testing effect
//! generators without a browser.
//!
//! Nothing here runs on a background thread or real timer. Time only
//! moves when [`FakeClock::advance`] is called, so tests can assert
//! exact phase-boundary behavior without sleeping.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use futures::future::LocalBoxFuture;

use super::{
    Composite, CommitStylesFailure, ElementHandle, Host, HostAnimation, HostElement, KeyframeSet,
    PlaybackDirection, Rect, ScrollOptions, Timing,
};

/// Shared wall-clock for a group of fake animations. Create one and
/// pass clones of it (it's an `Rc`) to every [`FakeHost`] you build so
/// that advancing time moves every animation at once.
#[derive(Debug, Clone, Default)]
pub struct FakeClock(Rc<RefCell<Duration>>);

impl FakeClock {
    /// A clock starting at `Duration::ZERO`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current time.
    pub fn now(&self) -> Duration {
        *self.0.borrow()
    }

    /// Moves the clock forward and wakes any animation whose state
    /// changed as a result. `host.drive(dt)` should usually be used
    /// instead — it advances the clock and wakes `FakeAnimation`s
    /// registered with that host.
    fn advance(&self, dt: Duration) {
        let mut now = self.0.borrow_mut();
        *now += dt;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayState {
    Idle,
    Running,
    Paused,
    Finished,
}

#[derive(Debug)]
struct AnimInner {
    clock: FakeClock,
    state: PlayState,
    rate: f64,
    // The animation's own clock: `local_time = host_time_at_state_change
    // + rate * (clock.now() - host_time_at_state_change)` while running.
    anchor_host_time: Duration,
    anchor_local_time: Duration,
    total: Duration,
    keyframes: KeyframeSet,
    wakers: Vec<Waker>,
}

impl AnimInner {
    fn local_time(&self) -> Duration {
        match self.state {
            PlayState::Running => {
                let elapsed = self.clock.now().saturating_sub(self.anchor_host_time);
                let scaled = Duration::from_secs_f64(elapsed.as_secs_f64() * self.rate.max(0.0));
                self.anchor_local_time + scaled
            }
            _ => self.anchor_local_time,
        }
    }

    fn re_anchor(&mut self) {
        self.anchor_local_time = self.local_time();
        self.anchor_host_time = self.clock.now();
    }

    fn is_done(&self) -> bool {
        self.local_time() >= self.total
    }

    fn wake_all(&mut self) {
        for waker in self.wakers.drain(..) {
            waker.wake();
        }
    }
}

/// A host animation backed by [`FakeClock`].
#[derive(Debug, Clone)]
pub struct FakeAnimation(Rc<RefCell<AnimInner>>);

impl FakeAnimation {
    fn new(clock: FakeClock, total: Duration, keyframes: KeyframeSet) -> Self {
        FakeAnimation(Rc::new(RefCell::new(AnimInner {
            clock,
            state: PlayState::Idle,
            rate: 1.0,
            anchor_host_time: Duration::ZERO,
            anchor_local_time: Duration::ZERO,
            total,
            keyframes,
            wakers: Vec::new(),
        })))
    }

    /// The animation's own current time right now.
    pub fn elapsed(&self) -> Duration {
        self.0.borrow().local_time()
    }

    /// The keyframes currently assigned (for test assertions).
    pub fn keyframes(&self) -> KeyframeSet {
        self.0.borrow().keyframes.clone()
    }
}

impl HostAnimation for FakeAnimation {
    fn play(&self) {
        let mut inner = self.0.borrow_mut();
        if inner.state != PlayState::Running {
            inner.re_anchor();
            inner.state = PlayState::Running;
        }
        inner.wake_all();
    }

    fn pause(&self) {
        let mut inner = self.0.borrow_mut();
        inner.re_anchor();
        inner.state = PlayState::Paused;
        inner.wake_all();
    }

    fn finish(&self) {
        let mut inner = self.0.borrow_mut();
        let total = inner.total;
        inner.anchor_local_time = total;
        inner.anchor_host_time = inner.clock.now();
        inner.state = PlayState::Finished;
        inner.wake_all();
    }

    fn cancel(&self) {
        let mut inner = self.0.borrow_mut();
        inner.anchor_local_time = Duration::ZERO;
        inner.anchor_host_time = inner.clock.now();
        inner.state = PlayState::Idle;
        inner.wake_all();
    }

    fn set_playback_rate(&self, rate: f64) {
        let mut inner = self.0.borrow_mut();
        inner.re_anchor();
        inner.rate = rate;
    }

    fn current_time(&self) -> Duration {
        self.0.borrow().local_time()
    }

    fn set_current_time(&self, time: Duration) {
        let mut inner = self.0.borrow_mut();
        inner.anchor_local_time = time;
        inner.anchor_host_time = inner.clock.now();
        inner.wake_all();
    }

    fn set_keyframes(&self, keyframes: KeyframeSet) {
        self.0.borrow_mut().keyframes = keyframes;
    }

    fn commit_styles(&self) -> Result<(), CommitStylesFailure> {
        Ok(())
    }

    fn finished(&self) -> LocalBoxFuture<'static, ()> {
        let inner = self.0.clone();
        Box::pin(futures::future::poll_fn(move |cx: &mut Context<'_>| {
            let mut guard = inner.borrow_mut();
            if guard.state == PlayState::Finished || guard.is_done() {
                Poll::Ready(())
            } else {
                guard.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        }))
    }

    fn time_reached(&self, target: Duration) -> LocalBoxFuture<'static, ()> {
        let inner = self.0.clone();
        Box::pin(futures::future::poll_fn(move |cx: &mut Context<'_>| {
            let mut guard = inner.borrow_mut();
            if guard.state == PlayState::Finished || guard.local_time() >= target {
                Poll::Ready(())
            } else {
                guard.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        }))
    }
}

/// An in-memory stand-in for a DOM element.
#[derive(Debug, Clone)]
pub struct FakeElement(Rc<RefCell<FakeElementInner>>);

#[derive(Debug, Default)]
struct FakeElementInner {
    tag: String,
    classes: BTreeSet<String>,
    inline_styles: BTreeMap<String, String>,
    rendered: bool,
    rect: Rect,
    scroll_calls: Vec<ScrollOptions>,
}

impl FakeElement {
    /// Creates a rendered, class-free element with the given tag name.
    pub fn new(tag: impl Into<String>) -> Self {
        FakeElement(Rc::new(RefCell::new(FakeElementInner {
            tag: tag.into(),
            classes: BTreeSet::new(),
            inline_styles: BTreeMap::new(),
            rendered: true,
            rect: Rect::default(),
            scroll_calls: Vec::new(),
        })))
    }

    /// Builder: starts the element with `class` already applied.
    pub fn with_class(self, class: impl Into<String>) -> Self {
        self.add_class(&class.into());
        self
    }

    /// Forces `is_rendered()` to return `false` (e.g. to simulate an
    /// unrendered ancestor for `CommitStylesError` tests).
    pub fn set_rendered(&self, rendered: bool) {
        self.0.borrow_mut().rendered = rendered;
    }

    /// Sets the bounding rect this element reports.
    pub fn set_rect(&self, rect: Rect) {
        self.0.borrow_mut().rect = rect;
    }

    /// The number of times `scroll_into_view` was called.
    pub fn scroll_call_count(&self) -> usize {
        self.0.borrow().scroll_calls.len()
    }

    /// The value of an inline style, if set.
    pub fn inline_style(&self, property: &str) -> Option<String> {
        self.0.borrow().inline_styles.get(property).cloned()
    }

    /// Wraps a clone of this element as a type-erased [`ElementHandle`].
    pub fn handle(&self) -> ElementHandle {
        Rc::new(self.clone())
    }
}

impl HostElement for FakeElement {
    fn has_class(&self, class: &str) -> bool {
        self.0.borrow().classes.contains(class)
    }

    fn add_class(&self, class: &str) {
        self.0.borrow_mut().classes.insert(class.to_string());
    }

    fn remove_class(&self, class: &str) {
        self.0.borrow_mut().classes.remove(class);
    }

    fn set_inline_style(&self, property: &str, value: &str) {
        self.0
            .borrow_mut()
            .inline_styles
            .insert(property.to_string(), value.to_string());
    }

    fn remove_inline_style(&self, property: &str) {
        self.0.borrow_mut().inline_styles.remove(property);
    }

    fn is_rendered(&self) -> bool {
        self.0.borrow().rendered
    }

    fn bounding_rect(&self) -> Rect {
        self.0.borrow().rect
    }

    fn opening_tag(&self) -> String {
        let inner = self.0.borrow();
        if inner.classes.is_empty() {
            format!("<{}>", inner.tag)
        } else {
            let classes = inner.classes.iter().cloned().collect::<Vec<_>>().join(" ");
            format!("<{} class=\"{}\">", inner.tag, classes)
        }
    }

    fn scroll_into_view(&self, options: ScrollOptions) {
        self.0.borrow_mut().scroll_calls.push(options);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A [`Host`] over [`FakeElement`]/[`FakeAnimation`], sharing a
/// [`FakeClock`] with the test driving it.
#[derive(Debug, Clone)]
pub struct FakeHost {
    clock: FakeClock,
    animations: Rc<RefCell<Vec<FakeAnimation>>>,
}

impl FakeHost {
    /// Creates a new host with a fresh clock at time zero.
    pub fn new() -> Self {
        FakeHost {
            clock: FakeClock::new(),
            animations: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// The clock backing this host, so a test can share it with
    /// multiple hosts if needed.
    pub fn clock(&self) -> FakeClock {
        self.clock.clone()
    }

    /// Advances time and wakes any pending [`HostAnimation::finished`]
    /// futures whose animations are now done.
    pub fn drive(&self, dt: Duration) {
        self.clock.advance(dt);
        for anim in self.animations.borrow().iter() {
            let mut inner = anim.0.borrow_mut();
            if inner.state == PlayState::Running && inner.is_done() {
                inner.state = PlayState::Finished;
            }
            inner.wake_all();
        }
    }
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for FakeHost {
    fn animate(
        &self,
        _element: &ElementHandle,
        keyframes: KeyframeSet,
        timing: &Timing,
        _direction: PlaybackDirection,
    ) -> Box<dyn HostAnimation> {
        let total = timing.delay + timing.duration + timing.end_delay;
        let anim = FakeAnimation::new(self.clock.clone(), total, keyframes);
        self.animations.borrow_mut().push(anim.clone());
        Box::new(anim)
    }
}

#[allow(dead_code)]
fn assert_composite_is_copy(c: Composite) -> Composite {
    c
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::Timing;
    use crate::easing::Ease;

    fn timing(delay_ms: u64, dur_ms: u64, end_delay_ms: u64) -> Timing {
        Timing {
            delay: Duration::from_millis(delay_ms),
            duration: Duration::from_millis(dur_ms),
            end_delay: Duration::from_millis(end_delay_ms),
            playback_rate: 1.0,
            composite: Composite::Replace,
        }
    }

    #[test]
    fn play_advances_with_clock() {
        let host = FakeHost::new();
        let el = FakeElement::new("div").handle();
        let t = timing(0, 1000, 0);
        let anim = host.animate(&el, vec![], &t, PlaybackDirection::Forward);
        anim.play();
        host.drive(Duration::from_millis(500));
        assert_eq!(anim.current_time(), Duration::from_millis(500));
    }

    #[test]
    fn pause_freezes_time() {
        let host = FakeHost::new();
        let el = FakeElement::new("div").handle();
        let t = timing(0, 1000, 0);
        let anim = host.animate(&el, vec![], &t, PlaybackDirection::Forward);
        anim.play();
        host.drive(Duration::from_millis(300));
        anim.pause();
        host.drive(Duration::from_millis(700));
        assert_eq!(anim.current_time(), Duration::from_millis(300));
    }

    #[test]
    fn playback_rate_scales_elapsed() {
        let host = FakeHost::new();
        let el = FakeElement::new("div").handle();
        let t = timing(0, 1000, 0);
        let anim = host.animate(&el, vec![], &t, PlaybackDirection::Forward);
        anim.play();
        anim.set_playback_rate(2.0);
        host.drive(Duration::from_millis(250));
        assert_eq!(anim.current_time(), Duration::from_millis(500));
    }

    #[test]
    fn finish_jumps_to_total() {
        let host = FakeHost::new();
        let el = FakeElement::new("div").handle();
        let t = timing(100, 500, 50);
        let anim = host.animate(&el, vec![], &t, PlaybackDirection::Forward);
        anim.finish();
        assert_eq!(anim.current_time(), Duration::from_millis(650));
    }

    #[test]
    fn finished_future_resolves_after_drive_past_total() {
        let host = FakeHost::new();
        let el = FakeElement::new("div").handle();
        let t = timing(0, 100, 0);
        let anim = host.animate(&el, vec![], &t, PlaybackDirection::Forward);
        anim.play();

        let mut fut = anim.finished();
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);

        host.drive(Duration::from_millis(150));
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn element_class_roundtrip() {
        let el = FakeElement::new("div").with_class("is-hidden--display-none");
        assert!(el.has_class("is-hidden--display-none"));
        el.remove_class("is-hidden--display-none");
        assert!(!el.has_class("is-hidden--display-none"));
    }

    #[test]
    fn opening_tag_includes_classes() {
        let el = FakeElement::new("section").with_class("box");
        assert_eq!(el.opening_tag(), "<section class=\"box\">");
    }

    #[test]
    fn ease_default_is_usable_in_tests_module() {
        let _ = Ease::default();
    }
}
