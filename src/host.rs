//! The trait boundary between the scheduler and the runtime that
//! actually plays animations and renders frames (§1, §6: "the
//! animation engine itself... is delegated to an underlying host
//! API").
//!
//! [`host::web`] drives the real browser Web Animations API via
//! `web-sys`; it is only compiled for `wasm32` targets under the
//! `host-web` feature. [`host::fake`] is a deterministic, manually
//! advanced in-memory clock used by every test in this crate, and by
//! any consumer crate that wants to unit test its own effect
//! generators without a browser.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use futures::future::LocalBoxFuture;

#[cfg(feature = "host-web")]
pub mod web;

pub mod fake;

/// A CSS property/value pair snapshot for one keyframe offset.
pub type Keyframe = BTreeMap<String, String>;

/// A forward or backward keyframe list, host-ready (no percentages to
/// resolve — offsets are implicit, evenly spaced, matching how the Web
/// Animations API consumes a `Vec<Keyframe>`).
pub type KeyframeSet = Vec<Keyframe>;

/// `modifiers.composite` from the clip's data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Composite {
    /// Each new keyframe value replaces the previous one (default).
    #[default]
    Replace,
    /// New values accumulate onto the underlying value (`MotionClip`'s
    /// default, so translations stack).
    Accumulate,
    /// New values are added to the previous keyframe value.
    Add,
}

/// Which of a `ClipAnimation`'s two host animations is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlaybackDirection {
    /// Playing from delay toward end-delay.
    Forward,
    /// Playing from end-delay toward delay.
    Backward,
}

impl PlaybackDirection {
    /// The opposite direction.
    pub fn flipped(self) -> Self {
        match self {
            PlaybackDirection::Forward => PlaybackDirection::Backward,
            PlaybackDirection::Backward => PlaybackDirection::Forward,
        }
    }
}

/// Timing parameters a clip resolves and hands to the host when
/// creating a `HostAnimation` (§3 Clip.timing).
#[derive(Debug, Clone)]
pub struct Timing {
    /// Delay before the active phase starts.
    pub delay: Duration,
    /// Length of the active phase.
    pub duration: Duration,
    /// Delay after the active phase before the animation is "full"-finished.
    pub end_delay: Duration,
    /// Compounded playback rate (timeline x sequence x clip).
    pub playback_rate: f64,
    /// How new keyframe values combine with the underlying value.
    pub composite: Composite,
}

/// An opaque rectangle, as returned by [`HostElement::bounding_rect`].
/// The scheduler reads these but never computes layout itself (§1
/// non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    #[allow(missing_docs)]
    pub x: f64,
    #[allow(missing_docs)]
    pub y: f64,
    #[allow(missing_docs)]
    pub width: f64,
    #[allow(missing_docs)]
    pub height: f64,
}

/// `window.scrollTo`-style options for the `~scroll-self` effect and
/// the scroll-anchor stack (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollOptions {
    /// Whether the scroll should be instant or smooth.
    pub smooth: bool,
}

/// A handle to a single DOM element. Cloning is cheap (a handle, not a
/// deep copy); equality is identity.
pub trait HostElement: fmt::Debug {
    /// Whether `class` is present on the element right now.
    fn has_class(&self, class: &str) -> bool;
    /// Adds `class`, if not already present.
    fn add_class(&self, class: &str);
    /// Removes `class`, if present.
    fn remove_class(&self, class: &str);
    /// Sets one inline style property, used by `TransitionClip` and by
    /// forceful style commit.
    fn set_inline_style(&self, property: &str, value: &str);
    /// Clears one inline style property.
    fn remove_inline_style(&self, property: &str);
    /// Whether the element (and its ancestors) currently render a box
    /// — `false` after `display: none` up the tree.
    fn is_rendered(&self) -> bool;
    /// The element's current bounding box, as the host measures it.
    fn bounding_rect(&self) -> Rect;
    /// A short opening-tag rendering for error messages, e.g.
    /// `<div class="box">`.
    fn opening_tag(&self) -> String;
    /// Scrolls the element into view per `options`.
    fn scroll_into_view(&self, options: ScrollOptions);
    /// Exposes the concrete element type, so a [`Host`] implementation
    /// can recover its own element type from an [`ElementHandle`] (the
    /// scheduling core itself never downcasts).
    fn as_any(&self) -> &dyn std::any::Any;
}

/// A single running (or paused) host animation — one direction of one
/// clip's [`crate::clip_animation::ClipAnimation`].
pub trait HostAnimation: fmt::Debug {
    /// Starts or resumes playback.
    fn play(&self);
    /// Pauses at the current time.
    fn pause(&self);
    /// Jumps to the end of the animation and fires completion.
    fn finish(&self);
    /// Stops and discards all effect from the animation.
    fn cancel(&self);
    /// Sets the playback rate (can be called while playing).
    fn set_playback_rate(&self, rate: f64);
    /// The animation's own current time, honoring rate/pause (host
    /// sub-frame accuracy).
    fn current_time(&self) -> Duration;
    /// Seeks the animation's current time directly.
    fn set_current_time(&self, time: Duration);
    /// Replaces the effect's keyframes in place (used when a generator
    /// is deferred until play-time, §4.2 `computeNow = false`).
    fn set_keyframes(&self, keyframes: KeyframeSet);
    /// Persists the animation's current computed styles onto the
    /// element as real inline styles. Fails if the element isn't
    /// currently rendered.
    fn commit_styles(&self) -> Result<(), CommitStylesFailure>;
    /// Resolves once the animation reaches its finished play state.
    fn finished(&self) -> LocalBoxFuture<'static, ()>;
    /// Resolves once the animation's own current time reaches
    /// `target`, honoring pause and playback-rate changes in the
    /// meantime (the host-level primitive behind a clip's phase-indexed
    /// time promises).
    fn time_reached(&self, target: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Returned by [`HostAnimation::commit_styles`] on failure, so callers
/// can decide whether to retry with a forceful unhide (§4.2 commit
/// policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitStylesFailure;

/// A handle to a target element, type-erased so that the scheduling
/// core (`clip`, `sequence`, `timeline`, `facade`) never needs to be
/// generic over a concrete host's element type. Cloning is an `Rc`
/// clone (cheap, shares the same underlying element).
pub type ElementHandle = std::rc::Rc<dyn HostElement>;

/// The root capability object: creates animations bound to elements,
/// and performs host-level scroll operations. One `Host` backs an
/// entire [`crate::facade::Facade`].
pub trait Host: fmt::Debug {
    /// Creates a host animation for `element` playing `keyframes`
    /// under `timing`, in `direction`.
    fn animate(
        &self,
        element: &ElementHandle,
        keyframes: KeyframeSet,
        timing: &Timing,
        direction: PlaybackDirection,
    ) -> Box<dyn HostAnimation>;

    /// Scrolls `element` into view per `options`.
    fn scroll_into_view(&self, element: &ElementHandle, options: ScrollOptions) {
        element.scroll_into_view(options);
    }
}
