//! Binds a target element, an effect, and timing; drives one
//! [`ClipAnimation`] through its phases and applies category-specific
//! side effects (§4.2).

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::clip_animation::{ClipAnimation, PhaseHooks, PhasePosition};
use crate::error::{ClipContext, Location, Result, StagehandError};
use crate::host::{Composite, ElementHandle, Host, HostElement, KeyframeSet, PlaybackDirection, Timing};
use crate::easing::Ease;
use crate::ids::ClipId;
use crate::sequence::AnimSequence;
use crate::time_position::TimePosition;
use crate::timeline::AnimTimeline;

/// The display-none hiding class recognized by Entrance/Exit clips.
pub const DISPLAY_NONE_CLASS: &str = "stagehand-display-none";
/// The visibility-hidden hiding class recognized by Entrance/Exit clips.
pub const VISIBILITY_HIDDEN_CLASS: &str = "stagehand-visibility-hidden";
/// Applied during a forceful style commit to temporarily unhide an
/// element, then removed once the styles are persisted.
pub const FORCE_OVERRIDE_CLASS: &str = "stagehand-force-override";

/// `hideNowType` / `exitType` — which hiding class a clip manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideKind {
    /// `display: none`.
    DisplayNone,
    /// `visibility: hidden`.
    VisibilityHidden,
}

impl HideKind {
    fn class_name(self) -> &'static str {
        match self {
            HideKind::DisplayNone => DISPLAY_NONE_CLASS,
            HideKind::VisibilityHidden => VISIBILITY_HIDDEN_CLASS,
        }
    }

    fn recognized(class: &str) -> Option<HideKind> {
        match class {
            DISPLAY_NONE_CLASS => Some(HideKind::DisplayNone),
            VISIBILITY_HIDDEN_CLASS => Some(HideKind::VisibilityHidden),
            _ => None,
        }
    }
}

/// A point on a connector line: the anchored element plus its parsed
/// placement strings (the scheduler passes these through without
/// interpreting them — layout math is a host/consumer concern).
#[derive(Debug, Clone)]
pub struct ConnectorPoint {
    /// The anchored element.
    pub element: ElementHandle,
    /// Parsed horizontal placement (e.g. `"50%"`, `"left"`).
    pub x_placement: String,
    /// Parsed vertical placement.
    pub y_placement: String,
}

/// The external connector-line contract (§6, consumed not rendered).
pub trait ConnectorElement: std::fmt::Debug {
    /// Current endpoint A.
    fn point_a(&self) -> ConnectorPoint;
    /// Current endpoint B.
    fn point_b(&self) -> ConnectorPoint;
    /// Sets both endpoints.
    fn set_points(&self, a: ConnectorPoint, b: ConnectorPoint);
    /// Whether continuous endpoint tracking is enabled.
    fn point_tracking_enabled(&self) -> bool;
    /// Recomputes endpoints once, from current element positions.
    fn update_endpoints(&self);
    /// Starts a continuous endpoint-tracking loop.
    fn continuously_update_endpoints(&self);
    /// Cancels a continuous endpoint-tracking loop started above.
    fn cancel_continuous_updates(&self);
}

#[derive(Debug, Clone)]
struct StashedConnectorState {
    point_a: ConnectorPoint,
    point_b: ConnectorPoint,
    point_tracking_enabled: bool,
}

/// One clip's position in its category's taxonomy, carrying whatever
/// per-category state its lifecycle needs. Modeled as a closed tagged
/// variant (Design Note §9) rather than open trait-object inheritance,
/// the same way [`crate::easing::Ease`] closes over its curve families.
#[derive(Debug)]
pub enum ClipCategory {
    /// Reveals a hidden element.
    Entrance { hide_now_type: Option<HideKind>, remembered: Cell<Option<HideKind>> },
    /// Hides a visible element.
    Exit { exit_type: HideKind },
    /// Repositions a connector's endpoints instantly (duration forced
    /// to 0, `starts_next_clip_too` forced true).
    ConnectorSetter {
        connector: Rc<dyn ConnectorElement>,
        point_a: ConnectorPoint,
        point_b: ConnectorPoint,
        stashed: RefCell<Option<StashedConnectorState>>,
    },
    /// Reveals a connector line, optionally tracking endpoints live.
    ConnectorEntrance { connector: Rc<dyn ConnectorElement> },
    /// Hides a connector line, canceling any tracking loop.
    ConnectorExit { connector: Rc<dyn ConnectorElement> },
    /// Animates a CSS property from one value to another.
    Transition { remove_inline_styles_on_finish: bool, touched_properties: RefCell<Vec<String>> },
    /// Translates/transforms an element; defaults to accumulating composite.
    Motion,
    /// A non-hiding, non-moving visual effect (highlight, pulse, ...).
    Emphasis,
    /// Scrolls an element or the viewport.
    Scroller,
}

impl ClipCategory {
    /// A short, stable name for error locations and logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClipCategory::Entrance { .. } => "Entrance",
            ClipCategory::Exit { .. } => "Exit",
            ClipCategory::ConnectorSetter { .. } => "ConnectorSetter",
            ClipCategory::ConnectorEntrance { .. } => "ConnectorEntrance",
            ClipCategory::ConnectorExit { .. } => "ConnectorExit",
            ClipCategory::Transition { .. } => "Transition",
            ClipCategory::Motion => "Motion",
            ClipCategory::Emphasis => "Emphasis",
            ClipCategory::Scroller => "Scroller",
        }
    }

    /// The composite mode this category defaults to, absent an
    /// explicit override (`MotionClip` accumulates so translations
    /// stack, §4.2).
    pub fn default_composite(&self) -> Composite {
        match self {
            ClipCategory::Motion => Composite::Accumulate,
            _ => Composite::Replace,
        }
    }

    /// Duration override this category forces, if any
    /// (`ConnectorSetterClip` is instantaneous).
    pub fn forced_duration(&self) -> Option<std::time::Duration> {
        match self {
            ClipCategory::ConnectorSetter { .. } => Some(std::time::Duration::ZERO),
            _ => None,
        }
    }

    /// Whether this category forces `starts_next_clip_too`.
    pub fn forces_starts_next_clip_too(&self) -> bool {
        matches!(self, ClipCategory::ConnectorSetter { .. })
    }

    fn on_start_forward(&self, element: &ElementHandle) -> Result<()> {
        match self {
            ClipCategory::Entrance { hide_now_type: _, remembered } => {
                let found = [HideKind::DisplayNone, HideKind::VisibilityHidden]
                    .into_iter()
                    .find(|k| element.has_class(k.class_name()));
                let Some(kind) = found else {
                    return Err(StagehandError::InvalidEntranceAttempt {
                        reason: format!(
                            "{} is not hidden by a recognized class",
                            element.opening_tag()
                        ),
                        location: Location::default(),
                    });
                };
                remembered.set(Some(kind));
                element.remove_class(kind.class_name());
                Ok(())
            }
            ClipCategory::ConnectorSetter { connector, point_a, point_b, stashed } => {
                *stashed.borrow_mut() = Some(StashedConnectorState {
                    point_a: connector.point_a(),
                    point_b: connector.point_b(),
                    point_tracking_enabled: connector.point_tracking_enabled(),
                });
                connector.set_points(point_a.clone(), point_b.clone());
                Ok(())
            }
            ClipCategory::ConnectorEntrance { connector } => {
                element.remove_class(DISPLAY_NONE_CLASS);
                element.remove_class(VISIBILITY_HIDDEN_CLASS);
                connector.update_endpoints();
                if connector.point_tracking_enabled() {
                    connector.continuously_update_endpoints();
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_finish_forward(&self, element: &ElementHandle) -> Result<()> {
        match self {
            ClipCategory::Exit { exit_type } => {
                element.add_class(exit_type.class_name());
                Ok(())
            }
            ClipCategory::ConnectorExit { connector } => {
                connector.cancel_continuous_updates();
                element.add_class(DISPLAY_NONE_CLASS);
                Ok(())
            }
            ClipCategory::Transition { remove_inline_styles_on_finish, touched_properties } => {
                if *remove_inline_styles_on_finish {
                    for property in touched_properties.borrow().iter() {
                        element.remove_inline_style(property);
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_start_backward(&self, element: &ElementHandle) -> Result<()> {
        match self {
            ClipCategory::Exit { exit_type } => {
                element.remove_class(exit_type.class_name());
                Ok(())
            }
            ClipCategory::ConnectorExit { connector } => {
                element.remove_class(DISPLAY_NONE_CLASS);
                connector.update_endpoints();
                if connector.point_tracking_enabled() {
                    connector.continuously_update_endpoints();
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_finish_backward(&self, element: &ElementHandle) -> Result<()> {
        match self {
            ClipCategory::Entrance { remembered, .. } => {
                if let Some(kind) = remembered.take() {
                    element.add_class(kind.class_name());
                }
                Ok(())
            }
            ClipCategory::ConnectorSetter { connector, stashed, .. } => {
                if let Some(prev) = stashed.borrow_mut().take() {
                    connector.set_points(prev.point_a, prev.point_b);
                    if prev.point_tracking_enabled {
                        connector.continuously_update_endpoints();
                    }
                }
                Ok(())
            }
            ClipCategory::ConnectorEntrance { connector } => {
                connector.cancel_continuous_updates();
                element.add_class(DISPLAY_NONE_CLASS);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// A single argument passed to an effect generator.
#[derive(Debug, Clone)]
pub enum EffectArg {
    /// A numeric argument (pixel offset, angle, ...).
    Number(f64),
    /// A string argument (CSS value, direction keyword, ...).
    Text(String),
    /// A boolean flag.
    Flag(bool),
}

/// Arguments passed positionally to an effect generator.
pub type EffectArgs = Vec<EffectArg>;

/// `a + (b - a) * progress` — the helper mutator-style generators use
/// to interpolate a single numeric property by hand (§4.2).
pub fn compute_tween(a: f64, b: f64, progress: f64) -> f64 {
    a + (b - a) * progress
}

type KeyframeFn = Rc<dyn Fn() -> KeyframeSet>;
type MutatorFn = Rc<RefCell<dyn FnMut(f64)>>;
type MutatorFactory = Rc<dyn Fn() -> MutatorFn>;

/// One of the four effect-generator shapes a bank entry may supply,
/// probed in this preference order by [`AnimClip::resolve_effect`] (§4.2).
pub enum EffectGenerator {
    /// Eagerly computed forward/backward keyframe lists.
    Keyframes(Rc<dyn Fn(&EffectArgs) -> (KeyframeSet, Option<KeyframeSet>)>),
    /// Functions that compute keyframe lists when called (deferred).
    KeyframeGenerators(Rc<dyn Fn(&EffectArgs) -> (KeyframeFn, Option<KeyframeFn>)>),
    /// Per-frame mutator callbacks driven by the host's frame tick.
    RafMutators(Rc<dyn Fn(&EffectArgs) -> (MutatorFn, MutatorFn)>),
    /// Factories that build per-frame mutators when called (deferred).
    RafMutatorGenerators(Rc<dyn Fn(&EffectArgs) -> (MutatorFactory, MutatorFactory)>),
}

impl std::fmt::Debug for EffectGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self {
            EffectGenerator::Keyframes(_) => "Keyframes",
            EffectGenerator::KeyframeGenerators(_) => "KeyframeGenerators",
            EffectGenerator::RafMutators(_) => "RafMutators",
            EffectGenerator::RafMutatorGenerators(_) => "RafMutatorGenerators",
        };
        f.debug_tuple("EffectGenerator").field(&shape).finish()
    }
}

/// CSS class side effects applied at phase boundaries (§3 `modifiers.cssClasses`).
#[derive(Debug, Clone, Default)]
pub struct CssClassModifiers {
    /// Added when the forward run starts.
    pub to_add_on_start: Vec<String>,
    /// Added when the forward run finishes.
    pub to_add_on_finish: Vec<String>,
    /// Removed when the forward run starts.
    pub to_remove_on_start: Vec<String>,
    /// Removed when the forward run finishes.
    pub to_remove_on_finish: Vec<String>,
}

/// Non-timing, non-sequencing clip configuration (§3 `modifiers`).
#[derive(Debug, Clone)]
pub struct ClipModifiers {
    /// Class add/remove lists for start/finish of the forward run.
    pub css_classes: CssClassModifiers,
    /// How new keyframe values combine with the underlying value.
    pub composite: Option<Composite>,
    /// Whether to persist final computed styles after the active phase.
    pub commits_styles: bool,
    /// Whether to force a temporary unhide to commit styles.
    pub commit_styles_forcefully: bool,
}

impl Default for ClipModifiers {
    fn default() -> Self {
        ClipModifiers {
            css_classes: CssClassModifiers::default(),
            composite: None,
            commits_styles: false,
            commit_styles_forcefully: false,
        }
    }
}

/// Author-facing timing configuration, before compounding with parent
/// playback rates (§3 `timing`).
#[derive(Debug, Clone)]
pub struct ClipTiming {
    /// Delay before the active phase starts.
    pub delay: std::time::Duration,
    /// Length of the active phase.
    pub duration: std::time::Duration,
    /// Delay after the active phase.
    pub end_delay: std::time::Duration,
    /// The named easing curve applied to mutator-style effects.
    pub easing: Ease,
    /// This clip's own contribution to the compounded playback rate.
    pub playback_rate: f64,
}

impl Default for ClipTiming {
    fn default() -> Self {
        ClipTiming {
            delay: std::time::Duration::ZERO,
            duration: std::time::Duration::from_millis(500),
            end_delay: std::time::Duration::ZERO,
            easing: Ease::default(),
            playback_rate: 1.0,
        }
    }
}

/// `startsWithPrevious` / `startsNextClipToo` (§3 `sequencing flags`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SequencingFlags {
    /// Joins the previous clip's group, anchored to its active start.
    pub starts_with_previous: bool,
    /// Forces the next clip to join this clip's group.
    pub starts_next_clip_too: bool,
}

/// Whether effect generators ran at construction (cached) or are
/// deferred until each direction's active phase starts (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeNow {
    /// Run once, at clip construction.
    Eager,
    /// Run at the start of each direction's active phase.
    Deferred,
}

/// The four derived times assigned during a sequence's commit (§3, I4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduledTimes {
    /// When the clip's delay phase begins.
    pub full_start_time: std::time::Duration,
    /// When the clip's active phase begins (`full_start_time + delay`).
    pub active_start_time: std::time::Duration,
    /// When the clip's active phase ends (`active_start_time + duration`).
    pub active_finish_time: std::time::Duration,
    /// When the clip's end-delay phase ends (`active_finish_time + end_delay`).
    pub full_finish_time: std::time::Duration,
}

impl ScheduledTimes {
    /// Computes and validates I4 (each derived time ≥ the previous).
    pub fn compute(full_start_time: std::time::Duration, timing: &ClipTiming) -> Self {
        let active_start_time = full_start_time + timing.delay;
        let active_finish_time = active_start_time + timing.duration;
        let full_finish_time = active_finish_time + timing.end_delay;
        debug_assert!(full_start_time <= active_start_time);
        debug_assert!(active_start_time <= active_finish_time);
        debug_assert!(active_finish_time <= full_finish_time);
        ScheduledTimes { full_start_time, active_start_time, active_finish_time, full_finish_time }
    }
}

/// Playback status flags (§3 `status`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipStatus {
    /// Currently running or paused mid-run.
    pub in_progress: bool,
    /// In-progress and not paused.
    pub is_running: bool,
    /// In-progress and paused.
    pub is_paused: bool,
    /// The most recent completed run was forward.
    pub was_played: bool,
    /// The most recent completed run was backward.
    pub was_rewound: bool,
}

/// A back-reference to whichever owner (sequence, or the clip itself)
/// is responsible for pausing on error (§4.2 error-routing).
pub trait PauseRoot {
    /// Pauses this owner's currently in-progress children.
    fn pause_root(&self);
}

/// C2: binds a target element, an effect, and timing; drives one
/// [`ClipAnimation`] through its phases (§4.2).
pub struct AnimClip {
    id: ClipId,
    element: ElementHandle,
    effect_name: String,
    pub(crate) category: ClipCategory,
    args: EffectArgs,
    generator: EffectGenerator,
    cached_frames: RefCell<Option<(KeyframeSet, Option<KeyframeSet>)>>,
    timing: ClipTiming,
    modifiers: ClipModifiers,
    sequencing: SequencingFlags,
    compute_now: ComputeNow,
    parent_sequence: RefCell<Weak<RefCell<AnimSequence>>>,
    parent_timeline: RefCell<Weak<RefCell<AnimTimeline>>>,
    status: RefCell<ClipStatus>,
    scheduled: Cell<Option<ScheduledTimes>>,
    clip_animation: RefCell<Option<ClipAnimation>>,
    compounded_rate: Cell<f64>,
}

impl std::fmt::Debug for AnimClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimClip")
            .field("id", &self.id)
            .field("category", &self.category.name())
            .field("effect_name", &self.effect_name)
            .finish_non_exhaustive()
    }
}

impl AnimClip {
    /// Builds a new, unparented clip. Called by [`crate::facade::Facade`]'s
    /// category factory methods, never directly by authors.
    pub fn new(
        element: ElementHandle,
        effect_name: impl Into<String>,
        category: ClipCategory,
        args: EffectArgs,
        generator: EffectGenerator,
        mut timing: ClipTiming,
        mut modifiers: ClipModifiers,
        mut sequencing: SequencingFlags,
        compute_now: ComputeNow,
    ) -> Self {
        if let Some(forced) = category.forced_duration() {
            timing.duration = forced;
        }
        if category.forces_starts_next_clip_too() {
            sequencing.starts_next_clip_too = true;
        }
        if modifiers.composite.is_none() {
            modifiers.composite = Some(category.default_composite());
        }
        if let ClipCategory::Entrance { hide_now_type: Some(kind), .. } = &category {
            element.add_class(kind.class_name());
        }
        AnimClip {
            id: ClipId::unique(),
            element,
            effect_name: effect_name.into(),
            category,
            args,
            generator,
            cached_frames: RefCell::new(None),
            timing,
            modifiers,
            sequencing,
            compute_now,
            parent_sequence: RefCell::new(Weak::new()),
            parent_timeline: RefCell::new(Weak::new()),
            status: RefCell::new(ClipStatus::default()),
            scheduled: Cell::new(None),
            clip_animation: RefCell::new(None),
            compounded_rate: Cell::new(1.0),
        }
    }

    /// This clip's unique id.
    pub fn id(&self) -> ClipId {
        self.id
    }

    /// The clip's sequencing flags, as configured at construction.
    pub fn sequencing(&self) -> SequencingFlags {
        self.sequencing
    }

    /// The clip's author-facing timing (unscaled).
    pub fn timing(&self) -> &ClipTiming {
        &self.timing
    }

    /// The clip's current status flags.
    pub fn status(&self) -> ClipStatus {
        *self.status.borrow()
    }

    /// The times a commit assigned this clip, if it has been committed.
    pub fn scheduled_times(&self) -> Option<ScheduledTimes> {
        self.scheduled.get()
    }

    /// Assigns this clip's scheduled times (called by the owning
    /// sequence's commit pass).
    pub fn set_scheduled_times(&self, times: ScheduledTimes) {
        self.scheduled.set(Some(times));
    }

    /// Attaches this clip to a sequence (I1). Fails if already parented.
    pub fn attach_to_sequence(
        self: &Rc<RefCell<Self>>,
        sequence: &Rc<RefCell<AnimSequence>>,
        timeline: Option<&Rc<RefCell<AnimTimeline>>>,
    ) -> Result<()> {
        let this = self.borrow();
        {
            let mut slot = this.parent_sequence.borrow_mut();
            if slot.upgrade().is_some() {
                return Err(StagehandError::InvalidChild {
                    reason: "clip is already owned by a sequence".into(),
                    location: Location::default(),
                });
            }
            *slot = Rc::downgrade(sequence);
        }
        if let Some(timeline) = timeline {
            *this.parent_timeline.borrow_mut() = Rc::downgrade(timeline);
        }
        Ok(())
    }

    /// Resolves the effect generator to concrete forward/backward
    /// keyframes, honoring [`ComputeNow`] and caching eager results
    /// exactly once (§4.2).
    fn ensure_frames(&self, direction: PlaybackDirection) -> Result<(KeyframeSet, Option<KeyframeSet>)> {
        if self.compute_now == ComputeNow::Eager {
            if let Some(cached) = self.cached_frames.borrow().clone() {
                return Ok(cached);
            }
        }
        let frames = match &self.generator {
            EffectGenerator::Keyframes(f) => f(&self.args),
            EffectGenerator::KeyframeGenerators(f) => {
                let (fwd, bwd) = f(&self.args);
                (fwd(), bwd.map(|b| b()))
            }
            EffectGenerator::RafMutators(_) | EffectGenerator::RafMutatorGenerators(_) => {
                // Mutator-shaped generators drive the host frame-by-frame
                // rather than through keyframes; nothing to precompute here.
                (KeyframeSet::new(), None)
            }
        };
        let _ = direction;
        if self.compute_now == ComputeNow::Eager {
            *self.cached_frames.borrow_mut() = Some(frames.clone());
        }
        Ok(frames)
    }

    fn build_clip_animation(&self, host: &dyn Host) -> Result<ClipAnimation> {
        let (forward_frames, backward_frames) = self.ensure_frames(PlaybackDirection::Forward)?;
        let composite = self.modifiers.composite.unwrap_or(Composite::Replace);

        let forward_timing = Timing {
            delay: self.timing.delay,
            duration: self.timing.duration,
            end_delay: self.timing.end_delay,
            playback_rate: self.compounded_rate.get(),
            composite,
        };
        let backward_timing = Timing {
            delay: self.timing.end_delay,
            duration: self.timing.duration,
            end_delay: self.timing.delay,
            playback_rate: self.compounded_rate.get(),
            composite,
        };

        let forward_anim = host.animate(&self.element, forward_frames.clone(), &forward_timing, PlaybackDirection::Forward);
        let backward_frames = backward_frames.unwrap_or(forward_frames);
        let backward_anim = host.animate(&self.element, backward_frames, &backward_timing, PlaybackDirection::Backward);

        Ok(ClipAnimation::new(forward_anim, backward_anim, forward_timing, backward_timing))
    }

    /// Ensures this clip has a live [`ClipAnimation`], building one on
    /// first use.
    fn with_clip_animation<R>(&self, host: &dyn Host, f: impl FnOnce(&ClipAnimation) -> R) -> Result<R> {
        if self.clip_animation.borrow().is_none() {
            let built = self.build_clip_animation(host)?;
            *self.clip_animation.borrow_mut() = Some(built);
        }
        let guard = self.clip_animation.borrow();
        Ok(f(guard.as_ref().expect("just populated above")))
    }

    fn apply_classes(&self, list: &[String], add: bool) {
        for class in list {
            if add {
                self.element.add_class(class);
            } else {
                self.element.remove_class(class);
            }
        }
    }

    fn commit_styles_if_configured(&self) -> Result<()> {
        if !self.modifiers.commits_styles {
            return Ok(());
        }
        if self.clip_animation.borrow().is_none() {
            return Ok(());
        }
        let result = self
            .clip_animation
            .borrow()
            .as_ref()
            .expect("checked above")
            .commit_styles(PlaybackDirection::Forward);
        if result.is_ok() {
            return Ok(());
        }
        if !self.modifiers.commit_styles_forcefully {
            return Err(StagehandError::CommitStyles {
                reason: format!("{} is not currently rendered", self.element.opening_tag()),
                location: Location::default(),
            });
        }
        self.element.add_class(FORCE_OVERRIDE_CLASS);
        let retried = self
            .clip_animation
            .borrow()
            .as_ref()
            .expect("checked above")
            .commit_styles(PlaybackDirection::Forward);
        self.element.remove_class(FORCE_OVERRIDE_CLASS);
        retried.map_err(|_| StagehandError::CommitStyles {
            reason: format!(
                "{} could not be committed even with a forceful unhide (an ancestor is unrendered)",
                self.element.opening_tag()
            ),
            location: Location::default(),
        })
    }

    /// Runs this clip through one full direction, applying category
    /// lifecycle hooks and class modifiers at the right boundaries.
    /// Called only by the owning sequence — never directly (§4.2
    /// `ChildPlaybackError`, enforced by [`AnimClip::play_standalone`]
    /// being absent from the public surface).
    pub async fn run(
        self: &Rc<RefCell<Self>>,
        host: &dyn Host,
        direction: PlaybackDirection,
        skipping: bool,
        error_root: &dyn PauseRoot,
    ) -> Result<()> {
        {
            let this = self.borrow();
            this.status.borrow_mut().in_progress = true;
            this.status.borrow_mut().is_running = true;
            this.status.borrow_mut().is_paused = false;
        }

        let start_result = {
            let this = self.borrow();
            let element = this.element.clone();
            match direction {
                PlaybackDirection::Forward => {
                    this.apply_classes(&this.modifiers.css_classes.to_add_on_start, true);
                    this.apply_classes(&this.modifiers.css_classes.to_remove_on_start, false);
                    this.category.on_start_forward(&element)
                }
                PlaybackDirection::Backward => this.category.on_start_backward(&element),
            }
        };
        if let Err(err) = start_result {
            error_root.pause_root();
            self.borrow().status.borrow_mut().in_progress = false;
            return Err(err);
        }

        self.borrow().with_clip_animation(host, |_| ())?;

        let hooks = ClipHooks { clip: self.clone() };
        {
            let this = self.borrow();
            let guard = this.clip_animation.borrow();
            let clip_anim = guard.as_ref().expect("built above");
            // Extend the borrow's effective lifetime by running to
            // completion inside this block; `clip_anim` does not escape.
            clip_anim.run(direction, &hooks, skipping).await;
        }

        let finish_result = {
            let this = self.borrow();
            let element = this.element.clone();
            match direction {
                PlaybackDirection::Forward => {
                    let r = this.category.on_finish_forward(&element);
                    this.apply_classes(&this.modifiers.css_classes.to_add_on_finish, true);
                    this.apply_classes(&this.modifiers.css_classes.to_remove_on_finish, false);
                    r
                }
                PlaybackDirection::Backward => this.category.on_finish_backward(&element),
            }
        };

        if direction == PlaybackDirection::Forward {
            self.borrow().commit_styles_if_configured()?;
        }

        {
            let this = self.borrow();
            let mut status = this.status.borrow_mut();
            status.in_progress = false;
            status.is_running = false;
            status.is_paused = false;
            match direction {
                PlaybackDirection::Forward => {
                    status.was_played = true;
                    status.was_rewound = false;
                }
                PlaybackDirection::Backward => {
                    status.was_played = false;
                    status.was_rewound = true;
                }
            }
        }

        if let Err(err) = finish_result {
            error_root.pause_root();
            return Err(err);
        }
        Ok(())
    }

    /// Pauses this clip's in-progress animation in the given direction.
    pub fn pause(&self, direction: PlaybackDirection) {
        if let Some(anim) = self.clip_animation.borrow().as_ref() {
            anim.pause(direction);
        }
        let mut status = self.status.borrow_mut();
        status.is_running = false;
        status.is_paused = true;
    }

    /// Resumes this clip after [`AnimClip::pause`].
    pub fn unpause(&self) {
        let mut status = self.status.borrow_mut();
        status.is_running = true;
        status.is_paused = false;
    }

    /// Applies a freshly compounded playback rate (timeline x sequence
    /// x clip, §4.4).
    pub fn use_compounded_playback_rate(&self, parent_rate: f64, direction: PlaybackDirection) {
        let rate = parent_rate * self.timing.playback_rate;
        self.compounded_rate.set(rate);
        if let Some(anim) = self.clip_animation.borrow().as_ref() {
            anim.set_playback_rate(direction, rate);
        }
    }

    /// Builds this clip's [`ClipAnimation`] if it doesn't exist yet,
    /// without starting playback. Lets the owning sequence wire up
    /// cross-clip integrity blocks (which need a time promise from each
    /// clip's animation) before any group member's `run()` is polled.
    pub fn ensure_clip_animation(&self, host: &dyn Host) -> Result<()> {
        self.with_clip_animation(host, |_| ())
    }

    /// Registers an engine-inserted awaitable at `at` in `direction`.
    pub fn add_integrity_blocks(
        &self,
        direction: PlaybackDirection,
        at: PhasePosition,
        promises: Vec<std::pin::Pin<Box<dyn std::future::Future<Output = ()>>>>,
    ) -> Result<()> {
        self.with_clip_animation_sync(|anim| anim.add_integrity_blocks(direction, at, promises))
    }

    /// Registers a user-supplied awaitable at `at` in `direction`.
    pub fn add_roadblocks(
        &self,
        direction: PlaybackDirection,
        at: PhasePosition,
        promises: Vec<std::pin::Pin<Box<dyn std::future::Future<Output = ()>>>>,
    ) -> Result<()> {
        self.with_clip_animation_sync(|anim| anim.add_roadblocks(direction, at, promises))
    }

    fn with_clip_animation_sync<R>(&self, f: impl FnOnce(&ClipAnimation) -> Result<R>) -> Result<R> {
        let guard = self.clip_animation.borrow();
        let anim = guard.as_ref().ok_or_else(|| StagehandError::InvalidChild {
            reason: "clip has not started; blocks can only be added once playback has begun".into(),
            location: Location::default(),
        })?;
        f(anim)
    }

    /// Returns a time promise for `at` in `direction` (§4.1
    /// `generateTimePromise`, re-exposed at the clip level since this
    /// is the granularity the owning sequence's commit pass works at).
    pub fn generate_time_promise(
        &self,
        direction: PlaybackDirection,
        at: PhasePosition,
    ) -> Result<futures::future::LocalBoxFuture<'static, ()>> {
        let guard = self.clip_animation.borrow();
        let anim = guard.as_ref().ok_or_else(|| StagehandError::InvalidChild {
            reason: "clip has not started; no time promise available yet".into(),
            location: Location::default(),
        })?;
        anim.generate_time_promise(direction, at)
    }

    /// Returns a future resolved once `direction`'s animation reaches an
    /// arbitrary absolute clip-local offset (§4.3 backward playback's
    /// fullFinish/fullStart intersection wait).
    pub fn time_reached_at(
        &self,
        direction: PlaybackDirection,
        target: std::time::Duration,
    ) -> Result<futures::future::LocalBoxFuture<'static, ()>> {
        let guard = self.clip_animation.borrow();
        let anim = guard.as_ref().ok_or_else(|| StagehandError::InvalidChild {
            reason: "clip has not started; no time promise available yet".into(),
            location: Location::default(),
        })?;
        Ok(anim.time_reached_at(direction, target))
    }

    /// Forces this clip's currently in-progress animation to completion
    /// (§4.3 `finish()` telling already-running clips to finish now). A
    /// no-op if the clip has no live animation yet.
    pub fn finish_now(&self, direction: PlaybackDirection) {
        if let Some(anim) = self.clip_animation.borrow().as_ref() {
            anim.finish(direction);
        }
    }

    /// This clip's error-location context.
    pub fn error_context(&self) -> ClipContext {
        ClipContext {
            category: self.category.name(),
            effect_name: self.effect_name.clone(),
            element_tag: Some(self.element.opening_tag()),
        }
    }
}

struct ClipHooks {
    clip: Rc<RefCell<AnimClip>>,
}

impl PhaseHooks for ClipHooks {
    fn on_delay_finish(&self, _direction: PlaybackDirection) {
        tracing::trace!(clip = ?self.clip.borrow().id, phase = "delay", "phase finished");
    }

    fn on_active_finish(&self, _direction: PlaybackDirection) {
        tracing::trace!(clip = ?self.clip.borrow().id, phase = "active", "phase finished");
    }

    fn on_end_delay_finish(&self, _direction: PlaybackDirection) {
        tracing::trace!(clip = ?self.clip.borrow().id, phase = "end_delay", "phase finished");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::fake::{FakeElement, FakeHost};

    fn keyframes_generator() -> EffectGenerator {
        EffectGenerator::Keyframes(Rc::new(|_args: &EffectArgs| {
            let mut frame = std::collections::BTreeMap::new();
            frame.insert("opacity".to_string(), "1".to_string());
            (vec![frame], None)
        }))
    }

    fn make_clip(element: ElementHandle, category: ClipCategory) -> Rc<RefCell<AnimClip>> {
        Rc::new(RefCell::new(AnimClip::new(
            element,
            "~fade-in",
            category,
            vec![],
            keyframes_generator(),
            ClipTiming {
                delay: std::time::Duration::ZERO,
                duration: std::time::Duration::from_millis(200),
                end_delay: std::time::Duration::ZERO,
                easing: Ease::default(),
                playback_rate: 1.0,
            },
            ClipModifiers::default(),
            SequencingFlags::default(),
            ComputeNow::Eager,
        )))
    }

    struct NoopRoot;
    impl PauseRoot for NoopRoot {
        fn pause_root(&self) {}
    }

    #[test]
    fn entrance_on_hidden_element_removes_hiding_class() {
        let el = FakeElement::new("div").with_class(DISPLAY_NONE_CLASS);
        let handle: ElementHandle = Rc::new(el.clone());
        let clip = make_clip(
            handle,
            ClipCategory::Entrance { hide_now_type: None, remembered: Cell::new(None) },
        );
        let host = FakeHost::new();
        let root = NoopRoot;

        let mut fut = Box::pin(clip.run(&host, PlaybackDirection::Forward, true, &root));
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);
        assert!(fut.as_mut().poll(&mut cx).is_ready());

        assert!(!el.has_class(DISPLAY_NONE_CLASS));
    }

    #[test]
    fn entrance_hide_now_type_hides_element_at_construction() {
        let el = FakeElement::new("div");
        let handle: ElementHandle = Rc::new(el.clone());
        let _clip = make_clip(
            handle,
            ClipCategory::Entrance { hide_now_type: Some(HideKind::DisplayNone), remembered: Cell::new(None) },
        );
        assert!(el.has_class(DISPLAY_NONE_CLASS));
    }

    #[test]
    fn entrance_on_visible_element_errors() {
        let el = FakeElement::new("div");
        let handle: ElementHandle = Rc::new(el);
        let clip = make_clip(
            handle,
            ClipCategory::Entrance { hide_now_type: None, remembered: Cell::new(None) },
        );
        let host = FakeHost::new();
        let root = NoopRoot;

        let result = futures::executor::block_on(clip.run(&host, PlaybackDirection::Forward, true, &root));
        assert!(matches!(result, Err(StagehandError::InvalidEntranceAttempt { .. })));
    }

    #[test]
    fn motion_clip_defaults_to_accumulate_composite() {
        let handle: ElementHandle = Rc::new(FakeElement::new("div"));
        let clip = make_clip(handle, ClipCategory::Motion);
        assert_eq!(clip.borrow().modifiers.composite, Some(Composite::Accumulate));
    }

    #[test]
    fn exit_on_forward_finish_adds_hiding_class() {
        let el = FakeElement::new("div");
        let handle: ElementHandle = Rc::new(el.clone());
        let clip = make_clip(handle, ClipCategory::Exit { exit_type: HideKind::DisplayNone });
        let host = FakeHost::new();
        let root = NoopRoot;

        futures::executor::block_on(clip.run(&host, PlaybackDirection::Forward, true, &root)).unwrap();
        assert!(el.has_class(DISPLAY_NONE_CLASS));
    }
}
