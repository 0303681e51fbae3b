//! The crate's single entry point: one [`Facade`] per host, owning
//! process-wide state (the scroll-anchor stack) and exposing the
//! per-category clip factories, plus `new_timeline`/`new_sequence`
//! (§4.5 "Root façade").

use std::cell::RefCell;
use std::rc::Rc;

use crate::clip::{
    AnimClip, ClipCategory, ClipModifiers, ClipTiming, ComputeNow, ConnectorElement, ConnectorPoint,
    EffectArgs, EffectGenerator, HideKind, SequencingFlags,
};
use crate::host::{ElementHandle, Host, ScrollOptions};
use crate::sequence::{AnimSequence, SequenceConfig, SequenceHandlers};
use crate::timeline::AnimTimeline;

/// The fields every clip factory needs regardless of category (§3 Clip).
pub struct ClipSpec {
    /// The element the clip animates.
    pub element: ElementHandle,
    /// The effect name passed through to the generator bank (and carried
    /// in error locations), e.g. `"~fade-in"`.
    pub effect_name: String,
    /// Positional arguments forwarded to the effect generator.
    pub args: EffectArgs,
    /// The resolved effect generator (already looked up from a bank, if
    /// any — the façade does not itself own a bank, §6).
    pub generator: EffectGenerator,
    /// Resolved timing.
    pub timing: ClipTiming,
    /// Resolved modifiers.
    pub modifiers: ClipModifiers,
    /// Sequencing flags.
    pub sequencing: SequencingFlags,
    /// Whether the generator runs eagerly or is deferred to play-time.
    pub compute_now: ComputeNow,
}

/// C5: the root object an author constructs once per host, then uses to
/// build every clip/sequence/timeline (§4.5).
#[derive(Debug)]
pub struct Facade {
    host: Rc<dyn Host>,
    scroll_anchor_stack: RefCell<Vec<(ElementHandle, ScrollOptions)>>,
}

impl Facade {
    /// Builds a façade backed by `host`.
    pub fn new(host: Rc<dyn Host>) -> Self {
        Facade { host, scroll_anchor_stack: RefCell::new(Vec::new()) }
    }

    /// The host this façade drives every animation through.
    pub fn host(&self) -> &Rc<dyn Host> {
        &self.host
    }

    /// Builds a new, empty timeline.
    pub fn new_timeline(&self, name: Option<String>, debug_mode: bool) -> Rc<RefCell<AnimTimeline>> {
        AnimTimeline::new(name, debug_mode)
    }

    /// Builds a new, empty, unparented sequence.
    pub fn new_sequence(&self, description: Option<String>, tag: Option<String>, config: SequenceConfig, handlers: SequenceHandlers) -> Rc<RefCell<AnimSequence>> {
        AnimSequence::new(description, tag, config, handlers)
    }

    /// Reveals a hidden element (§3 `EntranceClip`).
    pub fn entrance(&self, spec: ClipSpec, hide_now_type: Option<HideKind>) -> Rc<RefCell<AnimClip>> {
        self.build(spec, ClipCategory::Entrance { hide_now_type, remembered: std::cell::Cell::new(None) })
    }

    /// Hides a visible element (§3 `ExitClip`).
    pub fn exit(&self, spec: ClipSpec, exit_type: HideKind) -> Rc<RefCell<AnimClip>> {
        self.build(spec, ClipCategory::Exit { exit_type })
    }

    /// Repositions a connector's endpoints instantly (§3 `ConnectorSetterClip`).
    pub fn connector_setter(&self, spec: ClipSpec, connector: Rc<dyn ConnectorElement>, point_a: ConnectorPoint, point_b: ConnectorPoint) -> Rc<RefCell<AnimClip>> {
        self.build(spec, ClipCategory::ConnectorSetter { connector, point_a, point_b, stashed: RefCell::new(None) })
    }

    /// Reveals a connector line (§3 `ConnectorEntranceClip`).
    pub fn connector_entrance(&self, spec: ClipSpec, connector: Rc<dyn ConnectorElement>) -> Rc<RefCell<AnimClip>> {
        self.build(spec, ClipCategory::ConnectorEntrance { connector })
    }

    /// Hides a connector line (§3 `ConnectorExitClip`).
    pub fn connector_exit(&self, spec: ClipSpec, connector: Rc<dyn ConnectorElement>) -> Rc<RefCell<AnimClip>> {
        self.build(spec, ClipCategory::ConnectorExit { connector })
    }

    /// Animates a CSS property transition (§3 `TransitionClip`).
    pub fn transition(&self, spec: ClipSpec, remove_inline_styles_on_finish: bool) -> Rc<RefCell<AnimClip>> {
        self.build(spec, ClipCategory::Transition { remove_inline_styles_on_finish, touched_properties: RefCell::new(Vec::new()) })
    }

    /// Translates/transforms an element (§3 `MotionClip`).
    pub fn motion(&self, spec: ClipSpec) -> Rc<RefCell<AnimClip>> {
        self.build(spec, ClipCategory::Motion)
    }

    /// A non-hiding, non-moving visual effect (§3 `EmphasisClip`).
    pub fn emphasis(&self, spec: ClipSpec) -> Rc<RefCell<AnimClip>> {
        self.build(spec, ClipCategory::Emphasis)
    }

    /// Scrolls an element or the viewport (§3 `ScrollerClip`).
    pub fn scroller(&self, spec: ClipSpec) -> Rc<RefCell<AnimClip>> {
        self.build(spec, ClipCategory::Scroller)
    }

    fn build(&self, spec: ClipSpec, category: ClipCategory) -> Rc<RefCell<AnimClip>> {
        Rc::new(RefCell::new(AnimClip::new(
            spec.element,
            spec.effect_name,
            category,
            spec.args,
            spec.generator,
            spec.timing,
            spec.modifiers,
            spec.sequencing,
            spec.compute_now,
        )))
    }

    /// Pushes a scroll anchor, recorded by `~scroll-self`'s forward run
    /// so a later rewind knows where to restore the viewport to (§4.5
    /// "Scroll-anchor stack").
    pub fn push_scroll_anchor(&self, element: ElementHandle, options: ScrollOptions) {
        self.scroll_anchor_stack.borrow_mut().push((element, options));
    }

    /// Pops the most recently pushed scroll anchor, consumed by
    /// `~scroll-self`'s rewind.
    pub fn pop_scroll_anchor(&self) -> Option<(ElementHandle, ScrollOptions)> {
        self.scroll_anchor_stack.borrow_mut().pop()
    }

    /// The number of scroll anchors currently on the stack.
    pub fn scroll_anchor_depth(&self) -> usize {
        self.scroll_anchor_stack.borrow().len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::fake::{FakeElement, FakeHost};
    use std::time::Duration;

    fn keyframes_generator() -> EffectGenerator {
        EffectGenerator::Keyframes(Rc::new(|_args: &EffectArgs| {
            let mut frame = std::collections::BTreeMap::new();
            frame.insert("opacity".to_string(), "1".to_string());
            (vec![frame], None)
        }))
    }

    fn spec(element: ElementHandle) -> ClipSpec {
        ClipSpec {
            element,
            effect_name: "~fade-in".into(),
            args: vec![],
            generator: keyframes_generator(),
            timing: ClipTiming { duration: Duration::from_millis(200), ..ClipTiming::default() },
            modifiers: ClipModifiers::default(),
            sequencing: SequencingFlags::default(),
            compute_now: ComputeNow::Eager,
        }
    }

    #[test]
    fn entrance_factory_builds_an_unparented_clip() {
        let facade = Facade::new(Rc::new(FakeHost::new()));
        let el: ElementHandle = Rc::new(FakeElement::new("div"));
        let clip = facade.entrance(spec(el), None);
        assert_eq!(clip.borrow().status().in_progress, false);
    }

    #[test]
    fn scroll_anchor_stack_is_lifo() {
        let facade = Facade::new(Rc::new(FakeHost::new()));
        let a: ElementHandle = Rc::new(FakeElement::new("div"));
        let b: ElementHandle = Rc::new(FakeElement::new("section"));
        facade.push_scroll_anchor(a, ScrollOptions::default());
        facade.push_scroll_anchor(b.clone(), ScrollOptions::default());

        let (popped, _) = facade.pop_scroll_anchor().unwrap();
        assert!(Rc::ptr_eq(&popped, &b));
        assert_eq!(facade.scroll_anchor_depth(), 1);
    }

    #[test]
    fn new_timeline_and_sequence_compose() {
        let facade = Facade::new(Rc::new(FakeHost::new()));
        let timeline = facade.new_timeline(Some("main".into()), false);
        let sequence = facade.new_sequence(None, None, SequenceConfig::new(), SequenceHandlers::default());
        timeline.add_sequences(vec![sequence]).unwrap();
        assert_eq!(timeline.borrow().sequence_count(), 1);
    }
}
