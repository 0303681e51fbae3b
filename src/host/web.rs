//! The production [`Host`] implementation, driving the browser's real
//! Web Animations API through `web-sys`. Only built for `wasm32`
//! targets under the `host-web` feature (the crate's default).

use std::time::Duration;

use futures::future::LocalBoxFuture;
use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Animation, AnimationPlayState, Element, KeyframeAnimationOptions, PlaybackDirection as WebDir,
};

use super::{
    Composite, CommitStylesFailure, ElementHandle, Host, HostAnimation, HostElement, KeyframeSet,
    PlaybackDirection, Rect, ScrollOptions, Timing,
};

/// An element handle backed by a real `web_sys::Element`.
#[derive(Debug, Clone)]
pub struct WebElement(pub Element);

impl From<Element> for WebElement {
    fn from(el: Element) -> Self {
        WebElement(el)
    }
}

impl HostElement for WebElement {
    fn has_class(&self, class: &str) -> bool {
        self.0.class_list().contains(class)
    }

    fn add_class(&self, class: &str) {
        let _ = self.0.class_list().add_1(class);
    }

    fn remove_class(&self, class: &str) {
        let _ = self.0.class_list().remove_1(class);
    }

    fn set_inline_style(&self, property: &str, value: &str) {
        if let Some(html_el) = self.0.dyn_ref::<web_sys::HtmlElement>() {
            let _ = html_el.style().set_property(property, value);
        }
    }

    fn remove_inline_style(&self, property: &str) {
        if let Some(html_el) = self.0.dyn_ref::<web_sys::HtmlElement>() {
            let _ = html_el.style().remove_property(property);
        }
    }

    fn is_rendered(&self) -> bool {
        let rect = self.0.get_bounding_client_rect();
        rect.width() > 0.0 || rect.height() > 0.0
    }

    fn bounding_rect(&self) -> Rect {
        let rect = self.0.get_bounding_client_rect();
        Rect {
            x: rect.x(),
            y: rect.y(),
            width: rect.width(),
            height: rect.height(),
        }
    }

    fn opening_tag(&self) -> String {
        let tag = self.0.tag_name().to_lowercase();
        let class_name = self.0.class_name();
        if class_name.is_empty() {
            format!("<{tag}>")
        } else {
            format!("<{tag} class=\"{class_name}\">")
        }
    }

    fn scroll_into_view(&self, options: ScrollOptions) {
        let mut init = web_sys::ScrollIntoViewOptions::new();
        init.behavior(if options.smooth {
            web_sys::ScrollBehavior::Smooth
        } else {
            web_sys::ScrollBehavior::Instant
        });
        self.0.scroll_into_view_with_scroll_into_view_options(&init);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A running `web_sys::Animation` (one direction of one clip).
#[derive(Debug, Clone)]
pub struct WebAnimation(pub Animation);

impl HostAnimation for WebAnimation {
    fn play(&self) {
        let _ = self.0.play();
    }

    fn pause(&self) {
        let _ = self.0.pause();
    }

    fn finish(&self) {
        let _ = self.0.finish();
    }

    fn cancel(&self) {
        self.0.cancel();
    }

    fn set_playback_rate(&self, rate: f64) {
        self.0.set_playback_rate(rate);
    }

    fn current_time(&self) -> Duration {
        match self.0.current_time() {
            Some(ms) => Duration::from_secs_f64((ms / 1000.0).max(0.0)),
            None => Duration::ZERO,
        }
    }

    fn set_current_time(&self, time: Duration) {
        self.0.set_current_time(Some(time.as_secs_f64() * 1000.0));
    }

    fn set_keyframes(&self, keyframes: KeyframeSet) {
        if let Some(effect) = self.0.effect() {
            if let Some(keyframe_effect) = effect.dyn_ref::<web_sys::KeyframeEffect>() {
                let frames = to_js_keyframes(&keyframes);
                let _ = keyframe_effect.set_keyframes(Some(&frames));
            }
        }
    }

    fn commit_styles(&self) -> Result<(), CommitStylesFailure> {
        // `Animation::commit_styles` has no typed web-sys binding in this
        // version; invoke the same underlying JS method via reflection.
        let animation: &JsValue = self.0.as_ref();
        let func: Function = Reflect::get(animation, &JsValue::from_str("commitStyles"))
            .and_then(JsCast::dyn_into)
            .map_err(|_| CommitStylesFailure)?;
        func.call0(animation).map(|_| ()).map_err(|_| CommitStylesFailure)
    }

    fn finished(&self) -> LocalBoxFuture<'static, ()> {
        if self.0.play_state() == AnimationPlayState::Finished {
            return Box::pin(futures::future::ready(()));
        }
        let promise = self.0.finished();
        Box::pin(async move {
            if let Ok(promise) = promise {
                let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
            }
        })
    }

    fn time_reached(&self, target: Duration) -> LocalBoxFuture<'static, ()> {
        let target_ms = target.as_secs_f64() * 1000.0;
        let animation = self.0.clone();
        Box::pin(async move {
            loop {
                let reached = match animation.current_time() {
                    Some(ms) => ms >= target_ms,
                    None => false,
                };
                if reached || animation.play_state() == AnimationPlayState::Finished {
                    return;
                }
                next_animation_frame().await;
            }
        })
    }
}

fn next_animation_frame() -> LocalBoxFuture<'static, ()> {
    Box::pin(async move {
        let window = web_sys::window().expect("a Window is required to poll animation frames");
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            let callback = Closure::once_into_js(move |_: f64| {
                let _ = resolve.call0(&JsValue::NULL);
            });
            let _ = window.request_animation_frame(callback.as_ref().unchecked_ref());
        });
        let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
    })
}

fn to_js_keyframes(keyframes: &KeyframeSet) -> Array {
    let array = Array::new();
    for frame in keyframes {
        let obj = Object::new();
        for (property, value) in frame {
            let _ = Reflect::set(&obj, &JsValue::from_str(property), &JsValue::from_str(value));
        }
        array.push(&obj);
    }
    array
}

fn composite_str(composite: Composite) -> web_sys::CompositeOperation {
    match composite {
        Composite::Replace => web_sys::CompositeOperation::Replace,
        Composite::Accumulate => web_sys::CompositeOperation::Accumulate,
        Composite::Add => web_sys::CompositeOperation::Add,
    }
}

/// A [`Host`] that creates `web_sys::Animation`s via
/// `Element::animate`.
#[derive(Debug, Clone, Default)]
pub struct WebHost;

impl WebHost {
    /// Creates a new web host. Stateless — every call goes straight
    /// to the browser.
    pub fn new() -> Self {
        WebHost
    }
}

impl Host for WebHost {
    fn animate(
        &self,
        element: &ElementHandle,
        keyframes: KeyframeSet,
        timing: &Timing,
        direction: PlaybackDirection,
    ) -> Box<dyn HostAnimation> {
        let element = element
            .as_any()
            .downcast_ref::<WebElement>()
            .expect("WebHost only ever receives ElementHandles it created via WebElement");

        let frames = to_js_keyframes(&keyframes);
        let mut options = KeyframeAnimationOptions::new();
        options.duration(timing.duration.as_secs_f64() * 1000.0);
        options.delay(timing.delay.as_secs_f64() * 1000.0);
        options.end_delay(timing.end_delay.as_secs_f64() * 1000.0);
        options.composite(composite_str(timing.composite));
        options.direction(match direction {
            PlaybackDirection::Forward => WebDir::Normal,
            PlaybackDirection::Backward => WebDir::Reverse,
        });

        let animation = element.0.animate_with_keyframe_animation_options(Some(&frames), &options);
        animation.set_playback_rate(timing.playback_rate);
        Box::new(WebAnimation(animation))
    }
}
