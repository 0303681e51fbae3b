//! A hierarchical animation scheduler: clips nest into sequences,
//! sequences nest into timelines, and a single [`facade::Facade`] ties
//! a host implementation to all three (§1, §4).
//!
//! # Overview
//!
//! - A [`clip::AnimClip`] binds one target element, one effect, and a
//!   timing/modifiers/sequencing configuration. Clips never run on
//!   their own; they are always owned by a sequence (§4.2).
//! - An [`sequence::AnimSequence`] owns an ordered list of clips,
//!   computing a parallelism plan on every play/rewind and running
//!   groups of clips concurrently while still honoring cross-clip
//!   completion ordering (§4.3).
//! - An [`timeline::AnimTimeline`] owns an ordered list of sequences,
//!   exposing `step`/`jump_to*`/pause/playback-rate controls and
//!   autoplay chaining (§4.4).
//! - [`host::Host`] is the trait boundary to the runtime that actually
//!   plays animations and renders frames: [`host::web::WebHost`] drives
//!   a real browser; [`host::fake::FakeHost`] is the deterministic,
//!   manually advanced clock every test in this crate runs against.
//!
//! Everything above the [`host`] boundary is a single-threaded,
//! cooperative `async` scheduler (§5): there is no bundled executor,
//! only `Rc`/`RefCell` state and `async fn`s a caller drives to
//! completion with whatever executor their own host runs (the browser's
//! microtask queue, for `host::web`).
//!
//! # Non-goals
//!
//! This crate does not render frames, compute arbitrary easing curves
//! (only named curves, see [`easing`]), or measure DOM layout. All of
//! that is delegated to the [`host::Host`] implementation.

#![warn(missing_docs)]

pub mod clip;
pub mod clip_animation;
pub mod easing;
pub mod error;
pub mod facade;
pub mod generators;
pub mod host;
pub mod ids;
pub mod sequence;
pub mod time_position;
pub mod timeline;

pub use clip::AnimClip;
pub use error::{Result, StagehandError};
pub use facade::Facade;
pub use sequence::AnimSequence;
pub use timeline::AnimTimeline;
