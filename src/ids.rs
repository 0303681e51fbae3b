//! Unique identifiers for clips, sequences, and timelines.
//!
//! The scheduler is single-threaded (§5), so a simple `Cell`-backed
//! counter per id type is enough — no atomics required.

use std::cell::Cell;
use std::fmt;

macro_rules! unique_id {
    ($name:ident, $counter:ident) => {
        thread_local! {
            static $counter: Cell<u64> = const { Cell::new(0) };
        }

        /// A unique, opaque identifier.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new, never-before-seen id.
            pub fn unique() -> Self {
                $counter.with(|c| {
                    let next = c.get() + 1;
                    c.set(next);
                    $name(next)
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

unique_id!(ClipId, CLIP_COUNTER);
unique_id!(SequenceId, SEQUENCE_COUNTER);
unique_id!(TimelineId, TIMELINE_COUNTER);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_are_unique_and_monotonic() {
        let a = ClipId::unique();
        let b = ClipId::unique();
        assert_ne!(a, b);
    }

    #[test]
    fn different_id_kinds_dont_collide_by_type() {
        let _clip = ClipId::unique();
        let _seq = SequenceId::unique();
        let _tl = TimelineId::unique();
    }
}
