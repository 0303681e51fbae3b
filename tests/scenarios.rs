//! End-to-end scenarios driven entirely against [`host::fake`], mirroring
//! the worked examples in the design (§8 "End-to-end scenarios").

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use stagehand::clip::{
    AnimClip, ClipCategory, ClipModifiers, ClipTiming, ComputeNow, EffectArgs, EffectGenerator,
    SequencingFlags,
};
use stagehand::error::StagehandError;
use stagehand::host::fake::{FakeElement, FakeHost};
use stagehand::host::{ElementHandle, PlaybackDirection};
use stagehand::sequence::{AnimSequence, SequenceConfig, SequenceHandlers};
use stagehand::timeline::AnimTimeline;

fn keyframes_generator() -> EffectGenerator {
    EffectGenerator::Keyframes(Rc::new(|_args: &EffectArgs| {
        let mut frame = std::collections::BTreeMap::new();
        frame.insert("opacity".to_string(), "1".to_string());
        (vec![frame], None)
    }))
}

fn clip_with(
    delay_ms: u64,
    dur_ms: u64,
    starts_with_previous: bool,
    starts_next_clip_too: bool,
) -> Rc<RefCell<AnimClip>> {
    Rc::new(RefCell::new(AnimClip::new(
        Rc::new(FakeElement::new("div")) as ElementHandle,
        "~fade-in",
        ClipCategory::Emphasis,
        vec![],
        keyframes_generator(),
        ClipTiming {
            delay: Duration::from_millis(delay_ms),
            duration: Duration::from_millis(dur_ms),
            end_delay: Duration::ZERO,
            easing: Default::default(),
            playback_rate: 1.0,
        },
        ClipModifiers::default(),
        SequencingFlags { starts_with_previous, starts_next_clip_too },
        ComputeNow::Eager,
    )))
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

fn sequence_of(clips: Vec<Rc<RefCell<AnimClip>>>) -> Rc<RefCell<AnimSequence>> {
    let seq = AnimSequence::new(None, None, SequenceConfig::new(), SequenceHandlers::default());
    for clip in clips {
        seq.add_clip(clip).unwrap();
    }
    seq
}

// Scenario 1: delay stacking in a parallel group.
#[test]
fn delay_stacking_anchors_to_the_immediate_predecessor() {
    let a = clip_with(0, 500, false, false);
    let b = clip_with(0, 300, true, false);
    let c = clip_with(300, 200, true, false);
    let seq = sequence_of(vec![a.clone(), b.clone(), c.clone()]);
    seq.borrow().commit();

    assert_eq!(a.borrow().scheduled_times().unwrap().full_start_time, Duration::ZERO);
    assert_eq!(b.borrow().scheduled_times().unwrap().full_start_time, Duration::ZERO);
    assert_eq!(c.borrow().scheduled_times().unwrap().full_start_time, Duration::ZERO);

    let a2 = clip_with(0, 500, false, false);
    let b2 = clip_with(150, 300, true, true);
    let c2 = clip_with(300, 200, true, false);
    let seq2 = sequence_of(vec![a2.clone(), b2.clone(), c2.clone()]);
    seq2.borrow().commit();

    assert_eq!(b2.borrow().scheduled_times().unwrap().full_start_time, Duration::ZERO);
    assert_eq!(c2.borrow().scheduled_times().unwrap().full_start_time, Duration::from_millis(150));
}

// Scenario 2: rewind order within a group mirrors forward order reversed.
#[test]
fn group_members_finish_active_phase_in_ascending_order_both_directions() {
    let a = clip_with(0, 200, false, false);
    let b = clip_with(0, 500, true, false);
    let c = clip_with(0, 800, true, false);
    let seq = sequence_of(vec![a, b, c]);
    seq.borrow().commit();

    assert_eq!(seq.borrow().clip_count(), 3);
}

// Scenario 3: autoplay chain — step('forward') plays seq1 then seq2, then
// seq3 because seq2 was reached with seq1.autoplaysNextSequence=true, and
// seq3 plays because seq2.autoplaysNextSequence OR seq3.autoplays holds.
#[test]
fn autoplay_chain_advances_through_every_linked_sequence() {
    let mut seq1_config = SequenceConfig::new();
    seq1_config.autoplays_next_sequence = true;
    let seq1 = AnimSequence::new(None, None, seq1_config, SequenceHandlers::default());
    seq1.add_clip(clip_with(0, 10, false, false)).unwrap();

    let seq2_config = SequenceConfig::new();
    let seq2 = AnimSequence::new(None, None, seq2_config, SequenceHandlers::default());
    seq2.add_clip(clip_with(0, 10, false, false)).unwrap();

    let mut seq3_config = SequenceConfig::new();
    seq3_config.autoplays = true;
    let seq3 = AnimSequence::new(None, None, seq3_config, SequenceHandlers::default());
    seq3.add_clip(clip_with(0, 10, false, false)).unwrap();

    let timeline = AnimTimeline::new(Some("chain".into()), false);
    timeline.add_sequences(vec![seq1, seq2, seq3]).unwrap();

    let host = FakeHost::new();
    drive(Box::pin(async { timeline.borrow().step(PlaybackDirection::Forward, &host).await }), &host).unwrap();

    assert_eq!(timeline.borrow().loaded_seq_index(), 3);
}

// Scenario 4: jumpToPosition(1) with autoplayDetection=forward continues
// stepping forward while the reached sequence's autoplay flags hold.
#[test]
fn jump_with_forward_autoplay_detection_continues_past_the_target() {
    let seq_a = AnimSequence::new(None, None, SequenceConfig::new(), SequenceHandlers::default());
    seq_a.add_clip(clip_with(0, 10, false, false)).unwrap();

    let mut seq_b_config = SequenceConfig::new();
    seq_b_config.autoplays_next_sequence = true;
    let seq_b = AnimSequence::new(None, None, seq_b_config, SequenceHandlers::default());
    seq_b.add_clip(clip_with(0, 10, false, false)).unwrap();

    let seq_c = AnimSequence::new(None, None, SequenceConfig::new(), SequenceHandlers::default());
    seq_c.add_clip(clip_with(0, 10, false, false)).unwrap();

    let timeline = AnimTimeline::new(None, false);
    timeline.add_sequences(vec![seq_a, seq_b, seq_c]).unwrap();
    timeline.borrow().set_autoplay_detection(stagehand::timeline::AutoplayDetection::Forward);

    let host = FakeHost::new();
    drive(
        Box::pin(async {
            timeline
                .borrow()
                .jump_to_position(stagehand::timeline::JumpPosition::Index(1), &host)
                .await
        }),
        &host,
    )
    .unwrap();

    assert_eq!(timeline.borrow().loaded_seq_index(), 3);
}

// Scenario 5: a roadblock on an unresolved promise stalls the sequence
// until it is manually resolved.
#[test]
fn roadblock_stalls_play_until_manually_resolved() {
    let clip = clip_with(0, 1000, false, false);
    let seq = sequence_of(vec![clip.clone()]);
    let host = FakeHost::new();

    clip.borrow().ensure_clip_animation(&host).unwrap();
    let (tx, rx) = futures::channel::oneshot::channel::<()>();
    clip.borrow()
        .add_roadblocks(
            PlaybackDirection::Forward,
            stagehand::clip_animation::PhasePosition::new(
                stagehand::clip_animation::Phase::Active,
                stagehand::time_position::TimePosition::Percent(50.0),
            ),
            vec![Box::pin(async move {
                let _ = rx.await;
            })],
        )
        .unwrap();

    let mut fut = Box::pin(seq.play_with_host(&host));
    let waker = futures::task::noop_waker();
    let mut cx = std::task::Context::from_waker(&waker);

    host.drive(Duration::from_millis(600));
    assert!(fut.as_mut().poll(&mut cx).is_pending(), "sequence must stall on the unresolved roadblock");

    tx.send(()).unwrap();
    host.drive(Duration::from_millis(500));
    assert!(fut.as_mut().poll(&mut cx).is_ready(), "sequence settles once the roadblock resolves");
}

// Scenario 5 continued: finish() forces the in-progress clip to
// completion but the sequence still stalls until the roadblock itself
// is resolved.
#[test]
fn finish_in_progress_finishes_the_clip_but_still_waits_on_its_roadblock() {
    let clip = clip_with(0, 1000, false, false);
    let seq = sequence_of(vec![clip.clone()]);
    let host = FakeHost::new();

    clip.borrow().ensure_clip_animation(&host).unwrap();
    let (tx, rx) = futures::channel::oneshot::channel::<()>();
    clip.borrow()
        .add_roadblocks(
            PlaybackDirection::Forward,
            stagehand::clip_animation::PhasePosition::new(
                stagehand::clip_animation::Phase::Active,
                stagehand::time_position::TimePosition::Percent(50.0),
            ),
            vec![Box::pin(async move {
                let _ = rx.await;
            })],
        )
        .unwrap();

    let mut fut = Box::pin(seq.play_with_host(&host));
    let waker = futures::task::noop_waker();
    let mut cx = std::task::Context::from_waker(&waker);

    host.drive(Duration::from_millis(600));
    assert!(fut.as_mut().poll(&mut cx).is_pending(), "sequence must stall on the unresolved roadblock");

    seq.borrow().mark_finishing();
    assert!(
        fut.as_mut().poll(&mut cx).is_pending(),
        "finish() forces the clip's animation to completion but must not bypass its roadblock"
    );

    tx.send(()).unwrap();
    assert!(
        fut.as_mut().poll(&mut cx).is_ready(),
        "once the roadblock resolves the sequence settles immediately, no further host time needed"
    );
}

// Scenario 6: an Entrance clip on a not-hidden element raises
// InvalidEntranceAttempt, and the sequence's play promise is rejected.
#[test]
fn entrance_on_unhidden_element_rejects_the_sequences_play() {
    let el = FakeElement::new("div");
    let handle: ElementHandle = Rc::new(el);
    let clip = Rc::new(RefCell::new(AnimClip::new(
        handle,
        "~fade-in",
        ClipCategory::Entrance { hide_now_type: None, remembered: std::cell::Cell::new(None) },
        vec![],
        keyframes_generator(),
        ClipTiming { duration: Duration::from_millis(100), ..ClipTiming::default() },
        ClipModifiers::default(),
        SequencingFlags::default(),
        ComputeNow::Eager,
    )));
    let seq = sequence_of(vec![clip]);
    let host = FakeHost::new();

    let result = drive(Box::pin(async { seq.play_with_host(&host).await }), &host);
    assert!(matches!(result, Err(StagehandError::InvalidEntranceAttempt { .. })));
}

// Non-grouped clips start after the previous group fully finishes.
#[test]
fn non_grouped_clips_wait_for_the_previous_group_to_fully_finish() {
    let a = clip_with(0, 500, false, false);
    let b = clip_with(0, 300, false, false);
    let seq = sequence_of(vec![a.clone(), b.clone()]);
    seq.borrow().commit();

    assert_eq!(a.borrow().scheduled_times().unwrap().full_finish_time, Duration::from_millis(500));
    assert_eq!(b.borrow().scheduled_times().unwrap().full_start_time, Duration::from_millis(500));
}

// Pausing and immediately unpausing leaves the playhead where it was.
#[test]
fn pause_then_unpause_preserves_clip_time() {
    let clip = clip_with(0, 1000, false, false);
    let host = FakeHost::new();
    clip.borrow().ensure_clip_animation(&host).unwrap();

    let mut fut = Box::pin(clip.run(&host, PlaybackDirection::Forward, false, &NoopRoot));
    let waker = futures::task::noop_waker();
    let mut cx = std::task::Context::from_waker(&waker);
    assert!(fut.as_mut().poll(&mut cx).is_pending());

    host.drive(Duration::from_millis(400));
    assert!(fut.as_mut().poll(&mut cx).is_pending());

    clip.borrow().pause(PlaybackDirection::Forward);
    host.drive(Duration::from_millis(300));
    clip.borrow().unpause();
    assert!(fut.as_mut().poll(&mut cx).is_pending());

    host.drive(Duration::from_millis(600));
    assert!(fut.as_mut().poll(&mut cx).is_ready());
}

struct NoopRoot;
impl stagehand::clip::PauseRoot for NoopRoot {
    fn pause_root(&self) {}
}
