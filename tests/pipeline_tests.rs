//! Orchestrator tests: run outcomes, failure resolution, interruption, progress.

mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use common::{
    CountingFinalizer, InterruptingSource, MockSink, MockTransform, RecordingListener, VecSource,
    small_config,
};
use worldconv::{Resolution, RunError, RunOutcome, RunState, WorldConverter};

fn set(items: &[u32]) -> HashSet<u32> {
    items.iter().copied().collect()
}

#[test]
fn test_clean_run_delivers_every_chunk_once_and_finalizes() {
    let finalizer = CountingFinalizer::default();
    let finalized = Arc::clone(&finalizer.calls);
    let sink = MockSink::default();
    let sink_log = Arc::clone(&sink.log);
    let source = VecSource::new(0..200);
    let source_log = Arc::clone(&source.log);

    let converter = WorldConverter::new(
        finalizer,
        source,
        MockTransform::default(),
        sink,
        small_config(4),
    );
    let progress = converter.progress();
    let listener = Arc::new(RecordingListener::new(Resolution::StopKeepData));
    let report = converter.convert(Arc::clone(&listener)).unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.submitted, 200);
    assert_eq!(report.failures, 0);
    assert!(report.finalized);
    assert!(report.resolution.is_none());
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
    assert_eq!(sink_log.accepted_sorted(), (0..200).collect::<Vec<_>>());
    assert_eq!(sink_log.events(), vec!["close"]);
    assert_eq!(source_log.closed.load(Ordering::SeqCst), 1);
    assert_eq!(listener.error_calls(), 0);
    assert_eq!(listener.progress.load(Ordering::SeqCst), 200);
    assert_eq!(progress.state(), RunState::Done);
    assert_eq!(progress.submitted(), 200);
}

#[test]
fn test_empty_source_still_finalizes() {
    let finalizer = CountingFinalizer::default();
    let finalized = Arc::clone(&finalizer.calls);
    let transform = MockTransform::default();
    let converted = Arc::clone(&transform.calls);
    let sink = MockSink::default();
    let sink_log = Arc::clone(&sink.log);

    let report = WorldConverter::new(finalizer, VecSource::new([]), transform, sink, small_config(2))
        .convert(Arc::new(RecordingListener::new(Resolution::StopDiscard)))
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.submitted, 0);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
    assert_eq!(converted.load(Ordering::SeqCst), 0);
    assert!(sink_log.accepted_sorted().is_empty());
}

#[test]
fn test_simultaneous_failures_reach_listener_once() {
    let workers = 8;
    let transform = MockTransform {
        fail_all: true,
        barrier: Some(Arc::new(Barrier::new(workers))),
        ..Default::default()
    };
    let finalizer = CountingFinalizer::default();
    let finalized = Arc::clone(&finalizer.calls);
    let mut listener = RecordingListener::new(Resolution::StopKeepData);
    listener.decide_delay = Duration::from_millis(20);
    let listener = Arc::new(listener);

    let report = WorldConverter::new(
        finalizer,
        VecSource::new(0..workers as u32),
        transform,
        MockSink::default(),
        small_config(workers),
    )
    .convert(Arc::clone(&listener))
    .unwrap();

    assert_eq!(listener.error_calls(), 1);
    assert_eq!(report.failures, workers);
    assert_eq!(report.resolution, Some(Resolution::StopKeepData));
    assert_eq!(report.outcome, RunOutcome::CompletedWithPartialOutput);
    assert_eq!(finalized.load(Ordering::SeqCst), 0);
}

#[test]
fn test_ignore_all_absorbs_every_later_failure() {
    let workers = 4;
    let items = (workers * 5) as u32;
    let transform = MockTransform {
        fail_all: true,
        barrier: Some(Arc::new(Barrier::new(workers))),
        ..Default::default()
    };
    let finalizer = CountingFinalizer::default();
    let finalized = Arc::clone(&finalizer.calls);
    let mut listener = RecordingListener::new(Resolution::IgnoreAll);
    listener.decide_delay = Duration::from_millis(10);
    let listener = Arc::new(listener);

    let report = WorldConverter::new(
        finalizer,
        VecSource::new(0..items),
        transform,
        MockSink::default(),
        small_config(workers),
    )
    .convert(Arc::clone(&listener))
    .unwrap();

    assert_eq!(listener.error_calls(), 1);
    assert_eq!(report.failures, items as usize);
    assert_eq!(report.outcome, RunOutcome::CompletedWithPartialOutput);
    assert_eq!(finalized.load(Ordering::SeqCst), 0);
}

#[test]
fn test_ignore_all_keeps_converting_past_failures_without_finalizing() {
    let transform = MockTransform {
        fail_on: set(&[3, 11, 27]),
        ..Default::default()
    };
    let finalizer = CountingFinalizer::default();
    let finalized = Arc::clone(&finalizer.calls);
    let sink = MockSink::default();
    let sink_log = Arc::clone(&sink.log);
    let listener = Arc::new(RecordingListener::new(Resolution::IgnoreAll));

    let report = WorldConverter::new(
        finalizer,
        VecSource::new(0..30),
        transform,
        sink,
        small_config(3),
    )
    .convert(Arc::clone(&listener))
    .unwrap();

    let expected: Vec<u32> = (0..30).filter(|i| ![3, 11, 27].contains(i)).collect();
    assert_eq!(sink_log.accepted_sorted(), expected);
    assert_eq!(report.failures, 3);
    assert_eq!(report.submitted, 30);
    assert_eq!(report.outcome, RunOutcome::CompletedWithPartialOutput);
    assert_eq!(report.resolution, Some(Resolution::IgnoreAll));
    assert!(!report.finalized);
    assert_eq!(finalized.load(Ordering::SeqCst), 0);
    assert_eq!(sink_log.events(), vec!["close"]);
    assert_eq!(listener.error_calls(), 1);
}

#[test]
fn test_stop_discard_discards_after_close_and_skips_finalize() {
    let transform = MockTransform {
        fail_on: set(&[5]),
        ..Default::default()
    };
    let finalizer = CountingFinalizer::default();
    let finalized = Arc::clone(&finalizer.calls);
    let sink = MockSink::default();
    let sink_log = Arc::clone(&sink.log);

    let report = WorldConverter::new(finalizer, VecSource::new(0..50), transform, sink, small_config(2))
        .convert(Arc::new(RecordingListener::new(Resolution::StopDiscard)))
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::CompletedWithDiscardedOutput);
    assert_eq!(report.resolution, Some(Resolution::StopDiscard));
    assert!(!report.finalized);
    assert_eq!(finalized.load(Ordering::SeqCst), 0);
    assert_eq!(sink_log.events(), vec!["close", "discard"]);
    assert!(sink_log.accepted_sorted().is_empty());
}

#[test]
fn test_stop_keep_data_leaves_partial_output() {
    let transform = MockTransform {
        fail_on: set(&[5]),
        ..Default::default()
    };
    let finalizer = CountingFinalizer::default();
    let finalized = Arc::clone(&finalizer.calls);
    let sink = MockSink::default();
    let sink_log = Arc::clone(&sink.log);
    let source = VecSource::new(0..10);
    let source_log = Arc::clone(&source.log);

    let report = WorldConverter::new(finalizer, source, transform, sink, small_config(1))
        .convert(Arc::new(RecordingListener::new(Resolution::StopKeepData)))
        .unwrap();

    let written = sink_log.accepted_sorted();
    assert_eq!(report.outcome, RunOutcome::CompletedWithPartialOutput);
    assert!(written.len() <= 9);
    assert!(!written.contains(&5));
    assert_eq!(sink_log.events(), vec!["close"]);
    assert_eq!(finalized.load(Ordering::SeqCst), 0);
    assert_eq!(source_log.stop_requests.load(Ordering::SeqCst), 1);
}

#[test]
fn test_write_failure_is_routed_to_listener() {
    let sink = MockSink {
        fail_on: set(&[7]),
        ..Default::default()
    };
    let listener = Arc::new(RecordingListener::new(Resolution::StopKeepData));

    let report = WorldConverter::new(
        CountingFinalizer::default(),
        VecSource::new(0..20),
        MockTransform::default(),
        sink,
        small_config(2),
    )
    .convert(Arc::clone(&listener))
    .unwrap();

    assert_eq!(listener.error_calls(), 1);
    let first = listener.first_failure.lock().unwrap().clone().unwrap();
    assert!(first.contains("write"), "unexpected failure text: {first}");
    assert_eq!(report.outcome, RunOutcome::CompletedWithPartialOutput);
}

#[test]
fn test_panicking_transform_is_a_failure_not_a_crash() {
    let transform = MockTransform {
        panic_on: set(&[4]),
        ..Default::default()
    };
    let sink = MockSink::default();
    let sink_log = Arc::clone(&sink.log);
    let listener = Arc::new(RecordingListener::new(Resolution::IgnoreAll));

    let report = WorldConverter::new(
        CountingFinalizer::default(),
        VecSource::new(0..20),
        transform,
        sink,
        small_config(2),
    )
    .convert(Arc::clone(&listener))
    .unwrap();

    assert_eq!(listener.error_calls(), 1);
    assert_eq!(report.failures, 1);
    assert_eq!(sink_log.accepted_sorted().len(), 19);
    let first = listener.first_failure.lock().unwrap().clone().unwrap();
    assert!(first.contains("panicked"), "unexpected failure text: {first}");
}

#[test]
fn test_no_chunk_is_written_twice_under_load() {
    let transform = MockTransform {
        delay: Some(Duration::from_micros(200)),
        ..Default::default()
    };
    let sink = MockSink {
        delay: Some(Duration::from_micros(300)),
        ..Default::default()
    };
    let sink_log = Arc::clone(&sink.log);

    let report = WorldConverter::new(
        CountingFinalizer::default(),
        VecSource::new(0..500),
        transform,
        sink,
        small_config(4).with_queue_factors(1, 1),
    )
    .convert(Arc::new(RecordingListener::new(Resolution::StopKeepData)))
    .unwrap();

    let written = sink_log.accepted_sorted();
    let unique: HashSet<u32> = written.iter().copied().collect();
    assert_eq!(unique.len(), written.len());
    assert_eq!(written.len(), 500);
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[test]
fn test_sink_close_error_is_logged_not_raised() {
    let finalizer = CountingFinalizer::default();
    let finalized = Arc::clone(&finalizer.calls);
    let sink = MockSink {
        close_fails: true,
        ..Default::default()
    };

    let report = WorldConverter::new(
        finalizer,
        VecSource::new(0..10),
        MockTransform::default(),
        sink,
        small_config(2),
    )
    .convert(Arc::new(RecordingListener::new(Resolution::StopKeepData)))
    .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
}

#[test]
fn test_source_read_error_surfaces_after_close() {
    let mut source = VecSource::new(0..20);
    source.fail_at = Some(8);
    let source_log = Arc::clone(&source.log);
    let finalizer = CountingFinalizer::default();
    let finalized = Arc::clone(&finalizer.calls);
    let sink = MockSink::default();
    let sink_log = Arc::clone(&sink.log);

    let converter = WorldConverter::new(
        finalizer,
        source,
        MockTransform::default(),
        sink,
        small_config(2),
    );
    let progress = converter.progress();
    let err = converter
        .convert(Arc::new(RecordingListener::new(Resolution::StopKeepData)))
        .unwrap_err();

    assert!(matches!(err, RunError::SourceRead(_)));
    assert_eq!(source_log.closed.load(Ordering::SeqCst), 1);
    assert_eq!(sink_log.events(), vec!["close"]);
    assert_eq!(finalized.load(Ordering::SeqCst), 0);
    assert_eq!(sink_log.accepted_sorted(), (0..8).collect::<Vec<_>>());
    assert_eq!(progress.state(), RunState::Aborted);
}

#[test]
fn test_finalizer_error_is_raised() {
    let finalizer = CountingFinalizer {
        fail: true,
        ..Default::default()
    };

    let err = WorldConverter::new(
        finalizer,
        VecSource::new(0..5),
        MockTransform::default(),
        MockSink::default(),
        small_config(1),
    )
    .convert(Arc::new(RecordingListener::new(Resolution::StopKeepData)))
    .unwrap_err();

    assert!(matches!(err, RunError::Finalize(_)));
    assert!(err.to_string().contains("level info"), "{err}");
}

#[test]
fn test_interrupt_before_start_submits_nothing() {
    let finalizer = CountingFinalizer::default();
    let finalized = Arc::clone(&finalizer.calls);
    let converter = WorldConverter::new(
        finalizer,
        VecSource::new(0..100),
        MockTransform::default(),
        MockSink::default(),
        small_config(2),
    );
    let interrupt = converter.interrupt_handle();
    interrupt.store(true, Ordering::SeqCst);

    let report = converter
        .convert(Arc::new(RecordingListener::new(Resolution::StopKeepData)))
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.submitted, 0);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
}

#[test]
fn test_interrupt_during_submission_drains_queued_chunks() {
    let transform = MockTransform {
        delay: Some(Duration::from_millis(30)),
        ..Default::default()
    };
    let finalizer = CountingFinalizer::default();
    let finalized = Arc::clone(&finalizer.calls);
    let sink = MockSink::default();
    let sink_log = Arc::clone(&sink.log);
    let source = InterruptingSource::new(VecSource::new(0..20), 10);
    let flag_slot = Arc::clone(&source.flag);

    let converter = WorldConverter::new(
        finalizer,
        source,
        transform,
        sink,
        small_config(1).with_queue_factors(50, 50),
    );
    flag_slot.set(converter.interrupt_handle()).unwrap();

    let report = converter
        .convert(Arc::new(RecordingListener::new(Resolution::StopKeepData)))
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.submitted, 10);
    assert_eq!(sink_log.accepted_sorted(), (0..10).collect::<Vec<_>>());
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert!(report.finalized);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
}

#[test]
fn test_interrupt_during_drain_abandons_queue_but_still_finalizes() {
    let transform = MockTransform {
        delay: Some(Duration::from_millis(30)),
        ..Default::default()
    };
    let finalizer = CountingFinalizer::default();
    let finalized = Arc::clone(&finalizer.calls);
    let sink = MockSink::default();
    let sink_log = Arc::clone(&sink.log);
    let mut config = small_config(1).with_queue_factors(50, 50);
    config.drain_poll = Duration::from_millis(10);

    let converter = WorldConverter::new(finalizer, VecSource::new(0..40), transform, sink, config);
    let interrupt = converter.interrupt_handle();
    let raiser = {
        let interrupt = Arc::clone(&interrupt);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            interrupt.store(true, Ordering::SeqCst);
        })
    };

    let report = converter
        .convert(Arc::new(RecordingListener::new(Resolution::StopKeepData)))
        .unwrap();
    raiser.join().unwrap();

    assert!(report.interrupted);
    assert!(sink_log.accepted_sorted().len() < 40);
    assert!(report.resolution.is_none());
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert!(report.finalized);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
}

#[test]
fn test_progress_is_observable_while_running() {
    let transform = MockTransform {
        delay: Some(Duration::from_millis(2)),
        ..Default::default()
    };
    let converter = WorldConverter::new(
        CountingFinalizer::default(),
        VecSource::new(0..100),
        transform,
        MockSink::default(),
        small_config(2),
    );
    let progress = converter.progress();
    let done = Arc::new(AtomicBool::new(false));
    let watcher = {
        let progress = Arc::clone(&progress);
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            let mut max_fill = 0;
            while !done.load(Ordering::SeqCst) {
                assert!(progress.convert_queue_fill() <= progress.convert_queue_capacity());
                assert!(progress.write_queue_fill() <= progress.write_queue_capacity());
                max_fill = max_fill.max(progress.convert_queue_fill());
                std::thread::sleep(Duration::from_micros(500));
            }
            max_fill
        })
    };

    let report = converter
        .convert(Arc::new(RecordingListener::new(Resolution::StopKeepData)))
        .unwrap();
    done.store(true, Ordering::SeqCst);
    watcher.join().unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(progress.discovered_total(), 100);
    assert_eq!(progress.submitted(), 100);
}
