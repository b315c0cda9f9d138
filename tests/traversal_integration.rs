//! Integration tests for graph traversal
//!
//! These tests validate how frames and phases move through a module graph:
//! - Depth-first draining of each edge before the next
//! - Exactly-once delivery of non-Process phases
//! - Broadcast, named pushes and unwired outboxes
//! - Gate pass-through and registered handlers

mod common;

use common::builders::{one_of_each_stop, FrameBuilder};
use common::recording::{collector, emitter, recorder};
use common::{count, event_log, events, position};
use std::sync::{Arc, Mutex};
use tray_rs::tray::{context, get_service, TrayState};
use tray_rs::{Frame, Module, ModuleIo, ModuleSetup, Stop, Tray, TrayError, TrayResult, Value};

struct Relay;

impl Module for Relay {}

fn relay(outboxes: &'static [&'static str]) -> impl FnOnce(&mut ModuleSetup<'_>) -> TrayResult<Relay> {
    move |setup: &mut ModuleSetup<'_>| {
        for name in outboxes {
            setup.add_outbox(*name);
        }
        Ok(Relay)
    }
}

fn process_events(log: &[String]) -> Vec<&str> {
    log.iter()
        .map(String::as_str)
        .filter(|e| e.ends_with(":Process"))
        .collect()
}

#[test]
fn test_edge_drained_through_subtree_before_next_edge() {
    tray_rs::logging::init_for_tests();
    let log = event_log();
    let mut tray = Tray::new();
    let plan = [
        (Some("A"), Stop::Physics),
        (Some("A"), Stop::Physics),
        (Some("A"), Stop::Physics),
        (Some("B"), Stop::Physics),
    ];
    tray.add_module("m", emitter(&log, &["A", "B"], &plan)).unwrap();
    tray.add_module("x", recorder(&log, &["OutBox"])).unwrap();
    tray.add_module("x2", recorder(&log, &[])).unwrap();
    tray.add_module("y", recorder(&log, &[])).unwrap();
    tray.connect_boxes("m", "A", "x").unwrap();
    tray.connect_boxes("x", "OutBox", "x2").unwrap();
    tray.connect_boxes("m", "B", "y").unwrap();

    assert_eq!(tray.execute(1).unwrap(), 1);

    let log = events(&log);
    assert_eq!(
        process_events(&log),
        vec![
            "m:Process",
            "x:Process",
            "x2:Process",
            "x:Process",
            "x2:Process",
            "x:Process",
            "x2:Process",
            "y:Process",
        ]
    );
    assert_eq!(tray.inbox_len("x").unwrap(), 0);
    assert_eq!(tray.inbox_len("y").unwrap(), 0);
}

#[test]
fn test_every_tick_processes_each_root() {
    let log = event_log();
    let mut tray = Tray::new();
    tray.add_module("left", emitter(&log, &["OutBox"], &[(None, Stop::Physics)]))
        .unwrap();
    tray.add_module("right", emitter(&log, &["OutBox"], &[(None, Stop::Geometry)]))
        .unwrap();
    tray.add_module("l", recorder(&log, &[])).unwrap();
    tray.add_module("r", recorder(&log, &[])).unwrap();
    tray.connect_boxes("left", "OutBox", "l").unwrap();
    tray.connect_boxes("right", "OutBox", "r").unwrap();

    tray.execute(2).unwrap();

    let log = events(&log);
    assert_eq!(
        process_events(&log),
        vec![
            "left:Process",
            "l:Process",
            "right:Process",
            "r:Process",
            "left:Process",
            "l:Process",
            "right:Process",
            "r:Process",
        ]
    );
    assert_eq!(tray.ticks(), 2);
}

#[test]
fn test_structural_phases_reach_each_module_once() {
    let log = event_log();
    let mut tray = Tray::new();
    tray.add_module("root", recorder(&log, &["A", "B"])).unwrap();
    tray.add_module("a", recorder(&log, &["OutBox"])).unwrap();
    tray.add_module("b", recorder(&log, &[])).unwrap();
    tray.add_module("c", recorder(&log, &[])).unwrap();
    tray.connect_boxes("root", "A", "a").unwrap();
    tray.connect_boxes("root", "B", "b").unwrap();
    tray.connect_boxes("a", "OutBox", "c").unwrap();
    tray.configure().unwrap();

    // Leave frames sitting in inner queues; Finish must not drain them
    for i in 0..3 {
        tray.push_frame("a", FrameBuilder::physics().id(i).build())
            .unwrap();
        tray.push_frame("c", FrameBuilder::physics().id(i).build())
            .unwrap();
    }
    tray.finish().unwrap();

    let log = events(&log);
    for name in ["root", "a", "b", "c"] {
        assert_eq!(count(&log, &format!("{}:Configure", name)), 1);
        assert_eq!(count(&log, &format!("{}:Finish", name)), 1);
    }
    assert!(process_events(&log).is_empty());
    assert!(position(&log, "root:Finish") < position(&log, "a:Finish"));
    assert!(position(&log, "a:Finish") < position(&log, "c:Finish"));
    assert!(position(&log, "c:Finish") < position(&log, "b:Finish"));
    assert_eq!(tray.inbox_len("c").unwrap(), 3);
}

#[test]
fn test_broadcast_retained_on_unwired_outbox() {
    let mut tray = Tray::new();
    let (seen, sink) = collector();
    tray.add_module("m", relay(&["A", "B"])).unwrap();
    tray.add_module("x", sink).unwrap();
    tray.connect_boxes("m", "A", "x").unwrap();
    tray.configure().unwrap();

    let frame = FrameBuilder::physics().id(1).entry("energy", 2.5).build();
    tray.push_frame("m", frame.clone()).unwrap();
    tray.tick().unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![frame]);
    assert_eq!(tray.outbox_len("m", "A").unwrap(), 0);
    assert_eq!(tray.outbox_len("m", "B").unwrap(), 1);

    // Unwired boxes keep accumulating
    tray.push_frame("m", FrameBuilder::physics().id(2).build())
        .unwrap();
    tray.tick().unwrap();
    assert_eq!(tray.outbox_len("m", "B").unwrap(), 2);
    assert_eq!(tray.state(), TrayState::Configured);
}

#[test]
fn test_named_push_to_unwired_declared_outbox_is_fatal() {
    let log = event_log();
    let mut tray = Tray::new();
    let (seen, sink) = collector();
    tray.add_module("m", emitter(&log, &["A", "B"], &[(Some("B"), Stop::Physics)]))
        .unwrap();
    tray.add_module("x", sink).unwrap();
    tray.connect_boxes("m", "A", "x").unwrap();

    let err = tray.execute(1).unwrap_err();
    assert!(
        matches!(err, TrayError::UnwiredOutbox { ref module, ref outbox } if module == "m" && outbox == "B")
    );
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(tray.outbox_len("m", "A").unwrap(), 0);
    assert_eq!(tray.outbox_len("m", "B").unwrap(), 0);
    assert_eq!(tray.state(), TrayState::Failed);
    tray.abort().unwrap();
}

#[test]
fn test_named_push_to_undeclared_outbox_is_fatal() {
    let log = event_log();
    let mut tray = Tray::new();
    let (seen, sink) = collector();
    tray.add_module("m", emitter(&log, &["A", "B"], &[(Some("C"), Stop::Physics)]))
        .unwrap();
    tray.add_module("x", sink).unwrap();
    tray.connect_boxes("m", "A", "x").unwrap();

    let err = tray.execute(1).unwrap_err();
    assert!(
        matches!(err, TrayError::UnknownOutbox { ref module, ref outbox } if module == "m" && outbox == "C")
    );
    assert_eq!(tray.outbox_len("m", "A").unwrap(), 0);
    assert_eq!(tray.outbox_len("m", "B").unwrap(), 0);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(tray.state(), TrayState::Failed);

    assert!(tray.tick().is_err());
    tray.abort().unwrap();
}

/// Turns every Stop away at the gate. Its handlers would mark the frame.
struct Deaf;

impl Deaf {
    fn mark(frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        let mut frame = frame;
        frame.put("touched", true)?;
        io.push_frame(frame);
        Ok(())
    }
}

impl Module for Deaf {
    fn should_do_physics(&mut self, _frame: &Frame) -> bool {
        false
    }
    fn physics(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        Self::mark(frame, io)
    }
    fn should_do_geometry(&mut self, _frame: &Frame) -> bool {
        false
    }
    fn geometry(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        Self::mark(frame, io)
    }
    fn should_do_calibration(&mut self, _frame: &Frame) -> bool {
        false
    }
    fn calibration(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        Self::mark(frame, io)
    }
    fn should_do_detector_status(&mut self, _frame: &Frame) -> bool {
        false
    }
    fn detector_status(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        Self::mark(frame, io)
    }
    fn should_do_monitoring(&mut self, _frame: &Frame) -> bool {
        false
    }
    fn monitoring(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        Self::mark(frame, io)
    }
    fn should_do_time_cal(&mut self, _frame: &Frame) -> bool {
        false
    }
    fn time_cal(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        Self::mark(frame, io)
    }
    fn should_do_other_stops(&mut self, _frame: &Frame) -> bool {
        false
    }
    fn other_stops(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        Self::mark(frame, io)
    }
}

#[test]
fn test_closed_gates_pass_every_stop_unchanged() {
    let mut tray = Tray::new();
    let (first, first_sink) = collector();
    let (second, second_sink) = collector();
    tray.add_module("deaf", |setup: &mut ModuleSetup<'_>| {
        setup.add_outbox("A");
        setup.add_outbox("B");
        Ok(Deaf)
    })
    .unwrap();
    tray.add_module("first", first_sink).unwrap();
    tray.add_module("second", second_sink).unwrap();
    tray.connect_boxes("deaf", "A", "first").unwrap();
    tray.connect_boxes("deaf", "B", "second").unwrap();
    tray.configure().unwrap();

    let input = one_of_each_stop();
    for frame in &input {
        tray.push_frame("deaf", frame.clone()).unwrap();
    }
    tray.execute(input.len() as u64).unwrap();

    assert_eq!(*first.lock().unwrap(), input);
    assert_eq!(*second.lock().unwrap(), input);
    assert_eq!(tray.usage("deaf").unwrap().ncall, 0);
}

#[test]
fn test_registered_handler_routes_one_stop() {
    let mut tray = Tray::new();
    let (on_a, sink_a) = collector();
    let (on_b, sink_b) = collector();
    tray.add_module("m", relay(&["A", "B"])).unwrap();
    tray.add_module("a", sink_a).unwrap();
    tray.add_module("b", sink_b).unwrap();
    tray.connect_boxes("m", "A", "a").unwrap();
    tray.connect_boxes("m", "B", "b").unwrap();
    tray.configure().unwrap();

    tray.register_handler("m", Stop::Physics, |frame, io| io.push_frame_to(frame, "B"))
        .unwrap();
    tray.push_frame("m", FrameBuilder::physics().id(1).build())
        .unwrap();
    tray.push_frame("m", FrameBuilder::new(Stop::Geometry).id(2).build())
        .unwrap();
    tray.execute(2).unwrap();

    let stops = |sink: &common::recording::FrameSink| -> Vec<Stop> {
        sink.lock().unwrap().iter().map(Frame::stop).collect()
    };
    assert_eq!(stops(&on_a), vec![Stop::Geometry]);
    assert_eq!(stops(&on_b), vec![Stop::Physics, Stop::Geometry]);
    // Registered handlers are not timed
    assert_eq!(tray.usage("m").unwrap().ncall, 0);
}

/// Reads services through the active slot while processing.
struct Probe {
    seen: Vec<String>,
}

impl Module for Probe {
    fn process(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        let Some(mut frame) = io.pop_frame() else {
            return Ok(());
        };
        let me = get_service::<String>(context::INSTANCE_NAME)?;
        let run = get_service::<u32>("RunNumber")?;
        self.seen.push(format!("{}@{}", me, run));
        frame.put("probed_by", me.as_str())?;
        io.push_frame(frame);
        Ok(())
    }
}

#[test]
fn test_active_context_only_during_phase_call() {
    let mut tray = Tray::new();
    let (seen, sink) = collector();
    tray.add_service("RunNumber", 1234u32).unwrap();
    tray.add_module("probe", |setup: &mut ModuleSetup<'_>| {
        setup.add_outbox("OutBox");
        Ok(Probe { seen: Vec::new() })
    })
    .unwrap();
    tray.add_module("sink", sink).unwrap();
    tray.configure().unwrap();

    assert!(context::active().is_none());
    tray.push_frame("probe", FrameBuilder::physics().build())
        .unwrap();
    tray.tick().unwrap();
    assert!(context::active().is_none());

    let frames = seen.lock().unwrap();
    assert_eq!(
        frames[0].get("probed_by"),
        Some(&Value::String("probe".to_string()))
    );
    assert!(matches!(
        get_service::<u32>("RunNumber"),
        Err(TrayError::NoActiveContext(_))
    ));
}

/// Counts Physics frames into a shared tally.
struct Tally;

impl Module for Tally {
    fn physics(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        let tally = io.get_service::<Mutex<u64>>("Tally")?;
        *tally.lock().unwrap() += 1;
        io.push_frame(frame);
        Ok(())
    }
}

#[test]
fn test_shared_service_is_visible_to_driver() {
    let tally = Arc::new(Mutex::new(0u64));
    let mut tray = Tray::new();
    tray.add_shared_service("Tally", Arc::clone(&tally)).unwrap();
    tray.add_module("tally", |_: &mut ModuleSetup<'_>| Ok(Tally))
        .unwrap();
    tray.configure().unwrap();

    for frame in one_of_each_stop() {
        tray.push_frame("tally", frame).unwrap();
    }
    tray.push_frame("tally", FrameBuilder::physics().build())
        .unwrap();
    tray.execute(8).unwrap();

    assert_eq!(*tally.lock().unwrap(), 2);
    assert!(tray.add_shared_service("Late", Arc::new(1u8)).is_err());
}

struct Failing;

impl Module for Failing {
    fn physics(&mut self, _frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        assert!(context::active().is_some());
        Err(TrayError::module(io.name(), "bad frame"))
    }
}

#[test]
fn test_active_context_cleared_after_failing_call() {
    let mut tray = Tray::new();
    tray.add_module("fails", |_: &mut ModuleSetup<'_>| Ok(Failing))
        .unwrap();
    tray.configure().unwrap();
    tray.push_frame("fails", FrameBuilder::physics().build())
        .unwrap();

    assert!(matches!(tray.tick(), Err(TrayError::Module { .. })));
    assert!(context::active().is_none());
}

/// Burns a little CPU per Physics frame.
struct Burner;

impl Module for Burner {
    fn physics(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        let deadline = std::time::Instant::now() + std::time::Duration::from_millis(5);
        let mut acc = 0u64;
        while std::time::Instant::now() < deadline {
            acc = std::hint::black_box(acc.wrapping_mul(31).wrapping_add(7));
        }
        io.push_frame(frame);
        Ok(())
    }
}

#[test]
fn test_physics_calls_are_counted_and_timed() {
    let mut tray = Tray::new();
    tray.add_module("source", |setup: &mut ModuleSetup<'_>| {
        setup.add_outbox("OutBox");
        Ok(Relay)
    })
    .unwrap();
    tray.add_module("burner", |setup: &mut ModuleSetup<'_>| {
        setup.add_outbox("OutBox");
        Ok(Burner)
    })
    .unwrap();
    tray.configure().unwrap();

    for frame in one_of_each_stop() {
        tray.push_frame("source", frame).unwrap();
    }
    for _ in 0..2 {
        tray.push_frame("source", FrameBuilder::physics().build())
            .unwrap();
    }
    tray.execute(9).unwrap();

    let usage = tray.usage("burner").unwrap();
    assert_eq!(usage.ncall, 3);
    #[cfg(unix)]
    assert!(usage.total_time() > std::time::Duration::ZERO);
    assert!(!usage.is_reportable());

    let report = tray.usage_report();
    assert_eq!(report.len(), 2);
    assert_eq!(report[1].0, "burner");
}
