use std::cell::RefCell;

use dossier_core::{process::spawn, Captured, ExitOutcome, Orchestrator, OutputSink};

#[derive(Default)]
struct Journal {
    events: Vec<String>,
}

impl OutputSink for Journal {
    fn stdout(&mut self, chunk: &[u8]) {
        self.events
            .push(format!("out:{}", String::from_utf8_lossy(chunk).trim()));
    }

    fn stderr(&mut self, chunk: &[u8]) {
        self.events
            .push(format!("err:{}", String::from_utf8_lossy(chunk).trim()));
    }

    fn exited(&mut self, outcome: &ExitOutcome) {
        self.events.push(format!("exit:{outcome:?}"));
    }
}

#[test]
fn test_output_arrives_before_exit() {
    let orchestrator = Orchestrator::new().unwrap();
    let mut journal = Journal::default();
    let outcome = orchestrator.run("echo hello", &mut journal).unwrap();

    assert_eq!(outcome, ExitOutcome::Exited(0));
    assert_eq!(journal.events, vec!["out:hello", "exit:Exited(0)"]);
}

#[test]
fn test_streams_are_separated() {
    let orchestrator = Orchestrator::new().unwrap();
    let mut captured = Captured::default();
    orchestrator
        .run("echo to-out; echo to-err >&2; exit 4", &mut captured)
        .unwrap();

    assert_eq!(captured.stdout_lossy(), "to-out\n");
    assert_eq!(captured.stderr_lossy(), "to-err\n");
    assert_eq!(captured.outcome, Some(ExitOutcome::Exited(4)));
}

#[test]
fn test_signal_is_reported() {
    let orchestrator = Orchestrator::new().unwrap();
    let outcome = orchestrator.run_silent("kill -TERM $$").unwrap();
    assert_eq!(outcome, ExitOutcome::Signaled(15));
    assert!(!outcome.success());
}

#[test]
fn test_callbacks() {
    let orchestrator = Orchestrator::new().unwrap();
    let out = RefCell::new(Vec::new());
    let mut exits = 0;
    let outcome = orchestrator
        .run_with(
            "printf abc",
            |chunk| out.borrow_mut().extend_from_slice(chunk),
            |_| {},
            |_| exits += 1,
        )
        .unwrap();

    assert!(outcome.success());
    assert_eq!(out.into_inner(), b"abc");
    assert_eq!(exits, 1);
}

#[tokio::test]
async fn test_async_primitive_exposes_pid() {
    let handle = spawn("exit 0").unwrap();
    assert!(handle.pid().is_some());
    assert_eq!(handle.wait().await, ExitOutcome::Exited(0));
}
