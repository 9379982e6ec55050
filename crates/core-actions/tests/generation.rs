mod common;

use common::{Harness, KEY};
use core_actions::{ActionError, Command, PendingGeneration, finish_generation};
use core_events::GenerationDone;
use core_provider::CompletionError;
use core_text::HostBuffer;
use pretty_assertions::assert_eq;

fn begin(h: &mut Harness, cmd: Command) -> PendingGeneration {
    h.run(cmd).pending.expect("generation should start")
}

fn done(p: &PendingGeneration, result: Result<Vec<String>, CompletionError>) -> GenerationDone {
    GenerationDone {
        document: p.document.clone(),
        root: p.root.clone(),
        result,
    }
}

#[test]
fn completions_become_unread_children_and_take_focus() {
    let mut h = Harness::new("Once upon a time");
    let p = begin(&mut h, Command::Complete);
    assert_eq!(p.document, KEY);
    assert_eq!(p.path_text, "Once upon a time");
    assert_eq!(h.doc().generating(), Some(&p.root));

    let res = finish_generation(
        &mut h.ws,
        done(&p, Ok(vec![" foo".into(), " bar".into()])),
        &mut h.buf,
    )
    .unwrap();
    assert!(res.buffer_replaced);
    assert!(h.doc().generating().is_none());
    let children = h.doc().nodes().children(&p.root);
    assert_eq!(children.len(), 2);
    // the focused child was read on switch; its sibling stays unread
    assert!(!h.doc().node(&children[0]).unwrap().unread);
    assert!(h.doc().node(&children[1]).unwrap().unread);
    assert_eq!(h.buf.value(), "Once upon a time foo");
    h.assert_synced();
}

#[test]
fn second_request_while_generating_is_rejected() {
    let mut h = Harness::new("Once");
    let p = begin(&mut h, Command::Complete);
    let res = h.run(Command::Complete);
    assert!(res.pending.is_none());
    assert_eq!(res.notice.as_deref(), Some("a generation is already in progress"));
    assert_eq!(h.doc().generating(), Some(&p.root));
}

#[test]
fn focus_stays_when_user_moved_elsewhere() {
    let mut h = Harness::new("A");
    h.run(Command::CreateChild);
    h.type_text("1");
    let p = begin(&mut h, Command::Complete);
    // leave the generation root's subtree
    h.run(Command::CreateSibling);
    h.type_text("2");
    let res = finish_generation(&mut h.ws, done(&p, Ok(vec!["x".into()])), &mut h.buf).unwrap();
    assert!(!res.buffer_replaced);
    assert_eq!(h.buf.value(), "A2");
    assert_eq!(h.doc().nodes().children(&p.root).len(), 1);
    h.assert_synced();
}

#[test]
fn results_for_deleted_root_are_discarded() {
    let mut h = Harness::new("A");
    h.run(Command::CreateChild);
    h.type_text("1");
    let p = begin(&mut h, Command::Complete);
    h.run(Command::Delete(vec![]));
    let before = h.doc().nodes().len();
    finish_generation(&mut h.ws, done(&p, Ok(vec!["x".into()])), &mut h.buf).unwrap();
    assert_eq!(h.doc().nodes().len(), before);
    assert!(h.doc().generating().is_none());
}

#[test]
fn provider_failure_clears_marker_and_reports() {
    let mut h = Harness::new("A");
    let p = begin(&mut h, Command::Complete);
    let err = finish_generation(
        &mut h.ws,
        done(&p, Err(CompletionError::provider(Some(401), "bad key"))),
        &mut h.buf,
    )
    .unwrap_err();
    assert!(matches!(err, ActionError::Completion(_)));
    assert!(h.doc().generating().is_none());
    assert_eq!(h.doc().nodes().len(), 1);
}

#[test]
fn complete_mid_buffer_splits_at_cursor() {
    let mut h = Harness::new("It was a dark night");
    h.buf.set_cursor(9);
    let p = begin(&mut h, Command::Complete);
    assert_eq!(p.path_text, "It was a ");
    assert_eq!(h.doc().nodes().len(), 2);
    // the split keeps the buffer whole
    assert_eq!(h.buf.value(), "It was a dark night");
    h.assert_synced();
}

#[test]
fn generate_siblings_targets_parent() {
    let mut h = Harness::new("A");
    assert!(h.run(Command::GenerateSiblings).notice.is_some());
    h.run(Command::CreateChild);
    h.type_text("1");
    let p = begin(&mut h, Command::GenerateSiblings);
    assert_eq!(p.path_text, "A");
    let res = finish_generation(&mut h.ws, done(&p, Ok(vec!["2".into()])), &mut h.buf).unwrap();
    // current (the "1" child) is a descendant of the root, so focus follows
    assert!(res.buffer_replaced);
    assert_eq!(h.buf.value(), "A2");
}

#[test]
fn generation_logs_under_its_target() {
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);
    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;
        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    let capture = Capture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        let mut h = Harness::new("A");
        h.run(Command::Complete);
    });
    let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("actions.generation"), "logs: {logs}");
    assert!(logs.contains("generation_begin"), "logs: {logs}");
}
