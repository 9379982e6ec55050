#![allow(dead_code)] // Shared across integration tests; each test binary uses a subset of helpers.

use core_actions::{ActionError, Command, DispatchResult, dispatch};
use core_config::Settings;
use core_state::{Document, Workspace};
use core_text::{Buffer, HostBuffer};

pub const KEY: &str = "story.txt";

/// One open document plus the host buffer showing it.
pub struct Harness {
    pub ws: Workspace,
    pub buf: Buffer,
}

impl Harness {
    pub fn new(text: &str) -> Self {
        Self::with_settings(text, Settings::default())
    }

    pub fn with_settings(text: &str, settings: Settings) -> Self {
        let mut ws = Workspace::new(settings);
        ws.open(KEY, text).unwrap();
        Self {
            ws,
            buf: Buffer::from_str(KEY, text),
        }
    }

    pub fn try_run(&mut self, cmd: Command) -> Result<DispatchResult, ActionError> {
        dispatch(cmd, &mut self.ws, KEY, &mut self.buf)
    }

    pub fn run(&mut self, cmd: Command) -> DispatchResult {
        self.try_run(cmd).unwrap()
    }

    /// Simulate the user typing at the end of the buffer.
    pub fn type_text(&mut self, text: &str) {
        self.buf.append(text);
    }

    pub fn doc(&self) -> &Document {
        self.ws.document(KEY).unwrap()
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        self.ws.document_mut(KEY).unwrap()
    }

    pub fn assert_synced(&self) {
        assert_eq!(self.doc().active_text().unwrap(), self.buf.value());
    }
}
