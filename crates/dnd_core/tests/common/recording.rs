#![allow(dead_code)]

use core_types::ContextId;
use dnd_core::{DragHandler, DragPhase, OperationKind, SessionView};
use std::sync::{Arc, Mutex};

pub type Journal = Arc<Mutex<Vec<(ContextId, DragPhase)>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<(ContextId, DragPhase)> {
    journal.lock().unwrap().clone()
}

/// Records every notification and answers `enter`/`over` with `answer`.
pub struct Recorder {
    journal: Journal,
    answer: Option<OperationKind>,
}

impl Recorder {
    pub fn boxed(journal: &Journal, answer: Option<OperationKind>) -> Box<dyn DragHandler> {
        Box::new(Self {
            journal: journal.clone(),
            answer,
        })
    }
}

impl DragHandler for Recorder {
    fn handle(
        &mut self,
        phase: DragPhase,
        context: ContextId,
        _view: &SessionView,
    ) -> Option<OperationKind> {
        self.journal.lock().unwrap().push((context, phase));
        self.answer
    }
}

pub fn origin(s: &str) -> url::Origin {
    url::Url::parse(s).unwrap().origin()
}

pub fn ctx(raw: u64) -> ContextId {
    ContextId::from_raw(raw)
}
