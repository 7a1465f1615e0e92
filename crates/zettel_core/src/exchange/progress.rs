//! Progress reporting for batch runs.
//!
//! # Responsibility
//! - Let callers observe batch progress without core depending on any
//!   display mechanism.
//!
//! # Invariants
//! - Every run emits exactly one `Started` and one `Finished` per stage.
//! - `Item` events are emitted once per processed item, in processing order.

use std::fmt::{Display, Formatter};

/// Batch stage an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Export,
    Import,
    Merge,
    Clear,
    ValidateLinks,
    Migrate,
    Verify,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Export => "export",
            Self::Import => "import",
            Self::Merge => "merge",
            Self::Clear => "clear",
            Self::ValidateLinks => "validate_links",
            Self::Migrate => "migrate",
            Self::Verify => "verify",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one processed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Exported,
    Imported,
    Updated,
    Skipped,
    Deleted,
    Checked,
    Failed,
}

impl ItemOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exported => "exported",
            Self::Imported => "imported",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
            Self::Deleted => "deleted",
            Self::Checked => "checked",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { stage: Stage, total: usize },
    /// `label` is a note id or file name.
    Item {
        stage: Stage,
        label: String,
        outcome: ItemOutcome,
    },
    Finished { stage: Stage },
}

/// Receiver of batch progress events.
pub trait ProgressObserver {
    fn on_event(&mut self, event: ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: FnMut(ProgressEvent),
{
    fn on_event(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_event(&mut self, _event: ProgressEvent) {}
}

/// Convenience emitters shared by the batch runners.
pub(crate) trait ProgressExt {
    fn started(&mut self, stage: Stage, total: usize);
    fn item(&mut self, stage: Stage, label: &str, outcome: ItemOutcome);
    fn finished(&mut self, stage: Stage);
}

impl<O: ProgressObserver + ?Sized> ProgressExt for O {
    fn started(&mut self, stage: Stage, total: usize) {
        self.on_event(ProgressEvent::Started { stage, total });
    }

    fn item(&mut self, stage: Stage, label: &str, outcome: ItemOutcome) {
        self.on_event(ProgressEvent::Item {
            stage,
            label: label.to_string(),
            outcome,
        });
    }

    fn finished(&mut self, stage: Stage) {
        self.on_event(ProgressEvent::Finished { stage });
    }
}

#[cfg(test)]
mod tests {
    use super::{ItemOutcome, NoProgress, ProgressEvent, ProgressExt, ProgressObserver, Stage};

    #[test]
    fn closures_receive_events_in_order() {
        let mut seen = Vec::new();
        {
            let mut observer = |event: ProgressEvent| seen.push(event);
            observer.started(Stage::Import, 1);
            observer.item(Stage::Import, "a.md", ItemOutcome::Imported);
            observer.finished(Stage::Import);
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[1],
            ProgressEvent::Item {
                stage: Stage::Import,
                label: "a.md".to_string(),
                outcome: ItemOutcome::Imported,
            }
        );
    }

    #[test]
    fn no_progress_accepts_events() {
        let mut observer = NoProgress;
        observer.on_event(ProgressEvent::Finished {
            stage: Stage::Export,
        });
    }
}
