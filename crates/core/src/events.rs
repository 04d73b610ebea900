//! Run events and reporters
//!
//! The engines never print or configure logging themselves. Progress is
//! emitted as [`RunEvent`]s to a [`Reporter`] supplied by the caller, which
//! decides what to do with them (render, forward, record, ignore).

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::results::{CommandId, HaltReason};

/// Events emitted while a Stepfile runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    RunStarted {
        total: usize,
        parallel: bool,
    },
    CommandStarted {
        id: CommandId,
        command_line: String,
    },
    CommandFinished {
        id: CommandId,
        exit_code: i32,
        duration: Duration,
    },
    CommandSkipped {
        id: CommandId,
        failed_dependency: String,
    },
    RunHalted {
        reason: HaltReason,
    },
    RunFinished {
        succeeded: usize,
        failed: usize,
        skipped: usize,
    },
}

/// Receiver of run events
pub trait Reporter: Send + Sync {
    fn report(&self, event: &RunEvent);
}

/// Discards all events
#[derive(Debug, Clone, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _event: &RunEvent) {}
}

/// Forwards events to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelReporter {
    pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self { sender }
    }
}

impl Reporter for ChannelReporter {
    fn report(&self, event: &RunEvent) {
        // Receiver may have been dropped
        let _ = self.sender.send(event.clone());
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Ids of commands that were started, in event order
    pub fn started(&self) -> Vec<CommandId> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RunEvent::CommandStarted { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &RunEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_reporter_keeps_order() {
        let reporter = RecordingReporter::new();
        reporter.report(&RunEvent::RunStarted {
            total: 1,
            parallel: false,
        });
        reporter.report(&RunEvent::CommandStarted {
            id: CommandId::Named("a".into()),
            command_line: "true".into(),
        });

        assert_eq!(reporter.events().len(), 2);
        assert_eq!(reporter.started(), vec![CommandId::Named("a".into())]);
    }

    #[tokio::test]
    async fn test_channel_reporter_forwards_events() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let reporter = ChannelReporter::new(sender);
        reporter.report(&RunEvent::RunFinished {
            succeeded: 1,
            failed: 0,
            skipped: 0,
        });
        drop(reporter);

        assert_eq!(
            receiver.recv().await,
            Some(RunEvent::RunFinished {
                succeeded: 1,
                failed: 0,
                skipped: 0,
            })
        );
        assert_eq!(receiver.recv().await, None);
    }
}
