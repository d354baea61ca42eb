//! Progress events for long populate passes.
//!
//! A run is split into named phases; inside a phase, countable work (random draws, lattice
//! planes) is reported as a task. Usually only the root rank is given an observer, the
//! others carry a silent reporter and run the same code.

/// What an observer sees while a populate run advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    PhaseStart {
        name: &'static str,
    },
    PhaseFinish,

    /// Countable work inside the current phase.
    TaskStart {
        total_steps: u64,
    },
    TaskAdvance {
        steps: u64,
    },
    TaskFinish,

    /// A note for the operator, such as a shortfall the run recovered from.
    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Routes engine events to an optional observer.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    sink: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    /// A reporter that drops every event.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            sink: Some(callback),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.sink.is_none()
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(sink) = &self.sink {
            sink(event);
        }
    }

    /// Sends a note to the observer. `text` is only built when someone listens.
    pub fn message(&self, text: impl FnOnce() -> String) {
        if let Some(sink) = &self.sink {
            sink(Progress::Message(text()));
        }
    }

    /// Starts phase `name`; it finishes when the returned scope is dropped.
    #[must_use = "the phase finishes as soon as the scope is dropped"]
    pub fn phase(&self, name: &'static str) -> PhaseScope<'_, 'a> {
        self.report(Progress::PhaseStart { name });
        PhaseScope { reporter: self }
    }

    /// Starts a task of `total_steps`; it finishes when the returned scope is dropped.
    #[must_use = "the task finishes as soon as the scope is dropped"]
    pub fn task(&self, total_steps: u64) -> TaskScope<'_, 'a> {
        self.report(Progress::TaskStart { total_steps });
        TaskScope { reporter: self }
    }
}

pub struct PhaseScope<'r, 'a> {
    reporter: &'r ProgressReporter<'a>,
}

impl PhaseScope<'_, '_> {
    pub fn finish(self) {}
}

impl Drop for PhaseScope<'_, '_> {
    fn drop(&mut self) {
        self.reporter.report(Progress::PhaseFinish);
    }
}

pub struct TaskScope<'r, 'a> {
    reporter: &'r ProgressReporter<'a>,
}

impl TaskScope<'_, '_> {
    #[inline]
    pub fn advance(&self, steps: u64) {
        if steps > 0 {
            self.reporter.report(Progress::TaskAdvance { steps });
        }
    }

    pub fn finish(self) {}
}

impl Drop for TaskScope<'_, '_> {
    fn drop(&mut self) {
        self.reporter.report(Progress::TaskFinish);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(events: &Mutex<Vec<Progress>>) -> ProgressReporter<'_> {
        ProgressReporter::with_callback(Box::new(move |event| {
            events.lock().unwrap().push(event);
        }))
    }

    #[test]
    fn silent_reporter_never_builds_messages() {
        let reporter = ProgressReporter::new();
        assert!(reporter.is_silent());
        reporter.message(|| panic!("message built for a silent reporter"));
        let _task = reporter.task(3);
    }

    #[test]
    fn scopes_close_what_they_open() {
        let events = Mutex::new(Vec::new());
        let reporter = recording(&events);
        assert!(!reporter.is_silent());
        {
            let phase = reporter.phase("Inserting");
            let task = reporter.task(4);
            task.advance(0);
            task.advance(3);
            reporter.message(|| "halfway".to_string());
            task.finish();
            phase.finish();
        }
        drop(reporter);

        assert_eq!(
            events.into_inner().unwrap(),
            vec![
                Progress::PhaseStart { name: "Inserting" },
                Progress::TaskStart { total_steps: 4 },
                Progress::TaskAdvance { steps: 3 },
                Progress::Message("halfway".to_string()),
                Progress::TaskFinish,
                Progress::PhaseFinish,
            ]
        );
    }

    #[test]
    fn phase_finishes_on_early_return() {
        fn fails(reporter: &ProgressReporter<'_>) -> Result<(), ()> {
            let _phase = reporter.phase("Counting");
            Err(())
        }

        let events = Mutex::new(Vec::new());
        let reporter = recording(&events);
        assert!(fails(&reporter).is_err());
        drop(reporter);
        assert_eq!(
            events.into_inner().unwrap().last(),
            Some(&Progress::PhaseFinish)
        );
    }
}
