use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use popmd::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 100;

/// Renders engine progress events of the root rank as a terminal progress bar.
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// A handler that tracks state but never draws, for quiet runs.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), target).with_style(Self::spinner_style());
        pb.finish_and_clear();
        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn callback(&self) -> ProgressCallback<'static> {
        let pb = Arc::clone(&self.pb);

        Box::new(move |event: Progress| {
            let Ok(bar) = pb.lock() else {
                warn!("Progress bar mutex was poisoned; dropping progress event.");
                return;
            };

            match event {
                Progress::PhaseStart { name } => {
                    bar.reset();
                    bar.set_length(0);
                    bar.set_style(Self::spinner_style());
                    bar.set_message(name);
                    bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                }
                Progress::TaskStart { total_steps } => {
                    bar.disable_steady_tick();
                    bar.reset();
                    bar.set_length(total_steps);
                    bar.set_style(Self::bar_style());
                }
                Progress::TaskAdvance { steps } => bar.inc(steps),
                Progress::TaskFinish => {
                    if let Some(len) = bar.length() {
                        bar.set_position(len);
                    }
                }
                Progress::PhaseFinish => {
                    bar.disable_steady_tick();
                    bar.finish_with_message(format!("{} done", bar.message()));
                }
                Progress::Message(msg) => bar.println(msg),
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("Failed to create spinner style template")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<20} [{bar:40.green/white}] {pos}/{len} ({rate})")
            .expect("Failed to create bar style template")
            .with_key(
                "rate",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.0}/s", state.per_sec());
                },
            )
            .progress_chars("=>-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_starts_finished_and_empty() {
        let handler = CliProgressHandler::hidden();
        let pb = handler.pb.lock().unwrap();
        assert_eq!(pb.length(), Some(0));
        assert!(pb.is_finished());
    }

    #[test]
    fn phase_and_task_events_drive_the_bar() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.callback();

        callback(Progress::PhaseStart { name: "Inserting" });
        {
            let pb = handler.pb.lock().unwrap();
            assert_eq!(pb.message(), "Inserting");
            assert!(!pb.is_finished());
        }

        callback(Progress::TaskStart { total_steps: 8 });
        callback(Progress::TaskAdvance { steps: 1 });
        callback(Progress::TaskAdvance { steps: 2 });
        assert_eq!(handler.pb.lock().unwrap().position(), 3);

        callback(Progress::TaskFinish);
        assert_eq!(handler.pb.lock().unwrap().position(), 8);

        callback(Progress::PhaseFinish);
        let pb = handler.pb.lock().unwrap();
        assert!(pb.is_finished());
        assert_eq!(pb.message(), "Inserting done");
    }

    #[test]
    fn callback_can_move_to_a_rank_thread() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.callback();

        std::thread::spawn(move || {
            callback(Progress::PhaseStart {
                name: "Stitching Molecules",
            });
            callback(Progress::Message("bonds rebased".to_string()));
            callback(Progress::PhaseFinish);
        })
        .join()
        .unwrap();

        assert!(handler.pb.lock().unwrap().is_finished());
    }
}
