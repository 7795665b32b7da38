use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use mdflow::engine::progress::Progress;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct UiState {
    active_bar: Option<ProgressBar>,
    base_message: String,
}

/// Renders core progress events as indicatif spinners and bars. Progress
/// callbacks may arrive from a worker thread, so the bar state sits behind
/// a mutex.
pub struct CliUi {
    mp: MultiProgress,
    state: Mutex<UiState>,
}

impl CliUi {
    pub fn new(quiet: bool) -> Self {
        let mp = MultiProgress::new();
        if quiet {
            mp.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        }
        Self {
            mp,
            state: Mutex::new(UiState::default()),
        }
    }

    pub fn handle(&self, progress: Progress) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        match progress {
            Progress::PhaseStart { name } => {
                if let Some(bar) = state.active_bar.take() {
                    bar.finish_and_clear();
                }

                let pb = self.mp.add(ProgressBar::new_spinner());
                pb.enable_steady_tick(Duration::from_millis(80));
                pb.set_style(Self::spinner_style());
                pb.set_message(name.to_string());

                state.active_bar = Some(pb);
                state.base_message = name.to_string();
            }
            Progress::PhaseFinish => {
                if let Some(bar) = state.active_bar.take() {
                    bar.finish_and_clear();
                }
                self.mp.println(format!("✓ {}", state.base_message)).ok();
                state.base_message.clear();
            }
            Progress::TaskStart { total_steps } => {
                if let Some(bar) = state.active_bar.as_ref() {
                    bar.set_style(Self::bar_style());
                    bar.set_length(total_steps);
                    bar.set_position(0);
                    bar.disable_steady_tick();
                }
            }
            Progress::TaskIncrement => {
                if let Some(bar) = state.active_bar.as_ref() {
                    bar.inc(1);
                }
            }
            Progress::TaskFinish => {
                if let Some(bar) = state.active_bar.as_ref() {
                    bar.finish();
                }
            }
            Progress::StatusUpdate { text } => {
                if let Some(bar) = state.active_bar.as_ref() {
                    bar.set_message(format!("{} ({})", state.base_message, text));
                }
            }
            Progress::Message(msg) => {
                self.mp.println(format!("  {}", msg)).ok();
            }
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<40} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("Invalid template")
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    write!(w, "{:.1}s", state.eta().as_secs_f64()).unwrap();
                },
            )
            .progress_chars("━╸ ")
    }
}
