use tokio::sync::broadcast;

use crate::model::RunStatus;

/// Run execution events for real-time progress output
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        flow_name: String,
        total_steps: usize,
    },
    StepStarted {
        index: usize,
        name: String,
    },
    StepPassed {
        index: usize,
        message: String,
        duration_ms: u64,
    },
    StepFailed {
        index: usize,
        error: String,
        duration_ms: u64,
    },
    RunFinished {
        flow_name: String,
        status: RunStatus,
        duration: String,
    },
}

/// Event emitter for broadcasting run events.
///
/// Handed to the orchestrator at construction; nothing reaches for a
/// shared global emitter.
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<RunEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener printing live run progress
pub struct ConsoleRunListener;

impl ConsoleRunListener {
    pub async fn listen(mut receiver: broadcast::Receiver<RunEvent>) {
        let mut spinner: Option<ProgressBar> = None;
        let mut current_text = String::new();

        while let Ok(event) = receiver.recv().await {
            match event {
                RunEvent::RunStarted {
                    flow_name,
                    total_steps,
                } => {
                    println!(
                        "\n{} Flow: {} ({} steps)",
                        "→".blue(),
                        flow_name.white().bold(),
                        total_steps
                    );
                }

                RunEvent::StepStarted { index, name } => {
                    let pb = ProgressBar::new_spinner();
                    pb.set_style(
                        ProgressStyle::default_spinner()
                            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                            .template("    {spinner} {msg}")
                            .unwrap(),
                    );
                    current_text = format!("[{}] {}... ", index, name.dimmed());
                    pb.set_message(current_text.clone());
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                RunEvent::StepPassed { duration_ms, .. } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {}({}ms)", "✓".green(), current_text, duration_ms);
                }

                RunEvent::StepFailed {
                    error, duration_ms, ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {}({}ms)", "✗".red(), current_text, duration_ms);
                    println!("      {}", error.red());
                }

                RunEvent::RunFinished {
                    flow_name,
                    status,
                    duration,
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    let status_str = match status {
                        RunStatus::Success => "PASSED".green().bold(),
                        RunStatus::Error => "FAILED".red().bold(),
                    };
                    println!("{} Flow {} [{}] in {}", "←".blue(), flow_name, status_str, duration);
                }
            }
        }
    }
}
