// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use crate::bluegreen::AppState;
use crate::diagnostics::Diagnostics;
use crate::marathon::Application;
use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.event("success", message, false),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => self.event("error", message, true),
        }
    }

    /// Print the warnings collected while draining.
    pub fn diagnostics(&self, diagnostics: &Diagnostics) {
        for warning in diagnostics.warnings() {
            let message = if warning.occurrences > 1 {
                format!("{} (x{})", warning.message, warning.occurrences)
            } else {
                warning.message.clone()
            };
            match self.mode {
                OutputMode::Normal => eprintln!("  ! {message}"),
                OutputMode::Quiet => {}
                OutputMode::Json => self.event("warning", &message, true),
            }
        }
    }

    /// Print an application definition.
    pub fn application(&self, app: &Application) {
        match self.mode {
            OutputMode::Normal => {
                println!("ID:        {}", app.id);
                println!("Instances: {}", app.instances);
                if let Some(port) = app.service_port() {
                    println!("Port:      {port}");
                }
                if app.tasks_running > 0 || app.tasks_healthy > 0 {
                    println!(
                        "Tasks:     {} running, {} healthy",
                        app.tasks_running, app.tasks_healthy
                    );
                }
                let mut labels: Vec<_> = app.labels.iter().collect();
                labels.sort();
                for (key, value) in labels {
                    println!("  {key}={value}");
                }
            }
            OutputMode::Quiet => println!("{}", app.id),
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string_pretty(app) {
                    println!("{json}");
                }
            }
        }
    }

    /// Print the result of probing a deployment group.
    pub fn app_state(&self, state: &AppState) {
        let existing = state.existing_app.as_ref().map(|a| a.id.to_string());
        match self.mode {
            OutputMode::Normal => {
                println!(
                    "Existing:  {}",
                    existing.as_deref().unwrap_or("none (first deployment)")
                );
                println!("Colour:    {}", state.colour);
                println!("Port:      {}", state.next_port);
                println!("Resuming:  {}", state.resuming);
            }
            OutputMode::Quiet => println!("{} {}", state.colour, state.next_port),
            OutputMode::Json => {
                let summary = StateSummary {
                    existing_app: existing.as_deref(),
                    colour: state.colour.as_str(),
                    next_port: state.next_port,
                    resuming: state.resuming,
                };
                if let Ok(json) = serde_json::to_string(&summary) {
                    println!("{json}");
                }
            }
        }
    }

    fn event(&self, event: &str, message: &str, stderr: bool) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: self.start_time.map(|_| self.elapsed_secs()),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            if stderr {
                eprintln!("{json}");
            } else {
                println!("{json}");
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct StateSummary<'a> {
    existing_app: Option<&'a str>,
    colour: &'a str,
    next_port: u16,
    resuming: bool,
}
