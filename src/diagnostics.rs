// ABOUTME: Diagnostics accumulator for non-fatal warnings during a rollout.
// ABOUTME: Collects drain-loop failures that are retried but should be shown to users.

/// Collects non-fatal warnings during rollout operations.
///
/// Repeats of a kind are folded into one entry that keeps the latest
/// message, so an outage spanning many drain steps stays one entry.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        match self.warnings.iter_mut().find(|w| w.kind == warning.kind) {
            Some(existing) => {
                existing.occurrences += warning.occurrences;
                existing.message = warning.message;
            }
            None => self.warnings.push(warning),
        }
    }

    /// One entry per kind seen, in order of first occurrence.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Number of times a warning of the given kind was recorded.
    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.kind == kind)
            .map(|w| w.occurrences)
            .sum()
    }
}

/// A non-fatal warning collected during a rollout.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    /// Latest message recorded for this kind.
    pub message: String,
    pub occurrences: usize,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            occurrences: 1,
        }
    }

    pub fn scale_failed(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ScaleFailed, message)
    }

    pub fn kill_tasks_failed(message: impl Into<String>) -> Self {
        Self::new(WarningKind::KillTasksFailed, message)
    }

    pub fn proxy_query_failed(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ProxyQueryFailed, message)
    }

    pub fn refresh_failed(message: impl Into<String>) -> Self {
        Self::new(WarningKind::RefreshFailed, message)
    }
}

/// Categories of warnings that can occur while draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Scaling the new application failed; retried next step.
    ScaleFailed,
    /// Killing drained tasks of the old application failed.
    KillTasksFailed,
    /// A load balancer replica could not be queried.
    ProxyQueryFailed,
    /// Re-reading an application from the scheduler failed.
    RefreshFailed,
}
