//! Progress and result reporting.
//!
//! The orchestrator calls a [`Reporter`] at each step of a run. The
//! [`ConsoleReporter`] prints what happens for a human reading CI logs;
//! [`NullReporter`] keeps tests quiet.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::client::{Acknowledgement, ArtifactKind, Execution, SessionCollection};
use crate::model::{Build, Session, TestStatus};

/// Receives events during a run.
pub trait Reporter: Send + Sync {
    /// Called before an artifact is uploaded.
    fn on_upload_start(&self, kind: ArtifactKind, path: &Path);

    /// Called after an artifact was uploaded.
    fn on_upload_complete(&self, kind: ArtifactKind, url: &str);

    /// Called with the service's answer to the execute request.
    fn on_execution(&self, execution: &Execution);

    /// Called when the client starts waiting for the build.
    fn on_wait_start(&self, build_id: &str);

    /// Called when waiting ended, whatever the outcome.
    fn on_wait_end(&self);

    /// Called once the build is done.
    fn on_build_complete(&self, build: &Build);

    /// Called with every session that could be collected.
    fn on_sessions(&self, collection: &SessionCollection);
}

/// A reporter that does nothing.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_upload_start(&self, _kind: ArtifactKind, _path: &Path) {}
    fn on_upload_complete(&self, _kind: ArtifactKind, _url: &str) {}
    fn on_execution(&self, _execution: &Execution) {}
    fn on_wait_start(&self, _build_id: &str) {}
    fn on_wait_end(&self) {}
    fn on_build_complete(&self, _build: &Build) {}
    fn on_sessions(&self, _collection: &SessionCollection) {}
}

/// Console reporter with a spinner while the build runs.
pub struct ConsoleReporter {
    spinner: Mutex<Option<indicatif::ProgressBar>>,
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            spinner: Mutex::new(None),
            verbose,
        }
    }

    fn print_pretty<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => println!("error: {}", e),
        }
    }
}

/// One-line rendering of test counters, e.g. `3 passed, 1 failed`.
pub fn format_test_status(status: &TestStatus) -> String {
    let mut parts = vec![format!("{} passed", status.success)];
    if status.failed > 0 {
        parts.push(format!("{} failed", status.failed));
    }
    if status.timed_out > 0 {
        parts.push(format!("{} timed out", status.timed_out));
    }
    if status.ignored > 0 {
        parts.push(format!("{} ignored", status.ignored));
    }
    if status.queued > 0 {
        parts.push(format!("{} queued", status.queued));
    }
    parts.join(", ")
}

fn styled_status(status: &TestStatus) -> console::StyledObject<String> {
    let text = format_test_status(status);
    if status.has_failures() {
        console::style(text).red()
    } else {
        console::style(text).green()
    }
}

impl Reporter for ConsoleReporter {
    fn on_upload_start(&self, kind: ArtifactKind, path: &Path) {
        println!("{}", console::style(format!("Uploading {}", kind)).cyan());
        if self.verbose {
            println!("  {}", path.display());
        }
    }

    fn on_upload_complete(&self, kind: ArtifactKind, url: &str) {
        println!("Upload success");
        println!("{} {} URL => {}", console::style("Uploaded").green(), kind, url);
        println!();
    }

    fn on_execution(&self, execution: &Execution) {
        println!("Respond: {}", execution.message);
        match execution.acknowledgement() {
            Acknowledgement::Accepted => {
                println!("{} => {}", console::style("Build ID").green(), execution.build_id)
            }
            Acknowledgement::Rejected => {
                println!("{}", console::style("Execution rejected").red().bold())
            }
        }
        println!();
    }

    fn on_wait_start(&self, build_id: &str) {
        println!("{}", console::style("Test running").cyan());

        let spinner = indicatif::ProgressBar::new_spinner();
        spinner.set_message(format!("Waiting for build {}", build_id));
        spinner.enable_steady_tick(Duration::from_millis(100));

        *self.spinner.lock().unwrap_or_else(|e| e.into_inner()) = Some(spinner);
    }

    fn on_wait_end(&self) {
        if let Some(spinner) = self.spinner.lock().unwrap_or_else(|e| e.into_inner()).take() {
            spinner.finish_and_clear();
        }
    }

    fn on_build_complete(&self, build: &Build) {
        if self.verbose {
            println!("Build:");
            self.print_pretty(build);
        }

        println!("{}", console::style("Test finished").green().bold());
        for entry in build.device_entries() {
            println!(
                "  {} [{}] {}",
                entry.name,
                entry.device.status,
                styled_status(&entry.device.test_status)
            );
        }
        println!();
    }

    fn on_sessions(&self, collection: &SessionCollection) {
        if self.verbose {
            self.print_pretty(&collection.sessions);
            println!();
        }

        for session in &collection.sessions {
            print_session(session);
        }

        if !collection.failures.is_empty() {
            println!(
                "{}",
                console::style(format!(
                    "Could not fetch {} session(s):",
                    collection.failures.len()
                ))
                .yellow()
            );
            for failure in &collection.failures {
                println!(
                    "  - {} ({}): {}",
                    failure.device,
                    failure.session_id,
                    console::style(&failure.error).dim()
                );
            }
        }
    }
}

fn print_session(session: &Session) {
    println!(
        "{} {} on {}",
        console::style("Session:").cyan(),
        session.session_id,
        session.device
    );
    println!("  {}", styled_status(&session.test_status));

    for (test_name, detail) in session.sorted_test_details() {
        println!("  {}", console::style(test_name).bold());
        let rendered = serde_json::to_string_pretty(detail).unwrap_or_else(|e| e.to_string());
        for line in rendered.lines() {
            println!("    {}", line);
        }
    }
    println!();
}
