use super::status::Status;
use super::visualizer::EvalBar;
use crate::framework::supervisor::CrashReport;
use std::io::{self, Write};

/// Boundary between the control surface and whatever actually draws it.
///
/// Every method is called on the UI task only. `show_crash` is modal: the
/// control surface does not process further messages until it returns.
pub trait Presenter {
    fn show_status(&mut self, status: Status);
    fn show_evaluation(&mut self, bar: &EvalBar);
    fn show_crash(&mut self, report: &CrashReport);
    fn show_error(&mut self, message: &str);
    fn show_info(&mut self, message: &str);
}

/// Plain terminal presenter
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    last_bar: Option<String>,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(line: &str) {
        println!("{}", line);
        if let Err(e) = io::stdout().flush() {
            eprintln!("Warning: Failed to flush stdout: {}", e);
        }
    }
}

impl Presenter for ConsolePresenter {
    fn show_status(&mut self, status: Status) {
        Self::emit(&format!("status: {}", status));
    }

    fn show_evaluation(&mut self, bar: &EvalBar) {
        let rendered = bar.render();
        if self.last_bar.as_deref() != Some(rendered.as_str()) {
            Self::emit(&format!("eval: {}", rendered));
            self.last_bar = Some(rendered);
        }
    }

    fn show_crash(&mut self, report: &CrashReport) {
        eprintln!("!! {}", report);
    }

    fn show_error(&mut self, message: &str) {
        eprintln!("error: {}", message);
    }

    fn show_info(&mut self, message: &str) {
        Self::emit(message);
    }
}
