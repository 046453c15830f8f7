//! Shared fakes for behaviour tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use haven_core::genai::GenFuture;
use haven_core::{
    DateWindow, GenError, GenerationRequest, GenerationResponse, TextGenerator, YearMonth,
};

type Scripted = Result<GenerationResponse, GenError>;

/// Text generator that answers by request kind and counts every call.
///
/// Grounded requests, schema-constrained requests and plain requests each
/// get their own scripted answer; unscripted kinds fail with a transport
/// error.
pub struct ScriptedGenerator {
    grounded: Scripted,
    structured: Scripted,
    plain: Scripted,
    grounded_calls: AtomicUsize,
    structured_calls: AtomicUsize,
    plain_calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self {
            grounded: Err(unscripted()),
            structured: Err(unscripted()),
            plain: Err(unscripted()),
            grounded_calls: AtomicUsize::new(0),
            structured_calls: AtomicUsize::new(0),
            plain_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

fn unscripted() -> GenError {
    GenError::Transport(String::from("unscripted request kind"))
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_grounded(mut self, text: impl Into<String>) -> Self {
        self.grounded = Ok(GenerationResponse::text(text));
        self
    }

    pub fn on_grounded_error(mut self, error: GenError) -> Self {
        self.grounded = Err(error);
        self
    }

    pub fn on_structured(mut self, text: impl Into<String>) -> Self {
        self.structured = Ok(GenerationResponse::text(text));
        self
    }

    pub fn on_plain(mut self, text: impl Into<String>) -> Self {
        self.plain = Ok(GenerationResponse::text(text));
        self
    }

    pub fn grounded_calls(&self) -> usize {
        self.grounded_calls.load(Ordering::SeqCst)
    }

    pub fn structured_calls(&self) -> usize {
        self.structured_calls.load(Ordering::SeqCst)
    }

    pub fn plain_calls(&self) -> usize {
        self.plain_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.grounded_calls() + self.structured_calls() + self.plain_calls()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn id(&self) -> &'static str {
        "scripted"
    }

    fn generate<'a>(&'a self, request: GenerationRequest) -> GenFuture<'a> {
        let answer = if request.grounded {
            self.grounded_calls.fetch_add(1, Ordering::SeqCst);
            self.grounded.clone()
        } else if request.response_schema.is_some() {
            self.structured_calls.fetch_add(1, Ordering::SeqCst);
            self.structured.clone()
        } else {
            self.plain_calls.fetch_add(1, Ordering::SeqCst);
            self.plain.clone()
        };
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        Box::pin(async move { answer })
    }
}

/// Five-year window ending this month, as the normalizer clamps to it.
pub fn five_year_window() -> DateWindow {
    DateWindow::trailing_years(5, YearMonth::current()).expect("valid window")
}

pub fn twelve_month_window() -> DateWindow {
    DateWindow::trailing_months(12, YearMonth::current()).expect("valid window")
}

/// Prose-wrapped single-asset answer with anchors at both window ends.
pub fn single_asset_answer(window: DateWindow, first: f64, last: f64) -> String {
    format!(
        "Here are the monthly closes: [{{\"date\": \"{}\", \"value\": \"${first}\"}}, \
         {{\"date\": \"{}\", \"value\": {last}}}] Sources follow [1].",
        window.start, window.end
    )
}
