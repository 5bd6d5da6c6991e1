use std::fmt;

use anyhow::Result;

use crate::resource::{ResourceLoader, ResourcePath};

/// A failure raised by script execution, located in the script source.
///
/// `line_number` is 1-based; `0` means the runtime did not report a line.
/// `call_stack` lists guest frames outermost first.
#[derive(Debug)]
pub struct ProblemError {
    message: String,
    path: Option<ResourcePath>,
    line_number: usize,
    call_stack: Vec<String>,
    cause: Option<anyhow::Error>,
}

impl ProblemError {
    pub fn builder() -> ProblemBuilder {
        ProblemBuilder::default()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn path(&self) -> Option<&ResourcePath> {
        self.path.as_ref()
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn call_stack(&self) -> &[String] {
        &self.call_stack
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }
}

impl fmt::Display for ProblemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        match (&self.path, self.line_number) {
            (Some(path), 0) => write!(f, " ({path})"),
            (Some(path), line) => write!(f, " ({path}:{line})"),
            (None, _) => Ok(()),
        }
    }
}

impl std::error::Error for ProblemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| &**cause as &(dyn std::error::Error + 'static))
    }
}

#[derive(Default)]
pub struct ProblemBuilder {
    message: String,
    path: Option<ResourcePath>,
    line_number: usize,
    call_stack: Vec<String>,
    cause: Option<anyhow::Error>,
}

impl ProblemBuilder {
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn path(mut self, path: ResourcePath) -> Self {
        self.path = Some(path);
        self
    }

    pub fn line_number(mut self, line: usize) -> Self {
        self.line_number = line;
        self
    }

    pub fn call_stack(mut self, frames: Vec<String>) -> Self {
        self.call_stack = frames;
        self
    }

    pub fn frame(mut self, frame: impl Into<String>) -> Self {
        self.call_stack.push(frame.into());
        self
    }

    pub fn cause(mut self, cause: anyhow::Error) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn build(self) -> ProblemError {
        ProblemError {
            message: self.message,
            path: self.path,
            line_number: self.line_number,
            call_stack: self.call_stack,
            cause: self.cause,
        }
    }
}

/// One `at ...` line of a runtime stack dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuestFrame {
    pub function: Option<String>,
    /// File name as the runtime reported it (`<input>` for evaluated code).
    pub file: Option<String>,
    pub line: Option<usize>,
    pub text: String,
}

impl GuestFrame {
    /// Renders the frame against the script path; frames without a line
    /// (native code) keep their original text.
    pub fn render(&self, path: Option<&ResourcePath>) -> String {
        let (Some(line), Some(path)) = (self.line, path) else {
            return self.text.clone();
        };
        match &self.function {
            Some(function) => format!("{function} ({path}:{line})"),
            None => format!("{path}:{line}"),
        }
    }
}

/// Parses `at fn (file:line[:col])` style stack dumps, innermost frame first
/// as the runtime prints them. Lines not starting with `at` are skipped.
pub fn parse_guest_stack(stack: &str) -> Vec<GuestFrame> {
    stack
        .lines()
        .filter_map(|raw| raw.trim().strip_prefix("at "))
        .map(|frame| {
            let frame = frame.trim();
            let (function, location) = match (frame.rfind('('), frame.strip_suffix(')')) {
                (Some(open), Some(_)) => (
                    Some(frame[..open].trim().to_string()).filter(|f| !f.is_empty()),
                    &frame[open + 1..frame.len() - 1],
                ),
                _ => (None, frame),
            };
            let (file, line) = split_location(location);
            GuestFrame {
                function,
                file,
                line,
                text: frame.to_string(),
            }
        })
        .collect()
}

fn split_location(location: &str) -> (Option<String>, Option<usize>) {
    let Some((head, tail)) = location.trim().rsplit_once(':') else {
        return (None, None);
    };
    let Ok(last) = tail.trim().parse::<usize>() else {
        return (None, None);
    };
    match head.rsplit_once(':') {
        // file:line:col
        Some((file, line)) => match line.trim().parse::<usize>() {
            Ok(line) => (Some(file.to_string()), Some(line)),
            Err(_) => (Some(head.to_string()), Some(last)),
        },
        // file:line
        None => (Some(head.to_string()), Some(last)),
    }
}

/// Source lines of the failing script, fetched through `loader`. A problem
/// without a path, or whose script has disappeared, has no lines.
pub fn load_source_lines(loader: &dyn ResourceLoader, problem: &ProblemError) -> Result<Vec<String>> {
    let Some(path) = problem.path() else {
        return Ok(Vec::new());
    };
    match loader.load_or_none(path)? {
        Some(resource) => resource.read_lines(),
        None => Ok(Vec::new()),
    }
}
