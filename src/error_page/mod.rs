//! Diagnostic documents for failed script executions.
//!
//! [`ErrorPageBuilder`] only accumulates inputs. [`ErrorPageBuilder::build_report`]
//! turns them into a [`DiagnosticReport`] in one pure pass, and
//! [`render_html`] lays that report out as a standalone HTML page. Every piece
//! of free text (titles, messages, source lines, frames) is escaped on the way
//! in, since scripts and error messages routinely contain markup characters.

pub mod html;

use serde::Serialize;

use crate::config::DiagnosticSettings;
use crate::problem::ProblemError;
use crate::resource::ResourcePath;

pub use html::{escape_html, HtmlBuilder};

const ELLIPSIS: &str = "...";

const STYLE: &str = concat!(
    "html, body, pre { margin: 0; padding: 0; font-family: Menlo, Consolas, monospace; background: #F2F2F2; }",
    "h1 { margin: 0; padding: 20px 45px; background: #2F4F6F; color: #FFF; font-size: 28px; }",
    "p#detail { margin: 0; padding: 15px 45px; background: #C9D8E6; border-top: 4px solid #24405A; color: #000; font-size: 14px; }",
    "h2 { margin: 0; padding: 5px 45px; font-size: 12px; background: #333; color: #FFF; border-top: 4px solid #2A2A2A; }",
    "pre { margin: 0; border-bottom: 1px solid #DDD; position: relative; font-size: 12px; overflow: hidden; }",
    "span.line { display: inline-block; width: 30px; padding: 5px; text-align: right; background: #D6D6D6; color: #8B8B8B; font-weight: bold; }",
    "span.code { position: absolute; left: 40px; right: 0; padding: 5px; }",
    "pre:first-child span.code { border-top: 4px solid #CDCDCD; }",
    "pre:first-child span.line { border-top: 4px solid #B6B6B6; }",
    "pre.error { color: #A31012; }",
    "pre.error span.line { background: #24405A; color: #FFF; }",
);

/// One rendered row: a number, its text, and whether it is the failing line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LineInfo {
    pub line: usize,
    pub text: String,
    pub mark: bool,
}

impl LineInfo {
    fn plain(line: usize, text: impl Into<String>) -> Self {
        Self {
            line,
            text: text.into(),
            mark: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceExcerpt {
    pub path: ResourcePath,
    pub line: usize,
    pub lines: Vec<LineInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub status: u16,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceExcerpt>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub call_stack: Vec<LineInfo>,
    /// Present whenever a host cause was supplied, even if it had no frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_trace: Option<Vec<LineInfo>>,
}

/// Lines `[max(0, L-W), min(N, L+W))` of `lines`, numbered from 1, with line
/// `L` marked. Never indexes outside `lines`.
pub fn source_window(
    lines: &[String],
    error_line: usize,
    half_window: usize,
    tab_width: usize,
) -> Vec<LineInfo> {
    let first = error_line.saturating_sub(half_window);
    let last = lines.len().min(error_line.saturating_add(half_window));
    if first >= last {
        return Vec::new();
    }
    let tab = " ".repeat(tab_width);
    lines[first..last]
        .iter()
        .enumerate()
        .map(|(offset, text)| {
            let line = first + offset + 1;
            LineInfo {
                line,
                text: text.replace('\t', &tab),
                mark: line == error_line,
            }
        })
        .collect()
}

/// Guest frames in their original order, numbered from 0.
pub fn call_stack_lines(frames: &[String]) -> Vec<LineInfo> {
    frames
        .iter()
        .enumerate()
        .map(|(idx, frame)| LineInfo::plain(idx, frame.as_str()))
        .collect()
}

/// Host frames numbered from 1, cut at `cap` with a visible `...` row.
pub fn host_trace_lines(frames: &[String], cap: usize) -> Vec<LineInfo> {
    let mut lines: Vec<LineInfo> = frames
        .iter()
        .take(cap)
        .enumerate()
        .map(|(idx, frame)| LineInfo::plain(idx + 1, frame.as_str()))
        .collect();
    if frames.len() > cap {
        lines.push(LineInfo::plain(cap + 1, ELLIPSIS));
    }
    lines
}

#[derive(Clone, Debug)]
struct ProblemSnapshot {
    path: Option<ResourcePath>,
    line_number: usize,
    call_stack: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ErrorPageBuilder {
    status: u16,
    title: String,
    description: String,
    lines: Vec<String>,
    problem: Option<ProblemSnapshot>,
    cause_frames: Option<Vec<String>>,
    settings: DiagnosticSettings,
}

impl ErrorPageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Full source of the failing script, one entry per line.
    pub fn lines(mut self, lines: Vec<String>) -> Self {
        self.lines = lines;
        self
    }

    pub fn problem(mut self, problem: &ProblemError) -> Self {
        self.problem = Some(ProblemSnapshot {
            path: problem.path().cloned(),
            line_number: problem.line_number(),
            call_stack: problem.call_stack().to_vec(),
        });
        self
    }

    /// Host failure; its cause chain, outermost first, becomes the stack trace.
    pub fn cause(self, cause: &anyhow::Error) -> Self {
        let frames = cause.chain().map(|err| err.to_string()).collect();
        self.cause_frames(frames)
    }

    pub fn cause_frames(mut self, frames: Vec<String>) -> Self {
        self.cause_frames = Some(frames);
        self
    }

    pub fn settings(mut self, settings: DiagnosticSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build_report(&self) -> DiagnosticReport {
        let settings = &self.settings;
        let source = self.problem.as_ref().and_then(|problem| {
            let path = problem.path.clone()?;
            Some(SourceExcerpt {
                path,
                line: problem.line_number,
                lines: source_window(
                    &self.lines,
                    problem.line_number,
                    settings.half_window,
                    settings.tab_width,
                ),
            })
        });
        let call_stack = self
            .problem
            .as_ref()
            .map(|problem| call_stack_lines(&problem.call_stack))
            .unwrap_or_default();
        let host_trace = self
            .cause_frames
            .as_ref()
            .map(|frames| host_trace_lines(frames, settings.max_stack_frames));

        DiagnosticReport {
            status: self.status,
            title: self.title.clone(),
            description: self.description.clone(),
            source,
            call_stack,
            host_trace,
        }
    }

    /// Renders the HTML page. Consumes the builder.
    pub fn build(self) -> String {
        render_html(&self.build_report())
    }
}

pub fn render_html(report: &DiagnosticReport) -> String {
    let heading = format!("{} {}", report.status, report.title);
    let mut html = HtmlBuilder::new();
    html.text("<!DOCTYPE html>");
    html.open("html");

    html.open("head");
    html.void("meta").attribute("charset", "utf-8");
    html.open("title").escaped_text(&heading).close();
    html.open("style").text(STYLE).close();
    html.close();

    html.open("body");
    html.open("h1").escaped_text(&heading).close();
    html.open("p")
        .attribute("id", "detail")
        .escaped_text(&report.description)
        .close();

    if let Some(source) = &report.source {
        html.open("h2")
            .escaped_text(&format!("In {} at line {}", source.path, source.line))
            .close();
        html.open("div").attribute("id", "source-code");
        render_lines(&mut html, &source.lines);
        html.close();
    }

    if !report.call_stack.is_empty() {
        html.open("h2").text("Script call stack:").close();
        html.open("div").attribute("id", "call-stack");
        render_lines(&mut html, &report.call_stack);
        html.close();
    }

    if let Some(trace) = &report.host_trace {
        html.open("h2").text("Host stack trace:").close();
        html.open("div").attribute("id", "stack-trace");
        render_lines(&mut html, trace);
        html.close();
    }

    html.close();
    html.close();
    html.finish()
}

fn render_lines(html: &mut HtmlBuilder, lines: &[LineInfo]) {
    for line in lines {
        html.open("pre");
        if line.mark {
            html.attribute("class", "error");
        }
        html.open("span")
            .attribute("class", "line")
            .escaped_text(&line.line.to_string())
            .close();
        html.open("span")
            .attribute("class", "code")
            .escaped_text(&line.text)
            .close();
        html.close();
    }
}
