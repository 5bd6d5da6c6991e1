//! Script execution on top of `quick-js`.
//!
//! Each run gets a fresh runtime context. The script is evaluated as a
//! CommonJS-style module: it sees `module`, `exports` and (optionally) an
//! `input` global, and whatever ends up in `module.exports` is handed back as
//! JSON. The module wrapper keeps everything before the script on its first
//! line, so runtime line numbers match the script source.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use quick_js::{Context as JsContext, ExecutionError, JsValue};
use serde::Serialize;
use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::error_page::ErrorPageBuilder;
use crate::logging::{log, Level, LogEntry, LogSink, StdioLogSink};
use crate::problem::{load_source_lines, parse_guest_stack, GuestFrame, ProblemError};
use crate::registry::Registry;
use crate::resource::{
    chain_loaders, ArchiveResourceLoader, FileResourceLoader, ResourceLoader, ResourceNotFound,
    ResourcePath,
};
use crate::script::{to_js_value, ScriptValue};

const COMPONENT: &str = "engine";

const MODULE_PRELUDE: &str = "(function(){const module={exports:{}};try{(function(module,exports){";

const MODULE_EPILOGUE: &str = r#"
})(module,module.exports);return {ok:true,exports:__jsembed_detach(module.exports,[])};}catch(e){return __jsembed_failure(e);}})()"#;

// Compiles the wrapped module inside the runtime, so a syntax error is caught
// with its stack (and line) instead of escaping as a bare exception string.
const EVAL_DRIVER: &str =
    "(function(){try{return (0,eval)(globalThis.__jsembed_source);}catch(e){return __jsembed_failure(e);}})()";

// quick-js marshals functions as empty objects and cannot marshal cyclic
// graphs; both become null before the value leaves the runtime.
const RUNTIME_SETUP: &str = r#"
globalThis.__jsembed_detach = function detach(value, seen) {
    if (typeof value === 'function') return null;
    if (value === null || typeof value !== 'object') return value;
    if (seen.indexOf(value) >= 0) return null;
    seen.push(value);
    let out;
    if (Array.isArray(value)) {
        out = value.map((item) => detach(item, seen));
    } else {
        out = {};
        for (const key of Object.keys(value)) {
            out[key] = detach(value[key], seen);
        }
    }
    seen.pop();
    return out;
};

globalThis.__jsembed_failure = function failure(e) {
    let message;
    if (e instanceof Error) {
        message = e.name === 'Error' ? String(e.message) : e.name + ': ' + e.message;
    } else {
        message = String(e);
    }
    return { ok: false, message: message, stack: String((e && e.stack) || '') };
};

globalThis.console = {
    log: (...args) => { globalThis.__jsembed_console('log', ...args); },
    info: (...args) => { globalThis.__jsembed_console('info', ...args); },
    warn: (...args) => { globalThis.__jsembed_console('warn', ...args); },
    error: (...args) => { globalThis.__jsembed_console('error', ...args); },
    debug: (...args) => { globalThis.__jsembed_console('debug', ...args); },
    trace: (...args) => { globalThis.__jsembed_console('trace', ...args); }
};
void 0;
"#;

/// Value exported by a successful run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScriptExports {
    pub resource: ResourcePath,
    pub value: Value,
}

#[derive(Debug)]
pub enum ScriptFailure {
    NotFound(ResourcePath),
    /// The script threw, or failed to compile.
    Problem(ProblemError),
    Host(anyhow::Error),
}

impl ScriptFailure {
    pub fn status(&self) -> u16 {
        match self {
            ScriptFailure::NotFound(_) => 404,
            ScriptFailure::Problem(_) | ScriptFailure::Host(_) => 500,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ScriptFailure::NotFound(_) => "Not Found",
            ScriptFailure::Problem(_) => "Script Error",
            ScriptFailure::Host(_) => "Internal Server Error",
        }
    }
}

impl fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptFailure::NotFound(path) => write!(f, "script not found: {path}"),
            ScriptFailure::Problem(problem) => write!(f, "{problem}"),
            ScriptFailure::Host(err) => write!(f, "{err:#}"),
        }
    }
}

impl std::error::Error for ScriptFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScriptFailure::NotFound(_) => None,
            ScriptFailure::Problem(problem) => Some(problem),
            ScriptFailure::Host(err) => Some(&**err as &(dyn std::error::Error + 'static)),
        }
    }
}

impl From<anyhow::Error> for ScriptFailure {
    fn from(err: anyhow::Error) -> Self {
        ScriptFailure::Host(err)
    }
}

impl From<ResourceNotFound> for ScriptFailure {
    fn from(err: ResourceNotFound) -> Self {
        ScriptFailure::NotFound(err.path)
    }
}

#[derive(Default)]
pub struct EngineBuilder {
    loaders: Vec<Box<dyn ResourceLoader>>,
    config: Option<RuntimeConfig>,
    sink: Option<Arc<dyn LogSink>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a loader. Loaders are consulted in the order they were added,
    /// ahead of the roots and archives named by the configuration.
    pub fn loader(mut self, loader: impl ResourceLoader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let config = self.config.unwrap_or_default();
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(StdioLogSink::new(config.log_level)) as Arc<dyn LogSink>);

        let mut loaders = self.loaders;
        for root in &config.roots {
            loaders.push(Box::new(FileResourceLoader::new(root)));
        }
        for archive in &config.archives {
            loaders.push(Box::new(ArchiveResourceLoader::open(archive)?));
        }
        log(
            sink.as_ref(),
            Level::Debug,
            COMPONENT,
            format!("engine ready with {} resource loader(s)", loaders.len()),
        );
        let loader: Arc<dyn ResourceLoader> = Arc::from(chain_loaders(loaders));

        let registry = Registry::builder()
            .bind_instance::<dyn ResourceLoader>(loader)
            .bind_instance::<dyn LogSink>(sink)
            .bind_instance(Arc::new(config))
            .build()?;
        Engine::from_registry(registry)
    }
}

/// Runs scripts found through a resource loader chain. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    registry: Registry,
    loader: Arc<dyn ResourceLoader>,
    sink: Arc<dyn LogSink>,
    config: Arc<RuntimeConfig>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Uses the `ResourceLoader`, `LogSink` and `RuntimeConfig` bound in
    /// `registry`. A missing configuration falls back to the defaults.
    pub fn from_registry(registry: Registry) -> Result<Self> {
        let loader = registry.get_instance::<dyn ResourceLoader>()?;
        let sink = registry.get_instance::<dyn LogSink>()?;
        let config = registry
            .get_instance_or_none::<RuntimeConfig>()
            .unwrap_or_default();
        Ok(Self {
            registry,
            loader,
            sink,
            config,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn loader(&self) -> &dyn ResourceLoader {
        self.loader.as_ref()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn run(&self, path: &ResourcePath) -> Result<ScriptExports, ScriptFailure> {
        self.execute(path, None)
    }

    /// Like [`Engine::run`], with `input` visible to the script as a global.
    pub fn run_with_input(
        &self,
        path: &ResourcePath,
        input: &Value,
    ) -> Result<ScriptExports, ScriptFailure> {
        self.execute(path, Some(input))
    }

    /// Diagnostic document for a failed run.
    pub fn error_page(&self, failure: &ScriptFailure) -> String {
        let mut page = ErrorPageBuilder::new()
            .status(failure.status())
            .title(failure.title())
            .settings(self.config.diagnostics);
        match failure {
            ScriptFailure::NotFound(path) => {
                page = page.description(format!("No script at {path}"));
            }
            ScriptFailure::Problem(problem) => {
                let lines = load_source_lines(self.loader.as_ref(), problem).unwrap_or_else(|err| {
                    log(
                        self.sink.as_ref(),
                        Level::Warn,
                        COMPONENT,
                        format!("unable to load source for error page: {err:#}"),
                    );
                    Vec::new()
                });
                page = page.description(problem.message()).lines(lines).problem(problem);
                if let Some(cause) = problem.cause() {
                    page = page.cause(cause);
                }
            }
            ScriptFailure::Host(err) => {
                page = page.description(err.to_string()).cause(err);
            }
        }
        page.build()
    }

    fn execute(
        &self,
        path: &ResourcePath,
        input: Option<&Value>,
    ) -> Result<ScriptExports, ScriptFailure> {
        let resource = match self.loader.load_or_none(path)? {
            Some(resource) => resource,
            None => {
                log(
                    self.sink.as_ref(),
                    Level::Warn,
                    COMPONENT,
                    format!("script not found: {path}"),
                );
                return Err(ScriptFailure::NotFound(path.clone()));
            }
        };
        let source = resource.read_string()?;
        let line_count = source.lines().count();

        let mut wrapped = String::with_capacity(source.len() + 512);
        wrapped.push_str(MODULE_PRELUDE);
        wrapped.push_str(&source);
        wrapped.push_str(MODULE_EPILOGUE);

        // QuickJS pins its stack limit to the frame that creates the context,
        // so the context has to live in the frame that evaluates.
        let context =
            JsContext::new().map_err(|err| anyhow!("unable to create JS context: {err}"))?;
        self.prepare_context(&context, input)?;
        context
            .set_global("__jsembed_source", JsValue::String(wrapped))
            .map_err(|err| anyhow!("failed to stage script source: {err}"))?;

        let outcome = match context.eval(EVAL_DRIVER) {
            Ok(outcome) => outcome,
            Err(ExecutionError::Exception(raised)) => {
                let problem = ProblemError::builder()
                    .message(describe_exception(&raised))
                    .path(path.clone())
                    .build();
                return Err(self.report(problem));
            }
            Err(err) => return Err(anyhow!("script evaluation failed: {err}").into()),
        };

        let outcome_view = ScriptValue::new(&outcome);
        let succeeded = outcome_view
            .get_member("ok")
            .map_err(anyhow::Error::from)?
            .as_bool()
            .unwrap_or(false);
        if succeeded {
            let value = outcome_view
                .get_member("exports")
                .and_then(|exports| exports.to_json_with_depth(self.config.max_conversion_depth))
                .map_err(anyhow::Error::from)?;
            log(
                self.sink.as_ref(),
                Level::Debug,
                COMPONENT,
                format!("script {path} completed"),
            );
            return Ok(ScriptExports {
                resource: path.clone(),
                value,
            });
        }

        let read_text = |key: &str| -> String {
            outcome_view
                .get_member(key)
                .ok()
                .and_then(|member| member.as_str().map(str::to_string))
                .unwrap_or_default()
        };
        let frames = script_frames(parse_guest_stack(&read_text("stack")), line_count);
        let line_number = frames.first().and_then(|frame| frame.line).unwrap_or(0);
        let problem = ProblemError::builder()
            .message(read_text("message"))
            .path(path.clone())
            .line_number(line_number)
            .call_stack(frames.iter().rev().map(|frame| frame.render(Some(path))).collect())
            .build();
        Err(self.report(problem))
    }

    fn report(&self, problem: ProblemError) -> ScriptFailure {
        self.sink.emit(
            LogEntry::new(Level::Error, problem.to_string())
                .tag("component", COMPONENT)
                .tag("line", problem.line_number()),
        );
        ScriptFailure::Problem(problem)
    }

    fn prepare_context(&self, context: &JsContext, input: Option<&Value>) -> Result<()> {
        // Callbacks must be unwind safe; the sink is only used to emit entries.
        let sink = AssertUnwindSafe(Arc::clone(&self.sink));
        context
            .add_callback(
                "__jsembed_console",
                move |args: quick_js::Arguments| -> Result<JsValue, String> {
                    let mut values = args.into_vec().into_iter();
                    let method = values
                        .next()
                        .and_then(JsValue::into_string)
                        .unwrap_or_else(|| "log".to_string());
                    let joined = values.map(format_js_value).collect::<Vec<_>>().join(" ");
                    let message = if joined.trim().is_empty() {
                        format!("[console.{method}]")
                    } else {
                        joined
                    };
                    sink.emit(
                        LogEntry::new(Level::from_console(&method), message)
                            .tag("component", "script"),
                    );
                    Ok(JsValue::Null)
                },
            )
            .map_err(|err| anyhow!("failed to register console bridge: {err}"))?;

        context
            .eval(RUNTIME_SETUP)
            .map_err(|err| anyhow!("failed to initialise script runtime: {err}"))?;

        if let Some(input) = input {
            context
                .set_global("input", to_js_value(input))
                .map_err(|err| anyhow!("failed to expose script input: {err}"))?;
        }
        Ok(())
    }
}

/// Keeps the frames that point into the script itself, innermost first.
/// Everything from the driver's `eval` call outwards is dropped, as are native
/// frames and lines past the end of the script (the module wrapper).
fn script_frames(frames: Vec<GuestFrame>, line_count: usize) -> Vec<GuestFrame> {
    let frames: Vec<GuestFrame> = frames
        .into_iter()
        .take_while(|frame| !(frame.line.is_none() && frame.function.as_deref() == Some("eval")))
        .filter(|frame| frame.line.map_or(false, |line| line <= line_count))
        .collect();
    let script_file = frames.first().and_then(|frame| frame.file.clone());
    frames
        .into_iter()
        .filter(|frame| frame.file == script_file)
        .collect()
}

fn describe_exception(raised: &JsValue) -> String {
    match raised {
        JsValue::String(message) => message.clone(),
        other => format_js_value(other.clone()),
    }
}

fn format_js_value(value: JsValue) -> String {
    match value {
        JsValue::Undefined => "undefined".to_string(),
        JsValue::Null => "null".to_string(),
        JsValue::Bool(b) => b.to_string(),
        JsValue::Int(n) => n.to_string(),
        JsValue::Float(f) => {
            if f.fract() == 0.0 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        JsValue::String(s) => s,
        other @ (JsValue::Array(_) | JsValue::Object(_)) => ScriptValue::new(&other)
            .to_json()
            .ok()
            .and_then(|json| serde_json::to_string(&json).ok())
            .unwrap_or_else(|| "[object]".to_string()),
        _ => "[unknown]".to_string(),
    }
}
