//! Session state and the request loop.

use namedview_config::ReportStyle;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::dispatch::{Command, DISPATCH_TARGET};
use crate::errors::ServerError;
use crate::framing::Frames;
use crate::handlers::{self, ReduceInput};
use crate::registry::DdocRegistry;
use crate::report;
use crate::resolver::{FunctionPath, ResolvedFunction, Resolver};

/// A query session.
///
/// Holds everything that survives between requests: stored design
/// documents, the map functions added since the last `reset`, the query
/// configuration and the shared library value.
#[derive(Debug)]
pub struct ViewServer<R> {
    resolver: R,
    ddocs: DdocRegistry,
    map_functions: Vec<ResolvedFunction>,
    query_config: Map<String, Value>,
    lib: Option<Value>,
    report_style: ReportStyle,
}

impl<R: Resolver> ViewServer<R> {
    /// Creates a session resolving function paths with `resolver`.
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            ddocs: DdocRegistry::new(),
            map_functions: Vec::new(),
            query_config: Map::new(),
            lib: None,
            report_style: ReportStyle::default(),
        }
    }

    /// Sets how recoverable map and reduce failures are reported.
    #[must_use]
    pub const fn with_report_style(mut self, style: ReportStyle) -> Self {
        self.report_style = style;
        self
    }

    /// Serves requests until the driver closes the channel.
    ///
    /// # Errors
    ///
    /// Returns the first fatal failure after its error frame has been
    /// written. The session must not continue afterwards.
    pub fn run(&mut self, frames: &mut dyn Frames) -> Result<(), ServerError> {
        info!(target: DISPATCH_TARGET, "query session started");
        loop {
            let outcome = match frames.read_frame() {
                Ok(None) => {
                    info!(target: DISPATCH_TARGET, "driver closed the channel");
                    return Ok(());
                }
                Ok(Some(request)) => self.handle(frames, request),
                Err(error) => Err(ServerError::from(error)),
            };

            if let Err(failure) = outcome {
                if let Err(write_error) = report::fatal(frames, &failure) {
                    warn!(
                        target: DISPATCH_TARGET,
                        error = %write_error,
                        "failed to write the error frame"
                    );
                }
                return Err(failure);
            }
        }
    }

    /// Handles one decoded request line.
    ///
    /// # Errors
    ///
    /// Returns a fatal failure; nothing is written for it here.
    pub fn handle(&mut self, frames: &mut dyn Frames, request: Value) -> Result<(), ServerError> {
        let command = Command::parse(request)?;
        debug!(target: DISPATCH_TARGET, command = command.name(), "dispatching request");

        match command {
            Command::Reset { config } => {
                self.map_functions.clear();
                self.query_config = config.unwrap_or_default();
                frames.okay()?;
            }
            Command::AddFun { path } => {
                let function = self.resolve(&path)?;
                self.map_functions.push(function);
                frames.okay()?;
            }
            Command::AddLib { lib } => {
                self.lib = Some(lib);
                frames.okay()?;
            }
            Command::NewDdoc { id, doc } => {
                self.ddocs.add(id, doc);
                frames.okay()?;
            }
            Command::UseDdoc { id, path, args } => {
                let (kind, function) = self.ddocs.lookup(&id, &path, &self.resolver)?;
                debug!(
                    target: DISPATCH_TARGET,
                    ddoc = %id,
                    %kind,
                    function = function.name(),
                    "running design document function"
                );
                handlers::run_ddoc_function(frames, kind, &function, args)?;
            }
            Command::MapDoc { doc } => {
                handlers::map_doc(frames, self.report_style, &self.map_functions, &doc)?;
            }
            Command::Reduce {
                functions,
                keys,
                values,
            } => self.reduce(frames, &functions, &ReduceInput::Rows { keys, values })?,
            Command::Rereduce { functions, values } => {
                self.reduce(frames, &functions, &ReduceInput::Rereduce { values })?;
            }
        }
        Ok(())
    }

    /// Current query configuration.
    #[must_use]
    pub const fn query_config(&self) -> &Map<String, Value> {
        &self.query_config
    }

    /// Current shared library value.
    #[must_use]
    pub const fn lib(&self) -> Option<&Value> {
        self.lib.as_ref()
    }

    /// Map functions added since the last reset, in order.
    #[must_use]
    pub fn map_functions(&self) -> &[ResolvedFunction] {
        &self.map_functions
    }

    /// Stored design documents.
    #[must_use]
    pub const fn ddocs(&self) -> &DdocRegistry {
        &self.ddocs
    }

    fn resolve(&self, raw: &str) -> Result<ResolvedFunction, ServerError> {
        FunctionPath::parse(raw)
            .and_then(|path| self.resolver.resolve(&path))
            .map_err(|error| ServerError::resolve(raw, error))
    }

    fn reduce(
        &self,
        frames: &mut dyn Frames,
        functions: &[String],
        input: &ReduceInput,
    ) -> Result<(), ServerError> {
        handlers::reduce(
            frames,
            self.report_style,
            &self.resolver,
            &self.query_config,
            functions,
            input,
        )
    }
}
