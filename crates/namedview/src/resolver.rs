//! Turning function paths into executable functions.
//!
//! A path has the shape `module.name` with at least two dot-separated
//! segments, optionally followed by `|version`. How a name maps to code is
//! up to the [`Resolver`]; [`FunctionTable`] is the in-process
//! implementation backed by registered closures.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::builtins;
use crate::errors::{FunctionError, ResolveError};
use crate::function::{Invocation, ViewFunction};
use crate::scope::CallbackScope;

/// A parsed function path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPath {
    name: String,
    version: Option<String>,
}

impl FunctionPath {
    /// Parses `module.name[|version]`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidPath`] when the name has fewer than two
    /// segments, contains an empty segment, or carries an empty version.
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let invalid = || ResolveError::InvalidPath {
            path: raw.to_owned(),
        };
        let (name, version) = raw
            .split_once('|')
            .map_or((raw, None), |(base, tag)| (base, Some(tag)));

        let segments: Vec<&str> = name.split('.').collect();
        if segments.len() < 2 || segments.iter().any(|segment| segment.is_empty()) {
            return Err(invalid());
        }
        if version.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_owned(),
            version: version.map(str::to_owned),
        })
    }

    /// Dotted function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version requested by the path suffix.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl fmt::Display for FunctionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(version) = &self.version {
            write!(f, "|{version}")?;
        }
        Ok(())
    }
}

/// Looks up executable functions by path.
pub trait Resolver {
    /// Resolves `path` to a function.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] for unknown names and
    /// [`ResolveError::VersionMismatch`] when the path requests a version the
    /// function does not declare.
    fn resolve(&self, path: &FunctionPath) -> Result<ResolvedFunction, ResolveError>;
}

/// An executable function with its identity.
#[derive(Clone)]
pub struct ResolvedFunction {
    name: String,
    version: Option<String>,
    function: Arc<dyn ViewFunction>,
}

impl ResolvedFunction {
    /// Wraps `function` under `name` with no declared version.
    pub fn new(name: impl Into<String>, function: Arc<dyn ViewFunction>) -> Self {
        Self {
            name: name.into(),
            version: None,
            function,
        }
    }

    /// Sets the declared version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Dotted function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared version, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Invokes the function inside `scope`.
    ///
    /// # Errors
    ///
    /// Propagates whatever the function raises.
    pub fn call(
        &self,
        scope: &mut CallbackScope<'_>,
        args: Vec<Value>,
    ) -> Result<Invocation, FunctionError> {
        self.function.call(scope, args)
    }

    /// Whether both handles share the same underlying function.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.function, &other.function)
    }
}

impl fmt::Debug for ResolvedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedFunction")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// A resolver backed by functions registered in process.
#[derive(Debug, Default, Clone)]
pub struct FunctionTable {
    functions: HashMap<String, ResolvedFunction>,
}

impl FunctionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding the `builtin.*` reduce functions.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        for (name, function) in builtins::all() {
            table
                .functions
                .insert(name.to_owned(), ResolvedFunction::new(name, function));
        }
        table
    }

    /// Registers `function` under `name` with no declared version.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidPath`] when `name` is not a valid
    /// dotted name and [`ResolveError::AlreadyRegistered`] when it is taken.
    pub fn register(
        &mut self,
        name: &str,
        function: Arc<dyn ViewFunction>,
    ) -> Result<(), ResolveError> {
        self.insert(ResolvedFunction::new(name, function))
    }

    /// Registers `function` under `name` declaring `version`.
    ///
    /// # Errors
    ///
    /// Same as [`FunctionTable::register`].
    pub fn register_versioned(
        &mut self,
        name: &str,
        version: &str,
        function: Arc<dyn ViewFunction>,
    ) -> Result<(), ResolveError> {
        self.insert(ResolvedFunction::new(name, function).with_version(version))
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn insert(&mut self, function: ResolvedFunction) -> Result<(), ResolveError> {
        let path = FunctionPath::parse(function.name())?;
        if path.version().is_some() {
            return Err(ResolveError::InvalidPath {
                path: function.name().to_owned(),
            });
        }
        match self.functions.entry(function.name().to_owned()) {
            Entry::Occupied(_) => Err(ResolveError::AlreadyRegistered {
                name: function.name().to_owned(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(function);
                Ok(())
            }
        }
    }
}

impl Resolver for FunctionTable {
    fn resolve(&self, path: &FunctionPath) -> Result<ResolvedFunction, ResolveError> {
        let function = self
            .functions
            .get(path.name())
            .ok_or_else(|| ResolveError::NotFound {
                name: path.name().to_owned(),
            })?;

        if let Some(expected) = path.version()
            && function.version() != Some(expected)
        {
            return Err(ResolveError::VersionMismatch {
                name: path.name().to_owned(),
                expected: expected.to_owned(),
                declared: function.version().map(str::to_owned),
            });
        }
        Ok(function.clone())
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::function::view_function;

    fn noop() -> Arc<dyn ViewFunction> {
        view_function(|_scope, _args| Ok(Invocation::nothing()))
    }

    #[fixture]
    fn table() -> FunctionTable {
        let mut table = FunctionTable::new();
        table.register("views.plain", noop()).expect("register plain");
        table
            .register_versioned("views.versioned", "2", noop())
            .expect("register versioned");
        table
    }

    #[rstest]
    #[case::two_segments("a.b", "a.b", None)]
    #[case::deep("pkg.mod.func", "pkg.mod.func", None)]
    #[case::versioned("a.b|3", "a.b", Some("3"))]
    fn parses_valid_paths(
        #[case] raw: &str,
        #[case] name: &str,
        #[case] version: Option<&str>,
    ) {
        let path = FunctionPath::parse(raw).expect("valid path");
        assert_eq!(path.name(), name);
        assert_eq!(path.version(), version);
        assert_eq!(path.to_string(), raw);
    }

    #[rstest]
    #[case::single("sum")]
    #[case::empty("")]
    #[case::leading_dot(".a")]
    #[case::double_dot("a..b")]
    #[case::trailing_dot("a.b.")]
    #[case::empty_version("a.b|")]
    fn rejects_invalid_paths(#[case] raw: &str) {
        let error = FunctionPath::parse(raw).expect_err("invalid path");
        assert_eq!(error.phase(), "compile_func_name");
    }

    #[rstest]
    fn resolves_registered_names(table: FunctionTable) {
        let path = FunctionPath::parse("views.plain").expect("path");
        let function = table.resolve(&path).expect("resolve");
        assert_eq!(function.name(), "views.plain");
        assert_eq!(function.version(), None);
    }

    #[rstest]
    fn unknown_name_is_not_found(table: FunctionTable) {
        let path = FunctionPath::parse("views.missing").expect("path");
        let error = table.resolve(&path).expect_err("missing");
        assert!(matches!(error, ResolveError::NotFound { .. }));
        assert_eq!(error.phase(), "compile_load");
    }

    #[rstest]
    #[case::matching("views.versioned|2", true)]
    #[case::unversioned_request("views.versioned", true)]
    #[case::different("views.versioned|3", false)]
    #[case::undeclared("views.plain|1", false)]
    fn version_checks(table: FunctionTable, #[case] raw: &str, #[case] accepted: bool) {
        let path = FunctionPath::parse(raw).expect("path");
        let result = table.resolve(&path);
        if accepted {
            result.expect("version accepted");
        } else {
            let error = result.expect_err("version rejected");
            assert_eq!(error.phase(), "compile_version");
        }
    }

    #[rstest]
    fn duplicate_registration_is_rejected(mut table: FunctionTable) {
        let error = table
            .register("views.plain", noop())
            .expect_err("duplicate");
        assert!(matches!(error, ResolveError::AlreadyRegistered { .. }));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn registered_names_must_be_plain_paths() {
        let mut table = FunctionTable::new();
        assert!(table.register("single", noop()).is_err());
        assert!(table.register("a.b|1", noop()).is_err());
        assert!(table.is_empty());
    }

    #[rstest]
    fn resolution_shares_the_registered_function(table: FunctionTable) {
        let path = FunctionPath::parse("views.plain").expect("path");
        let first = table.resolve(&path).expect("first");
        let second = table.resolve(&path).expect("second");
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn builtins_are_registered() {
        let table = FunctionTable::with_builtins();
        for name in ["builtin.sum", "builtin.count", "builtin.stats"] {
            let path = FunctionPath::parse(name).expect("path");
            table.resolve(&path).expect("builtin resolves");
        }
    }
}
