//! Design documents and their resolution caches.
//!
//! A design document is stored as received. Function paths inside it are only
//! resolved when first used and the result is cached under the full segment
//! list, so repeated calls reuse the same function until the document is
//! replaced.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::errors::ServerError;
use crate::function::FunctionKind;
use crate::resolver::{FunctionPath, ResolvedFunction, Resolver};

/// Tracing target for design document lookups.
pub(crate) const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

#[derive(Debug)]
struct Ddoc {
    doc: Value,
    cache: HashMap<Vec<String>, ResolvedFunction>,
}

/// Design documents known to the session, by id.
#[derive(Debug, Default)]
pub struct DdocRegistry {
    ddocs: HashMap<String, Ddoc>,
}

impl DdocRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `doc` under `id`, discarding any previous document and cache.
    pub fn add(&mut self, id: String, doc: Value) {
        debug!(target: REGISTRY_TARGET, %id, "design document added");
        self.ddocs.insert(
            id,
            Ddoc {
                doc,
                cache: HashMap::new(),
            },
        );
    }

    /// Whether a document is stored under `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ddocs.contains_key(id)
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ddocs.len()
    }

    /// Whether no documents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ddocs.is_empty()
    }

    /// Finds the function at `path` inside document `id`.
    ///
    /// The first segment names the section and fixes the function kind.
    /// Resolution happens once per path; later lookups return the cached
    /// function.
    ///
    /// # Errors
    ///
    /// Fails when the document is unknown, the section holds no callable
    /// kind, no function path string sits at `path`, or resolution fails.
    pub fn lookup<R: Resolver + ?Sized>(
        &mut self,
        id: &str,
        path: &[String],
        resolver: &R,
    ) -> Result<(FunctionKind, ResolvedFunction), ServerError> {
        let ddoc = self
            .ddocs
            .get_mut(id)
            .ok_or_else(|| ServerError::unknown_ddoc(id))?;

        let section = path.first().map_or("", String::as_str);
        let kind =
            FunctionKind::from_section(section).ok_or_else(|| ServerError::unknown_kind(section))?;

        if let Some(function) = ddoc.cache.get(path) {
            debug!(target: REGISTRY_TARGET, %id, function = function.name(), "cache hit");
            return Ok((kind, function.clone()));
        }

        let raw = walk(&ddoc.doc, path)
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::missing_function(id, path))?;
        let parsed = FunctionPath::parse(raw).map_err(|error| ServerError::resolve(raw, error))?;
        let function = resolver
            .resolve(&parsed)
            .map_err(|error| ServerError::resolve(raw, error))?;

        debug!(target: REGISTRY_TARGET, %id, function = function.name(), "resolved");
        ddoc.cache.insert(path.to_vec(), function.clone());
        Ok((kind, function))
    }
}

fn walk<'doc>(doc: &'doc Value, path: &[String]) -> Option<&'doc Value> {
    path.iter()
        .try_fold(doc, |node, segment| node.as_object()?.get(segment))
}
