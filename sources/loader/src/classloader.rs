use std::sync::Arc;

use bytes::Bytes;
use support::names::ClassName;
use tracing::debug;

use crate::{
    cache::DefinitionCache,
    definition::{Definition, LoaderId},
    error::LoadError,
    source::DefinitionSource,
};

/// One node of a hierarchy: a source, the definitions it produced, and a link to
/// its parent. Delegation is driven by [`crate::LoaderHierarchy`], which owns the
/// parent.
pub struct Loader {
    id: LoaderId,
    name: String,
    parent: Option<LoaderId>,
    source: Box<dyn DefinitionSource>,
    cache: DefinitionCache,
}

impl Loader {
    pub(crate) fn new(
        id: LoaderId,
        name: String,
        parent: Option<LoaderId>,
        source: Box<dyn DefinitionSource>,
    ) -> Self {
        Self {
            id,
            name,
            parent,
            source,
            cache: DefinitionCache::new(),
        }
    }

    pub fn id(&self) -> LoaderId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<LoaderId> {
        self.parent
    }

    pub fn source(&self) -> &dyn DefinitionSource {
        self.source.as_ref()
    }

    pub fn cache(&self) -> &DefinitionCache {
        &self.cache
    }

    pub fn find_loaded(&self, name: &ClassName) -> Option<Arc<Definition>> {
        self.cache.get(name)
    }

    /// Locate and define `name` from this loader's own source, without delegating.
    ///
    /// At most one caller per name runs the lookup at a time; the rest wait and then
    /// pick up what it stored.
    pub(crate) fn load_local(&self, name: &ClassName) -> Result<Arc<Definition>, LoadError> {
        let _guard = self.cache.lock_name(name);

        if let Some(existing) = self.cache.get(name) {
            debug!("{}: {} was defined while waiting", self.name, name);
            return Ok(existing);
        }

        let bytes = self
            .source
            .locate(name)?
            .ok_or_else(|| LoadError::not_found(name.binary()))?;

        self.define(name, bytes)
    }

    /// Parse `bytes` as `name` and store it here, unless `name` is already defined
    /// at this loader, in which case the existing definition is returned.
    pub fn define(&self, name: &ClassName, bytes: Bytes) -> Result<Arc<Definition>, LoadError> {
        let definition = Definition::parse(name, self.id, bytes).map_err(|e| {
            LoadError::MalformedDefinition {
                name: name.internal().to_string(),
                reason: format!("{:#}", e),
            }
        })?;

        let stored = self.cache.put_if_absent(name, definition);
        debug!("{}: defined {}", self.name, name);

        Ok(stored)
    }
}
