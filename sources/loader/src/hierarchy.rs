use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use support::names::ClassName;
use tracing::{debug, info};

use crate::{
    classloader::Loader,
    config::HierarchyConfig,
    definition::{Definition, LoaderId},
    error::{HierarchyError, LoadError},
    internal,
    source::{BuiltinSource, DefinitionSource, PathListSource, TimeoutSource},
};

pub const BOOTSTRAP: &str = "bootstrap";
pub const PLATFORM: &str = "platform";
pub const APPLICATION: &str = "app";

/// A fixed tree of loaders, root first.
///
/// Loaders refer to their parents by index into this table. The table and the
/// links never change after construction; only the loaders' caches grow.
pub struct LoaderHierarchy {
    loaders: Vec<Loader>,
    entry: LoaderId,
}

impl LoaderHierarchy {
    /// Build the standard chain: bootstrap (built-in table) <- platform <- app.
    pub fn new(config: &HierarchyConfig) -> Result<Self, HierarchyError> {
        let entries = config
            .bootstrap_entries
            .iter()
            .map(|(name, bytes)| {
                ClassName::parse(name)
                    .map(|parsed| (parsed, bytes.clone()))
                    .map_err(|e| HierarchyError::InvalidEntry {
                        name: name.clone(),
                        reason: format!("{:#}", e),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let path_source = |id: &str, roots: &[std::path::PathBuf]| -> Box<dyn DefinitionSource> {
            let source = PathListSource::new(id, roots.to_vec());
            match config.locate_timeout {
                Some(timeout) => Box::new(TimeoutSource::new(source, timeout)),
                None => Box::new(source),
            }
        };

        HierarchyBuilder::new()
            .declare(BOOTSTRAP, None, Box::new(BuiltinSource::new("bootstrap-table", entries)))
            .declare(
                PLATFORM,
                Some(BOOTSTRAP),
                path_source("platform-path", &config.platform_path),
            )
            .declare(
                APPLICATION,
                Some(PLATFORM),
                path_source("app-path", &config.application_path),
            )
            .entry(APPLICATION)
            .build()
    }

    pub fn builder() -> HierarchyBuilder {
        HierarchyBuilder::new()
    }

    /// Resolve through the entry loader (the application loader for the standard chain).
    pub fn resolve_from_application(&self, name: &str) -> Result<Arc<Definition>, LoadError> {
        self.resolve_from(self.entry, name)
    }

    pub fn resolve_from(&self, loader: LoaderId, name: &str) -> Result<Arc<Definition>, LoadError> {
        let name = ClassName::parse(name).map_err(|e| {
            debug!("Rejecting {:?}: {:#}", name, e);
            LoadError::not_found(name)
        })?;

        self.resolve_name(loader, &name)
    }

    pub fn resolve_name(
        &self,
        loader: LoaderId,
        name: &ClassName,
    ) -> Result<Arc<Definition>, LoadError> {
        let loader = self
            .loader(loader)
            .ok_or_else(|| internal!("loader {} does not belong to this hierarchy", loader))?;

        self.resolve_at(loader, name)
    }

    fn resolve_at(&self, loader: &Loader, name: &ClassName) -> Result<Arc<Definition>, LoadError> {
        if let Some(found) = loader.find_loaded(name) {
            debug!("Fast path: {} ({})", name, loader.name());
            return Ok(found);
        }

        if let Some(parent) = loader.parent().and_then(|id| self.loader(id)) {
            match self.resolve_at(parent, name) {
                Ok(found) => return Ok(found),
                Err(LoadError::ClassNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        debug!("Slow path: {} ({})", name, loader.name());
        loader.load_local(name)
    }

    pub fn bootstrap(&self) -> LoaderId {
        LoaderId(0)
    }

    pub fn platform(&self) -> Option<LoaderId> {
        self.find(PLATFORM)
    }

    pub fn application(&self) -> LoaderId {
        self.entry
    }

    pub fn find(&self, name: &str) -> Option<LoaderId> {
        self.loaders.iter().find(|l| l.name() == name).map(|l| l.id())
    }

    pub fn loader(&self, id: LoaderId) -> Option<&Loader> {
        self.loaders.get(id.0)
    }

    /// All loaders, root first. Every loader appears after its parent.
    pub fn loaders(&self) -> &[Loader] {
        &self.loaders
    }
}

struct Declaration {
    name: String,
    parent: Option<String>,
    source: Box<dyn DefinitionSource>,
}

/// Declares loaders by name and checks the resulting topology before anything
/// can resolve through it.
#[derive(Default)]
pub struct HierarchyBuilder {
    declarations: Vec<Declaration>,
    entry: Option<String>,
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(self, name: &str, source: impl DefinitionSource + 'static) -> Self {
        self.declare(name, None, Box::new(source))
    }

    pub fn child(self, name: &str, parent: &str, source: impl DefinitionSource + 'static) -> Self {
        self.declare(name, Some(parent), Box::new(source))
    }

    pub fn declare(
        mut self,
        name: &str,
        parent: Option<&str>,
        source: Box<dyn DefinitionSource>,
    ) -> Self {
        self.declarations.push(Declaration {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            source,
        });
        self
    }

    /// The loader `resolve_from_application` goes through. Defaults to the last
    /// declared loader.
    pub fn entry(mut self, name: &str) -> Self {
        self.entry = Some(name.to_string());
        self
    }

    pub fn build(self) -> Result<LoaderHierarchy, HierarchyError> {
        if self.declarations.is_empty() {
            return Err(HierarchyError::Empty);
        }

        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, decl) in self.declarations.iter().enumerate() {
            if index.insert(decl.name.as_str(), i).is_some() {
                return Err(HierarchyError::DuplicateLoader(decl.name.clone()));
            }
        }

        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut roots = vec![];
        for (i, decl) in self.declarations.iter().enumerate() {
            match &decl.parent {
                Some(parent) => {
                    let parent = index.get(parent.as_str()).ok_or_else(|| {
                        HierarchyError::UnknownParent {
                            loader: decl.name.clone(),
                            parent: parent.clone(),
                        }
                    })?;
                    children.entry(*parent).or_default().push(i);
                }
                None => roots.push(i),
            }
        }

        let root = match roots.as_slice() {
            [] => return Err(HierarchyError::NoRoot),
            [root] => *root,
            _ => {
                return Err(HierarchyError::MultipleRoots(
                    roots.iter().map(|r| self.declarations[*r].name.clone()).collect(),
                ))
            }
        };

        // Every chain has to end at the root. Anything that revisits a loader first is a cycle.
        for decl in self.declarations.iter() {
            let mut seen = HashSet::new();
            let mut current = decl;

            while let Some(parent) = &current.parent {
                if !seen.insert(current.name.as_str()) {
                    return Err(HierarchyError::Cycle(decl.name.clone()));
                }

                current = &self.declarations[index[parent.as_str()]];
            }
        }

        let entry = match &self.entry {
            Some(entry) => *index
                .get(entry.as_str())
                .ok_or_else(|| HierarchyError::UnknownEntry(entry.clone()))?,
            None => self.declarations.len() - 1,
        };

        // Breadth first from the root, so parents always get lower ids than children
        let mut order = Vec::with_capacity(self.declarations.len());
        let mut queue = VecDeque::from([root]);
        while let Some(next) = queue.pop_front() {
            order.push(next);
            queue.extend(children.get(&next).into_iter().flatten().copied());
        }

        let ids: HashMap<usize, LoaderId> = order
            .iter()
            .enumerate()
            .map(|(id, decl)| (*decl, LoaderId(id)))
            .collect();

        let parents: Vec<Option<LoaderId>> = self
            .declarations
            .iter()
            .map(|decl| decl.parent.as_deref().map(|p| ids[&index[p]]))
            .collect();

        let mut slots: Vec<Option<Loader>> = order.iter().map(|_| None).collect();
        for (decl_index, decl) in self.declarations.into_iter().enumerate() {
            let id = ids[&decl_index];
            slots[id.0] = Some(Loader::new(id, decl.name, parents[decl_index], decl.source));
        }

        let loaders: Vec<Loader> = slots.into_iter().flatten().collect();

        info!(
            "Built hierarchy: {}",
            loaders.iter().map(|l| l.name()).collect::<Vec<_>>().join(" <- ")
        );

        Ok(LoaderHierarchy {
            loaders,
            entry: ids[&entry],
        })
    }
}
