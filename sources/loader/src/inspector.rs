use std::fmt;

use support::names::ClassName;

use crate::{
    definition::LoaderId,
    hierarchy::LoaderHierarchy,
    source::SourceDescriptor,
};

/// Read-only view over a hierarchy. Nothing here resolves or caches.
pub struct Inspector<'a> {
    hierarchy: &'a LoaderHierarchy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderDescriptor {
    pub id: LoaderId,
    pub name: String,
    /// From the described loader up to and including the root.
    pub parent_chain: Vec<LoaderId>,
    pub chain_names: Vec<String>,
    pub source_id: String,
    pub source: SourceDescriptor,
    /// Number of definitions this loader created.
    pub defined: usize,
}

impl fmt::Display for LoaderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain = self
            .parent_chain
            .iter()
            .zip(self.chain_names.iter())
            .map(|(id, name)| format!("{} ({})", name, id))
            .collect::<Vec<_>>()
            .join(" -> ");

        write!(f, "{} [{} defined] {}", self.name, self.defined, chain)
    }
}

impl<'a> Inspector<'a> {
    pub fn new(hierarchy: &'a LoaderHierarchy) -> Self {
        Self { hierarchy }
    }

    pub fn describe(&self, loader: LoaderId) -> Option<LoaderDescriptor> {
        let target = self.hierarchy.loader(loader)?;
        let parent_chain = self.parent_chain(loader);

        let chain_names = self
            .chain_names(loader)
            .into_iter()
            .map(str::to_string)
            .collect();

        Some(LoaderDescriptor {
            id: target.id(),
            name: target.name().to_string(),
            parent_chain,
            chain_names,
            source_id: target.source().id().to_string(),
            source: target.source().describe(),
            defined: target.cache().len(),
        })
    }

    pub fn describe_all(&self) -> Vec<LoaderDescriptor> {
        self.hierarchy
            .loaders()
            .iter()
            .filter_map(|l| self.describe(l.id()))
            .collect()
    }

    /// `loader` followed by each ancestor, ending at the root.
    pub fn parent_chain(&self, loader: LoaderId) -> Vec<LoaderId> {
        let mut chain = vec![];
        let mut current = self.hierarchy.loader(loader);

        while let Some(l) = current {
            chain.push(l.id());
            current = l.parent().and_then(|p| self.hierarchy.loader(p));
        }

        chain
    }

    pub fn chain_names(&self, loader: LoaderId) -> Vec<&'a str> {
        self.parent_chain(loader)
            .into_iter()
            .filter_map(|id| self.loader_name(id))
            .collect()
    }

    /// Which loader in the chain of `loader` has already defined `name`, if any.
    pub fn defining_loader(&self, loader: LoaderId, name: &str) -> Option<LoaderId> {
        let name = ClassName::parse(name).ok()?;

        // Delegation means an ancestor's definition shadows ours, so look from the root down
        self.parent_chain(loader).into_iter().rev().find(|id| {
            self.hierarchy
                .loader(*id)
                .map_or(false, |l| l.cache().contains(&name))
        })
    }

    pub fn is_cached(&self, loader: LoaderId, name: &str) -> bool {
        let Ok(name) = ClassName::parse(name) else {
            return false;
        };

        self.hierarchy
            .loader(loader)
            .map_or(false, |l| l.cache().contains(&name))
    }

    pub fn loader_name(&self, loader: LoaderId) -> Option<&'a str> {
        self.hierarchy.loader(loader).map(|l| l.name())
    }
}
