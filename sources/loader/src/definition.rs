use std::{fmt, sync::Arc};

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use parse::{
    attributes::SourceFileAttribute,
    classfile::{ClassFile, MetaData},
    parser::Parser,
};
use support::names::ClassName;

/// Stable index of a loader within its hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderId(pub(crate) usize);

impl LoaderId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A resolved class. Immutable once created, shared by every caller that resolves
/// the same name through the same defining loader.
pub struct Definition {
    name: ClassName,
    origin: LoaderId,
    payload: Bytes,
    class_file: ClassFile,

    super_class: Option<ClassName>,
    interfaces: Vec<ClassName>,
    source_file: Option<String>,
}

impl Definition {
    /// Parse `payload` as the definition of `name`, stamped with the loader that defines it.
    pub(crate) fn parse(name: &ClassName, origin: LoaderId, payload: Bytes) -> Result<Self> {
        let class_file = Parser::new(payload.clone()).parse()?;

        let declared = class_file.this_class_name()?;
        if declared != name.internal() {
            return Err(anyhow!("classfile declares {} (wrong name)", declared));
        }

        let super_class = class_file
            .super_class_name()?
            .map(ClassName::parse)
            .transpose()
            .context("invalid super class")?;

        let interfaces = class_file
            .interface_names()?
            .into_iter()
            .map(ClassName::parse)
            .collect::<Result<Vec<_>>>()
            .context("invalid interface")?;

        let source_file = class_file
            .attributes
            .known_attribute::<SourceFileAttribute>(&class_file.constant_pool)
            .and_then(|attr| attr.file_name(&class_file.constant_pool))
            .ok();

        Ok(Self {
            name: name.clone(),
            origin,
            payload,
            class_file,
            super_class,
            interfaces,
            source_file,
        })
    }

    pub fn name(&self) -> &ClassName {
        &self.name
    }

    /// The loader that defined this class.
    pub fn origin(&self) -> LoaderId {
        self.origin
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn class_file(&self) -> &ClassFile {
        &self.class_file
    }

    pub fn version(&self) -> MetaData {
        self.class_file.meta_data
    }

    pub fn super_class(&self) -> Option<&ClassName> {
        self.super_class.as_ref()
    }

    pub fn interfaces(&self) -> &[ClassName] {
        &self.interfaces
    }

    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    /// Identity comparison. Two handles are the same definition only if they
    /// point at the same allocation.
    pub fn same(lhs: &Arc<Definition>, rhs: &Arc<Definition>) -> bool {
        Arc::ptr_eq(lhs, rhs)
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("payload", &&"<bytes>")
            .field("super_class", &self.super_class)
            .finish()
    }
}
