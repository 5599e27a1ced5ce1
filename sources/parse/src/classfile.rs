use crate::{
    attributes::Attributes,
    flags::{ClassFileAccessFlags, FieldAccessFlags, MethodAccessFlags},
    pool::{
        ConstantClass, ConstantEntry, ConstantField, ConstantNameAndType, ConstantPool,
        ConstantUtf8,
    },
};
use anyhow::{anyhow, Result};
use std::{fmt, marker::PhantomData};

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub constant_pool: ConstantPool,
    pub meta_data: MetaData,

    pub access_flags: ClassFileAccessFlags,
    pub this_class: Addressed<ConstantClass>,
    pub super_class: Option<Addressed<ConstantClass>>,

    pub interfaces: Interfaces,
    pub fields: Fields,
    pub methods: Methods,
    pub attributes: Attributes,
}

impl ClassFile {
    pub fn this_class_name(&self) -> Result<String> {
        self.this_class.try_resolve(&self.constant_pool)?.name(&self.constant_pool)
    }

    pub fn super_class_name(&self) -> Result<Option<String>> {
        self.super_class
            .as_ref()
            .map(|cls| cls.try_resolve(&self.constant_pool)?.name(&self.constant_pool))
            .transpose()
    }

    pub fn interface_names(&self) -> Result<Vec<String>> {
        self.interfaces
            .values
            .iter()
            .map(|cls| cls.try_resolve(&self.constant_pool)?.name(&self.constant_pool))
            .collect()
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassFileAccessFlags::ACC_INTERFACE)
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub flags: FieldAccessFlags,
    pub name: Addressed<ConstantUtf8>,
    pub descriptor: Addressed<ConstantUtf8>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone)]
pub struct Fields {
    pub(crate) values: Vec<Field>,
}

impl Fields {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub flags: MethodAccessFlags,
    pub name: Addressed<ConstantUtf8>,
    pub descriptor: Addressed<ConstantUtf8>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone)]
pub struct Methods {
    pub(crate) values: Vec<Method>,
}

impl Methods {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Interfaces {
    pub(crate) values: Vec<Addressed<ConstantClass>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaData {
    pub minor_version: u16,
    pub major_version: u16,
}

/// A typed index into a [`ConstantPool`].
pub struct Addressed<T> {
    phantom: PhantomData<fn() -> T>,
    index: u16,
}

impl<T> Addressed<T> {
    pub fn from(index: u16) -> Self {
        Self {
            phantom: PhantomData,
            index,
        }
    }

    pub fn index(&self) -> u16 {
        self.index
    }
}

impl<T> Clone for Addressed<T> {
    fn clone(&self) -> Self {
        Self::from(self.index)
    }
}

impl<T> fmt::Debug for Addressed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Addressed {{ {} }}", self.index)
    }
}

pub trait Resolvable<T> {
    fn try_resolve(&self, pool: &ConstantPool) -> Result<T>;
}

macro_rules! address {
    ($type: ty, $enum: ident) => {
        impl Resolvable<$type> for Addressed<$type> {
            fn try_resolve(&self, pool: &ConstantPool) -> Result<$type> {
                let value = pool
                    .get(self.index)
                    .ok_or(anyhow!("no constant found @ {}", self.index))?;

                match value {
                    ConstantEntry::$enum(data) => Ok(data.clone()),
                    _ => Err(anyhow!(
                        "expected {} got {:?} @ {}",
                        stringify!($enum),
                        value,
                        self.index
                    )),
                }
            }
        }
    };
}

impl Resolvable<ConstantEntry> for Addressed<ConstantEntry> {
    fn try_resolve(&self, pool: &ConstantPool) -> Result<ConstantEntry> {
        pool.get(self.index)
            .cloned()
            .ok_or(anyhow!("no constant found @ {}", self.index))
    }
}

address!(ConstantClass, Class);
address!(ConstantField, Field);
address!(ConstantNameAndType, NameAndType);
address!(ConstantUtf8, Utf8);
