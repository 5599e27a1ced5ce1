use anyhow::{anyhow, Result};
use enum_as_inner::EnumAsInner;

use crate::classfile::{Addressed, Resolvable};

/// The constant pool of a single classfile.
///
/// Entries are stored in file order. 64 bit constants occupy two slots, the second
/// of which is [`ConstantEntry::Reserved`], so classfile indices map directly onto
/// `entries[index - 1]`.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<ConstantEntry>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ConstantEntry) {
        self.entries.push(entry)
    }

    pub fn get(&self, index: u16) -> Option<&ConstantEntry> {
        if index == 0 {
            return None;
        }

        self.entries.get((index - 1) as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn address<T>(&self, for_index: u16) -> Addressed<T> {
        Addressed::from(for_index)
    }

    pub(crate) fn perform_format_checking(&self) -> Result<()> {
        for item in self.entries.iter() {
            match item {
                ConstantEntry::Class(data) => {
                    data.name.try_resolve(self)?;
                }
                ConstantEntry::Field(data) => {
                    data.class.try_resolve(self)?;
                    data.name_and_type.try_resolve(self)?;
                }
                ConstantEntry::Method(data) => {
                    data.class.try_resolve(self)?;
                    data.name_and_type.try_resolve(self)?;
                }
                ConstantEntry::InterfaceMethod(data) => {
                    data.class.try_resolve(self)?;
                    data.name_and_type.try_resolve(self)?;
                }
                ConstantEntry::String(data) => {
                    data.string.try_resolve(self)?;
                }
                ConstantEntry::NameAndType(data) => {
                    data.name.try_resolve(self)?;
                    data.descriptor.try_resolve(self)?;
                }
                ConstantEntry::Utf8(data) => {
                    data.try_string()?;
                }
                ConstantEntry::MethodHandle(data) => {
                    if !(1..=9).contains(&data.kind) {
                        return Err(anyhow!("method handle has invalid kind {}", data.kind));
                    }
                }
                ConstantEntry::MethodType(data) => {
                    data.descriptor.try_resolve(self)?;
                }
                ConstantEntry::Dynamic(data) => {
                    data.name_and_type.try_resolve(self)?;
                }
                ConstantEntry::InvokeDynamic(data) => {
                    data.name_and_type.try_resolve(self)?;
                }
                ConstantEntry::Module(data) => {
                    data.name.try_resolve(self)?;
                }
                ConstantEntry::Package(data) => {
                    data.name.try_resolve(self)?;
                }
                ConstantEntry::Integer(_)
                | ConstantEntry::Float(_)
                | ConstantEntry::Long(_)
                | ConstantEntry::Double(_)
                | ConstantEntry::Reserved => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantTag {
    Class,
    Field,
    Method,
    InterfaceMethod,
    String,
    Integer,
    Float,
    Long,
    Double,
    NameAndType,
    Utf8,
    MethodHandle,
    MethodType,
    Dynamic,
    InvokeDynamic,
    Module,
    Package,
}

impl ConstantTag {
    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            1 => ConstantTag::Utf8,
            3 => ConstantTag::Integer,
            4 => ConstantTag::Float,
            5 => ConstantTag::Long,
            6 => ConstantTag::Double,
            7 => ConstantTag::Class,
            8 => ConstantTag::String,
            9 => ConstantTag::Field,
            10 => ConstantTag::Method,
            11 => ConstantTag::InterfaceMethod,
            12 => ConstantTag::NameAndType,
            15 => ConstantTag::MethodHandle,
            16 => ConstantTag::MethodType,
            17 => ConstantTag::Dynamic,
            18 => ConstantTag::InvokeDynamic,
            19 => ConstantTag::Module,
            20 => ConstantTag::Package,
            _ => return Err(anyhow!("{} is an unknown constant tag", tag)),
        })
    }

    pub fn tag(&self) -> u8 {
        match self {
            ConstantTag::Utf8 => 1,
            ConstantTag::Integer => 3,
            ConstantTag::Float => 4,
            ConstantTag::Long => 5,
            ConstantTag::Double => 6,
            ConstantTag::Class => 7,
            ConstantTag::String => 8,
            ConstantTag::Field => 9,
            ConstantTag::Method => 10,
            ConstantTag::InterfaceMethod => 11,
            ConstantTag::NameAndType => 12,
            ConstantTag::MethodHandle => 15,
            ConstantTag::MethodType => 16,
            ConstantTag::Dynamic => 17,
            ConstantTag::InvokeDynamic => 18,
            ConstantTag::Module => 19,
            ConstantTag::Package => 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstantClass {
    pub name: Addressed<ConstantUtf8>,
}

#[derive(Debug, Clone)]
pub struct ConstantField {
    pub class: Addressed<ConstantClass>,
    pub name_and_type: Addressed<ConstantNameAndType>,
}

#[derive(Debug, Clone)]
pub struct ConstantMethod {
    pub class: Addressed<ConstantClass>,
    pub name_and_type: Addressed<ConstantNameAndType>,
}

#[derive(Debug, Clone)]
pub struct ConstantInterfaceMethod {
    pub class: Addressed<ConstantClass>,
    pub name_and_type: Addressed<ConstantNameAndType>,
}

#[derive(Debug, Clone)]
pub struct ConstantString {
    pub string: Addressed<ConstantUtf8>,
}

#[derive(Debug, Clone)]
pub struct ConstantInteger {
    pub bytes: u32,
}

#[derive(Debug, Clone)]
pub struct ConstantFloat {
    pub bytes: f32,
}

#[derive(Debug, Clone)]
pub struct ConstantLong {
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ConstantDouble {
    pub bytes: f64,
}

#[derive(Debug, Clone)]
pub struct ConstantNameAndType {
    pub name: Addressed<ConstantUtf8>,
    pub descriptor: Addressed<ConstantUtf8>,
}

#[derive(Debug, Clone)]
pub struct ConstantUtf8 {
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ConstantMethodHandle {
    pub kind: u8,
    pub index: u16,
}

#[derive(Debug, Clone)]
pub struct ConstantMethodType {
    pub descriptor: Addressed<ConstantUtf8>,
}

#[derive(Debug, Clone)]
pub struct ConstantDynamic {
    pub method_index: u16,
    pub name_and_type: Addressed<ConstantNameAndType>,
}

#[derive(Debug, Clone)]
pub struct ConstantInvokeDynamic {
    pub method_index: u16,
    pub name_and_type: Addressed<ConstantNameAndType>,
}

#[derive(Debug, Clone)]
pub struct ConstantModule {
    pub name: Addressed<ConstantUtf8>,
}

#[derive(Debug, Clone)]
pub struct ConstantPackage {
    pub name: Addressed<ConstantUtf8>,
}

// Modified UTF-8 only differs from UTF-8 for NUL and supplementary characters,
// neither of which appear in the names we care about.
impl ConstantUtf8 {
    pub fn try_string(&self) -> Result<String> {
        Ok(String::from_utf8(self.bytes.clone())?)
    }
}

impl ConstantClass {
    pub fn name(&self, pool: &ConstantPool) -> Result<String> {
        self.name.try_resolve(pool)?.try_string()
    }
}

#[derive(EnumAsInner, Clone, Debug)]
pub enum ConstantEntry {
    Class(ConstantClass),
    Field(ConstantField),
    Method(ConstantMethod),
    InterfaceMethod(ConstantInterfaceMethod),
    String(ConstantString),
    Integer(ConstantInteger),
    Float(ConstantFloat),
    Long(ConstantLong),
    Double(ConstantDouble),
    NameAndType(ConstantNameAndType),
    Utf8(ConstantUtf8),
    MethodHandle(ConstantMethodHandle),
    MethodType(ConstantMethodType),
    Dynamic(ConstantDynamic),
    InvokeDynamic(ConstantInvokeDynamic),
    Module(ConstantModule),
    Package(ConstantPackage),
    Reserved,
}
