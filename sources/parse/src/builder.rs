use anyhow::{anyhow, Result};
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    constants::{DEFAULT_MAJOR, MAGIC},
    flags::ClassFileAccessFlags,
    pool::ConstantTag,
};

/// Writes minimal classfiles: a class header, its super class and interfaces, and an
/// optional `SourceFile` attribute. No fields or methods are emitted.
///
/// Used to synthesise built-in definitions that have no backing file.
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    name: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    source_file: Option<String>,
    flags: ClassFileAccessFlags,
    major_version: u16,
}

#[derive(Default)]
struct PoolWriter {
    count: u16,
    bytes: BytesMut,
}

impl PoolWriter {
    fn utf8(&mut self, value: &str) -> Result<u16> {
        let len = u16::try_from(value.len())
            .map_err(|_| anyhow!("constant of {} bytes does not fit a classfile", value.len()))?;

        self.bytes.put_u8(ConstantTag::Utf8.tag());
        self.bytes.put_u16(len);
        self.bytes.put_slice(value.as_bytes());
        self.next()
    }

    fn class(&mut self, name: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        self.bytes.put_u8(ConstantTag::Class.tag());
        self.bytes.put_u16(name);
        self.next()
    }

    fn next(&mut self) -> Result<u16> {
        // The pool count is written as count + 1
        if self.count >= u16::MAX - 1 {
            return Err(anyhow!("constant pool is full"));
        }

        self.count += 1;
        Ok(self.count)
    }
}

impl ClassFileBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_class: None,
            interfaces: vec![],
            source_file: None,
            flags: ClassFileAccessFlags::ACC_PUBLIC | ClassFileAccessFlags::ACC_SUPER,
            major_version: DEFAULT_MAJOR,
        }
    }

    pub fn super_class(mut self, name: impl Into<String>) -> Self {
        self.super_class = Some(name.into());
        self
    }

    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn source_file(mut self, name: impl Into<String>) -> Self {
        self.source_file = Some(name.into());
        self
    }

    pub fn flags(mut self, flags: ClassFileAccessFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn major_version(mut self, major: u16) -> Self {
        self.major_version = major;
        self
    }

    /// Fails if a name does not fit the format's 16 bit lengths and counts.
    pub fn build(&self) -> Result<Bytes> {
        let mut pool = PoolWriter::default();

        let this_class = pool.class(&self.name)?;
        let super_class = match self.super_class.as_deref() {
            Some(name) => pool.class(name)?,
            None => 0,
        };

        let interfaces = self
            .interfaces
            .iter()
            .map(|i| pool.class(i))
            .collect::<Result<Vec<u16>>>()?;
        let interface_count = u16::try_from(interfaces.len())
            .map_err(|_| anyhow!("{} interfaces do not fit a classfile", interfaces.len()))?;

        let source_file = match self.source_file.as_deref() {
            Some(file) => Some((pool.utf8("SourceFile")?, pool.utf8(file)?)),
            None => None,
        };

        let mut out = BytesMut::new();
        out.put_u32(MAGIC);
        out.put_u16(0);
        out.put_u16(self.major_version);

        out.put_u16(pool.count + 1);
        out.put_slice(&pool.bytes);

        out.put_u16(self.flags.bits());
        out.put_u16(this_class);
        out.put_u16(super_class);

        out.put_u16(interface_count);
        for interface in interfaces {
            out.put_u16(interface);
        }

        // fields, methods
        out.put_u16(0);
        out.put_u16(0);

        match source_file {
            Some((attribute_name, file_name)) => {
                out.put_u16(1);
                out.put_u16(attribute_name);
                out.put_u32(2);
                out.put_u16(file_name);
            }
            None => out.put_u16(0),
        }

        Ok(out.freeze())
    }
}
