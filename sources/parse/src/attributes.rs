use crate::{
    classfile::{Addressed, Resolvable},
    pool::{ConstantPool, ConstantUtf8},
};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use support::bytes_ext::SafeBuf;

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: Addressed<ConstantUtf8>,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct Attributes {
    pub values: Vec<Attribute>,
}

impl Attributes {
    pub fn known_attribute<T>(&self, constant_pool: &ConstantPool) -> Result<T>
    where
        T: KnownAttribute,
    {
        for attr in self.values.iter() {
            let name = attr.name.try_resolve(constant_pool)?.try_string()?;

            if T::id() == name {
                return T::decode(attr.data.clone(), constant_pool);
            }
        }

        Err(anyhow!("could not locate known attribute {}", T::id()))
    }

    pub fn parse(bytes: &mut Bytes, constant_pool: &ConstantPool) -> Result<Self> {
        let length = bytes.try_get_u16()?;
        let mut attributes = Attributes {
            values: Vec::with_capacity(length.into()),
        };

        for _ in 0..length {
            let name: Addressed<ConstantUtf8> = constant_pool.address(bytes.try_get_u16()?);
            // Format checking: attribute names must be Utf8 constants
            name.try_resolve(constant_pool)?;

            let attr_length = bytes.try_get_u32()?;
            let data = bytes.try_take(attr_length as usize)?;

            attributes.values.push(Attribute { name, data });
        }

        Ok(attributes)
    }
}

pub trait KnownAttribute
where
    Self: Sized,
{
    fn decode(bytes: Bytes, constant_pool: &ConstantPool) -> Result<Self>;
    fn id() -> &'static str;
}

#[derive(Debug, Clone)]
pub struct SourceFileAttribute {
    pub file_name: Addressed<ConstantUtf8>,
}

impl SourceFileAttribute {
    pub fn file_name(&self, constant_pool: &ConstantPool) -> Result<String> {
        self.file_name.try_resolve(constant_pool)?.try_string()
    }
}

impl KnownAttribute for SourceFileAttribute {
    fn decode(mut bytes: Bytes, constant_pool: &ConstantPool) -> Result<Self> {
        Ok(SourceFileAttribute {
            file_name: constant_pool.address(bytes.try_get_u16()?),
        })
    }

    fn id() -> &'static str {
        "SourceFile"
    }
}
