pub mod attributes;
pub mod builder;
pub mod classfile;
pub mod constants;
pub mod flags;
pub mod parser;
pub mod pool;
pub mod result;

extern crate anyhow;
extern crate bytes;
extern crate enum_as_inner;
extern crate support;
