use std::fmt;

use anyhow::{anyhow, Result};

/// A class name in internal form (`java/lang/Object`).
///
/// Names may be given in binary form (`java.lang.Object`) and are normalised on parse.
/// Array and descriptor syntax is rejected, those names never map to a single classfile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassName(String);

impl ClassName {
    pub fn parse(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref();

        if name.is_empty() {
            return Err(anyhow!("class name is empty"));
        }

        if let Some(bad) = name.chars().find(|c| matches!(c, '[' | ';' | '\\' | '\0')) {
            return Err(anyhow!("class name {:?} contains illegal character {:?}", name, bad));
        }

        let internal = name.replace('.', "/");
        if internal.split('/').any(|segment| segment.is_empty()) {
            return Err(anyhow!("class name {:?} has an empty segment", name));
        }

        Ok(Self(internal))
    }

    /// `java/lang/Object`
    pub fn internal(&self) -> &str {
        &self.0
    }

    /// `java.lang.Object`
    pub fn binary(&self) -> String {
        self.0.replace('/', ".")
    }

    /// The path of the classfile relative to a class path root.
    pub fn file_name(&self) -> String {
        format!("{}.class", self.0)
    }

    pub fn package(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(package, _)| package)
    }

    pub fn simple_name(&self) -> &str {
        self.0.rsplit_once('/').map_or(&self.0, |(_, simple)| simple)
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ClassName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
