#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use loader::{
    source::{DefinitionSource, SourceDescriptor},
    LoadError,
};
use parse::builder::ClassFileBuilder;
use support::names::ClassName;
use tracing::Level;

const TMP_DIR: &str = env!("CARGO_TARGET_TMPDIR");

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A fresh, empty directory for one test to use as a class path root.
pub fn class_path(suite: &str, test: &str) -> PathBuf {
    let root = PathBuf::from(TMP_DIR).join(suite).join(test);
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(&root).expect("class path root to be created");
    root
}

pub fn write_class(root: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(format!("{}.class", name));
    fs::create_dir_all(path.parent().expect("class file to have a parent"))
        .expect("package directories to be created");
    fs::write(&path, bytes).expect("class file to be written");
    path
}

/// A classfile for `name`, tagged with `marker` so tests can tell copies apart.
pub fn class(name: &str, marker: &str) -> Bytes {
    ClassFileBuilder::new(name)
        .super_class("java/lang/Object")
        .source_file(marker)
        .build()
        .expect("class to be written")
}

/// Counts lookups that reach the wrapped source.
pub struct Counted<S> {
    pub inner: S,
    pub calls: Arc<AtomicUsize>,
}

impl<S> Counted<S> {
    pub fn new(inner: S) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl<S: DefinitionSource> DefinitionSource for Counted<S> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn locate(&self, name: &ClassName) -> Result<Option<Bytes>, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.locate(name)
    }

    fn describe(&self) -> SourceDescriptor {
        self.inner.describe()
    }
}
