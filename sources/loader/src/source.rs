use std::{
    collections::HashMap,
    fs, io,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use anyhow::anyhow;
use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use parking_lot::Mutex;
use support::names::ClassName;
use tracing::{debug, trace, warn};

use crate::{error::LoadError, internal, internalise};

/// Where raw definitions live.
///
/// `locate` is a read-only scan and is called concurrently without coordination.
pub trait DefinitionSource: Send + Sync {
    fn id(&self) -> &str;

    /// `Ok(None)` means the source was checked and does not contain `name`.
    fn locate(&self, name: &ClassName) -> Result<Option<Bytes>, LoadError>;

    fn describe(&self) -> SourceDescriptor;
}

/// What a source searches, for reporting.
#[derive(EnumAsInner, Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    PathList(Vec<PathBuf>),
    Builtin(Vec<ClassName>),
    Custom(String),
}

/// Searches an ordered list of directory roots. The first root holding
/// `<root>/<internal name>.class` wins.
pub struct PathListSource {
    id: String,
    roots: Vec<PathBuf>,
}

impl PathListSource {
    pub fn new(id: impl Into<String>, roots: Vec<PathBuf>) -> Self {
        let id = id.into();

        for root in roots.iter().filter(|r| r.exists() && !r.is_dir()) {
            warn!("{}: {} is not a directory and will never match", id, root.display());
        }

        Self { id, roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl DefinitionSource for PathListSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn locate(&self, name: &ClassName) -> Result<Option<Bytes>, LoadError> {
        let file_name = name.file_name();

        for root in self.roots.iter() {
            if !root.is_dir() {
                debug!("{}: skipping {}, not a directory", self.id, root.display());
                continue;
            }

            let path = root.join(&file_name);
            match fs::read(&path) {
                Ok(bytes) => {
                    debug!("{}: found {} at {}", self.id, name, path.display());
                    return Ok(Some(bytes.into()));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    trace!("{}: no {} under {}", self.id, name, root.display());
                }
                Err(e) => {
                    return Err(LoadError::SourceUnavailable {
                        source_id: self.id.clone(),
                        cause: anyhow!(e).context(format!("reading {}", path.display())),
                    })
                }
            }
        }

        Ok(None)
    }

    fn describe(&self) -> SourceDescriptor {
        SourceDescriptor::PathList(self.roots().to_vec())
    }
}

/// A fixed in-memory table, used for classes the runtime provides itself.
pub struct BuiltinSource {
    id: String,
    entries: HashMap<ClassName, Bytes>,
}

impl BuiltinSource {
    pub fn new(id: impl Into<String>, entries: impl IntoIterator<Item = (ClassName, Bytes)>) -> Self {
        Self {
            id: id.into(),
            entries: entries.into_iter().collect(),
        }
    }

    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, [])
    }
}

impl DefinitionSource for BuiltinSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn locate(&self, name: &ClassName) -> Result<Option<Bytes>, LoadError> {
        Ok(self.entries.get(name).cloned())
    }

    fn describe(&self) -> SourceDescriptor {
        let mut names: Vec<ClassName> = self.entries.keys().cloned().collect();
        names.sort();
        SourceDescriptor::Builtin(names)
    }
}

/// Bounds how long `locate` may take on the wrapped source.
///
/// Each lookup runs on a worker thread. A lookup that overruns is reported as
/// [`LoadError::SourceUnavailable`]; the worker is left to finish on its own and
/// its answer is discarded. While `max_stalled` of those abandoned workers are
/// still running, further lookups fail straight away instead of starting more.
pub struct TimeoutSource<S> {
    inner: Arc<S>,
    timeout: Duration,
    stalled: Arc<AtomicUsize>,
    max_stalled: usize,
}

#[derive(Default)]
struct Lookup {
    finished: bool,
    abandoned: bool,
}

impl<S: DefinitionSource + 'static> TimeoutSource<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
            stalled: Arc::new(AtomicUsize::new(0)),
            max_stalled: 1,
        }
    }

    pub fn with_max_stalled(mut self, max_stalled: usize) -> Self {
        self.max_stalled = max_stalled.max(1);
        self
    }

    /// Workers that timed out and have not returned yet.
    pub fn stalled_workers(&self) -> usize {
        self.stalled.load(Ordering::SeqCst)
    }

    fn unavailable(&self, cause: anyhow::Error) -> LoadError {
        LoadError::SourceUnavailable {
            source_id: self.id().to_string(),
            cause,
        }
    }
}

impl<S: DefinitionSource + 'static> DefinitionSource for TimeoutSource<S> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn locate(&self, name: &ClassName) -> Result<Option<Bytes>, LoadError> {
        let stalled = self.stalled_workers();
        if stalled >= self.max_stalled {
            warn!("{}: not locating {}, {} lookups still hung", self.id(), name, stalled);
            return Err(self.unavailable(anyhow!("{} earlier lookups have not returned", stalled)));
        }

        let (tx, rx) = mpsc::sync_channel(1);
        let inner = Arc::clone(&self.inner);
        let target = name.clone();
        let lookup = Arc::new(Mutex::new(Lookup::default()));
        let worker_lookup = Arc::clone(&lookup);
        let worker_stalled = Arc::clone(&self.stalled);

        thread::Builder::new()
            .name(format!("locate-{}", self.inner.id()))
            .spawn(move || {
                let res = inner.locate(&target);

                let mut lookup = worker_lookup.lock();
                lookup.finished = true;
                if lookup.abandoned {
                    worker_stalled.fetch_sub(1, Ordering::SeqCst);
                }
                drop(lookup);

                // The receiver is gone if we already timed out
                let _ = tx.send(res);
            })
            .map_err(internalise!())?;

        match rx.recv_timeout(self.timeout) {
            Ok(res) => res,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let mut lookup = lookup.lock();
                if !lookup.finished {
                    lookup.abandoned = true;
                    self.stalled.fetch_add(1, Ordering::SeqCst);
                }
                drop(lookup);

                warn!("{}: locating {} timed out after {:?}", self.id(), name, self.timeout);
                Err(self.unavailable(anyhow!("timed out after {:?}", self.timeout)))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(internal!(
                "locate worker for {} exited without answering",
                self.id()
            )),
        }
    }

    fn describe(&self) -> SourceDescriptor {
        self.inner.describe()
    }
}
