//! Coalesced fetching from the remote file system into the IMFS.
//!
//! Every fetch is memoized as a shared future keyed by URI, so concurrent
//! `ensure` calls for the same file ride on a single remote request. A
//! successful fetch stays cached; a failed one is evicted so the next
//! caller retries. A semaphore bounds how many fetches are in flight.

use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

use crate::imfs::InMemoryFileSystem;
use crate::path;
use crate::remote::RemoteFileSystem;
use crate::{FileSystemError, Result};

const MAX_CONCURRENT_FETCHES: usize = 100;

type SharedFetch = Shared<BoxFuture<'static, Result<()>>>;

pub struct FileSystemUpdater {
    fs: Arc<InMemoryFileSystem>,
    remote: Arc<dyn RemoteFileSystem>,
    fetches: Mutex<FxHashMap<Url, SharedFetch>>,
    structure: Mutex<Option<SharedFetch>>,
    limit: Arc<Semaphore>,
}

impl FileSystemUpdater {
    pub fn new(fs: Arc<InMemoryFileSystem>, remote: Arc<dyn RemoteFileSystem>) -> Self {
        Self {
            fs,
            remote,
            fetches: Mutex::new(FxHashMap::default()),
            structure: Mutex::new(None),
            limit: Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES)),
        }
    }

    /// Guarantees the file's content is present in the IMFS.
    pub async fn ensure(&self, uri: &Url) -> Result<()> {
        let uri = path::normalize(uri);
        let fetch = {
            let mut fetches = self.fetches.lock();
            if let Some(fetch) = fetches.get(&uri) {
                fetch.clone()
            } else {
                let fetch = self.spawn_fetch(uri.clone());
                fetches.insert(uri.clone(), fetch.clone());
                fetch
            }
        };
        let result = fetch.await;
        if result.is_err() {
            // Drop the cached handle so the next ensure retries.
            self.fetches.lock().remove(&uri);
        }
        result
    }

    fn spawn_fetch(&self, uri: Url) -> SharedFetch {
        let fs = Arc::clone(&self.fs);
        let remote = Arc::clone(&self.remote);
        let limit = Arc::clone(&self.limit);
        async move {
            let _permit = limit
                .acquire_owned()
                .await
                .map_err(|_| FileSystemError::Remote("fetch limiter closed".to_string()))?;
            debug!("fetching {uri}");
            let text = remote.read_file(&uri).await?;
            fs.add(&uri, Some(text));
            Ok(())
        }
        .boxed()
        .shared()
    }

    /// Guarantees the workspace file listing has been registered in the
    /// IMFS (as content-less entries).
    pub async fn ensure_structure(&self) -> Result<()> {
        let fetch = {
            let mut structure = self.structure.lock();
            if let Some(fetch) = structure.as_ref() {
                fetch.clone()
            } else {
                let fs = Arc::clone(&self.fs);
                let remote = Arc::clone(&self.remote);
                let fetch = async move {
                    let uris = remote.workspace_files(None).await?;
                    debug!("workspace structure: {} files", uris.len());
                    for uri in uris {
                        fs.add(&uri, None);
                    }
                    Ok(())
                }
                .boxed()
                .shared();
                *structure = Some(fetch.clone());
                fetch
            }
        };
        let result = fetch.await;
        if result.is_err() {
            *self.structure.lock() = None;
        }
        result
    }

    /// Forgets the cached fetch for a URI; the next ensure re-fetches.
    pub fn invalidate(&self, uri: &Url) {
        self.fetches.lock().remove(&path::normalize(uri));
    }

    /// Forgets the cached structure enumeration.
    pub fn invalidate_structure(&self) {
        *self.structure.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    use crate::libraries::LibrarySet;

    struct CountingRemote {
        reads: AtomicUsize,
        listings: AtomicUsize,
        gate: Notify,
        gated: std::sync::atomic::AtomicBool,
        fail: std::sync::atomic::AtomicBool,
    }

    impl CountingRemote {
        fn new() -> Self {
            Self {
                reads: AtomicUsize::new(0),
                listings: AtomicUsize::new(0),
                gate: Notify::new(),
                gated: std::sync::atomic::AtomicBool::new(false),
                fail: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl RemoteFileSystem for CountingRemote {
        async fn read_file(&self, uri: &Url) -> Result<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.gated.load(Ordering::SeqCst) {
                self.gate.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(FileSystemError::Remote("boom".to_string()));
            }
            Ok(format!("content of {uri}"))
        }

        async fn workspace_files(&self, _base: Option<&Url>) -> Result<Vec<Url>> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Url::parse("file:///work/a.ts").unwrap()])
        }
    }

    fn setup() -> (Arc<InMemoryFileSystem>, Arc<CountingRemote>, FileSystemUpdater) {
        let fs = Arc::new(InMemoryFileSystem::new(
            Url::parse("file:///work").unwrap(),
            Arc::new(LibrarySet::new("5.4.5")),
        ));
        let remote = Arc::new(CountingRemote::new());
        let updater = FileSystemUpdater::new(Arc::clone(&fs), Arc::clone(&remote) as _);
        (fs, remote, updater)
    }

    #[tokio::test]
    async fn concurrent_ensures_share_one_fetch() {
        let (fs, remote, updater) = setup();
        let updater = Arc::new(updater);
        let uri = Url::parse("file:///work/a.ts").unwrap();
        remote.gated.store(true, Ordering::SeqCst);

        let first = tokio::spawn({
            let updater = Arc::clone(&updater);
            let uri = uri.clone();
            async move { updater.ensure(&uri).await }
        });
        let second = tokio::spawn({
            let updater = Arc::clone(&updater);
            let uri = uri.clone();
            async move { updater.ensure(&uri).await }
        });
        tokio::task::yield_now().await;
        remote.gated.store(false, Ordering::SeqCst);
        remote.gate.notify_waiters();
        remote.gate.notify_one();

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(remote.reads.load(Ordering::SeqCst), 1);
        assert!(fs.has_content(&uri));

        // Still memoized: a later ensure is free.
        updater.ensure(&uri).await.unwrap();
        assert_eq!(remote.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_a_refetch() {
        let (_fs, remote, updater) = setup();
        let uri = Url::parse("file:///work/a.ts").unwrap();
        updater.ensure(&uri).await.unwrap();
        updater.invalidate(&uri);
        updater.ensure(&uri).await.unwrap();
        assert_eq!(remote.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetches_are_retried() {
        let (fs, remote, updater) = setup();
        let uri = Url::parse("file:///work/a.ts").unwrap();
        remote.fail.store(true, Ordering::SeqCst);
        assert!(updater.ensure(&uri).await.is_err());
        remote.fail.store(false, Ordering::SeqCst);
        updater.ensure(&uri).await.unwrap();
        assert_eq!(remote.reads.load(Ordering::SeqCst), 2);
        assert!(fs.has_content(&uri));
    }

    #[tokio::test]
    async fn structure_is_single_flight() {
        let (fs, remote, updater) = setup();
        updater.ensure_structure().await.unwrap();
        updater.ensure_structure().await.unwrap();
        assert_eq!(remote.listings.load(Ordering::SeqCst), 1);
        assert!(fs.has(&Url::parse("file:///work/a.ts").unwrap()));
        updater.invalidate_structure();
        updater.ensure_structure().await.unwrap();
        assert_eq!(remote.listings.load(Ordering::SeqCst), 2);
    }
}
