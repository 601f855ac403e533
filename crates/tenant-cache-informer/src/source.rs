//! The upstream contract reflectors consume.
//!
//! An [`EventSource`] answers paginated LIST calls and opens WATCH streams
//! from a resource version. The Kubernetes-backed implementation lives in the
//! `tenant-cache-kube` crate; tests drive reflectors with [`mock::ScriptedSource`].

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tenant_cache_core::Scope;
use thiserror::Error;

/// HTTP status an upstream uses when a watch resource version has been compacted away.
pub const STATUS_GONE: u16 = 410;

/// What a reflector lists and watches: one kind inside one scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchTarget {
    /// Kind tag of the watched objects.
    pub kind: String,
    /// Tenant and namespace the reflector is restricted to.
    pub scope: Scope,
}

impl WatchTarget {
    /// Create a target.
    #[must_use]
    pub fn new(kind: impl Into<String>, scope: Scope) -> Self {
        Self {
            kind: kind.into(),
            scope,
        }
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.scope)
    }
}

/// Pagination parameters for a LIST call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Maximum number of objects in the page.
    pub limit: Option<u32>,
    /// Continuation token from the previous page.
    pub continue_token: Option<String>,
}

/// One page of a LIST response.
#[derive(Debug, Clone)]
pub struct ListPage<K> {
    /// Objects on this page.
    pub items: Vec<K>,
    /// Resource version the listing is consistent at.
    pub resource_version: String,
    /// Token for the next page; `None` on the last page.
    pub continue_token: Option<String>,
}

impl<K> ListPage<K> {
    /// A single, final page.
    #[must_use]
    pub fn complete(items: Vec<K>, resource_version: impl Into<String>) -> Self {
        Self {
            items,
            resource_version: resource_version.into(),
            continue_token: None,
        }
    }
}

/// Status carried by an in-band watch error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchStatus {
    /// HTTP-style status code.
    pub code: u16,
    /// Machine-readable reason.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
}

impl WatchStatus {
    /// The status an upstream sends when the watch version is too old.
    #[must_use]
    pub fn gone(message: impl Into<String>) -> Self {
        Self {
            code: STATUS_GONE,
            reason: "Expired".to_string(),
            message: message.into(),
        }
    }
}

/// One change notification on a watch stream.
#[derive(Debug, Clone)]
pub enum WatchEvent<K> {
    /// The object was created.
    Added(K),
    /// The object changed.
    Modified(K),
    /// The object was removed; carries its last known state.
    Deleted(K),
    /// The stream has progressed to a resource version without object changes.
    Bookmark {
        /// Version reached.
        resource_version: String,
    },
    /// The upstream reported an error in-band.
    Error(WatchStatus),
}

/// Failures talking to the upstream.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The upstream could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The requested resource version is no longer available.
    #[error("resource version too old: {0}")]
    Gone(String),

    /// The watch stream ended.
    #[error("watch stream closed")]
    WatchClosed,

    /// The upstream returned a non-success status.
    #[error("upstream status {code}: {message}")]
    Status {
        /// HTTP-style status code.
        code: u16,
        /// Upstream message.
        message: String,
    },

    /// A payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl SourceError {
    /// Returns true if the stored resource version must be discarded and a
    /// fresh LIST issued.
    #[must_use]
    pub const fn is_gone(&self) -> bool {
        matches!(self, Self::Gone(_))
    }
}

impl From<WatchStatus> for SourceError {
    fn from(status: WatchStatus) -> Self {
        if status.code == STATUS_GONE {
            Self::Gone(status.message)
        } else {
            Self::Status {
                code: status.code,
                message: status.message,
            }
        }
    }
}

/// A stream of watch events.
pub type WatchStream<K> = BoxStream<'static, Result<WatchEvent<K>, SourceError>>;

/// An upstream that can list and watch objects of one or more kinds.
#[async_trait]
pub trait EventSource<K>: Send + Sync + 'static {
    /// Fetch one page of objects.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the upstream call fails.
    async fn list(
        &self,
        target: &WatchTarget,
        options: &ListOptions,
    ) -> Result<ListPage<K>, SourceError>;

    /// Open a watch starting after `resource_version`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the watch cannot be established.
    async fn watch(
        &self,
        target: &WatchTarget,
        resource_version: &str,
    ) -> Result<WatchStream<K>, SourceError>;
}

/// Scripted event source for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::channel::mpsc;
    use futures::StreamExt;
    use parking_lot::Mutex;

    use super::*;

    /// What a scripted watch stream does after its events run out.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum AfterScript {
        /// Stay open without producing anything.
        Hang,
        /// End the stream.
        Close,
    }

    enum WatchScript<K> {
        Events(Vec<Result<WatchEvent<K>, SourceError>>, AfterScript),
        Live(mpsc::UnboundedReceiver<Result<WatchEvent<K>, SourceError>>),
        Fail(SourceError),
    }

    /// An event source that replays queued responses in order.
    ///
    /// Each LIST call consumes the next queued page and each WATCH call the
    /// next queued stream. Once the LIST queue is empty, LIST fails with a
    /// connection error; once the WATCH queue is empty, WATCH hangs forever.
    pub struct ScriptedSource<K> {
        lists: Mutex<VecDeque<Result<ListPage<K>, SourceError>>>,
        watches: Mutex<VecDeque<WatchScript<K>>>,
        list_calls: AtomicUsize,
        watch_versions: Mutex<Vec<String>>,
        list_options: Mutex<Vec<ListOptions>>,
    }

    impl<K> Default for ScriptedSource<K> {
        fn default() -> Self {
            Self {
                lists: Mutex::new(VecDeque::new()),
                watches: Mutex::new(VecDeque::new()),
                list_calls: AtomicUsize::new(0),
                watch_versions: Mutex::new(Vec::new()),
                list_options: Mutex::new(Vec::new()),
            }
        }
    }

    impl<K: Send + 'static> ScriptedSource<K> {
        /// Create an empty script.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a single-page LIST response.
        pub fn push_list(&self, items: Vec<K>, resource_version: &str) {
            self.lists
                .lock()
                .push_back(Ok(ListPage::complete(items, resource_version)));
        }

        /// Queue an arbitrary LIST page.
        pub fn push_page(&self, page: ListPage<K>) {
            self.lists.lock().push_back(Ok(page));
        }

        /// Queue a failing LIST call.
        pub fn push_list_error(&self, err: SourceError) {
            self.lists.lock().push_back(Err(err));
        }

        /// Queue a watch stream that replays `events`.
        pub fn push_watch(&self, events: Vec<WatchEvent<K>>, after: AfterScript) {
            self.watches.lock().push_back(WatchScript::Events(
                events.into_iter().map(Ok).collect(),
                after,
            ));
        }

        /// Queue a watch stream that ends with a transport error after `events`.
        pub fn push_watch_then_fail(&self, events: Vec<WatchEvent<K>>, err: SourceError) {
            let mut items: Vec<_> = events.into_iter().map(Ok).collect();
            items.push(Err(err));
            self.watches
                .lock()
                .push_back(WatchScript::Events(items, AfterScript::Hang));
        }

        /// Queue a WATCH call that fails to open.
        pub fn push_watch_error(&self, err: SourceError) {
            self.watches.lock().push_back(WatchScript::Fail(err));
        }

        /// Queue a watch stream fed by the returned sender.
        pub fn push_live_watch(
            &self,
        ) -> mpsc::UnboundedSender<Result<WatchEvent<K>, SourceError>> {
            let (tx, rx) = mpsc::unbounded();
            self.watches.lock().push_back(WatchScript::Live(rx));
            tx
        }

        /// Number of LIST calls made so far.
        #[must_use]
        pub fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }

        /// Resource versions passed to WATCH, in call order.
        #[must_use]
        pub fn watch_versions(&self) -> Vec<String> {
            self.watch_versions.lock().clone()
        }

        /// Options passed to LIST, in call order.
        #[must_use]
        pub fn list_options(&self) -> Vec<ListOptions> {
            self.list_options.lock().clone()
        }
    }

    #[async_trait]
    impl<K: Send + 'static> EventSource<K> for ScriptedSource<K> {
        async fn list(
            &self,
            _target: &WatchTarget,
            options: &ListOptions,
        ) -> Result<ListPage<K>, SourceError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.list_options.lock().push(options.clone());
            self.lists
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(SourceError::Connection("script exhausted".to_string())))
        }

        async fn watch(
            &self,
            _target: &WatchTarget,
            resource_version: &str,
        ) -> Result<WatchStream<K>, SourceError> {
            self.watch_versions.lock().push(resource_version.to_string());
            let script = self.watches.lock().pop_front();
            match script {
                None => Ok(futures::stream::pending().boxed()),
                Some(WatchScript::Fail(err)) => Err(err),
                Some(WatchScript::Live(rx)) => Ok(rx.boxed()),
                Some(WatchScript::Events(events, AfterScript::Close)) => {
                    Ok(futures::stream::iter(events).boxed())
                }
                Some(WatchScript::Events(events, AfterScript::Hang)) => Ok(futures::stream::iter(
                    events,
                )
                .chain(futures::stream::pending())
                .boxed()),
            }
        }
    }
}
