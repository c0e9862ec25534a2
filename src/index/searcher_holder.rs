use std::mem;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex, RwLock};
use serde_json::Value;
use crate::core::error::{Error, Result};
use crate::index::view::IndexView;

/// Set once every handle onto a retired view has been dropped.
#[derive(Debug, Default)]
pub struct DrainSignal {
    drained: Mutex<bool>,
    cond: Condvar,
}

impl DrainSignal {
    fn new(drained: bool) -> Self {
        DrainSignal {
            drained: Mutex::new(drained),
            cond: Condvar::new(),
        }
    }

    fn set(&self) {
        *self.drained.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.drained.lock()
    }

    /// Blocks until drained or `timeout` elapses; returns whether the view drained.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut drained = self.drained.lock();
        if !*drained {
            let _ = self.cond.wait_while_for(&mut drained, |d| !*d, timeout);
        }
        *drained
    }
}

/// One published view plus lazily computed per-view data.
#[derive(Debug)]
pub struct IndexSearcherHoldingState {
    view: IndexView,
    terms_docs: OnceCell<Arc<Vec<Value>>>,
    drained: Arc<DrainSignal>,
}

impl IndexSearcherHoldingState {
    fn new(view: IndexView) -> Self {
        IndexSearcherHoldingState {
            view,
            terms_docs: OnceCell::new(),
            drained: Arc::new(DrainSignal::new(false)),
        }
    }
}

impl Drop for IndexSearcherHoldingState {
    fn drop(&mut self) {
        self.drained.set();
    }
}

/// Borrowed handle onto a view; the view stays alive while any guard exists.
#[derive(Debug, Clone)]
pub struct SearcherGuard {
    state: Arc<IndexSearcherHoldingState>,
}

impl SearcherGuard {
    pub fn view(&self) -> &IndexView {
        &self.state.view
    }

    /// Per-document indexed terms, computed once per view.
    pub fn terms_docs(&self) -> Arc<Vec<Value>> {
        self.state
            .terms_docs
            .get_or_init(|| Arc::new(self.state.view.terms_docs()))
            .clone()
    }
}

impl Deref for SearcherGuard {
    type Target = IndexView;

    fn deref(&self) -> &IndexView {
        &self.state.view
    }
}

/// Holds the current view of an index and swaps it on publish.
///
/// Retired views are freed when their last guard drops, never by the publisher.
#[derive(Debug)]
pub struct IndexSearcherHolder {
    index: String,
    current: RwLock<Option<Arc<IndexSearcherHoldingState>>>,
}

impl IndexSearcherHolder {
    pub fn new(index: impl Into<String>) -> Self {
        IndexSearcherHolder {
            index: index.into(),
            current: RwLock::new(None),
        }
    }

    /// Installs `view` as current, or stops serving when `None`.
    ///
    /// With `wait`, returns a signal for the retired view's drain.
    pub fn set_index_searcher(&self, view: Option<IndexView>, wait: bool) -> Option<Arc<DrainSignal>> {
        let next = view.map(|v| Arc::new(IndexSearcherHoldingState::new(v)));
        let old = mem::replace(&mut *self.current.write(), next);

        match old {
            None => wait.then(|| Arc::new(DrainSignal::new(true))),
            Some(old) => {
                let signal = wait.then(|| old.drained.clone());
                drop(old);
                signal
            }
        }
    }

    pub fn get_searcher(&self) -> Result<SearcherGuard> {
        match &*self.current.read() {
            Some(state) => Ok(SearcherGuard { state: state.clone() }),
            None => Err(Error::disposed(&self.index)),
        }
    }

    pub fn get_searcher_and_terms_docs(&self) -> Result<(SearcherGuard, Arc<Vec<Value>>)> {
        let guard = self.get_searcher()?;
        let terms = guard.terms_docs();
        Ok((guard, terms))
    }

    pub fn is_serving(&self) -> bool {
        self.current.read().is_some()
    }
}
