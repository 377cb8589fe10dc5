use crate::index::{Document, Hit, SearchIndex, SearchOptions};
use crate::source::DocumentSource;
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the owner's documents to arrive.
    Loading,
    Ready,
    /// The document fetch failed; searches return nothing until a reload.
    Unavailable(String),
}

/// What happened to an add or remove routed through a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Inserted,
    Replaced,
    Removed,
    Missing,
    /// Queued until the index finishes loading.
    Deferred,
    /// Ignored because the session is unavailable.
    Dropped,
}

enum Pending<D> {
    Add(D),
    Remove(String),
}

/// One owner's search index together with its loading state.
///
/// Mutations that arrive while the initial fetch is in flight are replayed,
/// in order, once the index is built.
pub struct SearchSession<D> {
    owner_id: String,
    options: SearchOptions,
    state: SessionState,
    index: Option<SearchIndex<D>>,
    pending: Vec<Pending<D>>,
}

impl<D: Document> SearchSession<D> {
    pub fn new(owner_id: impl Into<String>, options: SearchOptions) -> Self {
        Self { owner_id: owner_id.into(), options, state: SessionState::Loading, index: None, pending: Vec::new() }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn index(&self) -> Option<&SearchIndex<D>> {
        self.index.as_ref()
    }

    /// Number of indexed documents; zero until ready.
    pub fn len(&self) -> usize {
        self.index.as_ref().map_or(0, SearchIndex::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the owner's documents from `source` and build the index.
    pub fn load<S>(&mut self, source: &S) -> Result<usize>
    where
        S: DocumentSource<Doc = D> + ?Sized,
    {
        let fetched = source.fetch_all(&self.owner_id);
        self.finish(fetched)
    }

    /// Complete a fetch started elsewhere. On error the session becomes
    /// unavailable and the error is handed back.
    pub fn finish(&mut self, fetched: Result<Vec<D>>) -> Result<usize> {
        match fetched {
            Ok(documents) => {
                let mut index = SearchIndex::build(documents, self.options.clone());
                let replayed = self.pending.len();
                for op in self.pending.drain(..) {
                    match op {
                        Pending::Add(doc) => {
                            index.add(doc);
                        }
                        Pending::Remove(id) => {
                            index.remove(&id);
                        }
                    }
                }
                let documents = index.len();
                self.index = Some(index);
                self.state = SessionState::Ready;
                tracing::info!(owner = %self.owner_id, documents, replayed, "search index ready");
                Ok(documents)
            }
            Err(err) => {
                tracing::warn!(owner = %self.owner_id, error = %format!("{err:#}"), "search index unavailable");
                self.index = None;
                self.pending.clear();
                self.state = SessionState::Unavailable(format!("{err:#}"));
                Err(err)
            }
        }
    }

    /// Forget the current index and go back to loading.
    pub fn reset(&mut self) {
        self.index = None;
        self.pending.clear();
        self.state = SessionState::Loading;
    }

    /// Rebuild from scratch, e.g. after the index drifted from the store.
    pub fn reload<S>(&mut self, source: &S) -> Result<usize>
    where
        S: DocumentSource<Doc = D> + ?Sized,
    {
        self.reset();
        self.load(source)
    }

    pub fn add(&mut self, doc: D) -> Outcome {
        match (&self.state, self.index.as_mut()) {
            (SessionState::Ready, Some(index)) => {
                if index.add(doc) { Outcome::Replaced } else { Outcome::Inserted }
            }
            (SessionState::Loading, _) => {
                self.pending.push(Pending::Add(doc));
                Outcome::Deferred
            }
            _ => {
                tracing::warn!(owner = %self.owner_id, id = %doc.id(), "dropping add on unavailable index");
                Outcome::Dropped
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Outcome {
        match (&self.state, self.index.as_mut()) {
            (SessionState::Ready, Some(index)) => match index.remove(id) {
                Some(_) => Outcome::Removed,
                None => Outcome::Missing,
            },
            (SessionState::Loading, _) => {
                self.pending.push(Pending::Remove(id.to_string()));
                Outcome::Deferred
            }
            _ => {
                tracing::warn!(owner = %self.owner_id, %id, "dropping remove on unavailable index");
                Outcome::Dropped
            }
        }
    }

    /// Best matches for `query`; empty while the index is not ready.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&D> {
        self.index.as_ref().map(|index| index.search(query, limit)).unwrap_or_default()
    }

    pub fn rank(&self, query: &str) -> Vec<Hit<'_, D>> {
        self.index.as_ref().map(|index| index.rank(query)).unwrap_or_default()
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }
}
