use crate::fuzzy::{fold, Pattern, MAX_CHUNK_LEN};
use crate::normalize::{normalize, Query};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Something the index can match against: a stable id plus one text field.
pub trait Document {
    fn id(&self) -> &str;
    fn text_content(&self) -> &str;
}

/// A stored resume. Only `text_content` is matched; the rest rides along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resume {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub text_content: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub last_modified: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

impl Document for Resume {
    fn id(&self) -> &str { &self.id }
    fn text_content(&self) -> &str { &self.text_content }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Largest edit-error ratio at which a term still counts as matched.
    pub threshold: f64,
    pub default_limit: usize,
    /// Chunk width for long terms; capped at 64.
    pub max_pattern_len: usize,
    /// Floor for a term's error ratio when scoring, so exact matches stay finite.
    pub min_term_score: f64,
    pub ignore_field_norm: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { threshold: 0.6, default_limit: 5, max_pattern_len: 32, min_term_score: 0.001, ignore_field_norm: false }
    }
}

impl SearchOptions {
    /// Replace out-of-range values with usable ones.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !self.threshold.is_finite() {
            self.threshold = defaults.threshold;
        }
        self.threshold = self.threshold.clamp(0.0, 1.0);
        self.max_pattern_len = self.max_pattern_len.clamp(1, MAX_CHUNK_LEN);
        if !(self.min_term_score > 0.0 && self.min_term_score <= 1.0) {
            self.min_term_score = defaults.min_term_score;
        }
        self
    }
}

struct Entry<D> {
    doc: D,
    folded: Vec<char>,
    norm: f64,
}

impl<D: Document> Entry<D> {
    fn new(doc: D) -> Self {
        let normalized = normalize(doc.text_content());
        let tokens = normalized.split_whitespace().count();
        let norm = if tokens == 0 { 1.0 } else { 1.0 / (tokens as f64).sqrt() };
        let folded = fold(&normalized).chars().collect();
        Self { doc, folded, norm }
    }
}

/// A ranked candidate. Higher scores are better matches.
#[derive(Debug)]
pub struct Hit<'a, D> {
    pub document: &'a D,
    pub score: f64,
}

/// In-memory fuzzy index over one owner's documents.
///
/// Entries keep insertion order, which is also the tie-break order for equal
/// scores. Ids are unique: adding a document whose id is already present
/// replaces the stored record in its original slot.
pub struct SearchIndex<D> {
    entries: Vec<Entry<D>>,
    options: SearchOptions,
}

impl<D: Document> SearchIndex<D> {
    pub fn new(options: SearchOptions) -> Self {
        Self { entries: Vec::new(), options: options.sanitized() }
    }

    pub fn build<I: IntoIterator<Item = D>>(documents: I, options: SearchOptions) -> Self {
        let mut index = Self::new(options);
        index.extend(documents);
        tracing::debug!(documents = index.len(), "built search index");
        index
    }

    /// Drop every entry and index `documents` instead.
    pub fn rebuild<I: IntoIterator<Item = D>>(&mut self, documents: I) {
        self.entries.clear();
        self.extend(documents);
        tracing::debug!(documents = self.len(), "rebuilt search index");
    }

    fn extend<I: IntoIterator<Item = D>>(&mut self, documents: I) {
        for doc in documents {
            self.insert(doc);
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.doc.id() == id)
    }

    fn insert(&mut self, doc: D) -> bool {
        let entry = Entry::new(doc);
        match self.position(entry.doc.id()) {
            Some(pos) => {
                self.entries[pos] = entry;
                true
            }
            None => {
                self.entries.push(entry);
                false
            }
        }
    }

    /// Index `doc`. Returns `true` when it replaced a document with the same id.
    pub fn add(&mut self, doc: D) -> bool {
        let id = doc.id().to_string();
        let replaced = self.insert(doc);
        tracing::debug!(%id, replaced, "added document to index");
        replaced
    }

    /// Remove the document with `id`, returning it. Unknown ids are ignored.
    pub fn remove(&mut self, id: &str) -> Option<D> {
        let pos = self.position(id)?;
        let entry = self.entries.remove(pos);
        tracing::debug!(%id, "removed document from index");
        Some(entry.doc)
    }

    pub fn get(&self, id: &str) -> Option<&D> {
        self.position(id).map(|pos| &self.entries[pos].doc)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Documents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &D> {
        self.entries.iter().map(|e| &e.doc)
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Every keyword and phrase of the query, compiled once and deduplicated after folding.
    fn compile(&self, query: &Query) -> Vec<Pattern> {
        let mut seen = HashSet::new();
        query
            .terms()
            .map(|term| Pattern::new(term, self.options.max_pattern_len))
            .filter(|p| !p.is_empty() && seen.insert(p.term().to_string()))
            .collect()
    }

    /// All candidates for `query`, best first.
    ///
    /// A document is a candidate when at least one keyword or phrase of the
    /// query matches it. Its score sums `-ln(error ratio)` over the matched
    /// terms, scaled by the field-length norm.
    pub fn rank(&self, query: &str) -> Vec<Hit<'_, D>> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        let patterns = self.compile(&Query::parse(query));
        if patterns.is_empty() {
            return Vec::new();
        }
        let SearchOptions { threshold, min_term_score, ignore_field_norm, .. } = self.options;

        let mut hits: Vec<Hit<'_, D>> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let mut total = 0.0;
                let mut matched = false;
                for pattern in &patterns {
                    if let Some(ratio) = pattern.score(&entry.folded, threshold) {
                        matched = true;
                        total += -ratio.max(min_term_score).ln();
                    }
                }
                let norm = if ignore_field_norm { 1.0 } else { entry.norm };
                matched.then(|| Hit { document: &entry.doc, score: total * norm })
            })
            .collect();
        // stable: equal scores keep insertion order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        tracing::debug!(terms = patterns.len(), candidates = hits.len(), "ranked documents");
        hits
    }

    /// The `limit` best matches for `query`, as the stored records.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&D> {
        if limit == 0 {
            return Vec::new();
        }
        self.rank(query).into_iter().take(limit).map(|hit| hit.document).collect()
    }

    /// [`search`](Self::search) with the configured default limit.
    pub fn search_default(&self, query: &str) -> Vec<&D> {
        self.search(query, self.options.default_limit)
    }
}

impl<D: Document> Default for SearchIndex<D> {
    fn default() -> Self {
        Self::new(SearchOptions::default())
    }
}
