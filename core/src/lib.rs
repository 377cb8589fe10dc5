//! Fuzzy resume matching: a per-owner, in-memory index that ranks resumes
//! against a pasted job description.
//!
//! ```
//! use resumatch_core::{Resume, SearchIndex, SearchOptions};
//!
//! let resumes = vec![Resume {
//!     id: "r1".into(),
//!     name: "backend.pdf".into(),
//!     text_content: "Senior Backend Engineer, Go and Postgres".into(),
//!     last_modified: 0,
//!     owner_id: None,
//! }];
//! let index = SearchIndex::build(resumes, SearchOptions::default());
//! let best = index.search("backend engineer", 5);
//! assert_eq!(best[0].id, "r1");
//! ```

pub mod fuzzy;
pub mod index;
pub mod normalize;
pub mod session;
pub mod source;

pub use index::{Document, Hit, Resume, SearchIndex, SearchOptions};
pub use normalize::Query;
pub use session::{Outcome, SearchSession, SessionState};
pub use source::{DocumentSource, FileSource, MemorySource};
