use crate::index::{Document, Resume};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where a session gets its initial documents from.
pub trait DocumentSource {
    type Doc: Document;

    /// Every document currently owned by `owner_id`. Unknown owners yield an empty list.
    fn fetch_all(&self, owner_id: &str) -> Result<Vec<Self::Doc>>;
}

/// Resumes held in memory, keyed by owner.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    by_owner: HashMap<String, Vec<Resume>>,
}

impl MemorySource {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, owner_id: &str, resumes: Vec<Resume>) -> Self {
        self.by_owner.entry(owner_id.to_string()).or_default().extend(resumes);
        self
    }

    pub fn insert(&mut self, owner_id: &str, resume: Resume) {
        self.by_owner.entry(owner_id.to_string()).or_default().push(resume);
    }
}

impl DocumentSource for MemorySource {
    type Doc = Resume;

    fn fetch_all(&self, owner_id: &str) -> Result<Vec<Resume>> {
        Ok(self.by_owner.get(owner_id).cloned().unwrap_or_default())
    }
}

/// Resume records stored as `.json` (one object or an array) and `.jsonl` files.
///
/// The path may be a single file or a directory tree. A record's owner is its
/// `ownerId`, or else the name of the directory holding the file. The files
/// are re-read on every fetch so the result tracks the store.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            anyhow::bail!("document store {} does not exist", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn files(&self) -> Vec<PathBuf> {
        if self.root.is_file() {
            return vec![self.root.clone()];
        }
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")))
            .collect()
    }

    /// Every record in the store with its owner filled in.
    pub fn load_all(&self) -> Result<Vec<Resume>> {
        let mut out = Vec::new();
        for file in self.files() {
            let fallback_owner = file
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned());
            let records = read_records(&file).with_context(|| format!("reading {}", file.display()))?;
            for mut resume in records {
                if resume.owner_id.is_none() {
                    resume.owner_id = fallback_owner.clone();
                }
                out.push(resume);
            }
        }
        tracing::debug!(root = %self.root.display(), records = out.len(), "loaded document store");
        Ok(out)
    }

    /// Distinct owners in file order.
    pub fn owners(&self) -> Result<Vec<String>> {
        let mut owners: Vec<String> = Vec::new();
        for resume in self.load_all()? {
            if let Some(owner) = resume.owner_id {
                if !owners.contains(&owner) {
                    owners.push(owner);
                }
            }
        }
        Ok(owners)
    }
}

impl DocumentSource for FileSource {
    type Doc = Resume;

    fn fetch_all(&self, owner_id: &str) -> Result<Vec<Resume>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.owner_id.as_deref() == Some(owner_id))
            .collect())
    }
}

fn read_records(file: &Path) -> Result<Vec<Resume>> {
    let reader = BufReader::new(File::open(file)?);
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut records = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let record = serde_json::from_str(&line).with_context(|| format!("line {}", n + 1))?;
            records.push(record);
        }
        return Ok(records);
    }
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .collect(),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(json)?]),
        _ => Ok(Vec::new()),
    }
}
