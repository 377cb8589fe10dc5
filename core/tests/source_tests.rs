use resumatch_core::{DocumentSource, FileSource, SearchOptions, SearchSession, SessionState};
use std::fs;
use tempfile::tempdir;

fn write_store(root: &std::path::Path) {
    fs::create_dir_all(root.join("alice")).unwrap();
    fs::create_dir_all(root.join("shared")).unwrap();
    fs::write(
        root.join("alice/resumes.jsonl"),
        concat!(
            r#"{"id":"a1","name":"backend.pdf","textContent":"Backend engineer, Go, Postgres","lastModified":1}"#,
            "\n\n",
            r#"{"id":"a2","name":"ml.pdf","textContent":"Machine learning engineer, PyTorch","lastModified":2}"#,
            "\n",
        ),
    )
    .unwrap();
    fs::write(
        root.join("shared/bob.json"),
        r#"[{"id":"b1","name":"cv.pdf","textContent":"Rust developer","ownerId":"bob"}]"#,
    )
    .unwrap();
    fs::write(root.join("shared/notes.txt"), "ignored").unwrap();
}

#[test]
fn groups_records_by_owner() {
    let dir = tempdir().unwrap();
    write_store(dir.path());
    let source = FileSource::open(dir.path()).unwrap();

    let alice = source.fetch_all("alice").unwrap();
    assert_eq!(alice.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["a1", "a2"]);
    assert_eq!(source.fetch_all("bob").unwrap()[0].id, "b1");
    assert!(source.fetch_all("shared").unwrap().is_empty());
    assert_eq!(source.owners().unwrap(), vec!["alice", "bob"]);
}

#[test]
fn malformed_file_names_the_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("broken.jsonl"), "{not json}\n").unwrap();
    let source = FileSource::open(dir.path()).unwrap();
    let err = source.fetch_all("anyone").unwrap_err();
    assert!(format!("{err:#}").contains("broken.jsonl"));
}

#[test]
fn session_loads_from_files_and_tracks_failures() {
    let dir = tempdir().unwrap();
    write_store(dir.path());
    let source = FileSource::open(dir.path()).unwrap();

    let mut session = SearchSession::new("alice", SearchOptions::default());
    assert_eq!(session.load(&source).unwrap(), 2);
    let best = session.search("Go backend developer", 1);
    assert_eq!(best[0].id, "a1");

    fs::write(dir.path().join("alice/broken.json"), "[").unwrap();
    assert!(session.reload(&source).is_err());
    assert!(matches!(session.state(), SessionState::Unavailable(_)));
    assert!(session.search("Go backend developer", 1).is_empty());
}
