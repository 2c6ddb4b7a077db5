use kiln_lib::consts::FILE_CACHE_NAME;
use kiln_lib::filestore::{CacheOutcome, FileHashStore, HashStrategy};

use super::common::Project;

#[test]
fn hashes_survive_a_reload() {
  let project = Project::new();
  let file = project.write("lib/a.dart", "contents");

  let mut store = FileHashStore::new(&project.env.build_dir, HashStrategy::Content);
  assert_eq!(store.initialize(), CacheOutcome::Empty);
  store.hash_files(std::slice::from_ref(&file));
  let hash = store.current_hash(&file).unwrap().to_string();
  assert_eq!(store.persist(), CacheOutcome::Persisted(1));

  let mut reloaded = FileHashStore::new(&project.env.build_dir, HashStrategy::Content);
  assert_eq!(reloaded.initialize(), CacheOutcome::Loaded(1));
  assert_eq!(reloaded.previous_hash(&file), Some(hash.as_str()));
  assert!(reloaded.current_hashes().is_empty());
}

#[test]
fn unreadable_files_are_returned_without_a_hash() {
  let project = Project::new();
  let present = project.write("a.txt", "a");
  let absent = project.root().join("absent.txt");

  let mut store = FileHashStore::new(&project.env.build_dir, HashStrategy::Content);
  let hashed = store.hash_files(&[present.clone(), absent.clone()]);

  assert_eq!(hashed, vec![present.clone(), absent.clone()]);
  assert!(store.current_hash(&present).is_some());
  assert!(store.current_hash(&absent).is_none());
}

#[test]
fn other_versions_are_discarded() {
  let project = Project::new();
  std::fs::write(
    project.env.build_dir.join(FILE_CACHE_NAME),
    r#"{"version": 1, "files": [{"path": "/a", "hash": "x"}]}"#,
  )
  .unwrap();

  let mut store = FileHashStore::new(&project.env.build_dir, HashStrategy::Content);
  assert!(matches!(store.initialize(), CacheOutcome::Discarded(_)));
  assert!(store.previous_hashes().is_empty());
}

#[test]
fn corrupt_cache_is_discarded() {
  let project = Project::new();
  std::fs::write(project.env.build_dir.join(FILE_CACHE_NAME), "not json").unwrap();

  let mut store = FileHashStore::new(&project.env.build_dir, HashStrategy::Content);
  assert!(matches!(store.initialize(), CacheOutcome::Discarded(_)));
}

#[test]
fn persist_without_build_dir_is_skipped() {
  let project = Project::new();
  let store = FileHashStore::new(project.root().join("nowhere"), HashStrategy::Content);
  assert_eq!(store.persist(), CacheOutcome::Skipped);
}

#[test]
fn diff_reports_changed_and_new_files() {
  let project = Project::new();
  let same = project.write("same.txt", "same");
  let changed = project.write("changed.txt", "before");

  let mut store = FileHashStore::new(&project.env.build_dir, HashStrategy::Content);
  store.initialize();
  store.hash_files(&[same.clone(), changed.clone()]);
  store.persist();

  project.write("changed.txt", "after");
  let added = project.write("added.txt", "new");
  let mut store = FileHashStore::new(&project.env.build_dir, HashStrategy::Content);
  store.initialize();
  let diff = store.diff_files(&[same, changed.clone(), added.clone()]);

  assert_eq!(diff, vec![changed, added]);
}
