use std::sync::Arc;

use kiln_lib::environment::StaticArtifacts;
use kiln_lib::source::resolver::{resolve, resolve_lenient};
use kiln_lib::source::{Depfile, ResolveError, Source, SourceRole};

use super::common::Project;

#[test]
fn suffix_glob_requires_the_dot() {
  let project = Project::new();
  let fizz = project.write("foo.fizz", "");
  project.write("foofizz", "");

  let resolved = resolve(&project.env, SourceRole::Inputs, &[Source::pattern("{PROJECT_DIR}/*.fizz")]).unwrap();

  assert_eq!(resolved.files, vec![fizz]);
}

#[test]
fn two_wildcards_are_rejected_even_with_a_match() {
  let project = Project::new();
  project.write("foo.foobar", "");

  let err = resolve(&project.env, SourceRole::Inputs, &[Source::pattern("{PROJECT_DIR}/*.*bar")]).unwrap_err();

  assert!(matches!(err, ResolveError::InvalidPattern { .. }), "got {err}");
}

#[test]
fn unknown_root_is_rejected() {
  let project = Project::new();
  let err = resolve(&project.env, SourceRole::Inputs, &[Source::pattern("{NOPE}/a.txt")]).unwrap_err();
  assert!(matches!(err, ResolveError::InvalidPattern { .. }));
}

#[test]
fn optional_sources_may_be_absent() {
  let project = Project::new();
  let resolved = resolve(
    &project.env,
    SourceRole::Inputs,
    &[Source::optional_pattern("{PROJECT_DIR}/pubspec.lock")],
  )
  .unwrap();
  assert!(resolved.files.is_empty());
}

#[test]
fn lenient_resolution_skips_missing_files() {
  let project = Project::new();
  let present = project.write("a.txt", "");
  let resolved = resolve_lenient(
    &project.env,
    SourceRole::Inputs,
    &[Source::pattern("{PROJECT_DIR}/a.txt"), Source::pattern("{PROJECT_DIR}/b.txt")],
  )
  .unwrap();
  assert_eq!(resolved.files, vec![present]);
}

#[test]
fn artifact_directories_expand_to_files() {
  let project = Project::new();
  let a = project.write("engine/icudtl.dat", "");
  let b = project.write("engine/lib/libapp.so", "");
  let env = project
    .env
    .clone()
    .with_artifacts(Arc::new(StaticArtifacts::new().with("engine", project.root().join("engine"))));

  let resolved = resolve(&env, SourceRole::Inputs, &[Source::artifact("engine")]).unwrap();

  assert_eq!(resolved.files, vec![a, b]);
}

#[test]
fn depfile_sides_follow_the_role() {
  let project = Project::new();
  std::fs::write(
    project.env.build_dir.join("kernel.d"),
    "/out/app.dill: /src/my\\ file.dart C:\\src\\main.dart\n",
  )
  .unwrap();
  let sources = [Source::depfile("kernel.d")];

  let inputs = resolve(&project.env, SourceRole::Inputs, &sources).unwrap();
  let outputs = resolve(&project.env, SourceRole::Outputs, &sources).unwrap();

  assert_eq!(
    inputs.files,
    vec![
      std::path::PathBuf::from("/src/my file.dart"),
      std::path::PathBuf::from("C:\\src\\main.dart"),
    ]
  );
  assert_eq!(outputs.files, vec![std::path::PathBuf::from("/out/app.dill")]);
  assert!(!inputs.contains_new_depfile);
}

#[test]
fn absent_depfile_is_new() {
  let project = Project::new();
  let resolved = resolve(&project.env, SourceRole::Inputs, &[Source::depfile("gen.d")]).unwrap();
  assert!(resolved.files.is_empty());
  assert!(resolved.contains_new_depfile);
}

#[test]
fn malformed_depfile_contributes_nothing() {
  let project = Project::new();
  std::fs::write(project.env.build_dir.join("bad.d"), "no separator here").unwrap();
  let resolved = resolve(&project.env, SourceRole::Inputs, &[Source::depfile("bad.d")]).unwrap();
  assert!(resolved.files.is_empty());
  assert!(!resolved.contains_new_depfile);
  assert!(Depfile::parse_str("no separator here").is_none());
}
