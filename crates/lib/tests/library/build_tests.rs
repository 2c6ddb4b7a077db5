use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kiln_lib::build::{BuildConfig, BuildError, BuildSystem, Target};
use kiln_lib::filestore::HashStrategy;
use kiln_lib::source::{Depfile, Source};

use super::common::{Project, concat_target};

#[test]
fn cycle_fails_before_running_anything() {
  let project = Project::new();
  let runs = Arc::new(AtomicUsize::new(0));
  let mut system = BuildSystem::new(BuildConfig::default());
  system
    .register(concat_target("a", &[], "a.txt", &runs))
    .unwrap();

  let b_runs = Arc::clone(&runs);
  system
    .register(
      Target::builder("b")
        .depends_on("c")
        .action(move |_, _| {
          b_runs.fetch_add(1, Ordering::SeqCst);
          Ok(())
        })
        .build(),
    )
    .unwrap();
  system
    .register(Target::builder("c").depends_on("a").depends_on("b").build())
    .unwrap();

  let err = system.build("b", &project.env).unwrap_err();

  assert_eq!(err.to_string(), "dependency cycle detected: b -> c -> b");
  assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_input_fails() {
  let project = Project::new();
  let runs = Arc::new(AtomicUsize::new(0));
  let mut system = BuildSystem::new(BuildConfig::default());
  system
    .register(concat_target("foo", &["{PROJECT_DIR}/lib/missing.dart"], "out.txt", &runs))
    .unwrap();

  let err = system.build("foo", &project.env).unwrap_err();

  assert!(matches!(err, BuildError::MissingInput { .. }), "got {err}");
  assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn building_twice_runs_once() {
  let project = Project::new();
  project.write("lib/a.dart", "a");
  let runs = Arc::new(AtomicUsize::new(0));
  let mut system = BuildSystem::new(BuildConfig::default());
  system
    .register(concat_target("foo", &["{PROJECT_DIR}/lib/a.dart"], "out.txt", &runs))
    .unwrap();

  system.build("foo", &project.env).unwrap();
  let summary = system.build("foo", &project.env).unwrap();

  assert_eq!(runs.load(Ordering::SeqCst), 1);
  assert_eq!(summary.skipped, vec!["foo"]);
  assert!(summary.performed.is_empty());
}

#[test]
fn changed_bytes_rerun_the_action() {
  let project = Project::new();
  project.write("lib/a.dart", "a");
  let runs = Arc::new(AtomicUsize::new(0));
  let mut system = BuildSystem::new(BuildConfig::default());
  system
    .register(concat_target("foo", &["{PROJECT_DIR}/lib/a.dart"], "out.txt", &runs))
    .unwrap();

  system.build("foo", &project.env).unwrap();
  project.write("lib/a.dart", "changed");
  system.build("foo", &project.env).unwrap();

  assert_eq!(runs.load(Ordering::SeqCst), 2);
  assert_eq!(
    std::fs::read_to_string(project.env.build_dir.join("out.txt")).unwrap(),
    "changed"
  );
}

#[test]
fn rewriting_identical_bytes_does_not_rerun() {
  let project = Project::new();
  project.write("lib/a.dart", "same");
  let runs = Arc::new(AtomicUsize::new(0));
  let mut system = BuildSystem::new(BuildConfig::default());
  system
    .register(concat_target("foo", &["{PROJECT_DIR}/lib/a.dart"], "out.txt", &runs))
    .unwrap();

  system.build("foo", &project.env).unwrap();
  project.write("lib/a.dart", "same");
  system.build("foo", &project.env).unwrap();

  assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn dependencies_build_first_and_once() {
  let project = Project::new();
  project.write("lib/a.dart", "a");
  let order = Arc::new(Mutex::new(Vec::new()));

  let foo_order = Arc::clone(&order);
  let foo = Target::builder("foo")
    .input(Source::pattern("{PROJECT_DIR}/lib/a.dart"))
    .output(Source::pattern("{BUILD_DIR}/foo.out"))
    .action(move |inputs, env| {
      foo_order.lock().unwrap().push("foo");
      std::fs::copy(&inputs[0], env.build_dir.join("foo.out"))?;
      Ok(())
    })
    .build();

  let bar_order = Arc::clone(&order);
  let bar = Target::builder("bar")
    .input(Source::pattern("{BUILD_DIR}/foo.out"))
    .output(Source::pattern("{BUILD_DIR}/bar.out"))
    .depends_on("foo")
    .action(move |inputs, env| {
      assert!(inputs[0].exists(), "foo must finish before bar starts");
      bar_order.lock().unwrap().push("bar");
      std::fs::copy(&inputs[0], env.build_dir.join("bar.out"))?;
      Ok(())
    })
    .build();

  let mut system = BuildSystem::new(BuildConfig::default());
  system.register(bar).unwrap();
  system.register(foo).unwrap();

  let summary = system.build("bar", &project.env).unwrap();

  assert_eq!(*order.lock().unwrap(), vec!["foo", "bar"]);
  assert!(project.env.build_dir.join("foo.out").exists());
  assert!(project.env.build_dir.join("bar.out").exists());
  assert_eq!(summary.output_files.len(), 2);
}

#[test]
fn glob_inputs_pick_up_new_files() {
  let project = Project::new();
  project.write("assets/a.fizz", "a");
  project.write("assets/ignored.txt", "x");
  let runs = Arc::new(AtomicUsize::new(0));
  let mut system = BuildSystem::new(BuildConfig::default());
  system
    .register(concat_target("bundle", &["{PROJECT_DIR}/assets/*.fizz"], "bundle.txt", &runs))
    .unwrap();

  let first = system.build("bundle", &project.env).unwrap();
  assert_eq!(first.input_files, vec![project.root().join("assets/a.fizz")]);

  project.write("assets/b.fizz", "b");
  system.build("bundle", &project.env).unwrap();

  assert_eq!(runs.load(Ordering::SeqCst), 2);
  assert_eq!(
    std::fs::read_to_string(project.env.build_dir.join("bundle.txt")).unwrap(),
    "ab"
  );
}

#[test]
fn timestamp_strategy_detects_touched_inputs() {
  let project = Project::new();
  let input = project.write("lib/a.dart", "a");
  let runs = Arc::new(AtomicUsize::new(0));
  let mut system = BuildSystem::new(BuildConfig {
    hash_strategy: HashStrategy::Timestamp,
  });
  system
    .register(concat_target("foo", &["{PROJECT_DIR}/lib/a.dart"], "out.txt", &runs))
    .unwrap();

  system.build("foo", &project.env).unwrap();
  system.build("foo", &project.env).unwrap();
  std::fs::File::options()
    .write(true)
    .open(&input)
    .unwrap()
    .set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(5))
    .unwrap();
  system.build("foo", &project.env).unwrap();

  assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn summary_depfile_covers_the_build() {
  let project = Project::new();
  let input = project.write("lib/a.dart", "a");
  let runs = Arc::new(AtomicUsize::new(0));
  let mut system = BuildSystem::new(BuildConfig::default());
  system
    .register(concat_target("foo", &["{PROJECT_DIR}/lib/a.dart"], "out.txt", &runs))
    .unwrap();

  let summary = system.build("foo", &project.env).unwrap();
  let depfile_path = project.root().join("build.d");
  summary.write_depfile(&depfile_path).unwrap();

  let output = project.env.build_dir.join("out.txt");
  assert_eq!(
    std::fs::read_to_string(&depfile_path).unwrap(),
    format!("{}: {}\n", output.display(), input.display())
  );
  let depfile = Depfile::parse(&depfile_path).unwrap();
  assert_eq!(depfile.inputs, vec![input]);
  assert_eq!(depfile.outputs, vec![output]);
}
