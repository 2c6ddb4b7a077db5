use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use kiln_lib::build::Target;
use kiln_lib::environment::{BuildMode, Environment, TargetPlatform};
use kiln_lib::source::Source;
use tempfile::TempDir;

/// A throwaway project directory with an environment rooted in it.
pub struct Project {
  pub temp: TempDir,
  pub env: Environment,
}

impl Project {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let env = Environment::new(temp.path(), BuildMode::Debug, TargetPlatform::Tester);
    std::fs::create_dir_all(&env.build_dir).unwrap();
    Self { temp, env }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn write(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
  }
}

/// Target concatenating its inputs into `{BUILD_DIR}/<output>`, counting runs.
pub fn concat_target(name: &str, inputs: &[&str], output: &str, runs: &Arc<AtomicUsize>) -> Target {
  let runs = Arc::clone(runs);
  let output_name = output.to_string();
  let builder = inputs
    .iter()
    .fold(Target::builder(name), |builder, input| builder.input(Source::pattern(*input)));

  builder
    .output(Source::pattern(format!("{{BUILD_DIR}}/{output}")))
    .action(move |inputs, env| {
      runs.fetch_add(1, Ordering::SeqCst);
      let mut content = String::new();
      for input in inputs {
        content.push_str(&std::fs::read_to_string(input)?);
      }
      std::fs::write(env.build_dir.join(&output_name), content)?;
      Ok(())
    })
    .build()
}
