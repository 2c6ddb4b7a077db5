use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use super::content::DevFsContent;
use super::types::CompileError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
  pub entry_point: PathBuf,
  /// Sources changed since the last compile. Empty for an initial compile.
  pub invalidated: Vec<PathBuf>,
  pub output_path: PathBuf,
  pub package_config: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOutput {
  /// The compiled artifact.
  pub output_path: PathBuf,
  pub error_count: usize,
}

/// A resident compiler that rebuilds only what changed.
pub trait IncrementalCompiler: Send + Sync {
  fn recompile(&self, request: CompileRequest) -> impl Future<Output = Result<CompilerOutput, CompileError>> + Send;
}

/// Assets shipped next to the compiled program, keyed by archive path.
pub trait AssetBundle {
  fn entries(&mut self) -> &mut HashMap<String, DevFsContent>;
}

impl AssetBundle for HashMap<String, DevFsContent> {
  fn entries(&mut self) -> &mut HashMap<String, DevFsContent> {
    self
  }
}
