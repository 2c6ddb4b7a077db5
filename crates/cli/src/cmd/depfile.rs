//! Implementation of the `kiln depfile` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use kiln_lib::source::depfile::Depfile;

use crate::output::{print_json, print_stat, print_success, symbols};

pub fn cmd_depfile(path: &Path, json: bool) -> Result<()> {
  let depfile = Depfile::parse(path).with_context(|| format!("Failed to load {}", path.display()))?;

  if json {
    let value = serde_json::json!({
      "inputs": display_all(&depfile.inputs),
      "outputs": display_all(&depfile.outputs),
    });
    return print_json(&value);
  }

  print_success(&format!("Depfile {}", path.display()));
  print_stat("Inputs", &depfile.inputs.len().to_string());
  print_stat("Outputs", &depfile.outputs.len().to_string());

  for (label, paths) in [("Inputs", &depfile.inputs), ("Outputs", &depfile.outputs)] {
    if paths.is_empty() {
      continue;
    }
    println!();
    println!("{}:", label);
    for path in paths {
      println!("  {} {}", symbols::INFO, path.display());
    }
  }

  Ok(())
}

fn display_all(paths: &[PathBuf]) -> Vec<String> {
  paths.iter().map(|p| p.display().to_string()).collect()
}
