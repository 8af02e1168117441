pub mod address;
pub mod backend;
pub mod directive;
pub mod state;

use std::io;
use std::path::{Path, PathBuf};

pub use address::{Address, Identity};
pub use directive::{Directive, DirectiveKind, Lifecycle};
pub use state::{StateView, TfState};

/// File extension of Terraform configuration files.
pub const CONFIG_EXTENSION: &str = "tf";

/// Regular `*.tf` files directly inside `dir`, sorted by name.
pub fn config_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(CONFIG_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.tf"), "").unwrap();
        std::fs::write(dir.path().join("a.tf"), "").unwrap();
        std::fs::write(dir.path().join("vars.tfvars"), "").unwrap();
        std::fs::write(dir.path().join("notes.tf.bak"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested.tf")).unwrap();

        let files = config_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.tf", "b.tf"]);
    }
}
