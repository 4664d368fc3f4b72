//! Zip packaging of a project tree.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

use crate::application::ports::{PackageArtifact, Packager};

/// Directory names never shipped to the instance.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".venv",
    "venv",
    "__pycache__",
    ".ipynb_checkpoints",
    "node_modules",
];

/// Archive name of the requirements file; the bootstrap script looks for it
/// at the package root.
const REQUIREMENTS_ENTRY: &str = "requirements.txt";

/// Writes the project tree to a deflated zip in a temporary directory.
#[derive(Debug, Default)]
pub struct ZipPackager;

impl Packager for ZipPackager {
    fn package(&self, source_dir: &Path, requirements: Option<&Path>) -> Result<PackageArtifact> {
        let mut entries = collect_entries(source_dir)?;
        if let Some(requirements) = requirements {
            entries.retain(|(name, _)| name != REQUIREMENTS_ENTRY);
            entries.push((REQUIREMENTS_ENTRY.to_string(), requirements.to_path_buf()));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let staging = tempfile::tempdir().context("creating package staging directory")?;
        let path = staging.path().join("package.zip");
        let file =
            File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut hasher = Sha256::new();

        for (name, source) in &entries {
            let data =
                std::fs::read(source).with_context(|| format!("reading {}", source.display()))?;
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update((data.len() as u64).to_le_bytes());
            hasher.update(&data);
            zip.start_file(name.as_str(), options)
                .with_context(|| format!("adding {name} to package"))?;
            zip.write_all(&data)
                .with_context(|| format!("writing {name} to package"))?;
        }
        zip.finish().context("finishing package")?;

        tracing::debug!(files = entries.len(), path = %path.display(), "packaged project");
        Ok(PackageArtifact {
            path,
            fingerprint: format!("{:x}", hasher.finalize()),
            guard: Box::new(staging),
        })
    }
}

/// Regular files under `root` as (archive name, source path) pairs.
fn collect_entries(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !(entry.file_type().is_dir()
                && EXCLUDED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref()))
    });
    for entry in walker {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("{} is outside {}", entry.path().display(), root.display()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((name, entry.path().to_path_buf()));
    }
    Ok(entries)
}
