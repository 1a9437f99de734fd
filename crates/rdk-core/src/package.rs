//! Packager: zip a rule directory and upload it as `<rule>.zip`.

use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::Config;
use crate::error::{RdkError, Result};
use crate::paths;
use crate::provider::CloudProvider;
use crate::rule::RuleProject;

/// Where an uploaded artifact landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub bucket: String,
    pub key: String,
}

/// Zip every file under `dir`. The archive is written to a temporary file
/// outside `dir` and removed when the returned path is dropped.
pub fn build_archive(dir: &Path) -> Result<TempPath> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let tmp = tempfile::Builder::new().suffix(".zip").tempfile()?;
    let (file, path) = tmp.into_parts();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in &files {
        let rel = file
            .strip_prefix(dir)
            .map_err(|e| RdkError::Archive(e.to_string()))?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options)
            .map_err(|e| RdkError::Archive(e.to_string()))?;
        std::io::copy(&mut File::open(file)?, &mut zip)?;
    }
    zip.finish().map_err(|e| RdkError::Archive(e.to_string()))?;

    tracing::debug!(dir = %dir.display(), entries = files.len(), "built archive");
    Ok(path)
}

/// Symlinked files are archived with their target's contents. Symlinked
/// directories are not descended into.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let linked = entry.file_type()?.is_symlink();
        let meta = std::fs::metadata(&path)
            .map_err(|e| RdkError::Archive(format!("{}: {e}", path.display())))?;
        if meta.is_dir() {
            if linked {
                tracing::debug!(path = %path.display(), "skipping symlinked directory");
            } else {
                collect_files(&path, out)?;
            }
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Build a fresh archive of the rule and upload it over whatever is stored.
/// Any failure is reported as a deployment failure of this rule only.
pub fn package_rule(
    provider: &dyn CloudProvider,
    config: &Config,
    root: &Path,
    project: &RuleProject,
    account_id: &str,
) -> Result<ArtifactLocation> {
    let rule = project.name();
    let location = ArtifactLocation {
        bucket: config.code_bucket(account_id),
        key: paths::artifact_key(rule),
    };
    if location.bucket != project.code_bucket {
        tracing::warn!(
            rule,
            stored = %project.code_bucket,
            using = %location.bucket,
            "parameters.json names a different code bucket"
        );
    }

    let archive = build_archive(&project.dir(root)).map_err(|e| RdkError::Deployment {
        rule: rule.to_string(),
        reason: format!("packaging failed: {e}"),
    })?;

    tracing::info!(rule, bucket = %location.bucket, key = %location.key, "uploading artifact");
    provider
        .put_object(&location.bucket, &location.key, &archive)
        .map_err(|e| RdkError::Deployment {
            rule: rule.to_string(),
            reason: format!("upload failed: {e}"),
        })?;

    Ok(location)
}
