//! Local filesystem service
//!
//! Production implementation of [`FileSystemService`] over tokio::fs, with
//! walkdir for tree scans and glob for pattern matching. Vendored and
//! hidden trees (.git, node_modules, target, dist) are excluded from
//! scans.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use eyre::{Context, Result};
use serde_json::{Value, json};
use tracing::debug;
use walkdir::WalkDir;

use super::traits::FileSystemService;

/// Extensions recognized as source code
const CODE_EXTENSIONS: &[&str] = &[
    "rs", "js", "jsx", "ts", "tsx", "mjs", "cjs", "py", "go", "java", "rb", "c", "cc", "cpp", "h",
    "hpp", "cs", "php", "swift", "kt", "scala", "sh",
];

/// Directory names skipped during tree scans
const SKIP_DIRS: &[&str] = &["node_modules", "target", "dist", "build", "vendor", "__pycache__"];

/// Manifest files checked for dependency info
const MANIFESTS: &[&str] = &["package.json", "Cargo.toml", "requirements.txt", "go.mod"];

/// Configuration file names recognized at the project root
const CONFIG_FILES: &[&str] = &[
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "requirements.txt",
    "go.mod",
    "Makefile",
    "Dockerfile",
    "docker-compose.yml",
    ".env",
    "tsconfig.json",
];

/// Filesystem service over the local disk
#[derive(Debug, Default, Clone)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }

    fn skip_entry(entry: &walkdir::DirEntry) -> bool {
        // The walk root is always entered, whatever its name
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            return name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref());
        }
        false
    }
}

#[async_trait]
impl FileSystemService for LocalFileSystem {
    async fn read_file(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .context(format!("Failed to read {}", path.display()))
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content)
            .await
            .context(format!("Failed to write {}", path.display()))
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn find_files_by_pattern(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
        let full_pattern = root.join(pattern).to_string_lossy().to_string();
        let mut files: Vec<PathBuf> = glob::glob(&full_pattern)
            .context(format!("Invalid glob pattern: {}", pattern))?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        Ok(files)
    }

    async fn get_all_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| !Self::skip_entry(entry))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        Ok(files)
    }

    async fn project_structure(&self, root: &Path) -> Result<Value> {
        let files = self.get_all_files(root).await?;

        let mut by_extension: BTreeMap<String, u64> = BTreeMap::new();
        for file in &files {
            let ext = file
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_else(|| "(none)".to_string());
            *by_extension.entry(ext).or_insert(0) += 1;
        }

        let mut top_level: Vec<String> = Vec::new();
        let mut entries = tokio::fs::read_dir(root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with('.') {
                top_level.push(name);
            }
        }
        top_level.sort();

        let code_files = files.iter().filter(|f| self.is_code_file(f)).count();

        Ok(json!({
            "root": root.display().to_string(),
            "total_files": files.len(),
            "code_files": code_files,
            "by_extension": by_extension,
            "top_level": top_level,
        }))
    }

    async fn dependency_info(&self, root: &Path) -> Result<Value> {
        let mut manifests: Vec<String> = Vec::new();
        let mut dependencies: Vec<Value> = Vec::new();

        for manifest in MANIFESTS {
            let path = root.join(manifest);
            if !self.exists(&path).await {
                continue;
            }
            manifests.push(manifest.to_string());

            match *manifest {
                "package.json" => {
                    let content = self.read_file(&path).await?;
                    if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
                        for section in ["dependencies", "devDependencies"] {
                            if let Some(deps) = parsed.get(section).and_then(|d| d.as_object()) {
                                for (name, version) in deps {
                                    dependencies.push(json!({
                                        "name": name,
                                        "version": version,
                                        "source": manifest,
                                    }));
                                }
                            }
                        }
                    }
                }
                "Cargo.toml" => {
                    let content = self.read_file(&path).await?;
                    for (name, version) in parse_cargo_dependencies(&content) {
                        dependencies.push(json!({
                            "name": name,
                            "version": version,
                            "source": manifest,
                        }));
                    }
                }
                "requirements.txt" => {
                    let content = self.read_file(&path).await?;
                    for line in content.lines() {
                        let line = line.trim();
                        if line.is_empty() || line.starts_with('#') {
                            continue;
                        }
                        let name = line
                            .split(['=', '<', '>', '~', '!', ';', ' '])
                            .next()
                            .unwrap_or(line);
                        dependencies.push(json!({
                            "name": name,
                            "version": line,
                            "source": manifest,
                        }));
                    }
                }
                _ => {}
            }
        }

        debug!(manifest_count = manifests.len(), dependency_count = dependencies.len(), "dependency_info");
        Ok(json!({
            "manifests": manifests,
            "dependencies": dependencies,
        }))
    }

    async fn project_metrics(&self, root: &Path) -> Result<Value> {
        let files = self.get_all_files(root).await?;

        let mut total_bytes: u64 = 0;
        let mut code_lines: u64 = 0;
        let mut code_files: u64 = 0;
        for file in &files {
            if let Ok(meta) = tokio::fs::metadata(file).await {
                total_bytes += meta.len();
            }
            if self.is_code_file(file) {
                code_files += 1;
                if let Ok(content) = tokio::fs::read_to_string(file).await {
                    code_lines += content.lines().count() as u64;
                }
            }
        }

        Ok(json!({
            "total_files": files.len(),
            "code_files": code_files,
            "code_lines": code_lines,
            "total_bytes": total_bytes,
        }))
    }

    async fn configuration_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for name in CONFIG_FILES {
            let path = root.join(name);
            if self.exists(&path).await {
                found.push(path);
            }
        }
        Ok(found)
    }

    fn is_code_file(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                CODE_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    async fn create_backup(&self, path: &Path) -> Result<PathBuf> {
        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        let backup = path.with_file_name(format!("{}.{}.bak", file_name, stamp));

        tokio::fs::copy(path, &backup)
            .await
            .context(format!("Failed to back up {}", path.display()))?;
        debug!(source = %path.display(), backup = %backup.display(), "Created backup");
        Ok(backup)
    }
}

/// Crude line-based scan of `[dependencies]` sections in a Cargo manifest
fn parse_cargo_dependencies(content: &str) -> Vec<(String, String)> {
    let mut deps = Vec::new();
    let mut in_deps = false;

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_deps = line == "[dependencies]" || line == "[dev-dependencies]";
            continue;
        }
        if !in_deps || line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, rest)) = line.split_once('=') {
            deps.push((name.trim().to_string(), rest.trim().trim_matches('"').to_string()));
        }
    }
    deps
}
