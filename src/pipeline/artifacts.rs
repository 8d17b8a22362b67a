//! Generation storage on disk
//!
//! A generation is written to a staging directory, renamed into
//! `generations/<id>` in one step and then published by rewriting `CURRENT`.
//! Readers resolve `CURRENT` once and never see a half-written generation.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::{FittedRegressor, Hyperparameters, RegressorFamily};
use crate::pipeline::cluster::ClusterModel;
use crate::pipeline::missing::MissingValueLayout;
use crate::pipeline::scaler::StandardScaler;
use crate::pipeline::selection::DropList;
use crate::report::TrainingReport;

const CURRENT_FILE: &str = "CURRENT";
const GENERATIONS_DIR: &str = "generations";
const STAGING_PREFIX: &str = ".staging-";
const MANIFEST_FILE: &str = "manifest.json";
const REPORT_FILE: &str = "report.json";
const MISSING_FILE: &str = "missing.json";
const DROP_LIST_FILE: &str = "drop_list.json";
const SCALER_FILE: &str = "scaler.json";
const CLUSTER_FILE: &str = "cluster_model.json";
const MODELS_DIR: &str = "models";

/// Winning regressor for one (target, cluster)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRegistryEntry {
    pub target: String,
    pub cluster: usize,
    pub family: RegressorFamily,
    pub hyperparameters: Hyperparameters,
    pub model: FittedRegressor,
    /// `None` when the score was not finite
    pub cv_score: Option<f64>,
    pub test_score: Option<f64>,
}

/// Everything needed to serve one target
#[derive(Debug, Clone)]
pub struct TargetArtifacts {
    pub target: String,
    pub missing: MissingValueLayout,
    pub drop_list: DropList,
    pub scaler: StandardScaler,
    pub cluster_model: ClusterModel,
    pub models: BTreeMap<usize, ModelRegistryEntry>,
}

/// Generation metadata written as `manifest.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationManifest {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    pub config: PipelineConfig,
    pub targets: Vec<String>,
}

/// An immutable set of per-target artifacts
#[derive(Debug, Clone)]
pub struct Generation {
    pub manifest: GenerationManifest,
    pub targets: Vec<TargetArtifacts>,
}

impl Generation {
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn target(&self, name: &str) -> Option<&TargetArtifacts> {
        self.targets.iter().find(|t| t.target == name)
    }
}

/// Listing entry for `generations`
#[derive(Debug, Clone, Serialize)]
pub struct GenerationInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub targets: Vec<String>,
    pub is_current: bool,
}

/// Artifact root directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generations_dir(&self) -> PathBuf {
        self.root.join(GENERATIONS_DIR)
    }

    fn generation_dir(&self, id: &str) -> PathBuf {
        self.generations_dir().join(id)
    }

    /// A fresh generation id: UTC timestamp plus a sequence number
    pub fn allocate_id(&self) -> String {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S").to_string();
        let mut seq = 1;
        loop {
            let id = format!("{}-{:02}", stamp, seq);
            if !self.generation_dir(&id).exists() {
                return id;
            }
            seq += 1;
        }
    }

    /// Write the generation and make it current.
    ///
    /// Leftover staging directories from interrupted commits are removed first.
    pub fn commit(&self, generation: &Generation, report: &TrainingReport) -> Result<String> {
        let id = generation.id().to_string();
        let generations = self.generations_dir();
        fs::create_dir_all(&generations)?;
        self.remove_stale_staging()?;

        let final_dir = self.generation_dir(&id);
        if final_dir.exists() {
            return Err(PipelineError::Artifact(format!(
                "Generation '{}' already exists",
                id
            )));
        }

        let staging = generations.join(format!("{}{}", STAGING_PREFIX, id));
        fs::create_dir_all(&staging)?;
        write_json(&staging.join(MANIFEST_FILE), &generation.manifest)?;
        write_json(&staging.join(REPORT_FILE), report)?;

        for artifacts in &generation.targets {
            let dir = staging.join(&artifacts.target);
            let models_dir = dir.join(MODELS_DIR);
            fs::create_dir_all(&models_dir)?;
            write_json(&dir.join(MISSING_FILE), &artifacts.missing)?;
            write_json(&dir.join(DROP_LIST_FILE), &artifacts.drop_list)?;
            write_json(&dir.join(SCALER_FILE), &artifacts.scaler)?;
            write_json(&dir.join(CLUSTER_FILE), &artifacts.cluster_model)?;
            for (cluster, entry) in &artifacts.models {
                write_json(&models_dir.join(format!("cluster_{}.json", cluster)), entry)?;
            }
        }

        fs::rename(&staging, &final_dir)?;
        self.set_current(&id)?;

        tracing::info!(generation = %id, root = %self.root.display(), "generation committed");
        Ok(id)
    }

    fn remove_stale_staging(&self) -> Result<()> {
        for entry in fs::read_dir(self.generations_dir())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(STAGING_PREFIX) {
                tracing::warn!(directory = %name, "removing stale staging directory");
                fs::remove_dir_all(entry.path())?;
            }
        }
        Ok(())
    }

    /// Replace `CURRENT` through a temp file and rename
    fn set_current(&self, id: &str) -> Result<()> {
        let tmp = self.root.join(format!("{}.tmp", CURRENT_FILE));
        fs::write(&tmp, id)?;
        fs::rename(&tmp, self.root.join(CURRENT_FILE))?;
        Ok(())
    }

    /// Id of the live generation, if any generation was ever committed
    pub fn current_id(&self) -> Result<Option<String>> {
        let path = self.root.join(CURRENT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let id = fs::read_to_string(path)?.trim().to_string();
        Ok((!id.is_empty()).then_some(id))
    }

    pub fn load_current(&self) -> Result<Generation> {
        let id = self.current_id()?.ok_or_else(|| {
            PipelineError::Artifact(format!(
                "No current generation under {}",
                self.root.display()
            ))
        })?;
        self.load(&id)
    }

    pub fn load(&self, id: &str) -> Result<Generation> {
        let dir = self.generation_dir(id);
        if !dir.is_dir() {
            return Err(PipelineError::Artifact(format!(
                "Generation '{}' not found under {}",
                id,
                self.root.display()
            )));
        }

        let manifest: GenerationManifest = read_json(&dir.join(MANIFEST_FILE))?;
        let mut targets = Vec::with_capacity(manifest.targets.len());
        for target in &manifest.targets {
            let target_dir = dir.join(target);
            let mut models = BTreeMap::new();
            let models_dir = target_dir.join(MODELS_DIR);
            if models_dir.is_dir() {
                for entry in fs::read_dir(&models_dir)? {
                    let path = entry?.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("json") {
                        continue;
                    }
                    let registry: ModelRegistryEntry = read_json(&path)?;
                    models.insert(registry.cluster, registry);
                }
            }

            targets.push(TargetArtifacts {
                target: target.clone(),
                missing: read_json(&target_dir.join(MISSING_FILE))?,
                drop_list: read_json(&target_dir.join(DROP_LIST_FILE))?,
                scaler: read_json(&target_dir.join(SCALER_FILE))?,
                cluster_model: read_json(&target_dir.join(CLUSTER_FILE))?,
                models,
            });
        }

        tracing::debug!(generation = %id, targets = targets.len(), "generation loaded");
        Ok(Generation { manifest, targets })
    }

    /// Committed generations, oldest first
    pub fn list_generations(&self) -> Result<Vec<GenerationInfo>> {
        let dir = self.generations_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let current = self.current_id()?;

        let mut infos = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            let manifest: GenerationManifest = read_json(&entry.path().join(MANIFEST_FILE))?;
            infos.push(GenerationInfo {
                is_current: current.as_deref() == Some(manifest.id.as_str()),
                id: manifest.id,
                created_at: manifest.created_at,
                targets: manifest.targets,
            });
        }
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(infos)
    }

    /// Bundle one generation (the current one by default) into a zip archive
    pub fn export_zip(&self, id: Option<&str>, zip_path: &Path) -> Result<String> {
        use zip::write::SimpleFileOptions;
        use zip::ZipWriter;

        let id = match id {
            Some(id) => id.to_string(),
            None => self.current_id()?.ok_or_else(|| {
                PipelineError::Artifact("No current generation to export".to_string())
            })?,
        };
        let dir = self.generation_dir(&id);
        if !dir.is_dir() {
            return Err(PipelineError::Artifact(format!("Generation '{}' not found", id)));
        }

        let mut files = Vec::new();
        collect_files(&dir, &mut files)?;
        files.sort();

        let zip_file = fs::File::create(zip_path)?;
        let mut zip = ZipWriter::new(zip_file);
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for path in &files {
            let relative = path
                .strip_prefix(&dir)
                .map_err(|e| PipelineError::Artifact(e.to_string()))?;
            let name = format!(
                "{}/{}",
                id,
                relative.to_string_lossy().replace('\\', "/")
            );
            zip.start_file(name.as_str(), options)
                .map_err(|e| PipelineError::Artifact(format!("Failed to add {} to zip: {}", name, e)))?;
            let mut content = Vec::new();
            fs::File::open(path)?.read_to_end(&mut content)?;
            zip.write_all(&content)?;
        }

        zip.finish()
            .map_err(|e| PipelineError::Artifact(format!("Failed to finalize zip file: {}", e)))?;

        tracing::info!(generation = %id, files = files.len(), path = %zip_path.display(), "generation exported");
        Ok(id)
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        PipelineError::Artifact(format!("Failed to read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Non-finite scores are stored as `None` since JSON has no NaN
pub fn finite(score: f64) -> Option<f64> {
    score.is_finite().then_some(score)
}
