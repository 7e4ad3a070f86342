//! On-disk model store
//!
//! An explicit capability over `<models_root>/`: trainers, predictors and
//! the retrain controller all receive a `ModelStore` instead of touching a
//! global directory, which keeps tests hermetic (temp root per test).
//!
//! Publication is atomic from a reader's perspective: artifact and sidecar
//! are written to `.tmp` siblings and renamed into place, sidecar last.
//! Readers open the sidecar first, so they always observe a coherent
//! (artifact, sidecar) pair.

use std::fs;
use std::path::{Path, PathBuf};

use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info};

use renta_common::{CityKey, ErrorCode, PropertyId, RentaError, Result};
use renta_ml::GradientBoostingRegressor;

use crate::artifact::{decode_model, encode_model, ArtifactFormat, Sidecar};

const BACKUP_DIR: &str = "backups";
const BACKUP_TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// A saved copy of a live model, produced before retraining.
#[derive(Debug, Clone)]
pub struct ModelBackup {
    /// Backed-up artifact file
    pub artifact: PathBuf,
    /// Backed-up sidecar file
    pub sidecar: PathBuf,
    /// Format of the backed-up artifact
    pub format: ArtifactFormat,
}

/// Directory-backed store for model artifacts.
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    /// Open (and create if needed) a model store at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The store's root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File stem for a property's demand model
    pub fn demand_stem(property: &PropertyId) -> String {
        format!("demand_model_{}", property.slug())
    }

    /// File stem for a city's market-demand model
    pub fn market_stem(key: &CityKey) -> String {
        format!("market_demand_model_{}", key.slug())
    }

    /// Path of the artifact file for a stem and format
    pub fn artifact_path(&self, stem: &str, format: ArtifactFormat) -> PathBuf {
        self.root.join(format!("{}.{}", stem, format.extension()))
    }

    /// Path of the sidecar file for a stem
    pub fn sidecar_path(&self, stem: &str) -> PathBuf {
        self.root.join(format!("{}.meta.json", stem))
    }

    /// Whether a live model exists for the stem
    pub fn exists(&self, stem: &str) -> bool {
        self.sidecar_path(stem).exists()
    }

    /// Read the sidecar for a stem.
    ///
    /// A missing sidecar means no live model ([`ErrorCode::ModelNotFound`]).
    pub fn sidecar(&self, stem: &str) -> Result<Sidecar> {
        let path = self.sidecar_path(stem);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RentaError::model_not_found(stem));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            RentaError::new(
                ErrorCode::ArtifactCorrupt,
                format!("sidecar {} is unreadable: {}", path.display(), e),
            )
        })
    }

    /// Persist a model and its sidecar, atomically.
    ///
    /// The sidecar's `format` field is overwritten with the format that the
    /// encoder actually produced. Any stale artifact in the other format is
    /// removed after publication so exactly one live artifact remains.
    pub fn save(
        &self,
        stem: &str,
        model: &GradientBoostingRegressor,
        mut sidecar: Sidecar,
    ) -> Result<Sidecar> {
        let (bytes, format) = encode_model(model)?;
        sidecar.format = format;

        let artifact_path = self.artifact_path(stem, format);
        write_atomic(&artifact_path, &bytes)?;

        let sidecar_bytes = serde_json::to_vec_pretty(&sidecar).map_err(|e| {
            RentaError::new(
                ErrorCode::SerializationFailed,
                format!("sidecar encoding failed: {}", e),
            )
        })?;
        write_atomic(&self.sidecar_path(stem), &sidecar_bytes)?;

        // Drop the other-format leftover from a previous fallback save
        let other = match format {
            ArtifactFormat::Json => self.artifact_path(stem, ArtifactFormat::Rkyv),
            ArtifactFormat::Rkyv => self.artifact_path(stem, ArtifactFormat::Json),
        };
        if other.exists() {
            let _ = fs::remove_file(&other);
        }

        info!(
            stem = stem,
            format = format.as_str(),
            path = %artifact_path.display(),
            "model artifact published"
        );

        Ok(sidecar)
    }

    /// Load a model and its sidecar for a stem.
    ///
    /// The sidecar decides the artifact format; a sidecar without its
    /// artifact is a torn pair and surfaces as corruption, not absence.
    pub fn load(&self, stem: &str) -> Result<(GradientBoostingRegressor, Sidecar)> {
        let sidecar = self.sidecar(stem)?;
        let artifact_path = self.artifact_path(stem, sidecar.format);
        let bytes = match fs::read(&artifact_path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RentaError::new(
                    ErrorCode::ArtifactCorrupt,
                    format!(
                        "sidecar present but artifact {} missing",
                        artifact_path.display()
                    ),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        let model = decode_model(&bytes, sidecar.format)?;
        Ok((model, sidecar))
    }

    /// Snapshot the live model for a stem into `backups/`.
    ///
    /// Returns `None` when there is nothing to back up (first training).
    pub fn backup(&self, stem: &str) -> Result<Option<ModelBackup>> {
        if !self.exists(stem) {
            return Ok(None);
        }
        let sidecar = self.sidecar(stem)?;
        let live_artifact = self.artifact_path(stem, sidecar.format);
        if !live_artifact.exists() {
            return Ok(None);
        }

        let backup_dir = self.root.join(BACKUP_DIR);
        fs::create_dir_all(&backup_dir)?;

        let timestamp = OffsetDateTime::now_utc()
            .format(BACKUP_TIMESTAMP)
            .unwrap_or_else(|_| "00000000_000000".into());

        let artifact_backup = backup_dir.join(format!(
            "{}_{}.{}",
            stem,
            timestamp,
            sidecar.format.extension()
        ));
        let sidecar_backup = backup_dir.join(format!("{}_{}.meta.json", stem, timestamp));

        fs::copy(&live_artifact, &artifact_backup)?;
        fs::copy(self.sidecar_path(stem), &sidecar_backup)?;

        debug!(stem = stem, backup = %artifact_backup.display(), "incumbent model backed up");

        Ok(Some(ModelBackup {
            artifact: artifact_backup,
            sidecar: sidecar_backup,
            format: sidecar.format,
        }))
    }

    /// Restore a backed-up model as the live one for a stem, atomically.
    pub fn restore(&self, stem: &str, backup: &ModelBackup) -> Result<()> {
        let artifact_bytes = fs::read(&backup.artifact)?;
        let sidecar_bytes = fs::read(&backup.sidecar)?;

        write_atomic(&self.artifact_path(stem, backup.format), &artifact_bytes)?;
        write_atomic(&self.sidecar_path(stem), &sidecar_bytes)?;

        // The rolled-back candidate may have used the other format
        let other = match backup.format {
            ArtifactFormat::Json => self.artifact_path(stem, ArtifactFormat::Rkyv),
            ArtifactFormat::Rkyv => self.artifact_path(stem, ArtifactFormat::Json),
        };
        if other.exists() {
            let _ = fs::remove_file(&other);
        }

        info!(stem = stem, "incumbent model restored from backup");
        Ok(())
    }
}

/// Write bytes to `path` via a `.tmp` sibling and rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension(match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.tmp", ext),
        None => "tmp".into(),
    });
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use renta_ml::{BoostingParams, Matrix};

    fn tiny_model(seed: u64) -> GradientBoostingRegressor {
        let x = Matrix::from_rows((1..=10).map(|i| vec![i as f32]).collect());
        let y = Matrix::column(&(1..=10).map(|i| (i * 2) as f32).collect::<Vec<_>>());
        let mut gbr = GradientBoostingRegressor::new(BoostingParams {
            n_estimators: 5,
            seed,
            ..BoostingParams::default()
        });
        gbr.fit(&x, &y).unwrap();
        gbr
    }

    fn sidecar_for(id: &str) -> Sidecar {
        Sidecar::for_property(
            &PropertyId::new(id),
            vec!["price".into()],
            ModelConfig::default(),
        )
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        let stem = ModelStore::demand_stem(&PropertyId::new("p1"));

        let model = tiny_model(1);
        let saved = store.save(&stem, &model, sidecar_for("p1")).unwrap();
        assert_eq!(saved.format, ArtifactFormat::Json);

        let (loaded, sidecar) = store.load(&stem).unwrap();
        assert_eq!(sidecar.property_id.as_deref(), Some("p1"));
        assert_eq!(loaded.predict_row(&[3.0]), model.predict_row(&[3.0]));
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        let err = store.load("demand_model_ghost").unwrap_err();
        assert_eq!(err.code, ErrorCode::ModelNotFound);
    }

    #[test]
    fn test_torn_pair_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        let stem = "demand_model_p1";
        store.save(stem, &tiny_model(1), sidecar_for("p1")).unwrap();

        fs::remove_file(store.artifact_path(stem, ArtifactFormat::Json)).unwrap();
        let err = store.load(stem).unwrap_err();
        assert_eq!(err.code, ErrorCode::ArtifactCorrupt);
    }

    #[test]
    fn test_backup_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        let stem = "demand_model_p1";

        let incumbent = tiny_model(1);
        store.save(stem, &incumbent, sidecar_for("p1")).unwrap();

        let backup = store.backup(stem).unwrap().expect("live model to back up");
        assert!(backup.artifact.exists());
        assert!(backup.sidecar.exists());

        // A candidate replaces the live artifact
        let candidate = tiny_model(99);
        store.save(stem, &candidate, sidecar_for("p1")).unwrap();
        let (live, _) = store.load(stem).unwrap();
        assert_eq!(live.predict_row(&[3.0]), candidate.predict_row(&[3.0]));

        // Rollback brings the incumbent back
        store.restore(stem, &backup).unwrap();
        let (live, _) = store.load(stem).unwrap();
        assert_eq!(live.predict_row(&[3.0]), incumbent.predict_row(&[3.0]));
    }

    #[test]
    fn test_backup_of_absent_model_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        assert!(store.backup("demand_model_ghost").unwrap().is_none());
    }

    #[test]
    fn test_market_stem_naming() {
        let stem = ModelStore::market_stem(&CityKey::new("France", "Le Mans"));
        assert_eq!(stem, "market_demand_model_france_le_mans");
    }
}
