use crate::capability::{ImportHints, ModelImporter, SourceFile};
use crate::config::ModelImporterKind;
use kiln_core::{KilnError, Result};
use kiln_import::RawScene;

/// The Regular model importer, backed by the glTF/GLB decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfImporter;

impl ModelImporter for GltfImporter {
    fn import(
        &self,
        source: &SourceFile,
        kind: &ModelImporterKind,
        hints: ImportHints,
    ) -> Result<RawScene> {
        let unsupported = |what: &str| KilnError::ImporterFailure {
            path: source.name.clone(),
            reason: format!("{} is not supported by the glTF importer", what),
        };

        match kind {
            ModelImporterKind::Regular => {}
            ModelImporterKind::UnityModels { .. } => return Err(unsupported("UnityModels")),
            ModelImporterKind::Quixel => return Err(unsupported("Quixel")),
        }
        if hints.force_assimp {
            return Err(unsupported("force_assimp"));
        }

        let mut scene = kiln_import::import_gltf(&source.path).map_err(|e| match e {
            KilnError::ImporterFailure { reason, .. } => KilnError::ImporterFailure {
                path: source.name.clone(),
                reason,
            },
            other => other,
        })?;
        scene.name = source.stem();
        Ok(scene)
    }
}
