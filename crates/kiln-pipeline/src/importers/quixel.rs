use crate::capability::{MaterialImporter, SourceFile};
use crate::config::MaterialSpec;
use kiln_core::{KilnError, Result};

/// Material importer for builds without a Quixel decoder; every call fails
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableMaterialImporter;

impl MaterialImporter for UnavailableMaterialImporter {
    fn import(&self, source: &SourceFile) -> Result<Vec<MaterialSpec>> {
        Err(KilnError::ImporterFailure {
            path: source.name.clone(),
            reason: "Quixel material import is not available in this build".to_string(),
        })
    }
}
