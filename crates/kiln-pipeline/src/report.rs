//! Results of one pipeline run

use kiln_asset::{Artifact, ArtifactKind};
use kiln_core::KilnError;

/// A source that produced no artifacts, and why
#[derive(Debug)]
pub struct SourceFailure {
    /// Source name, or the comma-joined names of an aggregate's failed variants
    pub source: String,
    pub error: KilnError,
}

/// The artifact set of a run plus any per-source failures
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub pipeline: String,
    /// Number of sources that matched the pipeline's patterns
    pub matched: usize,
    pub artifacts: Vec<Artifact>,
    pub failures: Vec<SourceFailure>,
}

impl BuildOutput {
    pub fn new(pipeline: impl Into<String>, matched: usize) -> Self {
        Self {
            pipeline: pipeline.into(),
            matched,
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn count(&self, kind: ArtifactKind) -> usize {
        self.artifacts.iter().filter(|a| a.kind == kind).count()
    }

    /// Human readable report
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} pipeline: {} source(s) matched, {} artifact(s)\n",
            self.pipeline,
            self.matched,
            self.artifacts.len()
        );
        for kind in ArtifactKind::ALL {
            let n = self.count(kind);
            if n > 0 {
                out.push_str(&format!("  {:<10} {}\n", kind.as_str(), n));
            }
        }
        if !self.failures.is_empty() {
            out.push_str(&format!("{} failure(s):\n", self.failures.len()));
            for failure in &self.failures {
                out.push_str(&format!("  FAILED: {}: {}\n", failure.source, failure.error));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_kinds_and_failures() {
        let mut output = BuildOutput::new("Audio", 3);
        output.artifacts.push(Artifact::new(ArtifactKind::Audio, "a", "a.wav", "wav", vec![1]));
        output.artifacts.push(Artifact::new(ArtifactKind::Audio, "b", "b.wav", "wav", vec![2]));
        output.failures.push(SourceFailure {
            source: "c.wav".to_string(),
            error: KilnError::AudioTranscodeError {
                path: "c.wav".to_string(),
                reason: "truncated".to_string(),
            },
        });

        assert!(!output.is_success());
        assert_eq!(output.count(ArtifactKind::Audio), 2);
        let summary = output.summary();
        assert!(summary.contains("3 source(s) matched, 2 artifact(s)"));
        assert!(summary.contains("FAILED: c.wav"));
        assert!(!summary.contains("prefab"));
    }
}
