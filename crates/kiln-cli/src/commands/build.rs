//! `kiln build`: run a pipeline directory and persist its artifacts

use anyhow::{bail, Context, Result};
use kiln_asset::{AssetResolver, ContentStore};
use kiln_pipeline::{
    persist, Collaborators, Dispatcher, GltfImporter, PipelineConfig, PngTextureEncoder,
    ResolverTextureSource, SourceFile, UnavailableMaterialImporter, WavTranscoder, PIPELINE_FILE,
};
use std::fs;
use std::path::Path;

pub struct BuildArgs {
    pub dir: String,
    pub store: Option<String>,
    pub jobs: Option<usize>,
}

pub fn run(args: BuildArgs) -> Result<()> {
    let dir = Path::new(&args.dir);
    let config_path = dir.join(PIPELINE_FILE);
    let config = PipelineConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let mut settings = super::load_settings(dir)?;
    if let Some(jobs) = args.jobs {
        settings.workers = jobs.max(1);
    }
    let store_dir = super::store_dir(args.store.as_deref(), dir, &settings);

    let sources = scan_sources(dir, &store_dir)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;
    tracing::debug!(count = sources.len(), "scanned sources");

    println!("Building {}", dir.display());
    println!("{}", config.summary());
    println!(
        "{} file(s) found, {} worker(s), store {}\n",
        sources.len(),
        settings.workers,
        store_dir.display()
    );

    let textures = ResolverTextureSource::new(
        AssetResolver::new(dir, settings.missing_assets).with_store(ContentStore::new(&store_dir)),
    );
    let collaborators = Collaborators {
        models: &GltfImporter,
        materials: &UnavailableMaterialImporter,
        audio: &WavTranscoder,
        textures: &textures,
        compressor: &PngTextureEncoder,
    };

    let dispatcher = Dispatcher::new(collaborators).with_workers(settings.workers);
    let output = dispatcher.run(&config, &sources)?;

    let store = ContentStore::new(&store_dir);
    let urls = persist(&output, &store, dispatcher.cancel_token())?;

    print!("{}", output.summary());
    println!("Stored {} artifact(s) in {}", urls.len(), store_dir.display());

    if !output.is_success() {
        bail!("{} source(s) failed", output.failures.len());
    }
    Ok(())
}

/// Every candidate source under `root`, sorted by relative name.
///
/// Skips hidden entries, the store directory, the pipeline document and
/// metadata sidecars.
fn scan_sources(root: &Path, store_dir: &Path) -> Result<Vec<SourceFile>> {
    let mut found = Vec::new();
    walk(root, root, store_dir, &mut found)?;
    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

fn walk(root: &Path, dir: &Path, store_dir: &Path, found: &mut Vec<SourceFile>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if file_name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            if path != store_dir {
                walk(root, &path, store_dir, found)?;
            }
            continue;
        }
        if file_name == PIPELINE_FILE || file_name.ends_with(".asset.toml") {
            continue;
        }

        let relative = path.strip_prefix(root)?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        found.push(SourceFile::new(name, path.clone()));
    }
    Ok(())
}
