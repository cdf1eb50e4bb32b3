//! `kiln list`: show artifacts recorded in a content store

use anyhow::{anyhow, Result};
use kiln_asset::{AssetCatalog, AssetMeta, ArtifactKind};
use std::path::Path;

pub struct ListArgs {
    pub store: Option<String>,
    pub tag: Option<String>,
    pub kind: Option<String>,
    pub format: String,
}

pub fn run(args: ListArgs) -> Result<()> {
    let project = Path::new(".");
    let settings = super::load_settings(project)?;
    let store_dir = super::store_dir(args.store.as_deref(), project, &settings);

    let kind = args
        .kind
        .as_deref()
        .map(|k| ArtifactKind::parse(k).ok_or_else(|| anyhow!("unknown artifact kind '{}'", k)))
        .transpose()?;

    let catalog = AssetCatalog::load_from_directory(&store_dir)?;
    if catalog.is_empty() {
        println!("No artifacts found in {}", store_dir.display());
        return Ok(());
    }

    let mut assets: Vec<&AssetMeta> = catalog
        .iter()
        .filter(|a| kind.map_or(true, |k| a.kind == k))
        .filter(|a| args.tag.as_ref().map_or(true, |t| a.tags.contains(t)))
        .collect();
    assets.sort_by(|a, b| (a.kind, &a.name).cmp(&(b.kind, &b.name)));

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&assets)?);
    } else {
        println!("{} artifact(s):\n", assets.len());
        for asset in &assets {
            print!("  {:<10} {} {}", asset.kind.as_str(), asset.name, asset.url);
            if !asset.tags.is_empty() {
                print!(" [{}]", asset.tags.join(", "));
            }
            println!();
        }
    }

    Ok(())
}
