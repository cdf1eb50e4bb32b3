//! `kiln check`: validate a pipeline document without building

use anyhow::{Context, Result};
use kiln_pipeline::PipelineConfig;
use std::path::Path;

pub fn run(path: &str) -> Result<()> {
    let config = PipelineConfig::load(Path::new(path))
        .with_context(|| format!("{} is not a valid pipeline document", path))?;

    println!("{}", config.summary());
    println!("OK");
    Ok(())
}
