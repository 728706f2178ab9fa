//! `kiln cache`: maintenance of the on-disk artifact cache.

use std::error::Error;

use kiln_cache::{ArtifactCache, CacheOptions};

use crate::pipeline::resolve_project_root;
use crate::{CacheCommand, GlobalArgs};

/// Runs a `kiln cache` subcommand against the project's cache directory.
pub fn run(command: &CacheCommand, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = kiln_config::load_config(&project_dir)?;
    let dir = project_dir.join(&config.build.cache.dir);
    if !dir.is_dir() {
        if !global.quiet {
            eprintln!("   Nothing to do: no cache at {}", dir.display());
        }
        return Ok(0);
    }
    let cache = ArtifactCache::persistent(&dir, CacheOptions::default())?;

    match command {
        CacheCommand::Prune { max_entries } => {
            let pruned = cache.prune(*max_entries)?;
            let collected = cache.gc()?;
            if !global.quiet {
                eprintln!(
                    "   Pruned {pruned} artifact(s), removed {collected} unreferenced file(s); {} remain",
                    cache.disk_len()
                );
            }
        }
        CacheCommand::Clean => {
            let before = cache.disk_len();
            cache.clear()?;
            if !global.quiet {
                eprintln!("   Removed {before} artifact(s) from {}", dir.display());
            }
        }
    }
    Ok(0)
}
