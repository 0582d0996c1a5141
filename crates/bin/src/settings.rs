//! Headless configuration: `headless.toml` plus environment overrides.

use std::path::Path;

use anyhow::{Context, bail};
use client::Config;
use protocol::ChunkCoord;
use tracing::info;

/// Directory base URL override.
pub const DIRECTORY_VAR: &str = "CHUNKMAN_DIRECTORY";
/// Spawn chunk override, `x,y`.
pub const SPAWN_VAR: &str = "CHUNKMAN_SPAWN";

/// Load configuration from `path`, writing the defaults there first if the
/// file does not exist.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Config::from_toml_str(&contents).with_context(|| format!("parsing {}", path.display()))?
    } else {
        info!("No {} found, creating default config", path.display());
        let default_config = Config::default();
        std::fs::write(path, default_config.to_toml_string())?;
        default_config
    };
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

fn apply_env(config: &mut Config, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
    if let Some(url) = var(DIRECTORY_VAR) {
        config.network.directory_url = url;
    }
    if let Some(spawn) = var(SPAWN_VAR) {
        config.world.spawn_chunk = parse_chunk(&spawn)?;
    }
    Ok(())
}

fn parse_chunk(text: &str) -> anyhow::Result<ChunkCoord> {
    let Some((x, y)) = text.split_once(',') else {
        bail!("{} must look like `x,y`, got {:?}", SPAWN_VAR, text);
    };
    let x = x.trim().parse().with_context(|| format!("bad x in {:?}", text))?;
    let y = y.trim().parse().with_context(|| format!("bad y in {:?}", text))?;
    Ok(ChunkCoord::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_directory_and_spawn() {
        let mut config = Config::default();
        apply_env(&mut config, |key| match key {
            DIRECTORY_VAR => Some("http://dir:9".into()),
            SPAWN_VAR => Some(" 2, 3".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.network.directory_url, "http://dir:9");
        assert_eq!(config.world.spawn_chunk, ChunkCoord::new(2, 3));
    }

    #[test]
    fn malformed_spawn_is_rejected() {
        assert!(parse_chunk("2").is_err());
        assert!(parse_chunk("a,1").is_err());
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let path = std::env::temp_dir().join(format!("chunkman-headless-{}.toml", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let config = load(&path).unwrap();
        assert!(path.exists());
        let reread = load(&path).unwrap();
        assert_eq!(reread.world.tile_size, config.world.tile_size);
        assert_eq!(reread.motion.speed, config.motion.speed);

        std::fs::remove_file(&path).unwrap();
    }
}
