use std::path::PathBuf;

use clap::Parser;

use crate::schema::SceneId;
use crate::{DEFAULT_ASSET_DIR, INDEX_FILE_NAME, WEBGL_DIR};

#[derive(Debug, Clone, Parser)]
#[command(name = "shader-stage")]
#[command(about = "Shader background with timed text and image overlays")]
pub struct Config {
    /// Folder holding `index.json` and the `webgl/` shader files
    #[arg(long, default_value = DEFAULT_ASSET_DIR)]
    pub assets: PathBuf,

    /// Background scene to show first; defaults to the first index entry
    #[arg(long)]
    pub scene: Option<SceneId>,

    /// List debug-only scenes in the scene selector
    #[arg(long)]
    pub debug: bool,

    /// Reload shaders when their files change
    #[arg(long)]
    pub watch: bool,
}

impl Config {
    pub fn index_path(&self) -> PathBuf {
        self.assets.join(INDEX_FILE_NAME)
    }

    pub fn webgl_dir(&self) -> PathBuf {
        self.assets.join(WEBGL_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_flags() {
        let config = Config::parse_from(["shader-stage"]);
        assert_eq!(config.assets, PathBuf::from(DEFAULT_ASSET_DIR));
        assert_eq!(config.scene, None);
        assert!(!config.debug && !config.watch);

        let config = Config::parse_from(["shader-stage", "--assets", "/tmp/s", "--scene", "3", "--watch"]);
        assert_eq!(config.index_path(), PathBuf::from("/tmp/s/index.json"));
        assert_eq!(config.webgl_dir(), PathBuf::from("/tmp/s/webgl"));
        assert_eq!(config.scene, Some(3));
        assert!(config.watch);
    }
}
