//! The small set of settings keys the core reads, read here from a TOML
//! file and handed to `hatchling_core` by value — the core itself has no
//! opinion on where configuration comes from.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct DevConfig {
    pub debug_compiler: bool,
    pub no_tiles: bool,
    pub no_object_render: bool,
    pub view_collision: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerConfig {
    pub log: bool,
    pub show_warnings: bool,
    pub write_debug_info: bool,
    pub write_source_filename: bool,
    pub optimizations: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            log: false,
            show_warnings: true,
            write_debug_info: false,
            write_source_filename: false,
            optimizations: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub dev: DevConfig,
    pub compiler: CompilerConfig,
}

pub fn load_from(path: &std::path::Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_permissive_headless_run() {
        let config = Config::default();
        assert!(!config.dev.no_tiles);
        assert!(config.compiler.optimizations);
    }

    #[test]
    fn parses_partial_toml_with_defaults_filled_in() {
        let config: Config = toml::from_str("[dev]\nnoTiles = true\n").unwrap();
        assert!(config.dev.no_tiles);
        assert!(!config.dev.debug_compiler);
        assert!(config.compiler.optimizations);
    }
}
