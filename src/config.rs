use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "LABELSMITH";
pub const CONFIG_PATH_ENV: &str = "LABELSMITH_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub permissive_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            permissive_cors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./local.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub icons_dir: PathBuf,
    pub default_sheet: String,
    pub default_dpi: u32,
    pub preview_dpi: u32,
    pub default_padding_mm: f32,
    pub max_batch_items: usize,
    pub max_missing_items: usize,
    pub warnings_header_limit: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            icons_dir: PathBuf::from("assets/tabler-icons"),
            default_sheet: "A4".to_string(),
            default_dpi: 300,
            preview_dpi: 96,
            default_padding_mm: 3.0,
            max_batch_items: 100,
            max_missing_items: 1000,
            warnings_header_limit: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub render: RenderConfig,
    pub theme: Theme,
}

/// Layers built-in defaults, an optional TOML file and `LABELSMITH__*`
/// environment variables, in that order.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let env_path = std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    let path = path.map(Path::to_path_buf).or(env_path);

    let mut builder =
        config::Config::builder().add_source(config::Config::try_from(&Config::default())?);
    if let Some(path) = &path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config: Config = builder.build()?.try_deserialize()?;
    tracing::debug!(?path, "configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.render.max_batch_items, 100);
        assert_eq!(config.render.default_sheet, "A4");
        assert_eq!(config.theme, Theme::label_default());
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 9090\n\n[render]\ndefault_sheet = \"L7160\"\nmax_batch_items = 10\n\n[theme]\ntext_color = \"#000000\""
        )
        .unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.render.default_sheet, "L7160");
        assert_eq!(config.render.max_batch_items, 10);
        assert_eq!(config.render.default_dpi, 300);
        assert_eq!(config.theme.text_color, "#000000");
        assert_eq!(config.theme.background, "#ffffff");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/labelsmith.toml"))).is_err());
    }
}
