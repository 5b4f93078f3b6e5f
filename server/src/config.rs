use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PUBLIC_DIR: &str = "public";
pub const UPLOADS_DIR: &str = "uploads";
/// 1MB expressed the way the upload form advertises it.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_000_000;
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

/// Rules the upload gate enforces.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub allowed_types: Vec<String>,
    pub max_file_size: u64,
    pub uploads_dir: PathBuf,
}

impl GateConfig {
    #[must_use]
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            allowed_types: DEFAULT_ALLOWED_TYPES
                .iter()
                .map(|t| (*t).to_owned())
                .collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            uploads_dir: uploads_dir.into(),
        }
    }

    #[must_use]
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }
}

/// Whole server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Root served as static assets. Uploads go into its `uploads` subdirectory.
    pub public_dir: PathBuf,
    pub gate: GateConfig,
}

impl Config {
    #[must_use]
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        let public_dir = public_dir.into();
        let gate = GateConfig::new(public_dir.join(UPLOADS_DIR));
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            public_dir,
            gate,
        }
    }

    /// Defaults overridden by `IMGUP_HOST`, `IMGUP_PORT`, `IMGUP_PUBLIC_DIR`
    /// and `IMGUP_MAX_FILE_SIZE`. Unparsable numbers fall back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let public_dir =
            env::var("IMGUP_PUBLIC_DIR").unwrap_or_else(|_| String::from(DEFAULT_PUBLIC_DIR));
        let mut config = Self::new(public_dir);
        config.host = env::var("IMGUP_HOST").unwrap_or_else(|_| String::from(DEFAULT_HOST));
        config.port = env::var("IMGUP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        if let Some(max) = env::var("IMGUP_MAX_FILE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.gate.max_file_size = max;
        }
        config
    }

    /// Moves the public root and the uploads directory beneath it.
    #[must_use]
    pub fn with_public_dir(mut self, public_dir: impl AsRef<Path>) -> Self {
        self.public_dir = public_dir.as_ref().to_path_buf();
        self.gate.uploads_dir = self.public_dir.join(UPLOADS_DIR);
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        // Arrange

        // Act
        let config = Config::new(DEFAULT_PUBLIC_DIR);

        // Assert
        assert_eq!(config.port, 3000);
        assert_eq!(config.gate.max_file_size, 1_000_000);
        assert_eq!(config.gate.uploads_dir, Path::new("public").join("uploads"));
        assert_eq!(
            config.gate.allowed_types,
            vec!["image/jpeg", "image/jpg", "image/png"]
        );
    }

    #[test]
    fn public_dir_moves_uploads() {
        // Arrange
        let config = Config::new(DEFAULT_PUBLIC_DIR);

        // Act
        let config = config.with_public_dir("/srv/www");

        // Assert
        assert_eq!(config.gate.uploads_dir, Path::new("/srv/www/uploads"));
    }
}
