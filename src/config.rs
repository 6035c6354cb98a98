use crate::lens::lookup::{DEFAULT_CONCURRENCY, DEFAULT_SERVER_URL};
use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AsnmapConfig {
    /// Base URL of the lookup service
    pub server_url: String,

    /// API key sent with every lookup request
    pub api_key: Option<String>,

    /// Custom DNS resolvers (`ip` or `ip:port`)
    pub resolvers: Vec<String>,

    /// Proxy URLs or files of proxy URLs, the first reachable one is used
    pub proxy: Vec<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Number of concurrent lookups
    pub concurrency: usize,

    /// Where the API key is saved
    pub credentials_path: PathBuf,
}

const EMPTY_CONFIG: &str = r#"### asnmap configuration file

### lookup service
# server_url = "https://asn.projectdiscovery.io/"

### API key, usually saved to credentials.toml with `asnmap --auth`
# api_key = ""

### comma-separated DNS resolvers used for domain inputs
# resolvers = "8.8.8.8,1.1.1.1:53"

### comma-separated proxy URLs (http, https, socks5) or proxy list files
# proxy = "socks5://127.0.0.1:1080"

# timeout_secs = 30
# concurrency = 16
"#;

impl Default for AsnmapConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_key: None,
            resolvers: vec![],
            proxy: vec![],
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            credentials_path: PathBuf::from(Self::credentials_file_path()),
        }
    }
}

impl AsnmapConfig {
    /// Function to create and initialize a new configuration
    ///
    /// Sources, lowest priority first: the config file (`~/.asnmap/asnmap.toml`
    /// unless `path` is given), `~/.asnmap/credentials.toml`, and `ASNMAP_*`
    /// environment variables.
    pub fn new(path: &Option<String>) -> Result<AsnmapConfig> {
        let asnmap_dir = asnmap_dir()?;
        std::fs::create_dir_all(&asnmap_dir)
            .map_err(|e| anyhow!("Unable to create asnmap directory: {}", e))?;

        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => asnmap_dir.join("asnmap.toml"),
        };
        Self::load(&config_path, &asnmap_dir.join("credentials.toml"))
    }

    /// Load from an explicit config file and credentials file
    ///
    /// A missing config file is created from a commented template.
    pub fn load(config_path: &Path, credentials_path: &Path) -> Result<AsnmapConfig> {
        let mut builder = Config::builder();

        if config_path.exists() {
            builder = builder.add_source(config::File::from(config_path));
        } else {
            std::fs::write(config_path, EMPTY_CONFIG).map_err(|e| {
                anyhow!(
                    "Unable to create config file {}: {}",
                    config_path.display(),
                    e
                )
            })?;
        }

        builder = builder.add_source(config::File::from(credentials_path).required(false));

        // E.g., `ASNMAP_API_KEY=... asnmap -a AS14421` overrides the saved key
        builder = builder.add_source(config::Environment::with_prefix("ASNMAP"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config, credentials_path)
    }

    fn from_map(config: &HashMap<String, String>, credentials_path: &Path) -> Result<AsnmapConfig> {
        let server_url = config
            .get("server_url")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        let api_key = config
            .get("api_key")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let timeout_secs = parse_number(config, "timeout_secs")?.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let concurrency = parse_number(config, "concurrency")?.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(anyhow!("concurrency must be at least 1"));
        }

        Ok(AsnmapConfig {
            server_url,
            api_key,
            resolvers: split_list(config.get("resolvers")),
            proxy: split_list(config.get("proxy")),
            timeout_secs,
            concurrency,
            credentials_path: credentials_path.to_path_buf(),
        })
    }

    /// Request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Save an API key to the credentials file and use it from now on
    pub fn save_api_key(&mut self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow!("API key is empty"));
        }

        if let Some(parent) = self.credentials_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow!("Unable to create {}: {}", parent.display(), e))?;
        }
        // JSON string escapes are valid TOML basic string escapes
        let content = format!("api_key = {}\n", serde_json::to_string(key)?);
        std::fs::write(&self.credentials_path, content).map_err(|e| {
            anyhow!(
                "Unable to write credentials file {}: {}",
                self.credentials_path.display(),
                e
            )
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.credentials_path, std::fs::Permissions::from_mode(0o600))?;
        }

        self.api_key = Some(key.to_string());
        Ok(())
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let or_none = |v: &[String]| {
            if v.is_empty() {
                "(none)".to_string()
            } else {
                v.join(", ")
            }
        };
        [
            format!("Server URL:         {}", self.server_url),
            format!(
                "API Key:            {}",
                if self.api_key.is_some() { "set" } else { "not set" }
            ),
            format!("Resolvers:          {}", or_none(&self.resolvers)),
            format!("Proxy:              {}", or_none(&self.proxy)),
            format!("Timeout:            {} seconds", self.timeout_secs),
            format!("Concurrency:        {}", self.concurrency),
            format!("Credentials File:   {}", self.credentials_path.display()),
        ]
        .join("\n")
    }

    /// Get the default credentials file path
    pub fn credentials_file_path() -> String {
        format!("{}/.asnmap/credentials.toml", home_dir_string())
    }
}

fn asnmap_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
    Ok(home.join(".asnmap"))
}

fn home_dir_string() -> String {
    dirs::home_dir()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|| "~".to_string())
}

fn parse_number<T: std::str::FromStr>(config: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    match config.get(key).map(|s| s.trim()) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid value for {}: {}", key, s)),
    }
}

/// Split a comma-separated setting, dropping blank entries
fn split_list(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
