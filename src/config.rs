// Configuration for codegraph.
// Reads from environment variables with sensible defaults.

use std::env;
use std::sync::OnceLock;

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Config {
    /// Default walk cap for one build pass (CODEGRAPH_MAX_FILES).
    pub max_files: usize,

    /// Default per-file size cap in bytes (CODEGRAPH_MAX_FILE_SIZE).
    pub max_file_size: u64,

    /// Parser worker count; 0 means one per CPU core (CODEGRAPH_WORKERS).
    pub workers: usize,

    /// SQLite read pool size (CODEGRAPH_POOL_SIZE).
    pub pool_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_files: 5000,
            max_file_size: 1024 * 1024,
            workers: 0,
            pool_size: 8,
        }
    }
}

impl Config {
    fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(val) = env::var("CODEGRAPH_MAX_FILES") {
            if let Ok(parsed) = val.parse() {
                config.max_files = parsed;
            } else {
                eprintln!(
                    "codegraph: Warning: Invalid CODEGRAPH_MAX_FILES value: {}, using default: {}",
                    val, config.max_files
                );
            }
        }

        if let Ok(val) = env::var("CODEGRAPH_MAX_FILE_SIZE") {
            if let Ok(parsed) = val.parse() {
                config.max_file_size = parsed;
            } else {
                eprintln!(
                    "codegraph: Warning: Invalid CODEGRAPH_MAX_FILE_SIZE value: {}, using default: {}",
                    val, config.max_file_size
                );
            }
        }

        if let Ok(val) = env::var("CODEGRAPH_WORKERS") {
            if let Ok(parsed) = val.parse() {
                config.workers = parsed;
            } else {
                eprintln!(
                    "codegraph: Warning: Invalid CODEGRAPH_WORKERS value: {}, using default: {}",
                    val, config.workers
                );
            }
        }

        if let Ok(val) = env::var("CODEGRAPH_POOL_SIZE") {
            if let Ok(parsed) = val.parse() {
                config.pool_size = parsed;
            } else {
                eprintln!(
                    "codegraph: Warning: Invalid CODEGRAPH_POOL_SIZE value: {}, using default: {}",
                    val, config.pool_size
                );
            }
        }

        config
    }

    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }

    /// Effective parser worker count.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
