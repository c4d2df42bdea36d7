use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::{CatalogConfig, parse_sources};
use crate::rate_limit::RateLimitPolicy;
use crate::validate::HashAlgorithm;

// CLI argument structure, every flag also settable from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "like-counter")]
#[command(about = "Per-app like counter for an app catalog, with per-IP throttling")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "LIKES_PORT", default_value_t = 8080)]
    pub port: u16,

    // JSON file holding like counts and per-IP state
    #[arg(long, env = "LIKES_DATA_FILE", default_value = "likes_data.json")]
    pub data_file: PathBuf,

    // Plain-text audit log
    #[arg(long, env = "LIKES_LOG_FILE", default_value = "likes_log.txt")]
    pub log_file: PathBuf,

    // Minimum seconds between two likes from one IP
    #[arg(long, env = "LIKES_RATE_LIMIT", default_value_t = 15)]
    pub rate_limit: u64,

    // Lifetime likes allowed per IP
    #[arg(long, env = "LIKES_MAX_LIKES_PER_IP", default_value_t = 100)]
    pub max_likes_per_ip: u64,

    #[arg(long, env = "LIKES_HASH_ALGORITHM", value_enum, default_value_t = HashAlgorithm::Sha256)]
    pub hash_algorithm: HashAlgorithm,

    // Catalog sources (comma-separated), tried in order
    // Example: "https://a.example/yysc.conf,b.example/yysc.conf"
    #[arg(
        long,
        env = "LIKES_CATALOG_URLS",
        default_value = "https://8-8-8-8.top/yysc.conf,https://yzhy.8-8-8-8.top/yysc.conf"
    )]
    pub catalog_urls: String,

    // Local cache of the catalog
    #[arg(long, env = "LIKES_CATALOG_FILE", default_value = "yysc.conf")]
    pub catalog_file: PathBuf,

    // Seconds before the cached catalog is refreshed
    #[arg(long, env = "LIKES_CATALOG_MAX_AGE", default_value_t = 3600)]
    pub catalog_max_age: u64,

    // Per-source download timeout in seconds
    #[arg(long, env = "LIKES_FETCH_TIMEOUT", default_value_t = 10)]
    pub fetch_timeout: u64,

    // Take the client IP from X-Forwarded-For / X-Real-IP / Client-IP
    #[arg(long, env = "LIKES_TRUST_PROXY_HEADERS", default_value_t = true, action = clap::ArgAction::Set)]
    pub trust_proxy_headers: bool,
}

impl Args {
    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            min_interval: Duration::from_secs(self.rate_limit),
            max_per_ip: self.max_likes_per_ip,
        }
    }

    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig {
            sources: parse_sources(&self.catalog_urls),
            cache_file: self.catalog_file.clone(),
            max_age: Duration::from_secs(self.catalog_max_age),
            fetch_timeout: Duration::from_secs(self.fetch_timeout),
        }
    }
}
