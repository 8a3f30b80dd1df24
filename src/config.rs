use crate::engine::cooldown::CooldownWindow;
use crate::engine::retry::RetryPolicy;
use crate::engine::walker::CrawlSession;
use crate::remote::events::ReconnectPolicy;
use crate::scrapers::types::{NavigateOptions, WaitUntil};
use crate::scrapers::zonaprop::ListingLayout;
use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// What the process does once a session is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run a single session and exit
    Once,
    /// Sleep the cooldown, then exit 0 so a supervisor relaunches the process
    Exit,
    /// Sleep the cooldown and start the next session in-process
    Loop,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Exit
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "once" => Ok(RunMode::Once),
            "exit" => Ok(RunMode::Exit),
            "loop" => Ok(RunMode::Loop),
            other => Err(format!("expected once, exit or loop, got {:?}", other)),
        }
    }
}

/// Everything one crawl session needs
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub site_base_url: String,
    pub listing_path_template: String,
    /// Detail pages processed at once; deployments have used 1, 3 and 27
    pub concurrency: usize,
    pub navigation: NavigateOptions,
    pub navigation_retry: RetryPolicy,
    pub remote_retry: RetryPolicy,
    pub settle_delay: Duration,
    pub stagnation_threshold: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            site_base_url: ListingLayout::DEFAULT_BASE_URL.to_string(),
            listing_path_template: ListingLayout::DEFAULT_PATH_TEMPLATE.to_string(),
            concurrency: 27,
            navigation: NavigateOptions {
                wait_until: WaitUntil::NetworkIdle,
                timeout: Duration::from_secs(30),
            },
            navigation_retry: RetryPolicy::immediate(RetryPolicy::DEFAULT_ATTEMPTS),
            remote_retry: RetryPolicy::with_delay(
                RetryPolicy::DEFAULT_ATTEMPTS,
                Duration::from_secs(2),
            ),
            settle_delay: Duration::from_millis(200),
            stagnation_threshold: CrawlSession::DEFAULT_STAGNATION_THRESHOLD,
        }
    }
}

/// Process configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub api_base_url: String,
    pub api_timeout: Duration,
    pub events_url: Option<String>,
    pub reconnect: ReconnectPolicy,
    pub port: u16,
    pub run_mode: RunMode,
    pub cooldown: CooldownWindow,
    pub seed_cache_path: Option<PathBuf>,
    pub headless: bool,
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = CrawlerConfig::default();
        let attempts = var_or("NAVIGATION_ATTEMPTS", RetryPolicy::DEFAULT_ATTEMPTS)?;
        let remote_attempts = var_or("REMOTE_ATTEMPTS", RetryPolicy::DEFAULT_ATTEMPTS)?;

        let crawler = CrawlerConfig {
            site_base_url: var_or("SITE_BASE_URL", defaults.site_base_url)?,
            listing_path_template: var_or("LISTING_PATH_TEMPLATE", defaults.listing_path_template)?,
            concurrency: var_or("CONCURRENCY", defaults.concurrency)?,
            navigation: NavigateOptions {
                wait_until: defaults.navigation.wait_until,
                timeout: Duration::from_secs(var_or("NAVIGATION_TIMEOUT_SECS", 30)?),
            },
            navigation_retry: RetryPolicy::immediate(attempts),
            remote_retry: RetryPolicy::with_delay(
                remote_attempts,
                Duration::from_millis(var_or("REMOTE_RETRY_DELAY_MS", 2000)?),
            ),
            settle_delay: Duration::from_millis(var_or("SETTLE_DELAY_MS", 200)?),
            stagnation_threshold: var_or("STAGNATION_THRESHOLD", defaults.stagnation_threshold)?,
        };

        if !crawler.listing_path_template.contains("{page}") {
            return Err(anyhow!("LISTING_PATH_TEMPLATE must contain a {{page}} placeholder"));
        }

        Ok(Self {
            crawler,
            api_base_url: var_or(
                "API_BASE_URL",
                "https://scraper-backend-pvvo.onrender.com".to_string(),
            )?,
            api_timeout: Duration::from_secs(var_or("API_TIMEOUT_SECS", 30)?),
            events_url: optional_var("EVENTS_URL"),
            reconnect: ReconnectPolicy {
                delay: Duration::from_secs(var_or("RECONNECT_DELAY_SECS", 5)?),
            },
            port: var_or("PORT", 3000)?,
            run_mode: var_or("RUN_MODE", RunMode::default())?,
            cooldown: CooldownWindow::new(
                Duration::from_secs(var_or("COOLDOWN_MIN_SECS", 2 * 3600)?),
                Duration::from_secs(var_or("COOLDOWN_MAX_SECS", 4 * 3600)?),
            ),
            seed_cache_path: optional_var("SEED_CACHE_PATH").map(PathBuf::from),
            headless: var_or("HEADLESS", true)?,
        })
    }
}
