//! Command handlers.

use crate::config::CliConfig;
use console::style;
use portal_cache::{FilesystemCacheStorage, describe_generations};
use portal_core::ports::{CacheStorage, Network};
use portal_core::{Destination, Method, Request, RequestMode};
use portal_offline::{FetchOutcome, HttpNetwork, OfflineCacheManager, ServiceWorker};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Manager wired to the on-disk store and the real network.
struct Runtime {
    manager: OfflineCacheManager,
    storage: Arc<FilesystemCacheStorage>,
    network: Arc<HttpNetwork>,
}

impl Runtime {
    async fn new(config: &CliConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = Arc::new(
            FilesystemCacheStorage::new(config.cache_dir.clone())
                .with_compression(config.compression),
        );
        let swept = storage.sweep_stale().await?;
        if swept > 0 {
            warn!(count = swept, cache_dir = %config.cache_dir.display(), "Removed interrupted cache writes");
        }
        let network = Arc::new(HttpNetwork::new(
            config.offline.origin.clone(),
            config.request_timeout(),
        )?);
        let manager = OfflineCacheManager::new(
            config.offline.clone(),
            Arc::clone(&network) as Arc<dyn Network>,
            Arc::clone(&storage) as Arc<dyn CacheStorage>,
        )?;
        debug!(version = %config.offline.version, cache_dir = %config.cache_dir.display(), "Runtime ready");
        Ok(Self {
            manager,
            storage,
            network,
        })
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Pre-cache the static assets.
pub async fn install(config: &CliConfig) -> CliResult {
    let runtime = Runtime::new(config).await?;

    println!(
        "{} Installing {} ({} assets)",
        style("▶").cyan(),
        style(runtime.manager.version()).bold(),
        config.offline.static_assets.len()
    );

    let outcome = runtime.manager.on_install().await?;
    info!(generation = %outcome.generation, cached = outcome.cached, "Install complete");

    println!(
        "{} Cached {} assets in {}",
        style("✓").green(),
        outcome.cached,
        outcome.generation
    );
    if outcome.skip_waiting {
        println!("  Activation will not wait for open pages");
    }
    Ok(())
}

/// Evict superseded generations.
pub async fn activate(config: &CliConfig) -> CliResult {
    let runtime = Runtime::new(config).await?;
    let outcome = runtime.manager.on_activate().await?;
    info!(version = %runtime.manager.version(), deleted = outcome.deleted.len(), "Activation complete");

    if outcome.deleted.is_empty() {
        println!("{} No old caches to delete", style("i").blue());
    } else {
        for name in &outcome.deleted {
            println!("  {} {}", style("-").red(), name);
        }
    }
    println!(
        "{} {} is active",
        style("✓").green(),
        style(runtime.manager.version()).bold()
    );
    Ok(())
}

/// Fetch one URL through the manager.
pub async fn fetch(
    config: &CliConfig,
    url: &str,
    method: &str,
    navigate: bool,
    image: bool,
    output: Option<PathBuf>,
) -> CliResult {
    let runtime = Runtime::new(config).await?;

    let method: Method = method.parse()?;
    let mut request = Request::parse(method, url)?;
    if navigate {
        request = request
            .with_mode(RequestMode::Navigate)
            .with_destination(Destination::Document);
    }
    if image {
        request = request.with_destination(Destination::Image);
    }

    let class = runtime
        .manager
        .classify(&request)
        .map(|c| c.to_string())
        .unwrap_or_else(|| "bypass".to_string());

    let (response, source) = match runtime.manager.on_fetch(&request).await {
        FetchOutcome::Passthrough => (runtime.network.fetch(&request).await?, "network".to_string()),
        FetchOutcome::Respond { response, source } => (response, source.to_string()),
        FetchOutcome::Failed(e) => {
            warn!(url = %request.url, error = %e, "Fetch failed");
            println!("{} {} {}", style("✗").red(), request.method, request.url);
            return Err(e.into());
        }
    };
    runtime.manager.settle().await;
    info!(url = %request.url, status = response.status, class = %class, source = %source, "Fetched");

    let status = if response.is_ok() {
        style(response.status).green()
    } else {
        style(response.status).yellow()
    };
    println!("{} {} {}", status, request.method, request.url);
    println!("  class: {}", class);
    println!("  source: {}", source);
    println!(
        "  content-type: {}",
        response.content_type().unwrap_or("(none)")
    );
    println!("  size: {}", format_bytes(response.body.len() as u64));

    let metrics = runtime.manager.metrics().snapshot();
    println!(
        "  cache: {} hits, {} misses, {} writes",
        metrics.cache_hits, metrics.cache_misses, metrics.cache_writes
    );

    if let Some(path) = output {
        tokio::fs::write(&path, &response.body).await?;
        println!("{} Body written to {}", style("✓").green(), path.display());
    }
    Ok(())
}

/// Show the configured version and its cache.
pub async fn status(config: &CliConfig) -> CliResult {
    let runtime = Runtime::new(config).await?;
    let version = runtime.manager.version();
    let generations = describe_generations(runtime.storage.as_ref()).await?;

    println!("Version: {}", style(version).bold());
    println!("Origin: {}", config.offline.origin);
    println!("Cache dir: {}", runtime.storage.root_dir().display());

    match generations.iter().find(|g| g.name == version) {
        Some(current) => println!(
            "{} Installed: {} entries, {}",
            style("✓").green(),
            current.entries,
            format_bytes(current.total_bytes)
        ),
        None => println!("{} Not installed", style("!").yellow()),
    }

    let stale: Vec<_> = generations.iter().filter(|g| g.name != version).collect();
    if !stale.is_empty() {
        println!(
            "{} {} old generation(s) awaiting activation",
            style("!").yellow(),
            stale.len()
        );
    }
    Ok(())
}

/// List cache generations.
pub async fn list_caches(config: &CliConfig, entries: bool) -> CliResult {
    let runtime = Runtime::new(config).await?;
    let generations = describe_generations(runtime.storage.as_ref()).await?;

    if generations.is_empty() {
        println!("{} No cache generations", style("i").blue());
        return Ok(());
    }

    for generation in &generations {
        let marker = if generation.name == runtime.manager.version() {
            style("*").green()
        } else {
            style(" ").dim()
        };
        println!(
            "{} {:<32} {:>6} entries {:>12}",
            marker,
            generation.name,
            generation.entries,
            format_bytes(generation.total_bytes)
        );

        if entries {
            for key in runtime.storage.entry_keys(&generation.name).await? {
                println!("      {}", style(key).dim());
            }
        }
    }
    Ok(())
}

/// Delete cache generations.
pub async fn clear_caches(config: &CliConfig, generation: Option<String>, yes: bool) -> CliResult {
    use dialoguer::Confirm;

    let runtime = Runtime::new(config).await?;
    let targets = match generation {
        Some(name) => vec![name],
        None => runtime.storage.keys().await?,
    };

    if targets.is_empty() {
        println!("{} No cache generations", style("i").blue());
        return Ok(());
    }

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {} cache generation(s)?", targets.len()))
            .default(false)
            .interact()?;
        if !confirmed {
            debug!("Cache clear cancelled");
            println!("{} Cancelled", style("!").yellow());
            return Ok(());
        }
    }

    for name in &targets {
        if runtime.storage.delete(name).await? {
            info!(generation = %name, "Deleted cache generation");
            println!("{} Deleted {}", style("✓").green(), name);
        } else {
            println!("{} {} not found", style("!").yellow(), name);
        }
    }
    Ok(())
}

/// Show configuration.
pub fn show_config(config: &CliConfig) -> CliResult {
    println!("Current configuration:");
    print!("{}", serde_yaml::to_string(config)?);

    if let Ok(path) = CliConfig::config_path() {
        println!("\nConfig file: {}", path.display());
    }
    Ok(())
}

/// Set configuration.
pub fn set_config(key: &str, value: &str) -> CliResult {
    let mut config = CliConfig::load().unwrap_or_default();
    config.set(key, value)?;
    config.offline.validate()?;
    config.save()?;
    info!(key = %key, "Configuration updated");

    println!("{} Set {} = {}", style("✓").green(), key, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
