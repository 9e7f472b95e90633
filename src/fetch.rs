//! Thin downloader for ECB reference-rate files. Runs once before matching so
//! the resolver only ever reads the cache directory.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::rates::EcbCacheDir;

pub struct RateFetcher {
    client: Client,
    base_url: String,
    cache: EcbCacheDir,
}

impl RateFetcher {
    pub fn new(base_url: &str, cache: EcbCacheDir, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            cache,
        })
    }

    /// Currencies whose file has to be fetched: all of them when `force`,
    /// otherwise only those without a cached file.
    pub fn stale(&self, currencies: &[String], force: bool) -> Vec<String> {
        currencies
            .iter()
            .filter(|c| force || !self.cache.path_for(c).is_file())
            .cloned()
            .collect()
    }

    /// Download every stale file concurrently. A failed refresh of a file that
    /// is already cached only warns; a file that cannot be obtained at all fails.
    pub async fn prefetch(&self, currencies: &[String], force: bool) -> Result<()> {
        let todo = self.stale(currencies, force);
        if todo.is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(self.cache.dir())
            .await
            .with_context(|| format!("create cache dir {}", self.cache.dir().display()))?;

        let mut set = JoinSet::new();
        for currency in todo {
            let client = self.client.clone();
            let url = format!("{}{}", self.base_url, EcbCacheDir::file_name(&currency));
            let path = self.cache.path_for(&currency);
            set.spawn(async move {
                let res = download(&client, &url, &path).await;
                (currency, path, res)
            });
        }

        while let Some(joined) = set.join_next().await {
            let (currency, path, res) = joined.context("download task panicked")?;
            match res {
                Ok(n) => info!("Fetched {} rates ({} bytes) -> {}", currency, n, path.display()),
                Err(e) if path.is_file() => {
                    warn!("Refreshing {} rates failed, using cached file: {:#}", currency, e)
                }
                Err(e) => return Err(e.context(format!("download {} rates", currency))),
            }
        }
        Ok(())
    }
}

async fn download(client: &Client, url: &str, path: &std::path::Path) -> Result<usize> {
    let resp = client.get(url).send().await.with_context(|| format!("GET {}", url))?;
    if !resp.status().is_success() {
        return Err(anyhow!("GET {}: HTTP {}", url, resp.status()));
    }
    let body = resp.bytes().await.context("read response body")?;
    if body.is_empty() {
        return Err(anyhow!("GET {}: empty body", url));
    }
    // write next to the target first so a failed transfer never clobbers the cache
    let tmp = path.with_extension("xml.part");
    tokio::fs::write(&tmp, &body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(body.len())
}
