use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::types::ProxyDescriptor;

struct ProxyEntry {
    descriptor: ProxyDescriptor,
    client: Client,
}

/// Shared, read-only ordered pool of outbound connections.
///
/// One HTTP client is built per proxy at load time so connections are reused
/// across cycles. Each session keeps its own cursor into the pool; the pool
/// itself is never mutated, so no locking is needed. An empty pool means
/// every request goes through the direct client.
pub struct ProxyPool {
    entries: Vec<ProxyEntry>,
    direct: Client,
}

impl ProxyPool {
    pub fn new(descriptors: Vec<ProxyDescriptor>, timeout: Duration) -> Result<Self> {
        let direct = build_client(timeout, None)?;
        let mut entries = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let client = build_client(timeout, Some(&descriptor))?;
            entries.push(ProxyEntry { descriptor, client });
        }
        Ok(Self { entries, direct })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Client for the given cursor; the direct client when the pool is empty.
    pub fn client_at(&self, cursor: usize) -> &Client {
        if self.entries.is_empty() {
            return &self.direct;
        }
        &self.entries[cursor % self.entries.len()].client
    }

    /// Descriptor at the given cursor, if the pool is non-empty.
    pub fn descriptor_at(&self, cursor: usize) -> Option<&ProxyDescriptor> {
        if self.entries.is_empty() {
            return None;
        }
        Some(&self.entries[cursor % self.entries.len()].descriptor)
    }

    /// Round-robin advance: `(cursor + 1) % len`. No-op on an empty pool.
    pub fn advance(&self, cursor: usize) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        (cursor + 1) % self.entries.len()
    }
}

fn build_client(timeout: Duration, proxy: Option<&ProxyDescriptor>) -> Result<Client> {
    let mut builder = Client::builder().timeout(timeout);
    if let Some(descriptor) = proxy {
        let proxy = reqwest::Proxy::all(descriptor.connect_url())
            .with_context(|| format!("invalid proxy {}", descriptor.display()))?;
        builder = builder.proxy(proxy);
    }
    builder.build().context("failed to build HTTP client")
}
