// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Guest Module Loader
//!
//! Compiles a guest binary, links the bridge imports, instantiates it and
//! captures its exported memory. The result is a [`LoadedModule`] owning an
//! independent bridge.

use super::context::LoadedModule;
use super::host_functions::{add_to_linker, BridgeHostState};
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use vdbridge_core::{DomHost, VdBridge};
use wasmtime::{Config, Engine, Linker, Module, Store};

/// Loads guest modules against a shared engine
///
/// Each load produces its own store, bridge and DOM; loads never share state.
pub struct ModuleLoader {
    engine: Engine,
    config: RuntimeConfig,
    http: reqwest::Client,
}

impl ModuleLoader {
    /// Create a loader with the given configuration
    pub fn new(config: RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;

        let mut engine_config = Config::new();
        engine_config.async_support(true);

        // Fuel metering only when a budget is configured
        if config.max_fuel.is_some() {
            engine_config.consume_fuel(true);
        }

        let engine = Engine::new(&engine_config).map_err(|e| RuntimeError::Engine(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()?;

        Ok(Self {
            engine,
            config,
            http,
        })
    }

    /// Load a guest from an in-memory binary
    pub async fn load_from_bytes<D>(&self, bytes: &[u8], dom: D) -> RuntimeResult<LoadedModule<D>>
    where
        D: DomHost + Send + 'static,
        D::Node: Send,
    {
        self.load_from_bytes_cancellable(bytes, dom, &CancellationToken::new())
            .await
    }

    /// Load a guest from an in-memory binary, giving up once `cancel` fires
    ///
    /// A cancelled load creates no context and leaves nothing behind.
    pub async fn load_from_bytes_cancellable<D>(
        &self,
        bytes: &[u8],
        dom: D,
        cancel: &CancellationToken,
    ) -> RuntimeResult<LoadedModule<D>>
    where
        D: DomHost + Send + 'static,
        D::Node: Send,
    {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        let module = Module::new(&self.engine, bytes)
            .map_err(|e| RuntimeError::Compile(format!("{:#}", e)))?;
        tracing::debug!(bytes = bytes.len(), "compiled guest module");

        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        let mut linker: Linker<BridgeHostState<D>> = Linker::new(&self.engine);
        add_to_linker(&mut linker, &self.config.import_module)?;

        let bridge = VdBridge::with_config(dom, self.config.bridge.clone());
        let host_state =
            BridgeHostState::new(bridge, &self.config.memory_export, self.config.error_policy);
        let mut store = Store::new(&self.engine, host_state);

        if let Some(fuel) = self.config.max_fuel {
            store
                .set_fuel(fuel)
                .map_err(|e| RuntimeError::Engine(format!("Failed to set fuel: {}", e)))?;
        }

        let instance = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
            result = linker.instantiate_async(&mut store, &module) => {
                result.map_err(|e| RuntimeError::Instantiate(format!("{:#}", e)))?
            }
        };

        // Only now is the memory guaranteed to be initialised.
        let memory = instance
            .get_memory(&mut store, &self.config.memory_export)
            .ok_or_else(|| RuntimeError::MissingMemory(self.config.memory_export.clone()))?;
        store.data_mut().set_memory(memory);

        tracing::info!(
            memory_bytes = memory.data_size(&store),
            import_module = %self.config.import_module,
            "loaded guest module"
        );

        Ok(LoadedModule::new(store, instance, memory))
    }

    /// Fetch a guest from `url`, then load it
    pub async fn load_from_url<D>(&self, url: &str, dom: D) -> RuntimeResult<LoadedModule<D>>
    where
        D: DomHost + Send + 'static,
        D::Node: Send,
    {
        self.load_from_url_cancellable(url, dom, &CancellationToken::new())
            .await
    }

    /// Fetch and load a guest, giving up once `cancel` fires
    pub async fn load_from_url_cancellable<D>(
        &self,
        url: &str,
        dom: D,
        cancel: &CancellationToken,
    ) -> RuntimeResult<LoadedModule<D>>
    where
        D: DomHost + Send + 'static,
        D::Node: Send,
    {
        let url = reqwest::Url::parse(url)
            .map_err(|e| RuntimeError::Fetch(format!("Invalid URL {}: {}", url, e)))?;
        tracing::info!(%url, "fetching guest module");

        let fetch = async {
            let response = self.http.get(url.clone()).send().await?.error_for_status()?;
            response.bytes().await
        };

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
            result = fetch => result?,
        };

        self.load_from_bytes_cancellable(&bytes, dom, cancel).await
    }

    /// Load a guest from a file path
    pub async fn load_from_file<D>(&self, path: &Path, dom: D) -> RuntimeResult<LoadedModule<D>>
    where
        D: DomHost + Send + 'static,
        D::Node: Send,
    {
        let bytes = tokio::fs::read(path).await?;
        self.load_from_bytes(&bytes, dom).await
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get the engine reference
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}
