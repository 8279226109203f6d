//! The engine: shared state plus its installation at every operation point.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use veil_control::{DispatchConfig, Dispatcher};
use veil_core::Identity;
use veil_policy::{Decider, Enablement};
use veil_store::{render, PolicyTables, TablesSnapshot, TokenStore};

use crate::backend::{Callback, InterceptBackend, Invocation, OperationPoint};
use crate::config::VeilConfig;
use crate::error::Result;
use crate::filter::EnumerationFilter;
use crate::hooks::Hooks;

/// Machine-readable engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub enabled: bool,
    pub builtin_hidden: Vec<String>,
    pub hidden_paths: Vec<String>,
    pub identities: Vec<Identity>,
    pub tokens: usize,
    pub wrapped_handles: usize,
}

/// A loaded engine.
///
/// Dropping it without [`Veil::unload`] still removes every hook.
pub struct Veil {
    config: VeilConfig,
    tokens: Arc<TokenStore>,
    tables: Arc<PolicyTables>,
    enablement: Arc<Enablement>,
    hooks: Arc<Hooks>,
    backend: Arc<dyn InterceptBackend>,
    loaded: bool,
}

impl Veil {
    /// Build the shared state and install hooks at every operation point.
    ///
    /// If any point fails to install, the ones already installed are
    /// removed again.
    pub fn load(config: VeilConfig, backend: Arc<dyn InterceptBackend>) -> Result<Self> {
        config.validate()?;

        let tables = Arc::new(PolicyTables::new(config.builtin_paths()?, config.limits));
        let tokens = Arc::new(TokenStore::new(config.limits.max_tokens));
        let enablement = Arc::new(Enablement::new(config.enabled));

        let filter = EnumerationFilter::new(tables.clone(), config.path_max);
        let dispatcher = Dispatcher::new(
            Arc::clone(&tokens),
            Arc::clone(&tables),
            Arc::clone(&enablement),
            DispatchConfig {
                path_max: config.path_max,
            },
        );
        let hooks = Arc::new(Hooks::new(
            Decider::new(Arc::clone(&tables), Arc::clone(&enablement)),
            filter,
            dispatcher,
            config.control_key,
            config.path_max,
        ));

        for (i, point) in OperationPoint::ALL.iter().enumerate() {
            let hooks = Arc::clone(&hooks);
            let callback: Callback = Arc::new(move |inv: &Invocation<'_>| hooks.handle(inv));

            if let Err(e) = backend.register(*point, callback) {
                for installed in &OperationPoint::ALL[..i] {
                    if let Err(e) = backend.unregister(*installed) {
                        warn!(point = ?installed, err = %e, "rollback failed");
                    }
                }
                return Err(e);
            }
        }

        info!(enabled = config.enabled, "veil loaded");

        Ok(Self {
            config,
            tokens,
            tables,
            enablement,
            hooks,
            backend,
            loaded: true,
        })
    }

    /// Remove every hook and drop all policy state.
    ///
    /// Handles still wrapped keep working and restore themselves on release.
    pub fn unload(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        if !self.loaded {
            return Ok(());
        }
        self.loaded = false;

        let mut first_err = None;
        for point in OperationPoint::ALL {
            if let Err(e) = self.backend.unregister(point) {
                warn!(?point, err = %e, "unhook failed");
                first_err.get_or_insert(e);
            }
        }

        self.tables.flush();
        self.tokens.clear();
        info!("veil unloaded");

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn config(&self) -> &VeilConfig {
        &self.config
    }

    pub fn tables(&self) -> &Arc<PolicyTables> {
        &self.tables
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn enablement(&self) -> &Arc<Enablement> {
        &self.enablement
    }

    pub fn hooks(&self) -> &Arc<Hooks> {
        &self.hooks
    }

    /// Snapshot of everything the status surface shows.
    pub fn status(&self) -> StatusSnapshot {
        let TablesSnapshot {
            hidden_paths,
            identities,
        } = TablesSnapshot::capture(&self.tables);

        StatusSnapshot {
            enabled: self.enablement.is_enabled(),
            builtin_hidden: self.config.builtin_hidden.clone(),
            hidden_paths,
            identities,
            tokens: self.tokens.len(),
            wrapped_handles: self.hooks.filter().wrapped_count(),
        }
    }

    /// The text served at the status path.
    pub fn render_status(&self) -> String {
        render(&self.tables)
    }

    /// Where the status text is served, if anywhere.
    ///
    /// This is the first built-in hidden path, so it is invisible to every
    /// non-exempt caller while hiding is enabled.
    pub fn status_path(&self) -> Option<&str> {
        self.config.builtin_hidden.first().map(String::as_str)
    }
}

impl Drop for Veil {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!(err = %e, "teardown on drop failed");
        }
    }
}
