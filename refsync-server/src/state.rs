//! Shared application state for the edge

use anyhow::Result;
use refsync_core::config::Config;
use refsync_core::core_identity::{IntegrationIssuer, RequestVerifier, UserDirectory};
use refsync_core::core_membership::{
    FileInvitationStore, MembershipDirectory, MemoryInvitationStore,
};
use refsync_core::core_session::{SessionRegistry, SessionRuntime};
use std::sync::Arc;

/// Everything the route handlers need, cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<UserDirectory>,
    pub directory: Arc<MembershipDirectory>,
    pub registry: Arc<SessionRegistry>,
    pub verifier: RequestVerifier,
    pub integration: Arc<IntegrationIssuer>,
}

impl AppState {
    /// Durable state under `config.server.data_dir`.
    pub fn new(config: Config) -> Result<Self> {
        let data_dir = config.server.data_dir.clone();
        std::fs::create_dir_all(&data_dir)?;

        let users = Arc::new(UserDirectory::open(data_dir.join("users.json"))?);
        let registry = Arc::new(SessionRegistry::new(
            data_dir.clone(),
            SessionRuntime {
                idle_timeout: config.sync.session_idle_timeout,
                mailbox_capacity: config.sync.mailbox_capacity,
            },
        )?);
        let store = Arc::new(FileInvitationStore::open(data_dir.join("membership.json"))?);
        let directory = Arc::new(MembershipDirectory::new(
            store,
            users.clone(),
            registry.clone(),
        ));
        let verifier = RequestVerifier::new(users.clone(), config.sync.signature_freshness);

        Ok(AppState {
            config: Arc::new(config),
            users,
            directory,
            registry,
            verifier,
            integration: Arc::new(IntegrationIssuer::generate()),
        })
    }

    /// Fully in-memory state for tests.
    pub fn in_memory(config: Config) -> Self {
        let users = Arc::new(UserDirectory::in_memory());
        let registry = Arc::new(SessionRegistry::in_memory(SessionRuntime {
            idle_timeout: config.sync.session_idle_timeout,
            mailbox_capacity: config.sync.mailbox_capacity,
        }));
        let directory = Arc::new(MembershipDirectory::new(
            Arc::new(MemoryInvitationStore::new()),
            users.clone(),
            registry.clone(),
        ));
        let verifier = RequestVerifier::new(users.clone(), config.sync.signature_freshness);

        AppState {
            config: Arc::new(config),
            users,
            directory,
            registry,
            verifier,
            integration: Arc::new(IntegrationIssuer::generate()),
        }
    }
}
