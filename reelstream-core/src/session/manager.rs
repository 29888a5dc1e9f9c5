use std::path::Path;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::resolver::LinkResolver;
use super::state::{Session, SessionResources};
use super::SessionError;
use crate::config::{ReelstreamConfig, SessionConfig};
use crate::engine::{EngineFactory, EngineOptions, TorrentEngine, TorrentFile};
use crate::network::{DialerFactory, HttpTransport, PortAllocator};
use crate::settings::SettingsStore;
use crate::torrent::MagnetLink;

/// Listing entry for one live session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub name: String,
    pub listen_port: u16,
    pub file_count: usize,
    pub open_readers: usize,
    pub created_at: DateTime<Utc>,
    pub idle_seconds: u64,
}

/// Owns every live session, keyed by lowercase hex info hash.
///
/// The map is sharded; no map lock is ever held across an await. Teardown
/// always happens after the session has been removed from the map.
pub struct SessionManager {
    sessions: DashMap<String, Arc<Session>>,
    ports: Arc<PortAllocator>,
    settings: Arc<SettingsStore>,
    dialers: DialerFactory,
    engines: Arc<dyn EngineFactory>,
    resolver: LinkResolver,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        config: &ReelstreamConfig,
        settings: Arc<SettingsStore>,
        transport: Arc<HttpTransport>,
        engines: Arc<dyn EngineFactory>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            ports: Arc::new(PortAllocator::new(config.ports.clone())),
            settings,
            dialers: DialerFactory::new(&config.network),
            engines,
            resolver: LinkResolver::new(transport, config.session.max_torrent_body),
            config: config.session.clone(),
        }
    }

    pub fn ports(&self) -> &Arc<PortAllocator> {
        &self.ports
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Creates a session for a magnet link or an indexer link.
    ///
    /// Waits, holding no lock, until the engine knows the torrent's
    /// metadata. Every failure after the port lease releases the port,
    /// deletes the scratch directory and stops the engine before returning.
    /// A session already registered under the same id is replaced and torn
    /// down.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidInput` - Empty input or malformed magnet
    /// - `SessionError::UnresolvableLink` - Link did not lead to a magnet
    /// - `SessionError::InvalidProxyConfig` - Proxy enabled with a bad URL
    /// - `SessionError::MetadataTimeout` - Metadata did not arrive in time
    /// - `SessionError::Engine` - Engine failed to launch or add the torrent
    /// - `SessionError::Storage` - Scratch directory could not be created
    pub async fn create_session(&self, magnet_or_link: &str) -> Result<Arc<Session>, SessionError> {
        let input = magnet_or_link.trim();
        if input.is_empty() {
            return Err(SessionError::InvalidInput {
                reason: "magnet link or URL is required".to_string(),
            });
        }

        let magnet = if is_http_link(input) {
            self.resolver.resolve(input).await?
        } else {
            MagnetLink::parse(input).map_err(|e| SessionError::InvalidInput {
                reason: e.to_string(),
            })?
        };

        let settings = self.settings.snapshot();
        let dialer = self
            .dialers
            .for_settings(&settings)
            .map_err(|e| SessionError::InvalidProxyConfig {
                reason: e.to_string(),
            })?;

        let port = self.ports.allocate_lease();
        let storage = tempfile::Builder::new()
            .prefix(&self.config.temp_prefix)
            .tempdir_in(&self.config.temp_root)?;

        let session_id = magnet.info_hash.to_string();
        tracing::info!(
            session_id = %session_id,
            port = port.port(),
            path = %storage.path().display(),
            proxied = dialer.is_proxied(),
            "Starting torrent engine"
        );

        let engine = self
            .engines
            .launch(EngineOptions {
                listen_port: port.port(),
                dialer,
                storage_dir: storage.path().to_path_buf(),
            })
            .await?;

        let added = engine.add_magnet(&magnet).await;
        let torrent = match added {
            Ok(torrent) => torrent,
            Err(e) => {
                stop_engine(engine, &session_id).await;
                return Err(e.into());
            }
        };

        let metadata =
            tokio::time::timeout(self.config.metadata_timeout, torrent.wait_for_metadata()).await;
        let info = match metadata {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                drop(torrent);
                stop_engine(engine, &session_id).await;
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(
                    session_id = %session_id,
                    timeout_secs = self.config.metadata_timeout.as_secs(),
                    "Timed out waiting for torrent metadata"
                );
                drop(torrent);
                stop_engine(engine, &session_id).await;
                return Err(SessionError::MetadataTimeout);
            }
        };

        let session = Arc::new(Session::new(
            magnet.info_hash,
            info.name,
            info.files,
            settings,
            SessionResources {
                engine,
                torrent,
                port,
                storage,
            },
        ));

        let previous = self
            .sessions
            .insert(session.id().to_string(), Arc::clone(&session));
        if let Some(previous) = previous {
            tracing::info!(session_id = %session.id(), "Replacing existing session");
            previous.release().await;
        }

        tracing::info!(
            session_id = %session.id(),
            name = %session.name(),
            files = session.files().len(),
            "Session ready"
        );
        Ok(session)
    }

    /// Looks up a session and marks it as used.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotFound` - No live session with this id
    pub fn get_session(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        let entry = self
            .sessions
            .get(&id.to_ascii_lowercase())
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })?;
        // Touch under the shard read lock so the sweep's re-check sees it
        entry.touch();
        Ok(Arc::clone(entry.value()))
    }

    /// Lists a session's files and marks it as used.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotFound` - No live session with this id
    pub fn list_files(&self, id: &str) -> Result<Vec<TorrentFile>, SessionError> {
        Ok(self.get_session(id)?.files().to_vec())
    }

    /// Removes and destroys a session. Unknown ids are a no-op.
    ///
    /// Returns whether a session was removed.
    pub async fn teardown(&self, id: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(&id.to_ascii_lowercase()) else {
            return false;
        };
        session.release().await
    }

    /// Destroys every session idle for longer than the configured timeout.
    ///
    /// Candidates are collected first, then each removal re-checks idleness
    /// under the shard lock so a session touched in between survives. Each
    /// teardown runs in its own task; a failing one does not stop the rest.
    pub async fn sweep_idle(&self) -> usize {
        let idle_timeout = self.config.idle_timeout;
        let now = Instant::now();

        let candidates: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for(now) > idle_timeout)
            .map(|entry| entry.key().clone())
            .collect();

        let mut tasks: Vec<(String, JoinHandle<bool>)> = Vec::new();
        for id in candidates {
            let removed = self.sessions.remove_if(&id, |_, session| {
                session.idle_for(Instant::now()) > idle_timeout
            });
            if let Some((id, session)) = removed {
                tracing::info!(
                    session_id = %id,
                    idle_secs = session.idle_for(Instant::now()).as_secs(),
                    "Reaping idle session"
                );
                tasks.push((id, tokio::spawn(async move { session.release().await })));
            }
        }

        let mut reaped = 0;
        for (id, task) in tasks {
            match task.await {
                Ok(_) => reaped += 1,
                Err(e) => {
                    tracing::error!(session_id = %id, error = %e, "Session teardown task failed");
                }
            }
        }

        if reaped > 0 {
            // Engine state is freed as the last Arc<Session> drops
            tracing::info!(reaped, remaining = self.sessions.len(), "Idle sweep finished");
        }
        reaped
    }

    /// Starts the periodic idle sweep. The task ends once the manager is
    /// dropped.
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.sweep_idle().await;
            }
            tracing::debug!("Idle reaper stopped");
        })
    }

    /// Summaries of all live sessions.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let now = Instant::now();
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|entry| {
                let session = entry.value();
                SessionSummary {
                    session_id: session.id().to_string(),
                    name: session.name().to_string(),
                    listen_port: session.listen_port(),
                    file_count: session.files().len(),
                    open_readers: session.open_readers(),
                    created_at: session.created_at(),
                    idle_seconds: session.idle_for(now).as_secs(),
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    /// Tears down every session. Used on server exit.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        let sessions: Vec<Arc<Session>> = ids
            .iter()
            .filter_map(|id| self.sessions.remove(id).map(|(_, session)| session))
            .collect();

        let count = sessions.len();
        futures::future::join_all(sessions.iter().map(|session| session.release())).await;
        tracing::info!(sessions = count, "All sessions torn down");
    }

    /// Deletes scratch directories left behind by a previous run.
    ///
    /// Only directories under the temp root carrying the session prefix and
    /// not owned by a live session are removed.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - The temp root cannot be listed
    pub async fn purge_stale_storage(&self) -> std::io::Result<usize> {
        let live: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| entry.value().storage_path().to_path_buf())
            .collect();

        let mut entries = tokio::fs::read_dir(&self.config.temp_root).await?;
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_session_dir(&path, &self.config.temp_prefix) || live.contains(&path) {
                continue;
            }
            if !entry.file_type().await.is_ok_and(|kind| kind.is_dir()) {
                continue;
            }
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!(path = %path.display(), "Removed stale session storage");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove stale storage");
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Cleaned up storage from previous runs");
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .field("leased_ports", &self.ports.leased_count())
            .finish()
    }
}

fn is_http_link(input: &str) -> bool {
    let lower = input.get(..8).unwrap_or(input).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn is_session_dir(path: &Path, prefix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(prefix))
}

/// Stops an engine that never became part of a session.
async fn stop_engine(engine: Box<dyn TorrentEngine>, session_id: &str) {
    if let Err(e) = engine.shutdown().await {
        tracing::warn!(session_id, error = %e, "Engine shutdown failed while unwinding");
    }
}
