use anyhow::{Context, Result};
use chrono::Utc;
use invoicer_core::{
    AppConfig, AssetPolicy, AuthoringSession, BilingualResolver, ExportPipeline, Invoice,
    TemplateRegistry, Uploader, create_translator, create_uploader, generate_invoice_number,
    open_store,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// Sessions idle for longer than this are dropped by the cleanup task
pub const SESSION_MAX_IDLE: Duration = Duration::from_secs(3600);

/// Export pipeline for request-supplied templates: logos come from public URLs or `export.asset_dir`
pub fn web_pipeline(
    config: &AppConfig,
    uploader: Option<Arc<dyn Uploader>>,
) -> Result<ExportPipeline> {
    let policy = AssetPolicy::Untrusted {
        local_root: config.export.asset_dir.clone(),
    };
    ExportPipeline::new(config, uploader)
        .and_then(|pipeline| pipeline.with_asset_policy(policy))
        .context("Failed to set up export")
}

/// An authoring session and its bookkeeping
pub struct Session {
    pub authoring: AuthoringSession,
    pub last_access: Instant,
}

/// Global application state
pub struct AppState {
    /// Active sessions indexed by UUID
    sessions: RwLock<HashMap<Uuid, Session>>,
    /// Templates new sessions start with
    templates: RwLock<TemplateRegistry>,
    pub config: AppConfig,
    pub resolver: BilingualResolver,
    pub pipeline: ExportPipeline,
}

impl AppState {
    /// Build the translator, description store and export pipeline from `config`.
    ///
    /// Fails fast when the on-disk store is locked by another process.
    pub fn new(config: AppConfig) -> Result<Self> {
        let translator =
            create_translator(&config.translator).context("Failed to create translator")?;
        let store = open_store(&config.store).context("Failed to open description store")?;
        let uploader = create_uploader(&config.upload).context("Failed to configure uploads")?;
        let pipeline = web_pipeline(&config, uploader)?;

        Ok(Self::with_parts(
            BilingualResolver::new(translator, store, &config),
            pipeline,
            config,
        ))
    }

    /// Assemble state from prebuilt parts
    pub fn with_parts(
        resolver: BilingualResolver,
        pipeline: ExportPipeline,
        config: AppConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            templates: RwLock::new(TemplateRegistry::new()),
            config,
            resolver,
            pipeline,
        }
    }

    /// Create a session, starting from `invoice` or a fresh one.
    ///
    /// Returns the session ID as a string (for URL embedding).
    pub async fn create_session(&self, invoice: Option<Invoice>) -> String {
        let invoice = invoice.unwrap_or_else(|| {
            let now = Utc::now();
            let date = now.date_naive();
            let mut invoice = Invoice::new(generate_invoice_number(date), "", date, now);
            if let Err(e) = invoice.set_tax_rate(self.config.tax_rate) {
                warn!("Ignoring configured tax rate: {}", e);
            }
            invoice
        });

        let templates = self.templates.read().await.clone();
        let id = Uuid::new_v4();
        let session = Session {
            authoring: AuthoringSession::new(invoice, templates),
            last_access: Instant::now(),
        };

        self.sessions.write().await.insert(id, session);
        id.to_string()
    }

    /// Get a session by ID string.
    ///
    /// Returns `None` if the ID is not a valid UUID or session doesn't exist.
    pub async fn get_session(&self, id: &str) -> Option<SessionRef<'_>> {
        let uuid = Uuid::parse_str(id).ok()?;
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&uuid)?;
        session.last_access = Instant::now();
        Some(SessionRef {
            id: uuid,
            state: self,
        })
    }

    pub async fn default_templates(&self) -> TemplateRegistry {
        self.templates.read().await.clone()
    }

    /// Make `templates` the starting set for sessions created from now on
    pub async fn set_default_templates(&self, templates: TemplateRegistry) {
        *self.templates.write().await = templates;
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for longer than `max_idle`
    pub async fn cleanup_idle_sessions(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let before = sessions.len();

        sessions.retain(|_, session| now.duration_since(session.last_access) < max_idle);
        before - sessions.len()
    }
}

/// A borrowed reference to a session that provides safe access patterns.
///
/// Locks are only held inside synchronous closures, never across an `.await`:
///
/// ```ignore
/// // Good: Lock is released before any await
/// let tree = session.with_session(|s| s.authoring.render(&options)).await?;
/// pipeline.export_pdf(&tree).await;
/// ```
pub struct SessionRef<'a> {
    id: Uuid,
    state: &'a AppState,
}

impl SessionRef<'_> {
    /// Access session data immutably within a closure.
    pub async fn with_session<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&Session) -> R,
    {
        let sessions = self.state.sessions.read().await;
        sessions.get(&self.id).map(f)
    }

    /// Access session data mutably within a closure.
    pub async fn with_session_mut<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut sessions = self.state.sessions.write().await;
        sessions.get_mut(&self.id).map(f)
    }
}
