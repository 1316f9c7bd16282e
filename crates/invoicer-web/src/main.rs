//! Invoicer Web - HTTP server for authoring and exporting bilingual invoices.

mod helpers;
mod routes;
mod state;
mod templates;

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{HeaderValue, header},
    routing::{get, post},
};
use clap::Parser;
use invoicer_core::{AppConfig, TranslatorConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use state::{AppState, SESSION_MAX_IDLE};

#[derive(Parser, Debug)]
#[command(name = "invoicer-web")]
#[command(author, version, about = "Bilingual invoice authoring server", long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// OpenAI API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: Option<String>,

    /// Model name for OpenAI-compatible API
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Config file (TOML)
    #[arg(short, long, env = "INVOICER_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path).context("Failed to load config file")?,
        None => AppConfig::load(),
    };

    if args.api_base.is_some() || args.api_key.is_some() || args.model.is_some() {
        let current = config.translator.clone();
        config.translator = TranslatorConfig {
            retry_count: current.retry_count,
            retry_delay_ms: current.retry_delay_ms,
            timeout_secs: current.timeout_secs,
            ..TranslatorConfig::new(
                args.api_base.clone().unwrap_or(current.api_base),
                args.api_key.clone().or(current.api_key),
                args.model.clone().unwrap_or(current.model),
            )
        };
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Build the router over `state`
fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Pages
        .route("/", get(routes::index))
        .route("/sessions/{session_id}", get(routes::session_page))
        // Sessions
        .route("/api/sessions", post(routes::create_session))
        .route("/api/sessions/{session_id}", get(routes::get_session))
        .route("/api/sessions/{session_id}/commands", post(routes::apply_commands))
        .route("/api/sessions/{session_id}/record", get(routes::get_record))
        .route(
            "/api/sessions/{session_id}/items/{index}/translate",
            post(routes::translate_item),
        )
        // Exports - binary responses
        .route("/api/sessions/{session_id}/export/pdf", get(routes::export_pdf))
        .route("/api/sessions/{session_id}/export/doc", get(routes::export_doc))
        .route("/api/sessions/{session_id}/preview", get(routes::preview))
        .route("/api/sessions/{session_id}/share", post(routes::share))
        // Descriptions
        .route("/api/translate", post(routes::translate))
        .route("/api/suggest", get(routes::suggest))
        // Templates
        .route(
            "/api/templates",
            get(routes::list_templates).put(routes::replace_templates),
        )
        // Middleware
        // Invoices change with every edit; exports set their own headers
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, max-age=0"),
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // sled logs every flush at debug
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},sled=warn")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = load_config(&args)?;

    // Opens the description store - fails fast if locked
    let state = Arc::new(
        AppState::new(config).context("Failed to initialize application state")?,
    );

    // Spawn background task for session cleanup (runs every 5 minutes)
    let cleanup_state = Arc::clone(&state);
    tokio::spawn(async move {
        let cleanup_interval = Duration::from_secs(5 * 60);
        loop {
            tokio::time::sleep(cleanup_interval).await;
            let removed = cleanup_state.cleanup_idle_sessions(SESSION_MAX_IDLE).await;
            info!("Session cleanup removed {} idle sessions", removed);
        }
    });

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use invoicer_core::config::Lang;
    use invoicer_core::translator::TranslatorInfo;
    use invoicer_core::{BilingualResolver, Translator, open_store};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct StubTranslator;

    #[async_trait]
    impl Translator for StubTranslator {
        fn info(&self) -> TranslatorInfo {
            TranslatorInfo {
                name: "Stub",
                requires_api_key: false,
                supports_transliteration: true,
            }
        }

        async fn translate(
            &self,
            text: &str,
            _source: &Lang,
            target: &Lang,
        ) -> invoicer_core::Result<String> {
            match (text, target.as_str()) {
                ("Tiles fitting", "gu") => Ok("ટાઇલ્સ ફિટિંગ".to_string()),
                ("ટાઇલ્સ ફિટિંગ", "en") => Ok("Tiles fitting".to_string()),
                _ => Ok(text.to_string()),
            }
        }
    }

    fn test_app() -> Router {
        let mut config = AppConfig::default();
        config.store.disk_enabled = false;

        let store = open_store(&config.store).unwrap();
        let resolver = BilingualResolver::new(Arc::new(StubTranslator), store, &config);
        let pipeline = state::web_pipeline(&config, None).unwrap();
        app(Arc::new(AppState::with_parts(resolver, pipeline, config)))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn new_session(app: &Router) -> String {
        let (status, body) = send(app, json_request("POST", "/api/sessions", &json!({}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let view: Value = serde_json::from_slice(&body).unwrap();
        view["sessionId"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_index_page() {
        let app = test_app();
        let (status, body) = send(&app, get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("Classic"));
    }

    #[tokio::test]
    async fn test_commands_update_totals() {
        let app = test_app();
        let id = new_session(&app).await;

        let commands = json!([
            {"type": "set_party_name", "value": "Patel Traders"},
            {"type": "update_item", "index": 0, "field": {"field": "quantity", "value": 4950.0}},
            {"type": "update_item", "index": 0, "field": {"field": "rate", "value": 33.33}},
        ]);
        let (status, body) = send(
            &app,
            json_request("POST", &format!("/api/sessions/{id}/commands"), &commands),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let view: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(view["revision"], 1);
        let subtotal = view["invoice"]["subtotal"].as_f64().unwrap();
        assert!((subtotal - 164_983.5).abs() < 1e-6);

        let (status, body) = send(&app, get_request(&format!("/sessions/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("1,64,983.50"));
    }

    #[tokio::test]
    async fn test_invalid_command_is_bad_request_and_atomic() {
        let app = test_app();
        let id = new_session(&app).await;

        let commands = json!([
            {"type": "set_party_name", "value": "Patel Traders"},
            {"type": "remove_item", "index": 7},
        ]);
        let (status, _) = send(
            &app,
            json_request("POST", &format!("/api/sessions/{id}/commands"), &commands),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, get_request(&format!("/api/sessions/{id}"))).await;
        let view: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(view["revision"], 0);
        assert_eq!(view["invoice"]["partyName"], "");
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let app = test_app();
        let (status, _) = send(&app, get_request("/api/sessions/not-a-uuid")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_translate_item_fills_translation() {
        let app = test_app();
        let id = new_session(&app).await;

        let command = json!({
            "type": "update_item", "index": 0,
            "field": {"field": "description", "value": "Tiles fitting"}
        });
        send(
            &app,
            json_request("POST", &format!("/api/sessions/{id}/commands"), &command),
        )
        .await;

        let (status, body) = send(
            &app,
            json_request("POST", &format!("/api/sessions/{id}/items/0/translate"), &json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let result: Value = serde_json::from_slice(&body).unwrap();
        assert!(result["warning"].is_null());
        assert_eq!(
            result["session"]["invoice"]["items"][0]["translatedDescription"],
            "ટાઇલ્સ ફિટિંગ"
        );
    }

    #[tokio::test]
    async fn test_suggest_after_translate() {
        let app = test_app();
        let (status, _) = send(
            &app,
            json_request("POST", "/api/translate", &json!({"text": "Tiles fitting"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get_request("/api/suggest?q=tiles")).await;
        assert_eq!(status, StatusCode::OK);
        let entries: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(entries.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_templates_rejects_empty() {
        let app = test_app();
        let (status, _) = send(&app, json_request("PUT", "/api/templates", &json!([]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            json_request("PUT", "/api/templates", &json!([{"id": "t1", "name": "Blue"}])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let list: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(list[0]["name"], "Blue");
    }

    #[tokio::test]
    async fn test_share_without_uploader_is_unavailable() {
        let app = test_app();
        let id = new_session(&app).await;
        let (status, _) = send(
            &app,
            json_request("POST", &format!("/api/sessions/{id}/share"), &json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_export_rejects_filesystem_logo() {
        let app = test_app();
        let id = new_session(&app).await;

        let commands = json!([
            {"type": "upsert_template", "template": {
                "id": "local-logo", "name": "Local logo", "logoUrl": "/etc/hostname",
                "toggles": {"showTax": true, "showContact": true, "showLogo": true}
            }},
            {"type": "select_template", "id": "local-logo"},
        ]);
        let (status, _) = send(
            &app,
            json_request("POST", &format!("/api/sessions/{id}/commands"), &commands),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            send(&app, get_request(&format!("/api/sessions/{id}/export/pdf"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(body).unwrap().contains("asset rejected"));
    }

    #[tokio::test]
    async fn test_doc_export_is_attachment() {
        let app = test_app();
        let id = new_session(&app).await;
        let response = app
            .clone()
            .oneshot(get_request(&format!("/api/sessions/{id}/export/doc")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment;"));
        assert!(disposition.ends_with(".doc\""));
    }
}
