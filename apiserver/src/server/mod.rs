//! The server module owns the API surface.  It drives the configuration
//! pipeline through the server::controller module and gates requests through
//! the session coordinator.
//!
//! Every request except token creation carries `Authorization: Bearer
//! <token>`.  Success responses are `text/plain` with the requested payload;
//! failures answer `Failed` with the mapped status code, and the
//! human-readable reason lands in the error-log ring.

mod controller;
mod error;

pub use error::Error;

use actix_web::{
    http::header, http::StatusCode, web, App, HttpRequest, HttpResponse, HttpServer, ResponseError,
};
use snafu::{ensure, OptionExt, ResultExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::exec::BirdExecutor;
use crate::logring::LogRing;
use crate::session::SessionManager;
use crate::{
    CANDIDATE_IDLE_TIMEOUT_SECS, DEFAULT_CONFIRM_TIMEOUT_SECS, LOG_RING_CAPACITY,
    SESSION_TIMEOUT_SECS,
};
use confmgr::{ConfigManager, SchemaValidator};
use confstore::{FileStore, JsonFileStore};
use controller::ConfigState;
use error::Result;

/// Everything the binary resolves from its command line.
#[derive(Debug)]
pub struct ServerSettings {
    pub address: String,
    pub port: u16,
    pub config_path: PathBuf,
    pub schema_path: PathBuf,
    pub exec_command: String,
    pub target_path: PathBuf,
}

/// Loads and validates the startup configuration, pushes its rendering to the
/// external daemon, then serves the API until shutdown.
pub async fn serve(settings: ServerSettings) -> Result<()> {
    // Schema first; it is compiled once and never reloaded.
    let schema_doc = JsonFileStore::new(&settings.schema_path)
        .load()
        .context(error::SchemaLoadSnafu)?;
    let schema_bytes = serde_json::to_vec(&schema_doc).context(error::SchemaSerializeSnafu)?;
    let validator = SchemaValidator::new(&schema_bytes).context(error::SchemaSnafu)?;
    info!("Loaded schema from '{}'", settings.schema_path.display());

    let running_store = JsonFileStore::new(&settings.config_path);
    let mut running = ConfigManager::new(running_store.clone());
    running.load().context(error::ConfigSnafu {
        op: "load startup config",
    })?;
    let startup = running.serialize().context(error::ConfigSnafu {
        op: "serialize startup config",
    })?;
    validator.validate(&startup).context(error::SchemaSnafu)?;
    info!(
        "Loaded and validated running config from '{}'",
        settings.config_path.display()
    );

    let target_store = FileStore::new(&settings.target_path);
    let executor = BirdExecutor::new(&settings.exec_command, target_store.uri())
        .context(error::ExecutorSetupSnafu)?;

    // Bring the on-disk target in line with the running document and have
    // the daemon check it before accepting any client.
    let rendered = birdconf::render(running.document().context(error::ConfigSnafu {
        op: "read startup config",
    })?)
    .context(error::RenderSnafu)?;
    target_store
        .save(rendered.as_bytes())
        .context(error::TargetWriteSnafu)?;
    executor.validate().context(error::ExternalSnafu)?;
    info!(
        "Rendered startup config to '{}' and validated it externally",
        settings.target_path.display()
    );

    let state = Arc::new(ConfigState::new(
        running,
        running_store,
        validator,
        target_store,
        executor,
    ));
    let sessions = SessionManager::new(Duration::from_secs(SESSION_TIMEOUT_SECS));
    let ring = Arc::new(LogRing::new(LOG_RING_CAPACITY));

    // An expired active session must not leave its candidate behind.
    let callback_state = state.clone();
    let callback_ring = ring.clone();
    let weak_sessions = Arc::downgrade(&sessions);
    sessions.register_expiration_callback("candidate-cleanup", move |token| {
        let sessions = match weak_sessions.upgrade() {
            Some(sessions) => sessions,
            None => return,
        };
        if sessions.active_token().as_deref() != Some(token) {
            return;
        }
        info!("Active session '{}' expired, discarding candidate", token);
        if let Err(e) = controller::delete_candidate(&callback_state) {
            error!("{}", e);
            callback_ring.append(format!(
                "Failed to discard candidate of expired session '{}': {}",
                token, e
            ));
        }
    });

    let shared = web::Data::new(SharedData {
        state,
        sessions,
        ring,
    });

    let bind_address = format!("{}:{}", settings.address, settings.port);
    let http_server = HttpServer::new(move || {
        App::new()
            .app_data(shared.clone())
            .configure(configure_routes)
    })
    .bind((settings.address.as_str(), settings.port))
    .context(error::BindAddressSnafu {
        address: bind_address.clone(),
    })?;

    info!("Started listening on {}", bind_address);
    http_server.run().await.context(error::ServerStartSnafu)
}

fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/session")
            .route("/token", web::post().to(post_token))
            .route("/token", web::delete().to(delete_token)),
    )
    .service(
        web::scope("/config")
            .route("/running", web::get().to(get_running))
            .route("/running/diff", web::get().to(get_running_diff))
            .route("/running/update", web::patch().to(patch_running_update))
            .route("/candidate", web::get().to(get_candidate))
            .route("/candidate", web::delete().to(delete_candidate))
            .route("/candidate/commit", web::post().to(post_commit))
            .route(
                "/candidate/commit-timeout",
                web::post().to(post_commit_timeout),
            )
            .route(
                "/candidate/commit-confirm",
                web::post().to(post_commit_confirm),
            )
            .route(
                "/candidate/commit-cancel",
                web::post().to(post_commit_cancel),
            ),
    )
    .service(web::scope("/logs").route("/latest/{count}", web::get().to(get_logs)));
}

/// SharedData is responsible for any data needed by web handlers that isn't
/// provided by the client in the request.
pub(crate) struct SharedData {
    state: Arc<ConfigState>,
    sessions: Arc<SessionManager>,
    ring: Arc<LogRing>,
}

impl SharedData {
    /// Records a failed request: the reason goes to the log and to the ring
    /// the `/logs` endpoint reads from.
    fn fail(&self, e: Error) -> Error {
        error!("{}", e);
        self.ring.append(e.to_string());
        e
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

// Handler methods called by the router

async fn post_token(body: web::Bytes, data: web::Data<SharedData>) -> Result<HttpResponse> {
    let token = String::from_utf8_lossy(&body).trim().to_string();
    if token.is_empty() {
        return Err(data.fail(error::EmptyInputSnafu { input: "token" }.build()));
    }

    data.sessions
        .register(&token)
        .context(error::SessionSnafu)
        .map_err(|e| data.fail(e))?;
    Ok(HttpResponse::Created().content_type("text/plain").finish())
}

async fn delete_token(req: HttpRequest, data: web::Data<SharedData>) -> Result<HttpResponse> {
    let token = bearer_token(&req).map_err(|e| data.fail(e))?;
    data.sessions
        .check(&token)
        .context(error::SessionSnafu)
        .map_err(|e| data.fail(e))?;

    let was_active = data.sessions.active_token().as_deref() == Some(token.as_str());
    data.sessions.cancel_once(&token);
    data.sessions.remove(&token);
    if was_active {
        // The active session takes its candidate with it.
        controller::delete_candidate(&data.state).map_err(|e| data.fail(e))?;
    }
    Ok(ok_empty())
}

async fn get_running(req: HttpRequest, data: web::Data<SharedData>) -> Result<HttpResponse> {
    let token = bearer_token(&req).map_err(|e| data.fail(e))?;
    data.sessions
        .check(&token)
        .context(error::SessionSnafu)
        .map_err(|e| data.fail(e))?;

    let body = controller::get_running(&data.state).map_err(|e| data.fail(e))?;
    Ok(ok_body(body))
}

async fn get_running_diff(
    req: HttpRequest,
    body: web::Bytes,
    data: web::Data<SharedData>,
) -> Result<HttpResponse> {
    let token = bearer_token(&req).map_err(|e| data.fail(e))?;
    data.sessions
        .check(&token)
        .context(error::SessionSnafu)
        .map_err(|e| data.fail(e))?;

    let patch = controller::diff_running(&data.state, &body).map_err(|e| data.fail(e))?;
    Ok(ok_body(patch))
}

async fn patch_running_update(
    req: HttpRequest,
    body: web::Bytes,
    data: web::Data<SharedData>,
) -> Result<HttpResponse> {
    let token = bearer_token(&req).map_err(|e| data.fail(e))?;
    // The first update of a session claims the active slot.
    data.sessions
        .set_active(&token)
        .context(error::SessionSnafu)
        .map_err(|e| data.fail(e))?;
    data.sessions.cancel_once(&token);

    let updated = controller::update_candidate(&data.state, &body);
    // Whatever happened, an idle candidate left behind must eventually go.
    arm_idle_timer(&data, &token);
    updated.map_err(|e| data.fail(e))?;
    Ok(ok_empty())
}

async fn get_candidate(req: HttpRequest, data: web::Data<SharedData>) -> Result<HttpResponse> {
    let token = bearer_token(&req).map_err(|e| data.fail(e))?;
    data.sessions
        .check_active(&token)
        .context(error::SessionSnafu)
        .map_err(|e| data.fail(e))?;

    let body = controller::get_candidate(&data.state).map_err(|e| data.fail(e))?;
    Ok(ok_body(body))
}

async fn post_commit(req: HttpRequest, data: web::Data<SharedData>) -> Result<HttpResponse> {
    let token = bearer_token(&req).map_err(|e| data.fail(e))?;
    data.sessions
        .check_active(&token)
        .context(error::SessionSnafu)
        .map_err(|e| data.fail(e))?;
    data.sessions.cancel_once(&token);

    controller::commit(&data.state).map_err(|e| data.fail(e))?;
    Ok(ok_empty())
}

async fn post_commit_timeout(
    req: HttpRequest,
    body: web::Bytes,
    data: web::Data<SharedData>,
) -> Result<HttpResponse> {
    let token = bearer_token(&req).map_err(|e| data.fail(e))?;
    data.sessions
        .check_active(&token)
        .context(error::SessionSnafu)
        .map_err(|e| data.fail(e))?;

    let input = String::from_utf8_lossy(&body).trim().to_string();
    let timeout_secs: u64 = if input.is_empty() {
        DEFAULT_CONFIRM_TIMEOUT_SECS
    } else {
        input
            .parse()
            .ok()
            .context(error::BadTimeoutSnafu { input: &input })
            .map_err(|e| data.fail(e))?
    };

    controller::start_confirm_window(&data.state, &token).map_err(|e| data.fail(e))?;
    data.sessions.cancel_once(&token);
    arm_confirm_timer(&data, &token, Duration::from_secs(timeout_secs));
    Ok(ok_empty())
}

async fn post_commit_confirm(
    req: HttpRequest,
    data: web::Data<SharedData>,
) -> Result<HttpResponse> {
    let token = bearer_token(&req).map_err(|e| data.fail(e))?;
    data.sessions
        .check_active(&token)
        .context(error::SessionSnafu)
        .map_err(|e| data.fail(e))?;

    controller::commit_confirm(&data.state, &token).map_err(|e| data.fail(e))?;
    data.sessions.cancel_once(&token);
    Ok(ok_empty())
}

async fn post_commit_cancel(
    req: HttpRequest,
    data: web::Data<SharedData>,
) -> Result<HttpResponse> {
    let token = bearer_token(&req).map_err(|e| data.fail(e))?;
    data.sessions
        .check_active(&token)
        .context(error::SessionSnafu)
        .map_err(|e| data.fail(e))?;

    controller::commit_cancel(&data.state, &token).map_err(|e| data.fail(e))?;
    data.sessions.cancel_once(&token);
    Ok(ok_empty())
}

async fn delete_candidate(req: HttpRequest, data: web::Data<SharedData>) -> Result<HttpResponse> {
    let token = bearer_token(&req).map_err(|e| data.fail(e))?;
    data.sessions
        .check_active(&token)
        .context(error::SessionSnafu)
        .map_err(|e| data.fail(e))?;
    data.sessions.cancel_once(&token);

    controller::delete_candidate(&data.state).map_err(|e| data.fail(e))?;
    Ok(ok_empty())
}

async fn get_logs(
    req: HttpRequest,
    count: web::Path<usize>,
    data: web::Data<SharedData>,
) -> Result<HttpResponse> {
    let token = bearer_token(&req).map_err(|e| data.fail(e))?;
    data.sessions
        .check(&token)
        .context(error::SessionSnafu)
        .map_err(|e| data.fail(e))?;

    let entries = data.ring.read_last_n(count.into_inner());
    Ok(ok_body(entries.join("\n").into_bytes()))
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

// Helpers for handler methods called by the router

fn ok_empty() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").finish()
}

fn ok_body(body: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body(body)
}

/// Pulls the session token out of the `Authorization: Bearer <token>` header.
fn bearer_token(req: &HttpRequest) -> Result<String> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .context(error::MissingTokenSnafu)?;
    let token = value
        .trim()
        .strip_prefix("Bearer")
        .context(error::MissingTokenSnafu)?
        .trim();
    ensure!(!token.is_empty(), error::MissingTokenSnafu);
    Ok(token.to_string())
}

/// Re-arms the per-token idle timer that discards a candidate nobody touched
/// since the last update.
fn arm_idle_timer(data: &web::Data<SharedData>, token: &str) {
    let state = data.state.clone();
    let ring = data.ring.clone();
    let armed = data.sessions.arm_once(
        token,
        Duration::from_secs(CANDIDATE_IDLE_TIMEOUT_SECS),
        move |tok| {
            info!("Candidate of '{}' idled out, discarding", tok);
            if let Err(e) = controller::delete_candidate(&state) {
                error!("{}", e);
                ring.append(format!("Failed to discard idle candidate: {}", e));
            }
        },
    );
    if let Err(e) = armed {
        error!("Failed to arm idle timer for '{}': {}", token, e);
        data.ring.append(e.to_string());
    }
}

/// Arms the commit-confirmation window.  When it elapses, the daemon is
/// rolled back to the running configuration and the owner loses its lease.
fn arm_confirm_timer(data: &web::Data<SharedData>, token: &str, delay: Duration) {
    let state = data.state.clone();
    let ring = data.ring.clone();
    let weak_sessions = Arc::downgrade(&data.sessions);
    let armed = data.sessions.arm_once(token, delay, move |tok| {
        match controller::expire_confirm_window(&state, tok) {
            Ok(true) => {
                if let Some(sessions) = weak_sessions.upgrade() {
                    sessions.remove(tok);
                }
            }
            Ok(false) => {}
            Err(e) => {
                error!("{}", e);
                ring.append(format!(
                    "Rollback after elapsed confirmation window failed: {}",
                    e
                ));
            }
        }
    });
    if let Err(e) = armed {
        error!("Failed to arm confirmation window for '{}': {}", token, e);
        data.ring.append(e.to_string());
    }
}

// Can also override `error_response` if we want to change headers, content
// type, etc.
impl ResponseError for Error {
    /// Maps our error types to the HTTP code they should return.
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.response_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain")
            .body("Failed")
    }
}
