use crate::agent::AnalystAgent;
use crate::cli::Args;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use axum::{ routing::get, Router, extract::State, response::IntoResponse, http::StatusCode };
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    busy: bool,
    use_chat_history: Option<bool>,
}

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Mutex<AnalystAgent>>,
    pub args: Args,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/reload-prompts", get(reload_prompts_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    http_port: u16,
    agent: Arc<Mutex<AnalystAgent>>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let tls_paths = match (&args.tls_cert_path, &args.tls_key_path) {
        (Some(cert), Some(key)) if args.enable_tls => Some((cert.clone(), key.clone())),
        _ => None,
    };
    let app = create_router(AppState { agent, args });

    if let Some((cert_path, key_path)) = tls_paths {
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        tokio::spawn(async move {
            let result = axum_server
                ::bind_rustls(addr, tls_config)
                .serve(app.into_make_service()).await;

            if let Err(e) = result {
                error!("HTTPS server error: {}", e);
            }
        });

        info!("HTTPS server started with TLS enabled");
    } else {
        tokio::spawn(async move {
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                        error!("HTTP server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                }
            }
        });

        info!("HTTP server started");
    }

    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    // a held lock means a cycle is running
    let (busy, use_chat_history) = match state.agent.try_lock() {
        Ok(agent) => (false, Some(agent.settings().use_chat_history)),
        Err(_) => (true, None),
    };
    axum::Json(HealthResponse {
        status: "ok",
        busy,
        use_chat_history,
    })
}

async fn reload_prompts_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut agent = match state.agent.try_lock() {
        Ok(g) => g,
        Err(_) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                axum::Json(ReloadResponse {
                    success: false,
                    message: "Agent busy".into(),
                }),
            ).into_response();
        }
    };

    let (code, success, message) = match agent.reload_prompts_if_changed(&state.args).await {
        Ok(true) => (StatusCode::OK, true, "Prompts reloaded".to_string()),
        Ok(false) => (StatusCode::OK, true, "Prompts unchanged".to_string()),
        Err(e) => {
            error!("Prompt reload failed: {}", e);
            (StatusCode::BAD_REQUEST, false, format!("Reload error: {}", e))
        }
    };

    (code, axum::Json(ReloadResponse { success, message })).into_response()
}
