use crate::agent::AnalystAgent;
use crate::cli::Args;
use crate::error::AnalystError;
use crate::models::chat::{ ConversationContext, TurnOutcome };
use crate::models::websocket::{ ClientMessage, ServerMessage };

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };

use tokio_tungstenite::{ accept_hdr_async_with_config, WebSocketStream };
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response, ErrorResponse };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::protocol::{ Message, WebSocketConfig };
use tokio_rustls::TlsAcceptor;

use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };

use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use hmac::{ Hmac, Mac };
use sha2::Sha256;
use chrono::Utc;
use url::form_urlencoded;

use log::{ info, warn, error };
use futures::{ Sink, SinkExt, StreamExt };

type HmacSha256 = Hmac<Sha256>;

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;
const MAX_CLOCK_SKEW_SECS: i64 = 300;
const CONNECTIONS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => panic!("connection rate must be non-zero"),
};

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(CONNECTIONS_PER_SECOND));
}

fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let key = match pkcs8_private_keys(&mut key_reader).next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

pub async fn start_ws_server(
    addr: &str,
    agent: Arc<Mutex<AnalystAgent>>,
    api_key: Option<String>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    let tls_acceptor = if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let config = load_tls_config(cert_path, key_path)?;
                Some(TlsAcceptor::from(config))
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        None
    };
    let protocol = if tls_acceptor.is_some() { "WSS" } else { "WS" };
    info!("{} server listening on: {}", protocol, addr);

    let show_sql = args.show_sql;
    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let agent_clone = Arc::clone(&agent);
        let required_api_key = api_key.clone();
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        info!("TLS handshake successful for {}", peer);
                        process_connection(
                            peer,
                            tls_stream,
                            agent_clone,
                            required_api_key,
                            show_sql
                        ).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(peer, stream, agent_clone, required_api_key, show_sql).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

fn reject(reason: &str) -> ErrorResponse {
    let mut res = ErrorResponse::new(Some(reason.to_string()));
    *res.status_mut() = StatusCode::UNAUTHORIZED;
    res
}

/// `sig` is the hex HMAC-SHA256 of `ts` under the shared secret.
pub fn verify_signature(secret: &str, ts: &str, sig: &str, now: i64) -> Result<(), &'static str> {
    let ts_i: i64 = ts.parse().map_err(|_| "invalid timestamp")?;
    if (now - ts_i).abs() > MAX_CLOCK_SKEW_SECS {
        return Err("timestamp out of range");
    }

    let expected = hex::decode(sig).map_err(|_| "bad signature")?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "invalid secret")?;
    mac.update(ts.as_bytes());
    mac.verify_slice(&expected).map_err(|_| "bad signature")
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    agent_clone: Arc<Mutex<AnalystAgent>>,
    required_api_key: Option<String>,
    show_sql: bool
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let secret = match &required_api_key {
            Some(k) if !k.is_empty() => k,
            _ => {
                return Ok(response);
            }
        };

        let qs = req.uri().query().unwrap_or("");
        let params: HashMap<String, String> = form_urlencoded
            ::parse(qs.as_bytes())
            .into_owned()
            .collect();

        let ts = params.get("ts").map(|s| s.as_str());
        let sig = params.get("sig").map(|s| s.as_str());

        match (ts, sig) {
            (Some(ts), Some(sig)) => {
                match verify_signature(secret, ts, sig, Utc::now().timestamp()) {
                    Ok(()) => Ok(response),
                    Err(reason) => {
                        warn!("Rejected handshake from {}: {}", peer, reason);
                        Err(reject(reason))
                    }
                }
            }
            _ => Err(reject("missing ts/sig")),
        }
    };

    match accept_hdr_async_with_config(stream, auth_callback, Some(connection_config())).await {
        Ok(ws) => {
            handle_connection(peer, ws, agent_clone, show_sql).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

/// Frames and messages over the size cap fail while being read, before
/// tungstenite buffers the payload.
pub fn connection_config() -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_MESSAGE_SIZE);
    config.max_frame_size = Some(MAX_MESSAGE_SIZE);
    config
}

/// Turns a finished cycle into the message sent back to the client.
pub fn cycle_message(result: Result<TurnOutcome, AnalystError>, show_sql: bool) -> ServerMessage {
    match result {
        Ok(outcome) => ServerMessage::from_outcome(outcome, show_sql),
        Err(e) =>
            ServerMessage::Error {
                request_id: e.request_id().map(String::from),
                message: e.to_string(),
            },
    }
}

async fn send_message<S>(tx: &mut S, msg: &ServerMessage) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: Sink<Message> + Unpin, S::Error: std::fmt::Display
{
    let json = serde_json::to_string(msg)?;
    tx.send(Message::Text(json)).await.map_err(|e| format!("Failed to send message: {}", e))?;
    Ok(())
}

/// Each connection is one conversation; its context lives and dies with the socket.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<Mutex<AnalystAgent>>,
    show_sql: bool
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let (mut tx, mut rx) = websocket.split();
    let mut ctx = ConversationContext::new();
    info!("Assigned conversation ID {} to {}", ctx.id(), peer);

    let greeting = ServerMessage::History { turns: ctx.turns().to_vec() };
    if let Err(e) = send_message(&mut tx, &greeting).await {
        error!("Error sending greeting to {}: {}", peer, e);
        return;
    }

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Capacity(
                        CapacityError::MessageTooLong { size, max_size },
                    ) => {
                        warn!("Message from {} exceeds size limit ({} > {})", peer, size, max_size);
                        let error_msg = ServerMessage::Error {
                            message: "Message too large".to_string(),
                            request_id: None,
                        };
                        if let Err(e) = send_message(&mut tx, &error_msg).await {
                            error!("Failed to send size limit error to {}: {}", peer, e);
                        }
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Ping(ping_data) => {
                if tx.send(Message::Pong(ping_data)).await.is_err() {
                    error!("Failed to send pong to {}", peer);
                    break;
                }
                continue;
            }
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
                continue;
            }
            Message::Pong(_) | Message::Frame(_) => {
                continue;
            }
        };

        let reply = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Chat { content }) => {
                let question = content.trim();
                if question.is_empty() {
                    ServerMessage::Error {
                        message: "Question must not be empty".to_string(),
                        request_id: None,
                    }
                } else {
                    if let Err(e) = send_message(&mut tx, &ServerMessage::Processing).await {
                        error!("Error sending processing status to {}: {}", peer, e);
                        break;
                    }
                    let result = agent.lock().await.process_message(&mut ctx, question).await;
                    cycle_message(result, show_sql)
                }
            }
            Ok(ClientMessage::Suggestion { content }) => {
                if !ctx.suggestions().offered().contains(&content) {
                    warn!("Suggestion from {} was never offered: '{}'", peer, content);
                    ServerMessage::Error {
                        message: "Unknown suggestion".to_string(),
                        request_id: None,
                    }
                } else {
                    ctx.select_suggestion(content);
                    if let Err(e) = send_message(&mut tx, &ServerMessage::Processing).await {
                        error!("Error sending processing status to {}: {}", peer, e);
                        break;
                    }
                    match agent.lock().await.replay_suggestion(&mut ctx).await {
                        Some(result) => cycle_message(result, show_sql),
                        None => {
                            continue;
                        }
                    }
                }
            }
            Ok(ClientMessage::Clear) => {
                agent.lock().await.clear(&mut ctx);
                ServerMessage::History { turns: ctx.turns().to_vec() }
            }
            Err(e) => {
                error!("Failed to parse message from {}: {}", peer, e);
                ServerMessage::Error {
                    message: format!("Failed to parse message: {}", e),
                    request_id: None,
                }
            }
        };

        if let Err(e) = send_message(&mut tx, &reply).await {
            error!("Error sending reply to {}: {}", peer, e);
            break;
        }
    }
    info!("WebSocket connection closed for {} (Conv ID: {})", peer, ctx.id());
}
