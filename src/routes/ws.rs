//! WebSocket upgrade + message loop. Each connection owns one `GenerationSession`.
//! Long operations stream `progress` / `export_progress` events before their
//! final reply; everything else gets a single JSON message per request.

use std::{future::Future, sync::Arc};
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  http::{header, HeaderMap},
  response::IntoResponse,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, error, info, instrument};

use crate::export::DeviceCapabilities;
use crate::logic;
use crate::progress::{ChannelObserver, ExportStage, GenerationStage};
use crate::protocol::{ClientWsMessage, ExportFormat, ServerWsMessage};
use crate::session::GenerationSession;
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state, headers))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
  info!(target: "studysheet_backend", "WebSocket upgrade requested");
  let device = headers
    .get(header::USER_AGENT)
    .and_then(|v| v.to_str().ok())
    .map(DeviceCapabilities::from_user_agent)
    .unwrap_or_default();
  ws.on_upgrade(move |socket| handle_ws(socket, state, device))
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  if let Err(e) = socket.send(Message::Text(out)).await {
    error!(target: "studysheet_backend", error = %e, "WS send error");
    return false;
  }
  true
}

/// Run `work` to completion while forwarding its progress events to the socket.
async fn drive<T, S, F>(
  socket: &mut WebSocket,
  work: F,
  rx: &mut UnboundedReceiver<(S, u8)>,
  wrap: fn(S, u8) -> ServerWsMessage,
) -> T
where
  F: Future<Output = T>,
{
  tokio::pin!(work);
  let out = loop {
    tokio::select! {
      done = &mut work => break done,
      Some((stage, percent)) = rx.recv() => {
        send(socket, &wrap(stage, percent)).await;
      }
    }
  };
  while let Ok((stage, percent)) = rx.try_recv() {
    send(socket, &wrap(stage, percent)).await;
  }
  out
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, device: DeviceCapabilities) {
  info!(target: "studysheet_backend", "WebSocket connected");
  let mut session = GenerationSession::new();
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "studysheet_backend", kind = kind_of(&incoming), "WS message received");
            handle_client_ws(incoming, &mut socket, &state, &mut session, device).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };
        if !send(&mut socket, &reply).await {
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "studysheet_backend", "WebSocket disconnected");
}

/// Message name for logs; payloads may carry whole sheets or snapshots.
fn kind_of(msg: &ClientWsMessage) -> &'static str {
  match msg {
    ClientWsMessage::Ping => "ping",
    ClientWsMessage::Generate(_) => "generate",
    ClientWsMessage::Fallback(_) => "fallback",
    ClientWsMessage::Emergency { .. } => "emergency",
    ClientWsMessage::ExportPdf { .. } => "export_pdf",
    ClientWsMessage::ExportWeb { .. } => "export_web",
    ClientWsMessage::ExportJson { .. } => "export_json",
    ClientWsMessage::Reset => "reset",
  }
}

async fn handle_client_ws(
  msg: ClientWsMessage,
  socket: &mut WebSocket,
  state: &AppState,
  session: &mut GenerationSession,
  device: DeviceCapabilities,
) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Generate(req) => {
      let (tx, mut rx) = unbounded_channel::<(GenerationStage, u8)>();
      let observer = ChannelObserver::new(tx);
      let work = session.generate_content(state, &req, &observer);
      let ok = drive(socket, work, &mut rx, |stage, percent| ServerWsMessage::Progress { stage, percent }).await;
      info!(target: "studysheet_backend", %ok, fallback = session.is_fallback_mode, "WS generate finished");
      ServerWsMessage::Generation { ok, session: session.clone() }
    }

    ClientWsMessage::Fallback(req) => {
      session.generate_fallback(&req);
      ServerWsMessage::Generation { ok: true, session: session.clone() }
    }

    ClientWsMessage::Emergency { topic } => {
      let ok = session.generate_emergency_content(&topic);
      ServerWsMessage::Generation { ok, session: session.clone() }
    }

    ClientWsMessage::ExportPdf { mut content, snapshot, scale } => {
      content.recompute_metadata();
      let (tx, mut rx) = unbounded_channel::<(ExportStage, u8)>();
      let observer = Arc::new(ChannelObserver::new(tx));
      let work = logic::export_pdf(state, &content, &snapshot, scale, device, observer);
      let result = drive(socket, work, &mut rx, |stage, percent| ServerWsMessage::ExportProgress { stage, percent }).await;
      ServerWsMessage::Export { format: ExportFormat::Pdf, result }
    }

    ClientWsMessage::ExportWeb { mut content } => {
      content.recompute_metadata();
      ServerWsMessage::Export { format: ExportFormat::Web, result: logic::export_web(state, &content).await }
    }

    ClientWsMessage::ExportJson { mut content } => {
      content.recompute_metadata();
      ServerWsMessage::Export { format: ExportFormat::Json, result: logic::export_json(state, &content).await }
    }

    ClientWsMessage::Reset => {
      session.reset();
      ServerWsMessage::Generation { ok: true, session: session.clone() }
    }
  }
}
