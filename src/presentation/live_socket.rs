// Live socket - Drives one DashboardSession over a WebSocket
use crate::application::dashboard_session::DashboardSession;
use crate::domain::mode::{HistoryWindow, Mode};
use crate::presentation::app_state::AppState;
use crate::presentation::protocol::{ClientCommand, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

type Sender = SplitSink<WebSocket, Message>;

pub async fn run_live_session(socket: WebSocket, state: Arc<AppState>, family: String) {
    let mut session = match state.sessions.open(&family).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Could not open session for {}: {}", family, e);
            return;
        }
    };
    tracing::info!("Live session opened for {}", family);

    let (mut sender, mut receiver) = socket.split();
    let mut mode_changes = session.subscribe();
    let mut feed = BroadcastStream::new(state.live_feed.subscribe());

    let mut opening = vec![ServerMessage::Mode(session.mode())];
    opening.extend(initial_view(&mut session).await);
    if !send_all(&mut sender, opening).await {
        session.shutdown();
        return;
    }

    loop {
        let outgoing: Vec<ServerMessage> = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_command(&mut session, &text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!("Live socket for {} errored: {}", family, e);
                    break;
                }
            },
            event = feed.next() => match event {
                Some(Ok(event)) => session
                    .handle_live(&event)
                    .map(ServerMessage::Series)
                    .into_iter()
                    .collect(),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    tracing::warn!("Live session for {} lagged, skipped {} samples", family, skipped);
                    continue;
                }
                None => break,
            },
            change = mode_changes.recv() => match change {
                Ok(change) => vec![ServerMessage::Mode(change)],
                Err(RecvError::Lagged(_)) => vec![ServerMessage::Mode(session.mode())],
                Err(RecvError::Closed) => break,
            },
        };

        if !send_all(&mut sender, outgoing).await {
            break;
        }
    }

    session.shutdown();
    tracing::info!("Live session closed for {}", session.family_id());
}

/// Warm-up traces when starting in Live, today's history otherwise.
async fn initial_view(session: &mut DashboardSession) -> Vec<ServerMessage> {
    if session.mode().mode == Mode::Live {
        return session
            .warm_up()
            .await
            .into_iter()
            .map(ServerMessage::Series)
            .collect();
    }

    match session.show_history(HistoryWindow::Today).await {
        Ok(Some(series)) => vec![ServerMessage::History { series }],
        Ok(None) => Vec::new(),
        Err(e) => vec![ServerMessage::Error {
            message: e.to_string(),
        }],
    }
}

async fn handle_command(session: &mut DashboardSession, text: &str) -> Vec<ServerMessage> {
    let command = match serde_json::from_str::<ClientCommand>(text) {
        Ok(command) => command,
        Err(e) => {
            return vec![ServerMessage::Error {
                message: format!("invalid command: {}", e),
            }];
        }
    };

    match command {
        ClientCommand::Override => vec![ServerMessage::OverrideResult {
            was_enforced: session.override_enforcement(),
        }],
        ClientCommand::Switch(request) => match request.window() {
            Ok(None) => {
                let was_live = session.mode().mode == Mode::Live;
                session.enter_live();
                let mut replies = vec![ServerMessage::SwitchResult { accepted: true }];
                if !was_live {
                    replies.extend(session.warm_up().await.into_iter().map(ServerMessage::Series));
                }
                replies
            }
            Ok(Some(window)) => match session.show_history(window).await {
                Ok(Some(series)) => vec![
                    ServerMessage::SwitchResult { accepted: true },
                    ServerMessage::History { series },
                ],
                Ok(None) => vec![ServerMessage::SwitchResult { accepted: false }],
                Err(e) => vec![ServerMessage::Error {
                    message: e.to_string(),
                }],
            },
            Err(e) => vec![ServerMessage::Error {
                message: e.to_string(),
            }],
        },
    }
}

/// Returns `false` once the client is gone.
async fn send_all(sender: &mut Sender, messages: Vec<ServerMessage>) -> bool {
    for message in messages {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to serialize live message: {}", e);
                continue;
            }
        };
        if sender.send(Message::Text(text)).await.is_err() {
            return false;
        }
    }
    true
}
