use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ScanConfig;
use crate::error::ChannelError;
use crate::history::ScanHistory;
use crate::models::{ScannedItem, StockNotification};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    RetryScheduled,
}

#[derive(Debug)]
enum SessionEnd {
    OpenFailed,
    Closed(Option<CloseCode>),
    Dropped,
    Shutdown,
}

/// Derives the stock socket endpoint from the REST base:
/// `http://host/v1` becomes `ws://host/v1/ws/stock`.
pub fn notification_url(api_base: &str) -> Result<Url, ChannelError> {
    let mut url = Url::parse(api_base)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ChannelError::Scheme(other.to_string())),
    };
    url.set_scheme(scheme)
        .map_err(|_| ChannelError::Scheme(scheme.to_string()))?;
    let path = format!("{}/ws/stock", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Handles one inbound text frame. Malformed payloads are logged and
/// dropped; the history is left untouched.
pub async fn apply_message(history: &ScanHistory, text: &str) -> Option<ScannedItem> {
    let notification = match StockNotification::parse(text) {
        Ok(notification) => notification,
        Err(e) => {
            warn!(error = %e, "discarding malformed stock notification");
            return None;
        }
    };

    match notification {
        StockNotification::StockIn(event) => {
            let (barcode, location) = (event.barcode.clone(), event.location.clone());
            let item = history
                .upsert_with(&barcode, &location, |existing| {
                    // A name already shown for this slot may be more up to
                    // date than the one the server echoes back.
                    let known_name = existing.map(|item| item.item_name.clone());
                    ScannedItem::from_scan(event.into_scan(known_name))
                })
                .await;
            debug!(%barcode, %location, quantity = item.quantity, "stock_in notification");
            Some(item)
        }
        StockNotification::Other(kind) => {
            debug!(%kind, "ignoring notification");
            None
        }
    }
}

struct PendingRetry {
    ticket: u64,
    handle: JoinHandle<()>,
}

struct Session {
    ticket: u64,
    close_tx: Option<oneshot::Sender<()>>,
}

#[derive(Default)]
struct Tasks {
    retry: Option<PendingRetry>,
    session: Option<Session>,
    next_ticket: u64,
}

impl Tasks {
    fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }
}

struct Shared {
    url: Url,
    reconnect_delay: Duration,
    history: ScanHistory,
    state: watch::Sender<ChannelState>,
    tasks: Mutex<Tasks>,
}

/// Live connection to the stock notification socket.
///
/// At most one session runs at a time and at most one reconnect timer is
/// pending. Handles are cheap to clone and share the same connection.
#[derive(Clone)]
pub struct NotificationChannel {
    shared: Arc<Shared>,
}

impl NotificationChannel {
    pub fn new(config: &ScanConfig, history: ScanHistory) -> Result<Self, ChannelError> {
        let url = notification_url(&config.api_base_url)?;
        Ok(Self::with_url(url, config.reconnect_delay(), history))
    }

    pub fn with_url(url: Url, reconnect_delay: Duration, history: ScanHistory) -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                url,
                reconnect_delay,
                history,
                state,
                tasks: Mutex::new(Tasks::default()),
            }),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    pub fn has_pending_retry(&self) -> bool {
        self.tasks().retry.is_some()
    }

    /// Opens the socket unless a session is already opening or open.
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let mut tasks = self.tasks();
        match self.state() {
            ChannelState::Connecting => {
                debug!("stock channel is already connecting");
                return;
            }
            ChannelState::Connected => {
                debug!("stock channel is already connected");
                return;
            }
            ChannelState::Disconnected | ChannelState::RetryScheduled => {}
        }

        if let Some(pending) = tasks.retry.take() {
            pending.handle.abort();
        }

        let ticket = tasks.ticket();
        let (close_tx, close_rx) = oneshot::channel();
        tasks.session = Some(Session {
            ticket,
            close_tx: Some(close_tx),
        });
        self.set_state(ChannelState::Connecting);
        info!(url = %self.shared.url, "connecting to stock channel");

        let channel = self.clone();
        tokio::spawn(async move {
            let end = channel.run_session(ticket, close_rx).await;
            channel.session_ended(ticket, end);
        });
    }

    /// Closes the session with a normal close and cancels any pending
    /// reconnect. No reconnect follows.
    pub fn disconnect(&self) {
        let mut tasks = self.tasks();
        if let Some(pending) = tasks.retry.take() {
            pending.handle.abort();
        }
        if let Some(mut session) = tasks.session.take() {
            if let Some(close_tx) = session.close_tx.take() {
                let _ = close_tx.send(());
            }
        }
        self.set_state(ChannelState::Disconnected);
    }

    async fn run_session(&self, ticket: u64, close_rx: oneshot::Receiver<()>) -> SessionEnd {
        let ws = match self.open().await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(error = %e, url = %self.shared.url, "failed to open stock channel");
                return SessionEnd::OpenFailed;
            }
        };
        if !self.session_opened(ticket) {
            return SessionEnd::Shutdown;
        }
        self.pump(ws, close_rx).await
    }

    async fn open(&self) -> Result<WsStream, ChannelError> {
        let (ws, _response) = connect_async(self.shared.url.as_str()).await?;
        Ok(ws)
    }

    async fn pump(&self, ws: WsStream, mut close_rx: oneshot::Receiver<()>) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                _ = &mut close_rx => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "client shutdown".into(),
                    };
                    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                        debug!(error = %e, "close frame not delivered");
                    }
                    return SessionEnd::Shutdown;
                }
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        apply_message(&self.shared.history, &text).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map(|f| f.code);
                        return SessionEnd::Closed(code);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "stock channel transport error");
                        return SessionEnd::Dropped;
                    }
                    None => return SessionEnd::Dropped,
                },
            }
        }
    }

    fn session_opened(&self, ticket: u64) -> bool {
        let tasks = self.tasks();
        match &tasks.session {
            Some(session) if session.ticket == ticket => {
                self.set_state(ChannelState::Connected);
                info!("stock channel connected");
                true
            }
            _ => false,
        }
    }

    fn session_ended(&self, ticket: u64, end: SessionEnd) {
        let mut tasks = self.tasks();
        let current = matches!(&tasks.session, Some(session) if session.ticket == ticket);
        if !current {
            // disconnect() already settled the state for this session
            debug!(?end, "stale stock channel session finished");
            return;
        }
        tasks.session = None;

        match end {
            SessionEnd::Closed(Some(CloseCode::Normal)) => {
                info!("stock channel closed normally");
                self.set_state(ChannelState::Disconnected);
            }
            SessionEnd::Shutdown => {
                self.set_state(ChannelState::Disconnected);
            }
            SessionEnd::Closed(code) => {
                warn!(?code, "stock channel closed abnormally");
                self.schedule_retry(&mut tasks);
            }
            SessionEnd::Dropped | SessionEnd::OpenFailed => {
                self.schedule_retry(&mut tasks);
            }
        }
    }

    fn schedule_retry(&self, tasks: &mut Tasks) {
        if let Some(pending) = tasks.retry.take() {
            pending.handle.abort();
        }
        let ticket = tasks.ticket();
        let delay = self.shared.reconnect_delay;
        let channel = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            channel.retry_fired(ticket);
        });
        tasks.retry = Some(PendingRetry { ticket, handle });
        self.set_state(ChannelState::RetryScheduled);
        info!(delay_ms = delay.as_millis() as u64, "stock channel reconnect scheduled");
    }

    fn retry_fired(&self, ticket: u64) {
        {
            let mut tasks = self.tasks();
            let current = tasks
                .retry
                .as_ref()
                .is_some_and(|pending| pending.ticket == ticket);
            if !current {
                return;
            }
            tasks.retry = None;
        }
        self.connect();
    }

    fn set_state(&self, state: ChannelState) {
        self.shared.state.send_replace(state);
    }

    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
