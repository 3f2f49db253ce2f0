//! 自动重连的 WebSocket 客户端
//!
//! 连接断开后按指数退避重试：`min(30s, 2^attempt * 1s + 随机抖动)`，
//! 连接成功后尝试计数归零。每次连上都会自动重发认证帧，
//! 调用方只需要消费事件流、往出站通道写业务帧。

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use domain::{ClientFrame, ServerFrame};

pub mod backoff;

pub use backoff::reconnect_delay;

/// 客户端连接配置。
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// ws:// 或 wss:// 地址
    pub url: String,
    pub username: String,
    pub password: String,
}

/// 客户端当前所处的连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connecting,
    Connected,
    Disconnected,
}

/// 推送给调用方的事件。
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StateChanged(ClientState),
    Frame(ServerFrame),
}

/// 发往驱动任务的出站句柄。克隆廉价。
#[derive(Clone)]
pub struct ClientHandle {
    outbound: mpsc::Sender<ClientFrame>,
}

impl ClientHandle {
    /// 发送一帧。连接断开期间的帧会排队，重连后继续发送。
    pub async fn send(&self, frame: ClientFrame) -> bool {
        self.outbound.send(frame).await.is_ok()
    }
}

/// 驱动任务的事件缓冲与出站队列容量。
const CHANNEL_CAPACITY: usize = 256;

/// 自动重连客户端。
///
/// 持有一个后台驱动任务：断线重连、重新认证、转发事件。
/// 实例被丢弃后驱动任务在下一次状态迁移时退出。
pub struct ReconnectingClient {
    handle: ClientHandle,
    events: mpsc::Receiver<ClientEvent>,
}

impl ReconnectingClient {
    /// 启动驱动任务并立即开始第一次连接。
    pub fn connect(config: ClientConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(drive(config, events_tx, outbound_rx));
        Self {
            handle: ClientHandle {
                outbound: outbound_tx,
            },
            events: events_rx,
        }
    }

    /// 下一个事件；驱动任务退出后返回 None。
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    pub async fn send(&self, frame: ClientFrame) -> bool {
        self.handle.send(frame).await
    }

    /// 可克隆的出站句柄，便于在多个任务里发送。
    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }
}

async fn drive(
    config: ClientConfig,
    events: mpsc::Sender<ClientEvent>,
    mut outbound: mpsc::Receiver<ClientFrame>,
) {
    let mut attempt: u32 = 0;
    loop {
        if events
            .send(ClientEvent::StateChanged(ClientState::Connecting))
            .await
            .is_err()
        {
            return;
        }

        match connect_async(config.url.as_str()).await {
            Ok((socket, _)) => {
                attempt = 0;
                info!(url = %config.url, "websocket connected");
                if events
                    .send(ClientEvent::StateChanged(ClientState::Connected))
                    .await
                    .is_err()
                {
                    return;
                }
                run_session(&config, &events, &mut outbound, socket).await;
            }
            Err(err) => {
                warn!(error = %err, "websocket connect failed");
            }
        }

        if events
            .send(ClientEvent::StateChanged(ClientState::Disconnected))
            .await
            .is_err()
        {
            return;
        }

        let jitter: f64 = rand::random();
        let delay = reconnect_delay(attempt, jitter);
        debug!(attempt, ?delay, "waiting before reconnect");
        tokio::time::sleep(delay).await;
        attempt = attempt.saturating_add(1);
    }
}

/// 单次连接的会话循环，连接断开时返回。
async fn run_session(
    config: &ClientConfig,
    events: &mpsc::Sender<ClientEvent>,
    outbound: &mut mpsc::Receiver<ClientFrame>,
    socket: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) {
    let (mut sink, mut stream) = socket.split();

    // 每次连上先重新认证
    let auth = ClientFrame::Auth {
        username: config.username.clone(),
        password: config.password.clone(),
    };
    if send_frame(&mut sink, &auth).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { return };
                if send_frame(&mut sink, &frame).await.is_err() {
                    return;
                }
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerFrame>(&text) {
                            Ok(frame) => {
                                if events.send(ClientEvent::Frame(frame)).await.is_err() {
                                    return;
                                }
                            }
                            Err(err) => {
                                warn!(error = %err, "unrecognized server frame discarded");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        debug!("server connection closed");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn send_frame<S>(sink: &mut S, frame: &ClientFrame) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let payload = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to serialize client frame");
            return Ok(());
        }
    };
    sink.send(Message::Text(payload.into())).await.map_err(|_| {
        warn!("failed to send frame, connection lost");
    })
}
