//! WebSocket 连接处理器
//!
//! 驱动单条连接的完整生命周期：认证握手、入站帧的顺序处理、
//! 出站写任务，以及断开时的幂等清理。入站帧严格按到达顺序
//! 处理完一帧再取下一帧，同一用户的操作因此天然有序。

use axum::extract::ws::{Message as WsMessage, Utf8Bytes, WebSocket};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use application::{AuthError, SessionCommand, SessionHandle};
use domain::{ClientFrame, MessageContent, ServerFrame, UserId, Username};

use crate::state::AppState;

/// 单条 WebSocket 连接的处理器。
pub struct ChatConnection {
    state: AppState,
    session: Option<Session>,
}

/// 认证成功后的会话上下文。
struct Session {
    user_id: UserId,
    username: Username,
    connection_id: u64,
    handle: SessionHandle,
}

impl ChatConnection {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            session: None,
        }
    }

    /// 连接主循环。读端在当前任务内顺序消费，写端由独立任务
    /// 统一处理，两端通过指令通道解耦。
    pub async fn run(mut self, socket: WebSocket) {
        let (sink, mut incoming) = socket.split();
        let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(self.state.outbound_buffer);

        let write_task = tokio::spawn(Self::write_loop(sink, cmd_rx));

        while let Some(Ok(message)) = incoming.next().await {
            match message {
                WsMessage::Text(text) => self.handle_text(&text, &cmd_tx).await,
                WsMessage::Close(_) => {
                    debug!("client closed the connection");
                    break;
                }
                // ping/pong 由 axum 自动应答，二进制帧不在协议内
                WsMessage::Binary(_) => {
                    warn!("binary frame discarded");
                }
                _ => {}
            }
        }

        self.teardown().await;
        // 指令通道关闭后写任务自行退出
        drop(cmd_tx);
        let _ = write_task.await;
    }

    /// 写任务：串行消费投递指令，收到 Close 后关闭底层连接。
    async fn write_loop(
        mut sink: SplitSink<WebSocket, WsMessage>,
        mut cmd_rx: mpsc::Receiver<SessionCommand>,
    ) {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                SessionCommand::Deliver(frame) => {
                    let payload = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!(error = %err, "failed to serialize outbound frame");
                            continue;
                        }
                    };
                    if sink
                        .send(WsMessage::Text(Utf8Bytes::from(payload)))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                SessionCommand::Close => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                }
            }
        }
        debug!("websocket write task finished");
    }

    async fn handle_text(&mut self, text: &str, cmd_tx: &mpsc::Sender<SessionCommand>) {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(err) => {
                // 无法识别的帧被拒绝，连接保持存活
                warn!(error = %err, "malformed client frame discarded");
                Self::send(cmd_tx, ServerFrame::Error {
                    message: "invalid message format".into(),
                });
                return;
            }
        };

        match frame {
            ClientFrame::Auth { username, password } => {
                if self.session.is_some() {
                    warn!("duplicate auth frame on authenticated connection discarded");
                } else {
                    self.handle_auth(&username, &password, cmd_tx).await;
                }
            }
            frame => {
                // 认证前的业务帧直接丢弃
                let Some(session) = self.session.as_ref() else {
                    warn!(?frame, "frame before authentication discarded");
                    return;
                };
                match frame {
                    ClientFrame::SendMessage { content } => {
                        self.handle_send_message(session, content, cmd_tx).await;
                    }
                    ClientFrame::SendDirect {
                        receiver_id,
                        content,
                    } => {
                        self.handle_send_direct(session, UserId(receiver_id), content, cmd_tx)
                            .await;
                    }
                    ClientFrame::MarkRead { sender_id } => {
                        self.handle_mark_read(session, UserId(sender_id), cmd_tx)
                            .await;
                    }
                    // 上面的分支已经拦截
                    ClientFrame::Auth { .. } => {}
                }
            }
        }
    }

    async fn handle_auth(
        &mut self,
        username: &str,
        password: &str,
        cmd_tx: &mpsc::Sender<SessionCommand>,
    ) {
        let user = match self.state.verifier.verify(username, password).await {
            Ok(user) => user,
            Err(AuthError::InvalidCredentials) => {
                Self::send(cmd_tx, ServerFrame::AuthError {
                    message: "invalid username or password".into(),
                });
                return;
            }
            Err(AuthError::Unavailable(err)) => {
                warn!(error = %err, "credential check unavailable");
                Self::send(cmd_tx, ServerFrame::Error {
                    message: "operation failed, please try again".into(),
                });
                return;
            }
        };

        let handle = SessionHandle::new(user.id, user.username.clone(), cmd_tx.clone());
        let connection_id = handle.connection_id();
        let replaced = self.state.registry.register(handle.clone()).await;
        if replaced {
            info!(user_id = %user.id, "previous session replaced by new connection");
        }
        if let Err(err) = self.state.store.set_online(user.id, true).await {
            warn!(error = %err, "failed to persist online flag");
        }

        self.session = Some(Session {
            user_id: user.id,
            username: user.username.clone(),
            connection_id,
            handle: handle.clone(),
        });
        info!(user_id = %user.id, username = %user.username, "websocket session authenticated");

        // 本连接的私有序列：认证确认、历史回放、用户列表
        handle.deliver(ServerFrame::AuthSuccess {
            user_id: user.id,
            username: user.username.clone(),
        });
        match self.state.store.list_public_messages().await {
            Ok(history) => {
                for message in &history {
                    handle.deliver(ServerFrame::from_public_message(message));
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to replay message history");
                handle.deliver(ServerFrame::Error {
                    message: "failed to load message history".into(),
                });
            }
        }
        let presence = self.state.registry.presence_snapshot().await;
        handle.deliver(ServerFrame::user_list(presence));

        // 面向全体的序列：系统加入消息、上线通告、最新用户列表
        match self
            .state
            .store
            .append_system_message(format!("{} joined the chat", user.username))
            .await
        {
            Ok(joined) => {
                self.state
                    .broadcaster
                    .broadcast_all(ServerFrame::from_public_message(&joined))
                    .await;
            }
            Err(err) => warn!(error = %err, "failed to record join notice"),
        }
        self.state
            .broadcaster
            .broadcast_all(ServerFrame::connected(user.id, user.username.clone()))
            .await;
        self.state.broadcaster.broadcast_user_list().await;
    }

    async fn handle_send_message(
        &self,
        session: &Session,
        content: String,
        cmd_tx: &mpsc::Sender<SessionCommand>,
    ) {
        let content = match MessageContent::new(content) {
            Ok(content) => content,
            Err(err) => {
                Self::send(cmd_tx, ServerFrame::Error {
                    message: err.to_string(),
                });
                return;
            }
        };

        let stored = match self
            .state
            .store
            .append_public_message(application::NewPublicMessage {
                author_user_id: session.user_id,
                author_username: session.username.clone(),
                content,
            })
            .await
        {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "failed to persist public message");
                Self::send(cmd_tx, ServerFrame::Error {
                    message: "operation failed, please try again".into(),
                });
                return;
            }
        };

        self.state
            .broadcaster
            .broadcast_all(ServerFrame::from_public_message(&stored))
            .await;
    }

    async fn handle_send_direct(
        &self,
        session: &Session,
        receiver_id: UserId,
        content: String,
        cmd_tx: &mpsc::Sender<SessionCommand>,
    ) {
        let content = match MessageContent::new(content) {
            Ok(content) => content,
            Err(err) => {
                Self::send(cmd_tx, ServerFrame::Error {
                    message: err.to_string(),
                });
                return;
            }
        };

        let receiver = match self.state.store.find_user(receiver_id).await {
            Ok(Some(receiver)) => receiver,
            Ok(None) => {
                // 未知接收者静默丢弃，避免向发送方泄露用户存在性
                warn!(%receiver_id, "direct message to unknown receiver discarded");
                return;
            }
            Err(err) => {
                warn!(error = %err, "failed to resolve direct message receiver");
                Self::send(cmd_tx, ServerFrame::Error {
                    message: "operation failed, please try again".into(),
                });
                return;
            }
        };

        let stored = match self
            .state
            .store
            .append_direct_message(application::NewDirectMessage {
                sender_id: session.user_id,
                sender_username: session.username.clone(),
                receiver_id: receiver.id,
                receiver_username: receiver.username.clone(),
                content,
            })
            .await
        {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "failed to persist direct message");
                Self::send(cmd_tx, ServerFrame::Error {
                    message: "operation failed, please try again".into(),
                });
                return;
            }
        };

        // 双方都收到同一帧：接收方看到新私信，发送方得到回显
        let frame = ServerFrame::from_direct_message(&stored);
        self.state
            .broadcaster
            .deliver_to(receiver.id, frame.clone())
            .await;
        session.handle.deliver(frame);
    }

    async fn handle_mark_read(
        &self,
        session: &Session,
        sender_id: UserId,
        cmd_tx: &mpsc::Sender<SessionCommand>,
    ) {
        if let Err(err) = self
            .state
            .store
            .mark_read(sender_id, session.user_id)
            .await
        {
            warn!(error = %err, "failed to mark direct messages read");
            Self::send(cmd_tx, ServerFrame::Error {
                message: "operation failed, please try again".into(),
            });
            return;
        }

        // 通知原发送者：对方已读
        self.state
            .broadcaster
            .deliver_to(
                sender_id,
                ServerFrame::MessagesRead {
                    sender_id,
                    receiver_id: session.user_id,
                },
            )
            .await;
    }

    /// 断开清理。对被替换的旧连接是空操作，不会重复广播离开通知。
    async fn teardown(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        let was_current = self
            .state
            .registry
            .unregister(session.user_id, session.connection_id)
            .await;
        if !was_current {
            debug!(user_id = %session.user_id, "stale connection closed after replacement");
            return;
        }

        if let Err(err) = self.state.store.set_online(session.user_id, false).await {
            warn!(error = %err, "failed to persist offline flag");
        }
        if let Err(err) = self.state.store.touch_last_seen(session.user_id).await {
            warn!(error = %err, "failed to persist last seen timestamp");
        }

        match self
            .state
            .store
            .append_system_message(format!("{} left the chat", session.username))
            .await
        {
            Ok(left) => {
                self.state
                    .broadcaster
                    .broadcast_all(ServerFrame::from_public_message(&left))
                    .await;
            }
            Err(err) => warn!(error = %err, "failed to record leave notice"),
        }
        self.state
            .broadcaster
            .broadcast_all(ServerFrame::disconnected(
                session.user_id,
                session.username.clone(),
            ))
            .await;
        self.state.broadcaster.broadcast_user_list().await;

        info!(user_id = %session.user_id, "websocket session closed");
    }

    fn send(cmd_tx: &mpsc::Sender<SessionCommand>, frame: ServerFrame) {
        if cmd_tx.try_send(SessionCommand::Deliver(frame)).is_err() {
            debug!("outbound channel unavailable, frame dropped");
        }
    }
}

impl Drop for ChatConnection {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            debug!(user_id = %session.user_id, "connection dropped before teardown");
        }
    }
}
