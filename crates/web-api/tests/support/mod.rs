#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};

use application::{
    InMemoryMessageStore, MessageStore, NewDirectMessage, NewPublicMessage, NewUser, StoreError,
};
use domain::{DirectMessage, PublicMessage, User, UserId};
use web_api::{router as build_router_fn, AppState};

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 测试用低 cost，避免 bcrypt 拖慢测试
const TEST_BCRYPT_COST: u32 = 4;

pub fn build_router() -> Router {
    let store: Arc<dyn MessageStore> = Arc::new(InMemoryMessageStore::new());
    build_router_fn(AppState::with_store(store, Some(TEST_BCRYPT_COST)))
}

pub fn build_router_with_store(store: Arc<dyn MessageStore>) -> Router {
    build_router_fn(AppState::with_store(store, Some(TEST_BCRYPT_COST)))
}

/// 在随机端口上启动服务，返回地址和关闭句柄。
pub async fn spawn_server(router: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    (addr, shutdown_tx)
}

pub async fn register_user(
    client: &reqwest::Client,
    base: &str,
    username: &str,
) -> Value {
    client
        .post(format!("{base}/api/register"))
        .json(&json!({ "username": username, "password": "secret123" }))
        .send()
        .await
        .expect("register request")
        .json::<Value>()
        .await
        .expect("register json")
}

pub async fn ws_connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");
    ws
}

pub async fn send_frame(ws: &mut Ws, frame: Value) {
    ws.send(TungsteniteMessage::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// 读取下一个文本帧并解析为 JSON，5 秒超时。
pub async fn next_frame(ws: &mut Ws) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .expect("websocket error");
        match message {
            TungsteniteMessage::Text(payload) => {
                return serde_json::from_str(&payload).expect("frame json");
            }
            TungsteniteMessage::Close(_) => panic!("connection closed while expecting frame"),
            _ => continue,
        }
    }
}

/// 持续读取帧，直到出现给定类型，返回该帧。中途的其他帧被丢弃。
pub async fn recv_until_type(ws: &mut Ws, frame_type: &str) -> Value {
    for _ in 0..50 {
        let frame = next_frame(ws).await;
        if frame["type"] == frame_type {
            return frame;
        }
    }
    panic!("frame of type {frame_type} never arrived");
}

/// 发送认证帧并消费完整的欢迎序列（auth-success / 历史 / userList）。
pub async fn authenticate(ws: &mut Ws, username: &str) -> Value {
    send_frame(ws, json!({ "type": "auth", "username": username, "password": "secret123" }))
        .await;
    let success = recv_until_type(ws, "auth-success").await;
    recv_until_type(ws, "userList").await;
    success
}

/// 可切换故障的存储包装，用于模拟下游不可用。
pub struct FlakyStore {
    inner: InMemoryMessageStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryMessageStore::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::unavailable("injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessageStore for FlakyStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.check()?;
        self.inner.find_user(id).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.check()?;
        self.inner.find_user_by_username(username).await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        self.check()?;
        self.inner.create_user(user).await
    }

    async fn set_online(&self, user_id: UserId, online: bool) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set_online(user_id, online).await
    }

    async fn touch_last_seen(&self, user_id: UserId) -> Result<(), StoreError> {
        self.check()?;
        self.inner.touch_last_seen(user_id).await
    }

    async fn append_public_message(
        &self,
        message: NewPublicMessage,
    ) -> Result<PublicMessage, StoreError> {
        self.check()?;
        self.inner.append_public_message(message).await
    }

    async fn append_system_message(&self, content: String) -> Result<PublicMessage, StoreError> {
        self.check()?;
        self.inner.append_system_message(content).await
    }

    async fn list_public_messages(&self) -> Result<Vec<PublicMessage>, StoreError> {
        self.check()?;
        self.inner.list_public_messages().await
    }

    async fn append_direct_message(
        &self,
        message: NewDirectMessage,
    ) -> Result<DirectMessage, StoreError> {
        self.check()?;
        self.inner.append_direct_message(message).await
    }

    async fn list_direct_messages(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Vec<DirectMessage>, StoreError> {
        self.check()?;
        self.inner.list_direct_messages(user_a, user_b).await
    }

    async fn list_direct_messages_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<DirectMessage>, StoreError> {
        self.check()?;
        self.inner.list_direct_messages_for_user(user_id).await
    }

    async fn mark_read(&self, sender_id: UserId, receiver_id: UserId) -> Result<(), StoreError> {
        self.check()?;
        self.inner.mark_read(sender_id, receiver_id).await
    }

    async fn unread_counts(&self, user_id: UserId) -> Result<HashMap<UserId, u64>, StoreError> {
        self.check()?;
        self.inner.unread_counts(user_id).await
    }
}
