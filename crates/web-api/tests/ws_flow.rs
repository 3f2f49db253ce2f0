mod support;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;

use support::{
    authenticate, build_router, next_frame, recv_until_type, register_user, send_frame,
    spawn_server, ws_connect,
};

#[tokio::test]
async fn authenticated_connection_receives_welcome_sequence_in_order() {
    let (addr, shutdown_tx) = spawn_server(build_router()).await;
    let base = format!("http://{addr}");
    let client = Client::new();

    register_user(&client, &base, "alice").await;
    register_user(&client, &base, "bob").await;

    // alice 先上线并发一条消息，形成历史
    let mut alice = ws_connect(addr).await;
    authenticate(&mut alice, "alice").await;
    send_frame(&mut alice, json!({ "type": "send-message", "content": "hello" })).await;
    recv_until_type(&mut alice, "message").await;

    // bob 的欢迎序列：auth-success -> 历史回放 -> userList
    let mut bob = ws_connect(addr).await;
    send_frame(&mut bob, json!({ "type": "auth", "username": "bob", "password": "secret123" }))
        .await;

    let first = next_frame(&mut bob).await;
    assert_eq!(first["type"], "auth-success");
    assert_eq!(first["username"], "bob");
    assert!(first["userId"].as_i64().is_some());

    let mut saw_history_message = false;
    loop {
        let frame = next_frame(&mut bob).await;
        match frame["type"].as_str() {
            Some("message") => {
                assert_eq!(frame["content"], "hello");
                saw_history_message = true;
            }
            Some("system") => {} // 加入/离开通知也在历史里
            Some("userList") => {
                // 历史必须先于 userList 到达
                assert!(saw_history_message);
                let users = frame["users"].as_array().expect("users array");
                assert_eq!(users.len(), 2);
                break;
            }
            other => panic!("unexpected frame in welcome sequence: {other:?}"),
        }
    }

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn public_message_reaches_author_and_other_sessions() {
    let (addr, shutdown_tx) = spawn_server(build_router()).await;
    let base = format!("http://{addr}");
    let client = Client::new();

    register_user(&client, &base, "alice").await;
    register_user(&client, &base, "bob").await;

    let mut alice = ws_connect(addr).await;
    authenticate(&mut alice, "alice").await;
    let mut bob = ws_connect(addr).await;
    authenticate(&mut bob, "bob").await;

    send_frame(&mut alice, json!({ "type": "send-message", "content": "hi all" })).await;

    let to_bob = recv_until_type(&mut bob, "message").await;
    assert_eq!(to_bob["content"], "hi all");
    assert_eq!(to_bob["authorUsername"], "alice");

    // 发送者自己也收到同一条广播
    let to_alice = recv_until_type(&mut alice, "message").await;
    assert_eq!(to_alice["id"], to_bob["id"]);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn direct_message_is_delivered_to_both_parties() {
    let (addr, shutdown_tx) = spawn_server(build_router()).await;
    let base = format!("http://{addr}");
    let client = Client::new();

    register_user(&client, &base, "alice").await;
    let bob_json = register_user(&client, &base, "bob").await;
    let bob_id = bob_json["id"].as_i64().expect("bob id");

    let mut alice = ws_connect(addr).await;
    authenticate(&mut alice, "alice").await;
    let mut bob = ws_connect(addr).await;
    authenticate(&mut bob, "bob").await;

    send_frame(
        &mut alice,
        json!({ "type": "send-direct", "receiverId": bob_id, "content": "psst" }),
    )
    .await;

    let to_bob = recv_until_type(&mut bob, "direct-message").await;
    assert_eq!(to_bob["content"], "psst");
    assert_eq!(to_bob["senderUsername"], "alice");
    assert_eq!(to_bob["read"], false);

    // 发送方收到回显
    let echo = recv_until_type(&mut alice, "direct-message").await;
    assert_eq!(echo["id"], to_bob["id"]);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn mark_read_notifies_the_original_sender() {
    let (addr, shutdown_tx) = spawn_server(build_router()).await;
    let base = format!("http://{addr}");
    let client = Client::new();

    let alice_json = register_user(&client, &base, "alice").await;
    let alice_id = alice_json["id"].as_i64().expect("alice id");
    let bob_json = register_user(&client, &base, "bob").await;
    let bob_id = bob_json["id"].as_i64().expect("bob id");

    let mut alice = ws_connect(addr).await;
    authenticate(&mut alice, "alice").await;
    let mut bob = ws_connect(addr).await;
    authenticate(&mut bob, "bob").await;

    send_frame(
        &mut alice,
        json!({ "type": "send-direct", "receiverId": bob_id, "content": "psst" }),
    )
    .await;
    recv_until_type(&mut bob, "direct-message").await;

    send_frame(&mut bob, json!({ "type": "mark-read", "senderId": alice_id })).await;

    let receipt = recv_until_type(&mut alice, "messages-read").await;
    assert_eq!(receipt["senderId"], alice_id);
    assert_eq!(receipt["receiverId"], bob_id);

    // 存储侧同步可见：历史里的消息已读，未读计数清零
    let history = client
        .get(format!("{base}/api/messages/direct/{alice_id}/{bob_id}"))
        .send()
        .await
        .expect("direct history request")
        .json::<Vec<serde_json::Value>>()
        .await
        .expect("direct history json");
    assert!(!history.is_empty());
    assert!(history
        .iter()
        .filter(|m| m["senderId"] == alice_id)
        .all(|m| m["read"] == true));

    let unread = client
        .get(format!("{base}/api/messages/unread/{bob_id}"))
        .send()
        .await
        .expect("unread request")
        .json::<serde_json::Value>()
        .await
        .expect("unread json");
    assert!(unread.as_object().expect("object").is_empty());

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn disconnect_broadcasts_leave_notice_and_updated_user_list() {
    let (addr, shutdown_tx) = spawn_server(build_router()).await;
    let base = format!("http://{addr}");
    let client = Client::new();

    register_user(&client, &base, "alice").await;
    register_user(&client, &base, "bob").await;

    let mut alice = ws_connect(addr).await;
    authenticate(&mut alice, "alice").await;
    let mut bob = ws_connect(addr).await;
    authenticate(&mut bob, "bob").await;
    // 消费 bob 加入触发的广播
    recv_until_type(&mut alice, "userList").await;

    drop(bob);

    let notice = recv_until_type(&mut alice, "system").await;
    assert_eq!(notice["content"], "bob left the chat");

    let connection = recv_until_type(&mut alice, "connection").await;
    assert_eq!(connection["status"], "disconnected");
    assert_eq!(connection["username"], "bob");

    let user_list = recv_until_type(&mut alice, "userList").await;
    let users = user_list["users"].as_array().expect("users");
    let bob_entry = users
        .iter()
        .find(|u| u["username"] == "bob")
        .expect("bob still listed");
    assert_eq!(bob_entry["isOnline"], false);
    assert!(bob_entry["lastSeenAt"].is_string());

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn second_login_replaces_the_first_session() {
    let (addr, shutdown_tx) = spawn_server(build_router()).await;
    let base = format!("http://{addr}");
    let client = Client::new();

    register_user(&client, &base, "alice").await;
    register_user(&client, &base, "bob").await;

    let mut observer = ws_connect(addr).await;
    authenticate(&mut observer, "bob").await;

    let mut first = ws_connect(addr).await;
    authenticate(&mut first, "alice").await;

    let mut second = ws_connect(addr).await;
    authenticate(&mut second, "alice").await;

    // 旧连接被服务器关闭
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match first.next().await {
                Some(Ok(TungsteniteMessage::Close(_))) | None => return true,
                Some(Ok(_)) => continue,
                Some(Err(_)) => return true,
            }
        }
    })
    .await
    .expect("old connection should close");
    assert!(closed);

    // 新连接正常收发
    send_frame(&mut second, json!({ "type": "send-message", "content": "still here" })).await;
    let frame = recv_until_type(&mut second, "message").await;
    assert_eq!(frame["content"], "still here");

    // 旁观者没有看到 alice 的离开通知
    send_frame(&mut observer, json!({ "type": "send-message", "content": "ping" })).await;
    loop {
        let frame = next_frame(&mut observer).await;
        match frame["type"].as_str() {
            Some("system") => {
                assert_ne!(frame["content"], "alice left the chat");
            }
            Some("message") if frame["content"] == "ping" => break,
            _ => continue,
        }
    }

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn frames_before_authentication_are_discarded() {
    let (addr, shutdown_tx) = spawn_server(build_router()).await;
    let base = format!("http://{addr}");
    let client = Client::new();

    register_user(&client, &base, "alice").await;

    let mut ws = ws_connect(addr).await;
    send_frame(&mut ws, json!({ "type": "send-message", "content": "sneaky" })).await;

    // 未认证的业务帧没有任何响应
    let silence = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(silence.is_err(), "unauthenticated frame must be ignored");

    // 连接仍然可用，随后认证成功
    authenticate(&mut ws, "alice").await;

    // 被丢弃的消息没有进入历史
    let history = client
        .get(format!("{base}/api/messages"))
        .send()
        .await
        .expect("history request")
        .json::<Vec<serde_json::Value>>()
        .await
        .expect("history json");
    assert!(history.iter().all(|m| m["content"] != "sneaky"));

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn malformed_frame_yields_error_and_keeps_connection_alive() {
    let (addr, shutdown_tx) = spawn_server(build_router()).await;
    let base = format!("http://{addr}");
    let client = Client::new();

    register_user(&client, &base, "alice").await;

    let mut ws = ws_connect(addr).await;
    ws.send(TungsteniteMessage::Text("this is not json".into()))
        .await
        .expect("send garbage");

    let error = recv_until_type(&mut ws, "error").await;
    assert_eq!(error["message"], "invalid message format");

    // 无法识别的帧类型同样被拒绝
    send_frame(&mut ws, json!({ "type": "shutdown-server" })).await;
    recv_until_type(&mut ws, "error").await;

    authenticate(&mut ws, "alice").await;

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn failed_authentication_keeps_connection_open_for_retry() {
    let (addr, shutdown_tx) = spawn_server(build_router()).await;
    let base = format!("http://{addr}");
    let client = Client::new();

    register_user(&client, &base, "alice").await;

    let mut ws = ws_connect(addr).await;
    send_frame(&mut ws, json!({ "type": "auth", "username": "alice", "password": "wrong" }))
        .await;
    let error = recv_until_type(&mut ws, "auth-error").await;
    assert_eq!(error["message"], "invalid username or password");

    // 同一连接上重试成功
    authenticate(&mut ws, "alice").await;

    let _ = shutdown_tx.send(());
}
