use super::segments;
use super::types::{
    ApiResponse, EmojiReaction, EssenceMessage, ForwardNode, GroupInfo, GroupMemberInfo,
    GroupMessage, GroupNotice,
};
use crate::config::OneBotConfig;
use anyhow::{Context, Result, bail};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Gateway API calls wait this long for their correlated response frame.
const API_RESPONSE_TIMEOUT_SECS: u64 = 30;

/// Capacity of the normalized inbound message channel. Overflow beyond this
/// point applies backpressure to the parse tasks, not to the socket reader.
const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// OneBot 11 WebSocket client.
///
/// One reader task per connection; a single writer behind an async mutex.
/// Outbound API calls carry a monotonic `echo` and park on a oneshot channel
/// until the matching response frame arrives.
pub struct OneBotClient {
    cfg: OneBotConfig,
    writer: tokio::sync::Mutex<Option<WsSink>>,
    pending: std::sync::Mutex<HashMap<String, oneshot::Sender<ApiResponse>>>,
    echo_counter: AtomicU64,
    self_id: AtomicI64,
    inbound_tx: mpsc::Sender<GroupMessage>,
    running: AtomicBool,
    reconnecting: AtomicBool,
}

impl OneBotClient {
    /// Create an unconnected client. The returned receiver yields normalized
    /// group messages once `connect` succeeds.
    pub fn new(cfg: OneBotConfig) -> (Arc<Self>, mpsc::Receiver<GroupMessage>) {
        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let client = Arc::new(Self {
            cfg,
            writer: tokio::sync::Mutex::new(None),
            pending: std::sync::Mutex::new(HashMap::new()),
            echo_counter: AtomicU64::new(0),
            self_id: AtomicI64::new(0),
            inbound_tx: tx,
            running: AtomicBool::new(true),
            reconnecting: AtomicBool::new(false),
        });
        (client, rx)
    }

    pub fn self_id(&self) -> i64 {
        self.self_id.load(Ordering::Relaxed)
    }

    /// Used by tests and by the intake path when synthesizing outbound records.
    pub fn set_self_id(&self, id: i64) {
        self.self_id.store(id, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.running.load(Ordering::Relaxed) && !self.reconnecting.load(Ordering::Relaxed)
    }

    /// Dial the gateway and start the receive loop.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        let mut request = self
            .cfg
            .ws_url
            .as_str()
            .into_client_request()
            .context("invalid gateway ws_url")?;
        if !self.cfg.access_token.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", self.cfg.access_token))
                .context("invalid access token header")?;
            request.headers_mut().insert("Authorization", value);
        }

        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .context("gateway WebSocket connect failed")?;
        let (write, read) = stream.split();

        *self.writer.lock().await = Some(write);
        self.reconnecting.store(false, Ordering::Relaxed);

        let client = self.clone();
        tokio::spawn(async move {
            client.receive_loop(read).await;
        });

        info!("connected to gateway at {}", self.cfg.ws_url);
        Ok(())
    }

    async fn receive_loop(
        self: Arc<Self>,
        mut read: futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    ) {
        while let Some(frame) = read.next().await {
            if !self.running.load(Ordering::Relaxed) {
                return;
            }
            match frame {
                Ok(Message::Text(text)) => {
                    let Ok(event) = serde_json::from_str::<Value>(&text) else {
                        warn!("unparseable gateway frame ({} bytes)", text.len());
                        continue;
                    };
                    // API responses are answered inline; events go to their
                    // own task so reply/forward resolution (which itself calls
                    // the gateway) never blocks the reader.
                    if let Some(echo) = event.get("echo").and_then(Value::as_str) {
                        if !echo.is_empty() {
                            self.deliver_response(echo, &event);
                            continue;
                        }
                    }
                    let client = self.clone();
                    tokio::spawn(async move {
                        client.handle_event(event).await;
                    });
                }
                Ok(Message::Ping(data)) => {
                    if let Err(e) = self.send_raw(Message::Pong(data)).await {
                        warn!("failed to answer gateway ping: {}", e);
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("gateway closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("gateway read failed: {}", e);
                    break;
                }
            }
        }

        if self.running.load(Ordering::Relaxed) {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }
        let client = self.clone();
        let interval = self.cfg.reconnect_interval.max(1);
        tokio::spawn(async move {
            warn!("gateway disconnected, retrying every {}s", interval);
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(interval)).await;
                if !client.running.load(Ordering::Relaxed) {
                    return;
                }
                match client.connect().await {
                    Ok(()) => {
                        info!("gateway reconnected");
                        return;
                    }
                    Err(e) => warn!("gateway reconnect failed: {}", e),
                }
            }
        });
    }

    fn deliver_response(&self, echo: &str, event: &Value) {
        let sender = {
            let mut pending = self
                .pending
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            pending.remove(echo)
        };
        if let Some(tx) = sender {
            let resp = ApiResponse {
                status: event
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                retcode: event.get("retcode").and_then(Value::as_i64).unwrap_or(-1),
                data: event.get("data").cloned().unwrap_or(Value::Null),
                message: event
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            };
            let _ = tx.send(resp);
        }
    }

    async fn handle_event(self: Arc<Self>, event: Value) {
        match event.get("post_type").and_then(Value::as_str) {
            Some("meta_event") => {
                if event.get("meta_event_type").and_then(Value::as_str) == Some("lifecycle")
                    && event.get("sub_type").and_then(Value::as_str) == Some("connect")
                {
                    if let Some(self_id) = event.get("self_id").and_then(Value::as_i64) {
                        self.self_id.store(self_id, Ordering::Relaxed);
                        info!("bot online as {}", self_id);
                    }
                }
            }
            Some("message") => {
                if event.get("message_type").and_then(Value::as_str) != Some("group") {
                    return;
                }
                let Some(msg) = segments::parse_group_message(&self, &event).await else {
                    return;
                };
                if msg.message_id > 0 {
                    if let Err(e) = self.mark_msg_as_read(msg.message_id).await {
                        debug!("mark_msg_as_read failed: {}", e);
                    }
                }
                if self.inbound_tx.send(msg).await.is_err() {
                    debug!("inbound channel closed, dropping message");
                }
            }
            Some("notice") => {
                debug!(
                    "notice event: {}",
                    event.get("notice_type").and_then(serde_json::Value::as_str).unwrap_or("")
                );
            }
            Some("request") => {
                debug!(
                    "request event: {}",
                    event.get("request_type").and_then(serde_json::Value::as_str).unwrap_or("")
                );
            }
            _ => {}
        }
    }

    async fn send_raw(&self, msg: Message) -> Result<()> {
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(sink) => sink.send(msg).await.context("gateway write failed"),
            None => bail!("not connected to gateway"),
        }
    }

    /// Issue one gateway API call and wait for its correlated response.
    pub async fn call_api(&self, action: &str, params: Value) -> Result<Value> {
        let echo = self.echo_counter.fetch_add(1, Ordering::Relaxed).to_string();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self
                .pending
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            pending.insert(echo.clone(), tx);
        }

        let frame = json!({ "action": action, "params": params, "echo": echo });
        if let Err(e) = self.send_raw(Message::text(frame.to_string())).await {
            self.forget_pending(&echo);
            return Err(e);
        }

        let timeout = std::time::Duration::from_secs(API_RESPONSE_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(resp)) => {
                if resp.retcode != 0 {
                    bail!("gateway API '{}' failed [{}]: {}", action, resp.retcode, resp.message);
                }
                Ok(resp.data)
            }
            Ok(Err(_)) => bail!("gateway API '{}' response channel dropped", action),
            Err(_) => {
                self.forget_pending(&echo);
                bail!("gateway API '{}' timed out", action)
            }
        }
    }

    fn forget_pending(&self, echo: &str) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        pending.remove(echo);
    }

    // --- API surface -------------------------------------------------------

    /// Send a plain text group message. Returns the new message id.
    pub async fn send_group_msg(&self, group_id: i64, content: &str) -> Result<i64> {
        let data = self
            .call_api(
                "send_group_msg",
                json!({ "group_id": group_id, "message": content }),
            )
            .await?;
        Ok(data.get("message_id").and_then(Value::as_i64).unwrap_or(0))
    }

    /// Send a group message as a segment array: optional reply header,
    /// leading `at` segments, then the text.
    pub async fn send_group_msg_reply(
        &self,
        group_id: i64,
        content: &str,
        reply_to: i64,
        mentions: &[i64],
    ) -> Result<i64> {
        let mut message: Vec<Value> = Vec::new();
        if reply_to > 0 {
            message.push(json!({ "type": "reply", "data": { "id": reply_to.to_string() } }));
        }
        for uid in mentions {
            message.push(json!({ "type": "at", "data": { "qq": uid.to_string() } }));
        }
        let text = if mentions.is_empty() {
            content.to_string()
        } else {
            format!(" {}", content)
        };
        message.push(json!({ "type": "text", "data": { "text": text } }));

        let data = self
            .call_api(
                "send_group_msg",
                json!({ "group_id": group_id, "message": message }),
            )
            .await?;
        Ok(data.get("message_id").and_then(Value::as_i64).unwrap_or(0))
    }

    /// Send a local image file; `is_sticker` selects the sticker sub-type.
    pub async fn send_group_image(
        &self,
        group_id: i64,
        file_path: &str,
        is_sticker: bool,
    ) -> Result<i64> {
        let message = json!([{
            "type": "image",
            "data": {
                "file": format!("file:///{}", file_path.trim_start_matches('/')),
                "sub_type": i32::from(is_sticker),
            },
        }]);
        let data = self
            .call_api(
                "send_group_msg",
                json!({ "group_id": group_id, "message": message }),
            )
            .await?;
        Ok(data.get("message_id").and_then(Value::as_i64).unwrap_or(0))
    }

    pub async fn delete_msg(&self, message_id: i64) -> Result<()> {
        self.call_api("delete_msg", json!({ "message_id": message_id }))
            .await?;
        Ok(())
    }

    pub async fn get_msg(&self, message_id: i64) -> Result<Value> {
        self.call_api("get_msg", json!({ "message_id": message_id }))
            .await
    }

    pub async fn mark_msg_as_read(&self, message_id: i64) -> Result<()> {
        self.call_api("mark_msg_as_read", json!({ "message_id": message_id }))
            .await?;
        Ok(())
    }

    pub async fn group_poke(&self, group_id: i64, user_id: i64) -> Result<()> {
        self.call_api(
            "group_poke",
            json!({ "group_id": group_id, "user_id": user_id }),
        )
        .await?;
        Ok(())
    }

    pub async fn set_msg_emoji_like(&self, message_id: i64, emoji_id: i32) -> Result<()> {
        self.call_api(
            "set_msg_emoji_like",
            json!({ "message_id": message_id, "emoji_id": emoji_id }),
        )
        .await?;
        Ok(())
    }

    pub async fn get_group_info(&self, group_id: i64) -> Result<GroupInfo> {
        let data = self
            .call_api(
                "get_group_info",
                json!({ "group_id": group_id, "no_cache": false }),
            )
            .await?;
        Ok(GroupInfo {
            group_id: data.get("group_id").and_then(Value::as_i64).unwrap_or(group_id),
            group_name: str_of(&data, "group_name"),
            member_count: data.get("member_count").and_then(Value::as_i64).unwrap_or(0),
            max_member_count: data
                .get("max_member_count")
                .and_then(Value::as_i64)
                .unwrap_or(0),
        })
    }

    pub async fn get_group_member_info(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<GroupMemberInfo> {
        let data = self
            .call_api(
                "get_group_member_info",
                json!({ "group_id": group_id, "user_id": user_id, "no_cache": false }),
            )
            .await?;
        Ok(GroupMemberInfo {
            group_id,
            user_id: data.get("user_id").and_then(Value::as_i64).unwrap_or(user_id),
            nickname: str_of(&data, "nickname"),
            card: str_of(&data, "card"),
            role: str_of(&data, "role"),
            join_time: data.get("join_time").and_then(Value::as_i64).unwrap_or(0),
            last_sent_time: data
                .get("last_sent_time")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            title: str_of(&data, "title"),
        })
    }

    pub async fn get_group_notices(&self, group_id: i64) -> Result<Vec<GroupNotice>> {
        let data = self
            .call_api("_get_group_notice", json!({ "group_id": group_id }))
            .await?;
        let Some(list) = data.as_array() else {
            return Ok(vec![]);
        };
        Ok(list
            .iter()
            .map(|item| GroupNotice {
                notice_id: str_of(item, "notice_id"),
                sender_id: item.get("sender_id").and_then(Value::as_i64).unwrap_or(0),
                publish_time: item.get("publish_time").and_then(Value::as_i64).unwrap_or(0),
                content: item
                    .get("message")
                    .and_then(|m| m.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            })
            .collect())
    }

    pub async fn get_essence_messages(&self, group_id: i64) -> Result<Vec<EssenceMessage>> {
        let data = self
            .call_api("get_essence_msg_list", json!({ "group_id": group_id }))
            .await?;
        let Some(list) = data.as_array() else {
            return Ok(vec![]);
        };
        Ok(list
            .iter()
            .map(|item| EssenceMessage {
                message_id: item.get("message_id").and_then(Value::as_i64).unwrap_or(0),
                sender_id: item.get("sender_id").and_then(Value::as_i64).unwrap_or(0),
                sender_nick: str_of(item, "sender_nick"),
                operator_id: item.get("operator_id").and_then(Value::as_i64).unwrap_or(0),
                operator_nick: str_of(item, "operator_nick"),
                operator_time: item
                    .get("operator_time")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
                content: item
                    .get("content")
                    .and_then(Value::as_array)
                    .map(|segs| segments::extract_text_from_segments(segs))
                    .unwrap_or_default(),
            })
            .collect())
    }

    /// Reactions attached to a message, read off `get_msg`.
    pub async fn get_message_reactions(&self, message_id: i64) -> Result<Vec<EmojiReaction>> {
        let data = self.get_msg(message_id).await?;
        let Some(list) = data.get("emoji_likes_list").and_then(Value::as_array) else {
            return Ok(vec![]);
        };
        Ok(list
            .iter()
            .filter_map(|item| {
                let emoji_id = match item.get("emoji_id") {
                    Some(Value::String(s)) => s.parse().ok()?,
                    Some(Value::Number(n)) => n.as_i64()? as i32,
                    _ => return None,
                };
                Some(EmojiReaction {
                    emoji_id,
                    count: item.get("count").and_then(Value::as_i64).unwrap_or(0),
                })
            })
            .filter(|r| r.emoji_id > 0)
            .collect())
    }

    pub async fn get_forward_msg(&self, forward_id: &str) -> Result<Vec<ForwardNode>> {
        let data = self
            .call_api("get_forward_msg", json!({ "id": forward_id }))
            .await?;
        Ok(segments::parse_forward_nodes(&data))
    }

    /// Stop the client; the reader loop and reconnects wind down.
    pub async fn close(&self) {
        self.running.store(false, Ordering::Relaxed);
        let mut guard = self.writer.lock().await;
        if let Some(sink) = guard.as_mut() {
            let _ = sink.close().await;
        }
        *guard = None;
    }
}

fn str_of(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}
