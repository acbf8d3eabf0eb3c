//! Notifier for the system-of-record backend
//!
//! Every call is fire-and-forget from the executors' point of view: a
//! failed notification is logged by the caller and never unwinds the
//! Telegram-side effect that preceded it. The backend reconciles on its
//! own schedule.

use crate::logger::{self, LogTag};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend returned {status} for {path}")]
    Status { status: u16, path: String },

    #[error("backend unreachable: {0}")]
    Transport(String),
}

/// A managed channel as the backend stores it. `access_hash` travels as a
/// string; the backend rejects it as a number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelRecord {
    pub id: i64,
    pub title: String,
    pub access_hash: String,
    pub is_vip: bool,
    pub owner_id: i64,
}

/// The backend operations the workers and payment glue need.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Record a paid 30-day subscription window starting today.
    async fn confirm_subscription(
        &self,
        usuario: i64,
        canal: i64,
        monto_total: f64,
    ) -> Result<(), BackendError>;

    /// Register a freshly created managed channel.
    async fn register_channel(&self, record: &ChannelRecord) -> Result<(), BackendError>;

    /// Drop the subscription row after the user left the channel.
    async fn delete_subscription(&self, usuario_id: i64, canal_id: i64)
        -> Result<(), BackendError>;

    /// Append a lifecycle event (e.g. `salida_canal`).
    async fn post_event(&self, tipo_evento: &str, usuario: i64, canal: i64)
        -> Result<(), BackendError>;

    /// Confirm an advertising campaign payment.
    async fn confirm_ad_payment(
        &self,
        alias: &str,
        monto: f64,
        user_id: i64,
    ) -> Result<(), BackendError>;
}

#[derive(Serialize)]
struct SubscriptionPayload {
    usuario: i64,
    canal: i64,
    fecha_inicio: String,
    fecha_fin: String,
    monto_total: f64,
}

#[derive(Serialize)]
struct EventPayload<'a> {
    tipo_evento: &'a str,
    timestamp: String,
    usuario: i64,
    canal: i64,
}

#[derive(Serialize)]
struct AdPaymentPayload<'a> {
    alias: &'a str,
    monto: f64,
    user_id: i64,
}

/// Production notifier over HTTP.
pub struct HttpBackend {
    base_url: String,
    http: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(
        &self,
        path: &str,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<(), BackendError> {
        let response = result.map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        logger::debug(LogTag::Backend, &format!("{} accepted", path));
        Ok(())
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn confirm_subscription(
        &self,
        usuario: i64,
        canal: i64,
        monto_total: f64,
    ) -> Result<(), BackendError> {
        let today = Utc::now().date_naive();
        let payload = SubscriptionPayload {
            usuario,
            canal,
            fecha_inicio: today.to_string(),
            fecha_fin: (today + Duration::days(30)).to_string(),
            monto_total,
        };
        let path = "/suscripcion_con_pago/";
        let result = self.http.post(self.url(path)).json(&payload).send().await;
        self.check(path, result).await
    }

    async fn register_channel(&self, record: &ChannelRecord) -> Result<(), BackendError> {
        let path = "/canal/";
        // the backend expects a list, even for a single channel
        let result = self
            .http
            .post(self.url(path))
            .json(&[record])
            .send()
            .await;
        self.check(path, result).await
    }

    async fn delete_subscription(
        &self,
        usuario_id: i64,
        canal_id: i64,
    ) -> Result<(), BackendError> {
        let path = "/suscripcion/delete";
        let result = self
            .http
            .delete(self.url(path))
            .query(&[("usuario_id", usuario_id), ("canal_id", canal_id)])
            .send()
            .await;
        self.check(path, result).await
    }

    async fn post_event(
        &self,
        tipo_evento: &str,
        usuario: i64,
        canal: i64,
    ) -> Result<(), BackendError> {
        let path = "/evento/";
        let payload = EventPayload {
            tipo_evento,
            timestamp: Utc::now().to_rfc3339(),
            usuario,
            canal,
        };
        let result = self.http.post(self.url(path)).json(&payload).send().await;
        self.check(path, result).await
    }

    async fn confirm_ad_payment(
        &self,
        alias: &str,
        monto: f64,
        user_id: i64,
    ) -> Result<(), BackendError> {
        let path = "/confirmar-pago-publicidad";
        let payload = AdPaymentPayload { alias, monto, user_id };
        let result = self.http.post(self.url(path)).json(&payload).send().await;
        self.check(path, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    /// One-shot HTTP stub: accepts a single connection, captures the full
    /// request (head + body) and answers with the given status.
    fn stub(status: u16) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).expect("read");
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let head = &text[..head_end];
                    let body_len = head
                        .lines()
                        .find_map(|l| {
                            let l = l.to_ascii_lowercase();
                            l.strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + body_len {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let reason = if status == 200 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {} {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                status, reason
            );
            stream.write_all(response.as_bytes()).expect("write");
            tx.send(String::from_utf8_lossy(&buf).to_string()).ok();
        });
        (format!("http://{}", addr), rx)
    }

    #[tokio::test]
    async fn test_register_channel_posts_array() {
        let (base, rx) = stub(200);
        let backend = HttpBackend::new(&base);
        let record = ChannelRecord {
            id: 1234567890,
            title: "Canal VIP".to_string(),
            access_hash: "987654321".to_string(),
            is_vip: true,
            owner_id: 7,
        };
        backend.register_channel(&record).await.expect("register");

        let request = rx.recv().expect("captured request");
        assert!(request.starts_with("POST /canal/ "));
        let body = request.split("\r\n\r\n").nth(1).expect("body");
        let parsed: serde_json::Value = serde_json::from_str(body).expect("json body");
        assert!(parsed.is_array());
        assert_eq!(parsed[0]["id"], 1234567890);
        assert_eq!(parsed[0]["access_hash"], "987654321");
        assert_eq!(parsed[0]["is_vip"], true);
    }

    #[tokio::test]
    async fn test_delete_subscription_uses_query_params() {
        let (base, rx) = stub(200);
        let backend = HttpBackend::new(&base);
        backend.delete_subscription(42, 1001).await.expect("delete");

        let request = rx.recv().expect("captured request");
        let first_line = request.lines().next().expect("request line");
        assert!(first_line.starts_with("DELETE /suscripcion/delete?"));
        assert!(first_line.contains("usuario_id=42"));
        assert!(first_line.contains("canal_id=1001"));
    }

    #[tokio::test]
    async fn test_confirm_subscription_spans_30_days() {
        let (base, rx) = stub(200);
        let backend = HttpBackend::new(&base);
        backend.confirm_subscription(42, 1001, 9.99).await.expect("confirm");

        let request = rx.recv().expect("captured request");
        assert!(request.starts_with("POST /suscripcion_con_pago/ "));
        let body = request.split("\r\n\r\n").nth(1).expect("body");
        let parsed: serde_json::Value = serde_json::from_str(body).expect("json body");
        let inicio: chrono::NaiveDate =
            parsed["fecha_inicio"].as_str().unwrap().parse().unwrap();
        let fin: chrono::NaiveDate = parsed["fecha_fin"].as_str().unwrap().parse().unwrap();
        assert_eq!(fin - inicio, Duration::days(30));
        assert_eq!(parsed["usuario"], 42);
        assert_eq!(parsed["monto_total"], 9.99);
    }

    #[tokio::test]
    async fn test_event_carries_type_and_parties() {
        let (base, rx) = stub(200);
        let backend = HttpBackend::new(&base);
        backend.post_event("salida_canal", 42, 1001).await.expect("event");

        let request = rx.recv().expect("captured request");
        assert!(request.starts_with("POST /evento/ "));
        let body = request.split("\r\n\r\n").nth(1).expect("body");
        let parsed: serde_json::Value = serde_json::from_str(body).expect("json body");
        assert_eq!(parsed["tipo_evento"], "salida_canal");
        assert_eq!(parsed["usuario"], 42);
        assert_eq!(parsed["canal"], 1001);
        assert!(parsed["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_non_2xx_is_an_error() {
        let (base, _rx) = stub(500);
        let backend = HttpBackend::new(&base);
        let err = backend
            .confirm_ad_payment("canal_vip", 50.0, 42)
            .await
            .expect_err("500 should fail");
        match err {
            BackendError::Status { status, .. } => assert_eq!(status, 500),
            other => panic!("wrong error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Port from a listener we immediately drop; nothing is listening.
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").expect("bind");
            l.local_addr().expect("addr")
        };
        let backend = HttpBackend::new(&format!("http://{}", addr));
        let err = backend.post_event("x", 1, 2).await.expect_err("no listener");
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
