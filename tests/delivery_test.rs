//! 投递客户端 HTTP 行为测试
//!
//! 使用 wiremock 模拟聊天服务端：
//! - 重试次数（失败时恰好重试一次）
//! - API / webhook 两种认证方式
//! - 目录查询失败时返回空列表

use build_notifier::{
    resolve, BuildContext, Color, DeliveryClient, GlobalConfig, JobConfig, Message,
    NotificationConfig, Notifier, NotifyFlags, NotifyResult, Outcome,
};
use build_notifier::notification::ChatUser;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> DeliveryClient {
    DeliveryClient::with_settings(Duration::from_secs(2), Duration::ZERO).unwrap()
}

fn api_config(server: &MockServer) -> NotificationConfig {
    NotificationConfig {
        api_token: "xoxb-test".to_string(),
        api_base_url: server.uri(),
        room: "#ci".to_string(),
        send_as: "ci-bot".to_string(),
        build_server_url: "https://ci.acme.dev/".to_string(),
        ..Default::default()
    }
}

/// blocking 客户端不能在 async 上下文里使用
async fn publish(message: Message, config: NotificationConfig) -> bool {
    tokio::task::spawn_blocking(move || client().publish(&message, &config))
        .await
        .unwrap()
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

// ============================================================================
// publish
// ============================================================================

mod publish_tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_success_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_partial_json(serde_json::json!({
                "text": "api - #3 Failure",
                "channel": "#ci",
                "username": "ci-bot",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let sent = publish(Message::new("api - #3 Failure", Color::Danger), api_config(&server)).await;
        assert!(sent);
    }

    #[tokio::test]
    async fn test_publish_500_retries_exactly_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sent = publish(Message::new("x", Color::Good), api_config(&server)).await;
        assert!(!sent);
        assert_eq!(request_count(&server).await, 2);
    }

    #[tokio::test]
    async fn test_publish_timeout_retries_exactly_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true}))
                    .set_delay(Duration::from_millis(800)),
            )
            .mount(&server)
            .await;

        let config = api_config(&server);
        let sent = tokio::task::spawn_blocking(move || {
            let client =
                DeliveryClient::with_settings(Duration::from_millis(200), Duration::ZERO).unwrap();
            client.publish(&Message::new("x", Color::Good), &config)
        })
        .await
        .unwrap();

        assert!(!sent);
        assert_eq!(request_count(&server).await, 2);
    }

    #[tokio::test]
    async fn test_publish_recovers_on_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let sent = publish(Message::new("x", Color::Good), api_config(&server)).await;
        assert!(sent);
        assert_eq!(request_count(&server).await, 2);
    }

    #[tokio::test]
    async fn test_publish_ok_false_body_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"ok": false, "error": "channel_not_found"}),
            ))
            .mount(&server)
            .await;

        let sent = publish(Message::new("x", Color::Good), api_config(&server)).await;
        assert!(!sent);
        assert_eq!(request_count(&server).await, 2);
    }

    /// 返回 200 头，但 body 比 Content-Length 短就断开连接
    fn spawn_truncated_responder() -> (String, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
        use std::io::{Read, Write};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);

                // 读完请求头和 body 再回复
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = stream.read(&mut buf).unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                    let text = String::from_utf8_lossy(&request).to_string();
                    if let Some(end) = text.find("\r\n\r\n") {
                        let length = text[..end]
                            .lines()
                            .find_map(|l| {
                                let (name, value) = l.split_once(':')?;
                                name.eq_ignore_ascii_case("content-length")
                                    .then(|| value.trim().parse::<usize>().ok())?
                            })
                            .unwrap_or(0);
                        if request.len() >= end + 4 + length {
                            break;
                        }
                    }
                }

                let _ = stream.write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 64\r\n\r\n{\"ok\"",
                );
                let _ = stream.flush();
            }
        });

        (format!("http://{}", addr), accepted)
    }

    #[tokio::test]
    async fn test_publish_truncated_body_is_failure() {
        let (uri, accepted) = spawn_truncated_responder();
        let config = NotificationConfig {
            api_token: "xoxb-test".to_string(),
            api_base_url: uri,
            room: "#ci".to_string(),
            ..Default::default()
        };

        let sent = publish(Message::new("x", Color::Good), config).await;
        assert!(!sent);
        assert_eq!(accepted.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_publish_webhook_token_in_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(query_param("token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let config = NotificationConfig {
            auth_token: "secret".to_string(),
            webhook_url: Some(format!("{}/hook", server.uri())),
            room: "#ci".to_string(),
            ..Default::default()
        };
        assert!(publish(Message::new("x", Color::Warning), config).await);
    }

    #[tokio::test]
    async fn test_publish_to_every_room() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"channel": "#a"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"channel": "#b"})))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let config = NotificationConfig {
            room: "#a, #b".to_string(),
            ..api_config(&server)
        };
        // #b 失败 → 整体失败
        assert!(!publish(Message::new("x", Color::Good), config).await);
        assert_eq!(request_count(&server).await, 3);
    }
}

// ============================================================================
// test_connection
// ============================================================================

mod connection_tests {
    use super::*;

    async fn test_connection(config: NotificationConfig) -> Result<String, String> {
        tokio::task::spawn_blocking(move || client().test_connection(&config))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_connection_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "text": "Build notifier: you're all set on https://ci.acme.dev/"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        assert_eq!(test_connection(api_config(&server)).await, Ok("Success".to_string()));
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        assert_eq!(test_connection(api_config(&server)).await, Err("Failure".to_string()));
    }
}

// ============================================================================
// list_users
// ============================================================================

mod directory_tests {
    use super::*;

    async fn list_users(config: NotificationConfig) -> Vec<ChatUser> {
        tokio::task::spawn_blocking(move || client().list_users(&config))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_users() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.list"))
            .and(header("authorization", "Bearer xoxb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "members": [
                    {"id": "U1", "name": "alice", "deleted": false},
                    {"id": "U2", "name": "ghost", "deleted": true},
                    {"id": "U3", "name": "bob"}
                ]
            })))
            .mount(&server)
            .await;

        let users = list_users(api_config(&server)).await;
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].name, "alice");
        assert!(users[1].deleted);
        assert!(!users[2].deleted);
    }

    #[tokio::test]
    async fn test_list_users_failures_are_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"ok": false, "error": "invalid_auth"}),
            ))
            .mount(&server)
            .await;

        assert!(list_users(api_config(&server)).await.is_empty());
        assert!(list_users(api_config(&server)).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_users_without_token() {
        let config = NotificationConfig::default();
        assert!(list_users(config).await.is_empty());
    }
}

// ============================================================================
// 端到端：配置回退 + 策略 + 组装 + 投递
// ============================================================================

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_global_defaults_used_for_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(query_param("token", "global-token"))
            .and(body_partial_json(serde_json::json!({
                "channel": "#builds",
                "text": "api - #8 Back to normal (https://ci.acme.dev/job/api/8/)"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let global = GlobalConfig {
            team_domain: "acme".to_string(),
            token: "global-token".to_string(),
            room: "#builds".to_string(),
            build_server_url: "https://ci.acme.dev".to_string(),
            webhook_url: Some(format!("{}/hook", server.uri())),
            ..Default::default()
        };
        let job = JobConfig {
            flags: NotifyFlags {
                notify_back_to_normal: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let config = resolve(&job, &global);
        let context = BuildContext::new("api", 8, Outcome::Success)
            .with_url("job/api/8/")
            .with_previous(Outcome::Failure);

        let result = tokio::task::spawn_blocking(move || {
            let notifier = Notifier::with_publisher(client());
            notifier.completed(&context, &config)
        })
        .await
        .unwrap();

        assert_eq!(result, NotifyResult::Sent(build_notifier::Framing::BackToNormal));
    }

    #[tokio::test]
    async fn test_endpoint_failure_does_not_escape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = NotificationConfig {
            flags: NotifyFlags {
                notify_failure: true,
                ..Default::default()
            },
            ..api_config(&server)
        };
        let context = BuildContext::new("api", 9, Outcome::Failure);

        let result = tokio::task::spawn_blocking(move || {
            Notifier::with_publisher(client()).completed(&context, &config)
        })
        .await
        .unwrap();

        assert_eq!(result, NotifyResult::Failed(build_notifier::Framing::Normal));
        assert_eq!(request_count(&server).await, 2);
    }
}
