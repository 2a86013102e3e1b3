//! HTTP envelope, image client and the commands built on them

use shizou_core::protocol::http::{AnimeRequest, HttpConfig, HttpSession};
use shizou_core::protocol::image::{ImageClient, ImageConfig};
use shizou_core::{
    BanGate, CommandArgs, CommandContext, CommandProcessor, CommandService, CommandSettings,
    Outcome, ProcessorConfig, QueueType, RunResult,
};
use shizou_test_utils::{instant_limiter, temp_database};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANIME_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<anime id="22" restricted="false">
  <type>TV Series</type>
  <titles>
    <title xml:lang="x-jat" type="main">Shinseiki Evangelion</title>
    <title xml:lang="en" type="official">Neon Genesis Evangelion</title>
  </titles>
  <picture>22.jpg</picture>
</anime>"#;

fn http_config(server: &MockServer) -> HttpConfig {
    let address = server.address();
    HttpConfig {
        host: address.ip().to_string(),
        port: address.port(),
        username: "tester".to_string(),
        password: "secret".to_string(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn http_session(server: &MockServer) -> HttpSession {
    HttpSession::new(
        http_config(server),
        instant_limiter("http"),
        BanGate::new("http", Duration::from_secs(3600)),
    )
    .unwrap()
}

fn image_client(server: &MockServer) -> ImageClient {
    ImageClient::new(
        ImageConfig {
            base_url: format!("{}/images", server.uri()),
            timeout: Duration::from_secs(5),
        },
        instant_limiter("image"),
    )
    .unwrap()
}

async fn mount_body(server: &MockServer, body: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/httpapi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_anime_request_sends_query_and_parses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/httpapi"))
        .and(query_param("request", "anime"))
        .and(query_param("aid", "22"))
        .and(query_param("client", "shizouhttp"))
        .and(query_param("clientver", "1"))
        .and(query_param("protover", "1"))
        .and(query_param("user", "tester"))
        .and(query_param("pass", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ANIME_XML))
        .expect(1)
        .mount(&server)
        .await;

    let session = http_session(&server);
    let outcome = session
        .execute(&AnimeRequest::new(22).unwrap())
        .await
        .unwrap();
    let anime = outcome.success().expect("anime");
    assert_eq!(anime.aid, 22);
    assert_eq!(anime.title.as_deref(), Some("Shinseiki Evangelion"));
    assert_eq!(anime.picture.as_deref(), Some("22.jpg"));
    assert_eq!(anime.xml, ANIME_XML);
}

#[tokio::test]
async fn test_banned_error_bans_and_short_circuits() {
    let server = MockServer::start().await;
    mount_body(&server, r#"<error code="500">banned</error>"#, 1).await;

    let session = http_session(&server);
    let request = AnimeRequest::new(1).unwrap();
    let outcome = session.execute(&request).await.unwrap();
    assert!(matches!(outcome, Outcome::Ban { .. }));
    assert!(session.ban_gate().is_banned());

    let outcome = session.execute(&request).await.unwrap();
    assert!(matches!(outcome, Outcome::Ban { .. }));
}

#[tokio::test]
async fn test_unknown_error_is_fatal() {
    let server = MockServer::start().await;
    mount_body(&server, "<error>Client Values Missing or Invalid</error>", 1).await;

    let session = http_session(&server);
    let outcome = session
        .execute(&AnimeRequest::new(1).unwrap())
        .await
        .unwrap();
    match outcome {
        Outcome::Fatal(reason) => assert!(reason.contains("Client Values Missing")),
        other => panic!("expected fatal, got {other:?}"),
    }
    assert!(!session.ban_gate().is_banned());
}

#[tokio::test]
async fn test_empty_body_is_possible_ban() {
    let server = MockServer::start().await;
    mount_body(&server, "", 1).await;

    let session = http_session(&server);
    let outcome = session
        .execute(&AnimeRequest::new(1).unwrap())
        .await
        .unwrap();
    assert_eq!(
        outcome.discard(),
        Outcome::Fatal("No HTTP response, may be banned".to_string())
    );
}

#[tokio::test]
async fn test_server_error_status_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let session = http_session(&server);
    let outcome = session
        .execute(&AnimeRequest::new(1).unwrap())
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::TransientError(_)));
}

#[tokio::test]
async fn test_missing_credentials_fail_before_io() {
    let server = MockServer::start().await;
    mount_body(&server, ANIME_XML, 0).await;

    let session = HttpSession::new(
        HttpConfig {
            username: String::new(),
            ..http_config(&server)
        },
        instant_limiter("http"),
        BanGate::new("http", Duration::from_secs(60)),
    )
    .unwrap();
    let outcome = session
        .execute(&AnimeRequest::new(1).unwrap())
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Fatal(_)));
}

#[tokio::test]
async fn test_image_fetch_writes_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/22.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("posters").join("22.jpg");

    let client = image_client(&server);
    let url = client.config().picture_url("22.jpg");
    let outcome = client.fetch(&url, &target).await.unwrap();

    assert_eq!(outcome, Outcome::Success(3));
    assert_eq!(tokio::fs::read(&target).await.unwrap(), vec![0xFF, 0xD8, 0xFF]);
}

#[tokio::test]
async fn test_missing_image_is_negative() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("missing.jpg");

    let client = image_client(&server);
    let url = client.config().picture_url("missing.jpg");
    let outcome = client.fetch(&url, &target).await.unwrap();

    assert!(matches!(outcome, Outcome::Negative(_)));
    assert!(!target.exists());
}

#[tokio::test]
async fn test_anime_command_caches_document_and_fetches_poster() {
    let server = MockServer::start().await;
    mount_body(&server, ANIME_XML, 1).await;
    Mock::given(method("GET"))
        .and(path("/images/22.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let (dir, db) = temp_database().await;
    let cache_dir = dir.path().join("cache");
    let service = CommandService::new(db);
    let settings = CommandSettings {
        cache_dir: cache_dir.clone(),
        ..Default::default()
    };
    let http_ban = BanGate::new("http", Duration::from_secs(3600));
    let context = Arc::new(
        CommandContext::new(service.clone(), settings)
            .with_http(Arc::new(http_session(&server)))
            .with_image(Arc::new(image_client(&server))),
    );
    let http = CommandProcessor::new(
        QueueType::AniDbHttp,
        ProcessorConfig::default(),
        service.clone(),
        context.clone(),
        http_ban,
    );
    let image = CommandProcessor::new(
        QueueType::Image,
        ProcessorConfig::default(),
        service.clone(),
        context,
        BanGate::new("image", Duration::from_secs(60)),
    );

    service.dispatch(&CommandArgs::Anime { aid: 22 }).await.unwrap();
    assert_eq!(http.run_once().await.unwrap(), RunResult::Executed);

    let cached = tokio::fs::read_to_string(cache_dir.join("anime").join("22.xml"))
        .await
        .unwrap();
    assert_eq!(cached, ANIME_XML);

    let queued = service.pending(Some(QueueType::Image)).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(
        CommandArgs::from_json(&queued[0].args).unwrap(),
        CommandArgs::GetImage {
            url: format!("{}/images/22.jpg", server.uri()),
            save_path: cache_dir.join("images").join("22.jpg"),
        }
    );

    assert_eq!(image.run_once().await.unwrap(), RunResult::Executed);
    assert_eq!(
        tokio::fs::read(cache_dir.join("images").join("22.jpg"))
            .await
            .unwrap(),
        b"jpeg".to_vec()
    );
}
