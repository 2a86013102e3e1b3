//! Commands running through a processor against a scripted AniDB server

use shizou_core::protocol::udp::{MyListState, UdpSession};
use shizou_core::{
    BanGate, CommandArgs, CommandContext, CommandProcessor, CommandService, CommandSettings,
    ProcessorConfig, ProcessorStatus, QueueType, RunResult,
};
use shizou_test_utils::{
    FileBody, Reply, ScriptedDatagramTransport, instant_limiter, temp_database, test_udp_config,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    service: CommandService,
    transport: Arc<ScriptedDatagramTransport>,
    processor: CommandProcessor,
}

async fn udp_harness(replies: Vec<Reply>, settings: CommandSettings) -> Harness {
    let (dir, db) = temp_database().await;
    let service = CommandService::new(db);
    let transport = Arc::new(ScriptedDatagramTransport::new(replies));
    let ban = BanGate::new("udp", Duration::from_secs(3600));
    let session = UdpSession::new(
        test_udp_config(),
        transport.clone(),
        instant_limiter("udp"),
        ban.clone(),
    );
    let context = CommandContext::new(service.clone(), settings).with_udp(Arc::new(session));
    let processor = CommandProcessor::new(
        QueueType::AniDbUdp,
        ProcessorConfig::default(),
        service.clone(),
        Arc::new(context),
        ban,
    );
    Harness {
        _dir: dir,
        service,
        transport,
        processor,
    }
}

#[tokio::test]
async fn test_process_stores_result_and_queues_anime() {
    let h = udp_harness(
        vec![
            Reply::login("sess"),
            Reply::respond(220, "FILE", &FileBody::new(312498).anime(22).mylist(7).build()),
        ],
        CommandSettings::default(),
    )
    .await;

    h.service.dispatch(&CommandArgs::process_fid(312498)).await.unwrap();
    assert_eq!(h.processor.run_once().await.unwrap(), RunResult::Executed);

    assert_eq!(h.transport.commands(), vec!["AUTH", "FILE"]);
    assert!(h.service.pending(Some(QueueType::AniDbUdp)).await.unwrap().is_empty());

    let stored = h
        .service
        .database()
        .file_results()
        .find_by_fid(312498)
        .await
        .unwrap()
        .expect("stored result");
    assert_eq!(stored.anime_id, Some(22));
    assert_eq!(stored.mylist_id, Some(7));

    let http = h.service.pending(Some(QueueType::AniDbHttp)).await.unwrap();
    assert_eq!(http.len(), 1);
    assert_eq!(http[0].command_id, "AnimeCommand_22");
    assert_eq!(h.processor.status(), ProcessorStatus::Running);
}

#[tokio::test]
async fn test_empty_response_pauses_and_drops_command() {
    let h = udp_harness(
        vec![Reply::login("sess"), Reply::Silent],
        CommandSettings::default(),
    )
    .await;

    h.service.dispatch(&CommandArgs::process_fid(5)).await.unwrap();
    h.service.dispatch(&CommandArgs::process_fid(6)).await.unwrap();
    assert_eq!(h.processor.run_once().await.unwrap(), RunResult::Executed);

    assert_eq!(
        h.processor.status(),
        ProcessorStatus::Paused("No UDP response, may be banned".to_string())
    );
    let pending = h.service.pending(None).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].command_id, "ProcessCommand_fid=6");
    assert_eq!(h.processor.run_once().await.unwrap(), RunResult::Blocked);
}

#[tokio::test]
async fn test_banned_response_bans_processor() {
    let h = udp_harness(
        vec![
            Reply::login("sess"),
            Reply::respond(555, "BANNED", "Too many requests"),
        ],
        CommandSettings::default(),
    )
    .await;

    h.service.dispatch(&CommandArgs::process_fid(5)).await.unwrap();
    h.processor.run_once().await.unwrap();

    match h.processor.status() {
        ProcessorStatus::Banned { reason, .. } => assert_eq!(reason, "Too many requests"),
        other => panic!("expected ban, got {other:?}"),
    }
    let timer = h
        .service
        .database()
        .timers()
        .get("udp_ban")
        .await
        .unwrap()
        .expect("ban timer");
    assert_eq!(timer.reason.as_deref(), Some("Too many requests"));
    assert!(h.service.pending(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_no_such_file_is_not_a_failure() {
    let h = udp_harness(
        vec![
            Reply::login("sess"),
            Reply::respond(320, "NO SUCH FILE", ""),
        ],
        CommandSettings::default(),
    )
    .await;

    h.service
        .dispatch(&CommandArgs::process_hash(
            1024,
            "0123456789abcdef0123456789abcdef",
        ))
        .await
        .unwrap();
    h.processor.run_once().await.unwrap();

    assert_eq!(h.processor.status(), ProcessorStatus::Running);
    assert!(h.service.pending(None).await.unwrap().is_empty());
    assert!(h.transport.sent()[1].starts_with("FILE size=1024&ed2k=0123456789abcdef"));
}

#[tokio::test]
async fn test_process_adds_file_to_mylist_when_configured() {
    let settings = CommandSettings {
        add_to_mylist: true,
        mylist_state: MyListState::Internal,
        ..Default::default()
    };
    let h = udp_harness(
        vec![
            Reply::login("sess"),
            Reply::respond(220, "FILE", &FileBody::new(40).anime(3).build()),
            Reply::respond(210, "MYLIST ENTRY ADDED", "9001"),
        ],
        settings,
    )
    .await;

    h.service.dispatch(&CommandArgs::process_fid(40)).await.unwrap();
    assert_eq!(h.processor.run_once().await.unwrap(), RunResult::Executed);

    let udp = h.service.pending(Some(QueueType::AniDbUdp)).await.unwrap();
    assert_eq!(udp.len(), 1);
    assert_eq!(udp[0].command_id, "AddMyListCommand_fid=40");

    assert_eq!(h.processor.run_once().await.unwrap(), RunResult::Executed);
    assert!(h.transport.sent()[2].starts_with("MYLISTADD filestate=0&edit=0&state=1&fid=40"));

    let stored = h
        .service
        .database()
        .file_results()
        .find_by_fid(40)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.mylist_id, Some(9001));
}

#[tokio::test]
async fn test_update_mylist_edits_entry() {
    let h = udp_harness(
        vec![
            Reply::login("sess"),
            Reply::respond(311, "MYLIST ENTRY EDITED", "1"),
        ],
        CommandSettings::default(),
    )
    .await;

    h.service
        .dispatch(&CommandArgs::update_mylist(77, Some(true), None, None))
        .await
        .unwrap();
    h.processor.run_once().await.unwrap();

    assert_eq!(h.processor.status(), ProcessorStatus::Running);
    assert!(h.transport.sent()[1].starts_with("MYLISTADD filestate=0&edit=1&viewed=1&lid=77"));
}

#[tokio::test]
async fn test_missing_client_pauses_processor() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);
    let context = CommandContext::new(service.clone(), CommandSettings::default());
    let processor = CommandProcessor::new(
        QueueType::AniDbHttp,
        ProcessorConfig::default(),
        service.clone(),
        Arc::new(context),
        BanGate::new("http", Duration::from_secs(60)),
    );

    service.dispatch(&CommandArgs::Anime { aid: 1 }).await.unwrap();
    processor.run_once().await.unwrap();
    assert!(matches!(processor.status(), ProcessorStatus::Paused(_)));
}

#[tokio::test]
async fn test_hash_command_queues_lookup_by_hash() {
    let (dir, db) = temp_database().await;
    let path: PathBuf = dir.path().join("[Group] Show - 01.mkv");
    tokio::fs::write(&path, b"abc").await.unwrap();

    let service = CommandService::new(db);
    let context = CommandContext::new(service.clone(), CommandSettings::default());
    let processor = CommandProcessor::new(
        QueueType::Hash,
        ProcessorConfig::default(),
        service.clone(),
        Arc::new(context),
        BanGate::new("hash", Duration::from_secs(60)),
    );

    service
        .dispatch(&CommandArgs::Hash { path: path.clone() })
        .await
        .unwrap();
    assert_eq!(processor.run_once().await.unwrap(), RunResult::Executed);

    let udp = service.pending(Some(QueueType::AniDbUdp)).await.unwrap();
    assert_eq!(udp.len(), 1);
    assert_eq!(
        udp[0].command_id,
        "ProcessCommand_size=3_ed2k=a448017aaf21d8525fc10ae87aa6729d"
    );
}
