//! Queue contract: dedupe, ordering and scheduling

use chrono::{Duration as ChronoDuration, Utc};
use shizou_core::database::Repository;
use shizou_core::{
    BanGate, CommandArgs, CommandProcessor, CommandService, Priority, ProcessorConfig, QueueType,
    RunResult,
};
use shizou_test_utils::{RecordingExecutor, temp_database};
use std::sync::Arc;
use std::time::Duration;

fn general_processor(
    service: &CommandService,
    executor: Arc<RecordingExecutor>,
) -> CommandProcessor {
    CommandProcessor::new(
        QueueType::General,
        ProcessorConfig::default(),
        service.clone(),
        executor,
        BanGate::new("general", Duration::from_secs(60)),
    )
}

#[tokio::test]
async fn test_duplicate_dispatch_leaves_one_request() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);

    assert!(service.dispatch(&CommandArgs::Noop { id: 5 }).await.unwrap());
    assert!(!service.dispatch(&CommandArgs::Noop { id: 5 }).await.unwrap());

    let pending = service.pending(None).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].command_id, "NoopCommand_5");
}

#[tokio::test]
async fn test_concurrent_dispatch_is_atomic() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let service = service.clone();
        tasks.spawn(async move { service.dispatch(&CommandArgs::Anime { aid: 1 }).await });
    }
    let mut inserted = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap().unwrap() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1);
    assert_eq!(service.stats().await.unwrap().pending_for(QueueType::AniDbHttp), 1);
}

#[tokio::test]
async fn test_dedupe_keeps_first_arguments() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);

    let first = CommandArgs::AddMyList {
        fid: 3,
        watched: Some(true),
        state: None,
    };
    let second = CommandArgs::AddMyList {
        fid: 3,
        watched: Some(false),
        state: None,
    };
    service.dispatch(&first).await.unwrap();
    service.dispatch(&second).await.unwrap();

    let pending = service.pending(Some(QueueType::AniDbUdp)).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(CommandArgs::from_json(&pending[0].args).unwrap(), first);
}

#[tokio::test]
async fn test_processor_serves_priority_then_fifo() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);
    let executor = Arc::new(RecordingExecutor::new());
    let processor = general_processor(&service, executor.clone());

    for (id, priority) in [
        (1, Priority::Low),
        (2, Priority::Urgent),
        (3, Priority::Normal),
        (4, Priority::Urgent),
    ] {
        service
            .dispatch_with_priority(&CommandArgs::Noop { id }, priority)
            .await
            .unwrap();
    }

    while processor.run_once().await.unwrap() == RunResult::Executed {}
    assert_eq!(
        executor.executed_ids(),
        vec!["NoopCommand_2", "NoopCommand_4", "NoopCommand_3", "NoopCommand_1"]
    );
    assert!(service.pending(None).await.unwrap().is_empty());
    assert_eq!(executor.idle_calls(), 1);
}

#[tokio::test]
async fn test_processor_only_drains_its_queue() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);
    let executor = Arc::new(RecordingExecutor::new());
    let processor = general_processor(&service, executor.clone());

    service.dispatch(&CommandArgs::Anime { aid: 1 }).await.unwrap();
    assert_eq!(processor.run_once().await.unwrap(), RunResult::Idle);
    assert!(executor.executed().is_empty());
    assert_eq!(service.pending(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreadable_args_are_removed() {
    let (_dir, db) = temp_database().await;
    sqlx::query(
        "INSERT INTO command_requests (command_id, priority, queue_type, args, created_at)
         VALUES ('Broken_1', 3, 'general', '{\"kind\":\"teleport\"}', 0)",
    )
    .execute(db.pool())
    .await
    .unwrap();
    let service = CommandService::new(db);
    let executor = Arc::new(RecordingExecutor::new());
    let processor = general_processor(&service, executor.clone());

    assert_eq!(processor.run_once().await.unwrap(), RunResult::Executed);
    assert!(executor.executed().is_empty());
    assert!(service.pending(None).await.unwrap().is_empty());
    assert_eq!(processor.status(), shizou_core::ProcessorStatus::Running);
}

#[tokio::test]
async fn test_due_scan_reschedules_recurring_command() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);
    let first_run = Utc::now() - ChronoDuration::seconds(5);

    service
        .schedule_command(
            &CommandArgs::Noop { id: 1 },
            Some(3),
            first_run,
            Some(Duration::from_secs(3600)),
        )
        .await
        .unwrap();

    assert_eq!(
        service
            .create_scheduled_commands(QueueType::General)
            .await
            .unwrap(),
        1
    );
    assert_eq!(service.pending(None).await.unwrap().len(), 1);

    let scheduled = service.scheduled().await.unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].runs_left, Some(2));
    assert_eq!(
        scheduled[0].next_run_time.timestamp_millis(),
        (first_run + ChronoDuration::hours(1)).timestamp_millis()
    );

    // Not due again within the same cycle
    assert_eq!(
        service
            .create_scheduled_commands(QueueType::General)
            .await
            .unwrap(),
        0
    );
    assert_eq!(service.pending(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_due_scan_removes_spent_commands() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);
    let past = Utc::now() - ChronoDuration::seconds(1);

    service
        .schedule_command(&CommandArgs::Noop { id: 1 }, Some(1), past, None)
        .await
        .unwrap();
    service
        .schedule_command(
            &CommandArgs::Noop { id: 2 },
            Some(1),
            past,
            Some(Duration::from_secs(60)),
        )
        .await
        .unwrap();

    assert_eq!(
        service
            .create_scheduled_commands(QueueType::General)
            .await
            .unwrap(),
        2
    );
    assert!(service.scheduled().await.unwrap().is_empty());
    assert_eq!(service.pending(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_due_scan_is_scoped_to_queue() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);
    service
        .schedule_command(
            &CommandArgs::Anime { aid: 4 },
            Some(1),
            Utc::now() - ChronoDuration::seconds(1),
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        service
            .create_scheduled_commands(QueueType::General)
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        service
            .create_scheduled_commands(QueueType::AniDbHttp)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_processor_tick_runs_due_scan() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);
    let executor = Arc::new(RecordingExecutor::new());
    let processor = general_processor(&service, executor.clone());

    service
        .schedule_command(
            &CommandArgs::Noop { id: 11 },
            Some(1),
            Utc::now() - ChronoDuration::seconds(1),
            None,
        )
        .await
        .unwrap();

    assert_eq!(processor.run_once().await.unwrap(), RunResult::Executed);
    assert_eq!(executor.executed_ids(), vec!["NoopCommand_11"]);
    assert_eq!(
        service.database().scheduled_commands().count().await.unwrap(),
        0
    );
}

/// Make the trigger due again without waiting for its interval
async fn make_due(service: &CommandService, command_id: &str) -> i64 {
    let due = (Utc::now() - ChronoDuration::seconds(5)).timestamp_millis();
    sqlx::query("UPDATE scheduled_commands SET next_run_time = ? WHERE command_id = ?")
        .bind(due)
        .bind(command_id)
        .execute(service.database().pool())
        .await
        .unwrap();
    due
}

#[tokio::test]
async fn test_rescheduling_keeps_existing_trigger() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);
    let first_run = Utc::now() + ChronoDuration::minutes(1);

    let first = service
        .schedule_command(
            &CommandArgs::Noop { id: 1 },
            Some(3),
            first_run,
            Some(Duration::from_secs(60)),
        )
        .await
        .unwrap();
    let second = service
        .schedule_command(&CommandArgs::Noop { id: 1 }, Some(1), Utc::now(), None)
        .await
        .unwrap();
    assert_eq!(first, second);

    let scheduled = service.scheduled().await.unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].runs_left, Some(3));
    assert_eq!(scheduled[0].interval_ms, Some(60_000));
    assert_eq!(
        scheduled[0].next_run_time.timestamp_millis(),
        first_run.timestamp_millis()
    );
}

#[tokio::test]
async fn test_recurring_trigger_fires_once_per_scan_until_spent() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);
    let command_id = "NoopCommand_3";

    service
        .schedule_command(
            &CommandArgs::Noop { id: 3 },
            Some(3),
            Utc::now() - ChronoDuration::seconds(5),
            Some(Duration::from_secs(60)),
        )
        .await
        .unwrap();

    for scan in 1..=3_i64 {
        let due = make_due(&service, command_id).await;
        assert_eq!(
            service
                .create_scheduled_commands(QueueType::General)
                .await
                .unwrap(),
            1,
            "scan {scan}"
        );
        let pending = service.pending(Some(QueueType::General)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].command_id, command_id);
        service
            .database()
            .command_requests()
            .clear_queue(QueueType::General)
            .await
            .unwrap();

        let remaining = service
            .database()
            .scheduled_commands()
            .find_by_command_id(command_id)
            .await
            .unwrap();
        if scan < 3 {
            let remaining = remaining.unwrap();
            assert_eq!(remaining.runs_left, Some(3 - scan));
            assert_eq!(remaining.next_run_time.timestamp_millis(), due + 60_000);
        } else {
            assert!(remaining.is_none());
        }
    }

    assert_eq!(
        service
            .create_scheduled_commands(QueueType::General)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_unlimited_trigger_is_never_deleted() {
    let (_dir, db) = temp_database().await;
    let service = CommandService::new(db);
    let command_id = "NoopCommand_4";

    service
        .schedule_command(
            &CommandArgs::Noop { id: 4 },
            None,
            Utc::now() - ChronoDuration::seconds(5),
            Some(Duration::from_secs(60)),
        )
        .await
        .unwrap();

    for _ in 0..5 {
        let due = make_due(&service, command_id).await;
        assert_eq!(
            service
                .create_scheduled_commands(QueueType::General)
                .await
                .unwrap(),
            1
        );

        let row = service
            .database()
            .scheduled_commands()
            .find_by_command_id(command_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.runs_left, None);
        assert_eq!(row.next_run_time.timestamp_millis(), due + 60_000);
    }
}
