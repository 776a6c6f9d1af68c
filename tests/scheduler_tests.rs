mod common;

use anicat::db::Store;
use anicat::domain::SourceId;
use anicat::jobs::Job;
use chrono::{Duration as ChronoDuration, Utc};
use common::{TestApp, short, temp_db_url, test_config};
use std::time::Duration;

const PERIOD: Duration = Duration::from_secs(2 * 3600);

#[tokio::test]
async fn never_refreshed_source_is_due() {
    let app = TestApp::new().await;
    app.adapter.set_page(1, vec![short("1", "A")], 1);

    assert_eq!(
        app.state.scheduler.remaining(SourceId::Animevost).await.unwrap(),
        Duration::ZERO
    );

    let next = app
        .state
        .scheduler
        .check_source(SourceId::Animevost)
        .await
        .unwrap();
    assert_eq!(next, PERIOD);
    assert_eq!(app.adapter.calls(), 1);
    assert_eq!(
        app.state.store.count_titles(SourceId::Animevost).await.unwrap(),
        1
    );

    let schedule = app
        .state
        .store
        .get_schedule(SourceId::Animevost)
        .await
        .unwrap()
        .unwrap();
    assert!(schedule.last_run_at.is_some());
    assert!(schedule.last_error.is_none());

    let remaining = app.state.scheduler.remaining(SourceId::Animevost).await.unwrap();
    assert!(remaining > PERIOD - Duration::from_secs(60));
    assert!(remaining <= PERIOD);
}

#[tokio::test]
async fn source_that_is_not_due_waits_without_refreshing() {
    let app = TestApp::new().await;
    let now = Utc::now();
    app.state
        .store
        .record_source_run(SourceId::Animevost, now + ChronoDuration::minutes(30), now, None)
        .await
        .unwrap();

    let next = app
        .state
        .scheduler
        .check_source(SourceId::Animevost)
        .await
        .unwrap();
    assert!(next > Duration::from_secs(29 * 60));
    assert!(next <= Duration::from_secs(30 * 60));
    assert_eq!(app.adapter.calls(), 0);
}

#[tokio::test]
async fn deadline_survives_a_restart() {
    let db_url = temp_db_url();
    {
        let app = TestApp::with_config(test_config(&db_url), None).await;
        app.adapter.set_page(1, vec![short("1", "A")], 1);
        app.state
            .scheduler
            .check_source(SourceId::Animevost)
            .await
            .unwrap();
    }

    let restarted = TestApp::with_config(test_config(&db_url), None).await;
    let remaining = restarted
        .state
        .scheduler
        .check_source(SourceId::Animevost)
        .await
        .unwrap();
    assert!(remaining > Duration::from_secs(3600));
    assert_eq!(restarted.adapter.calls(), 0);

    let store = Store::new(&db_url).await.unwrap();
    assert!(store.next_due_at(SourceId::Animevost).await.unwrap().is_some());
}

#[tokio::test]
async fn failed_refresh_keeps_the_source_due() {
    let app = TestApp::new().await;
    app.adapter.set_down(true);

    let result = app.state.scheduler.check_source(SourceId::Animevost).await;
    assert!(result.is_err());

    let schedule = app
        .state
        .store
        .get_schedule(SourceId::Animevost)
        .await
        .unwrap()
        .unwrap();
    assert!(schedule.last_error.is_some_and(|e| e.contains("animevost")));
    assert_eq!(
        app.state.scheduler.remaining(SourceId::Animevost).await.unwrap(),
        Duration::ZERO
    );

    app.adapter.set_down(false);
    app.adapter.set_page(1, vec![short("1", "A")], 1);
    assert_eq!(
        app.state
            .scheduler
            .check_source(SourceId::Animevost)
            .await
            .unwrap(),
        PERIOD
    );
    let schedule = app
        .state
        .store
        .get_schedule(SourceId::Animevost)
        .await
        .unwrap()
        .unwrap();
    assert!(schedule.last_error.is_none());
}

#[tokio::test]
async fn start_seeds_one_check_per_source() {
    let app = TestApp::new().await;

    assert_eq!(app.state.scheduler.start(), 1);
    assert!(app.state.jobs.is_pending(&Job::CheckSource {
        source: SourceId::Animevost,
    }));
    // Already chained; a second start adds nothing.
    assert_eq!(app.state.scheduler.start(), 0);
}

#[tokio::test]
async fn workers_run_the_scheduled_refresh() {
    let mut app = TestApp::new().await;
    app.adapter.set_page(1, vec![short("1", "A")], 1);
    let workers = app.start_workers();

    app.state.scheduler.start();

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while app
        .state
        .store
        .next_due_at(SourceId::Animevost)
        .await
        .unwrap()
        .is_none()
    {
        assert!(std::time::Instant::now() < deadline, "scheduled refresh never ran");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(app.adapter.calls(), 1);
    // The chain stays alive, waiting for the next deadline.
    assert!(app.state.jobs.is_pending(&Job::CheckSource {
        source: SourceId::Animevost,
    }));
    workers.abort();
}
