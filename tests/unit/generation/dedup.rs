use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use super::*;

#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
}

#[async_trait]
impl BackgroundGenerator for Counting {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<ImageData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if request.prompt == "fail" {
            anyhow::bail!("backend rejected prompt");
        }
        Ok(ImageData::filled(2, 2, [7, 7, 7, 255])?)
    }
}

/// Never answers within a test's lifetime.
struct Stalled;

#[async_trait]
impl BackgroundGenerator for Stalled {
    async fn generate(&self, _request: &GenerationRequest) -> anyhow::Result<ImageData> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ImageData::filled(1, 1, [0, 0, 0, 255])?)
    }
}

fn req(prompt: &str, aspect: &str) -> GenerationRequest {
    GenerationRequest {
        prompt: prompt.into(),
        aspect_ratio: aspect.into(),
    }
}

#[tokio::test(start_paused = true)]
async fn identical_concurrent_requests_share_one_call() {
    let dedup = DedupGenerator::new(Counting::default());
    let r = req("Subject: showroom", "16:9");
    let (a, b, c) = tokio::join!(dedup.generate(&r), dedup.generate(&r), dedup.generate(&r));
    assert_eq!(dedup.inner().calls.load(Ordering::SeqCst), 1);
    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());
    assert_eq!(dedup.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn different_aspect_ratios_are_separate_calls() {
    let dedup = DedupGenerator::new(Counting::default());
    let r1 = req("Subject: showroom", "16:9");
    let r2 = req("Subject: showroom", "1:1");
    let (a, b) = tokio::join!(dedup.generate(&r1), dedup.generate(&r2));
    a.unwrap();
    b.unwrap();
    assert_eq!(dedup.inner().calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn completed_requests_are_not_cached() {
    let dedup = DedupGenerator::new(Counting::default());
    let r = req("Subject: loft", "4:3");
    dedup.generate(&r).await.unwrap();
    dedup.generate(&r).await.unwrap();
    assert_eq!(dedup.inner().calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn failures_reach_every_waiter() {
    let dedup = DedupGenerator::new(Counting::default());
    let r = req("fail", "1:1");
    let (a, b) = tokio::join!(dedup.generate(&r), dedup.generate(&r));
    assert!(a.unwrap_err().to_string().contains("backend rejected prompt"));
    assert!(b.is_err());
    assert_eq!(dedup.inner().calls.load(Ordering::SeqCst), 1);
    assert_eq!(dedup.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_waiters_release_their_entries() {
    let dedup = Arc::new(DedupGenerator::new(Stalled));
    let tasks: Vec<_> = ["1:1", "4:3", "16:9"]
        .into_iter()
        .map(|aspect| {
            let dedup = Arc::clone(&dedup);
            let r = req("Subject: stalled", aspect);
            tokio::spawn(async move { dedup.generate(&r).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(dedup.in_flight(), 3);

    for task in &tasks {
        task.abort();
    }
    for task in tasks {
        assert!(task.await.unwrap_err().is_cancelled());
    }
    assert_eq!(dedup.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn remaining_waiter_keeps_the_call_alive() {
    let dedup = Arc::new(DedupGenerator::new(Counting::default()));
    let spawn_waiter = || {
        let dedup = Arc::clone(&dedup);
        tokio::spawn(async move { dedup.generate(&req("Subject: studio", "3:2")).await })
    };
    let first = spawn_waiter();
    let second = spawn_waiter();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(dedup.in_flight(), 1);

    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());
    assert_eq!(dedup.in_flight(), 1);

    second.await.unwrap().unwrap();
    assert_eq!(dedup.inner().calls.load(Ordering::SeqCst), 1);
    assert_eq!(dedup.in_flight(), 0);
}
