use std::time::Duration;

use super::*;

struct Solid([u8; 4]);

#[async_trait]
impl BackgroundGenerator for Solid {
    async fn generate(&self, _request: &GenerationRequest) -> anyhow::Result<ImageData> {
        Ok(ImageData::filled(4, 3, self.0)?)
    }
}

struct Broken;

#[async_trait]
impl BackgroundGenerator for Broken {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<ImageData> {
        anyhow::bail!("quota exhausted for {}", request.aspect_ratio)
    }
}

struct Slow;

#[async_trait]
impl BackgroundGenerator for Slow {
    async fn generate(&self, _request: &GenerationRequest) -> anyhow::Result<ImageData> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(ImageData::transparent(1, 1)?)
    }
}

fn ticket() -> GenerationTicket {
    GenerationTicket {
        background: BackgroundId::generate(),
        request: GenerationRequest {
            prompt: "Subject: studio".into(),
            aspect_ratio: "16:9".into(),
        },
    }
}

#[tokio::test]
async fn run_inline_returns_pixels() {
    let t = ticket();
    let bg = t.background();
    let outcome = t.run(&Solid([1, 2, 3, 255])).await;
    assert_eq!(outcome.background, bg);
    assert_eq!(outcome.result.unwrap().canvas().width, 4);
}

#[tokio::test]
async fn submitted_failure_carries_reason() {
    let pending = ticket().submit(Arc::new(Broken)).unwrap();
    let outcome = pending.wait().await;
    let reason = outcome.result.unwrap_err();
    assert!(reason.contains("quota exhausted for 16:9"), "{reason}");
}

#[tokio::test]
async fn arc_generator_delegates() {
    let shared: Arc<dyn BackgroundGenerator> = Arc::new(Solid([9, 9, 9, 255]));
    let outcome = ticket().run(&shared).await;
    assert!(outcome.result.is_ok());
}

#[tokio::test(start_paused = true)]
async fn pending_generation_reports_progress() {
    let pending = ticket().submit(Arc::new(Slow)).unwrap();
    tokio::task::yield_now().await;
    assert!(!pending.is_finished());
    tokio::time::advance(Duration::from_secs(61)).await;
    let outcome = pending.wait().await;
    assert!(outcome.result.is_ok());
}

struct Flagging(Arc<std::sync::atomic::AtomicBool>);

#[async_trait]
impl BackgroundGenerator for Flagging {
    async fn generate(&self, _request: &GenerationRequest) -> anyhow::Result<ImageData> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(ImageData::transparent(1, 1)?)
    }
}

#[tokio::test(start_paused = true)]
async fn dropping_pending_generation_aborts_it() {
    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let pending = ticket().submit(Arc::new(Flagging(Arc::clone(&done)))).unwrap();
    tokio::task::yield_now().await;
    drop(pending);
    tokio::time::advance(Duration::from_secs(10)).await;
    tokio::task::yield_now().await;
    assert!(!done.load(std::sync::atomic::Ordering::SeqCst));
}

#[test]
fn submit_outside_a_runtime_is_an_error() {
    let err = ticket().submit(Arc::new(Solid([0, 0, 0, 255]))).unwrap_err();
    assert!(matches!(err, crate::StageError::Other(_)));
    assert!(err.to_string().contains("tokio runtime"));
}
