// SPDX-License-Identifier: MPL-2.0

//! End-to-end session scenarios against mock capture and inference backends
//!
//! Timer-driven tests run with a paused clock, so six-second ticks and slow
//! requests complete instantly and in a deterministic order.

use async_trait::async_trait;
use parking_lot::Mutex;
use persona_feed::app::{
    SessionController, SessionHandle, SessionSettings, SessionStatus, SessionView, SwapPhase,
};
use persona_feed::backends::capture::{
    CaptureBackend, CaptureBackendType, CaptureFormat, CaptureFrame, CaptureResult,
    CaptureStream,
};
use persona_feed::backends::inference::{InferenceService, SwapRequest};
use persona_feed::errors::{CaptureError, InferenceError};
use persona_feed::identity::{EmbeddingStatus, IdentityStore};
use persona_feed::media::{DataUrl, ImageCodec, ImageResource, TransportPayload};
use proptest::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

// ===== Mock capture =====

struct MockStream {
    releases: Arc<AtomicUsize>,
}

impl CaptureStream for MockStream {
    fn snapshot(&self) -> Option<CaptureFrame> {
        Some(CaptureFrame::from_rgba(8, 8, vec![120u8; 8 * 8 * 4]))
    }

    fn describe(&self) -> String {
        "mock camera".into()
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockCapture {
    acquisitions: AtomicUsize,
    releases: Arc<AtomicUsize>,
    fail: bool,
    delay: Duration,
}

impl MockCapture {
    fn new() -> Arc<Self> {
        Self::with(false, Duration::ZERO)
    }

    fn with(fail: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            acquisitions: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
            fail,
            delay,
        })
    }

    fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for MockCapture {
    fn acquire(&self, _format: &CaptureFormat) -> CaptureResult<Box<dyn CaptureStream>> {
        std::thread::sleep(self.delay);
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CaptureError::PermissionDenied("mock".into()));
        }
        Ok(Box::new(MockStream {
            releases: Arc::clone(&self.releases),
        }))
    }

    fn backend_type(&self) -> CaptureBackendType {
        CaptureBackendType::StillImage
    }

    fn is_available(&self) -> bool {
        true
    }
}

// ===== Mock inference =====

struct MockInference {
    replies: Mutex<VecDeque<Result<TransportPayload, InferenceError>>>,
    requests: Mutex<Vec<SwapRequest>>,
    delays: Mutex<VecDeque<Duration>>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockInference {
    fn new(
        replies: Vec<Result<TransportPayload, InferenceError>>,
        default_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            delays: Mutex::new(VecDeque::new()),
            default_delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    fn with_delays(self: Arc<Self>, delays: &[u64]) -> Arc<Self> {
        self.delays
            .lock()
            .extend(delays.iter().map(|s| Duration::from_secs(*s)));
        self
    }

    fn requests(&self) -> Vec<SwapRequest> {
        self.requests.lock().clone()
    }

    fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceService for MockInference {
    async fn refine(
        &self,
        _identity: &TransportPayload,
        _instruction: &str,
    ) -> Result<String, InferenceError> {
        Ok("Narrow face, dark eyes".into())
    }

    async fn swap(&self, request: &SwapRequest) -> Result<TransportPayload, InferenceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let delay = self.delays.lock().pop_front().unwrap_or(self.default_delay);
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(image("RkFMTEJBQ0s=")))
    }
}

// ===== Helpers =====

fn image(data: &str) -> TransportPayload {
    TransportPayload {
        mime_type: "image/png".into(),
        data: data.into(),
    }
}

fn enveloped(data: &str) -> DataUrl {
    DataUrl::envelope(&image(data)).unwrap()
}

fn persona(data: &str) -> ImageResource {
    ImageResource::Inline(DataUrl::parse(format!("data:image/png;base64,{}", data)).unwrap())
}

fn settings() -> SessionSettings {
    SessionSettings {
        tick_interval: Duration::from_secs(6),
        ..SessionSettings::default()
    }
}

struct Harness {
    store: IdentityStore,
    handle: SessionHandle,
    views: watch::Receiver<SessionView>,
}

fn start(capture: Arc<MockCapture>, inference: Arc<MockInference>) -> Harness {
    let store = IdentityStore::new(inference.clone(), ImageCodec::default());
    let (controller, handle) = SessionController::new(capture, inference, &store, settings());
    tokio::spawn(controller.run());
    let views = handle.subscribe();
    Harness {
        store,
        handle,
        views,
    }
}

async fn wait_view(
    views: &mut watch::Receiver<SessionView>,
    condition: impl FnMut(&SessionView) -> bool,
) -> SessionView {
    tokio::time::timeout(Duration::from_secs(600), views.wait_for(condition))
        .await
        .expect("view condition not reached")
        .expect("session loop stopped")
        .clone()
}

/// Power on, select a persona and start swapping
async fn start_swapping(h: &mut Harness, data: &str) {
    h.handle.toggle_power().unwrap();
    wait_view(&mut h.views, |v| v.status == SessionStatus::Active).await;

    let identity = h.store.add("A", persona(data));
    h.store.select(&identity.id);
    wait_view(&mut h.views, |v| v.target_ready).await;

    h.handle.toggle_persona().unwrap();
    let view = wait_view(&mut h.views, |v| v.status == SessionStatus::Swapping).await;
    assert_eq!(view.phase, SwapPhase::Armed);
}

// ===== Scenarios =====

#[tokio::test(start_paused = true)]
async fn test_anchor_chain_from_add_to_second_tick() {
    let inference = MockInference::new(vec![Ok(image("WA==")), Ok(image("WQ=="))], Duration::from_secs(2));
    let mut h = start(MockCapture::new(), inference.clone());

    let a = h.store.add("A", persona("QQ=="));
    assert_eq!(a.embedding_status, EmbeddingStatus::Processing);
    let mut identities = h.store.subscribe();
    identities
        .wait_for(|s| s.get(&a.id).is_some_and(|i| i.embedding_status == EmbeddingStatus::Ready))
        .await
        .unwrap();

    h.handle.toggle_power().unwrap();
    wait_view(&mut h.views, |v| v.status == SessionStatus::Active).await;

    h.store.select(&a.id);
    wait_view(&mut h.views, |v| v.target_ready).await;
    h.handle.toggle_persona().unwrap();
    let view = wait_view(&mut h.views, |v| v.status == SessionStatus::Swapping).await;
    assert_eq!(view.phase, SwapPhase::Armed);

    let view = wait_view(&mut h.views, |v| v.phase == SwapPhase::Synced).await;
    assert_eq!(view.anchor, Some(enveloped("WA==")));

    let view = wait_view(&mut h.views, |v| v.anchor == Some(enveloped("WQ=="))).await;
    assert_eq!(view.phase, SwapPhase::Synced);

    let requests = inference.requests();
    assert!(requests[0].anchor.is_none());
    assert_eq!(requests[0].target.data, "QQ==");
    assert_eq!(requests[1].anchor.as_ref().map(|a| a.data.as_str()), Some("WA=="));
    assert_eq!(inference.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_while_busy_are_dropped() {
    let inference = MockInference::new(Vec::new(), Duration::from_secs(15));
    let mut h = start(MockCapture::new(), inference.clone());
    start_swapping(&mut h, "QQ==").await;
    let started = tokio::time::Instant::now();

    // Ticks at 6 s and 12 s find the first request still out
    tokio::time::sleep_until(started + Duration::from_secs(17)).await;
    assert_eq!(inference.request_count(), 1);
    let view = h.handle.view();
    assert!(view.counters.skipped_ticks >= 2);
    assert!(!view.busy);

    // The tick at 18 s proceeds normally
    tokio::time::sleep_until(started + Duration::from_secs(19)).await;
    assert_eq!(inference.request_count(), 2);
    assert!(h.handle.view().busy);
    assert_eq!(inference.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_tick_keeps_anchor() {
    let inference = MockInference::new(
        vec![
            Ok(image("MQ==")),
            Ok(image("WA==")),
            Err(InferenceError::Status {
                status: 503,
                body: "overloaded".into(),
            }),
            Ok(image("Wg==")),
        ],
        Duration::from_secs(1),
    );
    let mut h = start(MockCapture::new(), inference.clone());
    start_swapping(&mut h, "QQ==").await;

    let view = wait_view(&mut h.views, |v| v.counters.failed == 1).await;
    assert_eq!(view.phase, SwapPhase::Synced);
    assert_eq!(view.anchor, Some(enveloped("WA==")));
    assert!(!view.busy);

    wait_view(&mut h.views, |v| v.anchor == Some(enveloped("Wg=="))).await;
    let requests = inference.requests();
    assert_eq!(requests[2].anchor.as_ref().unwrap().data, "WA==");
    assert_eq!(requests[3].anchor.as_ref().unwrap().data, "WA==");
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_under_irregular_latency() {
    let inference = MockInference::new(Vec::new(), Duration::from_secs(1))
        .with_delays(&[7, 1, 13, 2, 6, 12, 5, 0, 19, 3]);
    let mut h = start(MockCapture::new(), inference.clone());
    start_swapping(&mut h, "QQ==").await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(inference.request_count() >= 8);
    assert_eq!(inference.max_in_flight(), 1);
}

#[derive(Debug, Clone)]
enum Op {
    Wait(u64),
    TogglePersona,
    SwitchPersona,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..20).prop_map(Op::Wait),
        1 => Just(Op::TogglePersona),
        1 => Just(Op::SwitchPersona),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_single_flight_for_any_schedule(
        delays in prop::collection::vec(0u64..20, 1..12),
        ops in prop::collection::vec(op(), 0..16),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        let max_in_flight = rt.block_on(async move {
            let inference =
                MockInference::new(Vec::new(), Duration::from_secs(4)).with_delays(&delays);
            let mut h = start(MockCapture::new(), inference.clone());
            start_swapping(&mut h, "QQ==").await;

            for (n, op) in ops.into_iter().enumerate() {
                match op {
                    Op::Wait(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                    Op::TogglePersona => h.handle.toggle_persona().unwrap(),
                    Op::SwitchPersona => {
                        let identity = h.store.add(format!("P{}", n), persona("Qg=="));
                        h.store.select(&identity.id);
                    }
                }
                tokio::task::yield_now().await;
            }
            tokio::time::sleep(Duration::from_secs(60)).await;

            h.handle.shutdown().unwrap();
            inference.max_in_flight()
        });

        prop_assert!(max_in_flight <= 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_toggle_off_discards_in_flight_result() {
    let inference = MockInference::new(vec![Ok(image("WA=="))], Duration::from_secs(10));
    let mut h = start(MockCapture::new(), inference.clone());
    start_swapping(&mut h, "QQ==").await;
    wait_view(&mut h.views, |v| v.busy).await;

    h.handle.toggle_persona().unwrap();
    let view = wait_view(&mut h.views, |v| v.status == SessionStatus::Active).await;
    assert_eq!(view.phase, SwapPhase::Idle);
    assert!(view.anchor.is_none());

    let view = wait_view(&mut h.views, |v| v.counters.discarded == 1).await;
    assert!(view.anchor.is_none());
    assert!(!view.busy);

    // No ticks after leaving Swapping
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(inference.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_identity_switch_rearms_without_anchor() {
    let inference = MockInference::new(vec![Ok(image("WA=="))], Duration::from_secs(1));
    let mut h = start(MockCapture::new(), inference.clone());
    start_swapping(&mut h, "QQ==").await;
    wait_view(&mut h.views, |v| v.phase == SwapPhase::Synced).await;

    let b = h.store.add("B", persona("Qg=="));
    h.store.select(&b.id);
    let view = wait_view(&mut h.views, |v| v.active_identity.as_ref() == Some(&b.id)).await;
    assert_eq!(view.phase, SwapPhase::Armed);
    assert!(view.anchor.is_none());

    wait_view(&mut h.views, |v| v.phase == SwapPhase::Synced).await;
    let requests = inference.requests();
    let switched = requests
        .iter()
        .find(|r| r.target.data == "Qg==")
        .expect("request for the new persona");
    assert!(switched.anchor.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_removing_active_identity_stops_swapping() {
    let inference = MockInference::new(Vec::new(), Duration::from_secs(1));
    let mut h = start(MockCapture::new(), inference);
    start_swapping(&mut h, "QQ==").await;

    let active = h.store.active().unwrap();
    h.store.remove(&active.id);

    let view = wait_view(&mut h.views, |v| v.status == SessionStatus::Active).await;
    assert_eq!(view.phase, SwapPhase::Idle);
    assert!(view.active_identity.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_power_off_releases_capture() {
    let capture = MockCapture::new();
    let inference = MockInference::new(Vec::new(), Duration::from_secs(1));
    let mut h = start(capture.clone(), inference);
    start_swapping(&mut h, "QQ==").await;

    h.handle.toggle_power().unwrap();
    let view = wait_view(&mut h.views, |v| v.status == SessionStatus::Inactive).await;
    assert_eq!(view.phase, SwapPhase::Idle);
    assert!(view.anchor.is_none());
    assert_eq!(capture.releases(), 1);
}

#[tokio::test]
async fn test_late_acquisition_is_released() {
    let capture = MockCapture::with(false, Duration::from_millis(100));
    let inference = MockInference::new(Vec::new(), Duration::ZERO);
    let mut h = start(capture.clone(), inference);

    h.handle.toggle_power().unwrap();
    h.handle.toggle_power().unwrap();
    wait_view(&mut h.views, |v| v.status == SessionStatus::Inactive).await;

    for _ in 0..100 {
        if capture.releases() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(capture.acquisitions.load(Ordering::SeqCst), 1);
    assert_eq!(capture.releases(), 1);
    assert_eq!(h.handle.view().status, SessionStatus::Inactive);
}

#[tokio::test]
async fn test_capture_failure_returns_to_inactive() {
    let capture = MockCapture::with(true, Duration::ZERO);
    let inference = MockInference::new(Vec::new(), Duration::ZERO);
    let mut h = start(capture, inference);

    h.handle.toggle_power().unwrap();
    let view = wait_view(&mut h.views, |v| {
        v.status == SessionStatus::Inactive && v.last_error.is_some()
    })
    .await;
    assert!(view.last_error.unwrap().contains("denied"));
}

#[tokio::test]
async fn test_handle_errors_after_shutdown() {
    let inference = MockInference::new(Vec::new(), Duration::ZERO);
    let h = start(MockCapture::new(), inference);

    h.handle.shutdown().unwrap();
    let mut views = h.handle.subscribe();
    // The loop drops its sender when it stops
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        while views.changed().await.is_ok() {}
    })
    .await;
    assert!(h.handle.toggle_power().is_err());
}
