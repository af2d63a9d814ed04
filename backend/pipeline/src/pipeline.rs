use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use assetlens_core::{
    AnalysisBackend, AnalysisRequest, ConversationTurn, Finding, Frame, FrameOrigin,
    ImageFingerprint, LensError, Notification, Speaker,
};
use assetlens_logging::{EventLogger, SessionEvent};
use assetlens_media::{encode_frame, EncodedFrame, DEFAULT_JPEG_QUALITY};
use assetlens_understanding::{parse_reply, FRAME_PROMPT};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conversation::ConversationLog;
use crate::debounce::Debouncer;
use crate::guards::{self, GuardContext, SkipReason};
use crate::retry::{RetryPhase, RetrySlot};

/// Timing and sizing knobs for a session.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Minimum spacing between camera-triggered analyses.
    pub camera_cooldown: Duration,
    pub debounce_window: Duration,
    /// Turns of history sent with each request.
    pub history_window: usize,
    pub jpeg_quality: u8,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            camera_cooldown: Duration::from_secs(5),
            debounce_window: Duration::from_secs(1),
            history_window: 5,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Outcome of [`AnalysisPipeline::submit_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Passed the admission guards; proceeds unless a newer frame arrives within the debounce window.
    Queued,
    Skipped(SkipReason),
}

/// A frame request waiting to be sent (or replayed after a rate limit).
#[derive(Debug, Clone)]
struct PendingAnalysis {
    request: AnalysisRequest,
    fingerprint: ImageFingerprint,
}

#[derive(Default)]
struct SessionState {
    in_flight: bool,
    last_camera_at: Option<Instant>,
    analyzed: HashSet<ImageFingerprint>,
    debounce: Debouncer,
    retry: RetrySlot<PendingAnalysis>,
    conversation: ConversationLog,
    findings: Vec<Finding>,
    machine_id: Option<String>,
}

struct Inner {
    session_id: Uuid,
    backend: Arc<dyn AnalysisBackend>,
    speaker: Option<Arc<dyn Speaker>>,
    settings: PipelineSettings,
    state: Mutex<SessionState>,
    notifications: broadcast::Sender<Notification>,
    speech_task: Mutex<Option<JoinHandle<()>>>,
}

/// One inspection session: owns its state, talks to one backend.
///
/// Cloning is cheap and shares the session. Must be used inside a tokio runtime.
#[derive(Clone)]
pub struct AnalysisPipeline {
    inner: Arc<Inner>,
}

pub struct PipelineBuilder {
    backend: Arc<dyn AnalysisBackend>,
    speaker: Option<Arc<dyn Speaker>>,
    settings: PipelineSettings,
    machine_id: Option<String>,
}

impl PipelineBuilder {
    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn speaker(mut self, speaker: Arc<dyn Speaker>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn machine_id(mut self, machine_id: impl Into<String>) -> Self {
        self.machine_id = Some(machine_id.into());
        self
    }

    pub fn build(self) -> AnalysisPipeline {
        let (notifications, _) = broadcast::channel(64);
        let state = SessionState { machine_id: self.machine_id, ..Default::default() };
        let session_id = Uuid::new_v4();
        info!(%session_id, backend = self.backend.name(), "Analysis session started");
        AnalysisPipeline {
            inner: Arc::new(Inner {
                session_id,
                backend: self.backend,
                speaker: self.speaker,
                settings: self.settings,
                state: Mutex::new(state),
                notifications,
                speech_task: Mutex::new(None),
            }),
        }
    }
}

impl AnalysisPipeline {
    pub fn builder(backend: Arc<dyn AnalysisBackend>) -> PipelineBuilder {
        PipelineBuilder {
            backend,
            speaker: None,
            settings: PipelineSettings::default(),
            machine_id: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.notifications.subscribe()
    }

    pub fn set_machine_id(&self, machine_id: Option<String>) {
        self.lock().machine_id = machine_id;
    }

    /// Current findings; empty before the first analysis and after a failure.
    pub fn findings(&self) -> Vec<Finding> {
        self.lock().findings.clone()
    }

    pub fn history(&self) -> Vec<ConversationTurn> {
        self.lock().conversation.turns().to_vec()
    }

    pub fn is_analyzing(&self) -> bool {
        self.lock().in_flight
    }

    pub fn retry_phase(&self) -> RetryPhase {
        self.lock().retry.phase()
    }

    /// Cancel a pending retry. Releases the in-flight flag if the retry was holding it.
    pub fn cancel_retry(&self) {
        let mut state = self.lock();
        if matches!(state.retry.phase(), RetryPhase::Scheduled { .. }) {
            state.retry.cancel();
            state.in_flight = false;
            info!(session_id = %self.inner.session_id, "Scheduled retry cancelled");
        }
    }

    /// Submit a camera or uploaded frame; the frame's origin selects the throttling rules.
    ///
    /// Guards run in order: in-flight, camera cooldown, already-analyzed,
    /// then the debounce window. Any skip is a silent no-op.
    pub fn submit_frame(&self, frame: Frame) -> Result<Admission, LensError> {
        let origin = frame.origin;
        let now = Instant::now();

        // Cheap early-out before paying for JPEG encoding.
        {
            let state = self.lock();
            if let Err(reason) = guards::admit(&self.guard_context(&state, origin, now, None)) {
                return Ok(Admission::Skipped(reason));
            }
        }

        let encoded = encode_frame(frame, self.inner.settings.jpeg_quality)?;

        let ticket = {
            let mut state = self.lock();
            let ctx = self.guard_context(&state, origin, now, Some(&encoded.fingerprint));
            if let Err(reason) = guards::admit(&ctx) {
                return Ok(Admission::Skipped(reason));
            }
            if origin == FrameOrigin::Camera {
                state.last_camera_at = Some(now);
            }
            state.debounce.arm()
        };

        let this = self.clone();
        tokio::spawn(async move { this.after_debounce(ticket, encoded).await });
        Ok(Admission::Queued)
    }

    fn guard_context<'a>(
        &self,
        state: &'a SessionState,
        origin: FrameOrigin,
        now: Instant,
        fingerprint: Option<&'a ImageFingerprint>,
    ) -> GuardContext<'a> {
        GuardContext {
            in_flight: state.in_flight,
            origin,
            now,
            last_camera_at: state.last_camera_at,
            cooldown: self.inner.settings.camera_cooldown,
            analyzed: &state.analyzed,
            fingerprint,
        }
    }

    async fn after_debounce(&self, ticket: u64, encoded: EncodedFrame) {
        tokio::time::sleep(self.inner.settings.debounce_window).await;
        let (width, height, origin) = (encoded.width, encoded.height, encoded.origin);

        let pending = {
            let mut state = self.lock();
            let late_skip = guards::debounced(&state.debounce, ticket)
                .or_else(|| state.in_flight.then_some(SkipReason::InFlight))
                .or_else(|| {
                    state
                        .analyzed
                        .contains(&encoded.fingerprint)
                        .then_some(SkipReason::AlreadyAnalyzed)
                });
            if let Some(reason) = late_skip {
                debug!(%reason, fingerprint = %encoded.fingerprint, "Frame dropped after debounce");
                return;
            }
            state.in_flight = true;
            PendingAnalysis {
                request: AnalysisRequest {
                    image: Some(encoded.data_url),
                    prompt: Some(FRAME_PROMPT.to_string()),
                    conversation_history: Some(
                        state.conversation.recent(self.inner.settings.history_window).to_vec(),
                    ),
                    is_voice_input: None,
                    machine_id: state.machine_id.clone(),
                },
                fingerprint: encoded.fingerprint,
            }
        };

        info!(
            session_id = %self.inner.session_id,
            fingerprint = %pending.fingerprint,
            width,
            height,
            %origin,
            "Analyzing frame"
        );
        self.notify(Notification::Analyzing);
        self.run_analysis(pending).await;
    }

    async fn run_analysis(&self, pending: PendingAnalysis) {
        EventLogger::log_event(
            &self.inner.session_id.to_string(),
            SessionEvent::RequestIssued {
                has_image: true,
                history_len: pending.request.conversation_history.as_ref().map_or(0, Vec::len),
            },
        );

        match self.inner.backend.analyze(&pending.request).await {
            Ok(text) => self.complete_analysis(pending.fingerprint, text),
            Err(LensError::RateLimited { retry_after }) => self.schedule_retry(retry_after, pending),
            Err(e) => self.fail_analysis(e),
        }
    }

    fn complete_analysis(&self, fingerprint: ImageFingerprint, text: String) {
        let parsed = parse_reply(&text);
        if !parsed.is_well_formed() {
            warn!(anomalies = ?parsed.anomalies, "Reply numbering deviated from the requested sections");
        }
        let findings = parsed.findings;
        {
            let mut state = self.lock();
            state.findings = findings.clone();
            state.conversation.append(ConversationTurn::assistant(text.clone()));
            state.analyzed.insert(fingerprint);
            state.in_flight = false;
            state.retry.finish();
        }
        let session_id = self.inner.session_id.to_string();
        EventLogger::log_event(&session_id, SessionEvent::assistant_turn(&text));
        EventLogger::log_event(&session_id, SessionEvent::AnalysisCompleted { findings: findings.len() });
        self.notify(Notification::AnalysisComplete { findings });
    }

    fn fail_analysis(&self, error: LensError) {
        {
            let mut state = self.lock();
            state.findings.clear();
            state.in_flight = false;
            state.retry.finish();
        }
        warn!(session_id = %self.inner.session_id, error = %error, "Analysis failed");
        EventLogger::log_event(
            &self.inner.session_id.to_string(),
            SessionEvent::RequestFailed { error: error.to_string() },
        );
        self.notify(Notification::AnalysisFailed { message: error.user_message() });
    }

    /// Keep the in-flight flag; replay the same request once `after` has passed.
    fn schedule_retry(&self, after: Duration, pending: PendingAnalysis) {
        {
            let mut state = self.lock();
            let this = self.clone();
            state.retry.schedule(after, pending, move |generation| {
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let payload = this.lock().retry.fire(generation);
                    if let Some(pending) = payload {
                        info!(session_id = %this.inner.session_id, "Retrying rate-limited analysis");
                        this.replay(pending).await;
                    }
                })
            });
        }
        warn!(session_id = %self.inner.session_id, retry_after_secs = after.as_secs(), "Rate limited, retry scheduled");
        EventLogger::log_event(
            &self.inner.session_id.to_string(),
            SessionEvent::RetryScheduled { after_secs: after.as_secs() },
        );
        self.notify(Notification::RetryScheduled { after });
    }

    /// Boxed so the retry task can name its future type.
    fn replay(&self, pending: PendingAnalysis) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.run_analysis(pending))
    }

    /// Send a typed or spoken question.
    ///
    /// The user turn is recorded before the request goes out and stays even if
    /// the request fails. Rate limits are not retried for text.
    pub async fn submit_text(&self, text: impl Into<String>, is_voice: bool) -> Result<String, LensError> {
        let text = text.into();
        let request = {
            let mut state = self.lock();
            let history = state.conversation.recent(self.inner.settings.history_window).to_vec();
            state.conversation.append(ConversationTurn::user(text.clone(), is_voice));
            AnalysisRequest {
                image: None,
                prompt: Some(text.clone()),
                conversation_history: Some(history),
                is_voice_input: Some(is_voice),
                machine_id: state.machine_id.clone(),
            }
        };
        let session_id = self.inner.session_id.to_string();
        EventLogger::log_event(&session_id, SessionEvent::user_turn(&text, is_voice));
        EventLogger::log_event(
            &session_id,
            SessionEvent::RequestIssued {
                has_image: false,
                history_len: request.conversation_history.as_ref().map_or(0, Vec::len),
            },
        );

        match self.inner.backend.analyze(&request).await {
            Ok(reply) => {
                self.lock().conversation.append(ConversationTurn::assistant(reply.clone()));
                EventLogger::log_event(&session_id, SessionEvent::assistant_turn(&reply));
                self.notify(Notification::ReplyReceived { text: reply.clone() });
                if is_voice {
                    self.speak_in_background(reply.clone());
                }
                Ok(reply)
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Text request failed");
                EventLogger::log_event(&session_id, SessionEvent::RequestFailed { error: e.to_string() });
                self.notify(Notification::RequestFailed { message: e.user_message() });
                Err(e)
            }
        }
    }

    fn speak_in_background(&self, reply: String) {
        let Some(speaker) = self.inner.speaker.clone() else {
            debug!("Voice reply requested but no speaker configured");
            return;
        };
        let notifications = self.inner.notifications.clone();
        let mut slot = self.inner.speech_task.lock().unwrap_or_else(|p| p.into_inner());
        // Replies play one after another, never over each other.
        let previous = slot.take();
        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            if let Err(e) = speaker.speak(&reply).await {
                warn!(error = %e, "Speech output failed");
                let _ = notifications.send(Notification::SpeechFailed { message: e.user_message() });
            }
        });
        *slot = Some(task);
    }

    /// Wait until every queued spoken reply has finished playing.
    pub async fn finish_speaking(&self) {
        let task = self.inner.speech_task.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn notify(&self, notification: Notification) {
        debug!(%notification, "Notify");
        // No subscribers is fine.
        let _ = self.inner.notifications.send(notification);
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{RecordingSpeaker, ScriptedBackend, WELL_FORMED_REPLY};
    use assetlens_core::{Role, Severity};
    use tokio::sync::Notify;
    use tokio::time::sleep;

    fn frame(shade: u8, origin: FrameOrigin) -> Frame {
        Frame::new(8, 8, vec![shade; 8 * 8 * 4], origin).unwrap()
    }

    fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
        let mut seen = Vec::new();
        while let Ok(n) = rx.try_recv() {
            seen.push(n);
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn frame_analysis_produces_four_findings() {
        let backend = Arc::new(ScriptedBackend::new());
        let pipeline = AnalysisPipeline::builder(backend.clone()).machine_id("P-101").build();
        let mut rx = pipeline.subscribe();

        assert_eq!(pipeline.submit_frame(frame(10, FrameOrigin::Upload)).unwrap(), Admission::Queued);
        sleep(Duration::from_secs(2)).await;

        assert_eq!(backend.call_count(), 1);
        let request = &backend.requests()[0];
        assert!(request.image.as_deref().unwrap().starts_with("data:image/jpeg;base64,"));
        assert_eq!(request.prompt.as_deref(), Some(FRAME_PROMPT));
        assert_eq!(request.machine_id.as_deref(), Some("P-101"));

        let findings = pipeline.findings();
        assert_eq!(findings.len(), 4);
        assert!(findings.iter().all(|f| f.severity == Severity::Info));
        assert!(!pipeline.is_analyzing());

        let history = pipeline.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::Assistant);
        assert_eq!(history[0].text, WELL_FORMED_REPLY);

        let seen = drain(&mut rx);
        assert_eq!(seen[0], Notification::Analyzing);
        assert!(matches!(seen[1], Notification::AnalysisComplete { ref findings } if findings.len() == 4));
    }

    #[tokio::test(start_paused = true)]
    async fn identical_frame_is_analyzed_once() {
        let backend = Arc::new(ScriptedBackend::new());
        let pipeline = AnalysisPipeline::builder(backend.clone()).build();

        pipeline.submit_frame(frame(10, FrameOrigin::Upload)).unwrap();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(
            pipeline.submit_frame(frame(10, FrameOrigin::Upload)).unwrap(),
            Admission::Skipped(SkipReason::AlreadyAnalyzed)
        );
        sleep(Duration::from_secs(2)).await;
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn camera_frames_inside_cooldown_make_one_call() {
        let backend = Arc::new(ScriptedBackend::new());
        let pipeline = AnalysisPipeline::builder(backend.clone()).build();

        assert_eq!(pipeline.submit_frame(frame(10, FrameOrigin::Camera)).unwrap(), Admission::Queued);
        sleep(Duration::from_millis(500)).await;
        assert!(matches!(
            pipeline.submit_frame(frame(20, FrameOrigin::Camera)).unwrap(),
            Admission::Skipped(SkipReason::CooldownActive { .. })
        ));
        sleep(Duration::from_millis(2500)).await;
        assert!(matches!(
            pipeline.submit_frame(frame(30, FrameOrigin::Camera)).unwrap(),
            Admission::Skipped(SkipReason::CooldownActive { .. })
        ));
        sleep(Duration::from_secs(2)).await;
        assert_eq!(backend.call_count(), 1);

        // Past the cooldown a new camera frame goes through.
        assert_eq!(pipeline.submit_frame(frame(40, FrameOrigin::Camera)).unwrap(), Admission::Queued);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn camera_view_skipped_in_cooldown_is_analyzed_once_it_ends() {
        let backend = Arc::new(ScriptedBackend::new());
        let pipeline = AnalysisPipeline::builder(backend.clone()).build();

        assert_eq!(pipeline.submit_frame(frame(10, FrameOrigin::Camera)).unwrap(), Admission::Queued);
        sleep(Duration::from_secs(2)).await;
        assert!(matches!(
            pipeline.submit_frame(frame(20, FrameOrigin::Camera)).unwrap(),
            Admission::Skipped(SkipReason::CooldownActive { .. })
        ));

        // The camera keeps showing the same view; once the cooldown ends it goes through.
        sleep(Duration::from_secs(4)).await;
        assert_eq!(pipeline.submit_frame(frame(20, FrameOrigin::Camera)).unwrap(), Admission::Queued);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(backend.call_count(), 2);

        sleep(Duration::from_secs(4)).await;
        assert_eq!(
            pipeline.submit_frame(frame(20, FrameOrigin::Camera)).unwrap(),
            Admission::Skipped(SkipReason::AlreadyAnalyzed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn uploads_bypass_camera_cooldown() {
        let backend = Arc::new(ScriptedBackend::new());
        let pipeline = AnalysisPipeline::builder(backend.clone()).build();

        pipeline.submit_frame(frame(10, FrameOrigin::Camera)).unwrap();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(pipeline.submit_frame(frame(20, FrameOrigin::Upload)).unwrap(), Admission::Queued);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_frame_inside_debounce_window_wins() {
        let backend = Arc::new(ScriptedBackend::new());
        let pipeline = AnalysisPipeline::builder(backend.clone()).build();
        let newest = frame(200, FrameOrigin::Upload);
        let expected = encode_frame(newest.clone(), DEFAULT_JPEG_QUALITY).unwrap();

        pipeline.submit_frame(frame(10, FrameOrigin::Upload)).unwrap();
        sleep(Duration::from_millis(500)).await;
        pipeline.submit_frame(newest).unwrap();
        sleep(Duration::from_secs(3)).await;

        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.requests()[0].image.as_deref(), Some(expected.data_url.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_replays_once_after_delay() {
        let backend = Arc::new(
            ScriptedBackend::new().then(Err(LensError::RateLimited { retry_after: Duration::from_secs(2) })),
        );
        let pipeline = AnalysisPipeline::builder(backend.clone()).build();
        let mut rx = pipeline.subscribe();

        pipeline.submit_frame(frame(10, FrameOrigin::Upload)).unwrap();
        sleep(Duration::from_secs(2)).await;

        assert_eq!(backend.call_count(), 1);
        assert!(pipeline.is_analyzing());
        assert_eq!(pipeline.retry_phase(), RetryPhase::Scheduled { delay_ms: 2000 });
        assert_eq!(
            pipeline.submit_frame(frame(20, FrameOrigin::Upload)).unwrap(),
            Admission::Skipped(SkipReason::InFlight)
        );

        sleep(Duration::from_secs(10)).await;
        let times = backend.call_times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_secs(2));
        assert_eq!(backend.requests()[0], backend.requests()[1]);
        assert_eq!(pipeline.retry_phase(), RetryPhase::Idle);
        assert!(!pipeline.is_analyzing());
        assert_eq!(pipeline.findings().len(), 4);

        let seen = drain(&mut rx);
        assert_eq!(
            seen,
            vec![
                Notification::Analyzing,
                Notification::RetryScheduled { after: Duration::from_secs(2) },
                Notification::AnalysisComplete { findings: pipeline.findings() },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_replay_schedules_a_fresh_retry() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .then(Err(LensError::RateLimited { retry_after: Duration::from_secs(2) }))
                .then(Err(LensError::RateLimited { retry_after: Duration::from_secs(3) })),
        );
        let pipeline = AnalysisPipeline::builder(backend.clone()).build();
        let mut rx = pipeline.subscribe();

        pipeline.submit_frame(frame(10, FrameOrigin::Upload)).unwrap();
        sleep(Duration::from_millis(3500)).await;
        assert_eq!(backend.call_count(), 2);
        assert_eq!(pipeline.retry_phase(), RetryPhase::Scheduled { delay_ms: 3000 });
        assert!(pipeline.is_analyzing());

        sleep(Duration::from_secs(10)).await;
        let times = backend.call_times();
        assert_eq!(times.len(), 3);
        assert!(times[2] - times[1] >= Duration::from_secs(3));
        assert_eq!(pipeline.retry_phase(), RetryPhase::Idle);
        assert!(!pipeline.is_analyzing());
        assert_eq!(pipeline.findings().len(), 4);

        let seen = drain(&mut rx);
        assert_eq!(
            seen,
            vec![
                Notification::Analyzing,
                Notification::RetryScheduled { after: Duration::from_secs(2) },
                Notification::RetryScheduled { after: Duration::from_secs(3) },
                Notification::AnalysisComplete { findings: pipeline.findings() },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_retry_never_fires() {
        let backend = Arc::new(
            ScriptedBackend::new().then(Err(LensError::RateLimited { retry_after: Duration::from_secs(2) })),
        );
        let pipeline = AnalysisPipeline::builder(backend.clone()).build();

        pipeline.submit_frame(frame(10, FrameOrigin::Upload)).unwrap();
        sleep(Duration::from_millis(1500)).await;
        pipeline.cancel_retry();
        assert!(!pipeline.is_analyzing());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_clears_findings() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .then(Ok(WELL_FORMED_REPLY.to_string()))
                .then(Err(LensError::Upstream { status: 500, message: "Gemini API key not configured".into() })),
        );
        let pipeline = AnalysisPipeline::builder(backend.clone()).build();

        pipeline.submit_frame(frame(10, FrameOrigin::Upload)).unwrap();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(pipeline.findings().len(), 4);

        let mut rx = pipeline.subscribe();
        pipeline.submit_frame(frame(20, FrameOrigin::Upload)).unwrap();
        sleep(Duration::from_secs(2)).await;

        assert!(pipeline.findings().is_empty());
        assert!(!pipeline.is_analyzing());
        assert_eq!(
            drain(&mut rx).last(),
            Some(&Notification::AnalysisFailed { message: "Gemini API key not configured".into() })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn user_turn_is_recorded_before_reply_arrives() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend::new().gated(entered.clone(), release.clone()));
        let pipeline = AnalysisPipeline::builder(backend.clone()).build();

        let task = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.submit_text("What is the pressure rating?", false).await })
        };
        entered.notified().await;

        let history = pipeline.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].text, "What is the pressure rating?");

        release.notify_one();
        let reply = task.await.unwrap().unwrap();
        assert_eq!(reply, WELL_FORMED_REPLY);
        assert_eq!(pipeline.history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn text_request_sends_recent_history_without_new_turn() {
        let backend = Arc::new(ScriptedBackend::new());
        let pipeline = AnalysisPipeline::builder(backend.clone()).build();

        for i in 0..3 {
            pipeline.submit_text(format!("q{i}"), false).await.unwrap();
        }
        pipeline.submit_text("q3", false).await.unwrap();

        let request = &backend.requests()[3];
        let history = request.conversation_history.as_ref().unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].text, WELL_FORMED_REPLY);
        assert_eq!(history[1].text, "q1");
        assert_eq!(history[4].role, Role::Assistant);
        assert_eq!(request.prompt.as_deref(), Some("q3"));
        assert_eq!(request.image, None);
        assert_eq!(request.is_voice_input, Some(false));
        assert_eq!(pipeline.history().len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn text_rate_limit_is_not_retried() {
        let backend = Arc::new(
            ScriptedBackend::new().then(Err(LensError::RateLimited { retry_after: Duration::from_secs(2) })),
        );
        let pipeline = AnalysisPipeline::builder(backend.clone()).build();
        let mut rx = pipeline.subscribe();

        let err = pipeline.submit_text("status?", false).await.unwrap_err();
        assert!(err.is_rate_limited());
        sleep(Duration::from_secs(10)).await;

        assert_eq!(backend.call_count(), 1);
        assert_eq!(pipeline.history().len(), 1);
        assert!(matches!(drain(&mut rx).as_slice(), [Notification::RequestFailed { .. }]));
    }

    #[tokio::test(start_paused = true)]
    async fn voice_reply_is_spoken() {
        let backend = Arc::new(ScriptedBackend::new().then(Ok("Pressure is nominal.".into())));
        let speaker = Arc::new(RecordingSpeaker::default());
        let pipeline = AnalysisPipeline::builder(backend).speaker(speaker.clone()).build();

        pipeline.submit_text("how is the pressure", true).await.unwrap();
        pipeline.finish_speaking().await;

        assert_eq!(*speaker.spoken.lock().unwrap(), vec!["Pressure is nominal.".to_string()]);
        assert!(pipeline.history()[0].is_voice_origin);
    }

    #[tokio::test(start_paused = true)]
    async fn voice_replies_play_in_turn() {
        let backend = Arc::new(ScriptedBackend::new().then(Ok("First.".into())).then(Ok("Second.".into())));
        let speaker = Arc::new(RecordingSpeaker { playback: Duration::from_secs(3), ..Default::default() });
        let pipeline = AnalysisPipeline::builder(backend).speaker(speaker.clone()).build();

        pipeline.submit_text("one", true).await.unwrap();
        pipeline.submit_text("two", true).await.unwrap();
        pipeline.finish_speaking().await;

        assert_eq!(*speaker.spoken.lock().unwrap(), vec!["First.".to_string(), "Second.".to_string()]);
        let spans = speaker.spans.lock().unwrap().clone();
        assert_eq!(spans.len(), 2);
        assert!(spans[1].0 >= spans[0].1);
    }

    #[tokio::test(start_paused = true)]
    async fn typed_reply_is_not_spoken() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let pipeline =
            AnalysisPipeline::builder(Arc::new(ScriptedBackend::new())).speaker(speaker.clone()).build();

        pipeline.submit_text("how is the pressure", false).await.unwrap();
        sleep(Duration::from_millis(10)).await;
        assert!(speaker.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn speech_failure_keeps_reply_and_notifies() {
        let speaker = Arc::new(RecordingSpeaker { fail: true, ..Default::default() });
        let pipeline =
            AnalysisPipeline::builder(Arc::new(ScriptedBackend::new())).speaker(speaker).build();
        let mut rx = pipeline.subscribe();

        let reply = pipeline.submit_text("read it out", true).await.unwrap();
        sleep(Duration::from_millis(10)).await;

        assert_eq!(reply, WELL_FORMED_REPLY);
        assert_eq!(pipeline.history().len(), 2);
        let seen = drain(&mut rx);
        assert!(matches!(seen[0], Notification::ReplyReceived { .. }));
        assert!(matches!(seen[1], Notification::SpeechFailed { .. }));
    }
}
