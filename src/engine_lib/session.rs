// src/engine_lib/session.rs
//
// Acquisition and release of the immersive session, its reference spaces
// and the hit-test source.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::engine_lib::config::SessionFeatures;
use crate::engine_lib::error::{PortalError, PortalResult};
use crate::engine_lib::platform::{HitTestSource, ReferenceSpace, ReferenceSpaceKind, XrPlatform, XrSession};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Active,
    Disposed,
}

#[derive(Debug)]
struct TokenState {
    flag: watch::Sender<bool>,
    children: Mutex<Vec<Weak<TokenState>>>,
}

impl TokenState {
    fn cancel(&self) {
        if self.flag.send_replace(true) {
            return;
        }
        let children = std::mem::take(&mut *self.children.lock().unwrap_or_else(|poisoned| poisoned.into_inner()));
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// Cancellation flag shared between an async operation and whoever may
/// abandon it. Continuations check it before touching shared state.
/// Cancelling a token also cancels every token derived from it with `child`.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self { state: Arc::new(TokenState { flag, children: Mutex::new(Vec::new()) }) }
    }

    /// New token cancelled together with `self`, but cancellable on its own.
    pub fn child(&self) -> Self {
        let child = Self::new();
        {
            let mut children = self.state.children.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&child.state));
        }
        // covers a cancel that raced the registration above
        if self.is_cancelled() {
            child.cancel();
        }
        child
    }

    pub fn cancel(&self) {
        self.state.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.flag.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.state.flag.subscribe();
        // the sender lives in self, so wait_for cannot fail with a closed channel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

pub struct ActiveSession<S: XrSession> {
    session: S,
    local_space: ReferenceSpace,
    viewer_space: ReferenceSpace,
    hit_test: Option<S::HitTest>,
    end_signal: watch::Receiver<bool>,
}

impl<S: XrSession> ActiveSession<S> {
    pub fn local_space(&self) -> &ReferenceSpace {
        &self.local_space
    }

    pub fn viewer_space(&self) -> &ReferenceSpace {
        &self.viewer_space
    }

    fn has_ended(&self) -> bool {
        *self.end_signal.borrow()
    }

    fn release_hit_test(&mut self) {
        if let Some(mut source) = self.hit_test.take() {
            source.cancel();
        }
    }

    /// Releases resources and, unless the platform already ended it, ends the session.
    fn close(mut self) {
        self.release_hit_test();
        if self.has_ended() {
            return;
        }
        if let Err(e) = self.session.end() {
            warn!("{}", PortalError::Teardown(e.0));
        }
    }
}

struct Inner<S: XrSession> {
    state: SessionState,
    active: Option<ActiveSession<S>>,
    token: CancellationToken,
    /// Set while the active session is lent to an in-flight hit-test request.
    lent: bool,
}

/// Owns the session lifecycle. All methods take `&self` so an in-flight
/// `start` can be raced by `end` or `dispose` from the frame loop.
pub struct SessionManager<P: XrPlatform> {
    platform: P,
    features: SessionFeatures,
    /// Parent of every start token; cancelling it aborts whatever is in flight.
    mount: CancellationToken,
    inner: Mutex<Inner<P::Session>>,
}

impl<P: XrPlatform> SessionManager<P> {
    pub fn new(platform: P, features: SessionFeatures) -> Self {
        Self::with_mount(platform, features, CancellationToken::new())
    }

    /// Manager whose starts and hit-test requests are abandoned once `mount` is cancelled.
    pub fn with_mount(platform: P, features: SessionFeatures, mount: CancellationToken) -> Self {
        Self {
            platform,
            features,
            mount,
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                active: None,
                token: CancellationToken::new(),
                lent: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<P::Session>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn has_hit_test(&self) -> bool {
        self.lock().active.as_ref().map_or(false, |a| a.hit_test.is_some())
    }

    /// True while a session is active but its hit-test source has been released.
    pub fn needs_hit_test(&self) -> bool {
        let inner = self.lock();
        inner.state == SessionState::Active
            && !inner.lent
            && inner.active.as_ref().map_or(false, |a| a.hit_test.is_none())
    }

    /// Token of the current (or most recent) start.
    pub fn token(&self) -> CancellationToken {
        self.lock().token.clone()
    }

    /// Runs `f` with the hit-test source, if one is held.
    pub fn with_hit_test<R>(&self, f: impl FnOnce(Option<&mut dyn HitTestSource>) -> R) -> R {
        let mut inner = self.lock();
        let source = inner
            .active
            .as_mut()
            .and_then(|a| a.hit_test.as_mut())
            .map(|h| h as &mut dyn HitTestSource);
        f(source)
    }

    pub async fn start(&self) -> PortalResult<()> {
        let token = {
            let mut inner = self.lock();
            match inner.state {
                SessionState::Starting => return Err(PortalError::AlreadyStarting),
                SessionState::Active => return Err(PortalError::AlreadyActive),
                SessionState::Disposed => return Err(PortalError::Disposed),
                SessionState::Idle => {}
            }
            if self.mount.is_cancelled() {
                return Err(PortalError::Cancelled);
            }
            inner.state = SessionState::Starting;
            inner.token = self.mount.child();
            inner.token.clone()
        };
        info!("starting immersive session");

        let result = self.acquire(&token).await;

        let mut inner = self.lock();
        match result {
            Ok(active) if !token.is_cancelled() && inner.state == SessionState::Starting => {
                inner.active = Some(active);
                inner.state = SessionState::Active;
                info!("immersive session active");
                Ok(())
            }
            Ok(active) => {
                debug!("start finished after cancellation, closing session");
                active.close();
                self.settle_failed_start(&mut inner, &token);
                Err(PortalError::Cancelled)
            }
            Err(e) => {
                self.settle_failed_start(&mut inner, &token);
                warn!("session start failed: {}", e);
                Err(e)
            }
        }
    }

    /// Leaves `Starting` unless a newer start owns the state. No start can
    /// begin once the mount is cancelled.
    fn settle_failed_start(&self, inner: &mut Inner<P::Session>, token: &CancellationToken) {
        if inner.state == SessionState::Starting && (!token.is_cancelled() || self.mount.is_cancelled()) {
            inner.state = SessionState::Idle;
        }
    }

    async fn acquire(&self, token: &CancellationToken) -> PortalResult<ActiveSession<P::Session>> {
        let mut session = self
            .platform
            .request_session(self.features)
            .await
            .map_err(|e| PortalError::SessionRequestFailed(e.0))?;
        // Listen for end before any further await.
        let end_signal = session.end_signal();

        fn abort<S: XrSession>(mut session: S, ended: &watch::Receiver<bool>, err: PortalError) -> PortalError {
            if !*ended.borrow() {
                if let Err(e) = session.end() {
                    warn!("{}", PortalError::Teardown(e.0));
                }
            }
            err
        }
        let interrupted = |ended: &watch::Receiver<bool>| -> Option<PortalError> {
            if token.is_cancelled() {
                Some(PortalError::Cancelled)
            } else if *ended.borrow() {
                Some(PortalError::SessionRequestFailed("session ended during start".into()))
            } else {
                None
            }
        };
        if let Some(err) = interrupted(&end_signal) {
            return Err(abort(session, &end_signal, err));
        }

        let local_space = match self.request_local_space(&mut session).await {
            Ok(space) => space,
            Err(e) => return Err(abort(session, &end_signal, e)),
        };
        if let Some(err) = interrupted(&end_signal) {
            return Err(abort(session, &end_signal, err));
        }

        let viewer_space = match session.request_reference_space(ReferenceSpaceKind::Viewer).await {
            Ok(space) => space,
            Err(e) => return Err(abort(session, &end_signal, PortalError::ResourceAcquisitionFailed(e.0))),
        };
        if let Some(err) = interrupted(&end_signal) {
            return Err(abort(session, &end_signal, err));
        }

        let mut hit_test = match session.request_hit_test_source(&viewer_space).await {
            Ok(source) => source,
            Err(e) => return Err(abort(session, &end_signal, PortalError::ResourceAcquisitionFailed(e.0))),
        };
        if let Some(err) = interrupted(&end_signal) {
            hit_test.cancel();
            return Err(abort(session, &end_signal, err));
        }

        Ok(ActiveSession {
            session,
            local_space,
            viewer_space,
            hit_test: Some(hit_test),
            end_signal,
        })
    }

    async fn request_local_space(&self, session: &mut P::Session) -> PortalResult<ReferenceSpace> {
        if self.features.local_floor {
            match session.request_reference_space(ReferenceSpaceKind::LocalFloor).await {
                Ok(space) => return Ok(space),
                Err(e) => debug!("local-floor space unavailable ({}), using local", e),
            }
        }
        session
            .request_reference_space(ReferenceSpaceKind::Local)
            .await
            .map_err(|e| PortalError::ResourceAcquisitionFailed(e.0))
    }

    /// Cancels and drops the hit-test source, keeping the session.
    pub fn release_hit_test(&self) {
        if let Some(active) = self.lock().active.as_mut() {
            if active.hit_test.is_some() {
                debug!("hit-test source released");
            }
            active.release_hit_test();
        }
    }

    /// Requests a fresh hit-test source for the active session if it has none.
    pub async fn reacquire_hit_test(&self) -> PortalResult<()> {
        let (mut active, token) = {
            let mut inner = self.lock();
            if inner.state != SessionState::Active || inner.lent {
                return Ok(());
            }
            match inner.active.as_ref() {
                Some(a) if a.hit_test.is_none() => {}
                _ => return Ok(()),
            }
            let Some(active) = inner.active.take() else { return Ok(()) };
            inner.lent = true;
            (active, inner.token.clone())
        };

        let space = active.viewer_space.clone();
        let result = active.session.request_hit_test_source(&space).await;

        let mut inner = self.lock();
        inner.lent = false;
        if token.is_cancelled() || inner.state != SessionState::Active {
            debug!("hit-test re-acquisition finished after session end");
            if let Ok(mut source) = result {
                source.cancel();
            }
            active.close();
            return Err(PortalError::Cancelled);
        }
        let outcome = match result {
            Ok(source) => {
                debug!("hit-test source re-acquired");
                active.hit_test = Some(source);
                Ok(())
            }
            Err(e) => Err(PortalError::ResourceAcquisitionFailed(e.0)),
        };
        inner.active = Some(active);
        outcome
    }

    /// Detects an end initiated by the platform and tears down local state.
    /// Returns true exactly once per externally ended session.
    pub fn poll_ended(&self) -> bool {
        let mut inner = self.lock();
        let ended = inner.active.as_ref().map_or(false, |a| a.has_ended());
        if !ended {
            return false;
        }
        info!("immersive session ended by platform");
        if let Some(active) = inner.active.take() {
            active.close();
        }
        inner.token.cancel();
        if inner.state == SessionState::Active {
            inner.state = SessionState::Idle;
        }
        true
    }

    /// Ends the session from any state. Teardown errors are logged, never returned.
    pub fn end(&self) {
        let mut inner = self.lock();
        inner.token.cancel();
        if let Some(active) = inner.active.take() {
            info!("ending immersive session");
            active.close();
        }
        if matches!(inner.state, SessionState::Starting | SessionState::Active) {
            inner.state = SessionState::Idle;
        }
    }

    /// Ends everything and rejects future starts. Idempotent.
    pub fn dispose(&self) {
        self.end();
        let mut inner = self.lock();
        if inner.state != SessionState::Disposed {
            debug!("session manager disposed");
            inner.state = SessionState::Disposed;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine_lib::error::PlatformError;
    use crate::engine_lib::platform::MarkerDetector;
    use glam::Mat4;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use tokio::sync::oneshot;

    #[derive(Default)]
    pub(crate) struct Counters {
        pub ends: Cell<u32>,
        pub hit_test_requests: Cell<u32>,
        pub hit_test_cancels: Cell<u32>,
    }

    pub(crate) struct MockHits {
        counters: Rc<Counters>,
    }

    impl HitTestSource for MockHits {
        fn results(&mut self) -> Vec<Mat4> {
            vec![Mat4::IDENTITY]
        }
        fn cancel(&mut self) {
            self.counters.hit_test_cancels.set(self.counters.hit_test_cancels.get() + 1);
        }
    }

    pub(crate) struct MockSession {
        ended: Rc<watch::Sender<bool>>,
        counters: Rc<Counters>,
        gate: Option<oneshot::Receiver<()>>,
        fail_hit_test: bool,
        fail_floor: bool,
    }

    impl XrSession for MockSession {
        type HitTest = MockHits;

        fn end_signal(&self) -> watch::Receiver<bool> {
            self.ended.subscribe()
        }

        async fn request_reference_space(&mut self, kind: ReferenceSpaceKind) -> Result<ReferenceSpace, PlatformError> {
            if let Some(gate) = self.gate.take() {
                let _ = gate.await;
            }
            if kind == ReferenceSpaceKind::LocalFloor && self.fail_floor {
                return Err(PlatformError::new("no floor"));
            }
            Ok(ReferenceSpace { kind, handle: kind as u64 })
        }

        async fn request_hit_test_source(&mut self, _space: &ReferenceSpace) -> Result<MockHits, PlatformError> {
            self.counters.hit_test_requests.set(self.counters.hit_test_requests.get() + 1);
            if self.fail_hit_test {
                return Err(PlatformError::new("hit-test unavailable"));
            }
            Ok(MockHits { counters: self.counters.clone() })
        }

        fn end(&mut self) -> Result<(), PlatformError> {
            self.counters.ends.set(self.counters.ends.get() + 1);
            self.ended.send_replace(true);
            Ok(())
        }
    }

    pub(crate) struct NoMarker;

    impl MarkerDetector for NoMarker {
        fn poll(&mut self) -> Option<Mat4> {
            None
        }
    }

    #[derive(Default)]
    pub(crate) struct MockPlatform {
        pub counters: Rc<Counters>,
        pub gate: RefCell<Option<oneshot::Receiver<()>>>,
        pub fail_session: bool,
        pub fail_hit_test: bool,
        pub fail_floor: bool,
        pub last_end: RefCell<Option<Rc<watch::Sender<bool>>>>,
    }

    impl XrPlatform for MockPlatform {
        type Session = MockSession;
        type Marker = NoMarker;

        async fn supports_hit_test(&self) -> bool {
            true
        }

        async fn request_session(&self, _features: SessionFeatures) -> Result<MockSession, PlatformError> {
            if self.fail_session {
                return Err(PlatformError::new("denied"));
            }
            let ended = Rc::new(watch::channel(false).0);
            *self.last_end.borrow_mut() = Some(ended.clone());
            Ok(MockSession {
                ended,
                counters: self.counters.clone(),
                gate: self.gate.borrow_mut().take(),
                fail_hit_test: self.fail_hit_test,
                fail_floor: self.fail_floor,
            })
        }

        async fn load_marker_detector(&self) -> Result<NoMarker, PlatformError> {
            Ok(NoMarker)
        }
    }

    fn manager(platform: MockPlatform) -> SessionManager<MockPlatform> {
        SessionManager::new(platform, SessionFeatures::default())
    }

    #[tokio::test]
    async fn start_acquires_spaces_and_hit_test() {
        let manager = manager(MockPlatform::default());
        manager.start().await.unwrap();
        assert_eq!(manager.state(), SessionState::Active);
        assert!(manager.has_hit_test());
        assert_eq!(manager.with_hit_test(|h| h.map(|h| h.results().len())), Some(1));
        manager.end();
        manager.end();
        assert_eq!(manager.state(), SessionState::Idle);
        assert_eq!(manager.platform().counters.ends.get(), 1);
        assert_eq!(manager.platform().counters.hit_test_cancels.get(), 1);
    }

    #[tokio::test]
    async fn floor_space_falls_back_to_local() {
        let manager = manager(MockPlatform { fail_floor: true, ..Default::default() });
        manager.start().await.unwrap();
        let inner = manager.lock();
        assert_eq!(inner.active.as_ref().unwrap().local_space().kind, ReferenceSpaceKind::Local);
    }

    #[tokio::test]
    async fn hit_test_failure_ends_partial_session() {
        let manager = manager(MockPlatform { fail_hit_test: true, ..Default::default() });
        let err = manager.start().await.unwrap_err();
        assert!(matches!(err, PortalError::ResourceAcquisitionFailed(_)));
        assert!(err.is_recoverable());
        assert_eq!(manager.state(), SessionState::Idle);
        assert_eq!(manager.platform().counters.ends.get(), 1);
    }

    #[tokio::test]
    async fn session_request_failure_is_recoverable() {
        let manager = manager(MockPlatform { fail_session: true, ..Default::default() });
        assert!(matches!(manager.start().await, Err(PortalError::SessionRequestFailed(_))));
        assert_eq!(manager.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn concurrent_start_is_rejected() {
        let (tx, rx) = oneshot::channel();
        let manager = manager(MockPlatform { gate: RefCell::new(Some(rx)), ..Default::default() });
        let release = async {
            tokio::task::yield_now().await;
            let _ = tx.send(());
        };
        let (first, second, _) = tokio::join!(manager.start(), manager.start(), release);
        assert!(first.is_ok());
        assert_eq!(second, Err(PortalError::AlreadyStarting));
    }

    #[tokio::test]
    async fn dispose_during_start_leaves_no_session() {
        let (tx, rx) = oneshot::channel();
        let manager = manager(MockPlatform { gate: RefCell::new(Some(rx)), ..Default::default() });
        let interrupt = async {
            tokio::task::yield_now().await;
            manager.dispose();
            let _ = tx.send(());
        };
        let (result, _) = tokio::join!(manager.start(), interrupt);
        assert_eq!(result, Err(PortalError::Cancelled));
        assert_eq!(manager.state(), SessionState::Disposed);
        assert!(!manager.has_hit_test());
        assert_eq!(manager.platform().counters.ends.get(), 1);
        assert_eq!(manager.start().await, Err(PortalError::Disposed));
    }

    #[tokio::test]
    async fn platform_end_is_observed_once() {
        let manager = manager(MockPlatform::default());
        manager.start().await.unwrap();
        manager.platform().last_end.borrow().as_ref().unwrap().send_replace(true);
        assert!(manager.poll_ended());
        assert!(!manager.poll_ended());
        assert_eq!(manager.state(), SessionState::Idle);
        // ended by the platform, so no second end call
        assert_eq!(manager.platform().counters.ends.get(), 0);
    }

    #[tokio::test]
    async fn hit_test_is_reacquired_after_release() {
        let manager = manager(MockPlatform::default());
        manager.start().await.unwrap();
        manager.release_hit_test();
        assert!(manager.needs_hit_test());
        manager.reacquire_hit_test().await.unwrap();
        assert!(manager.has_hit_test());
        assert_eq!(manager.platform().counters.hit_test_requests.get(), 2);
    }

    #[tokio::test]
    async fn cancellation_token_resolves() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let (_, ()) = tokio::join!(async { token.cancel() }, waiter.cancelled());
        assert!(waiter.is_cancelled());
    }

    #[test]
    fn child_tokens_follow_their_parent() {
        let parent = CancellationToken::new();
        let own = parent.child();
        let other = parent.child();
        own.cancel();
        assert!(!parent.is_cancelled());
        assert!(!other.is_cancelled());
        parent.cancel();
        assert!(other.is_cancelled());
        assert!(parent.child().is_cancelled());
    }

    #[tokio::test]
    async fn mount_cancel_aborts_start_before_hit_test_request() {
        let (tx, rx) = oneshot::channel();
        let mount = CancellationToken::new();
        let manager = SessionManager::with_mount(
            MockPlatform { gate: RefCell::new(Some(rx)), ..Default::default() },
            SessionFeatures::default(),
            mount.clone(),
        );
        let unmount = async {
            tokio::task::yield_now().await;
            mount.cancel();
            let _ = tx.send(());
        };
        let (result, _) = tokio::join!(manager.start(), unmount);
        assert_eq!(result, Err(PortalError::Cancelled));
        assert_eq!(manager.state(), SessionState::Idle);
        assert_eq!(manager.platform().counters.hit_test_requests.get(), 0);
        assert_eq!(manager.platform().counters.ends.get(), 1);
        assert_eq!(manager.start().await, Err(PortalError::Cancelled));
    }
}
