// src/engine_lib/platform.rs
//
// Seams to the host platform. A WebXR or OpenXR binding implements these;
// the desktop preview and the tests provide their own.

use glam::Mat4;
use tokio::sync::watch;

use crate::engine_lib::config::SessionFeatures;
use crate::engine_lib::error::PlatformError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceSpaceKind {
    Local,
    LocalFloor,
    Viewer,
}

/// Opaque handle to a platform reference space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceSpace {
    pub kind: ReferenceSpaceKind,
    pub handle: u64,
}

/// Per-frame surface intersection query bound to the viewer space.
pub trait HitTestSource {
    /// Poses of the surface intersections for the current frame, nearest first.
    fn results(&mut self) -> Vec<Mat4>;
    /// Stops the platform from producing results for this source.
    fn cancel(&mut self);
}

/// Continuous pose output of a marker-pattern recognition module.
pub trait MarkerDetector {
    /// Latest marker transform, or `None` while the marker is not detected.
    fn poll(&mut self) -> Option<Mat4>;
}

#[allow(async_fn_in_trait)]
pub trait XrSession {
    type HitTest: HitTestSource + 'static;

    /// Receiver that flips to `true` once the session has ended, whoever ended it.
    fn end_signal(&self) -> watch::Receiver<bool>;

    async fn request_reference_space(
        &mut self,
        kind: ReferenceSpaceKind,
    ) -> Result<ReferenceSpace, PlatformError>;

    async fn request_hit_test_source(
        &mut self,
        space: &ReferenceSpace,
    ) -> Result<Self::HitTest, PlatformError>;

    /// Asks the platform to end the session. Completion is observed via `end_signal`.
    fn end(&mut self) -> Result<(), PlatformError>;
}

#[allow(async_fn_in_trait)]
pub trait XrPlatform {
    type Session: XrSession;
    type Marker: MarkerDetector + 'static;

    /// Probes whether an immersive session with surface hit-testing can be requested.
    async fn supports_hit_test(&self) -> bool;

    async fn request_session(&self, features: SessionFeatures) -> Result<Self::Session, PlatformError>;

    /// Loads the marker-pattern detection library and starts it.
    async fn load_marker_detector(&self) -> Result<Self::Marker, PlatformError>;
}
