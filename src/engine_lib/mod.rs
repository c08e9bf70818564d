// src/engine_lib/mod.rs

pub mod anchor;
pub mod camera;
pub mod config;
pub mod controller;
pub mod crossing;
pub mod error;
pub mod events;
pub mod geometry;
pub mod placement;
pub mod platform;
pub mod portal;
pub mod runtime;
pub mod session;
pub mod tracking;
pub mod transition;

pub use anchor::{AnchorTransform, CommitOutcome, PortalAnchor};
pub use camera::Camera;
pub use config::{PortalConfig, SessionFeatures, SmoothingMode};
pub use controller::CameraController;
pub use crossing::{CrossingDetector, CrossingEvent, CrossingState};
pub use error::{PlatformError, PortalError, PortalResult};
pub use events::{CameraPreviewGate, PortalEvent, PortalListener};
pub use geometry::{Pose, Ray};
pub use placement::{PlacementState, PlacementTracker, ReticleUpdate};
pub use platform::{HitTestSource, MarkerDetector, ReferenceSpace, ReferenceSpaceKind, XrPlatform, XrSession};
pub use portal::{FrameReport, PortalCore};
pub use runtime::{DisposeHandle, FrameLoop, FrameSource, PortalRuntime};
pub use session::{CancellationToken, SessionManager, SessionState};
pub use tracking::{AnchorTracker, MarkerTracker, PreciseTracker, TrackedAnchor, TrackingMode};
pub use transition::{OverlayMode, TransitionAnimator, TransitionTargets};
