//! Face-presence capability.
//!
//! The capture flow can surface whether a face is visible in the preview, but
//! no platform detector is bundled: [`platform_detector`] returns
//! [`AlwaysPresent`], which reports a face unconditionally so the wizard is
//! never blocked on detection quality. A real detector only needs to
//! implement [`FaceDetector`].

use std::sync::Arc;

use super::session::RgbaFrame;

/// Per-frame face presence check. Implementations must be cheap enough to run
/// on the UI repaint cadence.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &RgbaFrame) -> bool;
}

/// Detector that reports a face in every frame.
pub struct AlwaysPresent;

impl FaceDetector for AlwaysPresent {
    fn detect(&self, _frame: &RgbaFrame) -> bool {
        true
    }
}

/// The detector for the current platform.
pub fn platform_detector() -> Arc<dyn FaceDetector> {
    Arc::new(AlwaysPresent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_present_reports_face() {
        let frame = RgbaFrame {
            width: 1,
            height: 1,
            data: vec![0, 0, 0, 255],
        };
        assert!(platform_detector().detect(&frame));
    }
}
