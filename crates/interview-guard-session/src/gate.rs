//! Pre-session device check.

use interview_guard_core::DeviceCheckResult;
use interview_guard_display::DisplaySentinel;
use interview_guard_recorder::{DeviceKind, MediaDevices};
use tracing::{info, warn};

/// Probes camera, microphone and display and returns the snapshot the
/// controller is gated on. A failing display probe counts as non-compliant.
pub async fn run_device_check(
    devices: &dyn MediaDevices,
    sentinel: &mut DisplaySentinel,
) -> DeviceCheckResult {
    let camera = probe(devices, DeviceKind::Camera).await;
    let microphone = probe(devices, DeviceKind::Microphone).await;
    let single_display = sentinel.check_single_display();

    let result = DeviceCheckResult {
        camera,
        microphone,
        single_display,
    };
    info!(
        camera,
        microphone,
        single_display,
        passed = result.all_passed(),
        "device check finished"
    );
    result
}

async fn probe(devices: &dyn MediaDevices, kind: DeviceKind) -> bool {
    match devices.probe(kind).await {
        Ok(()) => true,
        Err(error) => {
            warn!(?kind, %error, "device probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the device-check gate.

    use std::sync::Arc;

    use interview_guard_display::{DisplayGeometry, SyntheticDisplayProbe};
    use interview_guard_recorder::SyntheticMediaDevices;

    use super::*;

    #[tokio::test]
    async fn all_devices_present_passes() {
        let devices = SyntheticMediaDevices::new();
        let mut sentinel = DisplaySentinel::new(Arc::new(SyntheticDisplayProbe::default()));
        assert!(run_device_check(&devices, &mut sentinel).await.all_passed());
    }

    #[tokio::test]
    async fn wide_desktop_fails_display_check() {
        let devices = SyntheticMediaDevices::new();
        let probe = SyntheticDisplayProbe::new(DisplayGeometry::single_monitor(3840, 1080));
        let mut sentinel = DisplaySentinel::new(Arc::new(probe));

        let result = run_device_check(&devices, &mut sentinel).await;
        assert!(result.camera && result.microphone);
        assert!(!result.single_display);
    }

    #[tokio::test]
    async fn probe_error_fails_closed() {
        let devices = SyntheticMediaDevices::new();
        devices.deny(DeviceKind::Camera);
        let probe = SyntheticDisplayProbe::default();
        probe.fail_with("screen api unavailable");
        let mut sentinel = DisplaySentinel::new(Arc::new(probe));

        let result = run_device_check(&devices, &mut sentinel).await;
        assert_eq!(
            result,
            DeviceCheckResult {
                camera: false,
                microphone: true,
                single_display: false,
            }
        );
    }
}
