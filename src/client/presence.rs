use tracing::info;

use crate::client::link::LinkState;
use crate::session::SessionId;

/// Hooks for whatever renders the room. All methods default to no-ops.
pub trait PresenceObserver: Send + Sync {
    fn member_joined(&self, _id: &SessionId, _name: &str) {}

    fn member_left(&self, _id: &SessionId, _name: &str) {}

    fn camera_toggled(&self, _id: &SessionId, _is_camera_off: bool, _name: &str) {}

    fn link_state_changed(&self, _id: &SessionId, _state: LinkState) {}
}

/// Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PresenceObserver for NoopObserver {}

/// Writes presence changes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PresenceObserver for LogObserver {
    fn member_joined(&self, id: &SessionId, name: &str) {
        info!("{} ({}) joined", name, id.short());
    }

    fn member_left(&self, id: &SessionId, name: &str) {
        info!("{} ({}) left", name, id.short());
    }

    fn camera_toggled(&self, id: &SessionId, is_camera_off: bool, name: &str) {
        info!(
            "{} ({}) turned camera {}",
            name,
            id.short(),
            if is_camera_off { "off" } else { "on" }
        );
    }

    fn link_state_changed(&self, id: &SessionId, state: LinkState) {
        info!("link to {} is {:?}", id.short(), state);
    }
}
