//! Frame load types.

use serde::{Deserialize, Serialize};

/// How a frame load was initiated. Drives which history update runs when
/// the load commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameLoadType {
    /// A new navigation that pushes a back/forward entry.
    Standard,
    Back,
    Forward,
    /// A jump to an arbitrary back/forward index.
    IndexedBackForward,
    Reload,
    ReloadFromOrigin,
    ReloadExpiredOnly,
    /// Navigation to the URL already displayed.
    Same,
    /// Navigation that replaces the current entry.
    Replace,
    /// Redirect (or subframe load) that must not add a back/forward entry.
    RedirectWithLockedBackForwardList,
}

impl FrameLoadType {
    /// Whether this load traverses the back/forward list.
    pub fn is_back_forward(self) -> bool {
        matches!(self, Self::Back | Self::Forward | Self::IndexedBackForward)
    }

    /// Whether this load reloads the current entry.
    pub fn is_reload(self) -> bool {
        matches!(
            self,
            Self::Reload | Self::ReloadFromOrigin | Self::ReloadExpiredOnly
        )
    }

    /// Reload types that save the scroll position before reloading.
    pub fn saves_scroll_on_reload(self) -> bool {
        matches!(self, Self::Reload | Self::ReloadFromOrigin)
    }
}
