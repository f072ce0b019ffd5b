//! Selector surface controller — lifecycle of the single chooser window.
//!
//! The window itself is rendered by the GUI; this tracks whether one is
//! open and how it went away. The engine never owns two surfaces: a
//! discovery event while one is open refreshes it instead.

/// What `ensure` did to satisfy "a surface exists".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAction {
    Created,
    Refreshed,
}

pub struct SurfaceController {
    open: bool,
    visible: bool,
}

impl SurfaceController {
    pub fn new() -> Self {
        Self {
            open: false,
            visible: false,
        }
    }

    /// Create the surface if absent, otherwise refresh the existing one.
    /// Either way it ends up visible.
    pub fn ensure(&mut self) -> SurfaceAction {
        let action = if self.open {
            SurfaceAction::Refreshed
        } else {
            self.open = true;
            SurfaceAction::Created
        };
        self.visible = true;
        action
    }

    /// Engine-originated close, after the session resolved. Idempotent.
    pub fn close(&mut self) {
        self.open = false;
        self.visible = false;
    }

    /// The user destroyed the window through its close affordance; the
    /// surface is already gone, only drop our reference. The engine reads
    /// the suppression consequence from the session, not from here.
    pub fn mark_dismissed(&mut self) {
        self.open = false;
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_creates_then_refreshes() {
        let mut surface = SurfaceController::new();
        assert_eq!(surface.ensure(), SurfaceAction::Created);
        assert!(surface.open);
        assert!(surface.is_visible());

        // Second ensure reuses the window, never a second instance.
        assert_eq!(surface.ensure(), SurfaceAction::Refreshed);
        assert!(surface.open);
    }

    #[test]
    fn close_is_idempotent() {
        let mut surface = SurfaceController::new();
        surface.ensure();
        surface.close();
        assert!(!surface.open);
        assert!(!surface.is_visible());
        surface.close();
        assert!(!surface.open);
    }

    #[test]
    fn ensure_after_dismiss_creates_again() {
        let mut surface = SurfaceController::new();
        surface.ensure();
        surface.mark_dismissed();
        assert!(!surface.open);
        assert_eq!(surface.ensure(), SurfaceAction::Created);
    }
}
