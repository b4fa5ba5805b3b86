//! Hover tracking for the drop target.
//!
//! Nested elements fire enter/leave pairs while the pointer crosses their
//! borders, so a plain boolean would flicker. We count nesting depth instead
//! and only report "not dragging" once every enter has been matched by a leave.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEvent {
    Enter,
    Over,
    Leave,
    Drop,
}

/// What the caller must do with the platform event after we saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Suppress the browser default (opening the file in the tab).
    PreventDefault,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragTracker {
    depth: u32,
    active: bool,
}

impl DragTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn handle(&mut self, event: DragEvent) -> Disposition {
        match event {
            DragEvent::Enter => {
                self.depth += 1;
                self.active = true;
            }
            DragEvent::Over => {}
            DragEvent::Leave => {
                self.depth = self.depth.saturating_sub(1);
                if self.depth == 0 {
                    self.active = false;
                }
            }
            DragEvent::Drop => self.reset(),
        }
        Disposition::PreventDefault
    }

    /// Handles a drop and returns the file to ingest.
    ///
    /// Only the first dropped file is used; any others are ignored on purpose.
    pub fn drop_files<T>(
        &mut self,
        files: impl IntoIterator<Item = T>,
    ) -> (Disposition, Option<T>) {
        let disposition = self.handle(DragEvent::Drop);
        (disposition, files.into_iter().next())
    }

    fn reset(&mut self) {
        self.depth = 0;
        self.active = false;
    }
}
