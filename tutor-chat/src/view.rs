use crate::transcript::{EntryKey, Transcript};

/// A change to the transcript, for views that patch rather than redraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewPatch {
    Inserted(EntryKey),
    Updated(EntryKey),
    Removed(EntryKey),
    ThreadInserted { parent: EntryKey, key: EntryKey },
    ThreadRemoved { parent: EntryKey, key: EntryKey },
    ThreadOpened(EntryKey),
    ThreadClosed(EntryKey),
    ComposerCleared,
    /// A failure the user has to acknowledge.
    Alert(String),
}

/// Where the controller renders.
///
/// The transcript passed alongside each patch already reflects it.
pub trait RenderTarget {
    fn apply(&mut self, transcript: &Transcript, patch: &ViewPatch);
}

/// Records patches for later inspection.
#[derive(Debug, Default)]
pub struct PatchLog {
    patches: Vec<ViewPatch>,
}

impl PatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patches(&self) -> &[ViewPatch] {
        &self.patches
    }

    pub fn drain(&mut self) -> Vec<ViewPatch> {
        std::mem::take(&mut self.patches)
    }

    pub fn alerts(&self) -> impl Iterator<Item = &str> {
        self.patches.iter().filter_map(|p| match p {
            ViewPatch::Alert(msg) => Some(msg.as_str()),
            _ => None,
        })
    }
}

impl RenderTarget for PatchLog {
    fn apply(&mut self, _transcript: &Transcript, patch: &ViewPatch) {
        self.patches.push(patch.clone());
    }
}
