use crate::{Attachment, SlotData};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Slot {
    data_index: usize,
    pub bone: usize,
    pub color: [f32; 4],
    pub dark_color: Option<[f32; 3]>,
    attachment: Option<Arc<Attachment>>,
    /// Vertex offsets (weighted) or positions (unweighted) written by deform timelines.
    pub deform: Vec<f32>,
    /// -1 shows the sequence's setup index.
    pub sequence_index: i32,
    pub(crate) attachment_state: i32,
}

impl Slot {
    pub(crate) fn new(data_index: usize, data: &SlotData) -> Self {
        Self {
            data_index,
            bone: data.bone,
            color: data.color,
            dark_color: data.dark_color,
            attachment: None,
            deform: Vec::new(),
            sequence_index: -1,
            attachment_state: 0,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn attachment(&self) -> Option<&Arc<Attachment>> {
        self.attachment.as_ref()
    }

    /// Swaps the displayed attachment. The deform buffer survives only when both attachments
    /// share deform timelines; the sequence index always resets.
    pub fn set_attachment(&mut self, attachment: Option<Arc<Attachment>>) {
        let same = match (&self.attachment, &attachment) {
            (Some(current), Some(next)) => Arc::ptr_eq(current, next),
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }
        let keeps_deform = match (
            self.attachment.as_deref().and_then(Attachment::vertex_data),
            attachment.as_deref().and_then(Attachment::vertex_data),
        ) {
            (Some(current), Some(next)) => current.timeline_attachment == next.timeline_attachment,
            _ => false,
        };
        if !keeps_deform {
            self.deform.clear();
        }
        self.attachment = attachment;
        self.sequence_index = -1;
    }

    pub(crate) fn set_to_setup_color(&mut self, data: &SlotData) {
        self.color = data.color;
        self.dark_color = data.dark_color;
    }
}
