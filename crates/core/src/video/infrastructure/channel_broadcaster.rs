use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::shared::frame::Frame;
use crate::video::domain::frame_broadcaster::FrameBroadcaster;

/// Hands annotated frames to subscribed viewers over bounded channels.
///
/// A viewer whose channel is full misses that frame; a viewer that dropped
/// its receiver is forgotten on the next broadcast.
pub struct ChannelBroadcaster {
    capacity: usize,
    viewers: Mutex<Vec<Sender<Arc<Frame>>>>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            viewers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Receiver<Arc<Frame>> {
        let (tx, rx) = crossbeam_channel::bounded(self.capacity);
        self.lock().push(tx);
        rx
    }

    pub fn viewer_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<Arc<Frame>>>> {
        self.viewers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FrameBroadcaster for ChannelBroadcaster {
    fn broadcast(&self, frame: Frame) {
        let mut viewers = self.lock();
        if viewers.is_empty() {
            return;
        }
        let frame = Arc::new(frame);
        viewers.retain(|tx| match tx.try_send(Arc::clone(&frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::trace!("Viewer lagging, dropped frame {}", frame.index());
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
