use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use super::TargetFrequencies;

const QUEUE_DEPTH: usize = 4;

/// Handoff of target frequencies from the frame pipeline to the audio thread.
///
/// Latest value wins: when the queue is full the oldest pending update is
/// dropped, so the producer never blocks and the consumer never sees a
/// partially written list.
pub struct FrequencyBus {
    sender: Sender<TargetFrequencies>,
    receiver: Receiver<TargetFrequencies>,
}

impl FrequencyBus {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(QUEUE_DEPTH);
        FrequencyBus { sender, receiver }
    }

    /// Queue a complete frequency set for the audio thread
    pub fn publish(&self, targets: TargetFrequencies) {
        let mut pending = targets;
        loop {
            match self.sender.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    // Make room by discarding the stalest update
                    let _ = self.receiver.try_recv();
                    pending = returned;
                }
                // Both ends live in self, so this cannot happen
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Consumer handle for the audio callback
    pub fn receiver(&self) -> FrequencyReceiver {
        FrequencyReceiver {
            receiver: self.receiver.clone(),
        }
    }

    /// Number of updates not yet consumed
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for FrequencyBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Audio-side end of a `FrequencyBus`
#[derive(Clone)]
pub struct FrequencyReceiver {
    receiver: Receiver<TargetFrequencies>,
}

impl FrequencyReceiver {
    /// Drain everything queued and keep only the newest set. Never blocks.
    pub fn latest(&self) -> Option<TargetFrequencies> {
        let mut newest = None;
        while let Ok(targets) = self.receiver.try_recv() {
            newest = Some(targets);
        }
        newest
    }
}
