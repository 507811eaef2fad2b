use std::fmt;

/// Single-slot "redraw now" signal.
///
/// Holds at most one subscriber and no event history: a meter only has a
/// current reading, so a missed notification is covered by the next one.
#[derive(Default)]
pub struct RepaintChannel {
    subscriber: Option<Box<dyn FnMut(u64)>>,
    last_frame: Option<u64>,
    pending: bool,
    closed: bool,
}

impl RepaintChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the repaint callback, replacing any previous one.
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: FnMut(u64) + 'static,
    {
        if !self.closed {
            self.subscriber = Some(Box::new(subscriber));
        }
    }

    pub fn unsubscribe(&mut self) {
        self.subscriber = None;
    }

    /// Publishes a redraw for `frame`. Repeated calls for the same frame and
    /// calls after [`RepaintChannel::close`] are dropped.
    pub fn notify(&mut self, frame: u64) -> bool {
        if self.closed || self.last_frame == Some(frame) {
            return false;
        }

        self.last_frame = Some(frame);
        self.pending = true;
        if let Some(subscriber) = self.subscriber.as_mut() {
            subscriber(frame);
        }
        true
    }

    /// Consumes the pending flag for hosts that poll instead of subscribing.
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drops the subscriber and refuses further notifications.
    pub fn close(&mut self) {
        self.closed = true;
        self.pending = false;
        self.subscriber = None;
    }
}

impl fmt::Debug for RepaintChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepaintChannel")
            .field("subscribed", &self.subscriber.is_some())
            .field("last_frame", &self.last_frame)
            .field("pending", &self.pending)
            .field("closed", &self.closed)
            .finish()
    }
}
