// btleconn Source Code File
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Fan-out of [`ManagerEvent`]s to any number of subscribers.

use crate::api::ManagerEvent;
use futures::stream::{Stream, StreamExt};
use log::trace;
use std::pin::Pin;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub(crate) struct EventHub {
    events_channel: broadcast::Sender<ManagerEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        let (broadcast_sender, _) = broadcast::channel(EVENT_CAPACITY);
        EventHub {
            events_channel: broadcast_sender,
        }
    }
}

impl EventHub {
    pub fn emit(&self, event: ManagerEvent) {
        if let Err(lost) = self.events_channel.send(event) {
            trace!("Lost manager event, while nothing subscribed: {:?}", lost.0);
        }
    }

    /// Subscribers that fall more than `EVENT_CAPACITY` events behind skip the
    /// missed events instead of ending the stream.
    pub fn event_stream(&self) -> Pin<Box<dyn Stream<Item = ManagerEvent> + Send>> {
        let receiver = self.events_channel.subscribe();
        Box::pin(BroadcastStream::new(receiver).filter_map(|x| async move { x.ok() }))
    }
}
