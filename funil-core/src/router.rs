//! Fans inbound messages out to per-sender worker lanes.
//!
//! One sender's messages are handled strictly in arrival order, because each
//! dispatch reads and rewrites that sender's timer and closed flag. Distinct
//! senders run concurrently; one sender's typing delay never stalls another.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dispatch::Dispatcher;
use crate::message::InboundMessage;

pub struct InboundRouter;

impl InboundRouter {
    /// Spawn the fan-out loop. Runs until the inbound channel closes; lane
    /// workers drain their queues and exit after it.
    pub fn spawn(
        dispatcher: Arc<Dispatcher>,
        mut rx: mpsc::Receiver<InboundMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Inbound router started");
            let mut lanes: HashMap<String, mpsc::UnboundedSender<InboundMessage>> =
                HashMap::new();

            while let Some(message) = rx.recv().await {
                let lane = lanes
                    .entry(message.sender.clone())
                    .or_insert_with(|| spawn_lane(dispatcher.clone()));
                if let Err(mpsc::error::SendError(message)) = lane.send(message) {
                    // Lane worker is gone; replace it and replay the message.
                    let key = message.sender.clone();
                    let fresh = spawn_lane(dispatcher.clone());
                    if fresh.send(message).is_err() {
                        tracing::error!(sender = %key, "Dropped inbound message");
                    }
                    lanes.insert(key, fresh);
                }
            }

            tracing::info!("Inbound router stopped");
        })
    }
}

fn spawn_lane(dispatcher: Arc<Dispatcher>) -> mpsc::UnboundedSender<InboundMessage> {
    let (tx, mut rx) = mpsc::unbounded_channel::<InboundMessage>();
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            dispatcher.dispatch(&message).await;
        }
    });
    tx
}
