//! Voice handshake relay. Payloads are forwarded verbatim and never inspected.

use crate::room::Room;
use log::debug;
use serde_json::Value;
use shared::{PlayerId, SignalKind};

impl Room {
    /// Forwards a handshake message from `from` to `to`
    ///
    /// Unknown or not-yet-ready targets are dropped without telling the
    /// sender. Returns whether the message was handed to the target's channel.
    pub fn relay(&self, kind: SignalKind, from: &PlayerId, to: &PlayerId, body: Value) -> bool {
        match self.get(to) {
            Some(target) if target.ready => target.send(kind.deliver(from.clone(), body)),
            _ => {
                debug!("Dropping {:?} from {} to unreachable {}", kind, from, to);
                false
            }
        }
    }
}
