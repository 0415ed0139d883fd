use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use log::*;
use tokio::sync::broadcast;

use crate::realtime::{BusEvent, Room};

pub const DEFAULT_ROOM_CAPACITY: usize = 64;

/// An in-process pub-sub broker with named rooms.
///
/// Cloning the bus is cheap; every clone shares the same rooms.
#[derive(Clone, Debug)]
pub struct StatusBus {
    rooms: Arc<RwLock<HashMap<Room, broadcast::Sender<BusEvent>>>>,
    capacity: usize,
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_CAPACITY)
    }
}

impl StatusBus {
    pub fn new(capacity: usize) -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())), capacity: capacity.max(1) }
    }

    /// Joins a room, creating it if necessary. Only events published after this call are received.
    pub fn subscribe(&self, room: &Room) -> broadcast::Receiver<BusEvent> {
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
        match rooms.get(room) {
            Some(sender) => sender.subscribe(),
            None => {
                trace!("📬️ Opening room {room}");
                let (sender, receiver) = broadcast::channel(self.capacity);
                rooms.insert(room.clone(), sender);
                receiver
            },
        }
    }

    /// Publishes the event to everyone currently in the room and returns how many subscribers it reached.
    ///
    /// If nobody is listening the event is dropped. Rooms without subscribers are closed.
    pub fn publish(&self, room: &Room, event: BusEvent) -> usize {
        let result = {
            let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
            rooms.get(room).map(|sender| sender.send(event))
        };
        match result {
            Some(Ok(n)) => {
                trace!("📬️ {n} subscribers in {room} received an event");
                n
            },
            Some(Err(_)) => {
                trace!("📬️ Nobody left in {room}. Closing it.");
                self.close_if_empty(room);
                0
            },
            None => {
                trace!("📬️ No subscribers in {room}. Event dropped.");
                0
            },
        }
    }

    pub fn subscriber_count(&self, room: &Room) -> usize {
        let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
        rooms.get(room).map(|s| s.receiver_count()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn close_if_empty(&self, room: &Room) {
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
        if rooms.get(room).is_some_and(|s| s.receiver_count() == 0) {
            rooms.remove(room);
        }
    }
}
