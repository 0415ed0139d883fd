use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::LocationRecord,
    realtime::{BusEvent, Room, StatusBus},
    traits::{DeliveryManagement, LocationError, LocationManagement},
};

/// Relays courier positions to the clients tracking them.
///
/// Only the latest position of each courier is kept. Every report is published to the room of the order the
/// courier is currently delivering, and, if `global_broadcast` is set, to the broadcast room as well.
pub struct LocationApi<B> {
    db: B,
    bus: StatusBus,
    global_broadcast: bool,
}

impl<B> Debug for LocationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocationApi (global broadcast: {})", self.global_broadcast)
    }
}

impl<B> LocationApi<B> {
    pub fn new(db: B, bus: StatusBus, global_broadcast: bool) -> Self {
        Self { db, bus, global_broadcast }
    }
}

impl<B> LocationApi<B>
where B: LocationManagement + DeliveryManagement
{
    pub async fn report_location(
        &self,
        agent_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<LocationRecord, LocationError> {
        validate(agent_id, latitude, longitude)?;
        let now = Utc::now();
        let record = self.db.upsert_location(agent_id, latitude, longitude, now).await?;
        trace!("📍️ {agent_id} is at ({latitude}, {longitude})");
        let event = BusEvent::location(agent_id, latitude, longitude);
        match self.db.active_delivery_for_courier(agent_id).await {
            Ok(Some(delivery)) => {
                if let Err(e) = self.db.update_delivery_location(delivery.id, latitude, longitude, now).await {
                    warn!("📍️ Could not store the position of delivery #{}: {e}", delivery.id);
                }
                self.bus.publish(&Room::order(delivery.order_id), event.clone());
            },
            Ok(None) => trace!("📍️ {agent_id} is not on an active delivery"),
            Err(e) => warn!("📍️ Could not look up the active delivery for {agent_id}: {e}"),
        }
        if self.global_broadcast {
            self.bus.publish(&Room::Broadcast, event);
        }
        Ok(record)
    }

    pub async fn get_location(&self, agent_id: &str) -> Result<LocationRecord, LocationError> {
        self.db.fetch_location(agent_id).await?.ok_or_else(|| LocationError::NotFound(agent_id.to_string()))
    }
}

fn validate(agent_id: &str, latitude: f64, longitude: f64) -> Result<(), LocationError> {
    if agent_id.trim().is_empty() {
        return Err(LocationError::Validation("The agent id cannot be empty".into()));
    }
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(LocationError::Validation(format!("Latitude {latitude} is out of range")));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(LocationError::Validation(format!("Longitude {longitude} is out of range")));
    }
    Ok(())
}
