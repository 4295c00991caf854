//! btleplug Transport
//!
//! Connects to a band the adapter already knows about (bonded or recently
//! seen) and exposes it as a [`Transport`]. Discovery is left to the
//! platform tools.

use crate::infrastructure::bluetooth::protocol::{
    AUTH_CHAR_UUID, NOTIFY_DISABLE, NOTIFY_ENABLE, SENSOR_CONTROL_CHAR_UUID,
    SENSOR_MEASURE_CHAR_UUID,
};
use crate::infrastructure::bluetooth::transport::{
    CharacteristicId, DescriptorId, Notification, Transport, TransportError,
};
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ValueNotification, WriteType,
};
use btleplug::platform::{Manager, Peripheral};
use futures::stream::Stream;
use futures::{FutureExt, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

fn backend(e: btleplug::Error) -> TransportError {
    TransportError::Backend(Box::new(e))
}

fn characteristic_uuid(id: CharacteristicId) -> Uuid {
    match id {
        CharacteristicId::Auth => AUTH_CHAR_UUID,
        CharacteristicId::SensorControl => SENSOR_CONTROL_CHAR_UUID,
        CharacteristicId::SensorMeasure => SENSOR_MEASURE_CHAR_UUID,
    }
}

fn characteristic_id(uuid: Uuid) -> Option<CharacteristicId> {
    [
        CharacteristicId::Auth,
        CharacteristicId::SensorControl,
        CharacteristicId::SensorMeasure,
    ]
    .into_iter()
    .find(|id| characteristic_uuid(*id) == uuid)
}

/// GATT link to one band
pub struct BtleTransport {
    peripheral: Peripheral,
    auth: Characteristic,
    sensor_control: Characteristic,
    sensor_measure: Characteristic,
    notifications: NotificationStream,
}

impl BtleTransport {
    /// Connect to the band with Bluetooth address `address` on the first adapter
    pub async fn connect(address: &str) -> Result<Self, TransportError> {
        let manager = Manager::new().await.map_err(backend)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(backend)?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Backend("no Bluetooth adapter found".into()))?;

        let mut found = None;
        for peripheral in adapter.peripherals().await.map_err(backend)? {
            if peripheral.address().to_string().eq_ignore_ascii_case(address) {
                found = Some(peripheral);
                break;
            }
        }
        let peripheral = found.ok_or_else(|| {
            TransportError::Backend(
                format!("{} is not known to the adapter; bond it first", address).into(),
            )
        })?;

        info!("Connecting to {}", address);
        if !peripheral.is_connected().await.map_err(backend)? {
            peripheral.connect().await.map_err(backend)?;
        }
        peripheral.discover_services().await.map_err(backend)?;
        info!("Connected");

        Self::from_peripheral(peripheral).await
    }

    /// Use a peripheral that is already connected with services discovered
    pub async fn from_peripheral(peripheral: Peripheral) -> Result<Self, TransportError> {
        let characteristics = peripheral.characteristics();
        let lookup = |id: CharacteristicId| {
            let uuid = characteristic_uuid(id);
            characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or(TransportError::MissingCharacteristic(id))
        };

        let auth = lookup(CharacteristicId::Auth)?;
        let sensor_control = lookup(CharacteristicId::SensorControl)?;
        let sensor_measure = lookup(CharacteristicId::SensorMeasure)?;
        let notifications = peripheral.notifications().await.map_err(backend)?;

        Ok(Self {
            peripheral,
            auth,
            sensor_control,
            sensor_measure,
            notifications,
        })
    }

    fn characteristic(&self, id: CharacteristicId) -> &Characteristic {
        match id {
            CharacteristicId::Auth => &self.auth,
            CharacteristicId::SensorControl => &self.sensor_control,
            CharacteristicId::SensorMeasure => &self.sensor_measure,
        }
    }

    /// Disconnect from the band
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        self.peripheral.disconnect().await.map_err(backend)
    }

    fn convert(notification: ValueNotification) -> Notification {
        let characteristic = characteristic_id(notification.uuid);
        if characteristic.is_none() {
            debug!("Notification from unmapped characteristic {}", notification.uuid);
        }
        Notification {
            characteristic,
            value: notification.value,
        }
    }
}

impl Transport for BtleTransport {
    async fn write(
        &mut self,
        characteristic: CharacteristicId,
        bytes: &[u8],
        require_ack: bool,
    ) -> Result<(), TransportError> {
        let write_type = if require_ack {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        let characteristic = self.characteristic(characteristic).clone();
        self.peripheral
            .write(&characteristic, bytes, write_type)
            .await
            .map_err(backend)
    }

    // BlueZ owns the CCCD, so enable/disable go through (un)subscribe
    async fn write_descriptor(
        &mut self,
        descriptor: DescriptorId,
        bytes: &[u8],
        _require_ack: bool,
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(descriptor.characteristic()).clone();
        if bytes == NOTIFY_ENABLE {
            self.peripheral.subscribe(&characteristic).await.map_err(backend)
        } else if bytes == NOTIFY_DISABLE {
            self.peripheral
                .unsubscribe(&characteristic)
                .await
                .map_err(backend)
        } else {
            Err(TransportError::UnsupportedDescriptorValue {
                descriptor,
                value: bytes.to_vec(),
            })
        }
    }

    async fn wait_for_notifications(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<Notification>, TransportError> {
        let first = match tokio::time::timeout(timeout, self.notifications.next()).await {
            Ok(Some(n)) => n,
            Ok(None) => {
                warn!("Notification stream closed");
                return Err(TransportError::Disconnected);
            }
            Err(_) => {
                if !self.peripheral.is_connected().await.map_err(backend)? {
                    return Err(TransportError::Disconnected);
                }
                return Ok(Vec::new());
            }
        };

        let mut batch = vec![Self::convert(first)];
        // pick up whatever else is already queued without waiting again
        while let Some(Some(n)) = self.notifications.next().now_or_never() {
            batch.push(Self::convert(n));
        }
        Ok(batch)
    }

    async fn read(&mut self, characteristic: CharacteristicId) -> Result<Vec<u8>, TransportError> {
        let characteristic = self.characteristic(characteristic).clone();
        self.peripheral
            .read(&characteristic)
            .await
            .map_err(backend)
    }
}
