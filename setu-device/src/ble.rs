//! BlueZ GATT peripheral for credential collection.
//!
//! Registers the provisioning service from `setu-proto` and forwards every
//! characteristic write to the coordinator. Write callbacks run on the BLE
//! stack's tasks and must not block: each one records the payload and
//! possibly fires the completion signal, nothing else.

use std::sync::Arc;

use bluer::adv::{Advertisement, AdvertisementHandle};
use bluer::gatt::local::{
    Application, ApplicationHandle, Characteristic, CharacteristicWrite, CharacteristicWriteMethod,
    CharacteristicWriteRequest, ReqError, Service,
};
use bluer::{Adapter, Session};
use log::{debug, info};
use uuid::Uuid;

use crate::provision::{Coordinator, CredentialField, CredentialWrite};

/// Seam between the provisioning flow and the BLE stack.
pub trait BleServer {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Register the GATT service and start advertising, routing
    /// characteristic writes to `coordinator`.
    async fn start(&mut self, coordinator: Arc<Coordinator>) -> Result<(), Self::Error>;

    /// Tear down the advertisement and the service registration.
    async fn stop(&mut self) -> Result<(), Self::Error>;
}

/// Failures while bringing the peripheral up or down. All of these mean a
/// misconfigured environment rather than a transient fault, so the caller
/// aborts instead of retrying.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("invalid uuid {uuid}: {source}")]
    Uuid {
        uuid: &'static str,
        source: uuid::Error,
    },
    #[error(transparent)]
    Bluetooth(#[from] bluer::Error),
}

/// BlueZ-backed peripheral.
pub struct PeripheralServer {
    adapter: Adapter,
    adv_handle: Option<AdvertisementHandle>,
    app_handle: Option<ApplicationHandle>,
}

impl PeripheralServer {
    /// Open a BlueZ session, power the default adapter on and set its alias
    /// to the advertised device name.
    pub async fn new() -> Result<Self, SetupError> {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        info!("using bluetooth adapter {}", adapter.name());

        if !adapter.is_powered().await? {
            adapter.set_powered(true).await?;
        }
        adapter.set_alias(setu_proto::DEVICE_NAME.to_string()).await?;

        Ok(Self {
            adapter,
            adv_handle: None,
            app_handle: None,
        })
    }

    fn parse_uuid(uuid: &'static str) -> Result<Uuid, SetupError> {
        Uuid::parse_str(uuid).map_err(|source| SetupError::Uuid { uuid, source })
    }

    /// Write callback body. Must not block: record the payload, possibly
    /// fire the completion signal, return.
    async fn handle_write(
        field: CredentialField,
        payload: Vec<u8>,
        req: CharacteristicWriteRequest,
        coordinator: Arc<Coordinator>,
    ) -> Result<(), ReqError> {
        match field {
            CredentialField::Ssid => {
                info!("received ssid: {}", String::from_utf8_lossy(&payload));
            }
            // Keep the passphrase itself out of the logs.
            CredentialField::Passphrase => {
                info!("received passphrase ({} bytes)", payload.len());
            }
        }
        debug!("write at offset {}, mtu {}", req.offset, req.mtu);
        coordinator.handle_write(CredentialWrite { field, payload });
        Ok(())
    }

    /// A write-only characteristic whose payloads land in the coordinator.
    fn credential_characteristic(
        uuid: Uuid,
        field: CredentialField,
        coordinator: Arc<Coordinator>,
    ) -> Characteristic {
        Characteristic {
            uuid,
            write: Some(CharacteristicWrite {
                write: true,
                method: CharacteristicWriteMethod::Fun(Box::new(move |payload, req| {
                    let coordinator = coordinator.clone();
                    Box::pin(Self::handle_write(field, payload, req, coordinator))
                })),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

impl BleServer for PeripheralServer {
    type Error = SetupError;

    async fn start(&mut self, coordinator: Arc<Coordinator>) -> Result<(), SetupError> {
        let service_uuid = Self::parse_uuid(setu_proto::SERVICE_UUID)?;
        let ssid_uuid = Self::parse_uuid(setu_proto::WIFI_SSID_UUID)?;
        let pass_uuid = Self::parse_uuid(setu_proto::WIFI_PASS_UUID)?;

        let app = Application {
            services: vec![Service {
                uuid: service_uuid,
                primary: true,
                characteristics: vec![
                    Self::credential_characteristic(
                        ssid_uuid,
                        CredentialField::Ssid,
                        coordinator.clone(),
                    ),
                    Self::credential_characteristic(
                        pass_uuid,
                        CredentialField::Passphrase,
                        coordinator,
                    ),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        self.app_handle = Some(self.adapter.serve_gatt_application(app).await?);
        info!("provisioning service registered");

        let adv = Advertisement {
            service_uuids: vec![service_uuid].into_iter().collect(),
            discoverable: Some(true),
            local_name: Some(setu_proto::DEVICE_NAME.to_string()),
            ..Default::default()
        };
        self.adv_handle = Some(self.adapter.advertise(adv).await?);
        info!("advertising as {}", setu_proto::DEVICE_NAME);

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SetupError> {
        // BlueZ unregisters the advertisement and the application when their
        // handles drop.
        if self.adv_handle.take().is_some() {
            info!("advertising stopped");
        }
        self.app_handle.take();
        Ok(())
    }
}
