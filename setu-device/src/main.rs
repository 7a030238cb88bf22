//! Setu provisioning daemon.
//!
//! Advertises a BLE service with two write characteristics, waits for a
//! companion app to deliver a Wi-Fi SSID and passphrase, then hands them to
//! NetworkManager. Single-shot: the process exits after the first apply
//! attempt, successful or not, and is restarted by the operator if
//! provisioning has to be redone.
//!
//! Run with enough privilege to power the BLE adapter and to let nmcli
//! modify connections. `RUST_LOG` controls verbosity (default `info`).

mod ble;
mod netconf;
mod provision;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::info;

use ble::{BleServer, PeripheralServer};
use netconf::{NetConfig, Nmcli};
use provision::Coordinator;

/// How long to let in-flight BLE operations settle after the advertisement
/// is torn down, before the host network stack is touched.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("setu-device {} starting", env!("CARGO_PKG_VERSION"));

    let mut server = PeripheralServer::new().await.context("enable BLE stack")?;
    let mut netcfg = Nmcli;
    let ssid = run(&mut server, &mut netcfg, SETTLE_DELAY).await?;

    info!("Wi-Fi configured; the device should now join {ssid:?}");
    info!("reboot if other services need to pick up the new network");
    Ok(())
}

/// Drive provisioning to completion: advertise, collect both credentials,
/// stop advertising, apply. Returns the SSID that was applied.
async fn run<B: BleServer, N: NetConfig>(
    server: &mut B,
    netcfg: &mut N,
    settle: Duration,
) -> anyhow::Result<String> {
    let coordinator = Arc::new(Coordinator::new());

    server
        .start(coordinator.clone())
        .await
        .context("start provisioning service")?;
    info!(
        "waiting for credentials; scan for {} in the companion app",
        setu_proto::DEVICE_NAME
    );

    coordinator.wait_ready().await;

    info!("both credentials received; stopping advertisement");
    server.stop().await.context("stop advertising")?;
    tokio::time::sleep(settle).await;

    let (ssid, passphrase) = coordinator
        .credentials()
        .context("credential store empty after completion signal")?;
    netcfg
        .connect(&ssid, &passphrase)
        .context("apply Wi-Fi credentials")?;
    Ok(ssid)
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::provision::{CredentialField, CredentialWrite};
    use super::*;

    fn write(field: CredentialField, payload: &[u8]) -> CredentialWrite {
        CredentialWrite {
            field,
            payload: payload.to_vec(),
        }
    }

    /// Delivers a scripted set of writes on spawned tasks, the way the real
    /// stack delivers callbacks concurrently with the waiting main flow.
    struct ScriptedBle {
        writes: Vec<CredentialWrite>,
        stopped: bool,
    }

    impl ScriptedBle {
        fn new(writes: Vec<CredentialWrite>) -> Self {
            Self {
                writes,
                stopped: false,
            }
        }
    }

    impl BleServer for ScriptedBle {
        type Error = Infallible;

        async fn start(&mut self, coordinator: Arc<Coordinator>) -> Result<(), Infallible> {
            for write in self.writes.drain(..) {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    coordinator.handle_write(write);
                });
            }
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), Infallible> {
            self.stopped = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNet {
        calls: Vec<(String, String)>,
        fail_with: Option<String>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("nmcli exited with status 4: {0}")]
    struct FakeNetError(String);

    impl NetConfig for RecordingNet {
        type Error = FakeNetError;

        fn connect(&mut self, ssid: &str, passphrase: &str) -> Result<(), FakeNetError> {
            self.calls.push((ssid.to_string(), passphrase.to_string()));
            match &self.fail_with {
                Some(output) => Err(FakeNetError(output.clone())),
                None => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn applies_once_with_ssid_first() {
        let mut ble = ScriptedBle::new(vec![
            write(CredentialField::Ssid, b"HomeNet"),
            write(CredentialField::Passphrase, b"s3cr3t!"),
        ]);
        let mut net = RecordingNet::default();

        let ssid = run(&mut ble, &mut net, Duration::ZERO).await.unwrap();

        assert_eq!(ssid, "HomeNet");
        assert!(ble.stopped, "advertisement must stop before the apply step");
        assert_eq!(net.calls, vec![("HomeNet".to_string(), "s3cr3t!".to_string())]);
    }

    #[tokio::test]
    async fn applies_once_with_passphrase_first() {
        let mut ble = ScriptedBle::new(vec![
            write(CredentialField::Passphrase, b"s3cr3t!"),
            write(CredentialField::Ssid, b"HomeNet"),
        ]);
        let mut net = RecordingNet::default();

        let ssid = run(&mut ble, &mut net, Duration::ZERO).await.unwrap();

        assert_eq!(ssid, "HomeNet");
        assert_eq!(net.calls, vec![("HomeNet".to_string(), "s3cr3t!".to_string())]);
    }

    #[tokio::test]
    async fn apply_failure_surfaces_the_diagnostics() {
        let mut ble = ScriptedBle::new(vec![
            write(CredentialField::Ssid, b"HomeNet"),
            write(CredentialField::Passphrase, b"wrong"),
        ]);
        let mut net = RecordingNet {
            fail_with: Some("Error: Secrets were required, but not provided.".to_string()),
            ..Default::default()
        };

        let err = run(&mut ble, &mut net, Duration::ZERO).await.unwrap_err();

        let rendered = format!("{err:#}");
        assert!(rendered.contains("Secrets were required"), "{rendered}");
        assert!(ble.stopped, "no further BLE activity after the wake-up");
        assert_eq!(net.calls.len(), 1, "no retry of the apply step");
    }

    #[tokio::test]
    async fn blocks_forever_with_only_the_ssid() {
        let mut ble = ScriptedBle::new(vec![write(CredentialField::Ssid, b"HomeNet")]);
        let mut net = RecordingNet::default();

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            run(&mut ble, &mut net, Duration::ZERO),
        )
        .await;

        assert!(outcome.is_err(), "must still be waiting for the passphrase");
        assert!(net.calls.is_empty(), "apply must never run");
    }
}
