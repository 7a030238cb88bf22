//! Host network configuration.

use std::process::Command;

use log::info;

/// Applies Wi-Fi credentials to the host network stack.
pub trait NetConfig {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connect the host to the given network. Blocks until the underlying
    /// tool reports success or failure.
    fn connect(&mut self, ssid: &str, passphrase: &str) -> Result<(), Self::Error>;
}

/// NetworkManager via `nmcli`. The daemon must run with enough privilege for
/// nmcli to modify connections.
#[derive(Debug, Default)]
pub struct Nmcli;

#[derive(Debug, thiserror::Error)]
pub enum NmcliError {
    #[error("failed to run nmcli: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("nmcli exited with {status}: {output}")]
    Failed {
        status: std::process::ExitStatus,
        output: String,
    },
}

impl NetConfig for Nmcli {
    type Error = NmcliError;

    fn connect(&mut self, ssid: &str, passphrase: &str) -> Result<(), NmcliError> {
        info!("running nmcli to join {ssid:?}");

        let result = Command::new("nmcli")
            .args(["device", "wifi", "connect", ssid, "password", passphrase])
            .output()?;

        // nmcli spreads its diagnostics across both streams; keep both so a
        // wrong passphrase or out-of-range network is visible to the operator.
        let mut output = String::from_utf8_lossy(&result.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&result.stderr));
        let output = output.trim().to_string();

        if !result.status.success() {
            return Err(NmcliError::Failed {
                status: result.status,
                output,
            });
        }

        info!("nmcli: {output}");
        Ok(())
    }
}
