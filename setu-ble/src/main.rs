//! Operator CLI for provisioning Setu devices.
//!
//! Plays the companion-app role from a laptop: scans for a device
//! advertising the provisioning service and writes the Wi-Fi credentials to
//! its two characteristics.

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use clap::{Parser, Subcommand};
use std::time::Duration;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "setu-ble")]
#[command(about = "Provision Setu devices over BLE")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for Setu devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Send Wi-Fi credentials to a device
    Provision {
        /// Device name or address to connect to (default: any Setu device)
        #[arg(short, long)]
        device: Option<String>,
        /// Wi-Fi network name
        #[arg(short, long)]
        ssid: String,
        /// Wi-Fi passphrase
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    let adapter = adapters
        .into_iter()
        .next()
        .ok_or("No Bluetooth adapter found")?;

    match cli.command {
        Commands::Scan { duration } => {
            scan_devices(&adapter, duration).await?;
        }
        Commands::Provision {
            device,
            ssid,
            password,
        } => {
            provision_device(&adapter, device, &ssid, &password).await?;
        }
    }

    Ok(())
}

async fn scan_devices(adapter: &Adapter, duration: u64) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning for Setu devices ({} seconds)...", duration);

    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(Duration::from_secs(duration)).await;

    let peripherals = adapter.peripherals().await?;

    println!("\nFound {} devices:", peripherals.len());
    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_else(|| "Unknown".to_string());
            let addr = peripheral.address();
            let rssi = props
                .rssi
                .map(|r| format!("{} dBm", r))
                .unwrap_or_else(|| "N/A".to_string());

            let marker = if name == setu_proto::DEVICE_NAME {
                " [SETU]"
            } else {
                ""
            };

            println!("  {} ({}) RSSI: {}{}", name, addr, rssi, marker);
        }
    }

    adapter.stop_scan().await?;
    Ok(())
}

async fn find_setu_device(
    adapter: &Adapter,
    target: Option<String>,
) -> Result<Peripheral, Box<dyn std::error::Error>> {
    println!("Scanning for Setu devices...");

    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let peripherals = adapter.peripherals().await?;

    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_default();
            let addr = peripheral.address().to_string();

            // Match by target (name or address fragment) or take any device
            // advertising the well-known provisioning name.
            let matches = match &target {
                Some(t) => name.contains(t) || addr.contains(t),
                None => name == setu_proto::DEVICE_NAME,
            };

            if matches {
                adapter.stop_scan().await?;
                println!("Found device: {} ({})", name, addr);
                return Ok(peripheral);
            }
        }
    }

    adapter.stop_scan().await?;
    Err("No Setu device found".into())
}

async fn provision_device(
    adapter: &Adapter,
    target: Option<String>,
    ssid: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let device = find_setu_device(adapter, target).await?;

    println!("Connecting...");
    device.connect().await?;
    println!("Connected!");

    println!("Discovering services...");
    device.discover_services().await?;

    let ssid_uuid = Uuid::parse_str(setu_proto::WIFI_SSID_UUID)?;
    let pass_uuid = Uuid::parse_str(setu_proto::WIFI_PASS_UUID)?;

    let characteristics = device.characteristics();

    let ssid_char = characteristics
        .iter()
        .find(|c| c.uuid == ssid_uuid)
        .ok_or("Wi-Fi SSID characteristic not found")?;

    let pass_char = characteristics
        .iter()
        .find(|c| c.uuid == pass_uuid)
        .ok_or("Wi-Fi passphrase characteristic not found")?;

    println!("Sending Wi-Fi credentials...");
    println!("  SSID: {}", ssid);

    device
        .write(ssid_char, ssid.as_bytes(), WriteType::WithResponse)
        .await?;
    device
        .write(pass_char, password.as_bytes(), WriteType::WithResponse)
        .await?;

    println!("Credentials sent! The device will now configure its Wi-Fi.");

    device.disconnect().await?;
    Ok(())
}
