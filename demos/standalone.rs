use async_trait::async_trait;
use btleconn::api::{
    Advertisement, ConnectionParameters, DeviceType, Indicator, IndicatorError, IndicatorState,
    ManagerEvent, PeerAddress, Radio, RadioError, ScanParameters, Storage, Whitelist,
};
use btleconn::central::ConnectionManager;
use btleconn::config::ManagerConfig;
use futures::stream::StreamExt;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Accepts every request and prints it.
struct SimulatedRadio;

#[async_trait]
impl Radio for SimulatedRadio {
    async fn scan_start(&self, params: &ScanParameters) -> Result<(), RadioError> {
        println!(
            "radio: scan start (interval 0x{:04x}, window 0x{:04x}, whitelist: {})",
            params.interval,
            params.window,
            params.is_filtered()
        );
        Ok(())
    }

    async fn scan_stop(&self) -> Result<(), RadioError> {
        println!("radio: scan stop");
        Ok(())
    }

    async fn connect(
        &self,
        address: &PeerAddress,
        _scan: &ScanParameters,
        conn: &ConnectionParameters,
    ) -> Result<(), RadioError> {
        println!("radio: connect to {} ({})", address, conn);
        Ok(())
    }
}

struct EmptyStorage;

impl Storage for EmptyStorage {
    fn pending_write_count(&self) -> u32 {
        0
    }

    fn whitelist(&self) -> Whitelist {
        Whitelist::default()
    }
}

struct ConsoleLed;

impl Indicator for ConsoleLed {
    fn set_indicator(&self, state: IndicatorState) -> Result<(), IndicatorError> {
        println!("led: {:?}", state);
        Ok(())
    }
}

const PERIPHERALS: [(DeviceType, [u8; 6]); 4] = [
    (DeviceType::SpeedAndCadence, [0xC1, 0x5A, 0x00, 0x00, 0x00, 0x01]),
    (DeviceType::HeartRate, [0xC2, 0x4B, 0x00, 0x00, 0x00, 0x02]),
    (DeviceType::Power, [0xC3, 0x3C, 0x00, 0x00, 0x00, 0x03]),
    (DeviceType::GearShifter, [0xC4, 0x2D, 0x00, 0x00, 0x00, 0x04]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    // Shorter than the default timings so the demo finishes quickly.
    let config = ManagerConfig {
        scan_period_ms: 2_000,
        connect_delay_ms: 500,
        ..ManagerConfig::standalone()
    };
    config.validate()?;

    let manager = ConnectionManager::new(
        Arc::new(SimulatedRadio),
        Arc::new(EmptyStorage),
        Some(Arc::new(ConsoleLed)),
        config,
    );

    // Plays the part of the radio's report path: while a scan runs, the
    // simulated peripherals advertise a few times each.
    let mut events = manager.events();
    let advertiser = manager.clone();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                ManagerEvent::ScanStarted { .. } => {
                    for _ in 0..3 {
                        for (device_type, bytes) in PERIPHERALS {
                            let report = Advertisement {
                                address: PeerAddress::random_static(bytes),
                                rssi: rand::random_range(-90..=-40),
                                payload: vec![0x02, 0x01, 0x06],
                            };
                            advertiser.on_advertisement(device_type, &report).await;
                        }
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                }
                ManagerEvent::DeviceDiscovered { index, record } => {
                    println!(
                        "discovered #{}: {:?} {} ({} dBm)",
                        index, record.device_type, record.address, record.signal_strength
                    );
                }
                ManagerEvent::ConnectRequested { index, address } => {
                    println!("requested connection #{} to {}", index, address);
                }
                _ => {}
            }
        }
    });

    manager.initialize().await?;
    println!("stats: {:?}", manager.stats());
    manager.shutdown().await;
    Ok(())
}
