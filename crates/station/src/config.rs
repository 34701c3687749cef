//! Station configuration

use crate::receiver::ReceiverSettings;
use crate::{logging, StationError};
use anyhow::{Context, Result};
use packetmodem_codecs::packet::{PacketBase, SymbolTable, DEFAULT_DESTINATION};
use packetmodem_frame::address::Address;
use packetmodem_modem::afsk::AfskSettings;
use packetmodem_modem::psk::PskSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything a station needs to transmit and receive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub callsign: String,
    pub ssid: u8,
    pub destination: String,
    pub destination_ssid: u8,
    pub symbol_table: SymbolTable,
    pub symbol: char,
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub log_level: String,
    pub afsk: AfskSettings,
    pub psk: PskSettings,
    pub receiver: ReceiverSettings,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            callsign: "N0CALL".to_string(),
            ssid: 0,
            destination: DEFAULT_DESTINATION.to_string(),
            destination_ssid: 0,
            symbol_table: SymbolTable::Primary,
            symbol: '/',
            log_level: "info".to_string(),
            afsk: AfskSettings::aprs(),
            psk: PskSettings::default(),
            receiver: ReceiverSettings::default(),
        }
    }
}

impl StationConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&content).with_context(|| format!("Invalid config file: {:?}", path))
    }

    /// Parse and validate a TOML document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    pub fn validate(&self) -> crate::Result<()> {
        Address::new(&self.callsign, self.ssid)?;
        Address::new(&self.destination, self.destination_ssid)?;
        self.packet_base().validate()?;
        self.afsk.validate()?;
        self.psk.validate()?;
        self.receiver.validate()?;
        logging::parse_level(&self.log_level)?;
        if self.afsk.ascii_framing {
            return Err(StationError::Config {
                msg: "AFSK ASCII framing cannot carry AX.25 frames".to_string(),
            });
        }
        Ok(())
    }

    /// Source, destination and symbol stamped on outgoing packets
    pub fn packet_base(&self) -> PacketBase {
        PacketBase {
            source: self.callsign.to_uppercase(),
            source_ssid: self.ssid,
            destination: self.destination.to_uppercase(),
            destination_ssid: self.destination_ssid,
            symbol_table: self.symbol_table,
            symbol: self.symbol,
        }
    }
}
