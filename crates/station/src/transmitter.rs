//! Transmit pipelines: APRS over AFSK and text over PSK

use crate::config::StationConfig;
use crate::Result;
use packetmodem_codecs::message::MessagePacket;
use packetmodem_codecs::packet::{AprsPacket, PacketBase};
use packetmodem_codecs::telemetry::{TelemetryData, TelemetryKind, TelemetryPacket};
use packetmodem_modem::afsk::AfskModulator;
use packetmodem_modem::common::Modulator;
use packetmodem_modem::psk::PskModulator;
use tracing::info;

/// Encodes APRS packets into Bell 202 audio under the station's callsign
pub struct AprsTransmitter {
    base: PacketBase,
    modulator: AfskModulator,
}

impl AprsTransmitter {
    pub fn new(config: &StationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            base: config.packet_base(),
            modulator: AfskModulator::new(config.afsk.clone())?,
        })
    }

    pub fn base(&self) -> &PacketBase {
        &self.base
    }

    /// Stamp `packet` with the station addresses and symbol, then modulate
    /// its frame
    pub fn transmit(&mut self, mut packet: AprsPacket) -> Result<Vec<i16>> {
        *packet.base_mut() = self.base.clone();
        let mut bits = packet.encode_bit_stream()?;

        self.modulator.reset();
        let mut audio = Vec::new();
        self.modulator.modulate(&mut bits, &mut audio)?;
        info!(
            packet_type = ?packet.packet_type(),
            samples = audio.len(),
            "transmitting APRS packet"
        );
        Ok(audio)
    }

    pub fn transmit_message(&mut self, addressee: &str, message: &str, message_id: &str) -> Result<Vec<i16>> {
        self.transmit(AprsPacket::Message(MessagePacket {
            base: self.base.clone(),
            addressee: addressee.to_string(),
            message: message.to_string(),
            message_id: message_id.to_string(),
        }))
    }

    /// One telemetry message of `kind` built from `data`
    pub fn transmit_telemetry(&mut self, kind: TelemetryKind, data: &TelemetryData) -> Result<Vec<i16>> {
        self.transmit(AprsPacket::Telemetry(TelemetryPacket {
            base: self.base.clone(),
            kind,
            data: data.clone(),
        }))
    }
}

/// Encodes text as PSK31-style audio
pub struct PskTransmitter {
    modulator: PskModulator,
}

impl PskTransmitter {
    pub fn new(config: &StationConfig) -> Result<Self> {
        Ok(Self {
            modulator: PskModulator::new(config.psk.clone())?,
        })
    }

    pub fn transmit(&mut self, text: &str) -> Result<Vec<i16>> {
        let audio = self.modulator.encode_string(text)?;
        info!(characters = text.len(), samples = audio.len(), "transmitting PSK text");
        Ok(audio)
    }
}
