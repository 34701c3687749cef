//! APRS telemetry data model
//!
//! Five analog channels (A1-A5) carrying a raw byte and a quadratic scaling
//! equation, eight digital channels (B1-B8) carrying a bit and its sense.
//! Names and units share per-channel length ceilings that shrink with the
//! channel index.

use crate::message::ADDRESSEE_LENGTH;
use crate::packet::{PacketBase, PacketType};
use crate::transcoder::TelemetryTranscoder;
use crate::{CodecError, Result};
use packetmodem_frame::address::MAX_SSID;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MAX_SEQUENCE_NUMBER: u16 = 999;
pub const MAX_COMMENT_LENGTH: usize = 220;
pub const MAX_PROJECT_TITLE_LENGTH: usize = 23;
pub const MAX_COEFFICIENT_LENGTH: usize = 9;

/// Placeholder A1 name and unit; A1 may never be blank on the air
pub const A1_PLACEHOLDER: &str = "x";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalogChannel {
    A1,
    A2,
    A3,
    A4,
    A5,
}

impl AnalogChannel {
    pub const ALL: [AnalogChannel; 5] = [
        AnalogChannel::A1,
        AnalogChannel::A2,
        AnalogChannel::A3,
        AnalogChannel::A4,
        AnalogChannel::A5,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Longest name or unit accepted for this channel
    pub fn max_descriptor_length(self) -> usize {
        match self {
            AnalogChannel::A1 => 7,
            AnalogChannel::A2 => 6,
            AnalogChannel::A3 | AnalogChannel::A4 => 5,
            AnalogChannel::A5 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigitalChannel {
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B7,
    B8,
}

impl DigitalChannel {
    pub const ALL: [DigitalChannel; 8] = [
        DigitalChannel::B1,
        DigitalChannel::B2,
        DigitalChannel::B3,
        DigitalChannel::B4,
        DigitalChannel::B5,
        DigitalChannel::B6,
        DigitalChannel::B7,
        DigitalChannel::B8,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Longest name or label accepted for this channel
    pub fn max_descriptor_length(self) -> usize {
        match self {
            DigitalChannel::B1 => 5,
            DigitalChannel::B2 => 4,
            DigitalChannel::B3 | DigitalChannel::B4 | DigitalChannel::B5 => 3,
            DigitalChannel::B6 | DigitalChannel::B7 | DigitalChannel::B8 => 2,
        }
    }
}

/// Whether `coefficient` is a decimal of the form `-?\d*\.?\d*`, 1-9
/// characters long, with at least one digit
pub fn validate_coefficient(coefficient: &str) -> bool {
    if coefficient.is_empty() || coefficient.len() > MAX_COEFFICIENT_LENGTH {
        return false;
    }
    let unsigned = coefficient.strip_prefix('-').unwrap_or(coefficient);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits_only = |s: &str| s.bytes().all(|c| c.is_ascii_digit());

    digits_only(whole)
        && digits_only(fraction)
        && !(whole.is_empty() && fraction.is_empty())
        && coefficient.parse::<f64>().is_ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogParameter {
    channel: AnalogChannel,
    value: u8,
    name: String,
    unit: String,
    coefficient_a: String,
    coefficient_b: String,
    coefficient_c: String,
}

impl AnalogParameter {
    pub fn new(channel: AnalogChannel) -> Self {
        let placeholder = if channel == AnalogChannel::A1 { A1_PLACEHOLDER } else { "" };
        Self {
            channel,
            value: 0,
            name: placeholder.to_string(),
            unit: placeholder.to_string(),
            coefficient_a: "0".to_string(),
            coefficient_b: "1".to_string(),
            coefficient_c: "0".to_string(),
        }
    }

    pub fn channel(&self) -> AnalogChannel {
        self.channel
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn set_value(&mut self, value: u8) {
        self.value = value;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns false, leaving the name unchanged, when it is too long
    pub fn set_name(&mut self, name: &str) -> bool {
        if name.len() > self.channel.max_descriptor_length() {
            return false;
        }
        self.name = name.to_string();
        true
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn set_unit(&mut self, unit: &str) -> bool {
        if unit.len() > self.channel.max_descriptor_length() {
            return false;
        }
        self.unit = unit.to_string();
        true
    }

    pub fn coefficients(&self) -> (&str, &str, &str) {
        (&self.coefficient_a, &self.coefficient_b, &self.coefficient_c)
    }

    /// Set `a`, `b` and `c` of `a*x^2 + b*x + c`; all three must be valid
    /// or nothing changes
    pub fn set_coefficients(&mut self, a: &str, b: &str, c: &str) -> bool {
        if ![a, b, c].iter().all(|coefficient| validate_coefficient(coefficient)) {
            return false;
        }
        self.coefficient_a = a.to_string();
        self.coefficient_b = b.to_string();
        self.coefficient_c = c.to_string();
        true
    }

    /// Scaled value `a*x^2 + b*x + c`
    pub fn calculated_value(&self) -> f64 {
        let parse = |s: &str| s.parse::<f64>().unwrap_or(0.0);
        let x = self.value as f64;
        parse(&self.coefficient_a) * x * x + parse(&self.coefficient_b) * x + parse(&self.coefficient_c)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitalParameter {
    channel: DigitalChannel,
    value: bool,
    name: String,
    label: String,
    bit_sense: bool,
}

impl DigitalParameter {
    pub fn new(channel: DigitalChannel) -> Self {
        Self {
            channel,
            value: false,
            name: String::new(),
            label: String::new(),
            bit_sense: true,
        }
    }

    pub fn channel(&self) -> DigitalChannel {
        self.channel
    }

    pub fn value(&self) -> bool {
        self.value
    }

    pub fn set_value(&mut self, value: bool) {
        self.value = value;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> bool {
        if name.len() > self.channel.max_descriptor_length() {
            return false;
        }
        self.name = name.to_string();
        true
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: &str) -> bool {
        if label.len() > self.channel.max_descriptor_length() {
            return false;
        }
        self.label = label.to_string();
        true
    }

    /// Value of the bit that means the label is true
    pub fn bit_sense(&self) -> bool {
        self.bit_sense
    }

    pub fn set_bit_sense(&mut self, bit_sense: bool) {
        self.bit_sense = bit_sense;
    }
}

/// Everything carried by the five telemetry messages of one station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryData {
    station_address: String,
    sequence_number: u16,
    comment: String,
    project_title: String,
    analog: [AnalogParameter; 5],
    digital: [DigitalParameter; 8],
}

impl Default for TelemetryData {
    fn default() -> Self {
        Self {
            station_address: String::new(),
            sequence_number: 0,
            comment: String::new(),
            project_title: String::new(),
            analog: AnalogChannel::ALL.map(AnalogParameter::new),
            digital: DigitalChannel::ALL.map(DigitalParameter::new),
        }
    }
}

fn truncate_ascii(text: &str, limit: usize) -> (String, bool) {
    if text.chars().count() <= limit {
        return (text.to_string(), true);
    }
    (text.chars().take(limit).collect(), false)
}

impl TelemetryData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the transmitting station, as used in the parameter
    /// messages' addressee field (`N0CALL-1`)
    pub fn station_address(&self) -> &str {
        &self.station_address
    }

    pub fn set_station_address(&mut self, address: &str) -> Result<()> {
        if address.len() > ADDRESSEE_LENGTH || !address.is_ascii() {
            return Err(CodecError::InvalidTelemetry {
                msg: format!("station address {:?} longer than {} characters", address, ADDRESSEE_LENGTH),
            });
        }
        self.station_address = address.to_string();
        Ok(())
    }

    pub fn set_station_callsign(&mut self, callsign: &str, ssid: u8) -> Result<()> {
        if callsign.len() > 6 || ssid > MAX_SSID {
            return Err(CodecError::InvalidTelemetry {
                msg: format!("invalid station {}-{}", callsign, ssid),
            });
        }
        self.set_station_address(&format!("{}-{}", callsign, ssid))
    }

    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    /// Numbers above 999 reset the sequence to 0 and return false
    pub fn set_sequence_number(&mut self, sequence_number: u16) -> bool {
        if sequence_number > MAX_SEQUENCE_NUMBER {
            warn!(sequence_number, "telemetry sequence number out of range, reset to 0");
            self.sequence_number = 0;
            return false;
        }
        self.sequence_number = sequence_number;
        true
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Comments beyond 220 characters are truncated and return false
    pub fn set_comment(&mut self, comment: &str) -> bool {
        let (comment, whole) = truncate_ascii(comment, MAX_COMMENT_LENGTH);
        if !whole {
            warn!("telemetry comment truncated to {} characters", MAX_COMMENT_LENGTH);
        }
        self.comment = comment;
        whole
    }

    pub fn project_title(&self) -> &str {
        &self.project_title
    }

    /// Titles beyond 23 characters are truncated and return false
    pub fn set_project_title(&mut self, title: &str) -> bool {
        let (title, whole) = truncate_ascii(title, MAX_PROJECT_TITLE_LENGTH);
        if !whole {
            warn!("telemetry project title truncated to {} characters", MAX_PROJECT_TITLE_LENGTH);
        }
        self.project_title = title;
        whole
    }

    pub fn analog(&self, channel: AnalogChannel) -> &AnalogParameter {
        &self.analog[channel.index()]
    }

    pub fn analog_mut(&mut self, channel: AnalogChannel) -> &mut AnalogParameter {
        &mut self.analog[channel.index()]
    }

    pub fn digital(&self, channel: DigitalChannel) -> &DigitalParameter {
        &self.digital[channel.index()]
    }

    pub fn digital_mut(&mut self, channel: DigitalChannel) -> &mut DigitalParameter {
        &mut self.digital[channel.index()]
    }

    pub fn analog_parameters(&self) -> &[AnalogParameter; 5] {
        &self.analog
    }

    pub fn analog_parameters_mut(&mut self) -> &mut [AnalogParameter; 5] {
        &mut self.analog
    }

    pub fn digital_parameters(&self) -> &[DigitalParameter; 8] {
        &self.digital
    }

    pub fn digital_parameters_mut(&mut self) -> &mut [DigitalParameter; 8] {
        &mut self.digital
    }
}

/// The five telemetry message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TelemetryKind {
    /// `T#sss,aaa,...,bbbbbbbb`
    #[default]
    DataReport,
    /// `PARM.`
    ParameterName,
    /// `UNIT.`
    ParameterUnit,
    /// `EQNS.`
    Coefficient,
    /// `BITS.`
    BitSense,
}

impl TelemetryKind {
    pub fn packet_type(self) -> PacketType {
        match self {
            TelemetryKind::DataReport => PacketType::TelemetryDataReport,
            TelemetryKind::ParameterName => PacketType::TelemetryParameterName,
            TelemetryKind::ParameterUnit => PacketType::TelemetryParameterUnit,
            TelemetryKind::Coefficient => PacketType::TelemetryCoefficient,
            TelemetryKind::BitSense => PacketType::TelemetryBitSense,
        }
    }
}

/// One telemetry message of a given kind
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryPacket {
    pub base: PacketBase,
    pub kind: TelemetryKind,
    pub data: TelemetryData,
}

impl TelemetryPacket {
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.base.validate()?;
        TelemetryTranscoder::encode(self.kind, &self.data)
    }

    pub fn decode(base: PacketBase, kind: TelemetryKind, info: &[u8]) -> Option<Self> {
        let mut data = TelemetryData::default();
        if !TelemetryTranscoder::decode_message(&mut data, info) {
            return None;
        }
        Some(Self { base, kind, data })
    }
}
