//! Telemetry message grammar
//!
//! ```text
//! T#sss,aaa,aaa,aaa,aaa,aaa,bbbbbbbb<comment>
//! :STATION  :PARM.A1,A2,A3,A4,A5,B1,B2,B3,B4,B5,B6,B7,B8
//! :STATION  :UNIT.A1,A2,A3,A4,A5,B1,B2,B3,B4,B5,B6,B7,B8
//! :STATION  :EQNS.a,b,c,a,b,c,a,b,c,a,b,c,a,b,c
//! :STATION  :BITS.bbbbbbbb,<project title>
//! ```

use crate::message::{addressee_header, split_addressee};
use crate::telemetry::{TelemetryData, TelemetryKind};
use crate::{CodecError, Result};
use tracing::debug;

const DATA_REPORT_HEADER: &str = "T#";
const PARAMETER_NAME_HEADER: &str = "PARM.";
const PARAMETER_UNIT_HEADER: &str = "UNIT.";
const COEFFICIENT_HEADER: &str = "EQNS.";
const BIT_SENSE_HEADER: &str = "BITS.";

/// Sequence spelled `MIC` instead of three digits
const MIC_SEQUENCE: &str = "MIC";

/// `T#MIC` followed by five values and eight bits, no comma after `MIC`
const MIN_DATA_REPORT_LENGTH: usize = 33;
/// `PARM.x`
const MIN_DESCRIPTOR_LENGTH: usize = 6;
/// Fifteen single-digit coefficients
const MIN_COEFFICIENT_LENGTH: usize = 34;
/// `BITS.` and eight bits
const MIN_BIT_SENSE_LENGTH: usize = 13;

const COEFFICIENT_COUNT: usize = 15;

/// Encoder and decoder for the five telemetry message kinds
pub struct TelemetryTranscoder;

impl TelemetryTranscoder {
    pub fn encode(kind: TelemetryKind, data: &TelemetryData) -> Result<Vec<u8>> {
        match kind {
            TelemetryKind::DataReport => Self::encode_data_report(data),
            TelemetryKind::ParameterName => Self::encode_parameter_names(data),
            TelemetryKind::ParameterUnit => Self::encode_units_and_labels(data),
            TelemetryKind::Coefficient => Self::encode_coefficients(data),
            TelemetryKind::BitSense => Self::encode_bit_sense(data),
        }
    }

    pub fn encode_data_report(data: &TelemetryData) -> Result<Vec<u8>> {
        let mut output = format!("{}{:03},", DATA_REPORT_HEADER, data.sequence_number());
        for analog in data.analog_parameters() {
            output.push_str(&format!("{:03},", analog.value()));
        }
        output.extend(data.digital_parameters().iter().map(|d| bit_char(d.value())));
        output.push_str(data.comment());
        Ok(output.into_bytes())
    }

    pub fn encode_parameter_names(data: &TelemetryData) -> Result<Vec<u8>> {
        let first = data.analog_parameters()[0].name();
        if first.is_empty() {
            return Err(CodecError::InvalidTelemetry {
                msg: "A1 parameter name is empty".to_string(),
            });
        }
        let names = data
            .analog_parameters()
            .iter()
            .map(|a| a.name())
            .chain(data.digital_parameters().iter().map(|d| d.name()));
        addressed(data, PARAMETER_NAME_HEADER, &join_descriptors(names))
    }

    pub fn encode_units_and_labels(data: &TelemetryData) -> Result<Vec<u8>> {
        let first = data.analog_parameters()[0].unit();
        if first.is_empty() {
            return Err(CodecError::InvalidTelemetry {
                msg: "A1 unit is empty".to_string(),
            });
        }
        let units = data
            .analog_parameters()
            .iter()
            .map(|a| a.unit())
            .chain(data.digital_parameters().iter().map(|d| d.label()));
        addressed(data, PARAMETER_UNIT_HEADER, &join_descriptors(units))
    }

    pub fn encode_coefficients(data: &TelemetryData) -> Result<Vec<u8>> {
        let coefficients: Vec<&str> = data
            .analog_parameters()
            .iter()
            .flat_map(|a| {
                let (a, b, c) = a.coefficients();
                [a, b, c]
            })
            .collect();
        addressed(data, COEFFICIENT_HEADER, &coefficients.join(","))
    }

    pub fn encode_bit_sense(data: &TelemetryData) -> Result<Vec<u8>> {
        let mut body: String = data.digital_parameters().iter().map(|d| bit_char(d.bit_sense())).collect();
        if !data.project_title().is_empty() {
            body.push(',');
            body.push_str(data.project_title());
        }
        addressed(data, BIT_SENSE_HEADER, &body)
    }

    /// Decode any telemetry message into `data`
    ///
    /// Parameter messages are accepted with or without their `:STATION  :`
    /// prefix. On failure `data` is left untouched and false is returned.
    pub fn decode_message(data: &mut TelemetryData, message: &[u8]) -> bool {
        let mut decoded = data.clone();

        let body = match message.first() {
            Some(b':') => match split_addressee(message) {
                Some((station, body)) => {
                    if decoded.set_station_address(&station).is_err() {
                        return false;
                    }
                    body
                }
                None => return false,
            },
            _ => message,
        };
        let Ok(body) = std::str::from_utf8(body) else {
            return false;
        };

        let accepted = match body.as_bytes().first() {
            Some(b'T') => decode_data_report(&mut decoded, body),
            Some(b'P') => decode_descriptors(&mut decoded, body, PARAMETER_NAME_HEADER),
            Some(b'U') => decode_descriptors(&mut decoded, body, PARAMETER_UNIT_HEADER),
            Some(b'E') => decode_coefficients(&mut decoded, body),
            Some(b'B') => decode_bit_sense(&mut decoded, body),
            _ => false,
        };

        if accepted {
            *data = decoded;
        } else {
            debug!(message = %String::from_utf8_lossy(message), "telemetry message rejected");
        }
        accepted
    }
}

fn bit_char(bit: bool) -> char {
    if bit {
        '1'
    } else {
        '0'
    }
}

/// Join with commas, dropping the empty tail
fn join_descriptors<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    let fields: Vec<&str> = fields.collect();
    let used = fields.iter().rposition(|f| !f.is_empty()).map_or(0, |i| i + 1);
    fields[..used].join(",")
}

fn addressed(data: &TelemetryData, header: &str, body: &str) -> Result<Vec<u8>> {
    if data.station_address().is_empty() {
        return Err(CodecError::InvalidTelemetry {
            msg: format!("{} message needs a station address", header.trim_end_matches('.')),
        });
    }
    let mut output = addressee_header(data.station_address());
    output.extend_from_slice(header.as_bytes());
    output.extend_from_slice(body.as_bytes());
    Ok(output)
}

fn take_three_digits(text: &str) -> Option<(u16, &str)> {
    let digits = text.get(..3)?;
    if !digits.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, &text[3..]))
}

fn decode_data_report(data: &mut TelemetryData, body: &str) -> bool {
    if body.len() < MIN_DATA_REPORT_LENGTH {
        return false;
    }
    let Some(rest) = body.strip_prefix(DATA_REPORT_HEADER) else {
        return false;
    };

    let mut rest = if let Some(rest) = rest.strip_prefix(MIC_SEQUENCE) {
        data.set_sequence_number(0);
        rest.strip_prefix(',').unwrap_or(rest)
    } else {
        let Some((sequence, rest)) = take_three_digits(rest) else {
            return false;
        };
        let Some(rest) = rest.strip_prefix(',') else {
            return false;
        };
        data.set_sequence_number(sequence);
        rest
    };

    for analog in data.analog_parameters_mut() {
        let Some((value, tail)) = take_three_digits(rest) else {
            return false;
        };
        let (Ok(value), Some(tail)) = (u8::try_from(value), tail.strip_prefix(',')) else {
            return false;
        };
        analog.set_value(value);
        rest = tail;
    }

    let bits = rest.as_bytes();
    if bits.len() < 8 {
        return false;
    }
    for (digital, bit) in data.digital_parameters_mut().iter_mut().zip(bits) {
        match bit {
            b'1' => digital.set_value(true),
            b'0' => digital.set_value(false),
            _ => return false,
        }
    }

    // long comments are cut, not refused
    data.set_comment(&rest[8..]);
    true
}

fn decode_descriptors(data: &mut TelemetryData, body: &str, header: &str) -> bool {
    if body.len() < MIN_DESCRIPTOR_LENGTH {
        return false;
    }
    let Some(fields) = body.strip_prefix(header) else {
        return false;
    };
    if fields.starts_with(',') {
        return false;
    }

    let names = header == PARAMETER_NAME_HEADER;
    let mut fields = fields.split(',');
    for analog in data.analog_parameters_mut() {
        let field = fields.next().unwrap_or("");
        let stored = if names { analog.set_name(field) } else { analog.set_unit(field) };
        if !stored {
            return false;
        }
    }
    for digital in data.digital_parameters_mut() {
        let field = fields.next().unwrap_or("");
        let stored = if names { digital.set_name(field) } else { digital.set_label(field) };
        if !stored {
            return false;
        }
    }
    true
}

fn decode_coefficients(data: &mut TelemetryData, body: &str) -> bool {
    if body.len() < MIN_COEFFICIENT_LENGTH {
        return false;
    }
    let Some(fields) = body.strip_prefix(COEFFICIENT_HEADER) else {
        return false;
    };
    let coefficients: Vec<&str> = fields.split(',').collect();
    if coefficients.len() != COEFFICIENT_COUNT {
        return false;
    }
    data.analog_parameters_mut()
        .iter_mut()
        .zip(coefficients.chunks_exact(3))
        .all(|(analog, abc)| analog.set_coefficients(abc[0], abc[1], abc[2]))
}

fn decode_bit_sense(data: &mut TelemetryData, body: &str) -> bool {
    if body.len() < MIN_BIT_SENSE_LENGTH {
        return false;
    }
    let Some(rest) = body.strip_prefix(BIT_SENSE_HEADER) else {
        return false;
    };
    for (digital, bit) in data.digital_parameters_mut().iter_mut().zip(rest.as_bytes()) {
        match bit {
            b'1' => digital.set_bit_sense(true),
            b'0' => digital.set_bit_sense(false),
            _ => return false,
        }
    }

    let title = &rest[8..];
    if !title.is_empty() {
        data.set_project_title(title.strip_prefix(',').unwrap_or(title));
    }
    true
}
