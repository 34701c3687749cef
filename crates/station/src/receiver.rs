//! Receive pipelines
//!
//! Audio arrives either as one complete buffer (`process_samples`) or as a
//! stream of capture chunks (`push_chunk`). In streaming mode a
//! [`SignalGate`] collects chunks while the SNR is above threshold and
//! hands the collected transmission to the demodulator once it drops.

use crate::{Result, StationError};
use packetmodem_codecs::packet::{AprsPacket, PacketType};
use packetmodem_frame::frame::Frame;
use packetmodem_modem::afsk::{
    AfskDemodulator, AsciiResult, AFSK_RECEIVED_MIN_SAMPLES, AFSK_SNR_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info, warn};

/// Packets held per queue before the receiver reports a full buffer
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverSettings {
    /// Chunks above this SNR (dB) are treated as signal
    pub snr_threshold: f64,
    /// Buffered samples needed before a gated buffer is decoded
    pub min_buffered_samples: usize,
    pub queue_capacity: usize,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            snr_threshold: AFSK_SNR_THRESHOLD,
            min_buffered_samples: AFSK_RECEIVED_MIN_SAMPLES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ReceiverSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.snr_threshold.is_finite() {
            return Err(StationError::Config {
                msg: format!("SNR threshold must be finite, got {}", self.snr_threshold),
            });
        }
        if self.queue_capacity == 0 {
            return Err(StationError::Config {
                msg: "receive queue capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// SNR gate in front of a whole-buffer demodulator
#[derive(Debug, Clone)]
pub struct SignalGate {
    snr_threshold: f64,
    min_samples: usize,
    buffer: Vec<i16>,
}

impl SignalGate {
    pub fn new(settings: &ReceiverSettings) -> Self {
        Self {
            snr_threshold: settings.snr_threshold,
            min_samples: settings.min_buffered_samples,
            buffer: Vec::new(),
        }
    }

    /// Feed one chunk with its estimated SNR
    ///
    /// Returns the collected transmission when the signal has just ended.
    /// A quiet chunk with too little buffered audio discards the buffer.
    pub fn push(&mut self, chunk: &[i16], snr: f64) -> Option<Vec<i16>> {
        if snr > self.snr_threshold {
            self.buffer.extend_from_slice(chunk);
            None
        } else if self.buffer.len() > self.min_samples {
            self.buffer.extend_from_slice(chunk);
            Some(std::mem::take(&mut self.buffer))
        } else {
            self.buffer.clear();
            None
        }
    }

    /// Hand over whatever is buffered if it is long enough to decode
    pub fn flush(&mut self) -> Option<Vec<i16>> {
        let buffer = std::mem::take(&mut self.buffer);
        (buffer.len() > self.min_samples).then_some(buffer)
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Receive queue, one per packet family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueKind {
    Message,
    Position,
    Experimental,
    Telemetry,
    /// Valid AX.25 frames that are not a supported APRS packet
    Other,
}

impl QueueKind {
    pub const ALL: [QueueKind; 5] = [
        QueueKind::Message,
        QueueKind::Position,
        QueueKind::Experimental,
        QueueKind::Telemetry,
        QueueKind::Other,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn of(packet: Option<&AprsPacket>) -> Self {
        match packet.map(AprsPacket::packet_type) {
            Some(PacketType::Message) => QueueKind::Message,
            Some(PacketType::Position) => QueueKind::Position,
            Some(PacketType::Experimental) => QueueKind::Experimental,
            Some(PacketType::Unknown) | None => QueueKind::Other,
            Some(_) => QueueKind::Telemetry,
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueueKind::Message => "message",
            QueueKind::Position => "position",
            QueueKind::Experimental => "experimental",
            QueueKind::Telemetry => "telemetry",
            QueueKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// A frame pulled off the air, with its APRS decoding when it had one
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedPacket {
    pub frame: Frame,
    pub packet: Option<AprsPacket>,
    /// SNR of the buffer the frame was found in
    pub snr: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiverStats {
    pub buffers_processed: u64,
    pub frames_decoded: u64,
    pub frames_rejected: u64,
    pub packets_by_kind: [u64; 5],
    pub last_snr: f64,
}

impl ReceiverStats {
    pub fn packets(&self, kind: QueueKind) -> u64 {
        self.packets_by_kind[kind.index()]
    }
}

/// APRS receiver: AFSK demodulation, AX.25 parsing and per-kind queues
pub struct AprsReceiver {
    demodulator: AfskDemodulator,
    gate: SignalGate,
    capacity: usize,
    queues: [VecDeque<ReceivedPacket>; 5],
    stats: ReceiverStats,
}

impl AprsReceiver {
    pub fn new(settings: &ReceiverSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            demodulator: AfskDemodulator::new()?,
            gate: SignalGate::new(settings),
            capacity: settings.queue_capacity,
            queues: Default::default(),
            stats: ReceiverStats::default(),
        })
    }

    /// Demodulate a complete buffer and queue the frame found in it
    ///
    /// Returns the queue the frame went to, `None` when no frame was found.
    /// The frame is always queued; `BufferFull` reports that its queue has
    /// grown past capacity and should be drained.
    pub fn process_samples(&mut self, samples: &[i16]) -> Result<Option<QueueKind>> {
        self.demodulator.set_audio_buffer(samples);
        let results = self.demodulator.process_audio_buffer();
        self.stats.buffers_processed += 1;
        self.stats.last_snr = results.snr;

        let mut bits = self.demodulator.take_bit_stream();
        let frame = match Frame::parse_bit_stream(&mut bits) {
            Ok(frame) => frame,
            Err(rejection) => {
                self.stats.frames_rejected += 1;
                debug!(snr = results.snr, %rejection, "no AX.25 frame in buffer");
                return Ok(None);
            }
        };
        self.stats.frames_decoded += 1;

        let packet = AprsPacket::from_frame(&frame);
        let kind = QueueKind::of(packet.as_ref());
        info!(snr = results.snr, %kind, "received {}", frame);

        let queue = &mut self.queues[kind.index()];
        queue.push_back(ReceivedPacket {
            frame,
            packet,
            snr: results.snr,
        });
        self.stats.packets_by_kind[kind.index()] += 1;

        if queue.len() > self.capacity {
            warn!(%kind, capacity = self.capacity, pending = queue.len(), "receive queue full");
            return Err(StationError::BufferFull { kind });
        }
        Ok(Some(kind))
    }

    /// Feed one capture chunk through the signal gate
    pub fn push_chunk(&mut self, chunk: &[i16]) -> Result<Option<QueueKind>> {
        let snr = self.demodulator.estimate_signal(chunk).snr;
        match self.gate.push(chunk, snr) {
            Some(buffer) => self.process_samples(&buffer),
            None => Ok(None),
        }
    }

    /// Decode audio still held by the gate
    pub fn flush(&mut self) -> Result<Option<QueueKind>> {
        match self.gate.flush() {
            Some(buffer) => self.process_samples(&buffer),
            None => Ok(None),
        }
    }

    pub fn pop(&mut self, kind: QueueKind) -> Option<ReceivedPacket> {
        self.queues[kind.index()].pop_front()
    }

    pub fn pending(&self, kind: QueueKind) -> usize {
        self.queues[kind.index()].len()
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    pub fn gate(&self) -> &SignalGate {
        &self.gate
    }
}

/// Receiver for SYN/STX/EOT framed ASCII over AFSK
pub struct AfskReceiver {
    demodulator: AfskDemodulator,
    gate: SignalGate,
    capacity: usize,
    messages: VecDeque<String>,
    stats: ReceiverStats,
}

impl AfskReceiver {
    pub fn new(settings: &ReceiverSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            demodulator: AfskDemodulator::new()?,
            gate: SignalGate::new(settings),
            capacity: settings.queue_capacity,
            messages: VecDeque::new(),
            stats: ReceiverStats::default(),
        })
    }

    pub fn process_samples(&mut self, samples: &[i16]) -> Result<AsciiResult> {
        self.demodulator.set_audio_buffer(samples);
        let results = self.demodulator.process_audio_buffer();
        self.stats.buffers_processed += 1;
        self.stats.last_snr = results.snr;

        let outcome = self.demodulator.look_for_string();
        match &outcome {
            AsciiResult::Success(text) => {
                self.stats.frames_decoded += 1;
                self.stats.packets_by_kind[QueueKind::Message.index()] += 1;
                self.messages.push_back(text.clone());

                if self.messages.len() > self.capacity {
                    warn!(capacity = self.capacity, pending = self.messages.len(), "text queue full");
                    return Err(StationError::BufferFull {
                        kind: QueueKind::Message,
                    });
                }
            }
            other => {
                self.stats.frames_rejected += 1;
                debug!(snr = results.snr, outcome = ?other, "no ASCII message in buffer");
            }
        }
        Ok(outcome)
    }

    pub fn push_chunk(&mut self, chunk: &[i16]) -> Result<Option<AsciiResult>> {
        let snr = self.demodulator.estimate_signal(chunk).snr;
        match self.gate.push(chunk, snr) {
            Some(buffer) => self.process_samples(&buffer).map(Some),
            None => Ok(None),
        }
    }

    pub fn pop_message(&mut self) -> Option<String> {
        self.messages.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.messages.len()
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;
    use crate::transmitter::AprsTransmitter;
    use packetmodem_codecs::message::MessagePacket;
    use packetmodem_codecs::packet::PacketBase;
    use packetmodem_codecs::position::PositionPacket;
    use packetmodem_modem::afsk::{AfskModulator, AfskSettings};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const CHUNK: usize = 4800;

    fn white_noise(samples: usize, seed: u64) -> Vec<i16> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..samples).map(|_| rng.gen_range(-8000..=8000)).collect()
    }

    fn transmitter() -> AprsTransmitter {
        AprsTransmitter::new(&StationConfig::default()).unwrap()
    }

    fn message(text: &str) -> AprsPacket {
        AprsPacket::Message(MessagePacket {
            base: PacketBase::default(),
            addressee: "KD9XYZ".into(),
            message: text.into(),
            message_id: "1".into(),
        })
    }

    fn stream(receiver: &mut AprsReceiver, audio: &[i16]) -> Vec<QueueKind> {
        let mut kinds = Vec::new();
        let silence = vec![0i16; CHUNK];
        for chunk in audio.chunks(CHUNK).chain([&silence[..], &silence[..]]) {
            if let Some(kind) = receiver.push_chunk(chunk).unwrap() {
                kinds.push(kind);
            }
        }
        kinds
    }

    #[test]
    fn test_gate() {
        let settings = ReceiverSettings {
            min_buffered_samples: 100,
            ..ReceiverSettings::default()
        };
        let mut gate = SignalGate::new(&settings);

        assert_eq!(gate.push(&[1; 60], 10.0), None);
        assert_eq!(gate.buffered(), 60);
        // too short, discarded
        assert_eq!(gate.push(&[0; 60], -20.0), None);
        assert_eq!(gate.buffered(), 0);

        gate.push(&[1; 80], 10.0);
        gate.push(&[1; 80], 10.0);
        let buffer = gate.push(&[0; 20], 0.0).unwrap();
        assert_eq!(buffer.len(), 180);
        assert_eq!(gate.buffered(), 0);

        gate.push(&[1; 150], 10.0);
        assert_eq!(gate.flush().map(|b| b.len()), Some(150));
        assert_eq!(gate.flush(), None);
    }

    #[test]
    fn test_message_over_the_air() {
        let audio = transmitter().transmit(message("hello")).unwrap();

        let mut receiver = AprsReceiver::new(&ReceiverSettings::default()).unwrap();
        assert_eq!(receiver.process_samples(&audio).unwrap(), Some(QueueKind::Message));

        let received = receiver.pop(QueueKind::Message).unwrap();
        assert!(received.snr > AFSK_SNR_THRESHOLD);
        assert_eq!(received.frame.source().callsign(), "N0CALL");
        match received.packet {
            Some(AprsPacket::Message(packet)) => {
                assert_eq!(packet.addressee, "KD9XYZ");
                assert_eq!(packet.message, "hello");
                assert_eq!(packet.message_id, "1");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(receiver.stats().frames_decoded, 1);
    }

    #[test]
    fn test_streamed_position() {
        let position = AprsPacket::Position(PositionPacket {
            time_code: "120000".into(),
            latitude: 40.0,
            longitude: -105.0,
            altitude: 5280,
            speed: 12.0,
            course: 180,
            comment: "test".into(),
            ..PositionPacket::default()
        });
        let audio = transmitter().transmit(position).unwrap();

        let mut receiver = AprsReceiver::new(&ReceiverSettings::default()).unwrap();
        let mut leading = vec![0i16; CHUNK];
        leading.extend_from_slice(&audio);
        assert_eq!(stream(&mut receiver, &leading), vec![QueueKind::Position]);

        let received = receiver.pop(QueueKind::Position).unwrap();
        match received.packet {
            Some(AprsPacket::Position(packet)) => {
                assert!((packet.latitude - 40.0).abs() < 1e-4);
                assert_eq!(packet.altitude, 5280);
                assert_eq!(packet.comment, "test");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_information_goes_to_other() {
        let base = PacketBase::new("N0CALL", 0);
        let mut bits = base.encode_bit_stream(b"!raw status").unwrap();
        let mut modulator = AfskModulator::new(AfskSettings::aprs()).unwrap();
        modulator.add_bit_stream(&mut bits);

        let mut receiver = AprsReceiver::new(&ReceiverSettings::default()).unwrap();
        assert_eq!(receiver.process_samples(modulator.audio()).unwrap(), Some(QueueKind::Other));
        let received = receiver.pop(QueueKind::Other).unwrap();
        assert!(received.packet.is_none());
        assert_eq!(received.frame.information(), b"!raw status");
    }

    #[test]
    fn test_queue_overflow_keeps_packets() {
        let settings = ReceiverSettings {
            queue_capacity: 1,
            ..ReceiverSettings::default()
        };
        let mut station = transmitter();
        let first = station.transmit(message("first")).unwrap();
        let second = station.transmit(message("second")).unwrap();
        let mut receiver = AprsReceiver::new(&settings).unwrap();

        assert_eq!(receiver.process_samples(&first).unwrap(), Some(QueueKind::Message));
        assert!(matches!(
            receiver.process_samples(&second),
            Err(StationError::BufferFull { kind: QueueKind::Message })
        ));
        assert_eq!(receiver.pending(QueueKind::Message), 2);
        assert_eq!(receiver.stats().packets(QueueKind::Message), 2);

        let drained: Vec<Vec<u8>> = std::iter::from_fn(|| receiver.pop(QueueKind::Message))
            .map(|received| received.frame.information().to_vec())
            .collect();
        assert_eq!(drained, vec![b":KD9XYZ   :first{1".to_vec(), b":KD9XYZ   :second{1".to_vec()]);

        assert_eq!(receiver.process_samples(&first).unwrap(), Some(QueueKind::Message));
    }

    #[test]
    fn test_noise_yields_nothing() {
        let mut receiver = AprsReceiver::new(&ReceiverSettings::default()).unwrap();
        assert_eq!(receiver.process_samples(&white_noise(24000, 3)).unwrap(), None);
        assert_eq!(receiver.stats().frames_rejected, 1);
        assert!(stream(&mut receiver, &white_noise(24000, 5)).is_empty());
        for kind in QueueKind::ALL {
            assert_eq!(receiver.pending(kind), 0);
        }
    }

    #[test]
    fn test_afsk_text_receiver() {
        let mut modulator = AfskModulator::new(AfskSettings::default()).unwrap();
        modulator.add_string("Hello World!").unwrap();
        let mut audio = modulator.take_audio();
        audio.extend(vec![0i16; 2 * CHUNK]);

        let mut receiver = AfskReceiver::new(&ReceiverSettings::default()).unwrap();
        let outcomes: Vec<AsciiResult> = audio
            .chunks(CHUNK)
            .filter_map(|chunk| receiver.push_chunk(chunk).unwrap())
            .collect();

        assert_eq!(outcomes, vec![AsciiResult::Success("Hello World!".to_string())]);
        assert_eq!(receiver.pop_message().as_deref(), Some("Hello World!"));
        assert_eq!(receiver.pending(), 0);
    }

    #[test]
    fn test_afsk_text_queue_overflow_keeps_messages() {
        let settings = ReceiverSettings {
            queue_capacity: 1,
            ..ReceiverSettings::default()
        };
        let mut receiver = AfskReceiver::new(&settings).unwrap();
        for text in ["one", "two"] {
            let mut modulator = AfskModulator::new(AfskSettings::default()).unwrap();
            modulator.add_string(text).unwrap();
            let outcome = receiver.process_samples(modulator.audio());
            if text == "one" {
                assert_eq!(outcome.unwrap(), AsciiResult::Success("one".to_string()));
            } else {
                assert!(matches!(outcome, Err(StationError::BufferFull { kind: QueueKind::Message })));
            }
        }

        assert_eq!(receiver.pending(), 2);
        assert_eq!(receiver.pop_message().as_deref(), Some("one"));
        assert_eq!(receiver.pop_message().as_deref(), Some("two"));
    }

    #[test]
    fn test_settings_validation() {
        assert!(ReceiverSettings::default().validate().is_ok());
        let empty = ReceiverSettings {
            queue_capacity: 0,
            ..ReceiverSettings::default()
        };
        assert!(AprsReceiver::new(&empty).is_err());
    }
}
