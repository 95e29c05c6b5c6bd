//! DOSBox Raw OPL (DRO) captures
//!
//! Two revisions exist. Both start with the `DBRAWOPL` signature followed by a
//! major / minor version pair:
//!
//! - **0.1**: length in ms, length in bytes, hardware type, then a byte stream
//!   where codes `0x00`..`0x04` are delays, chip selects and an escape, and
//!   every other byte is a register followed by its value.
//! - **2.0**: length in register pairs, length in ms, hardware type, format,
//!   compression, the two delay codes and a code map; the body is a list of
//!   `(code, value)` pairs where bit 7 of the code selects the chip.

use super::{default_name, nom_error, AudioMetadata, BoundFile, MultimediaContainer};
use crate::config::PlayerConfig;
use crate::factory::create_instance;
use crate::mixer::{Mixer, OplMixer, TimedWrite};
use crate::shared::RegisterWrite;
use crate::version::ChipTopology;
use crate::{OplError, Result};
use log::{debug, warn};
use nom::bytes::complete::{tag, take};
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::sequence::tuple;
use nom::IResult;
use std::path::Path;

const SIGNATURE: &[u8] = b"DBRAWOPL";

/// Maximum number of entries in a 2.0 code map
const MAX_CODEMAP: u8 = 128;

/// Capture format revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DroVersion {
    /// DOSBox 0.72 format
    V0_1,
    /// DOSBox 0.73+ format
    V2_0,
}

/// A parsed capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroSong {
    /// Format revision
    pub version: DroVersion,
    /// Hardware the capture was recorded on
    pub topology: ChipTopology,
    /// Length declared in the header
    pub length_ms: u64,
    /// Register writes in playback order
    pub writes: Vec<TimedWrite>,
}

impl DroSong {
    /// Playing time: the declared length, extended to the last write
    pub fn duration_ms(&self) -> u64 {
        let last = self.writes.last().map(|w| w.at_ms).unwrap_or(0);
        self.length_ms.max(last)
    }
}

/// Header of a 2.0 capture
struct V2Header {
    length_pairs: u32,
    length_ms: u32,
    hardware: u8,
    format: u8,
    compression: u8,
    short_delay: u8,
    long_delay: u8,
    codemap: Vec<u8>,
}

/// Parse a complete DRO file
pub fn parse_dro(data: &[u8]) -> Result<DroSong> {
    let (rest, (_, major, minor)) = tuple((tag(SIGNATURE), le_u16, le_u16))(data)
        .map_err(|e| nom_error("DRO signature", e))?;

    match (major, minor) {
        (0, 1) => parse_v1(rest),
        (2, 0) => parse_v2(rest),
        _ => Err(OplError::ParseError(format!(
            "unsupported DRO version {}.{}",
            major, minor
        ))),
    }
}

fn topology_v1(hardware: u8) -> Result<ChipTopology> {
    match hardware {
        0 => Ok(ChipTopology::Opl2),
        1 => Ok(ChipTopology::Opl3),
        2 => Ok(ChipTopology::DualOpl2),
        other => Err(OplError::ParseError(format!(
            "unknown DRO hardware type {}",
            other
        ))),
    }
}

fn topology_v2(hardware: u8) -> Result<ChipTopology> {
    match hardware {
        0 => Ok(ChipTopology::Opl2),
        1 => Ok(ChipTopology::DualOpl2),
        2 => Ok(ChipTopology::Opl3),
        other => Err(OplError::ParseError(format!(
            "unknown DRO hardware type {}",
            other
        ))),
    }
}

/// Wrap a write in the path that matches the capture hardware
fn register_write(topology: ChipTopology, bank: u8, register: u8, value: u8) -> RegisterWrite {
    match topology {
        ChipTopology::Opl2 if bank == 0 => RegisterWrite::Opl2 { register, value },
        ChipTopology::Opl2 | ChipTopology::DualOpl2 => RegisterWrite::DualOpl2 {
            bank,
            register,
            value,
        },
        ChipTopology::Opl3 => RegisterWrite::Opl3 {
            base: bank,
            register,
            value,
        },
    }
}

fn v1_header(input: &[u8]) -> IResult<&[u8], (u32, u32, u8)> {
    let (input, (length_ms, length_bytes, hardware)) = tuple((le_u32, le_u32, le_u8))(input)?;

    // Early files store the hardware type in one byte, later ones in four,
    // with no version change. A zero among the next three bytes means padding.
    let input = match input.get(..3) {
        Some(pad) if pad.contains(&0) => &input[3..],
        _ => input,
    };
    Ok((input, (length_ms, length_bytes, hardware)))
}

enum V1Command {
    Delay(u64),
    Bank(u8),
    Write(u8, u8),
}

fn v1_command(input: &[u8]) -> IResult<&[u8], V1Command> {
    let (input, code) = le_u8(input)?;
    match code {
        0x00 => {
            let (input, delay) = le_u8(input)?;
            Ok((input, V1Command::Delay(delay as u64 + 1)))
        }
        0x01 => {
            let (input, delay) = le_u16(input)?;
            Ok((input, V1Command::Delay(delay as u64 + 1)))
        }
        0x02 => Ok((input, V1Command::Bank(0))),
        0x03 => Ok((input, V1Command::Bank(1))),
        0x04 => {
            let (input, (register, value)) = tuple((le_u8, le_u8))(input)?;
            Ok((input, V1Command::Write(register, value)))
        }
        register => {
            let (input, value) = le_u8(input)?;
            Ok((input, V1Command::Write(register, value)))
        }
    }
}

fn parse_v1(input: &[u8]) -> Result<DroSong> {
    let (input, (length_ms, length_bytes, hardware)) =
        v1_header(input).map_err(|e| nom_error("DRO 0.1 header", e))?;
    let topology = topology_v1(hardware)?;

    let mut body = match input.get(..length_bytes as usize) {
        Some(body) => body,
        None => {
            warn!(
                "DRO 0.1 body truncated: {} of {} bytes",
                input.len(),
                length_bytes
            );
            input
        }
    };

    let mut writes = Vec::new();
    let mut now = 0u64;
    let mut bank = 0u8;
    while !body.is_empty() {
        let (rest, command) = match v1_command(body) {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("DRO 0.1 stream ends inside a command");
                break;
            }
        };
        match command {
            V1Command::Delay(ms) => now += ms,
            V1Command::Bank(selected) => bank = selected,
            V1Command::Write(register, value) => writes.push(TimedWrite {
                at_ms: now,
                write: register_write(topology, bank, register, value),
            }),
        }
        body = rest;
    }

    debug!(
        "DRO 0.1: {} writes, {} ms, {}",
        writes.len(),
        length_ms,
        topology
    );
    Ok(DroSong {
        version: DroVersion::V0_1,
        topology,
        length_ms: length_ms as u64,
        writes,
    })
}

fn v2_header(input: &[u8]) -> IResult<&[u8], V2Header> {
    let (input, (length_pairs, length_ms, hardware, format, compression)) =
        tuple((le_u32, le_u32, le_u8, le_u8, le_u8))(input)?;
    let (input, (short_delay, long_delay, codemap_len)) = tuple((le_u8, le_u8, le_u8))(input)?;
    let (input, codemap) = take(codemap_len)(input)?;
    Ok((
        input,
        V2Header {
            length_pairs,
            length_ms,
            hardware,
            format,
            compression,
            short_delay,
            long_delay,
            codemap: codemap.to_vec(),
        },
    ))
}

fn read_v2_header(input: &[u8]) -> Result<(&[u8], V2Header, ChipTopology)> {
    let (rest, header) = v2_header(input).map_err(|e| nom_error("DRO 2.0 header", e))?;

    if header.format != 0 {
        return Err(OplError::ParseError(format!(
            "unsupported DRO data format {}",
            header.format
        )));
    }
    if header.compression != 0 {
        return Err(OplError::ParseError(format!(
            "unsupported DRO compression {}",
            header.compression
        )));
    }
    if header.codemap.len() > MAX_CODEMAP as usize {
        return Err(OplError::ParseError(format!(
            "DRO code map too long ({} entries)",
            header.codemap.len()
        )));
    }

    let topology = topology_v2(header.hardware)?;
    Ok((rest, header, topology))
}

fn v2_pair(input: &[u8]) -> IResult<&[u8], (u8, u8)> {
    tuple((le_u8, le_u8))(input)
}

fn parse_v2(input: &[u8]) -> Result<DroSong> {
    let (mut body, header, topology) = read_v2_header(input)?;

    let mut writes = Vec::new();
    let mut now = 0u64;
    for index in 0..header.length_pairs {
        let (rest, (code, value)) = match v2_pair(body) {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(
                    "DRO 2.0 body truncated after {} of {} pairs",
                    index, header.length_pairs
                );
                break;
            }
        };
        body = rest;

        if code == header.short_delay {
            now += value as u64 + 1;
        } else if code == header.long_delay {
            now += (value as u64 + 1) << 8;
        } else {
            let bank = code >> 7;
            let register = header
                .codemap
                .get((code & 0x7F) as usize)
                .copied()
                .ok_or_else(|| {
                    OplError::ParseError(format!("DRO code {:#04x} outside code map", code))
                })?;
            writes.push(TimedWrite {
                at_ms: now,
                write: register_write(topology, bank, register, value),
            });
        }
    }

    debug!(
        "DRO 2.0: {} writes, {} ms, {}",
        writes.len(),
        header.length_ms,
        topology
    );
    Ok(DroSong {
        version: DroVersion::V2_0,
        topology,
        length_ms: header.length_ms as u64,
        writes,
    })
}

/// Container for `.dro` captures
#[derive(Debug, Default)]
pub struct DroContainer {
    bound: Option<(BoundFile, DroSong)>,
}

impl DroContainer {
    /// Open and parse a capture
    pub fn open(path: &Path) -> Result<Self> {
        let song = parse_dro(&std::fs::read(path)?)?;
        let metadata = AudioMetadata {
            name: default_name(path),
            duration_ms: song.duration_ms() as i64,
        };
        Ok(Self {
            bound: Some((
                BoundFile {
                    path: path.to_path_buf(),
                    metadata,
                },
                song,
            )),
        })
    }

    /// The parsed capture, once bound
    pub fn song(&self) -> Option<&DroSong> {
        self.bound.as_ref().map(|(_, song)| song)
    }
}

impl MultimediaContainer for DroContainer {
    fn name(&self) -> &'static str {
        "DOSBox Raw OPL"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["dro"]
    }

    fn get_instance(&self, path: &Path) -> Result<Box<dyn MultimediaContainer>> {
        Ok(Box::new(Self::open(path)?))
    }

    fn file_path(&self) -> Option<&Path> {
        self.bound.as_ref().map(|(file, _)| file.path.as_path())
    }

    fn metadata(&self) -> Option<&AudioMetadata> {
        self.bound.as_ref().map(|(file, _)| &file.metadata)
    }

    fn probe(&self, path: &Path) -> Result<AudioMetadata> {
        let song = parse_dro(&std::fs::read(path)?)?;
        Ok(AudioMetadata {
            name: default_name(path),
            duration_ms: song.duration_ms() as i64,
        })
    }

    fn create_mixer(&self, config: &PlayerConfig) -> Result<Box<dyn Mixer>> {
        config.validate()?;
        let song = self
            .song()
            .ok_or_else(|| OplError::Other("DRO container is not bound to a file".to_string()))?;
        let device = create_instance(
            config.version,
            config.sample_rate,
            config.topology_for(song.topology),
        )?;
        Ok(Box::new(OplMixer::new(
            device,
            song.writes.clone(),
            song.length_ms,
            config.looping,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn v1_file(hardware: u8, padded: bool, body: &[u8], length_ms: u32) -> Vec<u8> {
        let mut data = SIGNATURE.to_vec();
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&length_ms.to_le_bytes());
        data.extend_from_slice(&(body.len() as u32).to_le_bytes());
        data.push(hardware);
        if padded {
            data.extend_from_slice(&[0, 0, 0]);
        }
        data.extend_from_slice(body);
        data
    }

    fn v2_file(hardware: u8, codemap: &[u8], pairs: &[(u8, u8)], length_ms: u32) -> Vec<u8> {
        let mut data = SIGNATURE.to_vec();
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&(pairs.len() as u32).to_le_bytes());
        data.extend_from_slice(&length_ms.to_le_bytes());
        data.extend_from_slice(&[hardware, 0, 0, 0xFE, 0xFF, codemap.len() as u8]);
        data.extend_from_slice(codemap);
        for &(code, value) in pairs {
            data.push(code);
            data.push(value);
        }
        data
    }

    /// Same song in both revisions: two writes, a 10 ms delay, a 512 ms delay,
    /// then a key-off.
    fn v1_song() -> Vec<u8> {
        let body = [
            0x20, 0x01, // op 0 characteristic
            0xB0, 0x32, // key on
            0x00, 0x09, // 10 ms
            0x01, 0xFF, 0x01, // 512 ms
            0xB0, 0x12, // key off
        ];
        v1_file(0, true, &body, 522)
    }

    fn v2_song() -> Vec<u8> {
        let codemap = [0x20, 0xB0];
        let pairs = [(0x00, 0x01), (0x01, 0x32), (0xFE, 0x09), (0xFF, 0x01), (0x01, 0x12)];
        v2_file(0, &codemap, &pairs, 522)
    }

    #[test]
    fn test_v1_and_v2_agree() {
        let v1 = parse_dro(&v1_song()).unwrap();
        let v2 = parse_dro(&v2_song()).unwrap();
        assert_eq!(v1.version, DroVersion::V0_1);
        assert_eq!(v2.version, DroVersion::V2_0);
        assert_eq!(v1.writes, v2.writes);
        assert_eq!(v1.writes.len(), 3);
        assert_eq!(v1.writes[2].at_ms, 522);
        assert_eq!(
            v1.writes[2].write,
            RegisterWrite::Opl2 {
                register: 0xB0,
                value: 0x12
            }
        );
    }

    #[test]
    fn test_v1_single_byte_hardware_field() {
        // First body byte is non-zero data, not padding
        let song = parse_dro(&v1_file(0, false, &[0x20, 0x01, 0x40, 0x3F, 0xB0, 0x32], 0)).unwrap();
        assert_eq!(song.writes.len(), 3);
        assert_eq!(song.writes[1].write.register(), 0x40);
    }

    #[test]
    fn test_v1_bank_select_and_escape() {
        let body = [0x03, 0xB0, 0x21, 0x02, 0x04, 0x01, 0x20];
        let song = parse_dro(&v1_file(2, true, &body, 0)).unwrap();
        assert_eq!(song.topology, ChipTopology::DualOpl2);
        assert_eq!(
            song.writes,
            vec![
                TimedWrite {
                    at_ms: 0,
                    write: RegisterWrite::DualOpl2 {
                        bank: 1,
                        register: 0xB0,
                        value: 0x21
                    }
                },
                TimedWrite {
                    at_ms: 0,
                    write: RegisterWrite::DualOpl2 {
                        bank: 0,
                        register: 0x01,
                        value: 0x20
                    }
                },
            ]
        );
    }

    #[test]
    fn test_v2_high_bank_on_opl3() {
        let song = parse_dro(&v2_file(2, &[0x05], &[(0x80, 0x01)], 0)).unwrap();
        assert_eq!(song.topology, ChipTopology::Opl3);
        assert_eq!(
            song.writes[0].write,
            RegisterWrite::Opl3 {
                base: 1,
                register: 0x05,
                value: 0x01
            }
        );
    }

    #[test]
    fn test_malformed_headers_rejected() {
        assert!(parse_dro(b"NOTADRO!\x00\x00\x01\x00").is_err());
        assert!(parse_dro(b"DBRAWOPL\x01\x00").is_err());

        let mut wrong_version = v2_song();
        wrong_version[8] = 3;
        assert!(parse_dro(&wrong_version).is_err());

        let mut compressed = v2_song();
        compressed[22] = 1;
        assert!(parse_dro(&compressed).is_err());

        assert!(parse_dro(&v2_file(7, &[], &[], 0)).is_err());
        assert!(parse_dro(&v2_file(0, &[0x20], &[(0x05, 0x00)], 0)).is_err());
    }

    #[test]
    fn test_truncated_body_keeps_complete_writes() {
        let mut data = v2_song();
        data.truncate(data.len() - 3);
        let song = parse_dro(&data).unwrap();
        assert_eq!(song.writes.len(), 2);
    }

    #[test]
    fn test_container_open_and_mixer() {
        let mut file = tempfile::Builder::new().suffix(".dro").tempfile().unwrap();
        file.write_all(&v2_song()).unwrap();

        let prototype = DroContainer::default();
        assert!(prototype.can_handle(file.path()));
        assert!(prototype.metadata().is_none());
        assert!(prototype.create_mixer(&PlayerConfig::default()).is_err());

        let container = prototype.get_instance(file.path()).unwrap();
        assert_eq!(container.file_path(), Some(file.path()));
        let metadata = container.metadata().unwrap();
        assert_eq!(metadata.duration_ms, 522);
        assert!(metadata.name.ends_with(".dro"));

        let config = PlayerConfig {
            sample_rate: 10_000,
            ..PlayerConfig::default()
        };
        let mixer = container.create_mixer(&config).unwrap();
        assert_eq!(mixer.sample_rate(), 10_000);
        assert_eq!(mixer.duration_ms(), 522);
    }

    #[test]
    fn test_song_info_defaults_on_garbage() {
        let mut file = tempfile::Builder::new().suffix(".dro").tempfile().unwrap();
        file.write_all(b"garbage").unwrap();
        let info = DroContainer::default().song_info(file.path());
        assert_eq!(info.duration_ms, -1);
    }
}
