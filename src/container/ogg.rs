//! Ogg/Vorbis metadata probing
//!
//! Only the container framing and the two Vorbis header packets are parsed:
//! the identification header gives the sample rate, the comment header gives
//! the tags, and the granule position of the last page gives the length in
//! samples. Audio packets are never decoded here.

use super::{default_name, nom_error, AudioMetadata, BoundFile, MultimediaContainer};
use crate::config::PlayerConfig;
use crate::mixer::Mixer;
use crate::{OplError, Result};
use log::{debug, warn};
use nom::bytes::complete::{tag, take};
use nom::combinator::verify;
use nom::multi::{length_count, length_data};
use nom::number::complete::{le_i32, le_u32, le_u64, le_u8};
use nom::sequence::tuple;
use nom::IResult;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const CAPTURE_PATTERN: &[u8] = b"OggS";

const IDENTIFICATION_MAGIC: &[u8] = b"\x01vorbis";
const COMMENT_MAGIC: &[u8] = b"\x03vorbis";

/// Header type flag: first page of a logical stream
const BEGIN_OF_STREAM: u8 = 0x02;

/// Offset of the checksum field inside a page header
const CHECKSUM_OFFSET: usize = 22;

/// Granule position of pages on which no packet ends
const NO_GRANULE: u64 = u64::MAX;

/// Bytes read from the start of a file before growing the window
const HEAD_WINDOW: usize = 64 * 1024;

/// Bytes read from the end of a file; holds at least one maximum-size page
const TAIL_WINDOW: usize = 128 * 1024;

const CRC_TABLE: [u32; 256] = crc_table();

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut r = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            r = if r & 0x8000_0000 != 0 {
                (r << 1) ^ 0x04C1_1DB7
            } else {
                r << 1
            };
            bit += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
}

fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    data.iter().fold(crc, |crc, &byte| {
        (crc << 8) ^ CRC_TABLE[((crc >> 24) as u8 ^ byte) as usize]
    })
}

/// Page checksum, computed with the checksum field zeroed
fn page_checksum(raw: &[u8]) -> u32 {
    let crc = crc32_update(0, &raw[..CHECKSUM_OFFSET]);
    let crc = crc32_update(crc, &[0; 4]);
    crc32_update(crc, &raw[CHECKSUM_OFFSET + 4..])
}

struct Page<'a> {
    header_type: u8,
    granule: u64,
    serial: u32,
    sequence: u32,
    checksum: u32,
    lacing: &'a [u8],
    body: &'a [u8],
    raw: &'a [u8],
}

fn page(input: &[u8]) -> IResult<&[u8], Page<'_>> {
    let start = input;
    let (input, _) = tag(CAPTURE_PATTERN)(input)?;
    let (input, _) = verify(le_u8, |version: &u8| *version == 0)(input)?;
    let (input, (header_type, granule, serial, sequence, checksum)) =
        tuple((le_u8, le_u64, le_u32, le_u32, le_u32))(input)?;
    let (input, lacing) = length_data(le_u8)(input)?;
    let body_len: usize = lacing.iter().map(|&len| len as usize).sum();
    let (input, body) = take(body_len)(input)?;
    let raw = &start[..start.len() - input.len()];
    Ok((
        input,
        Page {
            header_type,
            granule,
            serial,
            sequence,
            checksum,
            lacing,
            body,
            raw,
        },
    ))
}

/// Joins lacing segments into packets; a segment shorter than 255 ends one
#[derive(Default)]
struct PacketAssembler {
    partial: Vec<u8>,
    packets: Vec<Vec<u8>>,
}

impl PacketAssembler {
    fn push_page(&mut self, page: &Page<'_>) {
        let mut offset = 0;
        for &len in page.lacing {
            let end = offset + len as usize;
            self.partial.extend_from_slice(&page.body[offset..end]);
            offset = end;
            if len < 255 {
                self.packets.push(std::mem::take(&mut self.partial));
            }
        }
    }
}

struct Identification {
    version: u32,
    channels: u8,
    sample_rate: u32,
    nominal_bitrate: i32,
}

fn identification(input: &[u8]) -> IResult<&[u8], Identification> {
    let (input, _) = tag(IDENTIFICATION_MAGIC)(input)?;
    let (input, (version, channels, sample_rate)) = tuple((le_u32, le_u8, le_u32))(input)?;
    let (input, (_maximum, nominal_bitrate, _minimum)) = tuple((le_i32, le_i32, le_i32))(input)?;
    let (input, (_blocksizes, _framing)) = tuple((le_u8, le_u8))(input)?;
    Ok((
        input,
        Identification {
            version,
            channels,
            sample_rate,
            nominal_bitrate,
        },
    ))
}

fn comment_header(input: &[u8]) -> IResult<&[u8], (&[u8], Vec<&[u8]>)> {
    let (input, _) = tag(COMMENT_MAGIC)(input)?;
    let (input, vendor) = length_data(le_u32)(input)?;
    let (input, comments) = length_count(le_u32, length_data(le_u32))(input)?;
    Ok((input, (vendor, comments)))
}

/// Header information of a Vorbis stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggStreamInfo {
    /// Logical stream serial number
    pub serial: u32,
    /// Channel count
    pub channels: u8,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Nominal bitrate in bits per second (0 or negative when unset)
    pub nominal_bitrate: i32,
    /// Encoder vendor string
    pub vendor: String,
    /// Tags in file order, keys uppercased
    pub comments: Vec<(String, String)>,
    /// Granule position of the last page, in samples
    pub granule: Option<u64>,
}

impl OggStreamInfo {
    /// First value of a tag (case-insensitive key)
    pub fn comment(&self, key: &str) -> Option<&str> {
        self.comments
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// Stream length in milliseconds, `None` when unknown or out of range
    pub fn duration_ms(&self) -> Option<i64> {
        let granule = self.granule?;
        if self.sample_rate == 0 {
            return None;
        }
        i64::try_from(granule as u128 * 1000 / self.sample_rate as u128).ok()
    }

    /// `ARTIST - TITLE`, or `TITLE` alone
    pub fn display_name(&self) -> Option<String> {
        let title = self.comment("TITLE")?;
        Some(match self.comment("ARTIST") {
            Some(artist) => format!("{} - {}", artist, title),
            None => title.to_string(),
        })
    }
}

/// Parse the Vorbis headers and length of an Ogg file held in memory
///
/// The first Vorbis stream is probed; other multiplexed streams (Skeleton,
/// Theora) are skipped. Pages are checksummed: a broken page before both
/// header packets are complete is an error, a broken page later ends the
/// scan and the last good granule position is used.
pub fn probe_ogg(data: &[u8]) -> Result<OggStreamInfo> {
    scan(data, true)
}

/// Probe an Ogg file from its leading pages and a window at its end
///
/// Small files are read whole. Larger ones read the head until both Vorbis
/// headers are complete, then take the length from the last page of the
/// stream found in the tail window.
pub fn probe_ogg_file(path: &Path) -> Result<OggStreamInfo> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len <= (HEAD_WINDOW + TAIL_WINDOW) as u64 {
        let mut data = Vec::with_capacity(len as usize);
        file.read_to_end(&mut data)?;
        return probe_ogg(&data);
    }

    let mut window = HEAD_WINDOW as u64;
    let mut info = loop {
        let mut head = Vec::with_capacity(window as usize);
        file.seek(SeekFrom::Start(0))?;
        (&mut file).take(window).read_to_end(&mut head)?;
        let whole = window >= len;
        match scan(&head, whole) {
            Ok(info) => break info,
            Err(e) if whole => return Err(e),
            Err(e) => {
                debug!("{}: headers not within {} bytes ({})", path.display(), window, e);
                window = (window * 2).min(len);
            }
        }
    };

    file.seek(SeekFrom::Start(len - TAIL_WINDOW as u64))?;
    let mut tail = Vec::with_capacity(TAIL_WINDOW);
    file.read_to_end(&mut tail)?;
    match last_granule(&tail, info.serial) {
        Some(granule) => info.granule = Some(granule),
        None => debug!(
            "{}: no granule for stream {:08x} in the tail window",
            path.display(),
            info.serial
        ),
    }
    Ok(info)
}

/// Walk pages from the start of `data`
///
/// With `complete` unset the buffer is a prefix of the file, so a cut-off
/// last page ends the scan quietly.
fn scan(data: &[u8], complete: bool) -> Result<OggStreamInfo> {
    let mut input = data;
    let mut serial = None;
    let mut assembler = PacketAssembler::default();
    let mut headers = None;
    let mut granule = None;

    while !input.is_empty() {
        let (rest, page) = match page(input) {
            Ok(parsed) => parsed,
            Err(e) if headers.is_some() => {
                if complete {
                    warn!("Ogg scan stopped at offset {}: {}", data.len() - input.len(), e);
                }
                break;
            }
            Err(e) => return Err(nom_error("Ogg page", e)),
        };
        input = rest;

        if page_checksum(page.raw) != page.checksum {
            if headers.is_some() {
                warn!("Ogg page {} checksum mismatch, scan stopped", page.sequence);
                break;
            }
            return Err(OplError::ParseError(format!(
                "Ogg page {} checksum mismatch",
                page.sequence
            )));
        }

        let stream = match serial {
            Some(stream) => stream,
            None if page.header_type & BEGIN_OF_STREAM != 0 => {
                if !page.body.starts_with(IDENTIFICATION_MAGIC) {
                    debug!("Skipping non-Vorbis Ogg stream {:08x}", page.serial);
                    continue;
                }
                serial = Some(page.serial);
                page.serial
            }
            None => {
                return Err(OplError::ParseError(
                    "no Vorbis stream begins before the first data page".to_string(),
                ))
            }
        };
        if page.serial != stream {
            continue;
        }
        if page.granule != NO_GRANULE {
            granule = Some(page.granule);
        }

        if headers.is_none() {
            assembler.push_page(&page);
            if let [ident, comments, ..] = assembler.packets.as_slice() {
                headers = Some(parse_headers(ident, comments)?);
            }
        } else if !complete {
            break;
        }
    }

    let (ident, vendor, comments) = headers.ok_or_else(|| {
        OplError::ParseError("Ogg stream ends before the Vorbis headers".to_string())
    })?;

    Ok(OggStreamInfo {
        serial: serial.unwrap_or_default(),
        channels: ident.channels,
        sample_rate: ident.sample_rate,
        nominal_bitrate: ident.nominal_bitrate,
        vendor,
        comments,
        granule,
    })
}

/// Granule of the last intact page of `serial` found anywhere in `data`
fn last_granule(data: &[u8], serial: u32) -> Option<u64> {
    (0..data.len().saturating_sub(CAPTURE_PATTERN.len() - 1))
        .rev()
        .filter(|&offset| data[offset..].starts_with(CAPTURE_PATTERN))
        .find_map(|offset| {
            let (_, page) = page(&data[offset..]).ok()?;
            (page_checksum(page.raw) == page.checksum
                && page.serial == serial
                && page.granule != NO_GRANULE)
                .then_some(page.granule)
        })
}

type Headers = (Identification, String, Vec<(String, String)>);

fn parse_headers(ident: &[u8], comments: &[u8]) -> Result<Headers> {
    let (_, ident) = identification(ident).map_err(|e| nom_error("Vorbis identification header", e))?;
    if ident.version != 0 {
        return Err(OplError::ParseError(format!(
            "unsupported Vorbis version {}",
            ident.version
        )));
    }
    if ident.channels == 0 || ident.sample_rate == 0 {
        return Err(OplError::ParseError(
            "Vorbis header has no channels or no sample rate".to_string(),
        ));
    }

    let (_, (vendor, entries)) =
        comment_header(comments).map_err(|e| nom_error("Vorbis comment header", e))?;
    let comments = entries
        .iter()
        .filter_map(|entry| {
            let entry = String::from_utf8_lossy(entry);
            match entry.split_once('=') {
                Some((key, value)) => Some((key.to_ascii_uppercase(), value.to_string())),
                None => {
                    debug!("Skipping Vorbis comment without '=': {}", entry);
                    None
                }
            }
        })
        .collect();

    Ok((ident, String::from_utf8_lossy(vendor).into_owned(), comments))
}

/// Container for Ogg/Vorbis files
#[derive(Debug, Default)]
pub struct OggContainer {
    bound: Option<BoundFile>,
}

impl OggContainer {
    /// Bind a file, probing its metadata best-effort
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(OplError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a file", path.display()),
            )));
        }
        let metadata = Self::default().song_info(path);
        Ok(Self {
            bound: Some(BoundFile {
                path: path.to_path_buf(),
                metadata,
            }),
        })
    }
}

impl MultimediaContainer for OggContainer {
    fn name(&self) -> &'static str {
        "Ogg Vorbis"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["ogg", "oga"]
    }

    fn get_instance(&self, path: &Path) -> Result<Box<dyn MultimediaContainer>> {
        Ok(Box::new(Self::open(path)?))
    }

    fn file_path(&self) -> Option<&Path> {
        self.bound.as_ref().map(|file| file.path.as_path())
    }

    fn metadata(&self) -> Option<&AudioMetadata> {
        self.bound.as_ref().map(|file| &file.metadata)
    }

    fn probe(&self, path: &Path) -> Result<AudioMetadata> {
        let info = probe_ogg_file(path)?;
        debug!(
            "{}: Vorbis {} ch {} Hz, vendor {:?}",
            path.display(),
            info.channels,
            info.sample_rate,
            info.vendor
        );
        Ok(AudioMetadata {
            name: info.display_name().unwrap_or_else(|| default_name(path)),
            duration_ms: info.duration_ms().unwrap_or(-1),
        })
    }

    #[cfg(feature = "ogg-decode")]
    fn create_mixer(&self, config: &PlayerConfig) -> Result<Box<dyn Mixer>> {
        config.validate()?;
        let path = self
            .file_path()
            .ok_or_else(|| OplError::Other("Ogg container is not bound to a file".to_string()))?;
        Ok(Box::new(crate::mixer::OggMixer::open(
            path,
            config.sample_rate,
            config.looping,
        )?))
    }

    #[cfg(not(feature = "ogg-decode"))]
    fn create_mixer(&self, _config: &PlayerConfig) -> Result<Box<dyn Mixer>> {
        Err(OplError::Unsupported(
            "Vorbis decoding requires the `ogg-decode` feature".to_string(),
        ))
    }
}
