//! SoundFont (SF2/SF3) preset scanning
//!
//! Only the RIFF skeleton is read: the `INFO` list for the bank name and
//! version, and the `pdta/phdr` preset header table. Sample data is
//! skipped. Used to warn when the active soundfont lacks an instrument the
//! site offers, in which case the synthesizer would fall back to silence or
//! a default preset.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::midi::MidiEvent;
use crate::program::{programs_in_use, uses_percussion};

/// Bank the General MIDI percussion kits live in
pub const PERCUSSION_BANK: u16 = 128;

const PHDR_RECORD_LEN: usize = 38;
const PRESET_NAME_LEN: usize = 20;
const TERMINAL_PRESET: &str = "EOP";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SoundFontError {
    #[error("not a RIFF file")]
    NotRiff,

    #[error("RIFF form is {0:?}, expected \"sfbk\"")]
    NotSoundFont(String),

    #[error("chunk {chunk:?} runs past the end of the file")]
    Truncated { chunk: String },

    #[error("no preset header table (pdta/phdr)")]
    MissingPresets,

    #[error("preset header table length {0} is not a multiple of 38")]
    MalformedPresetTable(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub name: String,
    /// MIDI program number
    pub program: u16,
    pub bank: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SoundFontVersion {
    pub major: u16,
    pub minor: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoundFontInfo {
    /// Bank name from `INFO/INAM`
    pub name: Option<String>,
    /// `INFO/ifil`; major 3 means compressed samples (SF3)
    pub version: Option<SoundFontVersion>,
    pub presets: Vec<Preset>,
}

impl SoundFontInfo {
    /// Whether a melodic (bank 0) preset exists for `program`
    pub fn has_program(&self, program: u8) -> bool {
        self.presets
            .iter()
            .any(|p| p.bank == 0 && p.program == u16::from(program))
    }

    pub fn melodic_programs(&self) -> BTreeSet<u8> {
        self.presets
            .iter()
            .filter(|p| p.bank == 0)
            .filter_map(|p| u8::try_from(p.program).ok())
            .filter(|&p| p <= 127)
            .collect()
    }

    pub fn has_percussion_kit(&self) -> bool {
        self.presets.iter().any(|p| p.bank == PERCUSSION_BANK)
    }
}

/// Whether a soundfont can voice a MIDI stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompatibilityReport {
    /// Programs used on melodic channels with no bank 0 preset
    pub missing_programs: Vec<u8>,
    pub needs_percussion: bool,
    pub has_percussion_kit: bool,
}

impl CompatibilityReport {
    pub fn is_compatible(&self) -> bool {
        self.missing_programs.is_empty() && (!self.needs_percussion || self.has_percussion_kit)
    }
}

/// Check a soundfont against the programs and percussion a stream uses
pub fn check_compatibility(info: &SoundFontInfo, events: &[MidiEvent]) -> CompatibilityReport {
    check_programs(info, programs_in_use(events), uses_percussion(events))
}

pub fn check_programs(
    info: &SoundFontInfo,
    programs: impl IntoIterator<Item = u8>,
    needs_percussion: bool,
) -> CompatibilityReport {
    let available = info.melodic_programs();
    let missing: BTreeSet<u8> = programs
        .into_iter()
        .filter(|p| !available.contains(p))
        .collect();

    CompatibilityReport {
        missing_programs: missing.into_iter().collect(),
        needs_percussion,
        has_percussion_kit: info.has_percussion_kit(),
    }
}

/// Read and scan a soundfont file
pub async fn scan_file(path: &Path) -> crate::Result<SoundFontInfo> {
    let bytes = tokio::fs::read(path).await?;
    let info = scan(&bytes)?;
    debug!(
        path = %path.display(),
        presets = info.presets.len(),
        name = info.name.as_deref().unwrap_or(""),
        "Scanned soundfont"
    );
    Ok(info)
}

/// Parse the preset table out of an in-memory soundfont
pub fn scan(bytes: &[u8]) -> Result<SoundFontInfo, SoundFontError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" {
        return Err(SoundFontError::NotRiff);
    }
    let form = &bytes[8..12];
    if form != b"sfbk" {
        return Err(SoundFontError::NotSoundFont(
            String::from_utf8_lossy(form).into_owned(),
        ));
    }

    // Trust the data over a RIFF size field that overstates it
    let riff_len = read_u32(bytes, 4) as usize;
    if riff_len < 4 {
        return Err(SoundFontError::Truncated {
            chunk: "RIFF".to_string(),
        });
    }
    let body_end = bytes.len().min(8usize.saturating_add(riff_len));
    let body = &bytes[12..body_end];

    let mut info = SoundFontInfo {
        name: None,
        version: None,
        presets: Vec::new(),
    };
    let mut found_phdr = false;

    for (id, data) in chunks(body) {
        if id? != *b"LIST" || data.len() < 4 {
            continue;
        }
        let list_body = &data[4..];
        match &data[0..4] {
            b"INFO" => read_info(list_body, &mut info)?,
            b"pdta" => {
                for (sub_id, sub_data) in chunks(list_body) {
                    if sub_id? == *b"phdr" {
                        info.presets = read_presets(sub_data)?;
                        found_phdr = true;
                    }
                }
            }
            _ => {}
        }
    }

    if !found_phdr {
        return Err(SoundFontError::MissingPresets);
    }
    Ok(info)
}

fn read_info(list_body: &[u8], info: &mut SoundFontInfo) -> Result<(), SoundFontError> {
    for (id, data) in chunks(list_body) {
        match &id? {
            b"ifil" if data.len() >= 4 => {
                info.version = Some(SoundFontVersion {
                    major: read_u16(data, 0),
                    minor: read_u16(data, 2),
                });
            }
            b"INAM" => {
                let name = zstr(data);
                if !name.is_empty() {
                    info.name = Some(name);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn read_presets(data: &[u8]) -> Result<Vec<Preset>, SoundFontError> {
    if data.len() % PHDR_RECORD_LEN != 0 {
        return Err(SoundFontError::MalformedPresetTable(data.len()));
    }

    let mut presets: Vec<Preset> = data
        .chunks_exact(PHDR_RECORD_LEN)
        .map(|record| Preset {
            name: zstr(&record[..PRESET_NAME_LEN]),
            program: read_u16(record, 20),
            bank: read_u16(record, 22),
        })
        .collect();

    if presets.last().is_some_and(|p| p.name == TERMINAL_PRESET) {
        presets.pop();
    }
    Ok(presets)
}

/// Iterate `(id, data)` pairs of a RIFF chunk sequence
///
/// A chunk whose declared size runs past the buffer yields `Truncated` and
/// ends the iteration.
fn chunks<'a>(
    mut buf: &'a [u8],
) -> impl Iterator<Item = (Result<[u8; 4], SoundFontError>, &'a [u8])> + 'a {
    std::iter::from_fn(move || {
        if buf.len() < 8 {
            return None;
        }
        let id = [buf[0], buf[1], buf[2], buf[3]];
        let size = read_u32(buf, 4) as usize;
        let rest = &buf[8..];

        if size > rest.len() {
            buf = &[];
            return Some((
                Err(SoundFontError::Truncated {
                    chunk: String::from_utf8_lossy(&id).into_owned(),
                }),
                &[][..],
            ));
        }

        let data = &rest[..size];
        // Chunks are padded to an even length
        let next = (size + (size & 1)).min(rest.len());
        buf = &rest[next..];
        Some((Ok(id), data))
    })
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// NUL-terminated fixed-width string
fn zstr(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::PERCUSSION_CHANNEL;

    fn chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        if data.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn list(kind: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
        let mut data = kind.to_vec();
        for c in children {
            data.extend_from_slice(c);
        }
        chunk(b"LIST", &data)
    }

    fn phdr_record(name: &str, program: u16, bank: u16) -> Vec<u8> {
        let mut record = vec![0u8; PHDR_RECORD_LEN];
        record[..name.len()].copy_from_slice(name.as_bytes());
        record[20..22].copy_from_slice(&program.to_le_bytes());
        record[22..24].copy_from_slice(&bank.to_le_bytes());
        record
    }

    fn soundfont(name: &str, presets: &[(&str, u16, u16)]) -> Vec<u8> {
        let mut ifil = 2u16.to_le_bytes().to_vec();
        ifil.extend_from_slice(&1u16.to_le_bytes());
        let mut inam = name.as_bytes().to_vec();
        inam.push(0);

        let mut phdr = Vec::new();
        for (n, program, bank) in presets {
            phdr.extend(phdr_record(n, *program, *bank));
        }
        phdr.extend(phdr_record("EOP", 0, 0));

        let mut body = b"sfbk".to_vec();
        body.extend(list(b"INFO", &[chunk(b"ifil", &ifil), chunk(b"INAM", &inam)]));
        body.extend(list(b"sdta", &[chunk(b"smpl", &[0; 7])]));
        body.extend(list(b"pdta", &[chunk(b"phdr", &phdr)]));
        chunk(b"RIFF", &body)
    }

    #[test]
    fn test_scan_presets() {
        let bytes = soundfont(
            "Guitars",
            &[("Nylon", 24, 0), ("Steel", 25, 0), ("Standard Kit", 0, 128)],
        );
        let info = scan(&bytes).unwrap();

        assert_eq!(info.name.as_deref(), Some("Guitars"));
        assert_eq!(info.version, Some(SoundFontVersion { major: 2, minor: 1 }));
        assert_eq!(info.presets.len(), 3, "terminal record must be dropped");
        assert_eq!(
            info.presets[1],
            Preset {
                name: "Steel".to_string(),
                program: 25,
                bank: 0
            }
        );
        assert!(info.has_program(25));
        assert!(!info.has_program(0));
        assert!(info.has_percussion_kit());
        assert_eq!(info.melodic_programs(), BTreeSet::from([24, 25]));
    }

    #[test]
    fn test_compatibility_report() {
        let info = scan(&soundfont("Small", &[("Steel", 25, 0)])).unwrap();
        let events = vec![
            MidiEvent::program_change(0, 0, 25),
            MidiEvent::program_change(0, 1, 33),
            MidiEvent::note_on(0, PERCUSSION_CHANNEL, 36, 100),
        ];

        let report = check_compatibility(&info, &events);
        assert_eq!(report.missing_programs, vec![33]);
        assert!(report.needs_percussion);
        assert!(!report.has_percussion_kit);
        assert!(!report.is_compatible());

        let report = check_programs(&info, [25], false);
        assert!(report.is_compatible());
    }

    #[test]
    fn test_rejects_non_soundfonts() {
        assert_eq!(scan(b"MThd\0\0\0\x06"), Err(SoundFontError::NotRiff));
        assert_eq!(scan(b""), Err(SoundFontError::NotRiff));

        let wave = chunk(b"RIFF", b"WAVEfmt ");
        assert_eq!(
            scan(&wave),
            Err(SoundFontError::NotSoundFont("WAVE".to_string()))
        );

        let empty = chunk(b"RIFF", b"sfbk");
        assert_eq!(scan(&empty), Err(SoundFontError::MissingPresets));
    }

    #[test]
    fn test_truncated_chunk() {
        let mut bytes = soundfont("Cut", &[("Steel", 25, 0)]);
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            scan(&bytes),
            Err(SoundFontError::Truncated { .. })
        ));
    }

    #[test]
    fn test_riff_size_smaller_than_form_type() {
        for size in 0u32..4 {
            let mut bytes = b"RIFF".to_vec();
            bytes.extend_from_slice(&size.to_le_bytes());
            bytes.extend_from_slice(b"sfbk");
            assert_eq!(
                scan(&bytes),
                Err(SoundFontError::Truncated {
                    chunk: "RIFF".to_string()
                })
            );
        }
    }

    #[test]
    fn test_malformed_preset_table() {
        let mut body = b"sfbk".to_vec();
        body.extend(list(b"pdta", &[chunk(b"phdr", &[0; 40])]));
        let bytes = chunk(b"RIFF", &body);
        assert_eq!(
            scan(&bytes),
            Err(SoundFontError::MalformedPresetTable(40))
        );
    }
}
