//! Synthesizer instrument selection
//!
//! Switching instrument means rewriting every program change in the
//! engine's generated MIDI stream. The percussion channel keeps its drum
//! kit: General MIDI reserves channel index 9 for it.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use folio_common::db::settings::DEFAULT_INSTRUMENT;

use crate::error::PlayerError;
use crate::midi::{MidiEvent, MidiEventData, PERCUSSION_CHANNEL};

/// General MIDI Level 1 instrument names, indexed by program number
pub const GM_INSTRUMENTS: [&str; 128] = [
    // Piano
    "Acoustic Grand Piano", "Bright Acoustic Piano", "Electric Grand Piano", "Honky-tonk Piano",
    "Electric Piano 1", "Electric Piano 2", "Harpsichord", "Clavinet",
    // Chromatic percussion
    "Celesta", "Glockenspiel", "Music Box", "Vibraphone",
    "Marimba", "Xylophone", "Tubular Bells", "Dulcimer",
    // Organ
    "Drawbar Organ", "Percussive Organ", "Rock Organ", "Church Organ",
    "Reed Organ", "Accordion", "Harmonica", "Tango Accordion",
    // Guitar
    "Acoustic Guitar (nylon)", "Acoustic Guitar (steel)", "Electric Guitar (jazz)", "Electric Guitar (clean)",
    "Electric Guitar (muted)", "Overdriven Guitar", "Distortion Guitar", "Guitar Harmonics",
    // Bass
    "Acoustic Bass", "Electric Bass (finger)", "Electric Bass (pick)", "Fretless Bass",
    "Slap Bass 1", "Slap Bass 2", "Synth Bass 1", "Synth Bass 2",
    // Strings
    "Violin", "Viola", "Cello", "Contrabass",
    "Tremolo Strings", "Pizzicato Strings", "Orchestral Harp", "Timpani",
    // Ensemble
    "String Ensemble 1", "String Ensemble 2", "Synth Strings 1", "Synth Strings 2",
    "Choir Aahs", "Voice Oohs", "Synth Voice", "Orchestra Hit",
    // Brass
    "Trumpet", "Trombone", "Tuba", "Muted Trumpet",
    "French Horn", "Brass Section", "Synth Brass 1", "Synth Brass 2",
    // Reed
    "Soprano Sax", "Alto Sax", "Tenor Sax", "Baritone Sax",
    "Oboe", "English Horn", "Bassoon", "Clarinet",
    // Pipe
    "Piccolo", "Flute", "Recorder", "Pan Flute",
    "Blown Bottle", "Shakuhachi", "Whistle", "Ocarina",
    // Synth lead
    "Lead 1 (square)", "Lead 2 (sawtooth)", "Lead 3 (calliope)", "Lead 4 (chiff)",
    "Lead 5 (charang)", "Lead 6 (voice)", "Lead 7 (fifths)", "Lead 8 (bass + lead)",
    // Synth pad
    "Pad 1 (new age)", "Pad 2 (warm)", "Pad 3 (polysynth)", "Pad 4 (choir)",
    "Pad 5 (bowed)", "Pad 6 (metallic)", "Pad 7 (halo)", "Pad 8 (sweep)",
    // Synth effects
    "FX 1 (rain)", "FX 2 (soundtrack)", "FX 3 (crystal)", "FX 4 (atmosphere)",
    "FX 5 (brightness)", "FX 6 (goblins)", "FX 7 (echoes)", "FX 8 (sci-fi)",
    // Ethnic
    "Sitar", "Banjo", "Shamisen", "Koto",
    "Kalimba", "Bagpipe", "Fiddle", "Shanai",
    // Percussive
    "Tinkle Bell", "Agogo", "Steel Drums", "Woodblock",
    "Taiko Drum", "Melodic Tom", "Synth Drum", "Reverse Cymbal",
    // Sound effects
    "Guitar Fret Noise", "Breath Noise", "Seashore", "Bird Tweet",
    "Telephone Ring", "Helicopter", "Applause", "Gunshot",
];

/// A General MIDI program number (0-127)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Program(u8);

impl Program {
    pub fn new(program: u8) -> Result<Self, PlayerError> {
        if program > 127 {
            return Err(PlayerError::InvalidProgram(format!(
                "{} is outside 0-127",
                program
            )));
        }
        Ok(Self(program))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        GM_INSTRUMENTS[self.0 as usize]
    }

    /// Case-insensitive exact name match, falling back to a unique
    /// substring match ("nylon" finds Acoustic Guitar (nylon))
    pub fn from_name(name: &str) -> Option<Self> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        if let Some(index) = GM_INSTRUMENTS
            .iter()
            .position(|n| n.to_lowercase() == needle)
        {
            return Some(Self(index as u8));
        }

        let mut matches = GM_INSTRUMENTS
            .iter()
            .enumerate()
            .filter(|(_, n)| n.to_lowercase().contains(&needle));
        match (matches.next(), matches.next()) {
            (Some((index, _)), None) => Some(Self(index as u8)),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Program {
    type Error = PlayerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Program::new(value)
    }
}

impl FromStr for Program {
    type Err = PlayerError;

    /// Accepts a program number or an instrument name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(number) = s.trim().parse::<u16>() {
            return u8::try_from(number)
                .map_err(|_| PlayerError::InvalidProgram(format!("{} is outside 0-127", number)))
                .and_then(Program::new);
        }
        Program::from_name(s)
            .ok_or_else(|| PlayerError::InvalidProgram(format!("unknown instrument {:?}", s)))
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

/// Instrument a tab plays with: its own default, then the site default,
/// then Acoustic Guitar (steel). Out-of-range stored values are skipped.
pub fn resolve_instrument(tab_default: Option<u8>, site_default: Option<u8>) -> Program {
    tab_default
        .and_then(|p| Program::new(p).ok())
        .or_else(|| site_default.and_then(|p| Program::new(p).ok()))
        .unwrap_or(Program(DEFAULT_INSTRUMENT))
}

/// Point every non-percussion program change at `program`
///
/// Returns how many events now carry the new program. Percussion-channel
/// events are never touched.
pub fn rewrite_programs(events: &mut [MidiEvent], program: Program) -> usize {
    let mut rewritten = 0;
    for event in events.iter_mut().filter(|e| e.channel != PERCUSSION_CHANNEL) {
        if let MidiEventData::ProgramChange { program: current } = &mut event.data {
            *current = program.number();
            rewritten += 1;
        }
    }
    rewritten
}

/// Programs selected on melodic channels
pub fn programs_in_use(events: &[MidiEvent]) -> BTreeSet<u8> {
    events
        .iter()
        .filter(|e| !e.is_percussion())
        .filter_map(MidiEvent::program)
        .collect()
}

/// Whether any note is played on the percussion channel
pub fn uses_percussion(events: &[MidiEvent]) -> bool {
    events.iter().any(|e| e.is_percussion() && e.is_note_on())
}
