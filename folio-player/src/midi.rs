//! MIDI channel messages as produced by the engine's MIDI generator
//!
//! Only channel-voice messages are modelled. System and meta messages are
//! not represented; `from_bytes` returns `None` for them.

use serde::{Deserialize, Serialize};

/// MIDI 1.0 status bytes
pub mod status {
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const POLY_PRESSURE: u8 = 0xA0;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_PRESSURE: u8 = 0xD0;
    pub const PITCH_BEND: u8 = 0xE0;
}

/// General MIDI percussion channel (channel 10, zero-based index 9)
pub const PERCUSSION_CHANNEL: u8 = 9;

/// MIDI event data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiEventData {
    NoteOff { note: u8, velocity: u8 },
    /// velocity 0 is decoded as NoteOff
    NoteOn { note: u8, velocity: u8 },
    PolyPressure { note: u8, pressure: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelPressure { pressure: u8 },
    /// -8192 to +8191, center = 0
    PitchBend { value: i16 },
}

/// Timed MIDI event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiEvent {
    /// Position in MIDI ticks from the start of the song
    pub tick: u32,
    /// MIDI channel (0-15)
    pub channel: u8,
    pub data: MidiEventData,
}

impl MidiEvent {
    pub fn note_on(tick: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            tick,
            channel,
            data: MidiEventData::NoteOn { note, velocity },
        }
    }

    pub fn note_off(tick: u32, channel: u8, note: u8) -> Self {
        Self {
            tick,
            channel,
            data: MidiEventData::NoteOff { note, velocity: 64 },
        }
    }

    pub fn control_change(tick: u32, channel: u8, controller: u8, value: u8) -> Self {
        Self {
            tick,
            channel,
            data: MidiEventData::ControlChange { controller, value },
        }
    }

    pub fn program_change(tick: u32, channel: u8, program: u8) -> Self {
        Self {
            tick,
            channel,
            data: MidiEventData::ProgramChange { program },
        }
    }

    pub fn is_percussion(&self) -> bool {
        self.channel == PERCUSSION_CHANNEL
    }

    /// Program number if this is a program change
    pub fn program(&self) -> Option<u8> {
        match self.data {
            MidiEventData::ProgramChange { program } => Some(program),
            _ => None,
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self.data, MidiEventData::NoteOn { .. })
    }

    /// Decode a channel-voice message
    pub fn from_bytes(tick: u32, bytes: &[u8]) -> Option<Self> {
        let (&status_byte, rest) = bytes.split_first()?;
        let channel = status_byte & 0x0F;
        let data1 = rest.first().map(|b| b & 0x7F);
        let data2 = rest.get(1).map(|b| b & 0x7F);

        let data = match (status_byte & 0xF0, data1, data2) {
            (status::NOTE_OFF, Some(note), Some(velocity)) => {
                MidiEventData::NoteOff { note, velocity }
            }
            (status::NOTE_ON, Some(note), Some(0)) => MidiEventData::NoteOff { note, velocity: 64 },
            (status::NOTE_ON, Some(note), Some(velocity)) => {
                MidiEventData::NoteOn { note, velocity }
            }
            (status::POLY_PRESSURE, Some(note), Some(pressure)) => {
                MidiEventData::PolyPressure { note, pressure }
            }
            (status::CONTROL_CHANGE, Some(controller), Some(value)) => {
                MidiEventData::ControlChange { controller, value }
            }
            (status::PROGRAM_CHANGE, Some(program), _) => MidiEventData::ProgramChange { program },
            (status::CHANNEL_PRESSURE, Some(pressure), _) => {
                MidiEventData::ChannelPressure { pressure }
            }
            (status::PITCH_BEND, Some(lsb), Some(msb)) => MidiEventData::PitchBend {
                value: (((msb as i16) << 7) | lsb as i16) - 8192,
            },
            _ => return None,
        };

        Some(Self { tick, channel, data })
    }

    /// Encode as raw MIDI bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let channel = self.channel & 0x0F;
        match self.data {
            MidiEventData::NoteOff { note, velocity } => {
                vec![status::NOTE_OFF | channel, note & 0x7F, velocity & 0x7F]
            }
            MidiEventData::NoteOn { note, velocity } => {
                vec![status::NOTE_ON | channel, note & 0x7F, velocity & 0x7F]
            }
            MidiEventData::PolyPressure { note, pressure } => {
                vec![status::POLY_PRESSURE | channel, note & 0x7F, pressure & 0x7F]
            }
            MidiEventData::ControlChange { controller, value } => {
                vec![status::CONTROL_CHANGE | channel, controller & 0x7F, value & 0x7F]
            }
            MidiEventData::ProgramChange { program } => {
                vec![status::PROGRAM_CHANGE | channel, program & 0x7F]
            }
            MidiEventData::ChannelPressure { pressure } => {
                vec![status::CHANNEL_PRESSURE | channel, pressure & 0x7F]
            }
            MidiEventData::PitchBend { value } => {
                let bent = (value as i32 + 8192).clamp(0, 16383) as u16;
                vec![
                    status::PITCH_BEND | channel,
                    (bent & 0x7F) as u8,
                    ((bent >> 7) & 0x7F) as u8,
                ]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_program_change() {
        let event = MidiEvent::from_bytes(480, &[0xC3, 25]).unwrap();
        assert_eq!(event.channel, 3);
        assert_eq!(event.program(), Some(25));
        assert_eq!(event.tick, 480);
        assert_eq!(event.to_bytes(), vec![0xC3, 25]);
    }

    #[test]
    fn test_note_on_zero_velocity_is_note_off() {
        let event = MidiEvent::from_bytes(0, &[0x99, 36, 0]).unwrap();
        assert!(event.is_percussion());
        assert!(matches!(event.data, MidiEventData::NoteOff { note: 36, .. }));
    }

    #[test]
    fn test_pitch_bend_center() {
        let event = MidiEvent::from_bytes(0, &[0xE0, 0x00, 0x40]).unwrap();
        assert_eq!(event.data, MidiEventData::PitchBend { value: 0 });
        assert_eq!(event.to_bytes(), vec![0xE0, 0x00, 0x40]);
    }

    #[test]
    fn test_reject_truncated_and_system() {
        assert!(MidiEvent::from_bytes(0, &[]).is_none());
        assert!(MidiEvent::from_bytes(0, &[0x90, 60]).is_none());
        assert!(MidiEvent::from_bytes(0, &[0xF8]).is_none());
    }
}
