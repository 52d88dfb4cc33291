use std::fmt;

/// DMR subscriber or talkgroup id. 24 bits on the air interface; values
/// above [`DMR_ID_MAX`] never appear in a valid burst.
pub type DmrId = u32;

/// Largest id representable in the 24-bit LC address fields.
pub const DMR_ID_MAX: DmrId = 0x00FF_FFFF;

/// Call-flow type: group call or private (unit-to-unit) call.
/// Maps directly onto the FLCO field of a Full LC.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum CallType {
    #[default]
    Group,
    Private,
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallType::Group => write!(f, "group"),
            CallType::Private => write!(f, "private"),
        }
    }
}

/// One of the two logical channels time-multiplexed on a DMR carrier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Timeslot {
    #[default]
    Slot1,
    Slot2,
}

impl Timeslot {
    /// Wire representation in the DMRD envelope bits field (0 = TS1, 1 = TS2).
    pub fn to_bit(self) -> u8 {
        match self {
            Timeslot::Slot1 => 0,
            Timeslot::Slot2 => 1,
        }
    }

    pub fn from_bit(bit: u8) -> Self {
        if bit == 0 { Timeslot::Slot1 } else { Timeslot::Slot2 }
    }

    /// Human-facing slot number (1 or 2).
    pub fn number(self) -> u8 {
        match self {
            Timeslot::Slot1 => 1,
            Timeslot::Slot2 => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Timeslot::Slot1),
            2 => Some(Timeslot::Slot2),
            _ => None,
        }
    }
}

impl fmt::Display for Timeslot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TS{}", self.number())
    }
}

/// Network-identifying colour code carried in the slot-type field, 0..=15.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ColourCode(u8);

impl ColourCode {
    pub fn new(value: u8) -> Option<Self> {
        if value <= 15 { Some(ColourCode(value)) } else { None }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for ColourCode {
    fn default() -> Self {
        ColourCode(1)
    }
}

impl fmt::Display for ColourCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CC{}", self.0)
    }
}
