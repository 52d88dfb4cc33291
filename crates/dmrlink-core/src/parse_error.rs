use std::fmt;

/// Parse failure taxonomy for bit-level PDU and envelope decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErr {
    BufferEnded { field: Option<&'static str> },
    InvalidValue { field: &'static str, value: u64 },
    InconsistentLength { expected: usize, found: usize },
    Inconsistency { field: &'static str, reason: &'static str },
    UnknownTag { tag: [u8; 4] },
}

impl fmt::Display for ParseErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErr::BufferEnded { field } => {
                write!(f, "buffer ended while reading {}", field.unwrap_or("<unnamed>"))
            }
            ParseErr::InvalidValue { field, value } => {
                write!(f, "invalid value {} for {}", value, field)
            }
            ParseErr::InconsistentLength { expected, found } => {
                write!(f, "inconsistent length: expected {}, found {}", expected, found)
            }
            ParseErr::Inconsistency { field, reason } => {
                write!(f, "inconsistent {}: {}", field, reason)
            }
            ParseErr::UnknownTag { tag } => {
                write!(f, "unknown datagram tag {:02X?}", tag)
            }
        }
    }
}

impl std::error::Error for ParseErr {}

/// Checks a value against an expected constant; returns ParseErr::InvalidValue otherwise.
#[macro_export]
macro_rules! expect_value {
    ($value:ident, $expected:expr) => {
        $crate::expect_value!(@inner $value, $expected, stringify!($value))
    };
    ($value:expr, $expected:expr, $field:expr) => {
        $crate::expect_value!(@inner $value, $expected, $field)
    };

    (@inner $value:expr, $expected:expr, $field:expr) => {{
        let val = $value;
        if val == $expected {
            Ok(())
        } else {
            Err($crate::parse_error::ParseErr::InvalidValue {
                field: $field,
                value: val.into(),
            })
        }
    }};
}
