use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// Type-of-service (IPv4) or traffic class (IPv6) byte applied to outgoing
/// peer traffic.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Tos(u8);

/// Well known names, in the order they are matched when displaying.
const NAMES: [(&str, u8); 5] = [
    ("default", 0x00),
    ("lowcost", 0x02),
    ("le", 0x04),
    ("throughput", 0x08),
    ("lowdelay", 0x10),
];

impl Tos {
    /// Lower-effort per-hop behaviour (RFC 8622), the default for peers.
    pub const LE: Tos = Tos(0x04);

    /// Creates a `Tos` from a raw byte.
    pub const fn new(value: u8) -> Self {
        Tos(value)
    }

    /// Returns the raw byte.
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for Tos {
    fn default() -> Self {
        Tos::LE
    }
}

impl FromStr for Tos {
    type Err = ConfigError;

    /// Parses a well known name (`default`, `lowcost`, `le`, `throughput`,
    /// `lowdelay`), a decimal number, or a `0x` prefixed hexadecimal number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some(&(_, value)) = NAMES.iter().find(|(name, _)| name.eq_ignore_ascii_case(s)) {
            return Ok(Tos(value));
        }

        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => s.parse::<u8>(),
        };

        parsed
            .map(Tos)
            .map_err(|_| ConfigError::InvalidTos(s.to_string()))
    }
}

impl fmt::Display for Tos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match NAMES.iter().find(|&&(_, value)| value == self.0) {
            Some((name, _)) => f.write_str(name),
            None => write!(f, "{:#04x}", self.0),
        }
    }
}
