//! Request-local failure (spec §7): a bad or partially-satisfiable
//! request must never corrupt the Item Index or Reservation Overlay,
//! so it is carried as a status field in the response payload rather
//! than as an `Err` crossing the handler boundary. `ConfigFatal` and
//! `RuntimeFatal` (from [`fabric_utils`]) remain the only two ways a
//! Storage Server handler aborts its thread.

use std::fmt;

/// The outcome of a single `stor_insert`/`stor_extract` request, as
/// reported back on the wire (spec §6 `ok|missing|full`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Everything requested was moved.
    Ok,
    /// The requested kind has no entry, or the source slot was empty.
    Missing,
    /// Some amount moved, but the destination ran out of room.
    Full,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Missing => "missing",
            Self::Full => "full",
        })
    }
}

impl RequestStatus {
    /// Classifies an insert/extract outcome per spec §7's status
    /// vocabulary: nothing moved and nothing was asked for is missing,
    /// a partial transfer is full, and anything else is ok.
    #[must_use]
    pub fn classify(requested: u32, transferred: u32) -> Self {
        if requested == 0 {
            Self::Missing
        } else if transferred == 0 {
            Self::Missing
        } else if transferred < requested {
            Self::Full
        } else {
            Self::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_distinguishes_missing_full_and_ok() {
        assert_eq!(RequestStatus::classify(10, 0), RequestStatus::Missing);
        assert_eq!(RequestStatus::classify(10, 4), RequestStatus::Full);
        assert_eq!(RequestStatus::classify(10, 10), RequestStatus::Ok);
        assert_eq!(RequestStatus::classify(0, 0), RequestStatus::Missing);
    }
}
