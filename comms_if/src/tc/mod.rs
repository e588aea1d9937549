//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod shooter;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use thiserror::Error;

// Internal
use shooter::ShooterCmd;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the shooter executable by an operator or a script.
///
/// Telecommands are serialised as JSON, for example `{"Shooter": {"RunAtRpm": {"rpm": 3000}}}`
/// or `"MakeSafe"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Tc {
    /// Stop everything and reject further shooter commands.
    MakeSafe,

    /// Leave safe mode.
    MakeUnsafe,

    /// Execute a shooter operation.
    Shooter(ShooterCmd),
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("TC is not valid: {0:?}")]
    InvalidTc(Tc),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {

    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        let tc: Tc = serde_json::from_str(json_str)
            .map_err(TcParseError::InvalidJson)?;

        match tc {
            Tc::Shooter(cmd) if !cmd.is_valid() => Err(TcParseError::InvalidTc(tc)),
            _ => Ok(tc)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_json() {
        assert_eq!(Tc::from_json("\"MakeSafe\"").unwrap(), Tc::MakeSafe);
        assert_eq!(
            Tc::from_json(r#"{"Shooter": {"RunAtRpm": {"rpm": 3000.0}}}"#).unwrap(),
            Tc::Shooter(ShooterCmd::RunAtRpm { rpm: 3000.0 })
        );
        assert_eq!(
            Tc::from_json(r#"{"Shooter": "RunWithFeed"}"#).unwrap(),
            Tc::Shooter(ShooterCmd::RunWithFeed)
        );

        assert!(matches!(
            Tc::from_json(r#"{"Shooter": "Fly"}"#),
            Err(TcParseError::InvalidJson(_))
        ));
        assert!(matches!(
            Tc::from_json(r#"{"Shooter": {"Eject": {"duration_s": -1.0}}}"#),
            Err(TcParseError::InvalidTc(_))
        ));
    }
}
