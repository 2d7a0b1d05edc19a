use crate::scoreboard::MismatchRecord;
use crate::trigger::Phase;
use thiserror::Error;

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Everything that can stop (or, for `UndefinedSignal`, merely skip) a
/// verification step.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarnessError {
    #[error("{what} {value:#x} does not fit in {width} bits")]
    OutOfRange {
        what: &'static str,
        value: u64,
        width: u8,
    },

    #[error("read observed at tick {tick} on address {address:#x} (queue '{queue}') with no expected write")]
    Underflow {
        queue: String,
        address: u32,
        observed: u32,
        tick: u64,
    },

    #[error("{0}")]
    Mismatch(Box<MismatchRecord>),

    #[error("'{condition}' did not hold within {max_ticks} ticks (gave up at tick {tick})")]
    Timeout {
        condition: String,
        max_ticks: u64,
        tick: u64,
    },

    #[error("signal '{signal}' is unresolved: {bits}")]
    UndefinedSignal { signal: String, bits: String },

    #[error("queue '{queue}' is at its capacity of {capacity}")]
    Overflow { queue: String, capacity: usize },

    #[error("{action} attempted during {actual:?} phase at tick {tick}")]
    PhaseViolation {
        action: &'static str,
        actual: Phase,
        tick: u64,
    },

    #[error("coverage bin '{0}' was not declared")]
    UnknownBin(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("report output failed: {0}")]
    Report(String),
}

impl HarnessError {
    /// Fatal errors end the running scenario. An undefined signal only skips
    /// the sample it was found in.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, HarnessError::UndefinedSignal { .. })
    }

    /// Short name used in reports and JUnit failure types.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::OutOfRange { .. } => "OutOfRange",
            HarnessError::Underflow { .. } => "Underflow",
            HarnessError::Mismatch(_) => "Mismatch",
            HarnessError::Timeout { .. } => "Timeout",
            HarnessError::UndefinedSignal { .. } => "UndefinedSignal",
            HarnessError::Overflow { .. } => "Overflow",
            HarnessError::PhaseViolation { .. } => "PhaseViolation",
            HarnessError::UnknownBin(_) => "UnknownBin",
            HarnessError::Config(_) => "Config",
            HarnessError::Report(_) => "Report",
        }
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(err: serde_json::Error) -> Self {
        HarnessError::Config(err.to_string())
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(err: std::io::Error) -> Self {
        HarnessError::Report(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_undefined_signal_is_recoverable() {
        let undefined = HarnessError::UndefinedSignal {
            signal: "read_data".into(),
            bits: "xxxx".into(),
        };
        assert!(!undefined.is_fatal());
        assert!(HarnessError::Timeout {
            condition: "ready".into(),
            max_ticks: 4,
            tick: 9
        }
        .is_fatal());
        assert_eq!(undefined.kind(), "UndefinedSignal");
    }

    #[test]
    fn out_of_range_message_names_the_width() {
        let err = HarnessError::OutOfRange {
            what: "data",
            value: 0x1ff,
            width: 8,
        };
        assert_eq!(err.to_string(), "data 0x1ff does not fit in 8 bits");
    }
}
