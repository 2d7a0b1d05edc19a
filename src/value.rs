use crate::error::{HarnessError, HarnessResult};

/// A sampled signal value. Simulators hand back either a resolved integer or
/// a bit string which may carry `x`/`z` states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalValue {
    Int(u32),
    BitStr(String),
}

impl SignalValue {
    /// An all-`x` vector of the given width, as seen before reset.
    pub fn unknown(width: u8) -> Self {
        SignalValue::BitStr("x".repeat(width as usize))
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            SignalValue::Int(_) => true,
            SignalValue::BitStr(bits) => {
                let digits = strip_bits(bits);
                !digits.is_empty() && digits.chars().all(|c| c == '0' || c == '1')
            }
        }
    }

    /// Resolves to an integer, or `UndefinedSignal` if any bit is `x`/`z`.
    pub fn to_u32(&self, signal: &str) -> HarnessResult<u32> {
        match self {
            SignalValue::Int(v) => Ok(*v),
            SignalValue::BitStr(bits) => {
                if !self.is_resolved() {
                    return Err(HarnessError::UndefinedSignal {
                        signal: signal.to_string(),
                        bits: bits.clone(),
                    });
                }
                u32::from_str_radix(&strip_bits(bits), 2).map_err(|_| HarnessError::UndefinedSignal {
                    signal: signal.to_string(),
                    bits: bits.clone(),
                })
            }
        }
    }

    pub fn to_bool(&self, signal: &str) -> HarnessResult<bool> {
        Ok(self.to_u32(signal)? != 0)
    }
}

fn strip_bits(bits: &str) -> String {
    bits.trim_start_matches("0b").replace('_', "").to_ascii_lowercase()
}

impl From<u32> for SignalValue {
    fn from(v: u32) -> Self {
        SignalValue::Int(v)
    }
}

impl From<bool> for SignalValue {
    fn from(v: bool) -> Self {
        SignalValue::Int(v as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_strings_resolve_when_fully_known() {
        let v = SignalValue::BitStr("0b0001_0010".into());
        assert!(v.is_resolved());
        assert_eq!(v.to_u32("read_data").unwrap(), 0x12);
    }

    #[test]
    fn x_and_z_are_undefined() {
        for bits in ["xxxx", "10z1", ""] {
            let err = SignalValue::BitStr(bits.into()).to_u32("read_data").unwrap_err();
            assert!(matches!(err, HarnessError::UndefinedSignal { .. }), "{bits}");
        }
        assert!(!SignalValue::unknown(8).is_resolved());
    }
}
