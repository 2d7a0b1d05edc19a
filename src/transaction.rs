use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TxKind {
    Write,
    Read,
}

/// One write or read as it happened on the DUT ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub kind: TxKind,
    pub address: u32,
    pub data: u32,
    pub tick: u64,
    /// `read_valid` qualifier, when the DUT has one.
    pub valid: Option<bool>,
}

impl Transaction {
    pub fn write(address: u32, data: u32, tick: u64) -> Self {
        Self {
            kind: TxKind::Write,
            address,
            data,
            tick,
            valid: None,
        }
    }

    pub fn read(address: u32, data: u32, tick: u64, valid: Option<bool>) -> Self {
        Self {
            kind: TxKind::Read,
            address,
            data,
            tick,
            valid,
        }
    }

    pub fn is_read(&self) -> bool {
        self.kind == TxKind::Read
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TxKind::Write => "WR",
            TxKind::Read => "RD",
        };
        write!(f, "@{} {kind} [{:#04x}] {:#04x}", self.tick, self.address, self.data)?;
        if self.valid == Some(false) {
            f.write_str(" (invalid)")?;
        }
        Ok(())
    }
}
