use crate::shared::Shared;
use crate::value::SignalValue;
use std::cell::RefCell;
use std::rc::Rc;
use std::fmt;

/// Ports the harness drives. All of them are sampled by the DUT on the active
/// clock edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputPort {
    WriteEnable,
    WriteAddress,
    WriteData,
    ReadEnable,
    ReadAddress,
    /// Active low.
    ResetN,
}

/// Ports the harness only observes. Status flags are indexed by queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputPort {
    ReadData,
    ReadValid,
    Full(usize),
    Empty(usize),
}

impl InputPort {
    pub const ALL: [InputPort; 6] = [
        InputPort::WriteEnable,
        InputPort::WriteAddress,
        InputPort::WriteData,
        InputPort::ReadEnable,
        InputPort::ReadAddress,
        InputPort::ResetN,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InputPort::WriteEnable => "write_enable",
            InputPort::WriteAddress => "write_address",
            InputPort::WriteData => "write_data",
            InputPort::ReadEnable => "read_enable",
            InputPort::ReadAddress => "read_address",
            InputPort::ResetN => "reset_n",
        }
    }
}

impl fmt::Display for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputPort::ReadData => f.write_str("read_data"),
            OutputPort::ReadValid => f.write_str("read_valid"),
            OutputPort::Full(q) => write!(f, "full[{q}]"),
            OutputPort::Empty(q) => write!(f, "empty[{q}]"),
        }
    }
}

/// Narrow interface to the device under test and whatever simulates it.
///
/// The harness never looks behind this trait: it assigns input ports, reads
/// them back, reads output ports, and asks for one active clock edge per tick.
pub trait SimIf {
    /// Assigns an input port. Takes effect on the next `clock_edge`.
    fn set_value(&mut self, port: InputPort, value: u32);

    /// Current value of an input port as the simulator sees it.
    fn input_value(&self, port: InputPort) -> SignalValue;

    /// Current value of an output port. May be unresolved (`x`/`z`).
    fn output_value(&self, port: OutputPort) -> SignalValue;

    /// One active clock edge. Everything combinational and sequential settles
    /// before this returns.
    fn clock_edge(&mut self);

    fn name(&self) -> &str {
        "dut"
    }
}

/// The DUT as every harness component sees it.
pub type DutHandle = Shared<dyn SimIf>;

pub fn dut_handle<D: SimIf + 'static>(dut: D) -> DutHandle {
    let rc: Rc<RefCell<dyn SimIf>> = Rc::new(RefCell::new(dut));
    Shared::from_rc(rc)
}
