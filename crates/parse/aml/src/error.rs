//! Error and status types for AML tree operations.

use core::fmt;

/// Errors reported by tree construction, navigation and enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmlError {
    /// A node handle was absent, stale, or of the wrong kind for the
    /// operation, or no enumeration callback was supplied.
    InvalidParameter,
    /// A fixed-argument index was outside `0..fixed_argument_count`.
    IndexOutOfRange,
    /// The target fixed-argument slot already holds a child.
    SlotOccupied,
    /// The node is already owned by a fixed-argument slot or a list.
    AlreadyAttached,
    /// The node's kind does not carry a variable-argument list.
    NoVariableList,
    /// The node is not linked where the operation expected it.
    NotFound,
    /// The arena cannot address any more nodes.
    OutOfResources,
    /// A walk reached a node deeper than the configured bound.
    DepthLimitExceeded,
    /// Parent back-references or list links are inconsistent.
    CorruptTree,
    /// A fault reported by an enumeration callback. The code is opaque to
    /// the enumerator.
    Callback(u32),
}

impl fmt::Display for AmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter => f.write_str("invalid node or missing callback"),
            Self::IndexOutOfRange => f.write_str("fixed argument index out of range"),
            Self::SlotOccupied => f.write_str("fixed argument slot already populated"),
            Self::AlreadyAttached => f.write_str("node already has an owner"),
            Self::NoVariableList => f.write_str("node kind has no variable argument list"),
            Self::NotFound => f.write_str("node is not linked at the expected position"),
            Self::OutOfResources => f.write_str("node arena exhausted"),
            Self::DepthLimitExceeded => f.write_str("tree depth limit exceeded"),
            Self::CorruptTree => f.write_str("inconsistent tree links"),
            Self::Callback(code) => write!(f, "callback signalled error {code:#x}"),
        }
    }
}

impl core::error::Error for AmlError {}

/// Side-channel status slot shared between an enumeration and its callback.
///
/// Callers initialise it to `Ok(())`. The enumerator only writes it when an
/// entry precondition fails; callbacks may write any error they detect.
pub type EnumStatus = Result<(), AmlError>;
