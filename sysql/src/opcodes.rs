///
/// Opcode catalog for program-based type inference.
///
/// Maps a VDBE opcode name to the register that receives its result and the
/// column type that result usually carries. Coverage tracks the bundled
/// engine version; an opcode missing here simply leaves its register untyped.
///
/// The mapping ignores operand types, so some results are mistyped:
///
/// - `AggStep`/`AggStep1` are always BIGINT, so `max(path)` over a TEXT
///   column reports BIGINT
/// - `Add`, `Subtract`, `Multiply` and `Remainder` are always BIGINT, so
///   `1.5 * size` reports BIGINT
///
/// Declared column types take precedence, so these only affect expression
/// columns.
///

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::columns::ColumnType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    P1,
    P2,
    P3,
}

impl Register {
    /// Column name of this register in `EXPLAIN` output.
    pub fn column_name(self) -> &'static str {
        match self {
            Register::P1 => "p1",
            Register::P2 => "p2",
            Register::P3 => "p3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub register: Register,
    pub column_type: ColumnType,
}

impl Opcode {
    const fn new(register: Register, column_type: ColumnType) -> Self {
        Self {
            register,
            column_type,
        }
    }
}

pub static SQL_OPCODES: LazyLock<HashMap<&'static str, Opcode>> = LazyLock::new(|| {
    use ColumnType::*;
    use Register::*;

    HashMap::from([
        // Results in P3
        ("Concat", Opcode::new(P3, Text)),
        ("AggStep", Opcode::new(P3, BigInt)),
        ("AggStep1", Opcode::new(P3, BigInt)),
        ("BitAnd", Opcode::new(P3, BigInt)),
        ("BitOr", Opcode::new(P3, BigInt)),
        ("ShiftLeft", Opcode::new(P3, BigInt)),
        ("ShiftRight", Opcode::new(P3, BigInt)),
        ("Add", Opcode::new(P3, BigInt)),
        ("Subtract", Opcode::new(P3, BigInt)),
        ("Multiply", Opcode::new(P3, BigInt)),
        ("Remainder", Opcode::new(P3, BigInt)),
        ("Divide", Opcode::new(P3, Double)),
        ("Or", Opcode::new(P3, Integer)),
        ("And", Opcode::new(P3, Integer)),
        // Results in P2
        ("Count", Opcode::new(P2, BigInt)),
        ("Int64", Opcode::new(P2, BigInt)),
        ("BitNot", Opcode::new(P2, BigInt)),
        ("Integer", Opcode::new(P2, Integer)),
        ("Not", Opcode::new(P2, Integer)),
        ("String", Opcode::new(P2, Text)),
        ("String8", Opcode::new(P2, Text)),
        ("Real", Opcode::new(P2, Double)),
        ("Blob", Opcode::new(P2, Blob)),
    ])
});

/// Opcodes that copy register P1 into register P2.
pub const COPY_OPCODES: &[&str] = &["Copy", "SCopy", "IntCopy"];

pub fn lookup(opcode: &str) -> Option<Opcode> {
    SQL_OPCODES.get(opcode).copied()
}

pub fn is_copy(opcode: &str) -> bool {
    COPY_OPCODES.contains(&opcode)
}
