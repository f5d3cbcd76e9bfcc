//! The `ProgramBC` bytecode model (spec §3, §4.5).
//!
//! `Program` in the teacher compiler stores its word list as a `Vec<WordDef>`
//! and resolves names with a linear scan (`Program::find_word`). `ProgramBC`
//! follows the same shape for its function table: insertion order matters
//! (spec §3 "Name ordering is insertion-driven") and the table is small
//! enough that a linear scan is the simplest correct thing, exactly as the
//! teacher does for words.

use serde::{Deserialize, Serialize};

/// A literal operand baked into an instruction. Narrower than the runtime
/// `Value` (defined in `yasn-runtime`) because only scalars can be compiled
/// constants — lists and dicts are always built at runtime via `MAKE_LIST`/
/// `MAKE_DICT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// The fixed instruction set (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    Const,
    ConstNull,
    Load,
    Store,
    GLoad,
    GStore,
    Pop,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Jmp,
    JmpFalse,
    Call,
    Ret,
    MakeList,
    MakeDict,
    IndexGet,
    IndexSet,
    Len,
    Halt,
}

/// One bytecode instruction. `args` holds whatever literal operands that
/// opcode needs (e.g. `Const` carries the pushed value, `Load`/`Store`/
/// `GLoad`/`GStore` carry a slot index as `Literal::Int`, `Jmp`/`JmpFalse`
/// carry an absolute target as `Literal::Int`, `Call` carries the callee
/// name as `Literal::Str` followed by the argument count as `Literal::Int`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: Opcode,
    pub args: Vec<Literal>,
}

impl Instruction {
    pub fn new(op: Opcode, args: Vec<Literal>) -> Self {
        Instruction { op, args }
    }

    pub fn simple(op: Opcode) -> Self {
        Instruction { op, args: Vec::new() }
    }

    /// Reads the first argument as an `i64`. Panics on malformed bytecode —
    /// callers only use this after the container decoder's invariant checks
    /// have already run.
    pub fn int_arg(&self, idx: usize) -> i64 {
        match &self.args[idx] {
            Literal::Int(i) => *i,
            other => panic!("expected integer instruction argument, got {other:?}"),
        }
    }

    pub fn str_arg(&self, idx: usize) -> &str {
        match &self.args[idx] {
            Literal::Str(s) => s,
            other => panic!("expected string instruction argument, got {other:?}"),
        }
    }
}

/// A single compiled function (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionBC {
    pub name: String,
    pub params: Vec<String>,
    pub local_count: usize,
    pub instructions: Vec<Instruction>,
}

impl FunctionBC {
    /// Checks the function-local invariants from spec §3: every local slot
    /// referenced is within `local_count`, every global slot referenced is
    /// within `global_count`, and every jump target is a valid instruction
    /// index.
    pub fn check_invariants(&self, global_count: usize) -> Result<(), String> {
        for (i, instr) in self.instructions.iter().enumerate() {
            match instr.op {
                Opcode::Load | Opcode::Store => {
                    let slot = instr.int_arg(0);
                    if slot < 0 || slot as usize >= self.local_count {
                        return Err(format!(
                            "function '{}': instruction {} references local slot {} but local_count is {}",
                            self.name, i, slot, self.local_count
                        ));
                    }
                }
                Opcode::GLoad | Opcode::GStore => {
                    let slot = instr.int_arg(0);
                    if slot < 0 || slot as usize >= global_count {
                        return Err(format!(
                            "function '{}': instruction {} references global slot {} but global_count is {}",
                            self.name, i, slot, global_count
                        ));
                    }
                }
                Opcode::Jmp | Opcode::JmpFalse => {
                    let target = instr.int_arg(0);
                    if target < 0 || target as usize >= self.instructions.len() {
                        return Err(format!(
                            "function '{}': instruction {} jumps to out-of-range target {}",
                            self.name, i, target
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// The name of the synthesized top-level function (spec §3, §4.5).
pub const ENTRY_NAME: &str = "__entry__";

/// The whole compiled program (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramBC {
    /// `(name, function)` pairs in declaration order. Does not include the
    /// entry function — that is kept separately as `entry`, matching the
    /// spec's `{ functions: map<name, FunctionBC>, entry: FunctionBC, ... }`
    /// shape (the "map" is this ordered association list; see module doc).
    pub functions: Vec<(String, FunctionBC)>,
    pub entry: FunctionBC,
    pub global_count: usize,
}

impl ProgramBC {
    pub fn find_function(&self, name: &str) -> Option<&FunctionBC> {
        self.functions.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Validates the whole-program invariants from spec §3: the entry
    /// function is named `__entry__`, its last instruction is `HALT`, and
    /// every function (including the entry) respects its own local
    /// invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.entry.name != ENTRY_NAME {
            return Err(format!(
                "entry function must be named '{}', found '{}'",
                ENTRY_NAME, self.entry.name
            ));
        }
        match self.entry.instructions.last() {
            Some(instr) if instr.op == Opcode::Halt => {}
            _ => return Err("entry function's last instruction must be HALT".to_string()),
        }
        self.entry.check_invariants(self.global_count)?;
        for (_, f) in &self.functions {
            f.check_invariants(self.global_count)?;
        }
        Ok(())
    }
}
