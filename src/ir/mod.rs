//! Three-address intermediate representation.
//!
//! A function is a list of basic blocks; a block is a label plus straight-line
//! instructions. Operands are plain strings: variable names survive from the
//! source, temporaries are `t0, t1, ...`, literals keep their source text, and
//! jump targets are block labels. The `Display` impls back the `--ir` listing.

use std::fmt;

use crate::ast::{Parameter, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    Neg,
    Not,
    Assign,
    Jump,
    JumpIf,
    JumpIfNot,
    Return,
    Label,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Eq => "EQ",
            Opcode::Neq => "NEQ",
            Opcode::Lt => "LT",
            Opcode::Gt => "GT",
            Opcode::Le => "LE",
            Opcode::Ge => "GE",
            Opcode::Neg => "NEG",
            Opcode::Not => "NOT",
            Opcode::Assign => "ASSIGN",
            Opcode::Jump => "JUMP",
            Opcode::JumpIf => "JUMP_IF",
            Opcode::JumpIfNot => "JUMP_IF_NOT",
            Opcode::Return => "RETURN",
            Opcode::Label => "LABEL",
        };
        write!(f, "{}", name)
    }
}

/// One three-address instruction. Fields an opcode does not use stay `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub result: Option<String>,
    pub operand1: Option<String>,
    pub operand2: Option<String>,
}

impl Instruction {
    pub fn new(
        opcode: Opcode,
        result: Option<String>,
        operand1: Option<String>,
        operand2: Option<String>,
    ) -> Self {
        Instruction {
            opcode,
            result,
            operand1,
            operand2,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for field in [&self.result, &self.operand1, &self.operand2] {
            if let Some(value) = field {
                write!(f, " {}", value)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub label: String,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> Self {
        BasicBlock {
            label: label.into(),
            instructions: Vec::new(),
        }
    }

    /// True if the block ends by leaving (jump or return), so emission adds
    /// no fallthrough.
    pub fn ends_with_transfer(&self) -> bool {
        matches!(
            self.instructions.last(),
            Some(Instruction {
                opcode: Opcode::Jump | Opcode::JumpIf | Opcode::JumpIfNot | Opcode::Return,
                ..
            })
        )
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for instruction in &self.instructions {
            writeln!(f, "    {}", instruction)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    pub parameters: Vec<Parameter>,
    pub blocks: Vec<BasicBlock>,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {} {}(", self.return_type, self.name)?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", param.ty, param.name)?;
        }
        writeln!(f, "):")?;
        for block in &self.blocks {
            write!(f, "{}", block)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub functions: Vec<Function>,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, function) in self.functions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", function)?;
        }
        Ok(())
    }
}
