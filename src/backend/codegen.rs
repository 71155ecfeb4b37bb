//! IR to NASM x86-64 text emission.
//!
//! Every variable and temporary lives in a stack slot; instructions load into
//! rax, operate, and store back. The emitter is deliberately tolerant of
//! malformed IR: a jump without a target falls back to label inference, a
//! conditional jump without a condition reuses the last written location, and
//! an operand nobody allocated gets a slot on the spot.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;

use crate::error::{CompileError, InternalError};
use crate::ir::{BasicBlock, Function, Instruction, Opcode, Program};

const PARAM_REGS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

pub struct CodeGenerator {
    current_function: String,
    current_block_label: String,
    stack_offset: i64,
    var_offsets: HashMap<String, i64>,
    block_labels: Vec<String>,
    block_index: HashMap<String, usize>,
    labels: HashSet<String>,
    last_written_loc: Option<String>,
}

fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

impl CodeGenerator {
    pub fn new() -> Self {
        CodeGenerator {
            current_function: String::new(),
            current_block_label: String::new(),
            stack_offset: 0,
            var_offsets: HashMap::new(),
            block_labels: Vec::new(),
            block_index: HashMap::new(),
            labels: HashSet::new(),
            last_written_loc: None,
        }
    }

    /// Renders the whole program as NASM text.
    pub fn generate(&mut self, program: &Program) -> Result<String, CompileError> {
        let mut out = String::new();
        self.emit_program(program, &mut out)?;
        Ok(out)
    }

    /// Renders the program and writes it to `path`.
    pub fn write_to_file(&mut self, program: &Program, path: &Path) -> Result<(), CompileError> {
        let text = self.generate(program)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    fn emit_program(&mut self, program: &Program, out: &mut String) -> Result<(), InternalError> {
        writeln!(out, "section .data")?;
        writeln!(out, "section .text")?;
        writeln!(out, "global _start")?;
        writeln!(out, "_start:")?;
        writeln!(out, "    call main")?;
        writeln!(out, "    mov rdi, rax")?;
        writeln!(out, "    mov rax, 60")?;
        writeln!(out, "    syscall")?;
        writeln!(out)?;

        for function in &program.functions {
            self.emit_function(function, out)?;
        }
        Ok(())
    }

    fn emit_function(&mut self, func: &Function, out: &mut String) -> Result<(), InternalError> {
        self.current_function = func.name.clone();
        self.stack_offset = 0;
        self.var_offsets.clear();
        self.block_labels.clear();
        self.block_index.clear();
        self.labels.clear();
        self.last_written_loc = None;

        for (i, block) in func.blocks.iter().enumerate() {
            self.block_labels.push(block.label.clone());
            self.block_index.insert(block.label.clone(), i);
            self.labels.insert(block.label.clone());
        }

        self.allocate_stack(func);

        writeln!(out, "{}:", func.name)?;
        writeln!(out, "    push rbp")?;
        writeln!(out, "    mov rbp, rsp")?;
        if self.stack_offset > 0 {
            writeln!(out, "    sub rsp, {}", self.stack_offset)?;
        }

        for (i, param) in func.parameters.iter().enumerate() {
            // Beyond six parameters the System V ABI switches to the caller's
            // stack, which this emitter does not model.
            if i < PARAM_REGS.len() {
                writeln!(
                    out,
                    "    mov [rbp - {}], {}",
                    self.var_offsets[&param.name], PARAM_REGS[i]
                )?;
            }
        }

        for block in &func.blocks {
            self.emit_block(block, out)?;
        }

        writeln!(out, "{}_epilogue:", self.current_function)?;
        writeln!(out, "    leave")?;
        writeln!(out, "    ret")?;
        writeln!(out)?;
        Ok(())
    }

    fn emit_block(&mut self, block: &BasicBlock, out: &mut String) -> Result<(), InternalError> {
        self.current_block_label = block.label.clone();
        writeln!(out, "{}:", block.label)?;
        for instruction in &block.instructions {
            self.emit_instruction(instruction, out)?;
        }

        if !block.ends_with_transfer() {
            let idx = self.block_index[&self.current_block_label];
            if idx + 1 < self.block_labels.len() {
                writeln!(out, "    jmp {}", self.block_labels[idx + 1])?;
            }
        }
        Ok(())
    }

    fn emit_instruction(
        &mut self,
        instr: &Instruction,
        out: &mut String,
    ) -> Result<(), InternalError> {
        let res_loc = self.get_loc(instr.result.as_deref());
        let mut op1_loc = self.get_loc(instr.operand1.as_deref());
        let op2_loc = self.get_loc(instr.operand2.as_deref());

        if matches!(instr.opcode, Opcode::JumpIf | Opcode::JumpIfNot) && op1_loc == "0" {
            if let Some(last) = &self.last_written_loc {
                op1_loc = last.clone();
            }
        }

        match instr.opcode {
            Opcode::Assign => {
                let literal = instr
                    .operand1
                    .as_deref()
                    .filter(|text| is_numeric(text));
                if let Some(literal) = literal {
                    if res_loc.contains("[rbp") {
                        writeln!(out, "    mov qword {}, {}", res_loc, literal)?;
                    } else {
                        writeln!(out, "    mov {}, {}", res_loc, literal)?;
                    }
                } else {
                    writeln!(out, "    mov rax, {}", op1_loc)?;
                    writeln!(out, "    mov {}, rax", res_loc)?;
                }
            }
            Opcode::Add | Opcode::Sub | Opcode::Mul => {
                let mnemonic = match instr.opcode {
                    Opcode::Add => "add",
                    Opcode::Sub => "sub",
                    _ => "imul",
                };
                writeln!(out, "    mov rax, {}", op1_loc)?;
                writeln!(out, "    {} rax, {}", mnemonic, op2_loc)?;
                writeln!(out, "    mov {}, rax", res_loc)?;
            }
            Opcode::Div => {
                // idiv has no immediate form, so the divisor goes through rbx.
                writeln!(out, "    mov rax, {}", op1_loc)?;
                writeln!(out, "    cqo")?;
                writeln!(out, "    mov rbx, {}", op2_loc)?;
                writeln!(out, "    idiv rbx")?;
                writeln!(out, "    mov {}, rax", res_loc)?;
            }
            Opcode::Neg => {
                writeln!(out, "    mov rax, {}", op1_loc)?;
                writeln!(out, "    neg rax")?;
                writeln!(out, "    mov {}, rax", res_loc)?;
            }
            Opcode::Not => {
                writeln!(out, "    mov rax, {}", op1_loc)?;
                writeln!(out, "    test rax, rax")?;
                writeln!(out, "    setz al")?;
                writeln!(out, "    movzx rax, al")?;
                writeln!(out, "    mov {}, rax", res_loc)?;
            }
            Opcode::Eq | Opcode::Neq | Opcode::Lt | Opcode::Gt | Opcode::Le | Opcode::Ge => {
                let set = match instr.opcode {
                    Opcode::Eq => "sete",
                    Opcode::Neq => "setne",
                    Opcode::Lt => "setl",
                    Opcode::Gt => "setg",
                    Opcode::Le => "setle",
                    _ => "setge",
                };
                writeln!(out, "    mov rax, {}", op1_loc)?;
                writeln!(out, "    cmp rax, {}", op2_loc)?;
                writeln!(out, "    {} al", set)?;
                writeln!(out, "    movzx rax, al")?;
                writeln!(out, "    mov {}, rax", res_loc)?;
            }
            Opcode::Jump => {
                let target = self.resolve_target(instr.operand1.as_deref());
                match target {
                    Some(target) => writeln!(out, "    jmp {}", target)?,
                    None => writeln!(
                        out,
                        "    ; missing jump target in {} {}",
                        self.current_function, self.current_block_label
                    )?,
                }
            }
            Opcode::JumpIf | Opcode::JumpIfNot => {
                let branch = if instr.opcode == Opcode::JumpIf {
                    "jne"
                } else {
                    "je"
                };
                writeln!(out, "    mov rax, {}", op1_loc)?;
                writeln!(out, "    cmp rax, 0")?;
                match self.resolve_target(instr.operand2.as_deref()) {
                    Some(target) => writeln!(out, "    {} {}", branch, target)?,
                    None => writeln!(
                        out,
                        "    ; missing jump target in {} {}",
                        self.current_function, self.current_block_label
                    )?,
                }
            }
            Opcode::Return => {
                if instr.operand1.is_some() {
                    writeln!(out, "    mov rax, {}", op1_loc)?;
                }
                writeln!(out, "    jmp {}_epilogue", self.current_function)?;
            }
            Opcode::Label => {
                return Err(InternalError::new(format!(
                    "LABEL pseudo-instruction reached emission in function '{}'",
                    self.current_function
                )));
            }
        }

        if instr.result.is_some()
            && !matches!(
                instr.opcode,
                Opcode::Jump | Opcode::JumpIf | Opcode::JumpIfNot | Opcode::Return
            )
        {
            self.last_written_loc = Some(res_loc);
        }
        Ok(())
    }

    /// Maps an operand name to its NASM location. Missing operand reads as the
    /// literal 0; numerals and known labels pass through; an unknown name gets
    /// a fresh slot so every mention of it agrees from here on.
    fn get_loc(&mut self, name: Option<&str>) -> String {
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            return "0".to_string();
        };
        if is_numeric(name) {
            return name.to_string();
        }
        if self.labels.contains(name) {
            return name.to_string();
        }
        if let Some(offset) = self.var_offsets.get(name) {
            return format!("[rbp - {}]", offset);
        }
        self.stack_offset += 8;
        let offset = self.stack_offset;
        self.var_offsets.insert(name.to_string(), offset);
        format!("[rbp - {}]", offset)
    }

    fn resolve_target(&self, explicit: Option<&str>) -> Option<String> {
        match explicit.filter(|t| !t.is_empty()) {
            Some(target) => Some(target.to_string()),
            None => self.infer_target_label(),
        }
    }

    /// Best-effort target for a jump with no operand: a body block goes back
    /// to its loop condition, anything else falls through to the next block.
    fn infer_target_label(&self) -> Option<String> {
        if self.current_block_label.contains("body") {
            if let Some(label) = self
                .block_labels
                .iter()
                .find(|label| label.contains("cond"))
            {
                return Some(label.clone());
            }
        }
        let idx = self.block_index[&self.current_block_label];
        self.block_labels.get(idx + 1).cloned()
    }

    /// Assigns a stack slot to every parameter and every non-numeric,
    /// non-label operand: parameters first in declaration order, then locals
    /// in sorted order, 8 bytes each, frame rounded up to 16.
    fn allocate_stack(&mut self, func: &Function) {
        let mut all_vars: HashSet<String> = HashSet::new();
        for param in &func.parameters {
            all_vars.insert(param.name.clone());
        }
        for block in &func.blocks {
            for instr in &block.instructions {
                for field in [&instr.result, &instr.operand1, &instr.operand2] {
                    if let Some(name) = field {
                        if !name.is_empty()
                            && !is_numeric(name)
                            && !self.labels.contains(name)
                        {
                            all_vars.insert(name.clone());
                        }
                    }
                }
            }
        }

        let params: Vec<String> = func.parameters.iter().map(|p| p.name.clone()).collect();
        let mut locals: Vec<String> = all_vars
            .iter()
            .filter(|v| !params.contains(v))
            .cloned()
            .collect();
        locals.sort();

        let mut offset = 0;
        for name in params.iter().chain(locals.iter()) {
            offset += 8;
            self.var_offsets.insert(name.clone(), offset);
        }

        self.stack_offset = offset;
        if self.stack_offset % 16 != 0 {
            self.stack_offset = (self.stack_offset + 15) / 16 * 16;
        }
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}
