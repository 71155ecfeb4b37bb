//! AST to three-address IR lowering.
//!
//! Each function lowers into basic blocks. Straight-line statements append to
//! the current block; `if` opens then/else/end blocks and `while` opens
//! cond/body/end blocks, always all three, with the end block becoming the new
//! current block. Temp and label counters restart per function.

use std::collections::HashMap;

use crate::ast::{self, BinaryOp, Expr, Stmt, UnaryOp};
use crate::common::UniqueIdGenerator;
use crate::error::InternalError;
use crate::ir::{BasicBlock, Instruction, Opcode, Program};

pub struct IrGenerator {
    temp_ids: UniqueIdGenerator,
    label_ids: UniqueIdGenerator,
    /// Source name to IR operand name. Identity for now; the indirection is
    /// what a renaming pass would hook into.
    var_map: HashMap<String, String>,
    blocks: Vec<BasicBlock>,
    /// Index of the block instructions are currently appended to.
    current: usize,
}

impl IrGenerator {
    pub fn new() -> Self {
        IrGenerator {
            temp_ids: UniqueIdGenerator::new(),
            label_ids: UniqueIdGenerator::new(),
            var_map: HashMap::new(),
            blocks: Vec::new(),
            current: 0,
        }
    }

    pub fn generate(&mut self, program: &ast::Program) -> Result<Program, InternalError> {
        let mut ir_program = Program::default();
        for function in &program.functions {
            ir_program.functions.push(self.generate_function(function)?);
        }
        Ok(ir_program)
    }

    fn generate_function(
        &mut self,
        function: &ast::Function,
    ) -> Result<crate::ir::Function, InternalError> {
        self.temp_ids.reset();
        self.label_ids.reset();
        self.var_map.clear();
        self.blocks.clear();

        let entry = self.new_label("entry");
        self.blocks.push(BasicBlock::new(entry));
        self.current = 0;

        // Parameters are addressed by their source names.
        for param in &function.parameters {
            self.var_map.insert(param.name.clone(), param.name.clone());
        }

        for statement in &function.body {
            self.generate_statement(statement)?;
        }

        Ok(crate::ir::Function {
            name: function.name.clone(),
            return_type: function.return_type,
            parameters: function.parameters.clone(),
            blocks: std::mem::take(&mut self.blocks),
        })
    }

    fn generate_statement(&mut self, statement: &Stmt) -> Result<(), InternalError> {
        match statement {
            Stmt::VarDecl { name, init, .. } => {
                self.var_map.insert(name.clone(), name.clone());
                if let Some(init) = init {
                    let value = self.generate_expr(init)?;
                    self.emit(Opcode::Assign, Some(name.clone()), Some(value), None);
                }
                Ok(())
            }
            Stmt::Assign { name, value } => {
                let value = self.generate_expr(value)?;
                self.emit(Opcode::Assign, Some(name.clone()), Some(value), None);
                Ok(())
            }
            Stmt::Return(value) => {
                let operand = match value {
                    Some(expr) => Some(self.generate_expr(expr)?),
                    None => None,
                };
                self.emit(Opcode::Return, None, operand, None);
                Ok(())
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.generate_expr(condition)?;
                let then_label = self.new_label("if_then");
                let else_label = self.new_label("if_else");
                let end_label = self.new_label("if_end");

                self.emit(
                    Opcode::JumpIfNot,
                    None,
                    Some(cond),
                    Some(else_label.clone()),
                );

                self.start_block(then_label);
                for statement in then_branch {
                    self.generate_statement(statement)?;
                }
                self.emit(Opcode::Jump, None, Some(end_label.clone()), None);

                // The else block exists even when the branch is empty, so the
                // taken path of JUMP_IF_NOT always has a landing site.
                self.start_block(else_label);
                for statement in else_branch {
                    self.generate_statement(statement)?;
                }
                self.emit(Opcode::Jump, None, Some(end_label.clone()), None);

                self.start_block(end_label);
                Ok(())
            }
            Stmt::While { condition, body } => {
                let cond_label = self.new_label("while_cond");
                let body_label = self.new_label("while_body");
                let end_label = self.new_label("while_end");

                self.emit(Opcode::Jump, None, Some(cond_label.clone()), None);

                self.start_block(cond_label.clone());
                let cond = self.generate_expr(condition)?;
                self.emit(Opcode::JumpIfNot, None, Some(cond), Some(end_label.clone()));

                self.start_block(body_label);
                for statement in body {
                    self.generate_statement(statement)?;
                }
                self.emit(Opcode::Jump, None, Some(cond_label), None);

                self.start_block(end_label);
                Ok(())
            }
        }
    }

    /// Lowers an expression, returning the operand name holding its value.
    fn generate_expr(&mut self, expr: &Expr) -> Result<String, InternalError> {
        match expr {
            Expr::IntLiteral(value) => {
                let temp = self.new_temp();
                self.emit(
                    Opcode::Assign,
                    Some(temp.clone()),
                    Some(value.to_string()),
                    None,
                );
                Ok(temp)
            }
            Expr::StringLiteral(value) => {
                let temp = self.new_temp();
                self.emit(Opcode::Assign, Some(temp.clone()), Some(value.clone()), None);
                Ok(temp)
            }
            Expr::Identifier(name) => self.var_map.get(name).cloned().ok_or_else(|| {
                InternalError::new(format!(
                    "variable '{}' reached IR generation without a declaration",
                    name
                ))
            }),
            Expr::Unary { op, operand } => {
                let operand = self.generate_expr(operand)?;
                let temp = self.new_temp();
                let opcode = match op {
                    UnaryOp::Negate => Opcode::Neg,
                    UnaryOp::Not => Opcode::Not,
                };
                self.emit(opcode, Some(temp.clone()), Some(operand), None);
                Ok(temp)
            }
            Expr::Binary { op, left, right } => {
                let left = self.generate_expr(left)?;
                let right = self.generate_expr(right)?;
                let temp = self.new_temp();
                let opcode = match op {
                    BinaryOp::Add => Opcode::Add,
                    BinaryOp::Subtract => Opcode::Sub,
                    BinaryOp::Multiply => Opcode::Mul,
                    BinaryOp::Divide => Opcode::Div,
                    BinaryOp::Equal => Opcode::Eq,
                    BinaryOp::NotEqual => Opcode::Neq,
                    BinaryOp::LessThan => Opcode::Lt,
                    BinaryOp::LessOrEqual => Opcode::Le,
                    BinaryOp::GreaterThan => Opcode::Gt,
                    BinaryOp::GreaterOrEqual => Opcode::Ge,
                };
                self.emit(opcode, Some(temp.clone()), Some(left), Some(right));
                Ok(temp)
            }
        }
    }

    fn emit(
        &mut self,
        opcode: Opcode,
        result: Option<String>,
        operand1: Option<String>,
        operand2: Option<String>,
    ) {
        self.blocks[self.current]
            .instructions
            .push(Instruction::new(opcode, result, operand1, operand2));
    }

    /// Appends a fresh block and makes it current.
    fn start_block(&mut self, label: String) {
        self.blocks.push(BasicBlock::new(label));
        self.current = self.blocks.len() - 1;
    }

    fn new_temp(&mut self) -> String {
        format!("t{}", self.temp_ids.next())
    }

    fn new_label(&mut self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.label_ids.next())
    }
}

impl Default for IrGenerator {
    fn default() -> Self {
        Self::new()
    }
}
