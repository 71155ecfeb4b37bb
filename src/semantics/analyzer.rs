//! Scope-aware semantic analysis.
//!
//! Walks the AST with a stack of lexical scopes, checking declarations before
//! use, rejecting same-scope redeclaration, and inferring expression types.
//! The walk is read-only: a valid program passes through unchanged and the
//! analyzer can run any number of times with the same verdict.

use std::collections::HashMap;

use crate::ast::{Expr, Function, Program, Stmt, Type, UnaryOp};
use crate::error::SemanticError;

pub struct SemanticAnalyzer {
    /// Innermost scope is the last entry.
    scopes: Vec<HashMap<String, Type>>,
    /// Function name to declared return type, filled before any body is
    /// checked so order of definition never matters.
    functions: HashMap<String, Type>,
    current_return_type: Type,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        SemanticAnalyzer {
            scopes: Vec::new(),
            functions: HashMap::new(),
            current_return_type: Type::Void,
        }
    }

    pub fn analyze(&mut self, program: &Program) -> Result<(), SemanticError> {
        self.scopes.clear();
        self.functions.clear();
        for function in &program.functions {
            if self
                .functions
                .insert(function.name.clone(), function.return_type)
                .is_some()
            {
                return Err(SemanticError::new(format!(
                    "function '{}' is redeclared",
                    function.name
                )));
            }
        }
        for function in &program.functions {
            self.analyze_function(function)?;
        }
        Ok(())
    }

    fn analyze_function(&mut self, function: &Function) -> Result<(), SemanticError> {
        self.current_return_type = function.return_type;
        self.push_scope();
        for param in &function.parameters {
            if param.ty == Type::Void {
                return Err(SemanticError::new(format!(
                    "parameter '{}' of function '{}' cannot have type void",
                    param.name, function.name
                )));
            }
            if self.declare(&param.name, param.ty).is_err() {
                return Err(SemanticError::new(format!(
                    "parameter '{}' of function '{}' is redeclared",
                    param.name, function.name
                )));
            }
        }
        let result = self.analyze_statements(&function.body);
        self.pop_scope();
        result
    }

    fn analyze_statements(&mut self, statements: &[Stmt]) -> Result<(), SemanticError> {
        for statement in statements {
            self.analyze_statement(statement)?;
        }
        Ok(())
    }

    fn analyze_statement(&mut self, statement: &Stmt) -> Result<(), SemanticError> {
        match statement {
            Stmt::VarDecl { ty, name, init } => {
                if *ty == Type::Void {
                    return Err(SemanticError::new(format!(
                        "variable '{}' cannot have type void",
                        name
                    )));
                }
                if let Some(init) = init {
                    let init_ty = self.infer_type(init)?;
                    if init_ty != *ty {
                        return Err(SemanticError::new(format!(
                            "cannot initialize variable '{}' of type {} with a value of type {}",
                            name, ty, init_ty
                        )));
                    }
                }
                if self.declare(name, *ty).is_err() {
                    return Err(SemanticError::new(format!(
                        "variable '{}' is redeclared in the same scope",
                        name
                    )));
                }
                Ok(())
            }
            Stmt::Assign { name, value } => {
                let Some(declared) = self.lookup(name) else {
                    return Err(SemanticError::new(format!(
                        "variable '{}' is not declared",
                        name
                    )));
                };
                let value_ty = self.infer_type(value)?;
                if value_ty != declared {
                    return Err(SemanticError::new(format!(
                        "cannot assign a value of type {} to variable '{}' of type {}",
                        value_ty, name, declared
                    )));
                }
                Ok(())
            }
            Stmt::Return(value) => {
                let value_ty = match value {
                    Some(expr) => self.infer_type(expr)?,
                    None => Type::Void,
                };
                if value_ty != self.current_return_type {
                    return Err(SemanticError::new(format!(
                        "return type mismatch: expected {}, found {}",
                        self.current_return_type, value_ty
                    )));
                }
                Ok(())
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(condition)?;
                self.push_scope();
                let then_result = self.analyze_statements(then_branch);
                self.pop_scope();
                then_result?;
                self.push_scope();
                let else_result = self.analyze_statements(else_branch);
                self.pop_scope();
                else_result
            }
            Stmt::While { condition, body } => {
                self.check_condition(condition)?;
                self.push_scope();
                let result = self.analyze_statements(body);
                self.pop_scope();
                result
            }
        }
    }

    fn check_condition(&self, condition: &Expr) -> Result<(), SemanticError> {
        let ty = self.infer_type(condition)?;
        if ty != Type::Int {
            return Err(SemanticError::new(format!(
                "condition must have type int, found {}",
                ty
            )));
        }
        Ok(())
    }

    fn infer_type(&self, expr: &Expr) -> Result<Type, SemanticError> {
        match expr {
            Expr::IntLiteral(_) => Ok(Type::Int),
            Expr::StringLiteral(_) => Ok(Type::String),
            Expr::Identifier(name) => self.lookup(name).ok_or_else(|| {
                SemanticError::new(format!("variable '{}' is not declared", name))
            }),
            Expr::Unary { op, operand } => {
                let operand_ty = self.infer_type(operand)?;
                if operand_ty != Type::Int {
                    let symbol = match op {
                        UnaryOp::Negate => "-",
                        UnaryOp::Not => "!",
                    };
                    return Err(SemanticError::new(format!(
                        "unary '{}' requires an int operand, found {}",
                        symbol, operand_ty
                    )));
                }
                Ok(Type::Int)
            }
            Expr::Binary { op, left, right } => {
                let left_ty = self.infer_type(left)?;
                let right_ty = self.infer_type(right)?;
                if left_ty != Type::Int || right_ty != Type::Int {
                    let kind = if op.is_arithmetic() {
                        "arithmetic"
                    } else {
                        "comparison"
                    };
                    return Err(SemanticError::new(format!(
                        "{} operator requires int operands, found {} and {}",
                        kind, left_ty, right_ty
                    )));
                }
                Ok(Type::Int)
            }
        }
    }

    // --- Scope stack ---

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Adds a binding to the innermost scope. Fails if that scope already has
    /// one for the same name; shadowing an outer scope is allowed.
    fn declare(&mut self, name: &str, ty: Type) -> Result<(), ()> {
        let scope = self
            .scopes
            .last_mut()
            .expect("declare is only called inside a function scope");
        if scope.contains_key(name) {
            return Err(());
        }
        scope.insert(name.to_string(), ty);
        Ok(())
    }

    /// Resolves a name from the innermost scope outward.
    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
