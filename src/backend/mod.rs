pub mod codegen;
pub mod ir_gen;

pub use codegen::CodeGenerator;
pub use ir_gen::IrGenerator;
