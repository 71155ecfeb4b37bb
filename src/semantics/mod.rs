pub mod analyzer;

pub use analyzer::SemanticAnalyzer;
