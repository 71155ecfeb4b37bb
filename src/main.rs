//  src/main.rs

use clap::Parser as ClapParser;
use minic::backend::{CodeGenerator, IrGenerator};
use minic::error::CompileError;
use minic::lexer::{LexMode, Lexer, Token};
use minic::parser as McParser;
use minic::semantics::SemanticAnalyzer;
use std::fs;
use std::io;
use std::path::PathBuf;

/// A miniC compiler targeting NASM x86-64, written in Rust.
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Stop after lexing and print the token stream.
    #[arg(long)]
    lex: bool,
    /// Stop after parsing and print the AST.
    #[arg(long)]
    parse: bool,
    /// Stop after semantic analysis.
    #[arg(long)]
    check: bool,
    /// Stop after IR generation and print the basic blocks.
    #[arg(long)]
    ir: bool,
    /// Treat blocks as indentation-delimited instead of brace-delimited.
    #[arg(long)]
    indent: bool,
    /// Output path for the assembly file (defaults to the input with a .s extension).
    #[arg(short, long)]
    output: Option<PathBuf>,
    input_file: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run_pipeline(&cli) {
        eprintln!("\nCompilation failed: {}", e);
        std::process::exit(1);
    }
}

fn run_pipeline(cli: &Cli) -> Result<(), CompileError> {
    let input_path = &cli.input_file;
    if !input_path.exists() {
        return Err(CompileError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Input file not found: {}", input_path.display()),
        )));
    }
    let source_code = fs::read_to_string(input_path)?;

    // --- STAGE 1: LEXING ---
    println!("1. Lexing {}...", input_path.display());
    let mode = if cli.indent {
        LexMode::Indentation
    } else {
        LexMode::Braces
    };
    let tokens: Vec<Token> = Lexer::with_mode(&source_code, mode).tokenize()?;
    println!("   ✓ Lexing successful, found {} tokens.", tokens.len());
    if cli.lex {
        println!(
            "--- Generated Tokens ---\n{:#?}\n------------------------",
            tokens
        );
        println!("\nHalting as requested by --lex.");
        return Ok(());
    }

    // --- STAGE 2: PARSING ---
    println!("\n2. Parsing tokens into Abstract Syntax Tree (AST)...");
    let mut parser = McParser::Parser::new(&tokens);
    let ast = parser.parse()?;
    println!("   ✓ Parsing successful.");
    if cli.parse {
        println!("--- Generated AST ---\n{:#?}\n---------------------", ast);
        println!("\nHalting as requested by --parse.");
        return Ok(());
    }

    // --- STAGE 3: SEMANTIC ANALYSIS ---
    println!("\n3. Analyzing the AST...");
    SemanticAnalyzer::new().analyze(&ast)?;
    println!("   ✓ Analysis successful.");
    if cli.check {
        println!("\nHalting as requested by --check.");
        return Ok(());
    }

    // --- STAGE 4: IR GENERATION ---
    println!("\n4. Lowering the AST into three-address IR...");
    let ir = IrGenerator::new().generate(&ast)?;
    println!("   ✓ IR generation successful.");
    if cli.ir {
        println!("--- Generated IR ---\n{}--------------------", ir);
        println!("\nHalting as requested by --ir.");
        return Ok(());
    }

    // --- STAGE 5: CODE GENERATION ---
    println!("\n5. Emitting NASM assembly...");
    let output_path = match &cli.output {
        Some(path) => path.clone(),
        None => input_path.with_extension("s"),
    };
    CodeGenerator::new().write_to_file(&ir, &output_path)?;
    println!(
        "   ✓ Assembly code emission complete: {}",
        output_path.display()
    );

    println!(
        "\n✅ Success! Assembly written to: {}",
        output_path.display()
    );

    Ok(())
}
