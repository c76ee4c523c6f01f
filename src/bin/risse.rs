//! Risse shell
//!
//! Reads structured-data literals and prints them back in canonical form.
//! With a file argument the file is read as a single value.

use risse::{Engine, ErrorKind, RuntimeError};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        // Read a data file
        run_file(&args[1]);
    } else {
        // Interactive shell
        run_repl();
    }
}

fn run_file(filename: &str) {
    let source = match std::fs::read_to_string(filename) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", filename, e);
            std::process::exit(1);
        }
    };

    let engine = Engine::new();
    match evaluate(&engine, &source) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn evaluate(engine: &Engine, source: &str) -> Result<String, RuntimeError> {
    let value = engine.eval_structured(source)?;
    Ok(engine.to_structured(&value)?.to_string())
}

/// Input that stops at end of text may continue on the next line
fn is_incomplete(error: &RuntimeError) -> bool {
    error.kind() == ErrorKind::Compile && error.message().to_string().contains("unexpected end of input")
}

fn run_repl() {
    println!("Risse - structured data shell");
    println!("Type a value such as [1, %[\"a\" => 2]] to read it back, Ctrl+D to exit.\n");

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error starting line editor: {}", e);
            std::process::exit(1);
        }
    };
    let engine = Engine::new();
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "> " } else { "... " };
        match editor.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() && line.trim().is_empty() {
                    continue;
                }
                pending.push_str(&line);
                pending.push('\n');

                match evaluate(&engine, &pending) {
                    Ok(text) => println!("{}", text),
                    Err(e) if is_incomplete(&e) => continue,
                    Err(e) => println!("Error: {}", e),
                }
                let _ = editor.add_history_entry(pending.trim_end());
                pending.clear();
            }
            Err(ReadlineError::Interrupted) => {
                pending.clear();
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }
}
