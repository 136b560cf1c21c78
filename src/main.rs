// src/main.rs
// Compile a grammar and print the serialized-ATN dump plus diagnostics.
// Usage:
//   cargo run -- path/to/T.g4 [options.json]

use std::{env, path::Path, process};

use anyhow::Context;
use atnc::tool::{Tool, options::ToolOptions};

fn run(grammar: &Path, options: Option<&Path>) -> anyhow::Result<bool> {
    let options = ToolOptions::load_or_default(options)?;
    let mut tool = Tool::new(options);
    let g = tool.load_grammar(grammar)?;
    let compiled = tool.compile(&g).with_context(|| format!("compiling {}", g.name))?;
    for c in &compiled {
        println!("[atnc] {} ({} entry rules)", c.grammar.name, c.built.entry_rules);
        print!("{}", c.describe()?);
    }
    for d in &tool.errors.diagnostics {
        eprintln!("{d}");
    }
    println!("[atnc] {} errors, {} warnings", tool.errors.errors, tool.errors.warnings);
    Ok(!tool.errors.has_errors())
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(grammar) = args.first() else {
        eprintln!("usage: atnc <grammar> [options.json]");
        process::exit(2);
    };
    match run(Path::new(grammar), args.get(1).map(Path::new)) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}
