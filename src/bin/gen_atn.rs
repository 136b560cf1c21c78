// src/bin/gen_atn.rs
// Compile a grammar and write interpreter data for each resulting ATN.
// Usage:
//   cargo run --bin gen_atn -- path/to/T.g4 [options.json]
// writes <outputDir>/<Name>.interp.json and <outputDir>/<Name>.atn.bin

use std::{env, fs, path::Path, process};

use anyhow::Context;
use atnc::{
    atn::io::{save_atn_bin, save_interp_json},
    tool::{Tool, options::ToolOptions},
};

fn run(grammar: &Path, options: Option<&Path>) -> anyhow::Result<()> {
    let options = ToolOptions::load_or_default(options)?;
    let out_dir = options.output_dir.clone();
    let words16 = options.words16;
    let mut tool = Tool::new(options);
    let g = tool.load_grammar(grammar)?;
    println!("[gen_atn] compiling {}…", g.name);
    let compiled = tool.compile(&g).with_context(|| format!("compiling {}", g.name))?;
    if tool.errors.has_errors() {
        for d in &tool.errors.diagnostics {
            eprintln!("{d}");
        }
        anyhow::bail!("{} errors in {}", tool.errors.errors, g.name);
    }

    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    for c in &compiled {
        let json = out_dir.join(format!("{}.interp.json", c.grammar.name));
        save_interp_json(&json, &c.interpreter_data(words16)?)
            .with_context(|| format!("writing {}", json.display()))?;
        println!("[gen_atn] wrote {}", json.display());

        let bin = out_dir.join(format!("{}.atn.bin", c.grammar.name));
        save_atn_bin(&bin, &c.serialized).with_context(|| format!("writing {}", bin.display()))?;
        println!(
            "[gen_atn] wrote {} ({} states, {} ints)",
            bin.display(),
            c.built.atn.num_states(),
            c.serialized.len()
        );
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(grammar) = args.first() else {
        eprintln!("usage: gen_atn <grammar> [options.json]");
        process::exit(2);
    };
    if let Err(e) = run(Path::new(grammar), args.get(1).map(Path::new)) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
