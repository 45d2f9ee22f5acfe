use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use esvm_bytecode::Module;
use esvm_host::Context;
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser)]
#[command(name = "esvm", version, about = "esvm bytecode interpreter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a compiled bytecode module and run its entry function.
    Run {
        module: PathBuf,
        /// Print the entry function's return value after execution.
        #[arg(long)]
        print_result: bool,
    },
    /// Print the disassembly-relevant shape of a module without running it.
    Inspect {
        module: PathBuf,
        /// Emit the function table as JSON instead of a human-readable table.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { module, print_result } => run(module, print_result),
        Commands::Inspect { module, json } => inspect(module, json),
    }
}

fn load_module(path: &PathBuf) -> Result<Module> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);
    Module::read_from(&mut reader).with_context(|| format!("reading module {}", path.display()))
}

fn run(path: PathBuf, print_result: bool) -> Result<()> {
    let module = load_module(&path)?;
    tracing::info!(source = %module.source_url, "loaded module");

    let mut ctx = Context::new();
    esvm_host::load_and_run(&mut ctx, std::rc::Rc::new(module))
        .map_err(|err| anyhow::anyhow!("{err}"))?;

    if print_result {
        let top = ctx.get_top();
        if top > 0 {
            print_value(&ctx, -1);
        }
    }
    Ok(())
}

fn inspect(path: PathBuf, json: bool) -> Result<()> {
    let module = load_module(&path)?;
    if json {
        let summary: Vec<_> = module
            .functions
            .iter()
            .map(|f| {
                serde_json::json!({
                    "name": f.display_name(),
                    "param_count": f.param_count,
                    "local_count": f.local_count,
                    "register_count": f.register_count,
                    "instruction_count": f.instructions.len(),
                })
            })
            .collect();
        let doc = serde_json::json!({ "source": module.source_url, "functions": summary });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("source: {}", module.source_url);
    println!("functions: {}", module.functions.len());
    for (index, function) in module.functions.iter().enumerate() {
        println!(
            "  [{index}] {} params={} locals={} registers={} instructions={}",
            function.display_name(),
            function.param_count,
            function.local_count,
            function.register_count,
            function.instructions.len(),
        );
    }
    Ok(())
}

fn print_value(ctx: &Context, index: i32) {
    match ctx.to_string_value(index) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("<unprintable value>"),
    }
}
