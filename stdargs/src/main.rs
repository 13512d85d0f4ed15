use clap::{Parser, Subcommand};
use std::path::PathBuf;

use stdargs::binder::bind;
use stdargs::diag::Diagnostic;
use stdargs::error::BindError;
use stdargs::host::{ValueId, ValueStore};
use stdargs::memstore::{MemStore, SimpleLoops};
use stdargs::registry::{Registry, RegistryError};
use stdargs::spec::ParameterSpecList;
use stdargs::type_infer::ElementType;

#[derive(Debug, Clone, clap::ValueEnum)]
enum Emit {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "stdargs",
    version,
    about = "Argument-format compiler and binder for array-language built-ins"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print binder tracing to stderr
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a format string and print its canonical form
    Parse {
        format: String,

        #[arg(long, value_enum, default_value_t = Emit::Text)]
        emit: Emit,
    },
    /// Bind synthetic arguments against a format string and print the plan
    ///
    /// ARG is `_` (omitted), `?` (undefined variable), `F` (scalar),
    /// `F3x4` (array), or `L=1,2` (values).
    Bind { format: String, args: Vec<String> },
    /// Print the JSON manifest of a signature file
    Manifest { file: PathBuf },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::TRACE
    } else {
        tracing::Level::WARN
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("stdargs: error: {}", e);
        std::process::exit(2);
    }

    match cli.command {
        Command::Parse { format, emit } => parse(&format, emit),
        Command::Bind { format, args } => bind_args(&format, &args),
        Command::Manifest { file } => manifest(&file),
    }
}

fn fail(err: &BindError) -> ! {
    eprintln!("stdargs: {}", Diagnostic::from(err));
    std::process::exit(1);
}

fn parse(format: &str, emit: Emit) {
    let spec = match ParameterSpecList::parse(format) {
        Ok(s) => s,
        Err(e) => fail(&BindError::from(e)),
    };
    match emit {
        Emit::Text => println!("{}", spec),
        Emit::Json => match serde_json::to_string_pretty(&spec) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("stdargs: error: {}", e);
                std::process::exit(2);
            }
        },
    }
}

/// Build one synthetic argument in `store`.
fn make_arg(store: &mut MemStore, text: &str) -> Result<Option<ValueId>, String> {
    match text {
        "_" => return Ok(None),
        "?" => return Ok(Some(store.undefined())),
        _ => {}
    }
    let mut chars = text.chars();
    let ty = chars
        .next()
        .and_then(ElementType::from_code)
        .ok_or_else(|| format!("unknown element type in '{}'", text))?;
    let rest = chars.as_str();

    if let Some(values) = rest.strip_prefix('=') {
        let values = values
            .split(',')
            .map(|v| v.parse::<f64>().map_err(|e| format!("'{}': {}", v, e)))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Some(match values.as_slice() {
            [v] => store.scalar(ty, *v),
            _ => store.array_with(ty, &[values.len()], values),
        }));
    }
    if rest.is_empty() {
        return Ok(Some(if ty == ElementType::String {
            store.string("")
        } else {
            store.scalar(ty, 0.0)
        }));
    }
    let dims = rest
        .split('x')
        .map(|d| d.parse::<usize>().map_err(|e| format!("'{}': {}", d, e)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(store.array(ty, &dims)))
}

fn bind_args(format: &str, args: &[String]) {
    let spec = match ParameterSpecList::parse(format) {
        Ok(s) => s,
        Err(e) => fail(&BindError::from(e)),
    };

    let mut store = MemStore::new();
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        match make_arg(&mut store, arg) {
            Ok(v) => values.push(v),
            Err(e) => {
                eprintln!("stdargs: error: bad argument {}", e);
                std::process::exit(2);
            }
        }
    }

    let mut loops = SimpleLoops::new();
    let bound = match bind(&mut store, &mut loops, &values, &spec) {
        Ok(b) => b,
        Err(e) => fail(&e),
    };
    print!("{}", bound.plan());
    if let Some(r) = bound.return_value() {
        println!("return: {} {:?}", r, store.dims_of(r));
    }
}

fn manifest(file: &std::path::Path) {
    let mut registry = Registry::new();
    if let Err(e) = registry.load_signatures(file) {
        eprintln!("stdargs: error: {}", e);
        let code = if matches!(e, RegistryError::Io { .. }) { 2 } else { 1 };
        std::process::exit(code);
    }
    match registry.manifest_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("stdargs: error: {}", e);
            std::process::exit(2);
        }
    }
}
