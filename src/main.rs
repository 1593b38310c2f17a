//! decodegen: decode-table compiler for bit-pattern instruction descriptions

use std::env;

use anyhow::{bail, Context};
use decodegen::config::Config;
use decodegen::decode::{PlaceholderDecoder, TableDecoder};
use decodegen::emit::{write_generated, BackendKind};
use decodegen::tablegen::{compile_file, CompiledUnit};

const USAGE: &str = "\
Usage: decodegen <description> [options]

Options:
  --out DIR          Output directory (default: generated)
  --backend NAME     Output language: cpp or rust (default: cpp)
  --category NAME    Category marker of the entries to compile (default: NOPARMO)
  --top-bits N       Header bits used to select a dispatch slot (default: 6)
  --dry-run          Compile and report, but write nothing
  --sample-config    Print a sample configuration file and exit
";

/// Command-line options, applied over the loaded configuration.
#[derive(Debug, Default)]
struct Options {
    description: Option<String>,
    overrides: Config,
    dry_run: bool,
    sample_config: bool,
    help: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<Options> {
    let mut options = Options::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .with_context(|| format!("{} needs a value", arg))
        };

        match arg.as_str() {
            "--out" | "-o" => options.overrides.out_dir = Some(value()?),
            "--backend" => options.overrides.backend = Some(value()?),
            "--category" => options.overrides.category = Some(value()?),
            "--top-bits" => {
                let raw = value()?;
                let bits = raw
                    .parse::<u8>()
                    .with_context(|| format!("invalid --top-bits value '{}'", raw))?;
                options.overrides.top_bits = Some(bits);
            }
            "--dry-run" | "-n" => options.dry_run = true,
            "--sample-config" => options.sample_config = true,
            "--help" | "-h" => options.help = true,
            flag if flag.starts_with('-') => bail!("unknown option '{}'\n\n{}", flag, USAGE),
            path => {
                if options.description.is_some() {
                    bail!("more than one description file given");
                }
                options.description = Some(path.to_string());
            }
        }
    }

    Ok(options)
}

fn main() -> anyhow::Result<()> {
    // Initialize logging; conflicts are warnings, so show them by default
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args)?;

    if options.help {
        print!("{}", USAGE);
        return Ok(());
    }
    if options.sample_config {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    let Some(description) = options.description.as_deref() else {
        eprint!("{}", USAGE);
        bail!("no description file given");
    };

    let mut config = Config::get().clone();
    config.merge(options.overrides);

    let backend_kind: BackendKind = config.backend().parse()?;
    let build_options = config.build_options();

    println!("Compiling: {}", description);
    let unit = compile_file(description, build_options)
        .with_context(|| format!("failed to compile {}", description))?;

    verify_table(&unit)?;
    print_report(&unit);

    let backend = backend_kind.create(&config.namespace());
    let files = backend
        .render(&unit)
        .with_context(|| format!("failed to render {} output", backend.name()))?;

    if options.dry_run {
        for file in &files {
            println!("Would write {} ({} bytes)", file.name, file.contents.len());
        }
    } else {
        let out_dir = config.out_dir();
        let written = write_generated(&out_dir, &files)
            .with_context(|| format!("failed to write output to {}", out_dir))?;
        for path in &written {
            println!("Wrote {}", path.display());
        }
    }

    println!("Complete. Output {} functions.", unit.summary().decode_functions);
    Ok(())
}

/// Run every compiled record's own fixed bits through the in-memory decoder.
///
/// A record must decode to itself, or to a record at least as specific
/// that shadows it in the same slot.
fn verify_table(unit: &CompiledUnit) -> anyhow::Result<()> {
    let mut decoder = TableDecoder::new(&unit.table, PlaceholderDecoder);

    for record in &unit.records {
        let header = record.compiled.value;
        let ctx = decoder
            .decode(header)
            .with_context(|| format!("{} (line {}) does not decode", record.opcode, record.meta.line))?;

        if ctx.opcode.as_deref() != Some(record.opcode.as_str()) {
            log::debug!(
                "{} (line {}) header {:#x} shadowed by {:?}",
                record.opcode,
                record.meta.line,
                header,
                ctx.opcode
            );
        }
    }

    let (decoded, unknown) = decoder.stats();
    log::info!("Verified {} headers ({} unknown)", decoded, unknown);
    Ok(())
}

fn print_report(unit: &CompiledUnit) {
    let summary = unit.summary();

    println!();
    println!("Compile Summary");
    println!("===============");
    println!("Pattern width:     {} bits", unit.table.width);
    println!("Records:           {}", summary.records);
    println!("Opcodes:           {}", summary.opcodes);
    println!("Field routines:    {}", summary.field_routines);
    println!("Decode functions:  {}", summary.decode_functions);
    println!(
        "Dispatch slots:    {} ({} non-empty, {} tests)",
        summary.slots,
        unit.table.chains.iter().filter(|c| !c.tests.is_empty()).count(),
        summary.tests
    );
    println!("Conflicts:         {}", summary.conflicts);

    if !unit.conflicts.is_empty() {
        println!();
        println!("Conflicts:");
        for conflict in &unit.conflicts {
            println!("  {}", conflict);
        }
    }
    println!();
}
