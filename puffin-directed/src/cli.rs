use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{arg, crate_authors, crate_name, crate_version, value_parser, ArgMatches, Command};
use itertools::Itertools;
use log::{error, info};

use crate::block::block_key;
use crate::distance::DistanceTable;
use crate::error::{Error, Result};
use crate::ir::Module;
use crate::options::Options;
use crate::pass::{DirectedFuzzingPass, Pass};

fn create_app() -> Command {
    let distance_args = [
        arg!(-d --distance [file] "Distance file containing the distance of each basic block to the targets")
            .value_parser(value_parser!(PathBuf)),
        arg!(-c --config [file] "TOML configuration of the pass")
            .value_parser(value_parser!(PathBuf)),
    ];

    Command::new(crate_name!())
        .version(crate::MAYBE_GIT_REF.unwrap_or(crate_version!()))
        .author(crate_authors!())
        .about("Instruments compiled units with distance feedback for directed fuzzing")
        .arg(arg!(--"log-file" [file] "Also write the log to a file")
            .value_parser(value_parser!(PathBuf))
            .global(true))
        .subcommand_required(true)
        .subcommands(vec![
            Command::new("instrument")
                .about("Instruments units and writes them back")
                .args(distance_args.clone())
                .arg(arg!(-e --"entry-point" [symbol] "Symbol marking the unit which defines the counters"))
                .arg(arg!(-o --output [file] "Where to write the instrumented unit (single unit only)")
                    .value_parser(value_parser!(PathBuf))
                    .conflicts_with("in-place"))
                .arg(arg!(--"in-place" "Overwrite the units instead of writing <unit>.directed.json"))
                .arg(arg!(<units> "The units to instrument")
                    .num_args(1..)
                    .value_parser(value_parser!(PathBuf))),
            Command::new("keys")
                .about("Lists the key of every basic block of a unit and its distance")
                .args(distance_args.clone())
                .arg(arg!(<unit> "The unit to inspect").value_parser(value_parser!(PathBuf))),
            Command::new("distances")
                .about("Prints the parsed distance file")
                .args(distance_args),
            Command::new("print")
                .about("Prints a unit in textual form")
                .arg(arg!(<unit> "The unit to print").value_parser(value_parser!(PathBuf))),
        ])
}

pub fn main() -> ExitCode {
    let matches = create_app().get_matches();

    let config = match matches.get_one::<PathBuf>("log-file") {
        Some(path) => crate::log::config_to_file(path),
        None => crate::log::config_default().map_err(Into::into),
    };
    if let Err(err) = config.and_then(|config| log4rs::init_config(config).map_err(Into::into)) {
        eprintln!("Failed to init logging: {err}");
        return ExitCode::FAILURE;
    }

    info!("Git Version: {}", crate::GIT_REF);

    let result = match matches.subcommand() {
        Some(("instrument", matches)) => instrument(matches),
        Some(("keys", matches)) => keys(matches),
        Some(("distances", matches)) => distances(matches),
        Some(("print", matches)) => print(matches),
        _ => unreachable!("subcommand is required"),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn options(matches: &ArgMatches) -> Result<Options> {
    let mut options = match matches.get_one::<PathBuf>("config") {
        Some(path) => Options::from_file(path)?,
        None => Options::default(),
    };

    if let Some(distance_file) = matches.get_one::<PathBuf>("distance") {
        options.distance_file = Some(distance_file.clone());
    }

    // only `instrument` takes an entry point
    if let Ok(Some(entry_point)) = matches.try_get_one::<String>("entry-point") {
        options.entry_point = entry_point.clone();
    }

    Ok(options)
}

fn instrument(matches: &ArgMatches) -> Result<()> {
    let options = options(matches)?;
    let units: Vec<&PathBuf> = matches
        .get_many::<PathBuf>("units")
        .unwrap_or_default()
        .collect();
    let output: Option<&PathBuf> = matches.get_one("output");
    let in_place = matches.get_flag("in-place");

    if output.is_some() && units.len() > 1 {
        return Err(Error::InvalidArguments(
            "--output can only be used with a single unit".to_string(),
        ));
    }

    let mut table = DistanceTable::new();
    let mut pass = DirectedFuzzingPass::new(&mut table, options);

    for unit in units {
        let mut module = read_unit(unit)?;

        info!("Running {} on {}", pass.name(), unit.display());
        pass.run(&mut module);
        if let Some(report) = pass.report() {
            println!("{report}");
        }

        let destination = match (output, in_place) {
            (Some(output), _) => output.clone(),
            (None, true) => unit.clone(),
            (None, false) => unit.with_extension("directed.json"),
        };
        write_unit(&destination, &module)?;
    }

    Ok(())
}

fn keys(matches: &ArgMatches) -> Result<()> {
    let options = options(matches)?;
    let module = read_unit(matches.get_one::<PathBuf>("unit").expect("unit is required"))?;

    let mut table = DistanceTable::new();
    if options.distance_file().is_some() {
        table.load(options.distance_file())?;
    }

    for line in keys_lines(&module, &table) {
        println!("{line}");
    }

    Ok(())
}

/// One tab-separated line per block: function, label, key and distance.
fn keys_lines(module: &Module, table: &DistanceTable) -> Vec<String> {
    module
        .functions
        .iter()
        .flat_map(|function| {
            function.blocks.iter().map(move |block| {
                let key = block_key(block);
                let distance = match table.get(&key) {
                    _ if key.is_empty() => String::from("no location"),
                    Some(distance) => distance.to_string(),
                    None => String::from("unknown distance"),
                };
                format!("{}\t{}\t{key}\t{distance}", function.name, block.label)
            })
        })
        .collect()
}

fn distances(matches: &ArgMatches) -> Result<()> {
    let options = options(matches)?;

    let mut table = DistanceTable::new();
    let stats = table.load(options.distance_file())?;

    for line in distance_lines(&table) {
        println!("{line}");
    }
    info!(
        "{} lines, {} entries, {} duplicates, {} malformed",
        stats.lines, stats.inserted, stats.duplicates, stats.malformed
    );

    Ok(())
}

fn distance_lines(table: &DistanceTable) -> Vec<String> {
    table
        .iter()
        .sorted()
        .map(|(key, distance)| format!("{key} - {distance}"))
        .collect()
}

fn print(matches: &ArgMatches) -> Result<()> {
    let module = read_unit(matches.get_one::<PathBuf>("unit").expect("unit is required"))?;
    print!("{module}");
    Ok(())
}

pub fn read_unit(path: &Path) -> Result<Module> {
    let content = fs::read_to_string(path).map_err(|source| Error::UnitUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| Error::UnitMalformed {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_unit(path: &Path, module: &Module) -> Result<()> {
    let content =
        serde_json::to_string_pretty(module).map_err(|source| Error::UnitUnserializable {
            path: path.to_path_buf(),
            source,
        })?;

    fs::write(path, content).map_err(|source| Error::UnitUnwritable {
        path: path.to_path_buf(),
        source,
    })
}
