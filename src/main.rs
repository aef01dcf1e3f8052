/* Copyright (c) Meta Platforms, Inc. and affiliates. All rights reserved.
 *
 * This source code is licensed under the Apache 2.0 license found in
 * the LICENSE file in the root directory of this source tree.
 */

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use log::error;
use log::info;
use log::trace;
use log::warn;
use taintgen::Instrumenter;

const DEFAULT_PREFIX: &str = "P";
const DEFAULT_MAX_ATTEMPTS: u32 = 100;

#[derive(clap::Args)]
struct GenerateArgs {
    #[clap(value_parser)]
    name: Option<String>,
    #[clap(long, value_parser)]
    seed: Option<u64>,
    #[clap(long, value_enum, default_value_t = taintgen::InstrumentationKind::None)]
    instrumentation: taintgen::InstrumentationKind,
}

#[derive(clap::Args)]
struct PopulateArgs {
    #[clap(long, value_parser = clap::value_parser!(u32).range(1..))]
    num_files: u32,
    #[clap(long, value_parser)]
    out_dir: PathBuf,
    #[clap(long, value_parser, default_value = DEFAULT_PREFIX)]
    prefix: String,
    #[clap(long, value_parser, default_value_t = 0)]
    base_seed: u64,
    /// Path of an executable, launched without a shell. It gets the uninstrumented .java file as its only
    /// argument, should compile and run it, and print the number returned by run() as its last line of output.
    /// To get rid of programs that run for too long, call `timeout` inside that script.
    #[clap(long, value_parser)]
    validate_command: Option<String>,
    /// Programs whose validation reports fewer executions are regenerated with another seed.
    #[clap(long, value_parser, default_value_t = 0, requires = "validate_command")]
    min_executions: u64,
    /// How many seeds to try for each program before giving up.
    #[clap(long, value_parser = clap::value_parser!(u32).range(1..), default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print a single program
    Generate(GenerateArgs),
    /// Fill a directory with pairs of uninstrumented/instrumented programs
    Populate(PopulateArgs),
}

#[derive(clap::Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
    /// Keep sampling until that many assignments, conditionals and loops have been generated
    #[clap(long, value_parser, default_value_t = taintgen::DEFAULT_MIN_MEANINGFUL)]
    min_meaningful: u32,
    /// Declare that many variables up front and have assignments overwrite them,
    /// instead of declaring a fresh variable for each assignment
    #[clap(long, value_parser, default_value_t = 0)]
    num_vars: u32,
    /// Integer literals are drawn from [1, max-int)
    #[clap(long, value_parser = clap::value_parser!(i32).range(2..), default_value_t = taintgen::DEFAULT_MAX_INT)]
    max_int: i32,
    /// File with one `production weight` pair per line. Defaults to a uniform grammar.
    #[clap(long, value_parser)]
    grammar: Option<PathBuf>,
}
impl Cli {
    fn to_config(&self) -> taintgen::Config {
        let Cli {
            min_meaningful,
            num_vars,
            max_int,
            ..
        } = self;
        taintgen::Config {
            min_meaningful: *min_meaningful,
            num_vars: *num_vars,
            max_int: *max_int,
        }
    }
    fn load_grammar(&self) -> Result<taintgen::Grammar> {
        match &self.grammar {
            None => Ok(taintgen::Grammar::uniform()),
            Some(path) => Ok(taintgen::Grammar::from_file(path)?),
        }
    }
}

fn write_artifact(directory: &Path, artifact: &taintgen::Artifact) -> Result<PathBuf> {
    let filepath = directory.join(artifact.file_name());
    fs::write(&filepath, artifact.to_string())
        .with_context(|| format!("while attempting to write to {}", filepath.display()))?;
    Ok(filepath)
}

// Runs the command on the file, and returns the number of executions it reported on its last line.
// None if the command failed, or if that line is not a number.
fn run_validation_command(command: &str, filepath: &Path) -> Result<Option<u64>> {
    let output = process::Command::new(command)
        .arg(filepath)
        .stderr(process::Stdio::piped())
        .stdout(process::Stdio::piped())
        .output()
        .with_context(|| {
            format!(
                "failed to launch {} on {}",
                command,
                filepath.display()
            )
        })?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    trace!("command stdout:{}", stdout);
    trace!("command stderr:{}", String::from_utf8_lossy(&output.stderr));
    if !output.status.success() {
        warn!(
            "{} failed on {} with {}",
            command,
            filepath.display(),
            output.status
        );
        return Ok(None);
    }
    Ok(stdout
        .lines()
        .last()
        .and_then(|line| line.trim().parse::<u64>().ok()))
}

fn populate(
    grammar: &taintgen::Grammar,
    config: taintgen::Config,
    args: &PopulateArgs,
) -> Result<()> {
    info!(
        "Generating {} programs in {}: min meaningful statements {}, variable pool {}, max int {}, min executions {}",
        args.num_files,
        args.out_dir.display(),
        config.min_meaningful,
        config.num_vars,
        config.max_int,
        args.min_executions,
    );
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("unable to create {}", args.out_dir.display()))?;
    let baseline = taintgen::NoInstrumenter;
    let naive = taintgen::NaiveInstrumenter;
    // Seeds that did not lead to enough executions are skipped by all the following programs,
    // so that no program is generated twice.
    let mut seed_offset: u64 = 0;
    for i in 0..args.num_files as usize {
        let mut attempts = 0;
        let program = loop {
            let seed = args
                .base_seed
                .wrapping_add(i as u64)
                .wrapping_add(seed_offset);
            info!("Generating {} with seed {}", i, seed);
            let program = taintgen::gen_program(grammar, seed, config);
            let name = taintgen::artifact_name(&args.prefix, i, baseline.tag());
            let filepath = write_artifact(&args.out_dir, &program.assemble(&name, &baseline))?;
            let command = match &args.validate_command {
                None => break program,
                Some(command) => command,
            };
            match run_validation_command(command, &filepath)? {
                Some(executions) if executions >= args.min_executions => {
                    info!("{} executed {} operations", name, executions);
                    break program;
                }
                executions => {
                    warn!(
                        "{} executed {:?} operations, expected at least {}: regenerating",
                        name, executions, args.min_executions
                    );
                    seed_offset += 1;
                    attempts += 1;
                    if attempts >= args.max_attempts {
                        bail!(
                            "no seed out of {} led to enough executions for program {}",
                            attempts,
                            i
                        );
                    }
                }
            }
        };
        let name = taintgen::artifact_name(&args.prefix, i, naive.tag());
        write_artifact(&args.out_dir, &program.assemble(&name, &naive))?;
    }
    Ok(())
}

fn run(args: &Cli) -> Result<()> {
    let config = Cli::to_config(args);
    let grammar = args.load_grammar()?;
    match &args.command {
        Command::Generate(generate_args) => {
            let seed = generate_args.seed.unwrap_or_else(rand::random::<u64>);
            let name = generate_args
                .name
                .clone()
                .unwrap_or_else(|| "A".to_string());
            let program = taintgen::gen_program(&grammar, seed, config);
            let instrumenter = generate_args.instrumentation.instrumenter();
            print!("{}", program.assemble(&name, instrumenter.as_ref()));
        }
        Command::Populate(populate_args) => populate(&grammar, config, populate_args)?,
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Cli::parse();
    if let Err(err) = run(&args) {
        error!("{:#}", err);
        process::exit(1);
    }
}
