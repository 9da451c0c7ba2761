//! turbid CLI - run photon transport scenarios and print a summary.

mod scenario;

use anyhow::{bail, Context};
use std::env;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use scenario::Scenario;
use turbid::prelude::*;

struct Args {
    photons: Option<usize>,
    seed: Option<u64>,
    config: Option<PathBuf>,
    fast: bool,
    print_scenario: bool,
    verbosity: u8,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut args = Args {
        photons: None,
        seed: None,
        config: None,
        fast: false,
        print_scenario: false,
        verbosity: 0,
    };
    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-n" | "--photons" => {
                let v = it.next().context("missing value for --photons")?;
                args.photons = Some(v.parse().with_context(|| format!("bad photon count '{v}'"))?);
            }
            "--seed" => {
                let v = it.next().context("missing value for --seed")?;
                args.seed = Some(v.parse().with_context(|| format!("bad seed '{v}'"))?);
            }
            "-c" | "--config" => args.config = Some(it.next().context("missing value for --config")?.into()),
            "--fast" => args.fast = true,
            "--print-scenario" => args.print_scenario = true,
            "-v" | "--verbose" => args.verbosity = args.verbosity.max(1),
            "-vv" | "--debug" => args.verbosity = args.verbosity.max(2),
            "-vvv" | "--trace" => args.verbosity = 3,
            "-V" | "--version" => {
                println!("turbid {} (built {})", env!("CARGO_PKG_VERSION"), env!("TURBID_BUILD_DATE"));
                return Ok(None);
            }
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            other => bail!("unknown argument '{other}' (try --help)"),
        }
    }
    Ok(Some(args))
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("turbid={level}")));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already set");
    }
}

fn main() -> anyhow::Result<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };
    init_tracing(args.verbosity);

    let mut scenario = match &args.config {
        Some(path) => Scenario::load(path)?,
        None => Scenario::cube(),
    };
    if let Some(n) = args.photons {
        scenario.source.set_count(n);
    }
    if let Some(seed) = args.seed {
        scenario.run.seed = seed;
    }
    if args.fast {
        scenario.run.tree.get_or_insert_with(TreeConfig::default);
    }
    if args.print_scenario {
        println!("{}", serde_json::to_string_pretty(&scenario)?);
        return Ok(());
    }

    let scene = scenario.scene()?;
    let source = scenario.source.build();

    let start = Instant::now();
    let simulation = Simulation::new(&scene, scenario.run)?;
    let report = simulation.run(source.as_ref())?;
    let elapsed = start.elapsed();

    print_report(&scene, &simulation, &report, elapsed.as_secs_f64());
    Ok(())
}

fn print_report(scene: &Scene, simulation: &Simulation<'_>, report: &RunReport, seconds: f64) {
    println!("finder:            {}", simulation.finder().name());
    println!("photons:           {} ({} completed)", report.photons, report.completed);
    println!("escaped:           {} ({:.2}%)", report.escaped, 100.0 * report.escape_fraction());
    println!("absorbed:          {}", report.absorbed);
    println!("terminated:        {}", report.terminated);
    println!("mean scatters:     {:.2}", report.mean_scatter_events());
    println!("mean escape wt:    {:.4}", report.mean_escaped_weight());
    println!("records:           {}", report.logger.len());
    println!("weight balance:    {:.3e}", report.weight_balance());
    println!();
    println!("{:<20} {:>12} {:>12}", "solid", "absorbed", "net");
    for entry in scene.solid_table() {
        let label = entry.label.as_ref();
        println!(
            "{:<20} {:>12.4} {:>12.4}",
            label,
            report.logger.absorbed_weight(label),
            report.logger.solid_weight(label)
        );
    }
    let world = scene.environment_label(&scene.world_environment());
    println!("{:<20} {:>12.4} {:>12.4}", world.as_ref(), report.logger.absorbed_weight(world), report.logger.solid_weight(world));
    println!();
    println!("elapsed:           {seconds:.3}s");
}

fn print_help() {
    println!("turbid - Monte Carlo photon transport in turbid media");
    println!();
    println!("USAGE:");
    println!("    turbid [OPTIONS]");
    println!();
    println!("Without --config the reference scenario runs: a 2x2x2 cube (mu_s 30, mu_a 0.1,");
    println!("g 0.8, n 1.0) in vacuum with a pencil beam launched from its centre.");
    println!();
    println!("OPTIONS:");
    println!("    -n, --photons <N>     Number of photons");
    println!("        --seed <SEED>     Random seed");
    println!("    -c, --config <FILE>   JSON scenario (run config, world, solids, source)");
    println!("        --fast            Force the tree-accelerated intersection finder");
    println!("        --print-scenario  Print the scenario as JSON and exit");
    println!("    -v, -vv, -vvv         Log info, debug or trace output (RUST_LOG overrides)");
    println!("    -V, --version         Show version and build date");
    println!("    -h, --help            Show this help");
    println!();
    println!("EXAMPLES:");
    println!("    turbid -n 10000 --seed 7");
    println!("    turbid --print-scenario > cube.json");
    println!("    turbid -v --config cube.json");
}
