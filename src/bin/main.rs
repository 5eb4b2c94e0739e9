use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

use anstream::eprintln;
use clap::Parser;
use clap::ValueEnum;
use log::LevelFilter;
use owo_colors::OwoColorize;
use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::SeedableRng;
use thousands::Separable;
use tqdm::tqdm;

use hsearch::algorithms::arastar::AraStar;
use hsearch::algorithms::best_first::AStar;
use hsearch::algorithms::best_first::BucketAStar;
use hsearch::algorithms::best_first::UtilityBestFirst;
use hsearch::algorithms::best_first::WeightedAStar;
use hsearch::algorithms::lsslrtastar::LssLrtaStar;
use hsearch::domain::Domain;
use hsearch::domain::validate_path;
use hsearch::options::ConfigError;
use hsearch::options::Options;
use hsearch::problems::grid::GridDomain;
use hsearch::problems::tiles::Tiles;
use hsearch::report::ReportWriter;
use hsearch::search::Search;

#[cfg(feature = "mem_profile")]
#[global_allocator]
static GLOBAL: dhat::Alloc = dhat::Alloc;

#[cfg(all(not(feature = "mem_profile"), not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Algorithm {
    Astar,
    BucketAstar,
    Wastar,
    Utility,
    Arastar,
    Lsslrtastar,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DomainKind {
    Tiles,
    Grid,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(long_version = hsearch::build::CLAP_LONG_VERSION)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(short, long, value_enum, env = "HSEARCH_ALGORITHM", default_value_t = Algorithm::Astar)]
    algorithm: Algorithm,

    #[arg(short, long, value_enum, default_value_t = DomainKind::Tiles)]
    domain: DomainKind,

    /// Algorithm options, as `key=value`.
    #[arg(short = 'o', long = "option")]
    options: Vec<String>,

    #[arg(long, default_value_t = 0u64)]
    seed: u64,
    #[arg(long, default_value_t = 10u64)]
    instances: u64,

    /// Random moves away from the goal of each tiles instance.
    #[arg(long, default_value_t = 100usize)]
    scramble: usize,
    #[arg(long, default_value_t = 3usize)]
    tiles_width: usize,
    #[arg(long, default_value_t = 3usize)]
    tiles_height: usize,

    /// Grid map. An empty square grid is used without one.
    #[arg(long)]
    grid: Option<PathBuf>,
    #[arg(long, default_value_t = 64usize)]
    grid_size: usize,

    /// Where to write the reports. Defaults to stdout.
    #[arg(long, env = "HSEARCH_OUTPUT")]
    output: Option<PathBuf>,

    #[arg(long, env = "HSEARCH_LOG", default_value_t = LevelFilter::Warn)]
    log_level: LevelFilter,

    #[command(flatten)]
    color: colorchoice_clap::Color,
}

/// Writes log records to stderr.
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level().yellow(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn config_error(e: ConfigError) -> std::io::Error {
    std::io::Error::other(format!("Bad configuration. {e}"))
}

/// Runs `search` on every instance and writes a report for each.
fn solve<D, S>(mut search: S, instances: Vec<D::State>, out: &mut impl Write) -> std::io::Result<()>
where
    D: Domain,
    S: Search<D>,
{
    let total = instances.len();
    let (mut solved, mut expanded) = (0usize, 0u64);
    for (i, init) in tqdm(instances.into_iter().enumerate()).desc(Some("Solving")) {
        search.reset();
        let result = search.search(init.clone());
        expanded += result.stats.expanded;
        if result.solved() {
            solved += 1;
            match validate_path(search.domain(), &init, &result.path.ops) {
                Some((end, cost)) if search.domain().is_goal(&end) && cost == result.path.cost => {}
                _ => log::error!("Instance {i} returned a broken path {}", result.path),
            }
        }

        let mut report = ReportWriter::new(&mut *out);
        report.start()?;
        report.pair("instance", i)?;
        report.pair("initial state", format!("{init:?}"))?;
        search.report(&mut report)?;
        result.report(&mut report)?;
        report.end()?;
    }
    out.flush()?;

    eprintln!(
        "Solved {}/{} instances, expanding {} nodes",
        solved.green(),
        total,
        expanded.separate_with_commas().blue()
    );
    Ok(())
}

fn run<D: Domain>(
    domain: D,
    instances: Vec<D::State>,
    args: &Args,
    out: &mut impl Write,
) -> std::io::Result<()> {
    let opts = Options::parse(&args.options).map_err(config_error)?;
    match args.algorithm {
        Algorithm::Astar => solve(AStar::new(domain, &opts).map_err(config_error)?, instances, out),
        Algorithm::BucketAstar => solve(
            BucketAStar::new(domain, &opts).map_err(config_error)?,
            instances,
            out,
        ),
        Algorithm::Wastar => solve(
            WeightedAStar::new(domain, &opts).map_err(config_error)?,
            instances,
            out,
        ),
        Algorithm::Utility => solve(
            UtilityBestFirst::new(domain, &opts).map_err(config_error)?,
            instances,
            out,
        ),
        Algorithm::Arastar => solve(AraStar::new(domain, &opts).map_err(config_error)?, instances, out),
        Algorithm::Lsslrtastar => solve(
            LssLrtaStar::new(domain, &opts).map_err(config_error)?,
            instances,
            out,
        ),
    }
}

fn main() -> std::io::Result<()> {
    #[cfg(feature = "mem_profile")]
    let _profiler = dhat::Profiler::new_heap();

    let args = Args::parse();
    args.color.write_global();
    log::set_logger(&LOGGER).map_err(|e| std::io::Error::other(format!("Failed to set logger. {e}")))?;
    log::set_max_level(args.log_level);

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => {
            eprintln!("Writing reports to {:?}", path.yellow());
            Box::new(BufWriter::new(File::create(path)?))
        }
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    let rngs = (0..args.instances).map(|i| ChaCha8Rng::seed_from_u64(args.seed.wrapping_add(i)));
    match args.domain {
        DomainKind::Tiles => {
            let tiles = Tiles::solved(args.tiles_width, args.tiles_height).map_err(std::io::Error::other)?;
            let instances = rngs.map(|mut rng| tiles.scramble(&mut rng, args.scramble)).collect();
            run(tiles, instances, &args, &mut out)
        }
        DomainKind::Grid => {
            let grid = match &args.grid {
                Some(path) => GridDomain::try_from(path.as_path()),
                None => GridDomain::open(args.grid_size, args.grid_size),
            }
            .map_err(std::io::Error::other)?;
            let instances = rngs
                .enumerate()
                .filter_map(|(i, mut rng)| {
                    let start = grid.random_state(&mut rng);
                    if start.is_none() {
                        log::warn!("Failed to find a free cell for instance {i}");
                    }
                    start
                })
                .collect();
            run(grid, instances, &args, &mut out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arguments() {
        let args = Args::try_parse_from([
            "main",
            "--algorithm",
            "lsslrtastar",
            "--domain",
            "grid",
            "-o",
            "depth=4",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.algorithm, Algorithm::Lsslrtastar);
        assert_eq!(args.domain, DomainKind::Grid);
        assert_eq!(args.options, vec!["depth=4"]);
        assert_eq!(args.log_level, LevelFilter::Debug);

        let args = Args::try_parse_from(["main", "-a", "bucket-astar"]).unwrap();
        assert_eq!(args.algorithm, Algorithm::BucketAstar);
        assert!(Args::try_parse_from(["main", "--log-level", "loud"]).is_err());
    }
}
