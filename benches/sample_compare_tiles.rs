use std::time::Duration;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use hrsw::Stopwatch;
use human_duration::human_duration;
use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::SeedableRng;

use hsearch::algorithms::arastar::AraStar;
use hsearch::algorithms::best_first::AStar;
use hsearch::algorithms::best_first::BucketAStar;
use hsearch::algorithms::best_first::WeightedAStar;
use hsearch::algorithms::lsslrtastar::LssLrtaStar;
use hsearch::options::Options;
use hsearch::problems::tiles::Tiles;
use hsearch::problems::tiles::TilesState;
use hsearch::search::Search;

const NUM_INSTANCES: u64 = 5;
const SCRAMBLE_MOVES: usize = 60;
const MAX_INSTANCE_TIME: Duration = Duration::from_secs(1);

fn solve<S: Search<Tiles>>(search: &mut S, init: &TilesState) -> Option<u32> {
    search.search(init.clone()).cost()
}

fn compare_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("Tiles Search");
    let tiles = Tiles::solved(3, 3).unwrap();

    let mut astar = AStar::new(tiles.clone(), &Options::new()).unwrap();
    let mut bucket_astar = BucketAStar::new(tiles.clone(), &Options::new()).unwrap();
    let mut wastar = WeightedAStar::new(tiles.clone(), &Options::new().with("wt", 2)).unwrap();
    let arastar_opts = Options::new().with("wt0", 3).with("dwt", 0.5);
    let mut arastar = AraStar::new(tiles.clone(), &arastar_opts).unwrap();
    let mut lss = LssLrtaStar::new(tiles.clone(), &Options::new().with("depth", 64)).unwrap();

    for i in 0..NUM_INSTANCES {
        let mut rng = ChaCha8Rng::seed_from_u64(i);
        let init = tiles.scramble(&mut rng, SCRAMBLE_MOVES);
        let instance_name = format!("3x3:{i}");

        let mut stopwatch = Stopwatch::new_started();
        let cost = solve(&mut astar, &init);
        stopwatch.stop();
        let elapsed = stopwatch.elapsed();
        println!("A* cost: {cost:?}");
        astar.write_memory_stats(std::io::stdout()).unwrap();
        if elapsed > MAX_INSTANCE_TIME {
            log::warn!(
                "Skipping {instance_name} as it takes too long with A* ({})",
                human_duration(&elapsed)
            );
            continue;
        }

        group.bench_with_input(BenchmarkId::new("A*", &instance_name), &init, |b, s| {
            b.iter(|| solve(&mut astar, s))
        });
        group.bench_with_input(
            BenchmarkId::new("Bucket A*", &instance_name),
            &init,
            |b, s| b.iter(|| solve(&mut bucket_astar, s)),
        );
        group.bench_with_input(
            BenchmarkId::new("Weighted A*", &instance_name),
            &init,
            |b, s| b.iter(|| solve(&mut wastar, s)),
        );
        group.bench_with_input(BenchmarkId::new("ARA*", &instance_name), &init, |b, s| {
            b.iter(|| solve(&mut arastar, s))
        });
        group.bench_with_input(
            BenchmarkId::new("LSS-LRTA*", &instance_name),
            &init,
            |b, s| b.iter(|| {
                lss.reset();
                solve(&mut lss, s)
            }),
        );
    }
    group.finish();
}

criterion_group!(benches, compare_search);
criterion_main!(benches);
