use std::sync::Arc;

use log::info;
use rand::{rngs::StdRng, SeedableRng};

use tdl_2048::cache::{CacheConfig, TranspositionCache};
use tdl_2048::engine::{self as GameEngine, Board};
use tdl_2048::episode;
use tdl_2048::expectimax::{Expectimax, HeuristicEvaluator, SearchConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    GameEngine::new();

    let seed = std::env::var("TDL_SEED").ok().and_then(|s| s.parse().ok()).unwrap_or(0u64);
    let mut rng = StdRng::seed_from_u64(seed);
    let cache = Arc::new(TranspositionCache::new(&CacheConfig::with_budget_mib(64)));
    let mut expectimax =
        Expectimax::with_parts(HeuristicEvaluator::new(), SearchConfig::default(), Some(Arc::clone(&cache)));

    let board = Board::initial(&mut rng);
    println!("{board}");
    let stats = episode::play(board, &mut expectimax, &mut rng);
    println!("{}", stats.last);
    println!("Moves made: {}, Score: {}, Max tile: {}", stats.moves, stats.score, stats.max_tile);
    info!("cache slots in use: {} of {}", cache.len_hint(), cache.capacity());
}
