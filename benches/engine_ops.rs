use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;
use tdl_2048::engine::{self as GameEngine, Board, Move};

fn warm() { GameEngine::new(); }

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(1337);
    let mut boards = Vec::new();
    let mut b = Board::initial(&mut rng);
    boards.push(b);
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..128 {
        b = b.make_move(seq[i % seq.len()], &mut rng);
        boards.push(b);
    }
    boards
}

fn bench_moves(c: &mut Criterion) {
    warm();
    let boards = corpus();
    c.bench_function("engine/afters", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for &bd in &boards {
                for a in bd.afters() {
                    acc = acc.wrapping_add(a.raw() ^ a.info() as u64);
                }
            }
            black_box(acc)
        })
    });
    c.bench_function("engine/slide_up", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for &bd in &boards {
                acc ^= bd.slide(Move::Up).after.raw();
            }
            black_box(acc)
        })
    });
}

fn bench_queries(c: &mut Criterion) {
    warm();
    let boards = corpus();
    c.bench_function("engine/canonical", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for &bd in &boards {
                acc ^= bd.canonical().raw();
            }
            black_box(acc)
        })
    });
    c.bench_function("engine/spaces_and_operations", |bch| {
        bch.iter(|| {
            let mut acc = 0u32;
            for &bd in &boards {
                acc = acc.wrapping_add(bd.spaces().len() as u32 + bd.operations());
            }
            black_box(acc)
        })
    });
}

criterion_group!(engine_ops, bench_moves, bench_queries);
criterion_main!(engine_ops);
