//! Task-spawn and yield cost benchmarks.
//!
//! `spawn` mirrors `benchmarks/spawn/condy.cpp`: spawn `num_tasks`
//! coroutines that return immediately, then join all of them from a parent
//! coroutine. `yield` mirrors `benchmarks/post/condy.cpp`: one coroutine
//! calls `co_switch` `num` times in a row with nothing else ready, measuring
//! raw resume cost.

use clap::{Parser, Subcommand};
use ringrt::{co_switch, Runtime, RuntimeOptions};

#[derive(Parser, Debug)]
#[command(about = "Task spawn/join and yield throughput benchmarks")]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// Enable tracing output (or set RUST_LOG).
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Spawn `num_tasks` empty coroutines and join all of them.
    Spawn {
        #[arg(short = 'n', long, default_value_t = 1_000_000)]
        num_tasks: usize,
    },
    /// Call `co_switch` `num` times in a row.
    Yield {
        #[arg(short = 'n', long, default_value_t = 50_000_000)]
        num: usize,
    },
}

fn main() {
    let args = Args::parse();
    if args.verbose {
        tracing_subscriber::fmt::init();
    }

    let rt = Runtime::new(RuntimeOptions::new()).expect("failed to build runtime");

    match args.mode {
        Mode::Spawn { num_tasks } => {
            rt.spawn(async move {
                let mut tasks = Vec::with_capacity(num_tasks);
                for _ in 0..num_tasks {
                    tasks.push(ringrt::current_runtime().spawn(async {}));
                }
                for task in tasks {
                    task.await;
                }
                tracing::debug!(num_tasks, "all spawned tasks joined");
            })
            .detach();
        }
        Mode::Yield { num } => {
            rt.spawn(async move {
                for _ in 0..num {
                    co_switch().await;
                }
                tracing::debug!(num, "yield loop complete");
            })
            .detach();
        }
    }

    let start = std::time::Instant::now();
    rt.allow_exit();
    rt.run();
    let elapsed = start.elapsed();

    println!("time_ms:{}", elapsed.as_millis());
}
