//! Producer/consumer channel throughput benchmark.
//!
//! Mirrors `benchmarks/channel/condy.cpp`: `task_pair` producer/consumer
//! coroutine pairs, each over its own `Channel<Option<i32>>` of the given
//! buffer size, pushing `num_messages` integers and measuring wall-clock
//! time to drain them all.

use clap::Parser;
use ringrt::{channel, Runtime, RuntimeOptions};

#[derive(Parser, Debug)]
#[command(about = "Channel throughput benchmark")]
struct Args {
    /// Channel buffer size.
    #[arg(short = 'b', long, default_value_t = 1024)]
    buffer_size: usize,

    /// Number of messages each producer pushes.
    #[arg(short = 'n', long, default_value_t = 1_000_000)]
    num_messages: usize,

    /// Number of producer/consumer pairs.
    #[arg(short = 'p', long, default_value_t = 1)]
    task_pair: usize,

    /// Enable tracing output (or set RUST_LOG).
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    if args.verbose {
        tracing_subscriber::fmt::init();
    }

    let rt = Runtime::new(RuntimeOptions::new()).expect("failed to build runtime");

    for _ in 0..args.task_pair {
        let ch = channel::<i32>(args.buffer_size);

        let producer_ch = ch.clone();
        let num_messages = args.num_messages;
        rt.spawn(async move {
            for i in 0..num_messages as i32 {
                let _ = producer_ch.push(i).await;
            }
            producer_ch.push_close();
        })
        .detach();

        let consumer_ch = ch.clone();
        rt.spawn(async move {
            let mut count = 0usize;
            while consumer_ch.pop().await.is_some() {
                count += 1;
            }
            tracing::debug!(count, "consumer drained");
        })
        .detach();
    }

    let start = std::time::Instant::now();
    rt.allow_exit();
    rt.run();
    let elapsed = start.elapsed();

    println!("time_ms:{}", elapsed.as_millis());
}
