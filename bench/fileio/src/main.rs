//! Sequential and random file-read benchmarks.
//!
//! `seq` mirrors `benchmarks/file_read/condy.cpp`: N tasks pull disjoint
//! blocks from a shared monotonic offset counter until the file is
//! covered. `random` mirrors `benchmarks/file_random_read/condy.cpp`: the
//! block offset list is shuffled once by a seeded PRNG and each task pulls
//! the next entry from a shared index — same "shared counter, no locking"
//! shape, different source sequence.

use std::cell::Cell;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use ringrt::{AsyncRead, FileRef, Runtime, RuntimeOptions};

#[derive(Parser, Debug)]
#[command(about = "File I/O benchmark: sequential or random block reads")]
struct Args {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Sequential reads over a shared monotonic offset counter.
    Seq {
        /// Block size in bytes.
        #[arg(short = 'b', long, default_value_t = 1024 * 1024)]
        block_size: usize,
        /// Number of concurrent tasks.
        #[arg(short = 't', long, default_value_t = 32)]
        num_tasks: usize,
        /// Open the file with O_DIRECT.
        #[arg(short = 'd', long)]
        direct_io: bool,
        filename: String,
    },
    /// Random reads over a seeded-PRNG-shuffled offset list.
    Random {
        #[arg(short = 'b', long, default_value_t = 1024 * 1024)]
        block_size: usize,
        #[arg(short = 't', long, default_value_t = 32)]
        num_tasks: usize,
        /// Seed for the offset shuffle.
        #[arg(short = 's', long, default_value_t = 42)]
        seed: u64,
        #[arg(short = 'd', long)]
        direct_io: bool,
        /// Use a fixed file descriptor and fixed per-task buffers.
        #[arg(short = 'f', long)]
        fixed: bool,
        #[arg(short = 'p', long)]
        iopoll: bool,
        #[arg(short = 'q', long)]
        sqpoll: bool,
        filename: String,
    },
}

fn open_file(filename: &str, direct_io: bool) -> RawFd {
    let mut flags = libc::O_RDONLY;
    if direct_io {
        flags |= libc::O_DIRECT;
    }
    let c_path = std::ffi::CString::new(filename).expect("filename contains a NUL byte");
    let fd = unsafe { libc::open(c_path.as_ptr(), flags) };
    assert!(fd >= 0, "open({filename}) failed");
    fd
}

fn file_size(fd: RawFd) -> usize {
    unsafe {
        let size = libc::lseek(fd, 0, libc::SEEK_END);
        assert!(size >= 0, "lseek(SEEK_END) failed");
        libc::lseek(fd, 0, libc::SEEK_SET);
        size as usize
    }
}

fn print_report(elapsed: std::time::Duration, bytes: usize) {
    let throughput_mbps = bytes as f64 / elapsed.as_secs_f64() / (1024.0 * 1024.0);
    println!("time_ms:{}", elapsed.as_millis());
    println!("throughput_mbps:{throughput_mbps:.2}");
}

fn run_seq(block_size: usize, num_tasks: usize, direct_io: bool, filename: String) {
    let fd = open_file(&filename, direct_io);
    let total_size = file_size(fd);

    let rt = Runtime::new(RuntimeOptions::new()).expect("failed to build runtime");
    let offset = Rc::new(Cell::new(0usize));

    for _ in 0..num_tasks {
        let offset = Rc::clone(&offset);
        rt.spawn(async move {
            let mut buffer = vec![0u8; block_size];
            loop {
                let current = offset.get();
                if current >= total_size {
                    break;
                }
                let to_read = block_size.min(total_size - current);
                offset.set(current + to_read);

                let n = AsyncRead::new(FileRef::Raw(fd), &mut buffer[..to_read], current as u64)
                    .await;
                if n < 0 {
                    tracing::warn!(n, offset = current, "read failed");
                }
            }
        })
        .detach();
    }

    let start = std::time::Instant::now();
    rt.allow_exit();
    rt.run();
    print_report(start.elapsed(), total_size);
}

fn run_random(
    block_size: usize,
    num_tasks: usize,
    seed: u64,
    direct_io: bool,
    fixed: bool,
    iopoll: bool,
    sqpoll: bool,
    filename: String,
) {
    let fd = open_file(&filename, direct_io);
    let total_size = file_size(fd);
    let num_blocks = total_size.div_ceil(block_size);

    let mut offsets: Vec<usize> = (0..num_blocks).map(|i| i * block_size).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    offsets.shuffle(&mut rng);
    let offsets = Rc::new(offsets);

    let options = RuntimeOptions::new()
        .enable_iopoll(iopoll)
        .enable_sqpoll(sqpoll);
    let rt = Runtime::new(options).expect("failed to build runtime");

    let mut task_buffers: Vec<Vec<u8>> = (0..num_tasks).map(|_| vec![0u8; block_size]).collect();
    if fixed {
        let slices: Vec<&mut [u8]> = task_buffers.iter_mut().map(|b| b.as_mut_slice()).collect();
        rt.init_buffer_table(&slices)
            .expect("failed to register fixed buffer table");
        rt.init_fd_table(1).expect("failed to register fixed fd table");
        rt.update_fd_table(0, &[fd]).expect("failed to install fd into fixed table");
    }

    let index = Rc::new(Cell::new(0usize));

    for task_id in 0..num_tasks {
        let offsets = Rc::clone(&offsets);
        let index = Rc::clone(&index);
        let mut buffer = std::mem::take(&mut task_buffers[task_id]);
        rt.spawn(async move {
            loop {
                let i = index.get();
                if i >= offsets.len() {
                    break;
                }
                index.set(i + 1);
                let current_offset = offsets[i];

                let n = if fixed {
                    let file = FileRef::Fixed(0);
                    let slot = ringrt::current_runtime().fixed_buffer(task_id as u32);
                    AsyncRead::new_fixed(file, &mut buffer, current_offset as u64, slot).await
                } else {
                    AsyncRead::new(FileRef::Raw(fd), &mut buffer, current_offset as u64).await
                };
                if n < 0 {
                    tracing::warn!(n, offset = current_offset, "read failed");
                }
            }
        })
        .detach();
    }

    let start = std::time::Instant::now();
    rt.allow_exit();
    rt.run();
    print_report(start.elapsed(), total_size);
}

fn main() {
    let args = Args::parse();
    match args.mode {
        Mode::Seq {
            block_size,
            num_tasks,
            direct_io,
            filename,
        } => run_seq(block_size, num_tasks, direct_io, filename),
        Mode::Random {
            block_size,
            num_tasks,
            seed,
            direct_io,
            fixed,
            iopoll,
            sqpoll,
            filename,
        } => run_random(
            block_size, num_tasks, seed, direct_io, fixed, iopoll, sqpoll, filename,
        ),
    }
}
