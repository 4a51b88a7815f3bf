//! TCP echo server benchmark.
//!
//! Mirrors `benchmarks/echo_server/condy.cpp`: accept connections in a
//! loop, spawn one session coroutine per connection that echoes back
//! whatever it reads until the peer closes. `-f` switches to the
//! direct-accept path, installing each connection straight into a fixed-fd
//! slot instead of returning a raw descriptor.

use std::mem::MaybeUninit;
use std::net::Ipv4Addr;
use std::os::unix::io::RawFd;
use std::str::FromStr;

use clap::Parser;
use ringrt::{
    AsyncAccept, AsyncAcceptDirect, AsyncClose, AsyncRecv, AsyncSend, FileRef, Runtime,
    RuntimeOptions, SlotPolicy,
};

const BACKLOG: i32 = 128;
const MAX_CONNECTIONS: usize = 1024;
const MAX_MESSAGE_LEN: usize = 2048;

#[derive(Parser, Debug)]
#[command(about = "TCP echo server benchmark")]
struct Args {
    /// Use a fixed file descriptor slot for accepted connections.
    #[arg(short = 'f', long)]
    fixed: bool,

    /// Address to listen on.
    host: String,

    /// Port to listen on.
    port: u16,

    #[arg(short = 'v', long)]
    verbose: bool,
}

fn listening_socket(host: &str, port: u16) -> RawFd {
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
        assert!(fd >= 0, "socket() failed");

        let optval: libc::c_int = 1;
        let rc = libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        assert!(rc == 0, "setsockopt(SO_REUSEADDR) failed");

        let addr = Ipv4Addr::from_str(host).expect("invalid listen address");
        let mut sockaddr: libc::sockaddr_in = std::mem::zeroed();
        sockaddr.sin_family = libc::AF_INET as libc::sa_family_t;
        sockaddr.sin_port = port.to_be();
        sockaddr.sin_addr.s_addr = u32::from_ne_bytes(addr.octets());

        let rc = libc::bind(
            fd,
            &sockaddr as *const _ as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        );
        assert!(rc == 0, "bind() failed");

        let rc = libc::listen(fd, BACKLOG);
        assert!(rc == 0, "listen() failed");

        fd
    }
}

async fn session(client: FileRef) {
    let mut buffer = [0u8; MAX_MESSAGE_LEN];
    loop {
        let n = AsyncRecv::new(client, &mut buffer, 0).await;
        if n <= 0 {
            break;
        }
        let n = n as usize;
        let written = AsyncSend::new(client, &buffer[..n], 0).await;
        if written < 0 {
            tracing::warn!(written, "send failed");
            break;
        }
    }
    let _ = AsyncClose::new(client).await;
}

async fn accept_loop(server_fd: RawFd, fixed: bool) {
    loop {
        let mut client_addr: MaybeUninit<libc::sockaddr_storage> = MaybeUninit::zeroed();
        let mut client_len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        let addr_ptr = client_addr.as_mut_ptr() as *mut libc::sockaddr;

        let client = if fixed {
            let slot = AsyncAcceptDirect::new(
                FileRef::Raw(server_fd),
                addr_ptr,
                &mut client_len,
                0,
                SlotPolicy::Alloc,
            )
            .await;
            if slot < 0 {
                tracing::error!(slot, "accept_direct failed");
                continue;
            }
            FileRef::Fixed(slot as u32)
        } else {
            let fd = AsyncAccept::new(FileRef::Raw(server_fd), addr_ptr, &mut client_len, 0).await;
            if fd < 0 {
                tracing::error!(fd, "accept failed");
                continue;
            }
            FileRef::Raw(fd)
        };

        ringrt::current_runtime().spawn(session(client)).detach();
    }
}

fn main() {
    let args = Args::parse();
    if args.verbose {
        tracing_subscriber::fmt::init();
    }

    let server_fd = listening_socket(&args.host, args.port);
    println!("Echo server listening on {}:{}", args.host, args.port);

    let options = RuntimeOptions::new().sq_size(MAX_CONNECTIONS as u32);
    let rt = Runtime::new(options).expect("failed to build runtime");

    if args.fixed {
        rt.init_fd_table(MAX_CONNECTIONS)
            .expect("failed to register fixed-fd table");
    }

    rt.spawn(accept_loop(server_fd, args.fixed)).detach();

    rt.allow_exit();
    rt.run();
}
