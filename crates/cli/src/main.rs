//! ringwatch: tail a baresip `ctrl_tcp` channel and log what happens.
//!
//! Connects to the user agent's control port, then logs registration
//! changes, new calls and call state transitions as they arrive. Any
//! protocol or transport failure is fatal: the error chain is logged and
//! the process exits non-zero.

use std::net::{SocketAddr, ToSocketAddrs};
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use ringwatch_client_core::{Ctrl, Event, Model};
use ringwatch_ctrl_io::{BufferedConnection, Reactor};
use ringwatch_infra_common::logging::{parse_log_level, setup_logging, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "ringwatch", version, about = "Watch a baresip ctrl_tcp channel")]
struct Args {
    /// Host running the baresip ctrl_tcp module
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Control channel port
    #[arg(long, default_value_t = 4444)]
    port: u16,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_log: bool,
}

fn resolve(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {host}:{port}"))?
        .next()
        .with_context(|| format!("no address for {host}:{port}"))
}

fn run(args: &Args) -> anyhow::Result<()> {
    let addr = resolve(&args.host, args.port)?;

    let reactor = Rc::new(Reactor::new()?);
    let conn = BufferedConnection::connect(Rc::clone(&reactor), addr)?;
    info!(%addr, "connecting");

    let ctrl = Ctrl::new(Rc::clone(conn.recvbuf()), Rc::clone(conn.sendbuf()));
    let model = Model::attach(&ctrl);

    let _events = ctrl.on_event(|event| {
        match event {
            Event::Register(ev) => {
                info!(kind = ?ev.kind, account_aor = %ev.account_aor, param = %ev.param, "registration");
            }
            Event::Call(ev) => {
                info!(kind = ?ev.kind, id = %ev.id, peer_uri = %ev.peer_uri, "call event");
            }
        }
        Ok(())
    });

    let _responses = ctrl.on_response(|response| {
        info!(ok = response.ok, token = ?response.token, data = %response.data, "response");
        Ok(())
    });

    let _calls = model.on_call(|call| {
        info!(id = %call.id(), direction = ?call.direction(), peer_uri = %call.peer_uri(), "new call");
        let id = call.id().clone();
        let _ = call.on_state_change(move |state| {
            info!(%id, ?state, "call state");
            Ok(())
        });
        Ok(())
    });

    loop {
        reactor.wait(None)?;
    }
}

fn main() {
    let args = Args::parse();

    let config = match parse_log_level(&args.log_level) {
        Ok(level) => {
            let config = LoggingConfig::new(level, "ringwatch");
            if args.json_log {
                config.with_json()
            } else {
                config
            }
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = setup_logging(&config) {
        eprintln!("{err}");
        std::process::exit(2);
    }

    if let Err(err) = run(&args) {
        error!("fatal: {err}");
        for cause in err.chain().skip(1) {
            error!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}
