//! Terminal front end for Link-Chat.
//!
//! Binds a raw socket on the chosen interface, runs a node over it, and
//! drives discovery and sends from a small line-based REPL. Received
//! chat lines are printed; received blobs are written to the working
//! directory (the sink owns naming and disk I/O, not the core).

mod raw;

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use log::error;

use linkchat::{ChannelSink, Config, Event, MacAddr, Node};
use raw::RawSocketLink;

/// Chat and file transfer over raw Ethernet frames (EtherType 0x88B5).
#[derive(Parser)]
#[command(name = "linkchat", version, about)]
struct Args {
    /// Network interface to bind, e.g. eth0.
    #[arg(long)]
    iface: String,
}

/// How long replies are given to arrive after a probe.
const DISCOVERY_WAIT: Duration = Duration::from_millis(600);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(&args.iface) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(iface: &str) -> io::Result<()> {
    let link = Arc::new(RawSocketLink::open(iface)?);
    let (sink, events) = ChannelSink::new();
    let node = Arc::new(Node::spawn(link, Arc::new(sink), Config::default()));

    println!("bound to {iface}, local address {}", node.local_addr());
    println!("commands: /probe  /peers  /send <mac|all> <text>  /file <mac|all> <path>  /quit");
    println!("a bare line is sent as chat to every known neighbor");

    thread::spawn(move || drain_events(events));
    repl(&node);

    node.shutdown();
    Ok(())
}

/// Prints delivered traffic; blobs land in the working directory.
fn drain_events(events: Receiver<Event>) {
    for event in events {
        match event {
            Event::Chat { src, text } => println!("{src}: {text}"),
            Event::Blob { src, data } => match store_blob(&data) {
                Ok(name) => println!("{src}: received file ({} bytes) -> {name}", data.len()),
                Err(e) => println!("{src}: received {} bytes but failed to store them: {e}", data.len()),
            },
            Event::Error { message } => println!("[error] {message}"),
        }
    }
}

fn store_blob(data: &[u8]) -> io::Result<String> {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let name = format!("received_{epoch}.bin");
    std::fs::write(&name, data)?;
    Ok(name)
}

fn repl(node: &Arc<Node>) {
    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return, // EOF
            Ok(_) => {}
            Err(e) => {
                error!("stdin: {e}");
                return;
            }
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => return,
            ("/probe", _) => probe(node),
            ("/peers", _) => list_peers(node),
            ("/send", rest) => send_chat(node, rest),
            ("/file", rest) => send_file(node, rest),
            (cmd, _) if cmd.starts_with('/') => println!("unknown command {cmd}"),
            // A bare line goes to everyone we know about.
            _ => {
                for dst in node.neighbors() {
                    let text = line.to_string();
                    spawn_send(node, dst, move |node, dst| {
                        node.send_chat(&text, Some(dst)).map_err(|e| e.to_string())
                    });
                }
            }
        }
    }
}

fn probe(node: &Arc<Node>) {
    if let Err(e) = node.probe() {
        println!("probe failed: {e}");
        return;
    }
    thread::sleep(DISCOVERY_WAIT);
    list_peers(node);
}

fn list_peers(node: &Arc<Node>) {
    let peers = node.neighbors();
    if peers.is_empty() {
        println!("no neighbors (try /probe)");
        return;
    }
    println!("neighbors:");
    for peer in peers {
        println!("  {peer}");
    }
}

/// Resolves `<mac|all>` into destination addresses.
fn destinations(node: &Arc<Node>, target: &str) -> Vec<MacAddr> {
    if target == "all" {
        let peers = node.neighbors();
        if peers.is_empty() {
            println!("no neighbors (try /probe)");
        }
        return peers;
    }
    match target.parse() {
        Ok(addr) => vec![addr],
        Err(e) => {
            println!("{e}");
            Vec::new()
        }
    }
}

fn send_chat(node: &Arc<Node>, rest: &str) {
    let Some((target, text)) = rest.split_once(' ') else {
        println!("usage: /send <mac|all> <text>");
        return;
    };
    let text = text.to_string();
    for dst in destinations(node, target) {
        let text = text.clone();
        spawn_send(node, dst, move |node, dst| {
            node.send_chat(&text, Some(dst)).map_err(|e| e.to_string())
        });
    }
}

fn send_file(node: &Arc<Node>, rest: &str) {
    let Some((target, path)) = rest.split_once(' ') else {
        println!("usage: /file <mac|all> <path>");
        return;
    };
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            println!("cannot read {path}: {e}");
            return;
        }
    };
    println!("sending {path} ({} bytes)", data.len());
    let data = Arc::new(data);
    for dst in destinations(node, target) {
        let data = Arc::clone(&data);
        spawn_send(node, dst, move |node, dst| {
            node.send_blob(&data, Some(dst)).map_err(|e| e.to_string())
        });
    }
}

/// Runs one send on its own thread so a slow transfer does not block
/// the prompt; failures are printed when they happen.
fn spawn_send<F>(node: &Arc<Node>, dst: MacAddr, send: F)
where
    F: FnOnce(&Node, MacAddr) -> Result<(), String> + Send + 'static,
{
    let node = Arc::clone(node);
    thread::spawn(move || {
        if let Err(e) = send(&node, dst) {
            println!("send to {dst} failed: {e}");
        }
    });
}
