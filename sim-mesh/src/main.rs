mod instruments;
mod radio;
mod routing;

use anyhow::Context;
use inquire::prompt_u32;
use log::{error, info, set_boxed_logger, set_max_level, warn};
use serde::{Deserialize, Serialize};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, Duration};

use loam::clock::Tick;
use loam::framework::NodeId;
use loam::node::{Event, Node};

use crate::radio::Ether;
use crate::routing::FieldSystem;

#[derive(Serialize, Deserialize)]
struct MeshConfig {
    nodes: Vec<NodeId>,
    edges: Vec<(NodeId, NodeId)>,
    /// Wall milliseconds per simulated second.
    tick_millis: u64,
}

impl MeshConfig {
    /// Sink 1, bridges chained outward, each leaf hanging off the nearest
    /// bridge (or the sink itself for leaf 2 in a tiny roster).
    fn tiered(count: u8) -> Self {
        let nodes: Vec<NodeId> = (1..=count).collect();
        let mut edges = Vec::new();
        for id in nodes.iter().copied() {
            if id > 1 && id % 2 != 0 {
                edges.push((id, if id == 3 { 1 } else { id - 2 }));
            } else if id % 2 == 0 {
                edges.push((id, if id + 1 <= count { id + 1 } else { id - 1 }));
            }
        }
        Self {
            nodes,
            edges,
            tick_millis: 200,
        }
    }
}

async fn setup() -> anyhow::Result<MeshConfig> {
    info!("Mesh setup (first time):");
    let count = loop {
        let n = prompt_u32("How many motes (2-13)? ")?;
        if (2..=13).contains(&n) {
            break n as u8;
        }
        error!("Try again.");
    };
    info!("Building a {count}-mote tiered mesh");
    Ok(MeshConfig::tiered(count))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    set_max_level(LevelFilter::Info);
    set_boxed_logger(TermLogger::new(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ))
    .expect("Failed to init logger");

    info!("Starting Loam Mesh Simulator");
    warn!("Notice: the radio here is simulated; this binary is a protocol demo, not a deployment target");

    let config: MeshConfig = if let Ok(file) = fs::read_to_string("./mesh.json").await {
        serde_json::from_str(&file).context("mesh.json is unreadable")?
    } else {
        let config = setup().await?;
        fs::write("./mesh.json", serde_json::to_vec_pretty(&config)?).await?;
        config
    };

    let mut nodes: Vec<Node<FieldSystem>> = config.nodes.iter().map(|&id| Node::new(id)).collect();
    for node in &mut nodes {
        let id = node.id;
        node.instruments.calibrate(id);
    }
    let mut ether = Ether::new(&config.edges);
    let mut now: Tick = 0;

    let mut ticker = interval(Duration::from_millis(config.tick_millis));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Console: \"<node-id> whoami|print.lsdb|print.n\", \"help\", \"exit\"");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                now += 1;
                for node in nodes.iter_mut() {
                    node.step(now, Event::Tick);
                }
                ether.deliver(&mut nodes, now);
                for node in nodes.iter_mut() {
                    let id = node.id;
                    for event in node.drain_events() {
                        info!("[{id}] {event}");
                    }
                    while let Some(warning) = node.warnings.pop_front() {
                        warn!("[{id}] {warning}");
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let split: Vec<&str> = line.split_whitespace().collect();
                match split.as_slice() {
                    [] => {}
                    ["help"] => {
                        info!(r#"Help:
                        - help -- shows this page
                        - exit -- stops the simulator
                        - <node-id> whoami -- asks a mote who it is
                        - <node-id> print.lsdb -- dumps a mote's link state database
                        - <node-id> print.n -- lists a mote's live neighbours
                        "#);
                    }
                    ["exit"] => break,
                    [id, command] => {
                        match id.parse::<NodeId>() {
                            Ok(id) => {
                                if let Some(node) = nodes.iter_mut().find(|n| n.id == id) {
                                    node.step(now, Event::ConsoleLine(command));
                                    for event in node.drain_events() {
                                        info!("[{id}] {event}");
                                    }
                                } else {
                                    error!("No node {id} in this mesh");
                                }
                            }
                            Err(_) => error!("Invalid node id"),
                        }
                    }
                    _ => error!("Unknown command, type \"help\" for help"),
                }
            }
        }
    }

    Ok(())
}
