mod common;

use std::collections::HashMap;

use loam::clock::Tick;
use loam::concepts::neighbour::NeighbourSet;
use loam::concepts::packet::{Beacon, Channel, Lsa, Packet, RadioCommand};
use loam::feedback::RoutingWarning;
use loam::node::{Event, Node};

use common::virtual_mesh::{boot_node, VirtualSystem};

fn lsa_bytes(cost: u16, src: u8, dst: u8, seq: u8) -> Vec<u8> {
    Lsa {
        reply_to_sync_req: false,
        link_cost: cost,
        src,
        dst,
        seq_nr: seq,
    }
    .encode()
}

fn decode_lsa(bytes: &[u8]) -> Lsa {
    match Packet::decode(Channel::Runicast, bytes, 13).unwrap() {
        Packet::Lsa(lsa) => lsa,
        other => panic!("not an LSA: {other:?}"),
    }
}

/// Bridge 3 with outgoing links to 5 and the sink, past its boot jitter.
/// Floods of advertisements arriving from 5 have exactly one target (the
/// sink side), which keeps transmission accounting simple.
fn booted_bridge() -> (Node<VirtualSystem>, Tick) {
    let mut node = Node::<VirtualSystem>::new(3);
    let now = boot_node(&mut node);
    node.lsdb.admit(3, 5, 900, 50);
    node.lsdb.admit(3, 1, 900, 52);
    (node, now)
}

fn keep_peers_alive(node: &mut Node<VirtualSystem>) {
    for peer in [1, 5, 7] {
        node.lsdb.ka_bump(peer);
    }
}

#[test]
fn overflow_is_dropped_with_a_warning_and_the_rest_drains_fifo() {
    let (mut node, now) = booted_bridge();

    // 17 admissible advertisements: one goes pending, 15 fill the queue,
    // the 17th has nowhere to go
    for i in 0..17u8 {
        let bytes = lsa_bytes(800, 9, 11, 20 + i);
        node.step(
            now,
            Event::Runicast {
                from: 5,
                seqno: i + 1,
                bytes: &bytes,
            },
        );
    }
    assert!(node.pending().is_some());
    assert_eq!(node.queue.len(), node.queue.capacity());
    assert!(node
        .warnings
        .iter()
        .any(|w| matches!(w, RoutingWarning::QueueFull { src: 9, dst: 11 })));

    // snapshot the expected order and each entry's backoff deadline
    let mut expected: Vec<u8> = Vec::new();
    let mut deadlines: HashMap<u8, Tick> = HashMap::new();
    let head = node.pending().unwrap();
    expected.push(head.packet.seq_nr);
    deadlines.insert(head.packet.seq_nr, head.deadline);
    for entry in node.queue.iter() {
        expected.push(entry.packet.seq_nr);
        deadlines.insert(entry.packet.seq_nr, entry.deadline);
    }
    assert_eq!(expected, (20..36).collect::<Vec<u8>>());

    // release with the radio acking every frame promptly
    let mut sent: Vec<(u8, Tick)> = Vec::new();
    for t in now + 1..=now + 80 {
        keep_peers_alive(&mut node);
        node.step(t, Event::Tick);
        loop {
            let commands = node.drain_outbound();
            if commands.is_empty() {
                break;
            }
            for command in commands {
                if let RadioCommand::Runicast { to, bytes, .. } = command {
                    sent.push((decode_lsa(&bytes).seq_nr, t));
                    node.step(
                        t,
                        Event::RunicastSent {
                            to,
                            retransmissions: 0,
                        },
                    );
                }
            }
        }
    }

    let order: Vec<u8> = sent.iter().map(|&(seq, _)| seq).collect();
    assert_eq!(order, expected, "transmissions left FIFO order");
    for (seq, t) in &sent {
        assert!(
            *t >= deadlines[seq],
            "seq {seq} transmitted at {t}, before its deadline {}",
            deadlines[seq]
        );
    }
}

#[test]
fn at_most_one_runicast_in_flight() {
    let (mut node, now) = booted_bridge();
    for i in 0..3u8 {
        let bytes = lsa_bytes(800, 9, 11, 20 + i);
        node.step(
            now,
            Event::Runicast {
                from: 5,
                seqno: i + 1,
                bytes: &bytes,
            },
        );
    }

    // the radio never acks: exactly one transmission leaves, the rest keep
    // cycling through the queue with fresh backoffs
    let mut first = None;
    for t in now + 1..=now + 120 {
        keep_peers_alive(&mut node);
        node.step(t, Event::Tick);
        for command in node.drain_outbound() {
            if let RadioCommand::Runicast { to, .. } = command {
                assert!(first.is_none(), "second runicast while one in flight");
                first = Some(to);
            }
        }
    }
    let first = first.expect("nothing transmitted");
    let waiting = node.queue.len() + usize::from(node.pending().is_some());
    assert_eq!(waiting, 2);

    // the ack frees the channel and the rest follows
    let mut released = 0;
    node.step(
        now + 121,
        Event::RunicastSent {
            to: first,
            retransmissions: 0,
        },
    );
    for t in now + 121..=now + 240 {
        keep_peers_alive(&mut node);
        node.step(t, Event::Tick);
        for command in node.drain_outbound() {
            if let RadioCommand::Runicast { to, .. } = command {
                released += 1;
                node.step(
                    t,
                    Event::RunicastSent {
                        to,
                        retransmissions: 0,
                    },
                );
            }
        }
    }
    assert_eq!(released, 2);
}

#[test]
fn duplicate_runicast_frames_hit_the_engine_once() {
    let (mut node, now) = booted_bridge();
    let bytes = lsa_bytes(800, 9, 11, 20);
    node.step(
        now,
        Event::Runicast {
            from: 5,
            seqno: 42,
            bytes: &bytes,
        },
    );
    let age = node.lsdb.lsdb_age();
    let backlog = node.queue.len();

    // retransmitted frame, same link seqno: suppressed before admission,
    // but it still counts as a sign of life
    node.step(
        now,
        Event::Runicast {
            from: 5,
            seqno: 42,
            bytes: &bytes,
        },
    );
    assert_eq!(node.lsdb.lsdb_age(), age);
    assert_eq!(node.queue.len(), backlog);
    assert_eq!(node.lsdb.ka(5), 2);

    // fresh frame, same content: the dedup layer passes it and the
    // admission layer drops it as an equal seqno
    node.step(
        now,
        Event::Runicast {
            from: 5,
            seqno: 43,
            bytes: &bytes,
        },
    );
    assert_eq!(node.lsdb.lsdb_age(), age);
    assert_eq!(node.queue.len(), backlog);
}

#[test]
fn history_evicts_the_oldest_peer() {
    let (mut node, now) = booted_bridge();
    let mut feed = |node: &mut Node<VirtualSystem>, from: u8, seqno: u8, seq_nr: u8| {
        let bytes = lsa_bytes(800, 9, 11, seq_nr);
        node.step(
            now,
            Event::Runicast {
                from,
                seqno,
                bytes: &bytes,
            },
        );
    };
    feed(&mut node, 5, 42, 20);
    feed(&mut node, 7, 9, 21);
    // the history holds two peers; 9 pushes 5 out
    feed(&mut node, 9, 3, 22);
    let age = node.lsdb.lsdb_age();
    // 5 reuses link seqno 42: forgotten, so the newer advertisement lands
    feed(&mut node, 5, 42, 23);
    assert!(node.lsdb.lsdb_age() > age);
}

#[test]
fn controlled_flood_spares_endpoints_and_sender() {
    let (mut node, now) = booted_bridge();
    node.lsdb.admit(3, 7, 900, 53);
    // advertisement about 5 -> 9, carried to us by 7
    let bytes = lsa_bytes(700, 5, 9, 30);
    node.step(
        now,
        Event::Runicast {
            from: 7,
            seqno: 1,
            bytes: &bytes,
        },
    );

    let mut targets = Vec::new();
    for t in now + 1..=now + 40 {
        keep_peers_alive(&mut node);
        node.step(t, Event::Tick);
        for command in node.drain_outbound() {
            if let RadioCommand::Runicast { to, bytes, .. } = command {
                let lsa = decode_lsa(&bytes);
                assert_eq!((lsa.src, lsa.dst, lsa.link_cost, lsa.seq_nr), (5, 9, 700, 30));
                targets.push(to);
                node.step(
                    t,
                    Event::RunicastSent {
                        to,
                        retransmissions: 0,
                    },
                );
            }
        }
    }
    // neighbours are 1, 5, 7: the advertised source and the peer that sent
    // us the frame are spared, only the sink-side neighbour gets a copy
    assert_eq!(targets, vec![1]);
}

#[test]
fn leaf_advertisements_go_only_to_their_bridge() {
    let mut node = Node::<VirtualSystem>::new(8);
    let now = boot_node(&mut node);
    // a second known bridge that an unrestricted flood would also hit
    node.lsdb.admit(8, 7, 850, 10);

    let mut neighbours = NeighbourSet::new(13);
    neighbours.insert(8);
    let beacon = Beacon {
        get_lsdb_req: false,
        neighbours,
        battery_value: 901,
    };
    let bytes = beacon.encode();
    node.step(
        now,
        Event::Broadcast {
            from: 3,
            rssi: -50,
            bytes: &bytes,
        },
    );
    assert!(node.lsdb.is_live(8, 3));

    let mut targets = Vec::new();
    for t in now + 1..=now + 38 {
        node.lsdb.ka_bump(3);
        node.lsdb.ka_bump(7);
        node.step(t, Event::Tick);
        for command in node.drain_outbound() {
            if let RadioCommand::Runicast { to, bytes, .. } = command {
                let lsa = decode_lsa(&bytes);
                assert_eq!((lsa.src, lsa.dst, lsa.link_cost, lsa.seq_nr), (8, 3, 901, 11));
                targets.push(to);
                node.step(
                    t,
                    Event::RunicastSent {
                        to,
                        retransmissions: 0,
                    },
                );
            }
        }
    }
    assert_eq!(targets, vec![3]);
}
