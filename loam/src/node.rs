use std::collections::VecDeque;

use cfg_if::cfg_if;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::clock::{Tick, Timer};
use crate::concepts::lsdb::{Admission, LinkStateDb};
use crate::concepts::packet::{Beacon, Channel, DataPacket, Lsa, Packet, RadioCommand};
use crate::concepts::queue::{QueueEntry, SendQueue};
use crate::feedback::{MeshEvent, RoutingWarning};
use crate::framework::{Instruments, MeshSystem, NodeId, ProtocolParams, Role};
use crate::seqno;

cfg_if! {
    if #[cfg(feature = "serde")] {
        use serde::{Deserialize, Serialize};
    }
}

const MAX_WARN_LENGTH: usize = 64;

/// Work arriving at the node. Everything the node does happens inside
/// `Node::step`; handlers run to completion and never block.
#[derive(Clone, Copy, Debug)]
pub enum Event<'a> {
    /// Time advanced; due timers run.
    Tick,
    Broadcast {
        from: NodeId,
        rssi: i16,
        bytes: &'a [u8],
    },
    Unicast {
        from: NodeId,
        bytes: &'a [u8],
    },
    Runicast {
        from: NodeId,
        /// Link-layer sequence number, used for duplicate suppression.
        seqno: u8,
        bytes: &'a [u8],
    },
    /// The reliable-unicast channel finished delivering (or gave up on
    /// retransmits for) the previous `RadioCommand::Runicast`.
    RunicastSent {
        to: NodeId,
        retransmissions: u8,
    },
    RunicastTimedout {
        to: NodeId,
    },
    /// A line from the serial console.
    ConsoleLine(&'a str),
}

/// Where an advertisement entered the node.
#[derive(Clone, Copy, PartialEq, Eq)]
enum LsaOrigin {
    Local,
    Received { sender: NodeId },
}

impl LsaOrigin {
    fn forwarded(self) -> bool {
        matches!(self, LsaOrigin::Received { .. })
    }

    fn sender(self) -> Option<NodeId> {
        match self {
            LsaOrigin::Local => None,
            LsaOrigin::Received { sender } => Some(sender),
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
struct Timers {
    keep_alive: Timer,
    down: Timer,
    sensor: Timer,
    get_lsdb: Timer,
    init_backoff: Timer,
}

/// A committed advertisement being pushed through the reliable-unicast
/// channel, one destination at a time.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
struct Flight {
    bytes: Vec<u8>,
    remaining: VecDeque<NodeId>,
}

#[cfg(feature = "serde")]
fn boot_rng() -> SmallRng {
    SmallRng::seed_from_u64(0)
}

/// Per-node protocol state: LSDB, send queue, timers, sequence number. The
/// platform owns all I/O and drives the node by feeding `Event`s to `step`
/// and draining `outbound`, `events`, and `warnings` afterwards.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct Node<T: MeshSystem + ?Sized> {
    pub id: NodeId,
    pub params: ProtocolParams,
    pub lsdb: LinkStateDb,
    pub queue: SendQueue,
    /// Own lollipop counter, attached to every link update we originate.
    pub sequence_number: u8,
    /// LSDB ages reported by peers during bootstrap.
    pub rx_ages: Vec<u16>,
    #[cfg_attr(feature = "serde", serde(skip_serializing, skip_deserializing))]
    pub instruments: T::Instruments,
    timers: Timers,
    booted: bool,
    /// Entry dequeued from the send queue, waiting for its backoff deadline.
    pending: Option<QueueEntry>,
    in_flight: Option<Flight>,
    /// (peer, link seqno) pairs recently seen on the reliable channel.
    history: VecDeque<(NodeId, u8)>,
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing, skip_deserializing, default = "boot_rng")
    )]
    rng: SmallRng,
    /// Radio work for the platform; drain after every step.
    #[cfg_attr(feature = "serde", serde(skip_serializing, skip_deserializing))]
    pub outbound: Vec<RadioCommand>,
    /// Serial-line records for the platform; drain after every step.
    #[cfg_attr(feature = "serde", serde(skip_serializing, skip_deserializing))]
    pub events: Vec<MeshEvent>,
    #[cfg_attr(feature = "serde", serde(skip_serializing, skip_deserializing))]
    pub warnings: VecDeque<RoutingWarning>,
}

impl<T: MeshSystem + ?Sized> Node<T> {
    pub fn new(id: NodeId) -> Self {
        Self::boot_at(id, 0)
    }

    pub fn boot_at(id: NodeId, now: Tick) -> Self {
        let params = T::params();
        let n = params.total_nodes as usize;
        let mut rng = SmallRng::seed_from_u64(id as u64);
        // the sink comes up immediately; everyone else jitters to keep the
        // first beacon exchanges from colliding
        let backoff = if id == params.sink_id {
            1
        } else {
            params.init_backoff_floor + rng.gen_range(0..params.backoff_window())
        };
        let timers = Timers {
            keep_alive: Timer::periodic(now, params.keep_alive_period),
            down: Timer::periodic(now, params.down_period),
            sensor: Timer::periodic(now, params.sensor_read_interval),
            get_lsdb: Timer::oneshot(now, params.get_lsdb_period),
            init_backoff: Timer::oneshot(now, backoff),
        };
        Self {
            id,
            lsdb: LinkStateDb::new(n, params.reset_sqn_no),
            queue: SendQueue::new(params.buffer_size),
            sequence_number: params.reset_sqn_no,
            rx_ages: vec![0; n],
            instruments: Default::default(),
            timers,
            booted: false,
            pending: None,
            in_flight: None,
            history: VecDeque::new(),
            rng,
            outbound: Vec::new(),
            events: Vec::new(),
            warnings: VecDeque::new(),
            params,
        }
    }

    pub fn role(&self) -> Role {
        self.params.role_of(self.id)
    }

    /// Deterministic tests reseed the backoff jitter.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Whether the initial pre-backoff has elapsed.
    pub fn booted(&self) -> bool {
        self.booted
    }

    /// The dequeued entry waiting for its backoff deadline, if any.
    pub fn pending(&self) -> Option<&QueueEntry> {
        self.pending.as_ref()
    }

    pub fn drain_outbound(&mut self) -> Vec<RadioCommand> {
        std::mem::take(&mut self.outbound)
    }

    pub fn drain_events(&mut self) -> Vec<MeshEvent> {
        std::mem::take(&mut self.events)
    }

    fn warn(&mut self, warning: RoutingWarning) {
        if self.warnings.len() > MAX_WARN_LENGTH {
            self.warnings.pop_front();
        }
        self.warnings.push_back(warning);
    }

    /// Dispatch one event and pump the send loop.
    pub fn step(&mut self, now: Tick, event: Event<'_>) {
        match event {
            Event::Tick => self.on_tick(now),
            Event::Broadcast { from, rssi, bytes } => self.on_broadcast(now, from, rssi, bytes),
            Event::Unicast { from, bytes } => self.on_unicast(now, from, bytes),
            Event::Runicast { from, seqno, bytes } => self.on_runicast(now, from, seqno, bytes),
            Event::RunicastSent { .. } | Event::RunicastTimedout { .. } => self.on_runicast_done(),
            Event::ConsoleLine(line) => self.on_console(line),
        }
        self.pump_send(now);
    }

    // region Timers

    fn on_tick(&mut self, now: Tick) {
        if self.timers.init_backoff.fire(now) {
            self.on_init_backoff(now);
        }
        if !self.booted {
            return;
        }
        if self.timers.keep_alive.fire(now) {
            self.send_beacon(false);
        }
        if self.timers.down.fire(now) {
            self.on_down_timer(now);
        }
        if self.timers.sensor.fire(now) {
            self.on_sensor_timer(now);
        }
        if self.timers.get_lsdb.fire(now) {
            self.on_get_lsdb_timer(now);
        }
    }

    fn on_init_backoff(&mut self, now: Tick) {
        self.booted = true;
        self.sequence_number = self.params.reset_sqn_no;
        self.lsdb.reset_age();
        if self.role() == Role::Bridge {
            // ask the neighbourhood how much database history it holds
            self.send_beacon(true);
        }
        self.timers.keep_alive.restart(now);
        self.timers.sensor.restart(now);
        self.timers.down.restart(now);
    }

    fn send_beacon(&mut self, get_lsdb_req: bool) {
        let beacon = Beacon {
            get_lsdb_req,
            neighbours: self.lsdb.neighbours.clone(),
            battery_value: self.instruments.battery_value(),
        };
        self.outbound.push(RadioCommand::Broadcast {
            bytes: beacon.encode(),
        });
    }

    /// A peer that stayed silent for a whole window while a link to or from
    /// it is on record has gone down: advertise both directions as lost.
    fn on_down_timer(&mut self, now: Tick) {
        for peer in 1..=self.params.total_nodes {
            if peer == self.id {
                continue;
            }
            if self.lsdb.ka(peer) == 0
                && (self.lsdb.is_live(self.id, peer) || self.lsdb.is_live(peer, self.id))
            {
                self.sequence_number = seqno::advance(self.sequence_number);
                let seq = self.sequence_number;
                self.handle_link_down(self.id, peer, seq, LsaOrigin::Local, now);
            }
        }
        self.lsdb.reset_liveness_window();
    }

    fn on_sensor_timer(&mut self, now: Tick) {
        if self.role() != Role::Leaf {
            return;
        }
        let value = self.instruments.sensor_sample(self.id);
        let packet = DataPacket::sensor(
            self.id,
            value,
            self.params.ttl,
            self.params.total_nodes as usize,
        );
        self.forward_data(packet, None);
    }

    /// Bootstrap database pull: ask the peer that reported the oldest
    /// database for a full dump, unless the sink is already a neighbour.
    fn on_get_lsdb_timer(&mut self, now: Tick) {
        self.timers.keep_alive.restart(now);
        self.timers.sensor.restart(now);
        self.timers.down.restart(now);
        if self.lsdb.neighbours.contains(self.params.sink_id) {
            return;
        }
        let mut best = 0u16;
        let mut peer = None;
        for i in 1..=self.params.total_nodes {
            let age = self.rx_ages[i as usize - 1];
            if age > best {
                best = age;
                peer = Some(i);
            }
        }
        if let Some(peer) = peer {
            let request = DataPacket::lsdb_request(self.params.total_nodes as usize);
            self.outbound.push(RadioCommand::Unicast {
                to: peer,
                bytes: request.encode(),
            });
        }
    }

    // endregion

    // region Beacons and liveness

    fn on_broadcast(&mut self, now: Tick, from: NodeId, rssi: i16, bytes: &[u8]) {
        if rssi < self.params.ignore_rssi_below || !self.lsdb.in_roster(from) || from == self.id {
            return;
        }
        let beacon = match Packet::decode(Channel::Broadcast, bytes, self.params.total_nodes as usize)
        {
            Ok(Packet::Beacon(b)) => b,
            Ok(_) => return,
            Err(_) => {
                self.warn(RoutingWarning::MalformedPacket {
                    from,
                    len: bytes.len(),
                });
                return;
            }
        };

        if beacon.get_lsdb_req {
            self.lsdb.neighbours.insert(from);
            self.lsdb.ka_bump(from);
            if self.role() != Role::Leaf {
                self.send_lsdb_age(from);
            }
            return;
        }

        self.lsdb.neighbours.insert(from);
        if beacon.neighbours.contains(self.id) {
            // the peer hears us too: this is a usable directed link
            if !self.lsdb.is_live(self.id, from) {
                let sink = self.params.sink_id;
                let self_reaches_sink =
                    self.lsdb.is_live(self.id, sink) || self.lsdb.neighbours.contains(sink);
                let sender_reaches_sink = beacon.neighbours.contains(sink);
                if self_reaches_sink && sender_reaches_sink {
                    // both of us are one hop from the sink; a direct link
                    // would only add beacon churn. Keep the reverse cost
                    // fresh if that link exists.
                    if self.lsdb.ka(from) > 0 && self.lsdb.is_live(from, self.id) {
                        let battery = self.instruments.battery_value();
                        self.lsdb.refresh_cost(from, self.id, battery);
                    }
                } else {
                    self.originate_link_up(from, beacon.battery_value, now);
                }
            } else if self.lsdb.ka(from) > 0 {
                self.lsdb.refresh_cost(self.id, from, beacon.battery_value);
            }
        }
        self.lsdb.ka_bump(from);
    }

    // endregion

    // region LSA engine

    /// Role rules for a self-originated link-up, from the neighbour FSM.
    fn originate_link_up(&mut self, dst: NodeId, cost: u16, now: Tick) {
        let src = self.id;
        let sink = self.params.sink_id;
        let insert = if src == sink {
            // the sink terminates data; it advertises no outbound links
            false
        } else if dst == sink {
            true
        } else if src % 2 != 0 && dst % 2 != 0 {
            // bridge to bridge; the peer advertises the other direction
            true
        } else {
            // leaf relationships are one-way: only leaf -> bridge is real
            src % 2 == 0 && dst % 2 != 0
        };
        if !insert {
            return;
        }
        self.sequence_number = seqno::advance(self.sequence_number);
        let seq = self.sequence_number;
        self.lsdb.admit(src, dst, cost, seq);
        self.events.push(MeshEvent::NewLink { src, dst });
        self.enqueue_lsa(
            Lsa {
                reply_to_sync_req: false,
                link_cost: cost,
                src,
                dst,
                seq_nr: seq,
            },
            LsaOrigin::Local,
            now,
        );
    }

    /// Admission of a link-up advertisement, §link-state flooding rules:
    /// newer wins, older gets corrected, equal is dropped.
    fn admit_link_up(&mut self, src: NodeId, dst: NodeId, cost: u16, seq_nr: u8, origin: LsaOrigin, now: Tick) {
        if self.lsdb.is_live(src, dst) {
            match self.lsdb.admit(src, dst, cost, seq_nr) {
                Admission::Refreshed | Admission::Rejuvenated => {
                    self.events.push(MeshEvent::NewLink { src, dst });
                    self.enqueue_lsa(
                        Lsa {
                            reply_to_sync_req: false,
                            link_cost: cost,
                            src,
                            dst,
                            seq_nr,
                        },
                        origin,
                        now,
                    );
                }
                Admission::Stale => self.correct_or_ignore(src, dst, seq_nr, now),
                Admission::NewLink => unreachable!("link was live"),
            }
        } else {
            match origin {
                // locally observed links go through the role rules instead
                LsaOrigin::Local => unreachable!("local link-up is originated, not admitted"),
                LsaOrigin::Received { .. } => {
                    self.lsdb.admit(src, dst, cost, seq_nr);
                    self.events.push(MeshEvent::NewLink { src, dst });
                    self.enqueue_lsa(
                        Lsa {
                            reply_to_sync_req: false,
                            link_cost: cost,
                            src,
                            dst,
                            seq_nr,
                        },
                        origin,
                        now,
                    );
                }
            }
        }
    }

    /// Admission of a link-down report, locally observed or received. Both
    /// directions of the pair are retired and re-advertised.
    fn handle_link_down(&mut self, src: NodeId, dst: NodeId, seq_nr: u8, origin: LsaOrigin, now: Tick) {
        let fwd_live = self.lsdb.is_live(src, dst);
        let rev_live = self.lsdb.is_live(dst, src);
        match self.lsdb.drop_link(src, dst, seq_nr) {
            Admission::Refreshed | Admission::Rejuvenated => {
                for (a, b, was_live) in [(src, dst, fwd_live), (dst, src, rev_live)] {
                    if !was_live {
                        continue;
                    }
                    self.events.push(MeshEvent::LostLink { src: a, dst: b });
                    self.enqueue_lsa(
                        Lsa {
                            reply_to_sync_req: false,
                            link_cost: 0,
                            src: a,
                            dst: b,
                            seq_nr,
                        },
                        origin,
                        now,
                    );
                }
            }
            Admission::Stale => self.correct_or_ignore(src, dst, seq_nr, now),
            Admission::NewLink => unreachable!("drop_link never inserts"),
        }
    }

    /// A stale advertisement from a lagging sender is answered with our
    /// newer record; an equal one is dropped silently.
    fn correct_or_ignore(&mut self, src: NodeId, dst: NodeId, seq_nr: u8, now: Tick) {
        if !self.lsdb.older(seq_nr, src) {
            return;
        }
        let correction = Lsa {
            reply_to_sync_req: false,
            link_cost: self.lsdb.cost(src, dst),
            src,
            dst,
            seq_nr: self.lsdb.last_seq(src),
        };
        self.enqueue_lsa(correction, LsaOrigin::Local, now);
    }

    fn enqueue_lsa(&mut self, packet: Lsa, origin: LsaOrigin, now: Tick) {
        self.enqueue_entry(QueueEntry {
            packet,
            deadline: 0,
            forward: origin.forwarded(),
            is_sync_reply: false,
            dst: 0,
            sender: origin.sender(),
        }, now);
    }

    /// Pre-backoff spreads floods in time: every entry waits
    /// `self_id + rand % 2N` seconds before it may hit the radio.
    fn enqueue_entry(&mut self, mut entry: QueueEntry, now: Tick) {
        let jitter = self.rng.gen_range(0..self.params.backoff_window());
        entry.deadline = now + self.id as Tick + jitter;
        if let Err(rejected) = self.queue.enqueue(entry) {
            self.warn(RoutingWarning::QueueFull {
                src: rejected.packet.src,
                dst: rejected.packet.dst,
            });
        }
    }

    // endregion

    // region Reliable unicast reception

    fn on_runicast(&mut self, now: Tick, from: NodeId, link_seqno: u8, bytes: &[u8]) {
        if !self.lsdb.in_roster(from) || from == self.id {
            return;
        }
        // we heard from the peer, even if the packet turns out duplicated
        self.lsdb.ka_bump(from);
        if self.runicast_duplicate(from, link_seqno) {
            return;
        }
        let lsa = match Packet::decode(Channel::Runicast, bytes, self.params.total_nodes as usize) {
            Ok(Packet::Lsa(lsa)) => lsa,
            Ok(_) => return,
            Err(_) => {
                self.warn(RoutingWarning::MalformedPacket {
                    from,
                    len: bytes.len(),
                });
                return;
            }
        };
        if !self.lsdb.in_roster(lsa.src) || !self.lsdb.in_roster(lsa.dst) || lsa.src == lsa.dst {
            return;
        }

        if lsa.reply_to_sync_req {
            // part of a database dump we asked for: apply, do not flood
            if self.lsdb.insert_synced(lsa.src, lsa.dst, lsa.link_cost) {
                self.events.push(MeshEvent::NewLink {
                    src: lsa.src,
                    dst: lsa.dst,
                });
            }
        } else if lsa.link_cost > 0 {
            self.admit_link_up(
                lsa.src,
                lsa.dst,
                lsa.link_cost,
                lsa.seq_nr,
                LsaOrigin::Received { sender: from },
                now,
            );
        } else {
            self.handle_link_down(
                lsa.src,
                lsa.dst,
                lsa.seq_nr,
                LsaOrigin::Received { sender: from },
                now,
            );
        }
    }

    /// The MAC acks get lost often enough that retransmitted frames arrive
    /// as fresh callbacks; a small per-peer seqno history catches them.
    fn runicast_duplicate(&mut self, peer: NodeId, link_seqno: u8) -> bool {
        if let Some(pos) = self.history.iter().position(|&(p, _)| p == peer) {
            if self.history[pos].1 == link_seqno {
                return true;
            }
            self.history[pos].1 = link_seqno;
            return false;
        }
        if self.history.len() >= self.params.history_entries {
            self.history.pop_back();
        }
        self.history.push_front((peer, link_seqno));
        false
    }

    // endregion

    // region Unicast reception: data plane and LSDB sync

    fn on_unicast(&mut self, now: Tick, from: NodeId, bytes: &[u8]) {
        if !self.lsdb.in_roster(from) || from == self.id {
            return;
        }
        self.lsdb.ka_bump(from);
        let packet = match Packet::decode(Channel::Unicast, bytes, self.params.total_nodes as usize)
        {
            Ok(Packet::Data(p)) => p,
            Ok(_) => return,
            Err(_) => {
                self.warn(RoutingWarning::MalformedPacket {
                    from,
                    len: bytes.len(),
                });
                return;
            }
        };

        if packet.is_data {
            self.forward_data(packet, Some(from));
        } else if packet.request_lsdb {
            self.send_lsdb_dump(from, now);
        } else if packet.lsdb_age > 0 {
            // answer to our age query
            self.rx_ages[from as usize - 1] = packet.lsdb_age;
            self.lsdb.neighbours.insert(from);
        }
    }

    fn send_lsdb_age(&mut self, dst: NodeId) {
        let age = self.lsdb.lsdb_age();
        if age == 0 {
            return;
        }
        let reply = DataPacket::age_reply(age, self.params.total_nodes as usize);
        self.outbound.push(RadioCommand::Unicast {
            to: dst,
            bytes: reply.encode(),
        });
    }

    /// Stream our database to a joining node, one reliable unicast per
    /// bridge-sourced live link.
    fn send_lsdb_dump(&mut self, dst: NodeId, now: Tick) {
        let links: Vec<_> = self.lsdb.sync_dump().collect();
        for (src, link_dst, cost) in links {
            let entry = QueueEntry {
                packet: Lsa {
                    reply_to_sync_req: true,
                    link_cost: cost,
                    src,
                    dst: link_dst,
                    seq_nr: self.sequence_number,
                },
                deadline: 0,
                forward: false,
                is_sync_reply: true,
                dst,
                sender: None,
            };
            self.enqueue_entry(entry, now);
        }
    }

    // endregion

    // region Data plane

    /// The greedy forwarding rule, applied at the originating leaf and at
    /// every bridge alike. `from` is the hop the packet arrived from.
    fn forward_data(&mut self, mut packet: DataPacket, from: Option<NodeId>) {
        let sink = self.params.sink_id;
        if self.id == sink {
            let mut path = packet.hops().to_vec();
            path.push(sink);
            self.events.push(MeshEvent::DataDelivered {
                data_type: packet.data_type,
                data: packet.data,
                path,
            });
            return;
        }
        packet.ttl = packet.ttl.saturating_sub(1);
        if packet.ttl == 0 {
            return;
        }
        packet.record_hop(self.id);
        if let Some(next) = self.lsdb.next_hop_toward_sink(self.id, sink, from) {
            self.outbound.push(RadioCommand::Unicast {
                to: next,
                bytes: packet.encode(),
            });
        }
        // no candidate: the mesh is partitioned, drop
    }

    // endregion

    // region Send loop

    /// Drain the queue into the radio. At most one entry is in flight at a
    /// time; an entry whose deadline has not come arms the send timer, and
    /// a busy radio pushes the entry back with a fresh backoff.
    fn pump_send(&mut self, now: Tick) {
        loop {
            if self.pending.is_none() {
                self.pending = self.queue.dequeue();
            }
            let Some(entry) = self.pending.as_ref() else {
                return;
            };
            if entry.deadline > now {
                // the send timer is armed; the next tick past the deadline
                // picks this entry up
                return;
            }
            let entry = self.pending.take().expect("checked above");
            if self.in_flight.is_some() {
                self.enqueue_entry(entry, now);
                continue;
            }
            self.transmit(entry);
        }
    }

    fn transmit(&mut self, entry: QueueEntry) {
        let bytes = entry.packet.encode();
        let dests: VecDeque<NodeId> = if entry.is_sync_reply {
            [entry.dst].into()
        } else {
            self.flood_targets(&entry).into()
        };
        let mut flight = Flight {
            bytes,
            remaining: dests,
        };
        if let Some(first) = flight.remaining.pop_front() {
            self.outbound.push(RadioCommand::Runicast {
                to: first,
                bytes: flight.bytes.clone(),
                max_retx: self.params.runicast_max_retransmissions,
            });
            self.in_flight = Some(flight);
        }
    }

    /// Destinations for a drained advertisement. Originated floods go to
    /// every neighbour we have an outgoing link to (a leaf-sourced link only
    /// to its bridge endpoint); controlled floods exclude the advertised
    /// endpoints and the link-layer sender.
    fn flood_targets(&self, entry: &QueueEntry) -> Vec<NodeId> {
        let mut targets = Vec::new();
        for i in 1..=self.params.total_nodes {
            if i == self.id || !self.lsdb.is_live(self.id, i) {
                continue;
            }
            if entry.forward {
                if i == entry.packet.src || i == entry.packet.dst || Some(i) == entry.sender {
                    continue;
                }
            } else if entry.packet.src % 2 == 0 && i != entry.packet.dst {
                continue;
            }
            targets.push(i);
        }
        targets
    }

    /// The reliable channel freed up: continue the flight or let the next
    /// queue entry through.
    fn on_runicast_done(&mut self) {
        if let Some(flight) = self.in_flight.as_mut() {
            if let Some(next) = flight.remaining.pop_front() {
                let bytes = flight.bytes.clone();
                self.outbound.push(RadioCommand::Runicast {
                    to: next,
                    bytes,
                    max_retx: self.params.runicast_max_retransmissions,
                });
            } else {
                self.in_flight = None;
            }
        }
    }

    // endregion

    // region Console

    fn on_console(&mut self, line: &str) {
        match line.trim() {
            "print.lsdb" => {
                let mut out = String::new();
                for (src, dst, cost) in self.lsdb.live_links() {
                    out.push_str(&format!("{src}->{dst}({cost})\n"));
                }
                self.events
                    .push(MeshEvent::ConsoleReply(out.trim_end().to_string()));
            }
            "print.n" => {
                let mut out = String::from("Neighbour (# Keep alives)\n");
                for id in self.lsdb.neighbours.iter() {
                    out.push_str(&format!("{id} ({}) | ", self.lsdb.ka(id)));
                }
                self.events
                    .push(MeshEvent::ConsoleReply(out.trim_end().to_string()));
            }
            "whoami" => {
                self.events
                    .push(MeshEvent::ConsoleReply(format!("I am: {}", self.id)));
            }
            _ => {}
        }
    }

    // endregion
}
