//! Trajectory visualization feed.
//!
//! The coordinator pushes every raw Hénon sample, tagged with its orbit's
//! color, into a bounded channel. `OscPlotter` drains that channel on its
//! own thread and forwards points to an OSC scatter viewer. The pipeline
//! never blocks on the viewer: if the channel is full the point is dropped.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};
use rand::Rng;
use rosc::{OscMessage, OscPacket, OscType};
use serde::{Deserialize, Serialize};
use std::io;
use std::net::UdpSocket;
use std::thread::{self, JoinHandle};

pub const POINT_ADDR: &str = "/chaos/point";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub orbit: usize,
    pub x: f64,
    pub y: f64,
    /// RGB, each 0.0–1.0
    pub color: [f32; 3],
}

/// A fresh random RGB color for a new orbit.
pub fn orbit_color<R: Rng>(rng: &mut R) -> [f32; 3] {
    [rng.gen(), rng.gen(), rng.gen()]
}

/// Sending half handed to the coordinator.
#[derive(Clone)]
pub struct PlotFeed {
    tx: Sender<PlotPoint>,
    dropped: u64,
}

impl PlotFeed {
    pub fn new(tx: Sender<PlotPoint>) -> Self {
        Self { tx, dropped: 0 }
    }

    pub fn push(&mut self, point: PlotPoint) {
        match self.tx.try_send(point) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if self.dropped % 1000 == 1 {
                    debug!("Plot viewer lagging, {} points dropped", self.dropped);
                }
            }
            // Viewer gone; plotting is optional
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

pub struct OscPlotter {
    rx: Receiver<PlotPoint>,
    target: String,
}

impl OscPlotter {
    pub fn new(rx: Receiver<PlotPoint>, target: String) -> Self {
        Self { rx, target }
    }

    /// Run the plotter loop until every `PlotFeed` is dropped. Blocks the
    /// calling thread.
    pub fn run(&self) {
        let socket = match UdpSocket::bind("0.0.0.0:0") {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to bind UDP socket: {}", e);
                return;
            }
        };
        info!("OSC plotter → {}", self.target);

        let mut sent: u64 = 0;
        for point in self.rx.iter() {
            match encode_point(&point) {
                Ok(buf) => {
                    if let Err(e) = socket.send_to(&buf, &self.target) {
                        debug!("OSC send error: {}", e);
                    } else {
                        sent += 1;
                    }
                }
                Err(e) => debug!("OSC encode error: {}", e),
            }
        }
        info!("OSC plotter shutting down after {} points", sent);
    }
}

/// A plotter running on its own thread.
pub struct PlotterThread {
    handle: JoinHandle<()>,
}

impl PlotterThread {
    pub fn spawn(rx: Receiver<PlotPoint>, target: String) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name("plotter".into())
            .spawn(move || OscPlotter::new(rx, target).run())?;
        Ok(Self { handle })
    }

    /// Wait for the plotter to drain. Returns false if it panicked.
    pub fn join(self) -> bool {
        match self.handle.join() {
            Ok(()) => true,
            Err(_) => {
                warn!("Plotter thread panicked");
                false
            }
        }
    }
}

/// `/chaos/point x y r g b orbit`
pub fn encode_point(point: &PlotPoint) -> Result<Vec<u8>, rosc::OscError> {
    let msg = OscPacket::Message(OscMessage {
        addr: POINT_ADDR.to_string(),
        args: vec![
            OscType::Float(point.x as f32),
            OscType::Float(point.y as f32),
            OscType::Float(point.color[0]),
            OscType::Float(point.color[1]),
            OscType::Float(point.color[2]),
            OscType::Int(point.orbit as i32),
        ],
    });
    rosc::encoder::encode(&msg)
}
