//! rotctld client driving the rig through the service context.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rotor_common::tracking::{CalibrationCommand, PointingTarget, ReferenceHemisphere};
use rotor_control_unit::rotctl::RotctlSession;
use rotor_control_unit::service::ServiceContext;

use super::{ROTCTL_RIG, cycles, simulated, started};

struct Client {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Client {
    fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self { stream, reader }
    }

    fn send(&mut self, line: &str) -> String {
        self.stream.write_all(line.as_bytes()).unwrap();
        let mut reply = String::new();
        self.reader.read_line(&mut reply).unwrap();
        reply
    }
}

#[test]
fn rotctld_client_points_the_rig() {
    let loaded = simulated(ROTCTL_RIG);
    let (mut runner, hub) = started(&loaded);
    hub.submit_calibration(CalibrationCommand::ConfirmOrigin {
        reference: ReferenceHemisphere::North,
    });
    runner.cycle_body(0);

    let session = RotctlSession::bind("127.0.0.1:0").unwrap();
    let addr = session.local_addr().unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let service = {
        let hub = hub.clone();
        let running = running.clone();
        thread::spawn(move || {
            ServiceContext::new(hub, session).run(running, Duration::from_millis(2))
        })
    };

    let mut client = Client::connect(addr);
    assert_eq!(client.send("P 135.00 45.00\n"), "RPRT 0\n");

    // The received target switches tracking on by itself.
    let deadline = Instant::now() + Duration::from_secs(2);
    while !hub.read().tracking && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    assert!(hub.read().tracking);
    assert_eq!(
        hub.latest_protocol_target(),
        Some(PointingTarget::new(135.0, 45.0))
    );
    assert_eq!(runner.axes().altitude.target_pulse(), 500);

    cycles(&mut runner, 20, 6000);
    assert_eq!(runner.axes().altitude.target_pulse(), 1000);
    assert_eq!(runner.axes().azimuth.target_pulse(), 1500);

    assert_eq!(client.send("p\n"), "135.00 45.00\n");
    assert_eq!(client.send("get_pos\n"), "RPRT -1\n");
    assert_eq!(client.send("q\n"), "RPRT 0\n");

    running.store(false, Ordering::Relaxed);
    service.join().unwrap();
    assert!(hub.read().tracking);
}

#[test]
fn reconnect_after_quit() {
    let hub = rotor_control_unit::hub::TrackingHub::shared();
    let session = RotctlSession::bind("127.0.0.1:0").unwrap();
    let addr = session.local_addr().unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let service = {
        let hub = hub.clone();
        let running = running.clone();
        thread::spawn(move || {
            ServiceContext::new(hub, session).run(running, Duration::from_millis(2))
        })
    };

    let mut first = Client::connect(addr);
    assert_eq!(first.send("P 10 20\n"), "RPRT 0\n");
    assert_eq!(first.send("q\n"), "RPRT 0\n");

    let mut second = Client::connect(addr);
    assert_eq!(second.send("p\n"), "0.00 0.00\n");
    assert_eq!(second.send("P 1e400 2\n"), "RPRT -1\n");

    running.store(false, Ordering::Relaxed);
    service.join().unwrap();
    assert_eq!(
        hub.latest_protocol_target(),
        Some(PointingTarget::new(10.0, 20.0))
    );
}
