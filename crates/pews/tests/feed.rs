use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use pews::{
    parse_timestamp, Feed, FeedClock, FeedErr, Fetch, Field, Phase, Region, Simulation,
    TimeSource,
};

#[derive(Debug, PartialEq, Eq)]
struct Unreachable;

impl fmt::Display for Unreachable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("host unreachable")
    }
}

impl std::error::Error for Unreachable {}

// Serves canned bodies; unknown URLs are a non-200 response
#[derive(Debug, Default)]
struct Canned {
    bodies: HashMap<String, Vec<u8>>,
    offline: bool,
    requested: Vec<String>,
}

impl Canned {
    fn serve(&mut self, url: &str, body: Vec<u8>) {
        self.bodies.insert(url.to_owned(), body);
    }
}

impl Fetch for Canned {
    type Error = Unreachable;

    fn fetch(&mut self, url: &str) -> Result<Option<Vec<u8>>, Unreachable> {
        self.requested.push(url.to_owned());
        if self.offline {
            return Err(Unreachable);
        }
        Ok(self.bodies.get(url).cloned())
    }
}

// Wall clock under test control
#[derive(Clone, Debug)]
struct Wall(Arc<Mutex<DateTime<Utc>>>);

impl Wall {
    fn at(ts: &str) -> Self {
        Wall(Arc::new(Mutex::new(parse_timestamp(ts).unwrap())))
    }

    fn advance(&self, secs: i64) {
        let mut now = self.0.lock().unwrap();
        *now = *now + Duration::seconds(secs);
    }
}

impl TimeSource for Wall {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

// MSB-first bit packer
#[derive(Default)]
struct Packer {
    bits: Vec<bool>,
}

impl Packer {
    fn push(&mut self, value: u64, width: usize) -> &mut Self {
        for i in (0..width).rev() {
            self.bits.push(i < 64 && (value >> i) & 1 == 1);
        }
        self
    }

    fn len(&self) -> usize {
        self.bits.len()
    }

    fn bytes(&self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|byte| {
                byte.iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, b)| acc | ((*b as u8) << (7 - i)))
            })
            .collect()
    }
}

const BASE: &str = "http://pews.test/data";

fn station_list_payload() -> Vec<u8> {
    let mut p = Packer::default();
    for (lat, lon) in [(3756, 12697), (3510, 12907), (3351, 12653)] {
        p.push(lat - 3000, 10).push(lon - 12000, 10);
    }
    p.bytes()
}

// Real-time alert for three stations
fn alert_payload(area_mask: u64, epicenter: &str) -> Vec<u8> {
    let mut p = Packer::default();
    p.push(0, 1).push(0b10, 2).push(0, 3).push(21_007_177, 26);
    p.push(1, 4).push(4, 4).push(7, 4);
    p.push(0, 4);

    let block_start = p.len();
    p.push(309, 10)
        .push(619, 10)
        .push(0b0000110, 7)
        .push(17, 9)
        .push(1_639_437_539, 33)
        .push(21_007_178, 26)
        .push(5, 4)
        .push(area_mask, 17);
    let used = p.len() - block_start;
    p.push(0, 600 - used);

    let mut bytes = p.bytes();
    let name_start = bytes.len() - 60;
    bytes[name_start..name_start + epicenter.len()].copy_from_slice(epicenter.as_bytes());
    bytes
}

fn realtime_feed(wall: &Wall) -> Feed<Canned, Wall> {
    let clock = Arc::new(FeedClock::with_time_source(wall.clone()));
    Feed::new(Canned::default(), clock).with_base_url(BASE)
}

#[test]
fn realtime_cycle() {
    let wall = Wall::at("20230214081904");
    let mut fetcher = Canned::default();
    fetcher.serve(
        "http://pews.test/data/20230214081903.s",
        station_list_payload(),
    );
    fetcher.serve(
        "http://pews.test/data/20230214081903.b",
        alert_payload(0b00000000000000001, "제주 서귀포시 서남서쪽 41km 해역"),
    );

    let clock = Arc::new(FeedClock::with_time_source(wall.clone()));
    let mut feed = Feed::new(fetcher, clock).with_base_url(BASE);

    let stations = feed.station_list().expect("station list");
    assert_eq!(3, stations.len());
    assert_eq!(3756, stations[0].latitude());
    assert_eq!(12653, stations[2].longitude());

    let msg = feed
        .station_data(stations.len())
        .expect("station data")
        .expect("message");
    assert_eq!(Phase::Alert, msg.phase());
    assert_eq!(Some("2021007177"), msg.last_earthquake_id());
    assert_eq!(stations.len(), msg.mmi().len());
    assert_eq!(&[1, 4, 7], msg.mmi());

    let eq = msg.earthquake_info().expect("earthquake info");
    assert_eq!(6, eq.magnitude());
    assert_eq!(17, eq.depth());
    assert_eq!("2021007178", eq.earthquake_id());
    assert_eq!("1639469939000", eq.occurred_at());
    assert_eq!(&[Region::Jeju], eq.max_intensity_area());
    assert_eq!("제주 서귀포시 서남서쪽 41km 해역", eq.epicenter_name());

    assert_eq!(
        vec![
            "http://pews.test/data/20230214081903.s".to_owned(),
            "http://pews.test/data/20230214081903.b".to_owned(),
        ],
        feed.fetcher().requested
    );
}

#[test]
fn missing_snapshot_is_not_an_error() {
    let wall = Wall::at("20230214081904");
    let mut feed = realtime_feed(&wall);

    assert!(feed.station_list().expect("station list").is_empty());
    assert_eq!(None, feed.station_data(250).expect("station data"));
}

#[test]
fn transport_error_propagates() {
    let wall = Wall::at("20230214081904");
    let clock = Arc::new(FeedClock::with_time_source(wall));
    let fetcher = Canned {
        offline: true,
        ..Canned::default()
    };
    let mut feed = Feed::new(fetcher, clock).with_base_url(BASE);

    match feed.station_list() {
        Err(FeedErr::Transport { url, source }) => {
            assert_eq!("http://pews.test/data/20230214081903.s", url);
            assert_eq!(Unreachable, source);
        }
        other => panic!("expected transport error, got {:?}", other),
    }

    let err = feed.station_data(3).unwrap_err();
    assert_eq!(
        "unable to fetch http://pews.test/data/20230214081903.b: host unreachable",
        format!("{}", err)
    );
}

#[test]
fn truncated_message_is_a_decode_error() {
    let wall = Wall::at("20230214081904");
    let mut fetcher = Canned::default();
    // alert header with no earthquake block
    fetcher.serve(
        "http://pews.test/data/20230214081903.b",
        vec![0b0100_0000, 0, 0, 1, 0x12],
    );
    let clock = Arc::new(FeedClock::with_time_source(wall));
    let mut feed = Feed::new(fetcher, clock).with_base_url(BASE);

    match feed.station_data(2) {
        Err(FeedErr::Decode(err)) => assert_eq!(Field::EarthquakeBlock, err.field()),
        other => panic!("expected decode error, got {:?}", other),
    }
}

#[test]
fn simulation_switches_url_and_layout() {
    let wall = Wall::at("20230214081904");
    let feed = realtime_feed(&wall);
    feed.clock().arm(Simulation::new(
        parse_timestamp("20211214081905").unwrap(),
        "2021007178",
        Duration::seconds(30),
    ));
    wall.advance(27);

    // simulation header is eight bits: update flag set, phase Normal
    let mut p = Packer::default();
    p.push(1, 1).push(0b00, 2).push(0, 5);
    p.push(9, 4).push(3, 4).push(0, 4).push(0, 4);

    let mut fetcher = Canned::default();
    fetcher.serve(
        "http://pews.test/data/2021007178/20211214081931.b",
        p.bytes(),
    );
    let mut feed = Feed::new(fetcher, feed.clock().clone()).with_base_url(BASE);

    let msg = feed.station_data(3).expect("station data").expect("message");
    assert!(msg.station_update_needed());
    assert_eq!(Phase::Normal, msg.phase());
    assert_eq!(None, msg.last_earthquake_id());
    assert_eq!(&[9, 3, 1], msg.mmi());

    // the simulation runs out; the same feed falls back to real time
    wall.advance(4);
    assert_eq!(None, feed.station_data(3).expect("station data"));
    assert!(!feed.clock().is_simulating());
    assert_eq!(
        Some(&"http://pews.test/data/20230214081934.b".to_owned()),
        feed.fetcher().requested.last()
    );
}

#[cfg(feature = "serde")]
#[test]
fn serializes_as_camel_case() {
    let wall = Wall::at("20230214081904");
    let mut fetcher = Canned::default();
    fetcher.serve(
        "http://pews.test/data/20230214081903.b",
        alert_payload(0x1ffff, "abc"),
    );
    let clock = Arc::new(FeedClock::with_time_source(wall));
    let mut feed = Feed::new(fetcher, clock).with_base_url(BASE);
    let msg = feed.station_data(3).unwrap().unwrap();

    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(serde_json::json!(2), json["phase"]);
    assert_eq!(serde_json::json!(false), json["stationUpdateNeeded"]);
    assert_eq!(serde_json::json!([1, 4, 7]), json["mmi"]);
    assert_eq!(
        serde_json::json!([]),
        json["earthquakeInfo"]["maxIntensityArea"]
    );
    assert_eq!(
        serde_json::json!("abc"),
        json["earthquakeInfo"]["epicenterName"]
    );
}
