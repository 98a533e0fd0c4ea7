use std::sync::{Mutex, Once};

use elastic_alloc::{Config, GrowVec, Traced, TryGlobal};
use log::{LevelFilter, Log, Metadata, Record};

struct Capture(Mutex<Vec<String>>);

impl Log for Capture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut lines) = self.0.lock() {
            lines.push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture(Mutex::new(Vec::new()));
static INIT: Once = Once::new();

fn lines_for(tag: &str) -> Vec<String> {
    CAPTURE
        .0
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.starts_with(tag))
        .cloned()
        .collect()
}

fn install() {
    INIT.call_once(|| {
        log::set_logger(&CAPTURE).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
}

#[test]
fn every_call_is_logged_with_its_context() {
    install();
    let mut v: GrowVec<u64, usize, Traced<TryGlobal>, &str> =
        GrowVec::with_config(Config::new(Traced(TryGlobal), "traced-vec"));
    for i in 0..3 {
        v.push(i).unwrap();
    }
    v.release();

    assert_eq!(
        lines_for("\"traced-vec\""),
        [
            "\"traced-vec\": reallocating 0 B -> 16 B",
            "\"traced-vec\": reallocating 16 B -> 32 B",
            "\"traced-vec\": releasing 32 B",
        ]
    );
}

#[test]
fn contexts_keep_vectors_apart() {
    install();
    let mut a: GrowVec<u8, u8, Traced<TryGlobal>, u32> =
        GrowVec::with_config(Config::new(Traced(TryGlobal), 7001));
    let mut b: GrowVec<u8, u8, Traced<TryGlobal>, u32> =
        GrowVec::with_config(Config::new(Traced(TryGlobal), 7002));
    a.push(1).unwrap();
    b.insert(9, 1).unwrap();
    drop(a);

    assert_eq!(lines_for("7001:").len(), 2);
    assert_eq!(lines_for("7002:"), ["7002: reallocating 0 B -> 16 B"]);
}
