//! Integration tests for the bulk transfer pipeline
//!
//! Exercises the asynchronous read/write path over the scripted bus:
//! zero-length fast paths, short reads, the two failure layers, and
//! independence of concurrent operations.

use driver::testing::ScriptedBus;
use driver::{ChipVariant, Error, IoOutcome, LifecycleEvent, SerialDevice};
use protocol::BusError;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

fn started_device() -> (Arc<ScriptedBus>, Arc<SerialDevice>) {
    let bus = Arc::new(ScriptedBus::new());
    let device = Arc::new(SerialDevice::new(
        "ch341-serial0",
        Arc::clone(&bus) as Arc<dyn driver::Bus>,
        ChipVariant::Hx,
    ));
    device.handle_event(LifecycleEvent::Start).unwrap();
    (bus, device)
}

fn collect(rx: &mpsc::Receiver<IoOutcome>) -> IoOutcome {
    rx.recv().unwrap()
}

#[test]
fn test_zero_length_read_completes_inline() {
    let (bus, device) = started_device();
    let baseline = bus.submission_count();

    let (tx, rx) = mpsc::channel();
    device
        .read(0, Box::new(move |outcome| tx.send(outcome).unwrap()))
        .unwrap();
    let outcome = collect(&rx);
    assert!(outcome.status.is_ok());
    assert_eq!(outcome.bytes_transferred, 0);
    assert_eq!(bus.submission_count(), baseline);
}

#[test]
fn test_zero_length_write_completes_inline() {
    let (bus, device) = started_device();
    let baseline = bus.submission_count();

    let (tx, rx) = mpsc::channel();
    device
        .write(Vec::new(), Box::new(move |outcome| tx.send(outcome).unwrap()))
        .unwrap();
    let outcome = collect(&rx);
    assert!(outcome.status.is_ok());
    assert_eq!(outcome.bytes_transferred, 0);
    assert_eq!(bus.submission_count(), baseline);
}

#[test]
fn test_short_read_is_a_success() {
    let (bus, device) = started_device();
    bus.queue_read(vec![0x41, 0x42, 0x43]);

    let (tx, rx) = mpsc::channel();
    device
        .read(64, Box::new(move |outcome| tx.send(outcome).unwrap()))
        .unwrap();
    let outcome = collect(&rx);
    assert!(outcome.status.is_ok());
    assert_eq!(outcome.bytes_transferred, 3);
    assert_eq!(outcome.data, vec![0x41, 0x42, 0x43]);
}

#[test]
fn test_write_reports_the_bytes_sent() {
    let (_bus, device) = started_device();

    let (tx, rx) = mpsc::channel();
    device
        .write(
            vec![0u8; 17],
            Box::new(move |outcome| tx.send(outcome).unwrap()),
        )
        .unwrap();
    let outcome = collect(&rx);
    assert!(outcome.status.is_ok());
    assert_eq!(outcome.bytes_transferred, 17);
}

#[test]
fn test_protocol_failure_reports_zero_bytes_with_ok_status() {
    let (bus, device) = started_device();
    bus.stall_bulk();

    let (tx, rx) = mpsc::channel();
    device
        .read(16, Box::new(move |outcome| tx.send(outcome).unwrap()))
        .unwrap();
    let outcome = collect(&rx);
    assert!(outcome.status.is_ok());
    assert_eq!(outcome.bytes_transferred, 0);
    assert!(outcome.data.is_empty());
}

#[test]
fn test_bus_failure_carries_through() {
    let (bus, device) = started_device();
    bus.fail_bulk(BusError::NoDevice);

    let (tx, rx) = mpsc::channel();
    device
        .read(16, Box::new(move |outcome| tx.send(outcome).unwrap()))
        .unwrap();
    let outcome = collect(&rx);
    assert!(matches!(outcome.status, Err(Error::Bus(BusError::NoDevice))));
    assert_eq!(outcome.bytes_transferred, 0);
}

#[test]
fn test_concurrent_read_and_write_complete_independently() {
    let (bus, device) = started_device();
    bus.fail_bulk_in(BusError::Timeout);

    let (read_tx, read_rx) = mpsc::channel();
    let (write_tx, write_rx) = mpsc::channel();

    let reader = {
        let device = Arc::clone(&device);
        thread::spawn(move || {
            device
                .read(32, Box::new(move |outcome| read_tx.send(outcome).unwrap()))
                .unwrap();
        })
    };
    let writer = {
        let device = Arc::clone(&device);
        thread::spawn(move || {
            device
                .write(
                    vec![0xAA; 8],
                    Box::new(move |outcome| write_tx.send(outcome).unwrap()),
                )
                .unwrap();
        })
    };
    reader.join().unwrap();
    writer.join().unwrap();

    let read_outcome = read_rx.recv().unwrap();
    assert!(matches!(
        read_outcome.status,
        Err(Error::Bus(BusError::Timeout))
    ));
    assert_eq!(read_outcome.bytes_transferred, 0);

    let write_outcome = write_rx.recv().unwrap();
    assert!(write_outcome.status.is_ok());
    assert_eq!(write_outcome.bytes_transferred, 8);
}
