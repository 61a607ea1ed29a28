//! Integration tests for the device lifecycle state machine
//!
//! Drives a device over the scripted bus through start, query/cancel
//! pairs, stop, removal and surprise removal, and checks the terminal
//! state short-circuits everything.

use driver::testing::ScriptedBus;
use driver::{
    handle_serial_request, ChipVariant, Error, LifecycleEvent, PnpState, SerialDevice,
    SerialRequest,
};
use protocol::requests::SET_CONFIGURATION_REQUEST;
use protocol::TransferKind;
use std::sync::mpsc;
use std::sync::Arc;

fn device_on(bus: &Arc<ScriptedBus>) -> SerialDevice {
    SerialDevice::new("ch341-serial0", Arc::clone(bus) as Arc<dyn driver::Bus>, ChipVariant::Hx)
}

fn started_device(bus: &Arc<ScriptedBus>) -> SerialDevice {
    let device = device_on(bus);
    device.handle_event(LifecycleEvent::Start).unwrap();
    device
}

fn set_configuration_values(bus: &ScriptedBus) -> Vec<u16> {
    bus.submissions()
        .into_iter()
        .filter_map(|kind| match kind {
            TransferKind::Control { request, value, .. }
                if request == SET_CONFIGURATION_REQUEST =>
            {
                Some(value)
            }
            _ => None,
        })
        .collect()
}

mod query_cancel {
    use super::*;

    #[test]
    fn test_query_stop_then_cancel_round_trips() {
        let bus = Arc::new(ScriptedBus::new());
        let device = started_device(&bus);

        device.handle_event(LifecycleEvent::QueryStop).unwrap();
        assert_eq!(device.state(), PnpState::StopPending);
        device.handle_event(LifecycleEvent::CancelStop).unwrap();
        assert_eq!(device.state(), PnpState::Started);
    }

    #[test]
    fn test_query_remove_then_cancel_round_trips_from_any_state() {
        let bus = Arc::new(ScriptedBus::new());
        let device = device_on(&bus);

        // Never started; the pair must restore NotStarted.
        device.handle_event(LifecycleEvent::QueryRemove).unwrap();
        assert_eq!(device.state(), PnpState::RemovePending);
        device.handle_event(LifecycleEvent::CancelRemove).unwrap();
        assert_eq!(device.state(), PnpState::NotStarted);
    }

    #[test]
    fn test_query_and_cancel_touch_no_hardware() {
        let bus = Arc::new(ScriptedBus::new());
        let device = started_device(&bus);
        let baseline = bus.submission_count();

        device.handle_event(LifecycleEvent::QueryStop).unwrap();
        device.handle_event(LifecycleEvent::CancelStop).unwrap();
        assert_eq!(bus.submission_count(), baseline);
    }
}

mod stop_and_remove {
    use super::*;

    #[test]
    fn test_stop_unconfigures_but_keeps_the_instance() {
        let bus = Arc::new(ScriptedBus::new());
        let device = started_device(&bus);

        device.handle_event(LifecycleEvent::QueryStop).unwrap();
        device.handle_event(LifecycleEvent::Stop).unwrap();
        assert_eq!(device.state(), PnpState::Stopped);

        // One select at start, one deconfigure at stop.
        assert_eq!(set_configuration_values(&bus), vec![1, 0]);

        // Data path is gone, the instance is not.
        let err = device.write(vec![1], Box::new(|_| {})).unwrap_err();
        assert!(matches!(err, Error::NotConfigured));
        assert_eq!(device.get_baud_rate().unwrap(), 115_200);
    }

    #[test]
    fn test_stop_completes_even_when_deconfigure_fails() {
        let bus = Arc::new(ScriptedBus::new());
        let device = started_device(&bus);

        bus.fail_request(SET_CONFIGURATION_REQUEST);
        device.handle_event(LifecycleEvent::QueryStop).unwrap();
        device.handle_event(LifecycleEvent::Stop).unwrap();
        assert_eq!(device.state(), PnpState::Stopped);

        // Endpoints were released even though the chip never saw the
        // deconfigure.
        let err = device.write(vec![1], Box::new(|_| {})).unwrap_err();
        assert!(matches!(err, Error::NotConfigured));
    }

    #[test]
    fn test_remove_reaches_the_terminal_state() {
        let bus = Arc::new(ScriptedBus::new());
        let device = started_device(&bus);

        device.handle_event(LifecycleEvent::QueryRemove).unwrap();
        device.handle_event(LifecycleEvent::Remove).unwrap();
        assert_eq!(device.state(), PnpState::Deleted);
    }

    #[test]
    fn test_remove_after_surprise_removal_skips_deconfigure() {
        let bus = Arc::new(ScriptedBus::new());
        let device = started_device(&bus);

        device.handle_event(LifecycleEvent::SurpriseRemoval).unwrap();
        assert_eq!(device.state(), PnpState::SurpriseRemovePending);
        device.handle_event(LifecycleEvent::Remove).unwrap();
        assert_eq!(device.state(), PnpState::Deleted);

        // Select at start, deconfigure at surprise removal, nothing at
        // remove.
        assert_eq!(set_configuration_values(&bus), vec![1, 0]);
    }

    #[test]
    fn test_surprise_removal_swallows_teardown_failure() {
        let bus = Arc::new(ScriptedBus::new());
        let device = started_device(&bus);

        bus.fail_request(SET_CONFIGURATION_REQUEST);
        device.handle_event(LifecycleEvent::SurpriseRemoval).unwrap();
        assert_eq!(device.state(), PnpState::SurpriseRemovePending);
    }
}

mod terminal_state {
    use super::*;

    #[test]
    fn test_deleted_fails_everything_without_hardware_access() {
        let bus = Arc::new(ScriptedBus::new());
        let device = started_device(&bus);
        device.handle_event(LifecycleEvent::QueryRemove).unwrap();
        device.handle_event(LifecycleEvent::Remove).unwrap();
        let baseline = bus.submission_count();
        let forwarded = bus.forwarded_events().len();

        assert!(matches!(
            device.handle_event(LifecycleEvent::Start),
            Err(Error::NoSuchDevice)
        ));
        assert!(matches!(
            device.handle_event(LifecycleEvent::Other(0x17)),
            Err(Error::NoSuchDevice)
        ));
        assert!(matches!(device.set_dtr(true), Err(Error::NoSuchDevice)));
        assert!(matches!(device.get_line_coding(), Err(Error::NoSuchDevice)));
        assert!(matches!(
            handle_serial_request(&device, SerialRequest::GetBaudRate),
            Err(Error::NoSuchDevice)
        ));

        let (tx, rx) = mpsc::channel();
        let err = device
            .read(16, Box::new(move |outcome| tx.send(outcome).unwrap()))
            .unwrap_err();
        assert!(matches!(err, Error::NoSuchDevice));
        assert!(rx.try_recv().is_err());

        assert_eq!(bus.submission_count(), baseline);
        assert_eq!(bus.forwarded_events().len(), forwarded);
    }
}

mod event_forwarding {
    use super::*;

    #[test]
    fn test_unlisted_events_pass_through() {
        let bus = Arc::new(ScriptedBus::new());
        let device = device_on(&bus);

        device.handle_event(LifecycleEvent::Other(0x0D)).unwrap();
        assert_eq!(bus.forwarded_events(), vec![LifecycleEvent::Other(0x0D)]);
        assert_eq!(device.state(), PnpState::NotStarted);
        assert_eq!(bus.submission_count(), 0);
    }

    #[test]
    fn test_start_is_forwarded_before_local_work() {
        let bus = Arc::new(ScriptedBus::new());
        let device = device_on(&bus);
        bus.fail_start_forward();

        let err = device.handle_event(LifecycleEvent::Start).unwrap_err();
        assert!(matches!(err, Error::Bus(_)));
        assert_eq!(device.state(), PnpState::NotStarted);
        assert_eq!(bus.submission_count(), 0);
    }
}
