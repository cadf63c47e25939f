use std::ffi::{c_char, c_void, CStr};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use anvil_device::{report, DataType, Device, DeviceConfig, Handle, StatusCode, StatusReport, StatusSeverity};

type Seen = Arc<Mutex<Vec<(Handle, DataType, StatusSeverity, StatusCode, String)>>>;

fn capturing(threshold: StatusSeverity) -> (Device, Seen) {
    let seen: Seen = Arc::default();
    let sink_seen = Arc::clone(&seen);
    let config = DeviceConfig::default()
        .with_threshold(threshold)
        .with_sink(move |r: &StatusReport<'_>| {
            sink_seen
                .lock()
                .unwrap()
                .push((r.source, r.source_type, r.severity, r.code, r.message.as_str().to_owned()));
        });
    (Device::new(config), seen)
}

#[test]
fn formatted_message_is_delivered_exactly() {
    let (device, seen) = capturing(StatusSeverity::Debug);
    let frame = device.new_frame();
    report!(device, frame, StatusSeverity::Warning, StatusCode::InvalidArgument, "code={} msg={}", 7, "oops");

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen.as_slice(),
        [(frame, DataType::Frame, StatusSeverity::Warning, StatusCode::InvalidArgument, "code=7 msg=oops".to_owned())]
    );
}

#[test]
fn threshold_filters_by_severity() {
    let (device, seen) = capturing(StatusSeverity::Warning);
    report!(device, Handle::DEVICE, StatusSeverity::Debug, StatusCode::NoError, "debug");
    report!(device, Handle::DEVICE, StatusSeverity::PerformanceWarning, StatusCode::NoError, "slow");
    report!(device, Handle::DEVICE, StatusSeverity::Warning, StatusCode::NoError, "warn");
    report!(device, Handle::DEVICE, StatusSeverity::FatalError, StatusCode::NoError, "fatal");

    let messages: Vec<_> = seen.lock().unwrap().iter().map(|e| e.4.clone()).collect();
    assert_eq!(messages, ["warn", "fatal"]);
}

#[test]
fn unknown_sources_report_unknown_type() {
    let (device, seen) = capturing(StatusSeverity::Debug);
    report!(device, Handle::from_raw(77), StatusSeverity::Info, StatusCode::NoError, "who");
    assert_eq!(seen.lock().unwrap()[0].1, DataType::Unknown);
}

#[test]
fn torn_down_devices_are_silent() {
    let (device, seen) = capturing(StatusSeverity::Debug);
    device.release(Handle::DEVICE);
    report!(device, Handle::DEVICE, StatusSeverity::Error, StatusCode::UnknownError, "late");
    assert!(seen.lock().unwrap().is_empty());
}

static C_SEEN: Mutex<Vec<(usize, usize, u32, u32, String)>> = Mutex::new(Vec::new());

unsafe extern "C" fn c_sink(
    user_data: *const c_void,
    _device: usize,
    source: usize,
    source_type: u32,
    severity: u32,
    _code: u32,
    message: *const c_char,
) {
    // SAFETY: the message is NUL-terminated for the duration of the call.
    let text = unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned();
    C_SEEN.lock().unwrap().push((user_data as usize, source, source_type, severity, text));
}

#[test]
fn committed_callback_replaces_the_default_sink() {
    let (device, seen) = capturing(StatusSeverity::Debug);
    let world = device.new_object(DataType::World, None);

    // SAFETY: `c_sink` is thread safe and ignores its user data.
    unsafe { device.set_status_callback(Some(c_sink), 0x5150 as *const c_void) };
    report!(device, world, StatusSeverity::Info, StatusCode::NoError, "before commit");
    device.commit_parameters(Handle::DEVICE);
    report!(device, world, StatusSeverity::Info, StatusCode::NoError, "after {}", "commit");

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(
        *C_SEEN.lock().unwrap(),
        [(0x5150, world.raw(), DataType::World.raw(), StatusSeverity::Info as u32, "after commit".to_owned())]
    );

    // Removing the parameter brings the default sink back.
    device.unset_parameter(Handle::DEVICE, "statusCallback");
    device.commit_parameters(Handle::DEVICE);
    report!(device, world, StatusSeverity::Info, StatusCode::NoError, "default again");
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(C_SEEN.lock().unwrap().len(), 1);
}

#[test]
fn sinks_may_call_back_into_the_device() {
    let observed = Arc::new(Mutex::new(Vec::new()));
    let slot: Arc<Mutex<Option<Device>>> = Arc::default();
    let (sink_slot, sink_observed) = (Arc::clone(&slot), Arc::clone(&observed));
    let device = Device::new(DeviceConfig::default().with_sink(move |r: &StatusReport<'_>| {
        if let Some(device) = sink_slot.lock().unwrap().as_ref() {
            sink_observed.lock().unwrap().push(device.resolve(r.source).is_some());
        }
    }));
    *slot.lock().unwrap() = Some(device.clone());

    let light = device.new_object(DataType::Light, Some("directional"));
    device.set_parameter(light, "color", DataType::Float32Vec3, &[0u8; 2]);
    assert_eq!(*observed.lock().unwrap(), [true]);

    // Break the device -> sink -> device cycle.
    slot.lock().unwrap().take();
}

#[test]
fn sinks_may_recommit_the_reporting_object() {
    let slot: Arc<Mutex<Option<Device>>> = Arc::default();
    let sink_slot = Arc::clone(&slot);
    let device = Device::new(DeviceConfig::default().with_sink(move |r: &StatusReport<'_>| {
        if !r.message.as_str().contains("unknown handle") {
            return;
        }
        let device = sink_slot.lock().unwrap().clone();
        if let Some(device) = device {
            device.unset_parameter(r.source, "geometry");
            device.commit_parameters(r.source);
        }
    }));
    *slot.lock().unwrap() = Some(device.clone());

    let surface = device.new_object(DataType::Surface, None);
    device.set_object(surface, "geometry", DataType::Geometry, Handle::from_raw(99));

    let (done, finished) = mpsc::channel();
    let committer = device.clone();
    thread::spawn(move || {
        committer.commit_parameters(surface);
        let _ = done.send(());
    });
    assert!(finished.recv_timeout(Duration::from_secs(5)).is_ok(), "commit from inside the sink blocked");

    let cell = device.resolve(surface).unwrap();
    assert!(cell.object().params().committed().get("geometry").is_none());
    drop(cell);
    slot.lock().unwrap().take();
}
