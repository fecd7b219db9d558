#![cfg(all(unix, feature = "cli"))]

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use qrc_frame::{command, encode};
use serialport::{SerialPort, TTYPort};

fn qrc() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_qrc"));
    cmd.env_remove("QRC_PORT").arg("--log-level").arg("error");
    cmd
}

fn missing_port() -> String {
    format!("/dev/qrc-missing-{}", std::process::id())
}

/// Read one frame (start byte through checksum low byte) from the device side.
fn read_frame(port: &mut TTYPort, deadline: Instant) -> Vec<u8> {
    let mut frame = Vec::new();
    let mut byte = [0u8; 1];
    while Instant::now() < deadline {
        match port.read(&mut byte) {
            Ok(1) => {
                if byte[0] & 0xF0 == 0x80 {
                    frame.clear();
                }
                frame.push(byte[0]);
                if frame.len() >= 5 && frame.len() % 2 == 1 && byte[0] & 0xF0 == 0x20 {
                    return frame;
                }
            }
            // Timeouts, and EIO until the CLI has opened the slave side.
            _ => thread::sleep(Duration::from_millis(5)),
        }
    }
    panic!("no request frame before deadline, got {frame:02x?}");
}

#[test]
fn version_prints_package_version() {
    let output = qrc().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("qrc {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn extended_version_lists_baud_table() {
    let output = qrc()
        .args(["version", "--extended"])
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: qrc"));
    assert!(stdout.contains("baud_rates: 9600,14400,19200,28800,38400,57600,76800,115200"));
}

#[test]
fn ports_outputs_json() {
    let output = qrc()
        .args(["--format", "json", "ports"])
        .output()
        .expect("ports should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"ports\":["));
}

#[test]
fn missing_port_returns_transport_error() {
    let output = qrc()
        .args(["hello", &missing_port()])
        .output()
        .expect("hello should run");
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("open"));
}

#[test]
fn port_can_come_from_env() {
    let output = qrc()
        .env("QRC_PORT", missing_port())
        .args(["get", "keys"])
        .output()
        .expect("get should run");
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn invalid_arguments_are_rejected_before_open() {
    let output = qrc()
        .args(["set-baudrate", &missing_port(), "--rate", "4800"])
        .output()
        .expect("set-baudrate should run");
    assert_eq!(output.status.code(), Some(64));

    let output = qrc()
        .args(["set-leds", &missing_port(), "--on", "3,80"])
        .output()
        .expect("set-leds should run");
    assert_eq!(output.status.code(), Some(64));

    let output = qrc()
        .args(["smart-led", &missing_port(), "--led", "1", "--rgb", "1,2"])
        .output()
        .expect("smart-led should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn get_keys_over_pseudo_terminal() {
    let Ok((mut device, line)) = TTYPort::pair() else {
        eprintln!("pseudo-terminals unavailable, skipping");
        return;
    };
    let Some(line_name) = line.name() else {
        eprintln!("pseudo-terminal has no name, skipping");
        return;
    };
    drop(line);

    let child = qrc()
        .args(["--format", "json", "get", "keys", &line_name, "-a", "1"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("get should start");

    let request = read_frame(&mut device, Instant::now() + Duration::from_secs(5));
    assert_eq!(request, encode(1, command::GET_KEYS, &[]).to_vec());

    let reply = encode(1, command::GET_KEYS, &[0b0000_0101, 0x00, 0x02]);
    device.write_all(&reply).expect("reply should be written");

    let output = child.wait_with_output().expect("get should finish");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "status {:?}, stderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("\"event\":\"keys\""), "stdout: {stdout}");
    assert!(stdout.contains("\"keys\":[true,false,true,false"), "stdout: {stdout}");
}

#[test]
fn silent_device_times_out_over_pseudo_terminal() {
    let Ok((mut device, line)) = TTYPort::pair() else {
        eprintln!("pseudo-terminals unavailable, skipping");
        return;
    };
    let Some(line_name) = line.name() else {
        eprintln!("pseudo-terminal has no name, skipping");
        return;
    };
    drop(line);

    let child = qrc()
        .args(["--format", "json", "hello", &line_name, "-a", "2"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("hello should start");

    let request = read_frame(&mut device, Instant::now() + Duration::from_secs(5));
    assert_eq!(request, encode(2, command::HELLO, &[]).to_vec());

    let output = child.wait_with_output().expect("hello should finish");
    assert_eq!(output.status.code(), Some(124));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"event\":\"timeout\""), "stdout: {stdout}");
}
