#![cfg(unix)]

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use pose_relay::transport::{
    ChannelMode, DispatchErrorKind, FrameDispatcher, PipeConnector, RetryPolicy, StreamDecoder,
};
use pose_relay::{map_landmarks, Canvas, Landmark, LandmarkSet, MappedFrame};

fn make_fifo(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("SpineControlPipe");
    let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    assert_eq!(rc, 0, "mkfifo failed: {}", std::io::Error::last_os_error());
    path
}

fn open_reader(path: &Path) -> File {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .expect("open fifo reader")
}

fn frame(shift: f64) -> MappedFrame {
    let set = LandmarkSet::from_fn(|part| Landmark::new(0.05 * part.index() as f64 + shift, 0.5));
    map_landmarks(&set, Canvas::default())
}

fn dispatcher(path: &Path, mode: ChannelMode) -> FrameDispatcher {
    FrameDispatcher::from_connector(PipeConnector::new(path), mode, RetryPolicy::immediate())
}

/// Read whatever the closed writer left in the pipe.
fn drain(reader: &mut File) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return bytes,
            Ok(n) => bytes.extend_from_slice(&buf[..n]),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => return bytes,
            Err(err) => panic!("fifo read failed: {}", err),
        }
    }
}

#[test]
fn persistent_channel_streams_newline_delimited_messages() {
    let dir = tempfile::tempdir().unwrap();
    let path = make_fifo(&dir);
    let mut reader = open_reader(&path);

    let frames = vec![frame(0.0), frame(0.1), frame(0.2)];
    let mut dispatcher = dispatcher(&path, ChannelMode::Persistent);
    for mapped in &frames {
        dispatcher.dispatch(mapped.clone()).expect("dispatch");
    }
    assert!(dispatcher.is_connected());
    assert_eq!(dispatcher.stats().connect_attempts, 1);
    drop(dispatcher);

    let bytes = drain(&mut reader);
    assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 3);
    let decoded: Vec<_> = StreamDecoder::new()
        .push(&bytes)
        .into_iter()
        .map(|message| message.expect("decode").points)
        .collect();
    assert_eq!(decoded, frames);
}

#[test]
fn per_message_channel_closes_after_each_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = make_fifo(&dir);
    let mut reader = open_reader(&path);

    let mut dispatcher = dispatcher(&path, ChannelMode::PerMessage);
    dispatcher.dispatch(frame(0.0)).expect("first dispatch");
    dispatcher.dispatch(frame(0.3)).expect("second dispatch");
    assert!(!dispatcher.is_connected());
    assert_eq!(dispatcher.stats().connect_attempts, 2);

    let bytes = drain(&mut reader);
    let messages = StreamDecoder::new().push(&bytes);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].as_ref().unwrap().points, frame(0.3));
}

#[test]
fn fifo_without_reader_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = make_fifo(&dir);

    let mut dispatcher = dispatcher(&path, ChannelMode::Persistent);
    let err = dispatcher.dispatch(frame(0.0)).expect_err("no reader");
    assert_eq!(err.kind(), DispatchErrorKind::Unavailable);
    assert_eq!(err.reason(), "channel_unavailable");

    // The consumer attaches; the next frame gets through.
    let mut reader = open_reader(&path);
    dispatcher.dispatch(frame(0.1)).expect("connect");
    // Nothing was held before, so this is a first connect.
    assert_eq!(dispatcher.stats().reconnects, 0);
    dispatcher.disconnect();

    let messages = StreamDecoder::new().push(&drain(&mut reader));
    assert_eq!(messages.len(), 1);
}

#[test]
fn reader_closing_between_frames_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let path = make_fifo(&dir);
    let mut first_reader = open_reader(&path);

    let mut dispatcher = dispatcher(&path, ChannelMode::Persistent);
    dispatcher.dispatch(frame(0.0)).expect("first frame");
    assert_eq!(StreamDecoder::new().push(&drain(&mut first_reader)).len(), 1);
    drop(first_reader);

    // The held endpoint is broken and the resend finds nobody listening.
    let err = dispatcher.dispatch(frame(0.1)).expect_err("reader gone");
    assert_eq!(err.kind(), DispatchErrorKind::Unavailable);
    assert!(!dispatcher.is_connected());

    let mut second_reader = open_reader(&path);
    dispatcher.dispatch(frame(0.2)).expect("reconnect");
    assert!(dispatcher.is_connected());
    assert_eq!(dispatcher.stats().reconnects, 1);
    dispatcher.disconnect();

    let messages = StreamDecoder::new().push(&drain(&mut second_reader));
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].as_ref().unwrap().points, frame(0.2));
}

#[test]
fn missing_pipe_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let mut dispatcher = dispatcher(&dir.path().join("absent"), ChannelMode::PerMessage);
    let err = dispatcher.dispatch(frame(0.0)).expect_err("no pipe");
    assert_eq!(err.kind(), DispatchErrorKind::Unavailable);
}
