use spindle::fs::{File, PosixAio, SimulatedReads};
use spindle::{Error, PendingOperation, ReadFacility, ReadRequest, Runtime, read_polled};
use std::cell::RefCell;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::rc::Rc;
use tempfile::NamedTempFile;

const CHUNK: usize = 1024;

type Slots = Rc<RefCell<Vec<Option<Result<Vec<u8>, Error>>>>>;

fn scratch_file(len: usize) -> (NamedTempFile, Vec<u8>) {
    let contents: Vec<u8> = (0..len).map(|n| (n % 251) as u8).collect();

    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(&contents).expect("write temp file");
    file.flush().expect("flush temp file");

    (file, contents)
}

fn read_three_chunks<F>(facility: F) -> (Vec<u8>, Vec<u8>, Runtime)
where
    F: ReadFacility + Copy + 'static,
{
    let (scratch, contents) = scratch_file(4 * CHUNK);
    let file = File::open(scratch.path()).expect("open");
    let fd = file.as_raw_fd();

    let slots: Slots = Rc::new(RefCell::new(vec![None, None, None]));
    let mut rt = Runtime::new();

    for index in 0..3 {
        let slots = slots.clone();
        let request = ReadRequest::new(fd, (index * CHUNK) as u64, CHUNK);

        rt.spawn(move |scheduler| {
            let outcome = read_polled(scheduler, &facility, request);
            slots.borrow_mut()[index] = Some(outcome);
            Ok(())
        })
        .expect("spawn");
    }

    rt.run().expect("run");

    let mut joined = Vec::new();
    for slot in slots.borrow_mut().drain(..) {
        let bytes = slot.expect("task stored no result").expect("read failed");
        assert_eq!(bytes.len(), CHUNK);
        joined.extend_from_slice(&bytes);
    }

    (joined, contents, rt)
}

#[test]
fn test_three_concurrent_aio_reads() {
    let (joined, contents, rt) = read_three_chunks(PosixAio);

    assert_eq!(joined, contents[..3 * CHUNK]);

    let stats = rt.stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.pending_reclaim, 0);
    assert_eq!(stats.reclaimed, 3);
}

#[test]
fn test_three_concurrent_simulated_reads() {
    let (joined, contents, rt) = read_three_chunks(SimulatedReads::new(4));

    assert_eq!(joined, contents[..3 * CHUNK]);
    assert_eq!(rt.stats().active, 0);
    assert_eq!(rt.stats().pending_reclaim, 0);
}

#[test]
fn test_reads_interleave_before_completing() {
    let (scratch, _) = scratch_file(3 * CHUNK);
    let file = File::open(scratch.path()).expect("open");
    let fd = file.as_raw_fd();

    let log = Rc::new(RefCell::new(Vec::new()));
    let mut rt = Runtime::new();

    for index in 0..3 {
        let log = log.clone();
        rt.spawn(move |scheduler| {
            log.borrow_mut().push(format!("start {index}"));
            let request = ReadRequest::new(fd, (index * CHUNK) as u64, CHUNK);
            read_polled(scheduler, &SimulatedReads::new(2), request)?;
            log.borrow_mut().push(format!("done {index}"));
            Ok(())
        })
        .expect("spawn");
    }

    rt.run().expect("run");

    let log = log.borrow();
    assert_eq!(log.len(), 6);
    assert_eq!(log[..3], ["start 2", "start 1", "start 0"]);
    assert!(log[3..].iter().all(|entry| entry.starts_with("done")));
}

#[test]
fn test_read_to_end_of_file() {
    let (scratch, contents) = scratch_file(100);
    let file = File::open(scratch.path()).expect("open");
    assert_eq!(file.len().expect("len"), 100);

    let fd = file.as_raw_fd();
    let slot = Rc::new(RefCell::new(None));
    let mut rt = Runtime::new();

    let out = slot.clone();
    rt.spawn(move |scheduler| {
        let bytes = read_polled(scheduler, &PosixAio, ReadRequest::to_end(fd, 40))?;
        *out.borrow_mut() = Some(bytes);
        Ok(())
    })
    .expect("spawn");

    rt.run().expect("run");

    assert_eq!(slot.borrow().as_deref(), Some(&contents[40..]));
}

#[test]
fn test_short_read_truncates_buffer() {
    let (scratch, contents) = scratch_file(CHUNK / 2);
    let file = File::open(scratch.path()).expect("open");
    let fd = file.as_raw_fd();

    let slot = Rc::new(RefCell::new(None));
    let mut rt = Runtime::new();

    let out = slot.clone();
    rt.spawn(move |scheduler| {
        let bytes = read_polled(scheduler, &SimulatedReads::new(1), ReadRequest::new(fd, 0, CHUNK))?;
        *out.borrow_mut() = Some(bytes);
        Ok(())
    })
    .expect("spawn");

    rt.run().expect("run");

    assert_eq!(slot.borrow().as_deref(), Some(contents.as_slice()));
}

#[test]
fn test_operation_failure_is_reported_not_fatal() {
    let (scratch, _) = scratch_file(CHUNK);
    let file = File::open(scratch.path()).expect("open");
    let fd = file.as_raw_fd();

    let slot = Rc::new(RefCell::new(None));
    let mut rt = Runtime::new();

    let out = slot.clone();
    rt.spawn(move |scheduler| {
        let facility = SimulatedReads::failing(3, libc::EIO);
        let outcome = read_polled(scheduler, &facility, ReadRequest::new(fd, 0, CHUNK));
        *out.borrow_mut() = Some(outcome);
        Ok(())
    })
    .expect("spawn");

    rt.run().expect("run");

    let outcome = slot.borrow_mut().take().expect("task stored no result");
    assert!(matches!(outcome, Err(Error::OperationFailed { code }) if code == libc::EIO));
    assert_eq!(rt.stats().pending_reclaim, 0);
    assert_eq!(rt.stats().reclaimed, 1);
}

#[test]
fn test_setup_failure_ends_task() {
    let slot = Rc::new(RefCell::new(None));
    let mut rt = Runtime::new();

    let out = slot.clone();
    rt.spawn(move |scheduler| {
        let outcome = read_polled(scheduler, &PosixAio, ReadRequest::to_end(-1, 0));
        assert_eq!(scheduler.task_count(), 1, "setup failure must not end the task itself");
        *out.borrow_mut() = Some(outcome);
        Ok(())
    })
    .expect("spawn");

    rt.run().expect("run");

    let outcome = slot.borrow_mut().take().expect("task stored no result");
    assert!(matches!(outcome, Err(Error::Io(_))));
    assert_eq!(rt.stats().active, 0);
    assert_eq!(rt.stats().reclaimed, 1);
}

#[test]
fn test_aio_on_bad_descriptor_fails() {
    let slot = Rc::new(RefCell::new(None));
    let mut rt = Runtime::new();

    let out = slot.clone();
    rt.spawn(move |scheduler| {
        let outcome = read_polled(scheduler, &PosixAio, ReadRequest::new(-1, 0, 16));
        *out.borrow_mut() = Some(outcome);
        Ok(())
    })
    .expect("spawn");

    rt.run().expect("run");

    let outcome = slot.borrow_mut().take().expect("task stored no result");
    assert!(
        matches!(outcome, Err(Error::OperationFailed { code }) if code == libc::EBADF),
        "expected EBADF from the settled read, got {outcome:?}"
    );
}

#[test]
fn test_dropping_in_flight_aio_reads() {
    let (scratch, contents) = scratch_file(8 * 1024 * 1024);
    let file = File::open(scratch.path()).expect("open");
    let fd = file.as_raw_fd();

    let in_flight: Vec<_> = (0..8)
        .map(|_| {
            PosixAio
                .begin(fd, vec![0u8; contents.len()], 0)
                .expect("submit")
        })
        .collect();
    drop(in_flight);

    let pending = PosixAio
        .begin(fd, vec![0u8; contents.len()], 0)
        .expect("submit");
    let buffer = pending.into_buffer();

    assert_eq!(buffer.len(), contents.len());
}
