//! End-to-end behaviour of sessions opened through the
//! handle table, driven by scripted and synthetic cameras.

use std::{
    fs::File,
    io::BufWriter,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc, Mutex,
    },
    thread,
};

use anyhow::Result;
use ndarray::Array2;
use tempfile::NamedTempFile;

use thermal_capture::{
    transport::{Connector, ScriptedConnector, ScriptedTransport, SyntheticConnector, Transport},
    CalibrationTable, CameraVariant, Error, Geometry, OpenError, RawFrame, ReadError,
    SessionManager,
};

fn raw(variant: CameraVariant, value: u16) -> RawFrame {
    let geometry = variant.raw_geometry();
    RawFrame::from_samples(geometry, &vec![value; geometry.pixel_count()])
}

fn write_tcal(table: &CalibrationTable) -> Result<NamedTempFile> {
    let file = NamedTempFile::new()?;
    table.write_tcal(BufWriter::new(File::create(file.path())?))?;
    Ok(file)
}

/// Serves the warm-up frame at once, then holds every later
/// read until the test lets it through.
struct GatedTransport {
    frame: RawFrame,
    reads: usize,
    started: Sender<()>,
    release: Receiver<()>,
    closes: Arc<AtomicUsize>,
}

impl Transport for GatedTransport {
    fn handshake(&mut self) -> Result<(), OpenError> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<RawFrame, ReadError> {
        self.reads += 1;
        if self.reads > 1 {
            let _ = self.started.send(());
            self.release
                .recv()
                .map_err(|_| ReadError::TransportLost("gate dropped".into()))?;
        }
        Ok(self.frame.clone())
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct GatedConnector(Mutex<Option<GatedTransport>>);

impl Connector for GatedConnector {
    fn connect(&self, _variant: CameraVariant) -> Result<Box<dyn Transport>, OpenError> {
        match self.0.lock().unwrap().take() {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(OpenError::DeviceNotFound),
        }
    }
}

#[test]
fn compact_scenario() -> Result<()> {
    let manager = SessionManager::new(Box::new(SyntheticConnector));
    let handle = manager.open(CameraVariant::Compact, None)?;
    assert_eq!(manager.dimensions(handle)?, (206, 156));

    let mut buf = vec![0u16; 206 * 156];
    assert_eq!(manager.read_frame(handle, &mut buf)?, 32136);

    manager.close(handle);
    assert!(matches!(
        manager.dimensions(handle),
        Err(Error::InvalidHandle)
    ));
    assert!(matches!(
        manager.read_frame(handle, &mut buf),
        Err(Error::InvalidHandle)
    ));
    manager.close(handle);
    Ok(())
}

#[test]
fn bad_calibration_path_never_yields_handle() {
    let manager = SessionManager::new(Box::new(SyntheticConnector));
    let res = manager.open(CameraVariant::Pro, Some("/bad/path.cal".as_ref()));
    assert!(matches!(res, Err(Error::Config(_))));
    assert!(manager.is_empty());
}

#[test]
fn dimensions_are_stable_across_reads() -> Result<()> {
    let manager = SessionManager::new(Box::new(SyntheticConnector));
    for &variant in &[CameraVariant::Compact, CameraVariant::Pro] {
        let handle = manager.open(variant, None)?;
        let dims = manager.dimensions(handle)?;
        let mut buf = vec![0u16; dims.0 * dims.1 + 17];
        for _ in 0..5 {
            assert_eq!(manager.read_frame(handle, &mut buf)?, dims.0 * dims.1);
            assert_eq!(manager.dimensions(handle)?, dims);
        }
        manager.close(handle);
    }
    Ok(())
}

#[test]
fn short_buffer_fails_without_writing() -> Result<()> {
    let connector = ScriptedConnector::new();
    let probe = connector.push(ScriptedTransport::repeating(raw(CameraVariant::Compact, 9)));
    let manager = SessionManager::new(Box::new(connector));
    let handle = manager.open(CameraVariant::Compact, None)?;

    let mut buf = vec![0xbeefu16; 32135];
    assert!(matches!(
        manager.read_frame(handle, &mut buf),
        Err(Error::BufferTooSmall {
            required: 32136,
            capacity: 32135
        })
    ));
    assert!(buf.iter().all(|&v| v == 0xbeef));
    assert_eq!(probe.reads(), 1);

    let mut buf = vec![0xbeefu16; 40000];
    assert_eq!(manager.read_frame(handle, &mut buf)?, 32136);
    assert!(buf[..32136].iter().all(|&v| v == 9));
    assert!(buf[32136..].iter().all(|&v| v == 0xbeef));
    Ok(())
}

#[test]
fn lost_transport_latches_session() -> Result<()> {
    let connector = ScriptedConnector::new();
    let probe = connector.push(
        ScriptedTransport::new(vec![
            Ok(raw(CameraVariant::Pro, 1)),
            Ok(raw(CameraVariant::Pro, 2)),
            Err(ReadError::TransportLost("device unplugged".into())),
        ])
        .then_repeat(raw(CameraVariant::Pro, 3)),
    );
    let manager = SessionManager::new(Box::new(connector));
    let handle = manager.open(CameraVariant::Pro, None)?;
    let mut buf = vec![0u16; 320 * 240];

    assert_eq!(manager.read_frame(handle, &mut buf)?, 76800);
    assert!(matches!(
        manager.read_frame(handle, &mut buf),
        Err(Error::Read(ReadError::TransportLost(_)))
    ));
    assert_eq!(probe.reads(), 3);
    assert_eq!(probe.closes(), 1);

    for _ in 0..3 {
        assert!(matches!(
            manager.read_frame(handle, &mut buf),
            Err(Error::SessionClosed)
        ));
    }
    assert_eq!(probe.reads(), 3);

    // the handle stays valid until closed
    assert_eq!(manager.dimensions(handle)?, (320, 240));
    manager.close(handle);
    assert_eq!(probe.closes(), 1);
    Ok(())
}

#[test]
fn timeout_then_success() -> Result<()> {
    let connector = ScriptedConnector::new();
    let probe = connector.push(
        ScriptedTransport::new(vec![Ok(raw(CameraVariant::Compact, 1)), Err(ReadError::Timeout)])
            .then_repeat(raw(CameraVariant::Compact, 2)),
    );
    let manager = SessionManager::new(Box::new(connector));
    let handle = manager.open(CameraVariant::Compact, None)?;
    let mut buf = vec![0u16; 32136];

    assert!(matches!(
        manager.read_frame(handle, &mut buf),
        Err(Error::Read(ReadError::Timeout))
    ));
    assert_eq!(manager.read_frame(handle, &mut buf)?, 32136);
    assert_eq!(probe.reads(), 3);
    Ok(())
}

#[test]
fn geometry_change_is_an_error() -> Result<()> {
    let odd = RawFrame::from_samples(Geometry::new(210, 156), &vec![0; 210 * 156]);
    let connector = ScriptedConnector::new();
    connector.push(
        ScriptedTransport::new(vec![Ok(raw(CameraVariant::Compact, 1)), Ok(odd)])
            .then_repeat(raw(CameraVariant::Compact, 2)),
    );
    let manager = SessionManager::new(Box::new(connector));
    let handle = manager.open(CameraVariant::Compact, None)?;
    let mut buf = vec![0u16; 40000];

    match manager.read_frame(handle, &mut buf) {
        Err(Error::GeometryMismatch { expected, actual }) => {
            assert_eq!(expected, Geometry::new(206, 156));
            assert_eq!(actual, Geometry::new(208, 156));
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(manager.read_frame(handle, &mut buf)?, 32136);
    Ok(())
}

#[test]
fn calibration_is_applied() -> Result<()> {
    let offsets = Array2::from_elem((156, 206), 10.);
    let gains = Array2::from_elem((156, 206), 2.);
    let file = write_tcal(&CalibrationTable::new(offsets, gains)?)?;

    let connector = ScriptedConnector::new();
    connector.push(ScriptedTransport::repeating(raw(CameraVariant::Compact, 110)));
    let manager = SessionManager::new(Box::new(connector));
    let handle = manager.open(CameraVariant::Compact, Some(file.path()))?;

    let mut buf = vec![0u16; 32136];
    manager.read_frame(handle, &mut buf)?;
    assert!(buf.iter().all(|&v| v == 200));
    Ok(())
}

#[test]
fn calibration_for_other_sensor_fails_open() -> Result<()> {
    let file = write_tcal(&CalibrationTable::identity(Geometry::new(320, 240)))?;

    let connector = ScriptedConnector::new();
    let probe = connector.push(ScriptedTransport::repeating(raw(CameraVariant::Compact, 1)));
    let manager = SessionManager::new(Box::new(connector));
    let res = manager.open(CameraVariant::Compact, Some(file.path()));
    assert!(matches!(res, Err(Error::GeometryMismatch { .. })));
    assert_eq!(probe.closes(), 1);
    assert!(manager.is_empty());
    Ok(())
}

#[test]
fn close_during_read() -> Result<()> {
    let (started_tx, started) = mpsc::channel();
    let (release, release_rx) = mpsc::channel();
    let closes = Arc::new(AtomicUsize::new(0));
    let connector = GatedConnector(Mutex::new(Some(GatedTransport {
        frame: raw(CameraVariant::Compact, 42),
        reads: 0,
        started: started_tx,
        release: release_rx,
        closes: closes.clone(),
    })));
    let manager = Arc::new(SessionManager::new(Box::new(connector)));
    let handle = manager.open(CameraVariant::Compact, None)?;

    let reader = {
        let manager = manager.clone();
        thread::spawn(move || {
            let mut buf = vec![0u16; 32136];
            let count = manager.read_frame(handle, &mut buf)?;
            Ok::<_, Error>((count, buf[0]))
        })
    };
    started.recv()?;

    manager.close(handle);
    assert!(manager.is_empty());
    assert!(matches!(
        manager.dimensions(handle),
        Err(Error::InvalidHandle)
    ));
    assert_eq!(closes.load(Ordering::SeqCst), 0);

    release.send(())?;
    let (count, first) = reader.join().expect("reader panicked")?;
    assert_eq!((count, first), (32136, 42));
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    let mut buf = vec![0u16; 32136];
    assert!(matches!(
        manager.read_frame(handle, &mut buf),
        Err(Error::InvalidHandle)
    ));
    Ok(())
}

#[test]
fn parallel_sessions() -> Result<()> {
    let manager = Arc::new(SessionManager::new(Box::new(SyntheticConnector)));
    let handles = vec![
        manager.open(CameraVariant::Compact, None)?,
        manager.open(CameraVariant::Pro, None)?,
        manager.open(CameraVariant::Compact, None)?,
    ];

    let workers: Vec<_> = handles
        .iter()
        .flat_map(|&handle| vec![handle, handle])
        .map(|handle| {
            let manager = manager.clone();
            thread::spawn(move || -> Result<usize> {
                let (w, h) = manager.dimensions(handle)?;
                let mut buf = vec![0u16; w * h];
                let mut total = 0;
                for _ in 0..10 {
                    total += manager.read_frame(handle, &mut buf)?;
                }
                Ok(total)
            })
        })
        .collect();

    let mut totals = vec![];
    for worker in workers {
        totals.push(worker.join().expect("worker panicked")?);
    }
    assert_eq!(
        totals,
        vec![321360, 321360, 768000, 768000, 321360, 321360]
    );

    for handle in handles {
        manager.close(handle);
    }
    assert!(manager.is_empty());
    Ok(())
}
