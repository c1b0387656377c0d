//! Stub S7 controller for integration testing.
//!
//! Speaks just enough ISO-on-TCP / COTP / S7comm to serve Read Var and
//! Write Var jobs against in-memory data blocks, with switchable fault
//! injection.
//!
//! ```ignore
//! let server = StubS7Server::start(StubBehavior::Normal).unwrap();
//! let mut plc = S7Client::new(&server.endpoint()).unwrap();
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// PDU length the stub offers during Setup Communication.
pub const STUB_PDU_SIZE: u16 = 240;

/// Item return code for an unknown data block.
pub const RC_OBJECT_MISSING: u8 = 0x0A;

/// Item return code for an access past the end of a data block.
pub const RC_OUT_OF_RANGE: u8 = 0x05;

/// Switchable fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubBehavior {
    Normal,
    /// Answer every job with this header error code.
    ServerError(u16),
    /// Report one item more than requested.
    ExtraItem,
    /// Answer jobs with TPKT version 2.
    BadTpkt,
    /// Close the socket when a job arrives.
    DropConnection,
    /// Answer the COTP connection request with a disconnect request.
    RejectConnect,
    /// Sleep before answering jobs.
    DelayMs(u64),
    /// Echo a different sequence number.
    WrongSequence,
}

/// Everything the stub observed, in arrival order.
///
/// COTP connection requests are logged as `0xE0`, S7 frames by function code.
#[derive(Debug, Default)]
struct Shared {
    blocks: HashMap<u16, Vec<u8>>,
    log: Vec<u8>,
    sequences: Vec<u16>,
}

pub struct StubS7Server {
    local_addr: SocketAddr,
    stop_signal: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    shared: Arc<Mutex<Shared>>,
    behavior: Arc<Mutex<StubBehavior>>,
}

impl StubS7Server {
    /// Start on `127.0.0.1:0` with data blocks 1 and 21 (64 bytes each).
    pub fn start(behavior: StubBehavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let mut shared = Shared::default();
        shared.blocks.insert(1, vec![0; 64]);
        shared.blocks.insert(21, vec![0; 64]);

        let stop_signal = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(Mutex::new(shared));
        let behavior = Arc::new(Mutex::new(behavior));

        let stop_clone = stop_signal.clone();
        let shared_clone = shared.clone();
        let behavior_clone = behavior.clone();
        let thread_handle = thread::spawn(move || {
            Self::server_loop(listener, stop_clone, shared_clone, behavior_clone);
        });

        Ok(Self {
            local_addr,
            stop_signal,
            thread_handle: Some(thread_handle),
            shared,
            behavior,
        })
    }

    pub fn endpoint(&self) -> String {
        self.local_addr.to_string()
    }

    pub fn set_behavior(&self, behavior: StubBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Bytes `range` of data block `db`.
    pub fn db_bytes(&self, db: u16, range: std::ops::Range<usize>) -> Vec<u8> {
        self.shared.lock().unwrap().blocks[&db][range].to_vec()
    }

    pub fn set_db_byte(&self, db: u16, offset: usize, value: u8) {
        self.shared.lock().unwrap().blocks.get_mut(&db).unwrap()[offset] = value;
    }

    /// Frame kinds received so far, see [`Shared`].
    pub fn log(&self) -> Vec<u8> {
        self.shared.lock().unwrap().log.clone()
    }

    /// Number of COTP connection requests received.
    pub fn connects(&self) -> usize {
        self.log().iter().filter(|&&k| k == 0xE0).count()
    }

    /// Sequence numbers of every S7 job received.
    pub fn sequences(&self) -> Vec<u16> {
        self.shared.lock().unwrap().sequences.clone()
    }

    fn server_loop(
        listener: TcpListener,
        stop_signal: Arc<AtomicBool>,
        shared: Arc<Mutex<Shared>>,
        behavior: Arc<Mutex<StubBehavior>>,
    ) {
        while !stop_signal.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _)) => {
                    let stop_clone = stop_signal.clone();
                    let shared_clone = shared.clone();
                    let behavior_clone = behavior.clone();
                    thread::spawn(move || {
                        Self::handle_connection(stream, stop_clone, shared_clone, behavior_clone);
                    });
                }
                Err(_) => thread::sleep(Duration::from_millis(10)),
            }
        }
    }

    fn handle_connection(
        mut stream: TcpStream,
        stop_signal: Arc<AtomicBool>,
        shared: Arc<Mutex<Shared>>,
        behavior: Arc<Mutex<StubBehavior>>,
    ) {
        let _ = stream.set_nonblocking(false);
        let _ = stream.set_read_timeout(Some(Duration::from_millis(100)));

        while !stop_signal.load(Ordering::SeqCst) {
            let mut header = [0u8; 4];
            match stream.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue
                }
                Err(_) => return,
            }
            let len = u16::from_be_bytes([header[2], header[3]]) as usize;
            let mut frame = header.to_vec();
            frame.resize(len.max(4), 0);
            if stream.read_exact(&mut frame[4..]).is_err() {
                return;
            }

            let current = *behavior.lock().unwrap();
            let response = match frame.get(5).copied() {
                Some(0xE0) => {
                    shared.lock().unwrap().log.push(0xE0);
                    if current == StubBehavior::RejectConnect {
                        disconnect_request()
                    } else {
                        connect_confirm()
                    }
                }
                Some(0xF0) if frame.len() > 18 => {
                    let function = frame[17];
                    let sequence = u16::from_be_bytes([frame[11], frame[12]]);
                    {
                        let mut s = shared.lock().unwrap();
                        s.log.push(function);
                        if function != 0xF0 {
                            s.sequences.push(sequence);
                        }
                    }
                    if function == 0xF0 {
                        setup_response(sequence)
                    } else {
                        match current {
                            StubBehavior::DropConnection => return,
                            StubBehavior::DelayMs(ms) => thread::sleep(Duration::from_millis(ms)),
                            _ => {}
                        }
                        let mut s = shared.lock().unwrap();
                        job_response(&frame, &mut s.blocks, current)
                    }
                }
                _ => return,
            };

            if stream.write_all(&response).is_err() {
                return;
            }
        }
    }
}

impl Drop for StubS7Server {
    fn drop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// Frames
// ============================================================================

fn connect_confirm() -> Vec<u8> {
    vec![
        0x03, 0x00, 0x00, 0x16, 0x11, 0xD0, 0x00, 0x01, 0x00, 0x01, 0x00, 0xC0, 0x01, 0x0A, 0xC1,
        0x02, 0x01, 0x00, 0xC2, 0x02, 0x01, 0x02,
    ]
}

fn disconnect_request() -> Vec<u8> {
    vec![0x03, 0x00, 0x00, 0x0B, 0x06, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00]
}

fn ack_data(sequence: u16, error: u16, params: &[u8], data: &[u8]) -> Vec<u8> {
    let total = 7 + 12 + params.len() + data.len();
    let mut f = vec![0x03, 0x00];
    f.extend_from_slice(&(total as u16).to_be_bytes());
    f.extend_from_slice(&[0x02, 0xF0, 0x80, 0x32, 0x03, 0x00, 0x00]);
    f.extend_from_slice(&sequence.to_be_bytes());
    f.extend_from_slice(&(params.len() as u16).to_be_bytes());
    f.extend_from_slice(&(data.len() as u16).to_be_bytes());
    f.extend_from_slice(&error.to_be_bytes());
    f.extend_from_slice(params);
    f.extend_from_slice(data);
    f
}

fn setup_response(sequence: u16) -> Vec<u8> {
    let mut params = vec![0xF0, 0x00, 0x00, 0x01, 0x00, 0x01];
    params.extend_from_slice(&STUB_PDU_SIZE.to_be_bytes());
    ack_data(sequence, 0, &params, &[])
}

fn element_width(word_len: u8) -> usize {
    match word_len {
        0x01..=0x03 => 1,
        0x04 | 0x05 => 2,
        _ => 4,
    }
}

/// One parsed request item: `(word_len, count, db, bit_address)`.
fn request_items(frame: &[u8]) -> Vec<(u8, usize, u16, usize)> {
    let count = frame[18] as usize;
    (0..count)
        .map(|i| {
            let p = &frame[19 + i * 12..31 + i * 12];
            let address = u32::from_be_bytes([0, p[9], p[10], p[11]]) as usize;
            (
                p[3],
                u16::from_be_bytes([p[4], p[5]]) as usize,
                u16::from_be_bytes([p[6], p[7]]),
                address,
            )
        })
        .collect()
}

fn job_response(
    frame: &[u8],
    blocks: &mut HashMap<u16, Vec<u8>>,
    behavior: StubBehavior,
) -> Vec<u8> {
    let function = frame[17];
    let mut sequence = u16::from_be_bytes([frame[11], frame[12]]);
    let items = request_items(frame);

    let data = if function == 0x04 {
        read_items(&items, blocks)
    } else {
        write_items(frame, &items, blocks)
    };

    let mut reported = items.len() as u8;
    let mut error = 0;
    match behavior {
        StubBehavior::ExtraItem => reported += 1,
        StubBehavior::ServerError(code) => error = code,
        StubBehavior::WrongSequence => sequence = sequence.wrapping_add(100),
        _ => {}
    }

    let mut response = if error != 0 {
        ack_data(sequence, error, &[], &[])
    } else {
        ack_data(sequence, 0, &[function, reported], &data)
    };
    if behavior == StubBehavior::BadTpkt {
        response[0] = 0x02;
    }
    response
}

fn read_items(items: &[(u8, usize, u16, usize)], blocks: &HashMap<u16, Vec<u8>>) -> Vec<u8> {
    let mut data = Vec::new();
    for (index, &(word_len, count, db, address)) in items.iter().enumerate() {
        let Some(block) = blocks.get(&db) else {
            data.extend_from_slice(&[RC_OBJECT_MISSING, 0x00, 0x00, 0x00]);
            continue;
        };

        let (ts, bytes): (u8, Vec<u8>) = if word_len == 0x01 {
            let bits = (0..count)
                .map(|i| {
                    let bit = address + i;
                    block.get(bit / 8).map(|b| (b >> (bit % 8)) & 1)
                })
                .collect::<Option<Vec<u8>>>();
            match bits {
                Some(bits) => (0x03, bits),
                None => {
                    data.extend_from_slice(&[RC_OUT_OF_RANGE, 0x00, 0x00, 0x00]);
                    continue;
                }
            }
        } else {
            let start = address / 8;
            let end = start + count * element_width(word_len);
            match block.get(start..end) {
                Some(bytes) => (if word_len == 0x08 { 0x07 } else { 0x04 }, bytes.to_vec()),
                None => {
                    data.extend_from_slice(&[RC_OUT_OF_RANGE, 0x00, 0x00, 0x00]);
                    continue;
                }
            }
        };

        let length = if matches!(ts, 0x03 | 0x07 | 0x09) {
            bytes.len()
        } else {
            bytes.len() * 8
        };
        data.extend_from_slice(&[0xFF, ts]);
        data.extend_from_slice(&(length as u16).to_be_bytes());
        data.extend_from_slice(&bytes);
        if bytes.len() % 2 != 0 && index + 1 != items.len() {
            data.push(0x00);
        }
    }
    data
}

fn write_items(
    frame: &[u8],
    items: &[(u8, usize, u16, usize)],
    blocks: &mut HashMap<u16, Vec<u8>>,
) -> Vec<u8> {
    let mut pos = 19 + items.len() * 12;
    let mut statuses = Vec::with_capacity(items.len());
    for (index, &(_, _, db, address)) in items.iter().enumerate() {
        let ts = frame[pos + 1];
        let raw_len = u16::from_be_bytes([frame[pos + 2], frame[pos + 3]]) as usize;
        let len = if matches!(ts, 0x03 | 0x07 | 0x09) {
            raw_len
        } else {
            raw_len / 8
        };
        let payload = &frame[pos + 4..pos + 4 + len];
        pos += 4 + len;
        if len % 2 != 0 && index + 1 != items.len() {
            pos += 1;
        }

        let Some(block) = blocks.get_mut(&db) else {
            statuses.push(RC_OBJECT_MISSING);
            continue;
        };
        if ts == 0x03 {
            let (byte, bit) = (address / 8, address % 8);
            match block.get_mut(byte) {
                Some(b) if payload.first().copied().unwrap_or(0) != 0 => *b |= 1 << bit,
                Some(b) => *b &= !(1 << bit),
                None => {
                    statuses.push(RC_OUT_OF_RANGE);
                    continue;
                }
            }
        } else {
            let start = address / 8;
            match block.get_mut(start..start + len) {
                Some(dst) => dst.copy_from_slice(payload),
                None => {
                    statuses.push(RC_OUT_OF_RANGE);
                    continue;
                }
            }
        }
        statuses.push(0xFF);
    }
    statuses
}
