use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Character sink behind the firmware console call.
///
/// Clones share one buffer, so the launcher keeps a handle while the CPU's
/// ecall handler owns another. With `echo` set, every byte is also written
/// to stdout as it arrives.
#[derive(Debug, Clone, Default)]
pub struct Console {
    buffer: Rc<RefCell<Vec<u8>>>,
    echo: bool,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_echo(echo: bool) -> Self {
        Self { buffer: Rc::default(), echo }
    }

    pub fn put(&self, byte: u8) {
        self.buffer.borrow_mut().push(byte);
        if self.echo {
            let mut out = std::io::stdout();
            // Console echo is best effort; the buffer is the record.
            let _ = out.write_all(&[byte]);
            let _ = out.flush();
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buffer.borrow().clone()
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.buffer.borrow()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.buffer.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.borrow().is_empty()
    }
}
