use pcsize_protocol::SessionHandle;

/// Issues session handles for one recording session.
///
/// Handles are arena indices, never addresses. A handle is unique within the
/// arena that issued it and means nothing outside it.
#[derive(Debug)]
pub struct HandleArena {
    next_id: u64,
}

impl HandleArena {
    pub fn new() -> Self {
        Self {
            // Start from 1 to avoid confusion with NULL/0 handles
            next_id: 1,
        }
    }

    /// Allocate the next handle.
    pub fn alloc(&mut self) -> SessionHandle {
        let handle = SessionHandle(self.next_id);
        self.next_id += 1;
        handle
    }

    /// Number of handles issued so far.
    pub fn issued(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for HandleArena {
    fn default() -> Self {
        Self::new()
    }
}
