use serde::{Deserialize, Serialize};

use crate::codec::{Wire, WireStream};
use crate::error::ProtocolResult;

/// Byte accounting for one command pool.
///
/// Each `peak_*` field is the running maximum of the matching `current_*`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPoolAccounting {
    pub pool_id: u64,
    pub buffer_count: u32,
    pub current_pool_allocated: u64,
    pub peak_pool_allocated: u64,
    pub current_pool_reserved: u64,
    pub peak_pool_reserved: u64,
    pub current_buffer_allocated: u64,
    pub peak_buffer_allocated: u64,
}

impl CommandPoolAccounting {
    pub fn new(pool_id: u64) -> Self {
        Self {
            pool_id,
            ..Self::default()
        }
    }
}

impl Wire for CommandPoolAccounting {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        s.u64(&mut self.pool_id)?;
        s.u32(&mut self.buffer_count)?;
        s.u64(&mut self.current_pool_allocated)?;
        s.u64(&mut self.peak_pool_allocated)?;
        s.u64(&mut self.current_pool_reserved)?;
        s.u64(&mut self.peak_pool_reserved)?;
        s.u64(&mut self.current_buffer_allocated)?;
        s.u64(&mut self.peak_buffer_allocated)
    }
}
