pub type ConnectionId = u32;
pub type WorkerId = usize;
pub type StatusCode = u16;
pub type PortNumber = u16;
pub type ContentLength = usize;
