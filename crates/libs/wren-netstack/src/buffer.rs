use core::cmp::min;

use crate::error::NetstackError;

/// aMaxPHYPacketSize of IEEE 802.15.4.
pub const FRAME_MAX_LEN: usize = 127;

pub type FrameBuf = StaticBuffer<FRAME_MAX_LEN>;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct StaticBuffer<const N: usize> {
    buffer: [u8; N],
    len: usize,
}

impl<const N: usize> StaticBuffer<N> {
    pub const fn new() -> Self {
        Self { buffer: [0u8; N], len: 0 }
    }

    pub fn new_from_slice(data: &[u8]) -> Result<Self, NetstackError> {
        let mut buffer = Self::new();
        buffer.write(data)?;
        Ok(buffer)
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn reset(&mut self) {
        self.len = 0;
    }

    pub fn truncate(&mut self, len: usize) {
        self.len = min(len, self.len);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        N - self.len
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize, NetstackError> {
        let data_size = data.len();

        if data_size == 0 {
            return Ok(0);
        }

        if (self.len + data_size) > N {
            return Err(NetstackError::BufOverflow);
        }

        self.buffer[self.len..(self.len + data_size)].copy_from_slice(data);
        self.len += data_size;

        Ok(data_size)
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<usize, NetstackError> {
        self.write(&[byte])
    }

    pub fn write_u16_le(&mut self, value: u16) -> Result<usize, NetstackError> {
        self.write(&value.to_le_bytes())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer[..self.len]
    }
}

impl<const N: usize> Default for StaticBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes into a caller-owned slice and never past its end.
pub struct OutputBuffer<'a> {
    buffer: &'a mut [u8],
    offset: usize,
}

impl<'a> OutputBuffer<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { offset: 0, buffer }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize, NetstackError> {
        let data_size = data.len();

        if data_size == 0 {
            return Ok(0);
        }

        if (self.offset + data_size) > self.buffer.len() {
            return Err(NetstackError::BufOverflow);
        }

        self.buffer[self.offset..(self.offset + data_size)].copy_from_slice(data);
        self.offset += data_size;

        Ok(data_size)
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<usize, NetstackError> {
        self.write(&[byte])
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_buffer_refuses_to_overflow() {
        let mut buf = StaticBuffer::<4>::new();
        assert_eq!(buf.write(&[1, 2, 3]), Ok(3));
        assert_eq!(buf.write(&[4, 5]), Err(NetstackError::BufOverflow));
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
        assert_eq!(buf.write_byte(4), Ok(1));
        assert_eq!(buf.remaining(), 0);
        buf.truncate(2);
        assert_eq!(buf.as_slice(), &[1, 2]);
    }

    #[test]
    fn frame_buffer_holds_a_full_psdu() {
        let psdu = [0xa5u8; FRAME_MAX_LEN];
        let buf = FrameBuf::new_from_slice(&psdu).expect("psdu fits");
        assert_eq!(buf.len(), FRAME_MAX_LEN);
        assert!(FrameBuf::new_from_slice(&[0u8; FRAME_MAX_LEN + 1]).is_err());
    }

    #[test]
    fn output_buffer_tracks_offset() {
        let mut backing = [0u8; 3];
        let mut out = OutputBuffer::new(&mut backing);
        out.write(&[7, 8]).expect("fits");
        assert_eq!(out.offset(), 2);
        assert_eq!(out.remaining(), 1);
        assert!(out.write(&[9, 10]).is_err());
        assert_eq!(out.as_slice(), &[7, 8]);
    }
}
