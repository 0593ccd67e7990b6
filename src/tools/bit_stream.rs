//! Bit level I/O shared by the coders.
//!
//! Bits are packed most significant first.  Neither side owns its byte stream,
//! the reader or writer is passed in on each call, the same way the coders hold
//! the stream while the bit state lives here.

use bit_vec::BitVec;
use std::io::{Read,Write};

/// Buffers bits until a whole byte can be written.
pub struct BitWriter {
    bits: BitVec,
    /// bits accepted so far, not counting the flush padding
    count: u64
}

/// Unpacks bytes into bits, one byte at a time.
pub struct BitReader {
    bits: BitVec,
    ptr: usize,
    /// bits handed out so far
    count: u64
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
            count: 0
        }
    }
    pub fn count(&self) -> u64 {
        self.count
    }
    fn push<W: Write>(&mut self,bit: bool,writer: &mut W) -> Result<(),std::io::Error> {
        self.bits.push(bit);
        if self.bits.len() == 8 {
            writer.write_all(&self.bits.to_bytes())?;
            self.bits.truncate(0);
        }
        Ok(())
    }
    pub fn put_bit<W: Write>(&mut self,bit: bool,writer: &mut W) -> Result<(),std::io::Error> {
        self.count += 1;
        self.push(bit,writer)
    }
    /// output every bit of `code` in order
    pub fn put_bits<W: Write>(&mut self,code: &BitVec,writer: &mut W) -> Result<(),std::io::Error> {
        for bit in code.iter() {
            self.put_bit(bit,writer)?;
        }
        Ok(())
    }
    /// Push 8 zero bits, so any partial byte reaches the writer.
    /// This writes an extra zero byte if we were already aligned.
    /// Padding does not count toward `count`.
    pub fn flush<W: Write>(&mut self,writer: &mut W) -> Result<(),std::io::Error> {
        for _i in 0..8 {
            self.push(false,writer)?;
        }
        Ok(())
    }
}

impl BitReader {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
            ptr: 0,
            count: 0
        }
    }
    pub fn count(&self) -> u64 {
        self.count
    }
    /// Get the next bit, reading another byte from the stream as needed.
    /// Running off the end of the stream is an `UnexpectedEof` error.
    pub fn get_bit<R: Read>(&mut self,reader: &mut R) -> Result<bool,std::io::Error> {
        if self.ptr >= self.bits.len() {
            let mut by: [u8;1] = [0];
            reader.read_exact(&mut by)?;
            self.bits = BitVec::from_bytes(&by);
            self.ptr = 0;
        }
        let bit = self.bits.get(self.ptr).unwrap_or(false);
        self.ptr += 1;
        self.count += 1;
        Ok(bit)
    }
}

#[cfg(test)]
fn bits_of(s: &str) -> BitVec {
    s.chars().map(|c| c=='1').collect()
}

#[test]
fn bits_are_msb_first() {
    let mut ans: Vec<u8> = Vec::new();
    let mut bits = BitWriter::new();
    bits.put_bit(true,&mut ans).expect("write failed");
    bits.put_bits(&bits_of("010"),&mut ans).expect("write failed");
    bits.put_bits(&bits_of("1111"),&mut ans).expect("write failed");
    assert_eq!(ans,vec![0b1010_1111]);
    assert_eq!(bits.count(),8);
}

#[test]
fn flush_pads_with_zeros() {
    let mut ans: Vec<u8> = Vec::new();
    let mut bits = BitWriter::new();
    bits.put_bits(&bits_of("111"),&mut ans).expect("write failed");
    assert!(ans.is_empty());
    bits.flush(&mut ans).expect("flush failed");
    assert_eq!(ans,vec![0b1110_0000]);
    assert_eq!(bits.count(),3);
    // already aligned, flush still emits a whole zero byte
    let mut ans: Vec<u8> = Vec::new();
    let mut bits = BitWriter::new();
    bits.put_bits(&BitVec::from_bytes(&[0x41]),&mut ans).expect("write failed");
    bits.flush(&mut ans).expect("flush failed");
    assert_eq!(ans,vec![0x41,0x00]);
}

#[test]
fn read_back() {
    let src = hex::decode("41e0").unwrap();
    let mut reader = std::io::Cursor::new(src);
    let mut bits = BitReader::new();
    let mut got = BitVec::new();
    for _i in 0..16 {
        got.push(bits.get_bit(&mut reader).unwrap());
    }
    assert_eq!(got,bits_of("0100000111100000"));
    assert_eq!(bits.count(),16);
    let err = bits.get_bit(&mut reader).unwrap_err();
    assert_eq!(err.kind(),std::io::ErrorKind::UnexpectedEof);
}
