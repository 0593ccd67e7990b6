//! Container headers.
//!
//! Both containers start with a 2 byte magic number and carry the name of the
//! original file.  The Huffman container also carries the number of payload bits,
//! which is only known after the payload is written, so the writer leaves a slot
//! that can be patched by seeking back.
//!
//! ```text
//! huffman: magic (2) | bit count (8) | name length (8) | name | 0
//! lz78:    magic (2) | name length (8) | name | 0
//! ```
//! All integers are little endian.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::io::{Read,Write};
use std::path::{Path,PathBuf};
use crate::Error;

/// longest file name that can be stored in a header
pub const MAX_NAME_LEN: usize = 255;

/// Identifies a container by its magic number
#[derive(FromPrimitive,Clone,Copy,Debug,PartialEq)]
pub enum Format {
    Huffman = 0x4855,
    LZ78 = 0x4838
}

impl Format {
    /// offset of the bit count field, if the format has one
    pub fn bit_count_offset(&self) -> Option<u64> {
        match self {
            Format::Huffman => Some(2),
            Format::LZ78 => None
        }
    }
}

#[derive(Clone,Debug,PartialEq)]
pub struct Header {
    pub format: Format,
    /// number of payload bits, Huffman only
    pub bit_count: Option<u64>,
    /// name of the original file
    pub name: String
}

impl Header {
    pub fn create(format: Format,name: &str) -> Self {
        Self {
            format,
            bit_count: match format {
                Format::Huffman => Some(0),
                Format::LZ78 => None
            },
            name: name.to_string()
        }
    }
    /// size of the header in bytes once written
    pub fn len(&self) -> u64 {
        let count_bytes = match self.format {
            Format::Huffman => 8,
            Format::LZ78 => 0
        };
        2 + count_bytes + 8 + self.name.len() as u64 + 1
    }
    /// Write the header, bit count (if any) is written as it currently stands.
    pub fn write<W: Write>(&self,writer: &mut W) -> Result<u64,Error> {
        if self.name.len() > MAX_NAME_LEN {
            return Err(Error::NameTooLong);
        }
        writer.write_all(&u16::to_le_bytes(self.format as u16))?;
        if let Some(count) = self.bit_count {
            writer.write_all(&u64::to_le_bytes(count))?;
        }
        writer.write_all(&u64::to_le_bytes(self.name.len() as u64))?;
        writer.write_all(self.name.as_bytes())?;
        writer.write_all(&[0])?;
        Ok(self.len())
    }
    /// Where to put the expanded file.  Only the last component of the stored
    /// name is used, so a container cannot direct output outside of `dir`.
    pub fn output_path(&self,dir: &Path) -> Result<PathBuf,Error> {
        match Path::new(&self.name).file_name() {
            Some(name) => Ok(dir.join(name)),
            None => Err(Error::Corrupt(format!("unusable file name {:?}",self.name)))
        }
    }
}

/// Read a header, verifying it has the `expected` format.
/// Short data is `Truncated` and a wrong magic number is `FileFormatMismatch`,
/// in either case nothing past the header is touched.
pub fn read_header<R: Read>(reader: &mut R,expected: Format) -> Result<Header,Error> {
    let mut by2: [u8;2] = [0;2];
    let mut by8: [u8;8] = [0;8];
    reader.read_exact(&mut by2).map_err(Error::from_read)?;
    let magic = u16::from_le_bytes(by2);
    match Format::from_u16(magic) {
        Some(format) if format==expected => {},
        _ => {
            log::error!("magic number {:04X} does not match {:?}",magic,expected);
            return Err(Error::FileFormatMismatch);
        }
    }
    let bit_count = match expected {
        Format::Huffman => {
            reader.read_exact(&mut by8).map_err(Error::from_read)?;
            Some(u64::from_le_bytes(by8))
        },
        Format::LZ78 => None
    };
    reader.read_exact(&mut by8).map_err(Error::from_read)?;
    let name_len = u64::from_le_bytes(by8);
    if name_len > MAX_NAME_LEN as u64 {
        log::error!("stored name length {} is too long",name_len);
        return Err(Error::NameTooLong);
    }
    let mut name = vec![0;name_len as usize + 1];
    reader.read_exact(&mut name).map_err(Error::from_read)?;
    if name.pop() != Some(0) {
        return Err(Error::Corrupt("file name is not terminated".to_string()));
    }
    let name = match String::from_utf8(name) {
        Ok(s) => s,
        Err(_) => return Err(Error::Corrupt("file name is not UTF-8".to_string()))
    };
    log::debug!("{:?} header for {}",expected,name);
    Ok(Header {
        format: expected,
        bit_count,
        name
    })
}

#[test]
fn header_layout() {
    let mut ans: Vec<u8> = Vec::new();
    let mut header = Header::create(Format::Huffman,"a.txt");
    header.bit_count = Some(11);
    assert_eq!(header.write(&mut ans).unwrap(),24);
    assert_eq!(ans,hex::decode("55480b000000000000000500000000000000612e74787400").unwrap());
    let mut ans: Vec<u8> = Vec::new();
    let header = Header::create(Format::LZ78,"ab.txt");
    assert_eq!(header.write(&mut ans).unwrap(),17);
    assert_eq!(ans,hex::decode("3848060000000000000061622e74787400").unwrap());
}

#[test]
fn header_invertibility() {
    let mut ans: Vec<u8> = Vec::new();
    let mut header = Header::create(Format::Huffman,"notes.md");
    header.bit_count = Some(0x0123456789);
    header.write(&mut ans).unwrap();
    let mut src = std::io::Cursor::new(ans);
    assert_eq!(read_header(&mut src,Format::Huffman).unwrap(),header);
}

#[test]
fn bad_headers() {
    // magic of the other container
    let src = hex::decode("3848060000000000000061622e74787400").unwrap();
    let ans = read_header(&mut std::io::Cursor::new(src),Format::Huffman);
    assert!(matches!(ans,Err(Error::FileFormatMismatch)));
    // magic cut short
    let ans = read_header(&mut std::io::Cursor::new(vec![0x55]),Format::Huffman);
    assert!(matches!(ans,Err(Error::Truncated)));
    // nothing at all
    let ans = read_header(&mut std::io::Cursor::new(Vec::new()),Format::LZ78);
    assert!(matches!(ans,Err(Error::Truncated)));
    // name cut short
    let src = hex::decode("384806000000000000006162").unwrap();
    let ans = read_header(&mut std::io::Cursor::new(src),Format::LZ78);
    assert!(matches!(ans,Err(Error::Truncated)));
    // absurd name length
    let src = hex::decode("3848ffffffffffffffff").unwrap();
    let ans = read_header(&mut std::io::Cursor::new(src),Format::LZ78);
    assert!(matches!(ans,Err(Error::NameTooLong)));
    // missing terminator
    let src = hex::decode("3848020000000000000061627a").unwrap();
    let ans = read_header(&mut std::io::Cursor::new(src),Format::LZ78);
    assert!(matches!(ans,Err(Error::Corrupt(_))));
}

#[test]
fn long_names() {
    let mut ans: Vec<u8> = Vec::new();
    let name = "n".repeat(MAX_NAME_LEN);
    Header::create(Format::LZ78,&name).write(&mut ans).expect("write failed");
    let header = read_header(&mut std::io::Cursor::new(ans),Format::LZ78).expect("read failed");
    assert_eq!(header.name,name);
    // one byte over is refused before anything is written
    let mut ans: Vec<u8> = Vec::new();
    let err = Header::create(Format::Huffman,&[&name,"n"].concat()).write(&mut ans).unwrap_err();
    assert!(matches!(err,Error::NameTooLong));
    assert!(err.is_format_error());
    assert!(ans.is_empty());
}

#[test]
fn output_stays_in_dir() {
    let dir = Path::new("out");
    let header = Header::create(Format::LZ78,"../../etc/passwd");
    assert_eq!(header.output_path(dir).unwrap(),Path::new("out").join("passwd"));
    let header = Header::create(Format::LZ78,"..");
    assert!(header.output_path(dir).is_err());
    let header = Header::create(Format::LZ78,"");
    assert!(header.output_path(dir).is_err());
}
