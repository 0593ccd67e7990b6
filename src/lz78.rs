//! LZ78 Compression
//!
//! The input is cut into phrases, each phrase being the longest phrase already known
//! plus one more byte.  Each phrase goes out as a record holding the id of the known
//! phrase and the extra byte:
//!
//! ```text
//! record:      id (2, little endian) | byte (1)
//! last record: id (2, little endian)             <- only if input ended inside a phrase
//! ```
//! Id 0 is the empty phrase.  New phrases get ids 1,2,3,... until `max_entries` is reached,
//! after which encoder and decoder both stop adding phrases, but keep matching the ones they have.
//! Records are byte aligned, no bit packing is needed.

use std::collections::HashMap;
use std::io::{Cursor,Read,Write,BufReader,BufWriter};
use std::path::{Path,PathBuf};
use crate::tools::header::{Format,Header,read_header};
use crate::{Error,Result};

/// Options controlling compression, must be the same for encoding and decoding
#[derive(Clone)]
pub struct Options {
    /// stop creating phrases after this many, ids cannot exceed this
    pub max_entries: u16
}

pub const STD_OPTIONS: Options = Options {
    max_entries: u16::MAX
};

/// One unit of LZ78 output.
#[derive(Clone,Debug,PartialEq)]
pub struct Record {
    /// id of a known phrase, 0 is the empty phrase
    pub id: u16,
    /// byte that extends the phrase, only the final record can be missing it
    pub symbol: Option<u8>
}

/// Node in the encoder's trie, sons are keyed by the next byte of the phrase.
struct TrieNode {
    id: u16,
    son: HashMap<u8,usize>
}

/// Structure to perform LZ78 compression.
/// The trie is stored as an arena, index 0 is the root (empty phrase).
struct Encoder {
    opt: Options,
    nodes: Vec<TrieNode>,
    /// trie node at the end of the phrase matched so far
    curr: usize,
    /// id the next new phrase will get
    next_id: u32
}

/// Structure to perform LZ78 expansion.
/// Each entry links back to the entry of its prefix, entry 0 is never used.
struct Dictionary {
    opt: Options,
    /// (prefix id, last byte) for each id
    entries: Vec<(u16,u8)>
}

impl Encoder {
    fn new(opt: &Options) -> Self {
        Self {
            opt: opt.clone(),
            nodes: vec![TrieNode { id: 0, son: HashMap::new() }],
            curr: 0,
            next_id: 1
        }
    }
    fn is_full(&self) -> bool {
        self.next_id > self.opt.max_entries as u32
    }
    /// Try to extend the current match with `c`.  If the trie has no such phrase, the
    /// match ends: return its record, add the new phrase if there is room, and go back to the root.
    fn push(&mut self,c: u8) -> Option<Record> {
        if let Some(son) = self.nodes[self.curr].son.get(&c) {
            self.curr = *son;
            return None;
        }
        let ans = Record {
            id: self.nodes[self.curr].id,
            symbol: Some(c)
        };
        if !self.is_full() {
            let idx = self.nodes.len();
            self.nodes.push(TrieNode { id: self.next_id as u16, son: HashMap::new() });
            self.nodes[self.curr].son.insert(c,idx);
            self.next_id += 1;
            if self.is_full() {
                log::warn!("dictionary is full at {} entries",self.opt.max_entries);
            }
        }
        self.curr = 0;
        Some(ans)
    }
    /// Record for a phrase left hanging at the end of the input, if any.
    fn finish(&self) -> Option<Record> {
        match self.curr {
            0 => None,
            _ => Some(Record { id: self.nodes[self.curr].id, symbol: None })
        }
    }
}

impl Dictionary {
    fn new(opt: &Options) -> Self {
        Self {
            opt: opt.clone(),
            entries: vec![(0,0)]
        }
    }
    fn is_full(&self) -> bool {
        self.entries.len() > self.opt.max_entries as usize
    }
    /// Walk back through the prefix links to form the phrase.
    fn get_phrase(&self,mut id: u16) -> Result<Vec<u8>> {
        if id as usize >= self.entries.len() {
            log::error!("record refers to id {} but only {} exist",id,self.entries.len()-1);
            return Err(Error::Corrupt(format!("unknown phrase id {}",id)));
        }
        let mut rev = Vec::new();
        while id != 0 {
            let (prefix,c) = self.entries[id as usize];
            rev.push(c);
            id = prefix;
        }
        Ok(rev.iter().rev().copied().collect())
    }
    /// Expand a record, adding its phrase to the dictionary if there is room.
    fn apply(&mut self,record: &Record) -> Result<Vec<u8>> {
        let mut ans = self.get_phrase(record.id)?;
        if let Some(c) = record.symbol {
            ans.push(c);
            if !self.is_full() {
                self.entries.push((record.id,c));
                if self.is_full() {
                    log::warn!("dictionary is full at {} entries",self.opt.max_entries);
                }
            }
        }
        Ok(ans)
    }
}

fn put_record<W: Write>(record: &Record,writer: &mut W) -> Result<u64> {
    writer.write_all(&u16::to_le_bytes(record.id))?;
    match record.symbol {
        Some(c) => {
            writer.write_all(&[c])?;
            Ok(3)
        },
        None => Ok(2)
    }
}

/// Fill as much of `buf` as the stream allows, returning the count.
fn read_up_to<R: Read>(reader: &mut R,buf: &mut [u8]) -> Result<usize> {
    let mut count = 0;
    while count < buf.len() {
        match reader.read(&mut buf[count..]) {
            Ok(0) => break,
            Ok(n) => count += n,
            Err(e) if e.kind()==std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e))
        }
    }
    Ok(count)
}

/// Get the next record, or `None` at a clean end of data.
fn get_record<R: Read>(reader: &mut R) -> Result<Option<Record>> {
    let mut by2: [u8;2] = [0;2];
    let mut by1: [u8;1] = [0];
    match read_up_to(reader,&mut by2)? {
        0 => return Ok(None),
        1 => return Err(Error::Truncated),
        _ => {}
    }
    let symbol = match read_up_to(reader,&mut by1)? {
        0 => None,
        _ => Some(by1[0])
    };
    Ok(Some(Record {
        id: u16::from_le_bytes(by2),
        symbol
    }))
}

/// Main compression function.
/// `expanded_in` is an object with the `Read` trait, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with the `Write` trait, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// `name` is stored in the header as the name of the original file.
/// Returns (in_size,out_size) or error.
pub fn encode<R,W>(expanded_in: &mut R, compressed_out: &mut W, name: &str, opt: &Options) -> Result<(u64,u64)>
where R: Read, W: Write {
    let reader = BufReader::new(expanded_in);
    let mut writer = BufWriter::new(compressed_out);
    let mut out_size = Header::create(Format::LZ78,name).write(&mut writer)?;
    let mut lz = Encoder::new(opt);
    let mut in_size: u64 = 0;
    let mut count: u64 = 0;
    for byte in reader.bytes() {
        let c = byte?;
        in_size += 1;
        if let Some(record) = lz.push(c) {
            log::trace!("record {}.{:02X}",record.id,c);
            out_size += put_record(&record,&mut writer)?;
            count += 1;
        }
    }
    if let Some(record) = lz.finish() {
        log::trace!("final record {}",record.id);
        out_size += put_record(&record,&mut writer)?;
        count += 1;
    }
    log::debug!("{} bytes encoded in {} records",in_size,count);
    writer.flush()?;
    Ok((in_size,out_size))
}

/// Decode the records following a header that has already been read.
fn decode_records<R,W>(header: &Header, reader: &mut R, writer: &mut W, opt: &Options) -> Result<(u64,u64)>
where R: Read, W: Write {
    let mut dict = Dictionary::new(opt);
    let mut in_size = header.len();
    let mut out_size: u64 = 0;
    while let Some(record) = get_record(reader)? {
        let phrase = dict.apply(&record)?;
        log::trace!("record {}.{:?} -> {} bytes",record.id,record.symbol,phrase.len());
        writer.write_all(&phrase)?;
        in_size += match record.symbol {
            Some(_) => 3,
            None => 2
        };
        out_size += phrase.len() as u64;
    }
    writer.flush()?;
    log::debug!("{} bytes decoded",out_size);
    Ok((in_size,out_size))
}

/// Main decompression function.
/// `compressed_in` is an object with the `Read` trait, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `expanded_out` is an object with the `Write` trait, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (stored name,in_size,out_size) or error.
pub fn decode<R,W>(compressed_in: &mut R, expanded_out: &mut W, opt: &Options) -> Result<(String,u64,u64)>
where R: Read, W: Write {
    let mut reader = BufReader::new(compressed_in);
    let mut writer = BufWriter::new(expanded_out);
    let header = read_header(&mut reader,Format::LZ78)?;
    let (in_size,out_size) = decode_records(&header,&mut reader,&mut writer,opt)?;
    Ok((header.name,in_size,out_size))
}

/// Convenience function, calls `encode` with a slice returning a Vec
pub fn encode_slice(slice: &[u8],name: &str,opt: &Options) -> Result<Vec<u8>> {
    let mut src = Cursor::new(slice);
    let mut ans: Vec<u8> = Vec::new();
    encode(&mut src,&mut ans,name,opt)?;
    Ok(ans)
}

/// Convenience function, calls `decode` with a slice returning the stored name and a Vec
pub fn decode_slice(slice: &[u8],opt: &Options) -> Result<(String,Vec<u8>)> {
    let mut src = Cursor::new(slice);
    let mut ans: Vec<u8> = Vec::new();
    let (name,_,_) = decode(&mut src,&mut ans,opt)?;
    Ok((name,ans))
}

/// Compress the file at `path_in` into a new file at `path_out`.
/// The base name of `path_in` is stored in the header.
/// Returns (in_size,out_size) or error.
pub fn encode_file(path_in: &Path,path_out: &Path,opt: &Options) -> Result<(u64,u64)> {
    let mut in_file = std::fs::File::open(path_in)?;
    let mut out_file = std::fs::File::create(path_out)?;
    encode(&mut in_file,&mut out_file,&crate::base_name(path_in),opt)
}

/// Expand `compressed_in` into a new file in `out_dir`, using the name stored in the header.
/// Returns the path of the expanded file.
pub fn decode_to_dir<R: Read>(compressed_in: &mut R,out_dir: &Path,opt: &Options) -> Result<PathBuf> {
    let mut reader = BufReader::new(compressed_in);
    let header = read_header(&mut reader,Format::LZ78)?;
    let path_out = header.output_path(out_dir)?;
    let mut writer = BufWriter::new(std::fs::File::create(&path_out)?);
    decode_records(&header,&mut reader,&mut writer,opt)?;
    Ok(path_out)
}

/// Expand the file at `path_in` into `out_dir`, using the name stored in the header.
/// Returns the path of the expanded file.
pub fn decode_file(path_in: &Path,out_dir: &Path,opt: &Options) -> Result<PathBuf> {
    let mut in_file = std::fs::File::open(path_in)?;
    decode_to_dir(&mut in_file,out_dir,opt)
}

// *************** TESTS *****************

#[cfg(test)]
fn trace(slice: &[u8],opt: &Options) -> Vec<Record> {
    let mut lz = Encoder::new(opt);
    let mut ans: Vec<Record> = slice.iter().filter_map(|c| lz.push(*c)).collect();
    ans.extend(lz.finish());
    ans
}

#[cfg(test)]
fn parse(compressed: &[u8]) -> Vec<Record> {
    let mut src = Cursor::new(compressed);
    read_header(&mut src,Format::LZ78).expect("bad header");
    let mut ans = Vec::new();
    while let Some(record) = get_record(&mut src).expect("bad record") {
        ans.push(record);
    }
    ans
}

#[cfg(test)]
fn rec(id: u16,symbol: Option<u8>) -> Record {
    Record { id, symbol }
}

#[test]
fn compression_works() {
    let test_data = "ABABAB".as_bytes();
    assert_eq!(trace(test_data,&STD_OPTIONS),vec![
        rec(0,Some(b'A')),
        rec(0,Some(b'B')),
        rec(1,Some(b'B')),
        rec(3,None)
    ]);
    let compressed = encode_slice(test_data,"ab.txt",&STD_OPTIONS).expect("compression failed");
    let expected = "3848060000000000000061622e747874000000410000420100420300";
    assert_eq!(compressed,hex::decode(expected).unwrap());
    let (name,expanded) = decode_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(name,"ab.txt");
    assert_eq!(expanded,test_data);

    // ends on a record boundary, so no lone id
    assert_eq!(trace("ABABABA".as_bytes(),&STD_OPTIONS),vec![
        rec(0,Some(b'A')),
        rec(0,Some(b'B')),
        rec(1,Some(b'B')),
        rec(3,Some(b'A'))
    ]);
}

#[test]
fn empty_input() {
    let compressed = encode_slice(&[],"e",&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("384801000000000000006500").unwrap());
    assert!(parse(&compressed).is_empty());
    let (name,expanded) = decode_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(name,"e");
    assert!(expanded.is_empty());
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = encode_slice(test_data,"sam.txt",&STD_OPTIONS).expect("compression failed");
    let (_,expanded) = decode_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);

    for (n,alphabet,seed) in [(1,256,11),(1000,2,12),(5000,256,13),(30000,5,14)] {
        let test_data = crate::pseudo_random(n,alphabet,seed);
        let compressed = encode_slice(&test_data,"rnd",&STD_OPTIONS).expect("compression failed");
        let (_,expanded) = decode_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
        assert_eq!(test_data,expanded);
    }
}

#[test]
fn ids_increase_from_one() {
    let test_data = crate::pseudo_random(4000,4,15);
    let records = parse(&encode_slice(&test_data,"rnd",&STD_OPTIONS).expect("compression failed"));
    // every full record creates the next id, so a record can only refer to ids before its own
    for (i,record) in records.iter().enumerate() {
        assert!((record.id as usize) <= i);
    }
    assert!(records.iter().take(records.len()-1).all(|r| r.symbol.is_some()));
}

#[test]
fn small_dictionary() {
    let test_data = crate::pseudo_random(3000,3,16);
    for max_entries in [0,1,2,10] {
        let opt = Options { max_entries };
        let compressed = encode_slice(&test_data,"rnd",&opt).expect("compression failed");
        let records = parse(&compressed);
        assert!(records.iter().all(|r| r.id <= max_entries));
        let (_,expanded) = decode_slice(&compressed,&opt).expect("expansion failed");
        assert_eq!(test_data,expanded);
    }
}

#[test]
fn full_dictionary() {
    // random bytes make short phrases, so this runs well past 65535 records
    let test_data = crate::pseudo_random(400000,256,17);
    let mut lz = Encoder::new(&STD_OPTIONS);
    let count = test_data.iter().filter_map(|c| lz.push(*c)).count();
    assert!(count > u16::MAX as usize);
    assert!(lz.is_full());
    assert_eq!(lz.nodes.len(),u16::MAX as usize + 1);
    assert_eq!(lz.nodes.iter().map(|n| n.id).max(),Some(u16::MAX));

    let compressed = encode_slice(&test_data,"big",&STD_OPTIONS).expect("compression failed");
    let mut dict = Dictionary::new(&STD_OPTIONS);
    for record in parse(&compressed) {
        dict.apply(&record).expect("bad record");
    }
    assert_eq!(dict.entries.len(),u16::MAX as usize + 1);
    let (_,expanded) = decode_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn bad_containers() {
    let compressed = encode_slice("ABABAB".as_bytes(),"ab.txt",&STD_OPTIONS).expect("compression failed");
    // wrong magic
    let mut bad = compressed.clone();
    bad[1] = 0x55;
    assert!(matches!(decode_slice(&bad,&STD_OPTIONS),Err(Error::FileFormatMismatch)));
    assert!(matches!(decode_slice(&compressed[0..1],&STD_OPTIONS),Err(Error::Truncated)));
    // half an id
    assert!(matches!(decode_slice(&compressed[0..compressed.len()-1],&STD_OPTIONS),Err(Error::Truncated)));
    // id that does not exist yet
    let mut bad = compressed.clone();
    let first_id = Header::create(Format::LZ78,"ab.txt").len() as usize;
    bad[first_id] = 9;
    assert!(matches!(decode_slice(&bad,&STD_OPTIONS),Err(Error::Corrupt(_))));
}

#[test]
fn file_invertibility() {
    let dir = tempfile::tempdir().expect("no temp dir");
    let out_dir = tempfile::tempdir().expect("no temp dir");
    let test_data = crate::pseudo_random(3000,6,18);
    let path_in = dir.path().join("plain.bin");
    let path_cmp = dir.path().join("plain.bin.lz78");
    std::fs::write(&path_in,&test_data).expect("write failed");
    let (in_size,out_size) = encode_file(&path_in,&path_cmp,&STD_OPTIONS).expect("compression failed");
    assert_eq!(in_size,3000);
    assert_eq!(out_size,std::fs::metadata(&path_cmp).unwrap().len());
    let path_out = decode_file(&path_cmp,out_dir.path(),&STD_OPTIONS).expect("expansion failed");
    assert_eq!(std::fs::read(path_out).unwrap(),test_data);
}

#[test]
fn composes_with_huffman() {
    let test_data = "TOBEORNOTTOBEORTOBEORNOT#\n".repeat(40);
    // LZ78 first, then Huffman
    let stage1 = encode_slice(test_data.as_bytes(),"tobe.txt",&STD_OPTIONS).expect("compression failed");
    let stage2 = crate::huffman::encode_slice(&stage1,"tobe.txt.lz78").expect("compression failed");
    let (name,back1) = crate::huffman::decode_slice(&stage2).expect("expansion failed");
    assert_eq!(name,"tobe.txt.lz78");
    let (name,back2) = decode_slice(&back1,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(name,"tobe.txt");
    assert_eq!(back2,test_data.as_bytes());
    // the other order also inverts
    let stage1 = crate::huffman::encode_slice(test_data.as_bytes(),"tobe.txt").expect("compression failed");
    let stage2 = encode_slice(&stage1,"tobe.txt.csz",&STD_OPTIONS).expect("compression failed");
    let (_,back1) = decode_slice(&stage2,&STD_OPTIONS).expect("expansion failed");
    let (_,back2) = crate::huffman::decode_slice(&back1).expect("expansion failed");
    assert_eq!(back2,test_data.as_bytes());
}
