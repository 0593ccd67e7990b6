//! Adaptive Huffman Compression
//!
//! One pass, no code table.  The tree is rebuilt identically by the decoder as it goes,
//! see `tools::adaptive_huff`.
//!
//! * The header holds the number of payload bits, the decoder stops exactly there
//! * The bit count is patched after the payload is written, so the output must be seekable
//! * The payload is followed by up to 8 bits of zero padding, which carry no information

use std::io::{Cursor,Read,Write,Seek,SeekFrom,BufReader,BufWriter};
use std::path::{Path,PathBuf};
use crate::tools::adaptive_huff::AdaptiveHuffman;
use crate::tools::bit_stream::{BitReader,BitWriter};
use crate::tools::header::{Format,Header,read_header};
use crate::{Error,Result};

/// Main compression function.
/// `expanded_in` is an object with the `Read` trait, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// `name` is stored in the header as the name of the original file.
/// Returns (in_size,out_size) or error.
pub fn encode<R,W>(expanded_in: &mut R, compressed_out: &mut W, name: &str) -> Result<(u64,u64)>
where R: Read, W: Write + Seek {
    let reader = BufReader::new(expanded_in);
    let mut writer = BufWriter::new(compressed_out);
    let start = writer.stream_position()?;
    let header = Header::create(Format::Huffman,name);
    header.write(&mut writer)?;
    log::debug!("wrote header for {}",name);

    let mut huff = AdaptiveHuffman::new();
    let mut bits = BitWriter::new();
    let mut in_size: u64 = 0;
    for byte in reader.bytes() {
        let c = byte?;
        let code = huff.encode_symbol(c);
        log::trace!("{:02X} -> {:?}",c,code);
        bits.put_bits(&code,&mut writer)?;
        in_size += 1;
    }
    bits.flush(&mut writer)?;
    let end = writer.stream_position()?;

    // go back and fill in the true bit count
    log::debug!("{} bytes encoded in {} bits",in_size,bits.count());
    if let Some(offset) = Format::Huffman.bit_count_offset() {
        writer.seek(SeekFrom::Start(start + offset))?;
        writer.write_all(&u64::to_le_bytes(bits.count()))?;
        writer.seek(SeekFrom::Start(end))?;
    }
    writer.flush()?;
    Ok((in_size,end - start))
}

/// Decode the payload following a header that has already been read.
/// Returns (in_size,out_size), where in_size counts the header and the bytes holding payload bits.
fn decode_payload<R,W>(header: &Header, reader: &mut R, writer: &mut W) -> Result<(u64,u64)>
where R: Read, W: Write {
    let total_bits = header.bit_count.unwrap_or(0);
    let mut huff = AdaptiveHuffman::new();
    let mut bits = BitReader::new();
    let mut out_size: u64 = 0;
    log::debug!("expecting {} bits",total_bits);
    while bits.count() < total_bits {
        let c = huff.decode_symbol(|| {
            if bits.count() >= total_bits {
                log::error!("symbol runs past the end of the bit stream");
                return Err(Error::Corrupt("symbol runs past declared bit count".to_string()));
            }
            bits.get_bit(&mut *reader).map_err(Error::from_read)
        })?;
        writer.write_all(&[c])?;
        out_size += 1;
    }
    writer.flush()?;
    log::debug!("{} bytes decoded",out_size);
    Ok((header.len() + (total_bits + 7) / 8,out_size))
}

/// Main decompression function.
/// `compressed_in` is an object with the `Read` trait, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `expanded_out` is an object with the `Write` trait, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (stored name,in_size,out_size) or error.
pub fn decode<R,W>(compressed_in: &mut R, expanded_out: &mut W) -> Result<(String,u64,u64)>
where R: Read, W: Write {
    let mut reader = BufReader::new(compressed_in);
    let mut writer = BufWriter::new(expanded_out);
    let header = read_header(&mut reader,Format::Huffman)?;
    let (in_size,out_size) = decode_payload(&header,&mut reader,&mut writer)?;
    Ok((header.name,in_size,out_size))
}

/// Convenience function, calls `encode` with a slice returning a Vec
pub fn encode_slice(slice: &[u8],name: &str) -> Result<Vec<u8>> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    encode(&mut src,&mut ans,name)?;
    Ok(ans.into_inner())
}

/// Convenience function, calls `decode` with a slice returning the stored name and a Vec
pub fn decode_slice(slice: &[u8]) -> Result<(String,Vec<u8>)> {
    let mut src = Cursor::new(slice);
    let mut ans: Vec<u8> = Vec::new();
    let (name,_,_) = decode(&mut src,&mut ans)?;
    Ok((name,ans))
}

/// Compress the file at `path_in` into a new file at `path_out`.
/// The base name of `path_in` is stored in the header.
/// Returns (in_size,out_size) or error.
pub fn encode_file(path_in: &Path,path_out: &Path) -> Result<(u64,u64)> {
    let mut in_file = std::fs::File::open(path_in)?;
    let mut out_file = std::fs::File::create(path_out)?;
    encode(&mut in_file,&mut out_file,&crate::base_name(path_in))
}

/// Expand `compressed_in` into a new file in `out_dir`, using the name stored in the header.
/// Returns the path of the expanded file.
pub fn decode_to_dir<R: Read>(compressed_in: &mut R,out_dir: &Path) -> Result<PathBuf> {
    let mut reader = BufReader::new(compressed_in);
    let header = read_header(&mut reader,Format::Huffman)?;
    let path_out = header.output_path(out_dir)?;
    let mut writer = BufWriter::new(std::fs::File::create(&path_out)?);
    decode_payload(&header,&mut reader,&mut writer)?;
    Ok(path_out)
}

/// Expand the file at `path_in` into `out_dir`, using the name stored in the header.
/// Returns the path of the expanded file.
pub fn decode_file(path_in: &Path,out_dir: &Path) -> Result<PathBuf> {
    let mut in_file = std::fs::File::open(path_in)?;
    decode_to_dir(&mut in_file,out_dir)
}

// *************** TESTS *****************

#[test]
fn compression_works() {
    // 'A' as a literal, then three 1-bit codes, then padding
    let compressed = encode_slice("AAAA".as_bytes(),"a.txt").expect("compression failed");
    let expected = "55480b000000000000000500000000000000612e7478740041e0";
    assert_eq!(compressed,hex::decode(expected).unwrap());
    let (name,expanded) = decode_slice(&compressed).expect("expansion failed");
    assert_eq!(name,"a.txt");
    assert_eq!(expanded,"AAAA".as_bytes());
}

#[test]
fn empty_input() {
    let compressed = encode_slice(&[],"e").expect("compression failed");
    // zero bit count, then the flush byte
    assert_eq!(compressed,hex::decode("554800000000000000000100000000000000650000").unwrap());
    let (name,expanded) = decode_slice(&compressed).expect("expansion failed");
    assert_eq!(name,"e");
    assert!(expanded.is_empty());
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = encode_slice(test_data,"sam.txt").expect("compression failed");
    let (_,expanded) = decode_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);

    let test_data: Vec<u8> = (0..=255).chain((0..=255).rev()).collect();
    let compressed = encode_slice(&test_data,"all").expect("compression failed");
    let (_,expanded) = decode_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data,expanded);

    for (n,alphabet,seed) in [(1,256,5),(777,3,6),(5000,256,7),(20000,17,8)] {
        let test_data = crate::pseudo_random(n,alphabet,seed);
        let compressed = encode_slice(&test_data,"rnd").expect("compression failed");
        let (_,expanded) = decode_slice(&compressed).expect("expansion failed");
        assert_eq!(test_data,expanded);
    }
}

#[test]
fn skewed_data_compresses() {
    let mut test_data = vec![b'a';4000];
    test_data.extend(crate::pseudo_random(400,8,9));
    let compressed = encode_slice(&test_data,"skew").expect("compression failed");
    assert!(compressed.len() < test_data.len() / 4);
}

#[test]
fn bad_containers() {
    let compressed = encode_slice("hello world".as_bytes(),"h").expect("compression failed");
    // wrong magic
    let mut bad = compressed.clone();
    bad[0] = 0x38;
    assert!(matches!(decode_slice(&bad),Err(Error::FileFormatMismatch)));
    // magic cut short
    assert!(matches!(decode_slice(&compressed[0..1]),Err(Error::Truncated)));
    // payload cut short
    let header_len = Header::create(Format::Huffman,"h").len() as usize;
    assert!(matches!(decode_slice(&compressed[0..header_len+2]),Err(Error::Truncated)));
}

#[test]
fn declared_count_is_respected() {
    // 'A' is 8 bits, 'B' is 1+8 bits, total 17
    let compressed = encode_slice("AB".as_bytes(),"ab").expect("compression failed");
    assert_eq!(compressed[2],17);
    // stopping at a symbol boundary simply yields fewer symbols
    let mut short = compressed.clone();
    short[2] = 8;
    let (_,expanded) = decode_slice(&short).expect("expansion failed");
    assert_eq!(expanded,"A".as_bytes());
    // stopping inside a symbol is an error
    let mut short = compressed.clone();
    short[2] = 12;
    assert!(matches!(decode_slice(&short),Err(Error::Corrupt(_))));
}

#[test]
fn file_invertibility() {
    let dir = tempfile::tempdir().expect("no temp dir");
    let out_dir = tempfile::tempdir().expect("no temp dir");
    let test_data = crate::pseudo_random(3000,40,10);
    let path_in = dir.path().join("plain.bin");
    let path_cmp = dir.path().join("plain.bin.csz");
    std::fs::write(&path_in,&test_data).expect("write failed");
    let (in_size,out_size) = encode_file(&path_in,&path_cmp).expect("compression failed");
    assert_eq!(in_size,3000);
    assert_eq!(out_size,std::fs::metadata(&path_cmp).unwrap().len());
    let path_out = decode_file(&path_cmp,out_dir.path()).expect("expansion failed");
    assert_eq!(path_out,out_dir.path().join("plain.bin"));
    assert_eq!(std::fs::read(path_out).unwrap(),test_data);
}

#[test]
fn missing_file() {
    let dir = tempfile::tempdir().expect("no temp dir");
    let ans = encode_file(&dir.path().join("nothing"),&dir.path().join("nothing.csz"));
    assert!(matches!(ans,Err(Error::Io(_))));
}
