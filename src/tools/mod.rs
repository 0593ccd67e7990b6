pub mod bit_stream;
pub mod adaptive_huff;
pub mod header;
