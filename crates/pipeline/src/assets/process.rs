//! Off-thread asset processing: digest and precompressed variants.

use crate::assets::negotiate::Encoding;
use crate::assets::options::CompressOptions;
use brotli::enc::backward_references::BrotliEncoderMode;
use brotli::enc::BrotliEncoderParams;
use bytes::Bytes;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use micro_pool::Job;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::io;
use std::io::Write;

const BROTLI_QUALITY: i32 = 11;
const BROTLI_LGWIN: i32 = 22;

/// One file to process.
#[derive(Debug)]
pub struct AssetInput {
    pub(crate) content: Bytes,
    pub(crate) compress: CompressOptions,
}

/// What a file turned into: its digest and every stored representation.
#[derive(Debug)]
pub struct ProcessedAsset {
    pub(crate) digest: String,
    pub(crate) variants: Vec<(Encoding, Bytes)>,
}

/// Runs on the worker pool, compression is far too slow for the request threads.
#[derive(Debug, Default)]
pub struct AssetJob;

impl Job for AssetJob {
    type Input = AssetInput;
    type Output = ProcessedAsset;
    type Error = io::Error;

    fn run(&self, input: AssetInput) -> io::Result<ProcessedAsset> {
        let AssetInput { content, compress } = input;
        let digest = sha256_hex(&content);

        let mut variants = Vec::with_capacity(4);
        if compress.deflate {
            variants.push((Encoding::Deflate, deflate(&content)?));
        }
        if compress.gzip {
            variants.push((Encoding::Gzip, gzip(&content)?));
        }
        if compress.br {
            variants.push((Encoding::Br, br(&content)?));
        }
        variants.push((Encoding::Identity, content));

        Ok(ProcessedAsset { digest, variants })
    }
}

pub(crate) fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hasher.finalize().iter().fold(String::with_capacity(64), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}

fn deflate(content: &[u8]) -> io::Result<Bytes> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(content.len() / 2), Compression::best());
    encoder.write_all(content)?;
    encoder.finish().map(Bytes::from)
}

fn gzip(content: &[u8]) -> io::Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(content.len() / 2), Compression::best());
    encoder.write_all(content)?;
    encoder.finish().map(Bytes::from)
}

fn br(content: &[u8]) -> io::Result<Bytes> {
    let params = BrotliEncoderParams {
        quality: BROTLI_QUALITY,
        lgwin: BROTLI_LGWIN,
        mode: BrotliEncoderMode::BROTLI_MODE_TEXT,
        ..Default::default()
    };
    let mut compressed = Vec::with_capacity(content.len() / 2);
    brotli::BrotliCompress(&mut io::Cursor::new(content), &mut compressed, &params)?;
    Ok(Bytes::from(compressed))
}

#[cfg(test)]
mod tests {
    use super::{sha256_hex, AssetInput, AssetJob};
    use crate::assets::negotiate::Encoding;
    use crate::assets::options::CompressOptions;
    use bytes::Bytes;
    use flate2::read::{GzDecoder, ZlibDecoder};
    use micro_pool::Job;
    use std::io::Read;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(sha256_hex(b""), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
        assert_eq!(sha256_hex(b"abc"), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn test_variants_decompress_to_identity() {
        let content = Bytes::from("body { color: red; }\n".repeat(64));
        let processed =
            AssetJob.run(AssetInput { content: content.clone(), compress: CompressOptions::default() }).unwrap();

        let variant = |encoding: Encoding| processed.variants.iter().find(|(e, _)| *e == encoding).map(|(_, bytes)| bytes.clone()).unwrap();

        assert_eq!(variant(Encoding::Identity), content);

        let mut inflated = Vec::new();
        ZlibDecoder::new(&variant(Encoding::Deflate)[..]).read_to_end(&mut inflated).unwrap();
        assert_eq!(inflated, content);

        let mut gunzipped = Vec::new();
        GzDecoder::new(&variant(Encoding::Gzip)[..]).read_to_end(&mut gunzipped).unwrap();
        assert_eq!(gunzipped, content);

        let mut unbrotlied = Vec::new();
        brotli::BrotliDecompress(&mut &variant(Encoding::Br)[..], &mut unbrotlied).unwrap();
        assert_eq!(unbrotlied, content);

        assert!(variant(Encoding::Br).len() < content.len());
    }

    #[test]
    fn test_no_compression() {
        let processed = AssetJob.run(AssetInput { content: Bytes::from_static(b"\x89PNG"), compress: CompressOptions::none() }).unwrap();
        assert_eq!(processed.variants.len(), 1);
        assert_eq!(processed.variants[0].0, Encoding::Identity);
        assert_eq!(processed.digest.len(), 64);
    }
}
