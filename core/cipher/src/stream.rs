//! XOR stream cipher over the automaton keystream.
//!
//! Encryption and decryption are the same operation: each input byte is
//! XORed with the keystream byte at the same position. Running the cipher
//! twice with identical parameters returns the original input.
//!
//! There is no integrity check. Decrypting with the wrong parameters does
//! not fail; it produces garbage.

use std::io::{Read, Seek, SeekFrom, Write};

use tracing::debug;
use zeroize::Zeroizing;

use cellcrypt_common::{CipherParams, Error, Result};

use crate::keystream::Keystream;
use crate::progress::{CancelToken, NoProgress, ProgressObserver};

/// Symmetric stream cipher bound to one parameter set.
#[derive(Debug, Clone)]
pub struct StreamCipher {
    params: CipherParams,
    cancel: Option<CancelToken>,
}

impl StreamCipher {
    /// Create a cipher.
    ///
    /// # Errors
    /// - Returns error if the parameters fail validation
    pub fn new(params: CipherParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            cancel: None,
        })
    }

    /// Stop transforms at the next keystream block once `token` is set.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Parameters this cipher was created with.
    pub fn params(&self) -> &CipherParams {
        &self.params
    }

    /// Keystream of `length` bytes for this cipher's parameters.
    pub fn keystream<'a>(&self, length: u64) -> Result<Keystream<'a>> {
        let keystream = Keystream::from_params(&self.params, length)?;
        Ok(match &self.cancel {
            Some(token) => keystream.with_cancel_token(token.clone()),
            None => keystream,
        })
    }

    /// Transform everything from the input's current position to its end.
    ///
    /// # Errors
    /// - `UnknownLength` if the input cannot seek to report its length
    /// - I/O errors from reader/writer
    /// - `Cancelled` if the cancel token was set
    pub fn transform<R: Read + Seek, W: Write>(&self, input: R, output: W) -> Result<u64> {
        self.transform_with_progress(input, output, &mut NoProgress)
    }

    /// Like [`transform`](Self::transform), reporting progress per block.
    pub fn transform_with_progress<R: Read + Seek, W: Write>(
        &self,
        mut input: R,
        output: W,
        observer: &mut dyn ProgressObserver,
    ) -> Result<u64> {
        let length = input_length(&mut input)?;
        self.transform_sized(input, Some(length), output, observer)
    }

    /// Transform exactly `length` bytes from a non-seekable input.
    ///
    /// # Preconditions
    /// - `length` must be known up front; the keystream is sized before any
    ///   input is read
    ///
    /// # Errors
    /// - `UnknownLength` if `length` is `None`
    /// - I/O error if the input ends before `length` bytes
    pub fn transform_sized<R: Read, W: Write>(
        &self,
        mut input: R,
        length: Option<u64>,
        mut output: W,
        observer: &mut dyn ProgressObserver,
    ) -> Result<u64> {
        let total = length.ok_or(Error::UnknownLength)?;
        let mut keystream = self.keystream(total)?.with_observer(observer);
        let mut buffer = Zeroizing::new(Vec::new());

        while let Some(key) = keystream.next_block()? {
            buffer.resize(key.len(), 0);
            input.read_exact(buffer.as_mut_slice())?;
            for (byte, k) in buffer.iter_mut().zip(key) {
                *byte ^= k;
            }
            output.write_all(&buffer)?;
        }
        output.flush()?;

        debug!(
            bytes = total,
            width = self.params.width,
            height = self.params.height,
            "Stream transformed"
        );
        Ok(total)
    }

    /// Transform an in-memory buffer.
    pub fn transform_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(data.len());
        self.transform_sized(data, Some(data.len() as u64), &mut output, &mut NoProgress)?;
        Ok(output)
    }
}

/// Transform `input` into `output` with the default topology and `seed`.
pub fn transform<R: Read + Seek, W: Write>(input: R, output: W, seed: u64) -> Result<u64> {
    StreamCipher::new(CipherParams::new(seed))?.transform(input, output)
}

/// Bytes between the reader's current position and its end.
fn input_length<R: Seek>(input: &mut R) -> Result<u64> {
    let start = input.stream_position().map_err(|_| Error::UnknownLength)?;
    let end = input
        .seek(SeekFrom::End(0))
        .map_err(|_| Error::UnknownLength)?;
    input.seek(SeekFrom::Start(start))?;
    Ok(end.saturating_sub(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystream::keystream_bytes;
    use crate::progress::Progress;
    use proptest::prelude::*;
    use std::io::{self, Cursor};

    fn small_cipher(seed: u64) -> StreamCipher {
        StreamCipher::new(
            CipherParams::new(seed)
                .with_topology(8, 8)
                .with_generations_per_block(1),
        )
        .unwrap()
    }

    /// A reader that refuses to seek, standing in for a pipe.
    struct Unseekable<R>(R);

    impl<R: Read> Read for Unseekable<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl<R> Seek for Unseekable<R> {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "not seekable"))
        }
    }

    #[test]
    fn test_concrete_scenario() {
        let input: Vec<u8> = (0x00..=0x07).collect();

        let first = small_cipher(42).transform_bytes(&input).unwrap();
        let second = small_cipher(42).transform_bytes(&input).unwrap();
        assert_eq!(first, second);

        let recovered = small_cipher(42).transform_bytes(&first).unwrap();
        assert_eq!(recovered, input);
    }

    #[test]
    fn test_output_is_input_xor_keystream() {
        let input = b"cellular automata".to_vec();
        let key = keystream_bytes(small_cipher(9).params(), input.len() as u64).unwrap();

        let output = small_cipher(9).transform_bytes(&input).unwrap();
        let expected: Vec<u8> = input.iter().zip(&key).map(|(b, k)| b ^ k).collect();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_transform_seekable_roundtrip() {
        let plaintext = b"Hello, cellular stream cipher!".to_vec();
        let cipher = small_cipher(1234);

        let mut encrypted = Vec::new();
        let n = cipher.transform(Cursor::new(&plaintext), &mut encrypted).unwrap();
        assert_eq!(n, plaintext.len() as u64);
        assert_ne!(encrypted, plaintext);

        let mut decrypted = Vec::new();
        cipher.transform(Cursor::new(&encrypted), &mut decrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_transform_from_current_position() {
        let data = b"skip-this:payload".to_vec();
        let mut cursor = Cursor::new(&data);
        cursor.set_position(10);

        let mut output = Vec::new();
        small_cipher(2).transform(&mut cursor, &mut output).unwrap();

        assert_eq!(output, small_cipher(2).transform_bytes(b"payload").unwrap());
    }

    #[test]
    fn test_empty_input() {
        let output = small_cipher(5).transform_bytes(&[]).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_unknown_length() {
        let cipher = small_cipher(5);
        let mut output = Vec::<u8>::new();

        let result = cipher.transform(Unseekable(&b"data"[..]), &mut output);
        assert!(matches!(result, Err(Error::UnknownLength)));

        let result = cipher.transform_sized(&b"data"[..], None, &mut output, &mut NoProgress);
        assert!(matches!(result, Err(Error::UnknownLength)));
    }

    #[test]
    fn test_sized_non_seekable_input() {
        let cipher = small_cipher(5);
        let mut output = Vec::new();
        cipher
            .transform_sized(Unseekable(&b"data"[..]), Some(4), &mut output, &mut NoProgress)
            .unwrap();
        assert_eq!(output, cipher.transform_bytes(b"data").unwrap());
    }

    #[test]
    fn test_short_input_fails() {
        let cipher = small_cipher(5);
        let mut output = Vec::<u8>::new();
        let result = cipher.transform_sized(&b"abc"[..], Some(10), &mut output, &mut NoProgress);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_wrong_seed_gives_garbage() {
        let plaintext = b"Secret streaming data".to_vec();
        let encrypted = small_cipher(1).transform_bytes(&plaintext).unwrap();
        let decrypted = small_cipher(2).transform_bytes(&encrypted).unwrap();

        assert_eq!(decrypted.len(), plaintext.len());
        assert_ne!(decrypted, plaintext);
    }

    #[test]
    fn test_progress_observed() {
        let mut last = None;
        let mut observer = |p: Progress| last = Some(p);
        let data = vec![0u8; 20];
        small_cipher(3)
            .transform_with_progress(Cursor::new(&data), Vec::<u8>::new(), &mut observer)
            .unwrap();

        let last = last.unwrap();
        assert_eq!(last.written, 20);
        assert_eq!(last.remaining, 0);
    }

    #[test]
    fn test_cancelled_transform() {
        let token = CancelToken::new();
        token.cancel();
        let cipher = small_cipher(3).with_cancel_token(token);

        assert!(matches!(
            cipher.transform_bytes(b"anything"),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_free_function_uses_default_topology() {
        let data = b"default topology".to_vec();
        let mut out = Vec::new();
        transform(Cursor::new(&data), &mut out, 77).unwrap();

        let cipher = StreamCipher::new(CipherParams::new(77)).unwrap();
        assert_eq!(cipher.transform_bytes(&out).unwrap(), data);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_cipher_symmetry(
            data in proptest::collection::vec(any::<u8>(), 0..100),
            seed in any::<u64>(),
            width in 1usize..10,
            height in 1usize..10,
            generations in 1usize..4,
        ) {
            let params = CipherParams::new(seed)
                .with_topology(width, height)
                .with_generations_per_block(generations);
            let cipher = StreamCipher::new(params).unwrap();

            let encrypted = cipher.transform_bytes(&data).unwrap();
            let decrypted = cipher.transform_bytes(&encrypted).unwrap();
            prop_assert_eq!(decrypted, data);
        }
    }
}
