//! Whole-file encryption into containers.
//!
//! These functions are synchronous and can run for a long time on large
//! files with the default 256x256 topology. Callers that need a responsive
//! front end should run them on a worker thread.
//!
//! Output files are written to a temporary file beside the destination and
//! renamed into place only once complete, so a failed or cancelled run never
//! touches an existing file.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::info;

use cellcrypt_common::{Error, Result};

use crate::container::EncryptedContainer;
use crate::progress::ProgressObserver;
use crate::stream::StreamCipher;

/// Encrypt `input` into a container saved at `output`.
///
/// The container records the canonical path of `input` as the original
/// name, or `input` as given if it cannot be canonicalized.
///
/// # Errors
/// - I/O errors reading the input or writing the container
/// - `Cancelled` if the cipher's cancel token was set
pub fn encrypt_file(
    cipher: &StreamCipher,
    input: &Path,
    output: &Path,
    observer: &mut dyn ProgressObserver,
) -> Result<EncryptedContainer> {
    let reader = BufReader::new(File::open(input)?);
    let mut ciphertext = Vec::new();
    let bytes = cipher.transform_with_progress(reader, &mut ciphertext, observer)?;

    let original_name = input
        .canonicalize()
        .unwrap_or_else(|_| input.to_path_buf());
    let container = EncryptedContainer::create(original_name.to_string_lossy(), ciphertext);
    replace_file(output, |writer| {
        writer.write_all(&container.to_bytes()?)?;
        Ok(())
    })?;

    info!(
        input = %input.display(),
        output = %output.display(),
        bytes,
        "File encrypted"
    );
    Ok(container)
}

/// Decrypt the container at `container_path` next to itself.
///
/// The plaintext is written into the container's directory under the file
/// name part of the recorded original name.
pub fn decrypt_file(
    cipher: &StreamCipher,
    container_path: &Path,
    observer: &mut dyn ProgressObserver,
) -> Result<PathBuf> {
    let dir = match container_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    decrypt_file_to(cipher, container_path, &dir, observer)
}

/// Decrypt the container at `container_path` into `output_dir`.
///
/// # Errors
/// - `MalformedContainer` if the container is invalid or its original name
///   has no usable file name
/// - I/O errors
pub fn decrypt_file_to(
    cipher: &StreamCipher,
    container_path: &Path,
    output_dir: &Path,
    observer: &mut dyn ProgressObserver,
) -> Result<PathBuf> {
    let container = EncryptedContainer::open(container_path)?;
    let name = file_name(container.original_name())?;
    let output = output_dir.join(name);

    let bytes = replace_file(&output, |writer| {
        cipher.transform_with_progress(Cursor::new(container.ciphertext()), writer, observer)
    })?;

    info!(
        container = %container_path.display(),
        output = %output.display(),
        bytes,
        "File decrypted"
    );
    Ok(output)
}

/// Write `length` raw keystream bytes to `output`.
pub fn write_keystream<W: Write>(
    cipher: &StreamCipher,
    mut output: W,
    length: u64,
    observer: &mut dyn ProgressObserver,
) -> Result<u64> {
    let mut keystream = cipher.keystream(length)?.with_observer(observer);
    while let Some(block) = keystream.next_block()? {
        output.write_all(block)?;
    }
    output.flush()?;
    Ok(length)
}

/// Write `length` raw keystream bytes to the file at `path`.
///
/// An existing file at `path` is replaced only if generation completes.
pub fn write_keystream_file(
    cipher: &StreamCipher,
    path: &Path,
    length: u64,
    observer: &mut dyn ProgressObserver,
) -> Result<u64> {
    replace_file(path, |writer| write_keystream(cipher, writer, length, observer))
}

/// Run `write` against a temporary file next to `path`, then move it over
/// `path`. On error the temporary file is removed and `path` is untouched.
fn replace_file<T, F>(path: &Path, write: F) -> Result<T>
where
    F: FnOnce(&mut dyn Write) -> Result<T>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    let value = {
        let mut writer = BufWriter::new(temp.as_file_mut());
        let value = write(&mut writer)?;
        writer.flush()?;
        value
    };
    temp.persist(path).map_err(|e| e.error)?;
    Ok(value)
}

/// Last path component of a recorded name, accepting either separator.
fn file_name(original_name: &str) -> Result<&str> {
    match original_name.rsplit(|c: char| c == '/' || c == '\\').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => Ok(name),
        _ => Err(Error::MalformedContainer(format!(
            "No file name in original name: {:?}",
            original_name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystream::keystream_bytes;
    use crate::progress::{CancelToken, NoProgress, Progress};
    use cellcrypt_common::CipherParams;
    use std::fs;
    use tempfile::TempDir;

    fn small_cipher(seed: u64) -> StreamCipher {
        StreamCipher::new(
            CipherParams::new(seed)
                .with_topology(16, 16)
                .with_generations_per_block(2),
        )
        .unwrap()
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/tmp/a/report.pdf").unwrap(), "report.pdf");
        assert_eq!(file_name(r"C:\Users\me\notes.txt").unwrap(), "notes.txt");
        assert_eq!(file_name("plain.bin").unwrap(), "plain.bin");
        assert!(file_name("/tmp/dir/").is_err());
        assert!(file_name("..").is_err());
    }

    #[test]
    fn test_encrypt_decrypt_file_roundtrip() {
        let source_dir = TempDir::new().unwrap();
        let vault_dir = TempDir::new().unwrap();

        let input = source_dir.path().join("notes.txt");
        let plaintext = b"Cellular automata make a fine toy cipher.".repeat(20);
        fs::write(&input, &plaintext).unwrap();

        let container_path = vault_dir.path().join("notes.cae");
        let cipher = small_cipher(99);
        let container = encrypt_file(&cipher, &input, &container_path, &mut NoProgress).unwrap();
        assert_eq!(container.ciphertext().len(), plaintext.len());
        assert_ne!(container.ciphertext(), &plaintext[..]);

        let output = decrypt_file(&cipher, &container_path, &mut NoProgress).unwrap();
        assert_eq!(output, vault_dir.path().join("notes.txt"));
        assert_eq!(fs::read(&output).unwrap(), plaintext);
    }

    #[test]
    fn test_original_name_is_canonical() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let input = dir.path().join("report.txt");
        fs::write(&input, b"quarterly numbers").unwrap();

        let indirect = dir.path().join("sub").join("..").join("report.txt");
        let container_path = dir.path().join("report.cae");
        let container =
            encrypt_file(&small_cipher(3), &indirect, &container_path, &mut NoProgress).unwrap();

        assert_eq!(
            Path::new(container.original_name()),
            input.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_cancelled_decrypt_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("notes.txt");
        fs::write(&input, b"precious plaintext").unwrap();
        let container_path = dir.path().join("notes.cae");
        encrypt_file(&small_cipher(4), &input, &container_path, &mut NoProgress).unwrap();

        let token = CancelToken::new();
        token.cancel();
        let cipher = small_cipher(4).with_cancel_token(token);

        let result = decrypt_file(&cipher, &container_path, &mut NoProgress);
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(fs::read(&input).unwrap(), b"precious plaintext".to_vec());
        // Only the plaintext and the container remain.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_cancelled_keystream_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pad.bin");
        fs::write(&path, b"old pad").unwrap();

        let token = CancelToken::new();
        token.cancel();
        let cipher = small_cipher(6).with_cancel_token(token);

        let result = write_keystream_file(&cipher, &path, 100, &mut NoProgress);
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(fs::read(&path).unwrap(), b"old pad".to_vec());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_keystream_file_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pad.bin");
        fs::write(&path, b"old pad").unwrap();

        let cipher = small_cipher(6);
        let written = write_keystream_file(&cipher, &path, 40, &mut NoProgress).unwrap();

        assert_eq!(written, 40);
        assert_eq!(fs::read(&path).unwrap(), keystream_bytes(cipher.params(), 40).unwrap());
    }

    #[test]
    fn test_decrypt_to_directory() {
        let dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();

        let input = dir.path().join("data.bin");
        fs::write(&input, [1u8, 2, 3, 4, 5]).unwrap();
        let container_path = dir.path().join("data.cae");

        let cipher = small_cipher(5);
        encrypt_file(&cipher, &input, &container_path, &mut NoProgress).unwrap();
        let output = decrypt_file_to(&cipher, &container_path, out_dir.path(), &mut NoProgress)
            .unwrap();

        assert_eq!(output, out_dir.path().join("data.bin"));
        assert_eq!(fs::read(&output).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_decrypt_wrong_seed_is_garbage() {
        let dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let input = dir.path().join("msg.txt");
        fs::write(&input, b"the eagle has landed").unwrap();
        let container_path = dir.path().join("msg.cae");

        encrypt_file(&small_cipher(1), &input, &container_path, &mut NoProgress).unwrap();
        let output =
            decrypt_file_to(&small_cipher(2), &container_path, out_dir.path(), &mut NoProgress)
                .unwrap();

        assert_ne!(fs::read(&output).unwrap(), b"the eagle has landed".to_vec());
    }

    #[test]
    fn test_decrypt_malformed_container() {
        let dir = TempDir::new().unwrap();
        let container_path = dir.path().join("bogus.cae");
        fs::write(&container_path, b"definitely not a container").unwrap();

        let result = decrypt_file(&small_cipher(1), &container_path, &mut NoProgress);
        assert!(matches!(result, Err(Error::MalformedContainer(_))));
    }

    #[test]
    fn test_write_keystream() {
        let cipher = small_cipher(8);
        let mut reports = 0;
        let mut observer = |_: Progress| reports += 1;

        let mut out = Vec::new();
        write_keystream(&cipher, &mut out, 70, &mut observer).unwrap();

        assert_eq!(out, keystream_bytes(cipher.params(), 70).unwrap());
        // 16x16 grid gives 32-byte blocks: 32 + 32 + 6.
        assert_eq!(reports, 3);
    }
}
