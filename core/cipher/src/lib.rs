//! Keystream and cipher layer for CellCrypt.
//!
//! This module provides:
//! - Keystream generation from an evolving automaton grid
//! - A symmetric XOR stream cipher over that keystream
//! - A short-message codec with base64 transport encoding
//! - The encrypted file container and whole-file operations
//!
//! # Security
//! This is a demonstration cipher. There is no authentication: ciphertext
//! can be modified undetected, and decrypting with the wrong parameters
//! silently produces garbage.

pub mod container;
pub mod file;
pub mod keystream;
pub mod message;
pub mod progress;
pub mod stream;

pub use container::EncryptedContainer;
pub use file::{
    decrypt_file, decrypt_file_to, encrypt_file, write_keystream, write_keystream_file,
};
pub use keystream::{keystream_bytes, Keystream};
pub use message::{decode, encode, MessageSession};
pub use progress::{CancelToken, NoProgress, Progress, ProgressObserver};
pub use stream::{transform, StreamCipher};
