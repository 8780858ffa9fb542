//! Fixture generation
//!
//! Produces the files uploaded by every scenario. Each [`ContentProfile`] is
//! a generation rule aimed at a transfer-mode edge case: line-ending
//! translation, control bytes, bytes above 0x7f and payloads spanning
//! thousands of blocks.
//!
//! Generation writes raw bytes. Nothing between the generator and the disk
//! may translate line endings or re-encode text, so any difference found
//! after a round trip comes from the transfer itself.

use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Fixture generation errors
///
/// Always fatal for the enclosing scenario.
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Failed to write fixture {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Byte-content rule of a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentProfile {
    /// `\n`, `\r`, `\n`, `\r`, ... starting with `\n`
    AlternatingLineEndings,
    /// Repeated `'a'`, intended for tiny payloads
    SingleCharacter,
    /// Uniform over 0..=255
    RandomBytes,
    /// Uniform over 0..=255, at least a megabyte
    LargeRandomBytes,
    /// Repeated `'a'`, at least a megabyte
    LargeUniformAscii,
    /// Uniform over `\0`, `\r`, `\n`
    RandomControlBytes,
}

/// Byte repeated by the ASCII profiles
pub const FILL_BYTE: u8 = b'a';

const CONTROL_BYTES: [u8; 3] = [b'\0', b'\r', b'\n'];

impl ContentProfile {
    /// Generate exactly `len` bytes following this rule.
    pub fn generate(self, len: usize) -> Bytes {
        match self {
            ContentProfile::AlternatingLineEndings => (0..len)
                .map(|i| if i % 2 == 0 { b'\n' } else { b'\r' })
                .collect::<Vec<u8>>()
                .into(),
            ContentProfile::SingleCharacter | ContentProfile::LargeUniformAscii => {
                Bytes::from(vec![FILL_BYTE; len])
            }
            ContentProfile::RandomBytes | ContentProfile::LargeRandomBytes => {
                let mut data = vec![0u8; len];
                rand::rng().fill(&mut data[..]);
                data.into()
            }
            ContentProfile::RandomControlBytes => {
                let mut rng = rand::rng();
                (0..len)
                    .map(|_| CONTROL_BYTES[rng.random_range(0..CONTROL_BYTES.len())])
                    .collect::<Vec<u8>>()
                    .into()
            }
        }
    }

    /// Whether a netascii transfer may legitimately rewrite this content
    pub fn is_translation_sensitive(self) -> bool {
        matches!(
            self,
            ContentProfile::AlternatingLineEndings
                | ContentProfile::RandomBytes
                | ContentProfile::LargeRandomBytes
                | ContentProfile::RandomControlBytes
        )
    }
}

/// A named file with a content profile and exact length
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFixture {
    pub name: String,
    pub profile: ContentProfile,
    pub byte_length: usize,
}

impl TestFixture {
    pub fn new(name: impl Into<String>, profile: ContentProfile, byte_length: usize) -> Self {
        Self {
            name: name.into(),
            profile,
            byte_length,
        }
    }

    /// 400 alternating line-ending bytes
    pub fn line_endings() -> Self {
        Self::new("file1.txt", ContentProfile::AlternatingLineEndings, 400)
    }

    /// One `'a'`
    pub fn single_char() -> Self {
        Self::new("afile.txt", ContentProfile::SingleCharacter, 1)
    }

    /// 1500 random bytes across the full byte range
    pub fn non_ascii() -> Self {
        Self::new("nonascii.bin", ContentProfile::RandomBytes, 1500)
    }

    /// Roughly 2 MB of random bytes
    pub fn big_random() -> Self {
        Self::new("big_rnd_file", ContentProfile::LargeRandomBytes, 2 * 1024 * 1000)
    }

    /// Roughly 50 MB of `'a'`
    pub fn big_ascii() -> Self {
        Self::new("big_file.txt", ContentProfile::LargeUniformAscii, 50 * 1024 * 1024)
    }

    /// 10 000 bytes drawn from `\0`, `\r`, `\n`
    pub fn control_chars() -> Self {
        Self::new("ctrl_file.bin", ContentProfile::RandomControlBytes, 10_000)
    }

    /// The identical-target payload: a single `'a'` under its own name
    pub fn parallel_target() -> Self {
        Self::new("a.txt", ContentProfile::SingleCharacter, 1)
    }

    /// Default round-trip set, one fixture per profile
    pub fn catalog() -> Vec<TestFixture> {
        vec![
            Self::line_endings(),
            Self::single_char(),
            Self::big_random(),
            Self::control_chars(),
            Self::non_ascii(),
            Self::big_ascii(),
        ]
    }

    /// Look a catalog fixture up by file name
    pub fn by_name(name: &str) -> Option<TestFixture> {
        Self::catalog().into_iter().find(|f| f.name == name)
    }

    pub fn generate(&self) -> Bytes {
        self.profile.generate(self.byte_length)
    }

    /// Generate the fixture and write it under `dir`, returning the exact
    /// bytes written.
    pub async fn materialize(&self, dir: &Path) -> Result<Bytes, FixtureError> {
        let data = self.generate();
        write_file(&dir.join(&self.name), &data).await?;
        debug!(
            fixture = %self.name,
            profile = ?self.profile,
            bytes = data.len(),
            "Fixture materialized"
        );
        Ok(data)
    }
}

/// Write raw bytes to `path`, replacing any previous content.
pub async fn write_file(path: &Path, data: &[u8]) -> Result<(), FixtureError> {
    tokio::fs::write(path, data)
        .await
        .map_err(|source| FixtureError::Write {
            path: path.to_path_buf(),
            source,
        })
}
