//! Administrative configuration.
//!
//! Roles are configured from small line-oriented files. Blank lines and lines
//! starting with `#` are ignored everywhere. Any other malformed line is
//! fatal: a role never starts with part of its configuration missing.
//!
//! | File            | Record                                                   |
//! |-----------------|----------------------------------------------------------|
//! | vocabulary      | `attribute`                                              |
//! | attribute batch | `consumerName,attr1,attr2,...` then a certificate path   |
//! | policy batch    | `producer:/producerName` then `dataName,policy`          |
//! | content batch   | `dataName,path`                                          |

use abac_common::Name;
use abac_credentials::CredentialError;
use abac_policy::{Attribute, AttributeSet};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// A configuration file could not be ingested.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("{}: {source}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A line does not follow the file's format.
    #[error("{}:{line}: {reason}", path.display())]
    Invalid {
        /// The file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What is wrong with the line.
        reason: String,
    },

    /// A certificate referenced by a record could not be loaded.
    #[error("{}:{line}: {source}", path.display())]
    Certificate {
        /// The file holding the record.
        path: PathBuf,
        /// 1-based line number of the certificate path.
        line: usize,
        /// The underlying error.
        #[source]
        source: CredentialError,
    },
}

impl ConfigError {
    fn invalid(path: &Path, line: usize, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            path: path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }
}

/// Token issuer configuration for one consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    /// The consumer identity.
    pub consumer: Name,
    /// Attributes assigned to the consumer.
    pub attributes: AttributeSet,
    /// Where the consumer's certificate is stored.
    pub certificate: PathBuf,
    /// Line of the certificate path, for error reporting.
    pub line: usize,
}

/// One set-policy command for the data owner to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRecord {
    /// The producer that holds the data.
    pub producer: Name,
    /// The data name, relative to the producer.
    pub data_name: Name,
    /// Policy text, left for the producer to parse.
    pub policy: String,
}

/// Content a producer publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    /// The data name, relative to the producer.
    pub data_name: Name,
    /// File holding the plaintext.
    pub path: PathBuf,
}

/// Token issuer tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuerSettings {
    /// Length of the validity window written into each token.
    pub token_validity: Duration,
}

impl Default for IssuerSettings {
    fn default() -> Self {
        Self {
            token_validity: Duration::from_secs(60 * 60),
        }
    }
}

/// Consumer tunables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerSettings {
    /// Refuse tokens outside their validity window. Off by default, so an
    /// old token is still accepted.
    pub enforce_token_window: bool,
}

/// Meaningful lines of `text` with their 1-based numbers.
fn records(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_name(path: &Path, line: usize, text: &str) -> Result<Name, ConfigError> {
    let name = Name::parse(text).map_err(|error| ConfigError::invalid(path, line, error.to_string()))?;
    if name.is_root() {
        return Err(ConfigError::invalid(path, line, "name must not be empty"));
    }
    Ok(name)
}

fn parse_attribute(path: &Path, line: usize, text: &str) -> Result<Attribute, ConfigError> {
    Attribute::new(text.trim()).map_err(|error| ConfigError::invalid(path, line, error.to_string()))
}

/// Parses an attribute authority vocabulary.
///
/// # Errors
///
/// Fails on an invalid attribute label.
pub fn parse_vocabulary(path: &Path, text: &str) -> Result<AttributeSet, ConfigError> {
    records(text)
        .map(|(line, record)| parse_attribute(path, line, record))
        .collect()
}

/// Reads and parses a vocabulary file.
///
/// # Errors
///
/// See [`parse_vocabulary`].
pub fn load_vocabulary(path: &Path) -> Result<AttributeSet, ConfigError> {
    parse_vocabulary(path, &read(path)?)
}

/// Parses a token issuer attribute batch.
///
/// # Errors
///
/// Fails on an invalid name or attribute, or a record missing its
/// certificate line.
pub fn parse_attribute_batch(path: &Path, text: &str) -> Result<Vec<AttributeRecord>, ConfigError> {
    let mut batch = Vec::new();
    let mut lines = records(text);
    while let Some((line, record)) = lines.next() {
        let mut fields = record.split(',');
        let consumer = parse_name(path, line, fields.next().unwrap_or_default().trim())?;
        let attributes = fields
            .map(|field| parse_attribute(path, line, field))
            .collect::<Result<AttributeSet, _>>()?;

        let Some((cert_line, certificate)) = lines.next() else {
            return Err(ConfigError::invalid(
                path,
                line,
                format!("no certificate path for {consumer}"),
            ));
        };
        batch.push(AttributeRecord {
            consumer,
            attributes,
            certificate: PathBuf::from(certificate),
            line: cert_line,
        });
    }
    Ok(batch)
}

/// Reads and parses an attribute batch file.
///
/// # Errors
///
/// See [`parse_attribute_batch`].
pub fn load_attribute_batch(path: &Path) -> Result<Vec<AttributeRecord>, ConfigError> {
    parse_attribute_batch(path, &read(path)?)
}

/// Parses a data owner policy batch.
///
/// The policy text is kept verbatim; rejecting a bad policy is the
/// producer's decision.
///
/// # Errors
///
/// Fails on a missing or invalid `producer:` line or a data line without a
/// policy.
pub fn parse_policy_batch(path: &Path, text: &str) -> Result<Vec<PolicyRecord>, ConfigError> {
    let mut batch = Vec::new();
    let mut lines = records(text);
    while let Some((line, record)) = lines.next() {
        let Some(producer) = record.strip_prefix("producer:") else {
            return Err(ConfigError::invalid(
                path,
                line,
                "expected 'producer:/producerName'",
            ));
        };
        let producer = parse_name(path, line, producer.trim())?;

        let Some((data_line, data)) = lines.next() else {
            return Err(ConfigError::invalid(path, line, format!("no data line for {producer}")));
        };
        let Some((data_name, policy)) = data.split_once(',') else {
            return Err(ConfigError::invalid(path, data_line, "expected 'dataName,policy'"));
        };
        batch.push(PolicyRecord {
            producer,
            data_name: parse_name(path, data_line, data_name.trim())?,
            policy: policy.trim().to_owned(),
        });
    }
    Ok(batch)
}

/// Reads and parses a policy batch file.
///
/// # Errors
///
/// See [`parse_policy_batch`].
pub fn load_policy_batch(path: &Path) -> Result<Vec<PolicyRecord>, ConfigError> {
    parse_policy_batch(path, &read(path)?)
}

/// Parses a producer content batch.
///
/// # Errors
///
/// Fails on a line without a path or with an invalid data name.
pub fn parse_content_batch(path: &Path, text: &str) -> Result<Vec<ContentRecord>, ConfigError> {
    records(text)
        .map(|(line, record)| {
            let Some((data_name, file)) = record.split_once(',') else {
                return Err(ConfigError::invalid(path, line, "expected 'dataName,path'"));
            };
            let file = file.trim();
            if file.is_empty() {
                return Err(ConfigError::invalid(path, line, "empty content path"));
            }
            Ok(ContentRecord {
                data_name: parse_name(path, line, data_name.trim())?,
                path: PathBuf::from(file),
            })
        })
        .collect()
}

/// Reads and parses a content batch file.
///
/// # Errors
///
/// See [`parse_content_batch`].
pub fn load_content_batch(path: &Path) -> Result<Vec<ContentRecord>, ConfigError> {
    parse_content_batch(path, &read(path)?)
}

/// Reads the plaintext named by `record`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read.
pub fn load_content(record: &ContentRecord) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(&record.path).map_err(|source| ConfigError::Io {
        path: record.path.clone(),
        source,
    })
}

/// Loads the certificate named by an attribute record.
///
/// # Errors
///
/// Returns [`ConfigError::Certificate`] pointing at the record's line.
pub fn load_record_certificate(
    batch: &Path,
    record: &AttributeRecord,
) -> Result<abac_credentials::Certificate, ConfigError> {
    abac_credentials::certificate::load(&record.certificate).map_err(|source| {
        ConfigError::Certificate {
            path: batch.to_path_buf(),
            line: record.line,
            source,
        }
    })
}

/// Where a role stores its certificate by default: `./<name>/cert`.
pub fn default_certificate_path(name: &Name) -> PathBuf {
    let mut path = PathBuf::from(".");
    for component in name.components() {
        path.push(component);
    }
    path.push("cert");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn path() -> &'static Path {
        Path::new("test.conf")
    }

    fn attributes(labels: &[&str]) -> AttributeSet {
        labels
            .iter()
            .map(|label| Attribute::new(*label).unwrap())
            .collect()
    }

    #[test]
    fn it_parses_a_vocabulary_with_comments() {
        let text = "# hospital roles\nrole:doctor\n\n  role:nurse  \n";
        assert_eq!(
            parse_vocabulary(path(), text).unwrap(),
            attributes(&["role:doctor", "role:nurse"])
        );
    }

    #[test]
    fn it_parses_an_attribute_batch() {
        let text = "/bob,role:doctor,ward:icu\n./bob/cert\n\n# nurse\n/alice,role:nurse\n/tmp/alice.cert\n";
        let batch = parse_attribute_batch(path(), text).unwrap();

        assert_eq!(
            batch,
            vec![
                AttributeRecord {
                    consumer: Name::parse("/bob").unwrap(),
                    attributes: attributes(&["role:doctor", "ward:icu"]),
                    certificate: PathBuf::from("./bob/cert"),
                    line: 2,
                },
                AttributeRecord {
                    consumer: Name::parse("/alice").unwrap(),
                    attributes: attributes(&["role:nurse"]),
                    certificate: PathBuf::from("/tmp/alice.cert"),
                    line: 6,
                },
            ]
        );
    }

    #[test]
    fn it_rejects_an_attribute_record_without_a_certificate() {
        let error = parse_attribute_batch(path(), "/bob,role:doctor\n").unwrap_err();
        assert!(matches!(error, ConfigError::Invalid { line: 1, .. }));
        assert!(error.to_string().starts_with("test.conf:1:"));
    }

    #[test]
    fn it_rejects_an_invalid_attribute_with_its_line() {
        let text = "/bob,role:doctor\n./bob/cert\n/eve,has space\n./eve/cert\n";
        assert!(matches!(
            parse_attribute_batch(path(), text),
            Err(ConfigError::Invalid { line: 3, .. })
        ));
    }

    #[test]
    fn it_parses_a_policy_batch_keeping_the_policy_text() {
        let text = "producer:/hospital\n/records/alice,role:doctor, ward:icu\nproducer:/lab\n/results,not a policy\n";
        let batch = parse_policy_batch(path(), text).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].producer, Name::parse("/hospital").unwrap());
        assert_eq!(batch[0].data_name, Name::parse("/records/alice").unwrap());
        assert_eq!(batch[0].policy, "role:doctor, ward:icu");
        assert_eq!(batch[1].policy, "not a policy");
    }

    #[test]
    fn it_rejects_a_policy_batch_without_a_producer_line() {
        assert!(matches!(
            parse_policy_batch(path(), "/records/alice,role:doctor\n"),
            Err(ConfigError::Invalid { line: 1, .. })
        ));
        assert!(matches!(
            parse_policy_batch(path(), "producer:/hospital\n/records/alice\n"),
            Err(ConfigError::Invalid { line: 2, .. })
        ));
    }

    #[test]
    fn it_parses_a_content_batch() {
        let batch = parse_content_batch(path(), "/records/alice, data/alice.txt\n").unwrap();
        assert_eq!(
            batch,
            vec![ContentRecord {
                data_name: Name::parse("/records/alice").unwrap(),
                path: PathBuf::from("data/alice.txt"),
            }]
        );
        assert!(parse_content_batch(path(), "/records/alice\n").is_err());
    }

    #[test]
    fn it_derives_the_default_certificate_path() {
        assert_eq!(
            default_certificate_path(&Name::parse("/consumerPrefix").unwrap()),
            PathBuf::from("./consumerPrefix/cert")
        );
    }

    #[test]
    fn it_defaults_to_an_hour_long_lenient_token() {
        assert_eq!(IssuerSettings::default().token_validity, Duration::from_secs(3600));
        assert!(!ConsumerSettings::default().enforce_token_window);
    }
}
