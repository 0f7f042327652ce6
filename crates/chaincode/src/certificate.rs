//! Certificate registry and authorization gate.
//!
//! Enrolled device certificates are stored as [`Certificate`] records. A
//! caller is authorized when its certificate text exactly matches a stored
//! one; every sensor reading records the outcome of that check as its
//! `valid` flag at ingestion time.
//!
//! Certificates reach the chaincode wrapped in noise (the creator identity is
//! a serialized structure around the PEM text), so every helper first
//! re-extracts the span from the first to the last `-----` delimiter.
//!
//! The registry check is a linear scan over every stored certificate. The
//! registry is expected to stay small; a secondary index keyed by
//! certificate text would remove the scan without changing the contract.

use iot_ledger_storage::{EntityStore, Record, RecordValue, RoleType, accept_all};
use serde::{Deserialize, Serialize};
use x509_parser::{
    certificate::X509Certificate, extensions::GeneralName, pem::parse_x509_pem,
};

use crate::{
    error::{ChaincodeError, ChaincodeResult},
    sensors::parse_timestamp,
};

/// Namespace of certificate records.
pub const CERTIFICATE_NAMESPACE: &str = "IotCertificate";

const PEM_DELIMITER: &[u8] = b"-----";

/// Stored value of a [`Certificate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateValue {
    /// PEM text, delimiters included.
    pub certificate: String,
    /// Caller-supplied Unix timestamp, `0` when not given.
    #[serde(default)]
    pub timestamp: i64,
}

impl RecordValue for CertificateValue {
    const NAMESPACE: &'static str = CERTIFICATE_NAMESPACE;
}

/// An enrolled certificate.
pub type Certificate = Record<CertificateValue>;

/// Builds a certificate record from `[certificate, timestamp?]`.
///
/// # Errors
///
/// - [`ChaincodeError::InvalidArgument`] if the certificate argument is
///   missing or empty, or the optional timestamp is invalid.
/// - [`ChaincodeError::Unparseable`] if no PEM block can be located.
pub fn certificate_from_arguments(args: &[String]) -> ChaincodeResult<Certificate> {
    let Some(text) = args.first() else {
        return Err(ChaincodeError::invalid_argument(
            "arguments array must contain at least 1 items",
        ));
    };
    if text.is_empty() {
        return Err(ChaincodeError::invalid_argument("certificate must be not empty"));
    }

    let timestamp = match args.get(1) {
        Some(raw) => parse_timestamp(raw)?,
        None => 0,
    };

    let certificate = extract_pem_block(text.as_bytes())?.to_owned();
    Ok(Certificate::with_random_id(CertificateValue { certificate, timestamp }))
}

/// Returns the text from the first to the last PEM delimiter in `raw`.
///
/// # Errors
///
/// Returns [`ChaincodeError::Unparseable`] if `raw` holds fewer than two
/// delimiters or the span is not UTF-8.
pub fn extract_pem_block(raw: &[u8]) -> ChaincodeResult<&str> {
    let first = raw.windows(PEM_DELIMITER.len()).position(|w| w == PEM_DELIMITER);
    let last = raw.windows(PEM_DELIMITER.len()).rposition(|w| w == PEM_DELIMITER);
    let (Some(first), Some(last)) = (first, last) else {
        return Err(ChaincodeError::unparseable("no PEM delimiters found"));
    };
    if last < first + PEM_DELIMITER.len() {
        return Err(ChaincodeError::unparseable("PEM block is not terminated"));
    }

    std::str::from_utf8(&raw[first..last + PEM_DELIMITER.len()])
        .map_err(|e| ChaincodeError::unparseable(format!("PEM block is not UTF-8: {e}")))
}

fn with_certificate<T>(
    raw: &[u8],
    f: impl FnOnce(&X509Certificate<'_>) -> ChaincodeResult<T>,
) -> ChaincodeResult<T> {
    let block = extract_pem_block(raw)?;
    let (_, pem) = parse_x509_pem(block.as_bytes())
        .map_err(|e| ChaincodeError::unparseable(format!("cannot decode PEM: {e}")))?;
    let certificate = pem
        .parse_x509()
        .map_err(|e| ChaincodeError::unparseable(format!("cannot parse X.509 certificate: {e}")))?;
    f(&certificate)
}

fn first_label(value: &str) -> String {
    value.split('.').next().unwrap_or_default().to_owned()
}

/// Returns the certificate's email addresses joined by `", "`.
///
/// Addresses come from the subject alternative name extension; a
/// certificate without one yields an empty string.
///
/// # Errors
///
/// Returns [`ChaincodeError::Unparseable`] on malformed PEM or X.509 input.
pub fn extract_custom_field(raw: &[u8]) -> ChaincodeResult<String> {
    with_certificate(raw, |certificate| {
        let san = certificate.subject_alternative_name().map_err(|e| {
            ChaincodeError::unparseable(format!("cannot read subject alternative name: {e}"))
        })?;
        let emails: Vec<&str> = san
            .map(|ext| {
                ext.value
                    .general_names
                    .iter()
                    .filter_map(|name| match name {
                        GeneralName::RFC822Name(email) => Some(*email),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(emails.join(", "))
    })
}

/// Returns the first dot-separated label of the issuer's organization,
/// e.g. `org1` for `org1.example.com`.
///
/// # Errors
///
/// Returns [`ChaincodeError::Unparseable`] on malformed input or when the
/// issuer has no organization.
pub fn extract_organization(raw: &[u8]) -> ChaincodeResult<String> {
    with_certificate(raw, |certificate| {
        let organization = certificate
            .issuer()
            .iter_organization()
            .next()
            .ok_or_else(|| ChaincodeError::unparseable("issuer has no organization"))?
            .as_str()
            .map_err(|e| ChaincodeError::unparseable(format!("cannot read organization: {e}")))?;
        Ok(first_label(organization))
    })
}

/// Returns the first dot-separated label of the issuer's organizational
/// unit, e.g. `client` for `client.department1`.
///
/// # Errors
///
/// Returns [`ChaincodeError::Unparseable`] on malformed input or when the
/// issuer has no organizational unit.
pub fn extract_organizational_unit(raw: &[u8]) -> ChaincodeResult<String> {
    with_certificate(raw, |certificate| {
        let unit = certificate
            .issuer()
            .iter_organizational_unit()
            .next()
            .ok_or_else(|| ChaincodeError::unparseable("issuer has no organizational unit"))?
            .as_str()
            .map_err(|e| {
                ChaincodeError::unparseable(format!("cannot read organizational unit: {e}"))
            })?;
        Ok(first_label(unit))
    })
}

/// Registry of enrolled certificates for one transaction.
#[derive(Debug, Clone, Copy)]
pub struct CertificateRegistry<'a> {
    store: EntityStore<'a>,
}

impl<'a> CertificateRegistry<'a> {
    /// Creates a registry over `store`.
    #[must_use]
    pub fn new(store: EntityStore<'a>) -> Self {
        Self { store }
    }

    /// Stores a certificate record.
    ///
    /// # Errors
    ///
    /// Returns any storage error from the write.
    #[tracing::instrument(skip_all, fields(id = certificate.id()))]
    pub fn register(&self, certificate: &Certificate) -> ChaincodeResult<()> {
        self.store.upsert(certificate, &[], RoleType::default())?;
        Ok(())
    }

    /// Returns `1` if `candidate` exactly matches a stored certificate and
    /// `0` otherwise.
    ///
    /// An empty candidate is replaced by the caller's own certificate,
    /// re-extracted from the creator identity.
    ///
    /// # Errors
    ///
    /// - [`ChaincodeError::Unparseable`] if the creator identity holds no PEM block.
    /// - Any storage error from reading the creator or scanning the registry.
    #[tracing::instrument(skip_all, fields(from_creator = candidate.is_empty()))]
    pub fn is_registered(&self, candidate: &str) -> ChaincodeResult<u8> {
        let creator;
        let candidate = if candidate.is_empty() {
            creator = self.store.stub().creator()?;
            extract_pem_block(&creator)?
        } else {
            candidate
        };

        let certificates =
            self.store.query(CERTIFICATE_NAMESPACE, &[], Certificate::blank, accept_all)?;
        let registered = certificates.iter().any(|c| c.value.certificate == candidate);
        tracing::debug!(scanned = certificates.len(), registered, "certificate check");
        Ok(u8::from(registered))
    }

    /// Returns the custom field of the caller's certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the creator is unavailable or unparseable.
    pub fn creator_custom_field(&self) -> ChaincodeResult<String> {
        extract_custom_field(&self.store.stub().creator()?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DEVICE01: &str = include_str!("../tests/fixtures/device01.pem");

    #[test]
    fn test_extract_pem_block_strips_noise() {
        let noisy = format!("\n\u{7}Org1MSP\u{12}\u{ab}{DEVICE01}\u{0}\u{1}trailer");
        assert_eq!(extract_pem_block(noisy.as_bytes()).unwrap(), DEVICE01.trim_end());
    }

    #[test]
    fn test_extract_pem_block_requires_two_delimiters() {
        assert!(matches!(
            extract_pem_block(b"no pem here"),
            Err(ChaincodeError::Unparseable { .. })
        ));
        assert!(matches!(extract_pem_block(b"-----"), Err(ChaincodeError::Unparseable { .. })));
    }

    #[test]
    fn test_extract_fields() {
        assert_eq!(
            extract_custom_field(DEVICE01.as_bytes()).unwrap(),
            "device01@org1.example.com, ops@org1.example.com"
        );
        assert_eq!(extract_organization(DEVICE01.as_bytes()).unwrap(), "org1");
        assert_eq!(extract_organizational_unit(DEVICE01.as_bytes()).unwrap(), "client");
    }

    #[test]
    fn test_garbage_between_delimiters_is_unparseable() {
        let bogus = b"-----BEGIN CERTIFICATE-----\nbm90IGEgY2VydA==\n-----END CERTIFICATE-----";
        assert!(matches!(extract_custom_field(bogus), Err(ChaincodeError::Unparseable { .. })));
        assert!(matches!(extract_organization(b"plain"), Err(ChaincodeError::Unparseable { .. })));
    }

    #[test]
    fn test_certificate_from_arguments() {
        let record = certificate_from_arguments(&[format!("noise{DEVICE01}")]).unwrap();
        assert_eq!(record.value.certificate, DEVICE01.trim_end());
        assert_eq!(record.value.timestamp, 0);

        let stamped =
            certificate_from_arguments(&[DEVICE01.to_owned(), "1700000000".to_owned()]).unwrap();
        assert_eq!(stamped.value.timestamp, 1_700_000_000);

        assert!(matches!(
            certificate_from_arguments(&[String::new()]),
            Err(ChaincodeError::InvalidArgument { .. })
        ));
        assert!(matches!(
            certificate_from_arguments(&[]),
            Err(ChaincodeError::InvalidArgument { .. })
        ));
    }
}
