use anyhow::anyhow;
use chrono::{DateTime, TimeZone, Utc};
use ring::{
    rand::SystemRandom,
    signature::{
        EcdsaKeyPair, Ed25519KeyPair, KeyPair, RsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING,
        ECDSA_P384_SHA384_ASN1_SIGNING,
    },
};
use rustls::pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};
use simple_asn1::{ASN1Block, ASN1Class, BigInt, OID};
use zeroize::Zeroizing;

use crate::errors::TlsError;

/// Metadata extracted from the leaf client certificate for logging.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertificateInfo {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.not_after <= now
    }
}

/// A client certificate chain whose leaf has been checked against the private key.
#[derive(Debug)]
pub struct ClientIdentity {
    pub chain: Vec<CertificateDer<'static>>,
    pub info: CertificateInfo,
    /// Certificate chain followed by the private key, as accepted by reqwest.
    pub combined_pem: Zeroizing<Vec<u8>>,
}

/// Parse PEM client certificate and key material into a matched identity.
///
/// The key must correspond to the public key of the first certificate in
/// `cert_pem`. SEC1 EC keys are accepted without the pairing check since ring
/// only loads PKCS#8 EC keys; the TLS stack still rejects a mismatched pair at
/// handshake time.
pub fn parse_client_identity(cert_pem: &str, key_pem: &str) -> Result<ClientIdentity, TlsError> {
    let chain: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(cert_pem.as_bytes())
        .map(|result| result.map_err(|err| TlsError::InvalidCertificatePem { source: anyhow!(err) }))
        .collect::<Result<_, _>>()?;

    let leaf = chain.first().ok_or(TlsError::EmptyCertificateChain)?;

    let private_key = PrivateKeyDer::from_pem_slice(key_pem.as_bytes())
        .map_err(|err| TlsError::InvalidPrivateKey { source: Some(anyhow!(err)) })?;

    let parsed = parse_certificate_metadata(leaf)?;
    enforce_public_key_match(&parsed.algorithm_oid, &parsed.public_key, &private_key)?;

    let mut combined_pem = Zeroizing::new(Vec::with_capacity(cert_pem.len() + key_pem.len() + 1));
    combined_pem.extend_from_slice(cert_pem.trim_end().as_bytes());
    combined_pem.push(b'\n');
    combined_pem.extend_from_slice(key_pem.as_bytes());

    Ok(ClientIdentity { chain, info: parsed.info, combined_pem })
}

/// Decode every certificate in a PEM bundle.
///
/// Decoding stops at the first malformed block; the bundle is rejected only
/// when no certificate precedes it.
pub fn parse_root_bundle(pem: &str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut roots = Vec::new();
    for result in CertificateDer::pem_slice_iter(pem.as_bytes()) {
        match result {
            Ok(cert) => roots.push(cert),
            Err(_) => break,
        }
    }

    if roots.is_empty() {
        return Err(TlsError::UnparsableRootBundle);
    }
    Ok(roots)
}

struct ParsedCertificate {
    info: CertificateInfo,
    algorithm_oid: String,
    public_key: Vec<u8>,
}

fn metadata_error(message: &'static str) -> TlsError {
    TlsError::CertificateMetadata { source: anyhow!(message) }
}

fn parse_certificate_metadata(cert: &CertificateDer<'_>) -> Result<ParsedCertificate, TlsError> {
    let blocks = simple_asn1::from_der(cert.as_ref())
        .map_err(|err| TlsError::CertificateMetadata { source: anyhow!(err) })?;

    let cert_seq = match blocks.first() {
        Some(ASN1Block::Sequence(_, items)) => items,
        _ => return Err(metadata_error("certificate missing outer sequence")),
    };

    let tbs_seq = match cert_seq.first() {
        Some(ASN1Block::Sequence(_, items)) => items,
        _ => return Err(metadata_error("certificate missing tbsCertificate")),
    };

    let mut fields = tbs_seq.iter().peekable();

    // [0] EXPLICIT Version is optional for v1 certificates
    if let Some(ASN1Block::Explicit(ASN1Class::ContextSpecific, _, tag, _)) = fields.peek() {
        if tag != &0u8.into() {
            return Err(metadata_error("unexpected context-specific field before serial number"));
        }
        fields.next();
    }

    // serial number, signature algorithm
    fields.next();
    fields.next();

    let issuer_block = fields.next().ok_or_else(|| metadata_error("certificate missing issuer"))?;
    let validity_block =
        fields.next().ok_or_else(|| metadata_error("certificate missing validity"))?;
    let subject_block = fields.next().ok_or_else(|| metadata_error("certificate missing subject"))?;
    let spki_block =
        fields.next().ok_or_else(|| metadata_error("certificate missing subjectPublicKeyInfo"))?;

    let issuer = parse_name(issuer_block)?;
    let subject = parse_name(subject_block)?;
    let (not_before, not_after) = parse_validity(validity_block)?;
    let (algorithm_oid, public_key) = parse_public_key_info(spki_block)?;

    Ok(ParsedCertificate {
        info: CertificateInfo { subject, issuer, not_before, not_after },
        algorithm_oid,
        public_key,
    })
}

fn parse_public_key_info(block: &ASN1Block) -> Result<(String, Vec<u8>), TlsError> {
    let items = match block {
        ASN1Block::Sequence(_, items) if items.len() >= 2 => items,
        _ => return Err(metadata_error("subjectPublicKeyInfo is malformed")),
    };

    let algorithm_oid = match &items[0] {
        ASN1Block::Sequence(_, seq) => match seq.first() {
            Some(ASN1Block::ObjectIdentifier(_, oid)) => oid_to_string(oid),
            _ => return Err(metadata_error("algorithm identifier missing OID")),
        },
        _ => return Err(metadata_error("algorithm identifier missing")),
    };

    match &items[1] {
        ASN1Block::BitString(_, nbits, bytes) if bytes.len() * 8 == *nbits => {
            Ok((algorithm_oid, bytes.clone()))
        }
        ASN1Block::BitString(..) => Err(metadata_error("subject public key contains unused bits")),
        _ => Err(metadata_error("subject public key is not a bit string")),
    }
}

fn parse_name(block: &ASN1Block) -> Result<String, TlsError> {
    let rdns = match block {
        ASN1Block::Sequence(_, items) => items,
        _ => return Err(metadata_error("name is not a sequence")),
    };

    let components = rdns
        .iter()
        .filter_map(|rdn| match rdn {
            ASN1Block::Set(_, items) => Some(items),
            _ => None,
        })
        .flatten()
        .filter_map(|attr| match attr {
            ASN1Block::Sequence(_, attr_items) if attr_items.len() >= 2 => {
                match (&attr_items[0], extract_string_value(&attr_items[1])) {
                    (ASN1Block::ObjectIdentifier(_, oid), Some(value)) => {
                        Some(format!("{}={value}", short_attribute_name(&oid_to_string(oid))))
                    }
                    _ => None,
                }
            }
            _ => None,
        })
        .collect::<Vec<_>>();

    Ok(components.join(", "))
}

fn short_attribute_name(oid: &str) -> String {
    match oid {
        "2.5.4.3" => "CN",
        "2.5.4.6" => "C",
        "2.5.4.7" => "L",
        "2.5.4.8" => "ST",
        "2.5.4.10" => "O",
        "2.5.4.11" => "OU",
        other => other,
    }
    .to_string()
}

fn extract_string_value(block: &ASN1Block) -> Option<String> {
    match block {
        ASN1Block::UTF8String(_, value)
        | ASN1Block::PrintableString(_, value)
        | ASN1Block::IA5String(_, value)
        | ASN1Block::TeletexString(_, value)
        | ASN1Block::UniversalString(_, value)
        | ASN1Block::BMPString(_, value) => Some(value.clone()),
        _ => None,
    }
}

fn parse_validity(block: &ASN1Block) -> Result<(DateTime<Utc>, DateTime<Utc>), TlsError> {
    match block {
        ASN1Block::Sequence(_, entries) if entries.len() >= 2 => {
            Ok((time_block_to_chrono(&entries[0])?, time_block_to_chrono(&entries[1])?))
        }
        _ => Err(metadata_error("validity is malformed")),
    }
}

fn time_block_to_chrono(block: &ASN1Block) -> Result<DateTime<Utc>, TlsError> {
    let primitive = match block {
        ASN1Block::UTCTime(_, value) | ASN1Block::GeneralizedTime(_, value) => value,
        _ => return Err(metadata_error("time value not in expected format")),
    };

    let dt = primitive.assume_utc();
    Utc.timestamp_opt(dt.unix_timestamp(), dt.nanosecond())
        .single()
        .ok_or_else(|| metadata_error("failed to convert certificate time"))
}

fn enforce_public_key_match(
    algorithm_oid: &str,
    public_key: &[u8],
    private_key: &PrivateKeyDer<'_>,
) -> Result<(), TlsError> {
    let key_bytes = private_key.secret_der();

    match (algorithm_oid, private_key) {
        ("1.3.101.112", PrivateKeyDer::Pkcs8(_)) => {
            let key_pair = Ed25519KeyPair::from_pkcs8_maybe_unchecked(key_bytes)
                .map_err(|_| TlsError::CertificateKeyMismatch)?;
            compare_bytes(key_pair.public_key().as_ref(), public_key)
        }
        ("1.2.840.10045.2.1", PrivateKeyDer::Pkcs8(_)) => {
            let rng = SystemRandom::new();
            for algorithm in [&ECDSA_P256_SHA256_ASN1_SIGNING, &ECDSA_P384_SHA384_ASN1_SIGNING] {
                if let Ok(key_pair) = EcdsaKeyPair::from_pkcs8(algorithm, key_bytes, &rng) {
                    return compare_bytes(key_pair.public_key().as_ref(), public_key);
                }
            }
            Err(TlsError::CertificateKeyMismatch)
        }
        ("1.2.840.10045.2.1", PrivateKeyDer::Sec1(_)) => Ok(()),
        ("1.2.840.113549.1.1.1", PrivateKeyDer::Pkcs8(_) | PrivateKeyDer::Pkcs1(_)) => {
            let key_pair = match private_key {
                PrivateKeyDer::Pkcs1(_) => RsaKeyPair::from_der(key_bytes),
                _ => RsaKeyPair::from_pkcs8(key_bytes),
            }
            .map_err(|err| TlsError::InvalidPrivateKey { source: Some(anyhow!(err)) })?;
            compare_rsa_public_key(&key_pair, public_key)
                .map_err(|_| TlsError::CertificateKeyMismatch)
        }
        ("1.3.101.112" | "1.2.840.10045.2.1" | "1.2.840.113549.1.1.1", _) => {
            Err(TlsError::CertificateKeyMismatch)
        }
        _ => Ok(()),
    }
}

fn compare_bytes(expected: &[u8], actual: &[u8]) -> Result<(), TlsError> {
    if expected == actual {
        Ok(())
    } else {
        Err(TlsError::CertificateKeyMismatch)
    }
}

fn rsa_components(der: &[u8]) -> Result<(Vec<u8>, Vec<u8>), anyhow::Error> {
    let blocks = simple_asn1::from_der(der)?;
    match blocks.first() {
        Some(ASN1Block::Sequence(_, items)) => match (items.first(), items.get(1)) {
            (Some(ASN1Block::Integer(_, modulus)), Some(ASN1Block::Integer(_, exponent))) => {
                Ok((bigint_to_bytes(modulus), bigint_to_bytes(exponent)))
            }
            _ => Err(anyhow!("RSA public key missing modulus/exponent")),
        },
        _ => Err(anyhow!("RSA public key is not a sequence")),
    }
}

fn compare_rsa_public_key(key_pair: &RsaKeyPair, public_key: &[u8]) -> Result<(), anyhow::Error> {
    if rsa_components(public_key)? == rsa_components(key_pair.public().as_ref())? {
        Ok(())
    } else {
        Err(anyhow!("RSA key mismatch"))
    }
}

fn bigint_to_bytes(value: &BigInt) -> Vec<u8> {
    value.to_biguint().map_or_else(Vec::new, |v| v.to_bytes_be())
}

fn oid_to_string(oid: &OID) -> String {
    oid.as_vec::<u64>()
        .map(|components| {
            components.into_iter().map(|n| n.to_string()).collect::<Vec<_>>().join(".")
        })
        .unwrap_or_else(|_| "unknown".to_string())
}
