//! Autogenerated domain names
//!
//! Turns a router pattern such as `${service}-${project}-${environment}.example.com`
//! into the full domain for a service and a short form where the project and
//! environment are replaced by hashes.

use sha2::{Digest, Sha256};

pub const SERVICE_TOKEN: &str = "${service}";
pub const PROJECT_TOKEN: &str = "${project}";
pub const ENVIRONMENT_TOKEN: &str = "${environment}";

/// DNS limit for a single label
pub const MAX_LABEL_LEN: usize = 63;
/// Characters kept from an oversized label before the hash suffix
const TRUNCATED_LABEL_LEN: usize = 54;
/// Hash characters used in short domains and truncated labels
const HASH_LEN: usize = 8;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Full and short form of one autogenerated domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDomain {
    pub domain: String,
    pub short_domain: String,
}

/// Lowercase hex SHA-256 of `input`
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lowercase RFC 4648 base32 with padding
pub fn base32_lower(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    for chunk in data.chunks(5) {
        let mut buf = [0u8; 5];
        buf[..chunk.len()].copy_from_slice(chunk);
        let bits = buf.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        let emitted = (chunk.len() * 8).div_ceil(5);
        for i in 0..8 {
            if i < emitted {
                let idx = ((bits >> (35 - i * 5)) & 0x1f) as usize;
                out.push(BASE32_ALPHABET[idx].to_ascii_lowercase() as char);
            } else {
                out.push('=');
            }
        }
    }
    out
}

/// Eight character hash used in place of a project or environment name
pub fn short_hash(name: &str) -> String {
    base32_lower(sha256_hex(name).as_bytes())[..HASH_LEN].to_string()
}

/// Generate the domain and short domain for `service` from `pattern`.
///
/// Only the first occurrence of each token is replaced. Patterns without a
/// `${service}` token get `service.` prepended. Labels of the full domain
/// longer than 63 characters are cut to 54 characters plus `-` and the first
/// 8 hex characters of the SHA-256 of the whole domain.
pub fn generate(pattern: &str, service: &str, project: &str, environment: &str) -> GeneratedDomain {
    let has_service_token = pattern.contains(SERVICE_TOKEN);

    let mut domain = pattern
        .replacen(SERVICE_TOKEN, service, 1)
        .replacen(PROJECT_TOKEN, project, 1)
        .replacen(ENVIRONMENT_TOKEN, environment, 1);
    let mut short_domain = pattern
        .replacen(SERVICE_TOKEN, service, 1)
        .replacen(PROJECT_TOKEN, &short_hash(project), 1)
        .replacen(ENVIRONMENT_TOKEN, &short_hash(environment), 1);

    if !has_service_token {
        domain = format!("{}.{}", service, domain);
        short_domain = format!("{}.{}", service, short_domain);
    }

    GeneratedDomain {
        domain: truncate_labels(&domain),
        short_domain,
    }
}

/// Enforce the DNS label length on every label of `domain`.
pub fn truncate_labels(domain: &str) -> String {
    let domain_hash = sha256_hex(domain);
    domain
        .split('.')
        .map(|label| {
            if label.len() > MAX_LABEL_LEN {
                format!(
                    "{}-{}",
                    truncate_at_char_boundary(label, TRUNCATED_LABEL_LEN),
                    &domain_hash[..HASH_LEN]
                )
            } else {
                label.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATTERN: &str = "${service}-${project}-${environment}.example.com";

    #[test]
    fn test_base32_known_vectors() {
        assert_eq!(base32_lower(b""), "");
        assert_eq!(base32_lower(b"f"), "my======");
        assert_eq!(base32_lower(b"fo"), "mzxq====");
        assert_eq!(base32_lower(b"foo"), "mzxw6===");
        assert_eq!(base32_lower(b"foob"), "mzxw6yq=");
        assert_eq!(base32_lower(b"fooba"), "mzxw6ytb");
        assert_eq!(base32_lower(b"foobar"), "mzxw6ytboi======");
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_generate_basic_pattern() {
        let generated = generate(PATTERN, "node", "example-project", "main");
        assert_eq!(generated.domain, "node-example-project-main.example.com");

        let expected_short = format!(
            "node-{}-{}.example.com",
            short_hash("example-project"),
            short_hash("main")
        );
        assert_eq!(generated.short_domain, expected_short);
    }

    #[test]
    fn test_short_hash_shape() {
        let hash = short_hash("example-project");
        assert_eq!(hash.len(), 8);
        assert!(hash
            .chars()
            .all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c)));
    }

    #[test]
    fn test_pattern_without_service_token() {
        let generated = generate("${environment}.${project}.example.com", "nginx", "proj", "dev");
        assert_eq!(generated.domain, "nginx.dev.proj.example.com");
        assert!(generated.short_domain.starts_with("nginx."));
    }

    #[test]
    fn test_only_first_token_is_replaced() {
        let generated = generate("${service}.${project}.${project}.example.com", "web", "p", "e");
        assert_eq!(generated.domain, "web.p.${project}.example.com");
    }

    #[test]
    fn test_long_label_is_truncated() {
        let environment = "a-really-long-environment-name-that-keeps-going-and-going-forever";
        let generated = generate(PATTERN, "nginx", "example-project", environment);

        let untruncated = format!("nginx-example-project-{}.example.com", environment);
        let first_label = generated.domain.split('.').next().unwrap();
        assert_eq!(first_label.len(), MAX_LABEL_LEN);
        assert!(first_label.starts_with(&untruncated[..54]));
        assert!(first_label.ends_with(&sha256_hex(&untruncated)[..8]));
        assert!(generated.domain.ends_with(".example.com"));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let environment = "x".repeat(80);
        let first = generate(PATTERN, "nginx", "project", &environment);
        let second = generate(PATTERN, "nginx", "project", &environment);
        assert_eq!(first, second);
        assert!(first.domain.split('.').all(|l| l.len() <= MAX_LABEL_LEN));
    }

    #[test]
    fn test_short_domain_is_not_truncated() {
        let service = "s".repeat(70);
        let generated = generate(PATTERN, &service, "p", "e");
        assert!(generated.short_domain.split('.').next().unwrap().len() > MAX_LABEL_LEN);
    }
}
