//! Service account credentials.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use crate::discovery::DiscoveryError;

/// Read the bearer token, trimming surrounding whitespace.
pub fn read_token(path: &Path) -> Result<String, DiscoveryError> {
    let token = fs::read_to_string(path).map_err(|source| DiscoveryError::Credentials {
        path: path.display().to_string(),
        source,
    })?;
    Ok(token.trim().to_string())
}

/// Load every certificate in a PEM bundle as a trust root.
///
/// Fails if the file holds no certificates.
pub fn load_root_certificates(path: &Path) -> Result<Vec<reqwest::Certificate>, DiscoveryError> {
    let file = File::open(path).map_err(|source| DiscoveryError::Credentials {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let mut roots = Vec::new();
    for cert in rustls_pemfile::certs(&mut reader) {
        let cert = cert.map_err(|source| DiscoveryError::Credentials {
            path: path.display().to_string(),
            source,
        })?;
        let root = reqwest::Certificate::from_der(cert.as_ref())
            .map_err(|e| DiscoveryError::Tls(format!("invalid certificate in {:?}: {}", path, e)))?;
        roots.push(root);
    }

    if roots.is_empty() {
        return Err(DiscoveryError::Tls(format!("no certificates found in {:?}", path)));
    }
    Ok(roots)
}
