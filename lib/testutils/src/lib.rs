use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// An RSA private key used to sign test JWT assertions. Never used against a real endpoint.
pub const TEST_PRIVATE_KEY: &str = include_str!("../data/test_key.pem");

pub fn service_account_json(token_uri: &str) -> String {
    serde_json::json!({
        "type": "service_account",
        "project_id": "test-project",
        "private_key_id": "0123456789abcdef",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": "reader@test-project.iam.gserviceaccount.com",
        "client_id": "1234567890",
        "token_uri": token_uri,
    })
    .to_string()
}

pub fn authorized_user_json() -> String {
    serde_json::json!({
        "type": "authorized_user",
        "client_id": "test-client.apps.googleusercontent.com",
        "client_secret": "test-secret",
        "refresh_token": "1//test-refresh-token",
    })
    .to_string()
}

/// A scratch directory holding credential files for a single test.
///
/// Paths returned by `path` are inside the directory whether or not the file was written, which
/// lets tests point the resolver at files that do not exist.
pub struct CredentialDir {
    dir: TempDir,
}

impl CredentialDir {
    pub fn new() -> CredentialDir {
        CredentialDir {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn mkdir(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        fs::create_dir(&path).unwrap();
        path
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for CredentialDir {
    fn default() -> Self {
        CredentialDir::new()
    }
}
