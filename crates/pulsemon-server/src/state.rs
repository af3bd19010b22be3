use ipnet::IpNet;
use pulsemon_storage::Storage;
use rsa::RsaPrivateKey;
use std::sync::Arc;

/// Request-protection settings, read-only after startup. Every field is
/// optional; an unset field disables the corresponding middleware.
pub struct Security {
    pub hash_key: Option<String>,
    pub private_key: Option<RsaPrivateKey>,
    pub trusted_subnet: Option<IpNet>,
}

impl Security {
    pub fn disabled() -> Self {
        Self {
            hash_key: None,
            private_key: None,
            trusted_subnet: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub security: Arc<Security>,
}
