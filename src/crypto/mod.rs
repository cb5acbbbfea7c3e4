mod vault;

pub use vault::{Credential, CredentialVault};
