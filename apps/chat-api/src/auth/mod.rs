pub mod gate;
pub mod middleware;

pub use gate::{CredentialVerifier, IdentityGate, JwtVerifier};
