pub mod validator;

pub use validator::{CertificateWindow, TlsValidator, assess_validity};
