use crate::error::CredentialsError;
use crate::ports::{Credentials, CredentialsPort};

#[derive(Default)]
pub struct SimCredentials {
    pub creds: Credentials,
}

impl CredentialsPort for SimCredentials {
    fn load(&self) -> Result<Credentials, CredentialsError> { Ok(self.creds.clone()) }
}
