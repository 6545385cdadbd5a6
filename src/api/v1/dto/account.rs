use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.new_password.is_empty() {
            return Err("new_password is required");
        }
        if self.new_password.len() > 128 {
            return Err("new_password must be <= 128 chars");
        }
        Ok(())
    }
}
