//! Field rules and owner fields of the request messages.

use portico_core::{FieldErrors, RequestMessage, Validator};

use crate::proto::{
    CountUsersRequest, DeleteUserRequest, GetUserRequest, ListUsersRequest, LoginRequest,
    PingRequest, SignupRequest, UpdateUserRequest, WhoamiRequest,
};

/// Largest page `ListUsers` returns.
pub const MAX_PAGE_SIZE: u64 = 100;

const MIN_PASSWORD: usize = 8;
const MAX_PASSWORD: usize = 72;
const MAX_DISPLAY_NAME: usize = 64;

impl RequestMessage for PingRequest {}

impl RequestMessage for WhoamiRequest {}

impl RequestMessage for CountUsersRequest {}

impl RequestMessage for SignupRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        Validator::new()
            .required("email", &self.email)
            .email("email", self.email.trim())
            .length("password", &self.password, MIN_PASSWORD, MAX_PASSWORD)
            .required("display_name", &self.display_name)
            .max_length("display_name", &self.display_name, MAX_DISPLAY_NAME)
            .finish()
    }
}

impl RequestMessage for LoginRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        Validator::new()
            .required("email", &self.email)
            .required("password", &self.password)
            .finish()
    }
}

impl RequestMessage for GetUserRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        Validator::new().positive("user_id", self.user_id).finish()
    }

    fn owner_id(&self) -> Option<String> {
        Some(self.user_id.to_string())
    }
}

impl RequestMessage for UpdateUserRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        Validator::new()
            .positive("user_id", self.user_id)
            .required("display_name", &self.display_name)
            .max_length("display_name", &self.display_name, MAX_DISPLAY_NAME)
            .finish()
    }

    fn owner_id(&self) -> Option<String> {
        Some(self.user_id.to_string())
    }
}

impl RequestMessage for DeleteUserRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        Validator::new().positive("user_id", self.user_id).finish()
    }

    fn owner_id(&self) -> Option<String> {
        Some(self.user_id.to_string())
    }
}

impl RequestMessage for ListUsersRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        Validator::new()
            .at_most("limit", u64::from(self.limit), MAX_PAGE_SIZE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_lists_every_violation() {
        let request = SignupRequest {
            email: "nope".to_string(),
            password: "short".to_string(),
            display_name: String::new(),
        };
        assert_eq!(
            request.validate().unwrap_err().to_string(),
            "email must be a valid email address, password must be between 8 and 72 characters, display_name is required"
        );
    }

    #[test]
    fn test_owner_fields() {
        assert_eq!(GetUserRequest { user_id: 7 }.owner_id().as_deref(), Some("7"));
        assert_eq!(DeleteUserRequest { user_id: 9 }.owner_id().as_deref(), Some("9"));
        assert!(LoginRequest::default().owner_id().is_none());
    }

    #[test]
    fn test_page_size_cap() {
        let request = ListUsersRequest {
            offset: 0,
            limit: 101,
        };
        assert_eq!(
            request.validate().unwrap_err().to_string(),
            "limit must be at most 100"
        );
    }
}
