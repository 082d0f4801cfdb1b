//! Route paths.

pub const POST_AUTH_REGISTER: &str = "/auth/register";
pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const GET_AUTH_ME: &str = "/auth/me";
pub const GET_USER_ID: &str = "/user/{id}";
pub const RENTALS: &str = "/rentals";
pub const RENTALS_ID: &str = "/rentals/{id}";
pub const POST_MESSAGES: &str = "/messages";
