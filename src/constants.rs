pub mod directory {
    pub const DEFAULT_USER_ATTRIBUTE: &str = "sAMAccountName";

    pub const DEFAULT_PAGE_SIZE: i32 = 500;

    /// Enabled user and person objects, excluding computer accounts.
    /// Bit 2 of `userAccountControl` marks a disabled account.
    pub const DEFAULT_USERS_FILTER: &str = "(&(|(objectClass=user)(objectClass=person))(!(objectClass=computer))(!(userAccountControl:1.2.840.113556.1.4.803:=2)))";

    pub const DEFAULT_COMPUTERS_FILTER: &str =
        "(&(objectClass=computer)(!(userAccountControl:1.2.840.113556.1.4.803:=2)))";

    /// LDAP result code for a rejected simple bind.
    pub const INVALID_CREDENTIALS: u32 = 49;

    pub const SIZE_LIMIT_EXCEEDED: u32 = 4;
}

pub mod session {
    pub const COOKIE_NAME: &str = "cp_session";

    pub const DEFAULT_TTL_HOURS: u64 = 8;

    pub const INSECURE_DEFAULT_SECRET: &str = "dev-insecure-secret";
}

pub mod http {
    pub const WRITE_TOKEN_HEADER: &str = "x-api-token";

    /// Paths reachable without a session: health, auth pages and the
    /// layout fragments the login page renders with.
    pub const PUBLIC_PATHS: &[&str] = &[
        "/healthz",
        "/login",
        "/logout",
        "/layout.js",
        "/header.html",
        "/footer.html",
        "/favicon.ico",
    ];

    pub const LOGIN_REJECTED: &str = "invalid login/password or no access";

    pub const LOGIN_FAILED: &str = "authorization error, contact administrator";

    pub const LOGIN_BAD_FORM: &str = "invalid form data";
}
